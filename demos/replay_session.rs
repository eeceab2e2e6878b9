/// Session Replay Example
///
/// Replays a MOT-style track table (`frame,track_id,x,y,w,h,confidence`)
/// through a tracking session as if it arrived frame by frame:
/// 1. Continuity: duplicate suppression + occlusion id recovery
/// 2. Streaming smoothing (Kalman by default)
/// 3. Offline GSI pass over the finalized table
///
/// Without an input file a synthetic clip with an occlusion and an id
/// switch is generated.
///
/// Usage:
///   cargo run --release --example replay_session [tracks.txt] [output.txt] [config.json]
use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::time::Instant;
use track_continuity::table::rows_from_array;
use track_continuity::{
    format_track_table, parse_track_table, Bbox, Detection, SessionConfig, SessionStores, TrackRow,
    TrackingSession,
};

fn synthetic_table() -> String {
    let mut out = String::new();
    for frame in 0..120 {
        // player A runs right, is hidden for frames 50..62 and comes back as id 9
        if !(50..62).contains(&frame) {
            let id = if frame < 50 { 1 } else { 9 };
            let x = 100.0 + 5.0 * frame as f32 + if frame % 2 == 0 { 2.0 } else { -2.0 };
            out.push_str(&format!("{},{},{:.1},300,40,90,0.9\n", frame, id, x));
        }
        // player B walks down, duplicated by a ghost track for a few frames
        let y = 100.0 + 2.0 * frame as f32;
        out.push_str(&format!("{},2,800,{:.1},42,88,0.85\n", frame, y));
        if (30..35).contains(&frame) {
            out.push_str(&format!("{},3,801,{:.1},42,88,0.7\n", frame, y + 1.0));
        }
    }
    out
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    println!("🎯 Track Continuity - Session Replay\n");

    let args: Vec<String> = env::args().collect();
    let text = match args.get(1) {
        Some(path) => fs::read_to_string(path)?,
        None => synthetic_table(),
    };
    let output_path = args.get(2).cloned();
    let config = match args.get(3) {
        Some(path) => SessionConfig::from_json_str(&fs::read_to_string(path)?)?,
        None => SessionConfig::new(25.0, 2.0, 150.0, 20),
    };

    let (rows, dropped) = parse_track_table(&text);
    println!("📄 Loaded {} rows ({} malformed lines dropped)", rows.len(), dropped);

    let mut frames: BTreeMap<i64, Vec<Detection>> = BTreeMap::new();
    for row in &rows {
        if row.fields.len() < 4 || row.frame < 0 || row.track_id < 0 {
            continue;
        }
        let f = &row.fields;
        let confidence = f.get(4).copied().unwrap_or(1.0).clamp(0.0, 1.0) as f32;
        let bbox = Bbox::from_xywh(f[0] as f32, f[1] as f32, f[2] as f32, f[3] as f32);
        frames
            .entry(row.frame)
            .or_default()
            .push(Detection::new(row.track_id as u32, bbox, confidence));
    }

    let start = Instant::now();
    let mut session = TrackingSession::open(config, SessionStores::default())?;
    for (frame, detections) in &frames {
        let resolved = session.process_frame(*frame as u64, detections);
        for d in resolved.iter().filter(|d| d.track_id != d.source_track_id) {
            log::debug!("frame {}: upstream id {} continues track {}", frame, d.source_track_id, d.track_id);
        }
    }
    let stats = session.stats().clone();
    println!(
        "⚡ Streamed {} frames in {:.2}ms",
        stats.frames,
        start.elapsed().as_secs_f64() * 1000.0
    );
    println!("   detections in/out:      {}/{}", stats.detections_in, stats.detections_out);
    println!("   ids recovered:          {}", stats.recoveries);
    println!("   duplicates suppressed:  {}", stats.suppressed_duplicates);
    println!("   lost / expired:         {}/{}", stats.lost, stats.expired);

    let closed = session.close();
    let Some(job) = closed.batch else {
        println!("\nℹ️  Offline smoothing disabled in config");
        return Ok(());
    };

    let start = Instant::now();
    let (smoothed, report) = job.run();
    println!(
        "\n📈 GSI: {} tracks, {} -> {} rows ({} interpolated) in {:.2}ms",
        report.tracks,
        report.rows_in,
        report.rows_out,
        report.synthesized,
        start.elapsed().as_secs_f64() * 1000.0
    );

    let (out_rows, _): (Vec<TrackRow>, usize) = rows_from_array(smoothed.view());
    let formatted = format_track_table(&out_rows);
    match output_path {
        Some(path) => {
            fs::write(&path, formatted)?;
            println!("💾 Smoothed table written to {}", path);
        }
        None => {
            for line in formatted.lines().take(10) {
                println!("   {}", line);
            }
            println!("   ...");
        }
    }

    Ok(())
}
