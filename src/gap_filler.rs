//! Linear interpolation of short frame gaps within a track

use crate::table::TrackRow;
use std::collections::HashMap;

/// Summary of a gap-filling pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GapFillReport {
    /// Rows dropped as malformed or duplicated
    pub dropped: usize,
    /// Rows synthesized by interpolation
    pub synthesized: usize,
}

/// Fill gaps `1 < f2 - f1 < max_gap_frames` between consecutive observations of a track
///
/// Output is sorted by `(track_id, frame)`. Gaps of `max_gap_frames` or more
/// are left open.
pub fn fill(rows: &[TrackRow], max_gap_frames: i64) -> Vec<TrackRow> {
    fill_with_report(rows, max_gap_frames).0
}

pub fn fill_with_report(rows: &[TrackRow], max_gap_frames: i64) -> (Vec<TrackRow>, GapFillReport) {
    let mut report = GapFillReport::default();
    let clean = sanitize(rows, &mut report);

    let mut out = Vec::with_capacity(clean.len());
    for (i, row) in clean.iter().enumerate() {
        if let Some(prev) = i.checked_sub(1).map(|p| &clean[p]) {
            if prev.track_id == row.track_id {
                // an overflowing difference is far beyond any fillable gap
                let gap = row.frame.checked_sub(prev.frame).unwrap_or(i64::MAX);
                if gap > 1 && gap < max_gap_frames {
                    for step in 1..gap {
                        out.push(interpolate(prev, row, step, gap));
                        report.synthesized += 1;
                    }
                }
            }
        }
        out.push(row.clone());
    }

    (out, report)
}

/// Drop non-finite rows, rows whose width disagrees with their track, and repeated `(track, frame)` keys
fn sanitize(rows: &[TrackRow], report: &mut GapFillReport) -> Vec<TrackRow> {
    let mut widths: HashMap<i64, usize> = HashMap::new();
    let mut clean: Vec<TrackRow> = Vec::with_capacity(rows.len());

    for row in rows {
        if !row.is_finite() {
            log::warn!(
                "Dropping non-numeric row for track {} at frame {}",
                row.track_id,
                row.frame
            );
            report.dropped += 1;
            continue;
        }
        let width = *widths.entry(row.track_id).or_insert(row.fields.len());
        if width != row.fields.len() {
            log::warn!(
                "Dropping row for track {} at frame {}: {} fields, expected {}",
                row.track_id,
                row.frame,
                row.fields.len(),
                width
            );
            report.dropped += 1;
            continue;
        }
        clean.push(row.clone());
    }

    // stable, so the first row for a repeated key wins
    clean.sort_by_key(|r| (r.track_id, r.frame));
    let before = clean.len();
    clean.dedup_by(|later, earlier| later.track_id == earlier.track_id && later.frame == earlier.frame);
    report.dropped += before - clean.len();
    clean
}

fn interpolate(start: &TrackRow, end: &TrackRow, step: i64, gap: i64) -> TrackRow {
    let t = step as f64 / gap as f64;
    let fields = start
        .fields
        .iter()
        .zip(&end.fields)
        .map(|(a, b)| a + (b - a) * t)
        .collect();
    TrackRow::new(start.frame + step, start.track_id, fields)
}
