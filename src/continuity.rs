//! Track continuity: occlusion-aware id recovery and duplicate suppression
//!
//! Each track moves through `ACTIVE -> LOST -> {RECOVERED | EXPIRED}`. A
//! track that is not observed in a frame becomes a `LostTrack` carrying a
//! kinematic snapshot. Brand-new tracks are scored against every lost track's
//! predicted position; the best match is remapped onto the lost id. After
//! remapping, near-identical boxes of different tracks are suppressed for the
//! frame, keeping the longer-observed track.

use crate::bbox::{self, Bbox};
use crate::config::ContinuityConfig;
use crate::types::{Detection, TrackId};
use nalgebra::{Point2, Vector2};
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

/// A track observed in the most recent frame
#[derive(Debug, Clone)]
pub struct Track {
    pub track_id: TrackId,
    /// Recent `(frame, center)` samples, oldest first, capped
    pub history: VecDeque<(u64, Point2<f32>)>,
    /// Total number of frames this track has been observed in
    pub observations: usize,
    pub last_frame: u64,
    pub last_bbox: Bbox,
    pub last_confidence: f32,
    /// Center displacement per frame
    pub velocity: Vector2<f32>,
}

impl Track {
    fn new(track_id: TrackId, frame: u64, bbox: Bbox, confidence: f32) -> Self {
        let mut history = VecDeque::new();
        history.push_back((frame, bbox.center()));
        Self {
            track_id,
            history,
            observations: 1,
            last_frame: frame,
            last_bbox: bbox,
            last_confidence: confidence,
            velocity: Vector2::zeros(),
        }
    }

    fn observe(&mut self, frame: u64, bbox: Bbox, confidence: f32, max_history: usize) {
        let frames = frame.saturating_sub(self.last_frame) as u32;
        if frames > 0 {
            self.velocity = bbox::velocity_between(&self.last_position(), &bbox.center(), frames);
        }
        while self.history.len() >= max_history.max(1) {
            self.history.pop_front();
        }
        self.history.push_back((frame, bbox.center()));
        self.observations += 1;
        self.last_frame = frame;
        self.last_bbox = bbox;
        self.last_confidence = confidence;
    }

    pub fn last_position(&self) -> Point2<f32> {
        self.last_bbox.center()
    }

    /// `(width, height)` of the last observed box
    pub fn last_bbox_size(&self) -> (f32, f32) {
        (self.last_bbox.width(), self.last_bbox.height())
    }
}

/// Snapshot of a track taken when it stopped being observed
#[derive(Debug, Clone)]
pub struct LostTrack {
    pub track: Track,
    pub frames_since_lost: u32,
    predictions: HashMap<u32, Point2<f32>>,
}

impl LostTrack {
    fn new(track: Track, frame: u64) -> Self {
        Self {
            frames_since_lost: frame.saturating_sub(track.last_frame) as u32,
            track,
            predictions: HashMap::new(),
        }
    }

    /// `last_position + velocity * frames`, cached per elapsed frame count
    pub fn predicted_position(&mut self, frames: u32) -> Point2<f32> {
        let track = &self.track;
        *self
            .predictions
            .entry(frames)
            .or_insert_with(|| track.last_position() + track.velocity * frames as f32)
    }
}

/// Append-only `new_track_id -> canonical_track_id` table
///
/// A canonical id is used as a target at most once, and ids never chain:
/// a target is never a source and a source never becomes a target, so
/// applying the table twice is the same as applying it once.
#[derive(Debug, Clone, Default)]
pub struct IdRemap {
    map: BTreeMap<TrackId, TrackId>,
    targets: HashSet<TrackId>,
}

impl IdRemap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resolve(&self, track_id: TrackId) -> TrackId {
        self.map.get(&track_id).copied().unwrap_or(track_id)
    }

    pub fn is_target(&self, track_id: TrackId) -> bool {
        self.targets.contains(&track_id)
    }

    pub fn is_source(&self, track_id: TrackId) -> bool {
        self.map.contains_key(&track_id)
    }

    /// Whether `from -> to` would keep the table single-hop and targets unique
    pub fn can_insert(&self, from: TrackId, to: TrackId) -> bool {
        from != to
            && !self.is_source(from)
            && !self.is_target(from)
            && !self.is_target(to)
            && !self.is_source(to)
    }

    pub fn insert(&mut self, from: TrackId, to: TrackId) -> bool {
        if !self.can_insert(from, to) {
            return false;
        }
        self.map.insert(from, to);
        self.targets.insert(to);
        true
    }

    /// Relabel detections without touching their order
    pub fn apply(&self, detections: &[Detection]) -> Vec<Detection> {
        detections
            .iter()
            .map(|d| {
                let mut d = d.clone();
                d.track_id = self.resolve(d.track_id);
                d
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = (TrackId, TrackId)> + '_ {
        self.map.iter().map(|(from, to)| (*from, *to))
    }
}

/// Detection labelled with its canonical id and the track's observation count
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedDetection {
    pub track_id: TrackId,
    /// Upstream detection, `detection.track_id` is still the transient id
    pub detection: Detection,
    pub observations: usize,
}

/// Everything that happened to the tracks in one frame
#[derive(Debug, Clone, Default)]
pub struct ContinuityFrame {
    pub frame: u64,
    /// Surviving detections in input order
    pub detections: Vec<TrackedDetection>,
    /// `(new_track_id, recovered_track_id)` pairs remapped this frame
    pub recovered: Vec<(TrackId, TrackId)>,
    pub suppressed: Vec<TrackId>,
    pub lost: Vec<TrackId>,
    pub expired: Vec<TrackId>,
    pub dropped_malformed: usize,
}

/// Pairwise duplicate test for two active tracks' boxes
pub fn is_duplicate(a: &Bbox, b: &Bbox, config: &ContinuityConfig) -> bool {
    if bbox::calculate_iou(a, b) > config.duplicate_iou {
        return true;
    }
    bbox::normalized_center_distance(a, b) < config.duplicate_center_distance
        && bbox::size_ratio(a, b) > config.duplicate_area_ratio
}

/// Drop the weaker detection of every duplicate pair
///
/// The stronger detection has more observations, then higher confidence,
/// then the lower track id. Survivors keep their input order. Returns the
/// survivors and the suppressed track ids.
pub fn suppress_duplicates(
    detections: &[TrackedDetection],
    config: &ContinuityConfig,
) -> (Vec<TrackedDetection>, Vec<TrackId>) {
    let mut order: Vec<usize> = (0..detections.len()).collect();
    order.sort_by(|&i, &j| {
        let (a, b) = (&detections[i], &detections[j]);
        b.observations
            .cmp(&a.observations)
            .then(b.detection.confidence.total_cmp(&a.detection.confidence))
            .then(a.track_id.cmp(&b.track_id))
    });

    let mut keep = vec![false; detections.len()];
    let mut kept: Vec<usize> = Vec::new();
    for i in order {
        let bbox = &detections[i].detection.bbox;
        if kept
            .iter()
            .all(|&k| !is_duplicate(&detections[k].detection.bbox, bbox, config))
        {
            keep[i] = true;
            kept.push(i);
        }
    }

    let mut survivors = Vec::with_capacity(kept.len());
    let mut suppressed = Vec::new();
    for (i, d) in detections.iter().enumerate() {
        if keep[i] {
            survivors.push(d.clone());
        } else {
            suppressed.push(d.track_id);
        }
    }
    (survivors, suppressed)
}

#[derive(Debug, Clone, Copy)]
struct RecoveryCandidate {
    new_id: TrackId,
    lost_id: TrackId,
    score: f32,
}

/// Per-session continuity state
#[derive(Debug, Clone)]
pub struct TrackContinuityManager {
    config: ContinuityConfig,
    recovery_window_frames: u32,
    active: BTreeMap<TrackId, Track>,
    lost: BTreeMap<TrackId, LostTrack>,
    remap: IdRemap,
    last_frame: Option<u64>,
}

impl TrackContinuityManager {
    pub fn new(config: ContinuityConfig) -> Self {
        let recovery_window_frames = config.recovery_window_frames();
        log::info!(
            "Creating TrackContinuityManager: recovery_window={} frames, recovery_distance={:.1}px, duplicate_iou={:.2}",
            recovery_window_frames,
            config.recovery_distance_px,
            config.duplicate_iou
        );
        Self {
            config,
            recovery_window_frames,
            active: BTreeMap::new(),
            lost: BTreeMap::new(),
            remap: IdRemap::new(),
            last_frame: None,
        }
    }

    pub fn config(&self) -> &ContinuityConfig {
        &self.config
    }

    pub fn recovery_window_frames(&self) -> u32 {
        self.recovery_window_frames
    }

    pub fn remap(&self) -> &IdRemap {
        &self.remap
    }

    pub fn active_track(&self, track_id: TrackId) -> Option<&Track> {
        self.active.get(&track_id)
    }

    pub fn lost_track(&self, track_id: TrackId) -> Option<&LostTrack> {
        self.lost.get(&track_id)
    }

    pub fn num_active(&self) -> usize {
        self.active.len()
    }

    pub fn num_lost(&self) -> usize {
        self.lost.len()
    }

    /// Run one frame of continuity processing
    ///
    /// Frames must arrive in increasing order; a frame at or before the
    /// previous one is ignored.
    pub fn process_frame(&mut self, frame: u64, detections: &[Detection]) -> ContinuityFrame {
        let mut out = ContinuityFrame {
            frame,
            ..Default::default()
        };

        if let Some(last) = self.last_frame {
            if frame <= last {
                log::warn!("Ignoring frame {} received after frame {}", frame, last);
                out.dropped_malformed = detections.len();
                return out;
            }
        }
        self.last_frame = Some(frame);

        // Validate and relabel through the remap table; one detection per canonical id
        let mut labelled: Vec<(TrackId, Detection)> = Vec::with_capacity(detections.len());
        let mut seen: HashSet<TrackId> = HashSet::new();
        for det in detections {
            if let Err(e) = det.validate() {
                log::warn!("Frame {}: dropping detection: {}", frame, e);
                out.dropped_malformed += 1;
                continue;
            }
            let canonical = self.remap.resolve(det.track_id);
            if !seen.insert(canonical) {
                log::warn!(
                    "Frame {}: dropping repeated detection for track {}",
                    frame,
                    canonical
                );
                out.dropped_malformed += 1;
                continue;
            }
            labelled.push((canonical, det.clone()));
        }

        // Observe known tracks, create new ones
        let mut fresh: Vec<TrackId> = Vec::new();
        let mut previously_active = std::mem::take(&mut self.active);
        for (track_id, det) in &labelled {
            let track = if let Some(mut track) = previously_active.remove(track_id) {
                track.observe(frame, det.bbox, det.confidence, self.config.max_history);
                track
            } else if let Some(lost) = self.lost.remove(track_id) {
                log::debug!(
                    "Frame {}: track {} reappeared after {} frames",
                    frame,
                    track_id,
                    frame.saturating_sub(lost.track.last_frame)
                );
                let mut track = lost.track;
                track.observe(frame, det.bbox, det.confidence, self.config.max_history);
                track
            } else {
                if !self.remap.is_source(det.track_id) {
                    fresh.push(*track_id);
                }
                Track::new(*track_id, frame, det.bbox, det.confidence)
            };
            self.active.insert(*track_id, track);
        }

        // Unobserved tracks become lost
        for (track_id, track) in previously_active {
            log::debug!("Frame {}: track {} lost", frame, track_id);
            out.lost.push(track_id);
            self.lost.insert(track_id, LostTrack::new(track, frame));
        }

        // Age lost tracks and expire those past the recovery window
        let window = self.recovery_window_frames;
        self.lost.retain(|track_id, lost| {
            lost.frames_since_lost = frame.saturating_sub(lost.track.last_frame) as u32;
            if lost.frames_since_lost > window {
                log::debug!(
                    "Frame {}: lost track {} expired after {} frames",
                    frame,
                    track_id,
                    lost.frames_since_lost
                );
                out.expired.push(*track_id);
                false
            } else {
                true
            }
        });

        // Recover lost ids for brand-new tracks
        let recoveries = self.match_recoveries(&fresh);
        let mut renamed: HashMap<TrackId, TrackId> = HashMap::new();
        for candidate in recoveries {
            let (Some(new_track), Some(lost)) = (
                self.active.remove(&candidate.new_id),
                self.lost.remove(&candidate.lost_id),
            ) else {
                continue;
            };
            if !self.remap.insert(candidate.new_id, candidate.lost_id) {
                self.active.insert(candidate.new_id, new_track);
                self.lost.insert(candidate.lost_id, lost);
                continue;
            }
            log::debug!(
                "Frame {}: track {} recovered as {} (score={:.3}, gap={} frames)",
                frame,
                candidate.new_id,
                candidate.lost_id,
                candidate.score,
                lost.frames_since_lost
            );
            let mut recovered = lost.track;
            recovered.observe(
                frame,
                new_track.last_bbox,
                new_track.last_confidence,
                self.config.max_history,
            );
            self.active.insert(candidate.lost_id, recovered);
            renamed.insert(candidate.new_id, candidate.lost_id);
            out.recovered.push((candidate.new_id, candidate.lost_id));
        }

        let tracked: Vec<TrackedDetection> = labelled
            .into_iter()
            .map(|(track_id, detection)| {
                let track_id = renamed.get(&track_id).copied().unwrap_or(track_id);
                let observations = self
                    .active
                    .get(&track_id)
                    .map(|t| t.observations)
                    .unwrap_or(1);
                TrackedDetection {
                    track_id,
                    detection,
                    observations,
                }
            })
            .collect();

        let (survivors, suppressed) = suppress_duplicates(&tracked, &self.config);
        if !suppressed.is_empty() {
            log::debug!("Frame {}: suppressed duplicate tracks {:?}", frame, suppressed);
        }
        out.detections = survivors;
        out.suppressed = suppressed;
        out
    }

    /// Greedy best-score assignment of fresh tracks to lost tracks
    fn match_recoveries(&mut self, fresh: &[TrackId]) -> Vec<RecoveryCandidate> {
        if fresh.is_empty() || self.lost.is_empty() {
            return Vec::new();
        }
        let c = &self.config;

        let mut candidates = Vec::new();
        for new_id in fresh {
            let Some(new_track) = self.active.get(new_id) else {
                continue;
            };
            let new_bbox = new_track.last_bbox;
            let new_center = new_bbox.center();

            for (lost_id, lost) in self.lost.iter_mut() {
                if !self.remap.can_insert(*new_id, *lost_id) {
                    continue;
                }
                let predicted = lost.predicted_position(lost.frames_since_lost);
                let distance = bbox::distance(&new_center, &predicted);
                let size_ratio = bbox::size_ratio(&new_bbox, &lost.track.last_bbox);
                let scale = lost.track.last_bbox.scale().max(new_bbox.scale());
                if scale <= 0.0 {
                    continue;
                }
                let normalized = distance / scale;

                let eligible = (distance <= c.recovery_distance_px && size_ratio > c.min_size_ratio)
                    || (normalized < c.close_range_distance && size_ratio > c.close_range_size_ratio);
                let score = size_ratio / (1.0 + normalized);
                if eligible && score > c.min_recovery_score {
                    candidates.push(RecoveryCandidate {
                        new_id: *new_id,
                        lost_id: *lost_id,
                        score,
                    });
                }
            }
        }

        candidates.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then(a.new_id.cmp(&b.new_id))
                .then(a.lost_id.cmp(&b.lost_id))
        });

        let mut used_new = HashSet::new();
        let mut used_lost = HashSet::new();
        candidates
            .into_iter()
            .filter(|cand| {
                if used_new.contains(&cand.new_id) || used_lost.contains(&cand.lost_id) {
                    return false;
                }
                used_new.insert(cand.new_id);
                used_lost.insert(cand.lost_id);
                true
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ContinuityConfig {
        ContinuityConfig {
            fps: 10.0,
            recovery_window_seconds: 1.0,
            recovery_distance_px: 50.0,
            ..Default::default()
        }
    }

    fn det(track_id: TrackId, x: f32, y: f32) -> Detection {
        Detection::new(track_id, Bbox::from_xywh(x, y, 40.0, 80.0), 0.9)
    }

    fn ids(frame: &ContinuityFrame) -> Vec<TrackId> {
        frame.detections.iter().map(|d| d.track_id).collect()
    }

    #[test]
    fn test_velocity_from_consecutive_frames() {
        let mut manager = TrackContinuityManager::new(config());
        manager.process_frame(0, &[det(1, 0.0, 0.0)]);
        assert_eq!(manager.active_track(1).unwrap().velocity, Vector2::zeros());

        manager.process_frame(2, &[det(1, 10.0, 4.0)]);
        let track = manager.active_track(1).unwrap();
        assert_eq!(track.velocity, Vector2::new(5.0, 2.0));
        assert_eq!(track.observations, 2);
        assert_eq!(track.history.len(), 2);
    }

    #[test]
    fn test_lost_then_expired() {
        let mut manager = TrackContinuityManager::new(config());
        assert_eq!(manager.recovery_window_frames(), 10);
        manager.process_frame(0, &[det(1, 0.0, 0.0)]);

        let frame = manager.process_frame(1, &[]);
        assert_eq!(frame.lost, vec![1]);
        assert!(manager.active_track(1).is_none());
        assert_eq!(manager.lost_track(1).unwrap().frames_since_lost, 1);

        let frame = manager.process_frame(10, &[]);
        assert!(frame.expired.is_empty());
        let frame = manager.process_frame(11, &[]);
        assert_eq!(frame.expired, vec![1]);
        assert_eq!(manager.num_lost(), 0);
    }

    #[test]
    fn test_recovers_track_near_predicted_position() {
        let mut manager = TrackContinuityManager::new(config());
        // moving right at 10 px/frame
        for f in 0..5u64 {
            manager.process_frame(f, &[det(1, 10.0 * f as f32, 100.0)]);
        }
        // occluded for frames 5..=7
        for f in 5..8u64 {
            manager.process_frame(f, &[]);
        }
        // reappears with a new id close to 40 + 10 * 4 = 80
        let frame = manager.process_frame(8, &[det(9, 82.0, 101.0)]);
        assert_eq!(frame.recovered, vec![(9, 1)]);
        assert_eq!(ids(&frame), vec![1]);
        assert_eq!(frame.detections[0].detection.track_id, 9);
        assert!(manager.remap().is_target(1));
        assert_eq!(manager.active_track(1).unwrap().observations, 6);

        // the transient id stays mapped on later frames
        let frame = manager.process_frame(9, &[det(9, 92.0, 101.0)]);
        assert_eq!(ids(&frame), vec![1]);
        assert!(frame.recovered.is_empty());
    }

    #[test]
    fn test_far_or_late_track_keeps_new_id() {
        let mut manager = TrackContinuityManager::new(config());
        manager.process_frame(0, &[det(1, 0.0, 0.0)]);
        manager.process_frame(1, &[det(1, 10.0, 0.0)]);

        // far from the predicted position
        let frame = manager.process_frame(3, &[det(2, 400.0, 300.0)]);
        assert!(frame.recovered.is_empty());
        assert_eq!(ids(&frame), vec![2]);

        // beyond the recovery window
        let mut manager = TrackContinuityManager::new(config());
        manager.process_frame(0, &[det(1, 0.0, 0.0)]);
        let frame = manager.process_frame(12, &[det(3, 0.0, 0.0)]);
        assert_eq!(frame.expired, vec![1]);
        assert_eq!(ids(&frame), vec![3]);
    }

    #[test]
    fn test_size_mismatch_blocks_recovery() {
        let mut manager = TrackContinuityManager::new(config());
        manager.process_frame(0, &[det(1, 0.0, 0.0)]);
        let tiny = Detection::new(2, Bbox::from_xywh(10.0, 20.0, 10.0, 20.0), 0.9);
        let frame = manager.process_frame(1, &[tiny]);
        assert!(frame.recovered.is_empty());
    }

    #[test]
    fn test_remap_target_is_never_reused() {
        let mut manager = TrackContinuityManager::new(config());
        manager.process_frame(0, &[det(1, 0.0, 0.0)]);
        let frame = manager.process_frame(1, &[det(2, 2.0, 0.0)]);
        assert_eq!(frame.recovered, vec![(2, 1)]);

        // track 1 (fed by transient 2) disappears again, a third id shows up
        manager.process_frame(2, &[]);
        let frame = manager.process_frame(3, &[det(3, 2.0, 0.0)]);
        assert!(frame.recovered.is_empty());
        assert_eq!(ids(&frame), vec![3]);
    }

    #[test]
    fn test_same_id_reappearing_is_not_remapped() {
        let mut manager = TrackContinuityManager::new(config());
        manager.process_frame(0, &[det(4, 0.0, 0.0)]);
        manager.process_frame(1, &[]);
        let frame = manager.process_frame(3, &[det(4, 30.0, 0.0)]);
        assert!(frame.recovered.is_empty());
        assert_eq!(ids(&frame), vec![4]);
        assert_eq!(manager.active_track(4).unwrap().velocity, Vector2::new(10.0, 0.0));
        assert!(manager.remap().is_empty());
    }

    #[test]
    fn test_duplicates_suppressed_keeping_longer_track() {
        let mut manager = TrackContinuityManager::new(config());
        manager.process_frame(0, &[det(1, 0.0, 0.0), det(5, 300.0, 0.0)]);
        manager.process_frame(1, &[det(1, 0.0, 0.0), det(5, 300.0, 0.0)]);

        // track 2 is a near-copy of track 1 but has a higher confidence
        let mut dup = det(2, 1.0, 1.0);
        dup.confidence = 0.99;
        let frame = manager.process_frame(2, &[dup, det(5, 300.0, 0.0), det(1, 0.0, 0.0)]);
        assert_eq!(frame.suppressed, vec![2]);
        assert_eq!(ids(&frame), vec![5, 1]);
        // the suppressed track is still remembered
        assert!(manager.active_track(2).is_some());
    }

    #[test]
    fn test_suppression_is_idempotent() {
        let config = config();
        let make = |id, x: f32, obs, conf| TrackedDetection {
            track_id: id,
            detection: Detection::new(id, Bbox::from_xywh(x, 0.0, 40.0, 80.0), conf),
            observations: obs,
        };
        let detections = vec![
            make(1, 0.0, 3, 0.8),
            make(2, 2.0, 3, 0.9),
            make(3, 4.0, 1, 0.95),
            make(4, 200.0, 1, 0.5),
            make(5, 203.0, 7, 0.4),
        ];
        let (once, suppressed) = suppress_duplicates(&detections, &config);
        assert_eq!(suppressed, vec![1, 3, 4]);
        let (twice, none) = suppress_duplicates(&once, &config);
        assert_eq!(once, twice);
        assert!(none.is_empty());
    }

    #[test]
    fn test_remap_apply_is_idempotent() {
        let mut remap = IdRemap::new();
        assert!(remap.insert(7, 1));
        assert!(!remap.insert(8, 1));
        assert!(!remap.insert(1, 3));
        let dets = vec![det(7, 0.0, 0.0), det(2, 50.0, 0.0), det(1, 90.0, 0.0)];
        let once = remap.apply(&dets);
        assert_eq!(once.iter().map(|d| d.track_id).collect::<Vec<_>>(), vec![1, 2, 1]);
        assert_eq!(remap.apply(&once), once);
    }

    #[test]
    fn test_malformed_and_out_of_order_input() {
        let mut manager = TrackContinuityManager::new(config());
        let bad = Detection::new(3, Bbox::new(5.0, 5.0, 1.0, 1.0), 0.5);
        let frame = manager.process_frame(5, &[bad, det(1, 0.0, 0.0), det(1, 1.0, 0.0)]);
        assert_eq!(frame.dropped_malformed, 2);
        assert_eq!(ids(&frame), vec![1]);

        let frame = manager.process_frame(4, &[det(1, 0.0, 0.0)]);
        assert!(frame.detections.is_empty());
        assert_eq!(manager.active_track(1).unwrap().last_frame, 5);
    }

    #[test]
    fn test_lost_prediction_is_cached() {
        let mut track = Track::new(1, 0, Bbox::from_xywh(0.0, 0.0, 10.0, 10.0), 0.9);
        track.velocity = Vector2::new(2.0, -1.0);
        let mut lost = LostTrack::new(track, 3);
        assert_eq!(lost.frames_since_lost, 3);
        assert_eq!(lost.predicted_position(3), Point2::new(11.0, 2.0));
        assert_eq!(lost.predictions.len(), 1);
        lost.predicted_position(3);
        assert_eq!(lost.predictions.len(), 1);
    }
}
