//! Per-video tracking session
//!
//! A session owns all transient state for one video: the continuity
//! manager, the per-track smoother arena, identity tallies and the raw
//! track table. Shared stores come in through `SessionStores`. Frames are
//! processed strictly in order; `close` hands back the finalized table and
//! the offline smoothing job.

use crate::bbox::Bbox;
use crate::config::{AdaptiveConfig, GsiConfig, SessionConfig};
use crate::continuity::{TrackContinuityManager, TrackedDetection};
use crate::error::Result;
use crate::identity::{
    AdaptiveThresholdController, FeedbackLearner, Gallery, IdentityQuery, IdentityResolver, ScoredMatch,
};
use crate::smoothing::{BatchGpSmoother, GsiReport, TrackSmoother};
use crate::table::{rows_to_array, TrackRow};
use crate::types::{Detection, IdentityId, IdentityMatch, ResolvedDetection, TrackId};
use ndarray::Array2;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Columns of the finalized track table
pub const TABLE_COLUMNS: [&str; 7] = ["frame", "track_id", "x", "y", "w", "h", "confidence"];

/// Stores shared across sessions
#[derive(Clone)]
pub struct SessionStores {
    /// `None` runs the session without identity resolution
    pub gallery: Option<Arc<dyn Gallery>>,
    pub adaptive: Arc<AdaptiveThresholdController>,
    pub feedback: Arc<FeedbackLearner>,
}

impl Default for SessionStores {
    fn default() -> Self {
        Self {
            gallery: None,
            adaptive: Arc::new(AdaptiveThresholdController::new(AdaptiveConfig::default())),
            feedback: Arc::new(FeedbackLearner::new()),
        }
    }
}

impl SessionStores {
    pub fn new(
        gallery: Arc<dyn Gallery>,
        adaptive: Arc<AdaptiveThresholdController>,
        feedback: Arc<FeedbackLearner>,
    ) -> Self {
        Self {
            gallery: Some(gallery),
            adaptive,
            feedback,
        }
    }

    /// Gallery with fresh in-memory adaptive and feedback stores
    pub fn with_gallery(gallery: Arc<dyn Gallery>) -> Self {
        Self {
            gallery: Some(gallery),
            ..Self::default()
        }
    }
}

/// Running counters for one session
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub frames: u64,
    pub detections_in: u64,
    pub detections_out: u64,
    pub dropped_malformed: u64,
    pub suppressed_duplicates: u64,
    pub recoveries: u64,
    pub lost: u64,
    pub expired: u64,
    pub smoothing_fallbacks: u64,
    pub identity_matches: u64,
    /// Matches withdrawn because the identity went to another track in the same frame
    pub identity_conflicts: u64,
}

#[derive(Debug)]
struct SmootherSlot {
    smoother: TrackSmoother,
    last_frame: u64,
}

/// Offline GSI pass over a closed session's table
#[derive(Debug, Clone)]
pub struct BatchSmoothingJob {
    config: GsiConfig,
    table: Array2<f64>,
}

impl BatchSmoothingJob {
    pub fn config(&self) -> &GsiConfig {
        &self.config
    }

    pub fn table(&self) -> &Array2<f64> {
        &self.table
    }

    /// Interpolate and smooth every track; column layout is unchanged
    pub fn run(self) -> (Array2<f64>, GsiReport) {
        let smoother = BatchGpSmoother::new(self.config);
        smoother.smooth_table(self.table.view())
    }
}

/// Result of closing a session
#[derive(Debug, Clone)]
pub struct ClosedSession {
    /// Raw boxes per `(frame, track_id)`, columns as in `TABLE_COLUMNS`
    pub table: Array2<f64>,
    pub batch: Option<BatchSmoothingJob>,
    pub stats: SessionStats,
}

/// Isolated state for processing one video
pub struct TrackingSession {
    config: SessionConfig,
    continuity: TrackContinuityManager,
    smoothers: HashMap<TrackId, SmootherSlot>,
    stores: SessionStores,
    resolver: Option<IdentityResolver>,
    rows: Vec<TrackRow>,
    tallies: BTreeMap<IdentityId, BTreeMap<TrackId, u32>>,
    stats: SessionStats,
}

impl TrackingSession {
    /// Validate the configuration and start an empty session
    pub fn open(config: SessionConfig, stores: SessionStores) -> Result<Self> {
        config.validate()?;

        let resolver = match (&stores.gallery, config.resolve_identities) {
            (Some(gallery), true) => Some(IdentityResolver::new(
                Arc::clone(gallery),
                Arc::clone(&stores.adaptive),
                Arc::clone(&stores.feedback),
            )),
            _ => None,
        };

        log::info!(
            "Opening tracking session: fps={}, recovery_window={}s, recovery_distance={}px, max_gap={} frames, smoothing={}, identities={}",
            config.continuity.fps,
            config.continuity.recovery_window_seconds,
            config.continuity.recovery_distance_px,
            config.max_gap_frames,
            config.smoothing,
            resolver.is_some()
        );

        Ok(Self {
            continuity: TrackContinuityManager::new(config.continuity.clone()),
            config,
            smoothers: HashMap::new(),
            stores,
            resolver,
            rows: Vec::new(),
            tallies: BTreeMap::new(),
            stats: SessionStats::default(),
        })
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    pub fn continuity(&self) -> &TrackContinuityManager {
        &self.continuity
    }

    /// Whether gallery matching is still running
    pub fn resolves_identities(&self) -> bool {
        self.resolver.is_some()
    }

    /// Process one frame: continuity, streaming smoothing, identity resolution
    ///
    /// Malformed detections are dropped, a gallery outage switches identity
    /// resolution off; nothing here fails the session.
    pub fn process_frame(&mut self, frame_index: u64, detections: &[Detection]) -> Vec<ResolvedDetection> {
        self.stats.frames += 1;
        self.stats.detections_in += detections.len() as u64;

        let frame = self.continuity.process_frame(frame_index, detections);
        self.stats.dropped_malformed += frame.dropped_malformed as u64;
        self.stats.suppressed_duplicates += frame.suppressed.len() as u64;
        self.stats.recoveries += frame.recovered.len() as u64;
        self.stats.lost += frame.lost.len() as u64;
        self.stats.expired += frame.expired.len() as u64;

        for track_id in &frame.expired {
            self.smoothers.remove(track_id);
        }

        let identities = self.resolve_identities(&frame.detections);

        let mut resolved = Vec::with_capacity(frame.detections.len());
        for (tracked, identity) in frame.detections.iter().zip(identities) {
            let raw = tracked.detection.bbox;
            let bbox = self.smooth(frame_index, tracked.track_id, &raw, tracked.detection.confidence);
            self.record_row(frame_index, tracked.track_id, &raw, tracked.detection.confidence);

            if let Some(identity) = &identity {
                *self
                    .tallies
                    .entry(identity.identity_id.clone())
                    .or_default()
                    .entry(tracked.track_id)
                    .or_insert(0) += 1;
                self.stats.identity_matches += 1;
            }

            resolved.push(ResolvedDetection {
                track_id: tracked.track_id,
                source_track_id: tracked.detection.track_id,
                bbox,
                raw_bbox: raw,
                confidence: tracked.detection.confidence,
                identity,
            });
        }

        self.stats.detections_out += resolved.len() as u64;
        resolved
    }

    fn smooth(&mut self, frame_index: u64, track_id: TrackId, raw: &Bbox, confidence: f32) -> Bbox {
        if !self.smoothers.contains_key(&track_id) {
            let Some(smoother) =
                TrackSmoother::for_method(self.config.smoothing, &self.config.kalman, &self.config.ema)
            else {
                return *raw;
            };
            self.smoothers.insert(
                track_id,
                SmootherSlot {
                    smoother,
                    last_frame: frame_index,
                },
            );
        }
        let Some(slot) = self.smoothers.get_mut(&track_id) else {
            return *raw;
        };

        let dt = frame_index.saturating_sub(slot.last_frame).max(1) as f32;
        slot.last_frame = frame_index;
        let outcome = slot.smoother.observe(raw.center(), confidence, dt);
        if outcome.is_fallback() {
            self.stats.smoothing_fallbacks += 1;
        }
        let center = outcome.position();
        if center.x.is_finite() && center.y.is_finite() {
            raw.recentered(center)
        } else {
            *raw
        }
    }

    fn record_row(&mut self, frame_index: u64, track_id: TrackId, raw: &Bbox, confidence: f32) {
        let [x, y, w, h] = raw.to_xywh();
        self.rows.push(TrackRow::new(
            frame_index as i64,
            track_id as i64,
            vec![x as f64, y as f64, w as f64, h as f64, confidence as f64],
        ));
    }

    /// One identity per track, and each identity on at most one track per frame
    fn resolve_identities(&mut self, detections: &[TrackedDetection]) -> Vec<Option<IdentityMatch>> {
        let Some(resolver) = &self.resolver else {
            return vec![None; detections.len()];
        };
        let mut matches: Vec<Option<ScoredMatch>> = vec![None; detections.len()];

        let adaptive = self.stores.adaptive.snapshot();
        let feedback = self.stores.feedback.snapshot();
        let mut outage = None;
        for (slot, tracked) in matches.iter_mut().zip(detections) {
            let query = IdentityQuery::from_detection(tracked.track_id, &tracked.detection);
            match resolver.match_with(&query, &adaptive, &feedback) {
                Ok(found) => *slot = found,
                Err(e) => {
                    outage = Some(e);
                    break;
                }
            }
        }

        if let Some(e) = outage {
            log::warn!("Identity resolution disabled for the rest of the session: {}", e);
            self.resolver = None;
            return vec![None; detections.len()];
        }

        // identity -> index of the track keeping it
        let mut owners: HashMap<IdentityId, usize> = HashMap::new();
        for (i, found) in matches.iter().enumerate() {
            let Some(found) = found else {
                continue;
            };
            match owners.get(&found.identity.identity_id).copied() {
                None => {
                    owners.insert(found.identity.identity_id.clone(), i);
                }
                Some(j) => {
                    if Self::outranks(&matches, detections, i, j) {
                        owners.insert(found.identity.identity_id.clone(), i);
                    }
                }
            }
        }

        let mut identities = Vec::with_capacity(detections.len());
        for (i, found) in matches.into_iter().enumerate() {
            let identity = found.and_then(|found| {
                if owners.get(&found.identity.identity_id) == Some(&i) {
                    Some(found.identity)
                } else {
                    log::debug!(
                        "Identity {} already taken this frame, track {} left unnamed",
                        found.identity.identity_id,
                        detections[i].track_id
                    );
                    self.stats.identity_conflicts += 1;
                    None
                }
            });
            identities.push(identity);
        }
        identities
    }

    /// Whether match `i` beats match `j` for the same identity
    fn outranks(matches: &[Option<ScoredMatch>], detections: &[TrackedDetection], i: usize, j: usize) -> bool {
        let similarity = |k: usize| matches[k].as_ref().map_or(0.0, |m| m.identity.similarity);
        let (si, sj) = (similarity(i), similarity(j));
        if si != sj {
            return si > sj;
        }
        let (a, b) = (&detections[i], &detections[j]);
        if a.observations != b.observations {
            return a.observations > b.observations;
        }
        a.track_id < b.track_id
    }

    /// Finish the session
    ///
    /// Drops the streaming smoother state, commits identity tallies to the
    /// gallery (one atomic merge per identity), retries pending store writes and
    /// returns the raw track table with the offline smoothing job.
    pub fn close(self) -> ClosedSession {
        let Self {
            config,
            smoothers,
            stores,
            resolver,
            mut rows,
            tallies,
            stats,
            ..
        } = self;
        drop(smoothers);

        if let Some(gallery) = &stores.gallery {
            if resolver.is_some() {
                commit_tallies(gallery.as_ref(), &tallies);
            } else if !tallies.is_empty() {
                log::warn!("Gallery unavailable, {} identity tallies not committed", tallies.len());
            }
        }
        if let Err(e) = stores.feedback.flush() {
            log::warn!("Feedback corrections still pending at session close: {}", e);
        }
        if let Err(e) = stores.adaptive.flush() {
            log::warn!("Adaptive state still pending at session close: {}", e);
        }

        rows.sort_by_key(|r| (r.frame, r.track_id));
        let table = rows_to_array(&rows, TABLE_COLUMNS.len());
        let max_gap_frames = config.max_gap_frames;
        let batch = config.gsi.map(|gsi| BatchSmoothingJob {
            config: GsiConfig {
                interval: max_gap_frames,
                ..gsi
            },
            table: table.clone(),
        });

        log::info!(
            "Closed tracking session: {} frames, {} detections out, {} recoveries, {} duplicates suppressed, {} identity matches",
            stats.frames,
            stats.detections_out,
            stats.recoveries,
            stats.suppressed_duplicates,
            stats.identity_matches
        );

        ClosedSession { table, batch, stats }
    }
}

fn commit_tallies(gallery: &dyn Gallery, tallies: &BTreeMap<IdentityId, BTreeMap<TrackId, u32>>) {
    for (identity_id, counts) in tallies {
        match gallery.merge_track_history(identity_id, counts) {
            Ok(true) => {}
            Ok(false) => log::warn!("Identity {} vanished from the gallery, tallies dropped", identity_id),
            Err(e) => log::warn!("Could not commit track history for {}: {}", identity_id, e),
        }
    }
}
