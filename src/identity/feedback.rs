//! Persistent user-correction log and the matching rules derived from it

use crate::error::Result;
use crate::persist;
use crate::types::{IdentityId, TrackId};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A wrong track recurring this many times for an identity is excluded
pub const EXCLUSION_REPEATS: u32 = 3;

/// Similarities observed when the wrong assignment was made
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CorrectionContext {
    #[serde(default)]
    pub wrong_similarity: Option<f32>,
    #[serde(default)]
    pub right_similarity: Option<f32>,
}

impl CorrectionContext {
    /// `right - wrong`, when both similarities were recorded
    pub fn similarity_delta(&self) -> Option<f32> {
        match (self.wrong_similarity, self.right_similarity) {
            (Some(wrong), Some(right)) if wrong.is_finite() && right.is_finite() => Some(right - wrong),
            _ => None,
        }
    }
}

/// User correction: `identity_id` was attached to `wrong_track_id` but belongs to `right_track_id`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Correction {
    pub identity_id: IdentityId,
    pub wrong_track_id: TrackId,
    pub right_track_id: TrackId,
    pub frame: u64,
    #[serde(default)]
    pub context: Option<CorrectionContext>,
}

impl Correction {
    pub fn new(
        identity_id: impl Into<IdentityId>,
        wrong_track_id: TrackId,
        right_track_id: TrackId,
        frame: u64,
    ) -> Self {
        Self {
            identity_id: identity_id.into(),
            wrong_track_id,
            right_track_id,
            frame,
            context: None,
        }
    }

    pub fn with_context(mut self, wrong_similarity: f32, right_similarity: f32) -> Self {
        self.context = Some(CorrectionContext {
            wrong_similarity: Some(wrong_similarity),
            right_similarity: Some(right_similarity),
        });
        self
    }
}

/// Derived per-identity rules, rebuilt identically from the correction log
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedbackState {
    pub corrections: usize,
    /// Sum and count of similarity deltas per identity
    deltas: HashMap<IdentityId, (f32, u32)>,
    wrong_tracks: HashMap<IdentityId, HashMap<TrackId, u32>>,
}

impl FeedbackState {
    fn apply(&mut self, correction: &Correction) {
        self.corrections += 1;
        if let Some(delta) = correction.context.as_ref().and_then(|c| c.similarity_delta()) {
            let entry = self.deltas.entry(correction.identity_id.clone()).or_insert((0.0, 0));
            entry.0 += delta;
            entry.1 += 1;
        }
        *self
            .wrong_tracks
            .entry(correction.identity_id.clone())
            .or_default()
            .entry(correction.wrong_track_id)
            .or_insert(0) += 1;
    }

    /// Mean similarity delta for `identity_id`, 0 with no recorded context
    pub fn adjustment(&self, identity_id: &str) -> f32 {
        match self.deltas.get(identity_id) {
            Some((sum, count)) if *count > 0 => sum / *count as f32,
            _ => 0.0,
        }
    }

    pub fn wrong_count(&self, identity_id: &str, track_id: TrackId) -> u32 {
        self.wrong_tracks
            .get(identity_id)
            .and_then(|tracks| tracks.get(&track_id))
            .copied()
            .unwrap_or(0)
    }

    pub fn should_exclude(&self, identity_id: &str, track_id: TrackId) -> bool {
        self.wrong_count(identity_id, track_id) >= EXCLUSION_REPEATS
    }
}

#[derive(Debug, Default)]
struct WriterState {
    /// Corrections applied in memory but not yet on disk
    pending: Vec<Correction>,
}

/// Correction store shared by all sessions
#[derive(Debug)]
pub struct FeedbackLearner {
    state: RwLock<Arc<FeedbackState>>,
    writer: Mutex<WriterState>,
    path: Option<PathBuf>,
}

impl Default for FeedbackLearner {
    fn default() -> Self {
        Self::new()
    }
}

impl FeedbackLearner {
    /// Learner without a backing log
    pub fn new() -> Self {
        Self {
            state: RwLock::new(Arc::new(FeedbackState::default())),
            writer: Mutex::new(WriterState::default()),
            path: None,
        }
    }

    /// Learner backed by a JSON-lines log at `path`, replaying it if present
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let (corrections, skipped): (Vec<Correction>, usize) = persist::read_json_lines(&path)?;
        let mut state = FeedbackState::default();
        for correction in &corrections {
            state.apply(correction);
        }
        log::info!(
            "Loaded {} corrections from {} ({} unreadable lines skipped)",
            state.corrections,
            path.display(),
            skipped
        );
        Ok(Self {
            state: RwLock::new(Arc::new(state)),
            writer: Mutex::new(WriterState::default()),
            path: Some(path),
        })
    }

    pub fn snapshot(&self) -> Arc<FeedbackState> {
        Arc::clone(&self.state.read())
    }

    /// Apply a correction and append it to the log
    ///
    /// The correction takes effect immediately. A failed write returns
    /// `PersistenceWriteFailure` and the correction stays queued for the
    /// next write or `flush`.
    pub fn record_correction(&self, correction: Correction) -> Result<()> {
        let mut writer = self.writer.lock();
        let mut next = (*self.snapshot()).clone();
        next.apply(&correction);
        log::debug!(
            "Correction for {}: track {} -> {} at frame {}",
            correction.identity_id,
            correction.wrong_track_id,
            correction.right_track_id,
            correction.frame
        );
        writer.pending.push(correction);
        *self.state.write() = Arc::new(next);

        self.write_pending(&mut writer)
    }

    /// Retry writing queued corrections
    pub fn flush(&self) -> Result<()> {
        let mut writer = self.writer.lock();
        self.write_pending(&mut writer)
    }

    pub fn pending_writes(&self) -> usize {
        self.writer.lock().pending.len()
    }

    pub fn get_adjustment(&self, identity_id: &str) -> f32 {
        self.snapshot().adjustment(identity_id)
    }

    pub fn should_exclude_track(&self, identity_id: &str, track_id: TrackId) -> bool {
        self.snapshot().should_exclude(identity_id, track_id)
    }

    fn write_pending(&self, writer: &mut WriterState) -> Result<()> {
        let Some(path) = &self.path else {
            writer.pending.clear();
            return Ok(());
        };
        if writer.pending.is_empty() {
            return Ok(());
        }
        match persist::append_json_lines(path, &writer.pending) {
            Ok(()) => {
                writer.pending.clear();
                Ok(())
            }
            Err(e) => {
                log::warn!(
                    "{} corrections not persisted, will retry on next write: {}",
                    writer.pending.len(),
                    e
                );
                Err(e)
            }
        }
    }
}
