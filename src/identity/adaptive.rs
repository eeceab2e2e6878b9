//! Rolling-performance driven tuning of matching thresholds and modality weights

use crate::config::AdaptiveConfig;
use crate::error::Result;
use crate::persist;
use crate::types::Modality;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const SIMILARITY_THRESHOLD_RANGE: (f32, f32) = (0.3, 0.9);
pub const REID_THRESHOLD_RANGE: (f32, f32) = (0.4, 0.8);
const THRESHOLD_STEP: f32 = 0.05;
const MIN_MATCH_ACCURACY: f32 = 0.7;

/// One evaluation sample reported by the caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSample {
    pub frame: u64,
    pub track_quality: f32,
    pub match_accuracy: f32,
    pub false_positives: u32,
    pub false_negatives: u32,
}

impl PerformanceSample {
    pub fn new(
        frame: u64,
        track_quality: f32,
        match_accuracy: f32,
        false_positives: u32,
        false_negatives: u32,
    ) -> Self {
        Self {
            frame,
            track_quality,
            match_accuracy,
            false_positives,
            false_negatives,
        }
    }
}

/// Immutable view of the current thresholds and weights
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdaptiveState {
    pub similarity_threshold: f32,
    pub reid_threshold: f32,
    /// General, jersey and foot weights; sums to 1
    pub weights: [f32; 3],
    pub history: VecDeque<PerformanceSample>,
}

impl AdaptiveState {
    fn initial(config: &AdaptiveConfig) -> Self {
        let mut state = Self {
            similarity_threshold: config.initial_similarity_threshold,
            reid_threshold: config.initial_reid_threshold,
            weights: config.initial_weights,
            history: VecDeque::new(),
        };
        state.sanitize();
        state
    }

    pub fn weight(&self, modality: Modality) -> f32 {
        self.weights[modality.index()]
    }

    /// Pull thresholds into range and weights back onto the simplex
    fn sanitize(&mut self) {
        let (lo, hi) = SIMILARITY_THRESHOLD_RANGE;
        self.similarity_threshold = clamp_or(self.similarity_threshold, lo, hi);
        let (lo, hi) = REID_THRESHOLD_RANGE;
        self.reid_threshold = clamp_or(self.reid_threshold, lo, hi);
        let sum: f32 = self.weights.iter().sum();
        let on_simplex =
            self.weights.iter().all(|w| w.is_finite() && *w >= 0.0) && (sum - 1.0).abs() < 1e-4;
        if !on_simplex {
            self.weights = normalize_weights(self.weights).unwrap_or([1.0 / 3.0; 3]);
        }
    }
}

fn clamp_or(value: f32, lo: f32, hi: f32) -> f32 {
    if value.is_finite() {
        value.clamp(lo, hi)
    } else {
        (lo + hi) / 2.0
    }
}

fn normalize_weights(weights: [f32; 3]) -> Option<[f32; 3]> {
    let clipped = weights.map(|w| if w.is_finite() { w.max(0.0) } else { 0.0 });
    let sum: f32 = clipped.iter().sum();
    if sum <= 0.0 {
        return None;
    }
    Some(clipped.map(|w| w / sum))
}

#[derive(Debug, Default)]
struct WriterState {
    pending_write: bool,
}

/// Threshold controller shared by all sessions
///
/// Readers take `snapshot()`; every update builds a new state off-lock and
/// swaps it in, then persists the full snapshot when a path is configured.
#[derive(Debug)]
pub struct AdaptiveThresholdController {
    config: AdaptiveConfig,
    state: RwLock<Arc<AdaptiveState>>,
    writer: Mutex<WriterState>,
    path: Option<PathBuf>,
}

impl AdaptiveThresholdController {
    /// In-memory controller starting from the configured initial values
    pub fn new(config: AdaptiveConfig) -> Self {
        let state = AdaptiveState::initial(&config);
        Self {
            config,
            state: RwLock::new(Arc::new(state)),
            writer: Mutex::new(WriterState::default()),
            path: None,
        }
    }

    /// Controller persisted at `path`, resuming from the saved state if present
    pub fn open(config: AdaptiveConfig, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let state = match persist::read_json::<AdaptiveState>(&path)? {
            Some(mut saved) => {
                saved.sanitize();
                while saved.history.len() > config.history_capacity {
                    saved.history.pop_front();
                }
                saved
            }
            None => AdaptiveState::initial(&config),
        };
        log::info!(
            "Opened adaptive thresholds at {}: similarity={:.3}, reid={:.3}, weights={:?}",
            path.display(),
            state.similarity_threshold,
            state.reid_threshold,
            state.weights
        );
        Ok(Self {
            config,
            state: RwLock::new(Arc::new(state)),
            writer: Mutex::new(WriterState::default()),
            path: Some(path),
        })
    }

    pub fn config(&self) -> &AdaptiveConfig {
        &self.config
    }

    pub fn snapshot(&self) -> Arc<AdaptiveState> {
        Arc::clone(&self.state.read())
    }

    /// Append a performance sample and re-evaluate the thresholds
    ///
    /// Samples with non-finite scores are ignored. Returns the state in
    /// effect after the call.
    pub fn record_performance(&self, sample: PerformanceSample) -> Arc<AdaptiveState> {
        if !(sample.track_quality.is_finite() && sample.match_accuracy.is_finite()) {
            log::warn!("Ignoring performance sample for frame {} with non-finite scores", sample.frame);
            return self.snapshot();
        }

        self.commit(|state, config| {
            state.history.push_back(sample);
            while state.history.len() > config.history_capacity.max(1) {
                state.history.pop_front();
            }
            adjust_thresholds(state, config);
        })
    }

    /// Blend the modality weights toward the normalized per-modality performance
    ///
    /// `performance` is indexed general, jersey, foot. All-zero or
    /// non-finite input leaves the weights unchanged.
    pub fn adapt_feature_weights(&self, performance: [f32; 3]) -> Arc<AdaptiveState> {
        let Some(target) = normalize_weights(performance) else {
            log::warn!("Ignoring modality performance {:?}", performance);
            return self.snapshot();
        };
        self.commit(|state, config| {
            let rate = config.adaptation_rate.clamp(0.0, 1.0);
            let blended: [f32; 3] =
                std::array::from_fn(|i| (1.0 - rate) * state.weights[i] + rate * target[i]);
            if let Some(weights) = normalize_weights(blended) {
                state.weights = weights;
            }
        })
    }

    /// Retry a snapshot write that failed earlier
    pub fn flush(&self) -> Result<()> {
        let mut writer = self.writer.lock();
        if !writer.pending_write {
            return Ok(());
        }
        self.persist(&mut writer, &self.snapshot())
    }

    pub fn has_pending_write(&self) -> bool {
        self.writer.lock().pending_write
    }

    fn commit<F>(&self, update: F) -> Arc<AdaptiveState>
    where
        F: FnOnce(&mut AdaptiveState, &AdaptiveConfig),
    {
        let mut writer = self.writer.lock();
        let mut next = (*self.snapshot()).clone();
        update(&mut next, &self.config);
        let next = Arc::new(next);
        *self.state.write() = Arc::clone(&next);

        if let Err(e) = self.persist(&mut writer, &next) {
            log::warn!("Adaptive state not persisted, will retry on next write: {}", e);
        }
        next
    }

    fn persist(&self, writer: &mut WriterState, state: &AdaptiveState) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        match persist::write_json_atomic(path, state) {
            Ok(()) => {
                writer.pending_write = false;
                Ok(())
            }
            Err(e) => {
                writer.pending_write = true;
                Err(e)
            }
        }
    }
}

fn adjust_thresholds(state: &mut AdaptiveState, config: &AdaptiveConfig) {
    let window = config.evaluation_window.max(1);
    let recent: Vec<&PerformanceSample> = state.history.iter().rev().take(window).collect();
    if recent.is_empty() {
        return;
    }
    let n = recent.len() as f32;
    let avg_fp = recent.iter().map(|s| s.false_positives as f32).sum::<f32>() / n;
    let avg_fn = recent.iter().map(|s| s.false_negatives as f32).sum::<f32>() / n;
    let avg_accuracy = recent.iter().map(|s| s.match_accuracy).sum::<f32>() / n;

    let step = config.adaptation_rate * THRESHOLD_STEP;
    let (lo, hi) = SIMILARITY_THRESHOLD_RANGE;
    if avg_fp > avg_fn {
        state.similarity_threshold = (state.similarity_threshold + step).min(hi);
    } else if avg_fn > avg_fp {
        state.similarity_threshold = (state.similarity_threshold - step).max(lo);
    }

    if avg_accuracy < MIN_MATCH_ACCURACY {
        let (lo, hi) = REID_THRESHOLD_RANGE;
        state.reid_threshold = if avg_fp >= avg_fn {
            (state.reid_threshold + step).min(hi)
        } else {
            (state.reid_threshold - step).max(lo)
        };
    }

    log::debug!(
        "Adaptive thresholds: similarity={:.4}, reid={:.4} (fp={:.2}, fn={:.2}, accuracy={:.2})",
        state.similarity_threshold,
        state.reid_threshold,
        avg_fp,
        avg_fn,
        avg_accuracy
    );
}
