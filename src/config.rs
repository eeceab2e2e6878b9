//! Configuration types for sessions, smoothers and the learning loops

use crate::error::{Result, TrackingError};
use serde::{Deserialize, Serialize};

/// Streaming smoother applied to each track's center during a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SmoothingMethod {
    /// Raw detector boxes are passed through
    None,
    /// Constant-velocity Kalman filter per track
    Kalman,
    /// Confidence-weighted exponential moving average per track
    Ema,
}

impl Default for SmoothingMethod {
    fn default() -> Self {
        Self::Kalman
    }
}

impl std::fmt::Display for SmoothingMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => write!(f, "None"),
            Self::Kalman => write!(f, "Kalman Filter"),
            Self::Ema => write!(f, "Confidence-weighted EMA"),
        }
    }
}

/// Occlusion recovery and duplicate suppression parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContinuityConfig {
    /// Frames per second of the source video
    pub fps: f32,
    /// How long a lost track stays eligible for recovery
    pub recovery_window_seconds: f32,
    /// Maximum distance (pixels) between a new track and a lost track's predicted position
    pub recovery_distance_px: f32,
    /// Minimum size ratio when matching within `recovery_distance_px`
    pub min_size_ratio: f32,
    /// Box-scale-normalized distance accepted for the close-range fallback rule
    pub close_range_distance: f32,
    /// Minimum size ratio for the close-range fallback rule
    pub close_range_size_ratio: f32,
    /// Minimum recovery score for a lost track to win
    pub min_recovery_score: f32,
    /// IoU above which two active tracks are duplicates
    pub duplicate_iou: f32,
    /// Normalized center distance below which two active tracks may be duplicates
    pub duplicate_center_distance: f32,
    /// Area ratio above which close tracks are duplicates
    pub duplicate_area_ratio: f32,
    /// Cap on per-track position history
    pub max_history: usize,
}

impl Default for ContinuityConfig {
    fn default() -> Self {
        Self {
            fps: 25.0,
            recovery_window_seconds: 2.0,
            recovery_distance_px: 150.0,
            min_size_ratio: 0.6,
            close_range_distance: 0.3,
            close_range_size_ratio: 0.4,
            min_recovery_score: 0.3,
            duplicate_iou: 0.9,
            duplicate_center_distance: 0.3,
            duplicate_area_ratio: 0.7,
            max_history: 100,
        }
    }
}

impl ContinuityConfig {
    /// Recovery window converted to frames, at least one frame
    pub fn recovery_window_frames(&self) -> u32 {
        ((self.recovery_window_seconds * self.fps).round() as u32).max(1)
    }
}

/// Noise parameters for the per-track Kalman smoother
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KalmanSmootherConfig {
    /// Process noise on position (pixels^2 per frame)
    pub process_noise_pos: f32,
    /// Process noise on velocity, kept below the position noise
    pub process_noise_vel: f32,
    /// Base measurement noise, scaled by `(2 - confidence)`
    pub measurement_noise: f32,
    /// Initial state covariance
    pub initial_covariance: f32,
}

impl Default for KalmanSmootherConfig {
    fn default() -> Self {
        Self {
            process_noise_pos: 1.0,
            process_noise_vel: 0.1,
            measurement_noise: 4.0,
            initial_covariance: 10.0,
        }
    }
}

/// Parameters for the confidence-weighted EMA smoother
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmaSmootherConfig {
    pub base_alpha: f32,
    /// Samples required before smoothing starts
    pub min_history: usize,
    pub max_history: usize,
}

/// Upper bound on samples an EMA smoother keeps per track
pub const EMA_HISTORY_CAP: usize = 10;

impl Default for EmaSmootherConfig {
    fn default() -> Self {
        Self {
            base_alpha: 0.6,
            min_history: 3,
            max_history: EMA_HISTORY_CAP,
        }
    }
}

/// Offline gap interpolation + Gaussian process smoothing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GsiConfig {
    /// Gaps shorter than this many frames are interpolated
    pub interval: i64,
    /// Length-scale control for the RBF kernel
    pub tau: f64,
    /// Observation noise variance on standardized values
    pub noise: f64,
}

impl Default for GsiConfig {
    fn default() -> Self {
        Self {
            interval: 20,
            tau: 10.0,
            noise: 0.05,
        }
    }
}

/// Threshold and weight adaptation parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AdaptiveConfig {
    pub adaptation_rate: f32,
    pub initial_similarity_threshold: f32,
    pub initial_reid_threshold: f32,
    /// Initial weights for general, jersey and foot modalities
    pub initial_weights: [f32; 3],
    pub history_capacity: usize,
    pub evaluation_window: usize,
}

impl Default for AdaptiveConfig {
    fn default() -> Self {
        Self {
            adaptation_rate: 0.1,
            initial_similarity_threshold: 0.6,
            initial_reid_threshold: 0.6,
            initial_weights: [0.5, 0.3, 0.2],
            history_capacity: 100,
            evaluation_window: 20,
        }
    }
}

/// Everything a `TrackingSession` needs at `open`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub continuity: ContinuityConfig,
    /// Gaps shorter than this are filled by the offline pass; overrides
    /// `gsi.interval` when the session schedules its batch job
    pub max_gap_frames: i64,
    pub smoothing: SmoothingMethod,
    pub kalman: KalmanSmootherConfig,
    pub ema: EmaSmootherConfig,
    /// Offline GSI pass scheduled at close, `None` to skip it
    pub gsi: Option<GsiConfig>,
    /// Run gallery matching for each frame
    pub resolve_identities: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            continuity: ContinuityConfig::default(),
            max_gap_frames: 20,
            smoothing: SmoothingMethod::default(),
            kalman: KalmanSmootherConfig::default(),
            ema: EmaSmootherConfig::default(),
            gsi: Some(GsiConfig::default()),
            resolve_identities: true,
        }
    }
}

impl SessionConfig {
    /// Config with the four `open` parameters set and everything else default
    pub fn new(
        fps: f32,
        recovery_window_seconds: f32,
        recovery_distance_px: f32,
        max_gap_frames: i64,
    ) -> Self {
        let mut config = Self::default();
        config.continuity.fps = fps;
        config.continuity.recovery_window_seconds = recovery_window_seconds;
        config.continuity.recovery_distance_px = recovery_distance_px;
        config.max_gap_frames = max_gap_frames;
        if let Some(gsi) = config.gsi.as_mut() {
            gsi.interval = max_gap_frames;
        }
        config
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let c = &self.continuity;
        if !(c.fps.is_finite() && c.fps > 0.0) {
            return Err(TrackingError::config(format!("fps must be positive, got {}", c.fps)));
        }
        if !(c.recovery_window_seconds.is_finite() && c.recovery_window_seconds >= 0.0) {
            return Err(TrackingError::config("recovery_window_seconds must be non-negative"));
        }
        if !(c.recovery_distance_px.is_finite() && c.recovery_distance_px >= 0.0) {
            return Err(TrackingError::config("recovery_distance_px must be non-negative"));
        }
        for (name, value) in [
            ("min_size_ratio", c.min_size_ratio),
            ("close_range_size_ratio", c.close_range_size_ratio),
            ("duplicate_iou", c.duplicate_iou),
            ("duplicate_area_ratio", c.duplicate_area_ratio),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(TrackingError::config(format!("{} must be in [0, 1], got {}", name, value)));
            }
        }
        if c.max_history == 0 {
            return Err(TrackingError::config("max_history must be at least 1"));
        }
        if self.max_gap_frames < 0 {
            return Err(TrackingError::config("max_gap_frames must be non-negative"));
        }
        if !(0.0..=1.0).contains(&self.ema.base_alpha) {
            return Err(TrackingError::config("ema.base_alpha must be in [0, 1]"));
        }
        if self.ema.max_history == 0 || self.ema.max_history > EMA_HISTORY_CAP {
            return Err(TrackingError::config(format!(
                "ema.max_history must be in [1, {}], got {}",
                EMA_HISTORY_CAP, self.ema.max_history
            )));
        }
        if self.ema.min_history > self.ema.max_history {
            return Err(TrackingError::config(format!(
                "ema.min_history {} exceeds ema.max_history {}",
                self.ema.min_history, self.ema.max_history
            )));
        }
        if let Some(gsi) = &self.gsi {
            if !(gsi.tau.is_finite() && gsi.tau > 0.0) {
                return Err(TrackingError::config("gsi.tau must be positive"));
            }
            if !(gsi.noise.is_finite() && gsi.noise >= 0.0) {
                return Err(TrackingError::config("gsi.noise must be non-negative"));
            }
        }
        Ok(())
    }
}
