//! Trajectory smoothers
//!
//! Two streaming smoothers run inside a session, one instance per track:
//! - KalmanSmoother: constant-velocity filter with confidence-scaled measurement noise
//! - EmaSmoother: confidence-weighted exponential moving average
//!
//! BatchGpSmoother runs offline over a finalized track table (gap
//! interpolation followed by Gaussian process regression per track).

use crate::config::{EmaSmootherConfig, KalmanSmootherConfig, SmoothingMethod};
use nalgebra::Point2;

mod ema;
mod gsi;
mod kalman;

pub use ema::EmaSmoother;
pub use gsi::{length_scale, smooth_track_table, BatchGpSmoother, ColumnFit, GsiReport};
pub use kalman::KalmanSmoother;

/// Result of feeding one measurement to a streaming smoother
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SmoothOutcome {
    /// The measurement was absorbed and this is the new estimate
    Filtered(Point2<f32>),
    /// The update failed numerically; this is the last valid estimate
    Fallback(Point2<f32>),
}

impl SmoothOutcome {
    pub fn position(&self) -> Point2<f32> {
        match self {
            Self::Filtered(p) | Self::Fallback(p) => *p,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::Fallback(_))
    }
}

/// Per-track streaming smoother owned by a session
#[derive(Debug, Clone)]
pub enum TrackSmoother {
    Kalman(KalmanSmoother),
    Ema(EmaSmoother),
}

impl TrackSmoother {
    /// Build the smoother for `method`, `None` when smoothing is disabled
    pub fn for_method(
        method: SmoothingMethod,
        kalman: &KalmanSmootherConfig,
        ema: &EmaSmootherConfig,
    ) -> Option<Self> {
        match method {
            SmoothingMethod::None => None,
            SmoothingMethod::Kalman => Some(Self::Kalman(KalmanSmoother::new(kalman.clone()))),
            SmoothingMethod::Ema => Some(Self::Ema(EmaSmoother::new(ema.clone()))),
        }
    }

    /// Feed the center observed `dt` frames after the previous one
    pub fn observe(&mut self, position: Point2<f32>, confidence: f32, dt: f32) -> SmoothOutcome {
        match self {
            Self::Kalman(kf) => {
                kf.predict(dt);
                kf.update(position, confidence)
            }
            Self::Ema(ema) => ema.update(position, confidence),
        }
    }
}
