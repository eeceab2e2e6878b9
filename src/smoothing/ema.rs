//! Confidence-weighted exponential moving average for one track's center

use super::SmoothOutcome;
use crate::config::EmaSmootherConfig;
use nalgebra::Point2;
use std::collections::VecDeque;

/// Streaming EMA whose responsiveness scales with detection confidence
///
/// Until `min_history` samples have been seen the raw position is returned
/// unchanged. After that `alpha = base_alpha * (0.5 + 0.5 * confidence)`.
#[derive(Debug, Clone)]
pub struct EmaSmoother {
    config: EmaSmootherConfig,
    history: VecDeque<(Point2<f32>, f32)>,
    smoothed: Option<Point2<f32>>,
}

impl EmaSmoother {
    pub fn new(config: EmaSmootherConfig) -> Self {
        Self {
            history: VecDeque::with_capacity(config.max_history.max(1)),
            config,
            smoothed: None,
        }
    }

    pub fn update(&mut self, position: Point2<f32>, confidence: f32) -> SmoothOutcome {
        if !(position.x.is_finite() && position.y.is_finite()) {
            return match self.smoothed {
                Some(last) => SmoothOutcome::Fallback(last),
                None => SmoothOutcome::Fallback(position),
            };
        }
        let confidence = if confidence.is_finite() {
            confidence.clamp(0.0, 1.0)
        } else {
            0.0
        };

        if self.history.len() >= self.config.max_history.max(1) {
            self.history.pop_front();
        }
        self.history.push_back((position, confidence));

        let output = match self.smoothed {
            Some(previous) if self.history.len() >= self.config.min_history => {
                let alpha = self.config.base_alpha * (0.5 + 0.5 * confidence);
                Point2::from(position.coords * alpha + previous.coords * (1.0 - alpha))
            }
            _ => position,
        };

        self.smoothed = Some(output);
        SmoothOutcome::Filtered(output)
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    pub fn position(&self) -> Option<Point2<f32>> {
        self.smoothed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EMA_HISTORY_CAP;
    use approx::assert_abs_diff_eq;
    use rand::Rng;

    #[test]
    fn test_raw_passthrough_below_min_history() {
        let mut rng = rand::thread_rng();
        for min_history in 1..=EMA_HISTORY_CAP {
            for _ in 0..20 {
                let config = EmaSmootherConfig {
                    base_alpha: rng.gen_range(0.0..=1.0),
                    min_history,
                    max_history: EMA_HISTORY_CAP,
                };
                let mut ema = EmaSmoother::new(config);
                // the first sample has nothing to blend with
                for _ in 0..min_history.saturating_sub(1).max(1) {
                    let raw = Point2::new(rng.gen_range(-2000.0..2000.0), rng.gen_range(-2000.0..2000.0));
                    let out = ema.update(raw, rng.gen_range(0.0..=1.0));
                    assert_eq!(out, SmoothOutcome::Filtered(raw));
                }
            }
        }
    }

    #[test]
    fn test_confidence_weighted_alpha() {
        let config = EmaSmootherConfig {
            base_alpha: 0.5,
            min_history: 2,
            max_history: 10,
        };
        let mut ema = EmaSmoother::new(config);
        ema.update(Point2::new(0.0, 0.0), 1.0);

        // alpha = 0.5 * (0.5 + 0.5 * 1.0) = 0.5
        let out = ema.update(Point2::new(10.0, 20.0), 1.0).position();
        assert_abs_diff_eq!(out.x, 5.0, epsilon = 1e-5);
        assert_abs_diff_eq!(out.y, 10.0, epsilon = 1e-5);

        // alpha = 0.5 * (0.5 + 0.0) = 0.25
        let out = ema.update(Point2::new(25.0, 10.0), 0.0).position();
        assert_abs_diff_eq!(out.x, 0.25 * 25.0 + 0.75 * 5.0, epsilon = 1e-5);
        assert_abs_diff_eq!(out.y, 0.25 * 10.0 + 0.75 * 10.0, epsilon = 1e-5);
    }

    #[test]
    fn test_history_is_bounded() {
        let config = EmaSmootherConfig {
            base_alpha: 0.5,
            min_history: 3,
            max_history: 10,
        };
        let mut ema = EmaSmoother::new(config);
        for i in 0..25 {
            ema.update(Point2::new(i as f32, 0.0), 0.8);
        }
        assert_eq!(ema.len(), 10);
    }

    #[test]
    fn test_non_finite_input_keeps_last_output() {
        let mut ema = EmaSmoother::new(EmaSmootherConfig::default());
        ema.update(Point2::new(3.0, 4.0), 0.9);
        let out = ema.update(Point2::new(f32::NAN, 0.0), 0.9);
        assert_eq!(out, SmoothOutcome::Fallback(Point2::new(3.0, 4.0)));
        assert_eq!(ema.len(), 1);
    }
}
