//! Constant-velocity Kalman smoother for one track's center

use super::SmoothOutcome;
use crate::config::KalmanSmootherConfig;
use nalgebra::{Matrix2, Matrix2x4, Matrix4, Point2, Vector2, Vector4};

/// Kalman filter over state `[x, y, vx, vy]` observing `[x, y]`
///
/// Measurement noise is `R * (2 - confidence)`: a low-confidence detection
/// moves the estimate less than a confident one.
#[derive(Debug, Clone)]
pub struct KalmanSmoother {
    config: KalmanSmootherConfig,
    state: Vector4<f32>,
    covariance: Matrix4<f32>,
    process_noise: Matrix4<f32>,
    initialized: bool,
}

impl KalmanSmoother {
    pub fn new(config: KalmanSmootherConfig) -> Self {
        let process_noise = Matrix4::from_diagonal(&Vector4::new(
            config.process_noise_pos,
            config.process_noise_pos,
            config.process_noise_vel,
            config.process_noise_vel,
        ));
        let covariance = Matrix4::identity() * config.initial_covariance;

        Self {
            config,
            state: Vector4::zeros(),
            covariance,
            process_noise,
            initialized: false,
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Advance the state `dt` frames: x' = x + vx * dt, y' = y + vy * dt
    pub fn predict(&mut self, dt: f32) {
        if !self.initialized {
            return;
        }
        let mut f = Matrix4::identity();
        f[(0, 2)] = dt;
        f[(1, 3)] = dt;

        self.state = f * self.state;
        self.covariance = f * self.covariance * f.transpose() + self.process_noise;
    }

    /// Absorb a measured center with its detection confidence
    ///
    /// The first call seeds the state with zero velocity. A singular
    /// innovation covariance leaves the state untouched.
    pub fn update(&mut self, measurement: Point2<f32>, confidence: f32) -> SmoothOutcome {
        if !self.initialized {
            self.state = Vector4::new(measurement.x, measurement.y, 0.0, 0.0);
            self.covariance = Matrix4::identity() * self.config.initial_covariance;
            self.initialized = true;
            return SmoothOutcome::Filtered(measurement);
        }

        let h = Matrix2x4::new(
            1.0, 0.0, 0.0, 0.0, // x
            0.0, 1.0, 0.0, 0.0, // y
        );
        let confidence = if confidence.is_finite() {
            confidence.clamp(0.0, 1.0)
        } else {
            0.0
        };
        let r = Matrix2::identity() * (self.config.measurement_noise * (2.0 - confidence));

        // Innovation and its covariance: S = H * P * H^T + R
        let innovation = Vector2::new(measurement.x, measurement.y) - h * self.state;
        let innovation_covariance = h * self.covariance * h.transpose() + r;

        let Some(s_inv) = innovation_covariance.try_inverse() else {
            log::warn!("Kalman innovation covariance is singular, keeping last state");
            return SmoothOutcome::Fallback(self.position());
        };

        // K = P * H^T * S^-1
        let kalman_gain = self.covariance * h.transpose() * s_inv;
        let state = self.state + kalman_gain * innovation;
        let covariance = (Matrix4::identity() - kalman_gain * h) * self.covariance;

        if state.iter().chain(covariance.iter()).any(|v| !v.is_finite()) {
            log::warn!("Kalman update produced non-finite state, keeping last state");
            return SmoothOutcome::Fallback(self.position());
        }

        self.state = state;
        self.covariance = covariance;
        SmoothOutcome::Filtered(self.position())
    }

    pub fn position(&self) -> Point2<f32> {
        Point2::new(self.state[0], self.state[1])
    }

    pub fn velocity(&self) -> Vector2<f32> {
        Vector2::new(self.state[2], self.state[3])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn measurements() -> Vec<Point2<f32>> {
        (0..12)
            .map(|i| {
                let jitter = if i % 2 == 0 { 3.0 } else { -3.0 };
                Point2::new(10.0 * i as f32 + jitter, 5.0 * i as f32 - jitter)
            })
            .collect()
    }

    #[test]
    fn test_first_update_bootstraps() {
        let mut kf = KalmanSmoother::new(KalmanSmootherConfig::default());
        let out = kf.update(Point2::new(4.0, 2.0), 0.5);
        assert_eq!(out, SmoothOutcome::Filtered(Point2::new(4.0, 2.0)));
        assert_eq!(kf.velocity(), Vector2::zeros());
        assert!(kf.is_initialized());
    }

    #[test]
    fn test_predict_moves_with_velocity() {
        let mut kf = KalmanSmoother::new(KalmanSmootherConfig::default());
        kf.update(Point2::new(0.0, 0.0), 1.0);
        kf.state[2] = 2.0;
        kf.state[3] = -1.0;
        kf.predict(3.0);
        assert_abs_diff_eq!(kf.position().x, 6.0, epsilon = 1e-5);
        assert_abs_diff_eq!(kf.position().y, -3.0, epsilon = 1e-5);
    }

    #[test]
    fn test_low_confidence_moves_less() {
        let mut confident = KalmanSmoother::new(KalmanSmootherConfig::default());
        let mut doubtful = KalmanSmoother::new(KalmanSmootherConfig::default());

        for (step, z) in measurements().into_iter().enumerate() {
            confident.predict(1.0);
            doubtful.predict(1.0);
            let prior_c = confident.position();
            let prior_d = doubtful.position();

            let post_c = confident.update(z, 1.0).position();
            let post_d = doubtful.update(z, 0.1).position();
            if step == 0 {
                continue;
            }

            // fraction of the innovation absorbed along each axis
            let gain_c = (post_c.x - prior_c.x) / (z.x - prior_c.x);
            let gain_d = (post_d.x - prior_d.x) / (z.x - prior_d.x);
            assert!(gain_d < gain_c, "step {}: {} >= {}", step, gain_d, gain_c);
            assert!(gain_d > 0.0 && gain_c < 1.0);
        }
    }

    #[test]
    fn test_tracks_constant_velocity() {
        let mut kf = KalmanSmoother::new(KalmanSmootherConfig::default());
        for i in 0..30 {
            kf.predict(1.0);
            kf.update(Point2::new(4.0 * i as f32, 100.0), 1.0);
        }
        assert_abs_diff_eq!(kf.velocity().x, 4.0, epsilon = 0.5);
        assert_abs_diff_eq!(kf.position().x, 116.0, epsilon = 2.0);
    }

    #[test]
    fn test_singular_covariance_falls_back() {
        let config = KalmanSmootherConfig {
            process_noise_pos: 0.0,
            process_noise_vel: 0.0,
            measurement_noise: 0.0,
            initial_covariance: 0.0,
        };
        let mut kf = KalmanSmoother::new(config);
        kf.update(Point2::new(1.0, 1.0), 1.0);
        kf.predict(1.0);
        let out = kf.update(Point2::new(50.0, 50.0), 1.0);
        assert!(out.is_fallback());
        assert_eq!(out.position(), Point2::new(1.0, 1.0));
    }
}
