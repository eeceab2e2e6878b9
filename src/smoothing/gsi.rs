//! Offline gap interpolation + Gaussian process smoothing (GSI)
//!
//! Each track is interpolated with the gap filler, then every coordinate
//! column is regressed on the frame number with an RBF-kernel Gaussian
//! process and re-predicted at the same frames. Tracks are independent and
//! are processed in parallel.

use crate::config::GsiConfig;
use crate::error::{Result, TrackingError};
use crate::gap_filler;
use crate::table::{rows_from_array, rows_to_array, TrackRow};
use nalgebra::{DMatrix, DVector};
use ndarray::{Array2, ArrayView2};
use rayon::prelude::*;

/// Columns after `track_id` that are smoothed: x, y, w, h
const SMOOTHED_FIELDS: usize = 4;

/// How one coordinate column of one track came out of the fit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnFit {
    Smoothed,
    /// The fit failed and the pre-smoothing values were kept
    Kept,
}

/// Summary of a GSI pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GsiReport {
    pub tracks: usize,
    pub rows_in: usize,
    pub rows_out: usize,
    pub dropped: usize,
    pub synthesized: usize,
    /// `(track_id, field index)` pairs that fell back to pre-smoothing values
    pub kept_columns: Vec<(i64, usize)>,
}

impl GsiReport {
    /// Outcome for field `field` (0 = x) of track `track_id`
    pub fn column_fit(&self, track_id: i64, field: usize) -> ColumnFit {
        if self.kept_columns.contains(&(track_id, field)) {
            ColumnFit::Kept
        } else {
            ColumnFit::Smoothed
        }
    }
}

/// RBF length-scale for a track of `track_len` rows: `clip(tau * ln(tau^3 / len), 1/tau, tau^2)`
pub fn length_scale(tau: f64, track_len: usize) -> f64 {
    let len = track_len.max(1) as f64;
    let raw = tau * (tau.powi(3) / len).ln();
    raw.clamp(tau.recip(), tau * tau)
}

/// Offline smoother over finalized track tables
#[derive(Debug, Clone)]
pub struct BatchGpSmoother {
    config: GsiConfig,
}

impl BatchGpSmoother {
    pub fn new(config: GsiConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &GsiConfig {
        &self.config
    }

    /// Interpolate and smooth rows; output is sorted by `(frame, track_id)`
    pub fn smooth_rows(&self, rows: &[TrackRow]) -> (Vec<TrackRow>, GsiReport) {
        let (filled, fill_report) = gap_filler::fill_with_report(rows, self.config.interval);

        let tracks = group_by_track(filled);
        let results: Vec<(Vec<TrackRow>, Vec<(i64, usize)>)> = tracks
            .into_par_iter()
            .map(|track| self.smooth_track(track))
            .collect();

        let mut report = GsiReport {
            tracks: results.len(),
            rows_in: rows.len(),
            dropped: fill_report.dropped,
            synthesized: fill_report.synthesized,
            ..Default::default()
        };

        let mut out = Vec::new();
        for (track_rows, kept) in results {
            out.extend(track_rows);
            report.kept_columns.extend(kept);
        }
        out.sort_by_key(|r| (r.frame, r.track_id));
        report.rows_out = out.len();

        log::debug!(
            "GSI: {} tracks, {} rows in, {} rows out ({} interpolated, {} dropped, {} columns kept)",
            report.tracks,
            report.rows_in,
            report.rows_out,
            report.synthesized,
            report.dropped,
            report.kept_columns.len()
        );
        (out, report)
    }

    /// Smooth an `(N, C)` table with columns `frame, track_id, x, y, w, h, ...`
    ///
    /// The column count is preserved. Tables with fewer than six columns
    /// smooth whichever of x, y, w, h are present; with only frame and
    /// track id the pass reduces to gap filling.
    pub fn smooth_table(&self, table: ArrayView2<f64>) -> (Array2<f64>, GsiReport) {
        let ncols = table.ncols();
        if ncols < 2 {
            log::warn!(
                "Track table has {} columns, need at least frame and track_id; returning it unchanged",
                ncols
            );
            return (table.to_owned(), GsiReport::default());
        }

        let (rows, dropped) = rows_from_array(table);
        let (smoothed, mut report) = self.smooth_rows(&rows);
        report.rows_in += dropped;
        report.dropped += dropped;
        (rows_to_array(&smoothed, ncols), report)
    }

    fn smooth_track(&self, mut track: Vec<TrackRow>) -> (Vec<TrackRow>, Vec<(i64, usize)>) {
        let Some(track_id) = track.first().map(|r| r.track_id) else {
            return (track, Vec::new());
        };
        let n_fields = track[0].fields.len().min(SMOOTHED_FIELDS);
        if track.len() < 2 || n_fields == 0 {
            return (track, Vec::new());
        }

        let frames: Vec<f64> = track.iter().map(|r| r.frame as f64).collect();
        let scale = length_scale(self.config.tau, track.len());

        let mut kept = Vec::new();
        let regressor = match GaussianProcess::fit(&frames, scale, self.config.noise) {
            Ok(gp) => Some(gp),
            Err(e) => {
                log::warn!("GSI fit failed for track {}: {}", track_id, e);
                None
            }
        };

        for field in 0..n_fields {
            let values: Vec<f64> = track.iter().map(|r| r.fields[field]).collect();
            let fit = regressor
                .as_ref()
                .ok_or_else(|| TrackingError::fit("no kernel factorization"))
                .and_then(|gp| gp.predict(&values));
            match fit {
                Ok(predicted) => {
                    for (row, value) in track.iter_mut().zip(predicted) {
                        row.fields[field] = value;
                    }
                }
                Err(e) => {
                    if regressor.is_some() {
                        log::warn!("GSI column {} of track {} kept: {}", field, track_id, e);
                    }
                    kept.push((track_id, field));
                }
            }
        }

        (track, kept)
    }
}

/// Pure entry point: interpolate gaps shorter than `interval` and smooth with length-scale control `tau`
pub fn smooth_track_table(table: ArrayView2<f64>, interval: i64, tau: f64) -> Array2<f64> {
    let smoother = BatchGpSmoother::new(GsiConfig {
        interval,
        tau,
        ..GsiConfig::default()
    });
    smoother.smooth_table(table).0
}

/// Rows sorted by `(track_id, frame)` split into one vector per track
fn group_by_track(rows: Vec<TrackRow>) -> Vec<Vec<TrackRow>> {
    let mut tracks: Vec<Vec<TrackRow>> = Vec::new();
    for row in rows {
        match tracks.last_mut() {
            Some(track) if track[0].track_id == row.track_id => track.push(row),
            _ => tracks.push(vec![row]),
        }
    }
    tracks
}

/// GP posterior mean at the training inputs, sharing one kernel factorization across columns
struct GaussianProcess {
    kernel: DMatrix<f64>,
    factor: nalgebra::Cholesky<f64, nalgebra::Dyn>,
}

impl GaussianProcess {
    fn fit(frames: &[f64], length_scale: f64, noise: f64) -> Result<Self> {
        let n = frames.len();
        let denom = 2.0 * length_scale * length_scale;
        let kernel = DMatrix::from_fn(n, n, |i, j| {
            let d = frames[i] - frames[j];
            (-(d * d) / denom).exp()
        });
        // small jitter keeps the factorization stable when noise is zero
        let noisy = &kernel + DMatrix::identity(n, n) * (noise + 1e-10);
        let factor = noisy
            .cholesky()
            .ok_or_else(|| TrackingError::fit("kernel matrix is not positive definite"))?;
        Ok(Self { kernel, factor })
    }

    /// Standardize values, solve, and map the posterior mean back
    fn predict(&self, values: &[f64]) -> Result<Vec<f64>> {
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        let std = var.sqrt();
        if std < 1e-12 {
            return Ok(values.to_vec());
        }

        let y = DVector::from_iterator(values.len(), values.iter().map(|v| (v - mean) / std));
        let alpha = self.factor.solve(&y);
        let predicted = &self.kernel * alpha;

        if predicted.iter().any(|v| !v.is_finite()) {
            return Err(TrackingError::fit("posterior mean is not finite"));
        }
        Ok(predicted.iter().map(|v| v * std + mean).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::{array, Array2};

    fn noisy_track(track_id: f64, frames: impl Iterator<Item = i64>) -> Vec<[f64; 7]> {
        frames
            .map(|f| {
                let jitter = if f % 2 == 0 { 4.0 } else { -4.0 };
                [f as f64, track_id, 3.0 * f as f64 + jitter, 50.0, 20.0, 40.0, 1.0]
            })
            .collect()
    }

    fn to_table(rows: &[[f64; 7]]) -> Array2<f64> {
        Array2::from_shape_vec((rows.len(), 7), rows.iter().flatten().copied().collect()).unwrap()
    }

    #[test]
    fn test_length_scale_clipping() {
        assert_abs_diff_eq!(length_scale(10.0, 50), 10.0 * (1000.0f64 / 50.0).ln(), epsilon = 1e-9);
        // long tracks hit the lower bound
        assert_abs_diff_eq!(length_scale(10.0, 1_000_000), 0.1, epsilon = 1e-12);
        // very short tracks hit the upper bound
        assert_abs_diff_eq!(length_scale(2.0, 1), 4.0, epsilon = 1e-12);
    }

    #[test]
    fn test_preserves_shape_and_fills_gaps() {
        let mut rows = noisy_track(1.0, 0..10);
        rows.extend(noisy_track(1.0, 14..20));
        rows.extend(noisy_track(2.0, 0..8));
        let table = to_table(&rows);

        let out = smooth_track_table(table.view(), 20, 10.0);
        assert_eq!(out.ncols(), 7);
        // frames 10..=13 of track 1 are synthesized
        assert_eq!(out.nrows(), rows.len() + 4);

        // frame-major order
        let frames: Vec<f64> = out.column(0).to_vec();
        assert!(frames.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_smoothing_reduces_jitter() {
        let rows = noisy_track(3.0, 0..40);
        let table = to_table(&rows);
        let out = smooth_track_table(table.view(), 20, 10.0);

        let residual = |t: &Array2<f64>| -> f64 {
            t.outer_iter()
                .map(|r| (r[2] - 3.0 * r[0]).abs())
                .sum::<f64>()
                / t.nrows() as f64
        };
        assert!(residual(&out) < residual(&table));

        // constant columns come back unchanged
        for r in out.outer_iter() {
            assert_abs_diff_eq!(r[3], 50.0, epsilon = 1e-9);
            assert_abs_diff_eq!(r[6], 1.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_degenerate_tables() {
        // frame, id, x, y only
        let table = array![[0.0, 1.0, 0.0, 0.0], [4.0, 1.0, 8.0, 4.0]];
        let out = smooth_track_table(table.view(), 10, 10.0);
        assert_eq!(out.shape(), &[5, 4]);

        // frame and id only: gap filling
        let table = array![[0.0, 1.0], [3.0, 1.0]];
        let out = smooth_track_table(table.view(), 10, 10.0);
        assert_eq!(out.column(0).to_vec(), vec![0.0, 1.0, 2.0, 3.0]);

        let table = Array2::<f64>::zeros((3, 1));
        assert_eq!(smooth_track_table(table.view(), 10, 10.0).shape(), &[3, 1]);
    }

    #[test]
    fn test_malformed_rows_are_dropped() {
        let mut rows = noisy_track(1.0, 0..5);
        rows[2][2] = f64::NAN;
        let smoother = BatchGpSmoother::new(GsiConfig::default());
        let (out, report) = smoother.smooth_table(to_table(&rows).view());
        assert_eq!(report.dropped, 1);
        // the dropped frame is re-synthesized by interpolation
        assert_eq!(out.nrows(), 5);
        assert!(out.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_failed_fit_keeps_values() {
        let rows = noisy_track(1.0, 0..6);
        let smoother = BatchGpSmoother::new(GsiConfig {
            interval: 20,
            tau: 10.0,
            noise: f64::NAN,
        });
        let (out, report) = smoother.smooth_table(to_table(&rows).view());
        assert_eq!(report.kept_columns.len(), SMOOTHED_FIELDS);
        assert_eq!(report.column_fit(1, 0), ColumnFit::Kept);
        assert_eq!(report.column_fit(2, 0), ColumnFit::Smoothed);
        for (r, original) in out.outer_iter().zip(&rows) {
            assert_eq!(r[2], original[2]);
        }
    }
}
