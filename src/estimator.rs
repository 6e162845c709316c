//! Scale estimators
//!
//! The two calibration families: a split-conformal order statistic of
//! normalized absolute residuals (CP), and a Gaussian chi-scale estimate
//! times a fixed normal critical value (GC). Both produce one non-negative
//! multiplicative scale factor `q` for the interval half-width.
use crate::constants::{Z_90, Z_975};
use crate::data::CalibrationFrame;
use crate::errors::RecalibError;
use crate::utils::validate_unit_interval;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Which scale estimator to fit. Selected once per run, not per call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScaleMethod {
    Conformal,
    Gaussian,
}

impl ScaleMethod {
    /// Fit a scale factor on a calibration frame.
    pub fn fit(&self, frame: &CalibrationFrame, alpha: f64) -> Result<f64, RecalibError> {
        match self {
            ScaleMethod::Conformal => estimate_cp(&frame.target, &frame.mu, &frame.uncertainty, alpha),
            ScaleMethod::Gaussian => estimate_gc(&frame.uncertainty, &frame.residual_rmse, alpha),
        }
    }
}

/// Split-conformal scale factor.
///
/// Computes normalized absolute residuals `|target - mu| / uncertainty`,
/// sorts them ascending, and returns the order statistic at 0-based index
/// `ceil(N * (1 - alpha))`. That index equals N whenever `N * (1 - alpha)`
/// has no fractional part to absorb, so it is clamped to `N - 1` and the
/// estimate degrades to the sample maximum instead of reading out of bounds.
///
/// Any record with non-positive uncertainty is a `DegenerateUncertainty`
/// error, never a silent non-finite score.
pub fn estimate_cp(targets: &[f64], mu: &[f64], uncertainty: &[f64], alpha: f64) -> Result<f64, RecalibError> {
    validate_unit_interval(alpha, "alpha")?;
    let n = targets.len();
    if n == 0 {
        return Err(RecalibError::EmptyPartition("calibration"));
    }
    if mu.len() != n {
        return Err(RecalibError::LengthMismatch("targets", n, "mu", mu.len()));
    }
    if uncertainty.len() != n {
        return Err(RecalibError::LengthMismatch("targets", n, "uncertainty", uncertainty.len()));
    }

    let mut scores = Vec::with_capacity(n);
    for i in 0..n {
        let u = uncertainty[i];
        if u <= 0.0 || !u.is_finite() {
            return Err(RecalibError::DegenerateUncertainty { index: i });
        }
        scores.push((targets[i] - mu[i]).abs() / u);
    }
    scores.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));

    let q_index = (n as f64 * (1.0 - alpha)).ceil() as usize;
    Ok(scores[q_index.min(n - 1)])
}

/// Gaussian chi-scale factor.
///
/// Treats the normalized residual as Gaussian with unknown scale
/// `S = sqrt(mean((residual_rmse / uncertainty)^2))` and returns
/// `z(alpha) * S`. Only alpha 0.1 and 0.05 carry critical values; anything
/// else is an `UnsupportedAlpha` error rather than a silent default.
pub fn estimate_gc(uncertainty: &[f64], residual_rmse: &[f64], alpha: f64) -> Result<f64, RecalibError> {
    let z = if alpha == 0.1 {
        Z_90
    } else if alpha == 0.05 {
        Z_975
    } else {
        return Err(RecalibError::UnsupportedAlpha(alpha));
    };
    let n = uncertainty.len();
    if n == 0 {
        return Err(RecalibError::EmptyPartition("calibration"));
    }
    if residual_rmse.len() != n {
        return Err(RecalibError::LengthMismatch(
            "uncertainty",
            n,
            "residual_rmse",
            residual_rmse.len(),
        ));
    }

    let mut acc = 0.0;
    for i in 0..n {
        let u = uncertainty[i];
        if u <= 0.0 || !u.is_finite() {
            return Err(RecalibError::DegenerateUncertainty { index: i });
        }
        let r = residual_rmse[i] / u;
        acc += r * r;
    }
    let s = (acc / n as f64).sqrt();
    Ok(z * s)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::{mean, standard_normal};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_cp_order_statistic_index() {
        // With unit uncertainty and zero mu the scores are the targets
        // themselves. N = 10, alpha = 0.1 selects index ceil(9.0) = 9,
        // the largest sorted element.
        let targets = vec![3.0, 1.0, 7.0, 5.0, 9.0, 2.0, 8.0, 4.0, 10.0, 6.0];
        let mu = vec![0.0; 10];
        let uncert = vec![1.0; 10];
        let q = estimate_cp(&targets, &mu, &uncert, 0.1).unwrap();
        assert_eq!(q, 10.0);

        // alpha = 0.5 selects index ceil(5.0) = 5, the 6th smallest.
        let q = estimate_cp(&targets, &mu, &uncert, 0.5).unwrap();
        assert_eq!(q, 6.0);
    }

    #[test]
    fn test_cp_index_clamped_at_boundary() {
        // N = 10, alpha = 0.05: ceil(9.5) = 10 would read past the end.
        let targets: Vec<f64> = (1..=10).map(f64::from).collect();
        let mu = vec![0.0; 10];
        let uncert = vec![1.0; 10];
        let q = estimate_cp(&targets, &mu, &uncert, 0.05).unwrap();
        assert_eq!(q, 10.0);
    }

    #[test]
    fn test_cp_normalizes_by_uncertainty() {
        let targets = vec![1.0, 2.0];
        let mu = vec![0.0, 0.0];
        let uncert = vec![0.5, 4.0];
        // Scores are [2.0, 0.5]; alpha = 0.5 selects index ceil(1.0) = 1.
        let q = estimate_cp(&targets, &mu, &uncert, 0.5).unwrap();
        assert_eq!(q, 2.0);
    }

    #[test]
    fn test_cp_rejects_degenerate_uncertainty() {
        let err = estimate_cp(&[1.0, 2.0], &[0.0, 0.0], &[1.0, 0.0], 0.1);
        assert!(matches!(err, Err(RecalibError::DegenerateUncertainty { index: 1 })));
    }

    #[test]
    fn test_cp_rejects_bad_alpha() {
        let err = estimate_cp(&[1.0], &[0.0], &[1.0], 1.0);
        assert!(matches!(err, Err(RecalibError::InvalidParameter(..))));
    }

    #[test]
    fn test_gc_scale_constants() {
        let uncert = vec![0.5; 8];
        let rmse = vec![0.25; 8];
        // S = sqrt(mean((0.25 / 0.5)^2)) = 0.5.
        let q = estimate_gc(&uncert, &rmse, 0.1).unwrap();
        assert!((q - 1.644854 * 0.5).abs() < 1e-5);
        let q = estimate_gc(&uncert, &rmse, 0.05).unwrap();
        assert!((q - 1.959964 * 0.5).abs() < 1e-5);
    }

    #[test]
    fn test_gc_rejects_unsupported_alpha() {
        let err = estimate_gc(&[0.5], &[0.25], 0.2);
        assert!(matches!(err, Err(RecalibError::UnsupportedAlpha(a)) if a == 0.2));
    }

    #[test]
    fn test_estimators_are_idempotent() {
        let targets = vec![0.3, 0.9, 0.1, 0.7];
        let mu = vec![0.2, 0.8, 0.15, 0.75];
        let uncert = vec![0.1, 0.2, 0.05, 0.3];
        let rmse = vec![0.1, 0.1, 0.05, 0.05];
        let a = estimate_cp(&targets, &mu, &uncert, 0.1).unwrap();
        let b = estimate_cp(&targets, &mu, &uncert, 0.1).unwrap();
        assert_eq!(a.to_bits(), b.to_bits());
        let a = estimate_gc(&uncert, &rmse, 0.05).unwrap();
        let b = estimate_gc(&uncert, &rmse, 0.05).unwrap();
        assert_eq!(a.to_bits(), b.to_bits());
    }

    #[test]
    fn test_scale_method_dispatch() {
        let frame = CalibrationFrame {
            target: vec![0.5, 0.6],
            mu: vec![0.4, 0.7],
            uncertainty: vec![0.2, 0.2],
            residual_rmse: vec![0.1, 0.1],
        };
        let q_cp = ScaleMethod::Conformal.fit(&frame, 0.1).unwrap();
        assert_eq!(q_cp, estimate_cp(&frame.target, &frame.mu, &frame.uncertainty, 0.1).unwrap());
        let q_gc = ScaleMethod::Gaussian.fit(&frame, 0.1).unwrap();
        assert_eq!(q_gc, estimate_gc(&frame.uncertainty, &frame.residual_rmse, 0.1).unwrap());
    }

    #[test]
    fn test_cp_statistical_coverage() {
        // Calibration and test residuals drawn i.i.d. standard normal with
        // unit uncertainty: the conformal scale should deliver close to
        // 1 - alpha marginal coverage averaged over repeated splits.
        let mut rng = StdRng::seed_from_u64(17);
        let alpha = 0.1;
        let n = 100;
        let mut coverages = Vec::with_capacity(200);
        for _ in 0..200 {
            let cal: Vec<f64> = (0..n).map(|_| standard_normal(&mut rng)).collect();
            let mu = vec![0.0; n];
            let uncert = vec![1.0; n];
            let q = estimate_cp(&cal, &mu, &uncert, alpha).unwrap();
            let covered = (0..n).filter(|_| standard_normal(&mut rng).abs() <= q).count();
            coverages.push(covered as f64 / n as f64);
        }
        let avg = mean(&coverages);
        assert!((avg - 0.9).abs() < 0.03, "average coverage {} too far from 0.9", avg);
    }
}
