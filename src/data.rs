//! Data model
//!
//! Containers for samples, stochastic ensemble predictions, and the derived
//! per-record calibration columns consumed by the scale estimators.
use crate::constants::{CLAMP_MAX, CLAMP_MIN};
use crate::errors::RecalibError;
use crate::utils::items_to_strings;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// One (input, target) pair from the dataset. The target is a real-valued
/// vector of fixed dimension D.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sample {
    pub input: Vec<f64>,
    pub target: Vec<f64>,
}

/// Stochastic ensemble output for one sample: S forward-pass predictions of
/// dimension D, plus one epistemic-variance estimate and one aleatoric
/// log-variance estimate.
#[derive(Debug, Clone)]
pub struct EnsemblePrediction {
    pub members: Vec<Vec<f64>>,
    pub epistemic_var: f64,
    pub aleatoric_logvar: f64,
}

/// Which predicted variance feeds the interval half-width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UncertaintyChannel {
    Aleatoric,
    Epistemic,
    /// Aleatoric plus epistemic.
    Total,
}

impl FromStr for UncertaintyChannel {
    type Err = RecalibError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Aleatoric" => Ok(UncertaintyChannel::Aleatoric),
            "Epistemic" => Ok(UncertaintyChannel::Epistemic),
            "Total" => Ok(UncertaintyChannel::Total),
            _ => Err(RecalibError::InvalidParameter(
                "uncertainty_channel".to_string(),
                items_to_strings(&["Aleatoric", "Epistemic", "Total"]),
                s.to_string(),
            )),
        }
    }
}

/// How a D-dimensional target/prediction is collapsed to one value per
/// record before calibration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DimReduction {
    /// Mean over the D output dimensions.
    Mean,
    /// First output dimension only (single-dimension mode).
    First,
}

impl DimReduction {
    fn reduce(&self, v: &[f64]) -> f64 {
        match self {
            DimReduction::Mean => v.iter().sum::<f64>() / v.len() as f64,
            DimReduction::First => v[0],
        }
    }
}

/// Per-record calibration columns derived from one batch of ensemble
/// predictions. Used both as the calibration set (to fit a scale factor)
/// and as a test set (to evaluate it).
#[derive(Debug, Clone, Default)]
pub struct CalibrationFrame {
    /// Reduced target, one value per record.
    pub target: Vec<f64>,
    /// Reduced ensemble-mean prediction, one value per record.
    pub mu: Vec<f64>,
    /// Derived interval half-width before scaling, always in [0, 1].
    pub uncertainty: Vec<f64>,
    /// Root-mean-square error of the unreduced prediction vs the unreduced target.
    pub residual_rmse: Vec<f64>,
}

impl CalibrationFrame {
    /// Derive calibration columns from raw ensemble predictions.
    ///
    /// Per record: ensemble members are clamped to [0, 1] and averaged into a
    /// D-vector `mu`; the RMSE is taken over the unreduced dimensions; the
    /// selected variance channel is square-rooted and clamped to [0, 1]; and
    /// `mu`/`target` are collapsed to one value per record by `reduction`.
    pub fn from_predictions(
        predictions: &[EnsemblePrediction],
        targets: &[Vec<f64>],
        channel: UncertaintyChannel,
        reduction: DimReduction,
    ) -> Result<Self, RecalibError> {
        if predictions.len() != targets.len() {
            return Err(RecalibError::LengthMismatch(
                "predictions",
                predictions.len(),
                "targets",
                targets.len(),
            ));
        }

        let mut frame = CalibrationFrame {
            target: Vec::with_capacity(targets.len()),
            mu: Vec::with_capacity(targets.len()),
            uncertainty: Vec::with_capacity(targets.len()),
            residual_rmse: Vec::with_capacity(targets.len()),
        };

        for (pred, target) in predictions.iter().zip(targets.iter()) {
            let n_members = pred.members.len();
            if n_members == 0 {
                return Err(RecalibError::InvalidParameter(
                    "ensemble members".to_string(),
                    "at least one forward pass per record".to_string(),
                    "0".to_string(),
                ));
            }
            let dims = target.len();
            if dims == 0 {
                return Err(RecalibError::InvalidParameter(
                    "target dimension".to_string(),
                    "at least 1".to_string(),
                    "0".to_string(),
                ));
            }

            // Mean over ensemble members, each member clamped before averaging.
            let mut mu_vec = vec![0.0; dims];
            for member in &pred.members {
                if member.len() != dims {
                    return Err(RecalibError::LengthMismatch(
                        "ensemble member",
                        member.len(),
                        "target",
                        dims,
                    ));
                }
                for (m, &v) in mu_vec.iter_mut().zip(member.iter()) {
                    *m += v.clamp(CLAMP_MIN, CLAMP_MAX);
                }
            }
            for m in mu_vec.iter_mut() {
                *m /= n_members as f64;
            }

            let rmse = (mu_vec
                .iter()
                .zip(target.iter())
                .map(|(m, t)| (t - m) * (t - m))
                .sum::<f64>()
                / dims as f64)
                .sqrt();

            let variance = match channel {
                UncertaintyChannel::Aleatoric => pred.aleatoric_logvar.exp(),
                UncertaintyChannel::Epistemic => pred.epistemic_var,
                UncertaintyChannel::Total => pred.aleatoric_logvar.exp() + pred.epistemic_var,
            };
            let uncertainty = variance.max(0.0).sqrt().clamp(CLAMP_MIN, CLAMP_MAX);

            frame.mu.push(reduction.reduce(&mu_vec));
            frame.target.push(reduction.reduce(target));
            frame.uncertainty.push(uncertainty);
            frame.residual_rmse.push(rmse);
        }

        Ok(frame)
    }

    pub fn len(&self) -> usize {
        self.target.len()
    }

    pub fn is_empty(&self) -> bool {
        self.target.is_empty()
    }
}
