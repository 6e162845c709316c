//! Trial orchestration
//!
//! Runs the repeated calibration/evaluation loop: per trial, the combined
//! dataset is split at the fixed boundary, the model produces one fresh
//! stochastic ensemble pass over the calibration partition and R independent
//! passes over the test partition, both scale factors are fit on the
//! calibration frame, and interval length/coverage are evaluated on each
//! test repeat before and after scaling. Trial results are aggregated into
//! mean/standard-deviation statistics at the end.
use crate::constants::{
    DEFAULT_ALPHA, DEFAULT_BATCH_SIZE, DEFAULT_ENSEMBLE_SIZE, DEFAULT_NUM_TEST_REPEATS, DEFAULT_NUM_TRIALS,
};
use crate::data::{CalibrationFrame, DimReduction, Sample, UncertaintyChannel};
use crate::errors::RecalibError;
use crate::estimator::{estimate_cp, estimate_gc};
use crate::evaluator::{average_coverage, average_length};
use crate::inference::{CalibrationDataset, EnsembleModel};
use crate::utils::{mean, sample_std, validate_min_usize, validate_unit_interval};
use hashbrown::HashMap;
use log::info;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

/// Configuration for a calibration run. Fixed for the whole run; nothing is
/// re-chosen per trial.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Miscoverage tolerance. Must be 0.1 or 0.05 since the Gaussian
    /// estimator always runs alongside the conformal one.
    pub alpha: f64,
    /// Which predicted variance feeds the interval half-width.
    pub uncertainty_channel: UncertaintyChannel,
    /// Number of trials to aggregate over. At least 2, for the sample
    /// standard deviation to be defined.
    pub num_trials: usize,
    /// Independent ensemble passes over the test partition per trial.
    pub num_test_repeats: usize,
    /// Stochastic forward passes per sample and inference call.
    pub ensemble_size: usize,
    /// Restrict calibration to the first output dimension instead of the
    /// mean over dimensions.
    pub single_dimension_mode: bool,
    /// Samples per inference call.
    pub batch_size: usize,
    /// Seed for the run's rng, which is handed into every inference call.
    pub seed: u64,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        RunnerConfig {
            alpha: DEFAULT_ALPHA,
            uncertainty_channel: UncertaintyChannel::Aleatoric,
            num_trials: DEFAULT_NUM_TRIALS,
            num_test_repeats: DEFAULT_NUM_TEST_REPEATS,
            ensemble_size: DEFAULT_ENSEMBLE_SIZE,
            single_dimension_mode: false,
            batch_size: DEFAULT_BATCH_SIZE,
            seed: 0,
        }
    }
}

impl RunnerConfig {
    /// Set the miscoverage tolerance.
    pub fn set_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    /// Set the uncertainty channel.
    pub fn set_uncertainty_channel(mut self, uncertainty_channel: UncertaintyChannel) -> Self {
        self.uncertainty_channel = uncertainty_channel;
        self
    }

    /// Set the number of trials.
    pub fn set_num_trials(mut self, num_trials: usize) -> Self {
        self.num_trials = num_trials;
        self
    }

    /// Set the number of test repeats per trial.
    pub fn set_num_test_repeats(mut self, num_test_repeats: usize) -> Self {
        self.num_test_repeats = num_test_repeats;
        self
    }

    /// Set the ensemble size.
    pub fn set_ensemble_size(mut self, ensemble_size: usize) -> Self {
        self.ensemble_size = ensemble_size;
        self
    }

    /// Restrict calibration to the first output dimension.
    pub fn set_single_dimension_mode(mut self, single_dimension_mode: bool) -> Self {
        self.single_dimension_mode = single_dimension_mode;
        self
    }

    /// Set the inference batch size.
    pub fn set_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Set the seed on the runner.
    pub fn set_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn validate_parameters(&self) -> Result<(), RecalibError> {
        validate_unit_interval(self.alpha, "alpha")?;
        if self.alpha != 0.1 && self.alpha != 0.05 {
            return Err(RecalibError::UnsupportedAlpha(self.alpha));
        }
        validate_min_usize(self.num_trials, 2, "num_trials")?;
        validate_min_usize(self.num_test_repeats, 1, "num_test_repeats")?;
        validate_min_usize(self.ensemble_size, 1, "ensemble_size")?;
        validate_min_usize(self.batch_size, 1, "batch_size")?;
        Ok(())
    }
}

/// Results of one trial. The q values are those of the trial's last test
/// repeat; the calibration frame is fixed within a trial, so every repeat
/// fits an identical q.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TrialResult {
    pub q_cp: f64,
    pub q_gc: f64,
    pub avg_len_before: f64,
    pub avg_len_cp: f64,
    pub avg_len_gc: f64,
    pub avg_cov_before: f64,
    pub avg_cov_cp: f64,
    pub avg_cov_gc: f64,
}

/// Mean and sample standard deviation of one TrialResult field across trials.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FieldStats {
    pub mean: f64,
    pub std: f64,
}

/// Aggregate statistics over all trials of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregateReport {
    pub q_cp: FieldStats,
    pub q_gc: FieldStats,
    pub avg_len_before: FieldStats,
    pub avg_len_cp: FieldStats,
    pub avg_len_gc: FieldStats,
    pub avg_cov_before: FieldStats,
    pub avg_cov_cp: FieldStats,
    pub avg_cov_gc: FieldStats,
    /// Mean fitted scale factors keyed by the alpha they were fit for,
    /// `[q_cp, q_gc]`. The handle a caller uses to scale reported intervals.
    pub scale_factors: HashMap<String, [f64; 2]>,
    /// The per-trial results the statistics were computed from.
    pub trials: Vec<TrialResult>,
}

impl AggregateReport {
    fn from_trials(trials: Vec<TrialResult>, alpha: f64) -> Self {
        let stats = |field: fn(&TrialResult) -> f64| -> FieldStats {
            let values: Vec<f64> = trials.iter().map(field).collect();
            FieldStats {
                mean: mean(&values),
                std: sample_std(&values),
            }
        };
        let q_cp = stats(|t| t.q_cp);
        let q_gc = stats(|t| t.q_gc);
        let mut scale_factors = HashMap::new();
        scale_factors.insert(alpha.to_string(), [q_cp.mean, q_gc.mean]);
        AggregateReport {
            q_cp,
            q_gc,
            avg_len_before: stats(|t| t.avg_len_before),
            avg_len_cp: stats(|t| t.avg_len_cp),
            avg_len_gc: stats(|t| t.avg_len_gc),
            avg_cov_before: stats(|t| t.avg_cov_before),
            avg_cov_cp: stats(|t| t.avg_cov_cp),
            avg_cov_gc: stats(|t| t.avg_cov_gc),
            scale_factors,
            trials,
        }
    }
}

/// Sequential trial orchestrator. Owns the run's rng; the model and dataset
/// are borrowed collaborators, read but never mutated.
pub struct TrialRunner<'a, M, D> {
    cfg: RunnerConfig,
    model: &'a M,
    dataset: &'a D,
    rng: StdRng,
}

impl<'a, M, D> TrialRunner<'a, M, D>
where
    M: EnsembleModel,
    D: CalibrationDataset,
{
    /// Build a runner, checking every run-level precondition up front so no
    /// trial starts on a configuration that cannot finish.
    pub fn new(cfg: RunnerConfig, model: &'a M, dataset: &'a D) -> Result<Self, RecalibError> {
        cfg.validate_parameters()?;
        let total = dataset.combined_length();
        if total == 0 {
            return Err(RecalibError::EmptyDataset);
        }
        let split = dataset.calibration_length();
        if split == 0 {
            return Err(RecalibError::EmptyPartition("calibration"));
        }
        if split >= total {
            return Err(RecalibError::EmptyPartition("test"));
        }
        let rng = StdRng::seed_from_u64(cfg.seed);
        Ok(TrialRunner {
            cfg,
            model,
            dataset,
            rng,
        })
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.cfg
    }

    /// Run all trials and aggregate. Fail-fast: any trial error aborts the
    /// run and no partial report is produced.
    pub fn run(&mut self) -> Result<AggregateReport, RecalibError> {
        let mut trials = Vec::with_capacity(self.cfg.num_trials);
        for trial in 0..self.cfg.num_trials {
            let result = self.run_trial()?;
            info!(
                "trial {}: q_cp {:.4}, q_gc {:.4}, len before/cp/gc {:.4}/{:.4}/{:.4}, cov before/cp/gc {:.4}/{:.4}/{:.4}",
                trial,
                result.q_cp,
                result.q_gc,
                result.avg_len_before,
                result.avg_len_cp,
                result.avg_len_gc,
                result.avg_cov_before,
                result.avg_cov_cp,
                result.avg_cov_gc,
            );
            trials.push(result);
        }
        let report = AggregateReport::from_trials(trials, self.cfg.alpha);
        info!(
            "aggregate over {} trials: q_cp {:.4} ± {:.4}, q_gc {:.4} ± {:.4}, cov cp {:.4} ± {:.4}, cov gc {:.4} ± {:.4}",
            self.cfg.num_trials,
            report.q_cp.mean,
            report.q_cp.std,
            report.q_gc.mean,
            report.q_gc.std,
            report.avg_cov_cp.mean,
            report.avg_cov_cp.std,
            report.avg_cov_gc.mean,
            report.avg_cov_gc.std,
        );
        Ok(report)
    }

    /// Execute a single trial: split, infer, fit, evaluate.
    ///
    /// The split boundary is recomputed from the dataset lengths but does
    /// not move between trials; per-trial randomness comes entirely from
    /// the resampled ensemble outputs.
    pub fn run_trial(&mut self) -> Result<TrialResult, RecalibError> {
        let split = self.dataset.calibration_length();
        let total = self.dataset.combined_length();
        let cal_samples = self.dataset.slice(0, split);
        let test_samples = self.dataset.slice(split, total);

        let reduction = if self.cfg.single_dimension_mode {
            DimReduction::First
        } else {
            DimReduction::Mean
        };

        let cal_frame = self.infer_frame(&cal_samples, reduction)?;
        let mut test_frames = Vec::with_capacity(self.cfg.num_test_repeats);
        for _ in 0..self.cfg.num_test_repeats {
            test_frames.push(self.infer_frame(&test_samples, reduction)?);
        }

        let mut q_cp = 0.0;
        let mut q_gc = 0.0;
        let mut len_before = 0.0;
        let mut len_cp = 0.0;
        let mut len_gc = 0.0;
        let mut cov_before = 0.0;
        let mut cov_cp = 0.0;
        let mut cov_gc = 0.0;

        for frame in &test_frames {
            q_cp = estimate_cp(&cal_frame.target, &cal_frame.mu, &cal_frame.uncertainty, self.cfg.alpha)?;
            q_gc = estimate_gc(&cal_frame.uncertainty, &cal_frame.residual_rmse, self.cfg.alpha)?;

            len_before += average_length(&frame.uncertainty, 1.0);
            len_cp += average_length(&frame.uncertainty, q_cp);
            len_gc += average_length(&frame.uncertainty, q_gc);

            cov_before += average_coverage(&frame.mu, &frame.uncertainty, &frame.target);
            let hw_cp: Vec<f64> = frame.uncertainty.iter().map(|u| q_cp * u).collect();
            cov_cp += average_coverage(&frame.mu, &hw_cp, &frame.target);
            let hw_gc: Vec<f64> = frame.uncertainty.iter().map(|u| q_gc * u).collect();
            cov_gc += average_coverage(&frame.mu, &hw_gc, &frame.target);
        }

        let repeats = test_frames.len() as f64;
        Ok(TrialResult {
            q_cp,
            q_gc,
            avg_len_before: len_before / repeats,
            avg_len_cp: len_cp / repeats,
            avg_len_gc: len_gc / repeats,
            avg_cov_before: cov_before / repeats,
            avg_cov_cp: cov_cp / repeats,
            avg_cov_gc: cov_gc / repeats,
        })
    }

    /// One blocking ensemble pass over a subset, batched, returning the
    /// derived calibration frame.
    fn infer_frame(&mut self, samples: &[Sample], reduction: DimReduction) -> Result<CalibrationFrame, RecalibError> {
        let mut predictions = Vec::with_capacity(samples.len());
        for batch in samples.chunks(self.cfg.batch_size) {
            let inputs: Vec<Vec<f64>> = batch.iter().map(|s| s.input.clone()).collect();
            let batch_preds = self.model.infer(&inputs, self.cfg.ensemble_size, &mut self.rng)?;
            if batch_preds.len() != batch.len() {
                return Err(RecalibError::LengthMismatch(
                    "model output",
                    batch_preds.len(),
                    "batch",
                    batch.len(),
                ));
            }
            predictions.extend(batch_preds);
        }
        let targets: Vec<Vec<f64>> = samples.iter().map(|s| s.target.clone()).collect();
        CalibrationFrame::from_predictions(&predictions, &targets, self.cfg.uncertainty_channel, reduction)
    }
}
