/// 90th percentile of the standard normal distribution, used for alpha = 0.1.
pub const Z_90: f64 = 1.644854;
/// 97.5th percentile of the standard normal distribution, used for alpha = 0.05.
pub const Z_975: f64 = 1.959964;

/// Ensemble member predictions and derived uncertainties are clamped to this range.
pub const CLAMP_MIN: f64 = 0.0;
pub const CLAMP_MAX: f64 = 1.0;

pub const DEFAULT_ALPHA: f64 = 0.1;
pub const DEFAULT_ENSEMBLE_SIZE: usize = 25;
pub const DEFAULT_NUM_TRIALS: usize = 20;
pub const DEFAULT_NUM_TEST_REPEATS: usize = 5;
pub const DEFAULT_BATCH_SIZE: usize = 16;
