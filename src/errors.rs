//! Errors
//!
//! Custom error types used throughout the `recalib` crate.
use thiserror::Error;

/// Errors that can occur while fitting or evaluating interval scale factors.
#[derive(Debug, Error)]
pub enum RecalibError {
    /// The combined dataset has no samples.
    #[error("The combined dataset is empty.")]
    EmptyDataset,
    /// The split boundary left one side of the partition without samples.
    #[error("The {0} partition is empty, the split boundary must leave samples on both sides.")]
    EmptyPartition(&'static str),
    /// First value is the name of the parameter, second is expected, third is what was passed.
    #[error("Invalid parameter value passed for {0}, expected {1} but {2} provided.")]
    InvalidParameter(String, String, String),
    /// The Gaussian scale estimator only carries critical values for alpha 0.1 and 0.05.
    #[error("Alpha value {0} is not supported by the Gaussian scale estimator, expected 0.1 or 0.05.")]
    UnsupportedAlpha(f64),
    /// A record with non-positive uncertainty makes the normalized residual undefined.
    #[error("Record {index} has non-positive uncertainty, the normalized residual is undefined.")]
    DegenerateUncertainty { index: usize },
    /// Two columns that must be the same length are not.
    #[error("Length mismatch between {0} ({1}) and {2} ({3}).")]
    LengthMismatch(&'static str, usize, &'static str, usize),
}
