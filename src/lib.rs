// Modules
pub mod constants;
pub mod data;
pub mod errors;
pub mod estimator;
pub mod evaluator;
pub mod inference;
pub mod trial;
pub mod utils;

// Individual classes, and functions
pub use data::{CalibrationFrame, DimReduction, EnsemblePrediction, Sample, UncertaintyChannel};
pub use errors::RecalibError;
pub use estimator::{estimate_cp, estimate_gc, ScaleMethod};
pub use evaluator::{average_coverage, average_length};
pub use inference::{CalibrationDataset, EnsembleModel, GaussianStubModel, InMemoryDataset};
pub use trial::{AggregateReport, FieldStats, RunnerConfig, TrialResult, TrialRunner};
