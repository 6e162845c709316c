//! Utility functions
//!
//! Small numeric helpers and parameter validation shared across the crate.
use crate::errors::RecalibError;
use rand::rngs::StdRng;
use rand::Rng;

/// Create a string of all available items.
pub fn items_to_strings(items: &[&str]) -> String {
    items.join(", ")
}

/// Arithmetic mean of a slice. Returns NaN for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (n - 1 denominator).
///
/// Undefined for fewer than two values, in which case NaN is returned;
/// callers that aggregate across trials validate the trial count up front.
pub fn sample_std(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return f64::NAN;
    }
    let m = mean(values);
    let ss = values.iter().map(|v| (v - m) * (v - m)).sum::<f64>();
    (ss / (n - 1) as f64).sqrt()
}

// Validation
pub fn validate_unit_interval(value: f64, parameter: &str) -> Result<(), RecalibError> {
    if value.is_nan() || value <= 0.0 || value >= 1.0 {
        Err(RecalibError::InvalidParameter(
            parameter.to_string(),
            "real value strictly between 0 and 1".to_string(),
            value.to_string(),
        ))
    } else {
        Ok(())
    }
}

pub fn validate_min_usize(value: usize, min: usize, parameter: &str) -> Result<(), RecalibError> {
    if value < min {
        Err(RecalibError::InvalidParameter(
            parameter.to_string(),
            format!("integer value of at least {}", min),
            value.to_string(),
        ))
    } else {
        Ok(())
    }
}

/// Draw one standard normal variate via Box-Muller.
pub(crate) fn standard_normal(rng: &mut StdRng) -> f64 {
    let u1 = rng.random::<f64>().max(f64::MIN_POSITIVE);
    let u2 = rng.random::<f64>();
    (-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn test_mean_and_sample_std() {
        let v = vec![2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert!((mean(&v) - 5.0).abs() < 1e-12);
        // Known sample std of the series above.
        assert!((sample_std(&v) - 2.13809).abs() < 1e-5);
        assert!(sample_std(&[1.0]).is_nan());
    }

    #[test]
    fn test_validate_unit_interval() {
        assert!(validate_unit_interval(0.1, "alpha").is_ok());
        assert!(validate_unit_interval(0.0, "alpha").is_err());
        assert!(validate_unit_interval(1.0, "alpha").is_err());
        assert!(validate_unit_interval(f64::NAN, "alpha").is_err());
    }

    #[test]
    fn test_validate_min_usize() {
        assert!(validate_min_usize(2, 2, "num_trials").is_ok());
        assert!(validate_min_usize(1, 2, "num_trials").is_err());
    }

    #[test]
    fn test_standard_normal_moments() {
        let mut rng = StdRng::seed_from_u64(7);
        let draws: Vec<f64> = (0..20_000).map(|_| standard_normal(&mut rng)).collect();
        assert!(mean(&draws).abs() < 0.05);
        assert!((sample_std(&draws) - 1.0).abs() < 0.05);
    }
}
