//! Interval evaluators
//!
//! Summaries of a scaled interval on an evaluation set: mean full interval
//! width and empirical coverage. Both are deterministic and allocation-free.

/// Mean full width of the symmetric interval, `mean(2 * q * uncertainty)`.
pub fn average_length(uncertainty: &[f64], q: f64) -> f64 {
    if uncertainty.is_empty() {
        return f64::NAN;
    }
    uncertainty.iter().map(|u| 2.0 * q * u).sum::<f64>() / uncertainty.len() as f64
}

/// Fraction of records whose target lies inside the symmetric interval
/// `[mu - half_width, mu + half_width]`. Returns a value in [0, 1].
pub fn average_coverage(mu: &[f64], half_width: &[f64], target: &[f64]) -> f64 {
    debug_assert_eq!(mu.len(), half_width.len());
    debug_assert_eq!(mu.len(), target.len());
    if mu.is_empty() {
        return f64::NAN;
    }
    let mut covered = 0.0;
    for ((m, hw), t) in mu.iter().zip(half_width.iter()).zip(target.iter()) {
        if m - hw <= *t && *t <= m + hw {
            covered += 1.0;
        }
    }
    covered / mu.len() as f64
}
