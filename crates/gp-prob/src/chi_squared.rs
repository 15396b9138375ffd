//! Chi-squared tail probabilities for asymptotic p-values.

use gp_core::{Error, Result};
use statrs::distribution::{ChiSquared, ContinuousCDF};

/// Survival function `P(X > x)` for `X ~ χ²(df)`.
///
/// Non-positive statistics map to `1.0` (the χ² support starts at zero);
/// `+inf` maps to `0.0`. A NaN statistic is a computation error.
pub fn sf(x: f64, df: f64) -> Result<f64> {
    if x.is_nan() {
        return Err(Error::Computation("chi-squared statistic is NaN".to_string()));
    }
    let dist = ChiSquared::new(df)
        .map_err(|_| Error::Validation(format!("chi-squared df must be > 0, got {df}")))?;
    if x <= 0.0 {
        return Ok(1.0);
    }
    if x == f64::INFINITY {
        return Ok(0.0);
    }
    Ok((1.0 - dist.cdf(x)).clamp(0.0, 1.0))
}
