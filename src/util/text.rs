use std::str::FromStr;

use anyhow::{anyhow, Result};

/// Parses a finite `f64` value from a given string.
///
/// Surrounding whitespace is trimmed first. Thousands separators, `NaN` and infinities
/// are rejected.
///
/// # Example
///
/// ```
/// assert_eq!(parse_f64(" 1234.5 ").unwrap(), 1234.5);
/// ```
pub fn parse_f64(s: &str) -> Result<f64> {
    let value = f64::from_str(s.trim())
        .map_err(|why| anyhow!("Failed to parse '{}' as f64 because {:?}", s, why))?;

    if !value.is_finite() {
        return Err(anyhow!("'{}' is not a finite number", s));
    }

    Ok(value)
}

/// Parses an `i64` value from a given string.
pub fn parse_i64(s: &str) -> Result<i64> {
    i64::from_str(s.trim())
        .map_err(|why| anyhow!("Failed to parse '{}' as i64 because: {:?}", s, why))
}
