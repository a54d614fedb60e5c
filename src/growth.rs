//! Year-indexed growth adjustment applied to microdata before calculation.
//!
//! `GrowFactors` hold the multiplicative factor a column is scaled by when a
//! calculator advances into a year. `GrowDiff` holds user changes to the
//! underlying growth rates; applying a diff adds to the factors. Baseline
//! calculators use factors adjusted by the baseline diff only, reform
//! calculators by the baseline diff followed by the response diff.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::snapshot::is_valid_name;

/// Multiplicative growth factors, keyed by column then year.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GrowFactors {
    factors: BTreeMap<String, BTreeMap<i32, f64>>,
}

impl GrowFactors {
    /// Factors that leave every column unchanged.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the factor `column` is multiplied by when entering `year`.
    pub fn set(&mut self, column: impl Into<String>, year: i32, factor: f64) -> Result<(), ValidationError> {
        let column = column.into();
        if !is_valid_name(&column) {
            return Err(ValidationError::InvalidParameterName { name: column });
        }
        if !factor.is_finite() || factor <= 0.0 {
            return Err(ValidationError::InvalidAssumption {
                reason: format!("growth factor for '{column}' in {year} must be positive, got {factor}"),
            });
        }
        self.factors.entry(column).or_default().insert(year, factor);
        Ok(())
    }

    /// Factor for `column` entering `year`; 1.0 when unset.
    #[must_use]
    pub fn factor(&self, column: &str, year: i32) -> f64 {
        self.factors
            .get(column)
            .and_then(|years| years.get(&year))
            .copied()
            .unwrap_or(1.0)
    }

    /// `(column, factor)` pairs that apply when entering `year`.
    pub fn factors_for(&self, year: i32) -> impl Iterator<Item = (&str, f64)> {
        self.factors
            .iter()
            .filter_map(move |(col, years)| years.get(&year).map(|f| (col.as_str(), *f)))
    }
}

/// Additive changes to growth rates, keyed by column then year.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GrowDiff {
    diffs: BTreeMap<String, BTreeMap<i32, f64>>,
}

impl GrowDiff {
    /// Empty diff.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a growth-rate change.
    pub fn set(&mut self, column: impl Into<String>, year: i32, diff: f64) -> Result<(), ValidationError> {
        let column = column.into();
        if !is_valid_name(&column) {
            return Err(ValidationError::InvalidParameterName { name: column });
        }
        if !diff.is_finite() {
            return Err(ValidationError::InvalidAssumption {
                reason: format!("growth diff for '{column}' in {year} is not finite"),
            });
        }
        self.diffs.entry(column).or_default().insert(year, diff);
        Ok(())
    }

    /// True when no changes are recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.diffs.values().all(BTreeMap::is_empty)
    }

    /// Validate names and values after deserialization.
    pub fn validate(&self) -> Result<(), ValidationError> {
        for (column, years) in &self.diffs {
            if !is_valid_name(column) {
                return Err(ValidationError::InvalidParameterName { name: column.clone() });
            }
            if let Some((year, _)) = years.iter().find(|(_, d)| !d.is_finite()) {
                return Err(ValidationError::InvalidAssumption {
                    reason: format!("growth diff for '{column}' in {year} is not finite"),
                });
            }
        }
        Ok(())
    }

    /// Add this diff's rate changes onto `factors`.
    pub fn apply_to(&self, factors: &mut GrowFactors) -> Result<(), ValidationError> {
        for (column, years) in &self.diffs {
            for (year, diff) in years {
                let current = factors.factor(column, *year);
                factors.set(column.clone(), *year, current + diff)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_factor_defaults_to_one() {
        assert!((GrowFactors::new().factor("e00200", 2025) - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn diffs_stack_in_order() {
        let mut factors = GrowFactors::new();
        factors.set("e00200", 2025, 1.02).unwrap();

        let mut baseline = GrowDiff::new();
        baseline.set("e00200", 2025, 0.01).unwrap();
        let mut response = GrowDiff::new();
        response.set("e00200", 2025, 0.005).unwrap();

        baseline.apply_to(&mut factors).unwrap();
        response.apply_to(&mut factors).unwrap();
        assert!((factors.factor("e00200", 2025) - 1.035).abs() < 1e-12);
    }

    #[test]
    fn non_positive_factor_is_rejected() {
        let mut factors = GrowFactors::new();
        assert!(factors.set("e00200", 2025, 0.0).is_err());

        let mut diff = GrowDiff::new();
        diff.set("e00200", 2025, -1.5).unwrap();
        assert!(diff.apply_to(&mut factors).is_err());
    }

    #[test]
    fn grow_diff_parses_string_years() {
        let diff: GrowDiff = serde_json::from_str(r#"{"e00200": {"2026": 0.01}}"#).unwrap();
        diff.validate().unwrap();
        assert!(!diff.is_empty());
    }
}
