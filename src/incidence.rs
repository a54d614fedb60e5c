//! Corporate tax incidence.
//!
//! A change in corporate revenue is pushed onto individual filers by scaling
//! their income sources. Three buckets share the change: labor (wages),
//! shareholders (dividends and capital gains) and all capital (interest,
//! rents and similar). Shares start at their short-run values and move
//! linearly to the long-run values over `transition_years`.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{BrainResult, ExecutionError, ValidationError};
use crate::snapshot::Snapshot;

const SHARE_TOLERANCE: f64 = 1e-9;

/// One share vector over the three buckets.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IncidenceShares {
    /// Share borne by wages.
    pub labor: f64,
    /// Share borne by dividends and capital gains.
    pub shareholder: f64,
    /// Share borne by all capital income.
    pub other_capital: f64,
}

impl IncidenceShares {
    /// Build a share vector.
    #[must_use]
    pub const fn new(labor: f64, shareholder: f64, other_capital: f64) -> Self {
        Self {
            labor,
            shareholder,
            other_capital,
        }
    }

    /// Sum of the three shares.
    #[must_use]
    pub fn sum(&self) -> f64 {
        self.labor + self.shareholder + self.other_capital
    }

    /// Share for one bucket.
    #[must_use]
    pub const fn get(&self, bucket: IncomeBucket) -> f64 {
        match bucket {
            IncomeBucket::Labor => self.labor,
            IncomeBucket::Shareholder => self.shareholder,
            IncomeBucket::OtherCapital => self.other_capital,
        }
    }

    fn validate(&self, vector: &str) -> Result<(), ValidationError> {
        let sum = self.sum();
        let finite = [self.labor, self.shareholder, self.other_capital]
            .iter()
            .all(|s| s.is_finite());
        if !finite || (sum - 1.0).abs() > SHARE_TOLERANCE {
            return Err(ValidationError::InvalidIncidenceShares {
                vector: vector.to_string(),
                sum,
            });
        }
        Ok(())
    }
}

/// Incidence assumptions. Passed by value into every call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IncidenceParameters {
    /// Shares in the first year of the window.
    pub short_run: IncidenceShares,
    /// Shares once the transition is over.
    pub long_run: IncidenceShares,
    /// Years to move from short-run to long-run shares; 0 means immediately.
    pub transition_years: u32,
}

impl Default for IncidenceParameters {
    fn default() -> Self {
        Self {
            short_run: IncidenceShares::new(0.0, 1.0, 0.0),
            long_run: IncidenceShares::new(0.5, 0.4, 0.1),
            transition_years: 10,
        }
    }
}

impl IncidenceParameters {
    /// Validate that each share vector sums to one.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.short_run.validate("short_run")?;
        self.long_run.validate("long_run")
    }

    /// Fraction of the way from short-run to long-run shares in `year`.
    ///
    /// Years before `start_year` stay at the short-run shares.
    #[must_use]
    pub fn transition_fraction(&self, year: i32, start_year: i32) -> f64 {
        if self.transition_years == 0 {
            return 1.0;
        }
        let elapsed = f64::from(year - start_year);
        (elapsed / f64::from(self.transition_years)).clamp(0.0, 1.0)
    }

    /// Interpolated shares for `year`.
    #[must_use]
    pub fn shares_for_year(&self, year: i32, start_year: i32) -> IncidenceShares {
        let f = self.transition_fraction(year, start_year);
        let lerp = |s: f64, l: f64| s + f * (l - s);
        IncidenceShares::new(
            lerp(self.short_run.labor, self.long_run.labor),
            lerp(self.short_run.shareholder, self.long_run.shareholder),
            lerp(self.short_run.other_capital, self.long_run.other_capital),
        )
    }
}

/// Income-source groups that bear a corporate tax change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IncomeBucket {
    /// Wages and salaries.
    Labor,
    /// Dividends and capital gains.
    Shareholder,
    /// Interest, pensions, rents and other capital income.
    OtherCapital,
}

impl IncomeBucket {
    /// All buckets in distribution order.
    pub const ALL: [Self; 3] = [Self::Labor, Self::Shareholder, Self::OtherCapital];

    /// Label used in errors and logs.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Labor => "labor",
            Self::Shareholder => "shareholder",
            Self::OtherCapital => "other_capital",
        }
    }

    /// Columns whose weighted total defines the bucket.
    #[must_use]
    pub const fn income_columns(self) -> &'static [&'static str] {
        match self {
            Self::Labor => &["e00200"],
            Self::Shareholder => &["p22250", "p23250", "e00600"],
            Self::OtherCapital => &["e00300", "e00400", "e01100", "e01200", "e02000"],
        }
    }

    /// Component columns scaled by the same ratio but not counted in the
    /// total (they are already part of an income column).
    #[must_use]
    pub const fn component_columns(self) -> &'static [&'static str] {
        match self {
            Self::Labor => &["e00200p", "e00200s"],
            Self::Shareholder => &[],
            Self::OtherCapital => &["e00650"],
        }
    }
}

/// Redistribute `revenue` across the income sources in `table`.
///
/// For every bucket, each income column is scaled by
/// `share × revenue / weighted_total(bucket)`, so the weighted change in
/// the bucket's income columns equals its target and the total change equals
/// `revenue`.
///
/// # Errors
/// - `NonFiniteRevenue` if `revenue` is NaN or infinite
/// - `MissingColumn` if an income column is absent
/// - `UndistributableBucket` if a bucket has a non-zero target but zero
///   weighted income
pub fn distribute(
    table: &Snapshot,
    revenue: f64,
    year: i32,
    start_year: i32,
    params: &IncidenceParameters,
) -> BrainResult<Snapshot> {
    params.validate()?;
    if !revenue.is_finite() {
        return Err(ValidationError::NonFiniteRevenue { year, value: revenue }.into());
    }
    let shares = params.shares_for_year(year, start_year);
    let mut adjusted = table.clone();
    if revenue == 0.0 {
        warn!(year, "zero corporate revenue change, incidence skipped");
        return Ok(adjusted);
    }

    for bucket in IncomeBucket::ALL {
        let target = shares.get(bucket) * revenue;
        let mut total = 0.0;
        for column in bucket.income_columns() {
            total += table.weighted_sum(column)?;
        }
        if total == 0.0 {
            if target == 0.0 {
                continue;
            }
            return Err(ExecutionError::UndistributableBucket {
                bucket: bucket.name().to_string(),
                target,
            }
            .into());
        }
        let ratio = target / total;
        debug!(year, bucket = bucket.name(), target, ratio, "distributing incidence");

        let scaled = bucket
            .income_columns()
            .iter()
            .chain(bucket.component_columns())
            .filter(|c| table.has_column(c));
        for column in scaled {
            let values = adjusted.column_mut(column)?;
            values.iter_mut().for_each(|v| *v += *v * ratio);
        }
    }
    Ok(adjusted)
}
