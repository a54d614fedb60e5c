//! Budget window: the inclusive range of years a run covers.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// First year the calculation engine has policy parameters for.
pub const FIRST_BUDGET_YEAR: i32 = 2013;

/// Last year the calculation engine projects to.
pub const LAST_BUDGET_YEAR: i32 = 2034;

/// Years the engine supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupportedYears {
    /// First supported year.
    pub first: i32,
    /// Last supported year.
    pub last: i32,
}

impl Default for SupportedYears {
    fn default() -> Self {
        Self {
            first: FIRST_BUDGET_YEAR,
            last: LAST_BUDGET_YEAR,
        }
    }
}

impl SupportedYears {
    /// Validate the range itself.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.first > self.last {
            return Err(ValidationError::InvalidYearRange {
                start_year: self.first,
                end_year: self.last,
            });
        }
        Ok(())
    }

    /// Returns an error when `year` is outside the range.
    pub fn check(&self, year: i32) -> Result<(), ValidationError> {
        if year < self.first || year > self.last {
            return Err(ValidationError::YearOutOfRange {
                year,
                first: self.first,
                last: self.last,
            });
        }
        Ok(())
    }
}

/// Inclusive `[start_year, end_year]` range. Immutable once built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BudgetWindow {
    start_year: i32,
    end_year: i32,
}

impl BudgetWindow {
    /// Build a window, checking ordering and the supported range.
    pub fn new(start_year: i32, end_year: i32, supported: SupportedYears) -> Result<Self, ValidationError> {
        if start_year > end_year {
            return Err(ValidationError::InvalidYearRange { start_year, end_year });
        }
        supported.check(start_year)?;
        supported.check(end_year)?;
        Ok(Self { start_year, end_year })
    }

    /// First year of the window.
    #[must_use]
    pub const fn start_year(&self) -> i32 {
        self.start_year
    }

    /// Last year of the window.
    #[must_use]
    pub const fn end_year(&self) -> i32 {
        self.end_year
    }

    /// Number of years covered.
    #[must_use]
    pub fn len(&self) -> usize {
        usize::try_from(self.end_year - self.start_year + 1).unwrap_or(0)
    }

    /// Always false; a valid window covers at least one year.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Years in ascending order.
    pub fn years(&self) -> impl Iterator<Item = i32> {
        self.start_year..=self.end_year
    }

    /// Whether `year` is inside the window.
    #[must_use]
    pub fn contains(&self, year: i32) -> bool {
        (self.start_year..=self.end_year).contains(&year)
    }

    /// Zero-based offset of `year` from the start of the window.
    pub fn index_of(&self, year: i32) -> Result<usize, ValidationError> {
        if !self.contains(year) {
            return Err(ValidationError::UnknownYear { year });
        }
        usize::try_from(year - self.start_year).map_err(|_| ValidationError::UnknownYear { year })
    }
}
