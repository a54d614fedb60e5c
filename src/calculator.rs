//! Calculator state: one policy state bound to one copy of the microdata.
//!
//! The liability calculation itself lives behind [`TaxEngine`]. A
//! [`Calculator`] only tracks which year it is in, applies growth when it
//! moves forward, and hands its working table to the engine. Forking is a
//! cheap clone: the record table is shared until a fork writes to it.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{BrainResult, ExecutionError, ValidationError};
use crate::growth::GrowFactors;
use crate::policy::{PolicyDiff, PolicyState};
use crate::records::Records;
use crate::snapshot::Snapshot;

/// External liability calculator.
///
/// `compute` reads input columns from `table` and writes output columns
/// (`iitax`, `payrolltax`, `combined`, `expanded_income`, ...) back into it.
pub trait TaxEngine: Send + Sync {
    /// Compute liabilities for `year` under `policy`.
    ///
    /// # Errors
    /// A message describing why the policy could not be applied, e.g. a
    /// malformed parameter value.
    fn compute(&self, policy: &PolicyState, year: i32, table: &mut Snapshot) -> Result<(), String>;
}

/// Which side of a paired run a value comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    /// Baseline policy.
    Baseline,
    /// Reform policy.
    Reform,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Baseline => write!(f, "base"),
            Self::Reform => write!(f, "reform"),
        }
    }
}

impl FromStr for Side {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "base" | "baseline" => Ok(Self::Baseline),
            "reform" => Ok(Self::Reform),
            other => Err(ValidationError::InvalidSelector {
                kind: "source".to_string(),
                value: other.to_string(),
            }),
        }
    }
}

/// One policy state advancing over one copy of the records.
#[derive(Clone)]
pub struct Calculator {
    engine: Arc<dyn TaxEngine>,
    policy: PolicyState,
    growth: Arc<GrowFactors>,
    table: Arc<Snapshot>,
    current_year: i32,
    computed: bool,
}

impl fmt::Debug for Calculator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Calculator")
            .field("current_year", &self.current_year)
            .field("policy_layers", &self.policy.depth())
            .field("rows", &self.table.len())
            .field("computed", &self.computed)
            .finish_non_exhaustive()
    }
}

impl Calculator {
    /// Bind `policy` and `growth` to `records`, starting at the data year.
    #[must_use]
    pub fn new(engine: Arc<dyn TaxEngine>, records: &Records, policy: PolicyState, growth: GrowFactors) -> Self {
        Self {
            engine,
            policy,
            growth: Arc::new(growth),
            table: Arc::clone(records.table()),
            current_year: records.data_year(),
            computed: false,
        }
    }

    /// Independent copy that shares data until one side writes.
    #[must_use]
    pub fn fork(&self) -> Self {
        self.clone()
    }

    /// Fork with `diff` applied on top of the current policy.
    #[must_use]
    pub fn layered(&self, diff: PolicyDiff) -> Self {
        let mut fork = self.fork();
        fork.policy.push(diff);
        fork.computed = false;
        fork
    }

    /// Year the calculator is in.
    #[must_use]
    pub const fn current_year(&self) -> i32 {
        self.current_year
    }

    /// Policy in effect.
    #[must_use]
    pub fn policy(&self) -> &PolicyState {
        &self.policy
    }

    /// Working table (inputs plus whatever the engine last wrote).
    #[must_use]
    pub fn table(&self) -> &Snapshot {
        &self.table
    }

    /// Swap in a transformed working table of the same shape.
    pub fn replace_table(&mut self, table: Snapshot) -> Result<(), ValidationError> {
        self.table.ensure_same_shape(&table)?;
        self.table = Arc::new(table);
        self.computed = false;
        Ok(())
    }

    /// Move forward to `year`, growing the data one year at a time.
    ///
    /// # Errors
    /// `YearRegression` if `year` is before the current year.
    pub fn advance_to_year(&mut self, year: i32) -> BrainResult<()> {
        if year < self.current_year {
            return Err(ExecutionError::YearRegression {
                current: self.current_year,
                requested: year,
            }
            .into());
        }
        while self.current_year < year {
            let next = self.current_year + 1;
            let growth = Arc::clone(&self.growth);
            let mut touched = false;
            for (column, factor) in growth.factors_for(next) {
                if !self.table.has_column(column) {
                    continue;
                }
                let values = Arc::make_mut(&mut self.table).column_mut(column)?;
                values.iter_mut().for_each(|v| *v *= factor);
                touched = true;
            }
            if touched {
                debug!(year = next, "applied growth factors");
            }
            self.current_year = next;
            self.computed = false;
        }
        Ok(())
    }

    /// Run the engine for the current year.
    pub fn calc_all(&mut self) -> BrainResult<()> {
        let year = self.current_year;
        let table = Arc::make_mut(&mut self.table);
        self.engine
            .compute(&self.policy, year, table)
            .map_err(|message| ExecutionError::Engine { year, message })?;
        self.computed = true;
        Ok(())
    }

    /// Whether `calc_all` ran since the last change.
    #[must_use]
    pub const fn is_computed(&self) -> bool {
        self.computed
    }

    /// One column of the working table.
    pub fn array(&self, var: &str) -> Result<&[f64], ValidationError> {
        self.table.column(var)
    }

    /// Add `delta` element-wise to `var`.
    pub fn increment_column(&mut self, var: &str, delta: &[f64]) -> Result<(), ValidationError> {
        if delta.len() != self.table.len() {
            return Err(ValidationError::ColumnLength {
                column: var.to_string(),
                expected: self.table.len(),
                actual: delta.len(),
            });
        }
        let values = Arc::make_mut(&mut self.table).column_mut(var)?;
        values.iter_mut().zip(delta).for_each(|(v, d)| *v += d);
        self.computed = false;
        Ok(())
    }

    /// Weighted total of `var` after the last calculation.
    pub fn weighted_total(&self, var: &str) -> Result<f64, ValidationError> {
        self.table.weighted_sum(var)
    }
}
