//! Columnar per-year result tables.
//!
//! A `Snapshot` holds named `f64` columns over N filing-unit rows plus the
//! required sample weight column. The same shape is used for the raw
//! microdata a calculator works on and for the per-year results a run
//! extracts. Once handed to the fuzz or table code a snapshot is only changed
//! through transforms that return a new value.

use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

use crate::error::ValidationError;

/// Sample weight column.
pub const WEIGHT: &str = "s006";
/// Individual income tax liability.
pub const IITAX: &str = "iitax";
/// Payroll tax liability.
pub const PAYROLLTAX: &str = "payrolltax";
/// Individual income tax plus payroll tax.
pub const COMBINED: &str = "combined";
/// Broad income measure used for binning.
pub const EXPANDED_INCOME: &str = "expanded_income";

fn name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid name pattern"))
}

/// Whether `name` is usable as a column or parameter name.
pub(crate) fn is_valid_name(name: &str) -> bool {
    name_pattern().is_match(name)
}

/// Immutable-by-convention columnar table with a weight column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    names: Vec<String>,
    columns: Vec<Vec<f64>>,
    rows: usize,
}

impl Snapshot {
    /// Build a snapshot from `(name, values)` pairs.
    ///
    /// # Errors
    /// - `MissingColumn` if the weight column is absent
    /// - `ColumnLength` if columns disagree on row count
    /// - `InvalidVariables` for duplicate names or negative weights
    pub fn new<I, S>(columns: I) -> Result<Self, ValidationError>
    where
        I: IntoIterator<Item = (S, Vec<f64>)>,
        S: Into<String>,
    {
        let mut names = Vec::new();
        let mut values = Vec::new();
        for (name, column) in columns {
            let name = name.into();
            if !is_valid_name(&name) {
                return Err(ValidationError::InvalidParameterName { name });
            }
            if names.contains(&name) {
                return Err(ValidationError::InvalidVariables {
                    reason: format!("duplicate column '{name}'"),
                });
            }
            names.push(name);
            values.push(column);
        }

        let weight_idx = names
            .iter()
            .position(|n| n == WEIGHT)
            .ok_or_else(|| ValidationError::MissingColumn {
                column: WEIGHT.to_string(),
            })?;
        let rows = values[weight_idx].len();
        for (name, column) in names.iter().zip(&values) {
            if column.len() != rows {
                return Err(ValidationError::ColumnLength {
                    column: name.clone(),
                    expected: rows,
                    actual: column.len(),
                });
            }
        }
        if values[weight_idx].iter().any(|w| *w < 0.0 || w.is_nan()) {
            return Err(ValidationError::InvalidVariables {
                reason: "weights must be non-negative".to_string(),
            });
        }

        Ok(Self {
            names,
            columns: values,
            rows,
        })
    }

    /// Number of filing-unit rows.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.rows
    }

    /// True when there are no rows.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.rows == 0
    }

    /// Column names in order.
    #[must_use]
    pub fn column_names(&self) -> &[String] {
        &self.names
    }

    /// Whether a column exists.
    #[must_use]
    pub fn has_column(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    /// Values of one column.
    pub fn column(&self, name: &str) -> Result<&[f64], ValidationError> {
        self.position(name)
            .map(|i| self.columns[i].as_slice())
            .ok_or_else(|| ValidationError::MissingColumn {
                column: name.to_string(),
            })
    }

    pub(crate) fn column_mut(&mut self, name: &str) -> Result<&mut Vec<f64>, ValidationError> {
        match self.position(name) {
            Some(i) => Ok(&mut self.columns[i]),
            None => Err(ValidationError::MissingColumn {
                column: name.to_string(),
            }),
        }
    }

    /// Sample weights.
    #[must_use]
    pub fn weights(&self) -> &[f64] {
        // The constructor guarantees the weight column exists.
        match self.position(WEIGHT) {
            Some(i) => &self.columns[i],
            None => &[],
        }
    }

    /// Replace a column, or append it if it does not exist yet.
    pub fn set_column(&mut self, name: impl Into<String>, values: Vec<f64>) -> Result<(), ValidationError> {
        let name = name.into();
        if values.len() != self.rows {
            return Err(ValidationError::ColumnLength {
                column: name,
                expected: self.rows,
                actual: values.len(),
            });
        }
        if name == WEIGHT && values.iter().any(|w| *w < 0.0 || w.is_nan()) {
            return Err(ValidationError::InvalidVariables {
                reason: "weights must be non-negative".to_string(),
            });
        }
        match self.position(&name) {
            Some(i) => self.columns[i] = values,
            None => {
                if !is_valid_name(&name) {
                    return Err(ValidationError::InvalidParameterName { name });
                }
                self.names.push(name);
                self.columns.push(values);
            }
        }
        Ok(())
    }

    /// `Σ value_i × weight_i` for one column.
    pub fn weighted_sum(&self, name: &str) -> Result<f64, ValidationError> {
        let values = self.column(name)?;
        Ok(values.iter().zip(self.weights()).map(|(v, w)| v * w).sum())
    }

    /// New snapshot with only `vars`; the weight column is always kept.
    pub fn select(&self, vars: &[String]) -> Result<Self, ValidationError> {
        let mut wanted: Vec<&str> = Vec::with_capacity(vars.len() + 1);
        for var in vars {
            if !wanted.contains(&var.as_str()) {
                wanted.push(var);
            }
        }
        if !wanted.contains(&WEIGHT) {
            wanted.push(WEIGHT);
        }
        let mut columns = Vec::with_capacity(wanted.len());
        for name in wanted {
            columns.push((name.to_string(), self.column(name)?.to_vec()));
        }
        Self::new(columns)
    }

    /// Overwrite every column of `row` with the values `other` holds there.
    ///
    /// Both snapshots must have the same columns and row count.
    pub(crate) fn copy_row_from(&mut self, other: &Self, row: usize) -> Result<(), ValidationError> {
        for (name, column) in self.names.iter().zip(self.columns.iter_mut()) {
            let source = other.column(name)?;
            column[row] = source[row];
        }
        Ok(())
    }

    /// Keep only the rows at `indices`, in the given order.
    #[must_use]
    pub fn take_rows(&self, indices: &[usize]) -> Self {
        let columns = self
            .columns
            .iter()
            .map(|c| indices.iter().map(|&i| c[i]).collect())
            .collect();
        Self {
            names: self.names.clone(),
            columns,
            rows: indices.len(),
        }
    }

    /// Check that `other` has exactly the same column layout and row count.
    pub fn ensure_same_shape(&self, other: &Self) -> Result<(), ValidationError> {
        if self.rows != other.rows {
            return Err(ValidationError::ColumnLength {
                column: WEIGHT.to_string(),
                expected: self.rows,
                actual: other.rows,
            });
        }
        for name in &self.names {
            if !other.has_column(name) {
                return Err(ValidationError::MissingColumn { column: name.clone() });
            }
        }
        for name in &other.names {
            if !self.has_column(name) {
                return Err(ValidationError::MissingColumn { column: name.clone() });
            }
        }
        Ok(())
    }
}
