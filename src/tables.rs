//! Result tables built from gathered year snapshots.
//!
//! [`YearTable`] is the labelled rows × years table used for weighted totals,
//! multi-variable summaries and stacked attribution. Distribution and
//! difference tables group filing units by income; the grouping itself is
//! shared with the fuzzing code so that fuzzed rows line up with table rows.

use std::fmt;
use std::io::Write;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::calculator::Side;
use crate::error::{BrainResult, ExecutionError, ValidationError};
use crate::fuzz::{income_bin, weighted_deciles, NUM_DECILES, NUM_INCOME_BINS, STANDARD_INCOME_EDGES};
use crate::scheduler::YearResults;
use crate::snapshot::{Snapshot, COMBINED, EXPANDED_INCOME, IITAX, PAYROLLTAX, WEIGHT};

/// Label of the default row-sum column.
pub const TOTAL_LABEL: &str = "Total";

/// Labelled rows over a run of years, optionally with a row-sum column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct YearTable {
    years: Vec<i32>,
    rows: Vec<(String, Vec<f64>)>,
    total_column: Option<String>,
}

impl YearTable {
    /// Empty table over `years`.
    #[must_use]
    pub fn new(years: Vec<i32>) -> Self {
        Self {
            years,
            rows: Vec::new(),
            total_column: None,
        }
    }

    /// Append a row; one value per year.
    pub fn push_row(&mut self, label: impl Into<String>, values: Vec<f64>) -> Result<(), ValidationError> {
        let label = label.into();
        if values.len() != self.years.len() {
            return Err(ValidationError::ColumnLength {
                column: label,
                expected: self.years.len(),
                actual: values.len(),
            });
        }
        self.rows.push((label, values));
        Ok(())
    }

    /// Report a row-sum column under `label`.
    #[must_use]
    pub fn with_total_column(mut self, label: impl Into<String>) -> Self {
        self.total_column = Some(label.into());
        self
    }

    /// Append a row holding the column-wise sum of every existing row.
    #[must_use]
    pub fn with_total_row(mut self, label: impl Into<String>) -> Self {
        let mut sums = vec![0.0; self.years.len()];
        for (_, values) in &self.rows {
            for (sum, v) in sums.iter_mut().zip(values) {
                *sum += v;
            }
        }
        self.rows.push((label.into(), sums));
        self
    }

    /// Column years.
    #[must_use]
    pub fn years(&self) -> &[i32] {
        &self.years
    }

    /// Row labels in order.
    pub fn row_labels(&self) -> impl Iterator<Item = &str> {
        self.rows.iter().map(|(label, _)| label.as_str())
    }

    /// Label of the row-sum column, if reported.
    #[must_use]
    pub fn total_column(&self) -> Option<&str> {
        self.total_column.as_deref()
    }

    /// Values of one row.
    #[must_use]
    pub fn row(&self, label: &str) -> Option<&[f64]> {
        self.rows
            .iter()
            .find(|(l, _)| l == label)
            .map(|(_, values)| values.as_slice())
    }

    /// One cell.
    #[must_use]
    pub fn value(&self, label: &str, year: i32) -> Option<f64> {
        let idx = self.years.iter().position(|y| *y == year)?;
        self.row(label).map(|values| values[idx])
    }

    /// Sum of a row across years.
    #[must_use]
    pub fn row_total(&self, label: &str) -> Option<f64> {
        self.row(label).map(|values| values.iter().sum())
    }

    /// Write as CSV: a header of years, then one line per row.
    pub fn to_csv<W: Write>(&self, writer: W) -> BrainResult<()> {
        let csv_err = |e: csv::Error| ExecutionError::Csv { message: e.to_string() };
        let mut out = csv::Writer::from_writer(writer);
        let mut header = vec![String::new()];
        header.extend(self.years.iter().map(ToString::to_string));
        if let Some(total) = &self.total_column {
            header.push(total.clone());
        }
        out.write_record(&header).map_err(csv_err)?;
        for (label, values) in &self.rows {
            let mut record = vec![label.clone()];
            record.extend(values.iter().map(ToString::to_string));
            if self.total_column.is_some() {
                record.push(values.iter().sum::<f64>().to_string());
            }
            out.write_record(&record).map_err(csv_err)?;
        }
        out.flush().map_err(|e| ExecutionError::Csv { message: e.to_string() })?;
        Ok(())
    }

    /// CSV as a string.
    pub fn to_csv_string(&self) -> BrainResult<String> {
        let mut buf = Vec::new();
        self.to_csv(&mut buf)?;
        String::from_utf8(buf).map_err(|e| ExecutionError::Csv { message: e.to_string() }.into())
    }
}

fn snapshot_for(results: &YearResults, year: i32, side: Side) -> Result<&Snapshot, ValidationError> {
    let (base, reform) = results.get(&year).ok_or(ValidationError::UnknownYear { year })?;
    Ok(match side {
        Side::Baseline => base,
        Side::Reform => reform,
    })
}

/// Weighted totals of `var`: rows `Base`, `Reform`, `Difference` by year.
pub fn weighted_totals(results: &YearResults, var: &str, include_total: bool) -> Result<YearTable, ValidationError> {
    let years: Vec<i32> = results.keys().copied().collect();
    let mut base = Vec::with_capacity(years.len());
    let mut reform = Vec::with_capacity(years.len());
    for year in &years {
        base.push(snapshot_for(results, *year, Side::Baseline)?.weighted_sum(var)?);
        reform.push(snapshot_for(results, *year, Side::Reform)?.weighted_sum(var)?);
    }
    let diff = reform.iter().zip(&base).map(|(r, b)| r - b).collect();

    let mut table = YearTable::new(years);
    table.push_row("Base", base)?;
    table.push_row("Reform", reform)?;
    table.push_row("Difference", diff)?;
    Ok(if include_total { table.with_total_column(TOTAL_LABEL) } else { table })
}

/// Weighted totals of several variables on one side, one row per variable.
pub fn multi_var_table(
    results: &YearResults,
    vars: &[String],
    side: Side,
    include_total: bool,
) -> Result<YearTable, ValidationError> {
    if vars.is_empty() {
        return Err(ValidationError::InvalidVariables {
            reason: "at least one variable is required".to_string(),
        });
    }
    let years: Vec<i32> = results.keys().copied().collect();
    let mut table = YearTable::new(years.clone());
    for var in vars {
        let mut values = Vec::with_capacity(years.len());
        for year in &years {
            values.push(snapshot_for(results, *year, side)?.weighted_sum(var)?);
        }
        table.push_row(var.clone(), values)?;
    }
    Ok(if include_total { table.with_total_column(TOTAL_LABEL) } else { table })
}

/// Edges of the SOI AGI bins, half-open `[lo, hi)`.
pub const SOI_AGI_EDGES: [f64; 20] = [
    f64::NEG_INFINITY,
    1.0,
    5_000.0,
    10_000.0,
    15_000.0,
    20_000.0,
    25_000.0,
    30_000.0,
    40_000.0,
    50_000.0,
    75_000.0,
    100_000.0,
    200_000.0,
    500_000.0,
    1_000_000.0,
    1_500_000.0,
    2_000_000.0,
    5_000_000.0,
    10_000_000.0,
    f64::INFINITY,
];

/// Row grouping for distribution and difference tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Grouping {
    /// Population-weighted deciles.
    WeightedDeciles,
    /// Standard income ranges.
    StandardIncomeBins,
    /// SOI adjusted-gross-income ranges.
    SoiAgiBins,
}

impl Grouping {
    const ALL: [Self; 3] = [Self::WeightedDeciles, Self::StandardIncomeBins, Self::SoiAgiBins];

    /// Selector string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::WeightedDeciles => "weighted_deciles",
            Self::StandardIncomeBins => "standard_income_bins",
            Self::SoiAgiBins => "soi_agi_bins",
        }
    }

    /// Group index of every row and the label of each group.
    #[must_use]
    pub fn assign(self, income: &[f64], weights: &[f64]) -> (Vec<usize>, Vec<String>) {
        match self {
            Self::WeightedDeciles => {
                let labels = (0..NUM_DECILES).map(|d| format!("{}-{}", d * 10, d * 10 + 10)).collect();
                (weighted_deciles(income, weights), labels)
            }
            Self::StandardIncomeBins => {
                let mut labels = vec!["<0".to_string(), "=0".to_string()];
                labels.extend(edge_labels(&STANDARD_INCOME_EDGES[2..]));
                debug_assert_eq!(labels.len(), NUM_INCOME_BINS);
                (income.iter().map(|x| income_bin(*x)).collect(), labels)
            }
            Self::SoiAgiBins => {
                let inner = &SOI_AGI_EDGES[1..SOI_AGI_EDGES.len() - 1];
                let groups = income.iter().map(|x| inner.partition_point(|e| e <= x)).collect();
                (groups, edge_labels(&SOI_AGI_EDGES))
            }
        }
    }
}

fn amount_label(x: f64) -> String {
    if x.abs() >= 1e6 {
        format!("{}M", x / 1e6)
    } else if x.abs() >= 1e3 {
        format!("{}K", x / 1e3)
    } else if x.abs() < 1e-6 {
        "0".to_string()
    } else {
        format!("{x}")
    }
}

fn edge_labels(edges: &[f64]) -> Vec<String> {
    edges
        .windows(2)
        .map(|w| match (w[0].is_finite(), w[1].is_finite()) {
            (false, _) => format!("<{}", amount_label(w[1])),
            (_, false) => format!(">{}", amount_label(w[0])),
            _ => format!("{}-{}", amount_label(w[0]), amount_label(w[1])),
        })
        .collect()
}

impl fmt::Display for Grouping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Grouping {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|g| g.as_str() == s)
            .ok_or_else(|| ValidationError::InvalidSelector {
                kind: "groupby".to_string(),
                value: s.to_string(),
            })
    }
}

/// Tax a difference table compares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaxToDiff {
    /// Individual income tax.
    Iitax,
    /// Payroll tax.
    Payrolltax,
    /// Both.
    Combined,
}

impl TaxToDiff {
    /// Column holding this tax.
    #[must_use]
    pub const fn column(self) -> &'static str {
        match self {
            Self::Iitax => IITAX,
            Self::Payrolltax => PAYROLLTAX,
            Self::Combined => COMBINED,
        }
    }
}

impl FromStr for TaxToDiff {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [Self::Iitax, Self::Payrolltax, Self::Combined]
            .into_iter()
            .find(|t| t.column() == s)
            .ok_or_else(|| ValidationError::InvalidSelector {
                kind: "tax_to_diff".to_string(),
                value: s.to_string(),
            })
    }
}

/// Income used to place rows of a distribution table into groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IncomeMeasure {
    /// The table's own `expanded_income`.
    ExpandedIncome,
    /// The baseline's `expanded_income`, even for reform tables.
    ExpandedIncomeBaseline,
}

impl FromStr for IncomeMeasure {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "expanded_income" => Ok(Self::ExpandedIncome),
            "expanded_income_baseline" => Ok(Self::ExpandedIncomeBaseline),
            other => Err(ValidationError::InvalidSelector {
                kind: "income measure".to_string(),
                value: other.to_string(),
            }),
        }
    }
}

/// Grouped table: one row per income group plus an `ALL` row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupTable {
    /// Column names.
    pub columns: Vec<String>,
    /// `(group label, values)` rows.
    pub rows: Vec<(String, Vec<f64>)>,
}

impl GroupTable {
    /// Values of one row.
    #[must_use]
    pub fn row(&self, label: &str) -> Option<&[f64]> {
        self.rows.iter().find(|(l, _)| l == label).map(|(_, v)| v.as_slice())
    }

    /// One cell.
    #[must_use]
    pub fn value(&self, label: &str, column: &str) -> Option<f64> {
        let idx = self.columns.iter().position(|c| c == column)?;
        self.row(label).map(|values| values[idx])
    }

    /// Every value multiplied by `factor`.
    #[must_use]
    pub fn scaled(self, factor: f64) -> Self {
        self.map_values(|v| v * factor)
    }

    /// Every value rounded to `decimals` places.
    #[must_use]
    pub fn rounded(self, decimals: i32) -> Self {
        let p = 10f64.powi(decimals);
        self.map_values(|v| (v * p).round() / p)
    }

    fn map_values(mut self, f: impl Fn(f64) -> f64) -> Self {
        for (_, values) in &mut self.rows {
            values.iter_mut().for_each(|v| *v = f(*v));
        }
        self
    }
}

/// Builds distribution and difference tables.
///
/// Grouping is always by the *baseline* income passed in, so the baseline
/// and reform tables of a year have the same rows.
pub trait TableBuilder: Send + Sync {
    /// Weighted totals of every column of `data`, by group.
    ///
    /// # Errors
    /// A message describing why the table could not be built.
    fn distribution_table(&self, data: &Snapshot, income: &[f64], grouping: Grouping) -> Result<GroupTable, String>;

    /// Change in `tax` between `base` and `reform`, by group.
    ///
    /// # Errors
    /// A message describing why the table could not be built.
    fn differences_table(
        &self,
        base: &Snapshot,
        reform: &Snapshot,
        grouping: Grouping,
        tax: TaxToDiff,
    ) -> Result<GroupTable, String>;
}

/// Plain weighted-sum tables.
#[derive(Debug, Default, Clone, Copy)]
pub struct WeightedTableBuilder;

impl WeightedTableBuilder {
    const CHANGE_THRESHOLD: f64 = 0.005;
}

fn grouped_sums(groups: &[usize], labels: &[String], columns: &[Vec<f64>]) -> Vec<(String, Vec<f64>)> {
    let mut sums = vec![vec![0.0; columns.len()]; labels.len()];
    for (row, &group) in groups.iter().enumerate() {
        for (col, values) in columns.iter().enumerate() {
            sums[group][col] += values[row];
        }
    }
    let mut all = vec![0.0; columns.len()];
    for group in &sums {
        for (a, v) in all.iter_mut().zip(group) {
            *a += v;
        }
    }
    let mut rows: Vec<(String, Vec<f64>)> = labels.iter().cloned().zip(sums).collect();
    rows.push(("ALL".to_string(), all));
    rows
}

impl TableBuilder for WeightedTableBuilder {
    fn distribution_table(&self, data: &Snapshot, income: &[f64], grouping: Grouping) -> Result<GroupTable, String> {
        if income.len() != data.len() {
            return Err(format!("income has {} rows, data has {}", income.len(), data.len()));
        }
        let weights = data.weights();
        let (groups, labels) = grouping.assign(income, weights);
        let mut columns = vec!["count".to_string()];
        let mut values = vec![weights.to_vec()];
        for name in data.column_names().iter().filter(|n| n.as_str() != WEIGHT) {
            let column = data.column(name).map_err(|e| e.to_string())?;
            columns.push(name.clone());
            values.push(column.iter().zip(weights).map(|(v, w)| v * w).collect());
        }
        Ok(GroupTable {
            columns,
            rows: grouped_sums(&groups, &labels, &values),
        })
    }

    fn differences_table(
        &self,
        base: &Snapshot,
        reform: &Snapshot,
        grouping: Grouping,
        tax: TaxToDiff,
    ) -> Result<GroupTable, String> {
        base.ensure_same_shape(reform).map_err(|e| e.to_string())?;
        let income = base.column(EXPANDED_INCOME).map_err(|e| e.to_string())?;
        let weights = base.weights();
        let before = base.column(tax.column()).map_err(|e| e.to_string())?;
        let after = reform.column(tax.column()).map_err(|e| e.to_string())?;
        let (groups, labels) = grouping.assign(income, weights);

        let diff: Vec<f64> = after.iter().zip(before).map(|(a, b)| a - b).collect();
        let flag = |pred: fn(f64) -> bool| -> Vec<f64> {
            diff.iter().zip(weights).map(|(d, w)| if pred(*d) { *w } else { 0.0 }).collect()
        };
        let values = vec![
            weights.to_vec(),
            flag(|d| d < -Self::CHANGE_THRESHOLD),
            flag(|d| d > Self::CHANGE_THRESHOLD),
            diff.iter().zip(weights).map(|(d, w)| d * w).collect(),
        ];
        let columns = ["count", "tax_cut", "tax_inc", "tot_change"].map(String::from).to_vec();
        Ok(GroupTable {
            columns,
            rows: grouped_sums(&groups, &labels, &values),
        })
    }
}
