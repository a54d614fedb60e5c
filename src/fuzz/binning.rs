//! Row grouping for fuzzing and tables.
//!
//! Bins are always computed from *baseline* income so that the baseline and
//! reform snapshots of a year share bin membership.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Edges of the standard income bins. Bins are half-open `[lo, hi)`; the
/// two edges around zero isolate filing units with exactly zero income.
pub const STANDARD_INCOME_EDGES: [f64; 14] = [
    f64::NEG_INFINITY,
    -1e-9,
    1e-9,
    10_000.0,
    20_000.0,
    30_000.0,
    40_000.0,
    50_000.0,
    75_000.0,
    100_000.0,
    200_000.0,
    500_000.0,
    1_000_000.0,
    f64::INFINITY,
];

/// Number of standard income bins.
pub const NUM_INCOME_BINS: usize = STANDARD_INCOME_EDGES.len() - 1;

/// Number of weighted deciles.
pub const NUM_DECILES: usize = 10;

/// How rows are grouped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Binning {
    /// One bin holding every row.
    Aggregate,
    /// Fixed income ranges.
    IncomeBins,
    /// Population-weighted income deciles.
    WeightedDeciles,
}

impl Binning {
    /// Every binning, in the order summaries are produced.
    pub const ALL: [Self; 3] = [Self::Aggregate, Self::IncomeBins, Self::WeightedDeciles];

    /// Short tag.
    #[must_use]
    pub const fn tag(self) -> &'static str {
        match self {
            Self::Aggregate => "aggr",
            Self::IncomeBins => "xbin",
            Self::WeightedDeciles => "xdec",
        }
    }

    /// Number of bins this binning can produce.
    #[must_use]
    pub const fn bin_count(self) -> usize {
        match self {
            Self::Aggregate => 1,
            Self::IncomeBins => NUM_INCOME_BINS,
            Self::WeightedDeciles => NUM_DECILES,
        }
    }

    /// Bin index of every row.
    #[must_use]
    pub fn assign(self, income: &[f64], weights: &[f64]) -> Vec<usize> {
        match self {
            Self::Aggregate => vec![0; income.len()],
            Self::IncomeBins => income.iter().map(|x| income_bin(*x)).collect(),
            Self::WeightedDeciles => weighted_deciles(income, weights),
        }
    }
}

impl fmt::Display for Binning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for Binning {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|b| b.tag() == s)
            .ok_or_else(|| ValidationError::InvalidSelector {
                kind: "binning".to_string(),
                value: s.to_string(),
            })
    }
}

/// Standard income bin of one value.
#[must_use]
pub fn income_bin(income: f64) -> usize {
    STANDARD_INCOME_EDGES[1..NUM_INCOME_BINS].partition_point(|edge| *edge <= income)
}

/// Weighted decile of every row.
///
/// Rows are ordered by income, ties kept in row order. A run of equal
/// incomes goes to decile `min(9, floor(10 × W_below / W_total))`, where
/// `W_below` is the weight of all rows with strictly lower income, so tied
/// rows never straddle a decile boundary.
#[must_use]
pub fn weighted_deciles(income: &[f64], weights: &[f64]) -> Vec<usize> {
    let mut out = vec![0; income.len()];
    let total: f64 = weights.iter().sum();
    if total <= 0.0 {
        return out;
    }
    let mut order: Vec<usize> = (0..income.len()).collect();
    order.sort_by(|a, b| income[*a].total_cmp(&income[*b]));

    let mut below = 0.0;
    let mut start = 0;
    while start < order.len() {
        let value = income[order[start]];
        let mut end = start;
        let mut run_weight = 0.0;
        while end < order.len() && income[order[end]].total_cmp(&value).is_eq() {
            run_weight += weights[order[end]];
            end += 1;
        }
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let decile = ((10.0 * below / total).floor() as usize).min(NUM_DECILES - 1);
        for &row in &order[start..end] {
            out[row] = decile;
        }
        below += run_weight;
        start = end;
    }
    out
}
