//! Stacked revenue attribution.
//!
//! Provisions are layered one at a time on top of everything stacked before
//! them. Each provision is credited with the revenue change it adds to the
//! cumulative policy, so the attribution depends on the order provisions
//! are given in whenever they interact.

use tracing::{debug, info};

use crate::calculator::Calculator;
use crate::error::BrainResult;
use crate::policy::StackedReform;
use crate::scheduler::Scheduler;
use crate::snapshot::COMBINED;
use crate::tables::{YearTable, TOTAL_LABEL};
use crate::window::BudgetWindow;

/// Row holding the column-wise sum over provisions.
pub const TOTAL_ROW: &str = TOTAL_LABEL;

/// Column holding each row's sum over the window.
pub const WINDOW_TOTAL_COLUMN: &str = "window total";

/// Raw revenue series behind a stacked table.
#[derive(Debug, Clone, PartialEq)]
pub struct StackedSeries {
    /// Baseline revenue by window year.
    pub baseline: Vec<f64>,
    /// Cumulative revenue after each provision, in stacking order.
    pub cumulative: Vec<(String, Vec<f64>)>,
}

/// Attributes revenue to stacked provisions.
#[derive(Debug)]
pub struct StackedAttributor<'a> {
    scheduler: &'a Scheduler,
    var: &'a str,
}

impl<'a> StackedAttributor<'a> {
    /// Attribute combined tax revenue.
    #[must_use]
    pub const fn new(scheduler: &'a Scheduler) -> Self {
        Self { scheduler, var: COMBINED }
    }

    /// Attribute a different revenue variable.
    #[must_use]
    pub const fn with_variable(mut self, var: &'a str) -> Self {
        self.var = var;
        self
    }

    /// Baseline and cumulative revenue series.
    ///
    /// Provisions are applied strictly in order; within one provision the
    /// window years are computed on independent forks.
    pub fn series(&self, baseline: &Calculator, stack: &StackedReform, window: BudgetWindow) -> BrainResult<StackedSeries> {
        let base = self.scheduler.revenue_series(baseline, window, self.var)?;
        let mut cumulative = Vec::with_capacity(stack.len());
        let mut calc = baseline.fork();
        for (name, diff) in stack.provisions() {
            calc = calc.layered(diff.clone());
            let revenue = self.scheduler.revenue_series(&calc, window, self.var)?;
            debug!(provision = %name, layers = calc.policy().depth(), "stacked provision computed");
            cumulative.push((name.clone(), revenue.into_values().collect()));
        }
        Ok(StackedSeries {
            baseline: base.into_values().collect(),
            cumulative,
        })
    }

    /// Provision × year table of marginal revenue, plus a `Total` row and a
    /// `window total` column. The baseline itself is not a row.
    pub fn run(&self, baseline: &Calculator, stack: &StackedReform, window: BudgetWindow) -> BrainResult<YearTable> {
        info!(provisions = stack.len(), "starting stacked attribution");
        let series = self.series(baseline, stack, window)?;
        let table = attribution_table(window, &series)?;
        info!("stacked attribution finished");
        Ok(table)
    }
}

/// First differences of the cumulative series against the previous layer.
pub fn attribution_table(window: BudgetWindow, series: &StackedSeries) -> BrainResult<YearTable> {
    let mut table = YearTable::new(window.years().collect());
    let mut previous = series.baseline.as_slice();
    for (name, revenue) in &series.cumulative {
        let marginal = revenue.iter().zip(previous).map(|(r, p)| r - p).collect();
        table.push_row(name.clone(), marginal)?;
        previous = revenue;
    }
    Ok(table.with_total_row(TOTAL_ROW).with_total_column(WINDOW_TOTAL_COLUMN))
}
