//! Fan-out of per-year work over a budget window.
//!
//! Every year becomes an independent task that owns private forks of the
//! calculators it needs. Tasks run on a bounded worker pool (or inline when
//! no workers are configured) and results are gathered back by year. The
//! queue size only limits how far submission runs ahead of the workers. A run
//! is all-or-nothing: the first failing year, in year order, is returned and
//! no other result is kept.

pub mod pool;
pub mod task;

pub use pool::{TaskHandle, WorkerPool};
pub use task::{BehaviorPlan, IncidenceStep, RunMode, YearResult, YearTask};

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, info};

use crate::calculator::Calculator;
use crate::config::SchedulerConfig;
use crate::error::{BrainResult, ValidationError};
use crate::incidence::IncidenceParameters;
use crate::snapshot::{is_valid_name, Snapshot};
use crate::window::BudgetWindow;

use pool::{revenue_for_year, Job};

/// Corporate revenue series and incidence assumptions for a run.
#[derive(Debug, Clone, PartialEq)]
pub struct CorporateIncidence {
    /// Revenue change per window year, in window order.
    pub revenue: Vec<f64>,
    /// Incidence assumptions.
    pub params: IncidenceParameters,
}

/// Everything a paired run needs besides the variables and the window.
#[derive(Debug, Clone)]
pub struct PairedRun {
    /// Baseline calculator at its starting year.
    pub base: Calculator,
    /// Reform calculator at its starting year.
    pub reform: Calculator,
    /// Behavioral model for dynamic runs.
    pub behavior: Option<BehaviorPlan>,
    /// Corporate incidence, if configured.
    pub incidence: Option<CorporateIncidence>,
}

/// Result of a paired run: `(baseline, reform)` per year.
pub type YearResults = BTreeMap<i32, (Snapshot, Snapshot)>;

/// Check a requested variable list at the call boundary.
pub fn validate_variables(vars: &[String]) -> Result<(), ValidationError> {
    if vars.is_empty() {
        return Err(ValidationError::InvalidVariables {
            reason: "at least one variable is required".to_string(),
        });
    }
    if let Some(bad) = vars.iter().find(|v| !is_valid_name(v)) {
        return Err(ValidationError::InvalidVariables {
            reason: format!("'{bad}' is not a variable name"),
        });
    }
    Ok(())
}

/// Runs year tasks.
pub struct Scheduler {
    pool: Option<WorkerPool>,
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("workers", &self.pool.as_ref().map_or(0, WorkerPool::workers))
            .field("queue_capacity", &self.pool.as_ref().map_or(0, WorkerPool::queue_capacity))
            .finish()
    }
}

impl Scheduler {
    /// Start a scheduler; `workers == 0` runs tasks on the calling thread.
    pub fn new(config: SchedulerConfig) -> BrainResult<Self> {
        config.validate()?;
        let pool = if config.workers == 0 {
            None
        } else {
            Some(WorkerPool::start("year", config.workers, config.queue_capacity)?)
        };
        Ok(Self { pool })
    }

    /// Scheduler that never spawns threads.
    #[must_use]
    pub const fn sequential() -> Self {
        Self { pool: None }
    }

    /// Run both policy states over `window` and gather snapshots by year.
    ///
    /// # Errors
    /// - `InvalidVariables` for an empty or malformed variable list
    /// - `InvalidConfig` for a dynamic run without a behavioral model
    /// - `CorpRevenueLength` if the revenue series does not match the window
    /// - the first error any year task raises, in year order
    pub fn run(
        &self,
        plan: &PairedRun,
        vars: &[String],
        window: BudgetWindow,
        mode: RunMode,
    ) -> BrainResult<YearResults> {
        validate_variables(vars)?;
        if mode == RunMode::Dynamic && plan.behavior.is_none() {
            return Err(ValidationError::InvalidConfig {
                reason: "a dynamic run needs a behavioral response model".to_string(),
            }
            .into());
        }
        if let Some(incidence) = &plan.incidence {
            if incidence.revenue.len() != window.len() {
                return Err(ValidationError::CorpRevenueLength {
                    expected: window.len(),
                    actual: incidence.revenue.len(),
                }
                .into());
            }
        }

        info!(
            start_year = window.start_year(),
            end_year = window.end_year(),
            %mode,
            "starting paired run"
        );
        let vars: Arc<[String]> = Arc::from(vars.to_vec());
        let mut tasks = Vec::with_capacity(window.len());
        for (idx, year) in window.years().enumerate() {
            let mut task = YearTask::new(year, &plan.base, &plan.reform, Arc::clone(&vars));
            if mode == RunMode::Dynamic {
                if let Some(behavior) = &plan.behavior {
                    task = task.with_behavior(behavior.clone());
                }
            }
            if let Some(incidence) = &plan.incidence {
                task = task.with_incidence(IncidenceStep {
                    revenue: incidence.revenue[idx],
                    start_year: window.start_year(),
                    params: incidence.params,
                });
            }
            tasks.push(task);
        }

        let results = self.run_tasks(tasks)?;
        info!(years = results.len(), "paired run finished");
        Ok(results
            .into_iter()
            .map(|(year, result)| (year, (result.base, result.reform)))
            .collect())
    }

    /// Run prepared tasks and gather results by year.
    pub fn run_tasks(&self, tasks: Vec<YearTask>) -> BrainResult<BTreeMap<i32, YearResult>> {
        let Some(pool) = &self.pool else {
            let mut out = BTreeMap::new();
            for task in tasks {
                let result = task.run()?;
                out.insert(result.year, result);
            }
            return Ok(out);
        };

        let mut handles = Vec::with_capacity(tasks.len());
        for task in tasks {
            let (reply, handle) = TaskHandle::new(task.year());
            pool.submit(Job::Year { task, reply })?;
            handles.push(handle);
        }
        gather(handles)
    }

    /// Weighted total of `var` in every window year under `calc`'s policy.
    ///
    /// Each year is computed on its own fork of `calc`.
    pub fn revenue_series(&self, calc: &Calculator, window: BudgetWindow, var: &str) -> BrainResult<BTreeMap<i32, f64>> {
        let Some(pool) = &self.pool else {
            let mut out = BTreeMap::new();
            for year in window.years() {
                out.insert(year, revenue_for_year(calc.fork(), year, var)?);
            }
            return Ok(out);
        };

        let mut handles = Vec::with_capacity(window.len());
        for year in window.years() {
            let (reply, handle) = TaskHandle::new(year);
            pool.submit(Job::Revenue {
                calc: calc.fork(),
                year,
                var: var.to_string(),
                reply,
            })?;
            handles.push(handle);
        }
        gather(handles)
    }
}

fn gather<T>(handles: Vec<TaskHandle<T>>) -> BrainResult<BTreeMap<i32, T>> {
    let mut out = BTreeMap::new();
    for handle in handles {
        let year = handle.year();
        let value = handle.join()?;
        debug!(year, "year task finished");
        out.insert(year, value);
    }
    Ok(out)
}
