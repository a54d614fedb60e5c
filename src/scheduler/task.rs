//! One year of a paired baseline/reform run.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::behavior::BehavioralResponse;
use crate::calculator::Calculator;
use crate::error::{BrainResult, ExecutionError, ValidationError};
use crate::incidence::{self, IncidenceParameters};
use crate::policy::BehaviorParams;
use crate::snapshot::Snapshot;

/// Static recompute or behavioral response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RunMode {
    /// Recompute liabilities with unchanged behavior.
    Static,
    /// Delegate to the behavioral-response model.
    Dynamic,
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Static => write!(f, "static"),
            Self::Dynamic => write!(f, "dynamic"),
        }
    }
}

impl FromStr for RunMode {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "static" => Ok(Self::Static),
            "dynamic" => Ok(Self::Dynamic),
            other => Err(ValidationError::InvalidSelector {
                kind: "run type".to_string(),
                value: other.to_string(),
            }),
        }
    }
}

/// Behavioral model plus the elasticities to use with it.
#[derive(Clone)]
pub struct BehaviorPlan {
    /// Response model.
    pub response: Arc<dyn BehavioralResponse>,
    /// Elasticities.
    pub params: BehaviorParams,
}

impl fmt::Debug for BehaviorPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BehaviorPlan").field("params", &self.params).finish_non_exhaustive()
    }
}

/// Corporate revenue to redistribute in one year.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IncidenceStep {
    /// Revenue change for the year.
    pub revenue: f64,
    /// First year of the window; the transition starts here.
    pub start_year: i32,
    /// Incidence assumptions.
    pub params: IncidenceParameters,
}

/// Baseline and reform results for one year.
#[derive(Debug, Clone, PartialEq)]
pub struct YearResult {
    /// Simulated year.
    pub year: i32,
    /// Baseline snapshot.
    pub base: Snapshot,
    /// Reform snapshot.
    pub reform: Snapshot,
}

/// Self-contained unit of work for one year.
///
/// The task owns private forks of both calculators; running it never touches
/// state another task can see.
#[derive(Debug)]
pub struct YearTask {
    year: i32,
    base: Calculator,
    reform: Calculator,
    vars: Arc<[String]>,
    mode: RunMode,
    behavior: Option<BehaviorPlan>,
    incidence: Option<IncidenceStep>,
}

impl YearTask {
    /// Static task over forks of `base` and `reform`.
    #[must_use]
    pub fn new(year: i32, base: &Calculator, reform: &Calculator, vars: Arc<[String]>) -> Self {
        Self {
            year,
            base: base.fork(),
            reform: reform.fork(),
            vars,
            mode: RunMode::Static,
            behavior: None,
            incidence: None,
        }
    }

    /// Use the behavioral-response model for this year.
    #[must_use]
    pub fn with_behavior(mut self, plan: BehaviorPlan) -> Self {
        self.mode = RunMode::Dynamic;
        self.behavior = Some(plan);
        self
    }

    /// Redistribute corporate revenue on the reform side first.
    #[must_use]
    pub fn with_incidence(mut self, step: IncidenceStep) -> Self {
        self.incidence = Some(step);
        self
    }

    /// Year this task produces.
    #[must_use]
    pub const fn year(&self) -> i32 {
        self.year
    }

    /// Mode this task runs in.
    #[must_use]
    pub const fn mode(&self) -> RunMode {
        self.mode
    }

    /// Advance, compute and extract.
    pub fn run(self) -> BrainResult<YearResult> {
        let Self {
            year,
            mut base,
            mut reform,
            vars,
            mode,
            behavior,
            incidence,
        } = self;
        debug!(year, %mode, "running year task");

        base.advance_to_year(year)?;
        reform.advance_to_year(year)?;

        if let Some(step) = incidence {
            let adjusted = incidence::distribute(reform.table(), step.revenue, year, step.start_year, &step.params)?;
            reform.replace_table(adjusted)?;
        }

        let (base_table, reform_table) = match behavior {
            Some(plan) => plan
                .response
                .respond(base, reform, &plan.params)
                .map_err(|message| ExecutionError::Behavior { year, message })?,
            None => {
                base.calc_all()?;
                reform.calc_all()?;
                (base.table().clone(), reform.table().clone())
            }
        };

        Ok(YearResult {
            year,
            base: base_table.select(&vars)?,
            reform: reform_table.select(&vars)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::behavior::test_response::DampedResponse;
    use crate::calculator::test_engine::FlatEngine;
    use crate::growth::GrowFactors;
    use crate::policy::{PolicyDiff, PolicyState};
    use crate::records::{DataKind, Records};
    use crate::snapshot::{COMBINED, WEIGHT};

    fn calculators() -> (Calculator, Calculator) {
        let mut columns = vec![
            ("e00200", vec![100.0, 200.0]),
            (WEIGHT, vec![1.0, 1.0]),
        ];
        for name in ["p22250", "p23250", "e00600", "e00300", "e00400", "e01100", "e01200", "e02000"] {
            columns.push((name, vec![10.0, 10.0]));
        }
        let records = Records::from_table(Snapshot::new(columns).unwrap(), DataKind::Custom, 2020);
        let engine = Arc::new(FlatEngine);
        let base = Calculator::new(engine.clone(), &records, PolicyState::current_law(), GrowFactors::new());
        let mut reform_policy = PolicyState::current_law();
        reform_policy.push(PolicyDiff::new().with("FlatRate", 2021, json!(0.2)).unwrap());
        let reform = Calculator::new(engine, &records, reform_policy, GrowFactors::new());
        (base, reform)
    }

    fn vars() -> Arc<[String]> {
        Arc::from(vec![COMBINED.to_string()])
    }

    #[test]
    fn run_mode_parses() {
        assert_eq!("dynamic".parse::<RunMode>().unwrap(), RunMode::Dynamic);
        assert!("sometimes".parse::<RunMode>().is_err());
    }

    #[test]
    fn static_task_adds_weight_and_leaves_parents_untouched() {
        let (base, reform) = calculators();
        let result = YearTask::new(2022, &base, &reform, vars()).run().unwrap();
        assert_eq!(result.year, 2022);
        assert!(result.base.has_column(WEIGHT));
        assert_eq!(result.base.column(COMBINED).unwrap(), &[15.0, 30.0]);
        assert_eq!(result.reform.column(COMBINED).unwrap(), &[25.0, 50.0]);
        assert_eq!(base.current_year(), 2020);
        assert!(!base.is_computed());
    }

    #[test]
    fn incidence_changes_reform_inputs_only() {
        let (base, reform) = calculators();
        let step = IncidenceStep {
            revenue: 300.0,
            start_year: 2022,
            params: IncidenceParameters {
                transition_years: 0,
                ..IncidenceParameters::default()
            },
        };
        let vars: Arc<[String]> = Arc::from(vec!["e00200".to_string()]);
        let result = YearTask::new(2022, &base, &reform, vars).with_incidence(step).run().unwrap();
        let before = result.base.weighted_sum("e00200").unwrap();
        let after = result.reform.weighted_sum("e00200").unwrap();
        // Long-run labor share is one half.
        assert!((after - before - 150.0).abs() < 1e-9);
    }

    #[test]
    fn dynamic_task_uses_response_model() {
        let (base, reform) = calculators();
        let plan = BehaviorPlan {
            response: Arc::new(DampedResponse),
            params: BehaviorParams::new().with("sub", 0.5).unwrap(),
        };
        let task = YearTask::new(2022, &base, &reform, vars()).with_behavior(plan);
        assert_eq!(task.mode(), RunMode::Dynamic);
        let result = task.run().unwrap();
        assert_eq!(result.reform.column(COMBINED).unwrap(), &[12.5, 25.0]);
    }

    #[test]
    fn engine_failure_surfaces() {
        let (base, _) = calculators();
        let mut bad = PolicyState::current_law();
        bad.push(PolicyDiff::new().with("Invalid", 2021, json!(1)).unwrap());
        let records = Records::from_table(base.table().clone(), DataKind::Custom, 2020);
        let reform = Calculator::new(Arc::new(FlatEngine), &records, bad, GrowFactors::new());
        let err = YearTask::new(2022, &base, &reform, vars()).run().unwrap_err();
        assert!(err.is_execution());
    }
}
