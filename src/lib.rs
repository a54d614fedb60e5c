//! # TaxBrain - paired tax microsimulation orchestration
//!
//! TaxBrain runs a baseline and a reform policy over a multi-year budget
//! window on weighted filing-unit microdata, and turns the results into
//! releasable tables. The tax law itself lives behind the [`TaxEngine`]
//! trait; this crate owns everything around it.
//!
//! ## Core Concepts
//!
//! - **Calculator**: one policy state bound to the microdata; forked per year
//!   task so no two tasks share advancing state
//! - **Scheduler**: fans year tasks out over a bounded worker pool and
//!   gathers `(baseline, reform)` snapshots by year
//! - **Incidence**: spreads a corporate revenue change over labor,
//!   shareholder and other capital income
//! - **Fuzzing**: reverts a few reform-affected records per bin before
//!   results on restricted data are released
//! - **Stacked attribution**: marginal revenue of each provision given the
//!   provisions stacked before it
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use taxbrain::{MicrodataSource, PolicyDiff, TaxBrain};
//!
//! let reform = PolicyDiff::new().with("II_em", 2025, serde_json::json!(2000))?;
//! let mut tb = TaxBrain::builder()
//!     .years(2024, 2033)
//!     .microdata(MicrodataSource::Cps)
//!     .reform(reform)
//!     .engine(Arc::new(my_engine))
//!     .build()?;
//! tb.run_default()?;
//! let totals = tb.weighted_totals("combined", true)?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Data and inputs
pub mod error;
pub mod growth;
pub mod policy;
pub mod records;
pub mod snapshot;
pub mod window;

// Simulation core
pub mod behavior;
pub mod calculator;
pub mod fuzz;
pub mod incidence;
pub mod scheduler;
pub mod stacked;

// Outputs and facade
pub mod brain;
pub mod config;
pub mod manifest;
pub mod summary;
pub mod tables;

pub use behavior::BehavioralResponse;
pub use brain::{TaxBrain, TaxBrainBuilder, DEFAULT_VARIABLES};
pub use calculator::{Calculator, Side, TaxEngine};
pub use config::{BrainConfig, FuzzConfig, SchedulerConfig};
pub use error::{BrainError, BrainResult, ExecutionError, ValidationError};
pub use fuzz::{affected_mask, fuzz, Binning, FuzzSeed};
pub use growth::{GrowDiff, GrowFactors};
pub use incidence::{distribute, IncidenceParameters, IncidenceShares, IncomeBucket};
pub use manifest::RunManifest;
pub use policy::{Assumptions, BehaviorParams, ParamValue, PolicyDiff, PolicyState, ReformInput, StackedReform, UserMods};
pub use records::{DataKind, MicrodataConfig, MicrodataSource, Records, SampleSpec};
pub use scheduler::{PairedRun, RunMode, Scheduler, YearResults};
pub use snapshot::Snapshot;
pub use stacked::StackedAttributor;
pub use summary::{privacy_safe_summary, YearSummary};
pub use tables::{GroupTable, Grouping, IncomeMeasure, TableBuilder, TaxToDiff, WeightedTableBuilder, YearTable};
pub use window::{BudgetWindow, SupportedYears};
