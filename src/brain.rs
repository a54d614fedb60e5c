//! The `TaxBrain` facade: one configured baseline-vs-reform analysis.
//!
//! All inputs are collected by [`TaxBrainBuilder`] and validated in
//! [`TaxBrainBuilder::build`] before any simulation work starts. A built
//! `TaxBrain` is immutable apart from the results stored by [`TaxBrain::run`].

use std::fmt;
use std::sync::Arc;

use tracing::{info, warn};

use crate::behavior::BehavioralResponse;
use crate::calculator::{Calculator, Side, TaxEngine};
use crate::config::BrainConfig;
use crate::error::{BrainError, BrainResult, ExecutionError, ValidationError};
use crate::growth::GrowFactors;
use crate::incidence::IncidenceParameters;
use crate::manifest::RunManifest;
use crate::policy::{Assumptions, BehaviorParams, PolicyDiff, PolicyState, ReformInput, StackedReform, UserMods};
use crate::records::{MicrodataSource, Records, SampleSpec};
use crate::scheduler::{BehaviorPlan, CorporateIncidence, PairedRun, RunMode, Scheduler, YearResults};
use crate::snapshot::{Snapshot, COMBINED, EXPANDED_INCOME, IITAX, PAYROLLTAX, WEIGHT};
use crate::stacked::StackedAttributor;
use crate::summary::{privacy_safe_summary, YearSummary};
use crate::tables::{
    self, GroupTable, Grouping, IncomeMeasure, TableBuilder, TaxToDiff, WeightedTableBuilder, YearTable,
};
use crate::window::BudgetWindow;

/// Variables kept per year when the caller has no preference.
pub const DEFAULT_VARIABLES: [&str; 5] = [IITAX, PAYROLLTAX, COMBINED, EXPANDED_INCOME, WEIGHT];

#[derive(Debug, Clone, Copy)]
enum Sampling {
    Full,
    Default,
    Custom(SampleSpec),
}

/// Collects the inputs of a [`TaxBrain`].
pub struct TaxBrainBuilder {
    start_year: Option<i32>,
    end_year: Option<i32>,
    microdata: Option<MicrodataSource>,
    use_cps: bool,
    sampling: Sampling,
    reform: Option<ReformInput>,
    stacked: Option<Vec<(String, ReformInput)>>,
    base_policy: Option<ReformInput>,
    assumptions: Assumptions,
    behavior: BehaviorParams,
    corp_revenue: Option<Vec<f64>>,
    corp_incidence: Option<IncidenceParameters>,
    engine: Option<Arc<dyn TaxEngine>>,
    responder: Option<Arc<dyn BehavioralResponse>>,
    grow_factors: GrowFactors,
    config: BrainConfig,
    table_builder: Arc<dyn TableBuilder>,
}

impl fmt::Debug for TaxBrainBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaxBrainBuilder")
            .field("start_year", &self.start_year)
            .field("end_year", &self.end_year)
            .field("use_cps", &self.use_cps)
            .field("stacked", &self.stacked.is_some())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Default for TaxBrainBuilder {
    fn default() -> Self {
        Self {
            start_year: None,
            end_year: None,
            microdata: None,
            use_cps: false,
            sampling: Sampling::Full,
            reform: None,
            stacked: None,
            base_policy: None,
            assumptions: Assumptions::default(),
            behavior: BehaviorParams::new(),
            corp_revenue: None,
            corp_incidence: None,
            engine: None,
            responder: None,
            grow_factors: GrowFactors::new(),
            config: BrainConfig::default(),
            table_builder: Arc::new(WeightedTableBuilder),
        }
    }
}

impl TaxBrainBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// First and last year of the budget window, inclusive.
    #[must_use]
    pub const fn years(mut self, start_year: i32, end_year: i32) -> Self {
        self.start_year = Some(start_year);
        self.end_year = Some(end_year);
        self
    }

    /// Microdata to simulate. Defaults to the PUF.
    #[must_use]
    pub fn microdata(mut self, source: MicrodataSource) -> Self {
        self.microdata = Some(source);
        self
    }

    /// Use the public CPS sample. Conflicts with any other microdata.
    #[must_use]
    pub const fn use_cps(mut self, use_cps: bool) -> Self {
        self.use_cps = use_cps;
        self
    }

    /// Run on the fixed default partial sample of the chosen data.
    #[must_use]
    pub const fn default_sample(mut self) -> Self {
        self.sampling = Sampling::Default;
        self
    }

    /// Run on an explicit partial sample.
    #[must_use]
    pub const fn sample(mut self, spec: SampleSpec) -> Self {
        self.sampling = Sampling::Custom(spec);
        self
    }

    /// Single reform layered on the base policy.
    #[must_use]
    pub fn reform(mut self, reform: impl Into<ReformInput>) -> Self {
        self.reform = Some(reform.into());
        self
    }

    /// Ordered named provisions for stacked attribution. The paired run
    /// uses all of them together.
    #[must_use]
    pub fn stacked<I, S>(mut self, provisions: I) -> Self
    where
        I: IntoIterator<Item = (S, ReformInput)>,
        S: Into<String>,
    {
        self.stacked = Some(provisions.into_iter().map(|(n, r)| (n.into(), r)).collect());
        self
    }

    /// Baseline changes relative to current law.
    #[must_use]
    pub fn base_policy(mut self, base_policy: impl Into<ReformInput>) -> Self {
        self.base_policy = Some(base_policy.into());
        self
    }

    /// Economic assumptions.
    #[must_use]
    pub fn assumptions(mut self, assumptions: Assumptions) -> Self {
        self.assumptions = assumptions;
        self
    }

    /// Behavioral elasticities; non-empty means a dynamic run.
    #[must_use]
    pub fn behavior(mut self, behavior: BehaviorParams) -> Self {
        self.behavior = behavior;
        self
    }

    /// Corporate revenue change per window year.
    #[must_use]
    pub fn corp_revenue(mut self, revenue: Vec<f64>) -> Self {
        self.corp_revenue = Some(revenue);
        self
    }

    /// Incidence assumptions; defaults to the configured ones.
    #[must_use]
    pub const fn corp_incidence(mut self, params: IncidenceParameters) -> Self {
        self.corp_incidence = Some(params);
        self
    }

    /// Tax engine. Required.
    #[must_use]
    pub fn engine(mut self, engine: Arc<dyn TaxEngine>) -> Self {
        self.engine = Some(engine);
        self
    }

    /// Behavioral response model. Required for dynamic runs.
    #[must_use]
    pub fn responder(mut self, responder: Arc<dyn BehavioralResponse>) -> Self {
        self.responder = Some(responder);
        self
    }

    /// Baseline growth factors before any growth diffs.
    #[must_use]
    pub fn grow_factors(mut self, factors: GrowFactors) -> Self {
        self.grow_factors = factors;
        self
    }

    /// Run configuration.
    #[must_use]
    pub fn config(mut self, config: BrainConfig) -> Self {
        self.config = config;
        self
    }

    /// Distribution and difference table builder.
    #[must_use]
    pub fn table_builder(mut self, builder: Arc<dyn TableBuilder>) -> Self {
        self.table_builder = builder;
        self
    }

    /// Validate every input, load the microdata and prepare both calculators.
    ///
    /// # Errors
    /// Any `ValidationError` describing bad input, or an `ExecutionError`
    /// if the microdata cannot be read. No simulation runs here.
    pub fn build(self) -> BrainResult<TaxBrain> {
        self.config.validate()?;
        let (Some(start_year), Some(end_year)) = (self.start_year, self.end_year) else {
            return Err(ValidationError::InvalidConfig {
                reason: "start and end years are required".to_string(),
            }
            .into());
        };
        let window = BudgetWindow::new(start_year, end_year, self.config.supported_years)?;

        let source = match (self.use_cps, self.microdata) {
            (true, None | Some(MicrodataSource::Cps)) => MicrodataSource::Cps,
            (true, Some(_)) => {
                return Err(ValidationError::ConflictingMicrodata {
                    reason: "use_cps cannot be combined with other microdata".to_string(),
                }
                .into())
            }
            (false, Some(source)) => source,
            (false, None) => MicrodataSource::Puf,
        };

        if let Some(revenue) = &self.corp_revenue {
            if revenue.len() != window.len() {
                return Err(ValidationError::CorpRevenueLength {
                    expected: window.len(),
                    actual: revenue.len(),
                }
                .into());
            }
            if let Some((year, value)) = window.years().zip(revenue.iter().copied()).find(|(_, v)| !v.is_finite()) {
                return Err(ValidationError::NonFiniteRevenue { year, value }.into());
            }
        }
        let incidence_params = self.corp_incidence.unwrap_or(self.config.incidence);
        incidence_params.validate()?;

        let engine = self.engine.ok_or_else(|| ValidationError::InvalidConfig {
            reason: "a tax engine is required".to_string(),
        })?;
        let behavior = if self.behavior.is_empty() {
            None
        } else {
            let response = self.responder.ok_or_else(|| ValidationError::InvalidConfig {
                reason: "behavioral elasticities were given without a response model".to_string(),
            })?;
            Some(BehaviorPlan {
                response,
                params: self.behavior.clone(),
            })
        };

        let (policy, stack) = match (self.reform, self.stacked) {
            (Some(_), Some(_)) => {
                return Err(ValidationError::InvalidReform {
                    reason: "give either a single reform or stacked provisions, not both".to_string(),
                }
                .into())
            }
            (Some(reform), None) => (reform.resolve()?, None),
            (None, Some(provisions)) => {
                let stack = StackedReform::from_inputs(provisions)?;
                (stack.combined(), Some(stack))
            }
            (None, None) => (PolicyDiff::new(), None),
        };
        let base_policy = match self.base_policy {
            Some(input) => input.resolve()?,
            None => PolicyDiff::new(),
        };
        self.assumptions.validate()?;

        let records = Records::load(source, &self.config.microdata)?;
        if start_year < records.data_year() {
            return Err(ValidationError::YearOutOfRange {
                year: start_year,
                first: records.data_year(),
                last: self.config.supported_years.last,
            }
            .into());
        }
        let records = match self.sampling {
            Sampling::Full => records,
            Sampling::Default => {
                let spec = SampleSpec::default_for(records.kind());
                if spec.fraction >= 1.0 {
                    warn!(kind = ?records.kind(), "no default sample for this data; using every row");
                }
                records.sample(spec)?
            }
            Sampling::Custom(spec) => records.sample(spec)?,
        };

        let mut base_growth = self.grow_factors;
        self.assumptions.growdiff_baseline.apply_to(&mut base_growth)?;
        let mut reform_growth = base_growth.clone();
        self.assumptions.growdiff_response.apply_to(&mut reform_growth)?;

        let mut base_state = PolicyState::current_law();
        base_state.push(base_policy.clone());
        base_state.push(self.assumptions.consumption.clone());
        let mut reform_state = PolicyState::layered(&base_policy, &policy);
        reform_state.push(self.assumptions.consumption.clone());

        let base = Calculator::new(Arc::clone(&engine), &records, base_state, base_growth);
        let reform = Calculator::new(engine, &records, reform_state, reform_growth);
        let mode = if behavior.is_some() { RunMode::Dynamic } else { RunMode::Static };
        let scheduler = Scheduler::new(self.config.scheduler)?;

        info!(
            start_year,
            end_year,
            rows = records.len(),
            kind = ?records.kind(),
            %mode,
            stacked = stack.is_some(),
            "built tax brain"
        );

        Ok(TaxBrain {
            window,
            mode,
            user_mods: UserMods {
                policy,
                base_policy,
                behavior: self.behavior,
                assumptions: self.assumptions,
            },
            records,
            plan: PairedRun {
                base,
                reform,
                behavior,
                incidence: self.corp_revenue.map(|revenue| CorporateIncidence {
                    revenue,
                    params: incidence_params,
                }),
            },
            stack,
            scheduler,
            config: self.config,
            table_builder: self.table_builder,
            outcome: None,
        })
    }
}

#[derive(Debug)]
struct RunOutcome {
    results: YearResults,
    stacked_table: Option<YearTable>,
    manifest: RunManifest,
}

/// A configured analysis and, after [`run`](Self::run), its results.
pub struct TaxBrain {
    window: BudgetWindow,
    mode: RunMode,
    user_mods: UserMods,
    records: Records,
    plan: PairedRun,
    stack: Option<StackedReform>,
    scheduler: Scheduler,
    config: BrainConfig,
    table_builder: Arc<dyn TableBuilder>,
    outcome: Option<RunOutcome>,
}

impl fmt::Debug for TaxBrain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaxBrain")
            .field("window", &self.window)
            .field("mode", &self.mode)
            .field("rows", &self.records.len())
            .field("has_run", &self.outcome.is_some())
            .finish_non_exhaustive()
    }
}

impl TaxBrain {
    /// Start collecting inputs.
    #[must_use]
    pub fn builder() -> TaxBrainBuilder {
        TaxBrainBuilder::new()
    }

    /// Budget window.
    #[must_use]
    pub const fn window(&self) -> BudgetWindow {
        self.window
    }

    /// Static or dynamic, decided by whether elasticities were given.
    #[must_use]
    pub const fn mode(&self) -> RunMode {
        self.mode
    }

    /// The full reform specification.
    #[must_use]
    pub const fn user_mods(&self) -> &UserMods {
        &self.user_mods
    }

    /// Microdata in use.
    #[must_use]
    pub const fn records(&self) -> &Records {
        &self.records
    }

    /// Whether released summaries are fuzzed.
    #[must_use]
    pub const fn fuzzes_output(&self) -> bool {
        self.records.kind().is_restricted()
    }

    /// Run the paired simulation, and stacked attribution when provisions
    /// were given, keeping `vars` (plus the weight) for every year.
    ///
    /// Earlier results are replaced only if the whole run succeeds.
    pub fn run(&mut self, vars: &[String]) -> BrainResult<()> {
        let results = self.scheduler.run(&self.plan, vars, self.window, self.mode)?;
        let stacked_table = match &self.stack {
            Some(stack) => Some(StackedAttributor::new(&self.scheduler).run(&self.plan.base, stack, self.window)?),
            None => None,
        };
        let manifest = RunManifest::new(
            self.window,
            self.mode,
            &self.records,
            &self.user_mods,
            self.fuzzes_output(),
        );
        info!(run_id = %manifest.run_id, "run complete");
        self.outcome = Some(RunOutcome {
            results,
            stacked_table,
            manifest,
        });
        Ok(())
    }

    /// [`run`](Self::run) with [`DEFAULT_VARIABLES`].
    pub fn run_default(&mut self) -> BrainResult<()> {
        let vars: Vec<String> = DEFAULT_VARIABLES.iter().map(ToString::to_string).collect();
        self.run(&vars)
    }

    fn outcome(&self) -> Result<&RunOutcome, ValidationError> {
        self.outcome.as_ref().ok_or_else(|| ValidationError::NotRun {
            what: "call run() first".to_string(),
        })
    }

    /// Per-year `(baseline, reform)` snapshots.
    pub fn results(&self) -> Result<&YearResults, ValidationError> {
        Ok(&self.outcome()?.results)
    }

    fn pair(&self, year: i32) -> Result<&(Snapshot, Snapshot), ValidationError> {
        self.results()?.get(&year).ok_or(ValidationError::UnknownYear { year })
    }

    /// Base, reform and difference of the weighted total of `var`.
    pub fn weighted_totals(&self, var: &str, include_total: bool) -> Result<YearTable, ValidationError> {
        tables::weighted_totals(self.results()?, var, include_total)
    }

    /// Weighted totals of several variables on one side.
    pub fn multi_var_table(&self, vars: &[String], side: Side, include_total: bool) -> Result<YearTable, ValidationError> {
        tables::multi_var_table(self.results()?, vars, side, include_total)
    }

    /// Distribution table of one side for `year`.
    ///
    /// # Errors
    /// `NotRun`, `UnknownYear`, a missing income column, or a table
    /// builder failure reported as an execution error for `year`.
    pub fn distribution_table(
        &self,
        year: i32,
        grouping: Grouping,
        income: IncomeMeasure,
        side: Side,
    ) -> BrainResult<GroupTable> {
        let (base, reform) = self.pair(year)?;
        let data = match side {
            Side::Baseline => base,
            Side::Reform => reform,
        };
        let income = match income {
            IncomeMeasure::ExpandedIncome => data.column(EXPANDED_INCOME)?,
            IncomeMeasure::ExpandedIncomeBaseline => base.column(EXPANDED_INCOME)?,
        };
        self.table_builder
            .distribution_table(data, income, grouping)
            .map_err(|message| BrainError::from(ExecutionError::Engine { year, message }))
    }

    /// Change in `tax` between baseline and reform for `year`.
    pub fn differences_table(&self, year: i32, grouping: Grouping, tax: TaxToDiff) -> BrainResult<GroupTable> {
        let (base, reform) = self.pair(year)?;
        self.table_builder
            .differences_table(base, reform, grouping, tax)
            .map_err(|message| BrainError::from(ExecutionError::Engine { year, message }))
    }

    /// Provision × year marginal revenue table of a stacked run.
    pub fn stacked_table(&self) -> Result<&YearTable, ValidationError> {
        self.outcome()?
            .stacked_table
            .as_ref()
            .ok_or_else(|| ValidationError::NotRun {
                what: "no stacked provisions were given".to_string(),
            })
    }

    /// Audit record of the last run.
    pub fn manifest(&self) -> Result<&RunManifest, ValidationError> {
        Ok(&self.outcome()?.manifest)
    }

    /// Releasable summary of `year`, fuzzed when the data are restricted.
    pub fn summary(&self, year: i32) -> Result<YearSummary, ValidationError> {
        let (base, reform) = self.pair(year)?;
        privacy_safe_summary(year, base, reform, &self.user_mods, self.fuzzes_output(), &self.config.fuzz)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::behavior::test_response::DampedResponse;
    use crate::calculator::test_engine::FlatEngine;
    use crate::growth::GrowDiff;
    use crate::records::DataKind;

    fn table() -> Snapshot {
        Snapshot::new(vec![
            ("e00200", vec![10_000.0, 50_000.0, 250_000.0, 0.0]),
            ("e00300", vec![100.0, 0.0, 5_000.0, 20.0]),
            ("e00400", vec![0.0; 4]),
            ("e01100", vec![0.0; 4]),
            ("e01200", vec![0.0; 4]),
            ("e02000", vec![0.0; 4]),
            ("p22250", vec![0.0, 0.0, 10_000.0, 0.0]),
            ("p23250", vec![0.0; 4]),
            ("e00600", vec![0.0, 0.0, 800.0, 0.0]),
            (WEIGHT, vec![1.0, 2.0, 1.0, 1.0]),
        ])
        .unwrap()
    }

    fn builder() -> TaxBrainBuilder {
        TaxBrain::builder()
            .years(2021, 2023)
            .microdata(MicrodataSource::Table(table()))
            .engine(Arc::new(FlatEngine))
            .config(BrainConfig {
                microdata: crate::records::MicrodataConfig {
                    custom_data_year: 2020,
                    ..Default::default()
                },
                ..BrainConfig::default()
            })
    }

    fn rate(value: f64) -> PolicyDiff {
        PolicyDiff::new().with("FlatRate", 2022, json!(value)).unwrap()
    }

    #[test]
    fn accessors_before_run_report_not_run() {
        let tb = builder().reform(rate(0.2)).build().unwrap();
        assert!(matches!(tb.results(), Err(ValidationError::NotRun { .. })));
        assert!(matches!(tb.weighted_totals(COMBINED, false), Err(ValidationError::NotRun { .. })));
        assert!(tb.manifest().is_err());
        assert!(tb.stacked_table().is_err());
    }

    #[test]
    fn static_run_fills_every_year() {
        let mut tb = builder().reform(rate(0.2)).build().unwrap();
        assert_eq!(tb.mode(), RunMode::Static);
        tb.run_default().unwrap();
        let totals = tb.weighted_totals(COMBINED, true).unwrap();
        assert_eq!(totals.years(), &[2021, 2022, 2023]);
        assert!(totals.value("Difference", 2021).unwrap().abs() < 1e-9);
        // 0.1 more on 360k of weighted wages from 2022.
        assert!((totals.value("Difference", 2022).unwrap() - 36_000.0).abs() < 1e-6);
        assert_eq!(tb.results().unwrap().len(), 3);
        assert!(tb.manifest().unwrap().fuzz_seeds.is_none());
    }

    #[test]
    fn conflicting_microdata_is_rejected() {
        let err = builder().use_cps(true).build().unwrap_err();
        assert!(matches!(err, BrainError::Validation(ValidationError::ConflictingMicrodata { .. })));
    }

    #[test]
    fn corp_revenue_length_is_checked_before_loading() {
        let err = TaxBrain::builder()
            .years(2021, 2023)
            .microdata(MicrodataSource::File("does/not/exist.csv".into()))
            .engine(Arc::new(FlatEngine))
            .corp_revenue(vec![1.0, 2.0])
            .build()
            .unwrap_err();
        assert!(matches!(err, BrainError::Validation(ValidationError::CorpRevenueLength { expected: 3, actual: 2 })));
    }

    #[test]
    fn non_finite_corp_revenue_is_rejected_at_build() {
        for bad in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let err = TaxBrain::builder()
                .years(2021, 2023)
                .microdata(MicrodataSource::File("does/not/exist.csv".into()))
                .engine(Arc::new(FlatEngine))
                .corp_revenue(vec![1.0, bad, 2.0])
                .build()
                .unwrap_err();
            assert!(matches!(
                err,
                BrainError::Validation(ValidationError::NonFiniteRevenue { year: 2022, .. })
            ));
        }
    }

    #[test]
    fn backwards_window_is_rejected() {
        let err = builder().years(2023, 2021).build().unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn start_before_data_year_is_rejected() {
        let err = builder().years(2019, 2021).build().unwrap_err();
        assert!(matches!(err, BrainError::Validation(ValidationError::YearOutOfRange { .. })));
    }

    #[test]
    fn behavior_without_model_is_rejected() {
        let err = builder()
            .behavior(BehaviorParams::new().with("sub", 0.25).unwrap())
            .build()
            .unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn dynamic_run_uses_the_response_model() {
        let mut tb = builder()
            .reform(rate(0.2))
            .behavior(BehaviorParams::new().with("sub", 0.5).unwrap())
            .responder(Arc::new(DampedResponse))
            .build()
            .unwrap();
        assert_eq!(tb.mode(), RunMode::Dynamic);
        tb.run_default().unwrap();
        let reform = tb.multi_var_table(&[COMBINED.to_string()], Side::Reform, false).unwrap();
        // (0.2 + 0.05) × 360k, halved by the response.
        assert!((reform.value(COMBINED, 2022).unwrap() - 45_000.0).abs() < 1e-6);
    }

    #[test]
    fn baseline_growth_diff_reaches_both_sides() {
        let mut growdiff = GrowDiff::new();
        growdiff.set("e00200", 2021, 0.1).unwrap();
        let mut tb = builder()
            .assumptions(Assumptions {
                growdiff_baseline: growdiff,
                ..Assumptions::default()
            })
            .build()
            .unwrap();
        tb.run_default().unwrap();
        let totals = tb.weighted_totals(COMBINED, false).unwrap();
        assert!((totals.value("Base", 2021).unwrap() - 0.15 * 396_000.0).abs() < 1e-6);
        assert!(totals.value("Difference", 2021).unwrap().abs() < 1e-9);
    }

    #[test]
    fn stacked_run_produces_attribution_table() {
        let mut tb = builder()
            .stacked(vec![
                ("Rate", ReformInput::from(rate(0.2))),
                (
                    "Exemption",
                    ReformInput::InlineText(r#"{"Exemption": {"2023": 1000}}"#.to_string()),
                ),
            ])
            .corp_revenue(vec![0.0, 1_000.0, 1_000.0])
            .build()
            .unwrap();
        tb.run_default().unwrap();
        let stacked = tb.stacked_table().unwrap();
        assert_eq!(stacked.row_labels().collect::<Vec<_>>(), vec!["Rate", "Exemption", "Total"]);
        assert!((stacked.value("Rate", 2022).unwrap() - 36_000.0).abs() < 1e-6);
        assert!(tb.summary(2022).is_ok());
    }

    #[test]
    fn reform_and_stack_together_are_rejected() {
        let err = builder()
            .reform(rate(0.2))
            .stacked(vec![("Rate", ReformInput::from(rate(0.3)))])
            .build()
            .unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn tables_for_unknown_year_fail() {
        let mut tb = builder().reform(rate(0.2)).build().unwrap();
        tb.run_default().unwrap();
        let err = tb
            .differences_table(2030, Grouping::WeightedDeciles, TaxToDiff::Combined)
            .unwrap_err();
        assert!(matches!(err, BrainError::Validation(ValidationError::UnknownYear { year: 2030 })));
        let table = tb
            .distribution_table(2022, Grouping::StandardIncomeBins, IncomeMeasure::ExpandedIncomeBaseline, Side::Reform)
            .unwrap();
        assert!(table.value("ALL", "count").unwrap() > 4.0);
    }

    #[test]
    fn custom_data_are_not_fuzzed() {
        let tb = builder().build().unwrap();
        assert_eq!(tb.records().kind(), DataKind::Custom);
        assert!(!tb.fuzzes_output());
    }
}
