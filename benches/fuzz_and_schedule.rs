use std::sync::Arc;

use criterion::{criterion_group, criterion_main, BatchSize, Criterion, Throughput};

use taxbrain::{
    affected_mask, fuzz, Binning, BudgetWindow, Calculator, DataKind, FuzzSeed, GrowFactors, PairedRun,
    PolicyDiff, PolicyState, Records, RunMode, Scheduler, SchedulerConfig, Snapshot, SupportedYears, TaxEngine,
};

const ROWS: usize = 20_000;

struct LinearEngine;

impl TaxEngine for LinearEngine {
    fn compute(&self, policy: &PolicyState, year: i32, table: &mut Snapshot) -> Result<(), String> {
        let rate = policy.f64_at("rate", year).unwrap_or(0.15);
        let wages = table.column("e00200").map_err(|e| e.to_string())?.to_vec();
        let iitax: Vec<f64> = wages.iter().map(|w| w * rate).collect();
        let payroll: Vec<f64> = wages.iter().map(|w| w * 0.153).collect();
        let combined = iitax.iter().zip(&payroll).map(|(i, p)| i + p).collect();
        table.set_column("iitax", iitax).map_err(|e| e.to_string())?;
        table.set_column("payrolltax", payroll).map_err(|e| e.to_string())?;
        table.set_column("combined", combined).map_err(|e| e.to_string())?;
        table.set_column("expanded_income", wages).map_err(|e| e.to_string())?;
        Ok(())
    }
}

#[allow(clippy::cast_precision_loss)]
fn synthetic_table() -> Snapshot {
    // Wages cycle through 0..500k; every third row sits in a different bin.
    let wages: Vec<f64> = (0..ROWS).map(|i| ((i * 7_919) % 500_000) as f64).collect();
    let weights: Vec<f64> = (0..ROWS).map(|i| 50.0 + (i % 11) as f64).collect();
    Snapshot::new(vec![("e00200", wages), ("s006", weights)]).unwrap()
}

fn computed_pair() -> (Snapshot, Snapshot) {
    let records = Records::from_table(synthetic_table(), DataKind::Puf, 2024);
    let mut base = Calculator::new(Arc::new(LinearEngine), &records, PolicyState::current_law(), GrowFactors::new());
    let mut reform = base.layered(PolicyDiff::new().with("rate", 2024, serde_json::json!(0.2)).unwrap());
    base.calc_all().unwrap();
    reform.calc_all().unwrap();
    (base.table().clone(), reform.table().clone())
}

fn bench_fuzz(c: &mut Criterion) {
    let (base, reform) = computed_pair();
    let mask = affected_mask(&base, &reform, 0.01).unwrap();
    let seed = FuzzSeed::from_text("bench", 2025);

    let mut group = c.benchmark_group("fuzz");
    group.throughput(Throughput::Elements(ROWS as u64));
    for binning in Binning::ALL {
        group.bench_function(binning.tag(), |b| {
            b.iter(|| fuzz(&base, &reform, &mask, binning, &seed, 3).unwrap());
        });
    }
    group.finish();
}

fn bench_paired_run(c: &mut Criterion) {
    let records = Records::from_table(synthetic_table(), DataKind::Custom, 2024);
    let mut growth = GrowFactors::new();
    for year in 2025..=2034 {
        growth.set("e00200", year, 1.03).unwrap();
    }
    let base = Calculator::new(Arc::new(LinearEngine), &records, PolicyState::current_law(), growth);
    let reform = base.layered(PolicyDiff::new().with("rate", 2026, serde_json::json!(0.2)).unwrap());
    let plan = PairedRun {
        base,
        reform,
        behavior: None,
        incidence: None,
    };
    let window = BudgetWindow::new(2025, 2034, SupportedYears::default()).unwrap();
    let vars = vec!["combined".to_string(), "expanded_income".to_string()];

    let mut group = c.benchmark_group("paired_run");
    group.sample_size(20);
    for workers in [0, 4] {
        let scheduler = Scheduler::new(SchedulerConfig {
            workers,
            queue_capacity: 16,
        })
        .unwrap();
        group.bench_function(format!("workers_{workers}"), |b| {
            b.iter_batched(
                || plan.clone(),
                |plan| scheduler.run(&plan, &vars, window, RunMode::Static).unwrap(),
                BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

criterion_group!(fuzz_and_schedule, bench_fuzz, bench_paired_run);
criterion_main!(fuzz_and_schedule);
