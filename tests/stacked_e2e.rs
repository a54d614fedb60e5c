mod common;

use std::fs;
use std::sync::Arc;

use taxbrain::{
    BrainConfig, BrainError, MicrodataConfig, ReformInput, SchedulerConfig, StackedReform, TaxBrain, ValidationError,
};

use common::{write_csv, ToyEngine};

const RATE: &str = r#"{"II_rt1": {"2025": 0.25}}"#;
const EXEMPTION: &str = r#"{"II_em": {"2025": 12000}}"#;

fn run_stack(dir: &std::path::Path, provisions: Vec<(&str, ReformInput)>) -> TaxBrain {
    let mut tb = TaxBrain::builder()
        .years(2024, 2027)
        .use_cps(true)
        .stacked(provisions)
        .engine(Arc::new(ToyEngine))
        .config(BrainConfig {
            scheduler: SchedulerConfig {
                workers: 3,
                queue_capacity: 16,
            },
            microdata: MicrodataConfig {
                data_dir: dir.to_path_buf(),
                ..MicrodataConfig::default()
            },
            ..BrainConfig::default()
        })
        .build()
        .unwrap();
    tb.run_default().unwrap();
    tb
}

#[test]
fn provisions_sum_to_the_combined_reform() {
    let dir = tempfile::tempdir().unwrap();
    write_csv(dir.path(), "cps.csv", 300);
    let rate_path = dir.path().join("rate.json");
    fs::write(&rate_path, RATE).unwrap();

    let tb = run_stack(
        dir.path(),
        vec![
            ("Rate Increase", ReformInput::FilePath(rate_path)),
            ("Bigger Exemption", ReformInput::InlineText(EXEMPTION.to_string())),
        ],
    );
    let stacked = tb.stacked_table().unwrap();
    assert_eq!(
        stacked.row_labels().collect::<Vec<_>>(),
        vec!["Rate Increase", "Bigger Exemption", "Total"]
    );
    assert!(stacked.row("Baseline").is_none());
    assert_eq!(stacked.total_column(), Some("window total"));

    // Nothing changes before the provisions start.
    assert!(stacked.value("Total", 2024).unwrap().abs() < 1e-6);
    assert!(stacked.value("Rate Increase", 2025).unwrap() > 0.0);
    assert!(stacked.value("Bigger Exemption", 2025).unwrap() < 0.0);

    // The paired run uses every provision together, so its combined-tax
    // difference equals the stacked total in every year.
    let totals = tb.weighted_totals("combined", false).unwrap();
    for year in 2024..=2027 {
        let paired = totals.value("Difference", year).unwrap();
        let stacked_total = stacked.value("Total", year).unwrap();
        assert!((paired - stacked_total).abs() < 1e-6 * paired.abs().max(1.0), "{year}");
    }
    let window_total: f64 = ["Rate Increase", "Bigger Exemption"]
        .iter()
        .map(|p| stacked.row_total(p).unwrap())
        .sum();
    assert!((window_total - totals.row_total("Difference").unwrap()).abs() < 1e-3);
}

#[test]
fn attribution_depends_on_stacking_order() {
    let dir = tempfile::tempdir().unwrap();
    write_csv(dir.path(), "cps.csv", 300);
    let forward = run_stack(
        dir.path(),
        vec![
            ("Rate", ReformInput::InlineText(RATE.to_string())),
            ("Exemption", ReformInput::InlineText(EXEMPTION.to_string())),
        ],
    );
    let reversed = run_stack(
        dir.path(),
        vec![
            ("Exemption", ReformInput::InlineText(EXEMPTION.to_string())),
            ("Rate", ReformInput::InlineText(RATE.to_string())),
        ],
    );
    let a = forward.stacked_table().unwrap();
    let b = reversed.stacked_table().unwrap();

    // The exemption is worth more at the higher rate.
    let exemption_second = a.value("Exemption", 2026).unwrap();
    let exemption_first = b.value("Exemption", 2026).unwrap();
    assert!(exemption_second < exemption_first);
    assert!((a.value("Total", 2026).unwrap() - b.value("Total", 2026).unwrap()).abs() < 1e-6);
}

#[test]
fn malformed_stacks_are_rejected() {
    assert!(matches!(
        StackedReform::from_inputs(Vec::<(String, ReformInput)>::new()),
        Err(ValidationError::EmptyStack)
    ));
    assert!(StackedReform::from_inputs(vec![("Baseline", ReformInput::InlineText(RATE.to_string()))]).is_err());
    assert!(StackedReform::from_inputs(vec![
        ("A", ReformInput::InlineText(RATE.to_string())),
        ("A", ReformInput::InlineText(EXEMPTION.to_string())),
    ])
    .is_err());

    let dir = tempfile::tempdir().unwrap();
    write_csv(dir.path(), "cps.csv", 10);
    let err = TaxBrain::builder()
        .years(2024, 2025)
        .use_cps(true)
        .stacked(vec![("Total", ReformInput::InlineText(RATE.to_string()))])
        .engine(Arc::new(ToyEngine))
        .config(BrainConfig {
            microdata: MicrodataConfig {
                data_dir: dir.path().to_path_buf(),
                ..MicrodataConfig::default()
            },
            ..BrainConfig::default()
        })
        .build()
        .unwrap_err();
    assert!(matches!(err, BrainError::Validation(ValidationError::InvalidReform { .. })));
}
