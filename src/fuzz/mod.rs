//! Privacy fuzzing of paired results.
//!
//! Before results computed on restricted data are released, a few filing
//! units whose combined tax changed under the reform are reverted to their
//! baseline values in every bin of the table about to be built. The rows are
//! picked with a generator seeded from the reform itself, so a given reform
//! always fuzzes the same way.

pub mod binning;
pub mod seed;

pub use binning::{income_bin, weighted_deciles, Binning, NUM_DECILES, NUM_INCOME_BINS, STANDARD_INCOME_EDGES};
pub use seed::FuzzSeed;

use tracing::debug;

use crate::error::ValidationError;
use crate::snapshot::{Snapshot, COMBINED, EXPANDED_INCOME};

/// Default number of rows reverted per bin.
pub const NUM_TO_FUZZ: usize = 3;

/// Default absolute tolerance when comparing combined tax.
pub const AFFECTED_TOLERANCE: f64 = 0.01;

/// Rows whose combined tax differs by more than `tolerance`.
pub fn affected_mask(base: &Snapshot, reform: &Snapshot, tolerance: f64) -> Result<Vec<bool>, ValidationError> {
    base.ensure_same_shape(reform)?;
    let before = base.column(COMBINED)?;
    let after = reform.column(COMBINED)?;
    // NaN compares as "not close", matching an isclose test.
    Ok(before
        .iter()
        .zip(after)
        .map(|(b, r)| !((b - r).abs() <= tolerance))
        .collect())
}

/// Rows chosen for reverting, sorted ascending.
///
/// Bins are visited in ascending order; in each, `min(affected, num_to_fuzz)`
/// affected rows are drawn without replacement from one generator stream.
pub fn select_rows(
    bins: &[usize],
    mask: &[bool],
    bin_count: usize,
    seed: &FuzzSeed,
    num_to_fuzz: usize,
) -> Vec<usize> {
    let mut members: Vec<Vec<usize>> = vec![Vec::new(); bin_count];
    for (row, (&bin, &affected)) in bins.iter().zip(mask).enumerate() {
        if affected {
            members[bin].push(row);
        }
    }

    let mut rng = seed.rng();
    let mut chosen = Vec::new();
    for affected in members.iter().filter(|m| !m.is_empty()) {
        let k = affected.len().min(num_to_fuzz);
        for idx in rand::seq::index::sample(&mut rng, affected.len(), k).into_vec() {
            chosen.push(affected[idx]);
        }
    }
    chosen.sort_unstable();
    chosen
}

/// Fuzz one year's pair of snapshots for one binning.
///
/// The baseline snapshot is returned unchanged. In the reform snapshot,
/// every column of each selected row is overwritten with the baseline's
/// values. Row count and order are preserved.
///
/// # Errors
/// - `ColumnLength` / `MissingColumn` if the snapshots differ in shape or
///   the mask has the wrong length
/// - `MissingColumn` if a binning needs `expanded_income` and it is absent
pub fn fuzz(
    base: &Snapshot,
    reform: &Snapshot,
    mask: &[bool],
    binning: Binning,
    seed: &FuzzSeed,
    num_to_fuzz: usize,
) -> Result<(Snapshot, Snapshot), ValidationError> {
    base.ensure_same_shape(reform)?;
    if mask.len() != base.len() {
        return Err(ValidationError::ColumnLength {
            column: "affected mask".to_string(),
            expected: base.len(),
            actual: mask.len(),
        });
    }

    let bins = match binning {
        Binning::Aggregate => vec![0; base.len()],
        Binning::IncomeBins | Binning::WeightedDeciles => {
            binning.assign(base.column(EXPANDED_INCOME)?, base.weights())
        }
    };

    let rows = select_rows(&bins, mask, binning.bin_count(), seed, num_to_fuzz);
    debug!(binning = binning.tag(), reverted = rows.len(), "fuzzed reform results");

    let mut fuzzed = reform.clone();
    for row in rows {
        fuzzed.copy_row_from(base, row)?;
    }
    Ok((base.clone(), fuzzed))
}
