//! Privacy-safe summary of one year's paired results.

use serde::Serialize;
use tracing::debug;

use crate::config::FuzzConfig;
use crate::error::ValidationError;
use crate::fuzz::{affected_mask, fuzz, Binning, FuzzSeed};
use crate::policy::UserMods;
use crate::snapshot::{Snapshot, COMBINED, IITAX, PAYROLLTAX};
use crate::tables::GroupTable;

/// Dollar amounts in aggregate tables are reported in billions.
const BILLIONS: f64 = 1e-9;

/// Decimal places kept in aggregate tables.
const AGGREGATE_DECIMALS: i32 = 3;

/// One binning's fuzzed pair, ready for an external table builder.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FuzzedPair {
    /// Grouping the pair was fuzzed for.
    pub binning: Binning,
    /// Baseline snapshot (never altered).
    pub base: Snapshot,
    /// Reform snapshot with selected rows reverted.
    pub reform: Snapshot,
}

/// Releasable results for one year.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct YearSummary {
    /// Simulated year.
    pub year: i32,
    /// Whether reform rows were reverted before aggregation.
    pub fuzzed: bool,
    /// Rows `iitax`, `payrolltax`, `combined`; columns `base`, `reform`,
    /// `change`; billions of dollars.
    pub aggregates: GroupTable,
    /// Fuzzed pairs in [`Binning::ALL`] order.
    pub pairs: Vec<FuzzedPair>,
}

impl YearSummary {
    /// Pair prepared for `binning`.
    #[must_use]
    pub fn pair(&self, binning: Binning) -> Option<&FuzzedPair> {
        self.pairs.iter().find(|p| p.binning == binning)
    }
}

/// Summarize one year without leaking individual filing units.
///
/// With fuzzing enabled, each binning gets its own fuzzed copy of the pair,
/// all drawn with the seed for `(user_mods, year)`. The aggregate liability
/// table is built from the aggregate-binning pair.
///
/// # Errors
/// Shape mismatches between the snapshots, or a missing tax or income column.
pub fn privacy_safe_summary(
    year: i32,
    base: &Snapshot,
    reform: &Snapshot,
    user_mods: &UserMods,
    fuzz_enabled: bool,
    config: &FuzzConfig,
) -> Result<YearSummary, ValidationError> {
    base.ensure_same_shape(reform)?;
    let mut pairs = Vec::with_capacity(Binning::ALL.len());
    if fuzz_enabled {
        let mask = affected_mask(base, reform, config.affected_tolerance)?;
        let seed = FuzzSeed::from_user_mods(user_mods, year);
        debug!(year, affected = mask.iter().filter(|m| **m).count(), "fuzzing year results");
        for binning in Binning::ALL {
            let (b, r) = fuzz(base, reform, &mask, binning, &seed, config.num_to_fuzz)?;
            pairs.push(FuzzedPair { binning, base: b, reform: r });
        }
    } else {
        for binning in Binning::ALL {
            pairs.push(FuzzedPair {
                binning,
                base: base.clone(),
                reform: reform.clone(),
            });
        }
    }

    let aggregate = &pairs[0];
    let aggregates = aggregate_table(&aggregate.base, &aggregate.reform)?;
    Ok(YearSummary {
        year,
        fuzzed: fuzz_enabled,
        aggregates,
        pairs,
    })
}

fn aggregate_table(base: &Snapshot, reform: &Snapshot) -> Result<GroupTable, ValidationError> {
    let mut rows = Vec::with_capacity(3);
    for tax in [IITAX, PAYROLLTAX, COMBINED] {
        let before = base.weighted_sum(tax)?;
        let after = reform.weighted_sum(tax)?;
        rows.push((tax.to_string(), vec![before, after, after - before]));
    }
    let table = GroupTable {
        columns: ["base", "reform", "change"].map(String::from).to_vec(),
        rows,
    };
    Ok(table.scaled(BILLIONS).rounded(AGGREGATE_DECIMALS))
}
