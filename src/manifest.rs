//! Audit record describing one run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::fuzz::FuzzSeed;
use crate::policy::UserMods;
use crate::records::Records;
use crate::scheduler::RunMode;
use crate::window::BudgetWindow;

/// Identifies what a run computed, so published tables can be traced back
/// to their inputs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunManifest {
    /// Random identifier of this run.
    pub run_id: Uuid,
    /// When the run finished.
    pub created_at: DateTime<Utc>,
    /// Budget window.
    pub window: BudgetWindow,
    /// Static or dynamic.
    pub mode: RunMode,
    /// BLAKE3 hex digest of the microdata table.
    pub records_fingerprint: String,
    /// BLAKE3 hex digest of the canonical reform specification.
    pub reform_fingerprint: String,
    /// Fuzz seed per window year, hex, when results were fuzzed.
    pub fuzz_seeds: Option<Vec<(i32, String)>>,
}

impl RunManifest {
    /// Describe a run that just finished.
    #[must_use]
    pub fn new(window: BudgetWindow, mode: RunMode, records: &Records, mods: &UserMods, fuzzed: bool) -> Self {
        let fuzz_seeds = fuzzed.then(|| {
            window
                .years()
                .map(|year| (year, FuzzSeed::from_user_mods(mods, year).to_hex()))
                .collect()
        });
        Self {
            run_id: Uuid::new_v4(),
            created_at: Utc::now(),
            window,
            mode,
            records_fingerprint: records.fingerprint(),
            reform_fingerprint: reform_fingerprint(mods),
            fuzz_seeds,
        }
    }

    /// Serialize as pretty JSON.
    #[must_use]
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }
}

/// BLAKE3 hex digest of the canonical form of `mods`.
#[must_use]
pub fn reform_fingerprint(mods: &UserMods) -> String {
    blake3::hash(mods.canonical_json().as_bytes()).to_hex().to_string()
}
