//! Behavioral response seam.

use crate::calculator::Calculator;
use crate::policy::BehaviorParams;
use crate::snapshot::Snapshot;

/// External behavioral-response model.
///
/// Receives private forks of the baseline and reform calculators, already
/// advanced to the target year, and returns the adjusted baseline and reform
/// tables. The model computes liabilities itself.
pub trait BehavioralResponse: Send + Sync {
    /// Compute behavior-adjusted results for the year both forks are in.
    ///
    /// # Errors
    /// A message describing why the response could not be computed.
    fn respond(
        &self,
        base: Calculator,
        reform: Calculator,
        params: &BehaviorParams,
    ) -> Result<(Snapshot, Snapshot), String>;
}

#[cfg(test)]
pub(crate) mod test_response {
    use super::*;
    use crate::snapshot::COMBINED;

    /// Computes both sides statically, then scales the reform's combined
    /// tax by `1 - sub`.
    pub(crate) struct DampedResponse;

    impl BehavioralResponse for DampedResponse {
        fn respond(
            &self,
            mut base: Calculator,
            mut reform: Calculator,
            params: &BehaviorParams,
        ) -> Result<(Snapshot, Snapshot), String> {
            base.calc_all().map_err(|e| e.to_string())?;
            reform.calc_all().map_err(|e| e.to_string())?;
            let sub = params.get("sub").unwrap_or(0.0);
            let mut adjusted = reform.table().clone();
            let scaled: Vec<f64> = adjusted
                .column(COMBINED)
                .map_err(|e| e.to_string())?
                .iter()
                .map(|v| v * (1.0 - sub))
                .collect();
            adjusted.set_column(COMBINED, scaled).map_err(|e| e.to_string())?;
            Ok((base.table().clone(), adjusted))
        }
    }
}
