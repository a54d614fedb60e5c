//! Policy parameters: diffs, layered state and reform inputs.

pub mod diff;
pub mod input;

pub use diff::{ParamValue, PolicyDiff};
pub use input::{Assumptions, BehaviorParams, ReformInput, StackedReform, UserMods};

use std::sync::Arc;

/// Current law plus an ordered stack of diffs.
///
/// Cloning is cheap: layers are shared. For any `(param, year)` the most
/// recently pushed layer that sets `param` at or before `year` wins.
#[derive(Debug, Clone, Default)]
pub struct PolicyState {
    layers: Vec<Arc<PolicyDiff>>,
}

impl PolicyState {
    /// Current law.
    #[must_use]
    pub fn current_law() -> Self {
        Self::default()
    }

    /// Current law with `base` applied, then `reform` on top.
    #[must_use]
    pub fn layered(base: &PolicyDiff, reform: &PolicyDiff) -> Self {
        let mut state = Self::current_law();
        state.push(base.clone());
        state.push(reform.clone());
        state
    }

    /// Apply another diff on top of the existing layers.
    pub fn push(&mut self, diff: PolicyDiff) {
        if !diff.is_empty() {
            self.layers.push(Arc::new(diff));
        }
    }

    /// Value in effect for `param` at `year`, or `None` for current law.
    #[must_use]
    pub fn value_at(&self, param: &str, year: i32) -> Option<&ParamValue> {
        self.layers.iter().rev().find_map(|layer| layer.value_at(param, year))
    }

    /// Convenience numeric lookup; arrays yield their first element.
    #[must_use]
    pub fn f64_at(&self, param: &str, year: i32) -> Option<f64> {
        match self.value_at(param, year)? {
            ParamValue::Array(items) => items.first().and_then(ParamValue::as_f64),
            ParamValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            other => other.as_f64(),
        }
    }

    /// Number of non-empty layers.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.layers.len()
    }
}
