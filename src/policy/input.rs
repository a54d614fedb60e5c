//! User-facing reform inputs, resolved once at the boundary.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::error::ValidationError;
use crate::growth::GrowDiff;
use crate::snapshot::is_valid_name;

use super::diff::PolicyDiff;

/// How a reform is handed in.
#[derive(Debug, Clone, PartialEq)]
pub enum ReformInput {
    /// Path to a JSON reform file.
    FilePath(PathBuf),
    /// JSON reform text.
    InlineText(String),
    /// Already structured diff.
    StructuredDiff(PolicyDiff),
}

impl From<PolicyDiff> for ReformInput {
    fn from(diff: PolicyDiff) -> Self {
        Self::StructuredDiff(diff)
    }
}

fn read_text(path: &Path) -> Result<String, ValidationError> {
    fs::read_to_string(path).map_err(|e| ValidationError::InvalidReform {
        reason: format!("cannot read '{}': {e}", path.display()),
    })
}

fn parse_json(text: &str) -> Result<JsonValue, ValidationError> {
    serde_json::from_str(text).map_err(|e| ValidationError::InvalidReform {
        reason: format!("malformed JSON: {e}"),
    })
}

impl ReformInput {
    /// Resolve to a validated `PolicyDiff`.
    pub fn resolve(self) -> Result<PolicyDiff, ValidationError> {
        match self {
            Self::FilePath(path) => PolicyDiff::from_json_value(parse_json(&read_text(&path)?)?),
            Self::InlineText(text) => PolicyDiff::from_json_value(parse_json(&text)?),
            Self::StructuredDiff(diff) => {
                diff.validate()?;
                Ok(diff)
            }
        }
    }
}

const ASSUMPTION_KEYS: [&str; 3] = ["consumption", "growdiff_baseline", "growdiff_response"];

/// Economic assumptions that accompany a reform.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Assumptions {
    /// Consumption parameters passed through to the engine.
    pub consumption: PolicyDiff,
    /// Growth-rate changes applied to both calculators.
    pub growdiff_baseline: GrowDiff,
    /// Growth-rate changes applied to the reform calculator only.
    pub growdiff_response: GrowDiff,
}

impl Assumptions {
    /// Parse assumptions JSON. The key set must be exactly
    /// `consumption`, `growdiff_baseline`, `growdiff_response`.
    pub fn from_json_str(text: &str) -> Result<Self, ValidationError> {
        let value: JsonValue = serde_json::from_str(text).map_err(|e| ValidationError::InvalidAssumption {
            reason: format!("malformed JSON: {e}"),
        })?;
        let JsonValue::Object(map) = &value else {
            return Err(ValidationError::InvalidAssumption {
                reason: "assumptions must be a JSON object".to_string(),
            });
        };
        let actual: BTreeSet<&str> = map.keys().map(String::as_str).collect();
        let expected: BTreeSet<&str> = ASSUMPTION_KEYS.into_iter().collect();
        if actual != expected {
            return Err(ValidationError::InvalidAssumptionKeys {
                expected: expected.iter().map(|k| (*k).to_string()).collect(),
                actual: actual.iter().map(|k| (*k).to_string()).collect(),
            });
        }
        let assumptions: Self = serde_json::from_value(value).map_err(|e| ValidationError::InvalidAssumption {
            reason: e.to_string(),
        })?;
        assumptions.validate()?;
        Ok(assumptions)
    }

    /// Parse an assumptions file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ValidationError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| ValidationError::InvalidAssumption {
            reason: format!("cannot read '{}': {e}", path.display()),
        })?;
        Self::from_json_str(&text)
    }

    /// Validate every part.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.consumption.validate()?;
        self.growdiff_baseline.validate()?;
        self.growdiff_response.validate()
    }
}

/// Behavioral elasticities keyed by name, e.g. `{"sub": 0.25}`.
///
/// Empty parameters mean a static run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BehaviorParams {
    elasticities: BTreeMap<String, f64>,
}

impl BehaviorParams {
    /// No behavioral response.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set one elasticity.
    pub fn set(&mut self, name: impl Into<String>, value: f64) -> Result<(), ValidationError> {
        let name = name.into();
        if !is_valid_name(&name) {
            return Err(ValidationError::InvalidParameterName { name });
        }
        if !value.is_finite() {
            return Err(ValidationError::InvalidAssumption {
                reason: format!("elasticity '{name}' is not finite"),
            });
        }
        self.elasticities.insert(name, value);
        Ok(())
    }

    /// Builder-style `set`.
    pub fn with(mut self, name: impl Into<String>, value: f64) -> Result<Self, ValidationError> {
        self.set(name, value)?;
        Ok(self)
    }

    /// One elasticity, if set.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<f64> {
        self.elasticities.get(name).copied()
    }

    /// True when no elasticities are set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.elasticities.is_empty()
    }

    /// All elasticities, sorted by name.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.elasticities.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

/// The full reform specification: everything that defines a run's inputs
/// apart from the microdata itself.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserMods {
    /// Reform parameters layered on top of the base policy.
    pub policy: PolicyDiff,
    /// Baseline changes relative to current law.
    pub base_policy: PolicyDiff,
    /// Behavioral elasticities.
    pub behavior: BehaviorParams,
    /// Economic assumptions.
    pub assumptions: Assumptions,
}

impl UserMods {
    /// Canonical serialization; stable for equal specifications.
    #[must_use]
    pub fn canonical_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Row labels the stacked table reserves for itself.
pub const RESERVED_PROVISION_NAMES: [&str; 2] = ["Baseline", "Total"];

/// Ordered named provisions. Order decides attribution.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StackedReform {
    provisions: Vec<(String, PolicyDiff)>,
}

impl StackedReform {
    /// Resolve named inputs in order.
    ///
    /// # Errors
    /// `EmptyStack` for no provisions, `InvalidReform` for duplicate or
    /// reserved names, plus any error from resolving an input.
    pub fn from_inputs<I, S>(inputs: I) -> Result<Self, ValidationError>
    where
        I: IntoIterator<Item = (S, ReformInput)>,
        S: Into<String>,
    {
        let mut provisions: Vec<(String, PolicyDiff)> = Vec::new();
        for (name, input) in inputs {
            let name = name.into();
            if name.trim().is_empty() || RESERVED_PROVISION_NAMES.contains(&name.as_str()) {
                return Err(ValidationError::InvalidReform {
                    reason: format!("'{name}' cannot be used as a provision name"),
                });
            }
            if provisions.iter().any(|(n, _)| *n == name) {
                return Err(ValidationError::InvalidReform {
                    reason: format!("provision '{name}' appears twice"),
                });
            }
            provisions.push((name, input.resolve()?));
        }
        if provisions.is_empty() {
            return Err(ValidationError::EmptyStack);
        }
        Ok(Self { provisions })
    }

    /// Provisions in stacking order.
    #[must_use]
    pub fn provisions(&self) -> &[(String, PolicyDiff)] {
        &self.provisions
    }

    /// Number of provisions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.provisions.len()
    }

    /// Always false for a constructed stack.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.provisions.is_empty()
    }

    /// Every provision merged in order into one diff; later provisions win.
    #[must_use]
    pub fn combined(&self) -> PolicyDiff {
        let mut out = PolicyDiff::new();
        for (_, diff) in &self.provisions {
            for param in diff.params() {
                if let Some(years) = diff.get(param) {
                    for (year, value) in years {
                        // Values were validated when the provision was resolved.
                        let _ = out.set(param, *year, value.clone());
                    }
                }
            }
        }
        out
    }
}
