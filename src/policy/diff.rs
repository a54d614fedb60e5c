//! Year-indexed policy parameter changes.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::error::ValidationError;
use crate::snapshot::is_valid_name;

/// A parameter value: a number, a boolean, or an array of them.
pub type ParamValue = JsonValue;

/// Ordered mapping of parameter name → year → value.
///
/// A value set for a year persists into later years until the same
/// parameter is set again.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PolicyDiff {
    params: BTreeMap<String, BTreeMap<i32, ParamValue>>,
}

fn check_value(param: &str, year: i32, value: &ParamValue) -> Result<(), ValidationError> {
    let ok = match value {
        JsonValue::Number(_) | JsonValue::Bool(_) => true,
        JsonValue::Array(items) => {
            !items.is_empty()
                && items
                    .iter()
                    .all(|v| matches!(v, JsonValue::Number(_) | JsonValue::Bool(_)))
        }
        JsonValue::Null | JsonValue::String(_) | JsonValue::Object(_) => false,
    };
    if ok {
        Ok(())
    } else {
        Err(ValidationError::InvalidReform {
            reason: format!("value for '{param}' in {year} must be a number, boolean or array of them"),
        })
    }
}

impl PolicyDiff {
    /// Empty diff (current law).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `param` to `value` starting in `year`.
    pub fn set(&mut self, param: impl Into<String>, year: i32, value: ParamValue) -> Result<(), ValidationError> {
        let param = param.into();
        if !is_valid_name(&param) {
            return Err(ValidationError::InvalidParameterName { name: param });
        }
        check_value(&param, year, &value)?;
        self.params.entry(param).or_default().insert(year, value);
        Ok(())
    }

    /// Builder-style `set`.
    pub fn with(mut self, param: impl Into<String>, year: i32, value: ParamValue) -> Result<Self, ValidationError> {
        self.set(param, year, value)?;
        Ok(self)
    }

    /// True when no parameter is changed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.params.values().all(BTreeMap::is_empty)
    }

    /// Names of changed parameters, sorted.
    pub fn params(&self) -> impl Iterator<Item = &str> {
        self.params.keys().map(String::as_str)
    }

    /// Year-indexed values of one parameter.
    #[must_use]
    pub fn get(&self, param: &str) -> Option<&BTreeMap<i32, ParamValue>> {
        self.params.get(param)
    }

    /// Value in effect for `param` at `year` from this diff alone.
    #[must_use]
    pub fn value_at(&self, param: &str, year: i32) -> Option<&ParamValue> {
        self.params
            .get(param)
            .and_then(|years| years.range(..=year).next_back())
            .map(|(_, v)| v)
    }

    /// Earliest year any parameter changes.
    #[must_use]
    pub fn first_year(&self) -> Option<i32> {
        self.params.values().filter_map(|years| years.keys().next().copied()).min()
    }

    /// Validate names and values, e.g. after deserialization.
    pub fn validate(&self) -> Result<(), ValidationError> {
        for (param, years) in &self.params {
            if !is_valid_name(param) {
                return Err(ValidationError::InvalidParameterName { name: param.clone() });
            }
            for (year, value) in years {
                check_value(param, *year, value)?;
            }
        }
        Ok(())
    }

    /// Parse a JSON object, either bare or wrapped as `{"policy": {...}}`.
    pub fn from_json_value(value: JsonValue) -> Result<Self, ValidationError> {
        let inner = match value {
            JsonValue::Object(mut map) if map.len() == 1 && map.contains_key("policy") => {
                map.remove("policy").unwrap_or(JsonValue::Null)
            }
            other => other,
        };
        if !inner.is_object() {
            return Err(ValidationError::InvalidReform {
                reason: "reform must be a JSON object of parameter → year → value".to_string(),
            });
        }
        let diff: Self = serde_json::from_value(inner).map_err(|e| ValidationError::InvalidReform {
            reason: e.to_string(),
        })?;
        diff.validate()?;
        Ok(diff)
    }

    /// Canonical text used for hashing: sorted keys, no whitespace.
    #[must_use]
    pub fn canonical_json(&self) -> String {
        // BTreeMap keys serialize in order; the output is stable.
        serde_json::to_string(self).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn value_persists_forward() {
        let diff = PolicyDiff::new().with("II_em", 2019, json!(0)).unwrap();
        assert_eq!(diff.value_at("II_em", 2018), None);
        assert_eq!(diff.value_at("II_em", 2025), Some(&json!(0)));
    }

    #[test]
    fn parses_wrapped_and_bare_reforms() {
        let bare = PolicyDiff::from_json_value(json!({"SS_Earnings_thd": {"2021": 400000}})).unwrap();
        let wrapped =
            PolicyDiff::from_json_value(json!({"policy": {"SS_Earnings_thd": {"2021": 400000}}})).unwrap();
        assert_eq!(bare, wrapped);
        assert_eq!(bare.first_year(), Some(2021));
    }

    #[test]
    fn rejects_non_numeric_values() {
        let err = PolicyDiff::from_json_value(json!({"II_em": {"2021": "lots"}})).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidReform { .. }));
    }

    #[test]
    fn rejects_non_integer_years() {
        assert!(PolicyDiff::from_json_value(json!({"II_em": {"soon": 1}})).is_err());
    }

    #[test]
    fn rejects_bad_parameter_names() {
        assert!(PolicyDiff::new().set("bad name", 2021, json!(1)).is_err());
    }

    #[test]
    fn canonical_json_is_order_independent() {
        let a = PolicyDiff::new()
            .with("b", 2021, json!(1))
            .unwrap()
            .with("a", 2021, json!(2))
            .unwrap();
        let b = PolicyDiff::new()
            .with("a", 2021, json!(2))
            .unwrap()
            .with("b", 2021, json!(1))
            .unwrap();
        assert_eq!(a.canonical_json(), b.canonical_json());
    }
}
