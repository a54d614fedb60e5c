//! Run configuration.
//!
//! Configuration is a plain value: it is validated once when a run is built
//! and never changed afterwards.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::fuzz::{AFFECTED_TOLERANCE, NUM_TO_FUZZ};
use crate::incidence::IncidenceParameters;
use crate::records::MicrodataConfig;
use crate::window::SupportedYears;

/// Year-task pool settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Worker threads; 0 runs every task on the calling thread.
    pub workers: usize,
    /// Maximum queued tasks.
    pub queue_capacity: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            queue_capacity: 64,
        }
    }
}

impl SchedulerConfig {
    /// Run tasks on the calling thread.
    #[must_use]
    pub const fn sequential() -> Self {
        Self {
            workers: 0,
            queue_capacity: 1,
        }
    }

    /// Validate settings.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.queue_capacity == 0 {
            return Err(ValidationError::InvalidConfig {
                reason: "scheduler.queue_capacity must be > 0".to_string(),
            });
        }
        Ok(())
    }
}

/// Privacy fuzzing settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FuzzConfig {
    /// Rows reverted per bin.
    pub num_to_fuzz: usize,
    /// Absolute tolerance below which combined tax counts as unchanged.
    pub affected_tolerance: f64,
}

impl Default for FuzzConfig {
    fn default() -> Self {
        Self {
            num_to_fuzz: NUM_TO_FUZZ,
            affected_tolerance: AFFECTED_TOLERANCE,
        }
    }
}

impl FuzzConfig {
    /// Validate settings.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !self.affected_tolerance.is_finite() || self.affected_tolerance < 0.0 {
            return Err(ValidationError::InvalidConfig {
                reason: "fuzz.affected_tolerance must be a non-negative number".to_string(),
            });
        }
        Ok(())
    }
}

/// Everything tunable about a run.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BrainConfig {
    /// Year-task pool.
    pub scheduler: SchedulerConfig,
    /// Privacy fuzzing.
    pub fuzz: FuzzConfig,
    /// Years the engine supports.
    pub supported_years: SupportedYears,
    /// Default incidence assumptions.
    pub incidence: IncidenceParameters,
    /// Where named microdata live.
    pub microdata: MicrodataConfig,
}

impl BrainConfig {
    /// Parse JSON; missing sections take their defaults.
    pub fn from_json_str(text: &str) -> Result<Self, ValidationError> {
        let config: Self = serde_json::from_str(text).map_err(|e| ValidationError::InvalidConfig {
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ValidationError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| ValidationError::InvalidConfig {
            reason: format!("cannot read '{}': {e}", path.display()),
        })?;
        Self::from_json_str(&text)
    }

    /// Validate every section.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.scheduler.validate()?;
        self.fuzz.validate()?;
        self.supported_years.validate()?;
        self.incidence.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        BrainConfig::default().validate().unwrap();
        assert_eq!(BrainConfig::default().fuzz.num_to_fuzz, 3);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config = BrainConfig::from_json_str(r#"{"scheduler": {"workers": 2}}"#).unwrap();
        assert_eq!(config.scheduler.workers, 2);
        assert_eq!(config.scheduler.queue_capacity, 64);
        assert_eq!(config.supported_years, SupportedYears::default());
    }

    #[test]
    fn rejects_zero_queue() {
        let err = BrainConfig::from_json_str(r#"{"scheduler": {"queue_capacity": 0}}"#).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidConfig { .. }));
    }

    #[test]
    fn rejects_bad_incidence_defaults() {
        let text = r#"{"incidence": {
            "short_run": {"labor": 0.0, "shareholder": 1.0, "other_capital": 0.0},
            "long_run": {"labor": 0.9, "shareholder": 0.9, "other_capital": 0.0},
            "transition_years": 10
        }}"#;
        assert!(BrainConfig::from_json_str(text).is_err());
    }

    #[test]
    fn reads_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("taxbrain.json");
        fs::write(&path, r#"{"fuzz": {"num_to_fuzz": 5}}"#).unwrap();
        let config = BrainConfig::from_json_file(&path).unwrap();
        assert_eq!(config.fuzz.num_to_fuzz, 5);
        assert!((config.fuzz.affected_tolerance - 0.01).abs() < f64::EPSILON);
    }
}
