//! Error types for TaxBrain.
//!
//! Errors are split the same way a run can fail: validation errors are raised
//! before any simulation work starts, execution errors abort a run that is
//! already under way. Nothing is retried and no partial results are kept.

use thiserror::Error;

/// Validation errors raised at construction time or at a call boundary.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Invalid budget window: end year {end_year} is before start year {start_year}")]
    InvalidYearRange {
        start_year: i32,
        end_year: i32,
    },

    #[error("Year {year} is outside the supported range [{first}, {last}]")]
    YearOutOfRange {
        year: i32,
        first: i32,
        last: i32,
    },

    #[error("Conflicting microdata: {reason}")]
    ConflictingMicrodata {
        reason: String,
    },

    #[error("Corporate revenue series has {actual} entries, budget window needs {expected}")]
    CorpRevenueLength {
        expected: usize,
        actual: usize,
    },

    #[error("Corporate revenue for {year} is not a finite number: {value}")]
    NonFiniteRevenue {
        year: i32,
        value: f64,
    },

    #[error("Assumption keys {actual:?} do not match expected keys {expected:?}")]
    InvalidAssumptionKeys {
        expected: Vec<String>,
        actual: Vec<String>,
    },

    #[error("Invalid assumption: {reason}")]
    InvalidAssumption {
        reason: String,
    },

    #[error("Invalid reform: {reason}")]
    InvalidReform {
        reason: String,
    },

    #[error("Incidence shares for '{vector}' sum to {sum}, expected 1.0")]
    InvalidIncidenceShares {
        vector: String,
        sum: f64,
    },

    #[error("Column '{column}' is missing")]
    MissingColumn {
        column: String,
    },

    #[error("Column '{column}' has {actual} rows, expected {expected}")]
    ColumnLength {
        column: String,
        expected: usize,
        actual: usize,
    },

    #[error("Invalid {kind} selector '{value}'")]
    InvalidSelector {
        kind: String,
        value: String,
    },

    #[error("Invalid variables: {reason}")]
    InvalidVariables {
        reason: String,
    },

    #[error("Invalid parameter name '{name}'")]
    InvalidParameterName {
        name: String,
    },

    #[error("Invalid sample specification: {reason}")]
    InvalidSampling {
        reason: String,
    },

    #[error("Year {year} is not part of this run")]
    UnknownYear {
        year: i32,
    },

    #[error("Stacked reform has no provisions")]
    EmptyStack,

    #[error("Results requested before the simulation was run: {what}")]
    NotRun {
        what: String,
    },

    #[error("Invalid configuration: {reason}")]
    InvalidConfig {
        reason: String,
    },
}

/// Execution errors raised while a run is in progress.
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("Tax engine failed for {year}: {message}")]
    Engine {
        year: i32,
        message: String,
    },

    #[error("Behavioral response failed for {year}: {message}")]
    Behavior {
        year: i32,
        message: String,
    },

    #[error("Cannot distribute {target} to bucket '{bucket}': its weighted income total is zero")]
    UndistributableBucket {
        bucket: String,
        target: f64,
    },

    #[error("Calculator is at {current}, cannot move back to {requested}")]
    YearRegression {
        current: i32,
        requested: i32,
    },

    #[error("Scheduler disconnected while waiting for {year}")]
    Disconnected {
        year: i32,
    },

    #[error("Year task for {year} panicked")]
    TaskPanicked {
        year: i32,
    },

    #[error("I/O error on '{path}': {message}")]
    Io {
        path: String,
        message: String,
    },

    #[error("Malformed microdata: {message}")]
    Csv {
        message: String,
    },
}

/// Top-level error type for TaxBrain.
#[derive(Debug, Error)]
pub enum BrainError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Execution error: {0}")]
    Execution(#[from] ExecutionError),

    #[error("Internal error: {message}")]
    Internal {
        message: String,
    },
}

impl BrainError {
    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns true if this is a validation error.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Returns true if this is an execution error.
    #[must_use]
    pub const fn is_execution(&self) -> bool {
        matches!(self, Self::Execution(_))
    }

    /// Returns true if this is an internal error.
    #[must_use]
    pub const fn is_internal(&self) -> bool {
        matches!(self, Self::Internal { .. })
    }
}

/// Result type alias for TaxBrain operations.
pub type BrainResult<T> = Result<T, BrainError>;
