use thiserror::Error;

use crate::model::{Metric, Source};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum AggregatesError {
    /// Unresolvable entity, weight or filter mapping for one variable.
    #[error("configuration error for '{variable}': {reason}")]
    Configuration { variable: String, reason: String },

    /// No administrative totals for the requested year.
    #[error("no administrative data available for year {year}: {reason}")]
    DataUnavailable { year: i32, reason: String },

    /// Empty or contradictory request. Nothing is computed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// A weighted sum was not finite.
    #[error("non-finite {metric} total for '{variable}'")]
    NumericDegradation { variable: String, metric: Metric },

    /// TOML parse / deserialization error.
    #[error("config parse error: {0}")]
    ConfigParse(String),

    /// Config validation error (unknown source, missing weight, etc.).
    #[error("config validation error: {0}")]
    ConfigValidation(String),

    #[error("IO error: {0}")]
    Io(String),
}

impl AggregatesError {
    pub fn configuration(variable: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Configuration {
            variable: variable.into(),
            reason: reason.into(),
        }
    }

    pub fn unavailable(year: i32, reason: impl Into<String>) -> Self {
        Self::DataUnavailable {
            year,
            reason: reason.into(),
        }
    }

    /// True for failures that only degrade part of a table.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Configuration { .. } | Self::DataUnavailable { .. } | Self::NumericDegradation { .. }
        )
    }
}

/// Warning text for an error raised while computing `source`.
pub(crate) fn source_context(source: Source, err: &AggregatesError) -> String {
    format!("{source}: {err}")
}

pub type Result<T> = std::result::Result<T, AggregatesError>;
