//! Configuration types

use crate::{ConfigError, TabulaError, TabulaResult, UnknownColumnPolicy};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// What `one()` does when more than one row matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnePolicy {
    /// Return no row.
    #[default]
    NoneOnAmbiguous,
    /// Fail with `InvalidArgument`.
    ErrorOnAmbiguous,
}

impl FromStr for OnePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" | "none_on_ambiguous" => Ok(OnePolicy::NoneOnAmbiguous),
            "error" | "error_on_ambiguous" => Ok(OnePolicy::ErrorOnAmbiguous),
            other => Err(format!("Invalid one policy: {}", other)),
        }
    }
}

/// Behaviour knobs for databases and their tables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TabulaConfig {
    /// Spawn table and database initialisation as soon as a handle is
    /// created, when a tokio runtime is available.
    pub eager_init: bool,
    /// Reject data keys that are not schema columns.
    pub strict_columns: bool,
    pub one_policy: OnePolicy,
    /// Upper bound for `take(n)`.
    pub max_take: Option<usize>,
}

impl Default for TabulaConfig {
    fn default() -> Self {
        Self {
            eager_init: true,
            strict_columns: true,
            one_policy: OnePolicy::NoneOnAmbiguous,
            max_take: None,
        }
    }
}

impl TabulaConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create from environment variables with fallback to defaults.
    ///
    /// Environment variables:
    /// - `TABULA_EAGER_INIT`: `true`/`false` (default: true)
    /// - `TABULA_STRICT_COLUMNS`: `true`/`false` (default: true)
    /// - `TABULA_ONE_POLICY`: `none` or `error` (default: none)
    /// - `TABULA_MAX_TAKE`: positive integer (default: unbounded)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            eager_init: std::env::var("TABULA_EAGER_INIT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.eager_init),
            strict_columns: std::env::var("TABULA_STRICT_COLUMNS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.strict_columns),
            one_policy: std::env::var("TABULA_ONE_POLICY")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.one_policy),
            max_take: std::env::var("TABULA_MAX_TAKE")
                .ok()
                .and_then(|s| s.parse().ok())
                .or(defaults.max_take),
        }
    }

    pub fn with_eager_init(mut self, enabled: bool) -> Self {
        self.eager_init = enabled;
        self
    }

    pub fn with_strict_columns(mut self, strict: bool) -> Self {
        self.strict_columns = strict;
        self
    }

    pub fn with_one_policy(mut self, policy: OnePolicy) -> Self {
        self.one_policy = policy;
        self
    }

    pub fn with_max_take(mut self, max: usize) -> Self {
        self.max_take = Some(max);
        self
    }

    pub fn unknown_columns(&self) -> UnknownColumnPolicy {
        if self.strict_columns {
            UnknownColumnPolicy::Reject
        } else {
            UnknownColumnPolicy::Drop
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> TabulaResult<()> {
        if self.max_take == Some(0) {
            return Err(TabulaError::Config(ConfigError::InvalidValue {
                field: "max_take".to_string(),
                value: "0".to_string(),
                reason: "max_take must be greater than 0".to_string(),
            }));
        }
        Ok(())
    }
}
