//! Service configuration
//!
//! Loaded from TOML; every field has a default so a partial file (or none at
//! all) is valid.

use fibernet_graph::{TraceOptions, DEFAULT_INSTALLATIONS_FOUND, DEFAULT_MAX_HOPS};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Errors raised while loading configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Configuration for [`crate::UtilityNetworkService`] and the CLI
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Hop bound for connectivity traces
    pub max_trace_hops: usize,
    /// Return every splitter output as a branch unless a query says otherwise
    pub trace_fan_out_by_default: bool,
    /// Label used in outage view descriptions, rendered as `"{n} {label}"`
    pub installations_found_label: String,
    /// Default `tracing` filter when `RUST_LOG` is unset
    pub log_filter: String,
    /// Emit logs as JSON lines
    pub log_json: bool,
}

impl ServiceConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and validate a TOML document
    ///
    /// # Errors
    /// Malformed TOML or a zero hop bound
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file
    ///
    /// # Errors
    /// Unreadable file, or anything [`Self::from_toml_str`] rejects
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }

    /// # Errors
    /// `Invalid` if `max_trace_hops` is zero
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_trace_hops == 0 {
            return Err(ConfigError::Invalid("max_trace_hops must be at least 1".to_string()));
        }
        Ok(())
    }

    /// With trace hop bound
    #[inline]
    #[must_use]
    pub fn with_max_trace_hops(mut self, max: usize) -> Self {
        self.max_trace_hops = max;
        self
    }

    /// With splitter fan-out on by default
    #[inline]
    #[must_use]
    pub fn with_trace_fan_out(mut self, fan_out: bool) -> Self {
        self.trace_fan_out_by_default = fan_out;
        self
    }

    /// With outage label
    #[inline]
    #[must_use]
    pub fn with_installations_found_label(mut self, label: impl Into<String>) -> Self {
        self.installations_found_label = label.into();
        self
    }

    /// With log filter
    #[inline]
    #[must_use]
    pub fn with_log_filter(mut self, filter: impl Into<String>) -> Self {
        self.log_filter = filter.into();
        self
    }

    /// Trace options for a query, `fan_out` overriding the default when given
    #[must_use]
    pub fn trace_options(&self, fan_out: Option<bool>) -> TraceOptions {
        TraceOptions {
            fan_out: fan_out.unwrap_or(self.trace_fan_out_by_default),
            max_hops: self.max_trace_hops,
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            max_trace_hops: DEFAULT_MAX_HOPS,
            trace_fan_out_by_default: false,
            installations_found_label: DEFAULT_INSTALLATIONS_FOUND.to_string(),
            log_filter: "info".to_string(),
            log_json: false,
        }
    }
}
