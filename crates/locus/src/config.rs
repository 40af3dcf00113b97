//! Engine configuration.
//!
//! Loaded from YAML, then optionally overridden from the environment:
//!
//! | Variable                 | Field               |
//! |--------------------------|---------------------|
//! | `LOCUS_TIMEOUT_MS`       | `default_timeout_ms`|
//! | `LOCUS_POLL_INTERVAL_MS` | `poll_interval_ms`  |
//! | `LOCUS_STRICT`           | `strict`            |

use crate::result::{LocusError, LocusResult};
use crate::wait::{DEFAULT_POLL_INTERVAL_MS, DEFAULT_WAIT_TIMEOUT_MS};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Environment variable overriding the default wait limit
pub const ENV_TIMEOUT_MS: &str = "LOCUS_TIMEOUT_MS";
/// Environment variable overriding the poll interval
pub const ENV_POLL_INTERVAL_MS: &str = "LOCUS_POLL_INTERVAL_MS";
/// Environment variable overriding strict matching
pub const ENV_STRICT: &str = "LOCUS_STRICT";

/// Configuration shared by every resolution an engine performs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocusConfig {
    /// Wait limit when neither the chain nor the call sets one
    pub default_timeout_ms: u64,
    /// Delay between predicate evaluations
    pub poll_interval_ms: u64,
    /// Reject multiple matches when a single element is required
    pub strict: bool,
}

impl Default for LocusConfig {
    fn default() -> Self {
        Self {
            default_timeout_ms: DEFAULT_WAIT_TIMEOUT_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            strict: true,
        }
    }
}

impl LocusConfig {
    /// Parse from YAML and validate
    pub fn from_yaml_str(yaml: &str) -> LocusResult<Self> {
        let config: Self = serde_yaml_ng::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a YAML file and validate
    pub fn load(path: impl AsRef<Path>) -> LocusResult<Self> {
        let yaml = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&yaml)
    }

    /// Apply `LOCUS_*` environment overrides and validate
    pub fn with_env_overrides(self) -> LocusResult<Self> {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary lookup (the environment in production)
    pub fn with_overrides_from<F>(mut self, lookup: F) -> LocusResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(ENV_TIMEOUT_MS) {
            self.default_timeout_ms = parse_var(ENV_TIMEOUT_MS, &raw)?;
        }
        if let Some(raw) = lookup(ENV_POLL_INTERVAL_MS) {
            self.poll_interval_ms = parse_var(ENV_POLL_INTERVAL_MS, &raw)?;
        }
        if let Some(raw) = lookup(ENV_STRICT) {
            self.strict = parse_var(ENV_STRICT, &raw)?;
        }
        self.validate()?;
        Ok(self)
    }

    /// Reject limits the wait loop cannot honor
    pub fn validate(&self) -> LocusResult<()> {
        if self.default_timeout_ms == 0 {
            return Err(config_error("default_timeout_ms must be positive"));
        }
        if self.poll_interval_ms == 0 {
            return Err(config_error("poll_interval_ms must be positive"));
        }
        if self.poll_interval_ms > self.default_timeout_ms {
            return Err(config_error(format!(
                "poll_interval_ms ({}) exceeds default_timeout_ms ({})",
                self.poll_interval_ms, self.default_timeout_ms
            )));
        }
        Ok(())
    }

    /// Default wait limit
    #[must_use]
    pub const fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.default_timeout_ms)
    }

    /// Poll interval
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

fn parse_var<T: FromStr>(key: &str, raw: &str) -> LocusResult<T> {
    raw.trim()
        .parse()
        .map_err(|_| config_error(format!("{key}={raw:?} is not valid")))
}

fn config_error(message: impl Into<String>) -> LocusError {
    LocusError::Config {
        message: message.into(),
    }
}
