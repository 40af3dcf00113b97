//! Result and error types for Locus.

use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Result type for Locus operations
pub type LocusResult<T> = Result<T, LocusError>;

/// Query-time failure discovered when a handle is finally materialized
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolutionFailure {
    /// Nothing matched the chained query
    #[error("no element matches {query}")]
    NotFound {
        /// Rendered chain description
        query: String,
    },

    /// More than one element matched while strict matching was on
    #[error("{count} elements match {query}, expected exactly one")]
    Ambiguous {
        /// Rendered chain description
        query: String,
        /// Number of matches found
        count: usize,
    },
}

/// Errors that can occur in Locus
#[derive(Debug, Error)]
pub enum LocusError {
    /// Malformed selector chain or expectation
    #[error("Invalid selector spec: {message}")]
    InvalidSpec {
        /// Error message
        message: String,
    },

    /// Bounded state wait exceeded its limit
    #[error(
        "Timed out after {}ms waiting for {waited_for} (limit {}ms)",
        elapsed.as_millis(),
        limit.as_millis()
    )]
    LookupTimeout {
        /// Description of what was waited for
        waited_for: String,
        /// Time actually spent waiting
        elapsed: Duration,
        /// Configured limit
        limit: Duration,
    },

    /// Zero or unexpected matches when a handle was acted upon
    #[error("Resolution failed: {0}")]
    Resolution(#[from] ResolutionFailure),

    /// Scope provider failure
    #[error("Scope error: {message}")]
    Scope {
        /// Error message
        message: String,
    },

    /// Node was removed from the tree after it was matched
    #[error("Node {node} is no longer attached")]
    Detached {
        /// Provider-specific node identifier
        node: String,
    },

    /// Actor does not hold the requested capability
    #[error("Actor '{actor}' has no ability {ability}")]
    MissingAbility {
        /// Actor name
        actor: String,
        /// Ability type name
        ability: &'static str,
    },

    /// Configuration error
    #[error("Configuration error: {message}")]
    Config {
        /// Error message
        message: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),
}

impl LocusError {
    /// Shorthand for [`LocusError::InvalidSpec`]
    pub fn invalid_spec(message: impl Into<String>) -> Self {
        Self::InvalidSpec {
            message: message.into(),
        }
    }

    /// Shorthand for [`LocusError::Scope`]
    pub fn scope(message: impl Into<String>) -> Self {
        Self::Scope {
            message: message.into(),
        }
    }

    /// Shorthand for [`LocusError::Detached`]
    pub fn detached(node: impl fmt::Display) -> Self {
        Self::Detached {
            node: node.to_string(),
        }
    }

    /// Whether the node in question has left the tree
    #[must_use]
    pub const fn is_detached(&self) -> bool {
        matches!(self, Self::Detached { .. })
    }

    /// Whether this is a bounded-wait timeout
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::LookupTimeout { .. })
    }

    /// Whether this is a malformed-spec error
    #[must_use]
    pub const fn is_invalid_spec(&self) -> bool {
        matches!(self, Self::InvalidSpec { .. })
    }

    /// Whether this is a query-time resolution failure
    #[must_use]
    pub const fn is_resolution(&self) -> bool {
        matches!(self, Self::Resolution(_))
    }
}
