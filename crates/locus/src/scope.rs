//! Scope providers: the queryable surface the engine resolves against.
//!
//! ```text
//! ┌──────────────────────────────┐        ┌─────────────────────────┐
//! │ Engine / Handle              │ query  │ ScopeProvider           │
//! │ (composes query paths)       │───────►│ (page, frame, mock tree)│
//! │                              │ text_of│                         │
//! │ WaitPolicy                   │───────►│ wait_for_predicate      │
//! └──────────────────────────────┘        └─────────────────────────┘
//! ```
//!
//! Providers are shared read-only by the engine. A provider that can
//! subscribe to tree mutations may override [`ScopeProvider::wait_for_predicate`];
//! the default implementation polls.

use crate::handle::Handle;
use crate::result::LocusResult;
use crate::selector::Modifier;
use crate::wait::StateExpectation;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::time::Duration;
use tracing::trace;

/// Opaque identifier of a node inside a provider
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub String);

impl NodeId {
    /// Wrap a provider-specific identifier
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Raw identifier
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Snapshot of a node's interactivity, read when a predicate is evaluated
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeState {
    /// Rendered and not hidden
    pub visible: bool,
    /// Not disabled
    pub enabled: bool,
    /// Accepts text input
    pub editable: bool,
    /// Current value for single-value controls
    pub value: Option<String>,
    /// Current values for multi-value controls
    pub values: Vec<String>,
    /// Node holds an ordered set of values (e.g. a multi-select)
    pub multi_value: bool,
}

/// Queryable handle to a subtree.
///
/// `scope` is `None` for the provider's root and `Some(node)` for a
/// previously matched node.
#[async_trait]
pub trait ScopeProvider: Send + Sync {
    /// Descendants of `scope` matching `query`, in document order
    ///
    /// A `scope` node that has left the tree fails with
    /// [`LocusError::Detached`](crate::LocusError::Detached), as do the two
    /// reads below.
    async fn query(&self, scope: Option<&NodeId>, query: &str) -> LocusResult<Vec<NodeId>>;

    /// Rendered text of `node`
    async fn text_of(&self, node: &NodeId) -> LocusResult<String>;

    /// Interactivity snapshot of `node`
    async fn inspect(&self, node: &NodeId) -> LocusResult<NodeState>;

    /// Block cooperatively until `predicate` holds for `handle`.
    ///
    /// Returns `Ok(false)` when `timeout` elapses first. Errors raised while
    /// evaluating the predicate abort the wait.
    async fn wait_for_predicate(
        &self,
        handle: &Handle<'_>,
        predicate: &StateExpectation,
        timeout: Duration,
        poll_interval: Duration,
    ) -> LocusResult<bool> {
        let poll = async {
            let mut attempts: u32 = 0;
            loop {
                attempts += 1;
                if predicate.evaluate(handle).await? {
                    return Ok(true);
                }
                trace!(handle = %handle, attempts, "predicate not yet satisfied");
                tokio::time::sleep(poll_interval).await;
            }
        };
        match tokio::time::timeout(timeout, poll).await {
            Ok(outcome) => outcome,
            Err(_elapsed) => Ok(false),
        }
    }
}

/// Interaction surface used by the action layer
#[async_trait]
pub trait ElementDriver: Send + Sync {
    /// Click `node` while holding `modifiers`
    async fn click(&self, node: &NodeId, modifiers: &BTreeSet<Modifier>) -> LocusResult<()>;

    /// Replace the value of `node`
    async fn fill(&self, node: &NodeId, value: &str) -> LocusResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_id_display() {
        let id = NodeId::new("n42");
        assert_eq!(id.to_string(), "n42");
        assert_eq!(id.as_str(), "n42");
    }

    #[test]
    fn test_node_state_default_is_inert() {
        let state = NodeState::default();
        assert!(!state.visible);
        assert!(!state.enabled);
        assert!(!state.multi_value);
        assert!(state.values.is_empty());
    }
}
