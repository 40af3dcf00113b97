//! Bounded state waiting on resolved handles.
//!
//! A wait is a single bounded attempt: the provider's
//! [`wait_for_predicate`](crate::scope::ScopeProvider::wait_for_predicate)
//! suspends until the expectation holds or the limit passes, and a miss is
//! reported as [`LocusError::LookupTimeout`] with the elapsed time and the
//! limit. There is no retry on top of that.
//!
//! | State          | Holds when                                         |
//! |----------------|----------------------------------------------------|
//! | `attached`     | a node matches                                     |
//! | `visible`      | a node matches and is rendered                     |
//! | `hidden`       | nothing matches, the match is not rendered, or it  |
//! |                | left the tree before it could be read              |
//! | `enabled`      | visible and enabled                                |
//! | `disabled`     | visible and disabled                               |
//! | `editable`     | visible and editable                               |
//! | `not-editable` | visible and not editable                           |
//! | `has-text`     | rendered text matches the expected value           |
//! | `has-value`    | value (or ordered values) match the expectation    |

use crate::config::LocusConfig;
use crate::handle::Handle;
use crate::result::{LocusError, LocusResult};
use crate::scope::{NodeId, NodeState};
use crate::selector::{StateKind, TextMatcher, ValueExpectation};
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, trace, warn};

// =============================================================================
// CONSTANTS
// =============================================================================

/// Default timeout for wait operations (30 seconds)
pub const DEFAULT_WAIT_TIMEOUT_MS: u64 = 30_000;

/// Default polling interval (50ms)
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 50;

// =============================================================================
// STATE EXPECTATION
// =============================================================================

/// Predicate evaluated against a handle while waiting
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateExpectation {
    /// A content-free state (`attached` .. `not-editable`)
    State(StateKind),
    /// Rendered text matches
    HasText(TextMatcher),
    /// Current value matches
    HasValue(ValueExpectation),
}

impl StateExpectation {
    /// Expectation for a content-free state
    pub fn from_state(kind: StateKind) -> LocusResult<Self> {
        if kind.needs_expected_value() {
            return Err(LocusError::invalid_spec(format!(
                "state {kind} needs an expected value"
            )));
        }
        Ok(Self::State(kind))
    }

    /// Expectation for any state, with the expected content for `has-text` /
    /// `has-value`
    pub fn with_expected(kind: StateKind, expected: Option<ValueExpectation>) -> LocusResult<Self> {
        match (kind, expected) {
            (StateKind::HasText, Some(ValueExpectation::Single(matcher))) => {
                Ok(Self::HasText(matcher))
            }
            (StateKind::HasText, Some(ValueExpectation::Many(_))) => Err(
                LocusError::invalid_spec("has-text takes a single expected value"),
            ),
            (StateKind::HasValue, Some(expected)) => Ok(Self::HasValue(expected)),
            (kind, _) => Self::from_state(kind),
        }
    }

    /// Rendered text expectation
    #[must_use]
    pub fn has_text(matcher: impl Into<TextMatcher>) -> Self {
        Self::HasText(matcher.into())
    }

    /// Single value expectation
    #[must_use]
    pub fn has_value(matcher: impl Into<TextMatcher>) -> Self {
        Self::HasValue(ValueExpectation::Single(matcher.into()))
    }

    /// Ordered multi-value expectation
    #[must_use]
    pub fn has_values<I, M>(matchers: I) -> Self
    where
        I: IntoIterator<Item = M>,
        M: Into<TextMatcher>,
    {
        Self::HasValue(ValueExpectation::Many(
            matchers.into_iter().map(Into::into).collect(),
        ))
    }

    /// State kind this expectation checks
    #[must_use]
    pub const fn kind(&self) -> StateKind {
        match self {
            Self::State(kind) => *kind,
            Self::HasText(_) => StateKind::HasText,
            Self::HasValue(_) => StateKind::HasValue,
        }
    }

    /// Evaluate once against the live tree.
    ///
    /// An absent node is simply "not yet" (except for `hidden`). That includes
    /// a node detached between matching and reading it. Ambiguous strict
    /// matches and multi-value misuse are errors.
    pub async fn evaluate(&self, handle: &Handle<'_>) -> LocusResult<bool> {
        let Some(node) = handle.try_element().await? else {
            return Ok(self.kind() == StateKind::Hidden);
        };

        match self.evaluate_node(handle, &node).await {
            Err(err) if err.is_detached() => {
                trace!(%node, "matched node detached before it was read");
                Ok(self.kind() == StateKind::Hidden)
            }
            outcome => outcome,
        }
    }

    async fn evaluate_node(&self, handle: &Handle<'_>, node: &NodeId) -> LocusResult<bool> {
        let provider = handle.provider();
        match self {
            Self::State(kind) => {
                let state = provider.inspect(node).await?;
                Ok(state_holds(*kind, &state))
            }
            Self::HasText(matcher) => Ok(matcher.matches(&provider.text_of(node).await?)),
            Self::HasValue(ValueExpectation::Single(matcher)) => {
                let state = provider.inspect(node).await?;
                Ok(state.value.as_deref().is_some_and(|v| matcher.matches(v)))
            }
            Self::HasValue(ValueExpectation::Many(matchers)) => {
                let state = provider.inspect(node).await?;
                if !state.multi_value {
                    return Err(LocusError::invalid_spec(format!(
                        "{handle} does not hold multiple values"
                    )));
                }
                Ok(state.values.len() == matchers.len()
                    && matchers
                        .iter()
                        .zip(&state.values)
                        .all(|(matcher, value)| matcher.matches(value)))
            }
        }
    }
}

fn state_holds(kind: StateKind, state: &NodeState) -> bool {
    match kind {
        StateKind::Attached => true,
        StateKind::Visible => state.visible,
        StateKind::Hidden => !state.visible,
        StateKind::Enabled => state.visible && state.enabled,
        StateKind::Disabled => state.visible && !state.enabled,
        StateKind::Editable => state.visible && state.enabled && state.editable,
        StateKind::NotEditable => state.visible && !(state.enabled && state.editable),
        StateKind::HasText | StateKind::HasValue => false,
    }
}

impl fmt::Display for StateExpectation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::State(kind) => write!(f, "{kind}"),
            Self::HasText(matcher) => write!(f, "has-text {matcher}"),
            Self::HasValue(ValueExpectation::Single(matcher)) => write!(f, "has-value {matcher}"),
            Self::HasValue(ValueExpectation::Many(matchers)) => {
                let rendered: Vec<String> = matchers.iter().map(ToString::to_string).collect();
                write!(f, "has-value [{}]", rendered.join(", "))
            }
        }
    }
}

// =============================================================================
// WAIT RESULT
// =============================================================================

/// Result of a successful wait
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaitResult {
    /// Time spent waiting
    pub elapsed: Duration,
    /// Description of what was waited for
    pub waited_for: String,
}

// =============================================================================
// WAIT POLICY
// =============================================================================

/// Couples a resolved handle with one bounded state wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitPolicy {
    timeout: Duration,
    poll_interval: Duration,
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self::from_config(&LocusConfig::default())
    }
}

impl WaitPolicy {
    /// Policy with a default limit and a poll interval
    #[must_use]
    pub const fn new(timeout: Duration, poll_interval: Duration) -> Self {
        Self {
            timeout,
            poll_interval,
        }
    }

    /// Policy carrying the configured limit and poll interval
    #[must_use]
    pub const fn from_config(config: &LocusConfig) -> Self {
        Self::new(config.default_timeout(), config.poll_interval())
    }

    /// Limit used when a wait names none
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Delay between predicate evaluations
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Wait until `expectation` holds for `handle`.
    ///
    /// `timeout` overrides the policy default for this call only.
    pub async fn wait_for(
        &self,
        handle: &Handle<'_>,
        expectation: &StateExpectation,
        timeout: Option<Duration>,
    ) -> LocusResult<WaitResult> {
        let limit = timeout.unwrap_or(self.timeout);
        let waited_for = format!("{handle} to be {expectation}");
        let start = Instant::now();

        let satisfied = handle
            .provider()
            .wait_for_predicate(handle, expectation, limit, self.poll_interval)
            .await?;
        let elapsed = start.elapsed();

        if satisfied {
            debug!(
                target = %handle,
                state = %expectation,
                elapsed_ms = elapsed.as_millis() as u64,
                "wait satisfied"
            );
            Ok(WaitResult {
                elapsed,
                waited_for,
            })
        } else {
            warn!(
                target = %handle,
                state = %expectation,
                elapsed_ms = elapsed.as_millis() as u64,
                limit_ms = limit.as_millis() as u64,
                "wait timed out"
            );
            Err(LocusError::LookupTimeout {
                waited_for,
                elapsed,
                limit,
            })
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
