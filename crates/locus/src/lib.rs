//! Locus: selector chain resolution for scoped element trees
//!
//! A selector is either a bare query string or a chain that narrows a base
//! query by text and descends into nested sub-selectors. The engine turns a
//! chain into a lazy [`Handle`] without touching the tree, then optionally
//! performs one bounded wait for a required state.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    LOCUS Architecture                            │
//! ├─────────────────────────────────────────────────────────────────┤
//! │   ┌────────────┐    ┌────────────┐    ┌────────────┐            │
//! │   │ Selector   │    │ Engine     │    │ Handle     │            │
//! │   │ Spec       │───►│ resolve    │───►│ (lazy      │            │
//! │   │ (chain)    │    │ (iterative)│    │  path)     │            │
//! │   └────────────┘    └────────────┘    └─────┬──────┘            │
//! │                                             │ query / text_of   │
//! │   ┌────────────┐    ┌────────────┐    ┌─────▼──────┐            │
//! │   │ Actor +    │───►│ WaitPolicy │───►│ Scope      │            │
//! │   │ Abilities  │    │ (bounded)  │    │ Provider   │            │
//! │   └────────────┘    └────────────┘    └────────────┘            │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use locus::prelude::*;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> LocusResult<()> {
//! let scope = MockScope::with_tree(vec![MockElement::new("div")
//!     .id("a")
//!     .child(MockElement::new("span").text("Foo"))
//!     .child(MockElement::new("span").text("Bar"))]);
//!
//! let spec = SelectorSpec::chain("#a")
//!     .sub_selector(SelectorSpec::chain("span").has_text("Foo"))
//!     .into();
//! let handle = Engine::new().locate(&scope, &spec, &ResolveOptions::new()).await?;
//! let node = handle.element().await?;
//! assert_eq!(scope.text_of(&node).await?, "Foo");
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
// Lints are configured in workspace Cargo.toml [workspace.lints.clippy]

/// Actors, abilities, actions and questions
#[allow(clippy::missing_errors_doc, clippy::must_use_candidate)]
pub mod actor;
/// Engine configuration
#[allow(clippy::missing_errors_doc)]
pub mod config;
#[allow(clippy::missing_errors_doc, clippy::must_use_candidate)]
mod engine;
#[allow(clippy::missing_errors_doc, clippy::must_use_candidate)]
mod handle;
/// Built-in ability, actions and questions
#[allow(
    clippy::missing_errors_doc,
    clippy::must_use_candidate,
    clippy::module_name_repetitions
)]
pub mod interactions;
/// Log subscriber setup
pub mod logging;
/// In-memory scope for tests and demos
#[allow(clippy::missing_errors_doc, clippy::must_use_candidate)]
pub mod mock;
mod result;
#[allow(clippy::missing_errors_doc)]
mod scope;
#[allow(
    clippy::missing_errors_doc,
    clippy::must_use_candidate,
    clippy::doc_markdown
)]
mod selector;
#[allow(
    clippy::missing_errors_doc,
    clippy::must_use_candidate,
    clippy::cast_possible_truncation
)]
mod wait;

pub use actor::{Abilities, Ability, Action, Actor, Question};
pub use config::LocusConfig;
pub use engine::Engine;
pub use handle::{Handle, ScopeLink};
pub use result::{LocusError, LocusResult, ResolutionFailure};
pub use scope::{ElementDriver, NodeId, NodeState, ScopeProvider};
pub use selector::{
    normalize_text, ChainSpec, Links, Modifier, MAX_SERIALIZED_DEPTH, ResolveOptions, SelectorSpec, StateKind,
    TextMatcher, ValueExpectation,
};
pub use wait::{
    StateExpectation, WaitPolicy, WaitResult, DEFAULT_POLL_INTERVAL_MS,
    DEFAULT_WAIT_TIMEOUT_MS,
};

/// Prelude for convenient imports
pub mod prelude {
    pub use super::actor::*;
    pub use super::config::*;
    pub use super::engine::*;
    pub use super::handle::*;
    pub use super::interactions::*;
    pub use super::mock::*;
    pub use super::result::*;
    pub use super::scope::*;
    pub use super::selector::*;
    pub use super::wait::*;
}
