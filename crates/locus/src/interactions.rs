//! Built-in ability, actions and questions over a scope provider.
//!
//! ```text
//! Actor ──ability──► BrowseTheScope ──► Engine::locate ──► Handle
//!                         │                                  │
//!                         └────────── ElementDriver ◄────────┘ click / fill
//! ```
//!
//! Actions that interact default to a sensible state (`Click` waits for
//! `enabled`, `Fill` for `editable`) unless the selector chain or the
//! options already name one.

use crate::actor::{Ability, Action, Actor, Question};
use crate::engine::Engine;
use crate::handle::Handle;
use crate::result::LocusResult;
use crate::scope::{ElementDriver, ScopeProvider};
use crate::selector::{Modifier, ResolveOptions, SelectorSpec, StateKind};
use crate::wait::StateExpectation;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

// =============================================================================
// ABILITY
// =============================================================================

/// Lets an actor resolve selectors against one scope and interact with it
#[derive(Clone)]
pub struct BrowseTheScope {
    provider: Arc<dyn ScopeProvider>,
    driver: Arc<dyn ElementDriver>,
    engine: Engine,
}

impl BrowseTheScope {
    /// Browse `scope` with a default engine
    #[must_use]
    pub fn with<S>(scope: Arc<S>) -> Self
    where
        S: ScopeProvider + ElementDriver + 'static,
    {
        Self {
            provider: scope.clone(),
            driver: scope,
            engine: Engine::new(),
        }
    }

    /// Replace the engine (and with it the configuration)
    #[must_use]
    pub fn using(mut self, engine: Engine) -> Self {
        self.engine = engine;
        self
    }

    /// Scope being browsed
    #[must_use]
    pub fn provider(&self) -> &dyn ScopeProvider {
        self.provider.as_ref()
    }

    /// Interaction surface of the scope
    #[must_use]
    pub fn driver(&self) -> &dyn ElementDriver {
        self.driver.as_ref()
    }

    /// Engine used for resolution
    #[must_use]
    pub const fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Resolve without waiting
    pub fn resolve(&self, spec: &SelectorSpec, options: &ResolveOptions) -> LocusResult<Handle<'_>> {
        self.engine.resolve(self.provider(), spec, options)
    }

    /// Resolve and wait for the merged state
    pub async fn locate(
        &self,
        spec: &SelectorSpec,
        options: &ResolveOptions,
    ) -> LocusResult<Handle<'_>> {
        self.engine.locate(self.provider(), spec, options).await
    }
}

impl fmt::Debug for BrowseTheScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BrowseTheScope")
            .field("engine", &self.engine)
            .finish_non_exhaustive()
    }
}

impl Ability for BrowseTheScope {}

fn with_default_state(options: &ResolveOptions, state: StateKind) -> ResolveOptions {
    let mut options = options.clone();
    options.state = options.state.or(Some(state));
    options
}

// =============================================================================
// ACTIONS
// =============================================================================

/// Click the single node a selector resolves to
#[derive(Debug, Clone)]
pub struct Click {
    target: SelectorSpec,
    options: ResolveOptions,
}

impl Click {
    /// Click `target`
    #[must_use]
    pub fn on(target: impl Into<SelectorSpec>) -> Self {
        Self {
            target: target.into(),
            options: ResolveOptions::new(),
        }
    }

    /// Hold a modifier unless the chain declares its own
    #[must_use]
    pub fn with_modifier(mut self, modifier: Modifier) -> Self {
        self.options = self.options.with_modifier(modifier);
        self
    }

    /// Per-call resolution options
    #[must_use]
    pub fn with_options(mut self, options: ResolveOptions) -> Self {
        self.options = options;
        self
    }
}

#[async_trait]
impl Action for Click {
    async fn perform_as(&self, actor: &Actor) -> LocusResult<()> {
        let browse = actor.ability::<BrowseTheScope>()?;
        let options = with_default_state(&self.options, StateKind::Enabled);
        let handle = browse.locate(&self.target, &options).await?;
        let node = handle.element().await?;
        browse.driver().click(&node, handle.modifiers()).await
    }

    fn describe(&self) -> String {
        format!("click {}", self.target)
    }
}

/// Replace the value of the single node a selector resolves to
#[derive(Debug, Clone)]
pub struct Fill {
    target: SelectorSpec,
    value: String,
    options: ResolveOptions,
}

impl Fill {
    /// Type `value` into `target`
    #[must_use]
    pub fn new(target: impl Into<SelectorSpec>, value: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            value: value.into(),
            options: ResolveOptions::new(),
        }
    }

    /// Per-call resolution options
    #[must_use]
    pub fn with_options(mut self, options: ResolveOptions) -> Self {
        self.options = options;
        self
    }
}

#[async_trait]
impl Action for Fill {
    async fn perform_as(&self, actor: &Actor) -> LocusResult<()> {
        let browse = actor.ability::<BrowseTheScope>()?;
        let options = with_default_state(&self.options, StateKind::Editable);
        let handle = browse.locate(&self.target, &options).await?;
        let node = handle.element().await?;
        browse.driver().fill(&node, &self.value).await
    }

    fn describe(&self) -> String {
        format!("fill {} with {:?}", self.target, self.value)
    }
}

/// Wait until a selector satisfies an expectation
#[derive(Debug, Clone)]
pub struct WaitUntil {
    target: SelectorSpec,
    expectation: StateExpectation,
    timeout: Option<Duration>,
}

impl WaitUntil {
    /// Wait for `target` to meet `expectation`
    #[must_use]
    pub fn new(target: impl Into<SelectorSpec>, expectation: StateExpectation) -> Self {
        Self {
            target: target.into(),
            expectation,
            timeout: None,
        }
    }

    /// Wait for a content-free state
    pub fn is(target: impl Into<SelectorSpec>, state: StateKind) -> LocusResult<Self> {
        Ok(Self::new(target, StateExpectation::from_state(state)?))
    }

    /// Limit for this wait; otherwise the chain's, then the engine default
    #[must_use]
    pub const fn within(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

#[async_trait]
impl Action for WaitUntil {
    async fn perform_as(&self, actor: &Actor) -> LocusResult<()> {
        let browse = actor.ability::<BrowseTheScope>()?;
        let handle = browse.resolve(&self.target, &ResolveOptions::new())?;
        browse
            .engine()
            .wait_policy()
            .wait_for(&handle, &self.expectation, self.timeout.or(handle.timeout()))
            .await
            .map(|_| ())
    }

    fn describe(&self) -> String {
        format!("wait until {} is {}", self.target, self.expectation)
    }
}

// =============================================================================
// QUESTIONS
// =============================================================================

/// Rendered text of the single matching node
#[derive(Debug, Clone)]
pub struct Text {
    target: SelectorSpec,
}

impl Text {
    /// Text of `target`
    #[must_use]
    pub fn of(target: impl Into<SelectorSpec>) -> Self {
        Self {
            target: target.into(),
        }
    }
}

#[async_trait]
impl Question for Text {
    type Answer = String;

    async fn answered_by(&self, actor: &Actor) -> LocusResult<String> {
        let browse = actor.ability::<BrowseTheScope>()?;
        let handle = browse.locate(&self.target, &ResolveOptions::new()).await?;
        let node = handle.element().await?;
        browse.provider().text_of(&node).await
    }

    fn describe(&self) -> String {
        format!("text of {}", self.target)
    }
}

/// Current value of the single matching node
#[derive(Debug, Clone)]
pub struct Value {
    target: SelectorSpec,
}

impl Value {
    /// Value of `target`
    #[must_use]
    pub fn of(target: impl Into<SelectorSpec>) -> Self {
        Self {
            target: target.into(),
        }
    }
}

#[async_trait]
impl Question for Value {
    type Answer = Option<String>;

    async fn answered_by(&self, actor: &Actor) -> LocusResult<Option<String>> {
        let browse = actor.ability::<BrowseTheScope>()?;
        let handle = browse.locate(&self.target, &ResolveOptions::new()).await?;
        let node = handle.element().await?;
        Ok(browse.provider().inspect(&node).await?.value)
    }

    fn describe(&self) -> String {
        format!("value of {}", self.target)
    }
}

/// Number of nodes currently matching
#[derive(Debug, Clone)]
pub struct Count {
    target: SelectorSpec,
}

impl Count {
    /// Matches of `target`
    #[must_use]
    pub fn of(target: impl Into<SelectorSpec>) -> Self {
        Self {
            target: target.into(),
        }
    }
}

#[async_trait]
impl Question for Count {
    type Answer = usize;

    async fn answered_by(&self, actor: &Actor) -> LocusResult<usize> {
        let browse = actor.ability::<BrowseTheScope>()?;
        browse
            .resolve(&self.target, &ResolveOptions::new())?
            .count()
            .await
    }

    fn describe(&self) -> String {
        format!("count of {}", self.target)
    }
}

/// Whether a selector meets a state right now, without waiting
#[derive(Debug, Clone)]
pub struct InState {
    target: SelectorSpec,
    expectation: StateExpectation,
}

impl InState {
    /// Check `target` against `expectation`
    #[must_use]
    pub fn new(target: impl Into<SelectorSpec>, expectation: StateExpectation) -> Self {
        Self {
            target: target.into(),
            expectation,
        }
    }

    /// Check a content-free state
    pub fn of(target: impl Into<SelectorSpec>, state: StateKind) -> LocusResult<Self> {
        Ok(Self::new(target, StateExpectation::from_state(state)?))
    }
}

#[async_trait]
impl Question for InState {
    type Answer = bool;

    async fn answered_by(&self, actor: &Actor) -> LocusResult<bool> {
        let browse = actor.ability::<BrowseTheScope>()?;
        let handle = browse.resolve(&self.target, &ResolveOptions::new())?;
        self.expectation.evaluate(&handle).await
    }

    fn describe(&self) -> String {
        format!("whether {} is {}", self.target, self.expectation)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::config::LocusConfig;
    use crate::mock::{MockElement, MockScope};
    use crate::result::LocusError;
    use std::collections::BTreeSet;

    fn form() -> Arc<MockScope> {
        Arc::new(MockScope::with_tree(vec![MockElement::new("form")
            .id("login")
            .child(MockElement::new("input").id("user"))
            .child(MockElement::new("input").id("code").editable(false))
            .child(MockElement::new("button").class("submit").text("Sign in"))
            .child(MockElement::new("button").class("reset").text("Reset").disabled())]))
    }

    fn fast_engine() -> Engine {
        Engine::with_config(LocusConfig {
            default_timeout_ms: 200,
            poll_interval_ms: 10,
            strict: true,
        })
    }

    fn user_of(scope: &Arc<MockScope>) -> Actor {
        Actor::named("ada").who_can(BrowseTheScope::with(Arc::clone(scope)).using(fast_engine()))
    }

    mod action_tests {
        use super::*;

        #[tokio::test]
        async fn test_fill_then_click() {
            let scope = form();
            let actor = user_of(&scope);
            let submit = SelectorSpec::chain("#login").sub_selector("button.submit");
            actor
                .attempts_to(&[&Fill::new("#user", "ada"), &Click::on(submit)])
                .await
                .unwrap();

            let user = scope.find_by_id("user").await.unwrap();
            assert_eq!(scope.filled().await, vec![(user, "ada".to_string())]);
            assert_eq!(scope.clicks().await.len(), 1);
        }

        #[tokio::test]
        async fn test_click_carries_modifiers() {
            let scope = form();
            let actor = user_of(&scope);
            let click = Click::on("button.submit").with_modifier(Modifier::ControlOrMeta);
            actor.attempts_to(&[&click]).await.unwrap();
            let (_, modifiers) = scope.clicks().await.remove(0);
            assert_eq!(modifiers, BTreeSet::from([Modifier::ControlOrMeta]));
        }

        #[tokio::test]
        async fn test_click_on_disabled_times_out_and_halts() {
            let scope = form();
            let actor = user_of(&scope);
            let err = actor
                .attempts_to(&[&Click::on("button.reset"), &Fill::new("#user", "never")])
                .await
                .unwrap_err();
            assert!(err.is_timeout());
            assert!(!scope.was_called("fill").await);
        }

        #[tokio::test]
        async fn test_fill_read_only_times_out() {
            let scope = form();
            let actor = user_of(&scope);
            let err = actor
                .attempts_to(&[&Fill::new("#code", "1234")])
                .await
                .unwrap_err();
            assert!(err.is_timeout());
        }

        #[tokio::test]
        async fn test_ambiguous_click_target() {
            let scope = form();
            let actor = user_of(&scope);
            let options = ResolveOptions::new().with_state(StateKind::Attached);
            let err = actor
                .attempts_to(&[&Click::on("button").with_options(options)])
                .await
                .unwrap_err();
            assert!(err.is_resolution());
        }

        #[tokio::test]
        async fn test_wait_until_with_own_limit() {
            let scope = form();
            let actor = user_of(&scope);
            let wait = WaitUntil::is("#toast", StateKind::Visible)
                .unwrap()
                .within(Duration::from_millis(50));
            match actor.attempts_to(&[&wait]).await.unwrap_err() {
                LocusError::LookupTimeout { limit, .. } => {
                    assert_eq!(limit, Duration::from_millis(50));
                }
                other => panic!("unexpected error {other}"),
            }
        }

        #[tokio::test]
        async fn test_without_ability() {
            let err = Actor::named("bob")
                .attempts_to(&[&Click::on("button")])
                .await
                .unwrap_err();
            assert!(matches!(err, LocusError::MissingAbility { .. }));
        }
    }

    mod question_tests {
        use super::*;

        #[tokio::test]
        async fn test_text_and_count() {
            let scope = form();
            let actor = user_of(&scope);
            assert_eq!(actor.asks(&Text::of("button.submit")).await.unwrap(), "Sign in");
            assert_eq!(actor.asks(&Count::of("button")).await.unwrap(), 2);
            assert_eq!(actor.asks(&Count::of("#none")).await.unwrap(), 0);
        }

        #[tokio::test]
        async fn test_value_after_fill() {
            let scope = form();
            let actor = user_of(&scope);
            assert_eq!(actor.asks(&Value::of("#user")).await.unwrap(), None);
            actor.attempts_to(&[&Fill::new("#user", "ada")]).await.unwrap();
            assert_eq!(
                actor.asks(&Value::of("#user")).await.unwrap().as_deref(),
                Some("ada")
            );
        }

        #[tokio::test]
        async fn test_in_state_does_not_wait() {
            let scope = form();
            let actor = user_of(&scope);
            let disabled = InState::of("button.reset", StateKind::Disabled).unwrap();
            let missing = InState::of("#none", StateKind::Visible).unwrap();
            assert!(actor.asks(&disabled).await.unwrap());
            assert!(!actor.asks(&missing).await.unwrap());
        }
    }
}
