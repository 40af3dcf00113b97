//! Selector resolution engine.
//!
//! `resolve` walks a [`SelectorSpec`] from the outermost link inwards with a
//! plain loop (no native recursion, so chain depth is unbounded) and appends
//! one [`ScopeLink`] per level to the scope's path. It does not touch the
//! live tree: the result is a [`Handle`] that queries lazily.
//!
//! Settings merge downwards: a `state`, `timeout` or `modifiers` value
//! declared on an inner link wins over an outer one, and anything declared in
//! the chain wins over the per-call [`ResolveOptions`].
//!
//! `locate` is resolution followed by at most one bounded wait when a state
//! is requested.

use crate::config::LocusConfig;
use crate::handle::{Handle, ScopeLink};
use crate::result::{LocusError, LocusResult};
use crate::scope::ScopeProvider;
use crate::selector::{ResolveOptions, SelectorSpec};
use crate::wait::{StateExpectation, WaitPolicy, WaitResult};
use tracing::debug;

/// Resolves selector specs into handles and couples them with state waits
#[derive(Debug, Clone, Default)]
pub struct Engine {
    config: LocusConfig,
}

impl Engine {
    /// Engine with default configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Engine with the given configuration
    #[must_use]
    pub const fn with_config(config: LocusConfig) -> Self {
        Self { config }
    }

    /// Active configuration
    #[must_use]
    pub const fn config(&self) -> &LocusConfig {
        &self.config
    }

    /// Wait policy derived from the configuration
    #[must_use]
    pub const fn wait_policy(&self) -> WaitPolicy {
        WaitPolicy::from_config(&self.config)
    }

    /// Resolve `spec` against the provider's root scope
    pub fn resolve<'a>(
        &self,
        provider: &'a dyn ScopeProvider,
        spec: &SelectorSpec,
        options: &ResolveOptions,
    ) -> LocusResult<Handle<'a>> {
        self.resolve_within(&Handle::root(provider), spec, options)
    }

    /// Resolve `spec` inside the node(s) selected by `scope`
    pub fn resolve_within<'a>(
        &self,
        scope: &Handle<'a>,
        spec: &SelectorSpec,
        options: &ResolveOptions,
    ) -> LocusResult<Handle<'a>> {
        let mut handle = scope.as_scope();
        let mut state = options.state;
        let mut timeout = options.timeout;
        let mut modifiers = options.modifiers.clone();

        for (level, link) in spec.links().enumerate() {
            let (query, has_text) = match link {
                SelectorSpec::Literal(query) => (query, None),
                SelectorSpec::Chain(chain) => {
                    state = chain.state.or(state);
                    timeout = chain.timeout_duration().or(timeout);
                    if !chain.modifiers.is_empty() {
                        modifiers.clone_from(&chain.modifiers);
                    }
                    (&chain.base, chain.has_text.clone())
                }
            };
            if query.trim().is_empty() {
                return Err(LocusError::invalid_spec(format!(
                    "link {level} has an empty query"
                )));
            }
            handle.push_link(ScopeLink::new(query.as_str()).with_text(has_text));
        }

        if let Some(fallback) = &options.has_text {
            if let Some(last) = handle.last_link_mut() {
                if last.has_text.is_none() {
                    last.has_text = Some(fallback.clone());
                }
            }
        }

        let strict = options.strict.unwrap_or(self.config.strict);
        handle.apply_settings(state, timeout, modifiers, strict);
        debug!(
            handle = %handle,
            depth = handle.links().len() - scope.links().len(),
            state = ?handle.state(),
            "resolved selector chain"
        );
        Ok(handle)
    }

    /// Resolve, then wait once for the merged state if one was requested.
    ///
    /// `options.expected` supplies the content for `has-text` / `has-value`.
    pub async fn locate<'a>(
        &self,
        provider: &'a dyn ScopeProvider,
        spec: &SelectorSpec,
        options: &ResolveOptions,
    ) -> LocusResult<Handle<'a>> {
        let handle = self.resolve(provider, spec, options)?;
        self.settle(&handle, options).await?;
        Ok(handle)
    }

    /// Apply the handle's merged state, if any, with one bounded wait
    pub async fn settle(
        &self,
        handle: &Handle<'_>,
        options: &ResolveOptions,
    ) -> LocusResult<Option<WaitResult>> {
        let Some(kind) = handle.state() else {
            return Ok(None);
        };
        let expectation = StateExpectation::with_expected(kind, options.expected.clone())?;
        self.wait_policy()
            .wait_for(handle, &expectation, handle.timeout())
            .await
            .map(Some)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::mock::{MockElement, MockScope};
    use crate::selector::{Modifier, StateKind, TextMatcher};
    use std::time::Duration;

    fn sample_scope() -> MockScope {
        MockScope::with_tree(vec![
            MockElement::new("div")
                .id("a")
                .child(MockElement::new("span").text("Foo"))
                .child(MockElement::new("span").text("Bar")),
            MockElement::new("div")
                .id("b")
                .child(MockElement::new("span").text("Foo")),
        ])
    }

    mod resolve_tests {
        use super::*;

        #[test]
        fn test_literal_single_link() {
            let scope = sample_scope();
            let handle = Engine::new()
                .resolve(&scope, &"#a".into(), &ResolveOptions::new())
                .unwrap();
            assert_eq!(handle.links(), &[ScopeLink::new("#a")]);
            assert!(handle.state().is_none());
        }

        #[test]
        fn test_literal_takes_text_from_options() {
            let scope = sample_scope();
            let handle = Engine::new()
                .resolve(&scope, &"span".into(), &ResolveOptions::new().with_text("Foo"))
                .unwrap();
            assert_eq!(handle.text_filter(), Some(&TextMatcher::substring("Foo")));
        }

        #[test]
        fn test_chain_own_filter_beats_options() {
            let scope = sample_scope();
            let spec = SelectorSpec::chain("span").has_text("Bar").into();
            let handle = Engine::new()
                .resolve(&scope, &spec, &ResolveOptions::new().with_text("Foo"))
                .unwrap();
            assert_eq!(handle.text_filter(), Some(&TextMatcher::substring("Bar")));
        }

        #[test]
        fn test_inner_settings_take_precedence() {
            let scope = sample_scope();
            let spec = SelectorSpec::chain("#a")
                .state(StateKind::Visible)
                .timeout(Duration::from_secs(9))
                .modifier(Modifier::Shift)
                .sub_selector(
                    SelectorSpec::chain("span")
                        .state(StateKind::Enabled)
                        .modifier(Modifier::Alt),
                )
                .into();
            let options = ResolveOptions::new()
                .with_state(StateKind::Attached)
                .with_timeout(Duration::from_secs(1));
            let handle = Engine::new().resolve(&scope, &spec, &options).unwrap();
            assert_eq!(handle.state(), Some(StateKind::Enabled));
            assert_eq!(handle.timeout(), Some(Duration::from_secs(9)));
            assert_eq!(handle.modifiers().iter().copied().collect::<Vec<_>>(), vec![Modifier::Alt]);
        }

        #[test]
        fn test_options_fill_unset_settings() {
            let scope = sample_scope();
            let options = ResolveOptions::new()
                .with_state(StateKind::Hidden)
                .with_timeout(Duration::from_millis(250));
            let handle = Engine::new().resolve(&scope, &"#a".into(), &options).unwrap();
            assert_eq!(handle.state(), Some(StateKind::Hidden));
            assert_eq!(handle.timeout(), Some(Duration::from_millis(250)));
        }

        #[test]
        fn test_empty_inner_base_is_invalid() {
            let scope = sample_scope();
            let spec = SelectorSpec::chain("#a")
                .sub_selector(SelectorSpec::chain(""))
                .into();
            let err = Engine::new()
                .resolve(&scope, &spec, &ResolveOptions::new())
                .unwrap_err();
            assert!(err.is_invalid_spec());
        }

        #[test]
        fn test_resolve_within_extends_parent_path() {
            let scope = sample_scope();
            let engine = Engine::new();
            let parent = engine
                .resolve(&scope, &"#a".into(), &ResolveOptions::new())
                .unwrap();
            let child = engine
                .resolve_within(&parent, &"span".into(), &ResolveOptions::new())
                .unwrap();
            assert_eq!(child.scope_links(), parent.links());
            assert_eq!(child.query(), Some("span"));
        }

        #[test]
        fn test_strict_follows_config_unless_overridden() {
            let scope = sample_scope();
            let engine = Engine::with_config(LocusConfig {
                strict: false,
                ..LocusConfig::default()
            });
            let loose = engine
                .resolve(&scope, &"span".into(), &ResolveOptions::new())
                .unwrap();
            assert!(!loose.is_strict());
            let strict = engine
                .resolve(&scope, &"span".into(), &ResolveOptions::new().with_strict(true))
                .unwrap();
            assert!(strict.is_strict());
        }

        #[test]
        fn test_idempotent() {
            let scope = sample_scope();
            let engine = Engine::new();
            let spec: SelectorSpec = SelectorSpec::chain("#a").sub_selector("span").into();
            let first = engine.resolve(&scope, &spec, &ResolveOptions::new()).unwrap();
            let second = engine.resolve(&scope, &spec, &ResolveOptions::new()).unwrap();
            assert_eq!(first, second);
        }

        #[test]
        fn test_deep_chain_resolves_iteratively() {
            let scope = sample_scope();
            let mut spec = SelectorSpec::literal("span");
            for _ in 0..100_000 {
                spec = SelectorSpec::chain("div").sub_selector(spec).into();
            }
            let handle = Engine::new()
                .resolve(&scope, &spec, &ResolveOptions::new())
                .unwrap();
            assert_eq!(handle.links().len(), 100_001);
        }
    }

    mod locate_tests {
        use super::*;

        #[tokio::test]
        async fn test_scope_narrowed_by_previous_link() {
            let scope = sample_scope();
            let spec = SelectorSpec::chain("#a")
                .sub_selector(SelectorSpec::chain("span").has_text("Foo"))
                .into();
            let handle = Engine::new()
                .locate(&scope, &spec, &ResolveOptions::new())
                .await
                .unwrap();
            let node = handle.element().await.unwrap();
            let a = scope.find_by_id("a").await.unwrap();
            assert_eq!(scope.parent_of(&node).await, Some(a));
        }

        #[tokio::test]
        async fn test_zero_match_is_not_an_error_until_used() {
            let scope = sample_scope();
            let handle = Engine::new()
                .locate(&scope, &"#missing".into(), &ResolveOptions::new())
                .await
                .unwrap();
            assert!(handle.element().await.unwrap_err().is_resolution());
        }

        #[tokio::test]
        async fn test_has_value_requires_expected() {
            let scope = sample_scope();
            let options = ResolveOptions::new().with_state(StateKind::HasValue);
            let err = Engine::new()
                .locate(&scope, &"#a".into(), &options)
                .await
                .unwrap_err();
            assert!(err.is_invalid_spec());
        }

        #[tokio::test]
        async fn test_state_wait_uses_chain_timeout() {
            let scope = sample_scope();
            let spec = SelectorSpec::chain("#missing")
                .state(StateKind::Visible)
                .timeout(Duration::from_millis(100))
                .into();
            let err = Engine::new()
                .locate(&scope, &spec, &ResolveOptions::new())
                .await
                .unwrap_err();
            match err {
                LocusError::LookupTimeout { limit, elapsed, .. } => {
                    assert_eq!(limit, Duration::from_millis(100));
                    assert!(elapsed >= limit);
                }
                other => panic!("expected timeout, got {other}"),
            }
        }
    }
}
