//! Lazy element handles.
//!
//! A [`Handle`] is a query *description*: an ordered path of
//! `(query, text filter)` links anchored at a scope. Nothing touches the
//! provider until one of the materializing methods (`elements`, `count`,
//! `element`, `first`) is awaited, and every call re-evaluates the path
//! against the live tree.
//!
//! Handles borrow their provider, so they cannot outlive the scope that
//! produced them and are meant to be consumed by a single action.

use crate::result::{LocusResult, ResolutionFailure};
use crate::scope::{NodeId, ScopeProvider};
use crate::selector::{Modifier, StateKind, TextMatcher};
use futures::future::join_all;
use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::time::Duration;

/// One narrowing step: evaluate `query` inside each current match, then keep
/// the results whose rendered text passes `has_text`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeLink {
    /// Opaque query string
    pub query: String,
    /// Optional text filter
    pub has_text: Option<TextMatcher>,
}

impl ScopeLink {
    /// New link without a text filter
    #[must_use]
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            has_text: None,
        }
    }

    /// Attach a text filter
    #[must_use]
    pub fn with_text(mut self, has_text: Option<TextMatcher>) -> Self {
        self.has_text = has_text;
        self
    }
}

impl fmt::Display for ScopeLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.query)?;
        if let Some(filter) = &self.has_text {
            write!(f, " [has-text={filter}]")?;
        }
        Ok(())
    }
}

/// Lazily-queried reference to the node(s) selected by a chain
#[derive(Clone)]
pub struct Handle<'a> {
    provider: &'a dyn ScopeProvider,
    root: Option<NodeId>,
    links: Vec<ScopeLink>,
    state: Option<StateKind>,
    timeout: Option<Duration>,
    modifiers: BTreeSet<Modifier>,
    strict: bool,
}

impl<'a> Handle<'a> {
    /// Handle for the provider's root scope
    #[must_use]
    pub fn root(provider: &'a dyn ScopeProvider) -> Self {
        Self {
            provider,
            root: None,
            links: Vec::new(),
            state: None,
            timeout: None,
            modifiers: BTreeSet::new(),
            strict: true,
        }
    }

    /// Handle anchored at an already-known node
    #[must_use]
    pub fn anchored(provider: &'a dyn ScopeProvider, node: NodeId) -> Self {
        Self {
            root: Some(node),
            ..Self::root(provider)
        }
    }

    /// Same scope path with resolution settings cleared, used as the parent
    /// for a nested resolution
    #[must_use]
    pub(crate) fn as_scope(&self) -> Self {
        Self {
            provider: self.provider,
            root: self.root.clone(),
            links: self.links.clone(),
            state: None,
            timeout: None,
            modifiers: BTreeSet::new(),
            strict: self.strict,
        }
    }

    pub(crate) fn push_link(&mut self, link: ScopeLink) {
        self.links.push(link);
    }

    pub(crate) fn last_link_mut(&mut self) -> Option<&mut ScopeLink> {
        self.links.last_mut()
    }

    pub(crate) fn apply_settings(
        &mut self,
        state: Option<StateKind>,
        timeout: Option<Duration>,
        modifiers: BTreeSet<Modifier>,
        strict: bool,
    ) {
        self.state = state;
        self.timeout = timeout;
        self.modifiers = modifiers;
        self.strict = strict;
    }

    /// Provider this handle queries
    #[must_use]
    pub fn provider(&self) -> &'a dyn ScopeProvider {
        self.provider
    }

    /// Anchor node, `None` for the provider root
    #[must_use]
    pub const fn anchor(&self) -> Option<&NodeId> {
        self.root.as_ref()
    }

    /// Full narrowing path from the anchor
    #[must_use]
    pub fn links(&self) -> &[ScopeLink] {
        &self.links
    }

    /// Links that make up this handle's scope (all but the last)
    #[must_use]
    pub fn scope_links(&self) -> &[ScopeLink] {
        match self.links.split_last() {
            Some((_, scope)) => scope,
            None => &[],
        }
    }

    /// Final query string
    #[must_use]
    pub fn query(&self) -> Option<&str> {
        self.links.last().map(|link| link.query.as_str())
    }

    /// Final text filter
    #[must_use]
    pub fn text_filter(&self) -> Option<&TextMatcher> {
        self.links.last().and_then(|link| link.has_text.as_ref())
    }

    /// Required state merged from the chain
    #[must_use]
    pub const fn state(&self) -> Option<StateKind> {
        self.state
    }

    /// Wait limit merged from the chain
    #[must_use]
    pub const fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Keyboard modifiers merged from the chain
    #[must_use]
    pub const fn modifiers(&self) -> &BTreeSet<Modifier> {
        &self.modifiers
    }

    /// Whether `element()` rejects multiple matches
    #[must_use]
    pub const fn is_strict(&self) -> bool {
        self.strict
    }

    /// Whether two handles select through the same scope path
    #[must_use]
    pub fn same_scope(&self, other: &Self) -> bool {
        self.root == other.root && self.links == other.links
    }

    /// Evaluate the path against the live tree.
    ///
    /// Each link queries inside every match of the previous link, then
    /// narrows by the link's text filter before the next link runs. Matches
    /// come back in this order: scopes are visited in the order the previous
    /// link produced them, each scope's matches keep the provider's order,
    /// and a node reached from more than one scope keeps only its first
    /// position. Scopes and matches that leave the tree mid-evaluation are
    /// skipped.
    pub async fn elements(&self) -> LocusResult<Vec<NodeId>> {
        if self.links.is_empty() {
            return Ok(self.root.iter().cloned().collect());
        }

        let mut scopes: Vec<Option<NodeId>> = vec![self.root.clone()];
        for link in &self.links {
            let mut seen = HashSet::new();
            let mut matched = Vec::new();
            for scope in &scopes {
                let found = match self.provider.query(scope.as_ref(), &link.query).await {
                    Ok(found) => found,
                    Err(err) if err.is_detached() => continue,
                    Err(err) => return Err(err),
                };
                for node in found {
                    if seen.insert(node.clone()) {
                        matched.push(node);
                    }
                }
            }

            if let Some(filter) = &link.has_text {
                let texts = join_all(matched.iter().map(|node| self.provider.text_of(node))).await;
                let mut kept = Vec::with_capacity(matched.len());
                for (node, text) in matched.into_iter().zip(texts) {
                    match text {
                        Ok(text) if filter.matches(&text) => kept.push(node),
                        Ok(_) => {}
                        Err(err) if err.is_detached() => {}
                        Err(err) => return Err(err),
                    }
                }
                matched = kept;
            }

            if matched.is_empty() {
                return Ok(Vec::new());
            }
            scopes = matched.into_iter().map(Some).collect();
        }

        Ok(scopes.into_iter().flatten().collect())
    }

    /// Number of current matches
    pub async fn count(&self) -> LocusResult<usize> {
        Ok(self.elements().await?.len())
    }

    /// First match, if any
    pub async fn first(&self) -> LocusResult<Option<NodeId>> {
        Ok(self.elements().await?.into_iter().next())
    }

    /// The single match, `None` when nothing matches.
    ///
    /// With strict matching on, more than one match is a
    /// [`ResolutionFailure::Ambiguous`] error; otherwise the first match wins.
    pub async fn try_element(&self) -> LocusResult<Option<NodeId>> {
        let mut nodes = self.elements().await?;
        if self.strict && nodes.len() > 1 {
            return Err(ResolutionFailure::Ambiguous {
                query: self.to_string(),
                count: nodes.len(),
            }
            .into());
        }
        Ok(if nodes.is_empty() {
            None
        } else {
            Some(nodes.swap_remove(0))
        })
    }

    /// The single match, or a [`ResolutionFailure`]
    pub async fn element(&self) -> LocusResult<NodeId> {
        self.try_element().await?.ok_or_else(|| {
            ResolutionFailure::NotFound {
                query: self.to_string(),
            }
            .into()
        })
    }
}

impl PartialEq for Handle<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.same_scope(other)
            && self.state == other.state
            && self.timeout == other.timeout
            && self.modifiers == other.modifiers
            && self.strict == other.strict
    }
}

impl fmt::Debug for Handle<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("root", &self.root)
            .field("links", &self.links)
            .field("state", &self.state)
            .field("timeout", &self.timeout)
            .field("modifiers", &self.modifiers)
            .field("strict", &self.strict)
            .finish_non_exhaustive()
    }
}

/// Playwright-style chain notation: `#a >> span [has-text="Foo"]`
impl fmt::Display for Handle<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(root) = &self.root {
            write!(f, "@{root}")?;
            if !self.links.is_empty() {
                f.write_str(" >> ")?;
            }
        } else if self.links.is_empty() {
            return f.write_str(":root");
        }
        for (i, link) in self.links.iter().enumerate() {
            if i > 0 {
                f.write_str(" >> ")?;
            }
            write!(f, "{link}")?;
        }
        Ok(())
    }
}
