//! Selector chains: how to find a node.
//!
//! A [`SelectorSpec`] is either a bare query string passed through verbatim to
//! the scope provider, or a [`ChainSpec`] that narrows a base query by text and
//! then descends into a nested sub-selector.
//!
//! ```text
//! Chain("#cart")
//!   ├─ has_text: "Checkout"
//!   └─ sub_selector: Chain("button")
//!        ├─ state: enabled
//!        └─ sub_selector: Literal("span.label")
//! ```
//!
//! Query strings are opaque. Nothing in this module looks inside them beyond
//! rejecting empty ones.

use crate::result::{LocusError, LocusResult};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

// =============================================================================
// TEXT MATCHER
// =============================================================================

/// Text filter applied to the rendered text of candidate nodes
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "TextMatcherRepr", into = "TextMatcherRepr")]
pub enum TextMatcher {
    /// Case-sensitive substring match
    Substring(String),
    /// Regular expression match
    Pattern(Regex),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum TextMatcherRepr {
    Plain(String),
    Pattern { pattern: String },
}

impl TextMatcher {
    /// Substring matcher
    #[must_use]
    pub fn substring(text: impl Into<String>) -> Self {
        Self::Substring(text.into())
    }

    /// Pattern matcher; the pattern is compiled immediately
    pub fn pattern(pattern: &str) -> LocusResult<Self> {
        Regex::new(pattern)
            .map(Self::Pattern)
            .map_err(|e| LocusError::invalid_spec(format!("bad text pattern {pattern:?}: {e}")))
    }

    /// Test rendered text against this matcher.
    ///
    /// The text is normalized first: leading and trailing whitespace is
    /// trimmed and inner whitespace runs collapse to a single space.
    #[must_use]
    pub fn matches(&self, text: &str) -> bool {
        let normalized = normalize_text(text);
        match self {
            Self::Substring(needle) => normalized.contains(needle.as_str()),
            Self::Pattern(re) => re.is_match(&normalized),
        }
    }
}

impl PartialEq for TextMatcher {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Substring(a), Self::Substring(b)) => a == b,
            (Self::Pattern(a), Self::Pattern(b)) => a.as_str() == b.as_str(),
            _ => false,
        }
    }
}

impl Eq for TextMatcher {}

impl fmt::Display for TextMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Substring(s) => write!(f, "{s:?}"),
            Self::Pattern(re) => write!(f, "/{}/", re.as_str()),
        }
    }
}

impl From<&str> for TextMatcher {
    fn from(value: &str) -> Self {
        Self::substring(value)
    }
}

impl From<String> for TextMatcher {
    fn from(value: String) -> Self {
        Self::Substring(value)
    }
}

impl From<Regex> for TextMatcher {
    fn from(value: Regex) -> Self {
        Self::Pattern(value)
    }
}

impl TryFrom<TextMatcherRepr> for TextMatcher {
    type Error = LocusError;

    fn try_from(repr: TextMatcherRepr) -> Result<Self, Self::Error> {
        match repr {
            TextMatcherRepr::Plain(s) => Ok(Self::Substring(s)),
            TextMatcherRepr::Pattern { pattern } => Self::pattern(&pattern),
        }
    }
}

impl From<TextMatcher> for TextMatcherRepr {
    fn from(matcher: TextMatcher) -> Self {
        match matcher {
            TextMatcher::Substring(s) => Self::Plain(s),
            TextMatcher::Pattern(re) => Self::Pattern {
                pattern: re.as_str().to_string(),
            },
        }
    }
}

/// Trim and collapse whitespace runs
#[must_use]
pub fn normalize_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

// =============================================================================
// STATE KIND / MODIFIER
// =============================================================================

/// UI condition a resolved handle may be waited on to satisfy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StateKind {
    /// Present in the tree
    Attached,
    /// Present and rendered
    Visible,
    /// Absent or not rendered
    Hidden,
    /// Visible and interactive
    Enabled,
    /// Visible and not interactive
    Disabled,
    /// Visible and accepts input
    Editable,
    /// Visible and rejects input
    NotEditable,
    /// Rendered text matches an expected value
    HasText,
    /// Current value matches an expected value
    HasValue,
}

impl StateKind {
    /// All state kinds in declaration order
    pub const ALL: [Self; 9] = [
        Self::Attached,
        Self::Visible,
        Self::Hidden,
        Self::Enabled,
        Self::Disabled,
        Self::Editable,
        Self::NotEditable,
        Self::HasText,
        Self::HasValue,
    ];

    /// Kebab-case name
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Attached => "attached",
            Self::Visible => "visible",
            Self::Hidden => "hidden",
            Self::Enabled => "enabled",
            Self::Disabled => "disabled",
            Self::Editable => "editable",
            Self::NotEditable => "not-editable",
            Self::HasText => "has-text",
            Self::HasValue => "has-value",
        }
    }

    /// Whether the state compares content and needs a caller-supplied value
    #[must_use]
    pub const fn needs_expected_value(&self) -> bool {
        matches!(self, Self::HasText | Self::HasValue)
    }
}

impl fmt::Display for StateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StateKind {
    type Err = LocusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| LocusError::invalid_spec(format!("unknown state {s:?}")))
    }
}

/// Keyboard modifier held during a pointer action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Modifier {
    /// Alt / Option
    Alt,
    /// Control
    Control,
    /// Control on Linux/Windows, Meta on macOS
    ControlOrMeta,
    /// Meta / Command
    Meta,
    /// Shift
    Shift,
}

// =============================================================================
// SELECTOR SPEC
// =============================================================================

/// Longest chain that serializes; deeper chains would exceed the nesting
/// limit of the formats they are read back from.
pub const MAX_SERIALIZED_DEPTH: usize = 128;

/// Declarative, possibly nested description of how to find a node
///
/// `Clone`, `PartialEq`, `Debug` and `Drop` walk the chain iteratively, so
/// chains of any depth are safe to copy, compare and print.
#[derive(Deserialize)]
#[serde(untagged)]
pub enum SelectorSpec {
    /// Single opaque query string
    Literal(String),
    /// Base query with optional filter, nested sub-selector and wait settings
    Chain(ChainSpec),
}

/// One link of a selector chain
#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChainSpec {
    /// Base query evaluated against the current scope
    pub base: String,
    /// Text filter applied to the base matches
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_text: Option<TextMatcher>,
    /// Query evaluated inside the filtered matches
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_selector: Option<Box<SelectorSpec>>,
    /// Required state of the final handle
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<StateKind>,
    /// Wait limit in milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    /// Keyboard modifiers for the final action
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub modifiers: BTreeSet<Modifier>,
}

// Deep chains unlink iteratively so dropping never recurses per level.
impl Drop for ChainSpec {
    fn drop(&mut self) {
        let mut next = self.sub_selector.take();
        while let Some(mut spec) = next {
            next = match spec.as_mut() {
                SelectorSpec::Chain(chain) => chain.sub_selector.take(),
                SelectorSpec::Literal(_) => None,
            };
        }
    }
}

impl Clone for ChainSpec {
    fn clone(&self) -> Self {
        self.relinked(self.sub_selector.as_deref().map(SelectorSpec::clone))
    }
}

impl PartialEq for ChainSpec {
    fn eq(&self, other: &Self) -> bool {
        self.same_link(other) && self.sub_selector == other.sub_selector
    }
}

impl Eq for ChainSpec {}

impl fmt::Debug for ChainSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChainSpec")
            .field("base", &self.base)
            .field("has_text", &self.has_text)
            .field("sub_selector", &self.sub_selector)
            .field("state", &self.state)
            .field("timeout_ms", &self.timeout_ms)
            .field("modifiers", &self.modifiers)
            .finish()
    }
}

impl ChainSpec {
    /// Copy of this link's own settings over a new sub-selector
    fn relinked(&self, inner: Option<SelectorSpec>) -> Self {
        Self {
            base: self.base.clone(),
            has_text: self.has_text.clone(),
            sub_selector: inner.map(Box::new),
            state: self.state,
            timeout_ms: self.timeout_ms,
            modifiers: self.modifiers.clone(),
        }
    }

    /// Compare this link's own settings, ignoring what it nests
    fn same_link(&self, other: &Self) -> bool {
        self.base == other.base
            && self.has_text == other.has_text
            && self.state == other.state
            && self.timeout_ms == other.timeout_ms
            && self.modifiers == other.modifiers
            && self.sub_selector.is_some() == other.sub_selector.is_some()
    }

    /// New chain link over a base query
    #[must_use]
    pub fn new(base: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            has_text: None,
            sub_selector: None,
            state: None,
            timeout_ms: None,
            modifiers: BTreeSet::new(),
        }
    }

    /// Keep only base matches whose text contains `text`
    #[must_use]
    pub fn has_text(mut self, text: impl Into<TextMatcher>) -> Self {
        self.has_text = Some(text.into());
        self
    }

    /// Keep only base matches whose text matches `pattern`
    pub fn has_pattern(mut self, pattern: &str) -> LocusResult<Self> {
        self.has_text = Some(TextMatcher::pattern(pattern)?);
        Ok(self)
    }

    /// Descend into `spec` inside the filtered matches
    #[must_use]
    pub fn sub_selector(mut self, spec: impl Into<SelectorSpec>) -> Self {
        self.sub_selector = Some(Box::new(spec.into()));
        self
    }

    /// Require a state on the final handle
    #[must_use]
    pub const fn state(mut self, state: StateKind) -> Self {
        self.state = Some(state);
        self
    }

    /// Set the wait limit
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = Some(u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX));
        self
    }

    /// Add a keyboard modifier
    #[must_use]
    pub fn modifier(mut self, modifier: Modifier) -> Self {
        self.modifiers.insert(modifier);
        self
    }

    /// Wait limit as a duration
    #[must_use]
    pub fn timeout_duration(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

impl SelectorSpec {
    /// Bare query string
    #[must_use]
    pub fn literal(query: impl Into<String>) -> Self {
        Self::Literal(query.into())
    }

    /// Start a chain over a base query
    #[must_use]
    pub fn chain(base: impl Into<String>) -> ChainSpec {
        ChainSpec::new(base)
    }

    /// Parse a spec from JSON and validate it
    pub fn from_json_str(json: &str) -> LocusResult<Self> {
        let spec: Self = serde_json::from_str(json)?;
        spec.validate()?;
        Ok(spec)
    }

    /// Parse a spec from YAML and validate it
    pub fn from_yaml_str(yaml: &str) -> LocusResult<Self> {
        let spec: Self = serde_yaml_ng::from_str(yaml)?;
        spec.validate()?;
        Ok(spec)
    }

    /// Iterate over the chain from the outermost link inwards
    #[must_use]
    pub fn links(&self) -> Links<'_> {
        Links {
            current: Some(self),
        }
    }

    /// Number of links in the chain
    #[must_use]
    pub fn depth(&self) -> usize {
        self.links().count()
    }

    /// Check every link has a usable base query
    pub fn validate(&self) -> LocusResult<()> {
        for (level, link) in self.links().enumerate() {
            let query = match link {
                SelectorSpec::Literal(q) => q,
                SelectorSpec::Chain(chain) => &chain.base,
            };
            if query.trim().is_empty() {
                return Err(LocusError::invalid_spec(format!(
                    "link {level} has an empty query"
                )));
            }
        }
        Ok(())
    }
}

impl SelectorSpec {
    fn relinked(&self, inner: Option<Self>) -> Self {
        match self {
            Self::Literal(query) => Self::Literal(query.clone()),
            Self::Chain(chain) => Self::Chain(chain.relinked(inner)),
        }
    }

    fn same_link(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Literal(a), Self::Literal(b)) => a == b,
            (Self::Chain(a), Self::Chain(b)) => a.same_link(b),
            _ => false,
        }
    }
}

// Rebuilt innermost first so cloning never recurses per level.
impl Clone for SelectorSpec {
    fn clone(&self) -> Self {
        let outer: Vec<&Self> = self.links().skip(1).collect();
        let inner = outer
            .into_iter()
            .rev()
            .fold(None, |inner, link| Some(link.relinked(inner)));
        self.relinked(inner)
    }
}

impl PartialEq for SelectorSpec {
    fn eq(&self, other: &Self) -> bool {
        let mut left = self.links();
        let mut right = other.links();
        loop {
            match (left.next(), right.next()) {
                (None, None) => return true,
                (Some(a), Some(b)) if a.same_link(b) => {}
                _ => return false,
            }
        }
    }
}

impl Eq for SelectorSpec {}

/// Flat list of links, outermost first
impl fmt::Debug for SelectorSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.links().map(LinkDebug)).finish()
    }
}

struct LinkDebug<'a>(&'a SelectorSpec);

impl fmt::Debug for LinkDebug<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            SelectorSpec::Literal(query) => f.debug_tuple("Literal").field(query).finish(),
            SelectorSpec::Chain(chain) => f
                .debug_struct("Chain")
                .field("base", &chain.base)
                .field("has_text", &chain.has_text)
                .field("state", &chain.state)
                .field("timeout_ms", &chain.timeout_ms)
                .field("modifiers", &chain.modifiers)
                .finish(),
        }
    }
}

impl Serialize for SelectorSpec {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let depth = self.depth();
        if depth > MAX_SERIALIZED_DEPTH {
            return Err(serde::ser::Error::custom(format!(
                "chain of {depth} links exceeds the serializable depth of {MAX_SERIALIZED_DEPTH}"
            )));
        }
        match self {
            Self::Literal(query) => serializer.serialize_str(query),
            Self::Chain(chain) => chain.serialize(serializer),
        }
    }
}

impl From<&str> for SelectorSpec {
    fn from(value: &str) -> Self {
        Self::Literal(value.to_string())
    }
}

impl From<String> for SelectorSpec {
    fn from(value: String) -> Self {
        Self::Literal(value)
    }
}

impl From<ChainSpec> for SelectorSpec {
    fn from(value: ChainSpec) -> Self {
        Self::Chain(value)
    }
}

/// Chain notation, outermost link first: `#a [has-text="Foo"] >> span`
impl fmt::Display for SelectorSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, link) in self.links().enumerate() {
            if i > 0 {
                f.write_str(" >> ")?;
            }
            match link {
                Self::Literal(query) => f.write_str(query)?,
                Self::Chain(chain) => {
                    f.write_str(&chain.base)?;
                    if let Some(filter) = &chain.has_text {
                        write!(f, " [has-text={filter}]")?;
                    }
                }
            }
        }
        Ok(())
    }
}

/// Iterator over the links of a [`SelectorSpec`]
#[derive(Debug, Clone)]
pub struct Links<'a> {
    current: Option<&'a SelectorSpec>,
}

impl<'a> Iterator for Links<'a> {
    type Item = &'a SelectorSpec;

    fn next(&mut self) -> Option<Self::Item> {
        let spec = self.current?;
        self.current = match spec {
            SelectorSpec::Chain(chain) => chain.sub_selector.as_deref(),
            SelectorSpec::Literal(_) => None,
        };
        Some(spec)
    }
}

// =============================================================================
// RESOLVE OPTIONS
// =============================================================================

/// Expected content for `has-text` / `has-value`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueExpectation {
    /// One value, compared by substring or pattern
    Single(TextMatcher),
    /// Ordered values of a multi-value node
    Many(Vec<TextMatcher>),
}

impl From<&str> for ValueExpectation {
    fn from(value: &str) -> Self {
        Self::Single(value.into())
    }
}

impl From<TextMatcher> for ValueExpectation {
    fn from(value: TextMatcher) -> Self {
        Self::Single(value)
    }
}

/// Per-call options; they sit underneath every setting declared in the chain
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolveOptions {
    /// Text filter for the deepest link when it has none of its own
    pub has_text: Option<TextMatcher>,
    /// Wait limit
    pub timeout: Option<Duration>,
    /// Required state
    pub state: Option<StateKind>,
    /// Keyboard modifiers
    pub modifiers: BTreeSet<Modifier>,
    /// Expected content for `has-text` / `has-value`
    pub expected: Option<ValueExpectation>,
    /// Override strict single-match policy
    pub strict: Option<bool>,
}

impl ResolveOptions {
    /// Empty options
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the fallback text filter
    #[must_use]
    pub fn with_text(mut self, text: impl Into<TextMatcher>) -> Self {
        self.has_text = Some(text.into());
        self
    }

    /// Set the wait limit
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the required state
    #[must_use]
    pub const fn with_state(mut self, state: StateKind) -> Self {
        self.state = Some(state);
        self
    }

    /// Add a keyboard modifier
    #[must_use]
    pub fn with_modifier(mut self, modifier: Modifier) -> Self {
        self.modifiers.insert(modifier);
        self
    }

    /// Set the expected content
    #[must_use]
    pub fn with_expected(mut self, expected: impl Into<ValueExpectation>) -> Self {
        self.expected = Some(expected.into());
        self
    }

    /// Set strict matching
    #[must_use]
    pub const fn with_strict(mut self, strict: bool) -> Self {
        self.strict = Some(strict);
        self
    }
}
