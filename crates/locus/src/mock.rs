//! In-memory element tree for tests and demos.
//!
//! `MockScope` implements [`ScopeProvider`] and [`ElementDriver`] over a small
//! tree built from [`MockElement`] descriptions. It understands compound
//! queries of the form `tag#id.class.class` (each part optional) plus `*`,
//! matched against descendants of the scope in document order.
//!
//! Mutations go through an async lock, so a test can change the tree while
//! a wait is in flight.

use crate::result::{LocusError, LocusResult};
use crate::scope::{ElementDriver, NodeId, NodeState, ScopeProvider};
use crate::selector::Modifier;
use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};
use tokio::sync::RwLock;

/// Description of an element and its subtree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockElement {
    tag: String,
    id: Option<String>,
    classes: Vec<String>,
    text: String,
    visible: bool,
    enabled: bool,
    editable: bool,
    value: Option<String>,
    values: Vec<String>,
    multi_value: bool,
    children: Vec<MockElement>,
}

impl MockElement {
    /// Visible, enabled element; `input` and `textarea` start editable
    #[must_use]
    pub fn new(tag: impl Into<String>) -> Self {
        let tag = tag.into();
        let editable = matches!(tag.as_str(), "input" | "textarea");
        Self {
            tag,
            id: None,
            classes: Vec::new(),
            text: String::new(),
            visible: true,
            enabled: true,
            editable,
            value: None,
            values: Vec::new(),
            multi_value: false,
            children: Vec::new(),
        }
    }

    /// Set the `id`
    #[must_use]
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Add a class
    #[must_use]
    pub fn class(mut self, class: impl Into<String>) -> Self {
        self.classes.push(class.into());
        self
    }

    /// Set the element's own text
    #[must_use]
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    /// Start hidden
    #[must_use]
    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    /// Start disabled
    #[must_use]
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Set whether the element accepts input
    #[must_use]
    pub fn editable(mut self, editable: bool) -> Self {
        self.editable = editable;
        self
    }

    /// Single value
    #[must_use]
    pub fn value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    /// Ordered values; marks the element multi-value
    #[must_use]
    pub fn values<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.values = values.into_iter().map(Into::into).collect();
        self.multi_value = true;
        self
    }

    /// Append a child
    #[must_use]
    pub fn child(mut self, child: Self) -> Self {
        self.children.push(child);
        self
    }
}

#[derive(Debug)]
struct MockNode {
    tag: String,
    id: Option<String>,
    classes: Vec<String>,
    text: String,
    visible: bool,
    enabled: bool,
    editable: bool,
    value: Option<String>,
    values: Vec<String>,
    multi_value: bool,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// Interaction recorded by the [`ElementDriver`] side of [`MockScope`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Interaction {
    /// `click(node, modifiers)`
    Click {
        /// Target node
        node: NodeId,
        /// Modifiers held
        modifiers: BTreeSet<Modifier>,
    },
    /// `fill(node, value)`
    Fill {
        /// Target node
        node: NodeId,
        /// Value typed
        value: String,
    },
}

impl Interaction {
    /// Driver method name
    #[must_use]
    pub const fn method(&self) -> &'static str {
        match self {
            Self::Click { .. } => "click",
            Self::Fill { .. } => "fill",
        }
    }
}

#[derive(Debug, Default)]
struct Tree {
    nodes: HashMap<NodeId, MockNode>,
    roots: Vec<NodeId>,
    next_id: u64,
    history: Vec<Interaction>,
}

impl Tree {
    fn insert(&mut self, parent: Option<NodeId>, element: MockElement) -> NodeId {
        // Nodes are numbered in pop order, so the subtree root takes the next id.
        let root_id = NodeId(format!("n{}", self.next_id + 1));
        let mut stack = vec![(parent, element)];
        while let Some((parent, mut element)) = stack.pop() {
            self.next_id += 1;
            let id = NodeId(format!("n{}", self.next_id));
            let children = std::mem::take(&mut element.children);
            for child in children.into_iter().rev() {
                stack.push((Some(id.clone()), child));
            }
            match &parent {
                Some(p) => {
                    if let Some(node) = self.nodes.get_mut(p) {
                        node.children.push(id.clone());
                    }
                }
                None => self.roots.push(id.clone()),
            }
            self.nodes.insert(
                id.clone(),
                MockNode {
                    tag: element.tag,
                    id: element.id,
                    classes: element.classes,
                    text: element.text,
                    visible: element.visible,
                    enabled: element.enabled,
                    editable: element.editable,
                    value: element.value,
                    values: element.values,
                    multi_value: element.multi_value,
                    parent,
                    children: Vec::new(),
                },
            );
        }
        root_id
    }

    fn node(&self, id: &NodeId) -> LocusResult<&MockNode> {
        self.nodes
            .get(id)
            .ok_or_else(|| LocusError::detached(id))
    }

    fn node_mut(&mut self, id: &NodeId) -> LocusResult<&mut MockNode> {
        self.nodes
            .get_mut(id)
            .ok_or_else(|| LocusError::detached(id))
    }

    /// Subtree of `start` (inclusive) in document order
    fn subtree(&self, start: &[NodeId]) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<&NodeId> = start.iter().rev().collect();
        while let Some(id) = stack.pop() {
            out.push(id.clone());
            if let Some(node) = self.nodes.get(id) {
                stack.extend(node.children.iter().rev());
            }
        }
        out
    }

    fn rendered(&self, id: &NodeId) -> bool {
        let mut current = Some(id);
        while let Some(id) = current {
            match self.nodes.get(id) {
                Some(node) if node.visible => current = node.parent.as_ref(),
                _ => return false,
            }
        }
        true
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
struct SimpleQuery {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
}

impl SimpleQuery {
    fn parse(query: &str) -> LocusResult<Self> {
        let query = query.trim();
        if query == "*" {
            return Ok(Self::default());
        }
        let unsupported = || LocusError::scope(format!("mock scope cannot evaluate {query:?}"));
        if query.is_empty()
            || !query
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '#' | '.' | '-' | '_'))
        {
            return Err(unsupported());
        }

        let mut parsed = Self::default();
        let mut rest = query;
        let tag_end = rest.find(&['#', '.'][..]).unwrap_or(rest.len());
        if tag_end > 0 {
            parsed.tag = Some(rest[..tag_end].to_string());
        }
        rest = &rest[tag_end..];
        while let Some(marker) = rest.chars().next() {
            let body = &rest[1..];
            let end = body.find(&['#', '.'][..]).unwrap_or(body.len());
            let name = &body[..end];
            if name.is_empty() {
                return Err(unsupported());
            }
            if marker == '#' {
                parsed.id = Some(name.to_string());
            } else {
                parsed.classes.push(name.to_string());
            }
            rest = &body[end..];
        }
        Ok(parsed)
    }

    fn matches(&self, node: &MockNode) -> bool {
        self.tag.as_ref().map_or(true, |tag| &node.tag == tag)
            && self.id.as_ref().map_or(true, |id| node.id.as_ref() == Some(id))
            && self.classes.iter().all(|c| node.classes.contains(c))
    }
}

/// In-memory scope provider
#[derive(Debug, Default)]
pub struct MockScope {
    tree: RwLock<Tree>,
}

impl MockScope {
    /// Empty tree
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Tree with the given top-level elements
    #[must_use]
    pub fn with_tree(elements: Vec<MockElement>) -> Self {
        let mut tree = Tree::default();
        for element in elements {
            tree.insert(None, element);
        }
        Self {
            tree: RwLock::new(tree),
        }
    }

    /// Insert `element` under `parent` (or at the top level); returns its id
    pub async fn append_child(
        &self,
        parent: Option<&NodeId>,
        element: MockElement,
    ) -> LocusResult<NodeId> {
        let mut tree = self.tree.write().await;
        if let Some(parent) = parent {
            tree.node(parent)?;
        }
        Ok(tree.insert(parent.cloned(), element))
    }

    /// Detach `node` and its subtree
    pub async fn remove(&self, node: &NodeId) -> LocusResult<()> {
        let mut tree = self.tree.write().await;
        let parent = tree.node(node)?.parent.clone();
        match parent {
            Some(p) => tree.node_mut(&p)?.children.retain(|c| c != node),
            None => tree.roots.retain(|c| c != node),
        }
        for id in tree.subtree(std::slice::from_ref(node)) {
            tree.nodes.remove(&id);
        }
        Ok(())
    }

    /// Toggle visibility
    pub async fn set_visible(&self, node: &NodeId, visible: bool) -> LocusResult<()> {
        self.tree.write().await.node_mut(node)?.visible = visible;
        Ok(())
    }

    /// Toggle interactivity
    pub async fn set_enabled(&self, node: &NodeId, enabled: bool) -> LocusResult<()> {
        self.tree.write().await.node_mut(node)?.enabled = enabled;
        Ok(())
    }

    /// Replace the element's own text
    pub async fn set_text(&self, node: &NodeId, text: impl Into<String>) -> LocusResult<()> {
        self.tree.write().await.node_mut(node)?.text = text.into();
        Ok(())
    }

    /// Replace the element's value
    pub async fn set_value(&self, node: &NodeId, value: impl Into<String>) -> LocusResult<()> {
        self.tree.write().await.node_mut(node)?.value = Some(value.into());
        Ok(())
    }

    /// First node whose `id` attribute equals `id`
    pub async fn find_by_id(&self, id: &str) -> Option<NodeId> {
        let tree = self.tree.read().await;
        tree.subtree(&tree.roots)
            .into_iter()
            .find(|n| tree.nodes.get(n).and_then(|node| node.id.as_deref()) == Some(id))
    }

    /// Parent of `node`
    pub async fn parent_of(&self, node: &NodeId) -> Option<NodeId> {
        self.tree
            .read()
            .await
            .nodes
            .get(node)
            .and_then(|n| n.parent.clone())
    }

    /// Recorded interactions, oldest first
    pub async fn history(&self) -> Vec<Interaction> {
        self.tree.read().await.history.clone()
    }

    /// Clicked nodes with their modifiers, oldest first
    pub async fn clicks(&self) -> Vec<(NodeId, BTreeSet<Modifier>)> {
        self.tree
            .read()
            .await
            .history
            .iter()
            .filter_map(|i| match i {
                Interaction::Click { node, modifiers } => Some((node.clone(), modifiers.clone())),
                Interaction::Fill { .. } => None,
            })
            .collect()
    }

    /// Filled nodes with the typed values, oldest first
    pub async fn filled(&self) -> Vec<(NodeId, String)> {
        self.tree
            .read()
            .await
            .history
            .iter()
            .filter_map(|i| match i {
                Interaction::Fill { node, value } => Some((node.clone(), value.clone())),
                Interaction::Click { .. } => None,
            })
            .collect()
    }

    /// Whether the driver method `method` was called
    pub async fn was_called(&self, method: &str) -> bool {
        self.tree
            .read()
            .await
            .history
            .iter()
            .any(|i| i.method() == method)
    }
}

#[async_trait]
impl ScopeProvider for MockScope {
    async fn query(&self, scope: Option<&NodeId>, query: &str) -> LocusResult<Vec<NodeId>> {
        let parsed = SimpleQuery::parse(query)?;
        let tree = self.tree.read().await;
        let candidates = match scope {
            Some(node) => tree.subtree(&tree.node(node)?.children),
            None => tree.subtree(&tree.roots),
        };
        Ok(candidates
            .into_iter()
            .filter(|id| tree.nodes.get(id).is_some_and(|node| parsed.matches(node)))
            .collect())
    }

    async fn text_of(&self, node: &NodeId) -> LocusResult<String> {
        let tree = self.tree.read().await;
        tree.node(node)?;
        let parts: Vec<&str> = tree
            .subtree(std::slice::from_ref(node))
            .iter()
            .filter_map(|id| tree.nodes.get(id))
            .map(|n| n.text.as_str())
            .filter(|t| !t.is_empty())
            .collect();
        Ok(parts.join(" "))
    }

    async fn inspect(&self, node: &NodeId) -> LocusResult<NodeState> {
        let tree = self.tree.read().await;
        let n = tree.node(node)?;
        Ok(NodeState {
            visible: tree.rendered(node),
            enabled: n.enabled,
            editable: n.editable,
            value: n.value.clone(),
            values: n.values.clone(),
            multi_value: n.multi_value,
        })
    }
}

#[async_trait]
impl ElementDriver for MockScope {
    async fn click(&self, node: &NodeId, modifiers: &BTreeSet<Modifier>) -> LocusResult<()> {
        let mut tree = self.tree.write().await;
        tree.node(node)?;
        tree.history.push(Interaction::Click {
            node: node.clone(),
            modifiers: modifiers.clone(),
        });
        Ok(())
    }

    async fn fill(&self, node: &NodeId, value: &str) -> LocusResult<()> {
        let mut tree = self.tree.write().await;
        tree.node_mut(node)?.value = Some(value.to_string());
        tree.history.push(Interaction::Fill {
            node: node.clone(),
            value: value.to_string(),
        });
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn page() -> MockScope {
        MockScope::with_tree(vec![MockElement::new("div")
            .id("a")
            .class("card")
            .child(MockElement::new("span").text("Foo"))
            .child(
                MockElement::new("p")
                    .class("note")
                    .class("small")
                    .child(MockElement::new("span").text("Bar")),
            )])
    }

    mod query_parse_tests {
        use super::*;

        #[test]
        fn test_compound() {
            let q = SimpleQuery::parse("span#x.a.b").unwrap();
            assert_eq!(q.tag.as_deref(), Some("span"));
            assert_eq!(q.id.as_deref(), Some("x"));
            assert_eq!(q.classes, vec!["a", "b"]);
        }

        #[test]
        fn test_star() {
            assert_eq!(SimpleQuery::parse("*").unwrap(), SimpleQuery::default());
        }

        #[test]
        fn test_unsupported_syntax() {
            assert!(SimpleQuery::parse("div > span").is_err());
            assert!(SimpleQuery::parse("[data-testid=x]").is_err());
            assert!(SimpleQuery::parse("#").is_err());
        }
    }

    mod provider_tests {
        use super::*;

        #[tokio::test]
        async fn test_query_descendants_only() {
            let scope = page();
            let a = scope.find_by_id("a").await.unwrap();
            assert_eq!(scope.query(Some(&a), "div").await.unwrap().len(), 0);
            assert_eq!(scope.query(Some(&a), "span").await.unwrap().len(), 2);
            assert_eq!(scope.query(None, "div#a.card").await.unwrap(), vec![a]);
        }

        #[tokio::test]
        async fn test_text_includes_descendants() {
            let scope = page();
            let a = scope.find_by_id("a").await.unwrap();
            assert_eq!(scope.text_of(&a).await.unwrap(), "Foo Bar");
        }

        #[tokio::test]
        async fn test_hidden_ancestor_hides_descendants() {
            let scope = page();
            let a = scope.find_by_id("a").await.unwrap();
            let span = scope.query(Some(&a), "span").await.unwrap().remove(0);
            assert!(scope.inspect(&span).await.unwrap().visible);
            scope.set_visible(&a, false).await.unwrap();
            assert!(!scope.inspect(&span).await.unwrap().visible);
        }

        #[tokio::test]
        async fn test_append_and_remove() {
            let scope = page();
            let a = scope.find_by_id("a").await.unwrap();
            let added = scope
                .append_child(Some(&a), MockElement::new("button").id("go"))
                .await
                .unwrap();
            assert_eq!(scope.parent_of(&added).await, Some(a.clone()));
            scope.remove(&a).await.unwrap();
            assert!(scope.find_by_id("go").await.is_none());
            assert!(scope.query(None, "*").await.unwrap().is_empty());
            assert!(scope.inspect(&added).await.is_err());
        }

        #[tokio::test]
        async fn test_interactions_recorded() {
            let scope = MockScope::with_tree(vec![MockElement::new("input").id("name")]);
            let input = scope.find_by_id("name").await.unwrap();
            scope.fill(&input, "Ada").await.unwrap();
            scope
                .click(&input, &BTreeSet::from([Modifier::Shift]))
                .await
                .unwrap();
            assert!(scope.was_called("fill").await);
            assert_eq!(
                scope.inspect(&input).await.unwrap().value.as_deref(),
                Some("Ada")
            );
            assert_eq!(scope.filled().await, vec![(input.clone(), "Ada".to_string())]);
            assert_eq!(
                scope.clicks().await,
                vec![(input, BTreeSet::from([Modifier::Shift]))]
            );
            assert_eq!(scope.history().await.len(), 2);
        }
    }
}
