//! Scanned flowchart structure.
//!
//! A `Structure` is the best-effort view of a Mermaid flowchart that the
//! scanner pulls out of the source text: node definitions keyed by
//! identifier, plus the ordered list of `-->` edges. It is rebuilt from
//! scratch on every scan and never edited in place by the UI. Text edits go
//! through [`crate::edit`] and the text is then re-scanned.

use crate::id::NodeId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ─── Shapes ──────────────────────────────────────────────────────────────

/// The shape a node definition asks the renderer for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShapeKind {
    #[default]
    Rect,
    Diamond,
    Circle,
    Round,
}

impl ShapeKind {
    /// Infer the shape from the bracket characters of a definition.
    ///
    /// Precedence is fixed: square brackets, then curly braces, then double
    /// parentheses, then single parentheses. Anything else is a rect.
    pub fn from_brackets(brackets: &str) -> Self {
        if brackets.contains('[') && brackets.contains(']') {
            ShapeKind::Rect
        } else if brackets.contains('{') && brackets.contains('}') {
            ShapeKind::Diamond
        } else if brackets.contains("((") && brackets.contains("))") {
            ShapeKind::Circle
        } else if brackets.contains('(') && brackets.contains(')') {
            ShapeKind::Round
        } else {
            ShapeKind::Rect
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ShapeKind::Rect => "rect",
            ShapeKind::Diamond => "diamond",
            ShapeKind::Circle => "circle",
            ShapeKind::Round => "round",
        }
    }
}

// ─── Nodes & edges ───────────────────────────────────────────────────────

/// A node definition found by the scanner (`A[Start]`, `B{Check}`, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedNode {
    pub id: NodeId,
    /// Display text, trimmed and with surrounding double quotes removed.
    pub text: String,
    pub shape: ShapeKind,
    /// Zero-based index of the raw source line holding the definition.
    pub line: usize,
}

/// A `from --> to` edge, optionally labelled with `-->|label|`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedEdge {
    pub from: NodeId,
    pub to: NodeId,
    pub label: Option<String>,
    /// Zero-based index of the raw source line holding the edge.
    pub line: usize,
    /// Position of this hop among the edges of its line (`A --> B --> C`
    /// has hops 0 and 1).
    pub hop: usize,
}

// ─── Structure ───────────────────────────────────────────────────────────

/// Everything one scan found.
///
/// Nodes keep first-definition order; a redefinition replaces the stored
/// entry but keeps its slot. Edges are append-only and may repeat.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Structure {
    nodes: Vec<ParsedNode>,
    index: HashMap<NodeId, usize>,
    edges: Vec<ParsedEdge>,
}

impl Structure {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a node, overwriting any earlier definition of the same id.
    pub fn insert_node(&mut self, node: ParsedNode) {
        match self.index.get(&node.id) {
            Some(&slot) => self.nodes[slot] = node,
            None => {
                self.index.insert(node.id, self.nodes.len());
                self.nodes.push(node);
            }
        }
    }

    pub fn push_edge(&mut self, edge: ParsedEdge) {
        self.edges.push(edge);
    }

    pub fn node(&self, id: NodeId) -> Option<&ParsedNode> {
        self.index.get(&id).map(|&slot| &self.nodes[slot])
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.index.contains_key(&id)
    }

    /// Nodes in first-definition order.
    pub fn nodes(&self) -> &[ParsedNode] {
        &self.nodes
    }

    pub fn edges(&self) -> &[ParsedEdge] {
        &self.edges
    }

    pub fn edge(&self, index: usize) -> Option<&ParsedEdge> {
        self.edges.get(index)
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }

    /// Edges that start or end at `id`, with their scan index.
    pub fn edges_touching(&self, id: NodeId) -> impl Iterator<Item = (usize, &ParsedEdge)> {
        self.edges
            .iter()
            .enumerate()
            .filter(move |(_, e)| e.from == id || e.to == id)
    }

    /// Whether the text mentions `id` at all, as a definition or an edge
    /// endpoint. Mermaid draws every such node.
    pub fn references(&self, id: NodeId) -> bool {
        self.contains(id) || self.edges_touching(id).next().is_some()
    }

    /// Find the node whose display text equals `text` exactly.
    ///
    /// Returns `None` when no node matches and also when several nodes share
    /// the text, since the element cannot be told apart by text alone.
    pub fn lookup_by_text(&self, text: &str) -> Option<NodeId> {
        let mut hits = self.nodes.iter().filter(|n| n.text == text);
        let first = hits.next()?;
        if hits.next().is_some() {
            log::debug!("ambiguous text lookup for {text:?}");
            return None;
        }
        Some(first.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: &str, text: &str, line: usize) -> ParsedNode {
        ParsedNode {
            id: NodeId::intern(id),
            text: text.into(),
            shape: ShapeKind::Rect,
            line,
        }
    }

    #[test]
    fn shape_precedence() {
        assert_eq!(ShapeKind::from_brackets("[]"), ShapeKind::Rect);
        assert_eq!(ShapeKind::from_brackets("{}"), ShapeKind::Diamond);
        assert_eq!(ShapeKind::from_brackets("(())"), ShapeKind::Circle);
        assert_eq!(ShapeKind::from_brackets("()"), ShapeKind::Round);
        // Square brackets win over everything else
        assert_eq!(ShapeKind::from_brackets("[()]"), ShapeKind::Rect);
        assert_eq!(ShapeKind::from_brackets("{{}}"), ShapeKind::Diamond);
        assert_eq!(ShapeKind::from_brackets(""), ShapeKind::Rect);
    }

    #[test]
    fn redefinition_overwrites_in_place() {
        let mut s = Structure::new();
        s.insert_node(node("A", "first", 0));
        s.insert_node(node("B", "other", 1));
        s.insert_node(node("A", "second", 2));

        assert_eq!(s.nodes().len(), 2);
        assert_eq!(s.nodes()[0].text, "second");
        assert_eq!(s.node(NodeId::intern("A")).unwrap().line, 2);
    }

    #[test]
    fn lookup_by_text_rejects_ambiguity() {
        let mut s = Structure::new();
        s.insert_node(node("A", "Same", 0));
        s.insert_node(node("B", "Same", 1));
        s.insert_node(node("C", "Unique", 2));

        assert_eq!(s.lookup_by_text("Unique"), Some(NodeId::intern("C")));
        assert_eq!(s.lookup_by_text("Same"), None);
        assert_eq!(s.lookup_by_text("Missing"), None);
    }

    #[test]
    fn edges_touching_filters_both_ends() {
        let a = NodeId::intern("A");
        let b = NodeId::intern("B");
        let c = NodeId::intern("C");
        let mut s = Structure::new();
        for (from, to) in [(a, b), (b, c), (c, a), (c, c)] {
            s.push_edge(ParsedEdge {
                from,
                to,
                label: None,
                line: 0,
                hop: 0,
            });
        }
        let touching: Vec<usize> = s.edges_touching(a).map(|(i, _)| i).collect();
        assert_eq!(touching, vec![0, 2]);
    }

    #[test]
    fn edge_endpoints_count_as_references() {
        let a = NodeId::intern("A");
        let b = NodeId::intern("B");
        let mut s = Structure::new();
        s.insert_node(node("A", "Start", 0));
        s.push_edge(ParsedEdge {
            from: a,
            to: b,
            label: None,
            line: 1,
            hop: 0,
        });
        assert!(s.references(a));
        assert!(!s.contains(b));
        assert!(s.references(b));
        assert!(!s.references(NodeId::intern("Unmentioned")));
    }
}
