//! Line scanner: Mermaid flowchart text → `Structure`.
//!
//! This is deliberately not a parser. Each line is matched against two
//! patterns, one for node definitions (`A[Start]`, `B{Check}`, `C((Hub))`,
//! `D(Soft)`) and one for plain `-->` edges with an optional `|label|`.
//! Anything that matches neither is skipped without complaint, so the
//! scanner never fails and never validates.
//!
//! The match functions are public so that [`crate::edit`] can rewrite the
//! exact byte ranges the scanner saw.

use crate::id::NodeId;
use crate::model::{ParsedEdge, ParsedNode, ShapeKind, Structure};
use regex::Regex;
use smallvec::SmallVec;
use std::ops::Range;
use std::sync::LazyLock;

static NODE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"([A-Za-z0-9_]+)([\[{(]+)("[^"]*"|[^\]})]+)([\]})]+)"#)
        .expect("node pattern must compile")
});

// The `from` side may carry its own inline definition (`A[Start] --> B`).
static EDGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"([A-Za-z0-9_]+)(?:[\[{(]+(?:"[^"]*"|[^\]})]*)[\]})]+)?\s*(-->)\s*(\|([^|]+)\|)?\s*([A-Za-z0-9_]+)"#,
    )
    .expect("edge pattern must compile")
});

// ─── Matches ──────────────────────────────────────────────────────────────

/// One node definition on a line. Ranges are byte offsets into the line.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeMatch {
    pub id: NodeId,
    pub shape: ShapeKind,
    /// Display text after trimming and unquoting.
    pub text: String,
    /// The whole definition, identifier through closing bracket.
    pub span: Range<usize>,
    /// The raw text between the brackets.
    pub text_span: Range<usize>,
}

/// One `-->` hop on a line.
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeMatch {
    pub from: NodeId,
    pub to: NodeId,
    pub label: Option<String>,
    /// Identifier of `from` through identifier of `to`.
    pub span: Range<usize>,
    /// The `-->` token.
    pub arrow: Range<usize>,
    /// `|label|` including both pipes.
    pub label_span: Option<Range<usize>>,
}

/// Whether the scanner ignores this line entirely.
pub fn is_skipped(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.is_empty() || trimmed.starts_with("%%")
}

/// All `-->` hops on a line, left to right. Chains (`A --> B --> C`) yield
/// one match per hop, the next hop starting at the previous `to`.
pub fn edge_matches(line: &str) -> SmallVec<[EdgeMatch; 2]> {
    let mut out = SmallVec::new();
    let mut at = 0;
    while let Some(caps) = EDGE_RE.captures_at(line, at) {
        let (Some(from), Some(arrow), Some(to)) = (caps.get(1), caps.get(2), caps.get(6)) else {
            break;
        };
        let label = caps
            .get(5)
            .map(|m| m.as_str().trim())
            .filter(|l| !l.is_empty())
            .map(str::to_owned);
        out.push(EdgeMatch {
            from: NodeId::intern(from.as_str()),
            to: NodeId::intern(to.as_str()),
            label,
            span: from.start()..to.end(),
            arrow: arrow.range(),
            label_span: caps.get(4).map(|m| m.range()),
        });
        at = to.start();
    }
    out
}

/// All node definitions on a line, left to right.
///
/// Bracketed runs inside an edge label (`-->|f(x)|`) are not definitions
/// and are dropped.
pub fn node_matches(line: &str) -> SmallVec<[NodeMatch; 2]> {
    let labels: SmallVec<[Range<usize>; 2]> = edge_matches(line)
        .into_iter()
        .filter_map(|e| e.label_span)
        .collect();

    NODE_RE
        .captures_iter(line)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            if labels.iter().any(|l| l.contains(&whole.start())) {
                return None;
            }
            let id = caps.get(1)?;
            let open = caps.get(2)?;
            let body = caps.get(3)?;
            let close = caps.get(4)?;
            let brackets = format!("{}{}", open.as_str(), close.as_str());
            Some(NodeMatch {
                id: NodeId::intern(id.as_str()),
                shape: ShapeKind::from_brackets(&brackets),
                text: clean_text(body.as_str()),
                span: whole.range(),
                text_span: body.range(),
            })
        })
        .collect()
}

fn clean_text(raw: &str) -> String {
    let trimmed = raw.trim();
    trimmed
        .strip_prefix('"')
        .and_then(|t| t.strip_suffix('"'))
        .unwrap_or(trimmed)
        .trim()
        .to_owned()
}

// ─── Scan ─────────────────────────────────────────────────────────────────

/// Scan flowchart text into a fresh `Structure`.
///
/// Never fails. Scanning the same text twice yields equal structures.
#[must_use]
pub fn scan(text: &str) -> Structure {
    let mut structure = Structure::new();

    for (line_no, line) in text.split('\n').enumerate() {
        if is_skipped(line) {
            continue;
        }
        for m in node_matches(line) {
            structure.insert_node(ParsedNode {
                id: m.id,
                text: m.text,
                shape: m.shape,
                line: line_no,
            });
        }
        for (hop, e) in edge_matches(line).into_iter().enumerate() {
            structure.push_edge(ParsedEdge {
                from: e.from,
                to: e.to,
                label: e.label,
                line: line_no,
                hop,
            });
        }
    }

    log::debug!(
        "scanned {} nodes, {} edges",
        structure.nodes().len(),
        structure.edges().len()
    );
    structure
}
