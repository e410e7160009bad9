//! Text edits that translate visual actions back into flowchart source.
//!
//! Every function takes the whole source text and returns a new string;
//! nothing here keeps state. Line structure is preserved wherever possible:
//! only the lines that mention the edited node or edge are touched, and
//! `\n` separators are kept as they were.

use crate::id::NodeId;
use crate::scan::{edge_matches, is_skipped, node_matches};

const INDENT: &str = "    ";

/// Append a line to the end of `text`, adding a separating newline unless
/// the text is empty or already ends with one. CRLF text gets `\r\n`.
fn append_line(text: &str, line: &str) -> String {
    if text.is_empty() || text.ends_with('\n') {
        return format!("{text}{line}");
    }
    let newline = if text.contains("\r\n") { "\r\n" } else { "\n" };
    format!("{text}{newline}{line}")
}

/// Append `    from --> to` as a new line.
pub fn append_edge(text: &str, from: NodeId, to: NodeId) -> String {
    append_line(text, &format!("{INDENT}{from} --> {to}"))
}

/// Append `    id[label]` as a new line.
pub fn append_node(text: &str, id: NodeId, label: &str) -> String {
    append_line(text, &format!("{INDENT}{id}[{}]", node_text(label)))
}

/// Make arbitrary user input safe to put between node brackets.
fn node_text(raw: &str) -> String {
    let flat = raw.replace(['\r', '\n'], " ").replace('"', "'");
    let flat = flat.trim();
    if flat.contains(['[', ']', '{', '}', '(', ')', '|']) {
        format!("\"{flat}\"")
    } else {
        flat.to_owned()
    }
}

fn label_text(raw: &str) -> String {
    raw.replace(['\r', '\n'], " ").replace('|', "/").trim().to_owned()
}

fn splice(line: &str, range: std::ops::Range<usize>, with: &str) -> String {
    format!("{}{with}{}", &line[..range.start], &line[range.end..])
}

fn join(lines: Vec<String>) -> String {
    lines.join("\n")
}

/// Change the display text of `id`.
///
/// Rewrites the text of the last definition (the one the scanner keeps).
/// A node that only appears in edges gets a new definition line. Returns
/// `None` when the identifier is not in the text at all.
pub fn rename_node(text: &str, id: NodeId, new_text: &str) -> Option<String> {
    let mut lines: Vec<String> = text.split('\n').map(str::to_owned).collect();

    let mut last_def = None;
    let mut referenced = false;
    for (line_no, line) in lines.iter().enumerate() {
        if is_skipped(line) {
            continue;
        }
        if let Some(m) = node_matches(line).into_iter().rev().find(|m| m.id == id) {
            last_def = Some((line_no, m.text_span));
        }
        referenced |= edge_matches(line).iter().any(|e| e.from == id || e.to == id);
    }

    let body = node_text(new_text);
    match last_def {
        Some((line_no, span)) => {
            lines[line_no] = splice(&lines[line_no], span, &body);
            Some(join(lines))
        }
        None if referenced => Some(append_line(text, &format!("{INDENT}{id}[{body}]"))),
        None => None,
    }
}

/// Set, change or clear (`""`) the label of the `index`-th scanned edge.
/// Returns `None` if there is no such edge.
pub fn relabel_edge(text: &str, index: usize, label: &str) -> Option<String> {
    let mut lines: Vec<String> = text.split('\n').map(str::to_owned).collect();
    let label = label_text(label);

    let mut seen = 0;
    for line_no in 0..lines.len() {
        if is_skipped(&lines[line_no]) {
            continue;
        }
        let edges = edge_matches(&lines[line_no]);
        if index >= seen + edges.len() {
            seen += edges.len();
            continue;
        }
        let edge = &edges[index - seen];
        let line = &lines[line_no];
        lines[line_no] = match (&edge.label_span, label.is_empty()) {
            (Some(span), true) => splice(line, span.clone(), ""),
            (Some(span), false) => splice(line, span.clone(), &format!("|{label}|")),
            (None, true) => return Some(text.to_owned()),
            (None, false) => splice(line, edge.arrow.end..edge.arrow.end, &format!("|{label}|")),
        };
        return Some(join(lines));
    }
    None
}

/// Whether a `style`, `class` or `click` statement targets `id`.
/// Returns the rewritten statement when other targets remain.
fn strip_statement(line: &str, id: NodeId) -> Option<Option<String>> {
    let trimmed = line.trim_start();
    let keyword = ["style ", "class ", "click "]
        .into_iter()
        .find(|k| trimmed.starts_with(k))?;
    let after = trimmed[keyword.len()..].trim_start();
    let (targets, tail) = after.split_once(char::is_whitespace).unwrap_or((after, ""));

    let ids: Vec<&str> = targets.split(',').collect();
    if !ids.contains(&id.as_str()) {
        return None;
    }
    let kept: Vec<&str> = ids.into_iter().filter(|t| *t != id.as_str()).collect();
    if kept.is_empty() {
        return Some(None);
    }
    let indent = &line[..line.len() - trimmed.len()];
    Some(Some(format!("{indent}{keyword}{} {tail}", kept.join(",")).trim_end().to_owned()))
}

/// Remove `id` from the text: its definitions, every edge touching it,
/// and any `style`/`class`/`click` statement aimed at it.
///
/// A line that also holds other nodes' definitions or untouched edge hops
/// is rewritten so those survive as standalone lines. Returns `None` when
/// nothing referenced `id`.
pub fn remove_node(text: &str, id: NodeId) -> Option<String> {
    let mut out: Vec<String> = Vec::new();
    let mut changed = false;

    for line in text.split('\n') {
        if is_skipped(line) {
            out.push(line.to_owned());
            continue;
        }
        if let Some(rewritten) = strip_statement(line, id) {
            changed = true;
            out.extend(rewritten);
            continue;
        }

        let nodes = node_matches(line);
        let edges = edge_matches(line);
        let touches = nodes.iter().any(|n| n.id == id)
            || edges.iter().any(|e| e.from == id || e.to == id);
        if !touches {
            out.push(line.to_owned());
            continue;
        }
        changed = true;

        let indent = &line[..line.len() - line.trim_start().len()];
        for n in nodes.iter().filter(|n| n.id != id) {
            out.push(format!("{indent}{}", &line[n.span.clone()]));
        }
        for e in edges.iter().filter(|e| e.from != id && e.to != id) {
            match &e.label {
                Some(label) => out.push(format!("{indent}{} -->|{label}| {}", e.from, e.to)),
                None => out.push(format!("{indent}{} --> {}", e.from, e.to)),
            }
        }
    }

    changed.then(|| join(out))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scan::scan;
    use pretty_assertions::assert_eq;

    fn id(s: &str) -> NodeId {
        NodeId::intern(s)
    }

    #[test]
    fn append_edge_adds_exactly_one_line() {
        let text = "flowchart TD\n    A --> B";
        let out = append_edge(text, id("B"), id("A"));
        assert_eq!(out, "flowchart TD\n    A --> B\n    B --> A");
        assert_eq!(out.lines().count(), text.lines().count() + 1);
    }

    #[test]
    fn append_respects_trailing_newline() {
        assert_eq!(append_edge("A --> B\n", id("A"), id("C")), "A --> B\n    A --> C");
        assert_eq!(append_node("", id("N1"), "Node 1"), "    N1[Node 1]");
    }

    #[test]
    fn append_keeps_crlf_line_endings() {
        let out = append_edge("flowchart TD\r\n    A --> B", id("B"), id("A"));
        assert_eq!(out, "flowchart TD\r\n    A --> B\r\n    B --> A");
        assert_eq!(
            append_node("A --> B\r\n", id("N1"), "Node 1"),
            "A --> B\r\n    N1[Node 1]"
        );
    }

    #[test]
    fn rename_rewrites_last_definition() {
        let text = "A[Old]\nB[Other]\nA[Newer old] --> B";
        let out = rename_node(text, id("A"), "Fresh").unwrap();
        assert_eq!(out, "A[Old]\nB[Other]\nA[Fresh] --> B");
        assert_eq!(scan(&out).node(id("A")).unwrap().text, "Fresh");
    }

    #[test]
    fn rename_quotes_bracket_characters() {
        let out = rename_node("A[x]", id("A"), "f(x) \"y\"").unwrap();
        assert_eq!(out, "A[\"f(x) 'y'\"]");
    }

    #[test]
    fn rename_of_edge_only_node_appends_definition() {
        let out = rename_node("C --> E", id("E"), "End").unwrap();
        assert_eq!(out, "C --> E\n    E[End]");
        assert_eq!(rename_node("C --> E", id("Q"), "x"), None);
    }

    #[test]
    fn relabel_sets_changes_and_clears() {
        let text = "A --> B\nB -->|No| C";
        assert_eq!(relabel_edge(text, 0, "Yes").unwrap(), "A -->|Yes| B\nB -->|No| C");
        assert_eq!(relabel_edge(text, 1, "Maybe").unwrap(), "A --> B\nB -->|Maybe| C");
        assert_eq!(relabel_edge(text, 1, " ").unwrap(), "A --> B\nB --> C");
        assert_eq!(relabel_edge(text, 2, "x"), None);
    }

    #[test]
    fn relabel_counts_chain_hops() {
        let out = relabel_edge("A --> B --> C", 1, "a|b").unwrap();
        assert_eq!(out, "A --> B -->|a/b| C");
    }

    #[test]
    fn remove_drops_definitions_and_incident_edges() {
        let text = "flowchart TD\n    A[Start] --> B{Decision}\n    B -->|Yes| C[Process 1]\n    C --> E[End]\n    style C fill:#f9f";
        let out = remove_node(text, id("C")).unwrap();
        assert_eq!(out, "flowchart TD\n    A[Start] --> B{Decision}\n    E[End]");
        let s = scan(&out);
        assert!(!s.contains(id("C")));
        assert!(s.edges().iter().all(|e| e.from != id("C") && e.to != id("C")));
    }

    #[test]
    fn remove_keeps_surviving_hops_and_class_targets() {
        let text = "A --> B --> C\nclass A,B hot";
        let out = remove_node(text, id("C")).unwrap();
        assert_eq!(out, "A --> B\nclass A,B hot");
        let out = remove_node(text, id("A")).unwrap();
        assert_eq!(out, "B --> C\nclass B hot");
    }

    #[test]
    fn remove_unknown_is_none() {
        assert_eq!(remove_node("A --> B", id("Z")), None);
    }
}
