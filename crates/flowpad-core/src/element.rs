//! Small grammars over the attributes of rendered SVG elements.
//!
//! Mermaid gives every node group an id of the form
//! `<prefix>flowchart-<identifier>-<counter>` and every edge path an id of
//! the form `L-<from>-<to>-<n>` (older releases) or `L_<from>_<to>_<n>`
//! (newer ones). These ids are the stable handle back into the scanned
//! `Structure`; display text is only a fallback.

use crate::id::NodeId;
use crate::model::Structure;
use winnow::ascii::{digit1, float, multispace0};
use winnow::combinator::{delimited, opt, preceded, terminated};
use winnow::prelude::*;
use winnow::token::{one_of, take_while};

const NODE_PREFIX: &str = "flowchart-";

fn parse_identifier<'a>(input: &mut &'a str) -> ModalResult<&'a str> {
    take_while(1.., |c: char| c.is_ascii_alphanumeric() || c == '_').parse_next(input)
}

/// `<identifier>-<counter>` with nothing after it.
fn parse_node_suffix<'a>(input: &mut &'a str) -> ModalResult<&'a str> {
    terminated(parse_identifier, ('-', digit1)).parse_next(input)
}

/// Map a Mermaid node element id (`flowchart-A-12`) to its identifier.
///
/// Returns `None` for ids that do not follow the pattern, and for
/// identifiers never seen by a scan.
pub fn node_id_from_element_id(element_id: &str) -> Option<NodeId> {
    element_id
        .match_indices(NODE_PREFIX)
        .find_map(|(at, _)| parse_node_suffix.parse(&element_id[at + NODE_PREFIX.len()..]).ok())
        .and_then(NodeId::get)
}

/// `L` followed by the separator Mermaid used (`-` or `_`).
fn parse_edge_head(input: &mut &str) -> ModalResult<char> {
    preceded('L', one_of(['-', '_'])).parse_next(input)
}

/// Map a Mermaid edge element id to the index of the matching edge in
/// `structure`, counting repeated `from --> to` pairs in scan order.
///
/// `L-A-B-n` counts occurrences from zero. `L_A_B_n` uses `0` for the first
/// occurrence and `k + 1` for every later occurrence `k`.
pub fn edge_index_from_element_id(element_id: &str, structure: &Structure) -> Option<usize> {
    let start = element_id
        .match_indices('L')
        .map(|(at, _)| at)
        .find(|&at| at == 0 || element_id[..at].ends_with(['-', '_']))?;

    let mut rest = &element_id[start..];
    let sep = parse_edge_head.parse_next(&mut rest).ok()?;
    let (pair, counter) = rest.rsplit_once(sep)?;
    if !counter.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let counter: usize = counter.parse().ok()?;
    let occurrence = match (sep, counter) {
        ('_', 0) => 0,
        ('_', n) => n - 1,
        (_, n) => n,
    };

    structure
        .edges()
        .iter()
        .enumerate()
        .filter(|(_, e)| {
            pair.strip_prefix(e.from.as_str())
                .and_then(|r| r.strip_prefix(sep))
                .is_some_and(|r| r == e.to.as_str())
        })
        .nth(occurrence)
        .map(|(i, _)| i)
}

// ─── Transforms ───────────────────────────────────────────────────────────

fn parse_translate_args(input: &mut &str) -> ModalResult<(f64, f64)> {
    delimited(
        ("translate", multispace0, '(', multispace0),
        (float, opt(preceded((multispace0, opt(','), multispace0), float))),
        (multispace0, ')'),
    )
    .map(|(x, y): (f64, Option<f64>)| (x, y.unwrap_or(0.0)))
    .parse_next(input)
}

/// Extract the `translate(x, y)` component of an SVG `transform` attribute.
/// A missing `y` is zero, as in SVG.
pub fn parse_translate(transform: &str) -> Option<(f64, f64)> {
    let at = transform.find("translate")?;
    let mut rest = &transform[at..];
    parse_translate_args.parse_next(&mut rest).ok()
}

pub fn format_translate(x: f64, y: f64) -> String {
    format!("translate({x}, {y})")
}

/// Replace the `translate(...)` component of `transform`, keeping every
/// other component, or prepend one if there is none.
pub fn with_translate(transform: &str, x: f64, y: f64) -> String {
    let translate = format_translate(x, y);
    let Some(at) = transform.find("translate") else {
        return if transform.trim().is_empty() {
            translate
        } else {
            format!("{translate} {}", transform.trim())
        };
    };
    let mut rest = &transform[at..];
    match parse_translate_args.parse_next(&mut rest) {
        Ok(_) => format!("{}{translate}{rest}", &transform[..at]),
        Err(_) => translate,
    }
}

// ─── CSS lengths ──────────────────────────────────────────────────────────

fn parse_px(input: &mut &str) -> ModalResult<f64> {
    delimited(multispace0, float, (opt("px"), multispace0)).parse_next(input)
}

/// Parse a unitless or `px` length (`"16"`, `"16px"`, `" 800.5 "`).
/// Relative units and percentages are rejected.
pub fn parse_css_number(value: &str) -> Option<f64> {
    parse_px.parse(value).ok().filter(|v: &f64| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scan::scan;

    #[test]
    fn node_ids_from_mermaid_elements() {
        scan("A[Start] --> step_2{Check}");
        assert_eq!(node_id_from_element_id("flowchart-A-12"), Some(NodeId::intern("A")));
        assert_eq!(
            node_id_from_element_id("flowpad-3-flowchart-step_2-0"),
            Some(NodeId::intern("step_2"))
        );
        assert_eq!(node_id_from_element_id("flowchart-A"), None);
        assert_eq!(node_id_from_element_id("flowchart-A-12-extra"), None);
        assert_eq!(node_id_from_element_id("flowchart-unscanned_zz-1"), None);
    }

    #[test]
    fn edge_ids_resolve_with_occurrence() {
        let s = scan("A --> B\nB --> C\nA --> B\nA_1 --> B");
        assert_eq!(edge_index_from_element_id("L-A-B-0", &s), Some(0));
        assert_eq!(edge_index_from_element_id("L-A-B-1", &s), Some(2));
        assert_eq!(edge_index_from_element_id("L_A_B_0", &s), Some(0));
        assert_eq!(edge_index_from_element_id("L_A_B_2", &s), Some(2));
        assert_eq!(edge_index_from_element_id("L_B_C_0", &s), Some(1));
        assert_eq!(edge_index_from_element_id("L_A_1_B_0", &s), Some(3));
        assert_eq!(edge_index_from_element_id("L-C-A-0", &s), None);
        assert_eq!(edge_index_from_element_id("node-7", &s), None);
    }

    #[test]
    fn translate_parsing() {
        assert_eq!(parse_translate("translate(10, 20)"), Some((10.0, 20.0)));
        assert_eq!(parse_translate("translate(10 -4.5)"), Some((10.0, -4.5)));
        assert_eq!(parse_translate("translate(7)"), Some((7.0, 0.0)));
        assert_eq!(parse_translate("scale(2) translate(1,2)"), Some((1.0, 2.0)));
        assert_eq!(parse_translate("rotate(45)"), None);
    }

    #[test]
    fn translate_replacement_keeps_other_components() {
        assert_eq!(
            with_translate("translate(10, 20) scale(2)", 15.0, 25.0),
            "translate(15, 25) scale(2)"
        );
        assert_eq!(with_translate("", 1.0, 2.0), "translate(1, 2)");
        assert_eq!(with_translate("scale(2)", 1.0, 2.0), "translate(1, 2) scale(2)");
    }

    #[test]
    fn css_numbers() {
        assert_eq!(parse_css_number("16px"), Some(16.0));
        assert_eq!(parse_css_number(" 800 "), Some(800.0));
        assert_eq!(parse_css_number("12.5"), Some(12.5));
        assert_eq!(parse_css_number("100%"), None);
        assert_eq!(parse_css_number("2em"), None);
        assert_eq!(parse_css_number(""), None);
    }
}
