//! Property panel controller.
//!
//! The panel edits one node at a time. `show` reads the node's current look
//! from an `ElementSnapshot` the browser bridge takes of the live element;
//! `change` turns a field edit into a `Mutation`. Style fields become
//! overlay patches, the text field becomes a rename.

use crate::sync::{Fill, Mutation, StylePatch};
use flowpad_core::element::parse_css_number;
use flowpad_core::{NodeId, Rgba};
use serde::Serialize;
use std::ops::RangeInclusive;

pub const FONT_SIZE_RANGE: RangeInclusive<u32> = 8..=48;
pub const DEFAULT_FONT_SIZE: u32 = 16;

const DEFAULT_FILL: Rgba = Rgba::WHITE;
const DEFAULT_STROKE: Rgba = Rgba::BLACK;
const DEFAULT_TEXT_COLOR: Rgba = Rgba::BLACK;

/// Raw attribute values read off a rendered node element.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ElementSnapshot {
    pub text: String,
    /// `fill` of the first shape element found.
    pub fill: Option<String>,
    pub stroke: Option<String>,
    pub text_color: Option<String>,
    pub font_size: Option<String>,
}

/// Field values the panel displays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PanelState {
    pub node: NodeId,
    pub text: String,
    /// `#rrggbb`, suitable for a color input.
    pub fill: String,
    pub no_fill: bool,
    pub stroke: String,
    pub text_color: String,
    pub font_size: u32,
}

impl PanelState {
    pub fn from_snapshot(node: NodeId, snapshot: &ElementSnapshot) -> Self {
        let fill_raw = snapshot.fill.as_deref().map(str::trim).unwrap_or_default();
        Self {
            node,
            text: snapshot.text.trim().to_owned(),
            fill: swatch_or(Some(fill_raw), DEFAULT_FILL),
            no_fill: matches!(fill_raw, "none" | "transparent"),
            stroke: swatch_or(snapshot.stroke.as_deref(), DEFAULT_STROKE),
            text_color: swatch_or(snapshot.text_color.as_deref(), DEFAULT_TEXT_COLOR),
            font_size: snapshot
                .font_size
                .as_deref()
                .and_then(font_size_px)
                .unwrap_or(DEFAULT_FONT_SIZE),
        }
    }
}

fn swatch_or(raw: Option<&str>, default: Rgba) -> String {
    raw.and_then(Rgba::from_hex).unwrap_or(default).to_swatch()
}

/// `"14px"` / `"14"` → 14, clamped to the panel's range.
fn font_size_px(raw: &str) -> Option<u32> {
    let px = parse_css_number(raw)?;
    if !px.is_finite() || px <= 0.0 {
        return None;
    }
    let px = px.round() as u32;
    Some(px.clamp(*FONT_SIZE_RANGE.start(), *FONT_SIZE_RANGE.end()))
}

/// One edited panel field, carrying the raw input value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PanelField {
    Text(String),
    Fill(String),
    NoFill(bool),
    Stroke(String),
    TextColor(String),
    FontSize(String),
}

#[derive(Debug, Default)]
pub struct PropertyPanel {
    state: Option<PanelState>,
}

impl PropertyPanel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn show(&mut self, node: NodeId, snapshot: &ElementSnapshot) -> &PanelState {
        self.state.insert(PanelState::from_snapshot(node, snapshot))
    }

    pub fn hide(&mut self) {
        self.state = None;
    }

    pub fn state(&self) -> Option<&PanelState> {
        self.state.as_ref()
    }

    pub fn node(&self) -> Option<NodeId> {
        self.state.as_ref().map(|s| s.node)
    }

    /// Apply a field edit. `None` when the panel is closed or the value is
    /// unusable.
    pub fn change(&mut self, field: PanelField) -> Option<Mutation> {
        let state = self.state.as_mut()?;
        let id = state.node;
        let patch = match field {
            PanelField::Text(text) => {
                let text = text.trim();
                if text.is_empty() {
                    return None;
                }
                state.text = text.to_owned();
                return Some(Mutation::RenameNode {
                    id,
                    text: text.to_owned(),
                });
            }
            PanelField::Fill(raw) => {
                let color = parse_color("fill", &raw)?;
                state.fill = color.to_swatch();
                state.no_fill = false;
                StylePatch::Fill(Fill::Color(color))
            }
            PanelField::NoFill(true) => {
                state.no_fill = true;
                StylePatch::Fill(Fill::Transparent)
            }
            PanelField::NoFill(false) => {
                state.no_fill = false;
                StylePatch::Fill(Fill::Color(
                    Rgba::from_hex(&state.fill).unwrap_or(DEFAULT_FILL),
                ))
            }
            PanelField::Stroke(raw) => {
                let color = parse_color("stroke", &raw)?;
                state.stroke = color.to_swatch();
                StylePatch::Stroke(color)
            }
            PanelField::TextColor(raw) => {
                let color = parse_color("text color", &raw)?;
                state.text_color = color.to_swatch();
                StylePatch::TextColor(color)
            }
            PanelField::FontSize(raw) => {
                let Some(px) = font_size_px(&raw) else {
                    log::warn!("ignoring font size {raw:?}");
                    return None;
                };
                state.font_size = px;
                StylePatch::FontSize(px)
            }
        };
        Some(Mutation::SetStyle { id, patch })
    }
}

fn parse_color(field: &str, raw: &str) -> Option<Rgba> {
    let color = Rgba::from_hex(raw);
    if color.is_none() {
        log::warn!("ignoring {field} {raw:?}");
    }
    color
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn snapshot(fill: &str, stroke: &str) -> ElementSnapshot {
        ElementSnapshot {
            text: " Start ".into(),
            fill: Some(fill.into()),
            stroke: Some(stroke.into()),
            text_color: None,
            font_size: Some("14px".into()),
        }
    }

    #[test]
    fn show_reads_hex_colors() {
        let state = PanelState::from_snapshot(NodeId::intern("A"), &snapshot("#ECECFF", "#9370DB"));
        assert_eq!(state.text, "Start");
        assert_eq!(state.fill, "#ececff");
        assert_eq!(state.stroke, "#9370db");
        assert_eq!(state.text_color, "#000000");
        assert_eq!(state.font_size, 14);
        assert!(!state.no_fill);
    }

    #[test]
    fn non_hex_colors_fall_back() {
        let state =
            PanelState::from_snapshot(NodeId::intern("A"), &snapshot("rgb(1, 2, 3)", "purple"));
        assert_eq!(state.fill, "#ffffff");
        assert_eq!(state.stroke, "#000000");

        let state = PanelState::from_snapshot(NodeId::intern("A"), &snapshot("none", "#000"));
        assert!(state.no_fill);
        assert_eq!(state.fill, "#ffffff");
    }

    #[test]
    fn font_size_is_clamped() {
        assert_eq!(font_size_px("4px"), Some(8));
        assert_eq!(font_size_px("100"), Some(48));
        assert_eq!(font_size_px("15.6px"), Some(16));
        assert_eq!(font_size_px("large"), None);
    }

    #[test]
    fn style_fields_become_patches() {
        let a = NodeId::intern("A");
        let mut panel = PropertyPanel::new();
        assert_eq!(panel.change(PanelField::Stroke("#123456".into())), None);

        panel.show(a, &snapshot("#ececff", "#9370db"));
        assert_eq!(
            panel.change(PanelField::Stroke("#123456".into())),
            Some(Mutation::SetStyle {
                id: a,
                patch: StylePatch::Stroke(Rgba::rgb(0x12, 0x34, 0x56))
            })
        );
        assert_eq!(
            panel.change(PanelField::FontSize("30".into())),
            Some(Mutation::SetStyle {
                id: a,
                patch: StylePatch::FontSize(30)
            })
        );
        assert_eq!(panel.change(PanelField::TextColor("red".into())), None);
        assert_eq!(panel.state().unwrap().stroke, "#123456");
    }

    #[test]
    fn unchecking_no_fill_restores_panel_fill() {
        let a = NodeId::intern("A");
        let mut panel = PropertyPanel::new();
        panel.show(a, &snapshot("#ff0000", "#000000"));
        assert_eq!(
            panel.change(PanelField::NoFill(true)),
            Some(Mutation::SetStyle {
                id: a,
                patch: StylePatch::Fill(Fill::Transparent)
            })
        );
        assert_eq!(
            panel.change(PanelField::NoFill(false)),
            Some(Mutation::SetStyle {
                id: a,
                patch: StylePatch::Fill(Fill::Color(Rgba::rgb(0xff, 0, 0)))
            })
        );
    }

    #[test]
    fn text_field_renames() {
        let a = NodeId::intern("A");
        let mut panel = PropertyPanel::new();
        panel.show(a, &snapshot("#fff", "#000"));
        assert_eq!(
            panel.change(PanelField::Text(" Begin ".into())),
            Some(Mutation::RenameNode {
                id: a,
                text: "Begin".into()
            })
        );
        assert_eq!(panel.change(PanelField::Text("  ".into())), None);
        panel.hide();
        assert_eq!(panel.node(), None);
    }
}
