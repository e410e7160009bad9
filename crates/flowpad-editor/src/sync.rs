//! Sync engine: flowchart text ↔ scanned structure ↔ overlays.
//!
//! The engine owns the three pieces of state the rest of the editor reads:
//!
//! - **Text** is the single source of truth for topology. Every mutation
//!   replaces the whole string and is followed by a full re-scan.
//! - **Structure** is the scanned view of the text, rebuilt on every change.
//! - **Overlays** hold per-node visual adjustments (drag offset, colors,
//!   font size). They are keyed by identifier so they outlive the DOM
//!   elements a re-render throws away, and they never reach the text.

use flowpad_core::edit;
use flowpad_core::{NodeId, Rgba, Structure, scan};
use serde::Serialize;
use std::collections::HashMap;

// ─── Overlays ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase", tag = "kind", content = "color")]
pub enum Fill {
    Color(Rgba),
    /// The "no background" checkbox.
    Transparent,
}

/// Visual adjustments applied on top of whatever the renderer produced.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Overlay {
    /// Cumulative drag offset relative to the rendered position.
    pub offset: (f64, f64),
    pub fill: Option<Fill>,
    pub stroke: Option<Rgba>,
    pub text_color: Option<Rgba>,
    /// Font size in pixels.
    pub font_size: Option<u32>,
}

impl Overlay {
    pub fn is_identity(&self) -> bool {
        *self == Overlay::default()
    }
}

/// One style attribute change from the property panel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", tag = "field", content = "value")]
pub enum StylePatch {
    Fill(Fill),
    Stroke(Rgba),
    TextColor(Rgba),
    FontSize(u32),
}

// ─── Mutations ────────────────────────────────────────────────────────────

/// Every change the editor can make to the engine state.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum Mutation {
    AppendEdge { from: NodeId, to: NodeId },
    /// Append `N<k>[Node <k>]` with the next free counter value.
    AddNode,
    RenameNode { id: NodeId, text: String },
    RelabelEdge { index: usize, label: String },
    RemoveNode { id: NodeId },
    /// Set the cumulative drag offset of a node.
    MoveNode { id: NodeId, offset: (f64, f64) },
    SetStyle { id: NodeId, patch: StylePatch },
    /// Drop every overlay (Reset view).
    ResetOverlays,
}

impl Mutation {
    /// Whether applying this mutation may change the text.
    pub fn touches_text(&self) -> bool {
        matches!(
            self,
            Self::AppendEdge { .. }
                | Self::AddNode
                | Self::RenameNode { .. }
                | Self::RelabelEdge { .. }
                | Self::RemoveNode { .. }
        )
    }
}

/// What applying a mutation did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Applied {
    pub text_changed: bool,
    /// The visual needs a fresh render (text changed, or overlays were
    /// reset and the original positions must come back).
    pub rerender: bool,
    /// The overlay of this node changed and can be re-applied in place.
    pub overlay_changed: Option<NodeId>,
    /// Identifier created by `AddNode`.
    pub created: Option<NodeId>,
}

// ─── Engine ───────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct SyncEngine {
    text: String,
    structure: Structure,
    overlays: HashMap<NodeId, Overlay>,
    node_counter: u32,
}

impl SyncEngine {
    pub fn from_text(text: &str) -> Self {
        Self {
            text: text.to_owned(),
            structure: scan(text),
            overlays: HashMap::new(),
            node_counter: 0,
        }
    }

    /// Replace the entire text (a text-box edit or a load) and re-scan.
    pub fn set_text(&mut self, text: &str) {
        if text == self.text {
            return;
        }
        self.text = text.to_owned();
        self.structure = scan(text);
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn structure(&self) -> &Structure {
        &self.structure
    }

    pub fn overlay(&self, id: NodeId) -> Option<&Overlay> {
        self.overlays.get(&id)
    }

    pub fn overlays(&self) -> impl Iterator<Item = (NodeId, &Overlay)> {
        self.overlays.iter().map(|(id, o)| (*id, o))
    }

    pub fn offset_of(&self, id: NodeId) -> (f64, f64) {
        self.overlays.get(&id).map(|o| o.offset).unwrap_or((0.0, 0.0))
    }

    /// Forget overlays of nodes the text no longer defines or references.
    /// Called once a render has succeeded, so transient typos in the text
    /// box do not wipe styling.
    pub fn prune_overlays(&mut self) {
        let structure = &self.structure;
        self.overlays.retain(|id, overlay| {
            structure.references(*id) && !overlay.is_identity()
        });
    }

    fn replace_text(&mut self, text: String) -> bool {
        if text == self.text {
            return false;
        }
        self.structure = scan(&text);
        self.text = text;
        true
    }

    fn next_node_id(&mut self) -> NodeId {
        loop {
            self.node_counter += 1;
            let id = NodeId::intern(&format!("N{}", self.node_counter));
            if !self.structure.references(id) {
                return id;
            }
        }
    }

    /// Apply one mutation.
    pub fn apply(&mut self, mutation: Mutation) -> Applied {
        let mut applied = Applied::default();
        match mutation {
            Mutation::AppendEdge { from, to } => {
                applied.text_changed = self.replace_text(edit::append_edge(&self.text, from, to));
            }
            Mutation::AddNode => {
                let id = self.next_node_id();
                let label = format!("Node {}", self.node_counter);
                applied.text_changed = self.replace_text(edit::append_node(&self.text, id, &label));
                applied.created = Some(id);
            }
            Mutation::RenameNode { id, text } => {
                if let Some(new_text) = edit::rename_node(&self.text, id, &text) {
                    applied.text_changed = self.replace_text(new_text);
                } else {
                    log::warn!("rename: {id} is not in the text");
                }
            }
            Mutation::RelabelEdge { index, label } => {
                if let Some(new_text) = edit::relabel_edge(&self.text, index, &label) {
                    applied.text_changed = self.replace_text(new_text);
                } else {
                    log::warn!("relabel: no edge #{index}");
                }
            }
            Mutation::RemoveNode { id } => {
                if let Some(new_text) = edit::remove_node(&self.text, id) {
                    applied.text_changed = self.replace_text(new_text);
                }
                self.overlays.remove(&id);
            }
            Mutation::MoveNode { id, offset } => {
                self.overlays.entry(id).or_default().offset = offset;
                applied.overlay_changed = Some(id);
            }
            Mutation::SetStyle { id, patch } => {
                let overlay = self.overlays.entry(id).or_default();
                match patch {
                    StylePatch::Fill(fill) => overlay.fill = Some(fill),
                    StylePatch::Stroke(c) => overlay.stroke = Some(c),
                    StylePatch::TextColor(c) => overlay.text_color = Some(c),
                    StylePatch::FontSize(px) => overlay.font_size = Some(px),
                }
                applied.overlay_changed = Some(id);
            }
            Mutation::ResetOverlays => {
                self.overlays.clear();
                applied.rerender = true;
            }
        }
        applied.rerender |= applied.text_changed;
        applied
    }
}
