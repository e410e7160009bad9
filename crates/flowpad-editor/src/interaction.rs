//! Interaction state machine.
//!
//! ```text
//!            toggle edit                 toggle connect
//! ViewOnly ◀────────────▶ Edit(Idle) ◀──────────────────▶ Edit(Connecting)
//!                            │  ▲          Escape / edge created
//!               pointer-down │  │ pointer-up
//!                            ▼  │
//!                          (drag)
//! ```
//!
//! Events are ignored in `ViewOnly`. `Interaction::handle` turns one input
//! event into a list of `Effect`s: view changes for the browser bridge to
//! perform, plus `Effect::Mutate` entries the editor applies to the
//! `SyncEngine`.

use crate::input::{InputEvent, Target};
use crate::shortcuts::{ShortcutAction, ShortcutMap};
use crate::sync::{Mutation, Overlay, SyncEngine};
use flowpad_core::{NodeId, Structure};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    ViewOnly,
    Edit(EditState),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EditState {
    #[default]
    Idle,
    /// Connect mode; `start` is the first endpoint once chosen.
    Connecting { start: Option<NodeId> },
}

/// Alive between pointer-down and pointer-up on a node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DragSession {
    pub node: NodeId,
    pub pointer_start: (f64, f64),
    /// The node's overlay offset when the drag began.
    pub offset_start: (f64, f64),
}

impl DragSession {
    pub fn offset_at(&self, x: f64, y: f64) -> (f64, f64) {
        (
            self.offset_start.0 + (x - self.pointer_start.0),
            self.offset_start.1 + (y - self.pointer_start.1),
        )
    }
}

/// Entries of the node context menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextAction {
    EditText,
    ChangeColor,
    Delete,
}

/// Something the outside world should do in response to an event.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Effect {
    Select { node: NodeId },
    Deselect { node: NodeId },
    ShowPanel { node: NodeId },
    HidePanel,
    /// The connect-start outline.
    Outline { node: NodeId },
    ClearOutline { node: NodeId },
    BeginDrag { node: NodeId },
    EndDrag { node: NodeId },
    PromptRename { node: NodeId, current: String },
    PromptRelabel { edge: usize, current: String },
    ShowContextMenu { node: NodeId, x: f64, y: f64 },
    HideContextMenu,
    ConnectModeChanged { active: bool },
    EditModeChanged { active: bool },
    Mutate { mutation: Mutation },
    /// Re-apply a node's overlay to its live element.
    ApplyOverlay { node: NodeId, overlay: Overlay },
    TextChanged { text: String },
}

#[derive(Debug, Default)]
pub struct Interaction {
    mode: Mode,
    selected: Option<NodeId>,
    drag: Option<DragSession>,
    menu_target: Option<NodeId>,
}

impl Interaction {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn is_editing(&self) -> bool {
        matches!(self.mode, Mode::Edit(_))
    }

    pub fn is_connecting(&self) -> bool {
        matches!(self.mode, Mode::Edit(EditState::Connecting { .. }))
    }

    pub fn selected(&self) -> Option<NodeId> {
        self.selected
    }

    pub fn drag(&self) -> Option<&DragSession> {
        self.drag.as_ref()
    }

    // ─── Events ──────────────────────────────────────────────────────────

    pub fn handle(&mut self, event: &InputEvent, engine: &SyncEngine) -> Vec<Effect> {
        let Mode::Edit(state) = self.mode else {
            return Vec::new();
        };
        let mut fx = Vec::new();

        match (event, state) {
            (InputEvent::Click { target }, _) => match (*target, state) {
                (Target::Node(node), EditState::Connecting { start }) => {
                    self.connect_click(start, node, &mut fx);
                }
                (Target::Node(node), EditState::Idle) => {
                    self.hide_menu(&mut fx);
                    self.select(node, &mut fx);
                }
                (Target::EdgeLabel(index), EditState::Idle) => {
                    if let Some(edge) = engine.structure().edge(index) {
                        fx.push(Effect::PromptRelabel {
                            edge: index,
                            current: edge.label.clone().unwrap_or_default(),
                        });
                    }
                }
                (Target::EdgeLabel(_), EditState::Connecting { .. }) => {}
                (Target::Background, _) => {
                    self.clear_selection(&mut fx);
                    self.hide_menu(&mut fx);
                }
            },
            (InputEvent::DoubleClick { target: Target::Node(node) }, EditState::Idle) => {
                fx.push(rename_prompt(*node, engine.structure()));
            }
            (InputEvent::PointerDown { target: Target::Node(node), x, y }, EditState::Idle) => {
                self.drag = Some(DragSession {
                    node: *node,
                    pointer_start: (*x, *y),
                    offset_start: engine.offset_of(*node),
                });
                fx.push(Effect::BeginDrag { node: *node });
            }
            (InputEvent::PointerMove { x, y }, _) => {
                if let Some(drag) = &self.drag {
                    fx.push(Effect::Mutate {
                        mutation: Mutation::MoveNode {
                            id: drag.node,
                            offset: drag.offset_at(*x, *y),
                        },
                    });
                }
            }
            (InputEvent::PointerUp { .. }, _) => self.end_drag(&mut fx),
            (InputEvent::ContextMenu { target: Target::Node(node), x, y }, _) => {
                self.menu_target = Some(*node);
                fx.push(Effect::ShowContextMenu {
                    node: *node,
                    x: *x,
                    y: *y,
                });
            }
            (InputEvent::Key { key, modifiers }, _) => {
                let action = ShortcutMap::resolve(
                    key,
                    modifiers.ctrl,
                    modifiers.shift,
                    modifiers.alt,
                    modifiers.meta,
                );
                match action {
                    Some(ShortcutAction::Cancel) => {
                        self.clear_selection(&mut fx);
                        self.leave_connect(&mut fx);
                        self.hide_menu(&mut fx);
                    }
                    Some(ShortcutAction::DeleteSelected) => {
                        if let Some(node) = self.selected {
                            self.delete(node, &mut fx);
                        }
                    }
                    Some(ShortcutAction::RenameSelected) => {
                        if let Some(node) = self.selected {
                            fx.push(rename_prompt(node, engine.structure()));
                        }
                    }
                    None => {}
                }
            }
            _ => {}
        }
        fx
    }

    // ─── Toolbar & menu ──────────────────────────────────────────────────

    pub fn toggle_edit_mode(&mut self) -> Vec<Effect> {
        let mut fx = Vec::new();
        if self.is_editing() {
            self.clear_transient(&mut fx);
            self.mode = Mode::ViewOnly;
            fx.push(Effect::EditModeChanged { active: false });
        } else {
            self.mode = Mode::Edit(EditState::Idle);
            fx.push(Effect::EditModeChanged { active: true });
        }
        log::info!("edit mode {}", if self.is_editing() { "on" } else { "off" });
        fx
    }

    /// Enter or leave connect mode. Ignored outside edit mode.
    pub fn toggle_connect_mode(&mut self) -> Vec<Effect> {
        let mut fx = Vec::new();
        match self.mode {
            Mode::ViewOnly => {}
            Mode::Edit(EditState::Idle) => {
                self.end_drag(&mut fx);
                self.mode = Mode::Edit(EditState::Connecting { start: None });
                fx.push(Effect::ConnectModeChanged { active: true });
            }
            Mode::Edit(EditState::Connecting { .. }) => self.leave_connect(&mut fx),
        }
        fx
    }

    pub fn context_action(&mut self, action: ContextAction, engine: &SyncEngine) -> Vec<Effect> {
        let mut fx = Vec::new();
        let target = self.menu_target;
        self.hide_menu(&mut fx);
        let Some(node) = target.filter(|_| self.is_editing()) else {
            return fx;
        };
        match action {
            ContextAction::EditText => fx.push(rename_prompt(node, engine.structure())),
            ContextAction::ChangeColor => self.select(node, &mut fx),
            ContextAction::Delete => self.delete(node, &mut fx),
        }
        fx
    }

    /// The panel's close button.
    pub fn deselect(&mut self) -> Vec<Effect> {
        let mut fx = Vec::new();
        self.clear_selection(&mut fx);
        fx
    }

    /// The panel's delete button.
    pub fn delete_selected(&mut self) -> Vec<Effect> {
        let mut fx = Vec::new();
        if let Some(node) = self.selected.filter(|_| self.is_editing()) {
            self.delete(node, &mut fx);
        }
        fx
    }

    /// Reset view: drop selection, connect state and drag offsets, then
    /// re-render from the text.
    pub fn reset_view(&mut self) -> Vec<Effect> {
        let mut fx = Vec::new();
        self.clear_transient(&mut fx);
        fx.push(Effect::Mutate {
            mutation: Mutation::ResetOverlays,
        });
        fx
    }

    /// Re-apply decoration to the freshly rendered elements, dropping any
    /// state that points at nodes the new render no longer has.
    pub fn after_render(&mut self, structure: &Structure) -> Vec<Effect> {
        let mut fx = Vec::new();
        self.drag = None;

        if let Some(node) = self.selected {
            if structure.references(node) {
                fx.push(Effect::Select { node });
            } else {
                self.selected = None;
                fx.push(Effect::HidePanel);
            }
        }
        if let Mode::Edit(EditState::Connecting { start: Some(node) }) = self.mode {
            if structure.references(node) {
                fx.push(Effect::Outline { node });
            } else {
                self.mode = Mode::Edit(EditState::Connecting { start: None });
            }
        }
        if self.menu_target.is_some_and(|n| !structure.references(n)) {
            self.hide_menu(&mut fx);
        }
        fx
    }

    // ─── Internals ───────────────────────────────────────────────────────

    fn select(&mut self, node: NodeId, fx: &mut Vec<Effect>) {
        if let Some(prev) = self.selected.filter(|p| *p != node) {
            fx.push(Effect::Deselect { node: prev });
        }
        self.selected = Some(node);
        fx.push(Effect::Select { node });
        fx.push(Effect::ShowPanel { node });
    }

    fn clear_selection(&mut self, fx: &mut Vec<Effect>) {
        if let Some(node) = self.selected.take() {
            fx.push(Effect::Deselect { node });
            fx.push(Effect::HidePanel);
        }
    }

    fn hide_menu(&mut self, fx: &mut Vec<Effect>) {
        if self.menu_target.take().is_some() {
            fx.push(Effect::HideContextMenu);
        }
    }

    fn end_drag(&mut self, fx: &mut Vec<Effect>) {
        if let Some(drag) = self.drag.take() {
            fx.push(Effect::EndDrag { node: drag.node });
        }
    }

    fn leave_connect(&mut self, fx: &mut Vec<Effect>) {
        if let Mode::Edit(EditState::Connecting { start }) = self.mode {
            if let Some(node) = start {
                fx.push(Effect::ClearOutline { node });
            }
            self.mode = Mode::Edit(EditState::Idle);
            fx.push(Effect::ConnectModeChanged { active: false });
        }
    }

    fn clear_transient(&mut self, fx: &mut Vec<Effect>) {
        self.clear_selection(fx);
        self.leave_connect(fx);
        self.end_drag(fx);
        self.hide_menu(fx);
    }

    fn connect_click(&mut self, start: Option<NodeId>, node: NodeId, fx: &mut Vec<Effect>) {
        match start {
            None => {
                self.mode = Mode::Edit(EditState::Connecting { start: Some(node) });
                fx.push(Effect::Outline { node });
            }
            Some(from) if from == node => {}
            Some(from) => {
                fx.push(Effect::ClearOutline { node: from });
                fx.push(Effect::Mutate {
                    mutation: Mutation::AppendEdge { from, to: node },
                });
                self.mode = Mode::Edit(EditState::Idle);
                fx.push(Effect::ConnectModeChanged { active: false });
                log::info!("connected {from} --> {node}");
            }
        }
    }

    fn delete(&mut self, node: NodeId, fx: &mut Vec<Effect>) {
        if self.selected == Some(node) {
            self.clear_selection(fx);
        }
        if self.mode == Mode::Edit(EditState::Connecting { start: Some(node) }) {
            fx.push(Effect::ClearOutline { node });
            self.mode = Mode::Edit(EditState::Connecting { start: None });
        }
        if self.drag.is_some_and(|d| d.node == node) {
            self.end_drag(fx);
        }
        fx.push(Effect::Mutate {
            mutation: Mutation::RemoveNode { id: node },
        });
    }
}

fn rename_prompt(node: NodeId, structure: &Structure) -> Effect {
    Effect::PromptRename {
        node,
        current: structure
            .node(node)
            .map(|n| n.text.clone())
            .unwrap_or_else(|| node.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::Modifiers;
    use pretty_assertions::assert_eq;

    fn id(s: &str) -> NodeId {
        NodeId::intern(s)
    }

    fn click(node: &str) -> InputEvent {
        InputEvent::Click {
            target: Target::Node(id(node)),
        }
    }

    fn editing() -> (Interaction, SyncEngine) {
        let mut interaction = Interaction::new();
        interaction.toggle_edit_mode();
        (interaction, SyncEngine::from_text("A[Start] --> B{Check}\nB -->|no| C"))
    }

    #[test]
    fn view_only_ignores_everything() {
        let mut interaction = Interaction::new();
        let engine = SyncEngine::from_text("A --> B");
        assert!(interaction.handle(&click("A"), &engine).is_empty());
        assert!(interaction.handle(&InputEvent::key("Delete"), &engine).is_empty());
        assert!(interaction.toggle_connect_mode().is_empty());
        assert_eq!(interaction.selected(), None);
    }

    #[test]
    fn click_selects_and_reselect_deselects_previous() {
        let (mut interaction, engine) = editing();
        assert_eq!(
            interaction.handle(&click("A"), &engine),
            vec![
                Effect::Select { node: id("A") },
                Effect::ShowPanel { node: id("A") }
            ]
        );
        assert_eq!(
            interaction.handle(&click("B"), &engine),
            vec![
                Effect::Deselect { node: id("A") },
                Effect::Select { node: id("B") },
                Effect::ShowPanel { node: id("B") }
            ]
        );
        let fx = interaction.handle(
            &InputEvent::Click {
                target: Target::Background,
            },
            &engine,
        );
        assert_eq!(fx, vec![Effect::Deselect { node: id("B") }, Effect::HidePanel]);
        assert_eq!(interaction.selected(), None);
    }

    #[test]
    fn connect_two_distinct_nodes() {
        let (mut interaction, engine) = editing();
        interaction.toggle_connect_mode();
        assert!(interaction.is_connecting());

        assert_eq!(
            interaction.handle(&click("C"), &engine),
            vec![Effect::Outline { node: id("C") }]
        );
        // Same node again: nothing
        assert!(interaction.handle(&click("C"), &engine).is_empty());
        // Background: nothing
        let fx = interaction.handle(
            &InputEvent::Click {
                target: Target::Background,
            },
            &engine,
        );
        assert!(fx.is_empty());

        let fx = interaction.handle(&click("A"), &engine);
        assert_eq!(
            fx,
            vec![
                Effect::ClearOutline { node: id("C") },
                Effect::Mutate {
                    mutation: Mutation::AppendEdge {
                        from: id("C"),
                        to: id("A")
                    }
                },
                Effect::ConnectModeChanged { active: false },
            ]
        );
        assert!(!interaction.is_connecting());
    }

    #[test]
    fn toggling_edit_mode_clears_state() {
        let (mut interaction, engine) = editing();
        interaction.handle(&click("A"), &engine);
        interaction.toggle_connect_mode();
        interaction.handle(&click("B"), &engine);

        let fx = interaction.toggle_edit_mode();
        assert!(fx.contains(&Effect::Deselect { node: id("A") }));
        assert!(fx.contains(&Effect::ClearOutline { node: id("B") }));
        assert_eq!(fx.last(), Some(&Effect::EditModeChanged { active: false }));

        interaction.toggle_edit_mode();
        assert_eq!(interaction.mode(), Mode::Edit(EditState::Idle));
        assert_eq!(interaction.selected(), None);
    }

    #[test]
    fn drag_accumulates_over_existing_offset() {
        let (mut interaction, mut engine) = editing();
        engine.apply(Mutation::MoveNode {
            id: id("A"),
            offset: (10.0, 0.0),
        });
        interaction.handle(
            &InputEvent::PointerDown {
                target: Target::Node(id("A")),
                x: 100.0,
                y: 100.0,
            },
            &engine,
        );
        let fx = interaction.handle(&InputEvent::PointerMove { x: 105.0, y: 90.0 }, &engine);
        assert_eq!(
            fx,
            vec![Effect::Mutate {
                mutation: Mutation::MoveNode {
                    id: id("A"),
                    offset: (15.0, -10.0)
                }
            }]
        );
        let fx = interaction.handle(&InputEvent::PointerUp { x: 105.0, y: 90.0 }, &engine);
        assert_eq!(fx, vec![Effect::EndDrag { node: id("A") }]);
        assert!(interaction.drag().is_none());
        // Moves after release do nothing
        assert!(interaction
            .handle(&InputEvent::PointerMove { x: 0.0, y: 0.0 }, &engine)
            .is_empty());
    }

    #[test]
    fn keys_act_on_selection() {
        let (mut interaction, engine) = editing();
        assert!(interaction.handle(&InputEvent::key("Delete"), &engine).is_empty());

        interaction.handle(&click("B"), &engine);
        assert_eq!(
            interaction.handle(&InputEvent::key("Enter"), &engine),
            vec![Effect::PromptRename {
                node: id("B"),
                current: "Check".into()
            }]
        );
        let fx = interaction.handle(&InputEvent::key("Delete"), &engine);
        assert_eq!(
            fx.last(),
            Some(&Effect::Mutate {
                mutation: Mutation::RemoveNode { id: id("B") }
            })
        );
        assert_eq!(interaction.selected(), None);
    }

    #[test]
    fn command_delete_is_ignored() {
        let (mut interaction, engine) = editing();
        interaction.handle(&click("A"), &engine);
        let fx = interaction.handle(
            &InputEvent::Key {
                key: "Delete".into(),
                modifiers: Modifiers {
                    meta: true,
                    ..Modifiers::NONE
                },
            },
            &engine,
        );
        assert!(fx.is_empty());
    }

    #[test]
    fn escape_leaves_connect_mode() {
        let (mut interaction, engine) = editing();
        interaction.toggle_connect_mode();
        interaction.handle(&click("A"), &engine);
        let fx = interaction.handle(&InputEvent::key("Escape"), &engine);
        assert_eq!(
            fx,
            vec![
                Effect::ClearOutline { node: id("A") },
                Effect::ConnectModeChanged { active: false }
            ]
        );
    }

    #[test]
    fn edge_label_click_prompts_with_current_label() {
        let (mut interaction, engine) = editing();
        let fx = interaction.handle(
            &InputEvent::Click {
                target: Target::EdgeLabel(1),
            },
            &engine,
        );
        assert_eq!(
            fx,
            vec![Effect::PromptRelabel {
                edge: 1,
                current: "no".into()
            }]
        );
    }

    #[test]
    fn context_menu_actions() {
        let (mut interaction, engine) = editing();
        let open = InputEvent::ContextMenu {
            target: Target::Node(id("C")),
            x: 4.0,
            y: 8.0,
        };
        interaction.handle(&open, &engine);
        let fx = interaction.context_action(ContextAction::ChangeColor, &engine);
        assert_eq!(
            fx,
            vec![
                Effect::HideContextMenu,
                Effect::Select { node: id("C") },
                Effect::ShowPanel { node: id("C") }
            ]
        );

        interaction.handle(&open, &engine);
        let fx = interaction.context_action(ContextAction::EditText, &engine);
        assert_eq!(
            fx[1],
            Effect::PromptRename {
                node: id("C"),
                current: "C".into()
            }
        );

        // Menu already closed: the action has no target
        assert!(interaction
            .context_action(ContextAction::Delete, &engine)
            .is_empty());
    }

    #[test]
    fn after_render_restores_or_drops_decoration() {
        let (mut interaction, engine) = editing();
        interaction.handle(&click("A"), &engine);
        interaction.toggle_connect_mode();
        interaction.handle(&click("B"), &engine);

        let fx = interaction.after_render(engine.structure());
        assert_eq!(
            fx,
            vec![Effect::Select { node: id("A") }, Effect::Outline { node: id("B") }]
        );

        let gone = flowpad_core::scan("X --> Y");
        let fx = interaction.after_render(&gone);
        assert_eq!(fx, vec![Effect::HidePanel]);
        assert_eq!(interaction.selected(), None);
        assert_eq!(
            interaction.mode(),
            Mode::Edit(EditState::Connecting { start: None })
        );
    }

    #[test]
    fn reset_view_clears_and_resets_overlays() {
        let (mut interaction, engine) = editing();
        interaction.handle(&click("A"), &engine);
        let fx = interaction.reset_view();
        assert_eq!(
            fx,
            vec![
                Effect::Deselect { node: id("A") },
                Effect::HidePanel,
                Effect::Mutate {
                    mutation: Mutation::ResetOverlays
                }
            ]
        );
    }
}
