//! The editing session.
//!
//! `Editor` owns every piece of editor state and is the only thing the
//! browser bridge talks to. Each toolbar action, input event or panel edit
//! returns an `Outcome`: the view effects to perform, plus whether a render
//! is due now, after the debounce delay, or not at all.
//!
//! Rendering is split in two so the bridge can drop its borrow of the
//! editor while the library works: `begin_render` hands out a `RenderJob`,
//! `finish_render` takes its outcome back.

use crate::export::{Background, ExportFormat, ExportOptions};
use crate::input::InputEvent;
use crate::interaction::{ContextAction, Effect, Interaction};
use crate::panel::{ElementSnapshot, PanelField, PanelState, PropertyPanel};
use crate::render::{DebounceTicket, Debouncer, RenderJob, RenderOrchestrator, RenderOutcome, RenderStatus};
use crate::storage::{KeyValueStore, Persistence, SavedSummary};
use crate::sync::{Mutation, SyncEngine};
use flowpad_core::{EditorConfig, NodeId, Structure};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderRequest {
    #[default]
    None,
    Now,
    /// Arm a timer for the debounce delay and call `debounce_fired` with
    /// this ticket.
    Debounced(DebounceTicket),
}

impl RenderRequest {
    fn or(self, other: RenderRequest) -> RenderRequest {
        match (self, other) {
            (Self::Now, _) | (_, Self::Now) => Self::Now,
            (Self::Debounced(t), _) | (_, Self::Debounced(t)) => Self::Debounced(t),
            _ => Self::None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Outcome {
    pub effects: Vec<Effect>,
    pub render: RenderRequest,
}

impl Outcome {
    fn render_now() -> Self {
        Self {
            effects: Vec::new(),
            render: RenderRequest::Now,
        }
    }
}

/// What a finished render means for the view.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderReport {
    pub status: RenderStatus,
    /// Decoration and overlays to re-apply to the fresh elements.
    pub effects: Vec<Effect>,
}

#[derive(Debug)]
pub struct Editor {
    config: EditorConfig,
    engine: SyncEngine,
    orchestrator: RenderOrchestrator,
    debounce: Debouncer,
    interaction: Interaction,
    panel: PropertyPanel,
    persistence: Persistence,
}

impl Editor {
    pub fn new(config: EditorConfig) -> Self {
        Self {
            engine: SyncEngine::from_text(&config.default_source),
            orchestrator: RenderOrchestrator::new(),
            debounce: Debouncer::new(config.debounce_ms),
            interaction: Interaction::new(),
            panel: PropertyPanel::new(),
            persistence: Persistence::new(config.storage_prefix.clone()),
            config,
        }
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn engine(&self) -> &SyncEngine {
        &self.engine
    }

    pub fn text(&self) -> &str {
        self.engine.text()
    }

    pub fn structure(&self) -> &Structure {
        self.engine.structure()
    }

    pub fn interaction(&self) -> &Interaction {
        &self.interaction
    }

    pub fn panel(&self) -> &PropertyPanel {
        &self.panel
    }

    pub fn has_visual(&self) -> bool {
        self.orchestrator.has_visual()
    }

    // ─── Text ────────────────────────────────────────────────────────────

    /// A keystroke in the text box.
    pub fn text_input(&mut self, text: &str) -> Outcome {
        self.engine.set_text(text);
        Outcome {
            effects: Vec::new(),
            render: RenderRequest::Debounced(self.debounce.schedule()),
        }
    }

    /// Whether a debounce timer carrying `ticket` should render.
    pub fn debounce_fired(&mut self, ticket: DebounceTicket) -> bool {
        self.debounce.fire(ticket)
    }

    /// The Update button.
    pub fn update(&mut self) -> Outcome {
        self.debounce.cancel();
        Outcome::render_now()
    }

    /// Replace the text from outside the text box (host API, load).
    pub fn set_external_code(&mut self, text: &str) -> Outcome {
        self.debounce.cancel();
        self.engine.set_text(text);
        Outcome {
            effects: vec![Effect::TextChanged {
                text: self.engine.text().to_owned(),
            }],
            render: RenderRequest::Now,
        }
    }

    // ─── Rendering ───────────────────────────────────────────────────────

    pub fn begin_render(&mut self) -> RenderJob {
        self.orchestrator.begin(self.engine.text())
    }

    pub fn finish_render(&mut self, outcome: RenderOutcome) -> RenderReport {
        let status = self.orchestrator.finish(outcome);
        let mut effects = Vec::new();
        if status.is_rendered() {
            self.engine.prune_overlays();
            effects.extend(self.interaction.after_render(self.engine.structure()));
            effects.extend(self.engine.overlays().map(|(node, overlay)| Effect::ApplyOverlay {
                node,
                overlay: overlay.clone(),
            }));
        }
        if matches!(status, RenderStatus::Failed { .. } | RenderStatus::Empty) {
            // No elements left to decorate.
            effects.extend(self.interaction.after_render(&Structure::new()));
            self.panel.hide();
        }
        RenderReport { status, effects }
    }

    // ─── Toolbar ─────────────────────────────────────────────────────────

    pub fn handle_input(&mut self, event: &InputEvent) -> Outcome {
        let effects = self.interaction.handle(event, &self.engine);
        self.resolve(effects)
    }

    pub fn toggle_edit_mode(&mut self) -> Outcome {
        let effects = self.interaction.toggle_edit_mode();
        self.resolve(effects)
    }

    pub fn toggle_connect_mode(&mut self) -> Outcome {
        let effects = self.interaction.toggle_connect_mode();
        self.resolve(effects)
    }

    pub fn add_node(&mut self) -> Outcome {
        self.resolve(vec![Effect::Mutate {
            mutation: Mutation::AddNode,
        }])
    }

    pub fn reset_view(&mut self) -> Outcome {
        let effects = self.interaction.reset_view();
        self.resolve(effects)
    }

    pub fn context_action(&mut self, action: ContextAction) -> Outcome {
        let effects = self.interaction.context_action(action, &self.engine);
        self.resolve(effects)
    }

    /// The rename prompt was confirmed. Blank text is ignored.
    pub fn confirm_rename(&mut self, node: NodeId, text: &str) -> Outcome {
        let text = text.trim();
        if text.is_empty() {
            return Outcome::default();
        }
        self.resolve(vec![Effect::Mutate {
            mutation: Mutation::RenameNode {
                id: node,
                text: text.to_owned(),
            },
        }])
    }

    /// The relabel prompt was confirmed. Blank text removes the label.
    pub fn confirm_relabel(&mut self, edge: usize, label: &str) -> Outcome {
        self.resolve(vec![Effect::Mutate {
            mutation: Mutation::RelabelEdge {
                index: edge,
                label: label.trim().to_owned(),
            },
        }])
    }

    // ─── Property panel ──────────────────────────────────────────────────

    /// Populate the panel for the node an `Effect::ShowPanel` named.
    pub fn show_panel(&mut self, node: NodeId, snapshot: &ElementSnapshot) -> PanelState {
        self.panel.show(node, snapshot).clone()
    }

    pub fn close_panel(&mut self) -> Outcome {
        self.panel.hide();
        let effects = self.interaction.deselect();
        self.resolve(effects)
    }

    /// Text edits render after the debounce delay, like typing in the text
    /// box; style edits apply in place.
    pub fn panel_change(&mut self, field: PanelField) -> Outcome {
        let Some(mutation) = self.panel.change(field) else {
            return Outcome::default();
        };
        let debounced = mutation.touches_text();
        let mut outcome = self.resolve(vec![Effect::Mutate { mutation }]);
        if debounced && outcome.render == RenderRequest::Now {
            outcome.render = RenderRequest::Debounced(self.debounce.schedule());
        }
        outcome
    }

    pub fn delete_selected(&mut self) -> Outcome {
        let effects = self.interaction.delete_selected();
        self.resolve(effects)
    }

    // ─── Persistence ─────────────────────────────────────────────────────

    pub fn save(&self, store: &mut dyn KeyValueStore, name: &str) -> bool {
        self.persistence.save(store, name, self.engine.text())
    }

    /// Load a save into the text box. `None` if there is no such save.
    pub fn load(&mut self, store: &dyn KeyValueStore, name: &str) -> Option<Outcome> {
        let code = self.persistence.load(store, name)?;
        Some(self.set_external_code(&code))
    }

    pub fn list_saved(&self, store: &dyn KeyValueStore) -> Vec<SavedSummary> {
        self.persistence.list(store)
    }

    // ─── Export ──────────────────────────────────────────────────────────

    pub fn export_options(&self, format: ExportFormat, background: &str) -> ExportOptions {
        ExportOptions::from_config(
            &self.config,
            format,
            Background::parse(background, &self.config.default_background),
        )
    }

    // ─── Internals ───────────────────────────────────────────────────────

    /// Apply every `Mutate` effect to the engine, replacing it with the view
    /// effects that follow from it.
    fn resolve(&mut self, effects: Vec<Effect>) -> Outcome {
        let mut outcome = Outcome::default();
        let mut text_changed = false;

        for effect in effects {
            match effect {
                Effect::Mutate { mutation } => {
                    log::debug!("apply {mutation:?}");
                    let applied = self.engine.apply(mutation);
                    if let Some(node) = applied.overlay_changed {
                        outcome.effects.push(Effect::ApplyOverlay {
                            node,
                            overlay: self.engine.overlay(node).cloned().unwrap_or_default(),
                        });
                    }
                    text_changed |= applied.text_changed;
                    if applied.rerender {
                        outcome.render = outcome.render.or(RenderRequest::Now);
                    }
                }
                Effect::HidePanel => {
                    self.panel.hide();
                    outcome.effects.push(Effect::HidePanel);
                }
                other => outcome.effects.push(other),
            }
        }

        if text_changed {
            self.debounce.cancel();
            outcome.effects.push(Effect::TextChanged {
                text: self.engine.text().to_owned(),
            });
        }
        outcome
    }
}

impl Default for Editor {
    fn default() -> Self {
        Self::new(EditorConfig::default())
    }
}
