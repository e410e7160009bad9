//! WASM bridge for Flowpad: binds the editor engine to Mermaid and the page.
//!
//! Built with `wasm-pack build --target web`. The host page creates one
//! `FlowchartApp` per diagram container, wires its toolbar, text box and
//! property panel to the methods below, and registers a listener that
//! receives every view effect as a JSON object (`{"type": "showPanel", ...}`).

mod dom;
mod export;
mod mermaid;
mod storage;

use dom::{CONNECT_START, DRAGGING, DiagramView, SELECTED};
use export::WebExport;
use flowpad_core::{EditorConfig, NodeId};
use flowpad_editor::export::ExportFormat;
use flowpad_editor::input::{InputEvent, Modifiers, Target};
use flowpad_editor::interaction::{ContextAction, Effect};
use flowpad_editor::panel::PanelField;
use flowpad_editor::render::RenderStatus;
use flowpad_editor::{Editor, Outcome, RenderRequest};
use js_sys::{Function, Promise};
use mermaid::{MermaidRenderer, js_message};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use storage::LocalStore;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::{future_to_promise, spawn_local};
use web_sys::{Document, Element, Event, EventTarget, HtmlElement, KeyboardEvent, MouseEvent, Window};

#[wasm_bindgen(start)]
pub fn start() {
    console_error_panic_hook::set_once();
    if console_log::init_with_level(log::Level::Info).is_err() {
        log::debug!("logger already installed");
    }
}

fn js_err(message: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&message.to_string())
}

// ─── Session ──────────────────────────────────────────────────────────────

struct Inner {
    editor: Editor,
    view: DiagramView,
    listener: Option<Function>,
}

/// Shared handle used by the exported methods, DOM listeners, timers and
/// render futures. `inner` is never borrowed across an `.await` or a call
/// into page script.
#[derive(Clone)]
struct Session {
    inner: Rc<RefCell<Inner>>,
    renderer: Rc<MermaidRenderer>,
    window: Window,
    document: Document,
}

impl Session {
    fn emit_json(&self, value: serde_json::Value) {
        let listener = self.inner.borrow().listener.clone();
        let Some(listener) = listener else {
            return;
        };
        let payload = js_sys::JSON::parse(&value.to_string()).unwrap_or(JsValue::NULL);
        if let Err(e) = listener.call1(&JsValue::NULL, &payload) {
            log::warn!("listener threw: {}", js_message(&e));
        }
    }

    fn emit(&self, effect: &Effect) {
        match serde_json::to_value(effect) {
            Ok(value) => self.emit_json(value),
            Err(e) => log::warn!("could not serialize effect: {e}"),
        }
    }

    fn prompt(&self, message: &str, current: &str) -> Option<String> {
        self.window
            .prompt_with_message_and_default(message, current)
            .ok()
            .flatten()
    }

    fn alert(&self, message: &str) {
        let _ = self.window.alert_with_message(message);
    }

    /// Perform an outcome and everything that follows from it.
    fn apply(&self, outcome: Outcome) {
        let mut queue = VecDeque::from([outcome]);
        while let Some(outcome) = queue.pop_front() {
            for effect in outcome.effects {
                if let Some(next) = self.perform(effect) {
                    queue.push_back(next);
                }
            }
            self.schedule(outcome.render);
        }
    }

    fn perform(&self, effect: Effect) -> Option<Outcome> {
        {
            let inner = self.inner.borrow();
            let view = &inner.view;
            match &effect {
                Effect::Select { node } => view.set_class(*node, SELECTED, true),
                Effect::Deselect { node } => view.set_class(*node, SELECTED, false),
                Effect::Outline { node } => view.set_class(*node, CONNECT_START, true),
                Effect::ClearOutline { node } => view.set_class(*node, CONNECT_START, false),
                Effect::BeginDrag { node } => view.set_class(*node, DRAGGING, true),
                Effect::EndDrag { node } => view.set_class(*node, DRAGGING, false),
                Effect::ApplyOverlay { node, overlay } => view.apply_overlay(*node, overlay),
                _ => {}
            }
        }

        match effect {
            Effect::ShowPanel { node } => {
                let panel = {
                    let mut inner = self.inner.borrow_mut();
                    let snapshot = inner.view.snapshot(node);
                    inner.editor.show_panel(node, &snapshot)
                };
                self.emit_json(serde_json::json!({ "type": "showPanel", "panel": panel }));
                None
            }
            Effect::PromptRename { node, current } => {
                let text = self.prompt("Edit node text:", &current)?;
                let mut inner = self.inner.borrow_mut();
                if !text.trim().is_empty() {
                    inner.view.set_label(node, text.trim());
                }
                Some(inner.editor.confirm_rename(node, &text))
            }
            Effect::PromptRelabel { edge, current } => {
                let label = self.prompt("Edit edge label:", &current)?;
                Some(self.inner.borrow_mut().editor.confirm_relabel(edge, &label))
            }
            other => {
                self.emit(&other);
                None
            }
        }
    }

    fn schedule(&self, request: RenderRequest) {
        match request {
            RenderRequest::None => {}
            RenderRequest::Now => self.spawn_render(),
            RenderRequest::Debounced(ticket) => {
                let delay = self.inner.borrow().editor.config().debounce_ms;
                let session = self.clone();
                let callback = Closure::once_into_js(move || {
                    let due = session.inner.borrow_mut().editor.debounce_fired(ticket);
                    if due {
                        session.spawn_render();
                    }
                });
                let armed = self
                    .window
                    .set_timeout_with_callback_and_timeout_and_arguments_0(
                        callback.unchecked_ref(),
                        i32::try_from(delay).unwrap_or(i32::MAX),
                    );
                if let Err(e) = armed {
                    log::error!("could not arm debounce timer: {}", js_message(&e));
                }
            }
        }
    }

    fn spawn_render(&self) {
        let session = self.clone();
        spawn_local(async move {
            session.render().await;
        });
    }

    async fn render(&self) -> RenderStatus {
        let job = self.inner.borrow_mut().editor.begin_render();
        let outcome = job.run(self.renderer.as_ref()).await;
        let report = self.inner.borrow_mut().editor.finish_render(outcome);
        if report.status == RenderStatus::Superseded {
            return report.status;
        }

        {
            let inner = self.inner.borrow();
            match &report.status {
                RenderStatus::Superseded => {}
                RenderStatus::Rendered { svg, .. } => {
                    let notice = report.status.notice();
                    if let Some(primary) = notice {
                        log::warn!("{primary}");
                    }
                    inner.view.show_svg(svg, notice);
                    inner.view.tag(inner.editor.structure());
                }
                RenderStatus::Failed { primary_error, .. } => {
                    let detail = format!("Error rendering diagram: {primary_error}");
                    inner
                        .view
                        .show_message(report.status.inline_message().unwrap_or_default(), Some(&detail));
                }
                RenderStatus::Empty => {
                    inner
                        .view
                        .show_message(report.status.inline_message().unwrap_or_default(), None);
                }
            }
        }

        let rendered = report.status.is_rendered();
        self.apply(Outcome {
            effects: report.effects,
            render: RenderRequest::None,
        });
        self.emit_json(serde_json::json!({ "type": "rendered", "ok": rendered }));
        report.status
    }

    async fn download(&self, format: &str, background: &str) {
        let result = async {
            let format: ExportFormat = format.parse()?;
            let (options, backend) = {
                let inner = self.inner.borrow();
                (
                    inner.editor.export_options(format, background),
                    WebExport::new(self.window.clone(), self.document.clone(), inner.view.svg()),
                )
            };
            flowpad_editor::export::export(&backend, &options).await
        }
        .await;

        match result {
            Ok(report) => {
                if let Some(notice) = report.notice {
                    self.alert(notice);
                }
            }
            Err(e) => {
                log::error!("download failed: {e}");
                self.alert(&e.to_string());
            }
        }
    }

    // ─── DOM events ──────────────────────────────────────────────────

    fn target_of(&self, event: &Event) -> Target {
        let element = event.target().and_then(|t| t.dyn_into::<Element>().ok());
        self.inner.borrow().view.target_of(element)
    }

    fn input(&self, event: InputEvent) -> bool {
        let outcome = self.inner.borrow_mut().editor.handle_input(&event);
        let acted = !outcome.effects.is_empty() || outcome.render != RenderRequest::None;
        self.apply(outcome);
        acted
    }

    fn on_click(&self, event: Event) {
        let target = self.target_of(&event);
        self.input(InputEvent::Click { target });
    }

    fn on_double_click(&self, event: Event) {
        let target = self.target_of(&event);
        self.input(InputEvent::DoubleClick { target });
    }

    fn on_pointer_down(&self, event: Event) {
        let Some(mouse) = event.dyn_ref::<MouseEvent>() else {
            return;
        };
        let target = self.target_of(&event);
        let (x, y) = (f64::from(mouse.client_x()), f64::from(mouse.client_y()));
        if self.input(InputEvent::PointerDown { target, x, y }) {
            event.prevent_default();
        }
    }

    fn on_pointer_move(&self, event: Event) {
        if let Some(mouse) = event.dyn_ref::<MouseEvent>() {
            let (x, y) = (f64::from(mouse.client_x()), f64::from(mouse.client_y()));
            self.input(InputEvent::PointerMove { x, y });
        }
    }

    fn on_pointer_up(&self, event: Event) {
        if let Some(mouse) = event.dyn_ref::<MouseEvent>() {
            let (x, y) = (f64::from(mouse.client_x()), f64::from(mouse.client_y()));
            self.input(InputEvent::PointerUp { x, y });
        }
    }

    fn on_context_menu(&self, event: Event) {
        let Some(mouse) = event.dyn_ref::<MouseEvent>() else {
            return;
        };
        let target = self.target_of(&event);
        let (x, y) = (f64::from(mouse.client_x()), f64::from(mouse.client_y()));
        if self.input(InputEvent::ContextMenu { target, x, y }) {
            event.prevent_default();
        }
    }

    fn on_key_down(&self, event: Event) {
        let Some(key) = event.dyn_ref::<KeyboardEvent>() else {
            return;
        };
        if is_form_field(event.target()) {
            return;
        }
        let modifiers = Modifiers {
            shift: key.shift_key(),
            ctrl: key.ctrl_key(),
            alt: key.alt_key(),
            meta: key.meta_key(),
        };
        if self.input(InputEvent::Key {
            key: key.key(),
            modifiers,
        }) {
            event.prevent_default();
        }
    }
}

/// Keys typed into the text box or the panel are not shortcuts.
fn is_form_field(target: Option<EventTarget>) -> bool {
    let Some(element) = target.and_then(|t| t.dyn_into::<Element>().ok()) else {
        return false;
    };
    matches!(element.tag_name().as_str(), "INPUT" | "TEXTAREA" | "SELECT")
        || element
            .dyn_ref::<HtmlElement>()
            .is_some_and(HtmlElement::is_content_editable)
}

// ─── Exported API ─────────────────────────────────────────────────────────

struct Listener {
    target: EventTarget,
    kind: &'static str,
    closure: Closure<dyn FnMut(Event)>,
}

/// One interactive flowchart bound to a diagram container.
#[wasm_bindgen]
pub struct FlowchartApp {
    session: Session,
    listeners: Vec<Listener>,
}

#[wasm_bindgen]
impl FlowchartApp {
    /// Bind to the element with id `container_id`. `config_json` may
    /// override any `EditorConfig` field.
    #[wasm_bindgen(constructor)]
    pub fn new(container_id: &str, config_json: Option<String>) -> Result<FlowchartApp, JsValue> {
        let window = web_sys::window().ok_or("no window")?;
        let document = window.document().ok_or("no document")?;
        let container = document
            .get_element_by_id(container_id)
            .ok_or_else(|| js_err(format!("no element #{container_id}")))?
            .dyn_into::<HtmlElement>()?;

        let config = match config_json.as_deref() {
            Some(json) => EditorConfig::from_json(json).map_err(js_err)?,
            None => EditorConfig::default(),
        };
        if let Err(e) = mermaid::initialize(&config.mermaid) {
            log::warn!("mermaid not initialized: {}", js_message(&e));
        }

        let session = Session {
            inner: Rc::new(RefCell::new(Inner {
                editor: Editor::new(config),
                view: DiagramView::new(container.clone()),
                listener: None,
            })),
            renderer: Rc::new(MermaidRenderer::new(document.clone())),
            window,
            document: document.clone(),
        };

        let mut app = FlowchartApp {
            session,
            listeners: Vec::new(),
        };
        let container: EventTarget = container.into();
        let document: EventTarget = document.into();
        app.listen(&container, "click", Session::on_click)?;
        app.listen(&container, "dblclick", Session::on_double_click)?;
        app.listen(&container, "mousedown", Session::on_pointer_down)?;
        app.listen(&container, "contextmenu", Session::on_context_menu)?;
        app.listen(&document, "mousemove", Session::on_pointer_move)?;
        app.listen(&document, "mouseup", Session::on_pointer_up)?;
        app.listen(&document, "keydown", Session::on_key_down)?;

        log::info!("flowchart editor bound to #{container_id}");
        app.session.spawn_render();
        Ok(app)
    }

    fn listen(
        &mut self,
        target: &EventTarget,
        kind: &'static str,
        handler: fn(&Session, Event),
    ) -> Result<(), JsValue> {
        let session = self.session.clone();
        let closure = Closure::<dyn FnMut(Event)>::new(move |event: Event| handler(&session, event));
        target.add_event_listener_with_callback(kind, closure.as_ref().unchecked_ref())?;
        self.listeners.push(Listener {
            target: target.clone(),
            kind,
            closure,
        });
        Ok(())
    }

    /// Receives every effect the page should act on, as a plain object.
    #[wasm_bindgen(js_name = setListener)]
    pub fn set_listener(&self, listener: Function) {
        self.session.inner.borrow_mut().listener = Some(listener);
    }

    /// A keystroke in the text box; renders after the debounce delay.
    #[wasm_bindgen(js_name = textInput)]
    pub fn text_input(&self, text: &str) {
        let outcome = self.session.inner.borrow_mut().editor.text_input(text);
        self.session.apply(outcome);
    }

    /// Render now. Resolves to whether a diagram is showing.
    pub fn update(&self) -> Promise {
        let session = self.session.clone();
        session.inner.borrow_mut().editor.update();
        future_to_promise(async move {
            let status = session.render().await;
            Ok(JsValue::from_bool(status.is_rendered()))
        })
    }

    #[wasm_bindgen(js_name = toggleEditMode)]
    pub fn toggle_edit_mode(&self) -> bool {
        let outcome = self.session.inner.borrow_mut().editor.toggle_edit_mode();
        self.session.apply(outcome);
        self.session.inner.borrow().editor.interaction().is_editing()
    }

    #[wasm_bindgen(js_name = toggleConnectMode)]
    pub fn toggle_connect_mode(&self) -> bool {
        let outcome = self.session.inner.borrow_mut().editor.toggle_connect_mode();
        self.session.apply(outcome);
        self.session.inner.borrow().editor.interaction().is_connecting()
    }

    #[wasm_bindgen(js_name = addNode)]
    pub fn add_node(&self) {
        let outcome = self.session.inner.borrow_mut().editor.add_node();
        self.session.apply(outcome);
    }

    #[wasm_bindgen(js_name = resetView)]
    pub fn reset_view(&self) {
        let outcome = self.session.inner.borrow_mut().editor.reset_view();
        self.session.apply(outcome);
    }

    /// `action` is one of `editText`, `changeColor`, `delete`.
    #[wasm_bindgen(js_name = contextAction)]
    pub fn context_action(&self, action: &str) -> Result<(), JsValue> {
        let action = match action {
            "editText" => ContextAction::EditText,
            "changeColor" => ContextAction::ChangeColor,
            "delete" => ContextAction::Delete,
            other => return Err(js_err(format!("unknown context action `{other}`"))),
        };
        let outcome = self.session.inner.borrow_mut().editor.context_action(action);
        self.session.apply(outcome);
        Ok(())
    }

    /// `field` is one of `text`, `fill`, `noFill`, `stroke`, `textColor`,
    /// `fontSize`; `value` is the input's raw value.
    #[wasm_bindgen(js_name = panelChange)]
    pub fn panel_change(&self, field: &str, value: &str) -> Result<(), JsValue> {
        let field = match field {
            "text" => PanelField::Text(value.to_owned()),
            "fill" => PanelField::Fill(value.to_owned()),
            "noFill" => PanelField::NoFill(value == "true"),
            "stroke" => PanelField::Stroke(value.to_owned()),
            "textColor" => PanelField::TextColor(value.to_owned()),
            "fontSize" => PanelField::FontSize(value.to_owned()),
            other => return Err(js_err(format!("unknown panel field `{other}`"))),
        };
        let outcome = {
            let mut inner = self.session.inner.borrow_mut();
            if let (PanelField::Text(text), Some(node)) = (&field, inner.editor.panel().node()) {
                inner.view.set_label(node, text.trim());
            }
            inner.editor.panel_change(field)
        };
        self.session.apply(outcome);
        Ok(())
    }

    #[wasm_bindgen(js_name = closePanel)]
    pub fn close_panel(&self) {
        let outcome = self.session.inner.borrow_mut().editor.close_panel();
        self.session.apply(outcome);
    }

    #[wasm_bindgen(js_name = deleteSelected)]
    pub fn delete_selected(&self) {
        let outcome = self.session.inner.borrow_mut().editor.delete_selected();
        self.session.apply(outcome);
    }

    /// Rename a node by identifier, as the rename prompt would.
    #[wasm_bindgen(js_name = renameNode)]
    pub fn rename_node(&self, id: &str, text: &str) -> bool {
        let Some(node) = NodeId::get(id) else {
            return false;
        };
        let outcome = self.session.inner.borrow_mut().editor.confirm_rename(node, text);
        let changed = outcome.render != RenderRequest::None;
        self.session.apply(outcome);
        changed
    }

    /// Export the current diagram. `format` is `svg`, `png`, `jpeg` or `pdf`;
    /// `background` is a CSS color or `transparent`.
    pub fn download(&self, format: &str, background: &str) -> Promise {
        let session = self.session.clone();
        let (format, background) = (format.to_owned(), background.to_owned());
        future_to_promise(async move {
            session.download(&format, &background).await;
            Ok(JsValue::UNDEFINED)
        })
    }

    pub fn save(&self, name: &str) -> bool {
        let mut store = match LocalStore::open() {
            Ok(store) => store,
            Err(e) => {
                log::error!("save: {e}");
                return false;
            }
        };
        self.session.inner.borrow().editor.save(&mut store, name)
    }

    pub fn load(&self, name: &str) -> bool {
        let store = match LocalStore::open() {
            Ok(store) => store,
            Err(e) => {
                log::error!("load: {e}");
                return false;
            }
        };
        let outcome = self.session.inner.borrow_mut().editor.load(&store, name);
        match outcome {
            Some(outcome) => {
                self.session.apply(outcome);
                true
            }
            None => false,
        }
    }

    /// JSON array of `{name, timestamp}`, newest first.
    #[wasm_bindgen(js_name = listSaved)]
    pub fn list_saved(&self) -> String {
        let saved = match LocalStore::open() {
            Ok(store) => self.session.inner.borrow().editor.list_saved(&store),
            Err(e) => {
                log::error!("list: {e}");
                Vec::new()
            }
        };
        serde_json::to_string(&saved).unwrap_or_else(|_| "[]".into())
    }

    /// Replace the text and render immediately.
    #[wasm_bindgen(js_name = updateFromExternalCode)]
    pub fn update_from_external_code(&self, code: &str) {
        let outcome = self.session.inner.borrow_mut().editor.set_external_code(code);
        self.session.apply(outcome);
    }

    #[wasm_bindgen(js_name = getCurrentCode)]
    pub fn get_current_code(&self) -> String {
        self.session.inner.borrow().editor.text().to_owned()
    }
}

impl Drop for FlowchartApp {
    fn drop(&mut self) {
        for listener in self.listeners.drain(..) {
            let _ = listener.target.remove_event_listener_with_callback(
                listener.kind,
                listener.closure.as_ref().unchecked_ref(),
            );
        }
    }
}
