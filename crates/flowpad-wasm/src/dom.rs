//! The diagram container: rendered markup, element tagging, decoration.
//!
//! After each render every node group is tagged with `data-node-id` and
//! `data-base-transform` (the layout position Mermaid gave it), and every
//! edge label with `data-edge-index`. Events are resolved to a `Target` by
//! walking up to the nearest tagged ancestor.

use flowpad_core::element::{
    edge_index_from_element_id, node_id_from_element_id, parse_translate, with_translate,
};
use flowpad_core::{NodeId, Structure};
use flowpad_editor::input::Target;
use flowpad_editor::panel::ElementSnapshot;
use flowpad_editor::sync::{Fill, Overlay};
use wasm_bindgen::prelude::*;
use web_sys::{Element, HtmlElement, SvgElement};

const SHAPES: &str = "rect, circle, ellipse, polygon, path";
const LABELS: &str = "text, tspan";

pub const SELECTED: &str = "selected";
pub const CONNECT_START: &str = "connect-start";
pub const DRAGGING: &str = "dragging";

/// Every element matching `selector` under `root`.
pub fn select_all(root: &Element, selector: &str) -> Vec<Element> {
    let Ok(list) = root.query_selector_all(selector) else {
        return Vec::new();
    };
    (0..list.length())
        .filter_map(|i| list.item(i))
        .filter_map(|n| n.dyn_into::<Element>().ok())
        .collect()
}

pub struct DiagramView {
    container: HtmlElement,
}

impl DiagramView {
    pub fn new(container: HtmlElement) -> Self {
        Self { container }
    }

    /// The live `<svg>`, if a diagram is showing.
    pub fn svg(&self) -> Option<Element> {
        self.container.query_selector("svg").ok().flatten()
    }

    /// Show a rendered diagram. `notice` goes in a status line under it.
    pub fn show_svg(&self, markup: &str, notice: Option<&str>) {
        self.container.set_inner_html(markup);
        let Some(notice) = notice else {
            return;
        };
        if let Some(line) = self.message_element("flowpad-notice", notice) {
            let _ = self.container.append_child(&line);
        }
    }

    /// Replace the visual with a message. `detail` goes in a tooltip.
    pub fn show_message(&self, message: &str, detail: Option<&str>) {
        self.container.set_inner_html("");
        let Some(div) = self.message_element("flowpad-message", message) else {
            return;
        };
        if let Some(detail) = detail {
            let _ = div.set_attribute("title", detail);
        }
        let _ = self.container.append_child(&div);
    }

    fn message_element(&self, class: &str, text: &str) -> Option<Element> {
        let div = self.container.owner_document()?.create_element("div").ok()?;
        div.set_class_name(class);
        div.set_text_content(Some(text));
        Some(div)
    }

    /// Tag the freshly rendered elements with the identifiers they show.
    pub fn tag(&self, structure: &Structure) {
        let Some(svg) = self.svg() else {
            return;
        };
        let mut tagged = 0;
        for group in select_all(&svg, "g.node") {
            let Some(id) = group
                .get_attribute("id")
                .and_then(|i| node_id_from_element_id(&i))
                .or_else(|| {
                    let text = group.text_content()?;
                    structure.lookup_by_text(text.trim())
                })
            else {
                continue;
            };
            let _ = group.set_attribute("data-node-id", id.as_str());
            let base = group.get_attribute("transform").unwrap_or_default();
            let _ = group.set_attribute("data-base-transform", &base);
            tagged += 1;
        }

        for (order, label) in select_all(&svg, "g.edgeLabel").into_iter().enumerate() {
            let by_id = select_all(&label, "[data-id], [id]")
                .into_iter()
                .chain(std::iter::once(label.clone()))
                .flat_map(|e| [e.get_attribute("data-id"), e.get_attribute("id")])
                .flatten()
                .find_map(|id| edge_index_from_element_id(&id, structure));
            // Labels are emitted in edge order, empty ones included.
            let index = by_id.or_else(|| (order < structure.edges().len()).then_some(order));
            if let Some(index) = index {
                let _ = label.set_attribute("data-edge-index", &index.to_string());
            }
        }
        log::debug!("tagged {tagged} nodes");
    }

    pub fn node_element(&self, id: NodeId) -> Option<Element> {
        let selector = format!(r#"[data-node-id="{}"]"#, id.as_str());
        self.container.query_selector(&selector).ok().flatten()
    }

    /// What an event landed on.
    pub fn target_of(&self, element: Option<Element>) -> Target {
        let Some(element) = element else {
            return Target::Background;
        };
        if let Some(id) = element
            .closest("[data-node-id]")
            .ok()
            .flatten()
            .and_then(|n| n.get_attribute("data-node-id"))
            .and_then(|id| NodeId::get(&id))
        {
            return Target::Node(id);
        }
        element
            .closest("[data-edge-index]")
            .ok()
            .flatten()
            .and_then(|e| e.get_attribute("data-edge-index"))
            .and_then(|i| i.parse().ok())
            .map(Target::EdgeLabel)
            .unwrap_or(Target::Background)
    }

    pub fn set_class(&self, id: NodeId, class: &str, on: bool) {
        let Some(element) = self.node_element(id) else {
            return;
        };
        let classes = element.class_list();
        let _ = if on {
            classes.add_1(class)
        } else {
            classes.remove_1(class)
        };
    }

    /// Position and style a node element from its overlay.
    pub fn apply_overlay(&self, id: NodeId, overlay: &Overlay) {
        let Some(group) = self.node_element(id) else {
            return;
        };
        let base = group.get_attribute("data-base-transform").unwrap_or_default();
        let (bx, by) = parse_translate(&base).unwrap_or((0.0, 0.0));
        let (dx, dy) = overlay.offset;
        let _ = group.set_attribute("transform", &with_translate(&base, bx + dx, by + dy));

        let fill = overlay.fill.map(|fill| match fill {
            Fill::Color(c) => c.to_string(),
            Fill::Transparent => "none".to_owned(),
        });
        let stroke = overlay.stroke.map(|c| c.to_string());
        for shape in select_all(&group, SHAPES) {
            set_style(&shape, "fill", fill.as_deref());
            set_style(&shape, "stroke", stroke.as_deref());
        }

        let text_color = overlay.text_color.map(|c| c.to_string());
        let font_size = overlay.font_size.map(|px| format!("{px}px"));
        for label in select_all(&group, LABELS) {
            set_style(&label, "fill", text_color.as_deref());
            set_style(&label, "font-size", font_size.as_deref());
        }
    }

    /// Rewrite a node's visible label in place, ahead of the re-render.
    pub fn set_label(&self, id: NodeId, text: &str) {
        let Some(group) = self.node_element(id) else {
            return;
        };
        let labels = select_all(&group, "text");
        if let Some(first) = labels.first() {
            first.set_text_content(Some(text));
        }
    }

    /// Read a node's current look for the property panel.
    pub fn snapshot(&self, id: NodeId) -> ElementSnapshot {
        let Some(group) = self.node_element(id) else {
            return ElementSnapshot::default();
        };
        let shape = select_all(&group, SHAPES).into_iter().next();
        let label = select_all(&group, LABELS).into_iter().next();
        ElementSnapshot {
            text: group.text_content().unwrap_or_default(),
            fill: shape.as_ref().and_then(|s| read_paint(s, "fill")),
            stroke: shape.as_ref().and_then(|s| read_paint(s, "stroke")),
            text_color: label.as_ref().and_then(|l| read_paint(l, "fill")),
            font_size: label.as_ref().and_then(|l| read_paint(l, "font-size")),
        }
    }
}

fn set_style(element: &Element, property: &str, value: Option<&str>) {
    let (Some(value), Some(svg)) = (value, element.dyn_ref::<SvgElement>()) else {
        return;
    };
    let _ = svg.style().set_property(property, value);
}

/// Inline style wins over the presentation attribute, as in CSS.
fn read_paint(element: &Element, property: &str) -> Option<String> {
    element
        .dyn_ref::<SvgElement>()
        .and_then(|svg| svg.style().get_property_value(property).ok())
        .filter(|v| !v.is_empty())
        .or_else(|| element.get_attribute(property))
}
