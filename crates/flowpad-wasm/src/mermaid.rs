//! `window.mermaid` as a `Renderer`.
//!
//! The primary path is `mermaid.run` over a hidden staging element; the
//! fallback is `mermaid.render`, which returns markup directly. Neither
//! touches the visible diagram container, so a superseded render can never
//! overwrite a newer one.

use flowpad_core::MermaidConfig;
use flowpad_editor::render::{RenderError, Renderer};
use futures::future::LocalBoxFuture;
use js_sys::{Array, Function, Object, Promise, Reflect};
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::JsFuture;
use web_sys::{Document, Element};

fn library() -> Result<JsValue, RenderError> {
    let window = web_sys::window().ok_or(RenderError::Unavailable)?;
    let mermaid = Reflect::get(&window, &"mermaid".into()).map_err(|_| RenderError::Unavailable)?;
    if mermaid.is_undefined() || mermaid.is_null() {
        return Err(RenderError::Unavailable);
    }
    Ok(mermaid)
}

fn entry_point(mermaid: &JsValue, name: &'static str) -> Result<Function, RenderError> {
    Reflect::get(mermaid, &name.into())
        .ok()
        .and_then(|f| f.dyn_into::<Function>().ok())
        .ok_or(RenderError::MissingEntryPoint(name))
}

/// Best-effort text of a thrown JS value.
pub fn js_message(value: &JsValue) -> String {
    if let Some(s) = value.as_string() {
        return s;
    }
    Reflect::get(value, &"message".into())
        .ok()
        .and_then(|m| m.as_string())
        .unwrap_or_else(|| format!("{value:?}"))
}

fn library_error(value: JsValue) -> RenderError {
    RenderError::Library(js_message(&value))
}

/// Call `mermaid.initialize` with the editor's library options.
pub fn initialize(config: &MermaidConfig) -> Result<(), JsValue> {
    let mermaid = library().map_err(|e| JsValue::from_str(&e.to_string()))?;
    let init = entry_point(&mermaid, "initialize").map_err(|e| JsValue::from_str(&e.to_string()))?;
    let json = serde_json::to_string(config).map_err(|e| JsValue::from_str(&e.to_string()))?;
    init.call1(&mermaid, &js_sys::JSON::parse(&json)?)?;
    log::info!("mermaid initialized (theme {})", config.theme);
    Ok(())
}

/// Removes the staging element however the render ends.
struct Staging(Element);

impl Staging {
    fn new(document: &Document, render_id: &str, source: &str) -> Result<Self, RenderError> {
        let element = document.create_element("div").map_err(library_error)?;
        element.set_id(render_id);
        element.set_class_name("mermaid");
        element
            .set_attribute(
                "style",
                "position:absolute;left:-10000px;top:0;visibility:hidden",
            )
            .map_err(library_error)?;
        element.set_text_content(Some(source));
        let body = document.body().ok_or(RenderError::Unavailable)?;
        body.append_child(&element).map_err(library_error)?;
        Ok(Self(element))
    }
}

impl Drop for Staging {
    fn drop(&mut self) {
        self.0.remove();
    }
}

pub struct MermaidRenderer {
    document: Document,
}

impl MermaidRenderer {
    pub fn new(document: Document) -> Self {
        Self { document }
    }

    async fn run(&self, render_id: &str, source: &str) -> Result<String, RenderError> {
        let mermaid = library()?;
        let run = entry_point(&mermaid, "run")?;
        let staging = Staging::new(&self.document, render_id, source)?;

        let options = Object::new();
        Reflect::set(&options, &"nodes".into(), &Array::of1(&staging.0)).map_err(library_error)?;
        let returned = run.call1(&mermaid, &options).map_err(library_error)?;
        if let Ok(promise) = returned.dyn_into::<Promise>() {
            JsFuture::from(promise).await.map_err(library_error)?;
        }

        let svg = staging.0.inner_html();
        if !svg.contains("<svg") {
            return Err(RenderError::EmptyOutput);
        }
        Ok(svg)
    }

    async fn render(&self, render_id: &str, source: &str) -> Result<String, RenderError> {
        let mermaid = library()?;
        let render = entry_point(&mermaid, "render")?;
        let returned = render
            .call2(&mermaid, &render_id.into(), &source.into())
            .map_err(library_error)?;
        let result = match returned.dyn_into::<Promise>() {
            Ok(promise) => JsFuture::from(promise).await.map_err(library_error)?,
            Err(value) => value,
        };
        Reflect::get(&result, &"svg".into())
            .ok()
            .and_then(|svg| svg.as_string())
            .filter(|svg| svg.contains("<svg"))
            .ok_or(RenderError::EmptyOutput)
    }
}

impl Renderer for MermaidRenderer {
    fn render_primary<'a>(
        &'a self,
        render_id: &'a str,
        source: &'a str,
    ) -> LocalBoxFuture<'a, Result<String, RenderError>> {
        Box::pin(self.run(render_id, source))
    }

    fn render_fallback<'a>(
        &'a self,
        render_id: &'a str,
        source: &'a str,
    ) -> LocalBoxFuture<'a, Result<String, RenderError>> {
        Box::pin(self.render(render_id, source))
    }
}
