//! Browser side of the export pipeline: canvas, object URLs, jsPDF.

use crate::dom::{CONNECT_START, DRAGGING, SELECTED, select_all};
use crate::mermaid::js_message;
use flowpad_editor::export::{
    CanvasSpec, ExportBackend, ExportError, ExportFormat, Frame, PdfPage, RasterError, SizeHints,
};
use futures::future::LocalBoxFuture;
use js_sys::{Array, Function, Object, Promise, Reflect};
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::JsFuture;
use web_sys::{
    Blob, BlobPropertyBag, CanvasRenderingContext2d, Document, Element, HtmlAnchorElement,
    HtmlCanvasElement, HtmlImageElement, Url, Window, XmlSerializer,
};

const SVG_NS: &str = "http://www.w3.org/2000/svg";
const XLINK_NS: &str = "http://www.w3.org/1999/xlink";

pub struct WebExport {
    window: Window,
    document: Document,
    svg: Option<Element>,
}

impl WebExport {
    pub fn new(window: Window, document: Document, svg: Option<Element>) -> Self {
        Self {
            window,
            document,
            svg,
        }
    }

    fn anchor(&self, href: &str, file_name: &str) -> Result<(), JsValue> {
        let a = self
            .document
            .create_element("a")?
            .dyn_into::<HtmlAnchorElement>()?;
        a.set_href(href);
        a.set_download(file_name);
        let body = self.document.body().ok_or("no document body")?;
        body.append_child(&a)?;
        a.click();
        a.remove();
        Ok(())
    }

    fn jspdf(&self) -> Option<Function> {
        let namespace = Reflect::get(&self.window, &"jspdf".into()).ok()?;
        if namespace.is_undefined() {
            return None;
        }
        Reflect::get(&namespace, &"jsPDF".into()).ok()?.dyn_into().ok()
    }
}

fn svg_blob_url(svg: &str, mime: &str) -> Result<String, JsValue> {
    let parts = Array::of1(&JsValue::from_str(svg));
    let options = BlobPropertyBag::new();
    options.set_type(mime);
    let blob = Blob::new_with_str_sequence_and_options(&parts, &options)?;
    Url::create_object_url_with_blob(&blob)
}

async fn load_image(url: &str) -> Result<HtmlImageElement, JsValue> {
    let image = HtmlImageElement::new()?;
    let loaded = Promise::new(&mut |resolve, reject| {
        image.set_onload(Some(&resolve));
        image.set_onerror(Some(&reject));
    });
    image.set_src(url);
    JsFuture::from(loaded).await?;
    image.set_onload(None);
    image.set_onerror(None);
    Ok(image)
}

fn prepare_canvas(
    document: &Document,
    canvas: &CanvasSpec,
) -> Result<(HtmlCanvasElement, CanvasRenderingContext2d), JsValue> {
    let element = document
        .create_element("canvas")?
        .dyn_into::<HtmlCanvasElement>()?;
    element.set_width(canvas.pixel_width);
    element.set_height(canvas.pixel_height);
    element.style().set_property("width", &format!("{}px", canvas.width))?;
    element.style().set_property("height", &format!("{}px", canvas.height))?;

    let context = element
        .get_context("2d")?
        .ok_or("2d context unavailable")?
        .dyn_into::<CanvasRenderingContext2d>()?;
    context.scale(canvas.scale, canvas.scale)?;
    if let Some(fill) = &canvas.fill {
        context.set_fill_style_str(fill);
        context.fill_rect(0.0, 0.0, canvas.width, canvas.height);
    }
    Ok((element, context))
}

impl ExportBackend for WebExport {
    type Raster = HtmlCanvasElement;

    fn size_hints(&self) -> Option<SizeHints> {
        let svg = self.svg.as_ref()?;
        let rect = svg.get_bounding_client_rect();
        Some(SizeHints {
            measured: Some((rect.width(), rect.height())),
            declared: (svg.get_attribute("width"), svg.get_attribute("height")),
            view_box: svg.get_attribute("viewBox"),
        })
    }

    fn serialize(&self, frame: &Frame) -> Result<String, ExportError> {
        let fail = |e: JsValue| ExportError::Download(js_message(&e));
        let svg = self.svg.as_ref().ok_or(ExportError::NoDiagram)?;
        let clone = svg
            .clone_node_with_deep(true)
            .map_err(fail)?
            .dyn_into::<Element>()
            .map_err(|_| ExportError::NoDiagram)?;

        let decorated = format!(".{SELECTED}, .{DRAGGING}, .{CONNECT_START}");
        for element in select_all(&clone, &decorated) {
            let classes = element.class_list();
            for class in [SELECTED, DRAGGING, CONNECT_START] {
                let _ = classes.remove_1(class);
            }
        }
        for element in select_all(&clone, r#"[style*="outline"]"#) {
            if let Some(svg) = element.dyn_ref::<web_sys::SvgElement>() {
                let _ = svg.style().remove_property("outline");
            }
        }

        for (name, value) in [
            ("width", frame.width.to_string()),
            ("height", frame.height.to_string()),
            ("xmlns", SVG_NS.to_owned()),
            ("xmlns:xlink", XLINK_NS.to_owned()),
            ("viewBox", frame.view_box.clone()),
        ] {
            clone.set_attribute(name, &value).map_err(fail)?;
        }

        XmlSerializer::new()
            .and_then(|s| s.serialize_to_string(&clone))
            .map_err(fail)
    }

    fn pixel_ratio(&self) -> f64 {
        self.window.device_pixel_ratio()
    }

    fn rasterize<'a>(
        &'a self,
        svg: &'a str,
        canvas: &'a CanvasSpec,
    ) -> LocalBoxFuture<'a, Result<HtmlCanvasElement, RasterError>> {
        Box::pin(async move {
            let draw = |e: JsValue| RasterError::Draw(js_message(&e));
            let (element, context) = prepare_canvas(&self.document, canvas).map_err(draw)?;

            let url = svg_blob_url(svg, "image/svg+xml;charset=utf-8").map_err(draw)?;
            let image = load_image(&url).await;
            let _ = Url::revoke_object_url(&url);
            let image = image.map_err(|e| RasterError::Decode(js_message(&e)))?;

            context
                .draw_image_with_html_image_element_and_dw_and_dh(
                    &image,
                    0.0,
                    0.0,
                    canvas.width,
                    canvas.height,
                )
                .map_err(draw)?;
            Ok(element)
        })
    }

    fn encode(
        &self,
        raster: &HtmlCanvasElement,
        format: ExportFormat,
        quality: f64,
    ) -> Result<String, ExportError> {
        raster
            .to_data_url_with_type_and_encoder_options(format.mime(), &JsValue::from_f64(quality))
            .map_err(|e| ExportError::Encode(js_message(&e)))
    }

    fn has_pdf(&self) -> bool {
        self.jspdf().is_some()
    }

    fn save_pdf(
        &self,
        raster: &HtmlCanvasElement,
        page: &PdfPage,
        file_name: &str,
    ) -> Result<(), ExportError> {
        let constructor = self.jspdf().ok_or(ExportError::PdfUnavailable)?;
        let fail = |e: JsValue| ExportError::Pdf(js_message(&e));

        let options = Object::new();
        Reflect::set(&options, &"orientation".into(), &page.orientation.as_str().into())
            .map_err(fail)?;
        Reflect::set(&options, &"unit".into(), &"px".into()).map_err(fail)?;
        let format = Array::of2(&page.width.into(), &page.height.into());
        Reflect::set(&options, &"format".into(), &format).map_err(fail)?;
        let pdf = Reflect::construct(&constructor, &Array::of1(&options)).map_err(fail)?;

        let image = raster
            .to_data_url_with_type_and_encoder_options("image/png", &JsValue::from_f64(1.0))
            .map_err(fail)?;
        let method = |name: &str| -> Result<Function, ExportError> {
            Reflect::get(&pdf, &name.into())
                .and_then(|f| f.dyn_into::<Function>().map_err(JsValue::from))
                .map_err(fail)
        };
        let args = Array::new();
        for arg in [
            JsValue::from_str(&image),
            "PNG".into(),
            0.into(),
            0.into(),
            page.width.into(),
            page.height.into(),
        ] {
            args.push(&arg);
        }
        method("addImage")?.apply(&pdf, &args).map_err(fail)?;
        method("save")?.call1(&pdf, &file_name.into()).map_err(fail)?;
        Ok(())
    }

    fn download_text(&self, contents: &str, mime: &str, file_name: &str) -> Result<(), ExportError> {
        let fail = |e: JsValue| ExportError::Download(js_message(&e));
        let url = svg_blob_url(contents, mime).map_err(fail)?;
        let result = self.anchor(&url, file_name).map_err(fail);
        let _ = Url::revoke_object_url(&url);
        result
    }

    fn download_url(&self, url: &str, file_name: &str) -> Result<(), ExportError> {
        self.anchor(url, file_name)
            .map_err(|e| ExportError::Encode(js_message(&e)))
    }
}
