//! Export pipeline.
//!
//! ```text
//! size hints ─▶ Frame ─▶ serialized clone ─┬─ svg ──────────────▶ download
//!                                          └─ png / jpeg / pdf ─▶ rasterize ─▶ encode ─▶ download
//!                                                                         └──▶ PDF library
//! ```
//!
//! Everything that touches the browser sits behind `ExportBackend`; this
//! module only decides sizes, formats and which fallback applies.

use flowpad_core::element::parse_css_number;
use flowpad_core::{EditorConfig, ExportSize};
use futures::future::LocalBoxFuture;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub const DECODE_FALLBACK_NOTICE: &str =
    "Failed to load diagram for conversion. Downloading as SVG instead.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Svg,
    Png,
    Jpeg,
    Pdf,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Svg => "svg",
            Self::Png => "png",
            Self::Jpeg => "jpeg",
            Self::Pdf => "pdf",
        }
    }

    pub fn mime(self) -> &'static str {
        match self {
            Self::Svg => "image/svg+xml",
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::Pdf => "application/pdf",
        }
    }

    /// Whether this format goes through the canvas.
    pub fn is_raster(self) -> bool {
        !matches!(self, Self::Svg)
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ExportFormat {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "svg" => Ok(Self::Svg),
            "png" => Ok(Self::Png),
            "jpeg" | "jpg" => Ok(Self::Jpeg),
            "pdf" => Ok(Self::Pdf),
            other => Err(ExportError::UnknownFormat(other.to_owned())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Background {
    Color(String),
    Transparent,
}

impl Background {
    /// The background selector's value; empty means the configured default.
    pub fn parse(raw: &str, default: &str) -> Self {
        match raw.trim() {
            "transparent" => Self::Transparent,
            "" => Self::Color(default.to_owned()),
            color => Self::Color(color.to_owned()),
        }
    }
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("No diagram to download. Please create a flowchart first.")]
    NoDiagram,
    #[error("unknown export format `{0}`")]
    UnknownFormat(String),
    #[error("Unable to convert to {0}. Please try downloading as SVG.")]
    Convert(ExportFormat),
    #[error("Failed to download image. Please try a different format.")]
    Encode(String),
    #[error("PDF library not loaded. Please include jsPDF library to enable PDF download.")]
    PdfUnavailable,
    #[error("Failed to create PDF. Please try downloading as PNG instead.")]
    Pdf(String),
    #[error("Download failed. Please try again.")]
    Download(String),
}

/// Why the canvas step failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RasterError {
    /// The serialized markup could not be loaded as an image.
    #[error("image decode failed: {0}")]
    Decode(String),
    /// The image loaded but could not be drawn.
    #[error("canvas draw failed: {0}")]
    Draw(String),
}

// ─── Geometry ─────────────────────────────────────────────────────────────

/// What the live visual reports about its own size.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SizeHints {
    /// On-screen bounding box.
    pub measured: Option<(f64, f64)>,
    /// The `width` / `height` attributes.
    pub declared: (Option<String>, Option<String>),
    pub view_box: Option<String>,
}

/// Export dimensions, in CSS pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub width: f64,
    pub height: f64,
    pub view_box: String,
}

impl Frame {
    /// Per dimension: measured bounds, then the declared attribute, then the
    /// default size.
    pub fn resolve(hints: &SizeHints, default: ExportSize) -> Self {
        let positive = |v: f64| (v.is_finite() && v > 0.0).then_some(v);
        let pick = |measured: Option<f64>, declared: Option<&str>, fallback: u32| {
            measured
                .and_then(positive)
                .or_else(|| declared.and_then(parse_css_number).and_then(positive))
                .unwrap_or(f64::from(fallback))
        };
        let width = pick(
            hints.measured.map(|m| m.0),
            hints.declared.0.as_deref(),
            default.width,
        );
        let height = pick(
            hints.measured.map(|m| m.1),
            hints.declared.1.as_deref(),
            default.height,
        );
        let view_box = hints
            .view_box
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_owned)
            .unwrap_or_else(|| format!("0 0 {width} {height}"));
        Self {
            width,
            height,
            view_box,
        }
    }
}

/// The canvas a raster export draws on.
#[derive(Debug, Clone, PartialEq)]
pub struct CanvasSpec {
    pub pixel_width: u32,
    pub pixel_height: u32,
    /// Context scale, the device pixel ratio.
    pub scale: f64,
    /// Drawing size in CSS pixels.
    pub width: f64,
    pub height: f64,
    /// Painted before the image unless transparent.
    pub fill: Option<String>,
}

impl CanvasSpec {
    pub fn new(frame: &Frame, pixel_ratio: f64, background: &Background) -> Self {
        let scale = if pixel_ratio.is_finite() && pixel_ratio > 0.0 {
            pixel_ratio
        } else {
            1.0
        };
        Self {
            pixel_width: (frame.width * scale).round() as u32,
            pixel_height: (frame.height * scale).round() as u32,
            scale,
            width: frame.width,
            height: frame.height,
            fill: match background {
                Background::Color(c) => Some(c.clone()),
                Background::Transparent => None,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Portrait,
    Landscape,
}

impl Orientation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Portrait => "portrait",
            Self::Landscape => "landscape",
        }
    }
}

/// One PDF page holding the whole image, in pixel units.
#[derive(Debug, Clone, PartialEq)]
pub struct PdfPage {
    pub orientation: Orientation,
    pub width: f64,
    pub height: f64,
}

impl PdfPage {
    pub fn for_frame(frame: &Frame) -> Self {
        Self {
            orientation: if frame.width > frame.height {
                Orientation::Landscape
            } else {
                Orientation::Portrait
            },
            width: frame.width,
            height: frame.height,
        }
    }
}

// ─── Backend ──────────────────────────────────────────────────────────────

pub trait ExportBackend {
    /// A drawn canvas.
    type Raster;

    /// `None` when no rendered diagram is present.
    fn size_hints(&self) -> Option<SizeHints>;

    /// Clone the visual, strip editor decoration, stamp `frame` onto it and
    /// serialize it to markup.
    fn serialize(&self, frame: &Frame) -> Result<String, ExportError>;

    fn pixel_ratio(&self) -> f64;

    fn rasterize<'a>(
        &'a self,
        svg: &'a str,
        canvas: &'a CanvasSpec,
    ) -> LocalBoxFuture<'a, Result<Self::Raster, RasterError>>;

    /// Encode the canvas as a data URL.
    fn encode(
        &self,
        raster: &Self::Raster,
        format: ExportFormat,
        quality: f64,
    ) -> Result<String, ExportError>;

    fn has_pdf(&self) -> bool;

    fn save_pdf(
        &self,
        raster: &Self::Raster,
        page: &PdfPage,
        file_name: &str,
    ) -> Result<(), ExportError>;

    fn download_text(&self, contents: &str, mime: &str, file_name: &str)
    -> Result<(), ExportError>;

    fn download_url(&self, url: &str, file_name: &str) -> Result<(), ExportError>;
}

// ─── Pipeline ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct ExportOptions {
    pub format: ExportFormat,
    pub background: Background,
    pub stem: String,
    pub jpeg_quality: f64,
    pub default_size: ExportSize,
}

impl ExportOptions {
    pub fn from_config(config: &EditorConfig, format: ExportFormat, background: Background) -> Self {
        Self {
            format,
            background,
            stem: config.export_stem.clone(),
            jpeg_quality: config.jpeg_quality,
            default_size: config.default_export_size,
        }
    }

    pub fn file_name(&self, format: ExportFormat) -> String {
        format!("{}.{}", self.stem, format.extension())
    }

    fn quality(&self) -> f64 {
        match self.format {
            ExportFormat::Jpeg => self.jpeg_quality,
            _ => 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExportReport {
    pub requested: ExportFormat,
    /// Differs from `requested` when a fallback kicked in.
    pub delivered: ExportFormat,
    pub file_name: String,
    pub rasterized: bool,
    /// Shown to the user even though a file was produced.
    pub notice: Option<&'static str>,
}

pub async fn export<B: ExportBackend + ?Sized>(
    backend: &B,
    options: &ExportOptions,
) -> Result<ExportReport, ExportError> {
    let format = options.format;
    let hints = backend.size_hints().ok_or(ExportError::NoDiagram)?;
    let frame = Frame::resolve(&hints, options.default_size);
    let svg = backend.serialize(&frame)?;

    if !format.is_raster() {
        return deliver_svg(backend, options, &svg, None);
    }
    if format == ExportFormat::Pdf && !backend.has_pdf() {
        return Err(ExportError::PdfUnavailable);
    }

    let canvas = CanvasSpec::new(&frame, backend.pixel_ratio(), &options.background);
    let raster = match backend.rasterize(&svg, &canvas).await {
        Ok(raster) => raster,
        Err(RasterError::Decode(e)) => {
            log::warn!("export: {e}, falling back to svg");
            return deliver_svg(backend, options, &svg, Some(DECODE_FALLBACK_NOTICE));
        }
        Err(err @ RasterError::Draw(_)) => {
            log::error!("export: {err}");
            return Err(ExportError::Convert(format));
        }
    };

    let file_name = options.file_name(format);
    if format == ExportFormat::Pdf {
        backend.save_pdf(&raster, &PdfPage::for_frame(&frame), &file_name)?;
    } else {
        let url = backend.encode(&raster, format, options.quality())?;
        backend.download_url(&url, &file_name)?;
    }
    log::info!(
        "exported {file_name} ({}x{})",
        canvas.pixel_width,
        canvas.pixel_height
    );
    Ok(ExportReport {
        requested: format,
        delivered: format,
        file_name,
        rasterized: true,
        notice: None,
    })
}

fn deliver_svg<B: ExportBackend + ?Sized>(
    backend: &B,
    options: &ExportOptions,
    svg: &str,
    notice: Option<&'static str>,
) -> Result<ExportReport, ExportError> {
    let file_name = options.file_name(ExportFormat::Svg);
    backend.download_text(svg, ExportFormat::Svg.mime(), &file_name)?;
    log::info!("exported {file_name}");
    Ok(ExportReport {
        requested: options.format,
        delivered: ExportFormat::Svg,
        file_name,
        rasterized: false,
        notice,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;
    use pretty_assertions::assert_eq;
    use std::cell::RefCell;

    /// Records every backend call.
    struct Fake {
        hints: Option<SizeHints>,
        raster: Result<(), RasterError>,
        pdf: bool,
        calls: RefCell<Vec<String>>,
    }

    impl Fake {
        fn new() -> Self {
            Self {
                hints: Some(SizeHints {
                    measured: Some((300.0, 200.0)),
                    ..SizeHints::default()
                }),
                raster: Ok(()),
                pdf: true,
                calls: RefCell::new(Vec::new()),
            }
        }

        fn log(&self, call: String) {
            self.calls.borrow_mut().push(call);
        }

        fn calls(&self) -> Vec<String> {
            self.calls.borrow().clone()
        }
    }

    impl ExportBackend for Fake {
        type Raster = CanvasSpec;

        fn size_hints(&self) -> Option<SizeHints> {
            self.hints.clone()
        }

        fn serialize(&self, frame: &Frame) -> Result<String, ExportError> {
            self.log(format!("serialize {}x{}", frame.width, frame.height));
            Ok(format!(r#"<svg viewBox="{}"/>"#, frame.view_box))
        }

        fn pixel_ratio(&self) -> f64 {
            2.0
        }

        fn rasterize<'a>(
            &'a self,
            _svg: &'a str,
            canvas: &'a CanvasSpec,
        ) -> LocalBoxFuture<'a, Result<CanvasSpec, RasterError>> {
            self.log(format!("rasterize {}x{}", canvas.pixel_width, canvas.pixel_height));
            let result = self.raster.clone().map(|()| canvas.clone());
            Box::pin(async move { result })
        }

        fn encode(
            &self,
            _raster: &CanvasSpec,
            format: ExportFormat,
            quality: f64,
        ) -> Result<String, ExportError> {
            self.log(format!("encode {format} {quality}"));
            Ok(format!("data:{};base64,", format.mime()))
        }

        fn has_pdf(&self) -> bool {
            self.pdf
        }

        fn save_pdf(
            &self,
            _raster: &CanvasSpec,
            page: &PdfPage,
            file_name: &str,
        ) -> Result<(), ExportError> {
            self.log(format!("pdf {} {file_name}", page.orientation.as_str()));
            Ok(())
        }

        fn download_text(
            &self,
            _contents: &str,
            mime: &str,
            file_name: &str,
        ) -> Result<(), ExportError> {
            self.log(format!("text {mime} {file_name}"));
            Ok(())
        }

        fn download_url(&self, url: &str, file_name: &str) -> Result<(), ExportError> {
            self.log(format!("url {url} {file_name}"));
            Ok(())
        }
    }

    fn options(format: ExportFormat) -> ExportOptions {
        ExportOptions::from_config(
            &EditorConfig::default(),
            format,
            Background::Color("#ffffff".into()),
        )
    }

    #[test]
    fn svg_never_rasterizes() {
        let fake = Fake::new();
        let report = block_on(export(&fake, &options(ExportFormat::Svg))).unwrap();
        assert!(!report.rasterized);
        assert_eq!(report.file_name, "flowchart.svg");
        assert_eq!(
            fake.calls(),
            vec!["serialize 300x200", "text image/svg+xml flowchart.svg"]
        );
    }

    #[test]
    fn png_always_rasterizes() {
        let fake = Fake::new();
        let report = block_on(export(&fake, &options(ExportFormat::Png))).unwrap();
        assert!(report.rasterized);
        assert_eq!(
            fake.calls(),
            vec![
                "serialize 300x200",
                "rasterize 600x400",
                "encode png 1",
                "url data:image/png;base64, flowchart.png"
            ]
        );
    }

    #[test]
    fn jpeg_uses_configured_quality() {
        let fake = Fake::new();
        let report = block_on(export(&fake, &options(ExportFormat::Jpeg))).unwrap();
        assert_eq!(report.file_name, "flowchart.jpeg");
        assert!(fake.calls().contains(&"encode jpeg 0.9".to_owned()));
    }

    #[test]
    fn decode_failure_falls_back_to_svg() {
        let mut fake = Fake::new();
        fake.raster = Err(RasterError::Decode("onerror".into()));
        let report = block_on(export(&fake, &options(ExportFormat::Png))).unwrap();
        assert_eq!(report.delivered, ExportFormat::Svg);
        assert_eq!(report.notice, Some(DECODE_FALLBACK_NOTICE));
        assert_eq!(
            fake.calls().last().map(String::as_str),
            Some("text image/svg+xml flowchart.svg")
        );
    }

    #[test]
    fn draw_failure_is_reported() {
        let mut fake = Fake::new();
        fake.raster = Err(RasterError::Draw("tainted".into()));
        let err = block_on(export(&fake, &options(ExportFormat::Jpeg))).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Unable to convert to jpeg. Please try downloading as SVG."
        );
    }

    #[test]
    fn no_diagram_is_an_error() {
        let mut fake = Fake::new();
        fake.hints = None;
        let err = block_on(export(&fake, &options(ExportFormat::Svg))).unwrap_err();
        assert!(matches!(err, ExportError::NoDiagram));
        assert!(fake.calls().is_empty());
    }

    #[test]
    fn pdf_requires_library_and_picks_orientation() {
        let mut fake = Fake::new();
        fake.pdf = false;
        let err = block_on(export(&fake, &options(ExportFormat::Pdf))).unwrap_err();
        assert!(matches!(err, ExportError::PdfUnavailable));

        fake.pdf = true;
        block_on(export(&fake, &options(ExportFormat::Pdf))).unwrap();
        assert!(fake.calls().contains(&"pdf landscape flowchart.pdf".to_owned()));
    }

    #[test]
    fn frame_falls_back_per_dimension() {
        let hints = SizeHints {
            measured: Some((0.0, 0.0)),
            declared: (Some("640px".into()), Some("100%".into())),
            view_box: None,
        };
        let frame = Frame::resolve(&hints, ExportSize::default());
        assert_eq!(frame.width, 640.0);
        assert_eq!(frame.height, 600.0);
        assert_eq!(frame.view_box, "0 0 640 600");

        let declared_box = SizeHints {
            view_box: Some("-8 -8 120 90".into()),
            ..SizeHints::default()
        };
        assert_eq!(
            Frame::resolve(&declared_box, ExportSize::default()).view_box,
            "-8 -8 120 90"
        );
    }

    #[test]
    fn formats_parse_case_insensitively() {
        assert_eq!("JPG".parse::<ExportFormat>().unwrap(), ExportFormat::Jpeg);
        assert_eq!("png".parse::<ExportFormat>().unwrap(), ExportFormat::Png);
        assert!("gif".parse::<ExportFormat>().is_err());
        assert_eq!(
            Background::parse("transparent", "#ffffff"),
            Background::Transparent
        );
        assert_eq!(
            Background::parse("", "#fafafa"),
            Background::Color("#fafafa".into())
        );
    }
}
