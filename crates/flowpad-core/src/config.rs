//! Editor configuration.
//!
//! The host page may pass a JSON object at start-up; every field is
//! optional and falls back to the defaults below. The `mermaid` section is
//! forwarded verbatim to `mermaid.initialize`, so it serializes in the
//! library's own camelCase layout.

use serde::{Deserialize, Serialize};

/// The diagram shown when the text box starts out empty.
pub const DEFAULT_SOURCE: &str = "flowchart TD
    A[Start] --> B{Decision}
    B -->|Yes| C[Process 1]
    B -->|No| D[Process 2]
    C --> E[End]
    D --> E";

// ─── EditorConfig ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Quiet period before a text-box edit triggers a render.
    pub debounce_ms: u32,
    /// Prefix for every saved diagram key in browser storage.
    pub storage_prefix: String,
    /// Download file name without extension.
    pub export_stem: String,
    /// Size used when the rendered visual reports neither bounds nor
    /// declared dimensions.
    pub default_export_size: ExportSize,
    /// JPEG encoder quality in `0.0..=1.0`.
    pub jpeg_quality: f64,
    /// Background painted under raster exports unless the user asks for
    /// a transparent one.
    pub default_background: String,
    pub default_source: String,
    pub mermaid: MermaidConfig,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 500,
            storage_prefix: "flowchart_".into(),
            export_stem: "flowchart".into(),
            default_export_size: ExportSize::default(),
            jpeg_quality: 0.9,
            default_background: "#ffffff".into(),
            default_source: DEFAULT_SOURCE.into(),
            mermaid: MermaidConfig::default(),
        }
    }
}

impl EditorConfig {
    /// Parse a host-supplied JSON object. Unknown keys are ignored.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let config: EditorConfig = serde_json::from_str(json)?;
        Ok(config.sanitized())
    }

    /// Clamp values that the browser APIs would reject.
    fn sanitized(mut self) -> Self {
        if !(0.0..=1.0).contains(&self.jpeg_quality) {
            log::warn!(
                "jpeg_quality {} out of range, clamping",
                self.jpeg_quality
            );
            self.jpeg_quality = self.jpeg_quality.clamp(0.0, 1.0);
        }
        if self.export_stem.trim().is_empty() {
            self.export_stem = "flowchart".into();
        }
        if self.default_export_size.width == 0 || self.default_export_size.height == 0 {
            self.default_export_size = ExportSize::default();
        }
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportSize {
    pub width: u32,
    pub height: u32,
}

impl Default for ExportSize {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
        }
    }
}

// ─── Mermaid ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MermaidConfig {
    /// Always false: rendering is driven by the orchestrator.
    pub start_on_load: bool,
    pub theme: String,
    pub flowchart: FlowchartOptions,
    pub security_level: String,
    pub suppress_error_rendering: bool,
}

impl Default for MermaidConfig {
    fn default() -> Self {
        Self {
            start_on_load: false,
            theme: "default".into(),
            flowchart: FlowchartOptions::default(),
            security_level: "loose".into(),
            suppress_error_rendering: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FlowchartOptions {
    pub use_max_width: bool,
    /// SVG `<text>` labels instead of `<foreignObject>` HTML, so node text is
    /// reachable with `text, tspan` selectors and rasterizes cleanly.
    pub html_labels: bool,
    pub curve: String,
}

impl Default for FlowchartOptions {
    fn default() -> Self {
        Self {
            use_max_width: false,
            html_labels: false,
            curve: "basis".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn empty_object_yields_defaults() {
        let config = EditorConfig::from_json("{}").unwrap();
        assert_eq!(config, EditorConfig::default());
        assert_eq!(config.debounce_ms, 500);
        assert_eq!(config.storage_prefix, "flowchart_");
    }

    #[test]
    fn partial_override() {
        let config =
            EditorConfig::from_json(r#"{"debounce_ms": 250, "mermaid": {"theme": "dark"}}"#)
                .unwrap();
        assert_eq!(config.debounce_ms, 250);
        assert_eq!(config.mermaid.theme, "dark");
        assert_eq!(config.mermaid.security_level, "loose");
        assert!(!config.mermaid.flowchart.html_labels);
    }

    #[test]
    fn out_of_range_values_are_clamped() {
        let config = EditorConfig::from_json(
            r#"{"jpeg_quality": 3.0, "export_stem": " ", "default_export_size": {"width": 0, "height": 10}}"#,
        )
        .unwrap();
        assert_eq!(config.jpeg_quality, 1.0);
        assert_eq!(config.export_stem, "flowchart");
        assert_eq!(config.default_export_size, ExportSize::default());
    }

    #[test]
    fn mermaid_section_uses_library_key_names() {
        let json = serde_json::to_value(MermaidConfig::default()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "startOnLoad": false,
                "theme": "default",
                "flowchart": {
                    "useMaxWidth": false,
                    "htmlLabels": false,
                    "curve": "basis"
                },
                "securityLevel": "loose",
                "suppressErrorRendering": false
            })
        );
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(EditorConfig::from_json("{debounce_ms: }").is_err());
    }
}
