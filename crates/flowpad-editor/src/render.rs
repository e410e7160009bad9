//! Render orchestration.
//!
//! A render hands the whole flowchart text to the external library, first
//! through its primary entry point and, if that fails, exactly once through
//! the fallback entry point. The returned future resolves only once the
//! library has built its output, so whatever runs after it (decorating the
//! nodes, re-applying overlays) sees complete DOM.
//!
//! Every render carries an epoch. A result whose epoch is no longer the
//! latest is reported as `Superseded` and must be ignored: that closes the
//! race between a slow render and a newer one started by typing, connecting
//! or adding a node.

use futures::future::LocalBoxFuture;
use thiserror::Error;

pub const EMPTY_MESSAGE: &str = "Enter Mermaid code to see preview";
pub const SYNTAX_MESSAGE: &str = "Failed to render diagram. Please check your Mermaid syntax.";
pub const NO_FALLBACK_MESSAGE: &str =
    "Mermaid rendering failed. Please check syntax and Mermaid version.";
pub const UNAVAILABLE_MESSAGE: &str =
    "Unable to render diagram. Please verify Mermaid is properly loaded.";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    /// The library rejected the text or failed internally.
    #[error("{0}")]
    Library(String),
    /// The library is loaded but lacks this entry point.
    #[error("entry point `{0}` is not available")]
    MissingEntryPoint(&'static str),
    /// The library is not loaded at all.
    #[error("rendering library is not loaded")]
    Unavailable,
    /// The call succeeded but produced no diagram.
    #[error("render produced no diagram")]
    EmptyOutput,
}

/// The external rendering library.
///
/// Both calls resolve to the SVG markup now present in the diagram
/// container.
pub trait Renderer {
    fn render_primary<'a>(
        &'a self,
        render_id: &'a str,
        source: &'a str,
    ) -> LocalBoxFuture<'a, Result<String, RenderError>>;

    fn render_fallback<'a>(
        &'a self,
        render_id: &'a str,
        source: &'a str,
    ) -> LocalBoxFuture<'a, Result<String, RenderError>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderPath {
    Primary,
    Fallback,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RenderStatus {
    /// Whitespace-only text; nothing was handed to the library.
    Empty,
    Rendered {
        svg: String,
        path: RenderPath,
        /// What the primary entry point reported before the fallback
        /// succeeded.
        primary_error: Option<String>,
    },
    /// Both entry points failed; no visual is present.
    Failed {
        message: String,
        primary_error: String,
        fallback_error: String,
    },
    /// A newer render was started before this one finished.
    Superseded,
}

impl RenderStatus {
    /// Text to place in the diagram container instead of a visual.
    pub fn inline_message(&self) -> Option<&str> {
        match self {
            Self::Empty => Some(EMPTY_MESSAGE),
            Self::Failed { message, .. } => Some(message.as_str()),
            Self::Rendered { .. } | Self::Superseded => None,
        }
    }

    /// Text to show beside a visual: the primary error when the fallback
    /// produced it.
    pub fn notice(&self) -> Option<&str> {
        match self {
            Self::Rendered { primary_error, .. } => primary_error.as_deref(),
            _ => None,
        }
    }

    pub fn is_rendered(&self) -> bool {
        matches!(self, Self::Rendered { .. })
    }
}

/// The inline message shown while the fallback is attempted.
pub fn primary_error_message(error: &RenderError) -> String {
    format!("Error rendering diagram: {error}")
}

fn failure_message(fallback_error: &RenderError) -> &'static str {
    match fallback_error {
        RenderError::MissingEntryPoint(_) => NO_FALLBACK_MESSAGE,
        RenderError::Unavailable => UNAVAILABLE_MESSAGE,
        RenderError::Library(_) | RenderError::EmptyOutput => SYNTAX_MESSAGE,
    }
}

// ─── Jobs ─────────────────────────────────────────────────────────────────

/// One render request, detached from the orchestrator so the caller can
/// release any shared borrow before awaiting it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderJob {
    pub epoch: u64,
    pub render_id: String,
    pub source: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderOutcome {
    pub epoch: u64,
    pub status: RenderStatus,
}

impl RenderJob {
    pub async fn run<R: Renderer + ?Sized>(self, renderer: &R) -> RenderOutcome {
        let status = if self.source.is_empty() {
            RenderStatus::Empty
        } else {
            attempt(renderer, &self.render_id, &self.source).await
        };
        RenderOutcome {
            epoch: self.epoch,
            status,
        }
    }
}

async fn attempt<R: Renderer + ?Sized>(renderer: &R, render_id: &str, source: &str) -> RenderStatus {
    let primary = match renderer.render_primary(render_id, source).await {
        Ok(svg) => {
            return RenderStatus::Rendered {
                svg,
                path: RenderPath::Primary,
                primary_error: None,
            };
        }
        Err(e) => e,
    };
    log::warn!("primary render failed: {primary}");

    let fallback_id = format!("fallback-{render_id}");
    match renderer.render_fallback(&fallback_id, source).await {
        Ok(svg) => RenderStatus::Rendered {
            svg,
            path: RenderPath::Fallback,
            primary_error: Some(primary_error_message(&primary)),
        },
        Err(fallback) => {
            log::error!("fallback render failed: {fallback}");
            RenderStatus::Failed {
                message: failure_message(&fallback).to_owned(),
                primary_error: primary.to_string(),
                fallback_error: fallback.to_string(),
            }
        }
    }
}

// ─── Orchestrator ─────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct RenderOrchestrator {
    epoch: u64,
    /// Epoch of the last render that produced a visual, if the visual is
    /// still the current one.
    rendered: Option<u64>,
}

impl RenderOrchestrator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a render of `source`. Any job started earlier is superseded.
    pub fn begin(&mut self, source: &str) -> RenderJob {
        self.epoch += 1;
        log::debug!("render #{} requested", self.epoch);
        RenderJob {
            epoch: self.epoch,
            render_id: format!("flowpad-{}", self.epoch),
            source: source.trim().to_owned(),
        }
    }

    /// Accept the outcome of a job started by `begin`.
    pub fn finish(&mut self, outcome: RenderOutcome) -> RenderStatus {
        if outcome.epoch != self.epoch {
            log::debug!("render #{} superseded by #{}", outcome.epoch, self.epoch);
            return RenderStatus::Superseded;
        }
        self.rendered = outcome.status.is_rendered().then_some(outcome.epoch);
        outcome.status
    }

    /// `begin`, run and `finish` in one go, for callers that own the
    /// orchestrator outright.
    pub async fn render<R: Renderer + ?Sized>(&mut self, renderer: &R, source: &str) -> RenderStatus {
        let outcome = self.begin(source).run(renderer).await;
        self.finish(outcome)
    }

    /// Whether the diagram container currently holds a rendered visual.
    pub fn has_visual(&self) -> bool {
        self.rendered.is_some()
    }
}

// ─── Debounce ─────────────────────────────────────────────────────────────

/// Coalesces text-box edits: every keystroke schedules a ticket, and only
/// the newest ticket may trigger a render when its timer fires.
#[derive(Debug)]
pub struct Debouncer {
    delay_ms: u32,
    generation: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebounceTicket(u64);

impl DebounceTicket {
    pub fn generation(self) -> u64 {
        self.0
    }

    pub fn from_generation(generation: u64) -> Self {
        Self(generation)
    }
}

impl Debouncer {
    pub fn new(delay_ms: u32) -> Self {
        Self {
            delay_ms,
            generation: 0,
        }
    }

    pub fn delay_ms(&self) -> u32 {
        self.delay_ms
    }

    /// Schedule a render; the caller arms a timer for `delay_ms` carrying
    /// the returned ticket.
    pub fn schedule(&mut self) -> DebounceTicket {
        self.generation += 1;
        DebounceTicket(self.generation)
    }

    /// Called when a timer fires: true only for the newest ticket, which is
    /// consumed.
    pub fn fire(&mut self, ticket: DebounceTicket) -> bool {
        if ticket.0 == self.generation && ticket.0 != 0 {
            self.generation += 1;
            true
        } else {
            false
        }
    }

    /// Drop any pending ticket (an explicit Update beat the timer).
    pub fn cancel(&mut self) {
        self.generation += 1;
    }
}
