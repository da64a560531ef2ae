//! Seam between the pool and the external browser.
//!
//! The pool and the conversion pipeline only talk to the browser through
//! [`RendererProcess`] and [`RenderPage`]. The Chrome implementation lives in
//! [`factory`](crate::factory); the mock used by the test suites implements
//! the same traits without launching anything.
//!
//! All methods are blocking. The pool calls them from `spawn_blocking` tasks
//! or its own sweeper thread, never directly on an async worker.

use std::sync::Arc;
use std::time::Duration;

use crate::options::ColorScheme;

/// Failure reported by the external renderer.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RendererError {
    /// The browser process could not be started.
    #[error("Browser launch failed: {0}")]
    Launch(String),

    /// A page could not be opened, configured or closed.
    #[error("Page operation failed: {0}")]
    Page(String),

    /// Loading HTML content or navigating to a URL failed.
    #[error("Navigation failed: {0}")]
    Navigation(String),

    /// The renderer did not answer within the allotted time.
    #[error("Renderer timed out: {0}")]
    Timeout(String),

    /// Script evaluation failed.
    #[error("Evaluation failed: {0}")]
    Evaluation(String),

    /// `print to PDF` failed.
    #[error("PDF rendering failed: {0}")]
    Pdf(String),

    /// The page, session or connection is gone.
    #[error("Target closed: {0}")]
    Closed(String),
}

/// Message fragments the browser automation layer uses for session drops.
const TRANSIENT_MARKERS: &[&str] = &[
    "connection closed",
    "connection is closed",
    "session closed",
    "target closed",
    "no such target",
    "detached",
    "protocol error",
    "null reference",
    "object reference not set",
    "unable to make method calls",
];

impl RendererError {
    /// Whether the failure is a flaky automation-session problem that a
    /// fresh page is likely to avoid.
    ///
    /// [`Closed`](Self::Closed) is always transient. Other variants are
    /// transient when their message names a dropped connection or session,
    /// a detached frame, a protocol error or a null reference.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Closed(_) => true,
            Self::Launch(_) => false,
            Self::Page(msg)
            | Self::Navigation(msg)
            | Self::Timeout(msg)
            | Self::Evaluation(msg)
            | Self::Pdf(msg) => {
                let msg = msg.to_ascii_lowercase();
                TRANSIENT_MARKERS.iter().any(|marker| msg.contains(marker))
            }
        }
    }
}

/// PDF options resolved into the renderer's shape.
///
/// Produced by [`ConversionOptions::resolve`](crate::ConversionOptions::resolve);
/// lengths are in inches and header/footer templates are static markup.
#[derive(Debug, Clone, PartialEq)]
pub struct PdfParams {
    /// Landscape orientation.
    pub landscape: bool,
    /// Print CSS backgrounds.
    pub print_background: bool,
    /// Rendering scale, between 0.1 and 2.0.
    pub scale: f64,
    /// Paper width in inches.
    pub paper_width: f64,
    /// Paper height in inches.
    pub paper_height: f64,
    /// Top margin in inches.
    pub margin_top: f64,
    /// Bottom margin in inches.
    pub margin_bottom: f64,
    /// Left margin in inches.
    pub margin_left: f64,
    /// Right margin in inches.
    pub margin_right: f64,
    /// Page ranges such as `1-5, 8`.
    pub page_ranges: Option<String>,
    /// Header markup, when a header is shown.
    pub header_template: Option<String>,
    /// Footer markup, when a footer is shown.
    pub footer_template: Option<String>,
    /// Let CSS `@page` size win over the paper size.
    pub prefer_css_page_size: bool,
}

impl PdfParams {
    /// Whether the header/footer band must be enabled.
    pub fn display_header_footer(&self) -> bool {
        self.header_template.is_some() || self.footer_template.is_some()
    }
}

/// One page (tab) inside the external browser process.
pub trait RenderPage: Send + Sync {
    /// Applies the preferred color scheme media feature.
    fn emulate_media(&self, scheme: ColorScheme) -> Result<(), RendererError>;

    /// Sets an explicit viewport size in CSS pixels.
    fn set_viewport(&self, width: u32, height: u32) -> Result<(), RendererError>;

    /// Loads raw HTML and waits until the network settles or `timeout` passes.
    fn set_content(&self, html: &str, timeout: Duration) -> Result<(), RendererError>;

    /// Navigates to `url` and waits until the network settles or `timeout` passes.
    fn goto(&self, url: &str, timeout: Duration) -> Result<(), RendererError>;

    /// Evaluates a JavaScript expression that yields a boolean.
    fn evaluate_bool(&self, expression: &str) -> Result<bool, RendererError>;

    /// Prints the loaded document to PDF.
    fn pdf(&self, params: &PdfParams) -> Result<Vec<u8>, RendererError>;

    /// Whether the page or its process reports closed.
    fn is_closed(&self) -> bool;

    /// Closes the page. Closing an already closed page is not an error.
    fn close(&self) -> Result<(), RendererError>;
}

/// The external browser process that pages are opened in.
pub trait RendererProcess: Send + Sync {
    /// Opens a new page.
    fn new_page(&self) -> Result<Arc<dyn RenderPage>, RendererError>;

    /// Whether the automation connection is still usable.
    fn is_connected(&self) -> bool;

    /// OS process id, when known.
    fn process_id(&self) -> Option<u32>;

    /// Closes the browser gracefully.
    fn close(&self) -> Result<(), RendererError>;

    /// Kills the browser process without waiting for it.
    fn kill(&self);
}

// ============================================================================
// Unit Tests
// ============================================================================
