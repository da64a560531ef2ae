//! Uniform result types for the generation and conversion pipelines.
//!
//! No error crosses the service boundary as an `Err`: every operation returns
//! an [`Outcome`], which is either a payload with the time it took or a
//! [`Failure`] carrying a message, the pipeline [`Stage`] that failed, the
//! originating error when there is one, and the elapsed time.
//!
//! # Overview
//!
//! | Type | Payload |
//! |------|---------|
//! | [`ConversionResult`] | PDF bytes |
//! | [`GenerationResult`] | HTML document |
//!
//! # Example
//!
//! ```rust,ignore
//! let result = service.generate_pdf_from_html(html, None).await;
//! match result.into_result() {
//!     Ok(pdf) => std::fs::write("out.pdf", pdf)?,
//!     Err(failure) => {
//!         eprintln!("[{}] {} ({:?})", failure.code(), failure, failure.stage());
//!     }
//! }
//! ```

use std::time::Duration;

use crate::error::Html2PdfError;

// ============================================================================
// Stage
// ============================================================================

/// Pipeline stage a failure happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Rendering the template into HTML.
    Generation,
    /// Waiting for or creating a page.
    Acquisition,
    /// Loading the content and printing it.
    Conversion,
}

impl Stage {
    /// The stage an error belongs to.
    pub fn of(error: &Html2PdfError) -> Self {
        match error {
            Html2PdfError::GenerationFailed { .. } => Stage::Generation,
            Html2PdfError::PoolExhausted(_)
            | Html2PdfError::PoolError { .. }
            | Html2PdfError::ShuttingDown => Stage::Acquisition,
            Html2PdfError::ConversionFailed { .. } | Html2PdfError::Configuration(_) => {
                Stage::Conversion
            }
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Stage::Generation => "generation",
            Stage::Acquisition => "acquisition",
            Stage::Conversion => "conversion",
        })
    }
}

// ============================================================================
// Failure
// ============================================================================

/// A failed pipeline run.
///
/// Displays as its message; [`source`](std::error::Error::source) yields the
/// originating [`Html2PdfError`].
#[derive(Debug)]
pub struct Failure {
    message: String,
    cause: Option<Html2PdfError>,
    stage: Stage,
    duration: Duration,
}

impl Failure {
    /// A failure without an underlying error.
    pub fn new(stage: Stage, message: impl Into<String>, duration: Duration) -> Self {
        Self {
            message: message.into(),
            cause: None,
            stage,
            duration,
        }
    }

    /// A failure caused by `error`; the stage is derived from the error.
    pub fn from_error(error: Html2PdfError, duration: Duration) -> Self {
        Self {
            message: error.to_string(),
            stage: Stage::of(&error),
            cause: Some(error),
            duration,
        }
    }

    /// Human-readable description.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The originating error, for diagnostics.
    pub fn cause(&self) -> Option<&Html2PdfError> {
        self.cause.as_ref()
    }

    /// The stage that failed.
    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Time spent before failing.
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Whether repeating the request later may succeed.
    pub fn is_retryable(&self) -> bool {
        self.cause.as_ref().is_some_and(Html2PdfError::is_retryable)
    }

    /// Machine-readable error code.
    ///
    /// | Code | Cause |
    /// |------|-------|
    /// | `POOL_EXHAUSTED` | No page freed up in time |
    /// | `POOL_ERROR` | Page or browser could not be created |
    /// | `SHUTTING_DOWN` | Pool is shutting down |
    /// | `GENERATION_FAILED` | Template error |
    /// | `CONVERSION_FAILED` | Renderer error |
    /// | `INVALID_OPTIONS` | Rejected options or URL |
    /// | `INTERNAL_ERROR` | No underlying error recorded |
    pub fn code(&self) -> &'static str {
        match &self.cause {
            Some(Html2PdfError::PoolExhausted(_)) => "POOL_EXHAUSTED",
            Some(Html2PdfError::PoolError { .. }) => "POOL_ERROR",
            Some(Html2PdfError::ShuttingDown) => "SHUTTING_DOWN",
            Some(Html2PdfError::GenerationFailed { .. }) => "GENERATION_FAILED",
            Some(Html2PdfError::ConversionFailed { .. }) => "CONVERSION_FAILED",
            Some(Html2PdfError::Configuration(_)) => "INVALID_OPTIONS",
            None => "INTERNAL_ERROR",
        }
    }

    /// Prefixes the message with `context`.
    pub(crate) fn context(mut self, context: &str) -> Self {
        self.message = format!("{}: {}", context, self.message);
        self
    }

    /// Adds time spent in earlier stages.
    pub(crate) fn after(mut self, earlier: Duration) -> Self {
        self.duration += earlier;
        self
    }
}

impl std::fmt::Display for Failure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for Failure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause.as_ref().map(|e| e as &(dyn std::error::Error + 'static))
    }
}

// ============================================================================
// Outcome
// ============================================================================

/// Result of a pipeline run: a payload with its duration, or a [`Failure`].
#[derive(Debug)]
pub enum Outcome<T> {
    /// The run produced `payload` in `duration`.
    Success {
        /// Produced value.
        payload: T,
        /// Elapsed time.
        duration: Duration,
    },
    /// The run failed.
    Failure(Failure),
}

/// PDF bytes or a failure.
pub type ConversionResult = Outcome<Vec<u8>>;

/// An HTML document or a failure.
pub type GenerationResult = Outcome<String>;

impl<T> Outcome<T> {
    /// A successful outcome.
    pub fn success(payload: T, duration: Duration) -> Self {
        Outcome::Success { payload, duration }
    }

    /// A failed outcome caused by `error`.
    pub fn from_error(error: Html2PdfError, duration: Duration) -> Self {
        Outcome::Failure(Failure::from_error(error, duration))
    }

    /// Whether the run succeeded.
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success { .. })
    }

    /// Elapsed time, successful or not.
    pub fn duration(&self) -> Duration {
        match self {
            Outcome::Success { duration, .. } => *duration,
            Outcome::Failure(failure) => failure.duration(),
        }
    }

    /// The payload, when successful.
    pub fn payload(&self) -> Option<&T> {
        match self {
            Outcome::Success { payload, .. } => Some(payload),
            Outcome::Failure(_) => None,
        }
    }

    /// The failure, when unsuccessful.
    pub fn failure(&self) -> Option<&Failure> {
        match self {
            Outcome::Success { .. } => None,
            Outcome::Failure(failure) => Some(failure),
        }
    }

    /// Failure message, when unsuccessful.
    pub fn message(&self) -> Option<&str> {
        self.failure().map(Failure::message)
    }

    /// Originating error, when unsuccessful and recorded.
    pub fn cause(&self) -> Option<&Html2PdfError> {
        self.failure().and_then(Failure::cause)
    }

    /// Converts into a standard `Result`.
    pub fn into_result(self) -> Result<T, Failure> {
        match self {
            Outcome::Success { payload, .. } => Ok(payload),
            Outcome::Failure(failure) => Err(failure),
        }
    }
}

impl<T: AsRef<[u8]>> Outcome<T> {
    /// Payload length in bytes; 0 for failures.
    pub fn size(&self) -> usize {
        self.payload().map_or(0, |p| p.as_ref().len())
    }
}

impl ConversionResult {
    /// The PDF bytes, when successful.
    pub fn data(&self) -> Option<&[u8]> {
        self.payload().map(Vec::as_slice)
    }
}

impl GenerationResult {
    /// The HTML document, when successful.
    pub fn html(&self) -> Option<&str> {
        self.payload().map(String::as_str)
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
