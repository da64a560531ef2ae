//! Error types for the page pool and the conversion pipeline.
//!
//! This module provides [`Html2PdfError`], the unified error type for pool
//! acquisition, HTML generation and PDF conversion, and a convenient
//! [`Result`] type alias.
//!
//! The variants follow the stage that failed:
//!
//! | Variant | Stage | Retryable by caller |
//! |---------|-------|---------------------|
//! | [`PoolExhausted`](Html2PdfError::PoolExhausted) | acquisition | yes |
//! | [`PoolError`](Html2PdfError::PoolError) | acquisition | yes, after backoff |
//! | [`GenerationFailed`](Html2PdfError::GenerationFailed) | generation | no |
//! | [`ConversionFailed`](Html2PdfError::ConversionFailed) | conversion | yes |
//! | [`ShuttingDown`](Html2PdfError::ShuttingDown) | any | no |
//! | [`Configuration`](Html2PdfError::Configuration) | any | no |
//!
//! # Example
//!
//! ```rust
//! use html2pdf_pool::{Html2PdfError, Result};
//!
//! fn render() -> Result<Vec<u8>> {
//!     Err(Html2PdfError::Configuration("scale out of range".to_string()))
//! }
//!
//! match render() {
//!     Ok(pdf) => println!("Generated {} bytes", pdf.len()),
//!     Err(e) if e.is_retryable() => println!("Try again later: {}", e),
//!     Err(e) => eprintln!("Error: {}", e),
//! }
//! ```

use std::time::Duration;

use crate::renderer::RendererError;
use crate::template::TemplateError;

/// Errors that can occur while acquiring pages, generating HTML or
/// converting it to PDF.
#[derive(Debug, thiserror::Error)]
pub enum Html2PdfError {
    /// No page became available before the acquire timeout elapsed.
    ///
    /// Every page slot stayed leased for the whole timeout. The caller may
    /// retry; the pool itself is healthy.
    ///
    /// # Example
    ///
    /// ```rust
    /// use html2pdf_pool::Html2PdfError;
    /// use std::time::Duration;
    ///
    /// let error = Html2PdfError::PoolExhausted(Duration::from_secs(30));
    /// assert_eq!(
    ///     error.to_string(),
    ///     "Timeout waiting for an available page after 30s"
    /// );
    /// ```
    #[error("Timeout waiting for an available page after {0:?}")]
    PoolExhausted(Duration),

    /// A page (or the browser process behind it) could not be constructed,
    /// even after the construction retries.
    ///
    /// # Common Causes
    ///
    /// - Chrome/Chromium binary not found and could not be fetched
    /// - Invalid launch flags
    /// - The browser crashed while opening a tab
    #[error("Page pool error: {message}")]
    PoolError {
        /// What the pool was doing when it failed.
        message: String,
        /// Renderer failure that caused it, when there is one.
        #[source]
        source: Option<RendererError>,
    },

    /// The template engine rejected the template or model.
    ///
    /// Template errors are deterministic and never retried.
    #[error("{message}")]
    GenerationFailed {
        /// Human-readable description.
        message: String,
        /// Template engine failure that caused it, when there is one.
        #[source]
        source: Option<TemplateError>,
    },

    /// The renderer failed to load the content or produce the PDF, after the
    /// internal retries for transient failures were spent.
    #[error("Error converting HTML to PDF: {message}")]
    ConversionFailed {
        /// Human-readable description.
        message: String,
        /// Renderer failure that caused it, when there is one.
        #[source]
        source: Option<RendererError>,
    },

    /// Operation attempted during pool shutdown.
    ///
    /// Returned by [`PagePool::acquire`](crate::PagePool::acquire) once
    /// [`shutdown_async`](crate::PagePool::shutdown_async) or
    /// [`shutdown`](crate::PagePool::shutdown) has started, including to
    /// callers that were already waiting for a slot.
    #[error("Pool is shutting down")]
    ShuttingDown,

    /// Invalid pool configuration or conversion options.
    ///
    /// # Example
    ///
    /// ```rust
    /// use html2pdf_pool::Html2PdfError;
    ///
    /// let error = Html2PdfError::Configuration(
    ///     "max_instances must be greater than 0".to_string()
    /// );
    /// println!("{}", error); // "Configuration error: max_instances must be greater than 0"
    /// ```
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl Html2PdfError {
    /// Builds a [`PoolError`](Self::PoolError) with a renderer cause.
    pub fn pool(message: impl Into<String>, source: RendererError) -> Self {
        Self::PoolError {
            message: message.into(),
            source: Some(source),
        }
    }

    /// Builds a [`GenerationFailed`](Self::GenerationFailed) without a cause.
    pub fn generation(message: impl Into<String>) -> Self {
        Self::GenerationFailed {
            message: message.into(),
            source: None,
        }
    }

    /// Builds a [`ConversionFailed`](Self::ConversionFailed) with a renderer cause.
    pub fn conversion(source: RendererError) -> Self {
        Self::ConversionFailed {
            message: source.to_string(),
            source: Some(source),
        }
    }

    /// Whether a caller may reasonably retry the same request later.
    ///
    /// Generation failures, configuration errors and shutdown are permanent
    /// for the given input; everything else depends on pool or renderer load.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::PoolExhausted(_) | Self::PoolError { .. } | Self::ConversionFailed { .. }
        )
    }

    /// Whether this is a renderer failure that a fresh page may not repeat.
    ///
    /// Used by the conversion retry loop; only `ConversionFailed` errors whose
    /// cause is [transient](RendererError::is_transient) qualify.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::ConversionFailed {
                source: Some(source),
                ..
            } => source.is_transient(),
            _ => false,
        }
    }
}

/// Convenience conversion from [`String`] to [`Html2PdfError::Configuration`].
///
/// Lets `?` lift the `String` errors of
/// [`PoolOptionsBuilder::build`](crate::PoolOptionsBuilder::build).
impl From<String> for Html2PdfError {
    fn from(msg: String) -> Self {
        Html2PdfError::Configuration(msg)
    }
}

impl From<&str> for Html2PdfError {
    fn from(msg: &str) -> Self {
        Html2PdfError::Configuration(msg.to_string())
    }
}

/// Result type alias using [`Html2PdfError`].
pub type Result<T> = std::result::Result<T, Html2PdfError>;

// ============================================================================
// Unit Tests
// ============================================================================
