//! Convenient imports for common usage patterns.
//!
//! ```rust,ignore
//! use html2pdf_pool::prelude::*;
//! ```
//!
//! This imports the pool ([`PagePool`], [`PagePoolBuilder`], [`PageHandle`],
//! [`PoolStats`]), its configuration ([`PoolOptions`],
//! [`PoolOptionsBuilder`]), the service and its results
//! ([`Html2PdfService`], [`ConversionResult`], [`Outcome`], [`Failure`]),
//! the per-request options ([`ConversionOptions`], [`HtmlOptions`]) and the
//! error type.
//!
//! # Example
//!
//! ```rust,ignore
//! use html2pdf_pool::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let pool = PagePool::builder().build()?.into_shared();
//!     let service = Html2PdfService::with_pool(Arc::clone(&pool));
//!
//!     let pdf = service
//!         .generate_pdf_from_html("<h1>Hello</h1>", Some(ConversionOptions::a4_standard()))
//!         .await
//!         .into_result()?;
//!
//!     pool.shutdown_async().await;
//!     Ok(())
//! }
//! ```

// Core types
pub use crate::SharedPagePool;
pub use crate::config::{PoolOptions, PoolOptionsBuilder};
pub use crate::error::{Html2PdfError, Result};
pub use crate::factory::{BrowserFactory, ChromeBrowserFactory};
pub use crate::handle::PageHandle;
pub use crate::pool::{PagePool, PagePoolBuilder};
pub use crate::stats::PoolStats;

// Conversion
pub use crate::options::{
    ColorScheme, ConversionOptions, HeaderFooter, HtmlOptions, PageMargins, PaperFormat,
};
pub use crate::service::{ConversionResult, Failure, GenerationResult, Html2PdfService, Outcome, Stage};
pub use crate::template::{TemplateEngine, TeraTemplateEngine};

// Feature-gated exports
#[cfg(feature = "env-config")]
pub use crate::config::env::{chrome_path_from_env, from_env};

#[cfg(feature = "env-config")]
pub use crate::pool::init_page_pool;

// Commonly needed with SharedPagePool
pub use std::sync::Arc;
