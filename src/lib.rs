//! # html2pdf-pool
//!
//! HTML to PDF conversion over a pool of headless Chrome pages.
//!
//! This crate renders templates, raw HTML and URLs to PDF by leasing pages
//! from a bounded pool that owns one lazily launched headless browser.
//!
//! ## Features
//!
//! - **Bounded Leasing**: A semaphore caps concurrently leased pages; callers
//!   wait up to a timeout instead of spinning
//! - **Lifetime Management**: Expired or closed pages are closed instead of
//!   reused, on release and by a background sweeper
//! - **Lazy Browser**: The browser process starts on first use and is
//!   relaunched when page creation fails
//! - **RAII Pattern**: Pages go back to the pool when their handle drops, on
//!   every exit path
//! - **Transient Retries**: Dropped automation sessions are retried with
//!   exponential backoff on a fresh page
//! - **Uniform Results**: Every service call returns an inspectable
//!   [`Outcome`] instead of an error
//! - **Bounded Shutdown**: Leases are drained with a deadline; the browser is
//!   killed when graceful teardown overruns it
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │              Html2PdfService                │
//! │   generate ─▶ HtmlGenerator (Tera)          │
//! │   convert  ─▶ PdfConverter (retries)        │
//! └─────────────────┬───────────────────────────┘
//!                   │ acquire / release
//!                   ▼
//! ┌─────────────────────────────────────────────┐
//! │                 PagePool                    │
//! │ ┌─────────────────────────────────────────┐ │
//! │ │   Admission gate (max_instances)        │ │
//! │ └─────────────────────────────────────────┘ │
//! │ ┌─────────────────────────────────────────┐ │
//! │ │   Idle pages   [Page1] [Page2]          │ │
//! │ │   Registry     {id → Page}              │ │
//! │ └─────────────────────────────────────────┘ │
//! │ ┌─────────────────────────────────────────┐ │
//! │ │   Sweeper thread (lifetime enforcement) │ │
//! │ └─────────────────────────────────────────┘ │
//! └─────────────────┬───────────────────────────┘
//!                   │
//!                   ▼
//! ┌─────────────────────────────────────────────┐
//! │      One headless Chrome process            │
//! │     (managed by headless_chrome crate)      │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use html2pdf_pool::prelude::*;
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let pool = PagePool::builder()
//!         .options(PoolOptionsBuilder::new().max_instances(4).build()?)
//!         .build()?
//!         .into_shared();
//!     pool.warmup().await?;
//!
//!     let service = Html2PdfService::with_pool(Arc::clone(&pool));
//!     let result = service
//!         .generate_pdf(
//!             "<h1>Invoice {{ number }}</h1>",
//!             &json!({ "number": 42 }),
//!             Some(ConversionOptions::invoice()),
//!             None,
//!         )
//!         .await;
//!
//!     std::fs::write("invoice.pdf", result.into_result()?)?;
//!
//!     pool.shutdown_async().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Environment Configuration
//!
//! When the `env-config` feature is enabled, the pool can be initialized
//! from environment variables (loaded from an `app.env` file or the system
//! environment):
//!
//! ```rust,no_run
//! use html2pdf_pool::init_page_pool;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let pool = init_page_pool().await?;
//!     // pool is Arc<PagePool>, warmed up and ready
//!     pool.shutdown_async().await;
//!     Ok(())
//! }
//! ```
//!
//! ### Environment Variables
//!
//! | Variable | Type | Default | Description |
//! |----------|------|---------|-------------|
//! | `BROWSER_MIN_INSTANCES` | usize | 1 | Pages created by warmup |
//! | `BROWSER_MAX_INSTANCES` | usize | 5 | Concurrent page limit |
//! | `BROWSER_MAX_LIFETIME_MINUTES` | u64 | 60 | Page lifetime |
//! | `BROWSER_ACQUIRE_TIMEOUT_SECONDS` | u64 | 30 | Wait for a free page |
//! | `BROWSER_HEADLESS` | bool | true | Headless mode |
//! | `BROWSER_LAUNCH_ARGS` | String | none | Extra browser flags |
//! | `BROWSER_SWEEP_INTERVAL_SECONDS` | u64 | 300 | Sweep period |
//! | `BROWSER_SHUTDOWN_TIMEOUT_SECONDS` | u64 | 10 | Shutdown budget |
//! | `CHROME_PATH` | String | auto | Custom Chrome binary path |
//!
//! ## Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `env-config` | Environment-based configuration (default) |
//! | `test-utils` | Mock browser factory for testing |
//!
//! ## Testing
//!
//! Enable `test-utils` to run the whole pipeline against an in-memory
//! browser:
//!
//! ```rust,ignore
//! use html2pdf_pool::factory::mock::MockBrowserFactory;
//!
//! let pool = PagePool::builder()
//!     .factory(Box::new(MockBrowserFactory::new()))
//!     .build()?;
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

// ============================================================================
// Module Declarations
// ============================================================================

pub mod config;
pub mod convert;
pub mod error;
pub mod factory;
pub mod generate;
pub mod handle;
pub mod options;
pub mod pool;
pub mod prelude;
pub mod renderer;
pub mod retry;
pub mod service;
pub mod stats;
pub mod template;

pub(crate) mod reaper;
pub(crate) mod tracked;

// ============================================================================
// Public Re-exports
// ============================================================================

pub use config::{PoolOptions, PoolOptionsBuilder};
pub use convert::{Converter, PdfConverter};
pub use error::{Html2PdfError, Result};
pub use factory::{BrowserFactory, ChromeBrowserFactory};
pub use generate::{Generator, HtmlGenerator};
pub use handle::PageHandle;
pub use options::{ColorScheme, ConversionOptions, HeaderFooter, HtmlOptions, PageMargins, PaperFormat};
pub use pool::{PagePool, PagePoolBuilder};
pub use renderer::{RenderPage, RendererError, RendererProcess};
pub use retry::{Backoff, RetryPolicy};
pub use service::{ConversionResult, Failure, GenerationResult, Html2PdfService, Outcome, Stage};
pub use stats::PoolStats;
pub use template::{TemplateEngine, TeraTemplateEngine};

#[cfg(feature = "env-config")]
pub use config::env::{chrome_path_from_env, from_env};

#[cfg(feature = "env-config")]
pub use pool::init_page_pool;

/// A page pool shared between tasks.
pub type SharedPagePool = std::sync::Arc<PagePool>;
