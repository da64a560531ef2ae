//! Browser process factories.
//!
//! A [`BrowserFactory`] launches the external browser process the pool opens
//! its pages in. The pool calls it lazily, on the first page it needs and
//! again whenever the previous process was discarded after a failure.
//!
//! # Implementations
//!
//! | Factory | Backend | Availability |
//! |---------|---------|--------------|
//! | [`ChromeBrowserFactory`] | headless_chrome | always |
//! | [`mock::MockBrowserFactory`] | in-memory | `test-utils` feature or tests |
//!
//! # Custom Factories
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use html2pdf_pool::factory::BrowserFactory;
//! use html2pdf_pool::renderer::{RendererError, RendererProcess};
//!
//! struct RemoteBrowserFactory { endpoint: String }
//!
//! impl BrowserFactory for RemoteBrowserFactory {
//!     fn launch(&self) -> Result<Arc<dyn RendererProcess>, RendererError> {
//!         // connect to an already running browser
//!         todo!()
//!     }
//! }
//! ```

mod chrome;

#[cfg(any(test, feature = "test-utils"))]
pub mod mock;

pub use chrome::{ChromeBrowserFactory, ChromePage, ChromeProcess};

use std::sync::Arc;

use crate::renderer::{RendererError, RendererProcess};

/// Launches the external browser process.
///
/// # Thread Safety
///
/// Factories are shared with the pool's blocking tasks and must be
/// `Send + Sync`.
pub trait BrowserFactory: Send + Sync {
    /// Starts a browser process, downloading a browser first if the
    /// implementation supports it and none is installed.
    ///
    /// # Errors
    ///
    /// Returns [`RendererError::Launch`] when the process cannot be started.
    fn launch(&self) -> Result<Arc<dyn RendererProcess>, RendererError>;
}
