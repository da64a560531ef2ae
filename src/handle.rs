//! RAII lease on a pooled page.
//!
//! This module provides [`PageHandle`], the scoped acquisition of one page:
//! the handle owns both the page and the admission permit it was granted,
//! and gives both back when dropped.
//!
//! # Overview
//!
//! Releasing on drop means the page returns to the pool and the slot frees
//! up even if:
//! - Your code returns early
//! - An error occurs
//! - A panic happens
//!
//! # Usage Pattern
//!
//! ```rust,ignore
//! use std::time::Duration;
//!
//! let page = pool.acquire().await?;
//!
//! // Use it like a RenderPage (via Deref). The calls block, so run them
//! // off the async workers.
//! let pdf = tokio::task::spawn_blocking(move || {
//!     page.set_content("<h1>Hi</h1>", Duration::from_secs(30))?;
//!     page.pdf(&params)
//! })
//! .await??;
//! // `page` was moved into the closure and released when it ended
//! ```

use std::sync::Arc;

use tokio::sync::OwnedSemaphorePermit;

use crate::pool::PagePoolInner;
use crate::renderer::RenderPage;
use crate::tracked::TrackedPage;

/// RAII lease on one page of the pool.
///
/// Dropping the handle (or calling [`release`](Self::release)) returns the
/// page: valid pages go back to the idle queue, invalid ones are closed.
/// Either way the admission slot is freed, because the permit is a field of
/// the handle and is dropped right after the page is returned.
///
/// # Thread Safety
///
/// `PageHandle` is `Send`, so it can be moved into `spawn_blocking`.
pub struct PageHandle {
    /// The tracked page (Option allows taking in Drop).
    tracked: Option<TrackedPage>,

    /// Direct page reference for `Deref`, valid for the handle's life.
    page: Arc<dyn RenderPage>,

    /// Pool state the page is returned to, kept alive even if the
    /// `PagePool` itself was dropped.
    pool: Arc<PagePoolInner>,

    /// Admission slot; released when the handle is dropped. Declared last
    /// so it is dropped after the page has been returned.
    _permit: OwnedSemaphorePermit,
}

impl PageHandle {
    pub(crate) fn new(
        tracked: TrackedPage,
        pool: Arc<PagePoolInner>,
        permit: OwnedSemaphorePermit,
    ) -> Self {
        Self {
            page: Arc::clone(tracked.page()),
            tracked: Some(tracked),
            pool,
            _permit: permit,
        }
    }

    /// Pool-unique ID of the page.
    pub fn id(&self) -> u64 {
        self.tracked.as_ref().map(|t| t.id()).unwrap_or(0)
    }

    /// Time since the page was opened.
    pub fn age(&self) -> std::time::Duration {
        self.tracked
            .as_ref()
            .map(|t| t.age())
            .unwrap_or_default()
    }

    /// Returns the page to the pool now. Equivalent to dropping the handle.
    pub fn release(self) {
        drop(self);
    }

    /// Closes the page instead of returning it, for pages whose session
    /// broke. The slot is freed all the same.
    pub fn discard(mut self) {
        if let Some(tracked) = self.tracked.take() {
            log::debug!("🗑️ PageHandle {} discarded", tracked.id());
            PagePoolInner::retire(&self.pool, tracked);
        }
    }
}

impl std::ops::Deref for PageHandle {
    type Target = dyn RenderPage;

    fn deref(&self) -> &Self::Target {
        self.page.as_ref()
    }
}

impl Drop for PageHandle {
    fn drop(&mut self) {
        if let Some(tracked) = self.tracked.take() {
            log::debug!("♻️ PageHandle {} dropped, returning to pool", tracked.id());
            PagePoolInner::release(&self.pool, tracked);
        }
    }
}

impl std::fmt::Debug for PageHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.tracked {
            Some(tracked) => f
                .debug_struct("PageHandle")
                .field("id", &tracked.id())
                .field("age", &tracked.age())
                .finish(),
            None => f
                .debug_struct("PageHandle")
                .field("state", &"returned")
                .finish(),
        }
    }
}
