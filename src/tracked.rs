//! Tracked page with metadata for pool management.
//!
//! Each page in the pool is wrapped in a [`TrackedPage`] that carries:
//! - **Unique ID**: registry key, and the handle identity in logs
//! - **Creation time**: for lifetime enforcement
//! - **Process generation**: which browser process opened the page
//! - **In-use flag**: claimed atomically so a page is never both leased and
//!   retired by the sweeper
//!
//! ```text
//! TrackedPage
//! ├── id: u64 (unique identifier)
//! ├── page: Arc<dyn RenderPage> (shared ownership)
//! ├── in_use: Arc<AtomicBool> (lease / retirement claim)
//! ├── generation: u64 (owning process)
//! └── created_at: Instant (lifetime calculation)
//! ```
//!
//! Users never see this type; they hold a [`PageHandle`](crate::PageHandle).

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crate::renderer::RenderPage;

/// Monotonic page ID source.
static NEXT_PAGE_ID: AtomicU64 = AtomicU64::new(1);

/// A page plus the metadata the pool needs to manage it.
///
/// Clones share the in-use flag: the idle queue and the registry hold clones
/// of the same tracked page.
#[derive(Clone)]
pub(crate) struct TrackedPage {
    id: u64,
    page: Arc<dyn RenderPage>,
    in_use: Arc<AtomicBool>,
    generation: u64,
    created_at: Instant,
}

impl TrackedPage {
    /// Wraps a page freshly opened in the process of `generation`. The page
    /// starts out unclaimed.
    pub(crate) fn new(page: Arc<dyn RenderPage>, generation: u64) -> Self {
        Self {
            id: NEXT_PAGE_ID.fetch_add(1, Ordering::SeqCst),
            page,
            in_use: Arc::new(AtomicBool::new(false)),
            generation,
            created_at: Instant::now(),
        }
    }

    #[inline]
    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    #[inline]
    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }

    #[inline]
    pub(crate) fn page(&self) -> &Arc<dyn RenderPage> {
        &self.page
    }

    /// Claims the page for a lease or for retirement.
    ///
    /// Returns `false` if someone else already holds the claim.
    #[inline]
    pub(crate) fn try_claim(&self) -> bool {
        self.in_use
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Drops the claim so the page can be handed out again.
    #[inline]
    pub(crate) fn unclaim(&self) {
        self.in_use.store(false, Ordering::Release);
    }

    #[inline]
    pub(crate) fn is_in_use(&self) -> bool {
        self.in_use.load(Ordering::Acquire)
    }

    /// Whether the page outlived `max_lifetime` (strictly older).
    #[inline]
    pub(crate) fn is_expired(&self, max_lifetime: Duration) -> bool {
        self.created_at.elapsed() > max_lifetime
    }

    /// A page is valid while it is open and not expired.
    pub(crate) fn is_valid(&self, max_lifetime: Duration) -> bool {
        !self.page.is_closed() && !self.is_expired(max_lifetime)
    }

    #[inline]
    pub(crate) fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    /// Closes the underlying page, logging instead of failing.
    pub(crate) fn close(&self) {
        match self.page.close() {
            Ok(()) => log::debug!("🗑️ Closed page {}", self.id),
            Err(e) => log::warn!("⚠️ Failed to close page {}: {}", self.id, e),
        }
    }

    #[cfg(test)]
    pub(crate) fn backdated(page: Arc<dyn RenderPage>, age: Duration) -> Self {
        let mut tracked = Self::new(page, 0);
        tracked.created_at = Instant::now()
            .checked_sub(age)
            .unwrap_or_else(Instant::now);
        tracked
    }
}

impl std::fmt::Debug for TrackedPage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackedPage")
            .field("id", &self.id)
            .field("in_use", &self.is_in_use())
            .field("generation", &self.generation)
            .field("age", &self.age())
            .finish()
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factory::mock::MockPage;

    fn page() -> Arc<dyn RenderPage> {
        Arc::new(MockPage::standalone())
    }

    /// Verifies that IDs are unique and increasing.
    #[test]
    fn test_ids_are_unique() {
        let a = TrackedPage::new(page(), 0);
        let b = TrackedPage::new(page(), 0);
        assert!(b.id() > a.id());
    }

    /// Verifies that only one party can hold the claim.
    #[test]
    fn test_claim_is_exclusive_and_shared_by_clones() {
        let tracked = TrackedPage::new(page(), 0);
        let clone = tracked.clone();

        assert!(tracked.try_claim());
        assert!(!clone.try_claim(), "Clones share the in-use flag");
        assert!(clone.is_in_use());

        tracked.unclaim();
        assert!(clone.try_claim());
    }

    /// Verifies lifetime expiry and closed detection.
    #[test]
    #[cfg(not(windows))]
    fn test_validity() {
        let lifetime = Duration::from_secs(100);

        let fresh = TrackedPage::new(page(), 0);
        assert!(fresh.is_valid(lifetime));

        let old = TrackedPage::backdated(page(), Duration::from_secs(101));
        assert!(old.is_expired(lifetime));
        assert!(!old.is_valid(lifetime));

        let closed = TrackedPage::new(page(), 0);
        closed.close();
        assert!(!closed.is_valid(lifetime));
    }
}
