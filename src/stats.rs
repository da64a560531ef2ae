//! Pool statistics for monitoring and health checks.
//!
//! This module provides [`PoolStats`], a snapshot of the page pool's
//! current state.
//!
//! # Example
//!
//! ```rust,ignore
//! let stats = pool.stats();
//! println!("Leased: {}/{}, idle: {}", stats.leased, stats.capacity, stats.idle);
//! ```

/// Snapshot of pool statistics at a point in time.
///
/// Values can change immediately after reading if another task acquires or
/// releases a page.
///
/// # Fields
///
/// | Field | Description |
/// |-------|-------------|
/// | `idle` | Pages returned and ready for reuse |
/// | `total` | Every open page (idle + leased) |
/// | `leased` | Admission slots currently held |
/// | `capacity` | `max_instances` |
///
/// # Example
///
/// ```rust
/// use html2pdf_pool::PoolStats;
///
/// let stats = PoolStats { idle: 1, total: 3, leased: 2, capacity: 4 };
/// assert_eq!(stats.free_slots(), 2);
/// assert!(stats.has_idle());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PoolStats {
    /// Pages waiting in the idle queue.
    pub idle: usize,

    /// Open pages tracked by the pool, leased or idle.
    pub total: usize,

    /// Slots currently held by callers.
    ///
    /// A slot is held from the moment the admission gate grants it, so this
    /// can briefly exceed `total - idle` while a new page is being opened.
    pub leased: usize,

    /// Maximum concurrent leases.
    pub capacity: usize,
}

impl PoolStats {
    /// Slots a caller could take right now without waiting.
    #[inline]
    pub fn free_slots(&self) -> usize {
        self.capacity.saturating_sub(self.leased)
    }

    /// Whether an idle page is ready for reuse.
    #[inline]
    pub fn has_idle(&self) -> bool {
        self.idle > 0
    }

    /// Whether every slot is taken.
    #[inline]
    pub fn is_saturated(&self) -> bool {
        self.leased >= self.capacity
    }
}

impl std::fmt::Display for PoolStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "PoolStats {{ idle: {}, total: {}, leased: {}/{} }}",
            self.idle, self.total, self.leased, self.capacity
        )
    }
}
