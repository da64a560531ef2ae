//! Page pool with lifecycle management.
//!
//! This module provides [`PagePool`], the main entry point for leasing
//! headless Chrome pages with bounded concurrency.
//!
//! # Overview
//!
//! The page pool provides:
//! - **Admission Control**: A semaphore sized to `max_instances` bounds the
//!   pages leased at once; waiters suspend until a slot frees or the acquire
//!   timeout elapses
//! - **Lazy Process**: One browser process, launched on the first page
//!   request and relaunched after failures
//! - **Lifetime Management**: Expired or closed pages are closed instead of
//!   reused, on release and by a background sweeper
//! - **RAII Pattern**: Pages return to the pool and slots free up when the
//!   [`PageHandle`] is dropped
//! - **Bounded Shutdown**: Leases are drained with a deadline, and the
//!   browser is killed when graceful teardown overruns it
//!
//! # Architecture
//!
//! ```text
//! PagePool
//!   ├─ PagePoolInner (shared state)
//!   │   ├─ gate: Semaphore  (max_instances permits)
//!   │   ├─ process: Option<RendererProcess>  (lazily launched)
//!   │   ├─ idle: VecDeque<TrackedPage>  (returned, ready to reuse)
//!   │   └─ registry: HashMap<id, TrackedPage>  (every open page)
//!   └─ sweeper: JoinHandle  (background sweep thread)
//! ```
//!
//! # Critical Invariants
//!
//! 1. **Lock Order**: Always acquire `registry` before `idle`
//! 2. **Permit Ownership**: The admission permit lives in the handle, so every
//!    exit path frees the slot exactly once
//! 3. **Claims**: A page is only used or retired by whoever claimed it
//!
//! # Example
//!
//! ```rust,no_run
//! use html2pdf_pool::{PagePool, PoolOptionsBuilder};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let pool = PagePool::builder()
//!         .options(PoolOptionsBuilder::new().max_instances(4).build()?)
//!         .build()?;
//!
//!     pool.warmup().await?;
//!
//!     {
//!         let page = pool.acquire().await?;
//!         // ... render ...
//!     } // page returned to pool automatically
//!
//!     pool.shutdown_async().await;
//!     Ok(())
//! }
//! ```

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError, Weak};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::config::PoolOptions;
use crate::error::{Html2PdfError, Result};
use crate::factory::{BrowserFactory, ChromeBrowserFactory};
use crate::handle::PageHandle;
use crate::reaper;
use crate::renderer::{RendererError, RendererProcess};
use crate::stats::PoolStats;
use crate::tracked::TrackedPage;

/// Interval at which shutdown re-checks outstanding leases.
const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Locks a mutex, recovering the data if a holder panicked.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ============================================================================
// PagePoolInner
// ============================================================================

/// Internal shared state for the page pool.
///
/// Shared through `Arc` by the pool, every [`PageHandle`] and the sweeper
/// thread, so a handle can still return its page after the pool is gone.
///
/// # Lock Ordering (CRITICAL)
///
/// Always acquire locks in this order to prevent deadlocks:
/// 1. `registry` (every open page)
/// 2. `idle` (pages ready for reuse)
///
/// `process` is only held while launching and is never held together with
/// the other two.
pub(crate) struct PagePoolInner {
    /// Options (immutable after creation).
    options: PoolOptions,

    /// Launches the browser process.
    factory: Box<dyn BrowserFactory>,

    /// The current browser process, launched on demand.
    process: Mutex<Option<Arc<dyn RendererProcess>>>,

    /// Bumped whenever the current process is dropped. Pages opened under
    /// an older generation belong to a dead or discarded browser.
    generation: AtomicU64,

    /// Every process ever launched, for forced shutdown. Weak so that
    /// discarded processes still die once their last page closes.
    launched: Mutex<Vec<Weak<dyn RendererProcess>>>,

    /// Returned pages, oldest first.
    idle: Mutex<VecDeque<TrackedPage>>,

    /// Every open page, leased or idle.
    registry: Mutex<HashMap<u64, TrackedPage>>,

    /// Admission gate sized to `max_instances`.
    gate: Arc<Semaphore>,

    /// Set once shutdown starts.
    shutting_down: AtomicBool,

    /// Captured at creation so pages can be closed off-thread from `Drop`.
    runtime_handle: tokio::runtime::Handle,

    /// Wakes the sweeper immediately on shutdown.
    shutdown_signal: Arc<(Mutex<bool>, Condvar)>,
}

impl PagePoolInner {
    /// Create the shared state.
    ///
    /// # Errors
    ///
    /// Returns [`Html2PdfError::Configuration`] when called outside a tokio
    /// runtime.
    pub(crate) fn new(options: PoolOptions, factory: Box<dyn BrowserFactory>) -> Result<Arc<Self>> {
        let runtime_handle = tokio::runtime::Handle::try_current().map_err(|_| {
            Html2PdfError::Configuration(
                "PagePool must be built inside a tokio runtime".to_string(),
            )
        })?;

        log::info!(
            "🚀 Initializing page pool with {} slots (lifetime: {}min)",
            options.max_instances,
            options.max_lifetime.as_secs() / 60
        );

        Ok(Arc::new(Self {
            gate: Arc::new(Semaphore::new(options.max_instances)),
            options,
            factory,
            process: Mutex::new(None),
            generation: AtomicU64::new(0),
            launched: Mutex::new(Vec::new()),
            idle: Mutex::new(VecDeque::new()),
            registry: Mutex::new(HashMap::new()),
            shutting_down: AtomicBool::new(false),
            runtime_handle,
            shutdown_signal: Arc::new((Mutex::new(false), Condvar::new())),
        }))
    }

    /// Returns the running process and its generation, launching one if
    /// there is none or the current one lost its connection.
    fn ensure_process(
        &self,
    ) -> std::result::Result<(Arc<dyn RendererProcess>, u64), RendererError> {
        let mut slot = lock(&self.process);

        if let Some(process) = slot.as_ref() {
            if process.is_connected() {
                return Ok((Arc::clone(process), self.generation.load(Ordering::Acquire)));
            }
            log::warn!("⚠️ Browser process lost its connection, relaunching");
            *slot = None;
            self.generation.fetch_add(1, Ordering::AcqRel);
        }

        log::info!("🚀 Launching browser process...");
        let process = self.factory.launch()?;
        match process.process_id() {
            Some(pid) => log::info!("✅ Browser process launched (pid {})", pid),
            None => log::info!("✅ Browser process launched"),
        }

        lock(&self.launched).push(Arc::downgrade(&process));
        *slot = Some(Arc::clone(&process));
        Ok((process, self.generation.load(Ordering::Acquire)))
    }

    /// Drops the pool's reference to the current process.
    fn discard_process(&self) {
        let mut slot = lock(&self.process);
        if slot.take().is_some() {
            self.generation.fetch_add(1, Ordering::AcqRel);
            log::debug!("🗑️ Discarded browser process reference");
        }
    }

    /// Drops the current process if it stopped answering, which marks
    /// every page opened in it as stale.
    fn check_process(&self) {
        let mut slot = lock(&self.process);
        if slot.as_ref().is_some_and(|process| !process.is_connected()) {
            log::warn!("⚠️ Browser process lost its connection, retiring its pages");
            *slot = None;
            self.generation.fetch_add(1, Ordering::AcqRel);
        }
    }

    /// Whether a page may be handed out again: open, not expired and opened
    /// in the current process.
    fn is_usable(&self, tracked: &TrackedPage) -> bool {
        tracked.generation() == self.generation.load(Ordering::Acquire)
            && tracked.is_valid(self.options.max_lifetime)
    }

    /// Open one page, retrying with the creation policy.
    ///
    /// Each failed attempt discards the process so the next one relaunches.
    /// The new page is registered but not queued as idle.
    fn create_page(&self) -> Result<TrackedPage> {
        let mut delays = self.options.creation_retry.delays();
        let mut attempt = 1;

        loop {
            if self.is_shutting_down() {
                return Err(Html2PdfError::ShuttingDown);
            }

            let opened = self
                .ensure_process()
                .and_then(|(process, generation)| Ok((process.new_page()?, generation)));
            match opened {
                Ok((page, generation)) => {
                    let tracked = TrackedPage::new(page, generation);
                    let total = {
                        let mut registry = lock(&self.registry);
                        registry.insert(tracked.id(), tracked.clone());
                        registry.len()
                    };
                    log::info!("✅ Created page {} (open pages: {})", tracked.id(), total);
                    return Ok(tracked);
                }
                Err(e) => {
                    self.discard_process();
                    match delays.next() {
                        Some(delay) => {
                            log::warn!(
                                "⚠️ Page creation attempt {} failed: {} (retrying in {}ms)",
                                attempt,
                                e,
                                delay.as_millis()
                            );
                            thread::sleep(delay);
                            attempt += 1;
                        }
                        None => {
                            log::error!(
                                "❌ Page creation failed after {} attempts: {}",
                                attempt,
                                e
                            );
                            return Err(Html2PdfError::pool(
                                format!("Failed to create page after {} attempts", attempt),
                                e,
                            ));
                        }
                    }
                }
            }
        }
    }

    /// Hand out a page under an already granted permit (blocking).
    ///
    /// Reuses the most recently returned valid page, retiring invalid ones
    /// on the way, and opens a new page when none is left. On error the
    /// permit is dropped here, freeing the slot.
    pub(crate) fn checkout(self: &Arc<Self>, permit: OwnedSemaphorePermit) -> Result<PageHandle> {
        if !lock(&self.idle).is_empty() {
            self.check_process();
        }

        loop {
            if self.is_shutting_down() {
                return Err(Html2PdfError::ShuttingDown);
            }

            let Some(tracked) = lock(&self.idle).pop_back() else {
                break;
            };

            // The sweeper claimed it first and is retiring it.
            if !tracked.try_claim() {
                continue;
            }

            if self.is_usable(&tracked) {
                log::debug!(
                    "♻️ Reusing page {} (age: {}s)",
                    tracked.id(),
                    tracked.age().as_secs()
                );
                return Ok(PageHandle::new(tracked, Arc::clone(self), permit));
            }

            log::info!(
                "⏰ Page {} is closed, expired or stale (age: {}s), retiring",
                tracked.id(),
                tracked.age().as_secs()
            );
            self.forget(tracked.id());
            tracked.close();
        }

        let tracked = self.create_page()?;
        tracked.try_claim();
        Ok(PageHandle::new(tracked, Arc::clone(self), permit))
    }

    /// Return a page (called by `PageHandle::drop`).
    ///
    /// Usable pages go back to the idle queue; the rest, and every page
    /// once shutdown started, are unregistered and closed on the blocking
    /// pool. Never blocks on the renderer.
    pub(crate) fn release(self_arc: &Arc<Self>, tracked: TrackedPage) {
        let id = tracked.id();

        if self_arc.is_shutting_down() || !self_arc.is_usable(&tracked) {
            Self::retire(self_arc, tracked);
            return;
        }

        let registry = lock(&self_arc.registry);
        let mut idle = lock(&self_arc.idle);

        if !registry.contains_key(&id) {
            log::warn!("❌ Page {} is no longer registered, closing it", id);
            drop((idle, registry));
            self_arc.close_detached(tracked);
            return;
        }
        if idle.iter().any(|t| t.id() == id) {
            log::warn!("⚠️ Page {} already idle (duplicate return), skipping", id);
            return;
        }

        tracked.unclaim();
        idle.push_back(tracked);
        log::debug!(
            "♻️ Page {} returned to pool (idle: {}/{})",
            id,
            idle.len(),
            registry.len()
        );
    }

    /// Unregister a leased page and close it off-thread.
    pub(crate) fn retire(self_arc: &Arc<Self>, tracked: TrackedPage) {
        log::debug!("🗑️ Retiring page {}", tracked.id());
        self_arc.forget(tracked.id());
        self_arc.close_detached(tracked);
    }

    /// Unregister a page from both collections.
    fn forget(&self, id: u64) {
        let mut registry = lock(&self.registry);
        let mut idle = lock(&self.idle);
        registry.remove(&id);
        idle.retain(|t| t.id() != id);
    }

    /// Close a page without blocking the caller.
    fn close_detached(&self, tracked: TrackedPage) {
        drop(self.runtime_handle.spawn_blocking(move || tracked.close()));
    }

    /// One sweep pass: retire idle pages that are closed, expired or left
    /// over from a dead process.
    ///
    /// Pages claimed by a concurrent checkout are left to it.
    pub(crate) fn sweep(&self) -> usize {
        if !self.is_shutting_down() {
            self.check_process();
        }
        let snapshot: Vec<TrackedPage> = lock(&self.idle).iter().cloned().collect();
        let mut retired = 0;

        for tracked in snapshot {
            if self.is_shutting_down() {
                break;
            }
            if self.is_usable(&tracked) || !tracked.try_claim() {
                continue;
            }
            log::info!(
                "⏰ Sweeping page {} (age: {}s, closed: {})",
                tracked.id(),
                tracked.age().as_secs(),
                tracked.page().is_closed()
            );
            self.forget(tracked.id());
            tracked.close();
            retired += 1;
        }

        if retired > 0 {
            log::info!("🗑️ Sweep retired {} page(s)", retired);
        }
        retired
    }

    /// Mark shutdown, wake the sweeper and close the admission gate.
    fn begin_shutdown(&self) {
        self.shutting_down.store(true, Ordering::Release);

        let (flag, cvar) = &*self.shutdown_signal;
        *lock(flag) = true;
        cvar.notify_all();

        self.gate.close();
    }

    /// Close every page, then the process (blocking).
    fn teardown(&self) {
        let pages: Vec<TrackedPage> = {
            let mut registry = lock(&self.registry);
            let mut idle = lock(&self.idle);
            idle.clear();
            registry.drain().map(|(_, tracked)| tracked).collect()
        };

        log::info!("🗑️ Closing {} page(s)...", pages.len());
        for tracked in pages {
            tracked.close();
        }

        let process = lock(&self.process).clone();
        if let Some(process) = process {
            match process.close() {
                Ok(()) => log::info!("✅ Browser process closed"),
                Err(e) => log::warn!("⚠️ Failed to close browser process: {}", e),
            }
        }
        self.discard_process();
    }

    /// Last resort: kill every launched process still alive, then any
    /// orphaned process matching `process_name`.
    fn force_kill(&self) {
        let alive: Vec<Arc<dyn RendererProcess>> = lock(&self.launched)
            .iter()
            .filter_map(Weak::upgrade)
            .collect();

        let roots: Vec<u32> = alive.iter().filter_map(|p| p.process_id()).collect();
        for process in &alive {
            process.kill();
        }
        log::warn!("🔪 Force-killed {} browser process(es)", alive.len());

        if let Some(name) = self.options.process_name.as_deref() {
            let orphans = reaper::kill_orphans(name, &roots);
            if orphans > 0 {
                log::warn!("🔪 Killed {} orphaned '{}' process(es)", orphans, name);
            }
        }
    }

    /// Slots currently leased.
    fn leased(&self) -> usize {
        self.options
            .max_instances
            .saturating_sub(self.gate.available_permits())
    }

    pub(crate) fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::Acquire)
    }

    pub(crate) fn stats(&self) -> PoolStats {
        let registry = lock(&self.registry);
        let idle = lock(&self.idle);
        PoolStats {
            idle: idle.len(),
            total: registry.len(),
            leased: self.leased(),
            capacity: self.options.max_instances,
        }
    }
}

// ============================================================================
// PagePool
// ============================================================================

/// Pool of headless browser pages.
///
/// All methods take `&self`; share the pool as `Arc<PagePool>`.
///
/// # Example
///
/// ```rust,no_run
/// use html2pdf_pool::PagePool;
///
/// # async fn example() -> html2pdf_pool::Result<()> {
/// let pool = PagePool::builder().build()?;
/// let page = pool.acquire().await?;
/// println!("Leased page {}", page.id());
/// drop(page);
/// pool.shutdown_async().await;
/// # Ok(())
/// # }
/// ```
pub struct PagePool {
    inner: Arc<PagePoolInner>,

    /// Background sweep thread, taken on shutdown.
    sweeper: Mutex<Option<JoinHandle<()>>>,

    /// Set by the first shutdown call.
    shut_down: AtomicBool,
}

impl PagePool {
    /// Create a builder.
    pub fn builder() -> PagePoolBuilder {
        PagePoolBuilder::new()
    }

    /// Wrap the pool for sharing between tasks.
    pub fn into_shared(self) -> Arc<PagePool> {
        Arc::new(self)
    }

    /// The options the pool was built with.
    pub fn options(&self) -> &PoolOptions {
        &self.inner.options
    }

    /// Lease a page.
    ///
    /// Waits up to `acquire_timeout` for a free slot, then reuses an idle
    /// page or opens a new one (launching the browser if needed).
    ///
    /// # Errors
    ///
    /// - [`Html2PdfError::PoolExhausted`] if no slot freed up in time.
    /// - [`Html2PdfError::ShuttingDown`] once shutdown has started.
    /// - [`Html2PdfError::PoolError`] if the page could not be created
    ///   after the creation retries; the slot is released.
    pub async fn acquire(&self) -> Result<PageHandle> {
        if self.inner.is_shutting_down() {
            return Err(Html2PdfError::ShuttingDown);
        }

        let timeout = self.inner.options.acquire_timeout;
        let gate = Arc::clone(&self.inner.gate);
        let permit = match tokio::time::timeout(timeout, gate.acquire_owned()).await {
            Ok(Ok(permit)) => permit,
            Ok(Err(_)) => return Err(Html2PdfError::ShuttingDown),
            Err(_) => {
                log::warn!(
                    "⏰ No page available after {}s (leased: {}/{})",
                    timeout.as_secs(),
                    self.inner.leased(),
                    self.inner.options.max_instances
                );
                return Err(Html2PdfError::PoolExhausted(timeout));
            }
        };

        // The permit moves into the blocking task; if this future is dropped
        // the handle built there is dropped too and returns the page.
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || inner.checkout(permit))
            .await
            .map_err(|e| Html2PdfError::PoolError {
                message: format!("Page checkout task failed: {}", e),
                source: None,
            })?
    }

    /// Pre-create `min_instances` pages.
    ///
    /// Leases that many pages at once so distinct pages are opened, then
    /// returns them all to the idle queue.
    ///
    /// # Errors
    ///
    /// Propagates the first acquire failure.
    pub async fn warmup(&self) -> Result<()> {
        let count = self.inner.options.min_instances;
        log::info!("🔥 Warming up pool with {} page(s)...", count);
        let start = Instant::now();

        let mut handles = Vec::with_capacity(count);
        for _ in 0..count {
            handles.push(self.acquire().await?);
        }
        drop(handles);

        log::info!(
            "✅ Warmup completed in {:.2}s ({} page(s) ready)",
            start.elapsed().as_secs_f64(),
            self.stats().idle
        );
        Ok(())
    }

    /// Run one sweep pass now. Returns the number of pages retired.
    ///
    /// The background sweeper calls this every `sweep_interval`.
    pub fn sweep(&self) -> usize {
        self.inner.sweep()
    }

    /// Current pool statistics.
    pub fn stats(&self) -> PoolStats {
        self.inner.stats()
    }

    /// Whether shutdown has started.
    pub fn is_shutting_down(&self) -> bool {
        self.inner.is_shutting_down()
    }

    /// Start the background sweep thread.
    ///
    /// Waits on the shutdown condvar with `sweep_interval` as timeout, so
    /// shutdown wakes it immediately.
    fn start_sweeper(inner: Arc<PagePoolInner>) -> JoinHandle<()> {
        let interval = inner.options.sweep_interval;
        let shutdown_signal = Arc::clone(&inner.shutdown_signal);

        log::info!("🔧 Starting sweeper thread (interval: {}s)", interval.as_secs());

        thread::spawn(move || {
            let (flag, cvar) = &*shutdown_signal;
            loop {
                let (stop, wait) = cvar
                    .wait_timeout(lock(flag), interval)
                    .unwrap_or_else(PoisonError::into_inner);

                if *stop || inner.is_shutting_down() {
                    log::debug!("Sweeper received shutdown signal");
                    break;
                }
                drop(stop);

                if !wait.timed_out() {
                    continue;
                }

                log::trace!("Sweep cycle starting...");
                inner.sweep();
            }
            log::info!("Sweeper thread exiting");
        })
    }

    fn take_sweeper(&self) -> Option<JoinHandle<()>> {
        lock(&self.sweeper).take()
    }

    /// Shut down the pool.
    ///
    /// # Shutdown Process
    ///
    /// 1. Set the shutdown flag and close the admission gate (waiters get
    ///    [`Html2PdfError::ShuttingDown`])
    /// 2. Wake and join the sweeper thread
    /// 3. Wait up to `shutdown_timeout` for leased pages to come back
    /// 4. Close every page and the browser within `shutdown_timeout`
    /// 5. On overrun, kill the browser and orphaned browser processes
    ///
    /// Safe to call more than once; later calls return immediately.
    pub async fn shutdown_async(&self) {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            log::debug!("Pool already shut down, ignoring");
            return;
        }
        log::info!("Shutting down page pool (async mode)...");

        self.inner.begin_shutdown();
        let budget = self.inner.options.shutdown_timeout;

        if let Some(handle) = self.take_sweeper() {
            let join = tokio::task::spawn_blocking(move || handle.join());
            match tokio::time::timeout(budget, join).await {
                Ok(Ok(Ok(()))) => log::debug!("Sweeper thread stopped cleanly"),
                Ok(Ok(Err(_))) => log::error!("❌ Sweeper thread panicked"),
                Ok(Err(_)) => log::error!("❌ Sweeper join task panicked"),
                Err(_) => log::error!("❌ Sweeper thread didn't exit within {}s", budget.as_secs()),
            }
        }

        let deadline = Instant::now() + budget;
        while self.inner.leased() > 0 && Instant::now() < deadline {
            tokio::time::sleep(DRAIN_POLL_INTERVAL).await;
        }
        let outstanding = self.inner.leased();
        if outstanding > 0 {
            log::warn!("⚠️ {} page(s) still leased at shutdown", outstanding);
        }

        let inner = Arc::clone(&self.inner);
        let teardown = tokio::task::spawn_blocking(move || inner.teardown());
        match tokio::time::timeout(budget, teardown).await {
            Ok(Ok(())) => log::info!("✅ Page pool shut down"),
            Ok(Err(e)) => {
                log::error!("❌ Teardown task failed: {}", e);
                self.inner.force_kill();
            }
            Err(_) => {
                log::warn!(
                    "⏰ Graceful teardown exceeded {}s, forcing",
                    budget.as_secs()
                );
                self.inner.force_kill();
            }
        }
    }

    /// Shut down the pool without an async context (used by `Drop`).
    ///
    /// Does not drain leases; pages still leased are closed when their
    /// handles drop. Prefer [`shutdown_async`](Self::shutdown_async).
    pub fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return;
        }
        log::info!("Shutting down page pool (sync mode)...");

        self.inner.begin_shutdown();

        if let Some(handle) = self.take_sweeper() {
            if handle.join().is_err() {
                log::error!("❌ Sweeper thread panicked");
            }
        }

        let budget = self.inner.options.shutdown_timeout;
        let (done_tx, done_rx) = std::sync::mpsc::channel();
        let inner = Arc::clone(&self.inner);
        thread::spawn(move || {
            inner.teardown();
            let _ = done_tx.send(());
        });

        match done_rx.recv_timeout(budget) {
            Ok(()) => log::info!("✅ Page pool shut down"),
            Err(_) => {
                log::warn!(
                    "⏰ Graceful teardown exceeded {}s, forcing",
                    budget.as_secs()
                );
                self.inner.force_kill();
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn inner(&self) -> &Arc<PagePoolInner> {
        &self.inner
    }
}

impl Drop for PagePool {
    fn drop(&mut self) {
        if !self.shut_down.load(Ordering::Acquire) {
            log::warn!("PagePool dropped without explicit shutdown, cleaning up");
            self.shutdown();
        }
    }
}

impl std::fmt::Debug for PagePool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PagePool")
            .field("stats", &self.stats())
            .field("shutting_down", &self.is_shutting_down())
            .finish()
    }
}

// ============================================================================
// PagePoolBuilder
// ============================================================================

/// Builder for [`PagePool`].
///
/// # Example
///
/// ```rust,ignore
/// use html2pdf_pool::{PagePool, PoolOptionsBuilder};
/// use html2pdf_pool::factory::mock::MockBrowserFactory;
///
/// let pool = PagePool::builder()
///     .options(PoolOptionsBuilder::new().max_instances(2).build()?)
///     .factory(Box::new(MockBrowserFactory::new()))
///     .enable_sweeper(false)
///     .build()?;
/// ```
pub struct PagePoolBuilder {
    options: Option<PoolOptions>,
    factory: Option<Box<dyn BrowserFactory>>,
    enable_sweeper: bool,
}

impl PagePoolBuilder {
    /// Create a builder with default options, the Chrome factory and the
    /// sweeper enabled.
    pub fn new() -> Self {
        Self {
            options: None,
            factory: None,
            enable_sweeper: true,
        }
    }

    /// Set the pool options.
    pub fn options(mut self, options: PoolOptions) -> Self {
        self.options = Some(options);
        self
    }

    /// Set the browser factory.
    ///
    /// Defaults to [`ChromeBrowserFactory::from_options`].
    pub fn factory(mut self, factory: Box<dyn BrowserFactory>) -> Self {
        self.factory = Some(factory);
        self
    }

    /// Enable or disable the background sweeper (default: enabled).
    ///
    /// Disabling is mostly useful in tests, which call
    /// [`PagePool::sweep`] directly.
    pub fn enable_sweeper(mut self, enable: bool) -> Self {
        self.enable_sweeper = enable;
        self
    }

    /// Build the pool.
    ///
    /// Nothing is launched yet; the browser starts on the first acquire or
    /// on [`PagePool::warmup`].
    ///
    /// # Errors
    ///
    /// Returns [`Html2PdfError::Configuration`] when called outside a tokio
    /// runtime.
    pub fn build(self) -> Result<PagePool> {
        let options = self.options.unwrap_or_default();
        let factory = self
            .factory
            .unwrap_or_else(|| Box::new(ChromeBrowserFactory::from_options(&options)));

        let inner = PagePoolInner::new(options, factory)?;

        let sweeper = if self.enable_sweeper {
            Some(PagePool::start_sweeper(Arc::clone(&inner)))
        } else {
            log::info!("Sweeper disabled");
            None
        };

        log::info!("✅ Page pool built");

        Ok(PagePool {
            inner,
            sweeper: Mutex::new(sweeper),
            shut_down: AtomicBool::new(false),
        })
    }
}

impl Default for PagePoolBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Environment Initialization (feature-gated)
// ============================================================================

/// Build and warm up a page pool from environment variables.
///
/// Reads the variables documented in [`config::env`](crate::config::env)
/// (and `app.env`), builds a pool with the Chrome factory and runs
/// [`PagePool::warmup`].
///
/// # Errors
///
/// - Returns error if configuration is invalid.
/// - Returns error if warmup fails.
///
/// # Example
///
/// ```rust,ignore
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     env_logger::init();
///     let pool = init_page_pool().await?;
///     // hand the pool to a PdfConverter...
///     Ok(())
/// }
/// ```
#[cfg(feature = "env-config")]
pub async fn init_page_pool() -> Result<Arc<PagePool>> {
    use crate::config::env::from_env;

    log::info!("Initializing page pool from environment...");

    let options = from_env()?;
    let factory = ChromeBrowserFactory::from_options(&options);

    let pool = PagePool::builder()
        .options(options)
        .factory(Box::new(factory))
        .enable_sweeper(true)
        .build()
        .map_err(|e| {
            log::error!("❌ Failed to create page pool: {}", e);
            e
        })?;

    pool.warmup().await.map_err(|e| {
        log::error!("❌ Failed to warm up pool: {}", e);
        e
    })?;

    let stats = pool.stats();
    log::info!(
        "✅ Page pool ready - Idle: {}, Total: {}, Capacity: {}",
        stats.idle,
        stats.total,
        stats.capacity
    );

    Ok(pool.into_shared())
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PoolOptionsBuilder;
    use crate::factory::mock::MockBrowserFactory;
    use crate::retry::RetryPolicy;

    fn options(max: usize) -> PoolOptions {
        PoolOptionsBuilder::new()
            .max_instances(max)
            .acquire_timeout(Duration::from_secs(1))
            .creation_retry(RetryPolicy::linear(2, Duration::from_millis(10)))
            .shutdown_timeout(Duration::from_secs(2))
            .process_name(None)
            .build()
            .unwrap()
    }

    fn pool_with(factory: MockBrowserFactory, options: PoolOptions) -> PagePool {
        PagePool::builder()
            .options(options)
            .factory(Box::new(factory))
            .enable_sweeper(false)
            .build()
            .unwrap()
    }

    /// Verifies the builder defaults.
    #[test]
    fn test_builder_default() {
        let builder: PagePoolBuilder = Default::default();
        assert!(builder.options.is_none());
        assert!(builder.factory.is_none());
        assert!(builder.enable_sweeper);
    }

    /// Verifies that building outside a runtime is a configuration error.
    #[test]
    fn test_build_requires_runtime() {
        let result = PagePool::builder()
            .factory(Box::new(MockBrowserFactory::new()))
            .build();

        match result {
            Err(Html2PdfError::Configuration(msg)) => {
                assert!(msg.contains("tokio runtime"), "got: {}", msg)
            }
            other => panic!("Expected Configuration error, got {:?}", other.map(|_| ())),
        }
    }

    /// Verifies that the browser is launched lazily and only once.
    #[tokio::test]
    async fn test_process_launched_lazily() {
        let factory = MockBrowserFactory::new();
        let stats = factory.stats();
        let pool = pool_with(factory, options(3));

        assert_eq!(stats.launches(), 0);

        let a = pool.acquire().await.unwrap();
        let b = pool.acquire().await.unwrap();
        assert_eq!(stats.launches(), 1);
        assert_eq!(stats.pages_created(), 2);
        assert_ne!(a.id(), b.id());

        drop((a, b));
        pool.shutdown_async().await;
    }

    /// Verifies that a released page is reused by the next acquire.
    #[tokio::test]
    async fn test_released_page_is_reused() {
        let factory = MockBrowserFactory::new();
        let stats = factory.stats();
        let pool = pool_with(factory, options(2));

        let first = pool.acquire().await.unwrap();
        let id = first.id();
        first.release();

        let second = pool.acquire().await.unwrap();
        assert_eq!(second.id(), id);
        assert_eq!(stats.pages_created(), 1);

        drop(second);
        pool.shutdown_async().await;
    }

    /// Verifies stats while pages are leased and after they return.
    #[tokio::test]
    async fn test_stats_track_leases() {
        let pool = pool_with(MockBrowserFactory::new(), options(3));

        let a = pool.acquire().await.unwrap();
        let b = pool.acquire().await.unwrap();
        let stats = pool.stats();
        assert_eq!(stats.leased, 2);
        assert_eq!(stats.total, 2);
        assert_eq!(stats.idle, 0);
        assert_eq!(stats.capacity, 3);

        drop((a, b));
        let stats = pool.stats();
        assert_eq!(stats.leased, 0);
        assert_eq!(stats.idle, 2);

        pool.shutdown_async().await;
    }

    /// Verifies that construction failures are retried, then surface as
    /// PoolError and free the slot.
    #[tokio::test]
    async fn test_creation_failure_releases_slot() {
        let factory = MockBrowserFactory::always_fails("no chrome here");
        let stats = factory.stats();
        let pool = pool_with(factory, options(1));

        match pool.acquire().await {
            Err(Html2PdfError::PoolError { message, source }) => {
                assert!(message.contains("3 attempts"), "got: {}", message);
                assert!(source.is_some());
            }
            other => panic!("Expected PoolError, got {:?}", other.map(|h| h.id())),
        }
        assert_eq!(stats.launches(), 3, "One attempt plus two retries");
        assert_eq!(pool.stats().leased, 0);

        pool.shutdown_async().await;
    }

    /// Verifies that a relaunch after a failed launch recovers.
    #[tokio::test]
    async fn test_creation_retry_recovers() {
        let factory = MockBrowserFactory::new().with_failing_launches(2);
        let stats = factory.stats();
        let pool = pool_with(factory, options(1));

        let handle = pool.acquire().await.unwrap();
        assert_eq!(stats.launches(), 3);

        drop(handle);
        pool.shutdown_async().await;
    }

    /// Verifies that a failing page discards the process reference.
    #[tokio::test]
    async fn test_page_failure_relaunches_process() {
        let factory = MockBrowserFactory::new().with_failing_pages(1);
        let stats = factory.stats();
        let pool = pool_with(factory, options(1));

        let handle = pool.acquire().await.unwrap();
        assert_eq!(stats.launches(), 2);

        drop(handle);
        pool.shutdown_async().await;
    }

    /// Verifies that the sweeper pass retires expired idle pages only.
    #[tokio::test]
    async fn test_sweep_retires_expired_pages() {
        let factory = MockBrowserFactory::new();
        let stats = factory.stats();
        let options = PoolOptionsBuilder::new()
            .max_instances(2)
            .max_lifetime(Duration::from_millis(100))
            .process_name(None)
            .build()
            .unwrap();
        let pool = pool_with(factory, options);

        let handle = pool.acquire().await.unwrap();
        let leased = pool.acquire().await.unwrap();
        drop(handle);
        assert_eq!(pool.sweep(), 0, "Fresh pages stay");

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(pool.sweep(), 1, "Only the idle expired page is swept");
        assert_eq!(pool.stats().idle, 0);
        assert_eq!(pool.stats().total, 1);
        assert_eq!(stats.pages_closed(), 1);

        drop(leased);
        pool.shutdown_async().await;
    }

    /// Verifies that a page claimed by checkout is skipped by the sweeper.
    #[tokio::test]
    async fn test_sweep_skips_claimed_pages() {
        let pool = pool_with(MockBrowserFactory::new(), options(1));
        let handle = pool.acquire().await.unwrap();
        drop(handle);

        let tracked = lock(&pool.inner().idle).front().cloned().unwrap();
        assert!(tracked.try_claim());
        tracked.page().close().unwrap();

        assert_eq!(pool.sweep(), 0);
        tracked.unclaim();
        assert_eq!(pool.sweep(), 1);

        pool.shutdown_async().await;
    }

    /// Verifies that idle pages of a crashed browser are retired instead of
    /// reused, and that the next acquire relaunches.
    #[tokio::test]
    async fn test_crashed_process_pages_are_not_reused() {
        let factory = MockBrowserFactory::new().with_detached_pages();
        let stats = factory.stats();
        let pool = pool_with(factory, options(2));

        let a = pool.acquire().await.unwrap();
        let b = pool.acquire().await.unwrap();
        let stale = [a.id(), b.id()];
        drop((a, b));
        assert_eq!(pool.stats().idle, 2);

        stats.crash();

        let fresh = pool.acquire().await.unwrap();
        assert!(!stale.contains(&fresh.id()));
        assert_eq!(stats.launches(), 2);
        assert_eq!(pool.stats().total, 1);

        drop(fresh);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(stats.pages_closed(), 2);

        pool.shutdown_async().await;
    }

    /// Verifies that the sweep pass retires idle pages of a crashed browser.
    #[tokio::test]
    async fn test_sweep_retires_pages_of_crashed_process() {
        let factory = MockBrowserFactory::new().with_detached_pages();
        let stats = factory.stats();
        let pool = pool_with(factory, options(1));
        drop(pool.acquire().await.unwrap());

        assert_eq!(pool.sweep(), 0);
        stats.crash();
        assert_eq!(pool.sweep(), 1);
        assert_eq!(pool.stats().total, 0);
        assert_eq!(stats.pages_closed(), 1);

        pool.shutdown_async().await;
    }

    /// Verifies that a page returned after being unregistered is still
    /// closed.
    #[tokio::test]
    async fn test_unregistered_release_closes_page() {
        let factory = MockBrowserFactory::new();
        let stats = factory.stats();
        let pool = pool_with(factory, options(1));

        let handle = pool.acquire().await.unwrap();
        pool.inner().forget(handle.id());
        drop(handle);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(stats.pages_closed(), 1);
        assert_eq!(pool.stats().leased, 0);
        assert_eq!(pool.stats().total, 0);

        pool.shutdown_async().await;
    }

    /// Verifies that shutdown is idempotent and rejects new acquires.
    #[tokio::test]
    async fn test_shutdown_idempotent() {
        let factory = MockBrowserFactory::new();
        let stats = factory.stats();
        let pool = pool_with(factory, options(2));
        drop(pool.acquire().await.unwrap());

        pool.shutdown_async().await;
        pool.shutdown_async().await;
        pool.shutdown();

        assert!(pool.is_shutting_down());
        assert!(matches!(pool.acquire().await, Err(Html2PdfError::ShuttingDown)));
        assert_eq!(stats.processes_closed(), 1);
        assert_eq!(pool.stats().total, 0);
    }

    /// Verifies that dropping the pool shuts it down.
    #[tokio::test(flavor = "multi_thread")]
    async fn test_drop_shuts_down() {
        let factory = MockBrowserFactory::new();
        let stats = factory.stats();
        let pool = pool_with(factory, options(1));
        drop(pool.acquire().await.unwrap());

        drop(pool);
        assert_eq!(stats.processes_closed(), 1);
        assert_eq!(stats.pages_closed(), 1);
    }
}
