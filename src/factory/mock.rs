//! In-memory browser for testing.
//!
//! [`MockBrowserFactory`] launches a fake process whose pages accept any
//! content and "print" a small `%PDF` document. It can be told to fail in
//! the ways a real browser does, and it counts what the pool and pipeline
//! asked of it.
//!
//! # Feature Flag
//!
//! This module is only available when:
//! - The `test-utils` feature is enabled, OR
//! - During testing (`#[cfg(test)]`)
//!
//! # Example
//!
//! ```rust,ignore
//! use html2pdf_pool::factory::mock::MockBrowserFactory;
//!
//! // Factory that always fails
//! let factory = MockBrowserFactory::always_fails("Chrome not installed");
//!
//! // Pages whose first two PDF calls lose their session
//! let factory = MockBrowserFactory::new().with_transient_failures(2);
//! let stats = factory.stats();
//! ```

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::BrowserFactory;
use crate::options::ColorScheme;
use crate::renderer::{PdfParams, RenderPage, RendererError, RendererProcess};

/// Bytes returned by every successful mock PDF call.
pub const MOCK_PDF: &[u8] = b"%PDF-1.7\n1 0 obj << /Type /Catalog >> endobj\ntrailer << /Root 1 0 R >>\n%%EOF\n";

/// Behavior knobs shared by the factory, its processes and pages.
#[derive(Debug, Clone, Default)]
struct MockConfig {
    always_fail: Option<String>,
    fail_after: Option<(usize, String)>,
    pdf_error: Option<String>,
    evaluate_error: Option<String>,
    images_pending: bool,
    render_delay: Duration,
    close_delay: Duration,
    detached_pages: bool,
}

/// Counters and captured inputs.
#[derive(Debug, Default)]
struct MockState {
    launches: AtomicUsize,
    launch_failures_left: AtomicUsize,
    page_failures_left: AtomicUsize,
    transient_failures_left: AtomicUsize,
    pages_created: AtomicUsize,
    pages_closed: AtomicUsize,
    content_loads: AtomicUsize,
    evaluations: AtomicUsize,
    pdf_calls: AtomicUsize,
    processes_closed: AtomicUsize,
    kills: AtomicUsize,
    last_content: Mutex<Option<String>>,
    last_params: Mutex<Option<PdfParams>>,
    last_viewport: Mutex<Option<(u32, u32)>>,
    processes: Mutex<Vec<Arc<AtomicBool>>>,
}

/// Takes one unit from a countdown, returning whether one was left.
fn take_one(counter: &AtomicUsize) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

/// Mock browser factory for testing without Chrome.
///
/// # Thread Safety
///
/// This factory is `Send + Sync` and tracks state using atomic operations.
pub struct MockBrowserFactory {
    config: Arc<MockConfig>,
    state: Arc<MockState>,
}

impl MockBrowserFactory {
    /// A factory whose processes and pages always work.
    pub fn new() -> Self {
        Self {
            config: Arc::new(MockConfig::default()),
            state: Arc::new(MockState::default()),
        }
    }

    /// A factory whose launches always fail with `message`.
    pub fn always_fails<S: Into<String>>(message: S) -> Self {
        Self::new().reconfigure(|c| c.always_fail = Some(message.into()))
    }

    /// A factory that launches `n` processes, then fails with `message`.
    pub fn fail_after_n<S: Into<String>>(n: usize, message: S) -> Self {
        Self::new().reconfigure(|c| c.fail_after = Some((n, message.into())))
    }

    /// The first `n` launches fail, later ones succeed.
    pub fn with_failing_launches(self, n: usize) -> Self {
        self.state.launch_failures_left.store(n, Ordering::SeqCst);
        self
    }

    /// The first `n` page openings fail, later ones succeed.
    pub fn with_failing_pages(self, n: usize) -> Self {
        self.state.page_failures_left.store(n, Ordering::SeqCst);
        self
    }

    /// The first `n` PDF calls fail with a dropped session.
    pub fn with_transient_failures(self, n: usize) -> Self {
        self.state.transient_failures_left.store(n, Ordering::SeqCst);
        self
    }

    /// Every PDF call fails with `message`, a non-transient error.
    pub fn with_pdf_error<S: Into<String>>(self, message: S) -> Self {
        self.reconfigure(|c| c.pdf_error = Some(message.into()))
    }

    /// Every script evaluation fails with `message`.
    pub fn with_evaluate_error<S: Into<String>>(self, message: S) -> Self {
        self.reconfigure(|c| c.evaluate_error = Some(message.into()))
    }

    /// Images never report complete.
    pub fn with_pending_images(self) -> Self {
        self.reconfigure(|c| c.images_pending = true)
    }

    /// Each PDF call takes `delay`.
    pub fn with_render_delay(self, delay: Duration) -> Self {
        self.reconfigure(|c| c.render_delay = delay)
    }

    /// Closing a page or process takes `delay`.
    pub fn with_close_delay(self, delay: Duration) -> Self {
        self.reconfigure(|c| c.close_delay = delay)
    }

    /// Pages keep reporting open after their process dies, the way a
    /// browser tab does until someone talks to the browser again.
    pub fn with_detached_pages(self) -> Self {
        self.reconfigure(|c| c.detached_pages = true)
    }

    fn reconfigure(self, change: impl FnOnce(&mut MockConfig)) -> Self {
        let mut config = (*self.config).clone();
        change(&mut config);
        Self {
            config: Arc::new(config),
            state: self.state,
        }
    }

    /// Number of launch attempts.
    pub fn creation_count(&self) -> usize {
        self.state.launches.load(Ordering::SeqCst)
    }

    /// A counter view that stays valid after the factory moves into a pool.
    pub fn stats(&self) -> MockStats {
        MockStats {
            state: Arc::clone(&self.state),
        }
    }
}

impl Default for MockBrowserFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl BrowserFactory for MockBrowserFactory {
    fn launch(&self) -> Result<Arc<dyn RendererProcess>, RendererError> {
        let count = self.state.launches.fetch_add(1, Ordering::SeqCst);

        if let Some(message) = &self.config.always_fail {
            log::debug!("MockBrowserFactory: Returning configured failure");
            return Err(RendererError::Launch(message.clone()));
        }
        if let Some((limit, message)) = &self.config.fail_after {
            if count >= *limit {
                log::debug!("MockBrowserFactory: Failing after {} launches", limit);
                return Err(RendererError::Launch(message.clone()));
            }
        }
        if take_one(&self.state.launch_failures_left) {
            log::debug!("MockBrowserFactory: Scripted launch failure #{}", count + 1);
            return Err(RendererError::Launch("mock launch failure".to_string()));
        }

        log::debug!("MockBrowserFactory: Launched mock process #{}", count + 1);
        let alive = Arc::new(AtomicBool::new(true));
        if let Ok(mut processes) = self.state.processes.lock() {
            processes.push(Arc::clone(&alive));
        }
        Ok(Arc::new(MockProcess {
            config: Arc::clone(&self.config),
            state: Arc::clone(&self.state),
            alive,
        }))
    }
}

impl std::fmt::Debug for MockBrowserFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockBrowserFactory")
            .field("config", &self.config)
            .field("launches", &self.creation_count())
            .finish()
    }
}

/// Read-only view of a mock factory's counters.
#[derive(Debug, Clone)]
pub struct MockStats {
    state: Arc<MockState>,
}

impl MockStats {
    /// Launch attempts, failed ones included.
    pub fn launches(&self) -> usize {
        self.state.launches.load(Ordering::SeqCst)
    }

    /// Pages successfully opened.
    pub fn pages_created(&self) -> usize {
        self.state.pages_created.load(Ordering::SeqCst)
    }

    /// Pages closed.
    pub fn pages_closed(&self) -> usize {
        self.state.pages_closed.load(Ordering::SeqCst)
    }

    /// `set_content` and `goto` calls.
    pub fn content_loads(&self) -> usize {
        self.state.content_loads.load(Ordering::SeqCst)
    }

    /// Script evaluations.
    pub fn evaluations(&self) -> usize {
        self.state.evaluations.load(Ordering::SeqCst)
    }

    /// PDF calls, failed ones included.
    pub fn pdf_calls(&self) -> usize {
        self.state.pdf_calls.load(Ordering::SeqCst)
    }

    /// Graceful process closes.
    pub fn processes_closed(&self) -> usize {
        self.state.processes_closed.load(Ordering::SeqCst)
    }

    /// Process kills.
    pub fn kills(&self) -> usize {
        self.state.kills.load(Ordering::SeqCst)
    }

    /// HTML or URL most recently loaded into any page.
    pub fn last_content(&self) -> Option<String> {
        self.state.last_content.lock().ok().and_then(|c| c.clone())
    }

    /// PDF parameters of the most recent PDF call.
    pub fn last_params(&self) -> Option<PdfParams> {
        self.state.last_params.lock().ok().and_then(|p| p.clone())
    }

    /// Most recent explicit viewport.
    pub fn last_viewport(&self) -> Option<(u32, u32)> {
        self.state.last_viewport.lock().ok().and_then(|v| *v)
    }

    /// Makes every launched process die without being closed or killed.
    pub fn crash(&self) {
        if let Ok(processes) = self.state.processes.lock() {
            for alive in processes.iter() {
                alive.store(false, Ordering::SeqCst);
            }
        }
    }
}

/// A fake browser process.
pub struct MockProcess {
    config: Arc<MockConfig>,
    state: Arc<MockState>,
    alive: Arc<AtomicBool>,
}

impl RendererProcess for MockProcess {
    fn new_page(&self) -> Result<Arc<dyn RenderPage>, RendererError> {
        if !self.alive.load(Ordering::SeqCst) {
            return Err(RendererError::Closed("mock process is not running".to_string()));
        }
        if take_one(&self.state.page_failures_left) {
            return Err(RendererError::Page("mock page creation failure".to_string()));
        }
        self.state.pages_created.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(MockPage {
            config: Arc::clone(&self.config),
            state: Arc::clone(&self.state),
            process_alive: Arc::clone(&self.alive),
            closed: AtomicBool::new(false),
        }))
    }

    fn is_connected(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    fn process_id(&self) -> Option<u32> {
        None
    }

    fn close(&self) -> Result<(), RendererError> {
        std::thread::sleep(self.config.close_delay);
        self.alive.store(false, Ordering::SeqCst);
        self.state.processes_closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn kill(&self) {
        self.alive.store(false, Ordering::SeqCst);
        self.state.kills.fetch_add(1, Ordering::SeqCst);
    }
}

/// A fake page.
pub struct MockPage {
    config: Arc<MockConfig>,
    state: Arc<MockState>,
    process_alive: Arc<AtomicBool>,
    closed: AtomicBool,
}

impl MockPage {
    /// A working page not attached to any factory.
    pub fn standalone() -> Self {
        Self {
            config: Arc::new(MockConfig::default()),
            state: Arc::new(MockState::default()),
            process_alive: Arc::new(AtomicBool::new(true)),
            closed: AtomicBool::new(false),
        }
    }

    fn ensure_open(&self) -> Result<(), RendererError> {
        if self.closed.load(Ordering::SeqCst) || !self.process_alive.load(Ordering::SeqCst) {
            return Err(RendererError::Closed("mock page is closed".to_string()));
        }
        Ok(())
    }

    fn record_load(&self, content: &str) {
        self.state.content_loads.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut last) = self.state.last_content.lock() {
            *last = Some(content.to_string());
        }
    }
}

impl RenderPage for MockPage {
    fn emulate_media(&self, _scheme: ColorScheme) -> Result<(), RendererError> {
        self.ensure_open()
    }

    fn set_viewport(&self, width: u32, height: u32) -> Result<(), RendererError> {
        self.ensure_open()?;
        if let Ok(mut last) = self.state.last_viewport.lock() {
            *last = Some((width, height));
        }
        Ok(())
    }

    fn set_content(&self, html: &str, _timeout: Duration) -> Result<(), RendererError> {
        self.ensure_open()?;
        self.record_load(html);
        Ok(())
    }

    fn goto(&self, url: &str, _timeout: Duration) -> Result<(), RendererError> {
        self.ensure_open()?;
        self.record_load(url);
        if url.contains("unreachable") {
            return Err(RendererError::Navigation("net::ERR_NAME_NOT_RESOLVED".to_string()));
        }
        Ok(())
    }

    fn evaluate_bool(&self, _expression: &str) -> Result<bool, RendererError> {
        self.ensure_open()?;
        self.state.evaluations.fetch_add(1, Ordering::SeqCst);
        match &self.config.evaluate_error {
            Some(message) => Err(RendererError::Evaluation(message.clone())),
            None => Ok(!self.config.images_pending),
        }
    }

    fn pdf(&self, params: &PdfParams) -> Result<Vec<u8>, RendererError> {
        self.ensure_open()?;
        self.state.pdf_calls.fetch_add(1, Ordering::SeqCst);
        std::thread::sleep(self.config.render_delay);

        if take_one(&self.state.transient_failures_left) {
            return Err(RendererError::Closed(
                "Target closed (mock session dropped)".to_string(),
            ));
        }
        if let Some(message) = &self.config.pdf_error {
            return Err(RendererError::Pdf(message.clone()));
        }
        if let Ok(mut last) = self.state.last_params.lock() {
            *last = Some(params.clone());
        }
        Ok(MOCK_PDF.to_vec())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
            || (!self.config.detached_pages && !self.process_alive.load(Ordering::SeqCst))
    }

    fn close(&self) -> Result<(), RendererError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        std::thread::sleep(self.config.close_delay);
        self.state.pages_closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_factory_launches() {
        let factory = MockBrowserFactory::new();
        let process = factory.launch().unwrap();
        assert!(process.is_connected());
        assert_eq!(factory.creation_count(), 1);

        let page = process.new_page().unwrap();
        page.set_content("<p>x</p>", Duration::from_secs(1)).unwrap();
        let params = crate::ConversionOptions::default().resolve(None, None).unwrap();
        assert!(page.pdf(&params).unwrap().starts_with(b"%PDF"));
        assert_eq!(factory.stats().last_content().as_deref(), Some("<p>x</p>"));
    }

    #[test]
    fn test_mock_factory_always_fails() {
        let factory = MockBrowserFactory::always_fails("Test error");
        match factory.launch() {
            Err(RendererError::Launch(msg)) => assert_eq!(msg, "Test error"),
            _ => panic!("Expected Launch error"),
        }
        assert_eq!(factory.creation_count(), 1);
    }

    #[test]
    fn test_mock_factory_fail_after_n() {
        let factory = MockBrowserFactory::fail_after_n(2, "Exhausted");
        assert!(factory.launch().is_ok());
        assert!(factory.launch().is_ok());
        assert!(factory.launch().is_err());
        assert_eq!(factory.creation_count(), 3);
    }

    #[test]
    fn test_scripted_failures_count_down() {
        let factory = MockBrowserFactory::new()
            .with_failing_launches(1)
            .with_transient_failures(1);
        assert!(factory.launch().is_err());

        let process = factory.launch().unwrap();
        let page = process.new_page().unwrap();
        let params = crate::ConversionOptions::default().resolve(None, None).unwrap();

        let err = page.pdf(&params).unwrap_err();
        assert!(err.is_transient());
        assert!(page.pdf(&params).is_ok());
        assert_eq!(factory.stats().pdf_calls(), 2);
    }

    #[test]
    fn test_pages_close_with_process() {
        let factory = MockBrowserFactory::new();
        let process = factory.launch().unwrap();
        let page = process.new_page().unwrap();

        process.kill();
        assert!(page.is_closed());
        assert!(process.new_page().is_err());
        assert_eq!(factory.stats().kills(), 1);
    }

    #[test]
    fn test_crash_leaves_detached_pages_looking_open() {
        let factory = MockBrowserFactory::new().with_detached_pages();
        let stats = factory.stats();
        let process = factory.launch().unwrap();
        let page = process.new_page().unwrap();

        stats.crash();
        assert!(!process.is_connected());
        assert!(!page.is_closed());
        assert!(page.set_content("<p>x</p>", Duration::from_secs(1)).is_err());
        assert_eq!(stats.kills(), 0);
        assert_eq!(stats.processes_closed(), 0);
    }
}
