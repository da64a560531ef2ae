//! Chrome/Chromium backend built on `headless_chrome`.
//!
//! [`ChromeBrowserFactory`] launches one Chrome process; [`ChromeProcess`]
//! opens tabs in it and [`ChromePage`] drives a single tab. Every page keeps
//! a reference to its browser, so a process the pool has discarded stays
//! alive until its last leased page is closed.
//!
//! # Example
//!
//! ```rust,ignore
//! use html2pdf_pool::{ChromeBrowserFactory, PoolOptions};
//!
//! // Auto-detect Chrome, downloading it on first launch if missing
//! let factory = ChromeBrowserFactory::with_defaults();
//!
//! // Or follow the pool options (path, headless, extra flags)
//! let factory = ChromeBrowserFactory::from_options(&PoolOptions::default());
//! ```

use std::ffi::{OsStr, OsString};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use headless_chrome::protocol::cdp::Browser as CdpBrowser;
use headless_chrome::protocol::cdp::Emulation;
use headless_chrome::types::PrintToPdfOptions;
use headless_chrome::{Browser, LaunchOptions, Tab};

use super::BrowserFactory;
use crate::config::PoolOptions;
use crate::options::ColorScheme;
use crate::reaper;
use crate::renderer::{PdfParams, RenderPage, RendererError, RendererProcess};

/// Flags applied to every launch, before user-supplied flags.
///
/// Tuned for stable headless operation in containers: no `/dev/shm`, no
/// GPU paths, no background throttling of tabs waiting in the pool.
const DEFAULT_ARGS: &[&str] = &[
    // ===== Memory and Performance Optimization =====
    "--disable-dev-shm-usage",
    "--disable-crash-reporter",
    "--max_old_space_size=1024",
    // ===== GPU and Rendering Flags =====
    "--disable-gpu-compositing",
    "--disable-software-rasterizer",
    "--disable-accelerated-2d-canvas",
    "--disable-gl-drawing-for-tests",
    "--disable-webgl",
    "--disable-webgl2",
    // ===== Disable Unnecessary Features =====
    "--disable-extensions",
    "--disable-plugins",
    "--disable-sync",
    "--disable-default-apps",
    // ===== Automation =====
    "--enable-automation",
    // ===== Pooled tabs must stay responsive while idle =====
    "--disable-background-timer-throttling",
    "--disable-backgrounding-occluded-windows",
    "--disable-hang-monitor",
    "--disable-renderer-backgrounding",
    "--disable-ipc-flooding-protection",
];

/// Idle pages can sit in the pool for their whole lifetime without CDP
/// traffic; headless_chrome would otherwise drop the connection after 30s.
const BROWSER_IDLE_TIMEOUT: Duration = Duration::from_secs(24 * 60 * 60);

/// Factory for Chrome/Chromium processes.
///
/// # Thread Safety
///
/// This factory is `Send + Sync` and can be shared across threads.
#[derive(Debug, Clone)]
pub struct ChromeBrowserFactory {
    chrome_path: Option<PathBuf>,
    headless: bool,
    args: Vec<OsString>,
}

impl ChromeBrowserFactory {
    /// Headless Chrome at an auto-detected path with the default flags.
    pub fn with_defaults() -> Self {
        Self {
            chrome_path: None,
            headless: true,
            args: DEFAULT_ARGS.iter().map(OsString::from).collect(),
        }
    }

    /// Headless Chrome at `path`.
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            chrome_path: Some(path.into()),
            ..Self::with_defaults()
        }
    }

    /// Chrome configured from pool options: `chrome_path`, `headless`, and
    /// `launch_args` appended after the default flags.
    pub fn from_options(options: &PoolOptions) -> Self {
        let mut factory = Self::with_defaults();
        factory.chrome_path = options.chrome_path.clone();
        factory.headless = options.headless;
        factory
            .args
            .extend(options.launch_args.iter().map(OsString::from));
        factory
    }

    /// Flags passed to Chrome, in order.
    pub fn args(&self) -> impl Iterator<Item = &OsStr> {
        self.args.iter().map(OsString::as_os_str)
    }

    fn launch_options(&self) -> Result<LaunchOptions<'_>, RendererError> {
        match &self.chrome_path {
            Some(path) => log::debug!("Creating Chrome options with custom path: {}", path.display()),
            None => log::debug!("Creating Chrome options (auto-detect browser)"),
        }

        let mut builder = LaunchOptions::default_builder();
        if let Some(path) = &self.chrome_path {
            builder.path(Some(path.clone()));
        }

        builder
            .headless(self.headless)
            .sandbox(false)
            .disable_default_args(true)
            .idle_browser_timeout(BROWSER_IDLE_TIMEOUT)
            .args(self.args().collect())
            .build()
            .map_err(|e| {
                log::error!("❌ Failed to build Chrome launch options: {}", e);
                RendererError::Launch(e.to_string())
            })
    }
}

impl Default for ChromeBrowserFactory {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl BrowserFactory for ChromeBrowserFactory {
    fn launch(&self) -> Result<Arc<dyn RendererProcess>, RendererError> {
        let options = self.launch_options()?;

        log::debug!("🚀 Launching Chrome browser...");
        let browser = Browser::new(options).map_err(|e| {
            log::error!("❌ Chrome launch failed: {:#}", e);
            RendererError::Launch(format!("{:#}", e))
        })?;

        let process = ChromeProcess::new(browser);
        log::info!("✅ Chrome launched (pid {:?})", process.process_id());
        Ok(Arc::new(process))
    }
}

/// Maps a headless_chrome error, recognizing timeouts and dropped sessions.
fn classify(error: impl std::fmt::Display, fallback: fn(String) -> RendererError) -> RendererError {
    let message = format!("{:#}", error);
    let lower = message.to_ascii_lowercase();
    if lower.contains("timed out") || lower.contains("timeout") {
        RendererError::Timeout(message)
    } else if lower.contains("connection closed") || lower.contains("target closed") {
        RendererError::Closed(message)
    } else {
        fallback(message)
    }
}

/// A running Chrome process.
///
/// The `alive` flag is shared with every page opened in the process and
/// goes false once the browser is closed, killed or stops answering.
pub struct ChromeProcess {
    browser: Arc<Browser>,
    pid: Option<u32>,
    alive: Arc<AtomicBool>,
}

impl ChromeProcess {
    /// Wraps an already launched browser.
    pub fn new(browser: Browser) -> Self {
        let pid = browser.get_process_id();
        Self {
            browser: Arc::new(browser),
            pid,
            alive: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Any open tab of the browser, opening one if none is left.
    ///
    /// Browser-level commands have to travel over a tab session.
    fn any_tab(&self) -> Result<Arc<Tab>, RendererError> {
        let existing = self
            .browser
            .get_tabs()
            .lock()
            .ok()
            .and_then(|tabs| tabs.first().cloned());
        match existing {
            Some(tab) => Ok(tab),
            None => self
                .browser
                .new_tab()
                .map_err(|e| classify(e, RendererError::Page)),
        }
    }
}

impl RendererProcess for ChromeProcess {
    fn new_page(&self) -> Result<Arc<dyn RenderPage>, RendererError> {
        let tab = self
            .browser
            .new_tab()
            .map_err(|e| classify(e, RendererError::Page))?;
        Ok(Arc::new(ChromePage {
            tab,
            browser: Arc::clone(&self.browser),
            browser_alive: Arc::clone(&self.alive),
            closed: AtomicBool::new(false),
        }))
    }

    fn is_connected(&self) -> bool {
        if !self.alive.load(Ordering::Acquire) {
            return false;
        }
        let connected = self.browser.get_version().is_ok();
        if !connected {
            self.alive.store(false, Ordering::Release);
        }
        connected
    }

    fn process_id(&self) -> Option<u32> {
        self.pid
    }

    fn close(&self) -> Result<(), RendererError> {
        if !self.alive.swap(false, Ordering::AcqRel) {
            return Ok(());
        }
        let tab = self.any_tab()?;
        match tab.call_method(CdpBrowser::Close(None)) {
            Ok(_) => Ok(()),
            // Chrome may drop the socket before answering.
            Err(e) => match classify(e, RendererError::Page) {
                RendererError::Closed(_) => Ok(()),
                other => Err(other),
            },
        }
    }

    fn kill(&self) {
        self.alive.store(false, Ordering::Release);
        if let Some(pid) = self.pid {
            reaper::kill_pid(pid);
        }
    }
}

/// One Chrome tab.
pub struct ChromePage {
    tab: Arc<Tab>,
    browser: Arc<Browser>,
    browser_alive: Arc<AtomicBool>,
    closed: AtomicBool,
}

impl ChromePage {
    fn load(&self, url: &str, timeout: Duration) -> Result<(), RendererError> {
        self.tab.set_default_timeout(timeout);
        self.tab
            .navigate_to(url)
            .map_err(|e| classify(e, RendererError::Navigation))?;
        self.tab
            .wait_until_navigated()
            .map_err(|e| classify(e, RendererError::Navigation))?;
        Ok(())
    }

    fn is_listed(&self) -> bool {
        let target_id = self.tab.get_target_id();
        self.browser
            .get_tabs()
            .lock()
            .map(|tabs| tabs.iter().any(|t| t.get_target_id() == target_id))
            .unwrap_or(false)
    }
}

impl RenderPage for ChromePage {
    fn emulate_media(&self, scheme: ColorScheme) -> Result<(), RendererError> {
        self.tab
            .call_method(Emulation::SetEmulatedMedia {
                media: None,
                features: Some(vec![Emulation::MediaFeature {
                    name: "prefers-color-scheme".to_string(),
                    value: scheme.as_css().to_string(),
                }]),
            })
            .map(|_| ())
            .map_err(|e| classify(e, RendererError::Page))
    }

    fn set_viewport(&self, width: u32, height: u32) -> Result<(), RendererError> {
        // Per-target override; window bounds would be shared by every tab.
        self.tab
            .call_method(Emulation::SetDeviceMetricsOverride {
                width,
                height,
                device_scale_factor: 1.0,
                mobile: false,
                scale: None,
                screen_width: None,
                screen_height: None,
                position_x: None,
                position_y: None,
                dont_set_visible_size: None,
                screen_orientation: None,
                viewport: None,
                display_feature: None,
                device_posture: None,
            })
            .map(|_| ())
            .map_err(|e| classify(e, RendererError::Page))
    }

    fn set_content(&self, html: &str, timeout: Duration) -> Result<(), RendererError> {
        let data_url = format!("data:text/html;charset=utf-8,{}", urlencoding::encode(html));
        self.load(&data_url, timeout)
    }

    fn goto(&self, url: &str, timeout: Duration) -> Result<(), RendererError> {
        self.load(url, timeout)
    }

    fn evaluate_bool(&self, expression: &str) -> Result<bool, RendererError> {
        let result = self
            .tab
            .evaluate(expression, false)
            .map_err(|e| classify(e, RendererError::Evaluation))?;
        Ok(result.value.and_then(|v| v.as_bool()).unwrap_or(false))
    }

    fn pdf(&self, params: &PdfParams) -> Result<Vec<u8>, RendererError> {
        let options = PrintToPdfOptions {
            landscape: Some(params.landscape),
            display_header_footer: Some(params.display_header_footer()),
            print_background: Some(params.print_background),
            scale: Some(params.scale),
            paper_width: Some(params.paper_width),
            paper_height: Some(params.paper_height),
            margin_top: Some(params.margin_top),
            margin_bottom: Some(params.margin_bottom),
            margin_left: Some(params.margin_left),
            margin_right: Some(params.margin_right),
            page_ranges: params.page_ranges.clone(),
            // Chrome prints its own default bands when only one is given.
            header_template: params
                .display_header_footer()
                .then(|| params.header_template.clone().unwrap_or_else(|| "<span></span>".to_string())),
            footer_template: params
                .display_header_footer()
                .then(|| params.footer_template.clone().unwrap_or_else(|| "<span></span>".to_string())),
            prefer_css_page_size: Some(params.prefer_css_page_size),
            ..Default::default()
        };

        self.tab
            .print_to_pdf(Some(options))
            .map_err(|e| classify(e, RendererError::Pdf))
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
            || !self.browser_alive.load(Ordering::Acquire)
            || !self.is_listed()
    }

    fn close(&self) -> Result<(), RendererError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.tab
            .close(false)
            .map(|_| ())
            .map_err(|e| classify(e, RendererError::Page))
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
