//! HTML/URL to PDF conversion pipeline.
//!
//! [`PdfConverter`] leases a page from the [`PagePool`] and drives it
//! through one render:
//!
//! ```text
//! acquire ─▶ emulate media ─▶ viewport? ─▶ load ─▶ images? ─▶ print ─▶ release
//!    │                                                                    ▲
//!    └──────────────── any error (handle dropped) ────────────────────────┘
//! ```
//!
//! The blocking renderer calls run on tokio's blocking pool with the page
//! lease moved into the task, so the page goes back to the pool on every
//! exit path, even when the awaiting future is dropped.
//!
//! # Retries
//!
//! Transient renderer failures (dropped sessions, detached frames, protocol
//! errors) are retried with a fresh attempt, the broken page being discarded
//! instead of returned. Everything else fails immediately.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use html2pdf_pool::{ConversionOptions, PagePool};
//! use html2pdf_pool::convert::{Converter, PdfConverter};
//!
//! # async fn example() -> html2pdf_pool::Result<()> {
//! let pool = PagePool::builder().build()?.into_shared();
//! let converter = PdfConverter::new(Arc::clone(&pool));
//!
//! let result = converter
//!     .convert_html("<h1>Hello</h1>", &ConversionOptions::a4_standard())
//!     .await;
//! println!("{} bytes in {:?}", result.size(), result.duration());
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio_retry::RetryIf;

use crate::error::{Html2PdfError, Result};
use crate::handle::PageHandle;
use crate::options::{ColorScheme, ConversionOptions, HeaderFooter};
use crate::pool::PagePool;
use crate::renderer::{PdfParams, RenderPage, RendererError};
use crate::retry::RetryPolicy;
use crate::service::{ConversionResult, Outcome};
use crate::template::{TemplateEngine, TeraTemplateEngine};

/// Retry policy for transient renderer failures: 2 retries, 250ms doubling.
pub const DEFAULT_CONVERSION_RETRY: RetryPolicy =
    RetryPolicy::exponential(2, Duration::from_millis(250));

/// Image completion checks before printing anyway.
pub const IMAGE_POLL_ATTEMPTS: usize = 25;

/// Delay between image completion checks.
pub const IMAGE_POLL_INTERVAL: Duration = Duration::from_millis(200);

const IMAGES_COMPLETE: &str = "Array.from(document.images).every(i => i.complete)";

/// URL schemes accepted by [`Converter::convert_url`].
const ALLOWED_SCHEMES: [&str; 4] = ["http", "https", "file", "data"];

/// Turns HTML or a URL into PDF bytes.
#[async_trait]
pub trait Converter: Send + Sync {
    /// Renders an HTML document.
    async fn convert_html(&self, html: &str, options: &ConversionOptions) -> ConversionResult;

    /// Renders the page at `url` (http, https, file or data).
    async fn convert_url(&self, url: &str, options: &ConversionOptions) -> ConversionResult;
}

/// What to load into the page.
#[derive(Debug, Clone)]
enum Source {
    Html(Arc<str>),
    Url(Arc<str>),
}

/// Everything one render needs, resolved before a page is leased.
#[derive(Debug)]
struct RenderJob {
    source: Source,
    params: PdfParams,
    color_scheme: ColorScheme,
    viewport: Option<(u32, u32)>,
    timeout: Duration,
    wait_for_images: bool,
}

/// [`Converter`] backed by a [`PagePool`].
pub struct PdfConverter {
    pool: Arc<PagePool>,
    engine: Arc<dyn TemplateEngine>,
    retry: RetryPolicy,
}

impl PdfConverter {
    /// A converter over `pool`, rendering header and footer data with Tera.
    pub fn new(pool: Arc<PagePool>) -> Self {
        Self {
            pool,
            engine: Arc::new(TeraTemplateEngine::new()),
            retry: DEFAULT_CONVERSION_RETRY,
        }
    }

    /// Use `engine` for header and footer templates with data.
    pub fn with_engine(mut self, engine: Arc<dyn TemplateEngine>) -> Self {
        self.engine = engine;
        self
    }

    /// Replace the retry policy for transient failures.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// The pool pages are leased from.
    pub fn pool(&self) -> &Arc<PagePool> {
        &self.pool
    }

    /// Renders a header or footer band to static markup.
    ///
    /// Bands with data go through the template engine; if that fails the
    /// raw template is used.
    fn render_band(&self, band: Option<&HeaderFooter>, name: &str) -> Option<String> {
        let band = band?;
        let Some(data) = band.data.as_ref() else {
            return Some(band.template.clone());
        };
        match self.engine.render(&band.template, data) {
            Ok(markup) => Some(markup),
            Err(e) => {
                log::warn!(
                    "⚠️ Failed to render {} template, using it verbatim: {}",
                    name,
                    e.detailed()
                );
                Some(band.template.clone())
            }
        }
    }

    fn prepare(&self, source: Source, options: &ConversionOptions) -> Result<RenderJob> {
        let header = self.render_band(options.header.as_ref(), "header");
        let footer = self.render_band(options.footer.as_ref(), "footer");
        Ok(RenderJob {
            source,
            params: options.resolve(header, footer)?,
            color_scheme: options.color_scheme,
            viewport: options.viewport(),
            timeout: options.timeout,
            wait_for_images: options.wait_for_images,
        })
    }

    async fn convert(&self, source: Result<Source>, options: &ConversionOptions) -> ConversionResult {
        let started = Instant::now();

        let job = match source.and_then(|source| self.prepare(source, options)) {
            Ok(job) => Arc::new(job),
            Err(e) => {
                log::warn!("❌ Rejected conversion request: {}", e);
                return Outcome::from_error(e, started.elapsed());
            }
        };

        let action = || Self::attempt(Arc::clone(&self.pool), Arc::clone(&job));
        let condition = |e: &Html2PdfError| {
            let transient = e.is_transient();
            if transient {
                log::warn!("⚠️ Transient renderer failure, retrying: {}", e);
            }
            transient
        };

        match RetryIf::spawn(self.retry.delays(), action, condition).await {
            Ok(pdf) => {
                log::info!(
                    "✅ PDF generated ({} bytes in {:?})",
                    pdf.len(),
                    started.elapsed()
                );
                Outcome::success(pdf, started.elapsed())
            }
            Err(e) => {
                log::error!("❌ Conversion failed after {:?}: {}", started.elapsed(), e);
                Outcome::from_error(e, started.elapsed())
            }
        }
    }

    /// One lease-render-release cycle.
    async fn attempt(pool: Arc<PagePool>, job: Arc<RenderJob>) -> Result<Vec<u8>> {
        let page = pool.acquire().await?;
        log::debug!("Rendering on page {}", page.id());

        tokio::task::spawn_blocking(move || render_on(page, &job))
            .await
            .map_err(|e| Html2PdfError::ConversionFailed {
                message: format!("Render task failed: {}", e),
                source: None,
            })?
            .map_err(Html2PdfError::conversion)
    }
}

impl std::fmt::Debug for PdfConverter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PdfConverter")
            .field("pool", &self.pool)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Converter for PdfConverter {
    async fn convert_html(&self, html: &str, options: &ConversionOptions) -> ConversionResult {
        log::debug!("Converting {} bytes of HTML", html.len());
        self.convert(Ok(Source::Html(Arc::from(html))), options).await
    }

    async fn convert_url(&self, url: &str, options: &ConversionOptions) -> ConversionResult {
        log::debug!("Converting URL {}", truncate_for_log(url, 100));
        let source = validate_url(url).map(|url| Source::Url(Arc::from(url)));
        self.convert(source, options).await
    }
}

// ============================================================================
// Blocking Render
// ============================================================================

/// Runs the render and disposes of the lease: pages whose session broke are
/// discarded, all others returned.
fn render_on(page: PageHandle, job: &RenderJob) -> std::result::Result<Vec<u8>, RendererError> {
    match render(&*page, job) {
        Err(e) if e.is_transient() => {
            page.discard();
            Err(e)
        }
        result => result,
    }
}

fn render(page: &dyn RenderPage, job: &RenderJob) -> std::result::Result<Vec<u8>, RendererError> {
    let started = Instant::now();

    page.emulate_media(job.color_scheme)?;
    if let Some((width, height)) = job.viewport {
        page.set_viewport(width, height)?;
    }

    match &job.source {
        Source::Html(html) => page.set_content(html, job.timeout)?,
        Source::Url(url) => page.goto(url, job.timeout)?,
    }
    log::debug!("Content loaded in {:?}", started.elapsed());

    if job.wait_for_images {
        wait_for_images(page);
    }

    let pdf = page.pdf(&job.params)?;
    log::debug!("Page rendered in {:?}", started.elapsed());
    Ok(pdf)
}

/// Polls until every image reports complete. Evaluation errors and running
/// out of attempts are logged; rendering proceeds either way.
fn wait_for_images(page: &dyn RenderPage) {
    for attempt in 1..=IMAGE_POLL_ATTEMPTS {
        match page.evaluate_bool(IMAGES_COMPLETE) {
            Ok(true) => {
                log::trace!("Images complete after {} check(s)", attempt);
                return;
            }
            Ok(false) => {}
            Err(e) => log::debug!("Image check {} failed, continuing: {}", attempt, e),
        }
        if attempt < IMAGE_POLL_ATTEMPTS {
            std::thread::sleep(IMAGE_POLL_INTERVAL);
        }
    }
    log::warn!(
        "⏰ Images still loading after {} checks, rendering anyway",
        IMAGE_POLL_ATTEMPTS
    );
}

// ============================================================================
// Helpers
// ============================================================================

/// Parses and normalizes a URL, accepting http, https, file and data.
fn validate_url(url: &str) -> Result<String> {
    if url.trim().is_empty() {
        return Err(Html2PdfError::Configuration("URL is required".to_string()));
    }

    let parsed = url::Url::parse(url.trim()).map_err(|e| {
        log::debug!("URL validation failed for '{}': {}", truncate_for_log(url, 100), e);
        Html2PdfError::Configuration(format!("Invalid URL: {}", e))
    })?;

    if !ALLOWED_SCHEMES.contains(&parsed.scheme()) {
        return Err(Html2PdfError::Configuration(format!(
            "Unsupported URL scheme: {}",
            parsed.scheme()
        )));
    }
    Ok(parsed.to_string())
}

/// Shortens long values (data URLs carry whole documents) for log lines.
fn truncate_for_log(value: &str, max_chars: usize) -> String {
    match value.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &value[..cut]),
        None => value.to_string(),
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PoolOptionsBuilder;
    use crate::factory::mock::MockBrowserFactory;

    fn converter(factory: MockBrowserFactory) -> PdfConverter {
        let options = PoolOptionsBuilder::new()
            .max_instances(2)
            .acquire_timeout(Duration::from_secs(2))
            .process_name(None)
            .build()
            .unwrap();
        let pool = PagePool::builder()
            .options(options)
            .factory(Box::new(factory))
            .enable_sweeper(false)
            .build()
            .unwrap();
        PdfConverter::new(pool.into_shared())
            .with_retry(RetryPolicy::exponential(2, Duration::from_millis(5)))
    }

    #[test]
    fn test_validate_url() {
        assert_eq!(validate_url("https://example.com").unwrap(), "https://example.com/");
        assert!(validate_url("file:///tmp/report.html").is_ok());
        assert!(validate_url("data:text/html,<p>x</p>").is_ok());
        assert!(validate_url("   ").is_err());
        assert!(validate_url("not a url").is_err());

        let err = validate_url("ftp://example.com/file").unwrap_err();
        assert!(err.to_string().contains("Unsupported URL scheme: ftp"));
    }

    #[test]
    fn test_truncate_for_log() {
        assert_eq!(truncate_for_log("short", 10), "short");
        assert_eq!(truncate_for_log("abcdefghij", 10), "abcdefghij");
        assert_eq!(truncate_for_log("abcdefghijk", 10), "abcdefghij...");
        assert_eq!(truncate_for_log("ééé", 2), "éé...");
    }

    #[tokio::test]
    async fn test_convert_html_produces_pdf() {
        let factory = MockBrowserFactory::new();
        let stats = factory.stats();
        let converter = converter(factory);

        let result = converter
            .convert_html("<p>x</p>", &ConversionOptions::default())
            .await;

        assert!(result.data().unwrap().starts_with(b"%PDF"));
        assert_eq!(stats.last_content().as_deref(), Some("<p>x</p>"));
        assert_eq!(stats.evaluations(), 1, "Images checked once");
        assert_eq!(converter.pool().stats().leased, 0, "Page returned");
        converter.pool().shutdown_async().await;
    }

    /// Verifies that transient failures are retried on a fresh page.
    #[tokio::test]
    async fn test_transient_failures_retried() {
        let factory = MockBrowserFactory::new().with_transient_failures(2);
        let stats = factory.stats();
        let converter = converter(factory);

        let result = converter
            .convert_html("<p>x</p>", &ConversionOptions::default())
            .await;

        assert!(result.is_success(), "got: {:?}", result.message());
        assert_eq!(stats.pdf_calls(), 3);
        assert_eq!(stats.pages_created(), 3, "Broken pages are discarded");
        converter.pool().shutdown_async().await;
    }

    /// Verifies that transient failures beyond the retries surface.
    #[tokio::test]
    async fn test_transient_failures_exhaust_retries() {
        let factory = MockBrowserFactory::new().with_transient_failures(10);
        let stats = factory.stats();
        let converter = converter(factory);

        let result = converter
            .convert_html("<p>x</p>", &ConversionOptions::default())
            .await;

        assert!(!result.is_success());
        assert_eq!(stats.pdf_calls(), 3, "One attempt plus two retries");
        assert!(matches!(result.cause(), Some(Html2PdfError::ConversionFailed { .. })));
        assert_eq!(converter.pool().stats().leased, 0);
        converter.pool().shutdown_async().await;
    }

    /// Verifies that permanent renderer failures are not retried.
    #[tokio::test]
    async fn test_permanent_failure_not_retried() {
        let factory = MockBrowserFactory::new().with_pdf_error("invalid page range");
        let stats = factory.stats();
        let converter = converter(factory);

        let result = converter
            .convert_html("<p>x</p>", &ConversionOptions::default())
            .await;

        assert_eq!(stats.pdf_calls(), 1);
        assert!(result.message().unwrap().contains("invalid page range"));
        assert_eq!(converter.pool().stats().idle, 1, "Page still usable");
        converter.pool().shutdown_async().await;
    }

    /// Verifies that invalid options are rejected before leasing a page.
    #[tokio::test]
    async fn test_invalid_options_rejected_early() {
        let factory = MockBrowserFactory::new();
        let stats = factory.stats();
        let converter = converter(factory);

        let options = ConversionOptions {
            scale: 5.0,
            ..Default::default()
        };
        let result = converter.convert_html("<p>x</p>", &options).await;

        assert!(matches!(result.cause(), Some(Html2PdfError::Configuration(_))));
        assert_eq!(stats.launches(), 0);
        converter.pool().shutdown_async().await;
    }

    /// Verifies header data rendering and explicit viewport sizing.
    #[tokio::test]
    async fn test_header_data_and_viewport() {
        let factory = MockBrowserFactory::new();
        let stats = factory.stats();
        let converter = converter(factory);

        let mut options = ConversionOptions::with_custom_size(8.0, 10.0);
        options.header = Some(
            HeaderFooter::new("<span>{{ company }}</span>")
                .with_data(serde_json::json!({ "company": "ACME" })),
        );
        options.footer = Some(HeaderFooter::new("<span class=\"pageNumber\"></span>"));
        options.wait_for_images = false;

        let result = converter.convert_html("<p>x</p>", &options).await;
        assert!(result.is_success());

        let params = stats.last_params().unwrap();
        assert_eq!(params.header_template.as_deref(), Some("<span>ACME</span>"));
        assert_eq!(
            params.footer_template.as_deref(),
            Some("<span class=\"pageNumber\"></span>")
        );
        assert_eq!(stats.last_viewport(), Some((768, 960)));
        assert_eq!(stats.evaluations(), 0);
        converter.pool().shutdown_async().await;
    }

    /// Verifies that a broken band template falls back to the raw markup.
    #[test]
    fn test_band_falls_back_to_raw_template() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let converter = runtime.block_on(async { converter(MockBrowserFactory::new()) });

        let band = HeaderFooter::new("{% if %}").with_data(serde_json::json!({}));
        assert_eq!(
            converter.render_band(Some(&band), "header").as_deref(),
            Some("{% if %}")
        );
        assert_eq!(converter.render_band(None, "footer"), None);
        converter.pool().shutdown();
    }

    /// Verifies that image evaluation errors do not fail the conversion.
    #[tokio::test]
    async fn test_image_check_errors_tolerated() {
        let factory = MockBrowserFactory::new().with_evaluate_error("Execution context was destroyed");
        let stats = factory.stats();
        let converter = converter(factory);

        let result = converter
            .convert_html("<p>x</p>", &ConversionOptions::default())
            .await;

        assert!(result.is_success());
        assert_eq!(stats.evaluations(), IMAGE_POLL_ATTEMPTS);
        converter.pool().shutdown_async().await;
    }

    #[tokio::test]
    async fn test_convert_url_navigation_failure() {
        let converter = converter(MockBrowserFactory::new());

        let result = converter
            .convert_url("https://unreachable.invalid/", &ConversionOptions::default())
            .await;
        assert!(result.message().unwrap().contains("Navigation failed"));

        let result = converter
            .convert_url("mailto:someone@example.com", &ConversionOptions::default())
            .await;
        assert!(matches!(result.cause(), Some(Html2PdfError::Configuration(_))));
        converter.pool().shutdown_async().await;
    }
}
