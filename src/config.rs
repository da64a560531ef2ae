//! Configuration for page pool limits and lifecycle.
//!
//! This module provides [`PoolOptions`] and [`PoolOptionsBuilder`] for
//! configuring how many pages may be leased at once, how long a page lives,
//! how the browser is launched, and how long shutdown may take.
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use html2pdf_pool::PoolOptionsBuilder;
//!
//! let options = PoolOptionsBuilder::new()
//!     .min_instances(2)
//!     .max_instances(8)
//!     .max_lifetime(Duration::from_secs(1800))
//!     .build()
//!     .expect("Invalid configuration");
//!
//! assert_eq!(options.max_instances, 8);
//! ```
//!
//! # Environment Configuration
//!
//! When the `env-config` feature is enabled, options can be loaded from
//! environment variables and an optional `app.env` file:
//!
//! ```rust,ignore
//! use html2pdf_pool::config::env::from_env;
//!
//! let options = from_env()?;
//! ```
//!
//! See [`mod@env`] module for available environment variables.

use std::path::PathBuf;
use std::time::Duration;

use crate::retry::RetryPolicy;

/// Pool limits and browser lifecycle settings.
///
/// Immutable once the pool is built. Use [`PoolOptionsBuilder`] for
/// validation.
///
/// # Fields Overview
///
/// | Field | Default | Description |
/// |-------|---------|-------------|
/// | `min_instances` | 1 | Pages created by warmup |
/// | `max_instances` | 5 | Pages leased at once |
/// | `max_lifetime` | 60 min | Page age before it is closed |
/// | `acquire_timeout` | 30s | Wait for a free slot |
/// | `launch_args` | none | Extra browser flags |
/// | `headless` | true | Run without a window |
/// | `chrome_path` | auto | Browser binary |
/// | `sweep_interval` | 5 min | Background sweep period |
/// | `creation_retry` | 3 x 1s linear | Page construction retries |
/// | `shutdown_timeout` | 10s | Graceful teardown budget |
/// | `process_name` | `chrome` | Name matched by forced cleanup |
///
/// # Example
///
/// ```rust
/// use html2pdf_pool::PoolOptions;
///
/// let options = PoolOptions::default();
/// assert_eq!(options.max_instances, 5);
/// ```
#[derive(Debug, Clone)]
pub struct PoolOptions {
    /// Pages pre-created by [`PagePool::warmup`](crate::PagePool::warmup).
    ///
    /// Must be greater than 0 and at most `max_instances`.
    pub min_instances: usize,

    /// Maximum number of pages leased at the same time.
    ///
    /// Sizes the admission gate. Callers beyond this wait up to
    /// `acquire_timeout`.
    pub max_instances: usize,

    /// Age after which a page is closed instead of reused.
    ///
    /// Chrome pages accumulate memory over time; expired pages are replaced
    /// on the next acquire.
    pub max_lifetime: Duration,

    /// How long [`acquire`](crate::PagePool::acquire) waits for a slot
    /// before failing with [`PoolExhausted`](crate::Html2PdfError::PoolExhausted).
    pub acquire_timeout: Duration,

    /// Additional command-line flags passed to the browser.
    pub launch_args: Vec<String>,

    /// Run the browser without a window.
    pub headless: bool,

    /// Browser binary. When `None`, a local install is detected or a
    /// compatible build is downloaded on first launch.
    pub chrome_path: Option<PathBuf>,

    /// Interval between background sweeps of idle, invalid pages.
    pub sweep_interval: Duration,

    /// Retries for page construction, including browser launch.
    pub creation_retry: RetryPolicy,

    /// Budget for draining leases and for graceful teardown during
    /// shutdown. Past it, the browser is killed.
    pub shutdown_timeout: Duration,

    /// Process name matched by the forced-shutdown fallback. `None`
    /// disables name-based cleanup.
    pub process_name: Option<String>,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            min_instances: 1,
            max_instances: 5,
            max_lifetime: Duration::from_secs(60 * 60),
            acquire_timeout: Duration::from_secs(30),
            launch_args: Vec::new(),
            headless: true,
            chrome_path: None,
            sweep_interval: Duration::from_secs(5 * 60),
            creation_retry: RetryPolicy::linear(3, Duration::from_secs(1)),
            shutdown_timeout: Duration::from_secs(10),
            process_name: Some("chrome".to_string()),
        }
    }
}

/// Builder for [`PoolOptions`] with validation.
///
/// # Validation
///
/// The [`build()`](Self::build) method checks:
/// - `min_instances` and `max_instances` are greater than 0
/// - `min_instances` does not exceed `max_instances`
/// - `max_lifetime`, `acquire_timeout` and `sweep_interval` are non-zero
#[derive(Debug, Clone, Default)]
pub struct PoolOptionsBuilder {
    options: PoolOptions,
}

impl PoolOptionsBuilder {
    /// Create a new builder with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of pages created by warmup.
    pub fn min_instances(mut self, count: usize) -> Self {
        self.options.min_instances = count;
        self
    }

    /// Set the maximum number of concurrently leased pages.
    pub fn max_instances(mut self, count: usize) -> Self {
        self.options.max_instances = count;
        self
    }

    /// Set the page lifetime.
    pub fn max_lifetime(mut self, lifetime: Duration) -> Self {
        self.options.max_lifetime = lifetime;
        self
    }

    /// Set the acquire timeout.
    ///
    /// # Example
    ///
    /// ```rust
    /// use std::time::Duration;
    /// use html2pdf_pool::PoolOptionsBuilder;
    ///
    /// let options = PoolOptionsBuilder::new()
    ///     .acquire_timeout(Duration::from_secs(5))
    ///     .build()
    ///     .unwrap();
    ///
    /// assert_eq!(options.acquire_timeout, Duration::from_secs(5));
    /// ```
    pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.options.acquire_timeout = timeout;
        self
    }

    /// Append one browser flag, such as `--lang=de`.
    pub fn launch_arg(mut self, arg: impl Into<String>) -> Self {
        self.options.launch_args.push(arg.into());
        self
    }

    /// Replace the extra browser flags.
    pub fn launch_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options.launch_args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Run headless or with a window.
    pub fn headless(mut self, headless: bool) -> Self {
        self.options.headless = headless;
        self
    }

    /// Use a specific browser binary.
    pub fn chrome_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.options.chrome_path = Some(path.into());
        self
    }

    /// Set the background sweep interval.
    pub fn sweep_interval(mut self, interval: Duration) -> Self {
        self.options.sweep_interval = interval;
        self
    }

    /// Set the page construction retry policy.
    pub fn creation_retry(mut self, policy: RetryPolicy) -> Self {
        self.options.creation_retry = policy;
        self
    }

    /// Set the shutdown budget.
    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.options.shutdown_timeout = timeout;
        self
    }

    /// Set or clear the process name used by forced cleanup.
    pub fn process_name(mut self, name: Option<String>) -> Self {
        self.options.process_name = name;
        self
    }

    /// Build and validate the options.
    ///
    /// # Errors
    ///
    /// Returns a description of the first violated rule.
    ///
    /// # Example
    ///
    /// ```rust
    /// use html2pdf_pool::PoolOptionsBuilder;
    ///
    /// assert!(PoolOptionsBuilder::new().max_instances(3).build().is_ok());
    /// assert!(PoolOptionsBuilder::new().max_instances(0).build().is_err());
    /// assert!(
    ///     PoolOptionsBuilder::new()
    ///         .min_instances(4)
    ///         .max_instances(2)
    ///         .build()
    ///         .is_err()
    /// );
    /// ```
    pub fn build(self) -> std::result::Result<PoolOptions, String> {
        let options = self.options;

        if options.max_instances == 0 {
            return Err("max_instances must be greater than 0".to_string());
        }
        if options.min_instances == 0 {
            return Err("min_instances must be greater than 0".to_string());
        }
        if options.min_instances > options.max_instances {
            return Err("min_instances cannot exceed max_instances".to_string());
        }
        if options.max_lifetime.is_zero() {
            return Err("max_lifetime must be greater than 0".to_string());
        }
        if options.acquire_timeout.is_zero() {
            return Err("acquire_timeout must be greater than 0".to_string());
        }
        if options.sweep_interval.is_zero() {
            return Err("sweep_interval must be greater than 0".to_string());
        }

        Ok(options)
    }
}

// ============================================================================
// Environment Configuration (feature-gated)
// ============================================================================

/// Environment-based configuration loading.
///
/// This module is only available when the `env-config` feature is enabled.
///
/// # Environment File
///
/// Variables are loaded with `dotenvy` from an optional `app.env` file in
/// the current directory, then read from the process environment.
///
/// # Environment Variables
///
/// | Variable | Type | Default | Description |
/// |----------|------|---------|-------------|
/// | `BROWSER_MIN_INSTANCES` | usize | 1 | Warmup page count |
/// | `BROWSER_MAX_INSTANCES` | usize | 5 | Concurrent page limit |
/// | `BROWSER_MAX_LIFETIME_MINUTES` | u64 | 60 | Page lifetime |
/// | `BROWSER_ACQUIRE_TIMEOUT_SECONDS` | u64 | 30 | Acquire timeout |
/// | `BROWSER_HEADLESS` | bool | true | Headless mode |
/// | `BROWSER_LAUNCH_ARGS` | String | none | Whitespace-separated flags |
/// | `BROWSER_SWEEP_INTERVAL_SECONDS` | u64 | 300 | Sweep period |
/// | `BROWSER_SHUTDOWN_TIMEOUT_SECONDS` | u64 | 10 | Shutdown budget |
/// | `CHROME_PATH` | String | auto | Custom Chrome binary path |
///
/// # Example `app.env` File
///
/// ```text
/// BROWSER_MAX_INSTANCES=8
/// BROWSER_MAX_LIFETIME_MINUTES=30
/// BROWSER_LAUNCH_ARGS=--lang=en-US --font-render-hinting=none
/// # CHROME_PATH=/usr/bin/google-chrome
/// ```
#[cfg(feature = "env-config")]
pub mod env {
    use super::*;
    use crate::error::Html2PdfError;

    /// Default environment file name.
    pub const ENV_FILE_NAME: &str = "app.env";

    /// Load environment variables from the `app.env` file.
    pub fn load_env_file() -> Result<PathBuf, dotenvy::Error> {
        dotenvy::from_filename(ENV_FILE_NAME)
    }

    fn var<T: std::str::FromStr>(key: &str, default: T) -> T {
        match std::env::var(key) {
            Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
                log::warn!("⚠️ Ignoring unparseable {}={:?}, using default", key, raw);
                default
            }),
            Err(_) => default,
        }
    }

    /// Load pool options from environment variables.
    ///
    /// Also loads `app.env` if present. Missing or unparseable variables
    /// fall back to the defaults of [`PoolOptions`].
    ///
    /// # Errors
    ///
    /// Returns [`Html2PdfError::Configuration`] if the resulting values fail
    /// validation.
    pub fn from_env() -> Result<PoolOptions, Html2PdfError> {
        match load_env_file() {
            Ok(path) => log::info!("📁 Loaded configuration from: {:?}", path),
            Err(e) => log::debug!(
                "📁 No {} file found or failed to load: {} (using environment variables and defaults)",
                ENV_FILE_NAME,
                e
            ),
        }

        let defaults = PoolOptions::default();
        let min_instances = var("BROWSER_MIN_INSTANCES", defaults.min_instances);
        let max_instances = var("BROWSER_MAX_INSTANCES", defaults.max_instances);
        let lifetime_minutes = var("BROWSER_MAX_LIFETIME_MINUTES", 60u64);
        let acquire_seconds = var("BROWSER_ACQUIRE_TIMEOUT_SECONDS", 30u64);
        let headless = var("BROWSER_HEADLESS", defaults.headless);
        let sweep_seconds = var("BROWSER_SWEEP_INTERVAL_SECONDS", 300u64);
        let shutdown_seconds = var("BROWSER_SHUTDOWN_TIMEOUT_SECONDS", 10u64);
        let launch_args: Vec<String> = std::env::var("BROWSER_LAUNCH_ARGS")
            .map(|raw| raw.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default();

        log::info!("🔧 Loading pool configuration from environment:");
        log::info!("   - Instances: {}..={}", min_instances, max_instances);
        log::info!("   - Page lifetime: {}min", lifetime_minutes);
        log::info!("   - Acquire timeout: {}s", acquire_seconds);
        log::info!("   - Headless: {}", headless);
        log::info!("   - Launch args: {:?}", launch_args);
        log::info!("   - Sweep interval: {}s", sweep_seconds);

        let mut builder = PoolOptionsBuilder::new()
            .min_instances(min_instances)
            .max_instances(max_instances)
            .max_lifetime(Duration::from_secs(lifetime_minutes * 60))
            .acquire_timeout(Duration::from_secs(acquire_seconds))
            .headless(headless)
            .launch_args(launch_args)
            .sweep_interval(Duration::from_secs(sweep_seconds))
            .shutdown_timeout(Duration::from_secs(shutdown_seconds));

        if let Some(path) = chrome_path_from_env() {
            log::info!("   - Chrome path: {}", path);
            builder = builder.chrome_path(path);
        }

        builder.build().map_err(Html2PdfError::Configuration)
    }

    /// Get the Chrome path from the `CHROME_PATH` variable.
    ///
    /// Call [`from_env`] or [`load_env_file`] first when the value lives in
    /// `app.env`.
    pub fn chrome_path_from_env() -> Option<String> {
        std::env::var("CHROME_PATH")
            .ok()
            .filter(|p| !p.trim().is_empty())
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    /// Verifies that the builder sets every value.
    #[test]
    fn test_options_builder() {
        let options = PoolOptionsBuilder::new()
            .min_instances(2)
            .max_instances(10)
            .max_lifetime(Duration::from_secs(7200))
            .acquire_timeout(Duration::from_secs(5))
            .launch_arg("--lang=de")
            .headless(false)
            .chrome_path("/opt/chrome/chrome")
            .sweep_interval(Duration::from_secs(60))
            .shutdown_timeout(Duration::from_secs(3))
            .process_name(None)
            .build()
            .unwrap();

        assert_eq!(options.min_instances, 2);
        assert_eq!(options.max_instances, 10);
        assert_eq!(options.max_lifetime.as_secs(), 7200);
        assert_eq!(options.acquire_timeout.as_secs(), 5);
        assert_eq!(options.launch_args, vec!["--lang=de".to_string()]);
        assert!(!options.headless);
        assert_eq!(options.chrome_path, Some(PathBuf::from("/opt/chrome/chrome")));
        assert_eq!(options.sweep_interval.as_secs(), 60);
        assert_eq!(options.shutdown_timeout.as_secs(), 3);
        assert_eq!(options.process_name, None);
    }

    /// Verifies the instance count rules.
    #[test]
    fn test_options_validation() {
        let err = PoolOptionsBuilder::new().max_instances(0).build().unwrap_err();
        assert!(err.contains("max_instances must be greater than 0"), "got: {}", err);

        let err = PoolOptionsBuilder::new().min_instances(0).build().unwrap_err();
        assert!(err.contains("min_instances must be greater than 0"), "got: {}", err);

        let err = PoolOptionsBuilder::new()
            .min_instances(6)
            .max_instances(5)
            .build()
            .unwrap_err();
        assert!(err.contains("min_instances cannot exceed max_instances"), "got: {}", err);

        assert!(
            PoolOptionsBuilder::new()
                .min_instances(5)
                .max_instances(5)
                .build()
                .is_ok()
        );
    }

    /// Verifies that zero durations are rejected.
    #[test]
    fn test_zero_durations_rejected() {
        assert!(PoolOptionsBuilder::new().max_lifetime(Duration::ZERO).build().is_err());
        assert!(PoolOptionsBuilder::new().acquire_timeout(Duration::ZERO).build().is_err());
        assert!(PoolOptionsBuilder::new().sweep_interval(Duration::ZERO).build().is_err());
    }

    /// Verifies the default values.
    #[test]
    fn test_options_defaults() {
        let options = PoolOptions::default();

        assert_eq!(options.min_instances, 1);
        assert_eq!(options.max_instances, 5);
        assert_eq!(options.max_lifetime, Duration::from_secs(3600));
        assert_eq!(options.acquire_timeout, Duration::from_secs(30));
        assert!(options.launch_args.is_empty());
        assert!(options.headless);
        assert_eq!(options.sweep_interval, Duration::from_secs(300));
        assert_eq!(options.creation_retry.max_retries, 3);
        assert_eq!(options.process_name.as_deref(), Some("chrome"));
    }

    /// Verifies that launch_args replaces previously appended flags.
    #[test]
    fn test_launch_args_replace() {
        let options = PoolOptionsBuilder::new()
            .launch_arg("--a")
            .launch_args(["--b", "--c"])
            .build()
            .unwrap();
        assert_eq!(options.launch_args, vec!["--b", "--c"]);
    }
}
