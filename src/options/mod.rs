//! Per-call options for PDF conversion and HTML generation.
//!
//! [`ConversionOptions`] describes the PDF: paper, orientation, margins,
//! header/footer, scale and readiness waits. [`HtmlOptions`] describes how a
//! rendered template is turned into a complete HTML document.
//!
//! Both derive serde traits so they can be loaded from configuration files
//! or request bodies. Ready-made option sets live in [`presets`].
//!
//! # Example
//!
//! ```rust
//! use html2pdf_pool::{ConversionOptions, PaperFormat};
//!
//! let options = ConversionOptions {
//!     format: PaperFormat::Letter,
//!     landscape: true,
//!     ..Default::default()
//! };
//! assert_ne!(options, ConversionOptions::default());
//! ```

mod length;
pub mod presets;

pub use length::{PX_PER_INCH, PaperFormat, parse_length};

use std::hash::{Hash, Hasher};
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Html2PdfError, Result};
use crate::renderer::PdfParams;

/// Default page load timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Smallest scale the renderer accepts.
pub const MIN_SCALE: f64 = 0.1;

/// Largest scale the renderer accepts.
pub const MAX_SCALE: f64 = 2.0;

/// `prefers-color-scheme` value emulated while rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ColorScheme {
    /// `light`
    #[default]
    Light,
    /// `dark`
    Dark,
    /// `no-preference`
    NoPreference,
}

impl ColorScheme {
    /// The CSS media feature value.
    pub fn as_css(self) -> &'static str {
        match self {
            ColorScheme::Light => "light",
            ColorScheme::Dark => "dark",
            ColorScheme::NoPreference => "no-preference",
        }
    }
}

/// Page margins as CSS lengths.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct PageMargins {
    /// Top margin.
    pub top: String,
    /// Bottom margin.
    pub bottom: String,
    /// Left margin.
    pub left: String,
    /// Right margin.
    pub right: String,
}

impl PageMargins {
    /// The same length on all four sides.
    pub fn uniform(length: impl Into<String>) -> Self {
        let length = length.into();
        Self {
            top: length.clone(),
            bottom: length.clone(),
            left: length.clone(),
            right: length,
        }
    }
}

impl Default for PageMargins {
    fn default() -> Self {
        Self::uniform("1cm")
    }
}

/// A header or footer band.
///
/// `template` is markup rendered by the browser in the page margin; the
/// browser fills elements with the classes `date`, `title`, `url`,
/// `pageNumber` and `totalPages`. When `data` is set the template is first
/// rendered through the template engine with `data` as its model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeaderFooter {
    /// Markup or template source.
    pub template: String,
    /// Model bound to `template`.
    pub data: Option<serde_json::Value>,
    /// Band height; the matching page margin is raised to at least this.
    pub height: String,
}

impl HeaderFooter {
    /// A static band with the default height.
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
            ..Default::default()
        }
    }

    /// Sets the band height.
    pub fn with_height(mut self, height: impl Into<String>) -> Self {
        self.height = height.into();
        self
    }

    /// Binds a model to the template.
    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }
}

impl Default for HeaderFooter {
    fn default() -> Self {
        Self {
            template: String::new(),
            data: None,
            height: "1cm".to_string(),
        }
    }
}

impl Hash for HeaderFooter {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.template.hash(state);
        // serde_json maps are ordered, so equal values serialize identically.
        self.data.as_ref().map(|d| d.to_string()).hash(state);
        self.height.hash(state);
    }
}

/// Options for turning HTML into PDF.
///
/// Equality and hashing cover every field. Floating point fields compare by
/// bit pattern, so equality is an equivalence relation even for `NaN`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversionOptions {
    /// Paper format; overridden per axis by `width` / `height`.
    pub format: PaperFormat,
    /// Landscape orientation.
    pub landscape: bool,
    /// Page margins.
    pub margins: PageMargins,
    /// Optional header band.
    pub header: Option<HeaderFooter>,
    /// Optional footer band.
    pub footer: Option<HeaderFooter>,
    /// Print CSS backgrounds.
    pub print_background: bool,
    /// Rendering scale, 0.1 to 2.0.
    pub scale: f64,
    /// Explicit paper width in inches.
    pub width: Option<f64>,
    /// Explicit paper height in inches.
    pub height: Option<f64>,
    /// Page ranges such as `1-5, 8, 11-13`.
    pub page_ranges: Option<String>,
    /// Wait for `<img>` elements to finish loading before printing.
    pub wait_for_images: bool,
    /// Page load timeout.
    #[serde(with = "millis")]
    pub timeout: Duration,
    /// Emulated `prefers-color-scheme`.
    pub color_scheme: ColorScheme,
}

impl Default for ConversionOptions {
    fn default() -> Self {
        Self {
            format: PaperFormat::A4,
            landscape: false,
            margins: PageMargins::default(),
            header: None,
            footer: None,
            print_background: true,
            scale: 1.0,
            width: None,
            height: None,
            page_ranges: None,
            wait_for_images: true,
            timeout: DEFAULT_TIMEOUT,
            color_scheme: ColorScheme::Light,
        }
    }
}

impl ConversionOptions {
    fn float_key(&self) -> (u64, Option<u64>, Option<u64>) {
        (
            self.scale.to_bits(),
            self.width.map(f64::to_bits),
            self.height.map(f64::to_bits),
        )
    }

    /// Explicit viewport in CSS pixels, when both `width` and `height` are set.
    pub fn viewport(&self) -> Option<(u32, u32)> {
        match (self.width, self.height) {
            (Some(w), Some(h)) if w > 0.0 && h > 0.0 => Some((
                (w * PX_PER_INCH).round() as u32,
                (h * PX_PER_INCH).round() as u32,
            )),
            _ => None,
        }
    }

    /// Resolves the options into the renderer's shape.
    ///
    /// `header` and `footer` are the final markup for the bands (already
    /// rendered through the template engine when they carry data).
    ///
    /// # Errors
    ///
    /// Returns [`Html2PdfError::Configuration`] for unparseable margins or
    /// band heights, a scale outside 0.1..=2.0, or a non-positive size.
    pub fn resolve(&self, header: Option<String>, footer: Option<String>) -> Result<PdfParams> {
        if !(MIN_SCALE..=MAX_SCALE).contains(&self.scale) {
            return Err(Html2PdfError::Configuration(format!(
                "scale must be between {} and {}, got {}",
                MIN_SCALE, MAX_SCALE, self.scale
            )));
        }

        let (format_width, format_height) = self.format.size_inches();
        let paper_width = positive_size("width", self.width)?.unwrap_or(format_width);
        let paper_height = positive_size("height", self.height)?.unwrap_or(format_height);

        let mut margin_top = parse_length(&self.margins.top)?;
        let mut margin_bottom = parse_length(&self.margins.bottom)?;
        if let Some(band) = &self.header {
            margin_top = margin_top.max(parse_length(&band.height)?);
        }
        if let Some(band) = &self.footer {
            margin_bottom = margin_bottom.max(parse_length(&band.height)?);
        }

        Ok(PdfParams {
            landscape: self.landscape,
            print_background: self.print_background,
            scale: self.scale,
            paper_width,
            paper_height,
            margin_top,
            margin_bottom,
            margin_left: parse_length(&self.margins.left)?,
            margin_right: parse_length(&self.margins.right)?,
            page_ranges: self
                .page_ranges
                .as_ref()
                .map(|r| r.trim().to_string())
                .filter(|r| !r.is_empty()),
            header_template: header,
            footer_template: footer,
            prefer_css_page_size: true,
        })
    }
}

fn positive_size(axis: &str, value: Option<f64>) -> Result<Option<f64>> {
    match value {
        Some(v) if !(v.is_finite() && v > 0.0) => Err(Html2PdfError::Configuration(format!(
            "{} must be a positive number of inches, got {}",
            axis, v
        ))),
        other => Ok(other),
    }
}

impl PartialEq for ConversionOptions {
    fn eq(&self, other: &Self) -> bool {
        self.format == other.format
            && self.landscape == other.landscape
            && self.margins == other.margins
            && self.header == other.header
            && self.footer == other.footer
            && self.print_background == other.print_background
            && self.float_key() == other.float_key()
            && self.page_ranges == other.page_ranges
            && self.wait_for_images == other.wait_for_images
            && self.timeout == other.timeout
            && self.color_scheme == other.color_scheme
    }
}

impl Eq for ConversionOptions {}

impl Hash for ConversionOptions {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.format.hash(state);
        self.landscape.hash(state);
        self.margins.hash(state);
        self.header.hash(state);
        self.footer.hash(state);
        self.print_background.hash(state);
        self.float_key().hash(state);
        self.page_ranges.hash(state);
        self.wait_for_images.hash(state);
        self.timeout.hash(state);
        self.color_scheme.hash(state);
    }
}

/// Options for turning rendered template output into a complete document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct HtmlOptions {
    /// Directory relative resources resolve against; emitted as `<base href>`.
    pub base_path: Option<PathBuf>,
    /// Declared document encoding.
    pub encoding: String,
    /// Emit a `width=device-width` viewport meta tag.
    pub include_viewport: bool,
    /// CSS added to the document head.
    pub additional_css: Option<String>,
    /// JavaScript added at the end of the body.
    pub additional_js: Option<String>,
}

impl Default for HtmlOptions {
    fn default() -> Self {
        Self {
            base_path: None,
            encoding: "UTF-8".to_string(),
            include_viewport: true,
            additional_css: None,
            additional_js: None,
        }
    }
}

/// Serializes a [`Duration`] as whole milliseconds.
mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
