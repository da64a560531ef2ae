//! Template engine binding.
//!
//! The pipeline treats templating as an opaque call: a template key or
//! inline source plus a JSON model in, an HTML string out. [`TemplateEngine`]
//! is that call; [`TeraTemplateEngine`] implements it with Tera.

use std::path::Path;

use tera::{Context, Tera};

/// Error type for template rendering.
#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    /// Tera rejected the template or failed while rendering it.
    #[error("Template error: {0}")]
    Tera(#[from] tera::Error),

    /// A template file does not exist.
    #[error("Template file not found: {0}")]
    NotFound(String),

    /// A template file could not be read.
    #[error("Failed to read template: {0}")]
    Io(#[from] std::io::Error),

    /// The model could not be serialized into a template context.
    #[error("Invalid template model: {0}")]
    Model(#[from] serde_json::Error),
}

impl TemplateError {
    /// Renders the full cause chain, which is where Tera keeps the detail.
    pub fn detailed(&self) -> String {
        let mut message = self.to_string();
        let mut source = std::error::Error::source(self);
        while let Some(cause) = source {
            message.push_str(": ");
            message.push_str(&cause.to_string());
            source = cause.source();
        }
        message
    }
}

/// Renders a template with a model into HTML.
pub trait TemplateEngine: Send + Sync {
    /// Renders `template`, which is either the key of a registered template
    /// or inline template source.
    fn render(&self, template: &str, model: &serde_json::Value) -> Result<String, TemplateError>;
}

/// [`TemplateEngine`] backed by Tera.
///
/// Registered templates (loaded with [`from_glob`](Self::from_glob) or
/// [`add_template`](Self::add_template)) are looked up by name; any other
/// string is rendered as inline source.
///
/// # Example
///
/// ```rust
/// use html2pdf_pool::template::{TemplateEngine, TeraTemplateEngine};
///
/// let engine = TeraTemplateEngine::new();
/// let html = engine
///     .render("<h1>{{ title }}</h1>", &serde_json::json!({ "title": "Invoice" }))
///     .unwrap();
/// assert_eq!(html, "<h1>Invoice</h1>");
/// ```
pub struct TeraTemplateEngine {
    tera: Tera,
    autoescape: bool,
}

impl TeraTemplateEngine {
    /// An engine with no registered templates and HTML autoescaping on.
    pub fn new() -> Self {
        Self {
            tera: Tera::default(),
            autoescape: true,
        }
    }

    /// Registers every template matching `glob`, e.g. `templates/**/*.html`.
    ///
    /// Templates are named by their path relative to the glob's directory.
    pub fn from_glob(glob: &str) -> Result<Self, TemplateError> {
        let tera = Tera::new(glob)?;
        log::info!(
            "✅ Template engine loaded {} templates from {}",
            tera.get_template_names().count(),
            glob
        );
        Ok(Self {
            tera,
            autoescape: true,
        })
    }

    /// Turns HTML autoescaping of inline templates on or off.
    ///
    /// Registered templates follow Tera's extension-based rule.
    pub fn with_autoescape(mut self, autoescape: bool) -> Self {
        self.autoescape = autoescape;
        self
    }

    /// Registers `source` under `name`.
    pub fn add_template(&mut self, name: &str, source: &str) -> Result<(), TemplateError> {
        self.tera.add_raw_template(name, source)?;
        Ok(())
    }

    /// Registers the file at `path` under `name`.
    pub fn add_template_file(&mut self, name: &str, path: &Path) -> Result<(), TemplateError> {
        if !path.is_file() {
            return Err(TemplateError::NotFound(path.display().to_string()));
        }
        self.tera.add_template_file(path, Some(name))?;
        Ok(())
    }

    fn is_registered(&self, name: &str) -> bool {
        self.tera.get_template_names().any(|n| n == name)
    }
}

impl Default for TeraTemplateEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TeraTemplateEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TeraTemplateEngine")
            .field("templates", &self.tera.get_template_names().count())
            .field("autoescape", &self.autoescape)
            .finish()
    }
}

fn context_for(model: &serde_json::Value) -> Result<Context, TemplateError> {
    if model.is_null() {
        return Ok(Context::new());
    }
    Ok(Context::from_serialize(model)?)
}

impl TemplateEngine for TeraTemplateEngine {
    fn render(&self, template: &str, model: &serde_json::Value) -> Result<String, TemplateError> {
        let context = context_for(model)?;
        if self.is_registered(template) {
            log::debug!("Rendering registered template '{}'", template);
            return Ok(self.tera.render(template, &context)?);
        }
        Ok(Tera::one_off(template, &context, self.autoescape)?)
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
