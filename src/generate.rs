//! HTML generation pipeline.
//!
//! [`HtmlGenerator`] renders a template with a model through a
//! [`TemplateEngine`] and turns the output into a complete HTML document:
//!
//! - **Fragments** (no `<!DOCTYPE` or `<html` prefix) are wrapped in a
//!   minimal document shell carrying the encoding, viewport, base URL and the
//!   additional CSS and JavaScript of the [`HtmlOptions`].
//! - **Full documents** are kept as they are, with the additional CSS
//!   inserted before the last `</head>` and the JavaScript before the last
//!   `</body>`.
//!
//! Template errors are deterministic, so generation is never retried.
//!
//! # Example
//!
//! ```rust
//! use html2pdf_pool::HtmlOptions;
//! use html2pdf_pool::generate::{Generator, HtmlGenerator};
//!
//! let generator = HtmlGenerator::default();
//! let result = generator.generate(
//!     "<h1>{{ title }}</h1>",
//!     &serde_json::json!({ "title": "Invoice" }),
//!     &HtmlOptions::default(),
//! );
//!
//! let html = result.html().unwrap();
//! assert!(html.starts_with("<!DOCTYPE html>"));
//! assert!(html.contains("<h1>Invoice</h1>"));
//! ```

use std::fmt::Write as _;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use crate::error::Html2PdfError;
use crate::options::HtmlOptions;
use crate::service::{GenerationResult, Outcome};
use crate::template::{TemplateEngine, TemplateError, TeraTemplateEngine};

/// Produces complete HTML documents from templates.
pub trait Generator: Send + Sync {
    /// Renders `template` (a registered template key or inline source) with
    /// `model`.
    fn generate(
        &self,
        template: &str,
        model: &serde_json::Value,
        options: &HtmlOptions,
    ) -> GenerationResult;

    /// Renders the template stored at `path`.
    ///
    /// Relative resources resolve against the file's directory unless
    /// `options.base_path` says otherwise.
    fn generate_from_file(
        &self,
        path: &Path,
        model: &serde_json::Value,
        options: &HtmlOptions,
    ) -> GenerationResult;
}

/// [`Generator`] over any [`TemplateEngine`].
#[derive(Clone)]
pub struct HtmlGenerator {
    engine: Arc<dyn TemplateEngine>,
}

impl HtmlGenerator {
    /// A generator rendering through `engine`.
    pub fn new(engine: Arc<dyn TemplateEngine>) -> Self {
        Self { engine }
    }

    /// The template engine in use.
    pub fn engine(&self) -> &Arc<dyn TemplateEngine> {
        &self.engine
    }
}

impl Default for HtmlGenerator {
    /// A generator over a fresh [`TeraTemplateEngine`].
    fn default() -> Self {
        Self::new(Arc::new(TeraTemplateEngine::new()))
    }
}

impl std::fmt::Debug for HtmlGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HtmlGenerator").finish_non_exhaustive()
    }
}

fn template_failure(error: TemplateError, started: Instant) -> GenerationResult {
    let message = error.detailed();
    log::error!("❌ Template rendering failed: {}", message);
    Outcome::from_error(
        Html2PdfError::GenerationFailed {
            message,
            source: Some(error),
        },
        started.elapsed(),
    )
}

impl Generator for HtmlGenerator {
    fn generate(
        &self,
        template: &str,
        model: &serde_json::Value,
        options: &HtmlOptions,
    ) -> GenerationResult {
        let started = Instant::now();

        match self.engine.render(template, model) {
            Ok(rendered) => {
                let html = complete_document(&rendered, options);
                log::debug!(
                    "✅ Generated {} bytes of HTML in {:?}",
                    html.len(),
                    started.elapsed()
                );
                Outcome::success(html, started.elapsed())
            }
            Err(e) => template_failure(e, started),
        }
    }

    fn generate_from_file(
        &self,
        path: &Path,
        model: &serde_json::Value,
        options: &HtmlOptions,
    ) -> GenerationResult {
        let started = Instant::now();

        if !path.is_file() {
            return template_failure(TemplateError::NotFound(path.display().to_string()), started);
        }

        let source = match std::fs::read_to_string(path) {
            Ok(source) => source,
            Err(e) => return template_failure(TemplateError::Io(e), started),
        };
        log::debug!("📁 Loaded template {} ({} bytes)", path.display(), source.len());

        let mut options = options.clone();
        if options.base_path.is_none() {
            options.base_path = path.parent().map(Path::to_path_buf);
        }

        match self.generate(&source, model, &options) {
            Outcome::Success { payload, .. } => Outcome::success(payload, started.elapsed()),
            Outcome::Failure(failure) => Outcome::Failure(failure),
        }
    }
}

// ============================================================================
// Document Assembly
// ============================================================================

/// Whether `html` already is a full document (starts with `<!DOCTYPE` or
/// `<html`, ignoring leading whitespace and ASCII case).
pub fn is_full_document(html: &str) -> bool {
    let head = html.trim_start().as_bytes();
    [b"<!doctype".as_slice(), b"<html".as_slice()]
        .iter()
        .any(|prefix| head.len() >= prefix.len() && head[..prefix.len()].eq_ignore_ascii_case(prefix))
}

/// Wraps fragments in a document shell and splices extras into full
/// documents.
pub fn complete_document(html: &str, options: &HtmlOptions) -> String {
    if is_full_document(html) {
        splice_extras(html, options)
    } else {
        wrap_fragment(html, options)
    }
}

fn wrap_fragment(content: &str, options: &HtmlOptions) -> String {
    let mut doc = String::with_capacity(content.len() + 256);
    doc.push_str("<!DOCTYPE html>\n<html>\n<head>\n");
    let _ = writeln!(doc, "<meta charset=\"{}\">", escape_attribute(&options.encoding));
    if options.include_viewport {
        doc.push_str("<meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">\n");
    }
    if let Some(href) = options.base_path.as_deref().and_then(base_href) {
        let _ = writeln!(doc, "<base href=\"{}\">", escape_attribute(&href));
    }
    if let Some(css) = non_empty(&options.additional_css) {
        let _ = writeln!(doc, "<style>\n{}\n</style>", css);
    }
    doc.push_str("</head>\n<body>\n");
    doc.push_str(content);
    doc.push('\n');
    if let Some(js) = non_empty(&options.additional_js) {
        let _ = writeln!(doc, "<script>\n{}\n</script>", js);
    }
    doc.push_str("</body>\n</html>");
    doc
}

fn splice_extras(html: &str, options: &HtmlOptions) -> String {
    let mut doc = html.to_string();

    if let Some(css) = non_empty(&options.additional_css) {
        match rfind_tag(&doc, "</head>") {
            Some(at) => doc.insert_str(at, &format!("<style>\n{}\n</style>\n", css)),
            None => log::warn!("⚠️ Document has no </head>, additional CSS not inserted"),
        }
    }

    if let Some(js) = non_empty(&options.additional_js) {
        let script = format!("<script>\n{}\n</script>\n", js);
        match rfind_tag(&doc, "</body>") {
            Some(at) => doc.insert_str(at, &script),
            None => doc.push_str(&script),
        }
    }

    doc
}

/// An extra CSS/JS block, unless it is absent or blank.
fn non_empty(extra: &Option<String>) -> Option<&str> {
    extra.as_deref().filter(|s| !s.trim().is_empty())
}

/// Byte offset of the last `tag`, matched ASCII case-insensitively.
fn rfind_tag(html: &str, tag: &str) -> Option<usize> {
    // ASCII lowercasing keeps byte offsets intact.
    html.to_ascii_lowercase().rfind(tag)
}

/// `file://` URL of a directory, with the trailing slash `<base>` needs.
fn base_href(dir: &Path) -> Option<String> {
    let absolute = std::path::absolute(dir).ok()?;
    match url::Url::from_directory_path(&absolute) {
        Ok(url) => Some(url.to_string()),
        Err(()) => {
            log::warn!("⚠️ Cannot express {} as a base URL", absolute.display());
            None
        }
    }
}

fn escape_attribute(value: &str) -> String {
    value.replace('&', "&amp;").replace('"', "&quot;")
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn count(haystack: &str, needle: &str) -> usize {
        haystack.to_ascii_lowercase().matches(needle).count()
    }

    #[test]
    fn test_full_document_detection() {
        assert!(is_full_document("<!DOCTYPE html><html></html>"));
        assert!(is_full_document("  \n<!doctype html>"));
        assert!(is_full_document("<HTML lang=\"en\"></HTML>"));
        assert!(!is_full_document("<div>fragment</div>"));
        assert!(!is_full_document("<htm"));
        assert!(!is_full_document(""));
    }

    /// Verifies the shell around a fragment.
    #[test]
    fn test_fragment_is_wrapped() {
        let options = HtmlOptions {
            additional_css: Some("body { color: red; }".to_string()),
            additional_js: Some("window.done = true;".to_string()),
            ..Default::default()
        };
        let html = complete_document("<p>Hi</p>", &options);

        assert!(html.starts_with("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"UTF-8\">"));
        assert!(html.contains("name=\"viewport\""));
        assert!(html.contains("<style>\nbody { color: red; }\n</style>\n</head>"));
        assert!(html.contains("<body>\n<p>Hi</p>\n<script>\nwindow.done = true;\n</script>\n</body>"));
        assert!(html.ends_with("</html>"));
        assert_eq!(count(&html, "<html"), 1);
    }

    #[test]
    fn test_fragment_without_viewport() {
        let options = HtmlOptions {
            include_viewport: false,
            encoding: "ISO-8859-1".to_string(),
            ..Default::default()
        };
        let html = complete_document("x", &options);
        assert!(!html.contains("viewport"));
        assert!(html.contains("<meta charset=\"ISO-8859-1\">"));
        assert!(!html.contains("<style>"));
        assert!(!html.contains("<script>"));
    }

    /// Verifies that extras go before the last closing tags, any case.
    #[test]
    fn test_full_document_is_spliced() {
        let source = "<!DOCTYPE html><HTML><HEAD><title>t</title></HEAD>\
                      <BODY><p>x</p><!-- </body> --></BODY></HTML>";
        let options = HtmlOptions {
            additional_css: Some("p{}".to_string()),
            additional_js: Some("go()".to_string()),
            ..Default::default()
        };
        let html = complete_document(source, &options);

        assert!(html.contains("<style>\np{}\n</style>\n</HEAD>"));
        assert!(html.contains("<script>\ngo()\n</script>\n</BODY></HTML>"));
        assert_eq!(count(&html, "<!doctype"), 1);
        assert_eq!(count(&html, "<html"), 1);
    }

    #[test]
    fn test_full_document_without_extras_is_untouched() {
        let source = "<html><body>same</body></html>";
        assert_eq!(complete_document(source, &HtmlOptions::default()), source);
    }

    /// Verifies that blank CSS or JS adds no empty block.
    #[test]
    fn test_blank_extras_are_skipped() {
        let options = HtmlOptions {
            additional_css: Some(String::new()),
            additional_js: Some("  \n".to_string()),
            ..Default::default()
        };

        let html = complete_document("<p>x</p>", &options);
        assert!(!html.contains("<style>"));
        assert!(!html.contains("<script>"));

        let source = "<html><head></head><body>same</body></html>";
        assert_eq!(complete_document(source, &options), source);
    }

    #[test]
    fn test_script_appended_without_body_close() {
        let options = HtmlOptions {
            additional_js: Some("go()".to_string()),
            ..Default::default()
        };
        let html = complete_document("<html><p>x</p>", &options);
        assert!(html.ends_with("<script>\ngo()\n</script>\n"));
    }

    #[test]
    #[cfg(unix)]
    fn test_base_href() {
        let options = HtmlOptions {
            base_path: Some("/srv/templates".into()),
            ..Default::default()
        };
        let html = complete_document("<img src=\"logo.png\">", &options);
        assert!(html.contains("<base href=\"file:///srv/templates/\">"));
    }

    #[test]
    fn test_generate_renders_model() {
        let generator = HtmlGenerator::default();
        let result = generator.generate(
            "<ul>{% for item in items %}<li>{{ item }}</li>{% endfor %}</ul>",
            &json!({ "items": ["a", "b"] }),
            &HtmlOptions::default(),
        );
        let html = result.html().unwrap();
        assert!(html.contains("<ul><li>a</li><li>b</li></ul>"));
        assert!(html.starts_with("<!DOCTYPE html>"));
    }

    /// Verifies that template errors become generation failures.
    #[test]
    fn test_generate_malformed_template() {
        let generator = HtmlGenerator::default();
        let result = generator.generate("{% if %}", &json!({}), &HtmlOptions::default());

        let failure = result.failure().unwrap();
        assert_eq!(failure.stage(), crate::service::Stage::Generation);
        assert!(matches!(
            failure.cause(),
            Some(Html2PdfError::GenerationFailed { source: Some(_), .. })
        ));
    }

    #[test]
    fn test_generate_from_missing_file() {
        let generator = HtmlGenerator::default();
        let path = Path::new("/definitely/not/here.html");
        let result = generator.generate_from_file(path, &json!(null), &HtmlOptions::default());
        assert_eq!(
            result.message(),
            Some("Template file not found: /definitely/not/here.html")
        );
    }
}
