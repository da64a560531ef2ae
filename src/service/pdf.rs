//! The orchestrating PDF service.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use uuid::Uuid;

use super::types::{ConversionResult, Failure, GenerationResult, Outcome};
use crate::convert::{Converter, PdfConverter};
use crate::error::Html2PdfError;
use crate::generate::{Generator, HtmlGenerator};
use crate::options::{ConversionOptions, HtmlOptions};
use crate::pool::PagePool;
use crate::template::{TemplateEngine, TemplateError, TeraTemplateEngine};

const GENERATION_CONTEXT: &str = "HTML generation failed";
const CONVERSION_CONTEXT: &str = "PDF conversion failed";

/// Composes HTML generation and PDF conversion.
///
/// Template requests run generation, then conversion; raw HTML and URL
/// requests go straight to conversion. Stage durations are measured
/// separately and summed. A failed generation never reaches the converter.
///
/// Every method returns a [`ConversionResult`]; nothing here returns `Err`
/// or panics on bad input.
///
/// # Example
///
/// ```rust,no_run
/// use html2pdf_pool::{Html2PdfService, PagePool};
/// use serde_json::json;
///
/// # async fn example() -> html2pdf_pool::Result<()> {
/// let pool = PagePool::builder().build()?.into_shared();
/// let service = Html2PdfService::with_pool(pool);
///
/// let result = service
///     .generate_pdf("<h1>Invoice {{ number }}</h1>", &json!({ "number": 42 }), None, None)
///     .await;
///
/// match result.into_result() {
///     Ok(pdf) => println!("{} bytes", pdf.len()),
///     Err(failure) => eprintln!("{}", failure),
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Html2PdfService {
    generator: Arc<dyn Generator>,
    converter: Arc<dyn Converter>,
}

impl Html2PdfService {
    /// A service over explicit collaborators.
    pub fn new(generator: Arc<dyn Generator>, converter: Arc<dyn Converter>) -> Self {
        Self {
            generator,
            converter,
        }
    }

    /// A service over `pool`, with one Tera engine shared by templates and
    /// header/footer bands.
    pub fn with_pool(pool: Arc<PagePool>) -> Self {
        Self::with_engine(pool, Arc::new(TeraTemplateEngine::new()))
    }

    /// A service over `pool` rendering templates with `engine`.
    pub fn with_engine(pool: Arc<PagePool>, engine: Arc<dyn TemplateEngine>) -> Self {
        let generator = HtmlGenerator::new(Arc::clone(&engine));
        let converter = PdfConverter::new(pool).with_engine(engine);
        Self::new(Arc::new(generator), Arc::new(converter))
    }

    /// The generation stage.
    pub fn generator(&self) -> &Arc<dyn Generator> {
        &self.generator
    }

    /// The conversion stage.
    pub fn converter(&self) -> &Arc<dyn Converter> {
        &self.converter
    }

    /// Render `template` with `model`, then convert the HTML to PDF.
    ///
    /// `template` is a registered template key or inline template source.
    /// Pass `&()` when the template needs no model.
    pub async fn generate_pdf<M: Serialize + ?Sized>(
        &self,
        template: &str,
        model: &M,
        pdf_options: Option<ConversionOptions>,
        html_options: Option<HtmlOptions>,
    ) -> ConversionResult {
        let op = Uuid::new_v4();
        log::info!("🚀 [{}] Generating PDF from template", op);

        let model = match model_value(model) {
            Ok(model) => model,
            Err(failure) => return self.generation_failed(op, failure),
        };
        let template = template.to_string();
        let html_options = html_options.unwrap_or_default();

        let generated = self
            .run_generation(move |generator| generator.generate(&template, &model, &html_options))
            .await;
        self.convert_generated(op, generated, pdf_options.unwrap_or_default())
            .await
    }

    /// Render the template file at `path` with `model`, then convert it.
    ///
    /// Relative resources in the template resolve against its directory
    /// unless `html_options.base_path` is set.
    pub async fn generate_pdf_from_file<M: Serialize + ?Sized>(
        &self,
        path: impl AsRef<Path>,
        model: &M,
        pdf_options: Option<ConversionOptions>,
        html_options: Option<HtmlOptions>,
    ) -> ConversionResult {
        let op = Uuid::new_v4();
        let path: PathBuf = path.as_ref().to_path_buf();
        log::info!("🚀 [{}] Generating PDF from template file {}", op, path.display());

        let model = match model_value(model) {
            Ok(model) => model,
            Err(failure) => return self.generation_failed(op, failure),
        };
        let html_options = html_options.unwrap_or_default();

        let generated = self
            .run_generation(move |generator| {
                generator.generate_from_file(&path, &model, &html_options)
            })
            .await;
        self.convert_generated(op, generated, pdf_options.unwrap_or_default())
            .await
    }

    /// Convert an HTML document to PDF.
    pub async fn generate_pdf_from_html(
        &self,
        html: &str,
        pdf_options: Option<ConversionOptions>,
    ) -> ConversionResult {
        let op = Uuid::new_v4();
        log::info!("🚀 [{}] Generating PDF from HTML ({} bytes)", op, html.len());

        let options = pdf_options.unwrap_or_default();
        let converted = self.converter.convert_html(html, &options).await;
        self.finish(op, converted, Duration::ZERO)
    }

    /// Convert the page at `url` to PDF.
    pub async fn generate_pdf_from_url(
        &self,
        url: &str,
        pdf_options: Option<ConversionOptions>,
    ) -> ConversionResult {
        let op = Uuid::new_v4();
        log::info!("🚀 [{}] Generating PDF from URL", op);

        let options = pdf_options.unwrap_or_default();
        let converted = self.converter.convert_url(url, &options).await;
        self.finish(op, converted, Duration::ZERO)
    }

    /// Runs a generation job on the blocking pool; templating and file reads
    /// must not stall the async workers.
    async fn run_generation<F>(&self, job: F) -> GenerationResult
    where
        F: FnOnce(&dyn Generator) -> GenerationResult + Send + 'static,
    {
        let generator = Arc::clone(&self.generator);
        match tokio::task::spawn_blocking(move || job(generator.as_ref())).await {
            Ok(outcome) => outcome,
            Err(e) => Outcome::from_error(
                Html2PdfError::generation(format!("Generation task failed: {}", e)),
                Duration::ZERO,
            ),
        }
    }

    async fn convert_generated(
        &self,
        op: Uuid,
        generated: GenerationResult,
        options: ConversionOptions,
    ) -> ConversionResult {
        let (html, generation_time) = match generated {
            Outcome::Success { payload, duration } => (payload, duration),
            Outcome::Failure(failure) => return self.generation_failed(op, failure),
        };
        log::debug!(
            "[{}] Generation took {:?} ({} bytes)",
            op,
            generation_time,
            html.len()
        );

        let converted = self.converter.convert_html(&html, &options).await;
        self.finish(op, converted, generation_time)
    }

    fn generation_failed(&self, op: Uuid, failure: Failure) -> ConversionResult {
        let failure = failure.context(GENERATION_CONTEXT);
        log::error!("❌ [{}] {}", op, failure);
        Outcome::Failure(failure)
    }

    /// Adds the generation time and the stage context to a conversion
    /// outcome.
    fn finish(&self, op: Uuid, converted: ConversionResult, generation_time: Duration) -> ConversionResult {
        match converted {
            Outcome::Success { payload, duration } => {
                let total = generation_time + duration;
                log::info!(
                    "✅ [{}] PDF ready: {} bytes in {:?} (generation {:?}, conversion {:?})",
                    op,
                    payload.len(),
                    total,
                    generation_time,
                    duration
                );
                Outcome::success(payload, total)
            }
            Outcome::Failure(failure) => {
                let failure = failure.context(CONVERSION_CONTEXT).after(generation_time);
                log::error!("❌ [{}] {} (stage: {})", op, failure, failure.stage());
                Outcome::Failure(failure)
            }
        }
    }
}

impl std::fmt::Debug for Html2PdfService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Html2PdfService").finish_non_exhaustive()
    }
}

fn model_value<M: Serialize + ?Sized>(model: &M) -> Result<serde_json::Value, Failure> {
    serde_json::to_value(model).map_err(|e| {
        let error = TemplateError::Model(e);
        Failure::from_error(
            Html2PdfError::GenerationFailed {
                message: error.to_string(),
                source: Some(error),
            },
            Duration::ZERO,
        )
    })
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::Stage;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Converter double that counts calls and returns fixed bytes.
    #[derive(Default)]
    struct CountingConverter {
        calls: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl Converter for CountingConverter {
        async fn convert_html(&self, _html: &str, _options: &ConversionOptions) -> ConversionResult {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Outcome::success(b"%PDF-test".to_vec(), Duration::from_millis(7))
        }

        async fn convert_url(&self, _url: &str, _options: &ConversionOptions) -> ConversionResult {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Outcome::from_error(Html2PdfError::ShuttingDown, Duration::from_millis(1))
        }
    }

    fn service() -> (Html2PdfService, Arc<CountingConverter>) {
        let converter = Arc::new(CountingConverter::default());
        let service = Html2PdfService::new(Arc::new(HtmlGenerator::default()), converter.clone());
        (service, converter)
    }

    /// Verifies that a malformed template never reaches the converter.
    #[tokio::test]
    async fn test_generation_failure_short_circuits() {
        let (service, converter) = service();

        let result = service.generate_pdf("{% for %}", &(), None, None).await;

        assert_eq!(converter.calls.load(Ordering::SeqCst), 0);
        let failure = result.failure().unwrap();
        assert!(failure.message().starts_with("HTML generation failed: "));
        assert_eq!(failure.stage(), Stage::Generation);
    }

    /// Verifies that stage durations are summed.
    #[tokio::test]
    async fn test_durations_are_summed() {
        let (service, converter) = service();

        let mut model = HashMap::new();
        model.insert("name", "World");
        let result = service
            .generate_pdf("<p>Hello {{ name }}</p>", &model, None, None)
            .await;

        assert_eq!(converter.calls.load(Ordering::SeqCst), 1);
        assert_eq!(result.data(), Some(&b"%PDF-test"[..]));
        assert!(result.duration() >= Duration::from_millis(7));
    }

    /// Verifies the conversion failure prefix and stage.
    #[tokio::test]
    async fn test_conversion_failure_context() {
        let (service, _) = service();

        let result = service.generate_pdf_from_url("https://example.com", None).await;
        let failure = result.failure().unwrap();
        assert_eq!(failure.message(), "PDF conversion failed: Pool is shutting down");
        assert_eq!(failure.stage(), Stage::Acquisition);
        assert_eq!(failure.code(), "SHUTTING_DOWN");
    }

    /// Verifies that a model that cannot become JSON is a generation failure.
    #[tokio::test]
    async fn test_unserializable_model() {
        let (service, converter) = service();

        let mut model = HashMap::new();
        model.insert((1, 2), "tuple keys are not JSON object keys");
        let result = service.generate_pdf("<p></p>", &model, None, None).await;

        assert_eq!(converter.calls.load(Ordering::SeqCst), 0);
        assert!(result.message().unwrap().starts_with("HTML generation failed: Invalid template model"));
    }
}
