//! End-to-end tests for the PDF service over a mock browser.

use html2pdf_pool::factory::mock::{MOCK_PDF, MockBrowserFactory, MockStats};
use html2pdf_pool::prelude::*;
use html2pdf_pool::{Converter, PdfConverter, RetryPolicy};
use serde_json::json;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::time::Duration;
use tokio::task::JoinSet;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn service_with(factory: MockBrowserFactory, max: usize) -> (Html2PdfService, Arc<PagePool>, MockStats) {
    let stats = factory.stats();
    let options = PoolOptionsBuilder::new()
        .max_instances(max)
        .acquire_timeout(Duration::from_secs(10))
        .creation_retry(RetryPolicy::linear(1, Duration::from_millis(10)))
        .shutdown_timeout(Duration::from_secs(2))
        .process_name(None)
        .build()
        .unwrap();
    let pool = PagePool::builder()
        .options(options)
        .factory(Box::new(factory))
        .enable_sweeper(false)
        .build()
        .unwrap()
        .into_shared();
    (Html2PdfService::with_pool(Arc::clone(&pool)), pool, stats)
}

fn hash_of<T: Hash>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

/// Verifies that raw HTML comes back as PDF bytes.
#[tokio::test]
async fn test_pdf_from_html() {
    init_logging();
    let (service, pool, stats) = service_with(MockBrowserFactory::new(), 2);

    let result = service
        .generate_pdf_from_html("<h1>Hello</h1>", Some(ConversionOptions::a4_standard()))
        .await;

    assert!(result.is_success(), "failed: {:?}", result.message());
    let pdf = result.data().unwrap();
    assert!(pdf.starts_with(b"%PDF"));
    assert_eq!(result.size(), MOCK_PDF.len());
    assert_eq!(stats.last_content().as_deref(), Some("<h1>Hello</h1>"));

    pool.shutdown_async().await;
}

/// Verifies the full template pipeline and the document shell around a
/// fragment.
#[tokio::test]
async fn test_pdf_from_template() {
    let (service, pool, stats) = service_with(MockBrowserFactory::new(), 1);

    let result = service
        .generate_pdf(
            "<h1>Invoice {{ number }}</h1>{% for item in items %}<p>{{ item }}</p>{% endfor %}",
            &json!({ "number": 42, "items": ["Widget", "Gadget"] }),
            Some(ConversionOptions::invoice()),
            Some(HtmlOptions::with_custom_css("h1 { color: navy; }")),
        )
        .await;

    assert!(result.is_success(), "failed: {:?}", result.message());
    let html = stats.last_content().unwrap();
    assert!(html.starts_with("<!DOCTYPE html>"));
    assert!(html.contains("<h1>Invoice 42</h1>"));
    assert!(html.contains("<p>Gadget</p>"));
    assert!(html.contains("h1 { color: navy; }"));

    pool.shutdown_async().await;
}

/// Verifies that a template error never acquires a page.
#[tokio::test]
async fn test_template_error_short_circuits() {
    let (service, pool, stats) = service_with(MockBrowserFactory::new(), 1);

    let result = service
        .generate_pdf("{{ missing_variable }}", &json!({}), None, None)
        .await;

    let failure = result.failure().expect("should fail");
    assert!(failure.message().starts_with("HTML generation failed: "));
    assert_eq!(failure.stage(), Stage::Generation);
    assert_eq!(failure.code(), "GENERATION_FAILED");
    assert!(!failure.is_retryable());
    assert_eq!(stats.launches(), 0, "No browser for a failed template");

    pool.shutdown_async().await;
}

/// Verifies that template files render with their directory as base URL.
#[tokio::test]
async fn test_pdf_from_file_uses_template_directory() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("letter.html");
    std::fs::write(&path, "<p>Dear {{ name }},</p><img src=\"logo.png\">").unwrap();

    let (service, pool, stats) = service_with(MockBrowserFactory::new(), 1);
    let result = service
        .generate_pdf_from_file(&path, &json!({ "name": "Ada" }), None, None)
        .await;

    assert!(result.is_success(), "failed: {:?}", result.message());
    let html = stats.last_content().unwrap();
    assert!(html.contains("<p>Dear Ada,</p>"));

    let base = url::Url::from_directory_path(std::path::absolute(dir.path()).unwrap()).unwrap();
    assert!(
        html.contains(&format!("<base href=\"{}\">", base)),
        "missing base href in {}",
        html
    );

    pool.shutdown_async().await;
}

/// Verifies that a missing template file is a generation failure.
#[tokio::test]
async fn test_pdf_from_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let (service, pool, stats) = service_with(MockBrowserFactory::new(), 1);

    let result = service
        .generate_pdf_from_file(dir.path().join("absent.html"), &(), None, None)
        .await;

    assert_eq!(result.failure().unwrap().stage(), Stage::Generation);
    assert_eq!(stats.launches(), 0);

    pool.shutdown_async().await;
}

/// Verifies URL conversion and the rejection of bad URLs before any page
/// is leased.
#[tokio::test]
async fn test_pdf_from_url() {
    let (service, pool, stats) = service_with(MockBrowserFactory::new(), 1);

    let ok = service.generate_pdf_from_url("https://example.com/report", None).await;
    assert!(ok.is_success());
    assert_eq!(stats.last_content().as_deref(), Some("https://example.com/report"));

    let bad = service.generate_pdf_from_url("not a url", None).await;
    let failure = bad.failure().unwrap();
    assert!(failure.message().starts_with("PDF conversion failed: "));
    assert_eq!(failure.code(), "INVALID_OPTIONS");

    let unsupported = service.generate_pdf_from_url("ftp://example.com/a.pdf", None).await;
    assert!(unsupported.message().unwrap().contains("Unsupported URL scheme"));
    assert_eq!(stats.content_loads(), 1);

    pool.shutdown_async().await;
}

/// Verifies that more concurrent requests than pages all complete.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_conversions() {
    init_logging();
    let factory = MockBrowserFactory::new().with_render_delay(Duration::from_millis(100));
    let (service, pool, stats) = service_with(factory, 2);

    let mut tasks = JoinSet::new();
    for i in 0..5 {
        let service = service.clone();
        tasks.spawn(async move {
            service
                .generate_pdf_from_html(&format!("<p>Document {}</p>", i), None)
                .await
        });
    }

    while let Some(result) = tasks.join_next().await {
        let result = result.unwrap();
        assert!(result.is_success(), "failed: {:?}", result.message());
    }
    assert_eq!(stats.pdf_calls(), 5);
    assert!(stats.pages_created() <= 2);
    assert_eq!(pool.stats().leased, 0);

    pool.shutdown_async().await;
}

/// Verifies that a dropped session is retried on a fresh page.
#[tokio::test]
async fn test_transient_failure_recovers() {
    let factory = MockBrowserFactory::new().with_transient_failures(1);
    let (_, pool, stats) = service_with(factory, 1);
    let converter = PdfConverter::new(Arc::clone(&pool))
        .with_retry(RetryPolicy::linear(2, Duration::from_millis(10)));

    let result = converter.convert_html("<p>x</p>", &ConversionOptions::default()).await;

    assert!(result.is_success());
    assert_eq!(stats.pdf_calls(), 2);
    assert_eq!(stats.pages_created(), 2);

    pool.shutdown_async().await;
}

/// Verifies that acquisition failures carry their stage.
#[tokio::test]
async fn test_browser_failure_is_acquisition_stage() {
    let (service, pool, _) = service_with(MockBrowserFactory::always_fails("no chrome"), 1);

    let result = service.generate_pdf_from_html("<p>x</p>", None).await;

    let failure = result.failure().unwrap();
    assert_eq!(failure.stage(), Stage::Acquisition);
    assert_eq!(failure.code(), "POOL_ERROR");
    assert!(failure.message().starts_with("PDF conversion failed: "));

    pool.shutdown_async().await;
}

/// Verifies that requests after shutdown fail without panicking.
#[tokio::test]
async fn test_conversion_after_shutdown() {
    let (service, pool, _) = service_with(MockBrowserFactory::new(), 1);
    pool.shutdown_async().await;

    let result = service.generate_pdf_from_html("<p>late</p>", None).await;
    assert_eq!(result.failure().unwrap().code(), "SHUTTING_DOWN");
}

/// Verifies that option equality is reflexive, symmetric and transitive,
/// and agrees with hashing.
#[test]
fn test_conversion_options_equality() {
    let a = ConversionOptions::with_custom_size(8.5, 11.0);
    let b = ConversionOptions::with_custom_size(8.5, 11.0);
    let c = b.clone();

    assert_eq!(a, a);
    assert_eq!(a, b);
    assert_eq!(b, a);
    assert_eq!(b, c);
    assert_eq!(a, c);
    assert_eq!(hash_of(&a), hash_of(&c));

    let mut nan = ConversionOptions::default();
    nan.scale = f64::NAN;
    assert_eq!(nan, nan.clone());

    assert_ne!(ConversionOptions::default(), ConversionOptions::a4_landscape());
    assert_ne!(ConversionOptions::invoice(), ConversionOptions::report());
}
