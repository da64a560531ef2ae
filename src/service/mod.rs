//! Orchestrating PDF service.
//!
//! This module composes the two pipelines into the public entry point,
//! [`Html2PdfService`], and defines the uniform result types every public
//! operation returns.
//!
//! # Module Overview
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                         Html2PdfService                          │
//! │                                                                  │
//! │  generate_pdf ──────────┐                                        │
//! │  generate_pdf_from_file ┴─▶ Generator ──▶ Converter ──▶ Outcome  │
//! │  generate_pdf_from_html ─────────────────▶ Converter ──▶ Outcome │
//! │  generate_pdf_from_url  ─────────────────▶ Converter ──▶ Outcome │
//! └──────────────────────────────────────────────────────────────────┘
//!                                               │
//!                                               ▼
//!                                     PagePool (leases pages)
//! ```
//!
//! # Public API Summary
//!
//! | Operation | Stages | Returns |
//! |-----------|--------|---------|
//! | `generate_pdf` | generation + conversion | [`ConversionResult`] |
//! | `generate_pdf_from_file` | generation + conversion | [`ConversionResult`] |
//! | `generate_pdf_from_html` | conversion | [`ConversionResult`] |
//! | `generate_pdf_from_url` | conversion | [`ConversionResult`] |
//!
//! # Failure Messages
//!
//! | Stage | Message prefix |
//! |-------|----------------|
//! | Generation | `HTML generation failed: ` |
//! | Acquisition, Conversion | `PDF conversion failed: ` |
//!
//! # Usage
//!
//! ```rust,ignore
//! use html2pdf_pool::prelude::*;
//!
//! let pool = init_page_pool().await?;
//! let service = Html2PdfService::with_pool(pool);
//!
//! let result = service
//!     .generate_pdf_from_html("<h1>Report</h1>", Some(ConversionOptions::report()))
//!     .await;
//!
//! if let Some(failure) = result.failure() {
//!     log::error!("{} (retryable: {})", failure, failure.is_retryable());
//! }
//! ```

mod pdf;
mod types;

pub use pdf::Html2PdfService;
pub use types::{ConversionResult, Failure, GenerationResult, Outcome, Stage};
