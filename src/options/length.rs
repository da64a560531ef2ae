//! CSS lengths and paper formats, converted to inches for the renderer.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Html2PdfError, Result};

/// CSS pixels per inch.
pub const PX_PER_INCH: f64 = 96.0;

/// Parses a CSS length (`1cm`, `10mm`, `0.5in`, `12pt`, `96px`, `0`) into inches.
///
/// A bare number is only accepted when it is zero, as in CSS.
///
/// # Example
///
/// ```rust
/// use html2pdf_pool::options::parse_length;
///
/// assert_eq!(parse_length("1in").unwrap(), 1.0);
/// assert_eq!(parse_length("96px").unwrap(), 1.0);
/// assert_eq!(parse_length("0").unwrap(), 0.0);
/// assert!(parse_length("12").is_err());
/// ```
pub fn parse_length(value: &str) -> Result<f64> {
    let trimmed = value.trim().to_ascii_lowercase();
    let split = trimmed
        .find(|c: char| c.is_ascii_alphabetic())
        .unwrap_or(trimmed.len());
    let (number, unit) = trimmed.split_at(split);

    let number: f64 = number
        .trim()
        .parse()
        .map_err(|_| invalid_length(value))?;
    if !number.is_finite() || number < 0.0 {
        return Err(invalid_length(value));
    }

    let inches = match unit {
        "in" => number,
        "cm" => number / 2.54,
        "mm" => number / 25.4,
        "pt" => number / 72.0,
        "px" => number / PX_PER_INCH,
        "" if number == 0.0 => 0.0,
        _ => return Err(invalid_length(value)),
    };
    Ok(inches)
}

fn invalid_length(value: &str) -> Html2PdfError {
    Html2PdfError::Configuration(format!(
        "invalid CSS length '{}' (expected a number with cm, mm, in, pt or px)",
        value
    ))
}

/// Standard paper sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PaperFormat {
    /// 8.5in x 11in
    Letter,
    /// 8.5in x 14in
    Legal,
    /// 11in x 17in
    Tabloid,
    /// 17in x 11in
    Ledger,
    /// 841mm x 1189mm
    A0,
    /// 594mm x 841mm
    A1,
    /// 420mm x 594mm
    A2,
    /// 297mm x 420mm
    A3,
    /// 210mm x 297mm
    #[default]
    A4,
    /// 148mm x 210mm
    A5,
    /// 105mm x 148mm
    A6,
}

impl PaperFormat {
    /// Portrait `(width, height)` in inches.
    pub fn size_inches(self) -> (f64, f64) {
        match self {
            PaperFormat::Letter => (8.5, 11.0),
            PaperFormat::Legal => (8.5, 14.0),
            PaperFormat::Tabloid => (11.0, 17.0),
            PaperFormat::Ledger => (17.0, 11.0),
            PaperFormat::A0 => (33.1, 46.8),
            PaperFormat::A1 => (23.4, 33.1),
            PaperFormat::A2 => (16.54, 23.4),
            PaperFormat::A3 => (11.7, 16.54),
            PaperFormat::A4 => (8.27, 11.7),
            PaperFormat::A5 => (5.83, 8.27),
            PaperFormat::A6 => (4.13, 5.83),
        }
    }

    fn name(self) -> &'static str {
        match self {
            PaperFormat::Letter => "Letter",
            PaperFormat::Legal => "Legal",
            PaperFormat::Tabloid => "Tabloid",
            PaperFormat::Ledger => "Ledger",
            PaperFormat::A0 => "A0",
            PaperFormat::A1 => "A1",
            PaperFormat::A2 => "A2",
            PaperFormat::A3 => "A3",
            PaperFormat::A4 => "A4",
            PaperFormat::A5 => "A5",
            PaperFormat::A6 => "A6",
        }
    }
}

impl fmt::Display for PaperFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PaperFormat {
    type Err = Html2PdfError;

    fn from_str(s: &str) -> Result<Self> {
        let format = match s.trim().to_ascii_lowercase().as_str() {
            "letter" => PaperFormat::Letter,
            "legal" => PaperFormat::Legal,
            "tabloid" => PaperFormat::Tabloid,
            "ledger" => PaperFormat::Ledger,
            "a0" => PaperFormat::A0,
            "a1" => PaperFormat::A1,
            "a2" => PaperFormat::A2,
            "a3" => PaperFormat::A3,
            "a4" => PaperFormat::A4,
            "a5" => PaperFormat::A5,
            "a6" => PaperFormat::A6,
            _ => {
                return Err(Html2PdfError::Configuration(format!(
                    "unknown paper format '{}'",
                    s
                )));
            }
        };
        Ok(format)
    }
}
