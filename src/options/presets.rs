//! Ready-made option sets for common document types.

use super::{ConversionOptions, HeaderFooter, HtmlOptions, PageMargins, PaperFormat};

const PAGE_X_OF_Y: &str = "<div style='font-size: 10px; text-align: center; width: 100%; color: #666;'>\
<span>Page <span class='pageNumber'></span> of <span class='totalPages'></span></span></div>";

const REPORT_HEADER: &str = "<div style='font-size: 12px; text-align: center; width: 100%; \
border-bottom: 1px solid #ccc; padding-bottom: 10px;'><strong>REPORT</strong></div>";

const REPORT_FOOTER: &str = "<div style='font-size: 10px; width: 100%; color: #666; display: flex; \
justify-content: space-between;'><span>Generated on: <span class='date'></span></span>\
<span>Page <span class='pageNumber'></span> of <span class='totalPages'></span></span></div>";

impl ConversionOptions {
    /// A4 portrait with 2cm margins.
    pub fn a4_standard() -> Self {
        Self {
            format: PaperFormat::A4,
            margins: PageMargins::uniform("2cm"),
            ..Default::default()
        }
    }

    /// A4 landscape with 2cm margins.
    pub fn a4_landscape() -> Self {
        Self {
            landscape: true,
            ..Self::a4_standard()
        }
    }

    /// US Letter portrait with 1in margins.
    pub fn letter_standard() -> Self {
        Self {
            format: PaperFormat::Letter,
            margins: PageMargins::uniform("1in"),
            ..Default::default()
        }
    }

    /// A4 without margins.
    pub fn no_margins() -> Self {
        Self {
            margins: PageMargins::uniform("0"),
            ..Default::default()
        }
    }

    /// A4 with a "Page x of y" footer.
    pub fn invoice() -> Self {
        Self {
            margins: PageMargins {
                top: "1cm".to_string(),
                bottom: "3cm".to_string(),
                left: "2cm".to_string(),
                right: "2cm".to_string(),
            },
            footer: Some(HeaderFooter::new(PAGE_X_OF_Y)),
            ..Default::default()
        }
    }

    /// A4 with a report banner header and a date plus page footer.
    pub fn report() -> Self {
        Self {
            margins: PageMargins {
                top: "3cm".to_string(),
                bottom: "2cm".to_string(),
                left: "2cm".to_string(),
                right: "2cm".to_string(),
            },
            header: Some(HeaderFooter::new(REPORT_HEADER).with_height("2cm")),
            footer: Some(HeaderFooter::new(REPORT_FOOTER)),
            ..Default::default()
        }
    }

    /// [`a4_standard`](Self::a4_standard) with 2cm bands; each band present
    /// widens its margin to 3cm. Empty templates are ignored.
    pub fn with_header_and_footer(header: Option<&str>, footer: Option<&str>) -> Self {
        let mut options = Self::a4_standard();
        if let Some(template) = header.filter(|t| !t.is_empty()) {
            options.header = Some(HeaderFooter::new(template).with_height("2cm"));
            options.margins.top = "3cm".to_string();
        }
        if let Some(template) = footer.filter(|t| !t.is_empty()) {
            options.footer = Some(HeaderFooter::new(template).with_height("2cm"));
            options.margins.bottom = "3cm".to_string();
        }
        options
    }

    /// Custom paper size in inches with 1cm margins.
    pub fn with_custom_size(width_inches: f64, height_inches: f64) -> Self {
        Self {
            width: Some(width_inches),
            height: Some(height_inches),
            ..Default::default()
        }
    }
}

const STANDARD_CSS: &str = "body { font-family: Arial, sans-serif; margin: 0; padding: 20px; font-size: 12px; line-height: 1.4; }
h1, h2, h3 { margin-top: 0; }
table { border-collapse: collapse; width: 100%; }
th, td { border: 1px solid #ddd; padding: 8px; text-align: left; }
th { background-color: #f2f2f2; }
.page-break { page-break-after: always; }";

const INVOICE_CSS: &str = "body { font-family: Arial, sans-serif; margin: 0; padding: 0; font-size: 11px; line-height: 1.3; }
.invoice-header { text-align: center; margin-bottom: 30px; }
.invoice-details { margin-bottom: 20px; }
.invoice-table { width: 100%; border-collapse: collapse; }
.invoice-table th, .invoice-table td { border: 1px solid #ddd; padding: 8px; text-align: left; }
.invoice-table th { background-color: #f8f9fa; font-weight: bold; }
.invoice-total { text-align: right; margin-top: 20px; font-weight: bold; }";

const REPORT_CSS: &str = "body { font-family: Arial, sans-serif; margin: 0; padding: 0; font-size: 11px; line-height: 1.4; }
.report-header { text-align: center; margin-bottom: 30px; border-bottom: 2px solid #333; padding-bottom: 10px; }
.report-section { margin-bottom: 25px; }
.report-table { width: 100%; border-collapse: collapse; margin-bottom: 20px; }
.report-table th, .report-table td { border: 1px solid #ddd; padding: 6px; text-align: left; }
.report-table th { background-color: #f8f9fa; font-weight: bold; }
.report-summary { background-color: #f8f9fa; padding: 15px; border-radius: 5px; }";

impl HtmlOptions {
    /// General purpose typography and table styling.
    pub fn standard() -> Self {
        Self::with_custom_css(STANDARD_CSS)
    }

    /// Styling for the `invoice-*` classes.
    pub fn invoice() -> Self {
        Self::with_custom_css(INVOICE_CSS)
    }

    /// Styling for the `report-*` classes.
    pub fn report() -> Self {
        Self::with_custom_css(REPORT_CSS)
    }

    /// Default document settings plus `css`.
    pub fn with_custom_css(css: impl Into<String>) -> Self {
        Self {
            additional_css: Some(css.into()),
            ..Default::default()
        }
    }
}
