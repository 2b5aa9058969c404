//! The filled-report document model.
//!
//! A [`FilledReport`] is the format-agnostic output of a fill pass: pages
//! of positioned text elements, each tagged with the logical slot it came
//! from. The positions drive the PDF exporter; the slots let grid
//! exporters (XLSX, DOCX) rebuild rows and columns without geometry
//! heuristics.
//!
//! A filled report belongs to the render call that produced it and is
//! consumed by value by exactly one exporter.

use chrono::{DateTime, Utc};
use folio_template::HAlign;

/// A column of the detail band with its resolved horizontal placement.
#[derive(Debug, Clone)]
pub struct ColumnLayout {
    pub field: String,
    pub header: String,
    /// Left edge in points, measured from the left page edge.
    pub x: f32,
    pub width: f32,
    pub align: HAlign,
}

/// The logical slot a text element fills.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    /// Title band, first page only.
    Title,
    /// Column header cell; the payload is the column index.
    ColumnHeader(usize),
    /// Detail cell. `row` is the global row index across all pages.
    Cell { row: usize, column: usize },
    /// Page footer ("Page N of M").
    PageFooter,
}

/// A single positioned run of text.
///
/// `y` is measured from the top of the page; renderers with a bottom-left
/// origin convert when drawing.
#[derive(Debug, Clone)]
pub struct TextElement {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub font_size: f32,
    pub bold: bool,
    pub text: String,
    /// Set when the source value was numeric, so spreadsheet exporters can
    /// emit a typed cell.
    pub number: Option<f64>,
    pub slot: Slot,
}

/// One laid-out page.
#[derive(Debug)]
pub struct FilledPage {
    /// 1-based page number.
    pub number: usize,
    pub elements: Vec<TextElement>,
}

impl FilledPage {
    /// Iterate the detail cells on this page in (row, column) order.
    ///
    /// Elements are emitted in that order by the fill pass; this does not
    /// re-sort.
    pub fn cells(&self) -> impl Iterator<Item = &TextElement> {
        self.elements
            .iter()
            .filter(|e| matches!(e.slot, Slot::Cell { .. }))
    }
}

/// The materialized, paginated result of binding data to a template.
#[derive(Debug)]
pub struct FilledReport {
    pub name: String,
    pub page_width: f32,
    pub page_height: f32,
    pub columns: Vec<ColumnLayout>,
    pub pages: Vec<FilledPage>,
    /// When the fill pass ran. Exposed to templates as `GENERATED_AT`;
    /// the one documented exception to byte-identical re-renders.
    pub generated_at: DateTime<Utc>,
}

impl FilledReport {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Total number of detail rows across all pages.
    pub fn row_count(&self) -> usize {
        self.pages
            .iter()
            .flat_map(|p| p.elements.iter())
            .filter_map(|e| match e.slot {
                Slot::Cell { row, .. } => Some(row),
                _ => None,
            })
            .max()
            .map(|max| max + 1)
            .unwrap_or(0)
    }
}
