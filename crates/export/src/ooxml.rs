//! Shared plumbing for the OOXML-based exporters.
//!
//! XLSX and DOCX are both zip packages of XML parts. The package writer
//! pins every entry's timestamp so identical reports produce identical
//! bytes.

use crate::ExportError;
use folio_engine::{FilledPage, Slot};
use std::borrow::Cow;
use std::io::{Cursor, Write};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// A zip package under construction.
pub(crate) struct Package {
    writer: ZipWriter<Cursor<Vec<u8>>>,
}

impl Package {
    pub(crate) fn new() -> Self {
        Self {
            writer: ZipWriter::new(Cursor::new(Vec::new())),
        }
    }

    /// Add a part. Entry metadata is fixed so output is reproducible.
    pub(crate) fn add(&mut self, path: &str, content: &str) -> Result<(), ExportError> {
        let options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .last_modified_time(zip::DateTime::default());
        self.writer.start_file(path, options)?;
        self.writer.write_all(content.as_bytes())?;
        Ok(())
    }

    pub(crate) fn finish(self) -> Result<Vec<u8>, ExportError> {
        Ok(self.writer.finish()?.into_inner())
    }
}

/// Escape text for inclusion in part XML.
pub(crate) fn escape(text: &str) -> Cow<'_, str> {
    quick_xml::escape::escape(text)
}

/// A cell value recovered from the filled model.
#[derive(Debug, Clone)]
pub(crate) struct GridCell {
    pub text: String,
    pub number: Option<f64>,
}

/// The tabular content of one filled page, rebuilt from slot tags.
#[derive(Debug, Default)]
pub(crate) struct Grid {
    pub title: Option<String>,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<GridCell>>,
}

/// Rebuild the logical grid of a page from its slot-tagged elements.
///
/// Page footers are presentation-only and are dropped; a spreadsheet or a
/// flowing document carries no page furniture.
pub(crate) fn page_grid(page: &FilledPage, column_count: usize) -> Grid {
    let mut grid = Grid {
        headers: vec![String::new(); column_count],
        ..Grid::default()
    };
    let mut rows = std::collections::BTreeMap::<usize, Vec<GridCell>>::new();

    for element in &page.elements {
        match element.slot {
            Slot::Title => grid.title = Some(element.text.clone()),
            Slot::ColumnHeader(column) => {
                grid.headers[column] = element.text.clone();
            }
            Slot::Cell { row, column } => {
                let cells = rows.entry(row).or_insert_with(|| {
                    vec![
                        GridCell {
                            text: String::new(),
                            number: None,
                        };
                        column_count
                    ]
                });
                cells[column] = GridCell {
                    text: element.text.clone(),
                    number: element.number,
                };
            }
            Slot::PageFooter => {}
        }
    }

    grid.rows = rows.into_values().collect();
    grid
}
