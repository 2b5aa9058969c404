//! OOXML word-processing export.
//!
//! A single continuous document: the title as a heading paragraph, then
//! one table carrying the header row and every detail row. Page furniture
//! from the filled model is dropped; the word processor does its own
//! pagination.

use crate::ooxml::{escape, page_grid, Grid, Package};
use crate::{validate_shape, ExportError, ExportFormat, Exporter};
use folio_engine::FilledReport;
use std::fmt::Write as _;

/// Serializes a filled report to a DOCX document.
#[derive(Debug, Default)]
pub struct DocxExporter;

impl DocxExporter {
    pub fn new() -> Self {
        Self
    }
}

impl Exporter for DocxExporter {
    fn format(&self) -> ExportFormat {
        ExportFormat::WordDocument
    }

    fn export(&self, report: FilledReport) -> Result<Vec<u8>, ExportError> {
        validate_shape(&report)?;

        let column_count = report.columns.len();
        let mut combined = Grid::default();
        for page in &report.pages {
            let grid = page_grid(page, column_count);
            if combined.title.is_none() {
                combined.title = grid.title;
            }
            if combined.headers.is_empty() {
                combined.headers = grid.headers;
            }
            combined.rows.extend(grid.rows);
        }

        log::debug!(
            "exporting '{}' as a continuous document, {} rows",
            report.name,
            combined.rows.len()
        );

        let mut package = Package::new();
        package.add("[Content_Types].xml", CONTENT_TYPES)?;
        package.add("_rels/.rels", RELS_ROOT)?;
        package.add("word/document.xml", &document(&report, &combined))?;
        package.finish()
    }
}

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/></Types>"#;

const RELS_ROOT: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/></Relationships>"#;

/// Points to twentieths of a point, the unit table widths use.
fn twips(points: f32) -> i64 {
    (points * 20.0).round() as i64
}

fn document(report: &FilledReport, grid: &Grid) -> String {
    let mut body = String::new();

    if let Some(title) = &grid.title {
        let _ = write!(
            body,
            r#"<w:p><w:pPr><w:spacing w:after="240"/></w:pPr><w:r><w:rPr><w:b/><w:sz w:val="32"/></w:rPr><w:t xml:space="preserve">{}</w:t></w:r></w:p>"#,
            escape(title)
        );
    }

    body.push_str(r#"<w:tbl><w:tblPr><w:tblW w:w="0" w:type="auto"/><w:tblBorders><w:top w:val="single" w:sz="4" w:space="0" w:color="auto"/><w:left w:val="single" w:sz="4" w:space="0" w:color="auto"/><w:bottom w:val="single" w:sz="4" w:space="0" w:color="auto"/><w:right w:val="single" w:sz="4" w:space="0" w:color="auto"/><w:insideH w:val="single" w:sz="4" w:space="0" w:color="auto"/><w:insideV w:val="single" w:sz="4" w:space="0" w:color="auto"/></w:tblBorders></w:tblPr><w:tblGrid>"#);
    for column in &report.columns {
        let _ = write!(body, r#"<w:gridCol w:w="{}"/>"#, twips(column.width));
    }
    body.push_str("</w:tblGrid>");

    body.push_str("<w:tr>");
    for (header, column) in grid.headers.iter().zip(report.columns.iter()) {
        let _ = write!(
            body,
            r#"<w:tc><w:tcPr><w:tcW w:w="{}" w:type="dxa"/></w:tcPr><w:p><w:r><w:rPr><w:b/></w:rPr><w:t xml:space="preserve">{}</w:t></w:r></w:p></w:tc>"#,
            twips(column.width),
            escape(header)
        );
    }
    body.push_str("</w:tr>");

    for cells in &grid.rows {
        body.push_str("<w:tr>");
        for (cell, column) in cells.iter().zip(report.columns.iter()) {
            let _ = write!(
                body,
                r#"<w:tc><w:tcPr><w:tcW w:w="{}" w:type="dxa"/></w:tcPr><w:p><w:r><w:t xml:space="preserve">{}</w:t></w:r></w:p></w:tc>"#,
                twips(column.width),
                escape(&cell.text)
            );
        }
        body.push_str("</w:tr>");
    }
    body.push_str("</w:tbl>");

    let _ = write!(
        body,
        r#"<w:sectPr><w:pgSz w:w="{}" w:h="{}"/></w:sectPr>"#,
        twips(report.page_width),
        twips(report.page_height)
    );

    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{body}</w:body></w:document>"#
    )
}
