//! OOXML spreadsheet export.
//!
//! One worksheet per filled page by default, mirroring the paginated
//! model; a single combined sheet is available for callers that want the
//! whole detail band in one place. Numeric source values become numeric
//! cells; everything else is written as inline strings, so no shared
//! string table is needed.

use crate::ooxml::{escape, page_grid, Grid, GridCell, Package};
use crate::{validate_shape, ExportError, ExportFormat, Exporter};
use folio_engine::FilledReport;
use std::fmt::Write as _;

/// Configuration of the spreadsheet exporter.
#[derive(Debug, Clone)]
pub struct XlsxConfig {
    /// One worksheet per filled page (the default), or a single combined
    /// sheet.
    pub sheet_per_page: bool,
}

impl Default for XlsxConfig {
    fn default() -> Self {
        Self {
            sheet_per_page: true,
        }
    }
}

/// Serializes a filled report to an XLSX workbook.
#[derive(Debug, Default)]
pub struct XlsxExporter {
    config: XlsxConfig,
}

impl XlsxExporter {
    pub fn new(config: XlsxConfig) -> Self {
        Self { config }
    }
}

impl Exporter for XlsxExporter {
    fn format(&self) -> ExportFormat {
        ExportFormat::Spreadsheet
    }

    fn export(&self, report: FilledReport) -> Result<Vec<u8>, ExportError> {
        validate_shape(&report)?;

        let column_count = report.columns.len();
        let sheets: Vec<(String, Grid)> = if self.config.sheet_per_page {
            report
                .pages
                .iter()
                .map(|page| {
                    (
                        sheet_name(&format!("Page {}", page.number)),
                        page_grid(page, column_count),
                    )
                })
                .collect()
        } else {
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
            vec![(sheet_name(&report.name), combined)]
        };

        log::debug!(
            "exporting '{}' as {} worksheet(s)",
            report.name,
            sheets.len()
        );

        let mut package = Package::new();
        package.add("[Content_Types].xml", &content_types(sheets.len()))?;
        package.add("_rels/.rels", RELS_ROOT)?;
        package.add("xl/workbook.xml", &workbook(&sheets))?;
        package.add("xl/_rels/workbook.xml.rels", &workbook_rels(sheets.len()))?;
        package.add("xl/styles.xml", STYLES)?;
        for (index, (_, grid)) in sheets.iter().enumerate() {
            package.add(
                &format!("xl/worksheets/sheet{}.xml", index + 1),
                &worksheet(grid),
            )?;
        }
        package.finish()
    }
}

const RELS_ROOT: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/></Relationships>"#;

const STYLES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><fonts count="2"><font><sz val="11"/><name val="Calibri"/></font><font><b/><sz val="11"/><name val="Calibri"/></font></fonts><fills count="2"><fill><patternFill patternType="none"/></fill><fill><patternFill patternType="gray125"/></fill></fills><borders count="1"><border/></borders><cellStyleXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0"/></cellStyleXfs><cellXfs count="2"><xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0"/><xf numFmtId="0" fontId="1" fillId="0" borderId="0" xfId="0" applyFont="1"/></cellXfs></styleSheet>"#;

fn content_types(sheet_count: usize) -> String {
    let mut overrides = String::new();
    for index in 1..=sheet_count {
        let _ = write!(
            overrides,
            r#"<Override PartName="/xl/worksheets/sheet{index}.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>"#
        );
    }
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/><Override PartName="/xl/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml"/>{overrides}</Types>"#
    )
}

fn workbook(sheets: &[(String, Grid)]) -> String {
    let mut entries = String::new();
    for (index, (name, _)) in sheets.iter().enumerate() {
        let _ = write!(
            entries,
            r#"<sheet name="{}" sheetId="{id}" r:id="rId{id}"/>"#,
            escape(name),
            id = index + 1,
        );
    }
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets>{entries}</sheets></workbook>"#
    )
}

fn workbook_rels(sheet_count: usize) -> String {
    let mut entries = String::new();
    for index in 1..=sheet_count {
        let _ = write!(
            entries,
            r#"<Relationship Id="rId{index}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet{index}.xml"/>"#
        );
    }
    let _ = write!(
        entries,
        r#"<Relationship Id="rId{}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/>"#,
        sheet_count + 1
    );
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">{entries}</Relationships>"#
    )
}

fn worksheet(grid: &Grid) -> String {
    let mut rows = String::new();
    let mut row_number = 0usize;

    if let Some(title) = &grid.title {
        row_number += 1;
        let _ = write!(
            rows,
            r#"<row r="{row_number}">{}</row>"#,
            string_cell(0, row_number, title, true)
        );
    }

    row_number += 1;
    let mut header_cells = String::new();
    for (column, header) in grid.headers.iter().enumerate() {
        header_cells.push_str(&string_cell(column, row_number, header, true));
    }
    let _ = write!(rows, r#"<row r="{row_number}">{header_cells}</row>"#);

    for cells in &grid.rows {
        row_number += 1;
        let mut body = String::new();
        for (column, cell) in cells.iter().enumerate() {
            body.push_str(&data_cell(column, row_number, cell));
        }
        let _ = write!(rows, r#"<row r="{row_number}">{body}</row>"#);
    }

    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>{rows}</sheetData></worksheet>"#
    )
}

fn data_cell(column: usize, row: usize, cell: &GridCell) -> String {
    match cell.number {
        Some(number) => format!(
            r#"<c r="{}{row}"><v>{number}</v></c>"#,
            column_letters(column)
        ),
        None => string_cell(column, row, &cell.text, false),
    }
}

fn string_cell(column: usize, row: usize, text: &str, bold: bool) -> String {
    let style = if bold { r#" s="1""# } else { "" };
    format!(
        r#"<c r="{}{row}" t="inlineStr"{style}><is><t xml:space="preserve">{}</t></is></c>"#,
        column_letters(column),
        escape(text)
    )
}

/// Spreadsheet column letters: 0 -> A, 25 -> Z, 26 -> AA.
fn column_letters(mut index: usize) -> String {
    let mut letters = Vec::new();
    loop {
        letters.push(b'A' + (index % 26) as u8);
        if index < 26 {
            break;
        }
        index = index / 26 - 1;
    }
    letters.reverse();
    String::from_utf8_lossy(&letters).into_owned()
}

/// Worksheet names are capped at 31 characters and a small set of
/// characters is forbidden.
fn sheet_name(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .map(|c| match c {
            '[' | ']' | ':' | '*' | '?' | '/' | '\\' => ' ',
            other => other,
        })
        .collect();
    let trimmed = cleaned.trim();
    let name: String = trimmed.chars().take(31).collect();
    if name.is_empty() {
        "Report".to_string()
    } else {
        name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_engine::{fill, DataBinding, ParameterMap};
    use serde_json::json;
    use std::io::{Cursor, Read};

    fn filled(row_count: usize) -> FilledReport {
        let template = folio_template::compile(
            br#"
            <report name="user-list" title="Registered users">
                <column field="id" header="Id" width="60" align="right"/>
                <column field="login" header="Login" width="160"/>
            </report>
            "#,
        )
        .unwrap();
        let rows: Vec<_> = (1..=row_count)
            .map(|i| json!({"id": i, "login": format!("user{i}")}))
            .collect();
        fill(&template, DataBinding::Records(rows), &ParameterMap::new()).unwrap()
    }

    fn read_part(bytes: &[u8], name: &str) -> String {
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes.to_vec())).unwrap();
        let mut part = archive.by_name(name).unwrap();
        let mut content = String::new();
        part.read_to_string(&mut content).unwrap();
        content
    }

    #[test]
    fn test_xlsx_export_three_rows_plus_header() {
        let bytes = XlsxExporter::default().export(filled(3)).unwrap();
        assert_eq!(&bytes[..4], b"PK\x03\x04");

        let sheet = read_part(&bytes, "xl/worksheets/sheet1.xml");
        // Title row + header row + three data rows.
        assert_eq!(sheet.matches("<row ").count(), 5);
        assert!(sheet.contains("Registered users"));
        assert!(sheet.contains("Login"));
        assert!(sheet.contains("user3"));
        // Numeric source values become numeric cells.
        assert!(sheet.contains("<v>3</v>"));
    }

    #[test]
    fn test_xlsx_export_zero_rows_is_header_only() {
        let bytes = XlsxExporter::default().export(filled(0)).unwrap();
        let sheet = read_part(&bytes, "xl/worksheets/sheet1.xml");
        // Title row + header row, nothing else.
        assert_eq!(sheet.matches("<row ").count(), 2);
        assert!(sheet.contains("Id"));
    }

    #[test]
    fn test_xlsx_export_one_sheet_per_page() {
        let report = filled(120);
        let pages = report.page_count();
        assert!(pages > 1);

        let bytes = XlsxExporter::default().export(report).unwrap();
        let workbook = read_part(&bytes, "xl/workbook.xml");
        assert_eq!(workbook.matches("<sheet ").count(), pages);
        // Every page part exists.
        read_part(&bytes, &format!("xl/worksheets/sheet{pages}.xml"));
    }

    #[test]
    fn test_xlsx_export_combined_sheet() {
        let report = filled(120);
        let exporter = XlsxExporter::new(XlsxConfig {
            sheet_per_page: false,
        });
        let bytes = exporter.export(report).unwrap();

        let workbook = read_part(&bytes, "xl/workbook.xml");
        assert_eq!(workbook.matches("<sheet ").count(), 1);
        let sheet = read_part(&bytes, "xl/worksheets/sheet1.xml");
        // Title + one header + 120 data rows.
        assert_eq!(sheet.matches("<row ").count(), 122);
    }

    #[test]
    fn test_xlsx_export_is_deterministic() {
        let a = XlsxExporter::default().export(filled(3)).unwrap();
        let b = XlsxExporter::default().export(filled(3)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_xlsx_escapes_markup_in_values() {
        let template = folio_template::compile(
            br#"<report name="r"><column field="note" width="200"/></report>"#,
        )
        .unwrap();
        let report = fill(
            &template,
            DataBinding::Records(vec![json!({"note": "a<b&c"})]),
            &ParameterMap::new(),
        )
        .unwrap();
        let bytes = XlsxExporter::default().export(report).unwrap();
        let sheet = read_part(&bytes, "xl/worksheets/sheet1.xml");
        assert!(sheet.contains("a&lt;b&amp;c"));
    }

    #[test]
    fn test_column_letters() {
        assert_eq!(column_letters(0), "A");
        assert_eq!(column_letters(25), "Z");
        assert_eq!(column_letters(26), "AA");
        assert_eq!(column_letters(27), "AB");
        assert_eq!(column_letters(51), "AZ");
        assert_eq!(column_letters(52), "BA");
    }

    #[test]
    fn test_sheet_name_sanitizes() {
        assert_eq!(sheet_name("users: all/active"), "users  all active");
        assert_eq!(sheet_name(""), "Report");
        assert_eq!(sheet_name(&"x".repeat(40)).len(), 31);
    }
}
