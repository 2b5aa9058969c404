//! PDF export via lopdf.
//!
//! The document is assembled from the filled model: one PDF page per
//! filled page, text drawn as Helvetica/WinAnsi runs at the positions the
//! engine laid out. Encryption, when requested, is a second pass: the
//! unencrypted document is serialized, re-loaded, and re-wrapped by the
//! security handler, so a render defect and an encryption defect can
//! never mask each other.

use crate::{crypt, validate_shape, EncryptionSpec, ExportError, ExportFormat, Exporter};
use folio_engine::{FilledReport, Slot, TextElement};
use folio_template::HAlign;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream, StringFormat};
use std::io::Cursor;

const FONT_REGULAR: &str = "F1";
const FONT_BOLD: &str = "F2";
/// Average glyph advance as a fraction of the font size, used for
/// right/center alignment. Helvetica text at report sizes is close enough
/// to this for columnar alignment.
const AVG_GLYPH_WIDTH: f32 = 0.5;

/// Configuration of the PDF exporter.
#[derive(Debug, Clone, Default)]
pub struct PdfConfig {
    /// When set, the rendered document is re-wrapped with the standard
    /// security handler.
    pub encryption: Option<EncryptionSpec>,
}

/// Serializes a filled report to PDF.
#[derive(Debug, Default)]
pub struct PdfExporter {
    config: PdfConfig,
}

impl PdfExporter {
    pub fn new(config: PdfConfig) -> Self {
        Self { config }
    }
}

impl Exporter for PdfExporter {
    fn format(&self) -> ExportFormat {
        ExportFormat::Pdf
    }

    fn export(&self, report: FilledReport) -> Result<Vec<u8>, ExportError> {
        validate_shape(&report)?;
        if let Some(spec) = &self.config.encryption {
            spec.validate()?;
        }

        let plain = render(&report)?;
        let Some(spec) = &self.config.encryption else {
            return Ok(plain);
        };

        log::debug!(
            "re-wrapping {} bytes of PDF with {:?} encryption",
            plain.len(),
            spec.strength
        );
        let mut document = Document::load_mem(&plain)?;
        crypt::encrypt_document(&mut document, spec, &plain)?;
        save(&mut document)
    }
}

fn render(report: &FilledReport) -> Result<Vec<u8>, ExportError> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let regular_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    let bold_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica-Bold",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            FONT_REGULAR => regular_id,
            FONT_BOLD => bold_id,
        },
    });

    let mut kids: Vec<Object> = Vec::with_capacity(report.pages.len());
    for page in &report.pages {
        let content = page_content(report, &page.elements);
        let encoded = content.encode()?;
        let content_id = doc.add_object(Stream::new(dictionary! {}, encoded));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![
                0.into(),
                0.into(),
                report.page_width.into(),
                report.page_height.into(),
            ],
            "Contents" => content_id,
            "Resources" => resources_id,
        });
        kids.push(page_id.into());
    }

    let page_count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => page_count,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    save(&mut doc)
}

fn save(doc: &mut Document) -> Result<Vec<u8>, ExportError> {
    let mut cursor = Cursor::new(Vec::new());
    doc.save_to(&mut cursor)?;
    Ok(cursor.into_inner())
}

fn page_content(report: &FilledReport, elements: &[TextElement]) -> Content {
    let mut operations = Vec::new();

    for element in elements {
        let font = if element.bold { FONT_BOLD } else { FONT_REGULAR };
        let x = aligned_x(report, element);
        // Convert from top-based layout coordinates to the PDF origin.
        let baseline = report.page_height - element.y - element.font_size;

        operations.push(Operation::new("BT", vec![]));
        operations.push(Operation::new(
            "Tf",
            vec![font.into(), element.font_size.into()],
        ));
        operations.push(Operation::new("Td", vec![x.into(), baseline.into()]));
        operations.push(Operation::new(
            "Tj",
            vec![Object::String(
                win_ansi_literal(&element.text),
                StringFormat::Literal,
            )],
        ));
        operations.push(Operation::new("ET", vec![]));
    }

    // Rule under the column header band.
    if let Some(header) = elements
        .iter()
        .find(|e| matches!(e.slot, Slot::ColumnHeader(_)))
    {
        let rule_y = report.page_height - header.y - header.font_size - 4.0;
        let width: f32 = report.columns.iter().map(|c| c.width).sum();
        let x = report.columns.first().map(|c| c.x).unwrap_or(header.x);
        operations.push(Operation::new(
            "re",
            vec![x.into(), rule_y.into(), width.into(), 0.5.into()],
        ));
        operations.push(Operation::new("f", vec![]));
    }

    Content { operations }
}

fn aligned_x(report: &FilledReport, element: &TextElement) -> f32 {
    let align = match element.slot {
        Slot::ColumnHeader(column) | Slot::Cell { column, .. } => report
            .columns
            .get(column)
            .map(|c| c.align)
            .unwrap_or(HAlign::Left),
        Slot::Title | Slot::PageFooter => HAlign::Left,
    };
    let estimated = element.text.chars().count() as f32 * AVG_GLYPH_WIDTH * element.font_size;
    match align {
        HAlign::Left => element.x,
        HAlign::Right => element.x + (element.width - estimated).max(0.0),
        HAlign::Center => element.x + ((element.width - estimated) / 2.0).max(0.0),
    }
}

/// Map text to WinAnsi-encoded literal-string bytes.
///
/// Characters outside Latin-1 are replaced; the parenthesis and backslash
/// escapes keep the literal string well-formed.
fn win_ansi_literal(text: &str) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(text.len());
    for c in text.chars() {
        let code = c as u32;
        let byte = if code <= 0xFF { code as u8 } else { b'?' };
        match byte {
            b'(' | b')' | b'\\' => {
                bytes.push(b'\\');
                bytes.push(byte);
            }
            b'\n' => bytes.extend_from_slice(b"\\n"),
            b'\r' => bytes.extend_from_slice(b"\\r"),
            _ => bytes.push(byte),
        }
    }
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CipherStrength, Permissions};
    use folio_engine::{fill, DataBinding, ParameterMap};
    use serde_json::json;

    fn filled() -> FilledReport {
        let template = folio_template::compile(
            br#"
            <report name="user-list" title="Registered users">
                <column field="id" header="Id" width="60" align="right"/>
                <column field="login" header="Login" width="160"/>
            </report>
            "#,
        )
        .unwrap();
        let rows = vec![
            json!({"id": 1, "login": "ada"}),
            json!({"id": 2, "login": "grace"}),
            json!({"id": 3, "login": "mary"}),
        ];
        fill(&template, DataBinding::Records(rows), &ParameterMap::new()).unwrap()
    }

    #[test]
    fn test_pdf_export_produces_parseable_document() {
        let bytes = PdfExporter::default().export(filled()).unwrap();
        assert!(bytes.starts_with(b"%PDF-"));

        let doc = Document::load_mem(&bytes).unwrap();
        assert_eq!(doc.get_pages().len(), 1);
        assert!(doc.trailer.get(b"Encrypt").is_err());
    }

    #[test]
    fn test_pdf_export_is_deterministic() {
        let a = PdfExporter::default().export(filled()).unwrap();
        let b = PdfExporter::default().export(filled()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_pdf_export_encrypted_carries_encrypt_dictionary() {
        let exporter = PdfExporter::new(PdfConfig {
            encryption: Some(EncryptionSpec::new("4567", "owner")),
        });
        let bytes = exporter.export(filled()).unwrap();

        // The encryption dictionary itself stays in the clear.
        let text = String::from_utf8_lossy(&bytes);
        assert!(text.contains("/Encrypt"));
        assert!(text.contains("/AESV2"));
        assert!(text.contains("/ID"));
    }

    #[test]
    fn test_pdf_export_encrypted_differs_from_plain() {
        let plain = PdfExporter::default().export(filled()).unwrap();
        let exporter = PdfExporter::new(PdfConfig {
            encryption: Some(EncryptionSpec {
                user_password: "4567".to_string(),
                owner_password: "owner".to_string(),
                permissions: Permissions::PRINT,
                strength: CipherStrength::Aes256,
                encrypt_metadata: false,
            }),
        });
        let encrypted = exporter.export(filled()).unwrap();
        assert_ne!(plain, encrypted);
        // The page text must not appear in the clear.
        let needle = b"Registered users";
        assert!(plain.windows(needle.len()).any(|w| w == needle));
        assert!(!encrypted.windows(needle.len()).any(|w| w == needle));
    }

    #[test]
    fn test_pdf_export_rejects_empty_user_password() {
        let exporter = PdfExporter::new(PdfConfig {
            encryption: Some(EncryptionSpec::new("", "owner")),
        });
        let result = exporter.export(filled());
        assert!(matches!(result, Err(ExportError::Encryption(_))));
    }

    #[test]
    fn test_pdf_export_rejects_columnless_report() {
        let mut report = filled();
        report.columns.clear();
        let result = PdfExporter::default().export(report);
        assert!(matches!(result, Err(ExportError::Incompatible(_))));
    }

    #[test]
    fn test_win_ansi_literal_escapes() {
        assert_eq!(win_ansi_literal("a(b)c\\"), b"a\\(b\\)c\\\\".to_vec());
        assert_eq!(win_ansi_literal("snowman \u{2603}"), b"snowman ?".to_vec());
    }
}
