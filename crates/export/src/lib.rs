//! Format-specific exporters for filled Folio reports.
//!
//! Every exporter consumes a [`FilledReport`] by value — a filled report
//! is produced by one render call and serialized exactly once — and
//! returns the final document bytes.
//!
//! ## Available Exporters
//!
//! - [`PdfExporter`]: paginated PDF via lopdf, with optional
//!   standard-security-handler encryption (AES-128 or AES-256)
//! - [`XlsxExporter`]: OOXML spreadsheet, one worksheet per page by default
//! - [`DocxExporter`]: OOXML word-processing document, single continuous flow
//!
//! Exporters are stateless; configuration travels in small per-format
//! config structs, mirroring how rendering options are passed one level up.

mod crypt;
mod docx;
mod ooxml;
mod pdf;
mod xlsx;

pub use docx::DocxExporter;
pub use pdf::{PdfConfig, PdfExporter};
pub use xlsx::{XlsxConfig, XlsxExporter};

use folio_engine::{FilledReport, Slot};
use std::fmt;
use thiserror::Error;

/// Output document format. Orthogonal to encryption, which is PDF-only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Pdf,
    Spreadsheet,
    WordDocument,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Pdf => "pdf",
            ExportFormat::Spreadsheet => "xlsx",
            ExportFormat::WordDocument => "docx",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            ExportFormat::Pdf => "application/pdf",
            ExportFormat::Spreadsheet => {
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
            }
            ExportFormat::WordDocument => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Error type for export operations.
///
/// Serialization never degrades: an unexportable report or an invalid
/// encryption configuration is an error, not malformed bytes.
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("filled report is not exportable: {0}")]
    Incompatible(String),

    #[error("PDF serialization failed: {0}")]
    Pdf(String),

    #[error("document packaging failed: {0}")]
    Package(String),

    #[error("invalid encryption configuration: {0}")]
    Encryption(String),
}

impl From<lopdf::Error> for ExportError {
    fn from(e: lopdf::Error) -> Self {
        ExportError::Pdf(e.to_string())
    }
}

impl From<zip::result::ZipError> for ExportError {
    fn from(e: zip::result::ZipError) -> Self {
        ExportError::Package(e.to_string())
    }
}

impl From<std::io::Error> for ExportError {
    fn from(e: std::io::Error) -> Self {
        ExportError::Package(e.to_string())
    }
}

/// A stateless serializer from filled report to one binary format.
pub trait Exporter {
    fn format(&self) -> ExportFormat;

    /// Serialize `report`, consuming it.
    fn export(&self, report: FilledReport) -> Result<Vec<u8>, ExportError>;
}

/// Access permissions of an encrypted PDF.
///
/// The bit layout follows the PDF standard security handler; anything not
/// granted here is denied to readers opening with the user password. The
/// owner password always grants everything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Permissions(u32);

impl Permissions {
    pub const NONE: Permissions = Permissions(0);
    pub const PRINT: Permissions = Permissions(1 << 2);
    pub const MODIFY: Permissions = Permissions(1 << 3);
    pub const COPY: Permissions = Permissions(1 << 4);
    pub const ANNOTATE: Permissions = Permissions(1 << 5);
    pub const FILL_FORMS: Permissions = Permissions(1 << 8);
    pub const EXTRACT_FOR_ACCESSIBILITY: Permissions = Permissions(1 << 9);
    pub const ASSEMBLE: Permissions = Permissions(1 << 10);
    pub const PRINT_HIGH_RES: Permissions = Permissions(1 << 11);

    pub fn bits(self) -> u32 {
        self.0
    }

    pub fn contains(self, other: Permissions) -> bool {
        self.0 & other.0 == other.0
    }

    /// The signed /P value: granted bits plus the reserved bits the
    /// standard requires to be set.
    pub fn p_value(self) -> i32 {
        ((self.0 & 0x0F3C) | 0xFFFF_F0C0) as i32
    }
}

impl std::ops::BitOr for Permissions {
    type Output = Permissions;

    fn bitor(self, rhs: Permissions) -> Permissions {
        Permissions(self.0 | rhs.0)
    }
}

impl Default for Permissions {
    /// Print-only, the posture reports ship with unless told otherwise.
    fn default() -> Self {
        Permissions::PRINT
    }
}

/// Key size of the standard security handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CipherStrength {
    /// AES-128, /V 4 /R 4 handler.
    #[default]
    Aes128,
    /// AES-256, /V 5 /R 6 handler.
    Aes256,
}

/// PDF content protection settings.
///
/// The user password gates opening; the owner password gates permission
/// changes and is allowed to differ. Applied as a second pass over the
/// already-rendered document, so rendering failures and encryption
/// failures stay separable.
#[derive(Debug, Clone)]
pub struct EncryptionSpec {
    pub user_password: String,
    pub owner_password: String,
    pub permissions: Permissions,
    pub strength: CipherStrength,
    /// Leave metadata readable without the password. Off by default so
    /// non-sensitive fields stay searchable.
    pub encrypt_metadata: bool,
}

impl EncryptionSpec {
    /// Print-only AES-128 protection, metadata unencrypted.
    pub fn new(user_password: impl Into<String>, owner_password: impl Into<String>) -> Self {
        Self {
            user_password: user_password.into(),
            owner_password: owner_password.into(),
            permissions: Permissions::default(),
            strength: CipherStrength::default(),
            encrypt_metadata: false,
        }
    }

    /// The owner password, falling back to the user password when unset.
    pub(crate) fn effective_owner_password(&self) -> &str {
        if self.owner_password.is_empty() {
            &self.user_password
        } else {
            &self.owner_password
        }
    }

    pub(crate) fn validate(&self) -> Result<(), ExportError> {
        if self.user_password.is_empty() {
            return Err(ExportError::Encryption(
                "user password must not be empty when encryption is requested".to_string(),
            ));
        }
        Ok(())
    }
}

/// Reject a filled report whose shape no exporter can serialize.
pub(crate) fn validate_shape(report: &FilledReport) -> Result<(), ExportError> {
    if report.columns.is_empty() {
        return Err(ExportError::Incompatible(
            "report has no columns".to_string(),
        ));
    }
    let column_count = report.columns.len();
    for page in &report.pages {
        for element in &page.elements {
            let index = match element.slot {
                Slot::ColumnHeader(column) => Some(column),
                Slot::Cell { column, .. } => Some(column),
                _ => None,
            };
            if let Some(index) = index {
                if index >= column_count {
                    return Err(ExportError::Incompatible(format!(
                        "page {} references column {index} of {column_count}",
                        page.number
                    )));
                }
            }
        }
    }
    Ok(())
}
