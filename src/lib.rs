//! # folio
//!
//! A report-generation pipeline: load a named template, compile it, bind
//! it to data, render the paginated document, serialize it to PDF, XLSX
//! or DOCX, and hand the result back Base64-encoded.
//!
//! ```text
//! TemplateStore ──> compile ──> fill <── DataBinding
//!                                 │
//!                                 v
//!                          FilledReport ──> Exporter ──> codec ──> payload
//! ```
//!
//! The pipeline is synchronous and stateless between calls, except for an
//! optional compiled-template cache. Every stage fails closed; a failure
//! carries the originating [`Stage`] so boundaries can map stages to
//! distinct responses instead of one generic error.
//!
//! ## Quick example
//!
//! ```no_run
//! use folio::{DataBinding, ExportFormat, ReportRequest, ReportService};
//! use folio::store::FilesystemTemplateStore;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let service = ReportService::new(FilesystemTemplateStore::new("reports"));
//! let payload = service.generate(ReportRequest::new(
//!     "user-list",
//!     ExportFormat::Spreadsheet,
//!     DataBinding::Records(vec![]),
//! ))?;
//! println!("{} bytes of base64", payload.content.len());
//! # Ok(())
//! # }
//! ```

pub mod codec;
pub mod credential;
mod error;
mod pipeline;

pub use error::{PipelineError, ReportError, Stage};
pub use pipeline::{Protection, ReportPayload, ReportRequest, ReportService, ServicePolicy};

// Re-export the pipeline crates under stable names.
pub use folio_engine as engine;
pub use folio_export as export;
pub use folio_source as source;
pub use folio_store as store;
pub use folio_template as template;

// Re-export the types a caller touches on every request.
pub use folio_engine::{FilledReport, ParameterMap};
pub use folio_export::{
    CipherStrength, EncryptionSpec, ExportFormat, Exporter, Permissions,
};
pub use folio_source::{DataBinding, ReportConnection};
pub use folio_store::{TemplateId, TemplateStore};
pub use folio_template::CompiledReport;
