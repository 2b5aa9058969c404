//! Render engine for the Folio report pipeline.
//!
//! [`fill`] executes a compiled template against a data binding and a
//! parameter map, producing a [`FilledReport`]: the materialized, paginated
//! document model that exporters serialize. The pass is single-shot and
//! synchronous; either the whole document is materialized or the call
//! fails. No partial result ever escapes.
//!
//! ## Data flow
//!
//! ```text
//! CompiledReport ─┐
//! DataBinding ────┼── fill() ──> FilledReport ──> exporter
//! parameters ─────┘
//! ```

mod filler;
mod report;

pub use filler::fill;
pub use report::{ColumnLayout, FilledPage, FilledReport, Slot, TextElement};

pub use folio_source::{BindingError, DataBinding, ReportConnection, SourceError};

use thiserror::Error;

/// Parameter map: named scalar inputs the template may reference.
pub type ParameterMap = serde_json::Map<String, serde_json::Value>;

/// Failures while materializing the document itself.
///
/// All of these are fatal for the request; retrying is a caller decision
/// and only sensible for transient source pressure.
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("data source failed: {0}")]
    Source(#[from] SourceError),

    #[error("row {row} is not an object")]
    RowShape { row: usize },

    #[error("row {row} has no field '{field}'")]
    MissingField { row: usize, field: String },

    #[error("row {row} field '{field}' is not a scalar value")]
    TypeMismatch { row: usize, field: String },

    #[error("page geometry cannot fit any detail rows")]
    PageOverflow,
}

/// Everything that can go wrong inside [`fill`].
#[derive(Error, Debug)]
pub enum FillError {
    #[error(transparent)]
    Binding(#[from] BindingError),

    #[error(transparent)]
    Render(#[from] RenderError),
}
