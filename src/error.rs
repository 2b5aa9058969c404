//! Stage-tagged pipeline errors.
//!
//! Every failure carries the stage it originated in, so a boundary can
//! map template misconfiguration, caller bugs and transient pressure to
//! different responses instead of one generic "generation failed".

use folio_engine::{FillError, RenderError};
use folio_export::ExportError;
use folio_source::BindingError;
use folio_store::StoreError;
use folio_template::CompileError;
use std::fmt;
use thiserror::Error;

/// The pipeline stage a request was in when it failed.
///
/// A request walks `TemplateLoad -> Compile -> Fill -> Export -> Encode`;
/// failure in any stage is terminal for the request and nothing is
/// retried automatically.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    TemplateLoad,
    Compile,
    Fill,
    Export,
    Encode,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::TemplateLoad => "template-load",
            Stage::Compile => "compile",
            Stage::Fill => "fill",
            Stage::Export => "export",
            Stage::Encode => "encode",
        };
        f.write_str(name)
    }
}

/// The five failure kinds of the pipeline taxonomy.
#[derive(Error, Debug)]
pub enum ReportError {
    /// Template missing or unreadable; indicates misconfiguration.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Malformed template; the same template will always fail.
    #[error(transparent)]
    Compile(#[from] CompileError),

    /// Data shape mismatch between template and binding; a caller bug.
    #[error(transparent)]
    Binding(#[from] BindingError),

    /// Mid-fill failure or resource exhaustion.
    #[error(transparent)]
    Render(#[from] RenderError),

    /// Format-specific serialization failure, including invalid
    /// encryption configuration.
    #[error(transparent)]
    Export(#[from] ExportError),
}

impl ReportError {
    /// Short machine-readable kind, for failure headers and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            ReportError::Store(StoreError::NotFound(_)) => "not-found",
            ReportError::Store(_) => "store",
            ReportError::Compile(_) => "compile",
            ReportError::Binding(_) => "binding",
            ReportError::Render(_) => "render",
            ReportError::Export(_) => "export",
        }
    }
}

impl From<FillError> for ReportError {
    fn from(e: FillError) -> Self {
        match e {
            FillError::Binding(binding) => ReportError::Binding(binding),
            FillError::Render(render) => ReportError::Render(render),
        }
    }
}

/// A pipeline failure: what went wrong, and where.
#[derive(Error, Debug)]
#[error("report generation failed during {stage}: {error}")]
pub struct PipelineError {
    pub stage: Stage,
    #[source]
    pub error: ReportError,
}

impl PipelineError {
    pub(crate) fn at(stage: Stage, error: impl Into<ReportError>) -> Self {
        Self {
            stage,
            error: error.into(),
        }
    }
}
