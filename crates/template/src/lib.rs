//! Report definition format and compiler.
//!
//! A report definition is a small XML document describing a columnar
//! report: page geometry, an optional title, declared parameters, the
//! columns of the detail band, and an optional embedded query for
//! connection-bound rendering.
//!
//! ```xml
//! <report name="user-list" title="Registered users">
//!     <query>SELECT id, login, name FROM app_user ORDER BY id</query>
//!     <parameter name="SUBTITLE" default=""/>
//!     <column field="id" header="Id" width="60" align="right"/>
//!     <column field="login" header="Login" width="160"/>
//!     <column field="name" header="Name" width="240"/>
//! </report>
//! ```
//!
//! [`compile`] is a pure function of the definition bytes: the same bytes
//! always produce the same [`CompiledReport`], which is immutable after
//! construction and safe to share across concurrent renders.

mod ast;
mod compiler;

pub use ast::{ColumnDef, HAlign, ParameterDef, ReportDef};
pub use compiler::{compile, ColumnSpec, CompiledReport, PageGeometry, ParameterSpec};

use thiserror::Error;

/// Errors produced while turning definition bytes into a [`CompiledReport`].
#[derive(Error, Debug)]
pub enum CompileError {
    #[error("template is not valid UTF-8: {0}")]
    Encoding(#[from] std::str::Utf8Error),

    #[error("template XML is malformed: {0}")]
    Parse(String),

    #[error("template is invalid: {0}")]
    Invalid(String),
}
