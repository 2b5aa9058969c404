//! Data binding abstractions for the report pipeline.
//!
//! A render call is fed by exactly one [`DataBinding`]:
//!
//! - [`DataBinding::Records`]: an already-fetched, in-memory ordered
//!   sequence of rows. Row order is preserved into the rendered output.
//! - [`DataBinding::Connection`]: a live, caller-owned connection. The
//!   template declares its own query; the engine issues it through the
//!   [`ReportConnection`] seam and never retries.
//!
//! The connection variant borrows. The engine cannot close, keep, or
//! outlive the caller's connection; scoped acquisition and release stay
//! with the caller.

use serde_json::Value;
use thiserror::Error;

/// Error type for data acquisition.
#[derive(Error, Debug, Clone)]
pub enum SourceError {
    #[error("query failed: {0}")]
    Query(String),

    #[error("connection unavailable: {0}")]
    Connection(String),
}

/// Errors raised when a template and its binding disagree.
#[derive(Error, Debug, Clone)]
pub enum BindingError {
    #[error("missing required parameter '{0}'")]
    MissingParameter(String),

    #[error("template declares no query but a connection binding was supplied")]
    QueryMissing,

    #[error("text expansion failed: {0}")]
    Text(String),
}

/// The seam between the render engine and a caller-owned database
/// connection.
///
/// Implementations adapt whatever driver the caller uses. The engine calls
/// [`query`](ReportConnection::query) exactly once per render with the
/// query embedded in the template, expects rows as JSON objects, and
/// treats any error as fatal for the request.
pub trait ReportConnection {
    /// Execute `sql` read-only and return all rows, in result order.
    fn query(&mut self, sql: &str) -> Result<Vec<Value>, SourceError>;
}

/// The data supplied to a single render call.
///
/// Exactly one variant is active per render; the engine dispatches on the
/// tag. `Records` keeps input order; `Connection` defers to the template's
/// embedded query.
pub enum DataBinding<'c> {
    /// Pre-materialized rows, each a JSON object.
    Records(Vec<Value>),
    /// A scoped, caller-owned connection.
    Connection(&'c mut dyn ReportConnection),
}

impl DataBinding<'_> {
    /// Human-readable tag for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            DataBinding::Records(_) => "records",
            DataBinding::Connection(_) => "connection",
        }
    }
}

impl std::fmt::Debug for DataBinding<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataBinding::Records(rows) => f.debug_tuple("Records").field(&rows.len()).finish(),
            DataBinding::Connection(_) => f.write_str("Connection"),
        }
    }
}
