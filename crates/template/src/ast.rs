//! Serde model of the on-disk report definition.

use serde::Deserialize;

fn default_page_width() -> f32 {
    595.0
}

fn default_page_height() -> f32 {
    842.0
}

fn default_margin() -> f32 {
    36.0
}

/// Horizontal alignment of a column's text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HAlign {
    #[default]
    Left,
    Center,
    Right,
}

/// Root element of a report definition.
#[derive(Debug, Clone, Deserialize)]
pub struct ReportDef {
    #[serde(rename = "@name")]
    pub name: String,

    /// Optional title band text; may reference parameters as `{{NAME}}`.
    #[serde(rename = "@title")]
    pub title: Option<String>,

    /// Page dimensions in points; defaults to A4 portrait.
    #[serde(rename = "@page-width", default = "default_page_width")]
    pub page_width: f32,

    #[serde(rename = "@page-height", default = "default_page_height")]
    pub page_height: f32,

    #[serde(rename = "@margin", default = "default_margin")]
    pub margin: f32,

    /// Query executed through a connection binding. Ignored for
    /// record-bound renders.
    #[serde(rename = "query")]
    pub query: Option<String>,

    #[serde(rename = "parameter", default)]
    pub parameters: Vec<ParameterDef>,

    #[serde(rename = "column", default)]
    pub columns: Vec<ColumnDef>,
}

/// A declared scalar input of the report.
#[derive(Debug, Clone, Deserialize)]
pub struct ParameterDef {
    #[serde(rename = "@name")]
    pub name: String,

    /// Value used when the caller supplies none. A parameter without a
    /// default is required.
    #[serde(rename = "@default")]
    pub default: Option<String>,
}

/// One column of the detail band.
#[derive(Debug, Clone, Deserialize)]
pub struct ColumnDef {
    /// Field looked up in each bound record.
    #[serde(rename = "@field")]
    pub field: String,

    /// Header label; defaults to the field name.
    #[serde(rename = "@header")]
    pub header: Option<String>,

    /// Column width in points.
    #[serde(rename = "@width")]
    pub width: f32,

    #[serde(rename = "@align", default)]
    pub align: HAlign,
}
