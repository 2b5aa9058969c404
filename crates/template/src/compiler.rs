//! Compilation of a parsed definition into an executable artifact.
//!
//! Compilation is where schema violations are caught: a definition that
//! parses as XML can still be unusable (no columns, duplicate fields,
//! columns wider than the page). Everything the fill stage relies on is
//! validated here, once, so rendering never re-checks the template.

use crate::ast::{HAlign, ReportDef};
use crate::CompileError;
use std::collections::HashSet;

/// Page geometry in points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageGeometry {
    pub width: f32,
    pub height: f32,
    pub margin: f32,
}

impl PageGeometry {
    /// Width available to content between the left and right margins.
    pub fn printable_width(&self) -> f32 {
        self.width - 2.0 * self.margin
    }
}

/// A declared scalar input.
#[derive(Debug, Clone)]
pub struct ParameterSpec {
    pub name: String,
    pub default: Option<String>,
}

/// A validated detail-band column.
#[derive(Debug, Clone)]
pub struct ColumnSpec {
    pub field: String,
    pub header: String,
    pub width: f32,
    pub align: HAlign,
}

/// An executable report artifact.
///
/// Stateless after construction; shared read-only across concurrent
/// renders. Produced only by [`compile`].
#[derive(Debug, Clone)]
pub struct CompiledReport {
    pub name: String,
    pub title: Option<String>,
    pub query: Option<String>,
    pub page: PageGeometry,
    pub parameters: Vec<ParameterSpec>,
    pub columns: Vec<ColumnSpec>,
}

impl CompiledReport {
    /// Look up a declared parameter by name.
    pub fn parameter(&self, name: &str) -> Option<&ParameterSpec> {
        self.parameters.iter().find(|p| p.name == name)
    }
}

/// Compile raw definition bytes into a [`CompiledReport`].
///
/// Pure and deterministic: identical bytes produce an identical artifact.
pub fn compile(definition: &[u8]) -> Result<CompiledReport, CompileError> {
    let text = std::str::from_utf8(definition)?;
    let def: ReportDef =
        quick_xml::de::from_str(text).map_err(|e| CompileError::Parse(e.to_string()))?;
    validate(&def)?;

    let page = PageGeometry {
        width: def.page_width,
        height: def.page_height,
        margin: def.margin,
    };

    let columns = def
        .columns
        .into_iter()
        .map(|c| ColumnSpec {
            header: c.header.unwrap_or_else(|| c.field.clone()),
            field: c.field,
            width: c.width,
            align: c.align,
        })
        .collect();

    let parameters = def
        .parameters
        .into_iter()
        .map(|p| ParameterSpec {
            name: p.name,
            default: p.default,
        })
        .collect();

    Ok(CompiledReport {
        name: def.name,
        title: def.title,
        query: def.query.map(|q| q.trim().to_string()),
        page,
        parameters,
        columns,
    })
}

fn validate(def: &ReportDef) -> Result<(), CompileError> {
    if def.name.trim().is_empty() {
        return Err(CompileError::Invalid("report name is empty".to_string()));
    }
    if def.columns.is_empty() {
        return Err(CompileError::Invalid(format!(
            "report '{}' declares no columns",
            def.name
        )));
    }
    if def.page_width <= 0.0 || def.page_height <= 0.0 {
        return Err(CompileError::Invalid(format!(
            "page dimensions must be positive, got {}x{}",
            def.page_width, def.page_height
        )));
    }
    if def.margin < 0.0 || 2.0 * def.margin >= def.page_width.min(def.page_height) {
        return Err(CompileError::Invalid(format!(
            "margin {} leaves no printable area",
            def.margin
        )));
    }
    if let Some(query) = &def.query {
        if query.trim().is_empty() {
            return Err(CompileError::Invalid(
                "query element is present but empty".to_string(),
            ));
        }
    }

    let mut fields = HashSet::new();
    for column in &def.columns {
        if column.field.trim().is_empty() {
            return Err(CompileError::Invalid("column field is empty".to_string()));
        }
        if !fields.insert(column.field.as_str()) {
            return Err(CompileError::Invalid(format!(
                "duplicate column field '{}'",
                column.field
            )));
        }
        if column.width <= 0.0 {
            return Err(CompileError::Invalid(format!(
                "column '{}' has non-positive width {}",
                column.field, column.width
            )));
        }
    }

    let printable = def.page_width - 2.0 * def.margin;
    let total: f32 = def.columns.iter().map(|c| c.width).sum();
    if total > printable {
        return Err(CompileError::Invalid(format!(
            "columns total {total}pt but only {printable}pt is printable"
        )));
    }

    let mut names = HashSet::new();
    for parameter in &def.parameters {
        if parameter.name.trim().is_empty() {
            return Err(CompileError::Invalid("parameter name is empty".to_string()));
        }
        if !names.insert(parameter.name.as_str()) {
            return Err(CompileError::Invalid(format!(
                "duplicate parameter '{}'",
                parameter.name
            )));
        }
    }

    Ok(())
}
