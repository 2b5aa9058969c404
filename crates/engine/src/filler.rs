//! The fill pass: parameter resolution, row acquisition, band layout.

use crate::report::{ColumnLayout, FilledPage, FilledReport, Slot, TextElement};
use crate::{FillError, ParameterMap, RenderError};
use chrono::Utc;
use folio_source::{BindingError, DataBinding};
use folio_template::CompiledReport;
use handlebars::Handlebars;
use serde_json::Value;

const TITLE_SIZE: f32 = 16.0;
const TITLE_HEIGHT: f32 = 28.0;
const HEADER_SIZE: f32 = 10.0;
const HEADER_HEIGHT: f32 = 18.0;
const DETAIL_SIZE: f32 = 9.0;
const ROW_HEIGHT: f32 = 14.0;
const FOOTER_SIZE: f32 = 8.0;
const FOOTER_HEIGHT: f32 = 16.0;

/// Execute `template` against `binding`, producing the paginated document.
///
/// Single pass, whole-document-or-nothing. `parameters` is an open map of
/// named scalars; declared parameters without a default must be present in
/// it. Zero bound rows is not an error: the result is a one-page report
/// with header and no detail cells.
pub fn fill(
    template: &CompiledReport,
    binding: DataBinding<'_>,
    parameters: &ParameterMap,
) -> Result<FilledReport, FillError> {
    let generated_at = Utc::now();
    let resolved = resolve_parameters(template, parameters, &generated_at.to_rfc3339())?;
    let title = expand_title(template, &resolved)?;

    log::debug!(
        "filling report '{}' from {} binding",
        template.name,
        binding.kind()
    );

    let rows = acquire_rows(template, binding)?;
    let cells = materialize_cells(template, &rows)?;
    Ok(lay_out(template, title, cells, generated_at)?)
}

/// Merge declared defaults, caller-supplied values, and built-ins.
fn resolve_parameters(
    template: &CompiledReport,
    supplied: &ParameterMap,
    generated_at: &str,
) -> Result<ParameterMap, BindingError> {
    let mut resolved = ParameterMap::new();
    for spec in &template.parameters {
        match (supplied.get(&spec.name), &spec.default) {
            (Some(value), _) => {
                resolved.insert(spec.name.clone(), value.clone());
            }
            (None, Some(default)) => {
                resolved.insert(spec.name.clone(), Value::String(default.clone()));
            }
            (None, None) => return Err(BindingError::MissingParameter(spec.name.clone())),
        }
    }
    // Undeclared supplied parameters pass through; the map is open.
    for (name, value) in supplied {
        resolved
            .entry(name.clone())
            .or_insert_with(|| value.clone());
    }
    resolved
        .entry("REPORT_NAME".to_string())
        .or_insert_with(|| Value::String(template.name.clone()));
    resolved
        .entry("GENERATED_AT".to_string())
        .or_insert_with(|| Value::String(generated_at.to_string()));
    Ok(resolved)
}

fn expand_title(
    template: &CompiledReport,
    parameters: &ParameterMap,
) -> Result<Option<String>, BindingError> {
    let Some(raw) = &template.title else {
        return Ok(None);
    };
    let mut registry = Handlebars::new();
    registry.set_strict_mode(true);
    registry.register_escape_fn(handlebars::no_escape);
    registry
        .render_template(raw, &Value::Object(parameters.clone()))
        .map(Some)
        .map_err(|e| BindingError::Text(e.to_string()))
}

fn acquire_rows(
    template: &CompiledReport,
    binding: DataBinding<'_>,
) -> Result<Vec<Value>, FillError> {
    match binding {
        DataBinding::Records(rows) => {
            log::debug!("bound {} pre-materialized rows", rows.len());
            Ok(rows)
        }
        DataBinding::Connection(connection) => {
            let query = template
                .query
                .as_deref()
                .ok_or(BindingError::QueryMissing)?;
            let rows = connection.query(query).map_err(RenderError::Source)?;
            log::debug!("query returned {} rows", rows.len());
            Ok(rows)
        }
    }
}

struct CellValue {
    text: String,
    number: Option<f64>,
}

fn materialize_cells(
    template: &CompiledReport,
    rows: &[Value],
) -> Result<Vec<Vec<CellValue>>, RenderError> {
    rows.iter()
        .enumerate()
        .map(|(row, value)| {
            let object = value.as_object().ok_or(RenderError::RowShape { row })?;
            template
                .columns
                .iter()
                .map(|column| {
                    let field = object.get(&column.field).ok_or_else(|| {
                        RenderError::MissingField {
                            row,
                            field: column.field.clone(),
                        }
                    })?;
                    scalar_text(field).ok_or_else(|| RenderError::TypeMismatch {
                        row,
                        field: column.field.clone(),
                    })
                })
                .collect()
        })
        .collect()
}

fn scalar_text(value: &Value) -> Option<CellValue> {
    match value {
        Value::Null => Some(CellValue {
            text: String::new(),
            number: None,
        }),
        Value::String(s) => Some(CellValue {
            text: s.clone(),
            number: None,
        }),
        Value::Number(n) => Some(CellValue {
            text: n.to_string(),
            number: n.as_f64(),
        }),
        Value::Bool(b) => Some(CellValue {
            text: b.to_string(),
            number: None,
        }),
        Value::Array(_) | Value::Object(_) => None,
    }
}

/// Split `total` detail rows into per-page ranges.
///
/// The first page may hold fewer rows than the rest because of the title
/// band. A report with rows that fit on no page is a geometry failure,
/// not a truncation.
fn paginate(
    total: usize,
    rows_first: usize,
    rows_rest: usize,
) -> Result<Vec<(usize, usize)>, RenderError> {
    if total == 0 {
        return Ok(vec![(0, 0)]);
    }
    if rows_first == 0 || rows_rest == 0 {
        return Err(RenderError::PageOverflow);
    }

    let mut ranges = Vec::new();
    let mut start = 0;
    while start < total {
        let cap = if ranges.is_empty() {
            rows_first
        } else {
            rows_rest
        };
        let end = (start + cap).min(total);
        ranges.push((start, end));
        start = end;
    }
    Ok(ranges)
}

fn lay_out(
    template: &CompiledReport,
    title: Option<String>,
    cells: Vec<Vec<CellValue>>,
    generated_at: chrono::DateTime<Utc>,
) -> Result<FilledReport, RenderError> {
    let page = template.page;
    let margin = page.margin;
    let printable = page.printable_width();
    let title_height = if title.is_some() { TITLE_HEIGHT } else { 0.0 };

    let mut columns = Vec::with_capacity(template.columns.len());
    let mut x = margin;
    for spec in &template.columns {
        columns.push(ColumnLayout {
            field: spec.field.clone(),
            header: spec.header.clone(),
            x,
            width: spec.width,
            align: spec.align,
        });
        x += spec.width;
    }

    let detail_bottom = page.height - margin - FOOTER_HEIGHT;
    let capacity = |top: f32| ((detail_bottom - top) / ROW_HEIGHT).floor().max(0.0) as usize;
    let rows_first = capacity(margin + title_height + HEADER_HEIGHT);
    let rows_rest = capacity(margin + HEADER_HEIGHT);

    let ranges = paginate(cells.len(), rows_first, rows_rest)?;
    let total_pages = ranges.len();
    let mut pages = Vec::with_capacity(total_pages);

    for (page_index, (start, end)) in ranges.into_iter().enumerate() {
        let page_number = page_index + 1;
        let mut elements = Vec::new();
        let mut y = margin;

        if page_index == 0 {
            if let Some(text) = &title {
                elements.push(TextElement {
                    x: margin,
                    y,
                    width: printable,
                    font_size: TITLE_SIZE,
                    bold: true,
                    text: text.clone(),
                    number: None,
                    slot: Slot::Title,
                });
                y += TITLE_HEIGHT;
            }
        }

        for (index, column) in columns.iter().enumerate() {
            elements.push(TextElement {
                x: column.x,
                y,
                width: column.width,
                font_size: HEADER_SIZE,
                bold: true,
                text: column.header.clone(),
                number: None,
                slot: Slot::ColumnHeader(index),
            });
        }
        y += HEADER_HEIGHT;

        for (offset, row) in cells[start..end].iter().enumerate() {
            let row_index = start + offset;
            let row_y = y + offset as f32 * ROW_HEIGHT;
            for (column_index, (cell, column)) in row.iter().zip(columns.iter()).enumerate() {
                elements.push(TextElement {
                    x: column.x,
                    y: row_y,
                    width: column.width,
                    font_size: DETAIL_SIZE,
                    bold: false,
                    text: cell.text.clone(),
                    number: cell.number,
                    slot: Slot::Cell {
                        row: row_index,
                        column: column_index,
                    },
                });
            }
        }

        elements.push(TextElement {
            x: margin,
            y: page.height - margin - FOOTER_HEIGHT + 4.0,
            width: printable,
            font_size: FOOTER_SIZE,
            bold: false,
            text: format!("Page {page_number} of {total_pages}"),
            number: None,
            slot: Slot::PageFooter,
        });

        pages.push(FilledPage {
            number: page_number,
            elements,
        });
    }

    Ok(FilledReport {
        name: template.name.clone(),
        page_width: page.width,
        page_height: page.height,
        columns,
        pages,
        generated_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_source::{ReportConnection, SourceError};
    use serde_json::json;

    fn user_list_template() -> CompiledReport {
        folio_template::compile(
            br#"
            <report name="user-list" title="Registered users">
                <query>SELECT id, login FROM app_user ORDER BY id</query>
                <column field="id" header="Id" width="60" align="right"/>
                <column field="login" header="Login" width="160"/>
            </report>
            "#,
        )
        .unwrap()
    }

    fn rows() -> Vec<Value> {
        vec![
            json!({"id": 1, "login": "ada"}),
            json!({"id": 2, "login": "grace"}),
            json!({"id": 3, "login": "mary"}),
        ]
    }

    struct StaticConnection {
        rows: Vec<Value>,
        seen: Vec<String>,
    }

    impl ReportConnection for StaticConnection {
        fn query(&mut self, sql: &str) -> Result<Vec<Value>, SourceError> {
            self.seen.push(sql.to_string());
            Ok(self.rows.clone())
        }
    }

    struct FailingConnection;

    impl ReportConnection for FailingConnection {
        fn query(&mut self, _sql: &str) -> Result<Vec<Value>, SourceError> {
            Err(SourceError::Connection("refused".to_string()))
        }
    }

    #[test]
    fn test_fill_records_single_page() {
        let template = user_list_template();
        let report = fill(
            &template,
            DataBinding::Records(rows()),
            &ParameterMap::new(),
        )
        .unwrap();

        assert_eq!(report.page_count(), 1);
        assert_eq!(report.row_count(), 3);
        assert_eq!(report.columns.len(), 2);

        let page = &report.pages[0];
        let title: Vec<_> = page
            .elements
            .iter()
            .filter(|e| e.slot == Slot::Title)
            .collect();
        assert_eq!(title.len(), 1);
        assert_eq!(title[0].text, "Registered users");

        let headers: Vec<_> = page
            .elements
            .iter()
            .filter(|e| matches!(e.slot, Slot::ColumnHeader(_)))
            .collect();
        assert_eq!(headers.len(), 2);
        assert_eq!(headers[0].text, "Id");

        assert_eq!(page.cells().count(), 6);
        let footer = page
            .elements
            .iter()
            .find(|e| e.slot == Slot::PageFooter)
            .unwrap();
        assert_eq!(footer.text, "Page 1 of 1");
    }

    #[test]
    fn test_fill_preserves_row_order() {
        let template = user_list_template();
        let unsorted = vec![
            json!({"id": 9, "login": "zuse"}),
            json!({"id": 1, "login": "ada"}),
        ];
        let report = fill(
            &template,
            DataBinding::Records(unsorted),
            &ParameterMap::new(),
        )
        .unwrap();

        let cells: Vec<_> = report.pages[0].cells().collect();
        assert_eq!(cells[0].text, "9");
        assert_eq!(cells[0].number, Some(9.0));
        assert_eq!(cells[1].text, "zuse");
        assert_eq!(cells[2].text, "1");
    }

    #[test]
    fn test_fill_zero_rows_is_not_an_error() {
        let template = user_list_template();
        let report = fill(
            &template,
            DataBinding::Records(vec![]),
            &ParameterMap::new(),
        )
        .unwrap();

        assert_eq!(report.page_count(), 1);
        assert_eq!(report.row_count(), 0);
        assert_eq!(report.pages[0].cells().count(), 0);
        // Header band still renders.
        assert!(report.pages[0]
            .elements
            .iter()
            .any(|e| matches!(e.slot, Slot::ColumnHeader(_))));
    }

    #[test]
    fn test_fill_paginates_long_reports() {
        let template = user_list_template();
        let many: Vec<Value> = (0..120)
            .map(|i| json!({"id": i, "login": format!("user{i}")}))
            .collect();
        let report = fill(&template, DataBinding::Records(many), &ParameterMap::new()).unwrap();

        assert!(report.page_count() > 1);
        assert_eq!(report.row_count(), 120);

        let last = report.pages.last().unwrap();
        let footer = last
            .elements
            .iter()
            .find(|e| e.slot == Slot::PageFooter)
            .unwrap();
        assert_eq!(
            footer.text,
            format!("Page {} of {}", report.page_count(), report.page_count())
        );
        // Every page repeats the column header band.
        for page in &report.pages {
            assert!(page
                .elements
                .iter()
                .any(|e| matches!(e.slot, Slot::ColumnHeader(_))));
        }
        // Title only on the first page.
        assert!(report.pages[1..]
            .iter()
            .all(|p| p.elements.iter().all(|e| e.slot != Slot::Title)));
    }

    #[test]
    fn test_fill_connection_uses_template_query() {
        let template = user_list_template();
        let mut connection = StaticConnection {
            rows: rows(),
            seen: vec![],
        };
        let report = fill(
            &template,
            DataBinding::Connection(&mut connection),
            &ParameterMap::new(),
        )
        .unwrap();

        assert_eq!(report.row_count(), 3);
        assert_eq!(connection.seen, vec!["SELECT id, login FROM app_user ORDER BY id"]);
    }

    #[test]
    fn test_fill_connection_without_query_is_binding_error() {
        let template = folio_template::compile(
            br#"<report name="no-query"><column field="id" width="60"/></report>"#,
        )
        .unwrap();
        let mut connection = StaticConnection {
            rows: vec![],
            seen: vec![],
        };
        let result = fill(
            &template,
            DataBinding::Connection(&mut connection),
            &ParameterMap::new(),
        );
        assert!(matches!(
            result,
            Err(FillError::Binding(BindingError::QueryMissing))
        ));
        assert!(connection.seen.is_empty());
    }

    #[test]
    fn test_fill_connection_failure_is_render_error() {
        let template = user_list_template();
        let result = fill(
            &template,
            DataBinding::Connection(&mut FailingConnection),
            &ParameterMap::new(),
        );
        assert!(matches!(
            result,
            Err(FillError::Render(RenderError::Source(_)))
        ));
    }

    #[test]
    fn test_fill_missing_required_parameter() {
        let template = folio_template::compile(
            br#"
            <report name="p" title="{{HEADING}}">
                <parameter name="HEADING"/>
                <column field="id" width="60"/>
            </report>
            "#,
        )
        .unwrap();
        let result = fill(&template, DataBinding::Records(vec![]), &ParameterMap::new());
        assert!(matches!(
            result,
            Err(FillError::Binding(BindingError::MissingParameter(name))) if name == "HEADING"
        ));
    }

    #[test]
    fn test_fill_title_interpolation() {
        let template = folio_template::compile(
            br#"
            <report name="p" title="{{REPORT_NAME}}: {{SUBTITLE}}">
                <parameter name="SUBTITLE" default="everyone"/>
                <column field="id" width="60"/>
            </report>
            "#,
        )
        .unwrap();
        let report = fill(&template, DataBinding::Records(vec![]), &ParameterMap::new()).unwrap();
        let title = report.pages[0]
            .elements
            .iter()
            .find(|e| e.slot == Slot::Title)
            .unwrap();
        assert_eq!(title.text, "p: everyone");
    }

    #[test]
    fn test_fill_supplied_parameter_overrides_default() {
        let template = folio_template::compile(
            br#"
            <report name="p" title="{{SUBTITLE}}">
                <parameter name="SUBTITLE" default="everyone"/>
                <column field="id" width="60"/>
            </report>
            "#,
        )
        .unwrap();
        let mut parameters = ParameterMap::new();
        parameters.insert("SUBTITLE".to_string(), json!("admins"));
        let report = fill(&template, DataBinding::Records(vec![]), &parameters).unwrap();
        let title = report.pages[0]
            .elements
            .iter()
            .find(|e| e.slot == Slot::Title)
            .unwrap();
        assert_eq!(title.text, "admins");
    }

    #[test]
    fn test_fill_missing_field_is_render_error() {
        let template = user_list_template();
        let result = fill(
            &template,
            DataBinding::Records(vec![json!({"id": 1})]),
            &ParameterMap::new(),
        );
        assert!(matches!(
            result,
            Err(FillError::Render(RenderError::MissingField { row: 0, .. }))
        ));
    }

    #[test]
    fn test_fill_non_scalar_field_is_render_error() {
        let template = user_list_template();
        let result = fill(
            &template,
            DataBinding::Records(vec![json!({"id": 1, "login": {"nested": true}})]),
            &ParameterMap::new(),
        );
        assert!(matches!(
            result,
            Err(FillError::Render(RenderError::TypeMismatch { .. }))
        ));
    }

    #[test]
    fn test_fill_non_object_row_is_render_error() {
        let template = user_list_template();
        let result = fill(
            &template,
            DataBinding::Records(vec![json!([1, 2])]),
            &ParameterMap::new(),
        );
        assert!(matches!(
            result,
            Err(FillError::Render(RenderError::RowShape { row: 0 }))
        ));
    }

    #[test]
    fn test_fill_null_renders_empty() {
        let template = user_list_template();
        let report = fill(
            &template,
            DataBinding::Records(vec![json!({"id": 1, "login": null})]),
            &ParameterMap::new(),
        )
        .unwrap();
        let cells: Vec<_> = report.pages[0].cells().collect();
        assert_eq!(cells[1].text, "");
    }

    #[test]
    fn test_fill_tiny_page_overflows() {
        let template = folio_template::compile(
            br#"
            <report name="tiny" page-width="200" page-height="50" margin="10">
                <column field="id" width="60"/>
            </report>
            "#,
        )
        .unwrap();
        let result = fill(
            &template,
            DataBinding::Records(vec![json!({"id": 1})]),
            &ParameterMap::new(),
        );
        assert!(matches!(
            result,
            Err(FillError::Render(RenderError::PageOverflow))
        ));
    }
}
