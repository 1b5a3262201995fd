//! Export of the current query's full result.
//!
//! Exports read the unpaginated result of the current query and emit the
//! columns the user currently sees. CSV, JSON and XLSX are encoded here;
//! PDF goes through an external [`ExportRenderer`].

use rust_xlsxwriter::{Format, Workbook};
use serde::Serialize;
use serde_json::{Map, Value};

use pageview_core::{
    ColumnFormat, ExportError, ExportFormat, FieldPath, PageConfig, PermissionKind, Permissions,
    Record, RecordId, ToolbarState,
};

use crate::format::FormatRegistry;

// =============================================================================
// Types
// =============================================================================

/// Export payload with formatted and raw cell values.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportTable {
    pub title: String,
    pub columns: Vec<ExportColumn>,
    pub rows: Vec<ExportRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportColumn {
    pub field: FieldPath,
    pub label: String,
    #[serde(skip)]
    format: ColumnFormat,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportRow {
    pub id: RecordId,
    pub cells: Vec<ExportCell>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportCell {
    pub raw: Value,
    /// Formatted text. Empty for null and missing values.
    pub display: String,
}

/// An encoded export ready to hand to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportFile {
    pub filename: String,
    pub format: ExportFormat,
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
}

/// Renders formats the engine does not encode itself.
#[cfg_attr(test, mockall::automock)]
pub trait ExportRenderer: Send + Sync {
    fn render(&self, format: ExportFormat, table: &ExportTable) -> Result<Vec<u8>, String>;
}

// =============================================================================
// Operations
// =============================================================================

/// Check that `format` may be exported from this page.
pub fn check_export(
    page: &PageConfig,
    permissions: Permissions,
    format: ExportFormat,
) -> Result<(), ExportError> {
    let config = page
        .toolbar
        .export
        .as_ref()
        .filter(|e| e.enabled)
        .ok_or(ExportError::Disabled)?;
    if !config.formats.contains(&format) {
        return Err(ExportError::UndeclaredFormat(format));
    }
    if !permissions.allows(PermissionKind::Export) {
        return Err(ExportError::NotPermitted);
    }
    Ok(())
}

/// Columns the user currently sees.
///
/// Uses the table's displayed columns when the page has a table view, and
/// the active view's fields otherwise.
pub fn export_columns(page: &PageConfig, toolbar: &ToolbarState) -> Vec<ExportColumn> {
    if let Some(table) = &page.views.table {
        return table
            .columns
            .iter()
            .filter(|c| c.visible || toolbar.shown_columns.contains(c.field.as_str()))
            .map(|c| ExportColumn {
                field: c.field.clone(),
                label: c.label.clone(),
                format: c.format.clone().unwrap_or_default(),
            })
            .collect();
    }

    let mut columns: Vec<ExportColumn> = Vec::new();
    if let Some(view) = page.views.get(toolbar.active_view) {
        for (_, field) in view.field_refs() {
            if columns.iter().all(|c| &c.field != field) {
                columns.push(ExportColumn {
                    field: field.clone(),
                    label: field.to_string(),
                    format: ColumnFormat::Text,
                });
            }
        }
    }
    columns
}

/// Build the export payload from records.
pub fn export_table(
    page: &PageConfig,
    columns: Vec<ExportColumn>,
    records: &[Record],
    registry: &FormatRegistry,
) -> ExportTable {
    let rows = records
        .iter()
        .map(|record| ExportRow {
            id: record.id().clone(),
            cells: columns
                .iter()
                .map(|column| {
                    let raw = record.get(&column.field).cloned().unwrap_or(Value::Null);
                    let display = if raw.is_null() {
                        String::new()
                    } else {
                        registry
                            .format_field(record, &column.field, &column.format)
                            .display
                    };
                    ExportCell { raw, display }
                })
                .collect(),
        })
        .collect();

    ExportTable {
        title: page.title.clone(),
        columns,
        rows,
    }
}

/// Encode a payload in `format`.
pub fn encode(
    format: ExportFormat,
    table: &ExportTable,
    renderer: Option<&dyn ExportRenderer>,
) -> Result<Vec<u8>, ExportError> {
    match format {
        ExportFormat::Csv => encode_csv(table),
        ExportFormat::Json => encode_json(table),
        ExportFormat::Xlsx => encode_xlsx(table),
        ExportFormat::Pdf => {
            let renderer = renderer.ok_or(ExportError::Unsupported(format))?;
            renderer.render(format, table).map_err(ExportError::Render)
        }
    }
}

/// Download name: the configured base name or the page id.
pub fn export_filename(page: &PageConfig, format: ExportFormat) -> String {
    let base = page
        .toolbar
        .export
        .as_ref()
        .and_then(|e| e.filename.as_deref())
        .unwrap_or(&page.id);
    format!("{base}.{}", format.extension())
}

// =============================================================================
// Encoders
// =============================================================================

fn encode_csv(table: &ExportTable) -> Result<Vec<u8>, ExportError> {
    let render_err = |e: csv::Error| ExportError::Render(e.to_string());

    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record(table.columns.iter().map(|c| c.label.as_str()))
        .map_err(render_err)?;
    for row in &table.rows {
        writer
            .write_record(row.cells.iter().map(|c| c.display.as_str()))
            .map_err(render_err)?;
    }
    writer
        .into_inner()
        .map_err(|e| ExportError::Render(e.to_string()))
}

fn encode_json(table: &ExportTable) -> Result<Vec<u8>, ExportError> {
    let rows: Vec<Map<String, Value>> = table
        .rows
        .iter()
        .map(|row| {
            let mut object = Map::new();
            object.insert("id".to_string(), Value::String(row.id.to_string()));
            for (column, cell) in table.columns.iter().zip(&row.cells) {
                object.insert(column.field.to_string(), cell.raw.clone());
            }
            object
        })
        .collect();
    serde_json::to_vec_pretty(&rows).map_err(|e| ExportError::Render(e.to_string()))
}

fn encode_xlsx(table: &ExportTable) -> Result<Vec<u8>, ExportError> {
    let xlsx_err = |e: rust_xlsxwriter::XlsxError| ExportError::Render(e.to_string());

    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(sheet_name(&table.title)).map_err(xlsx_err)?;

    let header = Format::new().set_bold();
    for (col, column) in table.columns.iter().enumerate() {
        worksheet
            .write_string_with_format(0, col as u16, &column.label, &header)
            .map_err(xlsx_err)?;
    }

    for (index, row) in table.rows.iter().enumerate() {
        let r = index as u32 + 1;
        for (col, cell) in row.cells.iter().enumerate() {
            let c = col as u16;
            match &cell.raw {
                Value::Null => {}
                Value::Number(n) => {
                    if let Some(n) = n.as_f64() {
                        worksheet.write_number(r, c, n).map_err(xlsx_err)?;
                    }
                }
                Value::Bool(b) => {
                    worksheet.write_boolean(r, c, *b).map_err(xlsx_err)?;
                }
                _ => {
                    worksheet.write_string(r, c, &cell.display).map_err(xlsx_err)?;
                }
            }
        }
    }

    workbook.save_to_buffer().map_err(xlsx_err)
}

/// Worksheet names are limited to 31 characters without `[]:*?/\`.
fn sheet_name(title: &str) -> String {
    let name: String = title
        .chars()
        .filter(|c| !matches!(c, '[' | ']' | ':' | '*' | '?' | '/' | '\\'))
        .take(31)
        .collect();
    let name = name.trim();
    if name.is_empty() {
        "Export".to_string()
    } else {
        name.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::tests::{crm_page, crm_records};
    use pageview_core::{QueryDefaults, ViewType};

    fn table() -> ExportTable {
        let page = crm_page();
        let toolbar = ToolbarState::for_page(&page, &QueryDefaults::default());
        export_table(
            &page,
            export_columns(&page, &toolbar),
            &crm_records(),
            &FormatRegistry::default(),
        )
    }

    #[test]
    fn test_check_export() {
        let mut page = crm_page();
        assert!(matches!(
            check_export(&page, Permissions::all(), ExportFormat::Csv),
            Err(ExportError::Disabled)
        ));

        page.toolbar.export = Some(pageview_core::ExportConfig {
            enabled: true,
            formats: vec![ExportFormat::Csv],
            filename: Some("deals-export".to_string()),
        });
        assert!(check_export(&page, Permissions::all(), ExportFormat::Csv).is_ok());
        assert!(matches!(
            check_export(&page, Permissions::all(), ExportFormat::Xlsx),
            Err(ExportError::UndeclaredFormat(ExportFormat::Xlsx))
        ));
        assert!(matches!(
            check_export(&page, Permissions::READ, ExportFormat::Csv),
            Err(ExportError::NotPermitted)
        ));
        assert_eq!(export_filename(&page, ExportFormat::Csv), "deals-export.csv");
    }

    #[test]
    fn test_csv_uses_visible_columns() {
        let bytes = encode(ExportFormat::Csv, &table(), None).unwrap();
        let csv = String::from_utf8(bytes).unwrap();
        insta::assert_snapshot!(csv, @r###"
        Deal,Stage,Amount
        Acme,lead,"$1,200.00"
        Globex,won,"$5,000.00"
        Initech,stalled,
        Umbrella,,$300.00
        "###);
    }

    #[test]
    fn test_json_keeps_raw_values() {
        let bytes = encode(ExportFormat::Json, &table(), None).unwrap();
        let rows: Vec<Value> = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0]["amount"], serde_json::json!(1200));
        assert_eq!(rows[0]["id"], serde_json::json!("d1"));
        assert!(rows[0].get("notes").is_none());
    }

    #[test]
    fn test_xlsx_is_a_zip_container() {
        let bytes = encode(ExportFormat::Xlsx, &table(), None).unwrap();
        assert_eq!(&bytes[..2], b"PK");
    }

    #[test]
    fn test_pdf_requires_renderer() {
        assert!(matches!(
            encode(ExportFormat::Pdf, &table(), None),
            Err(ExportError::Unsupported(ExportFormat::Pdf))
        ));

        let mut renderer = MockExportRenderer::new();
        renderer
            .expect_render()
            .withf(|format, table| *format == ExportFormat::Pdf && table.rows.len() == 4)
            .times(1)
            .returning(|_, _| Ok(b"%PDF-1.7".to_vec()));
        let bytes = encode(ExportFormat::Pdf, &table(), Some(&renderer)).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn test_columns_without_table_follow_active_view() {
        let mut page = crm_page();
        page.views.table = None;
        page.toolbar.view_types = vec![ViewType::Kanban];
        let mut toolbar = ToolbarState::for_page(&page, &QueryDefaults::default());
        toolbar.active_view = ViewType::Kanban;
        let labels: Vec<String> = export_columns(&page, &toolbar)
            .into_iter()
            .map(|c| c.label)
            .collect();
        assert_eq!(labels, ["stage", "name", "amount"]);
    }

    #[test]
    fn test_sheet_name_sanitized() {
        assert_eq!(sheet_name("Q1 [draft]: deals?"), "Q1 draft deals");
        assert_eq!(sheet_name("///"), "Export");
        assert_eq!(sheet_name(&"x".repeat(40)).len(), 31);
    }
}
