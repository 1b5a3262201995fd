//! Table view.

use serde::Serialize;

use pageview_core::{
    FieldPath, Record, RecordId, SortDirection, SortState, TableViewConfig, ToolbarState,
};

use super::Renderer;
use crate::format::FormattedValue;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TableRender {
    /// Displayed columns in declared order.
    pub columns: Vec<ColumnHeader>,
    /// Columns hidden by config and not revealed, offered for "show column".
    pub hidden_columns: Vec<HiddenColumn>,
    pub rows: Vec<TableRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnHeader {
    pub field: FieldPath,
    pub label: String,
    pub sortable: bool,
    /// Current sort direction if this column is the sort key.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sorted: Option<SortDirection>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HiddenColumn {
    pub field: FieldPath,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TableRow {
    pub id: RecordId,
    pub selected: bool,
    /// One cell per displayed column.
    pub cells: Vec<FormattedValue>,
}

pub(super) fn render(
    renderer: &Renderer<'_>,
    config: &TableViewConfig,
    toolbar: &ToolbarState,
    records: &[Record],
) -> TableRender {
    let (shown, hidden): (Vec<_>, Vec<_>) = config
        .columns
        .iter()
        .partition(|c| c.visible || toolbar.shown_columns.contains(c.field.as_str()));

    let columns = shown
        .iter()
        .map(|c| ColumnHeader {
            field: c.field.clone(),
            label: c.label.clone(),
            sortable: c.sortable,
            sorted: toolbar
                .sort
                .as_ref()
                .filter(|s| s.field == c.field)
                .map(|s| s.direction),
            width: c.width,
        })
        .collect();

    let hidden_columns = hidden
        .iter()
        .map(|c| HiddenColumn {
            field: c.field.clone(),
            label: c.label.clone(),
        })
        .collect();

    let rows = records
        .iter()
        .map(|record| TableRow {
            id: record.id().clone(),
            selected: toolbar.selected.contains(record.id()),
            cells: shown
                .iter()
                .map(|c| {
                    let format = c.format.clone().unwrap_or_default();
                    renderer.registry.format_field(record, &c.field, &format)
                })
                .collect(),
        })
        .collect();

    TableRender {
        columns,
        hidden_columns,
        rows,
    }
}

/// Next sort after clicking a column header: asc, then desc, then cleared.
///
/// Clicking a different column starts over at ascending.
pub fn toggle_sort(current: Option<&SortState>, field: &FieldPath) -> Option<SortState> {
    match current {
        Some(s) if &s.field == field => match s.direction {
            SortDirection::Asc => Some(SortState {
                field: field.clone(),
                direction: SortDirection::Desc,
            }),
            SortDirection::Desc => None,
        },
        _ => Some(SortState {
            field: field.clone(),
            direction: SortDirection::Asc,
        }),
    }
}
