//! View Renderer Dispatch.
//!
//! Maps the active view type to a render tree built from fetched records.
//! The tree is framework-neutral data: formatted values, layout hints and
//! counts. Dispatch is an exhaustive match over [`ViewConfig`], so a new
//! view type cannot be added without a renderer.

mod cards;
mod map;
mod table;
mod temporal;

pub use cards::{GridRender, KanbanLane, KanbanRender, ListRender};
pub use map::{MapMarker, MapRender};
pub use table::{toggle_sort, ColumnHeader, HiddenColumn, TableRender, TableRow};
pub use temporal::{TemporalRender, TemporalSpan};

use serde::Serialize;

use pageview_core::{
    ColumnFormat, FieldPath, PageConfig, Record, RecordId, ToolbarError, ToolbarState,
    ViewConfig,
};

use crate::format::{FormatRegistry, FormattedValue};
use crate::resolver::active_view;

// =============================================================================
// Render tree
// =============================================================================

/// Rendered content of one view.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "view", rename_all = "camelCase")]
pub enum RenderTree {
    Table(TableRender),
    List(ListRender),
    Grid(GridRender),
    Kanban(KanbanRender),
    Calendar(TemporalRender),
    Timeline(TemporalRender),
    Gantt(TemporalRender),
    Map(MapRender),
}

/// A record rendered as a card (list item, grid card, kanban card).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    pub id: RecordId,
    pub selected: bool,
    pub title: FormattedValue,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<FormattedValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub badge: Option<FormattedValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    pub fields: Vec<LabelledValue>,
}

/// A secondary field shown with its label.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelledValue {
    pub field: FieldPath,
    pub label: String,
    pub value: FormattedValue,
}

// =============================================================================
// Renderer
// =============================================================================

/// Renders the views of one page.
pub struct Renderer<'a> {
    page: &'a PageConfig,
    registry: &'a FormatRegistry,
}

impl<'a> Renderer<'a> {
    pub fn new(page: &'a PageConfig, registry: &'a FormatRegistry) -> Self {
        Self { page, registry }
    }

    /// Render the toolbar's active view.
    pub fn render(
        &self,
        toolbar: &ToolbarState,
        records: &[Record],
    ) -> Result<RenderTree, ToolbarError> {
        let view = active_view(self.page, toolbar.active_view)?;
        Ok(self.render_view(view, toolbar, records))
    }

    /// Render a specific view configuration.
    pub fn render_view(
        &self,
        view: ViewConfig<'_>,
        toolbar: &ToolbarState,
        records: &[Record],
    ) -> RenderTree {
        match view {
            ViewConfig::Table(config) => {
                RenderTree::Table(table::render(self, config, toolbar, records))
            }
            ViewConfig::List(config) => {
                RenderTree::List(cards::render_list(self, config, toolbar, records))
            }
            ViewConfig::Grid(config) => {
                RenderTree::Grid(cards::render_grid(self, config, toolbar, records))
            }
            ViewConfig::Kanban(config) => {
                RenderTree::Kanban(cards::render_kanban(self, config, toolbar, records))
            }
            ViewConfig::Calendar(config) => {
                RenderTree::Calendar(temporal::render_calendar(self, config, records))
            }
            ViewConfig::Timeline(config) => {
                RenderTree::Timeline(temporal::render_timeline(self, config, records))
            }
            ViewConfig::Gantt(config) => {
                RenderTree::Gantt(temporal::render_gantt(self, config, records))
            }
            ViewConfig::Map(config) => RenderTree::Map(map::render(self, config, records)),
        }
    }

    // -------------------------------------------------------------------------
    // Shared helpers
    // -------------------------------------------------------------------------

    /// Format declared for `field` by the table view, or plain text.
    fn format_for(&self, field: &FieldPath) -> ColumnFormat {
        self.page
            .views
            .table
            .as_ref()
            .and_then(|t| t.column(field.as_str()))
            .and_then(|c| c.format.clone())
            .unwrap_or_default()
    }

    /// Label declared for `field` by the table view, or the path itself.
    fn label_for(&self, field: &FieldPath) -> String {
        self.page
            .views
            .table
            .as_ref()
            .and_then(|t| t.column(field.as_str()))
            .map(|c| c.label.clone())
            .unwrap_or_else(|| field.to_string())
    }

    fn cell(&self, record: &Record, field: &FieldPath) -> FormattedValue {
        self.registry
            .format_field(record, field, &self.format_for(field))
    }

    fn labelled(&self, record: &Record, fields: &[FieldPath]) -> Vec<LabelledValue> {
        fields
            .iter()
            .map(|field| LabelledValue {
                field: field.clone(),
                label: self.label_for(field),
                value: self.cell(record, field),
            })
            .collect()
    }

    fn text(&self, record: &Record, field: &FieldPath) -> FormattedValue {
        self.registry
            .format_field(record, field, &ColumnFormat::Text)
    }
}

impl RenderTree {
    /// Number of records placed in the tree.
    pub fn placed(&self) -> usize {
        match self {
            RenderTree::Table(t) => t.rows.len(),
            RenderTree::List(l) => l.items.len(),
            RenderTree::Grid(g) => g.cards.len(),
            RenderTree::Kanban(k) => k.total(),
            RenderTree::Calendar(t) | RenderTree::Timeline(t) | RenderTree::Gantt(t) => {
                t.spans.len()
            }
            RenderTree::Map(m) => m.markers.len(),
        }
    }
}
