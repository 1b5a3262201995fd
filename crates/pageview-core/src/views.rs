//! View types and their per-type configuration.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::format::ColumnFormat;
use crate::record::FieldPath;

// =============================================================================
// ViewType
// =============================================================================

/// One layout contract over a page's record set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewType {
    Table,
    List,
    Grid,
    Kanban,
    Calendar,
    Timeline,
    Gantt,
    Map,
}

impl ViewType {
    /// All view types in canonical order.
    pub const ALL: [ViewType; 8] = [
        ViewType::Table,
        ViewType::List,
        ViewType::Grid,
        ViewType::Kanban,
        ViewType::Calendar,
        ViewType::Timeline,
        ViewType::Gantt,
        ViewType::Map,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ViewType::Table => "table",
            ViewType::List => "list",
            ViewType::Grid => "grid",
            ViewType::Kanban => "kanban",
            ViewType::Calendar => "calendar",
            ViewType::Timeline => "timeline",
            ViewType::Gantt => "gantt",
            ViewType::Map => "map",
        }
    }
}

impl fmt::Display for ViewType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Per-view configuration
// =============================================================================

fn default_true() -> bool {
    true
}

/// A table column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnConfig {
    pub field: FieldPath,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<ColumnFormat>,
    #[serde(default)]
    pub sortable: bool,
    #[serde(default = "default_true")]
    pub visible: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableViewConfig {
    #[serde(default)]
    pub columns: Vec<ColumnConfig>,
}

impl TableViewConfig {
    /// Column declared for `field`, if any.
    pub fn column(&self, field: &str) -> Option<&ColumnConfig> {
        self.columns.iter().find(|c| c.field.as_str() == field)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListViewConfig {
    pub title_field: FieldPath,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtitle_field: Option<FieldPath>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub badge_field: Option<FieldPath>,
    #[serde(default)]
    pub meta_fields: Vec<FieldPath>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GridViewConfig {
    pub title_field: FieldPath,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtitle_field: Option<FieldPath>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_field: Option<FieldPath>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub badge_field: Option<FieldPath>,
    #[serde(default)]
    pub card_fields: Vec<FieldPath>,
    /// Cards per row. Layout hint only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub columns: Option<u8>,
}

/// One kanban lane, matched against the status field's stringified value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KanbanColumnConfig {
    pub id: String,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KanbanViewConfig {
    pub status_field: FieldPath,
    pub title_field: FieldPath,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtitle_field: Option<FieldPath>,
    #[serde(default)]
    pub card_fields: Vec<FieldPath>,
    pub columns: Vec<KanbanColumnConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarViewConfig {
    pub title_field: FieldPath,
    pub start_field: FieldPath,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_field: Option<FieldPath>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color_field: Option<FieldPath>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineViewConfig {
    pub title_field: FieldPath,
    pub start_field: FieldPath,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_field: Option<FieldPath>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_field: Option<FieldPath>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GanttViewConfig {
    pub title_field: FieldPath,
    pub start_field: FieldPath,
    pub end_field: FieldPath,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress_field: Option<FieldPath>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dependencies_field: Option<FieldPath>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapViewConfig {
    pub title_field: FieldPath,
    pub latitude_field: FieldPath,
    pub longitude_field: FieldPath,
    #[serde(default)]
    pub popup_fields: Vec<FieldPath>,
}

// =============================================================================
// ViewsConfig
// =============================================================================

/// One optional configuration per view type.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewsConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<TableViewConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub list: Option<ListViewConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grid: Option<GridViewConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kanban: Option<KanbanViewConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calendar: Option<CalendarViewConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeline: Option<TimelineViewConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gantt: Option<GanttViewConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub map: Option<MapViewConfig>,
}

impl ViewsConfig {
    /// Configuration for one view type.
    pub fn get(&self, view_type: ViewType) -> Option<ViewConfig<'_>> {
        match view_type {
            ViewType::Table => self.table.as_ref().map(ViewConfig::Table),
            ViewType::List => self.list.as_ref().map(ViewConfig::List),
            ViewType::Grid => self.grid.as_ref().map(ViewConfig::Grid),
            ViewType::Kanban => self.kanban.as_ref().map(ViewConfig::Kanban),
            ViewType::Calendar => self.calendar.as_ref().map(ViewConfig::Calendar),
            ViewType::Timeline => self.timeline.as_ref().map(ViewConfig::Timeline),
            ViewType::Gantt => self.gantt.as_ref().map(ViewConfig::Gantt),
            ViewType::Map => self.map.as_ref().map(ViewConfig::Map),
        }
    }

    /// All configured views in canonical order.
    pub fn configured(&self) -> impl Iterator<Item = ViewConfig<'_>> {
        ViewType::ALL.into_iter().filter_map(|t| self.get(t))
    }
}

/// Borrowed view configuration tagged by view type.
#[derive(Debug, Clone, Copy)]
pub enum ViewConfig<'a> {
    Table(&'a TableViewConfig),
    List(&'a ListViewConfig),
    Grid(&'a GridViewConfig),
    Kanban(&'a KanbanViewConfig),
    Calendar(&'a CalendarViewConfig),
    Timeline(&'a TimelineViewConfig),
    Gantt(&'a GanttViewConfig),
    Map(&'a MapViewConfig),
}

impl<'a> ViewConfig<'a> {
    pub fn view_type(&self) -> ViewType {
        match self {
            ViewConfig::Table(_) => ViewType::Table,
            ViewConfig::List(_) => ViewType::List,
            ViewConfig::Grid(_) => ViewType::Grid,
            ViewConfig::Kanban(_) => ViewType::Kanban,
            ViewConfig::Calendar(_) => ViewType::Calendar,
            ViewConfig::Timeline(_) => ViewType::Timeline,
            ViewConfig::Gantt(_) => ViewType::Gantt,
            ViewConfig::Map(_) => ViewType::Map,
        }
    }

    /// Every field this view reads, labelled by the slot that reads it.
    pub fn field_refs(&self) -> Vec<(&'static str, &'a FieldPath)> {
        let mut refs: Vec<(&'static str, &'a FieldPath)> = Vec::new();
        match *self {
            ViewConfig::Table(t) => {
                for column in &t.columns {
                    refs.push(("column", &column.field));
                    if let Some(format) = &column.format {
                        refs.extend(format.auxiliary_fields().into_iter().map(|f| ("format", f)));
                    }
                }
            }
            ViewConfig::List(l) => {
                refs.push(("titleField", &l.title_field));
                refs.extend(l.subtitle_field.iter().map(|f| ("subtitleField", f)));
                refs.extend(l.badge_field.iter().map(|f| ("badgeField", f)));
                refs.extend(l.meta_fields.iter().map(|f| ("metaFields", f)));
            }
            ViewConfig::Grid(g) => {
                refs.push(("titleField", &g.title_field));
                refs.extend(g.subtitle_field.iter().map(|f| ("subtitleField", f)));
                refs.extend(g.image_field.iter().map(|f| ("imageField", f)));
                refs.extend(g.badge_field.iter().map(|f| ("badgeField", f)));
                refs.extend(g.card_fields.iter().map(|f| ("cardFields", f)));
            }
            ViewConfig::Kanban(k) => {
                refs.push(("statusField", &k.status_field));
                refs.push(("titleField", &k.title_field));
                refs.extend(k.subtitle_field.iter().map(|f| ("subtitleField", f)));
                refs.extend(k.card_fields.iter().map(|f| ("cardFields", f)));
            }
            ViewConfig::Calendar(c) => {
                refs.push(("titleField", &c.title_field));
                refs.push(("startField", &c.start_field));
                refs.extend(c.end_field.iter().map(|f| ("endField", f)));
                refs.extend(c.color_field.iter().map(|f| ("colorField", f)));
            }
            ViewConfig::Timeline(t) => {
                refs.push(("titleField", &t.title_field));
                refs.push(("startField", &t.start_field));
                refs.extend(t.end_field.iter().map(|f| ("endField", f)));
                refs.extend(t.group_field.iter().map(|f| ("groupField", f)));
            }
            ViewConfig::Gantt(g) => {
                refs.push(("titleField", &g.title_field));
                refs.push(("startField", &g.start_field));
                refs.push(("endField", &g.end_field));
                refs.extend(g.progress_field.iter().map(|f| ("progressField", f)));
                refs.extend(g.dependencies_field.iter().map(|f| ("dependenciesField", f)));
            }
            ViewConfig::Map(m) => {
                refs.push(("titleField", &m.title_field));
                refs.push(("latitudeField", &m.latitude_field));
                refs.push(("longitudeField", &m.longitude_field));
                refs.extend(m.popup_fields.iter().map(|f| ("popupFields", f)));
            }
        }
        refs
    }
}
