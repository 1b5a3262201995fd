//! Core types for the page view engine.
//!
//! This crate contains the data model shared by every engine crate:
//! - Page descriptor schema (`PageConfig` and its sections)
//! - Records and validated field paths
//! - Toolbar state and the canonical query descriptor
//! - Column formats and view configurations
//! - Permissions, engine configuration and error types

mod config;
mod error;
mod format;
mod page;
mod permission;
mod query;
mod record;
mod toolbar;
mod validate;
pub mod value;
mod views;

pub use config::{
    config_dir, engine_config_path, EngineConfig, FormatDefaults, QueryDefaults,
    SessionDefaults,
};
pub use error::{ActionError, ConfigError, ExportError, QueryError, SessionError, ToolbarError};
pub use format::ColumnFormat;
pub use page::{
    ActionConfig, ActionVariant, ConfirmationConfig, DefaultFilter, ExportConfig, ExportFormat,
    FilterFieldConfig, FilterOperator, FilterOption, FilterType, FiltersConfig, PageConfig,
    PermissionsConfig, SearchConfig, SortConfig, SortDirection, SortOption, SortOptionsConfig,
    SourceConfig, StatAggregate, StatFormat, StatItemConfig, StatsConfig, ToolbarConfig,
    TrendConfig,
};
pub use permission::{PermissionKind, Permissions};
pub use query::{Comparison, Condition, Predicate, QueryDescriptor, SearchPredicate, SortKey};
pub use record::{FieldPath, Record, RecordId};
pub use toolbar::{FilterValue, SortState, ToolbarState};
pub use validate::{field_references, load_page, validate_page};
pub use views::{
    CalendarViewConfig, ColumnConfig, GanttViewConfig, GridViewConfig, KanbanColumnConfig,
    KanbanViewConfig, ListViewConfig, MapViewConfig, TableViewConfig, TimelineViewConfig,
    ViewConfig, ViewType, ViewsConfig,
};
