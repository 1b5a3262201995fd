//! Error types for the page view engine.

use thiserror::Error;

use crate::page::ExportFormat;
use crate::views::ViewType;

/// Descriptor and engine configuration errors.
///
/// Raised at load time. A `ConfigError` always indicates a defect in a
/// descriptor or config file and is never silently recovered from.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A field reference could not be parsed.
    #[error("Invalid field path '{path}': {reason}")]
    InvalidFieldPath { path: String, reason: &'static str },

    /// A field reference is not part of the declared source fields.
    #[error("{location} references undeclared field '{field}'")]
    UndeclaredField { location: String, field: String },

    /// The toolbar lists a view type that has no configuration.
    #[error("View '{0}' is listed in viewTypes but has no configuration")]
    MissingViewConfig(ViewType),

    /// The default view is not among the declared view types.
    #[error("Default view '{0}' is not listed in viewTypes")]
    DefaultViewNotDeclared(ViewType),

    /// The toolbar declares no view types.
    #[error("Page declares no view types")]
    NoViewTypes,

    /// A default filter's value does not fit its operator.
    #[error("Default filter on '{field}': {reason}")]
    InvalidDefaultFilter { field: String, reason: &'static str },

    /// Two table columns share a field.
    #[error("Duplicate table column '{0}'")]
    DuplicateColumn(String),

    /// Two actions in the same scope share an id.
    #[error("Duplicate {scope} action '{id}'")]
    DuplicateAction { scope: &'static str, id: String },

    /// A kanban view declares no columns.
    #[error("Kanban view declares no columns")]
    EmptyKanbanColumns,

    /// A select filter declares no options.
    #[error("Filter '{0}' is enumerable but declares no options")]
    MissingFilterOptions(String),

    /// A page size option is zero.
    #[error("Invalid page size option: {0}")]
    InvalidPageSize(usize),

    /// No config directory found.
    #[error("Config directory not found")]
    NoConfigDir,

    /// IO error.
    #[error("IO error: {0}")]
    Io(String),

    /// Parse error.
    #[error("Parse error: {0}")]
    Parse(String),
}

/// Data source failures.
///
/// Recovered locally: the previous result stays visible and a retry is
/// offered.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum QueryError {
    /// The data source rejected the request.
    #[error("Data source error: {0}")]
    Source(String),

    /// A record returned by the source is malformed.
    #[error("Invalid record: {0}")]
    InvalidRecord(String),
}

/// Invalid interactive toolbar input.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ToolbarError {
    /// Filter on a field the toolbar does not declare.
    #[error("Field '{0}' is not filterable")]
    UnknownFilter(String),

    /// Value is not among the declared options.
    #[error("Value '{value}' is not a declared option for filter '{field}'")]
    InvalidFilterValue { field: String, value: String },

    /// Value shape does not fit the filter type.
    #[error("Filter '{field}' expects {expected}")]
    FilterShapeMismatch {
        field: String,
        expected: &'static str,
    },

    /// Column is not sortable.
    #[error("Field '{0}' is not sortable")]
    NotSortable(String),

    /// No table column for this field.
    #[error("Unknown column '{0}'")]
    UnknownColumn(String),

    /// View type is not available on this page.
    #[error("View '{0}' is not available on this page")]
    ViewNotAvailable(ViewType),

    /// Search is not enabled on this page.
    #[error("Search is not enabled on this page")]
    SearchDisabled,
}

/// Action invocation failures.
///
/// Selection is preserved whenever an action fails.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ActionError {
    /// No action with this id in the requested scope.
    #[error("Unknown action '{0}'")]
    UnknownAction(String),

    /// Row or bulk action invoked without targets.
    #[error("Action '{0}' requires at least one selected record")]
    EmptySelection(String),

    /// The session lacks the permission the action requires.
    #[error("Action not permitted")]
    NotPermitted,

    /// Confirm called with no action awaiting confirmation.
    #[error("No action is awaiting confirmation")]
    NothingPending,

    /// The external handler reported a failure.
    #[error("{0}")]
    Handler(String),
}

/// Export failures.
#[derive(Debug, Error)]
pub enum ExportError {
    /// Export is disabled for this page.
    #[error("Export is not enabled for this page")]
    Disabled,

    /// Format not listed in the toolbar's export formats.
    #[error("Export format '{0}' is not declared for this page")]
    UndeclaredFormat(ExportFormat),

    /// No renderer available for the format.
    #[error("No renderer available for export format '{0}'")]
    Unsupported(ExportFormat),

    /// The session lacks the export permission.
    #[error("Export not permitted")]
    NotPermitted,

    /// Rendering the payload failed.
    #[error("Export rendering failed: {0}")]
    Render(String),

    /// Fetching the unpaginated result failed.
    #[error(transparent)]
    Query(#[from] QueryError),
}

/// Any error a page session can surface.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Query(#[from] QueryError),

    #[error(transparent)]
    Toolbar(#[from] ToolbarError),

    #[error(transparent)]
    Action(#[from] ActionError),

    #[error(transparent)]
    Export(#[from] ExportError),
}
