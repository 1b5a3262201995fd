//! Data view engine for declarative page descriptors.
//!
//! This crate interprets a `PageConfig` against a data source:
//! - Query resolution from page config and toolbar state
//! - Cell formatting through a closed set of column formats
//! - View rendering for table, list, grid, kanban, calendar, timeline, gantt and map
//! - Stat cards, two-phase actions, permissions and export
//! - An async page session with debounced search and stale-result guarding

pub mod actions;
pub mod export;
pub mod format;
pub mod permissions;
pub mod render;
pub mod resolver;
pub mod session;
pub mod source;
pub mod stats;

// Re-export commonly used types
pub use actions::{
    ActionDispatcher, ActionOutcome, ActionScope, ActionTicket, ConfirmationPrompt, Confirmer,
    Invocation, PendingConfirmation,
};
pub use export::{ExportFile, ExportRenderer, ExportTable};
pub use format::{CellStyle, CustomRenderer, FormatRegistry, FormattedValue};
pub use permissions::{AllowAll, Controls, PermissionGate, StaticRoles};
pub use render::{RenderTree, Renderer};
pub use resolver::resolve;
pub use session::{ActionProgress, FetchOutcome, PageSession, SessionSnapshot};
pub use source::{ActionReceipt, DataSource, MemorySource, PageResult};
pub use stats::{compute_stats, StatValue, Trend};

// Re-export pageview_core for convenience
pub use pageview_core;
