//! Data Source Adapter.
//!
//! The engine never talks to a database or API directly. Everything it
//! fetches or mutates goes through a [`DataSource`], which receives the
//! canonical [`QueryDescriptor`] and returns plain records.

mod eval;
mod memory;

pub use eval::{apply_query, compare_records, matches_condition, matches_query};
pub use memory::{ActionHandler, MemorySource};

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use pageview_core::{ActionError, QueryDescriptor, QueryError, Record, RecordId};

// =============================================================================
// Results
// =============================================================================

/// One fetched page.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageResult {
    pub records: Vec<Record>,
    /// Matching records before pagination.
    pub total: usize,
    /// Aggregate payload for stat items with a `field` source.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<Map<String, Value>>,
}

impl PageResult {
    pub fn record(&self, id: &RecordId) -> Option<&Record> {
        self.records.iter().find(|r| r.id() == id)
    }
}

/// Acknowledgement of a completed action.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionReceipt {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default)]
    pub affected: usize,
}

// =============================================================================
// DataSource Trait
// =============================================================================

/// Boundary to the backing store.
///
/// Methods return `'static` futures so callers can spawn or race them
/// without borrowing the source.
#[cfg_attr(test, mockall::automock)]
pub trait DataSource: Send + Sync {
    /// Fetch one page of `entity` matching `query`.
    fn fetch_page(
        &self,
        entity: String,
        query: QueryDescriptor,
    ) -> BoxFuture<'static, Result<PageResult, QueryError>>;

    /// Run a named action against the given records.
    fn invoke_action(
        &self,
        entity: String,
        action_id: String,
        record_ids: Vec<RecordId>,
    ) -> BoxFuture<'static, Result<ActionReceipt, ActionError>>;
}
