//! Broadcast session state.

use serde::Serialize;

use pageview_core::{Record, RecordId, ToolbarState};

use crate::actions::ConfirmationPrompt;
use crate::permissions::Controls;
use crate::render::RenderTree;
use crate::stats::StatValue;

/// Everything a view layer needs to draw one page.
///
/// Sent on every session mutation. Holds the last applied result while a
/// fetch is in flight or after a failed fetch.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub session_id: String,
    pub page_id: String,
    pub toolbar: ToolbarState,
    pub controls: Controls,
    /// Records of the current page, in display order.
    pub records: Vec<Record>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub view: Option<RenderTree>,
    pub stats: Vec<StatValue>,
    pub total: usize,
    pub page_count: usize,
    pub loading: bool,
    /// Last fetch failure. Cleared by the next successful fetch.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Last action failure. Cleared by the next action.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confirmation: Option<ConfirmationPrompt>,
}

impl SessionSnapshot {
    /// Ids of the displayed records.
    pub fn record_ids(&self) -> Vec<RecordId> {
        self.records.iter().map(|r| r.id().clone()).collect()
    }

    /// True when a failed fetch can be retried.
    pub fn can_retry(&self) -> bool {
        self.error.is_some() && !self.loading
    }
}

/// What happened to a fetch a mutation asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum FetchOutcome {
    /// The result was applied.
    Applied,
    /// A newer request started first; the result was dropped.
    Superseded,
    /// The loaded records already cover the change.
    NotNeeded,
}

/// Progress of a session-level action request.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionProgress {
    /// The action ran.
    Finished(crate::actions::ActionOutcome),
    /// The action waits for [`super::PageSession::confirm_action`] or
    /// [`super::PageSession::decline_action`].
    AwaitingConfirmation(ConfirmationPrompt),
}
