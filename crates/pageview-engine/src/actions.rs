//! Action Dispatcher.
//!
//! Actions run through a two-phase protocol. [`ActionDispatcher::request`]
//! checks the action exists, is permitted and has targets, then yields a
//! ticket: either a ready [`Invocation`] or a [`PendingConfirmation`] that
//! must be confirmed or declined. Only an invocation can reach the data
//! source, so an unconfirmed action can never run.

use std::sync::Arc;

use futures::future::BoxFuture;
use serde::Serialize;

use pageview_core::{ActionConfig, ActionError, PageConfig, Permissions, RecordId};

use crate::permissions::action_permission;
use crate::source::{ActionReceipt, DataSource};

// =============================================================================
// Types
// =============================================================================

/// Where an action is declared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionScope {
    /// The page's primary action. Takes no targets.
    Primary,
    /// A per-record action.
    Row,
    /// A toolbar action over the selection.
    Bulk,
}

/// An action bound to its targets, ready to run.
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    action: ActionConfig,
    scope: ActionScope,
    targets: Vec<RecordId>,
}

impl Invocation {
    pub fn action(&self) -> &ActionConfig {
        &self.action
    }

    pub fn scope(&self) -> ActionScope {
        self.scope
    }

    pub fn targets(&self) -> &[RecordId] {
        &self.targets
    }
}

/// Dialog content for a pending confirmation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmationPrompt {
    pub title: String,
    pub message: String,
    pub confirm_label: String,
    pub cancel_label: String,
    /// Render the confirm button with destructive emphasis.
    pub destructive: bool,
}

/// An invocation held back until the user answers.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingConfirmation {
    invocation: Invocation,
    prompt: ConfirmationPrompt,
}

impl PendingConfirmation {
    pub fn prompt(&self) -> &ConfirmationPrompt {
        &self.prompt
    }

    pub fn action_id(&self) -> &str {
        &self.invocation.action.id
    }

    /// Release the invocation.
    pub fn confirm(self) -> Invocation {
        self.invocation
    }

    /// Drop the invocation. Nothing is sent to the data source.
    pub fn decline(self) -> ActionOutcome {
        tracing::debug!(action = %self.invocation.action.id, "action declined");
        ActionOutcome::Declined
    }
}

/// Result of phase one.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionTicket {
    Ready(Invocation),
    AwaitingConfirmation(PendingConfirmation),
}

/// Final result of an action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum ActionOutcome {
    Completed { receipt: ActionReceipt },
    Declined,
}

impl ActionOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, ActionOutcome::Completed { .. })
    }
}

/// Answers confirmation prompts for the one-shot [`ActionDispatcher::invoke`].
#[cfg_attr(test, mockall::automock)]
pub trait Confirmer: Send + Sync {
    fn confirm(&self, prompt: &ConfirmationPrompt) -> BoxFuture<'static, bool>;
}

// =============================================================================
// ActionDispatcher
// =============================================================================

/// Resolves and runs the actions of one page.
pub struct ActionDispatcher {
    page: Arc<PageConfig>,
    permissions: Permissions,
    source: Arc<dyn DataSource>,
}

impl ActionDispatcher {
    pub fn new(page: Arc<PageConfig>, permissions: Permissions, source: Arc<dyn DataSource>) -> Self {
        Self {
            page,
            permissions,
            source,
        }
    }

    /// Look up an action by scope and id.
    pub fn find(&self, scope: ActionScope, action_id: &str) -> Option<&ActionConfig> {
        match scope {
            ActionScope::Primary => self
                .page
                .primary_action
                .as_ref()
                .filter(|a| a.id == action_id),
            ActionScope::Row => self.page.row_action(action_id),
            ActionScope::Bulk => self.page.bulk_action(action_id),
        }
    }

    /// Phase one: validate and bind an action to its targets.
    pub fn request(
        &self,
        scope: ActionScope,
        action_id: &str,
        targets: Vec<RecordId>,
    ) -> Result<ActionTicket, ActionError> {
        let action = self
            .find(scope, action_id)
            .ok_or_else(|| ActionError::UnknownAction(action_id.to_string()))?;

        let required = action_permission(action, scope);
        if !self.permissions.allows(required) {
            tracing::warn!(action = action_id, permission = %required, "action not permitted");
            return Err(ActionError::NotPermitted);
        }

        if scope != ActionScope::Primary && targets.is_empty() {
            return Err(ActionError::EmptySelection(action_id.to_string()));
        }

        let invocation = Invocation {
            action: action.clone(),
            scope,
            targets,
        };

        Ok(match &action.confirmation {
            Some(confirmation) => ActionTicket::AwaitingConfirmation(PendingConfirmation {
                prompt: ConfirmationPrompt {
                    title: confirmation.title.clone(),
                    message: confirmation.message.clone(),
                    confirm_label: confirmation
                        .confirm_label
                        .clone()
                        .unwrap_or_else(|| action.label.clone()),
                    cancel_label: confirmation
                        .cancel_label
                        .clone()
                        .unwrap_or_else(|| "Cancel".to_string()),
                    destructive: action.is_destructive(),
                },
                invocation,
            }),
            None => ActionTicket::Ready(invocation),
        })
    }

    /// Phase two: run a released invocation against the data source.
    pub async fn execute(&self, invocation: Invocation) -> Result<ActionOutcome, ActionError> {
        let action_id = invocation.action.id.clone();
        let targets = invocation.targets.len();

        let result = self
            .source
            .invoke_action(
                self.page.source.entity.clone(),
                action_id.clone(),
                invocation.targets,
            )
            .await;

        match result {
            Ok(receipt) => {
                tracing::info!(action = %action_id, targets, "action completed");
                Ok(ActionOutcome::Completed { receipt })
            }
            Err(e) => {
                tracing::warn!(action = %action_id, targets, "action failed: {}", e);
                Err(e)
            }
        }
    }

    /// Request, confirm through `confirmer` when needed, then execute.
    pub async fn invoke(
        &self,
        scope: ActionScope,
        action_id: &str,
        targets: Vec<RecordId>,
        confirmer: &dyn Confirmer,
    ) -> Result<ActionOutcome, ActionError> {
        let invocation = match self.request(scope, action_id, targets)? {
            ActionTicket::Ready(invocation) => invocation,
            ActionTicket::AwaitingConfirmation(pending) => {
                if confirmer.confirm(pending.prompt()).await {
                    pending.confirm()
                } else {
                    return Ok(pending.decline());
                }
            }
        };
        self.execute(invocation).await
    }
}

// =============================================================================
// Tests
// =============================================================================
