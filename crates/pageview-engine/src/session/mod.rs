//! Page session.
//!
//! A [`PageSession`] owns the toolbar state of one page and drives fetches
//! against a [`DataSource`]. Mutation = notification: every method that
//! changes session state also broadcasts a new [`SessionSnapshot`].
//!
//! ## Concurrency
//!
//! Each fetch takes a number from a monotonically increasing request
//! sequence. A result that arrives after a newer request started is dropped.
//! Search text is debounced before it fetches. State sits behind a
//! `parking_lot::Mutex` that is never held across an await point.

mod snapshot;

pub use snapshot::{ActionProgress, FetchOutcome, SessionSnapshot};

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;
use uuid::Uuid;

use pageview_core::{
    validate_page, ActionError, EngineConfig, ExportError, ExportFormat, FieldPath, FilterValue,
    PageConfig, Permissions, QueryDefaults, QueryDescriptor, QueryError, RecordId, SessionError,
    SortState, ToolbarError, ToolbarState, ViewType,
};

use crate::actions::{
    ActionDispatcher, ActionOutcome, ActionScope, ActionTicket, Confirmer, Invocation,
    PendingConfirmation,
};
use crate::export::{
    check_export, encode, export_columns, export_filename, export_table, ExportFile,
    ExportRenderer,
};
use crate::format::FormatRegistry;
use crate::permissions::{resolve_permissions, Controls, PermissionGate};
use crate::render::{toggle_sort, Renderer};
use crate::resolver::{
    active_view, effective_page_size, format_fields, required_fields, resolve,
};
use crate::source::{DataSource, PageResult};
use crate::stats::compute_stats;

// =============================================================================
// State
// =============================================================================

struct SessionState {
    page: Arc<PageConfig>,
    permissions: Permissions,
    controls: Controls,
    toolbar: ToolbarState,
    /// Last applied result.
    result: PageResult,
    /// Request that produced `result`.
    applied: Option<QueryDescriptor>,
    /// Request of the newest fetch still awaiting its result.
    in_flight: Option<QueryDescriptor>,
    loading: bool,
    error: Option<QueryError>,
    action_error: Option<ActionError>,
    pending: Option<PendingConfirmation>,
}

impl SessionState {
    fn new(page: Arc<PageConfig>, gate: &dyn PermissionGate, defaults: &QueryDefaults) -> Self {
        let permissions = resolve_permissions(page.permissions.as_ref(), gate);
        let controls = Controls::for_page(&page, permissions);
        let toolbar = ToolbarState::for_page(&page, defaults);
        Self {
            page,
            permissions,
            controls,
            toolbar,
            result: PageResult::default(),
            applied: None,
            in_flight: None,
            loading: false,
            error: None,
            action_error: None,
            pending: None,
        }
    }
}

/// A fetch that has taken its sequence number.
struct PendingFetch {
    seq: u64,
    entity: String,
    request: QueryDescriptor,
}

// =============================================================================
// PageSession
// =============================================================================

/// Interactive session over one page descriptor.
pub struct PageSession {
    id: Uuid,
    config: EngineConfig,
    registry: FormatRegistry,
    source: Arc<dyn DataSource>,
    gate: Arc<dyn PermissionGate>,
    export_renderer: Option<Arc<dyn ExportRenderer>>,
    state: Mutex<SessionState>,
    sequence: AtomicU64,
    search_generation: AtomicU64,
    tx: watch::Sender<SessionSnapshot>,
}

impl PageSession {
    /// Create a session. Nothing is fetched until the first mutation or
    /// [`PageSession::refresh`].
    pub fn new(
        page: PageConfig,
        source: Arc<dyn DataSource>,
        gate: Arc<dyn PermissionGate>,
        config: EngineConfig,
    ) -> Result<Self, SessionError> {
        validate_page(&page)?;

        let id = Uuid::new_v4();
        let registry = FormatRegistry::new(config.format.clone());
        let state = SessionState::new(Arc::new(page), gate.as_ref(), &config.query);
        let (tx, _rx) = watch::channel(build_snapshot(&id, &registry, &config.query, &state));

        tracing::info!(session = %id, page = %state.page.id, "page session created");

        Ok(Self {
            id,
            config,
            registry,
            source,
            gate,
            export_renderer: None,
            state: Mutex::new(state),
            sequence: AtomicU64::new(0),
            search_generation: AtomicU64::new(0),
            tx,
        })
    }

    /// Use a registry with a custom cell renderer.
    pub fn with_registry(mut self, registry: FormatRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Renderer for export formats the engine does not encode itself.
    pub fn with_export_renderer(mut self, renderer: Arc<dyn ExportRenderer>) -> Self {
        self.export_renderer = Some(renderer);
        self
    }

    // =========================================================================
    // Observation
    // =========================================================================

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Subscribe to state snapshots.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.tx.subscribe()
    }

    /// Latest broadcast snapshot.
    pub fn snapshot(&self) -> SessionSnapshot {
        self.tx.borrow().clone()
    }

    pub fn page(&self) -> Arc<PageConfig> {
        self.state.lock().page.clone()
    }

    pub fn toolbar(&self) -> ToolbarState {
        self.state.lock().toolbar.clone()
    }

    pub fn permissions(&self) -> Permissions {
        self.state.lock().permissions
    }

    pub fn controls(&self) -> Controls {
        self.state.lock().controls.clone()
    }

    /// The query the current toolbar state resolves to.
    pub fn query(&self) -> Result<QueryDescriptor, ToolbarError> {
        let state = self.state.lock();
        resolve(&state.page, &state.toolbar, &self.config.query)
    }

    // =========================================================================
    // Fetching
    // =========================================================================

    /// Fetch the current query.
    pub async fn refresh(&self) -> Result<FetchOutcome, SessionError> {
        self.update(|_, _| Ok(())).await
    }

    /// Fetch again after a failure.
    pub async fn retry(&self) -> Result<FetchOutcome, SessionError> {
        tracing::info!(session = %self.id, "retrying fetch");
        self.refresh().await
    }

    /// Apply a toolbar change and fetch. The change is committed only if
    /// the resulting state resolves.
    async fn update<F>(&self, mutate: F) -> Result<FetchOutcome, SessionError>
    where
        F: FnOnce(&mut ToolbarState, &SessionState) -> Result<(), ToolbarError>,
    {
        let fetch = {
            let mut guard = self.state.lock();
            let state = &mut *guard;
            let mut toolbar = state.toolbar.clone();
            mutate(&mut toolbar, state)?;
            self.begin_fetch(state, toolbar)?
        };
        self.complete_fetch(fetch).await
    }

    fn begin_fetch(
        &self,
        state: &mut SessionState,
        toolbar: ToolbarState,
    ) -> Result<PendingFetch, ToolbarError> {
        let query = resolve(&state.page, &toolbar, &self.config.query)?;
        let request = with_stat_fields(&state.page, &query);

        state.toolbar = toolbar;
        state.loading = true;
        state.in_flight = Some(request.clone());
        let seq = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        self.publish(state);

        Ok(PendingFetch {
            seq,
            entity: state.page.source.entity.clone(),
            request,
        })
    }

    async fn complete_fetch(&self, fetch: PendingFetch) -> Result<FetchOutcome, SessionError> {
        tracing::debug!(
            seq = fetch.seq,
            entity = %fetch.entity,
            offset = fetch.request.offset,
            "fetching page"
        );
        let result = self
            .source
            .fetch_page(fetch.entity, fetch.request.clone())
            .await;

        let mut state = self.state.lock();
        if self.sequence.load(Ordering::SeqCst) != fetch.seq {
            tracing::debug!(seq = fetch.seq, "discarding stale result");
            return Ok(FetchOutcome::Superseded);
        }

        state.loading = false;
        state.in_flight = None;
        match result {
            Ok(result) => {
                tracing::debug!(seq = fetch.seq, total = result.total, "page applied");
                state.result = result;
                state.applied = Some(fetch.request);
                state.error = None;
                self.publish(&state);
                Ok(FetchOutcome::Applied)
            }
            Err(e) => {
                tracing::warn!(seq = fetch.seq, "fetch failed: {}", e);
                state.error = Some(e.clone());
                self.publish(&state);
                Err(e.into())
            }
        }
    }

    // =========================================================================
    // Toolbar
    // =========================================================================

    /// Set the search text. Fetches once the text has been stable for the
    /// configured debounce interval.
    pub async fn set_search(&self, text: impl Into<String>) -> Result<FetchOutcome, SessionError> {
        let text = text.into();
        let generation = {
            let mut state = self.state.lock();
            if !text.trim().is_empty() && !state.controls.search {
                return Err(ToolbarError::SearchDisabled.into());
            }
            state.toolbar.search = text;
            state.toolbar.page_index = 0;
            self.publish(&state);
            self.search_generation.fetch_add(1, Ordering::SeqCst) + 1
        };

        let debounce = self.config.session.search_debounce();
        if !debounce.is_zero() {
            tokio::time::sleep(debounce).await;
        }
        if self.search_generation.load(Ordering::SeqCst) != generation {
            tracing::debug!(generation, "search superseded during debounce");
            return Ok(FetchOutcome::Superseded);
        }
        self.refresh().await
    }

    /// Set one filter. Returns to the first page.
    pub async fn set_filter(
        &self,
        field: &str,
        value: FilterValue,
    ) -> Result<FetchOutcome, SessionError> {
        let field = field.to_string();
        self.update(move |toolbar, state| {
            if !state.controls.filters {
                return Err(ToolbarError::UnknownFilter(field));
            }
            toolbar.filters.insert(field, value);
            toolbar.page_index = 0;
            Ok(())
        })
        .await
    }

    pub async fn clear_filter(&self, field: &str) -> Result<FetchOutcome, SessionError> {
        self.update(|toolbar, _| {
            toolbar.filters.remove(field);
            toolbar.page_index = 0;
            Ok(())
        })
        .await
    }

    pub async fn clear_filters(&self) -> Result<FetchOutcome, SessionError> {
        self.update(|toolbar, _| {
            toolbar.filters.clear();
            toolbar.page_index = 0;
            Ok(())
        })
        .await
    }

    /// Column header click: ascending, descending, then back to the
    /// descriptor's default sort.
    pub async fn toggle_sort(&self, field: &FieldPath) -> Result<FetchOutcome, SessionError> {
        self.update(|toolbar, _| {
            toolbar.sort = toggle_sort(toolbar.sort.as_ref(), field);
            toolbar.page_index = 0;
            Ok(())
        })
        .await
    }

    pub async fn set_sort(&self, sort: Option<SortState>) -> Result<FetchOutcome, SessionError> {
        self.update(move |toolbar, _| {
            toolbar.sort = sort;
            toolbar.page_index = 0;
            Ok(())
        })
        .await
    }

    /// Go to a zero-based page. Clamped to the last page of the current
    /// result.
    pub async fn set_page(&self, page_index: usize) -> Result<FetchOutcome, SessionError> {
        let defaults = &self.config.query;
        self.update(move |toolbar, state| {
            toolbar.page_index = match state.applied {
                Some(_) => {
                    let size = effective_page_size(toolbar.page_size, &state.page, defaults);
                    let last = page_count(state.result.total, size).saturating_sub(1);
                    page_index.min(last)
                }
                None => page_index,
            };
            Ok(())
        })
        .await
    }

    pub async fn next_page(&self) -> Result<FetchOutcome, SessionError> {
        let next = self.state.lock().toolbar.page_index + 1;
        self.set_page(next).await
    }

    pub async fn previous_page(&self) -> Result<FetchOutcome, SessionError> {
        let previous = self.state.lock().toolbar.page_index.saturating_sub(1);
        self.set_page(previous).await
    }

    /// Change the page size. Returns to the first page.
    pub async fn set_page_size(&self, page_size: usize) -> Result<FetchOutcome, SessionError> {
        let defaults = &self.config.query;
        self.update(move |toolbar, state| {
            toolbar.page_size = effective_page_size(page_size, &state.page, defaults);
            toolbar.page_index = 0;
            Ok(())
        })
        .await
    }

    /// Switch the active view. Re-renders the loaded records when they
    /// already carry every field the view reads, and fetches otherwise.
    /// A fetch still in flight must carry those fields too, since its
    /// result replaces the loaded records.
    pub async fn switch_view(&self, view_type: ViewType) -> Result<FetchOutcome, SessionError> {
        let fetch = {
            let mut guard = self.state.lock();
            let state = &mut *guard;
            let needed = required_fields(&state.page, active_view(&state.page, view_type)?);
            let projects_all = |q: &QueryDescriptor| needed.iter().all(|f| q.projects(f));
            let covered = state.applied.as_ref().is_some_and(projects_all)
                && state.in_flight.as_ref().map_or(true, projects_all);

            let mut toolbar = state.toolbar.clone();
            toolbar.active_view = view_type;
            if covered {
                tracing::debug!(view = %view_type, "switching view over loaded records");
                state.toolbar = toolbar;
                self.publish(state);
                return Ok(FetchOutcome::NotNeeded);
            }
            self.begin_fetch(state, toolbar)?
        };
        self.complete_fetch(fetch).await
    }

    /// Reveal a table column hidden by default.
    pub fn show_column(&self, field: &str) -> Result<(), ToolbarError> {
        let mut state = self.state.lock();
        let visible = table_column_visible(&state.page, field)?;
        if !visible {
            state.toolbar.shown_columns.insert(field.to_string());
            self.publish(&state);
        }
        Ok(())
    }

    /// Hide a previously revealed column.
    pub fn hide_column(&self, field: &str) -> Result<(), ToolbarError> {
        let mut state = self.state.lock();
        table_column_visible(&state.page, field)?;
        if state.toolbar.shown_columns.remove(field) {
            self.publish(&state);
        }
        Ok(())
    }

    // =========================================================================
    // Selection
    // =========================================================================

    /// Toggle one record. Returns the new membership.
    pub fn toggle_selection(&self, id: RecordId) -> bool {
        let mut state = self.state.lock();
        let selected = state.toolbar.toggle_selected(id);
        self.publish(&state);
        selected
    }

    /// Select every record on the current page.
    pub fn select_page(&self) {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        state
            .toolbar
            .selected
            .extend(state.result.records.iter().map(|r| r.id().clone()));
        self.publish(state);
    }

    pub fn clear_selection(&self) {
        let mut state = self.state.lock();
        if !state.toolbar.selected.is_empty() {
            state.toolbar.selected.clear();
            self.publish(&state);
        }
    }

    pub fn selection(&self) -> Vec<RecordId> {
        self.state.lock().toolbar.selected_ids()
    }

    // =========================================================================
    // Actions
    // =========================================================================

    /// Request an action.
    ///
    /// Primary actions take no targets, row actions target `record`, and
    /// bulk actions target the whole selection. Actions with a confirmation
    /// wait for [`PageSession::confirm_action`] or
    /// [`PageSession::decline_action`]; the rest run immediately.
    pub async fn request_action(
        &self,
        scope: ActionScope,
        action_id: &str,
        record: Option<RecordId>,
    ) -> Result<ActionProgress, SessionError> {
        let invocation = {
            let mut guard = self.state.lock();
            let state = &mut *guard;
            let targets = match scope {
                ActionScope::Primary => Vec::new(),
                ActionScope::Row => record.into_iter().collect(),
                ActionScope::Bulk => state.toolbar.selected_ids(),
            };

            state.action_error = None;
            match self.dispatcher(state).request(scope, action_id, targets) {
                Ok(ActionTicket::Ready(invocation)) => invocation,
                Ok(ActionTicket::AwaitingConfirmation(pending)) => {
                    let prompt = pending.prompt().clone();
                    state.pending = Some(pending);
                    self.publish(state);
                    return Ok(ActionProgress::AwaitingConfirmation(prompt));
                }
                Err(e) => {
                    state.action_error = Some(e.clone());
                    self.publish(state);
                    return Err(e.into());
                }
            }
        };

        self.run_action(invocation)
            .await
            .map(ActionProgress::Finished)
    }

    /// Run the action awaiting confirmation.
    pub async fn confirm_action(&self) -> Result<ActionOutcome, SessionError> {
        let pending = {
            let mut state = self.state.lock();
            let pending = state.pending.take();
            self.publish(&state);
            pending
        };
        let pending = pending.ok_or(ActionError::NothingPending)?;
        self.run_action(pending.confirm()).await
    }

    /// Drop the action awaiting confirmation. Selection is left as is.
    pub fn decline_action(&self) -> ActionOutcome {
        let mut state = self.state.lock();
        let outcome = match state.pending.take() {
            Some(pending) => pending.decline(),
            None => ActionOutcome::Declined,
        };
        self.publish(&state);
        outcome
    }

    /// Request an action and answer its confirmation through `confirmer`.
    pub async fn invoke(
        &self,
        scope: ActionScope,
        action_id: &str,
        record: Option<RecordId>,
        confirmer: &dyn Confirmer,
    ) -> Result<ActionOutcome, SessionError> {
        match self.request_action(scope, action_id, record).await? {
            ActionProgress::Finished(outcome) => Ok(outcome),
            ActionProgress::AwaitingConfirmation(prompt) => {
                if confirmer.confirm(&prompt).await {
                    self.confirm_action().await
                } else {
                    Ok(self.decline_action())
                }
            }
        }
    }

    /// Execute, then re-fetch once the outcome is known. Targets leave the
    /// selection only on success.
    async fn run_action(&self, invocation: Invocation) -> Result<ActionOutcome, SessionError> {
        let targets = invocation.targets().to_vec();
        let dispatcher = {
            let state = self.state.lock();
            self.dispatcher(&state)
        };

        let outcome = match dispatcher.execute(invocation).await {
            Ok(outcome) => outcome,
            Err(e) => {
                let mut state = self.state.lock();
                state.action_error = Some(e.clone());
                self.publish(&state);
                return Err(e.into());
            }
        };

        let fetch = {
            let mut guard = self.state.lock();
            let state = &mut *guard;
            for id in &targets {
                state.toolbar.selected.remove(id);
            }
            let toolbar = state.toolbar.clone();
            self.begin_fetch(state, toolbar)
        };
        match fetch {
            Ok(fetch) => {
                if let Err(e) = self.complete_fetch(fetch).await {
                    tracing::debug!("re-fetch after action failed: {}", e);
                }
            }
            Err(e) => tracing::warn!("cannot re-fetch after action: {}", e),
        }

        Ok(outcome)
    }

    fn dispatcher(&self, state: &SessionState) -> ActionDispatcher {
        ActionDispatcher::new(state.page.clone(), state.permissions, self.source.clone())
    }

    // =========================================================================
    // Export
    // =========================================================================

    /// Export the full, unpaginated result of the current query.
    pub async fn export(&self, format: ExportFormat) -> Result<ExportFile, SessionError> {
        let (page, columns, request) = {
            let state = self.state.lock();
            check_export(&state.page, state.permissions, format)?;
            let query = resolve(&state.page, &state.toolbar, &self.config.query)?;
            let columns = export_columns(&state.page, &state.toolbar);
            let request = if query.fields.is_empty() {
                query.unpaginated()
            } else {
                let siblings = format_fields(&state.page, columns.iter().map(|c| &c.field));
                query
                    .unpaginated()
                    .with_fields(columns.iter().map(|c| c.field.clone()).chain(siblings))
            };
            (state.page.clone(), columns, request)
        };

        tracing::info!(session = %self.id, format = %format, "exporting");
        let result = self
            .source
            .fetch_page(page.source.entity.clone(), request)
            .await
            .map_err(ExportError::from)?;

        let table = export_table(&page, columns, &result.records, &self.registry);
        let bytes = encode(format, &table, self.export_renderer.as_deref())?;

        Ok(ExportFile {
            filename: export_filename(&page, format),
            format,
            content_type: format.content_type(),
            bytes,
        })
    }

    // =========================================================================
    // Page replacement
    // =========================================================================

    /// Swap in another page descriptor. Toolbar state, selection and any
    /// pending confirmation are reset, and in-flight requests are dropped.
    pub async fn replace_page(&self, page: PageConfig) -> Result<FetchOutcome, SessionError> {
        validate_page(&page)?;
        let fetch = {
            let mut guard = self.state.lock();
            tracing::info!(session = %self.id, from = %guard.page.id, to = %page.id, "replacing page");
            *guard = SessionState::new(Arc::new(page), self.gate.as_ref(), &self.config.query);
            self.search_generation.fetch_add(1, Ordering::SeqCst);
            let toolbar = guard.toolbar.clone();
            self.begin_fetch(&mut guard, toolbar)?
        };
        self.complete_fetch(fetch).await
    }

    fn publish(&self, state: &SessionState) {
        self.tx
            .send_replace(build_snapshot(&self.id, &self.registry, &self.config.query, state));
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn build_snapshot(
    id: &Uuid,
    registry: &FormatRegistry,
    defaults: &QueryDefaults,
    state: &SessionState,
) -> SessionSnapshot {
    let page = &state.page;
    let view = match Renderer::new(page, registry).render(&state.toolbar, &state.result.records) {
        Ok(tree) => Some(tree),
        Err(e) => {
            tracing::debug!("nothing to render: {}", e);
            None
        }
    };
    let stats = page
        .stats
        .as_ref()
        .map(|s| compute_stats(s, &state.result, registry))
        .unwrap_or_default();
    let page_size = effective_page_size(state.toolbar.page_size, page, defaults);

    SessionSnapshot {
        session_id: id.to_string(),
        page_id: page.id.clone(),
        toolbar: state.toolbar.clone(),
        controls: state.controls.clone(),
        records: state.result.records.clone(),
        view,
        stats,
        total: state.result.total,
        page_count: page_count(state.result.total, page_size),
        loading: state.loading,
        error: state.error.as_ref().map(ToString::to_string),
        action_error: state.action_error.as_ref().map(ToString::to_string),
        confirmation: state.pending.as_ref().map(|p| p.prompt().clone()),
    }
}

fn page_count(total: usize, page_size: usize) -> usize {
    total.div_ceil(page_size.max(1))
}

/// Add aggregate stat fields to a projected request.
fn with_stat_fields(page: &PageConfig, query: &QueryDescriptor) -> QueryDescriptor {
    if query.fields.is_empty() {
        return query.clone();
    }
    let extra = page
        .stats
        .iter()
        .flat_map(|s| &s.items)
        .filter_map(|item| item.aggregate_field.clone());
    query.with_fields(extra)
}

fn table_column_visible(page: &PageConfig, field: &str) -> Result<bool, ToolbarError> {
    page.views
        .table
        .as_ref()
        .and_then(|t| t.column(field))
        .map(|c| c.visible)
        .ok_or_else(|| ToolbarError::UnknownColumn(field.to_string()))
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;
    use std::time::Duration;

    use super::*;
    use crate::actions::MockConfirmer;
    use crate::permissions::{AllowAll, StaticRoles};
    use crate::render::RenderTree;
    use crate::source::MemorySource;
    use pageview_core::{load_page, Record};
    use serde_json::{json, Value};

    fn contacts_page() -> PageConfig {
        load_page(
            &json!({
                "id": "contacts",
                "title": "Contacts",
                "source": {"entity": "contact"},
                "stats": {"items": [{"id": "total", "label": "Total", "field": "total"}]},
                "toolbar": {
                    "search": {"fields": ["name", "company"]},
                    "filters": {"fields": [{
                        "field": "status", "label": "Status", "type": "select",
                        "options": [
                            {"value": "active", "label": "Active"},
                            {"value": "inactive", "label": "Inactive"}
                        ]
                    }]},
                    "export": {"enabled": true, "formats": ["csv"]},
                    "bulkActions": [
                        {"id": "delete", "label": "Delete", "variant": "destructive",
                         "confirmation": {"title": "Delete contacts?", "message": "This cannot be undone."}},
                        {"id": "archive", "label": "Archive"}
                    ],
                    "viewTypes": ["table", "list", "map"],
                    "pageSizeOptions": [10, 25]
                },
                "views": {
                    "table": {"columns": [
                        {"field": "name", "label": "Name", "sortable": true},
                        {"field": "company", "label": "Company"},
                        {"field": "status", "label": "Status"},
                        {"field": "email", "label": "Email", "visible": false}
                    ]},
                    "list": {"titleField": "name", "subtitleField": "company"},
                    "map": {"titleField": "name", "latitudeField": "lat", "longitudeField": "lng"}
                },
                "permissions": {"delete": ["admin"], "export": ["admin"]}
            })
            .to_string(),
        )
        .unwrap()
    }

    /// 23 contacts. Names are a permutation of `Contact 01..23` so insertion
    /// order differs from name order.
    fn contacts() -> Vec<Record> {
        (0..23)
            .map(|i| {
                let company = match i % 3 {
                    0 => "Acme Corp",
                    1 => "Initech",
                    _ => "Globex",
                };
                Record::from_value(json!({
                    "id": format!("c{i}"),
                    "name": format!("Contact {:02}", (i * 7) % 23 + 1),
                    "company": company,
                    "status": if i % 2 == 0 { "active" } else { "inactive" },
                    "email": format!("c{i}@example.com"),
                    "lat": 50.0,
                    "lng": 4.0
                }))
                .unwrap()
            })
            .collect()
    }

    fn session_with(gate: Arc<dyn PermissionGate>) -> (PageSession, MemorySource) {
        let source = MemorySource::new()
            .with_records("contact", contacts())
            .with_action(
                "archive",
                Arc::new(|_: &mut Vec<Record>, _: &[RecordId]| -> Result<Option<String>, String> {
                    Err("Archive service unavailable".to_string())
                }),
            );
        let session = PageSession::new(
            contacts_page(),
            Arc::new(source.clone()),
            gate,
            EngineConfig::default(),
        )
        .unwrap();
        (session, source)
    }

    fn session() -> (PageSession, MemorySource) {
        session_with(Arc::new(AllowAll))
    }

    fn id(raw: &str) -> RecordId {
        RecordId(raw.to_string())
    }

    fn names(snapshot: &SessionSnapshot) -> Vec<String> {
        let name = FieldPath::parse("name").unwrap();
        snapshot
            .records
            .iter()
            .filter_map(|r| r.get(&name).and_then(Value::as_str).map(str::to_string))
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_paging_through_sorted_result() {
        let (session, _) = session();
        let name = FieldPath::parse("name").unwrap();
        assert_eq!(session.toggle_sort(&name).await.unwrap(), FetchOutcome::Applied);

        let first = session.snapshot();
        assert_eq!(first.total, 23);
        assert_eq!(first.page_count, 3);
        let expected: Vec<String> = (1..=10).map(|n| format!("Contact {n:02}")).collect();
        assert_eq!(names(&first), expected);
        assert_eq!(first.stats[0].value, Some(23.0));

        session.set_page(2).await.unwrap();
        let last = session.snapshot();
        assert_eq!(names(&last), ["Contact 21", "Contact 22", "Contact 23"]);

        // Past the end clamps to the last page
        session.set_page(9).await.unwrap();
        assert_eq!(session.toolbar().page_index, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_filter_and_search_intersect() {
        let (session, _) = session();
        session
            .set_filter("status", FilterValue::Single("active".to_string()))
            .await
            .unwrap();
        session.set_search("ACME").await.unwrap();

        let snapshot = session.snapshot();
        let got: BTreeSet<RecordId> = snapshot.record_ids().into_iter().collect();
        let expected: BTreeSet<RecordId> = ["c0", "c6", "c12", "c18"].into_iter().map(id).collect();
        assert_eq!(got, expected);
        assert_eq!(snapshot.total, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_search_is_debounced() {
        let (session, source) = session();
        let session = Arc::new(session);
        session.refresh().await.unwrap();
        let before = source.fetch_count();

        let typing = session.clone();
        let first = tokio::spawn(async move { typing.set_search("ac").await });
        tokio::time::sleep(Duration::from_millis(100)).await;
        let second = session.set_search("acme").await.unwrap();

        assert_eq!(first.await.unwrap().unwrap(), FetchOutcome::Superseded);
        assert_eq!(second, FetchOutcome::Applied);
        assert_eq!(source.fetch_count(), before + 1);
        let last = source.fetched().pop().unwrap();
        assert_eq!(last.search.unwrap().text, "acme");
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_result_is_discarded() {
        let (session, source) = session();
        let session = Arc::new(session);

        source.push_delay(Duration::from_millis(500));
        let slow = session.clone();
        let slow = tokio::spawn(async move { slow.refresh().await });
        tokio::time::sleep(Duration::from_millis(10)).await;

        let fast = session
            .set_filter("status", FilterValue::Single("inactive".to_string()))
            .await
            .unwrap();
        assert_eq!(fast, FetchOutcome::Applied);
        assert_eq!(slow.await.unwrap().unwrap(), FetchOutcome::Superseded);

        let snapshot = session.snapshot();
        assert_eq!(snapshot.total, 11);
        assert!(!snapshot.loading);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_fetch_keeps_previous_result() {
        let (session, source) = session();
        session.refresh().await.unwrap();
        let before = session.snapshot().records;

        source.fail_next_fetch(QueryError::Source("timeout".to_string()));
        let err = session.set_page(1).await.unwrap_err();
        assert!(matches!(err, SessionError::Query(QueryError::Source(_))));

        let snapshot = session.snapshot();
        assert_eq!(snapshot.records, before);
        assert_eq!(snapshot.error.as_deref(), Some("Data source error: timeout"));
        assert!(snapshot.can_retry());

        assert_eq!(session.retry().await.unwrap(), FetchOutcome::Applied);
        let snapshot = session.snapshot();
        assert!(snapshot.error.is_none());
        assert_ne!(snapshot.records, before);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_toolbar_input_is_not_committed() {
        let (session, _) = session();
        session.refresh().await.unwrap();

        let err = session
            .set_filter("status", FilterValue::Single("archived".to_string()))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SessionError::Toolbar(ToolbarError::InvalidFilterValue { .. })
        ));
        assert!(session.toolbar().filters.is_empty());

        let company = FieldPath::parse("company").unwrap();
        assert!(session.toggle_sort(&company).await.is_err());
        assert!(session.toolbar().sort.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_bulk_delete_decline_then_confirm() {
        let (session, source) = session();
        session.refresh().await.unwrap();
        for raw in ["c0", "c1", "c2"] {
            session.toggle_selection(id(raw));
        }

        let progress = session
            .request_action(ActionScope::Bulk, "delete", None)
            .await
            .unwrap();
        assert!(matches!(
            progress,
            ActionProgress::AwaitingConfirmation(ref prompt) if prompt.destructive
        ));
        assert!(session.snapshot().confirmation.is_some());

        assert_eq!(session.decline_action(), ActionOutcome::Declined);
        assert_eq!(session.selection().len(), 3);
        assert!(source.invocations().is_empty());
        assert_eq!(source.records("contact").len(), 23);

        session
            .request_action(ActionScope::Bulk, "delete", None)
            .await
            .unwrap();
        let fetches = source.fetch_count();
        let outcome = session.confirm_action().await.unwrap();

        assert!(outcome.is_completed());
        assert_eq!(
            source.invocations(),
            vec![("delete".to_string(), vec![id("c0"), id("c1"), id("c2")])]
        );
        assert_eq!(source.fetch_count(), fetches + 1);
        assert!(session.selection().is_empty());
        assert_eq!(session.snapshot().total, 20);
        assert!(session.snapshot().confirmation.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_confirm_without_request() {
        let (session, _) = session();
        assert!(matches!(
            session.confirm_action().await,
            Err(SessionError::Action(ActionError::NothingPending))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_action_keeps_selection() {
        let (session, source) = session();
        session.refresh().await.unwrap();
        session.toggle_selection(id("c3"));
        let fetches = source.fetch_count();

        let err = session
            .request_action(ActionScope::Bulk, "archive", None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SessionError::Action(ActionError::Handler(ref msg)) if msg == "Archive service unavailable"
        ));
        assert_eq!(session.selection(), vec![id("c3")]);
        assert_eq!(source.fetch_count(), fetches);
        assert_eq!(
            session.snapshot().action_error.as_deref(),
            Some("Archive service unavailable")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_invoke_with_confirmer() {
        let (session, source) = session();
        session.refresh().await.unwrap();
        session.toggle_selection(id("c4"));

        let mut confirmer = MockConfirmer::new();
        confirmer
            .expect_confirm()
            .withf(|prompt| prompt.title == "Delete contacts?" && prompt.confirm_label == "Delete")
            .times(1)
            .returning(|_| Box::pin(async { true }));

        let outcome = session
            .invoke(ActionScope::Bulk, "delete", None, &confirmer)
            .await
            .unwrap();
        assert!(outcome.is_completed());
        assert_eq!(source.records("contact").len(), 22);
    }

    #[tokio::test(start_paused = true)]
    async fn test_view_switch_reuses_loaded_records() {
        let (session, source) = session();
        session.refresh().await.unwrap();
        let fetches = source.fetch_count();

        assert_eq!(
            session.switch_view(ViewType::List).await.unwrap(),
            FetchOutcome::NotNeeded
        );
        assert_eq!(source.fetch_count(), fetches);
        assert!(matches!(session.snapshot().view, Some(RenderTree::List(_))));

        // The map reads coordinates the table projection left out
        assert_eq!(
            session.switch_view(ViewType::Map).await.unwrap(),
            FetchOutcome::Applied
        );
        assert_eq!(source.fetch_count(), fetches + 1);
        let lat = FieldPath::parse("lat").unwrap();
        assert!(source.fetched().pop().unwrap().fields.contains(&lat));
    }

    #[tokio::test(start_paused = true)]
    async fn test_view_switch_checks_fetch_in_flight() {
        let (session, source) = session();
        let session = Arc::new(session);
        session.refresh().await.unwrap();

        // The map fetch projects coordinates but not the company
        source.push_delay(Duration::from_millis(500));
        let map = session.clone();
        let map = tokio::spawn(async move { map.switch_view(ViewType::Map).await });
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(
            session.switch_view(ViewType::List).await.unwrap(),
            FetchOutcome::Applied
        );
        assert_eq!(map.await.unwrap().unwrap(), FetchOutcome::Superseded);

        let snapshot = session.snapshot();
        assert_eq!(snapshot.toolbar.active_view, ViewType::List);
        assert!(!snapshot.loading);
        let Some(RenderTree::List(list)) = snapshot.view else {
            panic!("expected list view");
        };
        let subtitle = list.items[0].subtitle.as_ref().unwrap();
        assert_eq!(subtitle.display, "Acme Corp");
    }

    #[tokio::test(start_paused = true)]
    async fn test_link_targets_follow_reused_formats() {
        let (session, source) = session();
        let mut page = contacts_page();
        let columns = &mut page.views.table.as_mut().unwrap().columns;
        columns[1].format =
            Some(serde_json::from_value(json!({"type": "link", "hrefField": "companyUrl"})).unwrap());
        columns[3].format =
            Some(serde_json::from_value(json!({"type": "link", "hrefField": "profileUrl"})).unwrap());
        session.replace_page(page).await.unwrap();

        session.switch_view(ViewType::List).await.unwrap();
        let fields = session.query().unwrap().fields;
        assert!(fields.contains(&FieldPath::parse("companyUrl").unwrap()));
        assert!(!fields.contains(&FieldPath::parse("profileUrl").unwrap()));

        session.show_column("email").unwrap();
        session.export(ExportFormat::Csv).await.unwrap();
        let request = source.fetched().pop().unwrap();
        assert!(request.fields.contains(&FieldPath::parse("email").unwrap()));
        assert!(request.fields.contains(&FieldPath::parse("profileUrl").unwrap()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_permissions_hide_and_refuse() {
        let (session, _) = session_with(Arc::new(StaticRoles::new(["viewer"])));
        session.refresh().await.unwrap();
        session.toggle_selection(id("c0"));

        let controls = session.controls();
        assert!(controls.export_formats.is_empty());
        let bulk: Vec<&str> = controls.bulk_actions.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(bulk, ["archive"]);

        assert!(matches!(
            session.request_action(ActionScope::Bulk, "delete", None).await,
            Err(SessionError::Action(ActionError::NotPermitted))
        ));
        assert!(matches!(
            session.export(ExportFormat::Csv).await,
            Err(SessionError::Export(ExportError::NotPermitted))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_export_ignores_pagination() {
        let (session, _) = session();
        session.show_column("email").unwrap();
        session.refresh().await.unwrap();

        let file = session.export(ExportFormat::Csv).await.unwrap();
        assert_eq!(file.filename, "contacts.csv");
        assert_eq!(file.content_type, "text/csv");
        let text = String::from_utf8(file.bytes).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("Name,Company,Status,Email"));
        assert_eq!(lines.count(), 23);
    }

    #[tokio::test(start_paused = true)]
    async fn test_replace_page_resets_toolbar() {
        let (session, _) = session();
        session
            .set_filter("status", FilterValue::Single("active".to_string()))
            .await
            .unwrap();
        session.toggle_selection(id("c0"));

        let mut page = contacts_page();
        page.title = "People".to_string();
        session.replace_page(page).await.unwrap();

        let toolbar = session.toolbar();
        assert!(toolbar.filters.is_empty());
        assert!(toolbar.selected.is_empty());
        assert_eq!(session.snapshot().total, 23);
        assert_eq!(session.page().title, "People");
    }

    #[tokio::test(start_paused = true)]
    async fn test_subscribers_see_every_mutation() {
        let (session, _) = session();
        let mut rx = session.subscribe();
        session.refresh().await.unwrap();
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().total, 23);

        session.toggle_selection(id("c1"));
        assert!(rx.has_changed().unwrap());
        assert!(rx.borrow_and_update().toolbar.selected.contains(&id("c1")));
    }
}
