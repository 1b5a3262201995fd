//! In-memory data source.
//!
//! Evaluates query descriptors against record fixtures. Backs the CLI and
//! the engine's tests; recorded calls and injectable delays make fetch
//! ordering observable.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use parking_lot::Mutex;
use serde_json::{Map, Value};

use pageview_core::{ActionError, QueryDescriptor, QueryError, Record, RecordId};

use super::eval::apply_query;
use super::{ActionReceipt, DataSource, PageResult};

/// Handler for one named action. Mutates the entity's records in place and
/// returns an optional success message.
pub type ActionHandler =
    Arc<dyn Fn(&mut Vec<Record>, &[RecordId]) -> Result<Option<String>, String> + Send + Sync>;

/// Record store keyed by entity.
#[derive(Clone)]
pub struct MemorySource {
    entities: Arc<Mutex<HashMap<String, Vec<Record>>>>,
    stats: Arc<Mutex<HashMap<String, Map<String, Value>>>>,
    handlers: Arc<Mutex<HashMap<String, ActionHandler>>>,
    delay: Duration,
    delays: Arc<Mutex<VecDeque<Duration>>>,
    fail_next: Arc<Mutex<Option<QueryError>>>,
    fetched: Arc<Mutex<Vec<QueryDescriptor>>>,
    invocations: Arc<Mutex<Vec<(String, Vec<RecordId>)>>>,
}

impl MemorySource {
    /// Empty store with the built-in `delete` action.
    pub fn new() -> Self {
        let source = Self {
            entities: Arc::new(Mutex::new(HashMap::new())),
            stats: Arc::new(Mutex::new(HashMap::new())),
            handlers: Arc::new(Mutex::new(HashMap::new())),
            delay: Duration::ZERO,
            delays: Arc::new(Mutex::new(VecDeque::new())),
            fail_next: Arc::new(Mutex::new(None)),
            fetched: Arc::new(Mutex::new(Vec::new())),
            invocations: Arc::new(Mutex::new(Vec::new())),
        };
        source.handlers.lock().insert(
            "delete".to_string(),
            Arc::new(
                |records: &mut Vec<Record>, ids: &[RecordId]| -> Result<Option<String>, String> {
                    let before = records.len();
                    records.retain(|r| !ids.contains(r.id()));
                    Ok(Some(format!("Deleted {}", before - records.len())))
                },
            ),
        );
        source
    }

    /// Parse a JSON array of records for `entity`.
    pub fn from_json(entity: &str, json: &str) -> Result<Self, QueryError> {
        let values: Vec<Value> =
            serde_json::from_str(json).map_err(|e| QueryError::InvalidRecord(e.to_string()))?;
        let records = values
            .into_iter()
            .map(Record::from_value)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new().with_records(entity, records))
    }

    /// Replace the records of an entity. Input order is creation order.
    pub fn with_records(self, entity: &str, records: Vec<Record>) -> Self {
        self.entities.lock().insert(entity.to_string(), records);
        self
    }

    /// Aggregate payload returned alongside every page of `entity`.
    pub fn with_stats(self, entity: &str, stats: Map<String, Value>) -> Self {
        self.stats.lock().insert(entity.to_string(), stats);
        self
    }

    /// Register or replace a named action.
    pub fn with_action(self, action_id: &str, handler: ActionHandler) -> Self {
        self.handlers.lock().insert(action_id.to_string(), handler);
        self
    }

    /// Delay applied to every fetch.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Delay for the next fetch only. Queued delays are consumed in order
    /// before the default delay applies again.
    pub fn push_delay(&self, delay: Duration) {
        self.delays.lock().push_back(delay);
    }

    /// Fail the next fetch with `error`.
    pub fn fail_next_fetch(&self, error: QueryError) {
        *self.fail_next.lock() = Some(error);
    }

    /// Current records of an entity.
    pub fn records(&self, entity: &str) -> Vec<Record> {
        self.entities.lock().get(entity).cloned().unwrap_or_default()
    }

    /// Every descriptor fetched so far, in call order.
    pub fn fetched(&self) -> Vec<QueryDescriptor> {
        self.fetched.lock().clone()
    }

    pub fn fetch_count(&self) -> usize {
        self.fetched.lock().len()
    }

    /// Every action invocation so far, in call order.
    pub fn invocations(&self) -> Vec<(String, Vec<RecordId>)> {
        self.invocations.lock().clone()
    }
}

impl Default for MemorySource {
    fn default() -> Self {
        Self::new()
    }
}

impl DataSource for MemorySource {
    fn fetch_page(
        &self,
        entity: String,
        query: QueryDescriptor,
    ) -> BoxFuture<'static, Result<PageResult, QueryError>> {
        self.fetched.lock().push(query.clone());
        let delay = self.delays.lock().pop_front().unwrap_or(self.delay);

        let result = match self.fail_next.lock().take() {
            Some(error) => Err(error),
            None => {
                let entities = self.entities.lock();
                let records = entities.get(&entity).map(Vec::as_slice).unwrap_or_default();
                let (records, total) = apply_query(records, &query);

                let mut stats = self.stats.lock().get(&entity).cloned().unwrap_or_default();
                stats.insert("total".to_string(), Value::from(total));

                Ok(PageResult {
                    records,
                    total,
                    stats: Some(stats),
                })
            }
        };

        Box::pin(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            result
        })
    }

    fn invoke_action(
        &self,
        entity: String,
        action_id: String,
        record_ids: Vec<RecordId>,
    ) -> BoxFuture<'static, Result<ActionReceipt, ActionError>> {
        self.invocations
            .lock()
            .push((action_id.clone(), record_ids.clone()));

        let handler = self.handlers.lock().get(&action_id).cloned();
        let result = match handler {
            Some(handler) => {
                let mut entities = self.entities.lock();
                let records = entities.entry(entity).or_default();
                handler(records, &record_ids)
                    .map(|message| ActionReceipt {
                        message,
                        affected: record_ids.len(),
                    })
                    .map_err(ActionError::Handler)
            }
            None => Err(ActionError::Handler(format!(
                "No handler registered for '{action_id}'"
            ))),
        };

        Box::pin(async move { result })
    }
}
