//! Document store contract for media records.
//!
//! Records are JSON documents addressed by media id. Updates are partial: each
//! one names dotted field paths (`ai_analysis.status`) and leaves every sibling
//! field untouched. An update may carry guards, which make it a
//! compare-and-swap: it applies only if every guarded field holds an expected value.

use async_trait::async_trait;
use serde_json::{Map, Value};

use playscout_core::models::{AnalysisStatus, MediaId, MediaRecord};
use playscout_core::AppError;

/// Condition an update must satisfy to be applied.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldGuard {
    pub path: String,
    /// Current value at `path` must equal one of these.
    pub allowed: Vec<Value>,
}

/// A set of dotted-path assignments applied atomically to one document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PartialUpdate {
    sets: Vec<(String, Value)>,
    guards: Vec<FieldGuard>,
}

impl PartialUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, path: &str, value: impl Into<Value>) -> Self {
        self.sets.push((path.to_string(), value.into()));
        self
    }

    /// Assign JSON `null`.
    pub fn clear(self, path: &str) -> Self {
        self.set(path, Value::Null)
    }

    /// Only apply when the value at `path` is one of `allowed`. Guards accumulate.
    pub fn guard<I, V>(mut self, path: &str, allowed: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.guards.push(FieldGuard {
            path: path.to_string(),
            allowed: allowed.into_iter().map(Into::into).collect(),
        });
        self
    }

    /// Guard on `ai_analysis.status`.
    pub fn when_status_in(self, statuses: &[AnalysisStatus]) -> Self {
        self.guard(
            playscout_core::models::fields::STATUS,
            statuses.iter().map(|s| s.as_str()),
        )
    }

    pub fn sets(&self) -> &[(String, Value)] {
        &self.sets
    }

    pub fn guards(&self) -> &[FieldGuard] {
        &self.guards
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }
}

/// Result of a partial update.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateOutcome {
    Applied,
    NotFound,
    /// A guard did not match. `current` is the value found at the first guard's
    /// path (`null` when absent).
    Rejected { current: Value },
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, id: &MediaId) -> Result<Option<MediaRecord>, AppError>;

    /// Create or replace the whole record.
    async fn insert(&self, record: &MediaRecord) -> Result<(), AppError>;

    async fn update(&self, id: &MediaId, update: &PartialUpdate)
        -> Result<UpdateOutcome, AppError>;

    /// Reachability probe used by readiness checks.
    async fn ping(&self) -> Result<(), AppError>;
}

/// Read the value at a dotted path.
pub fn lookup_path<'a>(doc: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(doc, |node, key| node.get(key))
}

/// Write `value` at a dotted path, creating (or replacing non-object) parents.
pub fn set_path(doc: &mut Value, path: &str, value: Value) {
    let mut node = doc;
    let mut segments = path.split('.').peekable();
    while let Some(key) = segments.next() {
        if !node.is_object() {
            *node = Value::Object(Map::new());
        }
        let Some(map) = node.as_object_mut() else {
            return;
        };
        if segments.peek().is_none() {
            map.insert(key.to_string(), value);
            return;
        }
        node = map.entry(key.to_string()).or_insert(Value::Null);
    }
}

/// Decode a stored document into a record.
pub fn record_from_document(doc: Value) -> Result<MediaRecord, AppError> {
    serde_json::from_value(doc)
        .map_err(|e| AppError::Internal(format!("Stored media document is malformed: {}", e)))
}

pub fn document_from_record(record: &MediaRecord) -> Result<Value, AppError> {
    serde_json::to_value(record)
        .map_err(|e| AppError::Internal(format!("Failed to encode media document: {}", e)))
}
