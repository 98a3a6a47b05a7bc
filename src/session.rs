//! Session access and the failure-replay protocol types.
//!
//! The session itself is persisted by an external store; this module only
//! defines the handle the pipeline mutates and the typed values the replay
//! protocol moves through it. The [`FailureRecord`] write/read cycle is the
//! heart of old-input replay: the dispatch wrapper stores one on action
//! failure, and the next rendering pass consumes it with
//! [`Session::take_failure_record`] — a read that deletes synchronously, so
//! a record can never be replayed twice.

use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::Error;

/// Session key for the pending failure record.
pub const FAILURE_KEY: &str = "_failure";
/// Session key for a stashed "go back" redirect target.
pub const BACK_KEY: &str = "_back";
/// Session key for the referer of the last full-page GET.
pub const REFERER_KEY: &str = "_refererUrl";
/// Session key for the URL of the last full-page GET.
pub const PREVIOUS_KEY: &str = "_previousUrl";
/// Session key for the CSRF token.
pub const CSRF_KEY: &str = "_csrf";

/// A per-client session handle.
///
/// Cheap to clone; all clones share the same underlying map, so the store
/// collaborator can keep a handle across requests and persist the final
/// state. The replay read/write sequence is not guarded against concurrent
/// requests from the same session racing on the record — at most one
/// in-flight request per session is assumed.
#[derive(Debug, Clone, Default)]
pub struct Session {
    inner: Arc<Mutex<Map<String, Value>>>,
}

impl Session {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap an existing session map, e.g. one deserialized by the store.
    #[must_use]
    pub fn from_map(map: Map<String, Value>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(map)),
        }
    }

    fn map(&self) -> MutexGuard<'_, Map<String, Value>> {
        // A poisoned session is still usable; the protocol values are
        // self-contained JSON.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<Value> {
        self.map().get(key).cloned()
    }

    pub fn insert(&self, key: &str, value: Value) {
        self.map().insert(key.to_string(), value);
    }

    pub fn remove(&self, key: &str) -> Option<Value> {
        self.map().remove(key)
    }

    /// Copy of the full session map, for persistence or assertions.
    #[must_use]
    pub fn snapshot(&self) -> Map<String, Value> {
        self.map().clone()
    }

    /// Take the pending failure record, deleting it from the session.
    ///
    /// Single-read semantics: a second call observes nothing. A record that
    /// fails to deserialize is dropped.
    #[must_use]
    pub fn take_failure_record(&self) -> Option<FailureRecord> {
        let raw = self.map().remove(FAILURE_KEY)?;
        match serde_json::from_value(raw) {
            Ok(record) => Some(record),
            Err(err) => {
                tracing::warn!(error = %err, "discarding malformed session failure record");
                None
            }
        }
    }

    pub fn put_failure_record(&self, record: &FailureRecord) {
        match serde_json::to_value(record) {
            Ok(value) => self.insert(FAILURE_KEY, value),
            Err(err) => tracing::error!(error = %err, "failed to serialize failure record"),
        }
    }

    /// Stash a "go back" redirect target for the next failed submission.
    pub fn stash_back(&self, url: &str) {
        self.insert(BACK_KEY, Value::String(url.to_string()));
    }

    /// Take the stashed "go back" target, clearing it.
    #[must_use]
    pub fn take_back(&self) -> Option<String> {
        match self.map().remove(BACK_KEY) {
            Some(Value::String(url)) => Some(url),
            _ => None,
        }
    }

    /// Record the navigation context of a full-page GET.
    pub fn record_navigation(&self, referer: Option<&str>, url: &str) {
        let mut map = self.map();
        match referer {
            Some(r) => {
                map.insert(REFERER_KEY.to_string(), Value::String(r.to_string()));
            }
            None => {
                map.remove(REFERER_KEY);
            }
        }
        map.insert(PREVIOUS_KEY.to_string(), Value::String(url.to_string()));
    }

    #[must_use]
    pub fn previous_url(&self) -> Option<String> {
        match self.get(PREVIOUS_KEY) {
            Some(Value::String(url)) => Some(url),
            _ => None,
        }
    }

    #[must_use]
    pub fn csrf_token(&self) -> Option<String> {
        match self.get(CSRF_KEY) {
            Some(Value::String(token)) => Some(token),
            _ => None,
        }
    }

    pub fn set_csrf_token(&self, token: &str) {
        self.insert(CSRF_KEY, Value::String(token.to_string()));
    }
}

/// One normalized failure entry inside a [`FailureRecord`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldFailure {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

/// Session-persisted snapshot of a failed submission.
///
/// `old` holds the submitted body so the next rendering pass can repopulate
/// the form; `errors` is the ordered, normalized failure list.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FailureRecord {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub errors: Vec<FieldFailure>,
    #[serde(default)]
    pub old: Map<String, Value>,
}

impl FailureRecord {
    /// Normalize an action failure into a record.
    ///
    /// A field-keyed error becomes one ordered entry per field; anything
    /// else becomes a single entry carrying the message and, only when the
    /// debug flag is enabled, the captured backtrace.
    #[must_use]
    pub fn from_error(err: &Error, old: Map<String, Value>, debug: bool) -> Self {
        let errors = if err.field_errors().is_empty() {
            vec![FieldFailure {
                field: None,
                failure: None,
                message: err.message().to_string(),
                stack: if debug {
                    err.backtrace().map(str::to_string)
                } else {
                    None
                },
            }]
        } else {
            err.field_errors()
                .iter()
                .map(|fe| FieldFailure {
                    field: Some(fe.field.clone()),
                    failure: Some(fe.failure.clone()),
                    message: fe.failure.clone(),
                    stack: None,
                })
                .collect()
        };

        Self {
            description: err.description().to_string(),
            errors,
            old,
        }
    }

    /// Whether the record carries anything worth exposing to a template.
    #[must_use]
    pub fn is_meaningful(&self) -> bool {
        !self.description.is_empty() || !self.errors.is_empty()
    }
}

/// Property-path lookup over a replayed submission body.
///
/// `get_or("widget.name", "")` walks nested objects and falls back to the
/// default for missing paths, so templates can prefill unconditionally.
#[derive(Debug, Clone, Default)]
pub struct OldInput {
    values: Map<String, Value>,
}

impl OldInput {
    #[must_use]
    pub fn new(values: Map<String, Value>) -> Self {
        Self { values }
    }

    #[must_use]
    pub fn all(&self) -> &Map<String, Value> {
        &self.values
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Resolve a dotted property path, `None` when any segment is missing.
    #[must_use]
    pub fn get(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.');
        let first = segments.next()?;
        let mut current = self.values.get(first)?;
        for segment in segments {
            current = current.as_object()?.get(segment)?;
        }
        Some(current)
    }

    /// Resolve a dotted property path as a string, with a default fallback.
    #[must_use]
    pub fn get_or(&self, path: &str, default: &str) -> String {
        match self.get(path) {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => default.to_string(),
        }
    }
}
