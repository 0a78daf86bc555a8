/// Remote collection collaborator consumed by the reconciler
///
/// Implementations own authorization; the reconciler never sees credentials.
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

use crate::{ContactKind, ParentId, PersistedId, SnapshotEntry};

#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransportError {
    #[error("not authorized: {0}")]
    Unauthorized(String),

    #[error("transport unavailable: {0}")]
    Unavailable(String),

    #[error("server returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("network error: {0}")]
    Network(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl TransportError {
    /// True when no further request can succeed, as opposed to a single rejected item
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            TransportError::Unauthorized(_) | TransportError::Unavailable(_)
        )
    }
}

#[async_trait::async_trait]
pub trait ContactTransport: Send + Sync {
    /// Current server rows for one collection, in server order
    async fn fetch_snapshot(
        &self,
        parent: &ParentId,
        kind: ContactKind,
    ) -> Result<Vec<SnapshotEntry>, TransportError>;

    async fn add_value(
        &self,
        parent: &ParentId,
        kind: ContactKind,
        value: &str,
    ) -> Result<PersistedId, TransportError>;

    /// Delete by value, not by row id
    async fn delete_value(
        &self,
        parent: &ParentId,
        kind: ContactKind,
        value: &str,
    ) -> Result<(), TransportError>;
}

#[async_trait::async_trait]
impl<T: ContactTransport + ?Sized> ContactTransport for Arc<T> {
    async fn fetch_snapshot(
        &self,
        parent: &ParentId,
        kind: ContactKind,
    ) -> Result<Vec<SnapshotEntry>, TransportError> {
        (**self).fetch_snapshot(parent, kind).await
    }

    async fn add_value(
        &self,
        parent: &ParentId,
        kind: ContactKind,
        value: &str,
    ) -> Result<PersistedId, TransportError> {
        (**self).add_value(parent, kind, value).await
    }

    async fn delete_value(
        &self,
        parent: &ParentId,
        kind: ContactKind,
        value: &str,
    ) -> Result<(), TransportError> {
        (**self).delete_value(parent, kind, value).await
    }
}

/// A call as seen by [`InMemoryTransport`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransportCall {
    FetchSnapshot {
        parent: ParentId,
        kind: ContactKind,
    },
    AddValue {
        parent: ParentId,
        kind: ContactKind,
        value: String,
    },
    DeleteValue {
        parent: ParentId,
        kind: ContactKind,
        value: String,
    },
}

impl TransportCall {
    pub fn is_mutation(&self) -> bool {
        !matches!(self, TransportCall::FetchSnapshot { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportOp {
    Fetch,
    Add,
    Delete,
}

#[derive(Debug, Clone)]
struct FailureRule {
    op: TransportOp,
    /// `None` matches every value
    value: Option<String>,
    error: TransportError,
    /// `None` never runs out
    remaining: Option<usize>,
}

#[derive(Debug, Default)]
struct MemoryState {
    rows: HashMap<(ParentId, ContactKind), Vec<SnapshotEntry>>,
    next_id: u64,
    calls: Vec<TransportCall>,
    failures: Vec<FailureRule>,
}

impl MemoryState {
    fn injected_failure(&mut self, op: TransportOp, value: Option<&str>) -> Option<TransportError> {
        let rule = self.failures.iter_mut().find(|rule| {
            rule.op == op
                && rule.remaining != Some(0)
                && match (&rule.value, value) {
                    (None, _) => true,
                    (Some(expected), Some(actual)) => expected == actual,
                    (Some(_), None) => false,
                }
        })?;

        if let Some(remaining) = rule.remaining.as_mut() {
            *remaining -= 1;
        }
        Some(rule.error.clone())
    }
}

/// Process-local contact store with a call journal and failure injection
#[derive(Debug, Default)]
pub struct InMemoryTransport {
    state: Mutex<MemoryState>,
}

impl InMemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed rows for one collection, allocating ids in order
    pub fn with_values(self, parent: &ParentId, kind: ContactKind, values: &[&str]) -> Self {
        {
            let mut state = self.state.lock();
            for value in values {
                state.next_id += 1;
                let entry = SnapshotEntry::new(state.next_id.to_string(), *value);
                state
                    .rows
                    .entry((parent.clone(), kind))
                    .or_default()
                    .push(entry);
            }
        }
        self
    }

    pub fn rows(&self, parent: &ParentId, kind: ContactKind) -> Vec<SnapshotEntry> {
        self.state
            .lock()
            .rows
            .get(&(parent.clone(), kind))
            .cloned()
            .unwrap_or_default()
    }

    pub fn values(&self, parent: &ParentId, kind: ContactKind) -> Vec<String> {
        self.rows(parent, kind).into_iter().map(|e| e.value).collect()
    }

    pub fn calls(&self) -> Vec<TransportCall> {
        self.state.lock().calls.clone()
    }

    /// Add and delete calls only
    pub fn mutation_calls(&self) -> Vec<TransportCall> {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|c| c.is_mutation())
            .cloned()
            .collect()
    }

    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }

    /// Every matching call fails with `error`. `value` of `None` matches all values.
    pub fn fail(&self, op: TransportOp, value: Option<&str>, error: TransportError) {
        self.push_rule(op, value, error, None);
    }

    /// Only the next matching call fails
    pub fn fail_once(&self, op: TransportOp, value: Option<&str>, error: TransportError) {
        self.push_rule(op, value, error, Some(1));
    }

    pub fn clear_failures(&self) {
        self.state.lock().failures.clear();
    }

    fn push_rule(
        &self,
        op: TransportOp,
        value: Option<&str>,
        error: TransportError,
        remaining: Option<usize>,
    ) {
        self.state.lock().failures.push(FailureRule {
            op,
            value: value.map(str::to_string),
            error,
            remaining,
        });
    }
}

#[async_trait::async_trait]
impl ContactTransport for InMemoryTransport {
    async fn fetch_snapshot(
        &self,
        parent: &ParentId,
        kind: ContactKind,
    ) -> Result<Vec<SnapshotEntry>, TransportError> {
        let mut state = self.state.lock();
        state.calls.push(TransportCall::FetchSnapshot {
            parent: parent.clone(),
            kind,
        });
        if let Some(err) = state.injected_failure(TransportOp::Fetch, None) {
            return Err(err);
        }

        Ok(state
            .rows
            .get(&(parent.clone(), kind))
            .cloned()
            .unwrap_or_default())
    }

    async fn add_value(
        &self,
        parent: &ParentId,
        kind: ContactKind,
        value: &str,
    ) -> Result<PersistedId, TransportError> {
        let mut state = self.state.lock();
        state.calls.push(TransportCall::AddValue {
            parent: parent.clone(),
            kind,
            value: value.to_string(),
        });
        if let Some(err) = state.injected_failure(TransportOp::Add, Some(value)) {
            return Err(err);
        }

        state.next_id += 1;
        let entry = SnapshotEntry::new(state.next_id.to_string(), value);
        let id = entry.id.clone();
        state
            .rows
            .entry((parent.clone(), kind))
            .or_default()
            .push(entry);
        Ok(id)
    }

    async fn delete_value(
        &self,
        parent: &ParentId,
        kind: ContactKind,
        value: &str,
    ) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        state.calls.push(TransportCall::DeleteValue {
            parent: parent.clone(),
            kind,
            value: value.to_string(),
        });
        if let Some(err) = state.injected_failure(TransportOp::Delete, Some(value)) {
            return Err(err);
        }

        let rows = state.rows.entry((parent.clone(), kind)).or_default();
        let before = rows.len();
        rows.retain(|e| e.value != value);
        if rows.len() == before {
            return Err(TransportError::Status {
                status: 404,
                message: format!("{} '{}' not found", kind, value),
            });
        }
        Ok(())
    }
}
