/// Per-run accounting returned by the reconciler
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{ContactKind, ParentId, SnapshotEntry, TransportError};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpTally {
    /// Calls actually issued
    pub attempted: usize,
    pub succeeded: usize,
}

impl OpTally {
    pub fn failed(&self) -> usize {
        self.attempted.saturating_sub(self.succeeded)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ItemFailure {
    AddFailed { value: String, cause: TransportError },
    DeleteFailed { value: String, cause: TransportError },
}

impl ItemFailure {
    pub fn value(&self) -> &str {
        match self {
            ItemFailure::AddFailed { value, .. } | ItemFailure::DeleteFailed { value, .. } => value,
        }
    }

    pub fn cause(&self) -> &TransportError {
        match self {
            ItemFailure::AddFailed { cause, .. } | ItemFailure::DeleteFailed { cause, .. } => cause,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationResult {
    pub parent: ParentId,
    pub kind: ContactKind,
    pub adds: OpTally,
    pub deletes: OpTally,

    /// Rows the server confirmed, with their new ids
    pub created: Vec<SnapshotEntry>,

    /// Values the server confirmed deleted
    pub deleted: Vec<String>,

    /// Planned values never sent: adds after a failed add, or everything left after an abort
    pub skipped: Vec<String>,

    /// Failures in the order they happened
    pub failures: Vec<ItemFailure>,

    pub completed_at: DateTime<Utc>,
}

impl ReconciliationResult {
    pub fn new(parent: ParentId, kind: ContactKind) -> Self {
        Self {
            parent,
            kind,
            adds: OpTally::default(),
            deletes: OpTally::default(),
            created: Vec::new(),
            deleted: Vec::new(),
            skipped: Vec::new(),
            failures: Vec::new(),
            completed_at: Utc::now(),
        }
    }

    pub fn attempted(&self) -> usize {
        self.adds.attempted + self.deletes.attempted
    }

    pub fn succeeded(&self) -> usize {
        self.adds.succeeded + self.deletes.succeeded
    }

    /// Every planned operation was issued and succeeded
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty() && self.skipped.is_empty()
    }

    pub fn is_noop(&self) -> bool {
        self.attempted() == 0 && self.skipped.is_empty()
    }

    /// Human-readable feedback, e.g. "1 of 2 phone updates succeeded; delete '555' failed: ..."
    pub fn summary(&self) -> String {
        if self.is_noop() {
            return format!("no {} changes", self.kind);
        }

        let planned = self.attempted() + self.skipped.len();
        let mut message = format!(
            "{} of {} {} updates succeeded",
            self.succeeded(),
            planned,
            self.kind
        );

        for failure in &self.failures {
            let verb = match failure {
                ItemFailure::AddFailed { .. } => "add",
                ItemFailure::DeleteFailed { .. } => "delete",
            };
            message.push_str(&format!(
                "; {} '{}' failed: {}",
                verb,
                failure.value(),
                failure.cause()
            ));
        }

        if !self.skipped.is_empty() {
            message.push_str(&format!("; not attempted: {}", self.skipped.join(", ")));
        }

        message
    }
}
