/// Sequential add/delete reconciliation of one contact collection
///
/// A run fetches the server snapshot, diffs it against the local values and then
/// issues every add (in local order) followed by every delete (in snapshot order),
/// one call at a time. Nothing is ever in flight concurrently.
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
    ContactKind, ContactTransport, EditableCollection, ItemFailure, ParentId,
    ReconciliationPlan, ReconciliationResult, SnapshotEntry, TransportError,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcilePhase {
    Idle,
    Validating,
    FetchingSnapshot,
    Adding,
    Deleting,
    Done,
    Failed,
}

impl ReconcilePhase {
    pub fn can_transition_to(self, next: ReconcilePhase) -> bool {
        use ReconcilePhase::*;
        matches!(
            (self, next),
            (Idle, Validating)
                | (Validating, FetchingSnapshot)
                | (Validating, Failed)
                | (FetchingSnapshot, Adding)
                | (FetchingSnapshot, Failed)
                | (Adding, Deleting)
                | (Adding, Failed)
                | (Deleting, Done)
                | (Deleting, Failed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, ReconcilePhase::Done | ReconcilePhase::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ReconcilePhase::Idle => "idle",
            ReconcilePhase::Validating => "validating",
            ReconcilePhase::FetchingSnapshot => "fetching_snapshot",
            ReconcilePhase::Adding => "adding",
            ReconcilePhase::Deleting => "deleting",
            ReconcilePhase::Done => "done",
            ReconcilePhase::Failed => "failed",
        }
    }
}

impl fmt::Display for ReconcilePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ReconcileError {
    #[error("at least one {kind} is required")]
    ValidationFailed { kind: ContactKind },

    #[error("could not fetch {kind} snapshot: {source}")]
    Fetch {
        kind: ContactKind,
        source: TransportError,
    },

    /// The collaborator became unusable mid-run. `partial` holds what was done before.
    #[error("reconciliation aborted while {phase}: {source}")]
    Aborted {
        phase: ReconcilePhase,
        source: TransportError,
        partial: Box<ReconciliationResult>,
    },

    /// Never started because an earlier run in the same save hit a fatal error
    #[error("{kind} changes not sent: {source}")]
    NotStarted {
        kind: ContactKind,
        source: TransportError,
    },
}

impl ReconcileError {
    pub fn kind(&self) -> ContactKind {
        match self {
            ReconcileError::ValidationFailed { kind }
            | ReconcileError::Fetch { kind, .. }
            | ReconcileError::NotStarted { kind, .. } => *kind,
            ReconcileError::Aborted { partial, .. } => partial.kind,
        }
    }

    /// The collaborator error behind this one, if no further call can succeed
    pub fn fatal_source(&self) -> Option<&TransportError> {
        match self {
            ReconcileError::Fetch { source, .. }
            | ReconcileError::Aborted { source, .. }
            | ReconcileError::NotStarted { source, .. } => Some(source).filter(|s| s.is_fatal()),
            ReconcileError::ValidationFailed { .. } => None,
        }
    }

    /// Whether any remote mutation may have happened before the error
    pub fn may_have_mutated(&self) -> bool {
        match self {
            ReconcileError::Aborted { partial, .. } => partial.succeeded() > 0,
            _ => false,
        }
    }
}

pub type PhaseListener = Arc<dyn Fn(ReconcilePhase) + Send + Sync>;

/// Walks one run through the phase machine
struct PhaseTracker<'a> {
    current: ReconcilePhase,
    parent: &'a ParentId,
    kind: ContactKind,
    listener: Option<&'a PhaseListener>,
}

impl<'a> PhaseTracker<'a> {
    fn new(parent: &'a ParentId, kind: ContactKind, listener: Option<&'a PhaseListener>) -> Self {
        Self {
            current: ReconcilePhase::Idle,
            parent,
            kind,
            listener,
        }
    }

    fn advance(&mut self, next: ReconcilePhase) {
        debug_assert!(
            self.current.can_transition_to(next),
            "illegal phase transition {} -> {}",
            self.current,
            next
        );
        debug!(
            "{} {} reconcile: {} -> {}",
            self.parent, self.kind, self.current, next
        );
        self.current = next;
        if let Some(listener) = self.listener {
            listener(next);
        }
    }

    fn current(&self) -> ReconcilePhase {
        self.current
    }
}

pub struct CollectionReconciler<T> {
    transport: T,
    listener: Option<PhaseListener>,
}

impl<T: ContactTransport> CollectionReconciler<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            listener: None,
        }
    }

    /// Observe every phase a run enters
    pub fn with_phase_listener(
        mut self,
        listener: impl Fn(ReconcilePhase) + Send + Sync + 'static,
    ) -> Self {
        self.listener = Some(Arc::new(listener));
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Make the server collection of `collection.kind()` match the collection's values
    pub async fn reconcile(
        &self,
        parent: &ParentId,
        collection: &EditableCollection,
    ) -> Result<ReconciliationResult, ReconcileError> {
        self.reconcile_values(parent, collection.kind(), &collection.values())
            .await
    }

    pub async fn reconcile_values(
        &self,
        parent: &ParentId,
        kind: ContactKind,
        values: &[String],
    ) -> Result<ReconciliationResult, ReconcileError> {
        let mut phases = PhaseTracker::new(parent, kind, self.listener.as_ref());

        phases.advance(ReconcilePhase::Validating);
        let local: Vec<String> = values
            .iter()
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .collect();
        if local.is_empty() {
            warn!("{} has no {} values left; refusing to sync", parent, kind);
            phases.advance(ReconcilePhase::Failed);
            return Err(ReconcileError::ValidationFailed { kind });
        }

        phases.advance(ReconcilePhase::FetchingSnapshot);
        let snapshot = match self.transport.fetch_snapshot(parent, kind).await {
            Ok(snapshot) => snapshot,
            Err(source) => {
                warn!("Failed to fetch {} snapshot for {}: {}", kind, parent, source);
                phases.advance(ReconcilePhase::Failed);
                return Err(ReconcileError::Fetch { kind, source });
            }
        };

        let plan = ReconciliationPlan::compute(&local, &snapshot);
        info!(
            "Reconciling {} {}: {} to add, {} to delete",
            parent,
            kind,
            plan.to_add.len(),
            plan.to_delete.len()
        );

        let mut result = ReconciliationResult::new(parent.clone(), kind);
        let ReconciliationPlan { to_add, to_delete } = plan;

        phases.advance(ReconcilePhase::Adding);
        let mut pending_adds = to_add.into_iter();
        while let Some(value) = pending_adds.next() {
            result.adds.attempted += 1;
            debug!("Adding {} '{}' to {}", kind, value, parent);

            match self.transport.add_value(parent, kind, &value).await {
                Ok(id) => {
                    result.adds.succeeded += 1;
                    result.created.push(SnapshotEntry { id, value });
                }
                Err(cause) => {
                    warn!("Adding {} '{}' to {} failed: {}", kind, value, parent, cause);
                    let fatal = cause.is_fatal();
                    result.failures.push(ItemFailure::AddFailed { value, cause: cause.clone() });
                    result.skipped.extend(pending_adds.by_ref());

                    if fatal {
                        result
                            .skipped
                            .extend(to_delete.into_iter().map(|entry| entry.value));
                        return Err(abort(&mut phases, result, cause));
                    }
                    break;
                }
            }
        }

        phases.advance(ReconcilePhase::Deleting);
        let mut pending_deletes = to_delete.into_iter();
        while let Some(entry) = pending_deletes.next() {
            result.deletes.attempted += 1;
            debug!("Deleting {} '{}' (row {}) from {}", kind, entry.value, entry.id, parent);

            match self.transport.delete_value(parent, kind, &entry.value).await {
                Ok(()) => {
                    result.deletes.succeeded += 1;
                    result.deleted.push(entry.value);
                }
                Err(cause) => {
                    warn!(
                        "Deleting {} '{}' from {} failed: {}",
                        kind, entry.value, parent, cause
                    );
                    let fatal = cause.is_fatal();
                    result.failures.push(ItemFailure::DeleteFailed {
                        value: entry.value,
                        cause: cause.clone(),
                    });

                    if fatal {
                        result
                            .skipped
                            .extend(pending_deletes.by_ref().map(|entry| entry.value));
                        return Err(abort(&mut phases, result, cause));
                    }
                }
            }
        }

        phases.advance(ReconcilePhase::Done);
        result.completed_at = Utc::now();
        info!("{} {}: {}", parent, kind, result.summary());
        Ok(result)
    }
}

fn abort(
    phases: &mut PhaseTracker<'_>,
    mut partial: ReconciliationResult,
    source: TransportError,
) -> ReconcileError {
    let phase = phases.current();
    warn!(
        "Aborting {} {} reconcile while {}: {}",
        partial.parent, partial.kind, phase, source
    );
    phases.advance(ReconcilePhase::Failed);
    partial.completed_at = Utc::now();
    ReconcileError::Aborted {
        phase,
        source,
        partial: Box::new(partial),
    }
}
