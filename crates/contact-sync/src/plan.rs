/// Diff between local values and a server snapshot
///
/// Membership is exact string equality after trimming. Persisted ids play no part,
/// so an in-place edit of a persisted row shows up as one delete plus one add.
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::SnapshotEntry;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationPlan {
    /// Local values missing on the server, in local order
    pub to_add: Vec<String>,

    /// Server rows whose value is gone locally, in snapshot order
    pub to_delete: Vec<SnapshotEntry>,
}

impl ReconciliationPlan {
    pub fn compute(local: &[String], snapshot: &[SnapshotEntry]) -> Self {
        let local_set: HashSet<&str> = local
            .iter()
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
            .collect();
        let server_set: HashSet<&str> = snapshot
            .iter()
            .map(|e| e.value.trim())
            .filter(|v| !v.is_empty())
            .collect();

        let mut queued = HashSet::new();
        let to_add = local
            .iter()
            .map(|v| v.trim())
            .filter(|v| !v.is_empty() && !server_set.contains(v))
            .filter(|v| queued.insert(*v))
            .map(str::to_string)
            .collect();

        let mut queued = HashSet::new();
        let to_delete = snapshot
            .iter()
            .filter_map(|e| {
                let value = e.value.trim();
                if value.is_empty() || local_set.contains(value) || !queued.insert(value) {
                    return None;
                }
                Some(SnapshotEntry {
                    id: e.id.clone(),
                    value: value.to_string(),
                })
            })
            .collect();

        Self { to_add, to_delete }
    }

    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_delete.is_empty()
    }

    pub fn operation_count(&self) -> usize {
        self.to_add.len() + self.to_delete.len()
    }
}
