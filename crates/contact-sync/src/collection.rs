/// Locally editable list of contact rows for one parent resource
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use crate::{default_normalizer, ContactKind, LocalId, PersistedId, SnapshotEntry, ValueNormalizer};

/// A single input row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactEntry {
    /// UI list key, stable across edits
    pub local_id: LocalId,

    /// Server row id if this entry was loaded from the server
    pub persisted_id: Option<PersistedId>,

    pub value: String,

    pub kind: ContactKind,
}

impl ContactEntry {
    fn blank(kind: ContactKind) -> Self {
        Self {
            local_id: LocalId::new(),
            persisted_id: None,
            value: String::new(),
            kind,
        }
    }

    pub fn is_persisted(&self) -> bool {
        self.persisted_id.is_some()
    }

    pub fn is_blank(&self) -> bool {
        self.value.trim().is_empty()
    }
}

/// Ordered rows of one contact kind. Always holds at least one row.
#[derive(Clone)]
pub struct EditableCollection {
    kind: ContactKind,
    entries: Vec<ContactEntry>,
    normalizer: Arc<dyn ValueNormalizer>,
}

impl EditableCollection {
    /// Collection for the create flow: a single blank row
    pub fn new(kind: ContactKind) -> Self {
        Self {
            kind,
            entries: vec![ContactEntry::blank(kind)],
            normalizer: default_normalizer(kind),
        }
    }

    /// Collection for the edit flow, one persisted row per snapshot entry.
    /// Server values are kept as-is; only `set_value` normalizes.
    pub fn from_snapshot(kind: ContactKind, snapshot: &[SnapshotEntry]) -> Self {
        let mut collection = Self::new(kind);
        collection.load_snapshot(snapshot);
        collection
    }

    /// Replace the value policy. Existing values are not re-normalized.
    pub fn with_normalizer(mut self, normalizer: Arc<dyn ValueNormalizer>) -> Self {
        self.normalizer = normalizer;
        self
    }

    fn load_snapshot(&mut self, snapshot: &[SnapshotEntry]) {
        self.entries = snapshot
            .iter()
            .map(|row| ContactEntry {
                local_id: LocalId::new(),
                persisted_id: Some(row.id.clone()),
                value: row.value.clone(),
                kind: self.kind,
            })
            .collect();
        self.ensure_placeholder();
    }

    fn ensure_placeholder(&mut self) {
        if self.entries.is_empty() {
            self.entries.push(ContactEntry::blank(self.kind));
        }
    }

    pub fn kind(&self) -> ContactKind {
        self.kind
    }

    pub fn entries(&self) -> &[ContactEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Never true; kept for API symmetry with `len`
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, local_id: LocalId) -> Option<&ContactEntry> {
        self.entries.iter().find(|e| e.local_id == local_id)
    }

    /// Append a blank row and return its key
    pub fn add_blank(&mut self) -> LocalId {
        let entry = ContactEntry::blank(self.kind);
        let id = entry.local_id;
        self.entries.push(entry);
        id
    }

    /// Remove a row. Removing the last row leaves a fresh blank one.
    pub fn remove(&mut self, local_id: LocalId) {
        let before = self.entries.len();
        self.entries.retain(|e| e.local_id != local_id);
        if self.entries.len() != before {
            self.ensure_placeholder();
        }
    }

    /// Normalize and store a new value. Returns false if the row is unknown.
    pub fn set_value(&mut self, local_id: LocalId, new_value: &str) -> bool {
        let normalized = self.normalizer.normalize(new_value);
        match self.entries.iter_mut().find(|e| e.local_id == local_id) {
            Some(entry) => {
                entry.value = normalized;
                true
            }
            None => false,
        }
    }

    /// Trimmed, non-empty values in row order. Repeated values keep their first position.
    pub fn values(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.entries
            .iter()
            .map(|e| e.value.trim())
            .filter(|v| !v.is_empty())
            .filter(|v| seen.insert(*v))
            .map(str::to_string)
            .collect()
    }

    pub fn has_values(&self) -> bool {
        self.entries.iter().any(|e| !e.is_blank())
    }
}

impl fmt::Debug for EditableCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EditableCollection")
            .field("kind", &self.kind)
            .field("entries", &self.entries)
            .finish()
    }
}
