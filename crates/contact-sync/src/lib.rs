//! Contact collection synchronization
//! Editable email/phone lists for a parent resource and the reconciler that
//! pushes the final list to a remote collection as sequential add/delete calls.
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

mod normalize;
pub use normalize::*;

mod collection;
pub use collection::*;

mod plan;
pub use plan::*;

mod transport;
pub use transport::*;

mod outcome;
pub use outcome::*;

mod reconciler;
pub use reconciler::*;

mod hotel;
pub use hotel::*;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ContactError {
    #[error("invalid contact kind: {0}")]
    InvalidKind(String),
}

/// Which contact collection of a parent resource is being edited
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContactKind {
    Email,
    Phone,
}

impl ContactKind {
    pub const ALL: [ContactKind; 2] = [ContactKind::Email, ContactKind::Phone];

    pub fn as_str(&self) -> &'static str {
        match self {
            ContactKind::Email => "email",
            ContactKind::Phone => "phone",
        }
    }
}

impl fmt::Display for ContactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContactKind {
    type Err = ContactError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "email" => Ok(ContactKind::Email),
            "phone" => Ok(ContactKind::Phone),
            other => Err(ContactError::InvalidKind(other.to_string())),
        }
    }
}

/// Identifier of the resource (a hotel) that owns contact collections
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParentId(pub String);

impl ParentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ParentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Row key used by the editing UI. Never sent to the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LocalId(pub uuid::Uuid);

impl LocalId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for LocalId {
    fn default() -> Self {
        Self::new()
    }
}

/// Server-side row identifier of a persisted contact value
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PersistedId(pub String);

impl PersistedId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for PersistedId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One row of a server snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotEntry {
    pub id: PersistedId,
    pub value: String,
}

impl SnapshotEntry {
    pub fn new(id: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            id: PersistedId::new(id),
            value: value.into(),
        }
    }
}
