//! Core types for the record store.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for a record (assigned by the store).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RecordId(pub i64);

impl fmt::Debug for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RecordId({})", self.0)
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single stored name.
///
/// Serializes as `{"id": 1, "name": "Ada", "created_at": "2025-01-01T12:00:00Z"}`,
/// which is both the `/api/all` row shape and the element shape of every
/// real-time snapshot.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Unique identifier (assigned by store).
    pub id: RecordId,
    /// Free-text name.
    pub name: String,
    /// Insert time, RFC 3339 in UTC (assigned by store).
    pub created_at: String,
}

/// Full copy of the record table at one instant, the unit of broadcast.
#[derive(Clone, Debug)]
pub struct Snapshot {
    /// Publish sequence number, increasing per channel.
    pub sequence: u64,
    /// Every record, ordered by id.
    pub records: Vec<Record>,
}

impl Snapshot {
    /// Encode the wire form: the bare JSON array of records.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(&self.records)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
