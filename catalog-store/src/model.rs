//! Shared wire/storage types for both config store backends.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An immutable snapshot of a source's raw payload at a point in time
/// (spec.md §3.1 "Revision").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Revision {
    pub version: String,
    pub timestamp: DateTime<Utc>,
    pub size: usize,
    pub payload: Vec<u8>,
}
