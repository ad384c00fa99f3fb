//! Snapshot document and log record types.
//!
//! These are the exact shapes written to `{storage_dir}/{id}.json` and
//! returned by the HTTP API, so field names are part of the wire format.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::time::{SystemTime, UNIX_EPOCH};

/// Current Unix time in fractional seconds.
pub fn now_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

// ---------------------------------------------------------------------------
// Captured request
// ---------------------------------------------------------------------------

/// One HTTP request as seen by the service (or as declared by a manual
/// snapshot).  Also used as the request-log entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<f64>,
    pub path: String,
    pub method: String,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// Query string arguments.
    #[serde(default)]
    pub args: BTreeMap<String, String>,
    #[serde(default)]
    pub form: BTreeMap<String, String>,
    /// Parsed JSON body, `null` when absent or unparseable.
    #[serde(default)]
    pub json: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

// ---------------------------------------------------------------------------
// Error log entry
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub timestamp: f64,
    pub error_type: String,
    pub error_message: String,
    pub traceback: String,
    #[serde(default)]
    pub context: Value,
    pub request_path: Option<String>,
    pub request_method: Option<String>,
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// Process environment captured at snapshot creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvInfo {
    pub runtime: String,
    pub platform: String,
    pub environment_variables: BTreeMap<String, String>,
    pub working_directory: String,
}

/// Counters computed when the snapshot was built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebugInfo {
    pub total_requests: usize,
    pub total_errors: usize,
    pub session_duration: f64,
}

/// A persisted record of one request's context plus surrounding debug state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub id: String,
    pub timestamp: f64,
    pub label: String,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub expected_output: Option<Value>,
    pub request: RequestRecord,
    pub env: EnvInfo,
    #[serde(default)]
    pub memory: Value,
    #[serde(default)]
    pub errors: Vec<ErrorRecord>,
    pub debug_info: DebugInfo,
}

impl Snapshot {
    /// Union `new_tags` into the tag set, returning how many were added.
    pub fn merge_tags<I>(&mut self, new_tags: I) -> usize
    where
        I: IntoIterator<Item = String>,
    {
        let before = self.tags.len();
        self.tags.extend(new_tags);
        self.tags.len() - before
    }

    pub fn summary(&self) -> SnapshotSummary {
        SnapshotSummary {
            id: self.id.clone(),
            timestamp: self.timestamp,
            label: self.label.clone(),
            tags: self.tags.clone(),
            path: self.request.path.clone(),
            has_errors: !self.errors.is_empty(),
            error_count: self.errors.len(),
        }
    }
}

/// Projection returned by `GET /snapshots`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotSummary {
    pub id: String,
    pub timestamp: f64,
    pub label: String,
    pub tags: BTreeSet<String>,
    pub path: String,
    pub has_errors: bool,
    pub error_count: usize,
}
