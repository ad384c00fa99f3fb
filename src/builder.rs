//! Snapshot assembly.
//!
//! Reads (never mutates) the log buffers: the error tail is copied, and the
//! debug counters are computed at build time.

use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};

use crate::config::CaptureConfig;
use crate::logs::LogBuffers;
use crate::model::{now_secs, EnvInfo, RequestRecord, Snapshot};

#[derive(Debug, Clone)]
pub struct SnapshotBuilder {
    capture: CaptureConfig,
}

impl SnapshotBuilder {
    pub fn new(capture: CaptureConfig) -> Self {
        Self { capture }
    }

    pub fn build(
        &self,
        logs: &LogBuffers,
        label: String,
        tags: Vec<String>,
        memory: Value,
        request: RequestRecord,
    ) -> Snapshot {
        let (errors, debug_info) = logs.capture(self.capture.error_tail);
        Snapshot {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: now_secs(),
            label,
            tags: tags.into_iter().collect::<BTreeSet<_>>(),
            expected_output: None,
            request,
            env: self.capture_environment(),
            memory: match memory {
                Value::Null => Value::Object(Map::new()),
                other => other,
            },
            errors,
            debug_info,
        }
    }

    /// Allow-listed environment variables plus runtime and platform metadata.
    pub fn capture_environment(&self) -> EnvInfo {
        let environment_variables: BTreeMap<String, String> = self
            .capture
            .env_allow_list
            .iter()
            .filter_map(|name| std::env::var(name).ok().map(|v| (name.clone(), v)))
            .collect();
        EnvInfo {
            runtime: format!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION")),
            platform: format!("{}-{}", std::env::consts::OS, std::env::consts::ARCH),
            environment_variables,
            working_directory: std::env::current_dir()
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
        }
    }
}

/// Request shape recorded for a manually declared snapshot.
pub fn manual_request(path: String, json: Value) -> RequestRecord {
    RequestRecord {
        timestamp: None,
        path,
        method: "POST".to_string(),
        headers: BTreeMap::from([("Content-Type".to_string(), "application/json".to_string())]),
        args: BTreeMap::new(),
        form: BTreeMap::new(),
        json,
        ip: None,
        user_agent: None,
    }
}
