//! One handler per HTTP operation.
//!
//! Handlers are synchronous: they touch only the in-memory buffers and small
//! local files.  Each returns the response or a [`DebuggerError`] that the
//! router turns into a JSON error body.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::builder::manual_request;
use crate::error::DebuggerError;
use crate::http::{HttpRequest, HttpResponse};
use crate::logs::debug_tip;
use crate::model::{ErrorRecord, RequestRecord, SnapshotSummary};
use crate::state::AppState;
use crate::{replay, testgen};

type HandlerResult = Result<HttpResponse, DebuggerError>;

// ---------------------------------------------------------------------------
// Request bodies
// ---------------------------------------------------------------------------

fn empty_object() -> Value {
    Value::Object(Map::new())
}

/// Body of `POST /snapshot`; every field is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CaptureBody {
    pub label: Option<String>,
    pub tags: Vec<String>,
    pub memory: Value,
}

/// Body of `POST /snapshot/manual`.
#[derive(Debug, Deserialize)]
pub struct ManualSnapshotBody {
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default = "empty_object")]
    pub json: Value,
}

#[derive(Debug, Deserialize)]
pub struct ExpectedOutputBody {
    pub expected_output: Value,
}

#[derive(Debug, Deserialize)]
pub struct TagBody {
    pub tags: Vec<String>,
}

/// Error-log entry plus the heuristic hint served by `/debug/errors`.
#[derive(Debug, Serialize)]
struct ErrorWithTip {
    #[serde(flatten)]
    entry: ErrorRecord,
    debug_tip: &'static str,
}

// ---------------------------------------------------------------------------
// Snapshot handlers
// ---------------------------------------------------------------------------

/// `POST /snapshot` — capture the live request itself.
pub fn create_snapshot(state: &AppState, req: &HttpRequest, live: RequestRecord) -> HandlerResult {
    let body: CaptureBody = req.optional_json_body()?;
    let snapshot = state.builder.build(
        &state.logs,
        body.label.unwrap_or_else(|| "auto".to_string()),
        body.tags,
        body.memory,
        live,
    );
    state.save_snapshot(&snapshot)?;
    tracing::info!(id = %snapshot.id, label = %snapshot.label, "snapshot captured");
    HttpResponse::json(
        200,
        &json!({ "message": "Snapshot created", "snapshot_id": snapshot.id }),
    )
}

/// `POST /snapshot/manual` — snapshot of a caller-declared request.
pub fn create_manual_snapshot(state: &AppState, req: &HttpRequest) -> HandlerResult {
    let body: ManualSnapshotBody = req.json_body()?;
    let request = manual_request(
        body.path.unwrap_or_else(|| "/manual".to_string()),
        body.json,
    );
    let snapshot = state.builder.build(
        &state.logs,
        body.label.unwrap_or_else(|| "manual".to_string()),
        body.tags,
        empty_object(),
        request,
    );
    state.save_snapshot(&snapshot)?;
    tracing::info!(id = %snapshot.id, label = %snapshot.label, "manual snapshot created");
    HttpResponse::json(
        200,
        &json!({ "message": "Manual snapshot created", "snapshot_id": snapshot.id }),
    )
}

pub fn get_snapshot(state: &AppState, id: &str) -> HandlerResult {
    let snapshot = state.load_snapshot(id)?;
    HttpResponse::json(200, &snapshot)
}

pub fn list_snapshots(state: &AppState) -> HandlerResult {
    let summaries: Vec<SnapshotSummary> = state
        .store
        .list()?
        .iter()
        .map(|s| s.summary())
        .collect();
    HttpResponse::json(200, &summaries)
}

/// `GET /snapshot/{id}/export` — the stored file, byte for byte.
pub fn export_snapshot(state: &AppState, id: &str) -> HandlerResult {
    let bytes = state.store.load_raw(id)?;
    Ok(HttpResponse::attachment(
        "application/json",
        &format!("{id}.json"),
        bytes,
    ))
}

pub fn set_expected_output(state: &AppState, req: &HttpRequest, id: &str) -> HandlerResult {
    // Missing snapshots are reported before body problems.
    state.load_snapshot(id)?;
    let body: ExpectedOutputBody = req.json_body()?;
    let expected = match body.expected_output {
        Value::Null => None,
        other => Some(other),
    };
    state.update_snapshot(id, |s| s.expected_output = expected)?;
    HttpResponse::json(200, &json!({ "message": "Expected output saved." }))
}

pub fn replay_snapshot(state: &AppState, id: &str) -> HandlerResult {
    let snapshot = state.load_snapshot(id)?;
    let outcome = replay::replay(&snapshot);
    tracing::debug!(id, matched = outcome.matched, "snapshot replayed");
    HttpResponse::json(
        200,
        &json!({
            "message": "Replayed payment logic",
            "replayed_state": outcome.replayed_state,
            "expected_output": outcome.expected_output,
            "match": outcome.matched,
        }),
    )
}

pub fn generate_test(state: &AppState, id: &str) -> HandlerResult {
    let snapshot = state.load_snapshot(id)?;
    let source = testgen::generate(&snapshot, &state.config.base_url());
    Ok(HttpResponse::attachment(
        "text/x-rust",
        &testgen::file_name(id),
        source.into_bytes(),
    ))
}

pub fn delete_snapshot(state: &AppState, id: &str) -> HandlerResult {
    state.delete_snapshot(id)?;
    tracing::info!(id, "snapshot deleted");
    HttpResponse::json(200, &json!({ "message": "Snapshot deleted" }))
}

pub fn tag_snapshot(state: &AppState, req: &HttpRequest, id: &str) -> HandlerResult {
    state.load_snapshot(id)?;
    let body: TagBody = req.json_body()?;
    let updated = state.update_snapshot(id, |s| {
        s.merge_tags(body.tags);
    })?;
    HttpResponse::json(
        200,
        &json!({ "message": "Tags updated", "tags": updated.tags }),
    )
}

// ---------------------------------------------------------------------------
// Introspection handlers
// ---------------------------------------------------------------------------

pub fn debug_errors(state: &AppState) -> HandlerResult {
    let recent: Vec<ErrorWithTip> = state
        .logs
        .recent_errors(state.config.debug.recent_window)
        .into_iter()
        .map(|entry| {
            let debug_tip = debug_tip(&entry.error_type);
            ErrorWithTip { entry, debug_tip }
        })
        .collect();
    let stats = state.logs.stats(0);
    HttpResponse::json(
        200,
        &json!({
            "errors": recent,
            "total_errors": stats.total_errors,
            "error_rate": stats.error_rate,
        }),
    )
}

pub fn debug_requests(state: &AppState) -> HandlerResult {
    let recent = state.logs.recent_requests(state.config.debug.recent_window);
    let (total_requests, _) = state.logs.totals();
    HttpResponse::json(
        200,
        &json!({ "requests": recent, "total_requests": total_requests }),
    )
}

pub fn debug_stats(state: &AppState) -> HandlerResult {
    let stats = state.logs.stats(state.config.debug.top_n);
    let total_snapshots = state.store.count()?;
    HttpResponse::json(
        200,
        &json!({
            "total_snapshots": total_snapshots,
            "total_errors": stats.total_errors,
            "total_requests": stats.total_requests,
            "error_rate": stats.error_rate,
            "uptime": stats.uptime,
            "most_common_errors": stats.most_common_errors,
            "most_common_paths": stats.most_common_paths,
        }),
    )
}

pub fn clear_logs(state: &AppState) -> HandlerResult {
    state.logs.clear();
    tracing::info!("error and request logs cleared");
    HttpResponse::json(200, &json!({ "message": "Logs cleared" }))
}

pub fn export_logs(state: &AppState) -> HandlerResult {
    let export = state.logs.export();
    let body = serde_json::to_vec_pretty(&export)?;
    Ok(HttpResponse::attachment(
        "application/json",
        &format!("debug_logs_{}.json", export.export_timestamp as u64),
        body,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use tempfile::TempDir;

    fn state() -> (TempDir, AppState) {
        let dir = TempDir::new().unwrap();
        let config = Config {
            storage_dir: dir.path().join("snaps"),
            ..Config::default()
        };
        (dir, AppState::new(config).unwrap())
    }

    fn manual(state: &AppState, body: Value) -> String {
        let req = HttpRequest::new("POST", "/snapshot/manual").with_json(&body);
        let resp = create_manual_snapshot(state, &req).unwrap();
        resp.body_json().unwrap()["snapshot_id"]
            .as_str()
            .unwrap()
            .to_string()
    }

    #[test]
    fn test_manual_defaults() {
        let (_dir, state) = state();
        let id = manual(&state, json!({}));
        let snap = state.load_snapshot(&id).unwrap();
        assert_eq!(snap.label, "manual");
        assert_eq!(snap.request.path, "/manual");
        assert_eq!(snap.request.json, json!({}));
        assert!(snap.tags.is_empty());
    }

    #[test]
    fn test_manual_rejects_empty_body() {
        let (_dir, state) = state();
        let req = HttpRequest::new("POST", "/snapshot/manual");
        assert_eq!(create_manual_snapshot(&state, &req).unwrap_err().status(), 400);
    }

    #[test]
    fn test_capture_uses_live_request() {
        let (_dir, state) = state();
        let req = HttpRequest::new("POST", "/snapshot?env=dev")
            .with_json(&json!({"label": "checkout", "memory": {"cart": 3}}));
        let live = state.logs.record_request(req.to_record(&state.config));
        let resp = create_snapshot(&state, &req, live).unwrap();
        let id = resp.body_json().unwrap()["snapshot_id"].as_str().unwrap().to_string();
        let snap = state.load_snapshot(&id).unwrap();
        assert_eq!(snap.label, "checkout");
        assert_eq!(snap.memory, json!({"cart": 3}));
        assert_eq!(snap.request.args.get("env").map(String::as_str), Some("dev"));
        assert_eq!(snap.debug_info.total_requests, 1);
    }

    #[test]
    fn test_set_expected_on_missing_snapshot_is_404() {
        let (_dir, state) = state();
        let req = HttpRequest::new("POST", "/x").with_json(&json!({"expected_output": 1}));
        let err = set_expected_output(&state, &req, &uuid::Uuid::new_v4().to_string()).unwrap_err();
        assert_eq!(err.status(), 404);
    }

    #[test]
    fn test_set_expected_requires_field() {
        let (_dir, state) = state();
        let id = manual(&state, json!({}));
        let req = HttpRequest::new("POST", "/x").with_json(&json!({"other": 1}));
        let err = set_expected_output(&state, &req, &id).unwrap_err();
        assert_eq!(err.kind(), "MissingField");
    }

    #[test]
    fn test_tag_merges_and_is_idempotent() {
        let (_dir, state) = state();
        let id = manual(&state, json!({"tags": ["a"]}));
        let req = HttpRequest::new("POST", "/x").with_json(&json!({"tags": ["b", "a"]}));
        let first = tag_snapshot(&state, &req, &id).unwrap().body_json().unwrap();
        let second = tag_snapshot(&state, &req, &id).unwrap().body_json().unwrap();
        assert_eq!(first["tags"], json!(["a", "b"]));
        assert_eq!(first["tags"], second["tags"]);
    }

    #[test]
    fn test_export_is_stored_bytes() {
        let (_dir, state) = state();
        let id = manual(&state, json!({"json": {"k": 1}}));
        let resp = export_snapshot(&state, &id).unwrap();
        assert_eq!(resp.body, state.store.load_raw(&id).unwrap());
        assert_eq!(
            resp.header("Content-Disposition"),
            Some(format!("attachment; filename={id}.json").as_str())
        );
    }

    #[test]
    fn test_debug_errors_attaches_tips() {
        let (_dir, state) = state();
        state.logs.record_error("MissingField", "missing field `tags`", Value::Null, None);
        let body = debug_errors(&state).unwrap().body_json().unwrap();
        assert_eq!(body["total_errors"], 1);
        assert_eq!(body["errors"][0]["error_type"], "MissingField");
        assert!(body["errors"][0]["debug_tip"]
            .as_str()
            .unwrap()
            .contains("required fields"));
    }

    #[test]
    fn test_export_logs_filename() {
        let (_dir, state) = state();
        let resp = export_logs(&state).unwrap();
        let disposition = resp.header("Content-Disposition").unwrap();
        assert!(disposition.starts_with("attachment; filename=debug_logs_"));
        assert!(disposition.ends_with(".json"));
        let body = resp.body_json().unwrap();
        assert!(body["errors"].as_array().unwrap().is_empty());
        assert!(body.get("export_timestamp").is_some());
    }
}
