//! Process-local error and request logs.
//!
//! Both buffers grow without bound until [`LogBuffers::clear`] is called;
//! nothing here is persisted.  Insertion order is preserved.

use serde::Serialize;
use serde_json::Value;
use std::sync::{Mutex, MutexGuard};

use crate::model::{now_secs, DebugInfo, ErrorRecord, RequestRecord};

#[derive(Debug, Default)]
struct Buffers {
    errors: Vec<ErrorRecord>,
    requests: Vec<RequestRecord>,
}

/// The two log buffers behind one lock, so a snapshot sees a consistent pair
/// of counters.
#[derive(Debug, Default)]
pub struct LogBuffers {
    inner: Mutex<Buffers>,
}

/// Aggregate view served by `/debug/stats`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogStats {
    pub total_errors: usize,
    pub total_requests: usize,
    pub error_rate: f64,
    pub uptime: f64,
    pub most_common_errors: Vec<(String, usize)>,
    pub most_common_paths: Vec<(String, usize)>,
}

/// Everything in both buffers, for `/debug/export-logs`.
#[derive(Debug, Clone, Serialize)]
pub struct LogExport {
    pub errors: Vec<ErrorRecord>,
    pub requests: Vec<RequestRecord>,
    pub export_timestamp: f64,
}

impl LogBuffers {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Buffers> {
        // A panic while pushing cannot leave a Vec half-updated.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Append an error entry, capturing a backtrace of the recording site.
    pub fn record_error(
        &self,
        error_type: &str,
        message: &str,
        context: Value,
        request: Option<&RequestRecord>,
    ) -> ErrorRecord {
        let entry = ErrorRecord {
            timestamp: now_secs(),
            error_type: error_type.to_string(),
            error_message: message.to_string(),
            traceback: std::backtrace::Backtrace::capture().to_string(),
            context,
            request_path: request.map(|r| r.path.clone()),
            request_method: request.map(|r| r.method.clone()),
        };
        self.lock().errors.push(entry.clone());
        entry
    }

    pub fn record_request(&self, request: RequestRecord) -> RequestRecord {
        self.lock().requests.push(request.clone());
        request
    }

    /// The last `n` errors, oldest first.
    pub fn recent_errors(&self, n: usize) -> Vec<ErrorRecord> {
        tail(&self.lock().errors, n)
    }

    /// The last `n` requests, oldest first.
    pub fn recent_requests(&self, n: usize) -> Vec<RequestRecord> {
        tail(&self.lock().requests, n)
    }

    /// `(total_requests, total_errors)`.
    pub fn totals(&self) -> (usize, usize) {
        let guard = self.lock();
        (guard.requests.len(), guard.errors.len())
    }

    /// Seconds since the first recorded request, or zero if there is none.
    pub fn session_duration(&self) -> f64 {
        since_first(&self.lock().requests)
    }

    /// The last `error_tail` errors and the debug counters, read under one
    /// lock so both describe the same moment.
    pub fn capture(&self, error_tail: usize) -> (Vec<ErrorRecord>, DebugInfo) {
        let guard = self.lock();
        let session_duration = since_first(&guard.requests);
        let info = DebugInfo {
            total_requests: guard.requests.len(),
            total_errors: guard.errors.len(),
            session_duration,
        };
        (tail(&guard.errors, error_tail), info)
    }

    pub fn clear(&self) {
        let mut guard = self.lock();
        guard.errors.clear();
        guard.requests.clear();
    }

    pub fn stats(&self, top_n: usize) -> LogStats {
        let guard = self.lock();
        let total_errors = guard.errors.len();
        let total_requests = guard.requests.len();
        let uptime = since_first(&guard.requests);
        LogStats {
            total_errors,
            total_requests,
            error_rate: error_rate(total_errors, total_requests),
            uptime,
            most_common_errors: most_common(guard.errors.iter().map(|e| e.error_type.as_str()), top_n),
            most_common_paths: most_common(guard.requests.iter().map(|r| r.path.as_str()), top_n),
        }
    }

    pub fn export(&self) -> LogExport {
        let guard = self.lock();
        LogExport {
            errors: guard.errors.clone(),
            requests: guard.requests.clone(),
            export_timestamp: now_secs(),
        }
    }
}

fn since_first(requests: &[RequestRecord]) -> f64 {
    requests
        .first()
        .and_then(|r| r.timestamp)
        .map(|first| (now_secs() - first).max(0.0))
        .unwrap_or(0.0)
}

fn tail<T: Clone>(items: &[T], n: usize) -> Vec<T> {
    items[items.len().saturating_sub(n)..].to_vec()
}

/// Errors per hundred requests; the denominator is at least one.
pub fn error_rate(total_errors: usize, total_requests: usize) -> f64 {
    total_errors as f64 / total_requests.max(1) as f64 * 100.0
}

/// Count occurrences and return the `n` most frequent, count descending.
/// Ties keep first-seen order.
pub fn most_common<'a>(items: impl Iterator<Item = &'a str>, n: usize) -> Vec<(String, usize)> {
    let mut counts: Vec<(String, usize)> = Vec::new();
    for item in items {
        match counts.iter_mut().find(|(name, _)| name == item) {
            Some((_, count)) => *count += 1,
            None => counts.push((item.to_string(), 1)),
        }
    }
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts.truncate(n);
    counts
}

/// Heuristic hint attached to each entry served by `/debug/errors`.
pub fn debug_tip(error_type: &str) -> &'static str {
    if error_type.contains("MissingField") {
        "Check if all required fields are present in your request"
    } else if error_type.contains("InvalidType") {
        "Verify data types - check if you're passing the right types"
    } else if error_type.contains("MalformedRequest") {
        "Check the request body - it must be a well-formed JSON object"
    } else if error_type.contains("PayloadTooLarge") {
        "Reduce the request body size or raise max_body_bytes in the config"
    } else if error_type.contains("Io") {
        "Check that the storage directory exists and is writable"
    } else if error_type.contains("Serialization") {
        "A stored snapshot could not be read back - inspect the file in the storage directory"
    } else {
        "Review the traceback and check your code logic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::fixtures;
    use rstest::rstest;
    use serde_json::json;

    fn live_request(path: &str) -> RequestRecord {
        let mut req = fixtures::request(path, Value::Null);
        req.timestamp = Some(now_secs());
        req
    }

    #[test]
    fn test_new_buffers_are_empty() {
        let logs = LogBuffers::new();
        assert_eq!(logs.totals(), (0, 0));
        assert!(logs.recent_errors(10).is_empty());
        assert_eq!(logs.session_duration(), 0.0);
    }

    #[test]
    fn test_record_error_captures_request_origin() {
        let logs = LogBuffers::new();
        let req = live_request("/snapshot/manual");
        let entry = logs.record_error("MissingField", "missing field `tags`", json!({"status": 400}), Some(&req));
        assert_eq!(entry.error_type, "MissingField");
        assert_eq!(entry.request_path.as_deref(), Some("/snapshot/manual"));
        assert_eq!(entry.request_method.as_deref(), Some("POST"));
        assert_eq!(entry.context["status"], 400);
        assert_eq!(logs.totals(), (0, 1));
    }

    #[test]
    fn test_recent_returns_last_n_in_order() {
        let logs = LogBuffers::new();
        for i in 0..15 {
            logs.record_error(&format!("E{i}"), "x", Value::Null, None);
        }
        let recent = logs.recent_errors(10);
        assert_eq!(recent.len(), 10);
        assert_eq!(recent.first().unwrap().error_type, "E5");
        assert_eq!(recent.last().unwrap().error_type, "E14");
    }

    #[test]
    fn test_recent_with_fewer_entries_than_requested() {
        let logs = LogBuffers::new();
        logs.record_request(live_request("/a"));
        assert_eq!(logs.recent_requests(20).len(), 1);
    }

    #[test]
    fn test_capture_pairs_tail_with_counters() {
        let logs = LogBuffers::new();
        logs.record_request(fixtures::request("/a", json!({})));
        for kind in ["A", "B", "C"] {
            logs.record_error(kind, "m", Value::Null, None);
        }
        let (errors, info) = logs.capture(2);
        assert_eq!(info.total_requests, 1);
        assert_eq!(info.total_errors, 3);
        assert!(info.session_duration >= 0.0);
        let kinds: Vec<&str> = errors.iter().map(|e| e.error_type.as_str()).collect();
        assert_eq!(kinds, vec!["B", "C"]);
    }

    #[test]
    fn test_clear_resets_both() {
        let logs = LogBuffers::new();
        logs.record_request(live_request("/a"));
        logs.record_error("Io", "x", Value::Null, None);
        logs.clear();
        assert_eq!(logs.totals(), (0, 0));
        let stats = logs.stats(5);
        assert_eq!(stats.total_errors, 0);
        assert_eq!(stats.total_requests, 0);
        assert_eq!(stats.uptime, 0.0);
    }

    #[test]
    fn test_session_duration_from_first_request() {
        let logs = LogBuffers::new();
        let mut req = live_request("/a");
        req.timestamp = Some(now_secs() - 30.0);
        logs.record_request(req);
        logs.record_request(live_request("/b"));
        let d = logs.session_duration();
        assert!((29.0..60.0).contains(&d), "duration was {d}");
    }

    #[test]
    fn test_error_rate_guards_division() {
        assert_eq!(error_rate(0, 0), 0.0);
        assert_eq!(error_rate(3, 0), 300.0);
        assert_eq!(error_rate(1, 4), 25.0);
    }

    #[test]
    fn test_most_common_orders_by_count_then_first_seen() {
        let items = ["/b", "/a", "/a", "/c", "/b", "/a", "/d"];
        let top = most_common(items.into_iter(), 3);
        assert_eq!(
            top,
            vec![("/a".to_string(), 3), ("/b".to_string(), 2), ("/c".to_string(), 1)]
        );
    }

    #[test]
    fn test_stats_ranks_paths_and_errors() {
        let logs = LogBuffers::new();
        for path in ["/x", "/y", "/x"] {
            logs.record_request(live_request(path));
        }
        logs.record_error("InvalidType", "m", Value::Null, None);
        logs.record_error("InvalidType", "m", Value::Null, None);
        logs.record_error("Io", "m", Value::Null, None);
        let stats = logs.stats(5);
        assert_eq!(stats.most_common_paths[0], ("/x".to_string(), 2));
        assert_eq!(stats.most_common_errors[0], ("InvalidType".to_string(), 2));
        assert!((stats.error_rate - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_export_contains_everything() {
        let logs = LogBuffers::new();
        logs.record_request(live_request("/a"));
        logs.record_error("Io", "x", Value::Null, None);
        let export = logs.export();
        assert_eq!(export.errors.len(), 1);
        assert_eq!(export.requests.len(), 1);
        assert!(export.export_timestamp > 0.0);
    }

    #[rstest]
    #[case("MissingField", "required fields")]
    #[case("InvalidType", "data types")]
    #[case("MalformedRequest", "well-formed JSON")]
    #[case("PayloadTooLarge", "max_body_bytes")]
    #[case("Io", "storage directory")]
    #[case("Serialization", "could not be read back")]
    #[case("SomethingElse", "Review the traceback")]
    fn test_debug_tip(#[case] kind: &str, #[case] needle: &str) {
        assert!(debug_tip(kind).contains(needle));
    }
}
