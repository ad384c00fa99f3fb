//! Generates a standalone Rust integration test from a snapshot.
//!
//! The generated file POSTs the stored JSON body to the stored path on a
//! running instance and asserts that the response's `replayed_state` equals
//! the stored expected output.  JSON literals are embedded as raw strings and
//! parsed at test time, so any JSON value survives templating unchanged.

use serde_json::Value;

use crate::model::Snapshot;

pub fn file_name(id: &str) -> String {
    format!("test_snapshot_{id}.rs")
}

/// Wrap `text` in a raw string literal with enough `#`s that it cannot
/// terminate early.
fn raw_literal(text: &str) -> String {
    let mut hashes = 1;
    while text.contains(&format!("\"{}", "#".repeat(hashes))) {
        hashes += 1;
    }
    let fence = "#".repeat(hashes);
    format!("r{fence}\"{text}\"{fence}")
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| "null".to_string())
}

pub fn generate(snapshot: &Snapshot, base_url: &str) -> String {
    let url = format!("{}{}", base_url.trim_end_matches('/'), snapshot.request.path);
    let payload = pretty(&snapshot.request.json);
    let expected = match &snapshot.expected_output {
        Some(v) => pretty(v),
        None => "{}".to_string(),
    };
    let fn_suffix: String = snapshot
        .id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();

    format!(
        r#"//! Generated from snapshot {id} ("{label}").
//!
//! Requires a running instance at {url}.

#[tokio::test]
async fn test_snapshot_replay_{fn_suffix}() {{
    let url = {url_lit};
    let payload: serde_json::Value = serde_json::from_str({payload_lit}).unwrap();

    let response = reqwest::Client::new()
        .post(url)
        .header("Content-Type", "application/json")
        .json(&payload)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);

    let expected: serde_json::Value = serde_json::from_str({expected_lit}).unwrap();
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body.get("replayed_state"), Some(&expected));
}}
"#,
        id = snapshot.id,
        label = snapshot.label.replace(['\n', '\r'], " "),
        url = url,
        fn_suffix = fn_suffix,
        url_lit = raw_literal(&url),
        payload_lit = raw_literal(&payload),
        expected_lit = raw_literal(&expected),
    )
}
