//! Fixed-shape replay.
//!
//! Rebuilds `{amount, user_id, status: "replayed"}` from the stored JSON body
//! and compares it with the expected output.  No business logic is
//! re-executed and no field is validated.

use serde::Serialize;
use serde_json::{json, Value};

use crate::model::Snapshot;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReplayOutcome {
    pub replayed_state: Value,
    pub expected_output: Option<Value>,
    /// Structural equality of `replayed_state` and `expected_output`, see
    /// [`values_match`].
    #[serde(rename = "match")]
    pub matched: bool,
}

/// `{amount, user_id, status}` taken verbatim from a request body.
pub fn replayed_state(body: &Value) -> Value {
    json!({
        "amount": body.get("amount").cloned().unwrap_or(Value::Null),
        "user_id": body.get("user_id").cloned().unwrap_or(Value::Null),
        "status": "replayed",
    })
}

/// Structural equality where numbers compare by value, so `100` and `100.0`
/// are equal.
pub fn values_match(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            if x.is_f64() || y.is_f64() {
                x.as_f64() == y.as_f64()
            } else {
                x == y
            }
        }
        (Value::Array(xs), Value::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| values_match(x, y))
        }
        (Value::Object(xs), Value::Object(ys)) => {
            xs.len() == ys.len()
                && xs
                    .iter()
                    .all(|(k, x)| ys.get(k).is_some_and(|y| values_match(x, y)))
        }
        _ => a == b,
    }
}

pub fn replay(snapshot: &Snapshot) -> ReplayOutcome {
    let replayed_state = replayed_state(&snapshot.request.json);
    let matched = snapshot
        .expected_output
        .as_ref()
        .is_some_and(|expected| values_match(expected, &replayed_state));
    ReplayOutcome {
        replayed_state,
        expected_output: snapshot.expected_output.clone(),
        matched,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::fixtures;
    use proptest::prelude::*;

    #[test]
    fn test_payment_replay_matches() {
        let mut snap = fixtures::snapshot("a", json!({"amount": 99.99, "user_id": "u1", "currency": "USD"}));
        snap.expected_output = Some(json!({"amount": 99.99, "user_id": "u1", "status": "replayed"}));
        let outcome = replay(&snap);
        assert!(outcome.matched);
        assert_eq!(outcome.replayed_state["status"], "replayed");
    }

    #[test]
    fn test_invalid_amount_is_echoed_not_validated() {
        let mut snap = fixtures::snapshot("a", json!({"amount": "bad", "user_id": null}));
        snap.expected_output = Some(json!({"error": "Invalid amount format", "status": "error", "code": 400}));
        let outcome = replay(&snap);
        assert!(!outcome.matched);
        assert_eq!(
            outcome.replayed_state,
            json!({"amount": "bad", "user_id": null, "status": "replayed"})
        );
    }

    #[test]
    fn test_integer_amount_matches_float_expected() {
        let mut snap = fixtures::snapshot("a", json!({"amount": 100, "user_id": "u1"}));
        snap.expected_output = Some(json!({"amount": 100.0, "user_id": "u1", "status": "replayed"}));
        assert!(replay(&snap).matched);

        snap.expected_output = Some(json!({"amount": 100.5, "user_id": "u1", "status": "replayed"}));
        assert!(!replay(&snap).matched);
    }

    #[test]
    fn test_values_match_recurses_by_value() {
        assert!(values_match(&json!([1, {"x": 2.0}]), &json!([1.0, {"x": 2}])));
        assert!(!values_match(&json!([1, 2]), &json!([1, 2, 3])));
        assert!(!values_match(&json!({"x": 1}), &json!({"y": 1})));
        assert!(!values_match(&json!({"x": 1}), &json!({"x": "1"})));
        assert!(!values_match(&json!(-1), &json!(1)));
    }

    #[test]
    fn test_unset_expected_never_matches() {
        let snap = fixtures::snapshot("a", json!({"amount": 1, "user_id": "u"}));
        let outcome = replay(&snap);
        assert!(!outcome.matched);
        assert!(outcome.expected_output.is_none());
    }

    #[test]
    fn test_non_object_body_yields_nulls() {
        for body in [Value::Null, json!([1, 2]), json!("text")] {
            assert_eq!(
                replayed_state(&body),
                json!({"amount": null, "user_id": null, "status": "replayed"})
            );
        }
    }

    #[test]
    fn test_outcome_serializes_match_key() {
        let snap = fixtures::snapshot("a", json!({}));
        let v = serde_json::to_value(replay(&snap)).unwrap();
        assert_eq!(v["match"], false);
        assert!(v.get("matched").is_none());
    }

    proptest! {
        #[test]
        fn prop_match_iff_expected_equals_fixed_shape(
            amount in proptest::option::of(-1.0e6f64..1.0e6),
            user in proptest::option::of("[a-z0-9]{1,8}"),
            tamper in any::<bool>(),
        ) {
            let body = json!({"amount": amount, "user_id": user});
            let mut expected = json!({"amount": amount, "user_id": user, "status": "replayed"});
            if tamper {
                expected["status"] = json!("error");
            }
            let mut snap = fixtures::snapshot("p", body);
            snap.expected_output = Some(expected);
            prop_assert_eq!(replay(&snap).matched, !tamper);
        }
    }
}
