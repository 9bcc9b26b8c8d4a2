#![cfg(all(feature = "control", feature = "serde"))]

//! Integration tests for serde support in fplite.

use fplite::control::{FailureCause, PanicError, ResultValue};
use rstest::rstest;

#[rstest]
fn test_success_json_roundtrip() {
    let success = ResultValue::success(vec![1, 2, 3]);
    let json = serde_json::to_string(&success).unwrap();
    assert_eq!(json, r#"{"Success":[1,2,3]}"#);

    let restored: ResultValue<Vec<i32>> = serde_json::from_str(&json).unwrap();
    assert_eq!(restored, success);
}

#[rstest]
fn test_absent_json_roundtrip() {
    let absent: ResultValue<i32> = ResultValue::absent();
    let json = serde_json::to_string(&absent).unwrap();
    assert_eq!(json, r#"{"Failure":"Absent"}"#);

    let restored: ResultValue<i32> = serde_json::from_str(&json).unwrap();
    assert_eq!(restored.cause(), Some(&FailureCause::Absent));
}

#[rstest]
fn test_message_json_roundtrip() {
    let failure: ResultValue<i32> = ResultValue::failure("quota exceeded");
    let json = serde_json::to_string(&failure).unwrap();
    assert_eq!(json, r#"{"Failure":{"Message":"quota exceeded"}}"#);

    let restored: ResultValue<i32> = serde_json::from_str(&json).unwrap();
    assert_eq!(restored, failure);
}

#[rstest]
fn test_wrapped_error_serializes_as_message() {
    let failure: ResultValue<i32> = ResultValue::failure_from(PanicError::new("boom"));
    let json = serde_json::to_string(&failure).unwrap();
    assert_eq!(json, r#"{"Failure":{"Message":"panicked: boom"}}"#);

    let restored: ResultValue<i32> = serde_json::from_str(&json).unwrap();
    assert_eq!(restored.cause(), Some(&FailureCause::message("panicked: boom")));
}
