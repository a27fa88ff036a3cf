//! Tests for `IterationRecord`.

use chrono::Utc;
use serde_json::json;

use super::IterationRecord;

fn record(index: usize) -> IterationRecord {
  IterationRecord {
    loop_id: "models".to_string(),
    last_completed_index: index,
    accumulator_type: "alloc::vec::Vec<alloc::string::String>".to_string(),
    accumulator: json!(["/a", "/b"]),
    updated_at: Utc::now(),
  }
}

#[test]
fn next_index_follows_last_completed() {
  assert_eq!(record(0).next_index(), Some(1));
  assert_eq!(record(4).next_index(), Some(5));
}

#[test]
fn next_index_of_max_index_is_none() {
  assert_eq!(record(usize::MAX).next_index(), None);
}

#[test]
fn serializes_with_rfc3339_timestamp() {
  let r = record(1);
  let parsed: serde_json::Value = serde_json::to_value(&r).unwrap();
  assert_eq!(parsed["loop_id"], "models");
  assert_eq!(parsed["last_completed_index"], 1);
  assert_eq!(parsed["accumulator"], json!(["/a", "/b"]));
  let ts = parsed["updated_at"].as_str().unwrap();
  assert!(chrono::DateTime::parse_from_rfc3339(ts).is_ok());
}
