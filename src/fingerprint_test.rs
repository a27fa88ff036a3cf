//! Tests for `Fingerprint`.

use std::collections::HashMap;

use serde::Serialize;
use serde_json::json;

use crate::fingerprint::{Fingerprint, canonical_json};

#[derive(Serialize)]
struct EndpointArgs<'a> {
  path: &'a str,
  verb: &'a str,
}

#[derive(Serialize)]
struct EndpointArgsSwapped<'a> {
  verb: &'a str,
  path: &'a str,
}

#[test]
fn same_step_and_args_give_same_fingerprint() {
  let a = Fingerprint::of("generate_model", &"/pets").unwrap();
  let b = Fingerprint::of("generate_model", &"/pets").unwrap();
  assert_eq!(a, b);
  assert_eq!(a.as_str().len(), 64);
  assert!(a.as_str().chars().all(|c| c.is_ascii_hexdigit()));
}

#[test]
fn different_args_or_step_give_different_fingerprints() {
  let a = Fingerprint::of("generate_model", &"/pets").unwrap();
  let b = Fingerprint::of("generate_model", &"/users").unwrap();
  let c = Fingerprint::of("generate_tests", &"/pets").unwrap();
  assert_ne!(a, b);
  assert_ne!(a, c);
}

#[test]
fn field_order_does_not_matter() {
  let a = Fingerprint::of(
    "generate_tests",
    &EndpointArgs {
      path: "/pets",
      verb: "get",
    },
  )
  .unwrap();
  let b = Fingerprint::of(
    "generate_tests",
    &EndpointArgsSwapped {
      verb: "get",
      path: "/pets",
    },
  )
  .unwrap();
  assert_eq!(a, b);
}

#[test]
fn map_insertion_order_does_not_matter() {
  let mut first = HashMap::new();
  first.insert("b", 2);
  first.insert("a", 1);
  first.insert("c", 3);
  let mut second = HashMap::new();
  second.insert("c", 3);
  second.insert("a", 1);
  second.insert("b", 2);
  assert_eq!(
    Fingerprint::of("step", &first).unwrap(),
    Fingerprint::of("step", &second).unwrap()
  );
}

#[test]
fn canonical_json_sorts_nested_keys() {
  let v = json!({"z": {"b": 1, "a": [ {"y": 1, "x": 2} ]}, "a": null});
  assert_eq!(
    canonical_json(&v).unwrap(),
    r#"{"a":null,"z":{"a":[{"x":2,"y":1}],"b":1}}"#
  );
}

#[test]
fn raw_fingerprint_is_used_verbatim() {
  let fp = Fingerprint::from_raw("fetch_spec");
  assert_eq!(fp.to_string(), "fetch_spec");
}
