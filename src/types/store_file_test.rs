//! Tests for `StoreFile` and `StoreSummary`.

use serde_json::json;

use super::{LoopProgress, STORE_FORMAT_VERSION, StoreFile, StoreSummary};

#[test]
fn new_store_file_is_empty_and_versioned() {
  let f = StoreFile::new("/work/out");
  assert_eq!(f.version, STORE_FORMAT_VERSION);
  assert_eq!(f.run_key, "/work/out");
  assert!(f.entries.is_empty());
  assert_eq!(f.created_at, f.updated_at);
}

#[test]
fn entries_serialize_in_key_order() {
  let mut f = StoreFile::new("run");
  f.entries.insert("memo/zz".to_string(), json!(1));
  f.entries.insert("loop/models".to_string(), json!({"a": 1}));
  f.entries.insert("memo/aa".to_string(), json!(2));
  let json = serde_json::to_string(&f).unwrap();
  let loop_pos = json.find("loop/models").unwrap();
  let aa_pos = json.find("memo/aa").unwrap();
  let zz_pos = json.find("memo/zz").unwrap();
  assert!(loop_pos < aa_pos && aa_pos < zz_pos);
}

#[test]
fn summary_is_empty_only_without_entries_or_loops() {
  let mut s = StoreSummary {
    run_key: "run".to_string(),
    memo_entries: 0,
    loops: vec![],
  };
  assert!(s.is_empty());
  s.loops.push(LoopProgress {
    loop_id: "models".to_string(),
    last_completed_index: 0,
  });
  assert!(!s.is_empty());
}
