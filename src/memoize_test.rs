//! Tests for `Memoizer`.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde_json::json;

use crate::error::CheckpointError;
use crate::fingerprint::Fingerprint;
use crate::memoize::Memoizer;
use crate::store::{CheckpointStore, InMemoryStore, memo_key};

#[derive(Debug, thiserror::Error)]
enum StepError {
  #[error(transparent)]
  Checkpoint(#[from] CheckpointError),
  #[error("model call failed: {0}")]
  Remote(String),
}

fn memoizer(store: &InMemoryStore) -> Memoizer {
  Memoizer::new(Arc::new(store.clone()))
}

#[tokio::test]
async fn second_call_returns_stored_value_without_running_body() {
  let store = InMemoryStore::new();
  let memo = memoizer(&store);
  let calls = AtomicUsize::new(0);
  let fp = Fingerprint::from_raw("fetch_spec");

  let first: String = memo
    .memoize(&fp, || async {
      calls.fetch_add(1, Ordering::SeqCst);
      Ok::<_, StepError>("spec-v1".to_string())
    })
    .await
    .unwrap();
  let second: String = memo
    .memoize(&fp, || async {
      calls.fetch_add(1, Ordering::SeqCst);
      Ok::<_, StepError>("spec-v2".to_string())
    })
    .await
    .unwrap();

  assert_eq!(first, "spec-v1");
  assert_eq!(second, first);
  assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn result_survives_a_restart() {
  let store = InMemoryStore::new();
  let fp = Fingerprint::of("generate_model", &"/pets").unwrap();
  {
    let memo = memoizer(&store);
    let _: Vec<String> = memo
      .memoize(&fp, || async {
        Ok::<_, StepError>(vec!["pet.model.ts".to_string()])
      })
      .await
      .unwrap();
  }

  let calls = AtomicUsize::new(0);
  let memo = memoizer(&store);
  let files: Vec<String> = memo
    .memoize(&fp, || async {
      calls.fetch_add(1, Ordering::SeqCst);
      Ok::<_, StepError>(vec![])
    })
    .await
    .unwrap();
  assert_eq!(files, vec!["pet.model.ts"]);
  assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn failure_stores_nothing_and_is_retried() {
  let store = InMemoryStore::new();
  let memo = memoizer(&store);
  let calls = AtomicUsize::new(0);
  let fp = Fingerprint::from_raw("flaky");

  let err = memo
    .memoize(&fp, || async {
      calls.fetch_add(1, Ordering::SeqCst);
      Err::<u32, _>(StepError::Remote("rate limited".to_string()))
    })
    .await
    .unwrap_err();
  assert!(matches!(err, StepError::Remote(ref m) if m == "rate limited"));
  assert!(!store.exists_any().await.unwrap());

  let v = memo
    .memoize(&fp, || async {
      calls.fetch_add(1, Ordering::SeqCst);
      Ok::<u32, StepError>(7)
    })
    .await
    .unwrap();
  assert_eq!(v, 7);
  assert_eq!(calls.load(Ordering::SeqCst), 2);
  assert_eq!(store.get(&memo_key(&fp)).await.unwrap(), Some(json!(7)));
}

#[tokio::test]
async fn call_derives_fingerprint_from_step_and_args() {
  let store = InMemoryStore::new();
  let memo = memoizer(&store);
  let calls = AtomicUsize::new(0);

  for path in ["/a", "/b", "/a"] {
    let model: String = memo
      .call("generate_model", path.to_string(), |p| {
        let calls = &calls;
        async move {
          calls.fetch_add(1, Ordering::SeqCst);
          Ok::<_, StepError>(format!("model for {p}"))
        }
      })
      .await
      .unwrap();
    assert_eq!(model, format!("model for {path}"));
  }
  assert_eq!(calls.load(Ordering::SeqCst), 2);
  let expected = Fingerprint::of("generate_model", &"/a").unwrap();
  assert!(store.get(&memo_key(&expected)).await.unwrap().is_some());
}

#[tokio::test]
async fn stored_value_of_wrong_shape_is_a_usage_error() {
  let store = InMemoryStore::new();
  let fp = Fingerprint::from_raw("collide");
  store.set(&memo_key(&fp), json!("a string")).await.unwrap();

  let memo = memoizer(&store);
  let calls = AtomicUsize::new(0);
  let err = memo
    .memoize(&fp, || async {
      calls.fetch_add(1, Ordering::SeqCst);
      Ok::<Vec<u32>, StepError>(vec![1])
    })
    .await
    .unwrap_err();
  match err {
    StepError::Checkpoint(e) => assert!(e.is_usage_error()),
    other => panic!("expected checkpoint error, got {other:?}"),
  }
  assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn store_write_failure_is_fatal_and_distinct() {
  let store = InMemoryStore::new();
  store.set_fail_writes(true);
  let memo = memoizer(&store);
  let err = memo
    .memoize(&Fingerprint::from_raw("x"), || async {
      Ok::<u32, StepError>(1)
    })
    .await
    .unwrap_err();
  match err {
    StepError::Checkpoint(e) => assert!(e.is_storage_error()),
    other => panic!("expected storage error, got {other:?}"),
  }
}

#[tokio::test]
async fn concurrent_callers_run_the_body_once() {
  let store = InMemoryStore::new();
  let memo = memoizer(&store);
  let calls = AtomicUsize::new(0);
  let fp = Fingerprint::from_raw("generate_all");

  let tasks = (0..8).map(|_| {
    memo.memoize(&fp, || async {
      calls.fetch_add(1, Ordering::SeqCst);
      tokio::time::sleep(std::time::Duration::from_millis(20)).await;
      Ok::<String, StepError>("done".to_string())
    })
  });
  let results = futures::future::join_all(tasks).await;

  assert!(results.iter().all(|r| r.as_deref().ok() == Some("done")));
  assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn different_fingerprints_do_not_block_each_other() {
  let store = InMemoryStore::new();
  let memo = memoizer(&store);
  let a = Fingerprint::from_raw("a");
  let b = Fingerprint::from_raw("b");
  let (ra, rb) = tokio::join!(
    memo.memoize(&a, || async { Ok::<u8, StepError>(1) }),
    memo.memoize(&b, || async { Ok::<u8, StepError>(2) }),
  );
  assert_eq!(ra.unwrap(), 1);
  assert_eq!(rb.unwrap(), 2);
  assert_eq!(store.len().await, 2);
}
