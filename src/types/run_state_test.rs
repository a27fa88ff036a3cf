//! Tests for `RunState`.

use super::RunState;

#[test]
fn display_lowercase() {
  assert_eq!(RunState::Fresh.to_string(), "fresh");
  assert_eq!(RunState::Resuming.to_string(), "resuming");
  assert_eq!(RunState::Completed.to_string(), "completed");
}

#[test]
fn legal_transitions() {
  assert_eq!(
    RunState::Fresh.transition(RunState::Resuming).unwrap(),
    RunState::Resuming
  );
  assert_eq!(
    RunState::Fresh.transition(RunState::Fresh).unwrap(),
    RunState::Fresh
  );
  assert_eq!(
    RunState::Resuming.transition(RunState::Completed).unwrap(),
    RunState::Completed
  );
  assert_eq!(
    RunState::Fresh.transition(RunState::Completed).unwrap(),
    RunState::Completed
  );
  assert_eq!(
    RunState::Completed.transition(RunState::Fresh).unwrap(),
    RunState::Fresh
  );
}

#[test]
fn illegal_transitions_are_rejected() {
  assert!(RunState::Completed.transition(RunState::Resuming).is_err());
  assert!(RunState::Resuming.transition(RunState::Fresh).is_err());
  assert!(RunState::Resuming.transition(RunState::Resuming).is_err());
  assert!(!RunState::Completed.can_transition_to(RunState::Completed));
}

#[test]
fn serde_lowercase() {
  let json = serde_json::to_string(&RunState::Resuming).unwrap();
  assert_eq!(json, "\"resuming\"");
  let back: RunState = serde_json::from_str(&json).unwrap();
  assert_eq!(back, RunState::Resuming);
}
