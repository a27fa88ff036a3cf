//! The "resume previous run?" question asked when leftover state is found.

use std::io::{BufRead, Write};

use crate::error::{CheckpointError, Result};
use crate::types::StoreSummary;

/// Decides whether leftover checkpoint state should be resumed.
pub trait ResumePrompt: Send + Sync {
  fn confirm_resume(&self, summary: &StoreSummary) -> Result<bool>;
}

/// Always gives the same answer. For non-interactive runs and tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedAnswer(pub bool);

impl ResumePrompt for FixedAnswer {
  fn confirm_resume(&self, _summary: &StoreSummary) -> Result<bool> {
    Ok(self.0)
  }
}

/// Asks on the terminal. Empty input means no.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdinPrompt;

impl ResumePrompt for StdinPrompt {
  fn confirm_resume(&self, summary: &StoreSummary) -> Result<bool> {
    let stdin = std::io::stdin();
    let stdout = std::io::stdout();
    ask(stdin.lock(), stdout.lock(), summary)
  }
}

/// Writes the question for `summary` to `out` and reads one answer line from `input`.
pub(crate) fn ask(mut input: impl BufRead, mut out: impl Write, summary: &StoreSummary) -> Result<bool> {
  let write_err = |e: std::io::Error| CheckpointError::Prompt(format!("writing prompt: {e}"));
  writeln!(out, "\nFound checkpoint data from a previous run of {}:", summary.run_key).map_err(write_err)?;
  writeln!(out, "  cached steps: {}", summary.memo_entries).map_err(write_err)?;
  for lp in &summary.loops {
    writeln!(
      out,
      "  loop '{}': {} item(s) done",
      lp.loop_id,
      lp.items_done()
    )
    .map_err(write_err)?;
  }
  write!(out, "Resume previous run? [y/N]: ").map_err(write_err)?;
  out.flush().map_err(write_err)?;

  let mut line = String::new();
  input
    .read_line(&mut line)
    .map_err(|e| CheckpointError::Prompt(format!("reading answer: {e}")))?;
  parse_answer(&line)
}

/// `y`/`yes` resume, `n`/`no`/empty start fresh; anything else is rejected.
pub(crate) fn parse_answer(answer: &str) -> Result<bool> {
  match answer.trim().to_ascii_lowercase().as_str() {
    "y" | "yes" => Ok(true),
    "" | "n" | "no" => Ok(false),
    other => Err(CheckpointError::Prompt(format!("invalid answer '{other}'"))),
  }
}
