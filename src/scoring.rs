use crate::error::{Error, Result};
use crate::types::{Match, MatchSlot, RunStatus};

/// Aggregation of one contestant's two lane runs.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Aggregation {
  pub total_sec: Option<f64>,
  pub complete: bool,
}

/// Sum of both lane runs, valid only when both runs are recorded with
/// status `Valid` and a time present. Pure: recomputation from the same
/// runs always yields the same result.
pub fn aggregate(slot: &MatchSlot) -> Aggregation {
  let mut sum = 0.0;
  for run in &slot.runs {
    match run {
      Some(run) if run.status == RunStatus::Valid => match run.time_sec {
        Some(time) => sum += time,
        None => return Aggregation::default(),
      },
      _ => return Aggregation::default(),
    }
  }
  Aggregation {
    total_sec: Some(sum),
    complete: true,
  }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum WinnerDecision {
  /// Walkover: slot 1 is empty, slot 0 advances with zero runs.
  Bye(u32),
  Decided(u32),
  /// Equal totals. Left undecided for manual resolution, never auto-broken.
  Tie,
  /// At least one side has not completed both runs yet.
  Pending,
}

/// Decide a match from both slots' aggregation and the BYE flag. A match is
/// only decidable when both contestants are complete — one side finishing
/// first never awards a provisional win.
pub fn resolve_winner(m: &Match) -> WinnerDecision {
  let Some(a_id) = m.slots[0].contestant_id else {
    return WinnerDecision::Pending;
  };
  let Some(b_id) = m.slots[1].contestant_id else {
    return WinnerDecision::Bye(a_id);
  };
  let a = aggregate(&m.slots[0]);
  let b = aggregate(&m.slots[1]);
  let (Some(a_total), Some(b_total)) = (a.total_sec, b.total_sec) else {
    return WinnerDecision::Pending;
  };
  if a_total < b_total {
    WinnerDecision::Decided(a_id)
  } else if b_total < a_total {
    WinnerDecision::Decided(b_id)
  } else {
    WinnerDecision::Tie
  }
}

/// Reject malformed run times before any mutation happens.
pub fn validate_run_time(time_sec: Option<f64>) -> Result<()> {
  if let Some(time) = time_sec {
    if !time.is_finite() {
      return Err(Error::Validation("Run time must be a finite number.".to_string()));
    }
    if time < 0.0 {
      return Err(Error::Validation("Run time must not be negative.".to_string()));
    }
  }
  Ok(())
}
