//! Coordinate-level transition rules
//!
//! Given the current coordinate, how the engine arrived there, and the retry
//! wrapper's verdict, decide where to go next. The remote corpus has no known
//! extent, so boundaries are found by probing page 1 of the next unit:
//!
//! | Outcome | Where | Next |
//! |---------|-------|------|
//! | success | anywhere | `(v, s, p+1)` |
//! | not found | `(1, 1, 1)` | stop: book complete |
//! | not found | `p > 1` or `s > 1`, no probe pending | `(v, s+1, 1)` |
//! | not found | `(v, 1, 1)`, `v > 1`, no probe pending | `(v+1, 1, 1)` |
//! | not found | page 1 of a probed section | `(v+1, 1, 1)` |
//! | not found | page 1 of a probed volume | stop: book complete |
//! | quota exhausted | anywhere | stop, checkpoint untouched |
//! | retries exhausted | anywhere | `(v, s+1, 1)`, recorded as a gap |
//!
//! Known limitation: an empty section 1 inside a volume that was reached by a
//! volume probe reads as the end of the book.

use crate::crawler::retry::{AttemptFailure, RetryOutcome};
use crate::state::{Coordinate, StopReason};

/// How the engine arrived at the current coordinate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BoundaryProbe {
    /// Start, resume, after a stored page, or after a forced skip
    #[default]
    None,

    /// First page of a section entered because the previous one ran out
    NextSection,

    /// First page of a volume entered because the previous one ran out
    NextVolume,
}

/// Decision for one iteration of the traversal engine
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// Store the payload at the current coordinate, then checkpoint `next`
    Store { next: Coordinate },

    /// Checkpoint `next` after observing a boundary
    Cross { next: Coordinate, probe: BoundaryProbe },

    /// Checkpoint `next`, giving up on the rest of the current section
    Skip {
        next: Coordinate,
        attempts: u32,
        failure: AttemptFailure,
    },

    /// Stop without touching the checkpoint
    Stop(StopReason),
}

/// Computes the next step for `current`
pub fn next_step(current: Coordinate, probe: BoundaryProbe, outcome: &RetryOutcome) -> Step {
    match outcome {
        RetryOutcome::Success(_) => Step::Store {
            next: current.next_page(),
        },
        RetryOutcome::QuotaExhausted => Step::Stop(StopReason::QuotaExhausted),
        RetryOutcome::ExhaustedRetries {
            attempts,
            last_failure,
        } => Step::Skip {
            next: current.next_section(),
            attempts: *attempts,
            failure: last_failure.clone(),
        },
        RetryOutcome::NotFound(_) => on_not_found(current, probe),
    }
}

fn on_not_found(current: Coordinate, probe: BoundaryProbe) -> Step {
    if current.is_start() {
        return Step::Stop(StopReason::BookComplete);
    }

    if current.page > 1 {
        return Step::Cross {
            next: current.next_section(),
            probe: BoundaryProbe::NextSection,
        };
    }

    match probe {
        BoundaryProbe::NextVolume => Step::Stop(StopReason::BookComplete),
        BoundaryProbe::NextSection => Step::Cross {
            next: current.next_volume(),
            probe: BoundaryProbe::NextVolume,
        },
        BoundaryProbe::None if current.section == 1 => Step::Cross {
            next: current.next_volume(),
            probe: BoundaryProbe::NextVolume,
        },
        BoundaryProbe::None => Step::Cross {
            next: current.next_section(),
            probe: BoundaryProbe::NextSection,
        },
    }
}
