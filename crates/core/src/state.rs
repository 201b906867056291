//! Job lifecycle states.

use core::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lifecycle state of a job record.
///
/// Transitions are driven by callers through [`JobStore::update`]; the store
/// persists whatever state it is handed and does not reject writes out of a
/// terminal state. Enforcing the lifecycle is the caller's responsibility.
///
/// [`JobStore::update`]: crate::store::JobStore::update
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    /// Enqueued, waiting to be claimed.
    Waiting,
    /// Claimed by a worker.
    Working,
    /// Finished successfully. Terminal.
    Succeeded,
    /// Finished with an error, or reclaimed by the recovery sweep. Terminal.
    Failed,
}

impl JobState {
    /// Stable text form used in the `state` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Waiting => "waiting",
            JobState::Working => "working",
            JobState::Succeeded => "succeeded",
            JobState::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Succeeded | JobState::Failed)
    }
}

impl core::fmt::Display for JobState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The `state` column held text no variant matches.
#[derive(Debug, Clone, Error)]
#[error("unrecognized job state: {0:?}")]
pub struct ParseJobStateError(String);

impl FromStr for JobState {
    type Err = ParseJobStateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "waiting" => Ok(JobState::Waiting),
            "working" => Ok(JobState::Working),
            "succeeded" => Ok(JobState::Succeeded),
            "failed" => Ok(JobState::Failed),
            other => Err(ParseJobStateError(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_form_round_trips() {
        for state in [
            JobState::Waiting,
            JobState::Working,
            JobState::Succeeded,
            JobState::Failed,
        ] {
            assert_eq!(state.as_str().parse::<JobState>().unwrap(), state);
        }
    }

    #[test]
    fn only_finished_states_are_terminal() {
        assert!(!JobState::Waiting.is_terminal());
        assert!(!JobState::Working.is_terminal());
        assert!(JobState::Succeeded.is_terminal());
        assert!(JobState::Failed.is_terminal());
    }

    #[test]
    fn unknown_text_is_rejected() {
        assert!("paused".parse::<JobState>().is_err());
    }
}
