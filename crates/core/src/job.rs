//! The durable job record.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::id::JobId;
use crate::state::JobState;

/// Current time as nanoseconds since the Unix epoch.
///
/// Saturates at `i64::MAX` past the representable range (year 2262).
pub fn now_ns() -> i64 {
    Utc::now().timestamp_nanos_opt().unwrap_or(i64::MAX)
}

/// One unit of work, as persisted.
///
/// Timestamps are nanoseconds since the Unix epoch. `started` and
/// `completed` stay 0 until a caller sets them (the [`mark_*`] helpers do
/// this); `last_mod` is stamped by the store on every write and satisfies
/// `created <= last_mod`.
///
/// [`mark_*`]: Job::mark_working
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    /// Classifies the job type for consumers.
    pub topic: String,
    pub state: JobState,
    /// Ordered, opaque argument values. `None` (absent) is distinct from
    /// `Some(vec![])` (present but empty); both survive a store round-trip.
    pub args: Option<Vec<Value>>,
    /// Higher value is selected first. Only meaningful among Waiting jobs.
    pub priority: i64,
    /// Attempt counter. Persisted, never interpreted by the store.
    pub retry: i32,
    /// Attempt ceiling. Persisted, never enforced by the store.
    pub max_retry: i32,
    /// Groups related jobs. Not unique.
    pub correlation_id: Option<String>,
    pub created: i64,
    pub started: i64,
    pub completed: i64,
    pub last_mod: i64,
}

impl Job {
    /// Create a Waiting job with a fresh id, stamped with the current time.
    pub fn new(topic: impl Into<String>) -> Self {
        let now = now_ns();
        Self {
            id: JobId::new(),
            topic: topic.into(),
            state: JobState::Waiting,
            args: None,
            priority: 0,
            retry: 0,
            max_retry: 0,
            correlation_id: None,
            created: now,
            started: 0,
            completed: 0,
            last_mod: now,
        }
    }

    pub fn with_args(mut self, args: Vec<Value>) -> Self {
        self.args = Some(args);
        self
    }

    pub fn with_priority(mut self, priority: i64) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_max_retry(mut self, max_retry: i32) -> Self {
        self.max_retry = max_retry;
        self
    }

    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    /// Claim transition: the caller took ownership, stamping `started`.
    ///
    /// The change is local; persist it with [`JobStore::update`], or use
    /// [`JobStore::claim_next`] which performs the same transition as one
    /// conditional write.
    ///
    /// [`JobStore::update`]: crate::store::JobStore::update
    /// [`JobStore::claim_next`]: crate::store::JobStore::claim_next
    pub fn mark_working(&mut self) {
        self.state = JobState::Working;
        self.started = now_ns();
    }

    /// Terminal success, stamping `completed`.
    pub fn mark_succeeded(&mut self) {
        self.state = JobState::Succeeded;
        self.completed = now_ns();
    }

    /// Terminal failure, stamping `completed`.
    pub fn mark_failed(&mut self) {
        self.state = JobState::Failed;
        self.completed = now_ns();
    }
}
