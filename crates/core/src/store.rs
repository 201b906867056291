//! The store contract shared by every backend.

use async_trait::async_trait;

use crate::error::StoreError;
use crate::id::JobId;
use crate::job::Job;
use crate::state::JobState;

/// Filtered, paginated listing request.
#[derive(Debug, Clone, Copy, Default)]
pub struct ListRequest {
    /// Restrict to one lifecycle state; `None` matches every state.
    pub state: Option<JobState>,
    /// Records to skip before the page starts.
    pub offset: u64,
    /// Page size. A zero limit yields an empty page; the total is still
    /// populated.
    pub limit: u64,
}

impl ListRequest {
    pub fn with_state(state: JobState) -> Self {
        Self {
            state: Some(state),
            ..Self::default()
        }
    }

    pub fn page(mut self, offset: u64, limit: u64) -> Self {
        self.offset = offset;
        self.limit = limit;
        self
    }
}

/// One page of records plus the filter-wide total.
#[derive(Debug, Clone, Default)]
pub struct ListResponse {
    /// Count of records matching the filter, independent of the page
    /// window, so callers can compute page counts.
    pub total: u64,
    /// The requested page, ordered by `last_mod` descending.
    pub jobs: Vec<Job>,
}

/// Per-state job counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct Stats {
    pub waiting: u64,
    pub working: u64,
    pub succeeded: u64,
    pub failed: u64,
}

/// Durable job storage.
///
/// Every method resolves only once the backend round-trip completes; nothing
/// is cached, streamed, or deferred. All methods may be called concurrently
/// from any number of tasks or processes; the backend's own transactional
/// isolation plus [`claim_next`](JobStore::claim_next) are the only
/// coordination the store provides. Callers needing timeouts wrap the calls
/// themselves.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Insert a new record, stamping `last_mod = created` on the stored row.
    ///
    /// Fails with [`StoreError::Conflict`] if the id already exists and
    /// [`StoreError::Encoding`] if the arguments cannot be serialized.
    async fn create(&self, job: &Job) -> Result<(), StoreError>;

    /// Overwrite the full record matching `job.id`, including its state,
    /// stamping `last_mod` with the current time.
    ///
    /// Any state change is accepted, including out of a terminal state; the
    /// lifecycle is enforced by callers, not here. Fails with
    /// [`StoreError::NotFound`] if the id does not exist.
    async fn update(&self, job: &Job) -> Result<(), StoreError>;

    /// Remove the record by id.
    ///
    /// Deleting an absent id fails with [`StoreError::NotFound`], matching
    /// lookup semantics.
    async fn delete(&self, id: JobId) -> Result<(), StoreError>;

    /// Return the full record for `id`, or [`StoreError::NotFound`].
    async fn lookup(&self, id: JobId) -> Result<Job, StoreError>;

    /// Read-only peek at the job [`claim_next`](JobStore::claim_next) would
    /// take: the Waiting job with the highest priority, ties broken by
    /// earliest `created`, then id.
    ///
    /// Nothing is mutated. Two callers peeking concurrently can observe the
    /// same job and race each other's follow-up [`update`](JobStore::update);
    /// use [`claim_next`](JobStore::claim_next) when more than one consumer
    /// is claiming. Fails with [`StoreError::NotFound`] if no Waiting job
    /// exists.
    async fn next(&self) -> Result<Job, StoreError>;

    /// Atomically claim the next job: one conditional write that selects the
    /// same row [`next`](JobStore::next) would and transitions it
    /// Waiting → Working, stamping `started` and `last_mod`.
    ///
    /// At most one caller ever transitions a given job out of Waiting.
    /// Returns `Ok(None)` when nothing is claimable.
    async fn claim_next(&self) -> Result<Option<Job>, StoreError>;

    /// Filtered, paginated listing ordered by `last_mod` descending.
    async fn list(&self, request: &ListRequest) -> Result<ListResponse, StoreError>;

    /// Per-state counts as of the query instant.
    ///
    /// Each count is an independent query; under concurrent writes the four
    /// numbers are not guaranteed to be mutually consistent.
    async fn stats(&self) -> Result<Stats, StoreError>;

    /// Startup recovery sweep: mark every Working job Failed, stamping
    /// `completed` and `last_mod`, and return the number swept.
    ///
    /// A process that died mid-execution leaves its jobs stranded in
    /// Working; the sweep reclaims them so retry logic upstream can act.
    ///
    /// Precondition: exactly one manager process runs this, once, before any
    /// worker starts claiming. Two instances sweeping concurrently, or one
    /// sweeping while another's workers hold jobs, will mark genuinely
    /// in-flight jobs Failed. This is a deployment contract, not something
    /// the store detects.
    async fn recover(&self) -> Result<u64, StoreError>;
}
