//! In-memory job store.
//!
//! Intended for tests and development; a single `RwLock` around the record
//! map stands in for the database's transactional isolation. Durable
//! deployments use a database-backed implementation with the same contract.

use std::cmp::Reverse;
use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use tracing::debug;

use crate::args;
use crate::error::StoreError;
use crate::id::JobId;
use crate::job::{Job, now_ns};
use crate::state::JobState;
use crate::store::{JobStore, ListRequest, ListResponse, Stats};

/// In-memory [`JobStore`] backed by a `RwLock<HashMap>`.
#[derive(Debug, Default)]
pub struct InMemoryJobStore {
    jobs: RwLock<HashMap<JobId, Job>>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The Waiting job `next`/`claim_next` would take: highest priority,
    /// ties broken by earliest `created`, then id.
    fn select_candidate(jobs: &HashMap<JobId, Job>) -> Option<JobId> {
        jobs.values()
            .filter(|j| j.state == JobState::Waiting)
            .min_by_key(|j| (Reverse(j.priority), j.created, j.id))
            .map(|j| j.id)
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn create(&self, job: &Job) -> Result<(), StoreError> {
        // Run args through the codec so encoding failures surface here,
        // exactly as a durable backend would report them.
        args::encode(job.args.as_deref())?;

        let mut jobs = self.jobs.write().unwrap();
        if jobs.contains_key(&job.id) {
            return Err(StoreError::Conflict(job.id));
        }
        let mut stored = job.clone();
        stored.last_mod = stored.created;
        jobs.insert(stored.id, stored);
        Ok(())
    }

    async fn update(&self, job: &Job) -> Result<(), StoreError> {
        args::encode(job.args.as_deref())?;

        let mut jobs = self.jobs.write().unwrap();
        if !jobs.contains_key(&job.id) {
            return Err(StoreError::NotFound);
        }
        let mut stored = job.clone();
        stored.last_mod = now_ns();
        jobs.insert(stored.id, stored);
        Ok(())
    }

    async fn delete(&self, id: JobId) -> Result<(), StoreError> {
        let mut jobs = self.jobs.write().unwrap();
        jobs.remove(&id).map(|_| ()).ok_or(StoreError::NotFound)
    }

    async fn lookup(&self, id: JobId) -> Result<Job, StoreError> {
        let jobs = self.jobs.read().unwrap();
        jobs.get(&id).cloned().ok_or(StoreError::NotFound)
    }

    async fn next(&self) -> Result<Job, StoreError> {
        let jobs = self.jobs.read().unwrap();
        Self::select_candidate(&jobs)
            .and_then(|id| jobs.get(&id).cloned())
            .ok_or(StoreError::NotFound)
    }

    async fn claim_next(&self) -> Result<Option<Job>, StoreError> {
        // Selection and transition happen under one write lock, so no two
        // callers can take the same job.
        let mut jobs = self.jobs.write().unwrap();
        if let Some(id) = Self::select_candidate(&jobs) {
            if let Some(job) = jobs.get_mut(&id) {
                let now = now_ns();
                job.state = JobState::Working;
                job.started = now;
                job.last_mod = now;
                return Ok(Some(job.clone()));
            }
        }
        Ok(None)
    }

    async fn list(&self, request: &ListRequest) -> Result<ListResponse, StoreError> {
        let jobs = self.jobs.read().unwrap();
        let mut matching: Vec<&Job> = jobs
            .values()
            .filter(|j| request.state.map_or(true, |s| j.state == s))
            .collect();
        matching.sort_by_key(|j| (Reverse(j.last_mod), j.id));

        let total = matching.len() as u64;
        let page = matching
            .into_iter()
            .skip(request.offset as usize)
            .take(request.limit as usize)
            .cloned()
            .collect();
        Ok(ListResponse { total, jobs: page })
    }

    async fn stats(&self) -> Result<Stats, StoreError> {
        let jobs = self.jobs.read().unwrap();
        let mut stats = Stats::default();
        for job in jobs.values() {
            match job.state {
                JobState::Waiting => stats.waiting += 1,
                JobState::Working => stats.working += 1,
                JobState::Succeeded => stats.succeeded += 1,
                JobState::Failed => stats.failed += 1,
            }
        }
        Ok(stats)
    }

    async fn recover(&self) -> Result<u64, StoreError> {
        let mut jobs = self.jobs.write().unwrap();
        let now = now_ns();
        let mut swept = 0;
        for job in jobs.values_mut() {
            if job.state == JobState::Working {
                job.state = JobState::Failed;
                job.completed = now;
                job.last_mod = now;
                swept += 1;
            }
        }
        if swept > 0 {
            debug!(swept, "reclaimed stranded jobs");
        }
        Ok(swept)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::*;

    fn waiting_job(topic: &str, priority: i64, created: i64) -> Job {
        let mut job = Job::new(topic).with_priority(priority);
        job.created = created;
        job.last_mod = created;
        job
    }

    #[tokio::test]
    async fn create_then_lookup_round_trips() {
        let store = InMemoryJobStore::new();
        let job = Job::new("email.send")
            .with_args(vec![json!("to@example.com"), json!(3)])
            .with_priority(7)
            .with_correlation_id("batch-9");

        store.create(&job).await.unwrap();
        let found = store.lookup(job.id).await.unwrap();
        assert_eq!(found, job);
    }

    #[tokio::test]
    async fn duplicate_create_conflicts() {
        let store = InMemoryJobStore::new();
        let job = Job::new("test");

        store.create(&job).await.unwrap();
        let err = store.create(&job).await.unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn unknown_id_is_not_found() {
        let store = InMemoryJobStore::new();
        let ghost = Job::new("ghost");

        assert!(store.lookup(ghost.id).await.unwrap_err().is_not_found());
        assert!(store.update(&ghost).await.unwrap_err().is_not_found());
        assert!(store.delete(ghost.id).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn next_on_empty_store_is_not_found() {
        let store = InMemoryJobStore::new();
        assert!(store.next().await.unwrap_err().is_not_found());
        assert!(store.claim_next().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn next_picks_highest_priority() {
        let store = InMemoryJobStore::new();
        for (priority, created) in [(5, 1), (10, 2), (1, 3)] {
            store
                .create(&waiting_job("test", priority, created))
                .await
                .unwrap();
        }

        let job = store.next().await.unwrap();
        assert_eq!(job.priority, 10);

        // Peeking does not mutate anything.
        assert_eq!(store.stats().await.unwrap().waiting, 3);
    }

    #[tokio::test]
    async fn equal_priorities_break_ties_by_created() {
        let store = InMemoryJobStore::new();
        let older = waiting_job("test", 5, 100);
        let newer = waiting_job("test", 5, 200);
        store.create(&newer).await.unwrap();
        store.create(&older).await.unwrap();

        assert_eq!(store.next().await.unwrap().id, older.id);
    }

    #[tokio::test]
    async fn claim_then_fail_is_reflected_by_lookup() {
        let store = InMemoryJobStore::new();
        store.create(&Job::new("flaky")).await.unwrap();

        let mut claimed = store.claim_next().await.unwrap().unwrap();
        assert_eq!(claimed.state, JobState::Working);
        assert!(claimed.started > 0);

        claimed.mark_failed();
        store.update(&claimed).await.unwrap();

        let found = store.lookup(claimed.id).await.unwrap();
        assert_eq!(found.state, JobState::Failed);
        assert!(found.completed > 0);
        assert!(found.last_mod >= found.created);
    }

    #[tokio::test]
    async fn list_pages_share_one_total() {
        let store = InMemoryJobStore::new();
        for i in 0..5 {
            store.create(&waiting_job("test", 0, 100 + i)).await.unwrap();
        }

        let request = ListRequest::with_state(JobState::Waiting).page(0, 2);
        let first = store.list(&request).await.unwrap();
        assert_eq!(first.total, 5);
        assert_eq!(first.jobs.len(), 2);

        let second = store.list(&request.page(2, 2)).await.unwrap();
        assert_eq!(second.total, 5);
        assert_eq!(second.jobs.len(), 2);
        assert!(first.jobs.iter().all(|a| second.jobs.iter().all(|b| a.id != b.id)));

        // last_mod descending: the newest record leads the first page.
        assert_eq!(first.jobs[0].last_mod, 104);
    }

    #[tokio::test]
    async fn list_without_filter_counts_everything() {
        let store = InMemoryJobStore::new();
        store.create(&waiting_job("a", 0, 1)).await.unwrap();
        let mut done = waiting_job("b", 0, 2);
        store.create(&done).await.unwrap();
        done.mark_succeeded();
        store.update(&done).await.unwrap();

        let all = store.list(&ListRequest::default().page(0, 10)).await.unwrap();
        assert_eq!(all.total, 2);

        let waiting = store
            .list(&ListRequest::with_state(JobState::Waiting).page(0, 10))
            .await
            .unwrap();
        assert_eq!(waiting.total, 1);
    }

    #[tokio::test]
    async fn stats_count_each_state() {
        let store = InMemoryJobStore::new();
        for i in 0..3 {
            store.create(&waiting_job("w", 0, i)).await.unwrap();
        }
        let working = store.claim_next().await.unwrap().unwrap();
        store.create(&waiting_job("w", 0, 10)).await.unwrap();

        let mut ok = waiting_job("s", 0, 20);
        store.create(&ok).await.unwrap();
        ok.mark_working();
        ok.mark_succeeded();
        store.update(&ok).await.unwrap();

        let mut ok2 = waiting_job("s", 0, 21);
        store.create(&ok2).await.unwrap();
        ok2.mark_succeeded();
        store.update(&ok2).await.unwrap();

        let stats = store.stats().await.unwrap();
        assert_eq!(
            stats,
            Stats {
                waiting: 3,
                working: 1,
                succeeded: 2,
                failed: 0,
            }
        );
        assert_eq!(working.state, JobState::Working);
    }

    #[tokio::test]
    async fn recover_sweeps_only_working_jobs() {
        let store = InMemoryJobStore::new();
        for i in 0..5 {
            store.create(&waiting_job("test", 0, i)).await.unwrap();
        }
        let first = store.claim_next().await.unwrap().unwrap();
        let second = store.claim_next().await.unwrap().unwrap();

        let swept = store.recover().await.unwrap();
        assert_eq!(swept, 2);

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.working, 0);
        assert_eq!(stats.waiting, 3);
        assert_eq!(stats.failed, 2);

        for id in [first.id, second.id] {
            let job = store.lookup(id).await.unwrap();
            assert_eq!(job.state, JobState::Failed);
            assert!(job.completed > 0);
        }
    }

    #[tokio::test]
    async fn concurrent_claims_never_share_a_job() {
        let store = Arc::new(InMemoryJobStore::new());
        for i in 0..5 {
            store.create(&waiting_job("test", 0, i)).await.unwrap();
        }

        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move { store.claim_next().await.unwrap() }));
        }

        let mut claimed = Vec::new();
        for handle in handles {
            if let Some(job) = handle.await.unwrap() {
                claimed.push(job.id);
            }
        }

        claimed.sort();
        claimed.dedup();
        assert_eq!(claimed.len(), 5);
        assert_eq!(store.stats().await.unwrap().working, 5);
    }
}
