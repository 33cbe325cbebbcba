//! # In-process storage.
//!
//! [`MemoryStorage`] implements [`Queue`], [`JobStore`], and job/server
//! bookkeeping over a mutex-guarded map, with a [`Notify`] to wake blocked
//! claimers on enqueue and requeue. State transitions are atomic under the
//! lock, so the guarded-transition contract holds without extra machinery.
//!
//! Claims hold a shared handle to the storage; settling is consuming, so a
//! claim is removed or requeued at most once. A claim dropped without
//! settling leaves the job out of the queue (no invisibility timeout).

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant, SystemTime};

use async_trait::async_trait;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use crate::error::{StorageError, TaskError};
use crate::jobs::{JobDescriptor, JobState};
use crate::storage::traits::{Claim, JobRecord, JobStore, Queue, ServerInfo};

struct StoredJob {
    record: JobRecord,
    state: JobState,
    queue: String,
}

struct ServerEntry {
    info: ServerInfo,
    last_heartbeat: Instant,
}

#[derive(Default)]
struct Inner {
    jobs: HashMap<String, StoredJob>,
    queues: HashMap<String, VecDeque<String>>,
    servers: HashMap<String, ServerEntry>,
    next_id: u64,
}

struct Shared {
    inner: Mutex<Inner>,
    notify: Notify,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// In-process queue and job store.
#[derive(Clone)]
pub struct MemoryStorage {
    shared: Arc<Shared>,
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStorage {
    /// Creates an empty storage.
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                inner: Mutex::new(Inner::default()),
                notify: Notify::new(),
            }),
        }
    }

    /// Enqueues a job on `queue` and returns its generated id.
    pub fn enqueue(&self, queue: &str, descriptor: JobDescriptor) -> String {
        let mut inner = self.shared.lock();
        inner.next_id += 1;
        let job_id = inner.next_id.to_string();
        inner.jobs.insert(
            job_id.clone(),
            StoredJob {
                record: JobRecord {
                    descriptor,
                    created_at: SystemTime::now(),
                },
                state: JobState::Enqueued,
                queue: queue.to_string(),
            },
        );
        inner
            .queues
            .entry(queue.to_string())
            .or_default()
            .push_back(job_id.clone());
        drop(inner);
        self.shared.notify.notify_one();
        job_id
    }

    /// Registered server ids, in no particular order.
    pub fn server_ids(&self) -> Vec<String> {
        self.shared.lock().servers.keys().cloned().collect()
    }

    /// Metadata a server announced for itself, if it is registered.
    pub fn server_info(&self, server_id: &str) -> Option<ServerInfo> {
        self.shared
            .lock()
            .servers
            .get(server_id)
            .map(|entry| entry.info.clone())
    }

    #[cfg(test)]
    pub(crate) fn insert_processing(
        &self,
        job_id: &str,
        type_name: &str,
        method: &str,
        server_id: &str,
        worker_id: &str,
    ) {
        let mut inner = self.shared.lock();
        inner.jobs.insert(
            job_id.to_string(),
            StoredJob {
                record: JobRecord {
                    descriptor: JobDescriptor::new(type_name, method, vec![]),
                    created_at: SystemTime::now(),
                },
                state: JobState::Processing {
                    server_id: server_id.to_string(),
                    worker_id: worker_id.to_string(),
                },
                queue: "default".to_string(),
            },
        );
    }

    fn pop(&self, queues: &[String]) -> Option<MemoryClaim> {
        let mut inner = self.shared.lock();
        for queue in queues {
            if let Some(ids) = inner.queues.get_mut(queue) {
                if let Some(job_id) = ids.pop_front() {
                    return Some(MemoryClaim {
                        job_id,
                        queue: queue.clone(),
                        shared: self.shared.clone(),
                    });
                }
            }
        }
        None
    }
}

#[async_trait]
impl Queue for MemoryStorage {
    async fn claim(
        &self,
        queues: &[String],
        shutdown: &CancellationToken,
    ) -> Result<Box<dyn Claim>, TaskError> {
        loop {
            if shutdown.is_cancelled() {
                return Err(TaskError::Canceled);
            }
            // Arm the wakeup before inspecting the queues so an enqueue
            // between inspection and await is not lost.
            let notified = self.shared.notify.notified();
            if let Some(claim) = self.pop(queues) {
                return Ok(Box::new(claim));
            }
            tokio::select! {
                _ = notified => {}
                _ = shutdown.cancelled() => return Err(TaskError::Canceled),
            }
        }
    }
}

#[async_trait]
impl JobStore for MemoryStorage {
    async fn read_state(&self, job_id: &str) -> Result<Option<JobState>, StorageError> {
        Ok(self
            .shared
            .lock()
            .jobs
            .get(job_id)
            .map(|job| job.state.clone()))
    }

    async fn transition(
        &self,
        job_id: &str,
        to: JobState,
        allowed_from: &[&str],
    ) -> Result<Option<JobState>, StorageError> {
        let mut inner = self.shared.lock();
        match inner.jobs.get_mut(job_id) {
            Some(job) if allowed_from.contains(&job.state.name()) => {
                job.state = to.clone();
                Ok(Some(to))
            }
            _ => Ok(None),
        }
    }

    async fn read_job(&self, job_id: &str) -> Result<Option<JobRecord>, StorageError> {
        Ok(self
            .shared
            .lock()
            .jobs
            .get(job_id)
            .map(|job| job.record.clone()))
    }

    async fn announce_server(
        &self,
        server_id: &str,
        info: &ServerInfo,
    ) -> Result<(), StorageError> {
        self.shared.lock().servers.insert(
            server_id.to_string(),
            ServerEntry {
                info: info.clone(),
                last_heartbeat: Instant::now(),
            },
        );
        Ok(())
    }

    async fn remove_server(&self, server_id: &str) -> Result<(), StorageError> {
        self.shared.lock().servers.remove(server_id);
        Ok(())
    }

    async fn heartbeat(&self, server_id: &str) -> Result<(), StorageError> {
        if let Some(entry) = self.shared.lock().servers.get_mut(server_id) {
            entry.last_heartbeat = Instant::now();
        }
        Ok(())
    }

    async fn remove_timed_out_servers(
        &self,
        timeout: Duration,
    ) -> Result<usize, StorageError> {
        let mut inner = self.shared.lock();
        let before = inner.servers.len();
        inner
            .servers
            .retain(|_, entry| entry.last_heartbeat.elapsed() <= timeout);
        Ok(before - inner.servers.len())
    }
}

struct MemoryClaim {
    job_id: String,
    queue: String,
    shared: Arc<Shared>,
}

#[async_trait]
impl Claim for MemoryClaim {
    fn job_id(&self) -> &str {
        &self.job_id
    }

    async fn remove(self: Box<Self>) -> Result<(), StorageError> {
        Ok(())
    }

    async fn requeue(self: Box<Self>) -> Result<(), StorageError> {
        let mut inner = self.shared.lock();
        inner
            .queues
            .entry(self.queue.clone())
            .or_default()
            .push_back(self.job_id.clone());
        drop(inner);
        self.shared.notify.notify_one();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use tokio::time;

    fn descriptor() -> JobDescriptor {
        JobDescriptor::new("Mailer", "send", vec!["alice".into()])
    }

    #[tokio::test]
    async fn test_claim_returns_enqueued_jobs_in_order() {
        let storage = MemoryStorage::new();
        let first = storage.enqueue("default", descriptor());
        let second = storage.enqueue("default", descriptor());

        let queues = vec!["default".to_string()];
        let shutdown = CancellationToken::new();

        let a = storage.claim(&queues, &shutdown).await.expect("first");
        let b = storage.claim(&queues, &shutdown).await.expect("second");
        assert_eq!(a.job_id(), first);
        assert_eq!(b.job_id(), second);
    }

    #[tokio::test]
    async fn test_claim_blocks_until_enqueue() {
        let storage = MemoryStorage::new();
        let queues = vec!["default".to_string()];
        let shutdown = CancellationToken::new();

        let waiting = {
            let storage = storage.clone();
            let shutdown = shutdown.clone();
            tokio::spawn(async move { storage.claim(&queues, &shutdown).await })
        };

        time::sleep(Duration::from_millis(20)).await;
        let job_id = storage.enqueue("default", descriptor());

        let claim = waiting.await.expect("join").expect("claim");
        assert_eq!(claim.job_id(), job_id);
    }

    #[tokio::test]
    async fn test_claim_stops_on_shutdown() {
        let storage = MemoryStorage::new();
        let queues = vec!["default".to_string()];
        let shutdown = CancellationToken::new();

        let waiting = {
            let storage = storage.clone();
            let shutdown = shutdown.clone();
            tokio::spawn(async move { storage.claim(&queues, &shutdown).await })
        };

        time::sleep(Duration::from_millis(20)).await;
        shutdown.cancel();

        assert!(matches!(
            waiting.await.expect("join"),
            Err(TaskError::Canceled)
        ));
    }

    #[tokio::test]
    async fn test_requeue_makes_the_job_claimable_again() {
        let storage = MemoryStorage::new();
        let job_id = storage.enqueue("default", descriptor());

        let queues = vec!["default".to_string()];
        let shutdown = CancellationToken::new();

        let claim = storage.claim(&queues, &shutdown).await.expect("claim");
        claim.requeue().await.expect("requeue");

        let again = storage.claim(&queues, &shutdown).await.expect("reclaim");
        assert_eq!(again.job_id(), job_id);
    }

    #[tokio::test]
    async fn test_transition_applies_only_from_allowed_states() {
        let storage = MemoryStorage::new();
        let job_id = storage.enqueue("default", descriptor());

        let processing = JobState::Processing {
            server_id: "s".into(),
            worker_id: "w".into(),
        };
        let applied = storage
            .transition(&job_id, processing.clone(), &[JobState::ENQUEUED])
            .await
            .expect("no fault");
        assert!(applied.is_some());

        // Already Processing: an Enqueued-only precondition must fail.
        let rejected = storage
            .transition(&job_id, JobState::Enqueued, &[JobState::ENQUEUED])
            .await
            .expect("no fault");
        assert!(rejected.is_none());

        let missing = storage
            .transition("nope", JobState::Enqueued, &[JobState::ENQUEUED])
            .await
            .expect("no fault");
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_watchdog_sweep_removes_only_stale_servers() {
        let storage = MemoryStorage::new();
        let info = ServerInfo {
            queues: vec!["default".into()],
            worker_count: 1,
        };
        storage.announce_server("fresh", &info).await.expect("announce");
        storage.announce_server("stale", &info).await.expect("announce");

        let announced = storage.server_info("fresh").expect("registered");
        assert_eq!(announced.queues, vec!["default".to_string()]);
        assert_eq!(announced.worker_count, 1);
        assert!(storage.server_info("unknown").is_none());

        // A zero timeout considers everything stale; a long one, nothing.
        let removed = storage
            .remove_timed_out_servers(Duration::from_secs(3600))
            .await
            .expect("sweep");
        assert_eq!(removed, 0);

        storage.heartbeat("fresh").await.expect("heartbeat");
        std::thread::sleep(Duration::from_millis(5));
        let removed = storage
            .remove_timed_out_servers(Duration::from_millis(1))
            .await
            .expect("sweep");
        assert_eq!(removed, 2);
        assert!(storage.server_ids().is_empty());
    }
}
