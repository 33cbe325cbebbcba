//! # The process supervisor.
//!
//! [`JobServer`] hosts everything a running server instance needs: N
//! worker loops plus the heartbeat and watchdog tasks, each wrapped in
//! `RepeatForever(Retry(task))` and spawned into one [`JoinSet`] under a
//! shared cancellation scope.
//!
//! ## Lifecycle
//! ```text
//! run():
//!   server_id = config name, or hostname:uuid (lowercase), or bare uuid
//!   announce_server(server_id, queues + worker count)
//!   spawn tasks:   RepeatForever(Retry(Worker))  × worker_count
//!                  RepeatForever(Retry(Heartbeat))
//!                  RepeatForever(Retry(Watchdog))
//!   drive:
//!     OS signal / request_stop() ──► cancel token ──► grace-bounded drain
//!        ├─ all stopped in time  → Ok
//!        └─ grace exceeded       → abort all, Err(GraceExceeded { stuck })
//!   remove_server(server_id)     (always attempted)
//! ```
//!
//! ## Rules
//! - [`request_stop`](JobServer::request_stop) is non-blocking; `run`
//!   returns once the drain finishes.
//! - A task that exhausts its retries ends quietly; the server keeps
//!   running on the remaining tasks.
//! - The server registration is removed on every exit path.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::ServerConfig;
use crate::error::{RuntimeError, TaskError};
use crate::perform::Performer;
use crate::server::{
    shutdown, Heartbeat, RepeatForever, Retry, ServerContext, ServerTaskRef, Watchdog, Worker,
};
use crate::storage::{JobStore, Queue, ServerInfo};

/// Tracks the names of tasks that have not finished yet.
#[derive(Default)]
struct AliveSet(Mutex<HashSet<String>>);

impl AliveSet {
    fn lock(&self) -> MutexGuard<'_, HashSet<String>> {
        self.0.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn snapshot(&self) -> Vec<String> {
        let mut names: Vec<String> = self.lock().iter().cloned().collect();
        names.sort();
        names
    }
}

/// Hosts worker loops and auxiliary tasks for one server instance.
pub struct JobServer {
    config: ServerConfig,
    queue: Arc<dyn Queue>,
    store: Arc<dyn JobStore>,
    performer: Arc<dyn Performer>,
    shutdown: CancellationToken,
}

impl JobServer {
    /// Creates a server over the given storage seams and performer.
    pub fn new(
        config: ServerConfig,
        queue: Arc<dyn Queue>,
        store: Arc<dyn JobStore>,
        performer: Arc<dyn Performer>,
    ) -> Self {
        Self {
            config,
            queue,
            store,
            performer,
            shutdown: CancellationToken::new(),
        }
    }

    /// A clone of the server's shutdown token. Cancelling it is
    /// equivalent to [`request_stop`](Self::request_stop).
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Requests cooperative shutdown without waiting for it to finish.
    pub fn request_stop(&self) {
        self.shutdown.cancel();
    }

    /// Runs the server until all tasks exit or shutdown is requested
    /// (via a signal, [`request_stop`](Self::request_stop), or the token).
    pub async fn run(&self) -> Result<(), RuntimeError> {
        let server_id = self.server_id();
        info!(server = %server_id, workers = self.config.worker_count, "starting job server");

        self.store
            .announce_server(
                &server_id,
                &ServerInfo {
                    queues: self.config.queues.clone(),
                    worker_count: self.config.worker_count,
                },
            )
            .await?;

        let ctx = ServerContext::new(
            server_id.as_str(),
            self.store.clone(),
            self.shutdown.clone(),
        );
        let alive = Arc::new(AliveSet::default());
        let mut set = JoinSet::new();
        self.spawn_tasks(&mut set, &ctx, &alive);

        let result = self.drive(&mut set, &alive).await;

        if let Err(err) = self.store.remove_server(&server_id).await {
            warn!(server = %server_id, %err, "failed to remove the server registration");
        }
        info!(server = %server_id, "job server stopped");
        result
    }

    /// Resolves the server identity: the configured name, or
    /// `hostname:uuid` lowercased, or a bare uuid.
    fn server_id(&self) -> String {
        if let Some(name) = &self.config.server_name {
            return name.clone();
        }
        let id = Uuid::new_v4().to_string();
        let host = std::env::var("COMPUTERNAME")
            .or_else(|_| std::env::var("HOSTNAME"))
            .unwrap_or_default();
        if host.is_empty() {
            id
        } else {
            format!("{host}:{id}").to_lowercase()
        }
    }

    fn build_tasks(&self) -> Vec<ServerTaskRef> {
        let mut tasks: Vec<ServerTaskRef> = Vec::with_capacity(self.config.worker_count + 2);
        tasks.push(Arc::new(Heartbeat::new(self.config.heartbeat_interval)));
        tasks.push(Arc::new(Watchdog::new(
            self.config.server_check_interval,
            self.config.server_timeout,
        )));
        for _ in 0..self.config.worker_count {
            tasks.push(Arc::new(Worker::new(
                self.config.queues.clone(),
                self.queue.clone(),
                self.performer.clone(),
            )));
        }
        tasks
            .into_iter()
            .map(|task| {
                Arc::new(RepeatForever::new(Arc::new(Retry::with_policy(
                    task,
                    self.config.retry,
                )))) as ServerTaskRef
            })
            .collect()
    }

    fn spawn_tasks(&self, set: &mut JoinSet<()>, ctx: &ServerContext, alive: &Arc<AliveSet>) {
        for task in self.build_tasks() {
            let name = task.name().to_string();
            alive.lock().insert(name.clone());

            let ctx = ctx.clone();
            let alive = Arc::clone(alive);
            set.spawn(async move {
                match task.execute(&ctx).await {
                    Ok(()) | Err(TaskError::Canceled) => {
                        debug!(task = %name, "task stopped");
                    }
                    Err(err) => {
                        error!(task = %name, %err, "task ended with an error");
                    }
                }
                alive.lock().remove(&name);
            });
        }
    }

    /// Waits until all tasks finish on their own or shutdown is requested,
    /// then drains within the configured grace.
    async fn drive(&self, set: &mut JoinSet<()>, alive: &AliveSet) -> Result<(), RuntimeError> {
        tokio::select! {
            _ = shutdown::wait_for_shutdown_signal() => {
                info!("termination signal received; shutting down");
                self.shutdown.cancel();
                self.wait_all_with_grace(set, alive).await
            }
            _ = self.shutdown.cancelled() => {
                self.wait_all_with_grace(set, alive).await
            }
            _ = async { while set.join_next().await.is_some() {} } => Ok(()),
        }
    }

    /// Waits for all tasks to finish within the shutdown grace; aborts the
    /// stragglers and reports them when the grace runs out.
    async fn wait_all_with_grace(
        &self,
        set: &mut JoinSet<()>,
        alive: &AliveSet,
    ) -> Result<(), RuntimeError> {
        let grace = self.config.shutdown_grace;
        let drained = async { while set.join_next().await.is_some() {} };
        let timed_out = tokio::time::timeout(grace, drained).await.is_err();
        if !timed_out {
            return Ok(());
        }

        let stuck = alive.snapshot();
        error!(?grace, ?stuck, "shutdown grace exceeded; aborting remaining tasks");
        set.abort_all();
        Err(RuntimeError::GraceExceeded { grace, stuck })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use crate::error::CallError;
    use crate::filters::StaticFilterProvider;
    use crate::jobs::{Argument, JobDescriptor, JobFn, JobRegistry, JobState, Parameter};
    use crate::perform::{CoreInvoker, JobPerformer};
    use crate::storage::MemoryStorage;

    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }

    fn config() -> ServerConfig {
        ServerConfig {
            server_name: Some("test-server".to_string()),
            worker_count: 2,
            shutdown_grace: Duration::from_secs(5),
            ..ServerConfig::default()
        }
    }

    fn performer(registry: JobRegistry) -> Arc<dyn Performer> {
        Arc::new(JobPerformer::new(
            Arc::new(StaticFilterProvider::empty()),
            Arc::new(CoreInvoker::new(Arc::new(registry))),
        ))
    }

    async fn wait_for_terminal(storage: &MemoryStorage, job_id: &str) -> JobState {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                if let Some(state) = storage.read_state(job_id).await.expect("read") {
                    if state.is_terminal() {
                        return state;
                    }
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("job must reach a terminal state")
    }

    #[tokio::test]
    async fn test_server_performs_enqueued_jobs_and_stops_cleanly() {
        init_tracing();
        let storage = MemoryStorage::new();
        let registry = JobRegistry::new().with(
            "Mailer",
            "send",
            JobFn::arc(vec![Parameter::Recorded], |args: Vec<Argument>| async move {
                let to = args[0].as_recorded().unwrap_or_default().to_string();
                Ok::<_, CallError>(Some(format!("sent to {to}")))
            }),
        );

        let first = storage.enqueue(
            "default",
            JobDescriptor::new("Mailer", "send", vec!["alice".into()]),
        );
        let second = storage.enqueue(
            "default",
            JobDescriptor::new("Mailer", "send", vec!["bob".into()]),
        );

        let server = JobServer::new(
            config(),
            Arc::new(storage.clone()),
            Arc::new(storage.clone()),
            performer(registry),
        );
        let stop = server.shutdown_token();
        let running = tokio::spawn(async move { server.run().await });

        let state = wait_for_terminal(&storage, &first).await;
        assert!(matches!(state, JobState::Succeeded { .. }));
        let state = wait_for_terminal(&storage, &second).await;
        assert!(matches!(state, JobState::Succeeded { .. }));

        // The server is registered while running.
        assert_eq!(storage.server_ids(), vec!["test-server".to_string()]);

        stop.cancel();
        running
            .await
            .expect("join")
            .expect("clean shutdown within grace");
        assert!(storage.server_ids().is_empty());
    }

    #[tokio::test]
    async fn test_request_stop_before_any_work_still_unregisters() {
        init_tracing();
        let storage = MemoryStorage::new();
        let server = JobServer::new(
            config(),
            Arc::new(storage.clone()),
            Arc::new(storage.clone()),
            performer(JobRegistry::new()),
        );

        let stop = server.shutdown_token();
        let running = tokio::spawn(async move { server.run().await });
        tokio::time::sleep(Duration::from_millis(20)).await;
        stop.cancel();

        running.await.expect("join").expect("clean shutdown");
        assert!(storage.server_ids().is_empty());
    }
}
