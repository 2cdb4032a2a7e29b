//! Supervisor for running release instances.
//!
//! Keeps one cancellable task per gift (or per owner sweep), supersedes an
//! instance when its key is scheduled again, and re-arms pending gifts after
//! a restart.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use domain::errors::StoreError;
use domain::services::{ReleaseContext, ReleasePolicy, ReleaseTarget, ReleaseTask};

use crate::middleware::metrics::{record_release_outcome, set_active_releases};

/// Identity of a release instance in the supervisor map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKey {
    Gift(i64),
    Owner(i64),
}

impl From<&ReleaseTarget> for TaskKey {
    fn from(target: &ReleaseTarget) -> Self {
        match target {
            ReleaseTarget::Gift { gift_id, .. } => TaskKey::Gift(*gift_id),
            ReleaseTarget::Owner { owner_id, .. } => TaskKey::Owner(*owner_id),
        }
    }
}

impl fmt::Display for TaskKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskKey::Gift(id) => write!(f, "gift:{}", id),
            TaskKey::Owner(id) => write!(f, "owner:{}", id),
        }
    }
}

struct TaskEntry {
    generation: u64,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

struct SupervisorInner {
    ctx: ReleaseContext,
    shutdown: CancellationToken,
    entries: Mutex<HashMap<TaskKey, TaskEntry>>,
    next_generation: AtomicU64,
}

impl SupervisorInner {
    fn entries(&self) -> MutexGuard<'_, HashMap<TaskKey, TaskEntry>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Remove the entry only if it still belongs to this instance.
    fn deregister(&self, key: TaskKey, generation: u64) {
        let mut entries = self.entries();
        if entries
            .get(&key)
            .is_some_and(|entry| entry.generation == generation)
        {
            entries.remove(&key);
        }
        set_active_releases(entries.len());
    }
}

/// Owns every live release instance of the process.
#[derive(Clone)]
pub struct ReleaseSupervisor {
    inner: Arc<SupervisorInner>,
}

impl ReleaseSupervisor {
    pub fn new(ctx: ReleaseContext) -> Self {
        Self {
            inner: Arc::new(SupervisorInner {
                ctx,
                shutdown: CancellationToken::new(),
                entries: Mutex::new(HashMap::new()),
                next_generation: AtomicU64::new(1),
            }),
        }
    }

    pub fn context(&self) -> &ReleaseContext {
        &self.inner.ctx
    }

    /// Start a release instance, cancelling any live instance with the same key.
    ///
    /// Returns `None` once shutdown has begun.
    pub fn spawn(&self, target: ReleaseTarget) -> Option<TaskKey> {
        if self.inner.shutdown.is_cancelled() {
            warn!(target = %target, "Supervisor shutting down, not scheduling release");
            return None;
        }

        let key = TaskKey::from(&target);
        let generation = self.inner.next_generation.fetch_add(1, Ordering::Relaxed);
        let cancel = self.inner.shutdown.child_token();
        let task = ReleaseTask::new(self.inner.ctx.clone(), target);

        let mut entries = self.inner.entries();
        if let Some(previous) = entries.remove(&key) {
            info!(key = %key, "Superseding running release instance");
            previous.cancel.cancel();
        }

        let inner = Arc::clone(&self.inner);
        let task_cancel = cancel.clone();
        let handle = tokio::spawn(async move {
            let outcome = task.run(task_cancel).await;
            record_release_outcome(outcome.label());
            inner.deregister(key, generation);
        });

        entries.insert(
            key,
            TaskEntry {
                generation,
                cancel,
                handle,
            },
        );
        set_active_releases(entries.len());
        Some(key)
    }

    /// Signal the instance for `key`. Returns false when none is running.
    pub fn cancel(&self, key: TaskKey) -> bool {
        let mut entries = self.inner.entries();
        let cancelled = match entries.remove(&key) {
            Some(entry) => {
                entry.cancel.cancel();
                true
            }
            None => false,
        };
        set_active_releases(entries.len());
        cancelled
    }

    pub fn cancel_gift(&self, gift_id: i64) -> bool {
        self.cancel(TaskKey::Gift(gift_id))
    }

    pub fn is_active(&self, key: TaskKey) -> bool {
        self.inner.entries().contains_key(&key)
    }

    pub fn active_tasks(&self) -> usize {
        self.inner.entries().len()
    }

    /// Re-arm every pending gift that already has recipients.
    ///
    /// Gifts with a stored release time resume their fixed schedule; the rest
    /// restart the inactivity cycle from the beginning.
    pub async fn resume_pending(&self) -> Result<usize, StoreError> {
        let armed = self.inner.ctx.store.list_armed_gifts().await?;
        let mut resumed = 0;

        for status in armed {
            let policy = match status.scheduled_release {
                Some(deadline) => ReleasePolicy::FixedSchedule {
                    fallback_deadline: deadline,
                },
                None => ReleasePolicy::Inactivity,
            };
            let target = ReleaseTarget::Gift {
                gift_id: status.id,
                policy,
            };
            if self.spawn(target).is_some() {
                resumed += 1;
            }
        }

        info!(resumed, "Resumed pending gift releases");
        Ok(resumed)
    }

    /// Cancel every instance. Stored state is left untouched.
    pub fn shutdown(&self) {
        info!(active = self.active_tasks(), "Initiating release supervisor shutdown");
        self.inner.shutdown.cancel();
    }

    /// Wait for cancelled instances to finish, bounded by `timeout`.
    pub async fn wait_for_shutdown(&self, timeout: Duration) {
        let handles: Vec<JoinHandle<()>> = self
            .inner
            .entries()
            .drain()
            .map(|(_, entry)| entry.handle)
            .collect();
        set_active_releases(0);

        info!(
            tasks = handles.len(),
            "Waiting for release instances to stop (timeout: {:?})", timeout
        );

        let shutdown_future = async {
            for handle in handles {
                if let Err(e) = handle.await {
                    warn!("Release task panicked: {}", e);
                }
            }
        };

        match tokio::time::timeout(timeout, shutdown_future).await {
            Ok(()) => info!("All release instances stopped"),
            Err(_) => warn!("Release supervisor shutdown timed out after {:?}", timeout),
        }
    }
}
