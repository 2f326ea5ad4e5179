//! Shutdown coordination and managed background workers
//!
//! Adapters that need a background loop (broker event loop, key expiration
//! listener) spawn a [`BackgroundWorker`] and register its stop action with
//! the registry's [`DefaultShutdownCoordinator`]:
//!
//! ```text
//!  adapter ──spawn──▶ BackgroundWorker (thread + CancellationToken)
//!     │                         ▲
//!     └─register_owned─────▶ DefaultShutdownCoordinator ──signal_shutdown──┘
//! ```
//!
//! Dropping the last handle of a worker stops it as well, so an instance
//! evicted from the registry does not leak its thread.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use keystone_domain::error::{Error, Result};
use keystone_domain::ports::lifecycle::{OwnerCheck, ShutdownAction, ShutdownCoordinator};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::constants::WORKER_POLL_INTERVAL;

// ============================================================================
// Default Shutdown Coordinator
// ============================================================================

/// Default implementation of [`ShutdownCoordinator`]
///
/// Actions run once, in reverse registration order. Entries registered with
/// an owner check are dropped as soon as their owner is gone.
pub struct DefaultShutdownCoordinator {
    /// Shutdown signal flag
    shutdown_signal: AtomicBool,
    /// Registered actions, oldest first
    actions: Mutex<Vec<PendingAction>>,
}

struct PendingAction {
    name: String,
    owner: Option<OwnerCheck>,
    action: ShutdownAction,
}

impl PendingAction {
    fn is_orphaned(&self) -> bool {
        self.owner.as_ref().is_some_and(|owner| !owner())
    }
}

impl DefaultShutdownCoordinator {
    /// Create a new shutdown coordinator
    pub fn new() -> Self {
        Self {
            shutdown_signal: AtomicBool::new(false),
            actions: Mutex::new(Vec::new()),
        }
    }

    /// Number of actions waiting for shutdown
    pub fn pending_actions(&self) -> usize {
        self.actions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn push(&self, name: &str, owner: Option<OwnerCheck>, action: ShutdownAction) {
        if self.is_shutting_down() {
            debug!(action = %name, "Shutdown already signalled, running action now");
            action();
            return;
        }
        let mut actions = self.actions.lock().unwrap_or_else(PoisonError::into_inner);
        let before = actions.len();
        actions.retain(|pending| !pending.is_orphaned());
        if actions.len() < before {
            debug!(pruned = before - actions.len(), "Dropped shutdown actions of released owners");
        }
        debug!(action = %name, "Registering shutdown action");
        actions.push(PendingAction {
            name: name.to_string(),
            owner,
            action,
        });
    }
}

impl Default for DefaultShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for DefaultShutdownCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DefaultShutdownCoordinator")
            .field("is_shutting_down", &self.is_shutting_down())
            .field("pending_actions", &self.pending_actions())
            .finish()
    }
}

impl ShutdownCoordinator for DefaultShutdownCoordinator {
    fn register_action(&self, name: &str, action: ShutdownAction) {
        self.push(name, None, action);
    }

    fn register_owned(&self, name: &str, owner: OwnerCheck, action: ShutdownAction) {
        self.push(name, Some(owner), action);
    }

    fn signal_shutdown(&self) {
        if self.shutdown_signal.swap(true, Ordering::SeqCst) {
            return;
        }
        info!("Shutdown signal received");

        let actions = std::mem::take(&mut *self.actions.lock().unwrap_or_else(PoisonError::into_inner));
        for pending in actions.into_iter().rev() {
            if pending.is_orphaned() {
                continue;
            }
            debug!(action = %pending.name, "Running shutdown action");
            (pending.action)();
        }
    }

    fn is_shutting_down(&self) -> bool {
        self.shutdown_signal.load(Ordering::SeqCst)
    }
}

// ============================================================================
// Background Worker
// ============================================================================

/// Named thread stopped through a cancellation token
///
/// The worker body receives the token and must return soon after it is
/// cancelled; [`WORKER_POLL_INTERVAL`](crate::constants::WORKER_POLL_INTERVAL)
/// is the expected polling period.
pub struct BackgroundWorker {
    name: String,
    token: CancellationToken,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl BackgroundWorker {
    /// Spawn `body` on a dedicated thread
    pub fn spawn<F>(name: impl Into<String>, token: CancellationToken, body: F) -> Result<Self>
    where
        F: FnOnce(CancellationToken) + Send + 'static,
    {
        let name = name.into();
        let worker_token = token.clone();
        let handle = thread::Builder::new()
            .name(name.clone())
            .spawn(move || body(worker_token))
            .map_err(|e| Error::Io {
                message: format!("Failed to spawn worker {name}: {e}"),
                source: Some(Box::new(e)),
            })?;
        info!(worker = %name, "Background worker started");
        Ok(Self {
            name,
            token,
            handle: Mutex::new(Some(handle)),
        })
    }

    /// Worker name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the worker thread is still running
    pub fn is_running(&self) -> bool {
        self.handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Cancel the worker and wait for its thread to exit
    pub fn stop(&self) {
        self.token.cancel();
        let handle = self
            .handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(handle) = handle else {
            return;
        };
        // A worker dropping its own last handle cannot join itself
        if handle.thread().id() == thread::current().id() {
            return;
        }
        if handle.join().is_err() {
            warn!(worker = %self.name, "Background worker panicked");
        } else {
            info!(worker = %self.name, "Background worker stopped");
        }
    }

    /// Register [`stop`](Self::stop) as a shutdown action without keeping the
    /// worker alive
    ///
    /// The action is discarded once the last handle of the worker is dropped.
    pub fn stop_on_shutdown(self: &Arc<Self>, coordinator: &dyn ShutdownCoordinator) {
        let owner = Arc::downgrade(self);
        let worker = Arc::downgrade(self);
        coordinator.register_owned(
            &self.name,
            Box::new(move || owner.strong_count() > 0),
            Box::new(move || {
                if let Some(worker) = worker.upgrade() {
                    worker.stop();
                }
            }),
        );
    }
}

/// Sleep for `duration` in poll-sized steps; returns `false` if `token` was
/// cancelled first
pub fn sleep_unless_cancelled(token: &CancellationToken, duration: Duration) -> bool {
    let deadline = Instant::now() + duration;
    loop {
        if token.is_cancelled() {
            return false;
        }
        let left = deadline.saturating_duration_since(Instant::now());
        if left.is_zero() {
            return true;
        }
        thread::sleep(left.min(WORKER_POLL_INTERVAL));
    }
}

impl Drop for BackgroundWorker {
    fn drop(&mut self) {
        self.stop();
    }
}

impl fmt::Debug for BackgroundWorker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackgroundWorker")
            .field("name", &self.name)
            .field("running", &self.is_running())
            .finish()
    }
}
