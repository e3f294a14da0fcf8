//! Shutdown coordination.
//!
//! # Responsibilities
//! - Run the shutdown sequence at most once per process
//! - Tell the server to stop accepting connections
//! - Release the shared resource within a bounded wait
//!
//! # Design Decisions
//! - `Running -> ShuttingDown -> Terminated` is an atomic state machine;
//!   only the caller that wins the first transition runs the sequence
//! - Later triggers return `None` immediately instead of waiting
//! - A failed or slow release is logged and reported, never retried

use std::process::ExitCode;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use tokio::sync::broadcast;

use crate::lifecycle::resource::{Resource, ResourceError, ResourceHandle};

const RUNNING: u8 = 0;
const SHUTTING_DOWN: u8 = 1;
const TERMINATED: u8 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Running,
    ShuttingDown,
    Terminated,
}

/// How the shutdown sequence ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownOutcome {
    Clean,
    ReleaseFailed(ResourceError),
    TimedOut(Duration),
}

impl ShutdownOutcome {
    pub fn exit_status(&self) -> u8 {
        match self {
            ShutdownOutcome::Clean => 0,
            ShutdownOutcome::ReleaseFailed(_) | ShutdownOutcome::TimedOut(_) => 1,
        }
    }

    pub fn exit_code(&self) -> ExitCode {
        ExitCode::from(self.exit_status())
    }
}

/// Drives the process from running to terminated.
pub struct LifecycleCoordinator<R> {
    state: AtomicU8,
    resource: ResourceHandle<R>,
    stop_accepting: broadcast::Sender<()>,
    release_timeout: Duration,
}

impl<R: Resource> LifecycleCoordinator<R> {
    pub fn new(resource: ResourceHandle<R>, release_timeout: Duration) -> Self {
        let (stop_accepting, _) = broadcast::channel(1);
        Self {
            state: AtomicU8::new(RUNNING),
            resource,
            stop_accepting,
            release_timeout,
        }
    }

    /// Receiver that fires when the server should stop accepting.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.stop_accepting.subscribe()
    }

    pub fn state(&self) -> LifecycleState {
        match self.state.load(Ordering::SeqCst) {
            RUNNING => LifecycleState::Running,
            SHUTTING_DOWN => LifecycleState::ShuttingDown,
            _ => LifecycleState::Terminated,
        }
    }

    /// Run the shutdown sequence.
    ///
    /// Returns `None` if another caller already started it.
    pub async fn shutdown(&self) -> Option<ShutdownOutcome> {
        if self
            .state
            .compare_exchange(RUNNING, SHUTTING_DOWN, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::debug!("Shutdown already in progress");
            return None;
        }

        tracing::info!("Shutting down");
        // No subscribers just means the server is already gone.
        let _ = self.stop_accepting.send(());

        let outcome = match tokio::time::timeout(self.release_timeout, self.resource.release()).await {
            Ok(Ok(())) => {
                tracing::info!(resource = self.resource.name(), "Shared resource released");
                ShutdownOutcome::Clean
            }
            Ok(Err(err)) => {
                tracing::error!(resource = self.resource.name(), error = %err, "Error: {}", err);
                ShutdownOutcome::ReleaseFailed(err)
            }
            Err(_) => {
                tracing::error!(
                    resource = self.resource.name(),
                    timeout_secs = self.release_timeout.as_secs_f64(),
                    "Error: release did not complete in time"
                );
                ShutdownOutcome::TimedOut(self.release_timeout)
            }
        };

        self.state.store(TERMINATED, Ordering::SeqCst);
        Some(outcome)
    }
}
