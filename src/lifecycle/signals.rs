//! OS signal handling.
//!
//! # Responsibilities
//! - Register handlers for SIGINT and SIGTERM
//! - Turn every delivery into a shutdown trigger on the coordinator
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - Signals arrive as a stream so tests can drive shutdown with a plain
//!   stream instead of real signals
//! - Each trigger runs on its own task, so a second signal is seen (and
//!   ignored) while the first shutdown is still releasing

use std::sync::Arc;

use futures_util::stream::{self, BoxStream, Stream, StreamExt};
use tokio::sync::mpsc;

use crate::lifecycle::resource::Resource;
use crate::lifecycle::shutdown::{LifecycleCoordinator, ShutdownOutcome};

/// Stream of termination signal names, one item per delivery.
#[cfg(unix)]
pub fn termination_signals() -> std::io::Result<BoxStream<'static, &'static str>> {
    use tokio::signal::unix::{signal, SignalKind};

    let interrupt = signal(SignalKind::interrupt())?;
    let terminate = signal(SignalKind::terminate())?;

    let signals = stream::unfold(
        (interrupt, terminate),
        |(mut interrupt, mut terminate)| async move {
            let name = tokio::select! {
                Some(()) = interrupt.recv() => "SIGINT",
                Some(()) = terminate.recv() => "SIGTERM",
                else => return None,
            };
            Some((name, (interrupt, terminate)))
        },
    );
    Ok(signals.boxed())
}

/// Stream of termination signal names, one item per delivery.
#[cfg(not(unix))]
pub fn termination_signals() -> std::io::Result<BoxStream<'static, &'static str>> {
    let signals = stream::unfold((), |()| async {
        tokio::signal::ctrl_c().await.ok()?;
        Some(("ctrl-c", ()))
    });
    Ok(signals.boxed())
}

/// Trigger `coordinator` for every signal and return the outcome of the one
/// shutdown that runs. Returns `None` if the stream ends without a signal.
pub async fn drive<R, S>(coordinator: Arc<LifecycleCoordinator<R>>, mut signals: S) -> Option<ShutdownOutcome>
where
    R: Resource,
    S: Stream<Item = &'static str> + Send + Unpin + 'static,
{
    let (outcome_tx, mut outcome_rx) = mpsc::channel(1);

    tokio::spawn(async move {
        while let Some(signal) = signals.next().await {
            tracing::info!(signal, "Termination signal received");
            let coordinator = Arc::clone(&coordinator);
            let outcome_tx = outcome_tx.clone();
            tokio::spawn(async move {
                match coordinator.shutdown().await {
                    Some(outcome) => {
                        let _ = outcome_tx.send(outcome).await;
                    }
                    None => tracing::info!(signal, "Shutdown already in progress, signal ignored"),
                }
            });
        }
    });

    outcome_rx.recv().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::resource::testing::CountingResource;
    use crate::lifecycle::resource::ResourceHandle;
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    #[tokio::test]
    async fn test_two_signals_one_release() {
        let resource = CountingResource {
            delay: Some(Duration::from_millis(30)),
            ..CountingResource::default()
        };
        let releases = Arc::clone(&resource.releases);
        let coordinator = Arc::new(LifecycleCoordinator::new(
            ResourceHandle::new(resource),
            Duration::from_secs(5),
        ));

        let outcome = drive(Arc::clone(&coordinator), stream::iter(["SIGINT", "SIGINT"])).await;

        assert_eq!(outcome, Some(ShutdownOutcome::Clean));
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(releases.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_no_signal_no_outcome() {
        let resource = CountingResource::default();
        let releases = Arc::clone(&resource.releases);
        let coordinator = Arc::new(LifecycleCoordinator::new(
            ResourceHandle::new(resource),
            Duration::from_secs(5),
        ));

        let outcome = drive(Arc::clone(&coordinator), stream::empty::<&'static str>()).await;

        assert_eq!(outcome, None);
        assert_eq!(releases.load(Ordering::SeqCst), 0);
    }
}
