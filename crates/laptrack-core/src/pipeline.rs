//! Startup and shutdown of the two singleton tasks.
//!
//! [`LapPipeline::start`] builds every channel, spawns the ingestion
//! coordinator and the broadcast hub, and hands back the sending ends that
//! connection handlers need. Nothing is global: tests start as many
//! isolated pipelines as they like.
//!
//! # Shutdown handshake
//!
//! Each singleton runs inside a wrapper that signals a dedicated `done`
//! channel the moment the task returns (after it has released its store).
//! [`LapPipeline::shutdown`] sends quit to the coordinator, waits for its
//! acknowledgment, then does the same for the hub. Each wait is bounded by
//! the grace interval so a wedged task cannot hang the process.
//!
//! Quit is not a drop: both singletons close their inbound channels and
//! finish whatever was already buffered before acknowledging.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use laptrack_types::TagId;
use tokio::sync::{mpsc, oneshot};
use tracing::{error, info, warn};

use crate::config::ChannelConfig;
use crate::coordinator::IngestionCoordinator;
use crate::hub::{BroadcastHub, HubHandle};
use crate::store::LapStore;

/// Quit/done pair for one long-lived task.
#[derive(Debug)]
pub struct SingletonHandle {
    name: &'static str,
    quit: oneshot::Sender<()>,
    done: oneshot::Receiver<()>,
}

impl SingletonHandle {
    /// Spawn `task` on the runtime. `task` receives the quit signal and
    /// must return once it fires; `done` is signalled right after.
    pub fn spawn<F, Fut>(name: &'static str, task: F) -> Self
    where
        F: FnOnce(oneshot::Receiver<()>) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (quit, quit_rx) = oneshot::channel();
        let (done_tx, done) = oneshot::channel();
        let fut = task(quit_rx);
        tokio::spawn(async move {
            fut.await;
            // The receiver may already be gone if nobody waits for shutdown.
            let _ = done_tx.send(());
        });
        Self { name, quit, done }
    }

    /// Signal quit and wait up to `grace` for the task to acknowledge.
    ///
    /// Returns `true` once the task has exited (cleanly or by panic), and
    /// `false` if it is still running after `grace`.
    pub async fn stop(self, grace: Duration) -> bool {
        // Err means the task already returned and dropped its receiver.
        let _ = self.quit.send(());
        match tokio::time::timeout(grace, self.done).await {
            Ok(Ok(())) => {
                info!(task = self.name, "task acknowledged quit");
                true
            }
            Ok(Err(_)) => {
                warn!(task = self.name, "task exited without acknowledging (panicked)");
                true
            }
            Err(_) => {
                error!(
                    task = self.name,
                    grace_ms = grace.as_millis(),
                    "task did not acknowledge quit within grace period"
                );
                false
            }
        }
    }
}

/// Outcome of [`LapPipeline::shutdown`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShutdownReport {
    /// The ingestion coordinator exited within the grace period.
    pub coordinator_stopped: bool,
    /// The broadcast hub exited within the grace period.
    pub hub_stopped: bool,
}

impl ShutdownReport {
    /// Both singletons exited; collaborator handles are safe to release.
    pub const fn is_clean(&self) -> bool {
        self.coordinator_stopped && self.hub_stopped
    }
}

/// The running ingestion + broadcast pipeline.
#[derive(Debug)]
pub struct LapPipeline {
    tags: mpsc::Sender<TagId>,
    hub: HubHandle,
    coordinator: SingletonHandle,
    broadcaster: SingletonHandle,
}

impl LapPipeline {
    /// Create the channels and spawn both singleton tasks.
    ///
    /// `connect` yields the coordinator's store. It is awaited inside the
    /// coordinator task; if it fails the error is logged and the coordinator
    /// exits, closing the tag channel. The hub keeps running, so displays
    /// still connect and the process stays up in a degraded state.
    pub fn start<S, F, E>(connect: F, channels: &ChannelConfig) -> Self
    where
        S: LapStore + Sync,
        F: Future<Output = Result<S, E>> + Send + 'static,
        E: Display + Send + 'static,
    {
        let (tags, tag_rx) = mpsc::channel(channels.tag_capacity);
        let (notify_tx, notify_rx) = mpsc::channel(channels.notification_capacity);
        let (hub, hub_handle) = BroadcastHub::new(notify_rx, channels.control_capacity);

        let coordinator = SingletonHandle::spawn("ingestion-coordinator", move |mut quit| async move {
            // A store that is already available wins over quit, so reads
            // accepted before shutdown still get applied by the drain.
            let store = tokio::select! {
                biased;
                store = connect => match store {
                    Ok(store) => store,
                    Err(e) => {
                        error!(error = %e, "ingestion coordinator could not obtain a store, lap ingestion disabled");
                        return;
                    }
                },
                _ = &mut quit => {
                    info!("quit before the store was ready");
                    return;
                }
            };
            IngestionCoordinator::new(store, tag_rx, notify_tx).run(quit).await;
        });

        let broadcaster = SingletonHandle::spawn("broadcast-hub", move |quit| async move {
            hub.run(quit).await;
        });

        Self {
            tags,
            hub: hub_handle,
            coordinator,
            broadcaster,
        }
    }

    /// Sender reader connections push tag reads into.
    pub fn tags(&self) -> mpsc::Sender<TagId> {
        self.tags.clone()
    }

    /// Handle display connections register through.
    pub fn hub(&self) -> HubHandle {
        self.hub.clone()
    }

    /// Quit the coordinator, then the hub, waiting up to `grace` for each
    /// to acknowledge.
    pub async fn shutdown(self, grace: Duration) -> ShutdownReport {
        let Self {
            tags,
            hub,
            coordinator,
            broadcaster,
        } = self;
        drop(tags);
        drop(hub);

        // Upstream first: the coordinator drains buffered reads into a hub
        // that is still running, then the hub drains what it was handed.
        let coordinator_stopped = coordinator.stop(grace).await;
        let hub_stopped = broadcaster.stop(grace).await;

        let report = ShutdownReport {
            coordinator_stopped,
            hub_stopped,
        };
        if report.is_clean() {
            info!("pipeline shut down cleanly");
        } else {
            warn!(?report, "pipeline shutdown incomplete");
        }
        report
    }
}
