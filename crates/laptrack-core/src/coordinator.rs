//! Ingestion coordinator: the single writer of lap counts.
//!
//! Reader connections push [`TagId`]s into a bounded channel. This task is
//! the only consumer; it applies each read through its exclusively owned
//! [`LapStore`] and forwards the resulting [`Notification`] to the broadcast
//! hub. Because only one task ever calls
//! [`increment_laps`](LapStore::increment_laps), increments are serialized
//! no matter how many readers are connected.
//!
//! ```text
//! /laps adapters --tags--> IngestionCoordinator --notifications--> BroadcastHub
//!                                 |
//!                                 +-- LapStore (read-modify-write)
//! ```

use laptrack_types::{Notification, TagId};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::store::LapStore;

/// Counters reported when the coordinator exits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestionStats {
    /// Tag reads that produced a lap increment.
    pub applied: u64,
    /// Tag reads the store refused (unknown tag, storage failure).
    pub rejected: u64,
    /// Increments whose notification could not be handed to the hub.
    pub undelivered: u64,
}

/// The ingestion task. Construct with its channels, then [`run`](Self::run).
pub struct IngestionCoordinator<S> {
    store: S,
    tags: mpsc::Receiver<TagId>,
    notifications: mpsc::Sender<Notification>,
}

impl<S: LapStore> IngestionCoordinator<S> {
    /// Wire a coordinator to its store and channels.
    pub const fn new(
        store: S,
        tags: mpsc::Receiver<TagId>,
        notifications: mpsc::Sender<Notification>,
    ) -> Self {
        Self {
            store,
            tags,
            notifications,
        }
    }

    /// Consume tag reads until `quit` fires (or its sender is dropped), or
    /// until every tag sender is gone. Closes the store before returning.
    ///
    /// On quit the tag channel is closed to new reads and everything
    /// already accepted into it is still applied and forwarded, so a read
    /// a reader was told succeeded is never silently lost.
    pub async fn run(mut self, mut quit: oneshot::Receiver<()>) -> IngestionStats {
        let mut stats = IngestionStats::default();
        let mut pending = None;
        info!("ingestion coordinator starting");

        loop {
            let tag_id = tokio::select! {
                biased;
                _ = &mut quit => break,
                next = self.tags.recv() => match next {
                    Some(tag_id) => tag_id,
                    None => {
                        debug!("tag channel closed");
                        break;
                    }
                },
            };

            let Some(notification) = self.apply(tag_id, &mut stats).await else {
                continue;
            };

            // The hub may apply backpressure here; quit still wins and the
            // notification is handed over during the drain below.
            tokio::select! {
                biased;
                _ = &mut quit => {
                    pending = Some(notification);
                    break;
                }
                permit = self.notifications.reserve() => match permit {
                    Ok(permit) => permit.send(notification),
                    Err(_closed) => {
                        stats.undelivered = stats.undelivered.saturating_add(1);
                        warn!(%tag_id, "notification channel closed, notification dropped");
                    }
                },
            }
        }

        self.drain(pending, &mut stats).await;
        self.store.close().await;
        info!(
            applied = stats.applied,
            rejected = stats.rejected,
            undelivered = stats.undelivered,
            "ingestion coordinator exiting"
        );
        stats
    }

    async fn apply(&mut self, tag_id: TagId, stats: &mut IngestionStats) -> Option<Notification> {
        match self.store.increment_laps(tag_id).await {
            Ok(notification) => {
                stats.applied = stats.applied.saturating_add(1);
                debug!(
                    %tag_id,
                    team = notification.team,
                    laps = notification.laps,
                    "lap recorded"
                );
                Some(notification)
            }
            Err(e) => {
                stats.rejected = stats.rejected.saturating_add(1);
                warn!(%tag_id, error = %e, "lap increment failed, dropping tag read");
                None
            }
        }
    }

    /// Stop accepting reads, then apply and forward everything already
    /// buffered. Sends wait on the hub, which is still running at this
    /// point; the pipeline bounds the whole stop by its grace period.
    async fn drain(&mut self, pending: Option<Notification>, stats: &mut IngestionStats) {
        self.tags.close();
        if let Some(notification) = pending {
            self.forward(notification, stats).await;
        }
        let mut drained = 0_u64;
        while let Ok(tag_id) = self.tags.try_recv() {
            drained = drained.saturating_add(1);
            if let Some(notification) = self.apply(tag_id, stats).await {
                self.forward(notification, stats).await;
            }
        }
        if drained > 0 {
            info!(drained, "applied buffered tag reads before exiting");
        }
    }

    async fn forward(&self, notification: Notification, stats: &mut IngestionStats) {
        let tag_id = notification.tag_id;
        if self.notifications.send(notification).await.is_err() {
            stats.undelivered = stats.undelivered.saturating_add(1);
            warn!(%tag_id, "hub is gone, notification dropped");
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
pub(crate) mod tests {
    use std::collections::{BTreeMap, HashMap};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    use chrono::Utc;
    use laptrack_types::TeamId;

    use super::*;

    /// Unknown tag id.
    #[derive(Debug, thiserror::Error)]
    #[error("unknown tag {0}")]
    pub(crate) struct UnknownTag(pub TagId);

    /// Test double keyed by tag id. `closed` flips when the coordinator
    /// releases it.
    pub(crate) struct ScriptedStore {
        tags: HashMap<TagId, TeamId>,
        teams: HashMap<TeamId, (String, i64)>,
        pub(crate) closed: Arc<AtomicBool>,
    }

    impl ScriptedStore {
        pub(crate) fn new(rows: &[(i64, i64, &str)]) -> Self {
            let mut tags = HashMap::new();
            let mut teams = HashMap::new();
            for &(tag, team, name) in rows {
                tags.insert(TagId(tag), TeamId(team));
                teams.entry(TeamId(team)).or_insert_with(|| (name.to_owned(), 0));
            }
            Self {
                tags,
                teams,
                closed: Arc::new(AtomicBool::new(false)),
            }
        }

        pub(crate) fn with_laps(mut self, team: i64, laps: i64) -> Self {
            if let Some(entry) = self.teams.get_mut(&TeamId(team)) {
                entry.1 = laps;
            }
            self
        }
    }

    impl LapStore for ScriptedStore {
        type Error = UnknownTag;

        async fn increment_laps(&mut self, tag_id: TagId) -> Result<Notification, UnknownTag> {
            let team_id = *self.tags.get(&tag_id).ok_or(UnknownTag(tag_id))?;
            let (name, laps) = self.teams.get_mut(&team_id).ok_or(UnknownTag(tag_id))?;
            *laps += 1;
            Ok(Notification {
                team_id,
                tag_id,
                team: name.clone(),
                laps: *laps,
                recorded_at: Utc::now(),
            })
        }

        async fn close(self) {
            self.closed.store(true, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn tag_read_becomes_notification() {
        let store = ScriptedStore::new(&[(42, 1, "Falcons")]).with_laps(1, 6);
        let (tag_tx, tag_rx) = mpsc::channel(10);
        let (note_tx, mut note_rx) = mpsc::channel(10);
        let (_quit_tx, quit_rx) = oneshot::channel();

        let task = tokio::spawn(IngestionCoordinator::new(store, tag_rx, note_tx).run(quit_rx));

        tag_tx.send(TagId(42)).await.unwrap();
        let n = note_rx.recv().await.unwrap();
        assert_eq!(n.team, "Falcons");
        assert_eq!(n.laps, 7);
        assert_eq!(n.tag_id, TagId(42));

        drop(tag_tx);
        let stats = task.await.unwrap();
        assert_eq!(stats.applied, 1);
    }

    #[tokio::test]
    async fn unknown_tag_is_dropped_and_loop_survives() {
        let store = ScriptedStore::new(&[(10, 1, "Falcons")]);
        let (tag_tx, tag_rx) = mpsc::channel(10);
        let (note_tx, mut note_rx) = mpsc::channel(10);
        let (_quit_tx, quit_rx) = oneshot::channel();

        let task = tokio::spawn(IngestionCoordinator::new(store, tag_rx, note_tx).run(quit_rx));

        tag_tx.send(TagId(999)).await.unwrap();
        tag_tx.send(TagId(10)).await.unwrap();
        drop(tag_tx);

        let n = note_rx.recv().await.unwrap();
        assert_eq!(n.tag_id, TagId(10));
        assert!(note_rx.recv().await.is_none());

        let stats = task.await.unwrap();
        assert_eq!(stats.applied, 1);
        assert_eq!(stats.rejected, 1);
    }

    #[tokio::test]
    async fn concurrent_readers_never_lose_increments() {
        const READERS: i64 = 8;
        const READS_EACH: usize = 50;

        let rows: Vec<(i64, i64, &str)> = (0..READERS).map(|r| (r, r % 3, "team")).collect();
        let store = ScriptedStore::new(&rows);
        let (tag_tx, tag_rx) = mpsc::channel(4);
        let (note_tx, mut note_rx) = mpsc::channel(4);
        let (_quit_tx, quit_rx) = oneshot::channel();

        let task = tokio::spawn(IngestionCoordinator::new(store, tag_rx, note_tx).run(quit_rx));

        for reader in 0..READERS {
            let tx = tag_tx.clone();
            tokio::spawn(async move {
                for _ in 0..READS_EACH {
                    tx.send(TagId(reader)).await.unwrap();
                }
            });
        }
        drop(tag_tx);

        // Per team, laps must climb 1, 2, 3, ... with no gaps or repeats.
        let mut seen: BTreeMap<TeamId, Vec<i64>> = BTreeMap::new();
        while let Some(n) = note_rx.recv().await {
            seen.entry(n.team_id).or_default().push(n.laps);
        }
        let expected_total = usize::try_from(READERS).unwrap() * READS_EACH;
        let total: usize = seen.values().map(Vec::len).sum();
        assert_eq!(total, expected_total);
        for laps in seen.values() {
            let expected: Vec<i64> = (1..=i64::try_from(laps.len()).unwrap()).collect();
            assert_eq!(laps, &expected);
        }

        let stats = task.await.unwrap();
        assert_eq!(stats.applied, u64::try_from(expected_total).unwrap());
        assert_eq!(stats.rejected, 0);
    }

    #[tokio::test]
    async fn quit_releases_store() {
        let store = ScriptedStore::new(&[(1, 1, "Falcons")]);
        let closed = Arc::clone(&store.closed);
        let (_tag_tx, tag_rx) = mpsc::channel::<TagId>(10);
        let (note_tx, _note_rx) = mpsc::channel(10);
        let (quit_tx, quit_rx) = oneshot::channel();

        let task = tokio::spawn(IngestionCoordinator::new(store, tag_rx, note_tx).run(quit_rx));
        quit_tx.send(()).unwrap();
        let stats = task.await.unwrap();

        assert_eq!(stats, IngestionStats::default());
        assert!(closed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn quit_while_hub_is_saturated_still_forwards_in_flight() {
        let store = ScriptedStore::new(&[(1, 1, "Falcons")]);
        let (tag_tx, tag_rx) = mpsc::channel(10);
        // Capacity 1 and nobody draining yet: the second hand-off blocks.
        let (note_tx, mut note_rx) = mpsc::channel(1);
        let (quit_tx, quit_rx) = oneshot::channel();

        let task = tokio::spawn(IngestionCoordinator::new(store, tag_rx, note_tx).run(quit_rx));
        tag_tx.send(TagId(1)).await.unwrap();
        tag_tx.send(TagId(1)).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        quit_tx.send(()).unwrap();
        assert_eq!(note_rx.recv().await.unwrap().laps, 1);
        assert_eq!(note_rx.recv().await.unwrap().laps, 2);

        let stats = tokio::time::timeout(std::time::Duration::from_secs(1), task)
            .await
            .expect("coordinator must exit once the hub catches up")
            .unwrap();
        assert_eq!(stats.applied, 2);
        assert_eq!(stats.undelivered, 0);
    }

    #[tokio::test]
    async fn buffered_reads_are_applied_after_quit() {
        let store = ScriptedStore::new(&[(42, 1, "Falcons")]);
        let closed = Arc::clone(&store.closed);
        let (tag_tx, tag_rx) = mpsc::channel(10);
        let (note_tx, mut note_rx) = mpsc::channel(10);
        let (quit_tx, quit_rx) = oneshot::channel();

        // Everything is queued before the coordinator first wakes, and quit
        // is already waiting when it does.
        for _ in 0..5 {
            tag_tx.send(TagId(42)).await.unwrap();
        }
        quit_tx.send(()).unwrap();
        let stats = IngestionCoordinator::new(store, tag_rx, note_tx)
            .run(quit_rx)
            .await;

        assert_eq!(stats.applied, 5);
        assert_eq!(stats.undelivered, 0);
        for laps in 1..=5 {
            assert_eq!(note_rx.recv().await.unwrap().laps, laps);
        }
        assert!(closed.load(Ordering::SeqCst));
        // The reader side sees the channel closed from now on.
        assert!(tag_tx.send(TagId(42)).await.is_err());
    }

    #[tokio::test]
    async fn drain_stops_when_hub_is_gone() {
        let store = ScriptedStore::new(&[(42, 1, "Falcons")]);
        let (tag_tx, tag_rx) = mpsc::channel(10);
        let (note_tx, note_rx) = mpsc::channel(10);
        let (quit_tx, quit_rx) = oneshot::channel();
        drop(note_rx);

        tag_tx.send(TagId(42)).await.unwrap();
        tag_tx.send(TagId(42)).await.unwrap();
        quit_tx.send(()).unwrap();
        let stats = IngestionCoordinator::new(store, tag_rx, note_tx)
            .run(quit_rx)
            .await;

        assert_eq!(stats.applied, 2);
        assert_eq!(stats.undelivered, 2);
    }
}
