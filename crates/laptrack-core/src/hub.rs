//! Broadcast hub: the single owner of the display membership set.
//!
//! Display connections never touch each other or a shared map. Each one
//! builds a [`Subscriber`] (an id plus the sending half of its own bounded
//! queue), hands it to the hub through [`HubHandle::register`], and later
//! withdraws it with [`HubHandle::unregister`]. The hub task is the only
//! code that reads or writes the membership map, so no lock is needed.
//!
//! # Fan-out
//!
//! Notifications arrive on one channel and are processed one at a time, so
//! every display observes them in the order the ingestion coordinator
//! produced them. Each notification is wrapped in an [`Arc`] once and
//! offered to every member with a non-blocking `try_send`: a display whose
//! queue is full misses that notification instead of stalling delivery to
//! everyone else. The hub never evicts a member; a display is removed only
//! when its own connection task unregisters after a failed write.

use std::collections::HashMap;
use std::sync::Arc;

use laptrack_types::{Notification, SubscriberId};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, trace, warn};

/// Receiving half of a subscriber's delivery queue.
pub type DeliveryQueue = mpsc::Receiver<Arc<Notification>>;

/// A registered display connection as the hub sees it.
#[derive(Debug)]
pub struct Subscriber {
    id: SubscriberId,
    queue: mpsc::Sender<Arc<Notification>>,
}

impl Subscriber {
    /// Mint a subscriber with a fresh id and a delivery queue holding at
    /// most `capacity` undelivered notifications.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero (see [`mpsc::channel`]); configuration
    /// validation rejects that value.
    pub fn channel(capacity: usize) -> (Self, DeliveryQueue) {
        let (queue, rx) = mpsc::channel(capacity);
        let subscriber = Self {
            id: SubscriberId::new(),
            queue,
        };
        (subscriber, rx)
    }

    /// This subscriber's identity.
    pub const fn id(&self) -> SubscriberId {
        self.id
    }
}

/// The hub task is gone; registration is impossible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("broadcast hub is not running")]
pub struct HubClosed;

/// Cloneable front door to the hub, held by every display connection.
#[derive(Debug, Clone)]
pub struct HubHandle {
    register: mpsc::Sender<Subscriber>,
    unregister: mpsc::Sender<SubscriberId>,
}

impl HubHandle {
    /// Add a subscriber to the membership set.
    ///
    /// # Errors
    ///
    /// Returns [`HubClosed`] if the hub task has exited.
    pub async fn register(&self, subscriber: Subscriber) -> Result<(), HubClosed> {
        self.register.send(subscriber).await.map_err(|_closed| HubClosed)
    }

    /// Remove a subscriber. Unknown ids are ignored by the hub.
    ///
    /// # Errors
    ///
    /// Returns [`HubClosed`] if the hub task has exited.
    pub async fn unregister(&self, id: SubscriberId) -> Result<(), HubClosed> {
        self.unregister.send(id).await.map_err(|_closed| HubClosed)
    }

    /// Create a subscriber with a `capacity`-deep queue and register it.
    ///
    /// # Errors
    ///
    /// Returns [`HubClosed`] if the hub task has exited.
    pub async fn subscribe(
        &self,
        capacity: usize,
    ) -> Result<(SubscriberId, DeliveryQueue), HubClosed> {
        let (subscriber, queue) = Subscriber::channel(capacity);
        let id = subscriber.id();
        self.register(subscriber).await?;
        Ok((id, queue))
    }
}

/// Counters reported when the hub exits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HubStats {
    /// Notifications received from the coordinator.
    pub notifications: u64,
    /// Successful per-subscriber enqueues.
    pub delivered: u64,
    /// Per-subscriber enqueues skipped because the queue was full.
    pub dropped_full: u64,
    /// Members still registered at exit.
    pub members_at_exit: usize,
}

/// The hub task. Build with [`BroadcastHub::new`], then [`run`](Self::run).
pub struct BroadcastHub {
    members: HashMap<SubscriberId, mpsc::Sender<Arc<Notification>>>,
    register: mpsc::Receiver<Subscriber>,
    unregister: mpsc::Receiver<SubscriberId>,
    notifications: mpsc::Receiver<Notification>,
}

impl BroadcastHub {
    /// Create a hub fed by `notifications` and return the handle display
    /// connections use to join and leave. Register and unregister requests
    /// are buffered up to `control_capacity` each.
    pub fn new(
        notifications: mpsc::Receiver<Notification>,
        control_capacity: usize,
    ) -> (Self, HubHandle) {
        let (register_tx, register) = mpsc::channel(control_capacity);
        let (unregister_tx, unregister) = mpsc::channel(control_capacity);
        let hub = Self {
            members: HashMap::new(),
            register,
            unregister,
            notifications,
        };
        let handle = HubHandle {
            register: register_tx,
            unregister: unregister_tx,
        };
        (hub, handle)
    }

    /// Serve register, unregister, and notification events until `quit`
    /// fires or its sender is dropped.
    ///
    /// On quit, control messages and notifications already queued are
    /// still processed, in that order, so every notification the
    /// coordinator handed over reaches the members registered ahead of it.
    /// Remaining members are not told about the shutdown; their queues
    /// close when the membership map is dropped.
    pub async fn run(mut self, mut quit: oneshot::Receiver<()>) -> HubStats {
        let mut stats = HubStats::default();
        let mut register_open = true;
        let mut unregister_open = true;
        let mut notifications_open = true;
        info!("broadcast hub starting");

        loop {
            // Registration is polled before unregistration: a connection that
            // joins and leaves before the hub wakes must not leave a stale
            // entry behind. Both control arms go ahead of notifications so a
            // display that has registered sees the next notification; each
            // control message is O(1) and arrives at most twice per display
            // connection, so it cannot starve fan-out for long.
            tokio::select! {
                biased;
                _ = &mut quit => break,
                subscriber = self.register.recv(), if register_open => match subscriber {
                    Some(subscriber) => self.insert(subscriber),
                    None => register_open = false,
                },
                id = self.unregister.recv(), if unregister_open => match id {
                    Some(id) => self.remove(id),
                    None => unregister_open = false,
                },
                notification = self.notifications.recv(), if notifications_open => match notification {
                    Some(notification) => self.fan_out(notification, &mut stats),
                    None => {
                        debug!("notification channel closed");
                        notifications_open = false;
                    }
                },
            }
        }

        self.drain(&mut stats);
        stats.members_at_exit = self.members.len();
        info!(
            notifications = stats.notifications,
            delivered = stats.delivered,
            dropped_full = stats.dropped_full,
            members = stats.members_at_exit,
            "broadcast hub exiting"
        );
        stats
    }

    fn drain(&mut self, stats: &mut HubStats) {
        while let Ok(subscriber) = self.register.try_recv() {
            self.insert(subscriber);
        }
        while let Ok(id) = self.unregister.try_recv() {
            self.remove(id);
        }
        let before = stats.notifications;
        while let Ok(notification) = self.notifications.try_recv() {
            self.fan_out(notification, stats);
        }
        let drained = stats.notifications.saturating_sub(before);
        if drained > 0 {
            info!(drained, "fanned out queued notifications before exiting");
        }
    }

    fn insert(&mut self, subscriber: Subscriber) {
        let Subscriber { id, queue } = subscriber;
        self.members.insert(id, queue);
        debug!(subscriber = %id, members = self.members.len(), "subscriber registered");
    }

    fn remove(&mut self, id: SubscriberId) {
        if self.members.remove(&id).is_some() {
            debug!(subscriber = %id, members = self.members.len(), "subscriber unregistered");
        } else {
            trace!(subscriber = %id, "unregister for unknown subscriber ignored");
        }
    }

    fn fan_out(&self, notification: Notification, stats: &mut HubStats) {
        stats.notifications = stats.notifications.saturating_add(1);
        let shared = Arc::new(notification);

        for (id, queue) in &self.members {
            match queue.try_send(Arc::clone(&shared)) {
                Ok(()) => stats.delivered = stats.delivered.saturating_add(1),
                Err(TrySendError::Full(_)) => {
                    stats.dropped_full = stats.dropped_full.saturating_add(1);
                    warn!(
                        subscriber = %id,
                        team = shared.team,
                        laps = shared.laps,
                        "delivery queue full, subscriber misses this notification"
                    );
                }
                Err(TrySendError::Closed(_)) => {
                    // Its connection task is on the way to unregistering.
                    trace!(subscriber = %id, "delivery queue closed");
                }
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::time::Duration;

    use chrono::Utc;
    use laptrack_types::{TagId, TeamId};

    use super::*;

    fn lap(team: &str, laps: i64) -> Notification {
        Notification {
            team_id: TeamId(1),
            tag_id: TagId(42),
            team: team.to_owned(),
            laps,
            recorded_at: Utc::now(),
        }
    }

    struct Harness {
        notify: mpsc::Sender<Notification>,
        handle: HubHandle,
        quit: oneshot::Sender<()>,
        task: tokio::task::JoinHandle<HubStats>,
    }

    fn start_hub(control_capacity: usize) -> Harness {
        let (notify, rx) = mpsc::channel(16);
        let (hub, handle) = BroadcastHub::new(rx, control_capacity);
        let (quit, quit_rx) = oneshot::channel();
        let task = tokio::spawn(hub.run(quit_rx));
        Harness {
            notify,
            handle,
            quit,
            task,
        }
    }

    impl Harness {
        async fn stop(self) -> HubStats {
            self.quit.send(()).unwrap();
            self.task.await.unwrap()
        }
    }

    async fn recv(queue: &mut DeliveryQueue) -> Arc<Notification> {
        tokio::time::timeout(Duration::from_secs(1), queue.recv())
            .await
            .expect("delivery timed out")
            .expect("queue closed")
    }

    /// Round-trip a register through the hub so later sends are ordered
    /// after every earlier control message.
    async fn sync(handle: &HubHandle) {
        let (id, _queue) = handle.subscribe(1).await.unwrap();
        handle.unregister(id).await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    #[tokio::test]
    async fn every_member_receives_each_notification() {
        let h = start_hub(8);
        let (_a, mut qa) = h.handle.subscribe(8).await.unwrap();
        let (_b, mut qb) = h.handle.subscribe(8).await.unwrap();
        sync(&h.handle).await;

        h.notify.send(lap("Falcons", 7)).await.unwrap();

        let got_a = recv(&mut qa).await;
        let got_b = recv(&mut qb).await;
        assert_eq!(got_a.team, "Falcons");
        assert_eq!(got_a.laps, 7);
        // One allocation shared by every subscriber.
        assert!(Arc::ptr_eq(&got_a, &got_b));

        let stats = h.stop().await;
        assert_eq!(stats.notifications, 1);
        assert_eq!(stats.members_at_exit, 2);
    }

    #[tokio::test]
    async fn order_is_preserved_per_subscriber() {
        let h = start_hub(8);
        let (_a, mut qa) = h.handle.subscribe(32).await.unwrap();
        let (_b, mut qb) = h.handle.subscribe(32).await.unwrap();
        sync(&h.handle).await;

        for laps in 1..=20 {
            h.notify.send(lap("Falcons", laps)).await.unwrap();
        }
        for laps in 1..=20 {
            assert_eq!(recv(&mut qa).await.laps, laps);
            assert_eq!(recv(&mut qb).await.laps, laps);
        }
        h.stop().await;
    }

    #[tokio::test]
    async fn late_joiner_gets_no_replay() {
        let h = start_hub(8);
        let (_early, mut early) = h.handle.subscribe(8).await.unwrap();
        sync(&h.handle).await;

        h.notify.send(lap("Falcons", 1)).await.unwrap();
        assert_eq!(recv(&mut early).await.laps, 1);

        let (_late, mut late) = h.handle.subscribe(8).await.unwrap();
        sync(&h.handle).await;
        h.notify.send(lap("Falcons", 2)).await.unwrap();

        assert_eq!(recv(&mut late).await.laps, 2);
        assert_eq!(recv(&mut early).await.laps, 2);
        assert!(late.try_recv().is_err());
        h.stop().await;
    }

    #[tokio::test]
    async fn unregistered_member_receives_nothing_further() {
        let h = start_hub(8);
        let (gone, mut gone_q) = h.handle.subscribe(8).await.unwrap();
        let (_stay, mut stay_q) = h.handle.subscribe(8).await.unwrap();
        sync(&h.handle).await;

        h.notify.send(lap("Falcons", 1)).await.unwrap();
        assert_eq!(recv(&mut gone_q).await.laps, 1);
        assert_eq!(recv(&mut stay_q).await.laps, 1);

        h.handle.unregister(gone).await.unwrap();
        sync(&h.handle).await;
        h.notify.send(lap("Falcons", 2)).await.unwrap();
        assert_eq!(recv(&mut stay_q).await.laps, 2);

        // Hub dropped its sender for `gone`, so the queue is now closed.
        assert!(gone_q.recv().await.is_none());
        let stats = h.stop().await;
        assert_eq!(stats.members_at_exit, 1);
    }

    #[tokio::test]
    async fn unregistering_unknown_id_is_a_noop() {
        let h = start_hub(8);
        let (_a, mut qa) = h.handle.subscribe(8).await.unwrap();
        h.handle.unregister(SubscriberId::new()).await.unwrap();
        h.handle.unregister(SubscriberId::new()).await.unwrap();
        sync(&h.handle).await;

        h.notify.send(lap("Falcons", 3)).await.unwrap();
        assert_eq!(recv(&mut qa).await.laps, 3);
        let stats = h.stop().await;
        assert_eq!(stats.members_at_exit, 1);
    }

    #[tokio::test]
    async fn full_queue_does_not_stall_other_members() {
        let h = start_hub(8);
        let (_slow, mut slow) = h.handle.subscribe(1).await.unwrap();
        let (_fast, mut fast) = h.handle.subscribe(16).await.unwrap();
        sync(&h.handle).await;

        for laps in 1..=5 {
            h.notify.send(lap("Falcons", laps)).await.unwrap();
        }
        for laps in 1..=5 {
            assert_eq!(recv(&mut fast).await.laps, laps);
        }
        // Slow member kept only what fit.
        assert_eq!(recv(&mut slow).await.laps, 1);
        assert!(slow.try_recv().is_err());

        let stats = h.stop().await;
        assert_eq!(stats.dropped_full, 4);
    }

    #[tokio::test]
    async fn join_then_leave_before_hub_wakes_leaves_no_entry() {
        let (notify, rx) = mpsc::channel(4);
        let (hub, handle) = BroadcastHub::new(rx, 8);

        // Queue both control messages before the hub ever runs.
        let (subscriber, queue) = Subscriber::channel(4);
        let id = subscriber.id();
        handle.register(subscriber).await.unwrap();
        drop(queue);
        handle.unregister(id).await.unwrap();

        let (quit, quit_rx) = oneshot::channel();
        let task = tokio::spawn(hub.run(quit_rx));
        sync(&handle).await;
        notify.send(lap("Falcons", 1)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        quit.send(()).unwrap();

        let stats = task.await.unwrap();
        assert_eq!(stats.members_at_exit, 0);
        assert_eq!(stats.delivered, 0);
    }

    #[tokio::test]
    async fn queued_notifications_are_delivered_after_quit() {
        let (notify, rx) = mpsc::channel(8);
        let (hub, handle) = BroadcastHub::new(rx, 8);
        let (_id, mut queue) = handle.subscribe(8).await.unwrap();
        for laps in 1..=3 {
            notify.send(lap("Falcons", laps)).await.unwrap();
        }

        // Quit is already waiting when the hub first wakes.
        let (quit, quit_rx) = oneshot::channel();
        quit.send(()).unwrap();
        let stats = hub.run(quit_rx).await;

        assert_eq!(stats.notifications, 3);
        assert_eq!(stats.delivered, 3);
        for laps in 1..=3 {
            assert_eq!(recv(&mut queue).await.laps, laps);
        }
        assert!(queue.recv().await.is_none());
    }

    #[tokio::test]
    async fn quit_closes_member_queues() {
        let h = start_hub(8);
        let (_a, mut qa) = h.handle.subscribe(8).await.unwrap();
        let handle = h.handle.clone();
        sync(&handle).await;
        h.stop().await;

        assert!(qa.recv().await.is_none());
        assert_eq!(handle.subscribe(1).await.err(), Some(HubClosed));
    }
}
