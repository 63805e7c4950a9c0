//! Fan-out of events to connected observers.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError, Weak},
    time::Duration,
};

use futures::stream::BoxStream;
use tokio::{sync::mpsc, task::JoinHandle, time::MissedTickBehavior};
use uuid::Uuid;

use crate::event::{Event, Frame};

/// Observer identifier.
pub type ObserverId = Uuid;

/// Default heartbeat period.
pub const DEFAULT_HEARTBEAT: Duration = Duration::from_secs(30);

/// Frames buffered per observer before it counts as stalled.
const OBSERVER_BUFFER: usize = 256;

/// Broadcast hub.
///
/// Fan-out never waits on an observer: each one has a bounded buffer, and
/// an observer whose buffer is full or whose receiver is gone is removed
/// during the write. Every frame is offered to all observers while the set
/// is locked, so a single observer sees frames in `publish` order.
pub struct Hub {
    observers: Mutex<HashMap<ObserverId, mpsc::Sender<Frame>>>,
    heartbeat: Mutex<Option<JoinHandle<()>>>,
}

impl Default for Hub {
    fn default() -> Self {
        Self::new()
    }
}

impl Hub {
    #[must_use]
    pub fn new() -> Self {
        Self {
            observers: Mutex::new(HashMap::new()),
            heartbeat: Mutex::new(None),
        }
    }

    /// Register an observer.
    ///
    /// `snapshot` runs while the observer set is locked and its events are
    /// queued before anything published afterwards.
    pub fn subscribe<F>(self: &Arc<Self>, snapshot: F) -> Subscription
    where
        F: FnOnce() -> Vec<Event>,
    {
        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::channel(OBSERVER_BUFFER);

        let mut observers = self.observers.lock().unwrap_or_else(PoisonError::into_inner);
        for event in snapshot() {
            // A fresh channel only rejects when the snapshot outgrows its buffer.
            let _ = tx.try_send(Frame::Event(event));
        }
        observers.insert(id, tx);
        let total = observers.len();
        drop(observers);

        tracing::debug!(observer = %id, total, "Observer subscribed");
        Subscription {
            id,
            rx,
            hub: Arc::downgrade(self),
        }
    }

    /// Remove an observer. Returns whether it was registered.
    pub fn unsubscribe(&self, id: ObserverId) -> bool {
        let removed = self
            .observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id)
            .is_some();
        if removed {
            tracing::debug!(observer = %id, "Observer unsubscribed");
        }
        removed
    }

    /// Deliver `event` to every observer. Returns the number reached.
    pub fn publish(&self, event: Event) -> usize {
        tracing::trace!(event = event.event_type(), "Publishing event");
        self.fan_out(&Frame::Event(event))
    }

    /// Send one heartbeat to every observer. Returns the number reached.
    pub fn heartbeat(&self) -> usize {
        self.fan_out(&Frame::Heartbeat)
    }

    fn fan_out(&self, frame: &Frame) -> usize {
        let mut observers = self.observers.lock().unwrap_or_else(PoisonError::into_inner);
        observers.retain(|id, tx| match tx.try_send(frame.clone()) {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!(observer = %id, "Dropping observer: {e}");
                false
            }
        });
        observers.len()
    }

    /// Number of registered observers.
    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Start the periodic heartbeat, replacing any running one.
    pub fn start_heartbeat(self: &Arc<Self>, period: Duration) {
        let hub = Arc::downgrade(self);
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            ticker.tick().await;

            loop {
                ticker.tick().await;
                let Some(hub) = hub.upgrade() else { break };
                hub.heartbeat();
            }
        });

        let previous = self
            .heartbeat
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(task);
        if let Some(previous) = previous {
            previous.abort();
        }
    }

    /// Cancel the heartbeat and drop every observer.
    pub fn shutdown(&self) {
        if let Some(task) = self
            .heartbeat
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            task.abort();
        }
        self.observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl Drop for Hub {
    fn drop(&mut self) {
        if let Some(task) = self
            .heartbeat
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            task.abort();
        }
    }
}

/// Receiving end of one observer; unsubscribes on drop.
pub struct Subscription {
    id: ObserverId,
    rx: mpsc::Receiver<Frame>,
    hub: Weak<Hub>,
}

impl Subscription {
    #[must_use]
    pub const fn id(&self) -> ObserverId {
        self.id
    }

    /// Wait for the next frame. `None` once the hub dropped this observer.
    pub async fn recv(&mut self) -> Option<Frame> {
        self.rx.recv().await
    }

    /// Next frame if one is already queued.
    pub fn try_recv(&mut self) -> Option<Frame> {
        self.rx.try_recv().ok()
    }

    /// Stream of frames; dropping the stream unsubscribes.
    #[must_use]
    pub fn into_stream(self) -> BoxStream<'static, Frame> {
        Box::pin(futures::stream::unfold(self, |mut sub| async move {
            sub.rx.recv().await.map(|frame| (frame, sub))
        }))
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(hub) = self.hub.upgrade() {
            hub.unsubscribe(self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{stats::StatsRecord, traits::SessionStatus};

    fn snapshot() -> Vec<Event> {
        vec![
            Event::StateSnapshot(SessionStatus::default()),
            Event::StatsUpdated(StatsRecord::default()),
        ]
    }

    #[tokio::test]
    async fn test_snapshot_arrives_first() {
        let hub = Arc::new(Hub::new());
        let mut sub = hub.subscribe(snapshot);
        hub.publish(Event::LandsChanged { count: 2 });

        assert!(matches!(
            sub.recv().await,
            Some(Frame::Event(Event::StateSnapshot(_)))
        ));
        assert!(matches!(
            sub.recv().await,
            Some(Frame::Event(Event::StatsUpdated(_)))
        ));
        assert_eq!(
            sub.recv().await,
            Some(Frame::Event(Event::LandsChanged { count: 2 }))
        );
    }

    #[tokio::test]
    async fn test_publish_order_per_observer() {
        let hub = Arc::new(Hub::new());
        let mut sub = hub.subscribe(Vec::new);

        for count in 0..20 {
            hub.publish(Event::LandsChanged { count });
        }
        for count in 0..20 {
            assert_eq!(
                sub.recv().await,
                Some(Frame::Event(Event::LandsChanged { count }))
            );
        }
    }

    #[tokio::test]
    async fn test_failed_observer_removed_others_still_served() {
        let hub = Arc::new(Hub::new());
        let mut healthy = hub.subscribe(Vec::new);

        // An observer whose receiver vanished without unsubscribing.
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        hub.observers.lock().unwrap().insert(Uuid::new_v4(), tx);
        assert_eq!(hub.observer_count(), 2);

        let reached = hub.publish(Event::FriendApplication { count: 1 });
        assert_eq!(reached, 1);
        assert_eq!(hub.observer_count(), 1);
        assert_eq!(
            healthy.recv().await,
            Some(Frame::Event(Event::FriendApplication { count: 1 }))
        );
    }

    #[tokio::test]
    async fn test_stalled_observer_removed() {
        let hub = Arc::new(Hub::new());
        let _stalled = hub.subscribe(Vec::new);

        for count in 0..=OBSERVER_BUFFER {
            hub.publish(Event::LandsChanged { count });
        }
        assert_eq!(hub.observer_count(), 0);
    }

    #[tokio::test]
    async fn test_drop_unsubscribes() {
        let hub = Arc::new(Hub::new());
        let sub = hub.subscribe(Vec::new);
        let id = sub.id();
        drop(sub);

        assert_eq!(hub.observer_count(), 0);
        assert!(!hub.unsubscribe(id));
    }

    #[tokio::test]
    async fn test_dropped_stream_unsubscribes() {
        let hub = Arc::new(Hub::new());
        let stream = hub.subscribe(Vec::new).into_stream();
        assert_eq!(hub.observer_count(), 1);
        drop(stream);
        assert_eq!(hub.observer_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_heartbeat_period() {
        let hub = Arc::new(Hub::new());
        let mut sub = hub.subscribe(Vec::new);
        hub.start_heartbeat(Duration::from_secs(30));

        tokio::time::sleep(Duration::from_secs(29)).await;
        assert_eq!(sub.try_recv(), None);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(sub.try_recv(), Some(Frame::Heartbeat));

        hub.shutdown();
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(sub.try_recv(), None);
    }
}
