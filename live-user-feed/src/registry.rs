//! Live subscriber bookkeeping.
//!
//! Every accepted WebSocket connection owns one [`Subscriber`] handle for as
//! long as it is open. The handle is the sending half of a bounded queue that
//! the connection's writer drains, so pushing a frame into it is the delivery
//! attempt the broadcaster waits on.

use std::{
    collections::BTreeMap,
    fmt,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use thiserror::Error;
use tokio::sync::{
    mpsc::{self, error::SendTimeoutError},
    Mutex,
};

/// A serialized event, shared by every subscriber of one broadcast.
pub type Frame = Arc<str>;

/// Receiving end of a subscriber's queue, owned by its connection.
pub type Inbox = mpsc::Receiver<Frame>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriberId(u64);

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("subscriber connection is closed")]
    Closed,
    #[error("subscriber did not accept the frame within {0:?}")]
    TimedOut(Duration),
}

/// Handle to one live connection.
#[derive(Debug, Clone)]
pub struct Subscriber {
    id: SubscriberId,
    outbox: mpsc::Sender<Frame>,
}

impl Subscriber {
    pub fn new(id: SubscriberId, outbox: mpsc::Sender<Frame>) -> Self {
        Self { id, outbox }
    }

    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Queues `frame` for the connection, waiting at most `timeout` for room.
    pub async fn deliver(&self, frame: Frame, timeout: Duration) -> Result<(), DeliveryError> {
        self.outbox
            .send_timeout(frame, timeout)
            .await
            .map_err(|err| match err {
                SendTimeoutError::Closed(_) => DeliveryError::Closed,
                SendTimeoutError::Timeout(_) => DeliveryError::TimedOut(timeout),
            })
    }
}

/// The set of connections currently eligible for events.
///
/// All access goes through the internal lock; callers never hold it across
/// their own awaits.
#[derive(Debug, Default)]
pub struct SubscriberRegistry {
    members: Mutex<BTreeMap<SubscriberId, Subscriber>>,
    next_id: AtomicU64,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&self) -> SubscriberId {
        SubscriberId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1)
    }

    /// Creates a fresh subscriber with a queue of `buffer` frames and registers it.
    pub async fn accept(&self, buffer: usize) -> (Subscriber, Inbox) {
        let (outbox, inbox) = mpsc::channel(buffer.max(1));
        let subscriber = Subscriber::new(self.next_id(), outbox);
        self.register(subscriber.clone()).await;
        (subscriber, inbox)
    }

    pub async fn register(&self, subscriber: Subscriber) {
        let mut members = self.members.lock().await;
        members.insert(subscriber.id(), subscriber);
    }

    /// Removes `id` if it is still present. Returns whether anything was removed.
    pub async fn unregister(&self, id: SubscriberId) -> bool {
        let mut members = self.members.lock().await;
        members.remove(&id).is_some()
    }

    /// Copies the current members, in registration order.
    pub async fn snapshot(&self) -> Vec<Subscriber> {
        let members = self.members.lock().await;
        members.values().cloned().collect()
    }

    pub async fn contains(&self, id: SubscriberId) -> bool {
        self.members.lock().await.contains_key(&id)
    }

    pub async fn len(&self) -> usize {
        self.members.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
