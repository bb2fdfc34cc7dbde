//! Broadcast coordinator.
//!
//! A single dispatcher task owns delivery. [`Broadcaster::broadcast`] queues the
//! encoded frame before its first await point and then waits for the report, so
//! a caller that is dropped mid-broadcast (for example an HTTP handler whose
//! client went away) cannot cancel or truncate delivery. Frames are dispatched
//! one at a time in queue order, which keeps each subscriber's events in the
//! order the broadcasts were issued.

use std::{sync::Arc, time::Duration};

use futures::future::join_all;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::{
    event::MutationEvent,
    registry::{Frame, SubscriberId, SubscriberRegistry},
};

/// Outcome of one broadcast, for logging and tests. Never an error.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: usize,
    pub dropped: Vec<SubscriberId>,
}

struct BroadcastJob {
    frame: Frame,
    respond_to: oneshot::Sender<BroadcastReport>,
}

/// Fans mutation events out to every registered subscriber.
///
/// Must be created inside a Tokio runtime; the dispatcher stops once the
/// broadcaster is dropped and the queued jobs are done.
pub struct Broadcaster {
    registry: Arc<SubscriberRegistry>,
    jobs: mpsc::UnboundedSender<BroadcastJob>,
}

impl Broadcaster {
    pub fn new(registry: Arc<SubscriberRegistry>, delivery_timeout: Duration) -> Self {
        let (jobs, queue) = mpsc::unbounded_channel();
        tokio::spawn(run_dispatcher(
            Arc::clone(&registry),
            delivery_timeout,
            queue,
        ));
        Self { registry, jobs }
    }

    pub fn registry(&self) -> &Arc<SubscriberRegistry> {
        &self.registry
    }

    pub async fn broadcast(&self, event: &MutationEvent) -> BroadcastReport {
        let frame = match event.to_frame() {
            Ok(frame) => frame,
            Err(err) => {
                warn!(action = %event.action, error = ?err, "failed to encode event");
                return BroadcastReport::default();
            }
        };

        let report = self.broadcast_frame(frame).await;
        debug!(
            action = %event.action,
            delivered = report.delivered,
            dropped = report.dropped.len(),
            "event broadcast"
        );
        report
    }

    /// Queues `frame` for every subscriber and waits until all delivery
    /// attempts for it have resolved.
    pub fn broadcast_frame(
        &self,
        frame: Frame,
    ) -> impl std::future::Future<Output = BroadcastReport> + Send + 'static {
        let (respond_to, report) = oneshot::channel();
        let queued = self.jobs.send(BroadcastJob { frame, respond_to }).is_ok();
        if !queued {
            warn!("broadcast dispatcher has stopped");
        }

        async move {
            match report.await {
                Ok(report) => report,
                Err(_) => BroadcastReport::default(),
            }
        }
    }
}

async fn run_dispatcher(
    registry: Arc<SubscriberRegistry>,
    delivery_timeout: Duration,
    mut queue: mpsc::UnboundedReceiver<BroadcastJob>,
) {
    while let Some(BroadcastJob { frame, respond_to }) = queue.recv().await {
        let report = deliver_to_all(&registry, frame, delivery_timeout).await;
        // The caller may have gone away; delivery already happened regardless.
        let _ = respond_to.send(report);
    }
    debug!("broadcast dispatcher stopped");
}

/// Delivers `frame` to a snapshot of the registry and unregisters every
/// subscriber that could not take it.
async fn deliver_to_all(
    registry: &SubscriberRegistry,
    frame: Frame,
    delivery_timeout: Duration,
) -> BroadcastReport {
    let subscribers = registry.snapshot().await;

    let attempts = subscribers.iter().map(|subscriber| {
        let frame = Arc::clone(&frame);
        async move {
            let outcome = subscriber.deliver(frame, delivery_timeout).await;
            (subscriber.id(), outcome)
        }
    });
    let outcomes = join_all(attempts).await;

    let mut report = BroadcastReport::default();
    for (id, outcome) in outcomes {
        match outcome {
            Ok(()) => report.delivered += 1,
            Err(err) => {
                debug!(subscriber = %id, error = %err, "delivery failed");
                if registry.unregister(id).await {
                    info!(subscriber = %id, "subscriber dropped after failed delivery");
                }
                report.dropped.push(id);
            }
        }
    }

    report
}
