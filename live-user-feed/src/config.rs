use std::time::Duration;

use clap::ValueEnum;

pub const DEFAULT_DELIVERY_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_SUBSCRIBER_BUFFER: usize = 32;

/// Whether a mutation is announced when the store rejected it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum BroadcastPolicy {
    /// Announce every attempted mutation, failed or not.
    #[default]
    Always,
    /// Announce only mutations the store accepted.
    OnSuccess,
}

impl BroadcastPolicy {
    pub fn should_broadcast(self, store_succeeded: bool) -> bool {
        match self {
            BroadcastPolicy::Always => true,
            BroadcastPolicy::OnSuccess => store_succeeded,
        }
    }
}

/// Runtime knobs for the feed server.
#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// How long one delivery may wait for a subscriber's queue or socket.
    pub delivery_timeout: Duration,
    /// Frames buffered per subscriber before deliveries start waiting.
    pub subscriber_buffer: usize,
    pub broadcast_policy: BroadcastPolicy,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            delivery_timeout: DEFAULT_DELIVERY_TIMEOUT,
            subscriber_buffer: DEFAULT_SUBSCRIBER_BUFFER,
            broadcast_policy: BroadcastPolicy::default(),
        }
    }
}
