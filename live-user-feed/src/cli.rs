use std::{net::SocketAddr, time::Duration};

use clap::{Args, Parser, Subcommand};

use crate::config::{BroadcastPolicy, FeedConfig};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Serve the user API and the live event feed.
    Serve(ServeArgs),
    /// Connect to a running server and print every event it broadcasts.
    Watch(WatchArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
    /// Socket address to bind. Use port 0 for an ephemeral port.
    #[arg(long, env = "LIVE_USER_FEED_LISTEN", default_value = "127.0.0.1:8000")]
    pub listen: SocketAddr,

    /// Milliseconds a single subscriber may take to accept an event before it is dropped.
    #[arg(long, env = "LIVE_USER_FEED_DELIVERY_TIMEOUT_MS", default_value_t = 5000)]
    pub delivery_timeout_ms: u64,

    /// Events queued per subscriber before deliveries have to wait.
    #[arg(long, env = "LIVE_USER_FEED_SUBSCRIBER_BUFFER", default_value_t = 32)]
    pub subscriber_buffer: usize,

    /// Whether failed mutations are still broadcast.
    #[arg(
        long,
        env = "LIVE_USER_FEED_BROADCAST_POLICY",
        value_enum,
        default_value_t = BroadcastPolicy::Always
    )]
    pub broadcast_policy: BroadcastPolicy,
}

impl ServeArgs {
    pub fn feed_config(&self) -> FeedConfig {
        FeedConfig {
            delivery_timeout: Duration::from_millis(self.delivery_timeout_ms),
            subscriber_buffer: self.subscriber_buffer,
            broadcast_policy: self.broadcast_policy,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct WatchArgs {
    /// Address of the server to subscribe to.
    #[arg(long, default_value = "127.0.0.1:8000")]
    pub server: SocketAddr,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serve_defaults_match_feed_config_defaults() {
        let cli = Cli::try_parse_from(["live_user_feed", "serve"]).expect("parse");
        let Command::Serve(args) = cli.command else {
            panic!("expected serve command");
        };

        let config = args.feed_config();
        let defaults = FeedConfig::default();
        assert_eq!(config.delivery_timeout, defaults.delivery_timeout);
        assert_eq!(config.subscriber_buffer, defaults.subscriber_buffer);
        assert_eq!(config.broadcast_policy, BroadcastPolicy::Always);
    }

    #[test]
    fn serve_accepts_on_success_policy() {
        let cli = Cli::try_parse_from([
            "live_user_feed",
            "serve",
            "--listen",
            "127.0.0.1:0",
            "--broadcast-policy",
            "on-success",
            "--delivery-timeout-ms",
            "250",
        ])
        .expect("parse");
        let Command::Serve(args) = cli.command else {
            panic!("expected serve command");
        };

        assert_eq!(args.listen.port(), 0);
        assert_eq!(args.broadcast_policy, BroadcastPolicy::OnSuccess);
        assert_eq!(args.feed_config().delivery_timeout, Duration::from_millis(250));
    }
}
