use std::{future::Future, net::SocketAddr, sync::Arc};

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::{
    api::{router, AppState},
    config::FeedConfig,
    coordinator::Broadcaster,
    registry::SubscriberRegistry,
    store::UserStore,
};

/// Owns the listener and the shared state behind every route.
pub struct FeedServer {
    listener: TcpListener,
    state: AppState,
}

impl FeedServer {
    pub fn new(listener: TcpListener, store: Arc<dyn UserStore>, config: FeedConfig) -> Self {
        let registry = Arc::new(SubscriberRegistry::new());
        let broadcaster = Arc::new(Broadcaster::new(registry, config.delivery_timeout));
        Self {
            listener,
            state: AppState {
                store,
                broadcaster,
                config: Arc::new(config),
            },
        }
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn broadcaster(&self) -> Arc<Broadcaster> {
        Arc::clone(&self.state.broadcaster)
    }

    pub async fn run_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let FeedServer { listener, state } = self;
        let registry = Arc::clone(state.broadcaster.registry());

        axum::serve(listener, router(state))
            .with_graceful_shutdown(shutdown)
            .await
            .context("server terminated unexpectedly")?;

        let subscribers = registry.len().await;
        info!(subscribers, "server stopped accepting connections");
        Ok(())
    }

    pub async fn run_until_ctrl_c(self) -> Result<()> {
        self.run_until(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                warn!(error = ?err, "failed to install ctrl-c handler");
            }
            info!("server shutting down");
        })
        .await
    }
}
