use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tokio::net::TcpListener;
use tracing::{info, warn};

use live_user_feed::{
    cli::{Cli, Command},
    client,
    server::FeedServer,
    store::MemoryStore,
};

fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    match cli.command {
        Command::Serve(args) => {
            let listener = TcpListener::bind(args.listen).await?;
            let server =
                FeedServer::new(listener, Arc::new(MemoryStore::new()), args.feed_config());
            let addr = server.local_addr()?;
            info!(policy = ?args.broadcast_policy, "serving user feed");
            println!("live-user-feed listening on {addr}");
            if let Err(err) = server.run_until_ctrl_c().await {
                warn!("server exited with error: {err:?}");
                return Err(err);
            }
        }
        Command::Watch(args) => client::run(args).await?,
    }

    Ok(())
}
