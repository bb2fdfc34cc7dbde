use anyhow::{Context, Result};
use futures::StreamExt;
use tokio::{io::AsyncWriteExt, select};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{info, warn};

use crate::{cli::WatchArgs, event::MutationEvent};

pub async fn run(args: WatchArgs) -> Result<()> {
    let url = format!("ws://{}/ws", args.server);
    let (mut socket, _) = connect_async(url.as_str())
        .await
        .with_context(|| format!("failed to connect to {url}"))?;
    info!("subscribed to {url}");
    write_stdout(&format!("*** watching {}", args.server)).await?;

    loop {
        select! {
            message = socket.next() => {
                if !handle_server_message(message).await? {
                    break;
                }
            }
            ctrl_c = tokio::signal::ctrl_c() => {
                if let Err(error) = ctrl_c {
                    warn!(?error, "ctrl-c handler failed");
                }
                break;
            }
        }
    }

    if let Err(error) = socket.close(None).await {
        warn!(?error, "failed to close subscription cleanly");
    }
    Ok(())
}

async fn handle_server_message(
    message: Option<Result<Message, tokio_tungstenite::tungstenite::Error>>,
) -> Result<bool> {
    match message {
        Some(Ok(Message::Text(text))) => {
            match serde_json::from_str::<MutationEvent>(&text) {
                Ok(event) => write_stdout(&render_event(&event)).await?,
                Err(error) => warn!(?error, "ignoring unrecognised frame"),
            }
            Ok(true)
        }
        Some(Ok(Message::Close(_))) | None => {
            write_stdout("*** server closed the connection").await?;
            Ok(false)
        }
        Some(Ok(_)) => Ok(true),
        Some(Err(error)) => Err(error).context("subscription failed"),
    }
}

/// One terminal line per event: `<action> <id> <name>`, `-` for absent fields.
pub fn render_event(event: &MutationEvent) -> String {
    let id = event.payload.id.as_deref().unwrap_or("-");
    let name = event.payload.name.as_deref().unwrap_or("-");
    format!("{} {id} {name}", event.action)
}

async fn write_stdout(line: &str) -> std::io::Result<()> {
    let mut stdout = tokio::io::stdout();
    stdout.write_all(line.as_bytes()).await?;
    stdout.write_all(b"\n").await?;
    stdout.flush().await
}
