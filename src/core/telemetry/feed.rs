//! WebSocket feed: one JSON snapshot per cycle to every connected client.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, watch};
use tokio::time::timeout;
use tokio_tungstenite::{accept_async, tungstenite::Message};

use super::broadcaster::Broadcaster;
use super::models::Snapshot;
use crate::error::{Error, Result};

/// Longest a client may take to finish the WebSocket upgrade
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

pub async fn bind(addr: &str) -> Result<TcpListener> {
    TcpListener::bind(addr)
        .await
        .map_err(|e| Error::config(format!("cannot listen on {}: {}", addr, e)))
}

/// Accept feed clients until `shutdown` fires.
pub async fn serve(
    listener: TcpListener,
    broadcaster: Broadcaster,
    latest: watch::Receiver<Arc<Snapshot>>,
    mut shutdown: broadcast::Receiver<()>,
) {
    if let Ok(addr) = listener.local_addr() {
        log::info!("Feed listening on ws://{}", addr);
    }

    loop {
        tokio::select! {
            _ = shutdown.recv() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    let broadcaster = broadcaster.clone();
                    let latest = latest.clone();
                    let shutdown = shutdown.resubscribe();
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, peer, broadcaster, latest, shutdown).await {
                            log::debug!("Feed connection {} closed with error: {}", peer, e);
                        }
                    });
                }
                Err(e) => log::warn!("Failed to accept feed connection: {}", e),
            }
        }
    }

    log::info!("Feed stopped");
}

fn encode(snapshot: &Snapshot) -> Result<Message> {
    Ok(Message::text(serde_json::to_string(snapshot)?))
}

async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    broadcaster: Broadcaster,
    latest: watch::Receiver<Arc<Snapshot>>,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<()> {
    let ws = tokio::select! {
        _ = shutdown.recv() => return Ok(()),
        handshake = timeout(HANDSHAKE_TIMEOUT, accept_async(stream)) => match handshake {
            Ok(ws) => ws?,
            Err(_) => {
                return Err(Error::other(format!(
                    "handshake not completed within {:?}",
                    HANDSHAKE_TIMEOUT
                )))
            }
        },
    };
    let (mut sink, mut incoming) = ws.split();

    let mut subscription = broadcaster.subscribe();
    let id = subscription.id();
    log::info!("Feed subscriber {} connected from {}", id, peer);

    let result = async {
        // Late joiners get the current picture instead of waiting a cycle
        let current = latest.borrow().clone();
        if current.ts > 0 {
            sink.send(encode(&current)?).await?;
        }

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    let _ = sink.send(Message::Close(None)).await;
                    break;
                }
                snapshot = subscription.recv() => match snapshot {
                    Some(snapshot) => sink.send(encode(&snapshot)?).await?,
                    None => break,
                },
                message = incoming.next() => match message {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return Err(Error::from(e)),
                },
            }
        }

        Ok::<(), Error>(())
    }
    .await;

    broadcaster.unsubscribe(id);
    log::info!("Feed subscriber {} disconnected", id);
    result
}
