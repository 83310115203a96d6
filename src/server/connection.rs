//! WebSocket connection handling
//!
//! Each connection gets three tasks:
//!
//! ```text
//! socket ──reader──> mpsc<Inbound> ──> SessionTask ──> mpsc<ServerMessage> ──writer──> socket
//! ```
//!
//! The reader never reorders or drops frames; when the session queue is full
//! it waits. The reader stops as soon as the session task exits, or when the
//! server shuts down; the session then drains what is queued and tears down
//! before the connection future completes.

use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, OwnedSemaphorePermit};
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::protocol::ServerMessage;
use crate::session::{Inbound, SessionContext, SessionTask};

/// Outbound replies are rare; a small buffer is enough
const OUTBOUND_DEPTH: usize = 32;

/// Serve one accepted TCP connection until it closes
pub(super) async fn serve_connection(
    stream: TcpStream,
    peer: SocketAddr,
    ctx: SessionContext,
    queue_depth: usize,
    shutdown: CancellationToken,
    _permit: OwnedSemaphorePermit,
) {
    let handshake = tokio::select! {
        handshake = accept_async(stream) => handshake,
        _ = shutdown.cancelled() => {
            debug!("Shutdown during handshake with {}", peer);
            return;
        }
    };
    let ws = match handshake {
        Ok(ws) => ws,
        Err(e) => {
            warn!("WebSocket handshake with {} failed: {}", peer, e);
            return;
        }
    };
    let (mut sink, mut source) = ws.split();

    let (out_tx, mut out_rx) = mpsc::channel::<ServerMessage>(OUTBOUND_DEPTH);
    let (in_tx, in_rx) = mpsc::channel::<Inbound>(queue_depth.max(1));

    let task = SessionTask::start(ctx, peer.to_string(), out_tx).await;
    let id = task.id();
    let session = tokio::spawn(task.run(in_rx));

    let writer = tokio::spawn(async move {
        while let Some(message) = out_rx.recv().await {
            let json = match message.to_json() {
                Ok(json) => json,
                Err(e) => {
                    error!("Failed to encode {:?}: {}", message, e);
                    continue;
                }
            };
            if let Err(e) = sink.send(Message::Text(json)).await {
                debug!("Send failed, closing writer: {}", e);
                break;
            }
        }
        let _ = sink.close().await;
    });

    loop {
        tokio::select! {
            frame = source.next() => {
                let inbound = match frame {
                    Some(Ok(Message::Text(text))) => Inbound::Text(text),
                    Some(Ok(Message::Binary(data))) => Inbound::Binary(Bytes::from(data)),
                    Some(Ok(Message::Close(_))) | None => {
                        debug!("Session {} transport closed", id);
                        break;
                    }
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        debug!("Session {} transport error: {}", id, e);
                        break;
                    }
                };
                if in_tx.send(inbound).await.is_err() {
                    break;
                }
            }
            _ = in_tx.closed() => break,
            _ = shutdown.cancelled() => {
                debug!("Session {} closing for shutdown", id);
                break;
            }
        }
    }
    drop(in_tx);

    match session.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => debug!("Session {} ended with error: {}", id, e),
        Err(e) => error!("Session {} task failed: {}", id, e),
    }
    if let Err(e) = writer.await {
        error!("Session {} writer failed: {}", id, e);
    }
}
