//! Per-connection event loop.
//!
//! Protocol: the client's first line must be `HELLO <user-id>` within
//! the handshake timeout. After that, every inbound line is dispatched
//! as an event from that user, and outbound sends are written back as
//! lines. A dedicated writer task drains the outbound queue so a slow
//! dispatch never blocks delivery.

use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_util::codec::{Framed, LinesCodec};
use tracing::{debug, info, warn};

use crate::net::gateway::Shared;

/// Longest accepted line; anything bigger is a protocol error.
const MAX_LINE_LENGTH: usize = 1024;

/// Outbound queue depth per connection.
const OUTBOUND_QUEUE: usize = 64;

/// Drive one client connection to completion.
pub(crate) async fn handle(stream: TcpStream, addr: SocketAddr, shared: Arc<Shared>) {
    let mut framed = Framed::new(stream, LinesCodec::new_with_max_length(MAX_LINE_LENGTH));

    let handshake = Duration::from_secs(shared.hub.config.server.handshake_timeout);
    let user = match tokio::time::timeout(handshake, framed.next()).await {
        Ok(Some(Ok(line))) => match parse_hello(&line) {
            Some(id) => id,
            None => {
                debug!(%addr, "Bad handshake line");
                let _ = framed.send("* expected: HELLO <user-id>".to_string()).await;
                return;
            }
        },
        Ok(Some(Err(e))) => {
            debug!(%addr, error = %e, "Handshake read failed");
            return;
        }
        Ok(None) => return,
        Err(_) => {
            debug!(%addr, "Handshake timed out");
            return;
        }
    };

    if framed.send(format!("* hello {user}")).await.is_err() {
        return;
    }
    info!(user = %user, %addr, "Connection established");

    let (tx, mut rx) = mpsc::channel::<String>(OUTBOUND_QUEUE);
    shared.messenger.register(&user, tx.clone());

    let (mut sink, mut lines) = framed.split();
    let writer = tokio::spawn(async move {
        while let Some(text) = rx.recv().await {
            if let Err(e) = sink.send(text).await {
                debug!(error = %e, "Outbound write failed");
                break;
            }
        }
    });

    while let Some(next) = lines.next().await {
        let line = match next {
            Ok(line) => line,
            Err(e) => {
                debug!(user = %user, error = %e, "Connection read failed");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        if !shared.limits.check_message_rate(&user) {
            let _ = tx.send("* slow down".to_string()).await;
            continue;
        }

        if let Err(e) = shared.dispatcher.dispatch(&user, &line).await {
            warn!(user = %user, code = e.error_code(), error = %e, "Dispatch failed");
        }
    }

    info!(user = %user, %addr, "Connection closed");
    shared.messenger.unregister(&user, &tx);
    shared.limits.remove_user(&user);
    drop(tx);
    writer.abort();

    // Disconnect is a session-ending event; the partner gets notified.
    shared.hub.handle_disconnect(&user).await;
}

/// Parse a `HELLO <user-id>` handshake line.
///
/// Ids are opaque but must be non-empty, whitespace-free, and short
/// enough to be sane map keys.
fn parse_hello(line: &str) -> Option<String> {
    let id = line.trim().strip_prefix("HELLO ")?.trim();
    if id.is_empty() || id.len() > 64 || id.chars().any(char::is_whitespace) {
        return None;
    }
    Some(id.to_string())
}
