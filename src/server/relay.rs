//! WebSocket relay server.
//!
//! Accepts client connections and relays every text frame to the completion
//! backend, sending the backend's answer back on the same connection.

use crate::config::ReplyOrder;
use crate::protocol::{APOLOGY_MESSAGE, WELCOME_MESSAGE};
use crate::server::llm::{CompletionBackend, CompletionError};
use anyhow::{Context, Result};
use futures::{SinkExt, StreamExt};
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinSet;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

/// Turns one inbound message into one outbound reply.
pub struct Relay {
    backend: Arc<dyn CompletionBackend>,
    system_prompt: String,
    deadline: Duration,
}

impl Relay {
    pub fn new(backend: Arc<dyn CompletionBackend>, system_prompt: impl Into<String>, deadline: Duration) -> Self {
        Self {
            backend,
            system_prompt: system_prompt.into(),
            deadline,
        }
    }

    pub fn backend(&self) -> &dyn CompletionBackend {
        self.backend.as_ref()
    }

    /// Ask the backend, giving up once the deadline passes.
    pub async fn answer(&self, message: &str) -> Result<String, CompletionError> {
        match tokio::time::timeout(self.deadline, self.backend.complete(&self.system_prompt, message)).await {
            Ok(result) => result,
            Err(_) => Err(CompletionError::Timeout(self.deadline)),
        }
    }

    /// The text to send back for `message`: the backend's answer verbatim,
    /// or the apology if the call failed.
    pub async fn reply_to(&self, message: &str) -> String {
        match self.answer(message).await {
            Ok(reply) => {
                debug!("Completion succeeded ({} bytes)", reply.len());
                reply
            }
            Err(e) if e.is_timeout() => {
                warn!("{}", e);
                APOLOGY_MESSAGE.to_string()
            }
            Err(e) => {
                error!("Completion failed: {}", e);
                APOLOGY_MESSAGE.to_string()
            }
        }
    }
}

/// The server that listens for client connections.
pub struct RelayServer {
    listener: TcpListener,
    relay: Arc<Relay>,
    reply_order: ReplyOrder,
}

impl RelayServer {
    /// Bind the listening socket.
    pub async fn bind(addr: &str, relay: Relay, reply_order: ReplyOrder) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind to {}", addr))?;

        Ok(Self {
            listener,
            relay: Arc::new(relay),
            reply_order,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections until the process stops.
    pub async fn run(self) -> Result<()> {
        info!("Server listening on ws://{}", self.local_addr()?);

        loop {
            match self.listener.accept().await {
                Ok((stream, peer)) => {
                    let relay = Arc::clone(&self.relay);
                    let order = self.reply_order;
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, peer, relay, order).await {
                            error!("Error handling client {}: {:#}", peer, e);
                        }
                    });
                }
                Err(e) => {
                    error!("Failed to accept connection: {}", e);
                }
            }
        }
    }
}

fn spawn_reply(tasks: &mut JoinSet<String>, relay: &Arc<Relay>, message: String) {
    let relay = Arc::clone(relay);
    tasks.spawn(async move { relay.reply_to(&message).await });
}

/// Serve a single client connection.
///
/// Completions run in a `JoinSet` owned by this function, so anything still
/// in flight is aborted when the connection ends.
async fn handle_connection(stream: TcpStream, peer: SocketAddr, relay: Arc<Relay>, order: ReplyOrder) -> Result<()> {
    let ws = tokio_tungstenite::accept_async(stream)
        .await
        .context("WebSocket handshake failed")?;
    info!("Client connected: {}", peer);

    let (mut sink, mut frames) = ws.split();
    sink.send(Message::text(WELCOME_MESSAGE))
        .await
        .context("Failed to send welcome message")?;

    let mut in_flight: JoinSet<String> = JoinSet::new();
    let mut queued: VecDeque<String> = VecDeque::new();

    loop {
        tokio::select! {
            frame = frames.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    debug!("Message from {}: {} bytes", peer, text.len());
                    match order {
                        ReplyOrder::Sequential if !in_flight.is_empty() => queued.push_back(text),
                        _ => spawn_reply(&mut in_flight, &relay, text),
                    }
                }
                Some(Ok(Message::Close(_))) | None => {
                    info!("Client disconnected: {}", peer);
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!("WebSocket error from {}: {}", peer, e);
                    break;
                }
            },
            Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                let reply = joined.unwrap_or_else(|e| {
                    error!("Reply task failed: {}", e);
                    APOLOGY_MESSAGE.to_string()
                });
                if let Err(e) = sink.send(Message::text(reply)).await {
                    warn!("Failed to send reply to {}: {}", peer, e);
                    break;
                }
                if in_flight.is_empty() {
                    if let Some(next) = queued.pop_front() {
                        spawn_reply(&mut in_flight, &relay, next);
                    }
                }
            }
        }
    }

    if !in_flight.is_empty() {
        debug!("Dropping {} in-flight completion(s) for {}", in_flight.len(), peer);
    }
    Ok(())
}
