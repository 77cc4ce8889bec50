//! Interactive chat session over one WebSocket connection.
//!
//! Terminal lines and inbound frames are handled by a single `select!` loop;
//! sending never waits for a reply.

use crate::protocol::{is_exit_command, normalize_line, PROMPT, REPLY_LABEL};
use futures::{Sink, SinkExt, Stream, StreamExt};
use std::io::{self, Write};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::error::ProtocolError;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::debug;

pub type ClientSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Why a session stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The user typed the exit command.
    UserExit,
    /// Terminal input reached end of file.
    InputClosed,
    /// The server closed the connection.
    RemoteClosed,
    /// The connection failed.
    TransportError,
}

/// Open the WebSocket connection.
pub async fn connect(url: &str) -> Result<ClientSocket, tungstenite::Error> {
    let (socket, _response) = tokio_tungstenite::connect_async(url).await?;
    Ok(socket)
}

/// Forward stdin lines into a channel from a background task.
pub fn spawn_stdin_reader() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if tx.send(line).is_err() {
                break;
            }
        }
        debug!("Terminal input closed");
    });
    rx
}

fn show_intro<W: Write>(out: &mut W, url: &str) -> io::Result<()> {
    writeln!(out, "[Client] Connected to server: {}", url)?;
    writeln!(out, "A Command Line Tool to Interact with AI.\n")?;
    writeln!(out, "Type your question and press Enter to talk to the AI.")?;
    writeln!(out, "Type 'exit' to quit.\n")?;
    show_prompt(out)
}

fn show_prompt<W: Write>(out: &mut W) -> io::Result<()> {
    write!(out, "{}", PROMPT)?;
    out.flush()
}

/// Run the chat loop until the user exits, input ends, or the connection
/// goes away.
pub async fn run_session<S, W>(
    mut socket: S,
    url: &str,
    mut lines: mpsc::UnboundedReceiver<String>,
    out: &mut W,
) -> io::Result<SessionEnd>
where
    S: Stream<Item = Result<Message, tungstenite::Error>> + Sink<Message, Error = tungstenite::Error> + Unpin,
    W: Write,
{
    show_intro(out, url)?;

    loop {
        tokio::select! {
            line = lines.recv() => {
                let Some(line) = line else {
                    if let Err(e) = socket.close().await {
                        debug!("Close handshake failed: {}", e);
                    }
                    writeln!(out)?;
                    return Ok(SessionEnd::InputClosed);
                };

                if is_exit_command(&line) {
                    writeln!(out, "Goodbye!")?;
                    if let Err(e) = socket.close().await {
                        debug!("Close handshake failed: {}", e);
                    }
                    return Ok(SessionEnd::UserExit);
                }

                let message = normalize_line(&line);
                writeln!(out, "You: {}", message)?;
                if let Err(e) = socket.send(Message::text(message)).await {
                    writeln!(out, "[Client] WebSocket error: {}", e)?;
                    return Ok(SessionEnd::TransportError);
                }
                show_prompt(out)?;
            }
            frame = socket.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    write!(out, "\r{}{}\n", REPLY_LABEL, text)?;
                    show_prompt(out)?;
                }
                Some(Ok(Message::Close(_)))
                | None
                | Some(Err(tungstenite::Error::ConnectionClosed))
                | Some(Err(tungstenite::Error::Protocol(ProtocolError::ResetWithoutClosingHandshake))) => {
                    writeln!(out, "\n[Client] Disconnected from server.")?;
                    return Ok(SessionEnd::RemoteClosed);
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    writeln!(out, "\n[Client] WebSocket error: {}", e)?;
                    return Ok(SessionEnd::TransportError);
                }
            },
        }
    }
}
