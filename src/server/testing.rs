//! Test doubles for the relay: a scripted backend and a local server.

use crate::config::ReplyOrder;
use crate::server::llm::{CompletionBackend, CompletionError};
use crate::server::relay::{Relay, RelayServer};
use async_trait::async_trait;
use futures::StreamExt;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

pub const SYSTEM_PROMPT: &str = "answer in JSON";

pub type TestSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

type Script = dyn Fn(&str) -> (Duration, Result<String, CompletionError>) + Send + Sync;

/// Backend whose answers come from a closure: a delay and a result per
/// message. Records every call.
pub struct FakeBackend {
    script: Box<Script>,
    calls: Mutex<Vec<(String, String)>>,
}

impl FakeBackend {
    pub fn new<F>(script: F) -> Arc<Self>
    where
        F: Fn(&str) -> (Duration, Result<String, CompletionError>) + Send + Sync + 'static,
    {
        Arc::new(Self {
            script: Box::new(script),
            calls: Mutex::new(Vec::new()),
        })
    }

    /// Answers `echo: <message>` immediately.
    pub fn echo() -> Arc<Self> {
        Self::new(|msg| (Duration::ZERO, Ok(format!("echo: {}", msg))))
    }

    /// `(system, user)` pairs seen so far.
    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionBackend for FakeBackend {
    async fn complete(&self, system_prompt: &str, user_message: &str) -> Result<String, CompletionError> {
        self.calls
            .lock()
            .unwrap()
            .push((system_prompt.to_string(), user_message.to_string()));
        let (delay, result) = (self.script)(user_message);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        result
    }

    fn name(&self) -> &'static str {
        "fake"
    }

    fn model(&self) -> &str {
        "fake-model"
    }
}

/// Start a relay server on an ephemeral local port and return its URL.
pub async fn start_server(backend: Arc<FakeBackend>, order: ReplyOrder, deadline: Duration) -> String {
    let relay = Relay::new(backend, SYSTEM_PROMPT, deadline);
    let server = RelayServer::bind("127.0.0.1:0", relay, order).await.unwrap();
    let url = format!("ws://{}", server.local_addr().unwrap());
    tokio::spawn(server.run());
    url
}

pub async fn connect(url: &str) -> TestSocket {
    let (ws, _) = tokio_tungstenite::connect_async(url).await.unwrap();
    ws
}

/// Next text frame, skipping control frames. Panics after five seconds.
pub async fn next_text(ws: &mut TestSocket) -> String {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match ws.next().await {
                Some(Ok(Message::Text(text))) => return text,
                Some(Ok(_)) => continue,
                other => panic!("connection ended while waiting for text: {:?}", other),
            }
        }
    })
    .await
    .expect("timed out waiting for a text frame")
}
