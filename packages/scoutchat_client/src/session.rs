//! Chat session
//!
//! One WebSocket connection to the relay, wrapped behind a small API:
//! `submit` / `notify_typing` outbound, a message log, a typing indicator,
//! and an event stream inbound. A single connection attempt, no reconnection:
//! when the transport drops, the session is done.

use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::{Mutex, RwLock, mpsc};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error};

use crate::log::MessageLog;
use crate::typing::TypingIndicator;
use scoutchat_proto::{ChatMessage, ClientEvent, ServerEvent};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("failed to connect to relay: {0}")]
    Connect(String),
    #[error("session closed")]
    Closed,
}

/// Inbound happenings, for a UI that wants to react as they arrive rather
/// than poll the log.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    Message(ChatMessage),
    Typing { username: String },
}

pub struct ChatSession {
    outbound: mpsc::Sender<ClientEvent>,
    log: Arc<RwLock<MessageLog>>,
    typing: Arc<Mutex<TypingIndicator>>,
    events: Option<mpsc::Receiver<SessionEvent>>,
    closed: Arc<AtomicBool>,
}

impl ChatSession {
    /// Connect to the relay at `url` (e.g. `ws://127.0.0.1:4000/ws`).
    /// `typing_timeout` is how long the typing indicator stays lit after the
    /// last typing event; the relay's contract is 1000 ms.
    pub async fn connect(url: &str, typing_timeout: Duration) -> Result<Self, SessionError> {
        let (ws, _) = connect_async(url)
            .await
            .map_err(|e| SessionError::Connect(e.to_string()))?;
        let (mut ws_sink, mut ws_stream) = ws.split();

        let (outbound, mut outbound_rx) = mpsc::channel::<ClientEvent>(32);
        let (event_tx, event_rx) = mpsc::channel::<SessionEvent>(100);
        let log = Arc::new(RwLock::new(MessageLog::new()));
        let typing = Arc::new(Mutex::new(TypingIndicator::new(typing_timeout)));
        let closed = Arc::new(AtomicBool::new(false));

        // Writer: drain outbound events into the socket
        let closed_writer = closed.clone();
        tokio::spawn(async move {
            while let Some(event) = outbound_rx.recv().await {
                let json = match serde_json::to_string(&event) {
                    Ok(j) => j,
                    Err(e) => {
                        error!("Failed to serialize event: {}", e);
                        continue;
                    }
                };
                if ws_sink.send(Message::Text(json.into())).await.is_err() {
                    break;
                }
            }
            closed_writer.store(true, Ordering::Relaxed);
        });

        // Reader: apply inbound events to the log and typing indicator
        let log_reader = log.clone();
        let typing_reader = typing.clone();
        let closed_reader = closed.clone();
        tokio::spawn(async move {
            while let Some(Ok(msg)) = ws_stream.next().await {
                let text = match msg {
                    Message::Text(text) => text,
                    Message::Close(_) => break,
                    _ => continue,
                };
                let event: ServerEvent = match serde_json::from_str(&text) {
                    Ok(ev) => ev,
                    Err(e) => {
                        debug!("Ignoring unrecognized server frame: {}", e);
                        continue;
                    }
                };
                match event {
                    ServerEvent::Message(message) => {
                        log_reader.write().await.push(message.clone());
                        // A slow or absent event consumer never blocks the log.
                        let _ = event_tx.try_send(SessionEvent::Message(message));
                    }
                    ServerEvent::Typing { username } => {
                        typing_reader.lock().await.observe(Instant::now());
                        let _ = event_tx.try_send(SessionEvent::Typing { username });
                    }
                }
            }
            closed_reader.store(true, Ordering::Relaxed);
        });

        Ok(Self {
            outbound,
            log,
            typing,
            events: Some(event_rx),
            closed,
        })
    }

    /// Submit a message. Returns `Ok(false)` without emitting anything when
    /// either field is empty after trimming; the relay never sees it.
    pub async fn submit(&self, username: &str, text: &str) -> Result<bool, SessionError> {
        if username.trim().is_empty() || text.trim().is_empty() {
            return Ok(false);
        }
        self.outbound
            .send(ClientEvent::SendMessage {
                username: username.to_string(),
                text: text.to_string(),
            })
            .await
            .map_err(|_| SessionError::Closed)?;
        Ok(true)
    }

    /// Tell the room this user is typing. No debounce: callers fire this per
    /// keystroke and the indicator window on the receiving side coalesces.
    pub async fn notify_typing(&self, username: &str) -> Result<(), SessionError> {
        if username.trim().is_empty() {
            return Ok(());
        }
        self.outbound
            .send(ClientEvent::Typing {
                username: username.to_string(),
            })
            .await
            .map_err(|_| SessionError::Closed)
    }

    /// All messages delivered so far, in arrival order.
    pub async fn messages(&self) -> Vec<ChatMessage> {
        self.log.read().await.snapshot()
    }

    /// Whether anyone (possibly this user) typed within the typing window.
    pub async fn someone_typing(&self) -> bool {
        self.typing.lock().await.is_typing(Instant::now())
    }

    /// Take the inbound event stream. Yields `None` after the first call.
    pub fn take_events(&mut self) -> Option<mpsc::Receiver<SessionEvent>> {
        self.events.take()
    }

    /// True once the transport has dropped. Sends fail shortly after.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Relaxed)
    }
}
