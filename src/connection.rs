use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::Value;
use tokio::{
    net::TcpStream,
    sync::{mpsc, watch, Mutex},
    task::JoinHandle,
    time::sleep,
};
use tokio_tungstenite::{
    connect_async, tungstenite::protocol::Message, MaybeTlsStream, WebSocketStream,
};
use url::Url;

use crate::{
    buffer::MessageBuffer,
    errors::{StreamError, StreamResult},
    types::{AccountId, ConnectionState, StreamEvent},
};

/// Seam over the dial step so the session loop can be driven by scripted
/// sources in tests. [`WsDialer`] is the production implementation.
#[async_trait]
pub trait Dialer: Send + Sync {
    async fn dial(&self) -> StreamResult<Box<dyn FrameSource>>;
}

/// One established connection, yielding text frames until closed.
#[async_trait]
pub trait FrameSource: Send {
    /// Next text frame; `Ok(None)` means the peer closed the connection.
    async fn next_frame(&mut self) -> StreamResult<Option<String>>;
}

pub struct WsDialer {
    url: Url,
}

impl WsDialer {
    pub fn new(url: Url) -> Self {
        Self { url }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

#[async_trait]
impl Dialer for WsDialer {
    async fn dial(&self) -> StreamResult<Box<dyn FrameSource>> {
        let (stream, _) = connect_async(self.url.as_str()).await?;
        Ok(Box::new(WsFrameSource { stream }))
    }
}

struct WsFrameSource {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl FrameSource for WsFrameSource {
    async fn next_frame(&mut self) -> StreamResult<Option<String>> {
        loop {
            match self.stream.next().await {
                None => return Ok(None),
                Some(Err(err)) => return Err(err.into()),
                Some(Ok(Message::Text(text))) => return Ok(Some(text)),
                Some(Ok(Message::Binary(binary))) => match String::from_utf8(binary) {
                    Ok(text) => return Ok(Some(text)),
                    Err(_) => {
                        tracing::debug!("dropping frame with invalid utf8 payload");
                    }
                },
                Some(Ok(Message::Ping(payload))) => {
                    self.stream.send(Message::Pong(payload)).await?;
                }
                Some(Ok(Message::Pong(_))) | Some(Ok(Message::Frame(_))) => {}
                Some(Ok(Message::Close(_))) => return Ok(None),
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawFrame {
    #[serde(rename = "type")]
    kind: String,
    account_id: String,
    #[serde(default)]
    data: Value,
    #[serde(default)]
    timestamp: Option<String>,
}

/// Decode one inbound frame. Returns `None` for malformed frames, which are
/// dropped without affecting connection state.
pub(crate) fn decode_frame(text: &str) -> Option<StreamEvent> {
    let frame: RawFrame = match serde_json::from_str(text) {
        Ok(frame) => frame,
        Err(err) => {
            tracing::debug!(error = %err, "dropping undecodable frame");
            return None;
        }
    };

    let received_at = frame
        .timestamp
        .as_deref()
        .and_then(|ts| DateTime::parse_from_rfc3339(ts).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(Utc::now);

    Some(StreamEvent {
        category: frame.kind,
        account_id: AccountId::from(frame.account_id),
        payload: frame.data,
        received_at,
    })
}

/// Owns the single event-stream connection, its lifecycle and the fixed
/// delay reconnection policy.
///
/// One supervisor task dials, reads frames into the shared buffer and the
/// event channel, and on close waits the reconnect delay before dialing
/// again. A single sequential loop means there is at most one outstanding
/// reconnect wait at any time, and a successful open trivially leaves no
/// further attempt pending.
pub struct ConnectionManager {
    state_rx: watch::Receiver<ConnectionState>,
    buffer: Arc<Mutex<MessageBuffer>>,
    events_rx: Option<mpsc::UnboundedReceiver<StreamEvent>>,
    shutdown_tx: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl ConnectionManager {
    pub fn connect(dialer: Arc<dyn Dialer>, reconnect_delay: Duration, buffer_cap: usize) -> Self {
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let buffer = Arc::new(Mutex::new(MessageBuffer::new(buffer_cap)));

        let task = tokio::spawn(session_loop(
            dialer,
            state_tx,
            Arc::clone(&buffer),
            events_tx,
            shutdown_rx,
            reconnect_delay,
        ));

        Self {
            state_rx,
            buffer,
            events_rx: Some(events_rx),
            shutdown_tx,
            task: Some(task),
        }
    }

    pub fn is_connected(&self) -> bool {
        *self.state_rx.borrow() == ConnectionState::Connected
    }

    pub fn state(&self) -> watch::Receiver<ConnectionState> {
        self.state_rx.clone()
    }

    /// The decoded-event channel, taken once by the routing loop.
    pub fn take_events(&mut self) -> Option<mpsc::UnboundedReceiver<StreamEvent>> {
        self.events_rx.take()
    }

    /// Buffered events, newest first.
    pub async fn recent_events(&self) -> Vec<StreamEvent> {
        self.buffer.lock().await.recent()
    }

    pub async fn buffered_len(&self) -> usize {
        self.buffer.lock().await.len()
    }

    /// Close the connection and cancel any pending reconnect wait.
    pub fn shutdown(&mut self) {
        let _ = self.shutdown_tx.send(true);
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn session_loop(
    dialer: Arc<dyn Dialer>,
    state_tx: watch::Sender<ConnectionState>,
    buffer: Arc<Mutex<MessageBuffer>>,
    events_tx: mpsc::UnboundedSender<StreamEvent>,
    mut shutdown_rx: watch::Receiver<bool>,
    reconnect_delay: Duration,
) {
    loop {
        let _ = state_tx.send(ConnectionState::Connecting);
        match dialer.dial().await {
            Ok(mut source) => {
                let _ = state_tx.send(ConnectionState::Connected);
                tracing::info!("event stream connected");

                loop {
                    tokio::select! {
                        _ = shutdown_rx.changed() => return,
                        frame = source.next_frame() => match frame {
                            Ok(Some(text)) => {
                                if let Some(event) = decode_frame(&text) {
                                    buffer.lock().await.push(event.clone());
                                    let _ = events_tx.send(event);
                                }
                            }
                            Ok(None) => {
                                tracing::info!("event stream closed by peer");
                                break;
                            }
                            Err(err) => {
                                tracing::warn!(error = %err, "event stream error");
                                break;
                            }
                        }
                    }
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, "event stream dial failed");
            }
        }
        let _ = state_tx.send(ConnectionState::Disconnected);

        // Exactly one reconnect wait per close, superseded by shutdown.
        tokio::select! {
            _ = shutdown_rx.changed() => return,
            _ = sleep(reconnect_delay) => {}
        }
    }
}
