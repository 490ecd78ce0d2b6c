pub mod http;
pub mod websocket;

use async_trait::async_trait;
use log::{ debug, warn };
use thiserror::Error;
use tokio::sync::{ mpsc, oneshot };
use tokio::sync::mpsc::error::TryRecvError;
use crate::auth::AuthToken;
use crate::config::ClientConfig;
use crate::models::api::Reply;
use crate::models::websocket::{ ChatRequest, StreamEvent };
use self::http::HttpTransport;
use self::websocket::WsTransport;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Could not reach the server: {0}")]
    NetworkUnreachable(String),

    #[error("Server error ({status}): {body}")]
    ServerError {
        status: u16,
        body: String,
    },

    #[error("Request timed out")]
    Timeout,

    #[error("Malformed server payload: {0}")]
    Protocol(String),
}

/// What a stream delivers to its reader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamSignal {
    Event(StreamEvent),
    Closed,
    Failed(TransportError),
}

/// Caller's end of an open stream. Closing is idempotent and also happens on drop.
/// Signals already handed out stay valid after close.
#[derive(Debug)]
pub struct StreamHandle {
    outgoing: mpsc::Sender<ChatRequest>,
    incoming: mpsc::Receiver<StreamSignal>,
    shutdown: Option<oneshot::Sender<()>>,
}

impl StreamHandle {
    /// Wires a handle to a driver task. The driver reads `ChatRequest`s, writes
    /// `StreamSignal`s and stops when the shutdown channel fires or is dropped.
    pub fn from_channels(
        outgoing: mpsc::Sender<ChatRequest>,
        incoming: mpsc::Receiver<StreamSignal>,
        shutdown: oneshot::Sender<()>
    ) -> Self {
        Self { outgoing, incoming, shutdown: Some(shutdown) }
    }

    pub async fn send(&self, request: ChatRequest) -> Result<(), TransportError> {
        if self.shutdown.is_none() {
            return Err(TransportError::NetworkUnreachable("stream is closed".to_string()));
        }
        self.outgoing
            .send(request).await
            .map_err(|_| TransportError::NetworkUnreachable("stream is closed".to_string()))
    }

    /// `None` once the driver has gone away and every buffered signal was read.
    pub async fn next_signal(&mut self) -> Option<StreamSignal> {
        self.incoming.recv().await
    }

    /// Discards whatever an earlier exchange left queued, so the next request
    /// starts from an empty channel. Fails if a queued signal shows the stream
    /// is already gone.
    pub fn drain_stale(&mut self) -> Result<usize, TransportError> {
        let mut dropped = 0;
        loop {
            match self.incoming.try_recv() {
                Ok(StreamSignal::Event(event)) => {
                    match &event {
                        StreamEvent::Error { message } =>
                            warn!("Dropping error left over from a finished exchange: {}", message),
                        _ => debug!("Dropping event left over from a finished exchange"),
                    }
                    dropped += 1;
                }
                Ok(StreamSignal::Closed) | Err(TryRecvError::Disconnected) => {
                    return Err(
                        TransportError::NetworkUnreachable("stream closed between exchanges".to_string())
                    );
                }
                Ok(StreamSignal::Failed(err)) => {
                    return Err(err);
                }
                Err(TryRecvError::Empty) => {
                    return Ok(dropped);
                }
            }
        }
    }

    pub fn close(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            debug!("Closing chat stream");
            let _ = shutdown.send(());
        }
    }

    pub fn is_closed(&self) -> bool {
        self.shutdown.is_none()
    }
}

impl Drop for StreamHandle {
    fn drop(&mut self) {
        self.close();
    }
}

#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// One blocking round trip; never retried here.
    async fn send_once(&self, request: &ChatRequest) -> Result<Reply, TransportError>;

    /// Opens a long-lived stream. Never reconnects on its own.
    async fn open_stream(&self) -> Result<StreamHandle, TransportError>;
}

/// The production transport: REST over reqwest, streaming over tokio-tungstenite.
pub struct ChatClient {
    http: HttpTransport,
    ws: WsTransport,
}

impl ChatClient {
    pub fn new(config: &ClientConfig, token: AuthToken) -> Result<Self, TransportError> {
        Ok(Self {
            http: HttpTransport::new(config, token)?,
            ws: WsTransport::new(config),
        })
    }
}

#[async_trait]
impl ChatTransport for ChatClient {
    async fn send_once(&self, request: &ChatRequest) -> Result<Reply, TransportError> {
        self.http.send_once(request).await
    }

    async fn open_stream(&self) -> Result<StreamHandle, TransportError> {
        self.ws.open_stream().await
    }
}
