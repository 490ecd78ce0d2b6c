use chrono::Utc;
use futures::{ SinkExt, StreamExt };
use hmac::{ Hmac, Mac };
use log::{ debug, error, info, warn };
use sha2::Sha256;
use std::time::Duration;
use tokio::io::{ AsyncRead, AsyncWrite };
use tokio::sync::{ mpsc, oneshot };
use tokio_tungstenite::{ connect_async, WebSocketStream };
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::tungstenite::Error as WsError;
use url::Url;
use crate::config::ClientConfig;
use crate::models::websocket::{ decode_frame, ChatRequest, StreamEvent };
use super::{ StreamHandle, StreamSignal, TransportError };

type HmacSha256 = Hmac<Sha256>;

const CHANNEL_CAPACITY: usize = 32;

impl From<WsError> for TransportError {
    fn from(err: WsError) -> Self {
        match err {
            WsError::Http(ref response) =>
                TransportError::ServerError {
                    status: response.status().as_u16(),
                    body: format!("WebSocket handshake rejected: {}", err),
                },
            WsError::Io(ref io_err) if io_err.kind() == std::io::ErrorKind::TimedOut => {
                TransportError::Timeout
            }
            other => TransportError::NetworkUnreachable(other.to_string()),
        }
    }
}

/// Adds `ts` and `sig` query parameters, `sig` being hex(HMAC-SHA256(secret, ts)).
pub fn signed_url(ws_url: &str, secret: &str, ts: i64) -> Result<Url, TransportError> {
    let mut url = Url::parse(ws_url).map_err(|e|
        TransportError::NetworkUnreachable(format!("Invalid WebSocket URL '{}': {}", ws_url, e))
    )?;
    let ts = ts.to_string();
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).map_err(|e|
        TransportError::NetworkUnreachable(format!("Invalid signing secret: {}", e))
    )?;
    mac.update(ts.as_bytes());
    let sig = hex::encode(mac.finalize().into_bytes());
    url.query_pairs_mut().append_pair("ts", &ts).append_pair("sig", &sig);
    Ok(url)
}

pub struct WsTransport {
    ws_url: String,
    secret: Option<String>,
    connect_timeout: Duration,
}

impl WsTransport {
    pub fn new(config: &ClientConfig) -> Self {
        Self {
            ws_url: config.ws_url.clone(),
            secret: config.ws_secret.clone(),
            connect_timeout: config.connect_timeout,
        }
    }

    fn handshake_url(&self) -> Result<Url, TransportError> {
        match &self.secret {
            Some(secret) => signed_url(&self.ws_url, secret, Utc::now().timestamp()),
            None =>
                Url::parse(&self.ws_url).map_err(|e|
                    TransportError::NetworkUnreachable(
                        format!("Invalid WebSocket URL '{}': {}", self.ws_url, e)
                    )
                ),
        }
    }

    /// Connects and hands the socket to a driver task. Never reconnects on its own.
    pub async fn open_stream(&self) -> Result<StreamHandle, TransportError> {
        let url = self.handshake_url()?;
        info!("Connecting to chat stream at {}", self.ws_url);

        let (websocket, _response) = match
            tokio::time::timeout(self.connect_timeout, connect_async(url.to_string())).await
        {
            Ok(Ok(connected)) => connected,
            Ok(Err(e)) => {
                warn!("WebSocket connection to {} failed: {}", self.ws_url, e);
                return Err(e.into());
            }
            Err(_) => {
                warn!("WebSocket connection to {} timed out", self.ws_url);
                return Err(TransportError::Timeout);
            }
        };

        info!("Chat stream connected");
        Ok(spawn_stream(websocket))
    }
}

/// Hands an established socket to a driver task and returns the caller's handle.
pub fn spawn_stream<S>(websocket: WebSocketStream<S>) -> StreamHandle
    where S: AsyncRead + AsyncWrite + Unpin + Send + 'static
{
    let (outgoing, requests) = mpsc::channel(CHANNEL_CAPACITY);
    let (events, incoming) = mpsc::channel(CHANNEL_CAPACITY);
    let (shutdown, shutdown_rx) = oneshot::channel();

    tokio::spawn(drive_stream(websocket, requests, events, shutdown_rx));

    StreamHandle::from_channels(outgoing, incoming, shutdown)
}

async fn drive_stream<S>(
    websocket: WebSocketStream<S>,
    mut requests: mpsc::Receiver<ChatRequest>,
    events: mpsc::Sender<StreamSignal>,
    mut shutdown: oneshot::Receiver<()>
)
    where S: AsyncRead + AsyncWrite + Unpin
{
    let (mut tx, mut rx) = websocket.split();

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                debug!("Stream handle closed; sending close frame");
                let _ = tx.send(Message::Close(None)).await;
                break;
            }
            request = requests.recv() => {
                let Some(request) = request else {
                    let _ = tx.send(Message::Close(None)).await;
                    break;
                };
                let json = match serde_json::to_string(&request) {
                    Ok(json) => json,
                    Err(e) => {
                        error!("Failed to encode chat request: {}", e);
                        let _ = events.send(StreamSignal::Failed(TransportError::Protocol(e.to_string()))).await;
                        break;
                    }
                };
                if let Err(e) = tx.send(Message::Text(json)).await {
                    error!("Error sending chat request over stream: {}", e);
                    let _ = events.send(StreamSignal::Failed(e.into())).await;
                    break;
                }
            }
            frame = rx.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => {
                        if !forward_frame(&text, &events).await {
                            break;
                        }
                    }
                    Some(Ok(Message::Binary(bytes))) => {
                        match String::from_utf8(bytes) {
                            Ok(text) => {
                                if !forward_frame(&text, &events).await {
                                    break;
                                }
                            }
                            Err(_) => {
                                warn!("Received binary frame that is not valid UTF-8");
                                let event = StreamEvent::Error {
                                    message: TransportError::Protocol(
                                        "binary frame is not valid UTF-8".to_string()
                                    ).to_string(),
                                };
                                if events.send(StreamSignal::Event(event)).await.is_err() {
                                    break;
                                }
                            }
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if tx.send(Message::Pong(data)).await.is_err() {
                            error!("Failed to send pong");
                            let _ = events.send(StreamSignal::Closed).await;
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        info!("Chat stream closed by server");
                        let _ = events.send(StreamSignal::Closed).await;
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        match e {
                            | WsError::ConnectionClosed
                            | WsError::AlreadyClosed => {
                                info!("Chat stream connection closed: {}", e);
                                let _ = events.send(StreamSignal::Closed).await;
                            }
                            _ => {
                                error!("Error receiving from chat stream: {}", e);
                                let _ = events.send(StreamSignal::Failed(e.into())).await;
                            }
                        }
                        break;
                    }
                }
            }
        }
    }
    debug!("Chat stream driver stopped");
}

/// Returns false once the reader has gone away.
async fn forward_frame(text: &str, events: &mpsc::Sender<StreamSignal>) -> bool {
    for event in decode_frame(text) {
        if events.send(StreamSignal::Event(event)).await.is_err() {
            return false;
        }
    }
    true
}
