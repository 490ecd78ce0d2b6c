use serde::{ Serialize, Deserialize };
use crate::models::chat::HistoryEntry;
use crate::transport::TransportError;

/// Body of a chat exchange, identical for the REST call and the stream frame.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    pub chat_history: Vec<HistoryEntry>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StreamEvent {
    Fragment {
        text: String,
    },
    Complete {
        should_publish: bool,
        publish_content: Option<String>,
    },
    Error {
        message: String,
    },
}

impl StreamEvent {
    /// Complete and Error both end the exchange.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, StreamEvent::Fragment { .. })
    }

    pub fn decode(line: &str) -> Result<StreamEvent, TransportError> {
        let wire: WireEvent = serde_json
            ::from_str(line)
            .map_err(|e| TransportError::Protocol(format!("invalid event payload: {}", e)))?;

        if let Some(message) = wire.error {
            return Ok(StreamEvent::Error { message });
        }

        match wire.kind.as_deref() {
            Some("complete") => {
                let should_publish = wire.should_post.ok_or_else(||
                    TransportError::Protocol("complete event is missing should_post".to_string())
                )?;
                if should_publish && wire.post_content.is_none() {
                    return Err(
                        TransportError::Protocol(
                            "complete event has should_post set but no post_content".to_string()
                        )
                    );
                }
                Ok(StreamEvent::Complete {
                    should_publish,
                    publish_content: wire.post_content,
                })
            }
            Some(other) => Err(TransportError::Protocol(format!("unknown event type '{}'", other))),
            None =>
                match wire.content {
                    Some(text) => Ok(StreamEvent::Fragment { text }),
                    None =>
                        Err(
                            TransportError::Protocol(
                                "event carries neither content, type nor error".to_string()
                            )
                        ),
                },
        }
    }
}

#[derive(Deserialize)]
struct WireEvent {
    #[serde(rename = "type")]
    kind: Option<String>,
    content: Option<String>,
    should_post: Option<bool>,
    post_content: Option<String>,
    error: Option<String>,
}

/// Splits a text frame into its newline-delimited events. Malformed lines become
/// `Error` events so they flow through the same path as server-reported errors.
pub fn decode_frame(frame: &str) -> Vec<StreamEvent> {
    frame
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line|
            StreamEvent::decode(line).unwrap_or_else(|e| StreamEvent::Error {
                message: e.to_string(),
            })
        )
        .collect()
}
