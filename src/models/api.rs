use serde::{ Serialize, Deserialize };
use crate::models::websocket::StreamEvent;
use crate::transport::TransportError;

/// Raw body of `POST /chat`.
#[derive(Debug, Deserialize)]
pub struct ChatResponse {
    pub status: String,
    pub message: Option<String>,
    pub error: Option<String>,
    #[serde(default)]
    pub is_post: bool,
}

/// A validated REST reply.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Reply {
    pub message: String,
    pub is_post: bool,
}

impl ChatResponse {
    pub fn into_reply(self, http_status: u16) -> Result<Reply, TransportError> {
        match self.status.as_str() {
            "success" =>
                match self.message {
                    Some(message) => Ok(Reply { message, is_post: self.is_post }),
                    None =>
                        Err(
                            TransportError::Protocol(
                                "success response is missing message".to_string()
                            )
                        ),
                }
            "error" =>
                Err(TransportError::ServerError {
                    status: http_status,
                    body: self.error.unwrap_or_else(|| "unknown server error".to_string()),
                }),
            other => Err(TransportError::Protocol(format!("unexpected response status '{}'", other))),
        }
    }
}

impl Reply {
    /// A whole reply is replayed as one fragment plus a completion.
    pub fn into_events(self) -> Vec<StreamEvent> {
        let publish_content = if self.is_post { Some(self.message.clone()) } else { None };
        vec![
            StreamEvent::Fragment { text: self.message },
            StreamEvent::Complete { should_publish: self.is_post, publish_content }
        ]
    }
}

#[derive(Debug, Serialize)]
pub struct ScheduleRequest {
    pub session_id: String,
    pub post_content: String,
    pub schedule_time: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct ScheduledPost {
    pub content: String,
    pub schedule_time: String,
    pub created_at: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ScheduleResponse {
    pub status: String,
    pub message: String,
    pub scheduled_post: Option<ScheduledPost>,
}

#[derive(Debug, Deserialize)]
pub struct ScheduledPostsResponse {
    #[serde(default)]
    pub posts: Vec<ScheduledPost>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub timestamp: Option<String>,
    pub version: Option<String>,
    pub environment: Option<String>,
}
