use crate::cli::Args;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_base_url: String,
    pub ws_url: String,
    pub auth_token: Option<String>,
    /// HMAC key for signing the WebSocket handshake.
    pub ws_secret: Option<String>,
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
    pub rest_only: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8000".to_string(),
            ws_url: "ws://localhost:8000/ws".to_string(),
            auth_token: None,
            ws_secret: None,
            request_timeout: Duration::from_secs(60),
            connect_timeout: Duration::from_secs(10),
            rest_only: false,
        }
    }
}

impl ClientConfig {
    /// Joins a route onto the REST base without doubling slashes.
    pub fn endpoint(&self, route: &str) -> String {
        format!("{}/{}", self.api_base_url.trim_end_matches('/'), route.trim_start_matches('/'))
    }
}

impl From<&Args> for ClientConfig {
    fn from(args: &Args) -> Self {
        Self {
            api_base_url: args.api_base_url.clone(),
            ws_url: args.ws_url.clone(),
            auth_token: args.auth_token.clone().filter(|t| !t.is_empty()),
            ws_secret: args.ws_secret.clone().filter(|s| !s.is_empty()),
            request_timeout: Duration::from_secs(args.request_timeout_secs),
            connect_timeout: Duration::from_secs(args.connect_timeout_secs),
            rest_only: args.rest_only,
        }
    }
}
