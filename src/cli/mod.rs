pub mod repl;

use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    // --- Backend Endpoints ---
    /// Base URL of the agent REST API (e.g., http://localhost:8000)
    #[arg(long, env = "API_BASE_URL", default_value = "http://localhost:8000")]
    pub api_base_url: String,

    /// WebSocket endpoint used for streamed replies (e.g., ws://localhost:8000/ws)
    #[arg(long, env = "WS_URL", default_value = "ws://localhost:8000/ws")]
    pub ws_url: String,

    // --- Auth Args ---
    /// Bearer token sent on REST calls. Cleared for the session if the server answers 401.
    #[arg(long, env = "AUTH_TOKEN")]
    pub auth_token: Option<String>,

    /// Shared secret used to sign the WebSocket handshake (ts/sig query parameters).
    #[arg(long, env = "WS_SECRET")]
    pub ws_secret: Option<String>,

    // --- Transport Args ---
    /// Seconds to wait for a REST reply, or for the next streamed event.
    #[arg(long, env = "REQUEST_TIMEOUT_SECS", default_value = "60")]
    pub request_timeout_secs: u64,

    /// Seconds to wait when connecting to either endpoint.
    #[arg(long, env = "CONNECT_TIMEOUT_SECS", default_value = "10")]
    pub connect_timeout_secs: u64,

    /// Skip the WebSocket entirely and talk request/response only.
    #[arg(long, env = "REST_ONLY", default_value = "false")]
    pub rest_only: bool,

    // --- General App Args ---
    /// Session key for scheduled posts. A random one is generated when unset.
    #[arg(long, env = "SESSION_ID")]
    pub session_id: Option<String>,

    /// Enable debug logging/output
    #[arg(long, env = "DEBUG", default_value = "false")]
    pub debug: bool,
}
