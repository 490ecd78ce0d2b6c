use log::{ info, warn };
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportMode {
    StreamingPreferred,
    StreamingActive,
    RestOnly,
}

impl fmt::Display for TransportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransportMode::StreamingPreferred => "streaming-preferred",
            TransportMode::StreamingActive => "streaming-active",
            TransportMode::RestOnly => "rest-only",
        };
        write!(f, "{}", name)
    }
}

/// Chooses between the stream and request/response. Once demoted it stays
/// on REST for the rest of the session.
#[derive(Debug, Clone)]
pub struct FallbackPolicy {
    mode: TransportMode,
}

impl Default for FallbackPolicy {
    fn default() -> Self {
        Self { mode: TransportMode::StreamingPreferred }
    }
}

impl FallbackPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rest_only() -> Self {
        Self { mode: TransportMode::RestOnly }
    }

    pub fn mode(&self) -> TransportMode {
        self.mode
    }

    pub fn prefers_stream(&self) -> bool {
        self.mode != TransportMode::RestOnly
    }

    pub fn on_stream_event(&mut self) {
        if self.mode == TransportMode::StreamingPreferred {
            info!("Stream delivered its first event; streaming is active");
            self.mode = TransportMode::StreamingActive;
        }
    }

    pub fn demote(&mut self, reason: &str) {
        if self.mode != TransportMode::RestOnly {
            warn!("Falling back from {} to rest-only: {}", self.mode, reason);
            self.mode = TransportMode::RestOnly;
        }
    }
}
