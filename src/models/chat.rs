use serde::{ Serialize, Deserialize };

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One message in a conversation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
    /// Set on an assistant turn whose completion asked to offer publishing.
    pub should_offer: bool,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into(), should_offer: false }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into(), should_offer: false }
    }
}

/// Prior turn as sent to the backend in `chat_history`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub role: Role,
    pub content: String,
}

impl From<&ChatTurn> for HistoryEntry {
    fn from(turn: &ChatTurn) -> Self {
        Self { role: turn.role, content: turn.content.clone() }
    }
}

/// Read-only view of a conversation, handed out by the store for rendering.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConversationState {
    pub(crate) turns: Vec<ChatTurn>,
    pub(crate) awaiting_response: bool,
    pub(crate) turn_in_progress: bool,
    pub(crate) pending_publish_content: Option<String>,
}

impl ConversationState {
    pub fn turns(&self) -> &[ChatTurn] {
        &self.turns
    }

    pub fn awaiting_response(&self) -> bool {
        self.awaiting_response
    }

    /// True while the trailing assistant turn is still receiving fragments.
    pub fn has_turn_in_progress(&self) -> bool {
        self.turn_in_progress
    }

    pub fn pending_publish_content(&self) -> Option<&str> {
        self.pending_publish_content.as_deref()
    }

    pub fn last_turn(&self) -> Option<&ChatTurn> {
        self.turns.last()
    }
}
