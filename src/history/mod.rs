pub(crate) mod assembler;

use log::info;
use thiserror::Error;
use crate::models::chat::{ ChatTurn, ConversationState, HistoryEntry, Role };
use crate::models::websocket::StreamEvent;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("A response is still pending; wait for it before sending another message")]
    ExchangeInFlight,

    #[error("Message is empty")]
    EmptyMessage,
}

/// Owns the turn history of one session. Only `append_user_turn` and
/// `apply_stream_event` mutate turns.
#[derive(Debug, Default)]
pub struct ConversationStore {
    state: ConversationState,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append_user_turn(&mut self, text: &str) -> Result<(), StoreError> {
        if self.state.awaiting_response {
            return Err(StoreError::ExchangeInFlight);
        }
        if text.trim().is_empty() {
            return Err(StoreError::EmptyMessage);
        }
        self.state.turns.push(ChatTurn::user(text));
        self.state.awaiting_response = true;
        Ok(())
    }

    pub fn apply_stream_event(&mut self, event: StreamEvent) {
        assembler::apply(&mut self.state, event);
    }

    pub fn snapshot(&self) -> ConversationState {
        self.state.clone()
    }

    pub fn state(&self) -> &ConversationState {
        &self.state
    }

    /// Clears the publish offer, returning the content it carried.
    pub fn dismiss_publish_offer(&mut self) -> Option<String> {
        let pending = self.state.pending_publish_content.take();
        if pending.is_some() {
            info!("Publish offer dismissed");
        }
        pending
    }

    /// History in wire form, oldest first.
    pub fn wire_history(&self) -> Vec<HistoryEntry> {
        self.state.turns.iter().map(HistoryEntry::from).collect()
    }
}

pub fn format_turns_for_display(state: &ConversationState) -> String {
    let mut result = String::new();
    for turn in state.turns() {
        let role_display = match turn.role {
            Role::User => "You",
            Role::Assistant => "Agent",
        };
        result.push_str(&format!("{}: {}\n", role_display, turn.content));
    }
    result
}
