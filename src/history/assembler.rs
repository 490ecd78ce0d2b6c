use log::debug;
use crate::models::chat::{ ChatTurn, ConversationState };
use crate::models::websocket::StreamEvent;

/// Folds one event into the conversation, in arrival order.
pub(crate) fn apply(state: &mut ConversationState, event: StreamEvent) {
    match event {
        StreamEvent::Fragment { text } => {
            if !state.awaiting_response {
                debug!("Dropping straggler fragment ({} bytes)", text.len());
                return;
            }
            match state.turns.last_mut() {
                Some(last) if state.turn_in_progress => last.content.push_str(&text),
                _ => {
                    state.turns.push(ChatTurn::assistant(text));
                    state.turn_in_progress = true;
                }
            }
        }
        StreamEvent::Complete { should_publish, publish_content } => {
            if !state.awaiting_response {
                debug!("Dropping straggler completion");
                return;
            }
            if should_publish && state.turn_in_progress {
                if let Some(last) = state.turns.last_mut() {
                    last.should_offer = true;
                }
            }
            state.turn_in_progress = false;
            state.awaiting_response = false;
            if should_publish {
                state.pending_publish_content = publish_content;
            }
        }
        StreamEvent::Error { message } => {
            // The partial turn keeps what it already received.
            state.turn_in_progress = false;
            state.turns.push(ChatTurn::assistant(message));
            state.awaiting_response = false;
        }
    }
}
