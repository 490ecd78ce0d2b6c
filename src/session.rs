use chrono::NaiveDateTime;
use log::{ debug, info, warn };
use std::sync::Arc;
use std::time::Duration;
use crate::history::{ ConversationStore, StoreError };
use crate::models::api::ScheduledPost;
use crate::models::chat::ConversationState;
use crate::models::websocket::{ ChatRequest, StreamEvent };
use crate::policy::{ FallbackPolicy, TransportMode };
use crate::scheduler::{ PostScheduler, SchedulerError };
use crate::transport::{ ChatTransport, StreamHandle, StreamSignal, TransportError };

enum StreamOutcome {
    Finished,
    Unavailable(TransportError),
}

/// One chat session: owns the conversation, the fallback policy and the open
/// stream, and applies every event on the caller's task.
pub struct ChatSession {
    transport: Arc<dyn ChatTransport>,
    store: ConversationStore,
    policy: FallbackPolicy,
    stream: Option<StreamHandle>,
    response_timeout: Duration,
}

impl ChatSession {
    pub fn new(transport: Arc<dyn ChatTransport>, response_timeout: Duration) -> Self {
        Self {
            transport,
            store: ConversationStore::new(),
            policy: FallbackPolicy::new(),
            stream: None,
            response_timeout,
        }
    }

    pub fn with_policy(mut self, policy: FallbackPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn snapshot(&self) -> ConversationState {
        self.store.snapshot()
    }

    pub fn state(&self) -> &ConversationState {
        self.store.state()
    }

    pub fn mode(&self) -> TransportMode {
        self.policy.mode()
    }

    pub fn dismiss_publish_offer(&mut self) -> Option<String> {
        self.store.dismiss_publish_offer()
    }

    /// Sends `text` and drives the exchange to completion. `on_event` runs after
    /// each event has been applied. Transport failures end up as assistant turns,
    /// so the only errors returned are store rejections.
    pub async fn send<F>(&mut self, text: &str, mut on_event: F) -> Result<(), StoreError>
        where F: FnMut(&StreamEvent)
    {
        let request = ChatRequest {
            message: text.to_string(),
            chat_history: self.store.wire_history(),
        };
        self.store.append_user_turn(text)?;

        if self.policy.prefers_stream() {
            match self.exchange_over_stream(&request, &mut on_event).await {
                StreamOutcome::Finished => {
                    return Ok(());
                }
                StreamOutcome::Unavailable(err) => {
                    self.close();
                    self.policy.demote(&err.to_string());
                }
            }
        }

        self.exchange_over_rest(&request, &mut on_event).await;
        Ok(())
    }

    async fn exchange_over_stream<F>(
        &mut self,
        request: &ChatRequest,
        on_event: &mut F
    ) -> StreamOutcome
        where F: FnMut(&StreamEvent)
    {
        let mut handle = match self.stream.take() {
            Some(mut handle) => {
                match handle.drain_stale() {
                    Ok(0) => {}
                    Ok(dropped) => debug!("Discarded {} stale stream events", dropped),
                    Err(e) => {
                        return StreamOutcome::Unavailable(e);
                    }
                }
                handle
            }
            None =>
                match self.transport.open_stream().await {
                    Ok(handle) => handle,
                    Err(e) => {
                        return StreamOutcome::Unavailable(e);
                    }
                }
        };

        if let Err(e) = handle.send(request.clone()).await {
            return StreamOutcome::Unavailable(e);
        }

        let mut received_any = false;
        loop {
            let signal = match
                tokio::time::timeout(self.response_timeout, handle.next_signal()).await
            {
                Ok(Some(signal)) => signal,
                Ok(None) => StreamSignal::Closed,
                Err(_) => StreamSignal::Failed(TransportError::Timeout),
            };

            let err = match signal {
                StreamSignal::Event(event) => {
                    received_any = true;
                    self.policy.on_stream_event();
                    let terminal = event.is_terminal();
                    self.dispatch(event, on_event);
                    if terminal {
                        self.stream = Some(handle);
                        return StreamOutcome::Finished;
                    }
                    continue;
                }
                StreamSignal::Closed =>
                    TransportError::NetworkUnreachable(
                        "stream closed before the response completed".to_string()
                    ),
                StreamSignal::Failed(err) => err,
            };

            if !received_any {
                return StreamOutcome::Unavailable(err);
            }
            warn!("Stream lost mid-response: {}", err);
            handle.close();
            self.dispatch(StreamEvent::Error { message: err.to_string() }, on_event);
            self.policy.demote(&err.to_string());
            return StreamOutcome::Finished;
        }
    }

    async fn exchange_over_rest<F>(&mut self, request: &ChatRequest, on_event: &mut F)
        where F: FnMut(&StreamEvent)
    {
        match self.transport.send_once(request).await {
            Ok(reply) => {
                debug!("REST reply received (is_post: {})", reply.is_post);
                for event in reply.into_events() {
                    self.dispatch(event, on_event);
                }
            }
            Err(e) => {
                warn!("Chat request failed: {}", e);
                self.dispatch(StreamEvent::Error { message: e.to_string() }, on_event);
            }
        }
    }

    fn dispatch<F>(&mut self, event: StreamEvent, on_event: &mut F) where F: FnMut(&StreamEvent) {
        self.store.apply_stream_event(event.clone());
        on_event(&event);
    }

    /// Schedules the pending publish content and clears the offer on success.
    pub async fn schedule_pending(
        &mut self,
        scheduler: &PostScheduler,
        session_id: &str,
        at: NaiveDateTime
    ) -> Result<ScheduledPost, SchedulerError> {
        let content = self.store
            .state()
            .pending_publish_content()
            .map(str::to_string)
            .ok_or(SchedulerError::NothingToPublish)?;
        let post = scheduler.schedule(session_id, &content, at).await?;
        self.store.dismiss_publish_offer();
        info!("Post scheduled for {}", post.schedule_time);
        Ok(post)
    }

    pub fn close(&mut self) {
        if let Some(mut handle) = self.stream.take() {
            handle.close();
        }
    }
}

impl Drop for ChatSession {
    fn drop(&mut self) {
        self.close();
    }
}
