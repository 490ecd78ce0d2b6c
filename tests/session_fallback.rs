use async_trait::async_trait;
use linkedin_agent::auth::AuthToken;
use linkedin_agent::config::ClientConfig;
use linkedin_agent::history::StoreError;
use linkedin_agent::models::api::Reply;
use linkedin_agent::models::chat::{ HistoryEntry, Role };
use linkedin_agent::models::websocket::{ ChatRequest, StreamEvent };
use linkedin_agent::policy::{ FallbackPolicy, TransportMode };
use linkedin_agent::scheduler::{ PostScheduler, SchedulerError };
use linkedin_agent::session::ChatSession;
use linkedin_agent::transport::{ ChatTransport, StreamHandle, StreamSignal, TransportError };
use std::collections::VecDeque;
use std::sync::{ Arc, Mutex };
use std::time::Duration;
use tokio::sync::{ mpsc, oneshot };

enum StreamScript {
    Refuse(TransportError),
    /// One batch of signals per request the stream receives, in order.
    Exchanges(Vec<Vec<StreamSignal>>),
}

/// In-memory transport that answers scripted stream signals and REST replies
/// and records what was sent.
#[derive(Default)]
struct ScriptedTransport {
    streams: Mutex<VecDeque<StreamScript>>,
    replies: Mutex<VecDeque<Result<Reply, TransportError>>>,
    rest_requests: Mutex<Vec<ChatRequest>>,
    stream_requests: Arc<Mutex<Vec<ChatRequest>>>,
    opens: Mutex<usize>,
}

impl ScriptedTransport {
    fn with_stream(self, script: StreamScript) -> Self {
        self.streams.lock().unwrap().push_back(script);
        self
    }

    fn with_reply(self, reply: Result<Reply, TransportError>) -> Self {
        self.replies.lock().unwrap().push_back(reply);
        self
    }

    fn opens(&self) -> usize {
        *self.opens.lock().unwrap()
    }

    fn rest_requests(&self) -> Vec<ChatRequest> {
        self.rest_requests.lock().unwrap().clone()
    }

    fn streamed_requests(&self) -> Vec<ChatRequest> {
        self.stream_requests.lock().unwrap().clone()
    }
}

/// Plays one batch per received request. Once the script runs out the task keeps
/// the stream open until the handle goes away.
async fn play_exchanges(
    exchanges: Vec<Vec<StreamSignal>>,
    mut requests: mpsc::Receiver<ChatRequest>,
    events: mpsc::Sender<StreamSignal>,
    seen: Arc<Mutex<Vec<ChatRequest>>>
) {
    for batch in exchanges {
        let Some(request) = requests.recv().await else {
            return;
        };
        seen.lock().unwrap().push(request);
        for signal in batch {
            if events.send(signal).await.is_err() {
                return;
            }
        }
    }
    while let Some(request) = requests.recv().await {
        seen.lock().unwrap().push(request);
    }
}

#[async_trait]
impl ChatTransport for ScriptedTransport {
    async fn send_once(&self, request: &ChatRequest) -> Result<Reply, TransportError> {
        self.rest_requests.lock().unwrap().push(request.clone());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::NetworkUnreachable("no scripted reply".to_string())))
    }

    async fn open_stream(&self) -> Result<StreamHandle, TransportError> {
        *self.opens.lock().unwrap() += 1;
        let script = self.streams
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| StreamScript::Refuse(TransportError::Timeout));

        match script {
            StreamScript::Refuse(err) => Err(err),
            StreamScript::Exchanges(exchanges) => {
                let (outgoing, requests) = mpsc::channel(16);
                let (events, incoming) = mpsc::channel(64);
                let (shutdown, _shutdown_rx) = oneshot::channel();
                tokio::spawn(
                    play_exchanges(exchanges, requests, events, self.stream_requests.clone())
                );
                Ok(StreamHandle::from_channels(outgoing, incoming, shutdown))
            }
        }
    }
}

fn fragment(text: &str) -> StreamSignal {
    StreamSignal::Event(StreamEvent::Fragment { text: text.to_string() })
}

fn complete(should_publish: bool, content: Option<&str>) -> StreamSignal {
    StreamSignal::Event(StreamEvent::Complete {
        should_publish,
        publish_content: content.map(str::to_string),
    })
}

fn reply(message: &str, is_post: bool) -> Result<Reply, TransportError> {
    Ok(Reply { message: message.to_string(), is_post })
}

fn session_over(transport: &Arc<ScriptedTransport>) -> ChatSession {
    ChatSession::new(transport.clone(), Duration::from_millis(200))
}

#[tokio::test]
async fn streamed_career_tips() {
    let transport = Arc::new(
        ScriptedTransport::default().with_stream(
            StreamScript::Exchanges(
                vec![
                    vec![
                        fragment("Here "),
                        fragment("are tips..."),
                        complete(true, Some("Here are tips..."))
                    ]
                ]
            )
        )
    );
    let mut session = session_over(&transport);

    let mut seen = Vec::new();
    session.send("Career tips", |event| seen.push(event.clone())).await.unwrap();

    let state = session.snapshot();
    assert_eq!(state.turns().len(), 2);
    assert_eq!(state.turns()[0].role, Role::User);
    assert_eq!(state.turns()[0].content, "Career tips");
    assert_eq!(state.turns()[1].role, Role::Assistant);
    assert_eq!(state.turns()[1].content, "Here are tips...");
    assert!(state.turns()[1].should_offer);
    assert_eq!(state.pending_publish_content(), Some("Here are tips..."));
    assert!(!state.awaiting_response());

    assert_eq!(seen.len(), 3);
    assert_eq!(session.mode(), TransportMode::StreamingActive);
    assert!(transport.rest_requests().is_empty());
    assert_eq!(transport.streamed_requests(), vec![ChatRequest {
        message: "Career tips".to_string(),
        chat_history: Vec::new(),
    }]);
}

#[tokio::test]
async fn refused_stream_falls_back_and_stays_on_rest() {
    let transport = Arc::new(
        ScriptedTransport::default()
            .with_stream(StreamScript::Refuse(TransportError::NetworkUnreachable("refused".to_string())))
            .with_reply(reply("Hello!", false))
            .with_reply(reply("Sure, here is a draft", true))
    );
    let mut session = session_over(&transport);

    session.send("Hi", |_| {}).await.unwrap();
    assert_eq!(session.mode(), TransportMode::RestOnly);
    assert_eq!(transport.rest_requests(), vec![ChatRequest {
        message: "Hi".to_string(),
        chat_history: Vec::new(),
    }]);

    session.send("Write a post", |_| {}).await.unwrap();
    assert_eq!(transport.opens(), 1);

    let requests = transport.rest_requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[1], ChatRequest {
        message: "Write a post".to_string(),
        chat_history: vec![
            HistoryEntry { role: Role::User, content: "Hi".to_string() },
            HistoryEntry { role: Role::Assistant, content: "Hello!".to_string() }
        ],
    });

    let state = session.snapshot();
    assert_eq!(state.turns().len(), 4);
    assert_eq!(state.pending_publish_content(), Some("Sure, here is a draft"));
}

#[tokio::test]
async fn stream_closing_before_any_event_replays_over_rest() {
    let transport = Arc::new(
        ScriptedTransport::default()
            .with_stream(StreamScript::Exchanges(vec![vec![StreamSignal::Closed]]))
            .with_reply(reply("From REST", false))
    );
    let mut session = session_over(&transport);

    session.send("Hi", |_| {}).await.unwrap();

    assert_eq!(session.mode(), TransportMode::RestOnly);
    assert_eq!(transport.rest_requests().len(), 1);
    assert_eq!(transport.rest_requests()[0].message, "Hi");
    let state = session.snapshot();
    assert_eq!(state.turns().len(), 2);
    assert_eq!(state.turns()[1].content, "From REST");
}

#[tokio::test]
async fn silent_stream_times_out_then_replays_over_rest() {
    let transport = Arc::new(
        ScriptedTransport::default()
            .with_stream(StreamScript::Exchanges(vec![Vec::new()]))
            .with_reply(reply("Late but here", false))
    );
    let mut session = session_over(&transport);

    session.send("Hi", |_| {}).await.unwrap();

    assert_eq!(session.mode(), TransportMode::RestOnly);
    assert_eq!(session.snapshot().turns()[1].content, "Late but here");
}

#[tokio::test]
async fn stream_failure_mid_response_becomes_error_turn() {
    let transport = Arc::new(
        ScriptedTransport::default().with_stream(
            StreamScript::Exchanges(
                vec![
                    vec![
                        fragment("Par"),
                        StreamSignal::Failed(
                            TransportError::NetworkUnreachable("connection reset".to_string())
                        )
                    ]
                ]
            )
        )
    );
    let mut session = session_over(&transport);

    session.send("Hi", |_| {}).await.unwrap();

    let state = session.snapshot();
    assert_eq!(state.turns().len(), 3);
    assert_eq!(state.turns()[1].content, "Par");
    assert_eq!(state.turns()[2].role, Role::Assistant);
    assert_eq!(state.turns()[2].content, "Could not reach the server: connection reset");
    assert!(!state.awaiting_response());
    assert_eq!(session.mode(), TransportMode::RestOnly);
    assert!(transport.rest_requests().is_empty());
}

#[tokio::test]
async fn server_error_event_is_shown_and_stream_kept() {
    let transport = Arc::new(
        ScriptedTransport::default().with_stream(
            StreamScript::Exchanges(
                vec![
                    vec![
                        StreamSignal::Event(StreamEvent::Error {
                            message: "Invalid message format".to_string(),
                        })
                    ],
                    vec![fragment("Recovered"), complete(false, None)]
                ]
            )
        )
    );
    let mut session = session_over(&transport);

    session.send("first", |_| {}).await.unwrap();
    assert_eq!(session.snapshot().turns()[1].content, "Invalid message format");
    assert_eq!(session.mode(), TransportMode::StreamingActive);

    session.send("second", |_| {}).await.unwrap();
    assert_eq!(transport.opens(), 1);
    let state = session.snapshot();
    assert_eq!(state.turns().len(), 4);
    assert_eq!(state.turns()[3].content, "Recovered");
    assert_eq!(transport.streamed_requests().len(), 2);
}

#[tokio::test]
async fn stray_fragment_after_completion_is_not_part_of_next_reply() {
    let transport = Arc::new(
        ScriptedTransport::default().with_stream(
            StreamScript::Exchanges(
                vec![
                    vec![fragment("A"), complete(false, None), fragment(" straggler")],
                    vec![fragment("B"), complete(false, None)]
                ]
            )
        )
    );
    let mut session = session_over(&transport);

    session.send("first", |_| {}).await.unwrap();
    let mut seen = Vec::new();
    session.send("second", |event| seen.push(event.clone())).await.unwrap();

    let state = session.snapshot();
    assert_eq!(state.turns().len(), 4);
    assert_eq!(state.turns()[1].content, "A");
    assert_eq!(state.turns()[3].content, "B");
    assert!(!state.awaiting_response());
    assert_eq!(seen, vec![
        StreamEvent::Fragment { text: "B".to_string() },
        StreamEvent::Complete { should_publish: false, publish_content: None }
    ]);
    assert_eq!(transport.opens(), 1);
    assert_eq!(session.mode(), TransportMode::StreamingActive);
}

#[tokio::test]
async fn stray_error_after_completion_does_not_end_next_exchange() {
    let transport = Arc::new(
        ScriptedTransport::default().with_stream(
            StreamScript::Exchanges(
                vec![
                    vec![
                        fragment("A"),
                        complete(false, None),
                        StreamSignal::Event(StreamEvent::Error { message: "late".to_string() })
                    ],
                    vec![fragment("B"), complete(false, None)]
                ]
            )
        )
    );
    let mut session = session_over(&transport);

    session.send("first", |_| {}).await.unwrap();
    session.send("second", |_| {}).await.unwrap();

    let state = session.snapshot();
    assert_eq!(state.turns().len(), 4);
    assert_eq!(state.turns()[2].content, "second");
    assert_eq!(state.turns()[3].role, Role::Assistant);
    assert_eq!(state.turns()[3].content, "B");
    assert!(state.turns().iter().all(|turn| turn.content != "late"));
    assert!(!state.awaiting_response());
    assert_eq!(transport.streamed_requests().len(), 2);
}

#[tokio::test]
async fn stream_closed_between_exchanges_replays_over_rest() {
    let transport = Arc::new(
        ScriptedTransport::default()
            .with_stream(
                StreamScript::Exchanges(
                    vec![vec![fragment("A"), complete(false, None), StreamSignal::Closed]]
                )
            )
            .with_reply(reply("From REST", false))
    );
    let mut session = session_over(&transport);

    session.send("first", |_| {}).await.unwrap();
    session.send("second", |_| {}).await.unwrap();

    assert_eq!(session.mode(), TransportMode::RestOnly);
    assert_eq!(transport.opens(), 1);
    assert_eq!(transport.streamed_requests().len(), 1);
    assert_eq!(transport.rest_requests(), vec![ChatRequest {
        message: "second".to_string(),
        chat_history: vec![
            HistoryEntry { role: Role::User, content: "first".to_string() },
            HistoryEntry { role: Role::Assistant, content: "A".to_string() }
        ],
    }]);
    assert_eq!(session.snapshot().turns()[3].content, "From REST");
}

#[tokio::test]
async fn rest_failure_becomes_error_turn() {
    let transport = Arc::new(
        ScriptedTransport::default().with_reply(
            Err(TransportError::ServerError { status: 500, body: "boom".to_string() })
        )
    );
    let mut session = session_over(&transport).with_policy(FallbackPolicy::rest_only());

    session.send("Hi", |_| {}).await.unwrap();

    assert_eq!(transport.opens(), 0);
    let state = session.snapshot();
    assert_eq!(state.turns().len(), 2);
    assert_eq!(state.turns()[1].content, "Server error (500): boom");
    assert!(!state.awaiting_response());

    // The session stays usable after the failure.
    assert!(session.send("Again", |_| {}).await.is_ok());
}

#[tokio::test]
async fn blank_message_never_reaches_transport() {
    let transport = Arc::new(ScriptedTransport::default());
    let mut session = session_over(&transport);

    assert_eq!(session.send("  ", |_| {}).await, Err(StoreError::EmptyMessage));
    assert_eq!(transport.opens(), 0);
    assert!(transport.rest_requests().is_empty());
}

#[tokio::test]
async fn scheduling_without_offer_is_rejected() {
    let transport = Arc::new(ScriptedTransport::default());
    let mut session = session_over(&transport);
    let scheduler = PostScheduler::new(&ClientConfig::default(), AuthToken::default()).unwrap();
    let at = chrono::Local::now().naive_local() + chrono::Duration::hours(1);

    assert_eq!(
        session.schedule_pending(&scheduler, "s1", at).await,
        Err(SchedulerError::NothingToPublish)
    );
}
