use std::fmt::{self, Debug};
use std::sync::Arc;

use rcm_model::{ChatEvent, HistoryRow, HistoryStore, MessageId, StoreError};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::Instrument;

use crate::chat_client::ChatClient;
use crate::context::SessionContext;
use crate::transcript::Transcript;

pub(crate) type ChangeFn = Box<dyn Fn(&Transcript, SessionPhase) + Send + Sync>;
pub(crate) type AlertFn = Box<dyn Fn(&str) + Send + Sync>;

/// What the session is doing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum SessionPhase {
    /// No chat is active.
    #[default]
    Idle,
    /// The persisted history is being fetched.
    Loading,
    /// Waiting for user input.
    Ready,
    /// A response is streaming into the current turn.
    Streaming,
}

/// A copy of the session state for rendering.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SessionSnapshot {
    /// The active chat, if any.
    pub context: Option<SessionContext>,
    /// What the session is doing.
    pub phase: SessionPhase,
    /// The turns of the active chat.
    pub transcript: Transcript,
}

pub enum SessionMessage {
    Activate(Option<SessionContext>),
    UserInput(String),
    Select(Option<MessageId>),
    Snapshot(oneshot::Sender<SessionSnapshot>),
    HistoryLoaded {
        generation: u64,
        result: Result<Vec<HistoryRow>, StoreError>,
    },
    StreamEvent {
        turn: u64,
        event: ChatEvent,
    },
    StreamEnded {
        turn: u64,
        error: Option<String>,
    },
}

impl Debug for SessionMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Activate(context) => {
                f.debug_tuple("Activate").field(context).finish()
            }
            // Prompts may hold PHI, keep them out of the logs.
            Self::UserInput(input) => f
                .debug_struct("UserInput")
                .field("len", &input.len())
                .finish(),
            Self::Select(id) => f.debug_tuple("Select").field(id).finish(),
            Self::Snapshot(_) => f.debug_struct("Snapshot").finish(),
            Self::HistoryLoaded { generation, result } => f
                .debug_struct("HistoryLoaded")
                .field("generation", generation)
                .field("rows", &result.as_ref().map(Vec::len))
                .finish(),
            Self::StreamEvent { turn, event } => f
                .debug_struct("StreamEvent")
                .field("turn", turn)
                .field("event", event)
                .finish(),
            Self::StreamEnded { turn, error } => f
                .debug_struct("StreamEnded")
                .field("turn", turn)
                .field("error", error)
                .finish(),
        }
    }
}

pub struct SessionState {
    pub(crate) chat_client: ChatClient,
    pub(crate) store: Arc<dyn HistoryStore>,
    pub(crate) msg_tx: mpsc::UnboundedSender<SessionMessage>,
    pub(crate) context: Option<SessionContext>,
    pub(crate) transcript: Transcript,
    pub(crate) phase: SessionPhase,
    // Bumped on every activation. History results from older
    // activations are dropped.
    pub(crate) generation: u64,
    // Bumped on every prompt. Stream messages from older prompts are
    // dropped.
    pub(crate) turn: u64,
    pub(crate) fetch_task: Option<JoinHandle<()>>,
    pub(crate) stream_task: Option<JoinHandle<()>>,
    pub(crate) on_change: Option<ChangeFn>,
    pub(crate) on_alert: Option<AlertFn>,
}

impl SessionState {
    pub fn handle(&mut self, msg: SessionMessage) {
        match msg {
            SessionMessage::Activate(context) => self.activate(context),
            SessionMessage::UserInput(input) => self.process_input(input),
            SessionMessage::Select(id) => {
                self.transcript.select(id);
                self.notify_change();
            }
            SessionMessage::Snapshot(tx) => {
                tx.send(self.snapshot()).ok();
            }
            SessionMessage::HistoryLoaded { generation, result } => {
                self.history_loaded(generation, result);
            }
            SessionMessage::StreamEvent { turn, event } => {
                if turn != self.turn {
                    trace!("dropping event of an abandoned stream");
                    return;
                }
                self.transcript.apply_event(event);
                self.notify_change();
            }
            SessionMessage::StreamEnded { turn, error } => {
                self.stream_ended(turn, error);
            }
        }
    }

    pub fn shutdown(&mut self) {
        self.cancel_stream();
        if let Some(task) = self.fetch_task.take() {
            task.abort();
        }
    }

    fn activate(&mut self, context: Option<SessionContext>) {
        self.shutdown();
        self.generation += 1;
        self.transcript.reset();
        self.context = context;

        let Some(context) = &self.context else {
            debug!("no active chat");
            self.phase = SessionPhase::Idle;
            self.notify_change();
            return;
        };
        debug!("activating chat {}", context.chat_id);
        self.phase = SessionPhase::Loading;

        let store = Arc::clone(&self.store);
        let msg_tx = self.msg_tx.clone();
        let generation = self.generation;
        let chat_id = context.chat_id.clone();
        let span = trace_span!("history fetch", chat_id = %chat_id);
        self.fetch_task = Some(tokio::spawn(
            async move {
                let result = store.fetch_history(&chat_id).await;
                msg_tx
                    .send(SessionMessage::HistoryLoaded { generation, result })
                    .ok();
            }
            .instrument(span),
        ));
        self.notify_change();
    }

    fn history_loaded(
        &mut self,
        generation: u64,
        result: Result<Vec<HistoryRow>, StoreError>,
    ) {
        if generation != self.generation {
            warn!("discarding history of a chat that is no longer active");
            return;
        }
        self.fetch_task = None;

        match result {
            Ok(rows) => {
                debug!("loaded {} turns", rows.len());
                self.transcript.rehydrate(rows);
            }
            Err(err) => {
                error!("failed to load chat history: {err}");
                if let Some(on_alert) = &self.on_alert {
                    on_alert(&*err.message());
                }
            }
        }
        if self.phase == SessionPhase::Loading {
            self.phase = SessionPhase::Ready;
        }
        self.notify_change();
    }

    fn process_input(&mut self, input: String) {
        let Some(context) = &self.context else {
            warn!("dropping user input, no chat is active");
            return;
        };
        let request = context.chat_request(input.clone());

        // Only one stream per session. The previous turn is committed as
        // it stands.
        self.cancel_stream();
        self.turn += 1;
        self.transcript.begin_turn(input);
        self.phase = SessionPhase::Streaming;

        let chat_client = self.chat_client.clone();
        let msg_tx = self.msg_tx.clone();
        let turn = self.turn;
        self.stream_task = Some(tokio::spawn(async move {
            let event_tx = msg_tx.clone();
            let result = chat_client
                .send_request(request, move |event| {
                    event_tx
                        .send(SessionMessage::StreamEvent { turn, event })
                        .ok();
                })
                .await;
            let error = result.err().map(|err| err.to_string());
            msg_tx.send(SessionMessage::StreamEnded { turn, error }).ok();
        }));
        self.notify_change();
    }

    fn stream_ended(&mut self, turn: u64, error: Option<String>) {
        if turn != self.turn {
            return;
        }
        self.stream_task = None;
        if let Some(error) = error {
            // Whatever arrived so far stays in the transcript.
            warn!("chat stream ended with an error: {error}");
        }
        self.transcript.finish_turn();
        self.phase = SessionPhase::Ready;
        self.notify_change();
    }

    fn cancel_stream(&mut self) {
        if let Some(task) = self.stream_task.take() {
            debug!("cancelling the stream of turn {}", self.turn);
            task.abort();
            self.transcript.finish_turn();
            // Anything the task posted before the abort is dropped.
            self.turn += 1;
        }
    }

    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            context: self.context.clone(),
            phase: self.phase,
            transcript: self.transcript.clone(),
        }
    }

    fn notify_change(&self) {
        if let Some(on_change) = &self.on_change {
            on_change(&self.transcript, self.phase);
        }
    }
}
