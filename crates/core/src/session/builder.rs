use std::sync::Arc;

use rcm_model::{ChatProvider, HistoryStore};
use tracing::Instrument;

use super::ChatSession;
use super::dispatcher::{Mailbox, MailboxParts, run_session};
use super::state::{AlertFn, ChangeFn, SessionPhase, SessionState};
use crate::chat_client::ChatClient;
use crate::transcript::Transcript;

/// [`ChatSession`] builder.
pub struct ChatSessionBuilder {
    chat_client: ChatClient,
    store: Arc<dyn HistoryStore>,
    on_change: Option<ChangeFn>,
    on_alert: Option<AlertFn>,
}

impl ChatSessionBuilder {
    /// Creates a new builder with the specified chat provider and history
    /// store.
    #[inline]
    pub fn with_backend<P, S>(provider: P, store: S) -> Self
    where
        P: ChatProvider + 'static,
        S: HistoryStore + 'static,
    {
        Self {
            chat_client: ChatClient::new(provider),
            store: Arc::new(store),
            on_change: None,
            on_alert: None,
        }
    }

    /// Attaches a callback to be invoked after every change of the
    /// transcript or the phase.
    #[inline]
    pub fn on_change(
        mut self,
        on_change: impl Fn(&Transcript, SessionPhase) + Send + Sync + 'static,
    ) -> Self {
        self.on_change = Some(Box::new(on_change));
        self
    }

    /// Attaches a callback to be invoked with a message the user must
    /// see, such as a failure to load the history.
    #[inline]
    pub fn on_alert(
        mut self,
        on_alert: impl Fn(&str) + Send + Sync + 'static,
    ) -> Self {
        self.on_alert = Some(Box::new(on_alert));
        self
    }

    /// Builds the session and starts its dispatcher.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a tokio runtime.
    pub fn build(self) -> ChatSession {
        let MailboxParts {
            mailbox,
            msg_rx,
            kill_rx,
        } = Mailbox::new();
        let state = SessionState {
            chat_client: self.chat_client,
            store: self.store,
            msg_tx: mailbox.sender(),
            context: None,
            transcript: Transcript::default(),
            phase: SessionPhase::Idle,
            generation: 0,
            turn: 0,
            fetch_task: None,
            stream_task: None,
            on_change: self.on_change,
            on_alert: self.on_alert,
        };
        tokio::spawn(
            run_session(state, msg_rx, kill_rx)
                .instrument(trace_span!("chat session")),
        );
        ChatSession {
            mailbox: Arc::new(mailbox),
        }
    }
}
