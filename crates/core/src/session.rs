mod builder;
mod dispatcher;
mod state;

use std::error::Error;
use std::fmt;
use std::sync::Arc;

use rcm_model::MessageId;
use tokio::sync::oneshot;

pub use builder::ChatSessionBuilder;
use dispatcher::Mailbox;
use state::SessionMessage;
pub use state::{SessionPhase, SessionSnapshot};

use crate::context::SessionContext;

/// A type of error which is returned when messages are sent to a chat
/// session that has been closed.
pub struct SessionClosedError;

impl fmt::Debug for SessionClosedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionClosedError").finish()
    }
}

impl fmt::Display for SessionClosedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        "the chat session has been closed".fmt(f)
    }
}

impl Error for SessionClosedError {}

/// A chat session, which owns the transcript of the active chat and the
/// streaming request feeding it.
///
/// Every call is turned into a message and handled in order by a single
/// dispatcher task, so the transcript is only ever touched from one
/// place. Background work (loading history, consuming the stream) posts
/// its results back as messages too.
///
/// Dropping the last handle stops the dispatcher and aborts background
/// work.
#[derive(Clone)]
pub struct ChatSession {
    mailbox: Arc<Mailbox>,
}

impl ChatSession {
    /// Switches to another chat, or to none.
    ///
    /// The transcript is cleared and any stream in flight is cancelled.
    /// With a context, the persisted history of that chat is loaded.
    #[inline]
    pub fn activate(
        &self,
        context: Option<SessionContext>,
    ) -> Result<(), SessionClosedError> {
        self.mailbox.send(SessionMessage::Activate(context))
    }

    /// Sends a prompt to the active chat.
    #[inline]
    pub fn send_user_input<S: Into<String>>(
        &self,
        input: S,
    ) -> Result<(), SessionClosedError> {
        self.mailbox.send(SessionMessage::UserInput(input.into()))
    }

    /// Points the citation panel at a turn.
    #[inline]
    pub fn select(
        &self,
        id: Option<MessageId>,
    ) -> Result<(), SessionClosedError> {
        self.mailbox.send(SessionMessage::Select(id))
    }

    /// Returns a copy of the current state, after every message sent
    /// before this call has been handled.
    pub async fn snapshot(&self) -> Result<SessionSnapshot, SessionClosedError> {
        let (tx, rx) = oneshot::channel();
        self.mailbox.send(SessionMessage::Snapshot(tx))?;
        rx.await.map_err(|_| SessionClosedError)
    }

    /// Stops the session. Further calls fail with [`SessionClosedError`].
    #[inline]
    pub fn close(&self) {
        self.mailbox.close();
    }
}
