use std::pin::Pin;
use std::task::{self, Poll};

use serde::{Deserialize, Serialize};

use crate::id::MessageId;
use crate::provider::ChatProviderError;

/// A streaming response from the chat provider.
pub trait ChatResponse: Sized + Send + 'static {
    /// The error type that may be returned by the provider.
    type Error: ChatProviderError;

    /// Attempts to pull out the next event from the response.
    ///
    /// # Return value
    ///
    /// There are several possible return values, each indicating a
    /// distinct response state:
    ///
    /// - `Poll::Pending` means that this response is still waiting for
    ///   the next event. Implementations will ensure that the current
    ///   task will be notified when the next event may be ready.
    /// - `Poll::Ready(Ok(Some(event)))` means the response has an event
    ///   to deliver, and may produce further events on subsequent
    ///   `poll_next_event` calls.
    /// - `Poll::Ready(Ok(None))` means the transport has closed. There is
    ///   no explicit completion event, closing the stream ends the turn.
    /// - `Poll::Ready(Err(error))` means the stream broke. Events already
    ///   delivered remain valid.
    ///
    /// Calling this method after completion should always return `None`.
    fn poll_next_event(
        self: Pin<&mut Self>,
        cx: &mut task::Context<'_>,
    ) -> Poll<Result<Option<ChatEvent>, Self::Error>>;
}

/// The event from a chat response.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChatEvent {
    /// The backend persisted the turn under this id.
    HistoryId(MessageId),
    /// Received a fragment of the answer.
    Token(String),
}
