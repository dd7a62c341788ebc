use std::borrow::Cow;
use std::error::Error;
use std::fmt::{self, Display};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ErrorKind;
use crate::id::{LetterId, MessageId};

/// A persisted chat turn, as stored in the chat history table.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HistoryRow {
    /// Row id.
    pub id: MessageId,
    /// The user prompt.
    pub prompt: String,
    /// The answer. Missing when the backend never finished the turn.
    #[serde(default)]
    pub response: Option<String>,
    /// Creation timestamp, as formatted by the backend.
    #[serde(default)]
    pub created_at: Option<String>,
}

/// A denial letter that has already been uploaded and processed.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DenialLetter {
    /// Row id.
    pub id: LetterId,
    /// Original file name of the letter.
    pub file_name: String,
}

/// Describes a failed table read.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct StoreError {
    kind: ErrorKind,
    message: Option<String>,
}

impl StoreError {
    /// Creates an error of the given kind.
    #[inline]
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            message: None,
        }
    }

    /// Attaches a message to the error.
    #[inline]
    pub fn with_message<S: Into<String>>(self, message: S) -> Self {
        Self {
            kind: self.kind,
            message: Some(message.into()),
        }
    }

    /// Returns the kind of this error.
    #[inline]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the message to show to the user.
    #[inline]
    pub fn message(&self) -> Cow<'_, str> {
        match self.message.as_deref() {
            Some(message) => Cow::Borrowed(message),
            None => Cow::Owned(format!("{}", self.kind)),
        }
    }
}

impl Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl Error for StoreError {}

/// Read access to persisted chat turns.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Fetches every turn of a chat, newest first.
    async fn fetch_history(
        &self,
        chat_id: &str,
    ) -> Result<Vec<HistoryRow>, StoreError>;
}

/// Read access to the user's processed denial letters.
#[async_trait]
pub trait LetterStore: Send + Sync {
    /// Lists the denial letters owned by a user.
    async fn list_denial_letters(
        &self,
        user_id: &str,
    ) -> Result<Vec<DenialLetter>, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_row_nullable_response() {
        let row: HistoryRow = serde_json::from_str(
            r#"{"id": 3, "prompt": "Why?", "response": null, "chat_id": 1}"#,
        )
        .unwrap();
        assert_eq!(row.id, MessageId::new("3"));
        assert_eq!(row.response, None);
        assert_eq!(row.created_at, None);
    }

    #[test]
    fn test_error_message_fallback() {
        let err = StoreError::new(ErrorKind::Transport);
        assert_eq!(err.message(), "Transport error");
        let err = err.with_message("relation does not exist");
        assert_eq!(format!("{err}"), "relation does not exist");
    }
}
