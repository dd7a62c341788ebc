use serde::{Deserialize, Serialize};

/// A chat request to be sent to the chat provider.
///
/// The identifiers tie the prompt to a chat session, the document the
/// chat is about and the user asking.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChatRequest {
    /// The user prompt.
    pub prompt: String,
    /// The chat session the turn belongs to.
    pub chat_id: String,
    /// The document (record) being discussed.
    pub record_id: String,
    /// The user asking.
    pub user_id: String,
}
