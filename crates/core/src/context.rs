use rcm_model::ChatRequest;

/// The identity of an active chat session: who is asking, about which
/// document, in which chat.
///
/// It is handed to the session explicitly on activation and never
/// mutated by it.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SessionContext {
    /// The signed-in user.
    pub user_id: String,
    /// The document (record) being discussed.
    pub record_id: String,
    /// The chat session holding the history.
    pub chat_id: String,
}

impl SessionContext {
    /// Creates a context from its three identifiers.
    #[inline]
    pub fn new(
        user_id: impl Into<String>,
        record_id: impl Into<String>,
        chat_id: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            record_id: record_id.into(),
            chat_id: chat_id.into(),
        }
    }

    pub(crate) fn chat_request(&self, prompt: String) -> ChatRequest {
        ChatRequest {
            prompt,
            chat_id: self.chat_id.clone(),
            record_id: self.record_id.clone(),
            user_id: self.user_id.clone(),
        }
    }
}
