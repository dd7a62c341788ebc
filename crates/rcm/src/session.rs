use std::sync::Arc;

use rcm_core::{
    ChatSession, ChatSessionBuilder, ClaimForm, ClaimSubmission,
    SessionClosedError, SessionContext, SessionPhase, SessionSnapshot,
    Transcript,
};
use rcm_model::{ChatProvider, HistoryStore, LetterStore, MessageId};
use rcm_supabase::{SupabaseChatProvider, SupabaseConfig, SupabaseStore};

/// A session builder.
///
/// See [`Session`].
pub struct SessionBuilder {
    chat_builder: ChatSessionBuilder,
    letters: Arc<dyn LetterStore>,
}

impl SessionBuilder {
    /// Creates a session builder talking to a Supabase project.
    pub fn with_supabase(config: SupabaseConfig) -> Self {
        let store = SupabaseStore::new(config.clone());
        Self::with_backend(SupabaseChatProvider::new(config), store)
    }

    /// Creates a session builder with a specified chat provider and table
    /// store.
    pub fn with_backend<P, S>(provider: P, store: S) -> Self
    where
        P: ChatProvider + 'static,
        S: HistoryStore + LetterStore + Clone + 'static,
    {
        let letters = Arc::new(store.clone());
        Self {
            chat_builder: ChatSessionBuilder::with_backend(provider, store),
            letters,
        }
    }

    /// Attaches a callback to be invoked when the transcript changes.
    #[inline]
    pub fn on_change(
        mut self,
        on_change: impl Fn(&Transcript, SessionPhase) + Send + Sync + 'static,
    ) -> Self {
        self.chat_builder = self.chat_builder.on_change(on_change);
        self
    }

    /// Attaches a callback to be invoked with alerts for the user.
    #[inline]
    pub fn on_alert(
        mut self,
        on_alert: impl Fn(&str) + Send + Sync + 'static,
    ) -> Self {
        self.chat_builder = self.chat_builder.on_alert(on_alert);
        self
    }

    /// Builds a new session.
    pub fn build(self) -> Session {
        Session {
            chat: self.chat_builder.build(),
            letters: self.letters,
        }
    }
}

/// A document chat window together with the claim form that can be
/// opened from it.
///
/// The session is basically a wrapper around [`ChatSession`] that also
/// knows where to find the user's denial letters.
pub struct Session {
    chat: ChatSession,
    letters: Arc<dyn LetterStore>,
}

impl Session {
    /// Switches to another chat, or to none.
    #[inline]
    pub fn activate(
        &self,
        context: Option<SessionContext>,
    ) -> Result<(), SessionClosedError> {
        self.chat.activate(context)
    }

    /// Sends a message to the active chat.
    #[inline]
    pub fn send_message(&self, message: &str) -> Result<(), SessionClosedError> {
        self.chat.send_user_input(message)
    }

    /// Points the citation panel at a turn.
    #[inline]
    pub fn select(
        &self,
        id: Option<MessageId>,
    ) -> Result<(), SessionClosedError> {
        self.chat.select(id)
    }

    /// Returns a copy of the chat state.
    #[inline]
    pub async fn snapshot(&self) -> Result<SessionSnapshot, SessionClosedError> {
        self.chat.snapshot().await
    }

    /// Opens a claim form for `user_id` with the letters they already
    /// uploaded.
    pub async fn open_claim_form<I, S>(
        &self,
        user_id: &str,
        existing_titles: I,
        on_submit: impl FnMut(ClaimSubmission) + Send + 'static,
    ) -> ClaimForm
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut form = ClaimForm::new(existing_titles, on_submit);
        form.load_denial_letters(self.letters.as_ref(), user_id).await;
        form
    }

    /// Stops the session.
    #[inline]
    pub fn close(&self) {
        self.chat.close();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use rcm_core::{ClaimFormEvent, SessionContext};
    use rcm_model::LetterId;
    use rcm_test_model::{PresetResponse, TestChatProvider, TestStore};

    use super::*;

    #[tokio::test]
    async fn test_chat_and_claim() {
        let provider = TestChatProvider::default();
        provider.add_response(PresetResponse::with_tokens("5", ["Denied."]));
        let store = TestStore::default();
        store.insert_letter("user-1", "31", "eob.pdf");

        let session = SessionBuilder::with_backend(provider, store).build();
        session
            .activate(Some(SessionContext::new("user-1", "doc-1", "chat-1")))
            .unwrap();
        session.send_message("Why?").unwrap();

        let submitted = Arc::new(Mutex::new(None));
        let mut form = session
            .open_claim_form("user-1", ["Knee MRI"], {
                let submitted = Arc::clone(&submitted);
                move |claim| *submitted.lock().unwrap() = Some(claim)
            })
            .await;
        let letters = form.letter_options().unwrap();
        assert_eq!(letters[0].file_name, "eob.pdf");

        form.dispatch(ClaimFormEvent::TitleChanged("Knee MRI".to_owned()))
            .unwrap();
        assert!(form.dispatch(ClaimFormEvent::Submit).is_err());

        form.dispatch(ClaimFormEvent::TitleChanged("Back MRI".to_owned()))
            .unwrap();
        form.dispatch(ClaimFormEvent::LetterSelected(Some(LetterId::new("31"))))
            .unwrap();
        form.dispatch(ClaimFormEvent::Submit).unwrap();

        let claim = submitted.lock().unwrap().take().unwrap();
        assert_eq!(claim.title, "Back MRI");
        assert_eq!(claim.letter_id, Some(LetterId::new("31")));
        assert_eq!(claim.file, None);

        let snapshot = session.snapshot().await.unwrap();
        assert_eq!(snapshot.transcript.current().unwrap().prompt, "Why?");
    }
}
