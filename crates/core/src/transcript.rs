//! Transcript-related types.

use rcm_model::{ChatEvent, HistoryRow, MessageId};

/// One prompt/response exchange.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Turn {
    /// The user prompt.
    pub prompt: String,
    /// The answer received so far.
    pub response: String,
    /// The persisted id, once the backend assigned one.
    pub message_id: Option<MessageId>,
}

impl From<HistoryRow> for Turn {
    #[inline]
    fn from(row: HistoryRow) -> Self {
        Self {
            prompt: row.prompt,
            response: row.response.unwrap_or_default(),
            message_id: Some(row.id),
        }
    }
}

/// The turns of a chat session, oldest first, plus the current turn.
///
/// Committed turns never change. Only the current turn receives stream
/// events, and at most one turn streams at a time.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Transcript {
    history: Vec<Turn>,
    current: Option<Turn>,
    streaming: bool,
    selection: Option<MessageId>,
}

impl Transcript {
    /// Committed turns, oldest first.
    #[inline]
    pub fn history(&self) -> &[Turn] {
        &self.history
    }

    /// The most recent turn, which may still be streaming.
    #[inline]
    pub fn current(&self) -> Option<&Turn> {
        self.current.as_ref()
    }

    /// Whether the current turn is still receiving events.
    #[inline]
    pub fn is_streaming(&self) -> bool {
        self.streaming
    }

    /// The turn picked for the citation panel.
    #[inline]
    pub fn selection(&self) -> Option<&MessageId> {
        self.selection.as_ref()
    }

    /// Whether there is nothing to show.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.history.is_empty() && self.current.is_none()
    }

    /// All turns in chronological order, current turn last.
    pub fn turns(&self) -> impl Iterator<Item = &Turn> {
        self.history.iter().chain(self.current.iter())
    }

    /// Looks up a turn by its persisted id.
    pub fn find(&self, id: &MessageId) -> Option<&Turn> {
        self.turns()
            .find(|turn| turn.message_id.as_ref() == Some(id))
    }

    /// The selected turn, if the selection points at a known turn.
    #[inline]
    pub fn selected_turn(&self) -> Option<&Turn> {
        self.selection.as_ref().and_then(|id| self.find(id))
    }

    /// Clears everything.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Loads persisted turns, given newest first.
    ///
    /// On an untouched transcript the newest row becomes the current turn
    /// and is selected, the rest becomes history in chronological order.
    /// If turns were started locally in the meantime, the persisted turns
    /// are placed before them and the local state is left alone.
    pub fn rehydrate(&mut self, rows: Vec<HistoryRow>) {
        let mut turns: Vec<Turn> = rows.into_iter().map(Turn::from).collect();
        turns.reverse();

        if self.is_empty() {
            self.current = turns.pop();
            self.history = turns;
            self.streaming = false;
            self.selection =
                self.current.as_ref().and_then(|t| t.message_id.clone());
            return;
        }

        // The backend may already hold a turn we started locally.
        turns.retain(|turn| {
            turn.message_id
                .as_ref()
                .is_none_or(|id| self.find(id).is_none())
        });
        turns.append(&mut self.history);
        self.history = turns;
    }

    /// Commits the current turn, even if unfinished, and opens a new one.
    pub fn begin_turn(&mut self, prompt: String) {
        if let Some(turn) = self.current.take() {
            self.history.push(turn);
        }
        self.current = Some(Turn {
            prompt,
            ..Default::default()
        });
        self.streaming = true;
    }

    /// Folds a stream event into the current turn.
    pub fn apply_event(&mut self, event: ChatEvent) {
        let Some(current) = self.current.as_mut() else {
            return;
        };
        match event {
            ChatEvent::HistoryId(id) => {
                current.message_id = Some(id.clone());
                self.selection = Some(id);
            }
            ChatEvent::Token(token) => current.response.push_str(&token),
        }
    }

    /// Marks the current turn as no longer streaming.
    #[inline]
    pub fn finish_turn(&mut self) {
        self.streaming = false;
    }

    /// Points the citation panel at a turn.
    #[inline]
    pub fn select(&mut self, id: Option<MessageId>) {
        self.selection = id;
    }
}
