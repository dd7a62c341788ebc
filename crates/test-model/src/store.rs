use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use rcm_model::{
    DenialLetter, ErrorKind, HistoryRow, HistoryStore, LetterStore, RowId,
    StoreError,
};

#[derive(Default)]
struct Tables {
    history: HashMap<String, Vec<HistoryRow>>,
    letters: HashMap<String, Vec<DenialLetter>>,
    history_failures: HashMap<String, String>,
    history_delays: HashMap<String, Duration>,
    letter_failure: Option<String>,
    next_seq: u64,
}

/// An in-memory table store for testing purpose.
///
/// Turns are inserted in chronological order and read back newest first,
/// the same way the real history query orders them.
#[derive(Clone, Default)]
pub struct TestStore {
    tables: Arc<Mutex<Tables>>,
}

impl TestStore {
    /// Appends a finished turn to a chat.
    pub fn insert_turn(
        &self,
        chat_id: &str,
        id: impl Into<RowId>,
        prompt: &str,
        response: &str,
    ) {
        let mut tables = self.lock();
        tables.next_seq += 1;
        let created_at = format!("2024-01-01T00:00:{:02}Z", tables.next_seq);
        tables
            .history
            .entry(chat_id.to_owned())
            .or_default()
            .push(HistoryRow {
                id: id.into(),
                prompt: prompt.to_owned(),
                response: Some(response.to_owned()),
                created_at: Some(created_at),
            });
    }

    /// Adds a processed denial letter for a user.
    pub fn insert_letter(
        &self,
        user_id: &str,
        id: impl Into<RowId>,
        file_name: &str,
    ) {
        self.lock()
            .letters
            .entry(user_id.to_owned())
            .or_default()
            .push(DenialLetter {
                id: id.into(),
                file_name: file_name.to_owned(),
            });
    }

    /// Makes every history read of `chat_id` fail with `message`.
    pub fn fail_history(&self, chat_id: &str, message: &str) {
        self.lock()
            .history_failures
            .insert(chat_id.to_owned(), message.to_owned());
    }

    /// Delays every history read of `chat_id`.
    pub fn delay_history(&self, chat_id: &str, delay: Duration) {
        self.lock()
            .history_delays
            .insert(chat_id.to_owned(), delay);
    }

    /// Makes every letter listing fail with `message`.
    pub fn fail_letters(&self, message: &str) {
        self.lock().letter_failure = Some(message.to_owned());
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Tables> {
        // A poisoned lock only means another test thread panicked.
        self.tables.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl HistoryStore for TestStore {
    async fn fetch_history(
        &self,
        chat_id: &str,
    ) -> Result<Vec<HistoryRow>, StoreError> {
        let delay = self.lock().history_delays.get(chat_id).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let tables = self.lock();
        if let Some(message) = tables.history_failures.get(chat_id) {
            return Err(StoreError::new(ErrorKind::Other).with_message(message));
        }
        let mut rows = tables.history.get(chat_id).cloned().unwrap_or_default();
        rows.reverse();
        Ok(rows)
    }
}

#[async_trait]
impl LetterStore for TestStore {
    async fn list_denial_letters(
        &self,
        user_id: &str,
    ) -> Result<Vec<DenialLetter>, StoreError> {
        let tables = self.lock();
        if let Some(message) = &tables.letter_failure {
            return Err(StoreError::new(ErrorKind::Other).with_message(message));
        }
        Ok(tables.letters.get(user_id).cloned().unwrap_or_default())
    }
}
