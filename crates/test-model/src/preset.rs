use std::time::Duration;

use rcm_model::MessageId;
use serde::{Deserialize, Serialize};

/// The events in a preset response.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum PresetEvent {
    #[serde(rename = "history_id")]
    HistoryId(MessageId),
    #[serde(rename = "token")]
    Token(String),
}

/// How a preset response stream ends after its events are delivered.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresetEnding {
    /// The transport closes normally.
    #[default]
    Close,
    /// The connection drops with an error.
    Drop,
    /// The stream stays open and never yields again.
    HoldOpen,
}

/// The preset response for one chat request.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PresetResponse {
    /// Events in this response.
    pub events: Vec<PresetEvent>,
    /// What happens after the last event.
    #[serde(default)]
    pub ending: PresetEnding,
    /// Delay before each event. Defaults to one millisecond.
    #[serde(skip)]
    pub delay: Option<Duration>,
}

impl PresetResponse {
    /// Creates a `PresetResponse` with the specified events.
    #[inline]
    pub fn with_events(events: impl Into<Vec<PresetEvent>>) -> Self {
        Self {
            events: events.into(),
            ending: PresetEnding::Close,
            delay: None,
        }
    }

    /// Creates a response that persists the turn as `id` and then streams
    /// `tokens`.
    pub fn with_tokens<'a>(
        id: impl Into<MessageId>,
        tokens: impl IntoIterator<Item = &'a str>,
    ) -> Self {
        let mut events = vec![PresetEvent::HistoryId(id.into())];
        events.extend(tokens.into_iter().map(|t| PresetEvent::Token(t.to_owned())));
        Self::with_events(events)
    }

    /// Sets how the stream ends.
    #[inline]
    pub fn with_ending(mut self, ending: PresetEnding) -> Self {
        self.ending = ending;
        self
    }

    /// Sets the delay before each event.
    #[inline]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}
