use rcm_model::{ChatRequest, RowId};
use serde::{Deserialize, Serialize};

// ------------------------------
// Types received from the server
// ------------------------------

/// One `data` payload of the chat stream. Either key may be missing.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
pub struct EventFrame {
    #[serde(default)]
    pub history_id: Option<RowId>,
    #[serde(default)]
    pub token: Option<String>,
}

/// Error body returned by PostgREST.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
pub struct PostgrestError {
    pub message: String,
    #[serde(default)]
    pub code: Option<String>,
}

// ------------------------
// Types sent to the server
// ------------------------

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct DocumentChatRequest<'a> {
    prompt: &'a str,
    chat_id: &'a str,
    record_id: &'a str,
    user_id: &'a str,
}

// -----------
// Conversions
// -----------

#[inline]
pub fn create_request(req: &ChatRequest) -> DocumentChatRequest<'_> {
    DocumentChatRequest {
        prompt: &req.prompt,
        chat_id: &req.chat_id,
        record_id: &req.record_id,
        user_id: &req.user_id,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_create_request() {
        let request = ChatRequest {
            prompt: "Why was the claim denied?".to_owned(),
            chat_id: "42".to_owned(),
            record_id: "doc-7".to_owned(),
            user_id: "user-3".to_owned(),
        };
        let body = serde_json::to_value(create_request(&request)).unwrap();
        assert_eq!(
            body,
            json!({
                "prompt": "Why was the claim denied?",
                "chat_id": "42",
                "record_id": "doc-7",
                "user_id": "user-3",
            })
        );
    }

    #[test]
    fn test_parse_frames() {
        let frame: EventFrame =
            serde_json::from_str(r#"{"history_id": 128}"#).unwrap();
        assert_eq!(frame.history_id, Some(RowId::new("128")));
        assert_eq!(frame.token, None);

        let frame: EventFrame =
            serde_json::from_str(r#"{"token": " appeal"}"#).unwrap();
        assert_eq!(frame.token.as_deref(), Some(" appeal"));

        let frame: EventFrame = serde_json::from_str("{}").unwrap();
        assert_eq!(frame.history_id, None);
    }
}
