use std::sync::Arc;

use async_trait::async_trait;
use rcm_model::{
    DenialLetter, ErrorKind, HistoryRow, HistoryStore, LetterStore,
    StoreError,
};
use reqwest::{Client, StatusCode, Url, header};
use serde::de::DeserializeOwned;

use crate::SupabaseConfig;
use crate::proto::PostgrestError;

const HISTORY_TABLE: &str = "document_chat_history";
const LETTERS_TABLE: &str = "denial_letters";

/// Table reads through the PostgREST endpoint of a Supabase project.
#[derive(Clone, Debug)]
pub struct SupabaseStore {
    client: Client,
    config: Arc<SupabaseConfig>,
}

impl SupabaseStore {
    /// Creates a new `SupabaseStore` with the given configuration.
    #[inline]
    pub fn new(config: SupabaseConfig) -> Self {
        Self::with_client(Client::new(), config)
    }

    /// Creates a store that shares an existing HTTP client.
    #[inline]
    pub fn with_client(client: Client, config: SupabaseConfig) -> Self {
        Self {
            client,
            config: Arc::new(config),
        }
    }

    async fn select<T: DeserializeOwned>(
        &self,
        url: Url,
    ) -> Result<Vec<T>, StoreError> {
        trace!("selecting from {url}");
        let resp = self
            .client
            .get(url)
            .header("apikey", &self.config.anon_key)
            .header(
                header::AUTHORIZATION,
                format!("Bearer {}", self.config.table_bearer()),
            )
            .header(header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|err| {
                StoreError::new(ErrorKind::Transport)
                    .with_message(format!("{err}"))
            })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(error_from_body(status, &body));
        }

        resp.json::<Vec<T>>().await.map_err(|err| {
            StoreError::new(ErrorKind::InvalidResponse)
                .with_message(format!("{err}"))
        })
    }
}

#[async_trait]
impl HistoryStore for SupabaseStore {
    async fn fetch_history(
        &self,
        chat_id: &str,
    ) -> Result<Vec<HistoryRow>, StoreError> {
        let url = history_url(&self.config, chat_id)?;
        self.select(url).await
    }
}

#[async_trait]
impl LetterStore for SupabaseStore {
    async fn list_denial_letters(
        &self,
        user_id: &str,
    ) -> Result<Vec<DenialLetter>, StoreError> {
        let url = letters_url(&self.config, user_id)?;
        self.select(url).await
    }
}

fn table_url(
    config: &SupabaseConfig,
    table: &str,
    query: &[(&str, &str)],
) -> Result<Url, StoreError> {
    let mut url = Url::parse(&format!("{}/{table}", config.rest_url))
        .map_err(|err| {
            StoreError::new(ErrorKind::Other)
                .with_message(format!("invalid REST url: {err}"))
        })?;
    url.query_pairs_mut().extend_pairs(query);
    Ok(url)
}

fn history_url(
    config: &SupabaseConfig,
    chat_id: &str,
) -> Result<Url, StoreError> {
    let chat_filter = format!("eq.{chat_id}");
    table_url(
        config,
        HISTORY_TABLE,
        &[
            ("select", "*"),
            ("chat_id", &chat_filter),
            ("order", "created_at.desc"),
        ],
    )
}

fn letters_url(
    config: &SupabaseConfig,
    user_id: &str,
) -> Result<Url, StoreError> {
    let user_filter = format!("eq.{user_id}");
    table_url(
        config,
        LETTERS_TABLE,
        &[("select", "id,file_name"), ("user_id", &user_filter)],
    )
}

fn error_from_body(status: StatusCode, body: &str) -> StoreError {
    let kind = match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            ErrorKind::Unauthorized
        }
        _ => ErrorKind::Other,
    };
    let message = match serde_json::from_str::<PostgrestError>(body) {
        Ok(err) => err.message,
        Err(_) if body.is_empty() => format!("request failed with {status}"),
        Err(_) => body.to_owned(),
    };
    StoreError::new(kind).with_message(message)
}
