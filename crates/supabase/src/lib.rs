//! A chat provider and table store for Supabase-hosted backends.
//!
//! The chat provider talks to the streaming `document-chat` edge function
//! over server-sent events, the store reads chat history and denial
//! letters through PostgREST.

#[macro_use]
extern crate tracing;

mod config;
mod io;
mod proto;
mod response;
mod store;

use std::error::Error as StdError;
use std::fmt::{self, Display};
use std::sync::Arc;

use mime::Mime;
use rcm_model::{ChatProvider, ChatProviderError, ChatRequest, ErrorKind};
use reqwest::{Client, StatusCode, header};

pub use config::{SupabaseConfig, SupabaseConfigBuilder};
use io::{Chunks, Sse};
pub use response::SupabaseChatResponse;
pub use store::SupabaseStore;

/// Error type for [`SupabaseChatProvider`].
#[derive(Debug)]
pub struct Error {
    message: String,
    kind: ErrorKind,
}

impl Error {
    fn new(message: impl Into<String>, kind: ErrorKind) -> Self {
        Self {
            message: message.into(),
            kind,
        }
    }

    /// Returns the error message.
    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl StdError for Error {}

impl ChatProviderError for Error {
    #[inline]
    fn kind(&self) -> ErrorKind {
        self.kind
    }
}

/// Chat provider backed by the `document-chat` edge function.
#[derive(Clone, Debug)]
pub struct SupabaseChatProvider {
    client: Client,
    config: Arc<SupabaseConfig>,
}

impl SupabaseChatProvider {
    /// Creates a new `SupabaseChatProvider` with the given configuration.
    #[inline]
    pub fn new(config: SupabaseConfig) -> Self {
        Self::with_client(Client::new(), config)
    }

    /// Creates a provider that shares an existing HTTP client.
    #[inline]
    pub fn with_client(client: Client, config: SupabaseConfig) -> Self {
        Self {
            client,
            config: Arc::new(config),
        }
    }
}

impl ChatProvider for SupabaseChatProvider {
    type Error = Error;
    type Response = SupabaseChatResponse;

    fn send_request(
        &self,
        req: &ChatRequest,
    ) -> impl Future<Output = Result<Self::Response, Self::Error>> + Send + 'static
    {
        let body = proto::create_request(req);
        let resp_fut = self
            .client
            .post(self.config.chat_url())
            .header(
                header::AUTHORIZATION,
                format!("Bearer {}", self.config.anon_key),
            )
            .header("apikey", &self.config.anon_key)
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::ACCEPT, "text/event-stream")
            .json(&body)
            .send();

        async move {
            let resp = resp_fut.await.map_err(|err| {
                Error::new(format!("{err}"), ErrorKind::Transport)
            })?;

            let status = resp.status();
            if !status.is_success() {
                let kind = match status {
                    StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                        ErrorKind::Unauthorized
                    }
                    _ => ErrorKind::Other,
                };
                let body = resp.text().await.unwrap_or_default();
                return Err(Error::new(
                    format!("chat endpoint returned {status}: {body}"),
                    kind,
                ));
            }

            let content_type = resp
                .headers()
                .get(header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok());
            let is_valid_content_type = content_type
                .and_then(|v| v.parse().ok())
                .map(|m: Mime| m.subtype().as_str() == "event-stream")
                .unwrap_or(false);
            if !is_valid_content_type {
                return Err(Error::new(
                    format!("Unexpected content type: {content_type:?}"),
                    ErrorKind::InvalidResponse,
                ));
            }

            // Here we got a successful response.
            let chunks = Chunks::from_response(resp);
            let sse = Sse::new(chunks);
            Ok(SupabaseChatResponse::from_sse(sse))
        }
    }
}
