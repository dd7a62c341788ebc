//! A local fake chat backend for testing purpose.

mod preset;
mod store;

use std::error::Error as StdError;
use std::fmt::{self, Debug, Display, Formatter};
use std::future::ready;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll, ready};
use std::time::Duration;

use rcm_model::{
    ChatEvent, ChatProvider, ChatProviderError, ChatRequest, ChatResponse,
    ErrorKind,
};
use tokio::time::{Sleep, sleep};

pub use preset::*;
pub use store::TestStore;

#[derive(Debug)]
pub struct Error {
    #[allow(dead_code)]
    message: &'static str,
    kind: ErrorKind,
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Debug::fmt(self, f)
    }
}

impl StdError for Error {}

impl ChatProviderError for Error {
    #[inline]
    fn kind(&self) -> ErrorKind {
        self.kind
    }
}

pub struct TestChatResponse {
    preset: PresetResponse,
    event_idx: usize,
    sleep: Option<Pin<Box<Sleep>>>,
}

impl ChatResponse for TestChatResponse {
    type Error = crate::Error;

    fn poll_next_event(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Option<ChatEvent>, Self::Error>> {
        // SAFETY: This type does not require to be pinned.
        let this = unsafe { self.get_unchecked_mut() };

        if this.event_idx >= this.preset.events.len() {
            return match this.preset.ending {
                PresetEnding::Close => Poll::Ready(Ok(None)),
                PresetEnding::Drop => {
                    // Drop only once, behave like a closed stream after.
                    this.preset.ending = PresetEnding::Close;
                    Poll::Ready(Err(Error {
                        message: "connection reset",
                        kind: ErrorKind::Transport,
                    }))
                }
                PresetEnding::HoldOpen => Poll::Pending,
            };
        }

        if let Some(sleep) = &mut this.sleep {
            ready!(sleep.as_mut().poll(cx));
            this.sleep = None;

            let event = match &this.preset.events[this.event_idx] {
                PresetEvent::HistoryId(id) => ChatEvent::HistoryId(id.clone()),
                PresetEvent::Token(token) => ChatEvent::Token(token.clone()),
            };
            this.event_idx += 1;
            return Poll::Ready(Ok(Some(event)));
        }
        this.sleep = Some(Box::pin(sleep(
            this.preset.delay.unwrap_or(Duration::from_millis(1)),
        )));
        Pin::new(this).poll_next_event(cx)
    }
}

/// A local fake chat backend for testing purpose.
///
/// Before sending requests, you need to setup the script, which is how
/// the backend should respond to each request. Requests consume the
/// preset responses in order. If there are no enough responses in the
/// script, the request fails.
///
/// Clones share the script and the request log.
///
/// # Note
///
/// This type is not optimized for production use, there are heavy memory
/// copies involved. You should only use it for testing.
#[derive(Clone, Default)]
pub struct TestChatProvider {
    script: Arc<Mutex<Vec<PresetResponse>>>,
    next_response: Arc<AtomicUsize>,
    requests: Arc<Mutex<Vec<ChatRequest>>>,
}

impl TestChatProvider {
    /// Appends a response to the script.
    #[inline]
    pub fn add_response(&self, preset: PresetResponse) {
        self.script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(preset);
    }

    /// Returns every request received so far.
    #[inline]
    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl ChatProvider for TestChatProvider {
    type Error = crate::Error;
    type Response = TestChatResponse;

    fn send_request(
        &self,
        req: &ChatRequest,
    ) -> impl Future<Output = Result<Self::Response, Self::Error>> + Send + 'static
    {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(req.clone());

        let idx = self.next_response.fetch_add(1, Ordering::Relaxed);
        let preset = self
            .script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(idx)
            .cloned();
        let result = match preset {
            Some(preset) => Ok(TestChatResponse {
                preset,
                event_idx: 0,
                sleep: None,
            }),
            None => Err(Error {
                message: "no enough responses",
                kind: ErrorKind::Other,
            }),
        };
        ready(result)
    }
}
