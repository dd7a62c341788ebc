use std::collections::VecDeque;
use std::error::Error;
use std::fmt::{self, Display, Formatter};
use std::future::ready;
use std::pin::Pin;
use std::task::{self, Poll, ready};
use std::time::Duration;

use rcm_model::{
    ChatEvent, ChatProvider, ChatProviderError, ChatRequest, ChatResponse,
    ErrorKind, MessageId,
};
use tokio::time::{Sleep, sleep};

#[derive(Debug)]
struct FakeProviderError(ErrorKind);

impl Display for FakeProviderError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

impl Error for FakeProviderError {}

impl ChatProviderError for FakeProviderError {
    fn kind(&self) -> ErrorKind {
        self.0
    }
}

#[derive(Debug)]
struct FakeChatResponse {
    fake_events: VecDeque<ChatEvent>,
    sleep: Option<Pin<Box<Sleep>>>,
}

impl FakeChatResponse {
    fn new(req: &ChatRequest) -> Self {
        let mut fake_events: VecDeque<_> = format!("You said {}", req.prompt)
            .split(' ')
            .map(|word| ChatEvent::Token(format!("{word} ")))
            .collect();
        fake_events.push_front(ChatEvent::HistoryId(MessageId::new(format!(
            "{}:1",
            req.chat_id
        ))));
        Self {
            fake_events,
            sleep: None,
        }
    }
}

impl ChatResponse for FakeChatResponse {
    type Error = FakeProviderError;

    fn poll_next_event(
        self: Pin<&mut Self>,
        cx: &mut task::Context<'_>,
    ) -> Poll<Result<Option<ChatEvent>, Self::Error>> {
        // SAFETY: This type does not require to be pinned.
        let this = unsafe { self.get_unchecked_mut() };
        if let Some(sleep) = &mut this.sleep {
            ready!(sleep.as_mut().poll(cx));
            this.sleep = None;
            return Poll::Ready(Ok(this.fake_events.pop_front()));
        }
        this.sleep = Some(Box::pin(sleep(Duration::from_millis(1))));
        Pin::new(this).poll_next_event(cx)
    }
}

struct FakeChatProvider;

impl ChatProvider for FakeChatProvider {
    type Error = FakeProviderError;
    type Response = FakeChatResponse;

    fn send_request(
        &self,
        req: &ChatRequest,
    ) -> impl Future<Output = Result<Self::Response, Self::Error>> + Send + 'static
    {
        let result = if req.chat_id.is_empty() {
            Err(FakeProviderError(ErrorKind::Unauthorized))
        } else {
            Ok(FakeChatResponse::new(req))
        };
        ready(result)
    }
}

fn request(chat_id: &str, prompt: &str) -> ChatRequest {
    ChatRequest {
        prompt: prompt.to_owned(),
        chat_id: chat_id.to_owned(),
        record_id: "doc-1".to_owned(),
        user_id: "user-1".to_owned(),
    }
}

mod tests {
    use std::future::poll_fn;

    use super::*;

    #[tokio::test]
    async fn test_streaming() {
        let provider = FakeChatProvider;
        let mut resp = provider
            .send_request(&request("chat-9", "Good morning"))
            .await
            .unwrap();

        let mut answer = String::new();
        let mut history_id = None;
        loop {
            let event_fut =
                poll_fn(|cx| Pin::new(&mut resp).poll_next_event(cx));
            match event_fut.await {
                Ok(Some(ChatEvent::Token(token))) => answer.push_str(&token),
                Ok(Some(ChatEvent::HistoryId(id))) => history_id = Some(id),
                Ok(None) => break,
                Err(err) => unreachable!("unexpected error: {err:?}"),
            }
        }

        assert_eq!(answer, "You said Good morning ");
        assert_eq!(history_id, Some(MessageId::new("chat-9:1")));
    }

    #[tokio::test]
    async fn test_error() {
        let provider = FakeChatProvider;
        let result = provider.send_request(&request("", "Hi")).await;
        let err = result.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);
    }
}
