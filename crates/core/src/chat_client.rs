use std::future::poll_fn;
use std::pin::{Pin, pin};
use std::sync::Arc;

use rcm_model::{
    ChatEvent, ChatProvider, ChatProviderError, ChatRequest, ChatResponse,
};
use tracing::Instrument;

type SendRequestResult = Result<(), Box<dyn ChatProviderError>>;
type BoxedSendRequestFuture =
    Pin<Box<dyn Future<Output = SendRequestResult> + Send>>;
#[rustfmt::skip]
type HandlerFn = Arc<
    dyn Fn(ChatRequest, Box<dyn Fn(ChatEvent) + Send + 'static>)
        -> BoxedSendRequestFuture + Send + Sync
>;

/// A wrapper around a chat provider that drives its response stream and
/// provides a type-erased interface for the other modules.
#[derive(Clone)]
pub struct ChatClient {
    handler_fn: HandlerFn,
}

impl ChatClient {
    #[inline]
    pub fn new<P: ChatProvider + 'static>(provider: P) -> Self {
        // We have to erase the type `P`, since `ChatClient` doesn't have a
        // generic parameter and we don't want it either.
        let handler_fn: HandlerFn = Arc::new(move |req, on_event| {
            let fut = provider.send_request(&req);
            Box::pin(
                async move {
                    trace!("got a request: {:?}", req);
                    let resp_or_err = fut.await;
                    handle_response::<P>(resp_or_err, on_event).await
                }
                .instrument(trace_span!("chat client req")),
            )
        });
        Self { handler_fn }
    }

    /// Sends a request and streams its events into `on_event` as they
    /// arrive.
    ///
    /// When the stream breaks halfway, the events already delivered stay
    /// delivered and the error is returned.
    ///
    /// # Cancel safety
    ///
    /// This method is cancel safe. The response stops streaming further
    /// events when this operation is cancelled.
    #[inline]
    pub async fn send_request(
        &self,
        req: ChatRequest,
        on_event: impl Fn(ChatEvent) + Send + 'static,
    ) -> SendRequestResult {
        (self.handler_fn)(req, Box::new(on_event)).await
    }
}

async fn handle_response<P: ChatProvider + 'static>(
    resp_or_err: Result<P::Response, P::Error>,
    on_event: Box<dyn Fn(ChatEvent) + Send + 'static>,
) -> SendRequestResult {
    let resp = match resp_or_err {
        Ok(resp) => resp,
        Err(err) => {
            error!("got an error: {err:?}");
            return Err(Box::new(err));
        }
    };

    let mut received = 0_usize;

    trace!("start receiving events");

    let mut pinned_resp = pin!(resp);
    loop {
        let event_or_err =
            poll_fn(|cx| pinned_resp.as_mut().poll_next_event(cx)).await;
        let event = match event_or_err {
            Ok(Some(event)) => event,
            // The transport closed, which is how a turn ends.
            Ok(None) => break,
            Err(err) => {
                warn!("stream broke after {received} events: {err:?}");
                return Err(Box::new(err));
            }
        };
        trace!("got an event: {event:?}");

        received += 1;
        on_event(event);
    }

    trace!("finished a request with {received} events");

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use rcm_model::{ErrorKind, MessageId};
    use rcm_test_model::{PresetEnding, PresetResponse, TestChatProvider};

    use super::*;

    fn request(prompt: &str) -> ChatRequest {
        ChatRequest {
            prompt: prompt.to_owned(),
            chat_id: "chat-1".to_owned(),
            record_id: "doc-1".to_owned(),
            user_id: "user-1".to_owned(),
        }
    }

    #[tokio::test]
    async fn test_send_request() {
        let provider = TestChatProvider::default();
        provider.add_response(PresetResponse::with_tokens(
            "31",
            ["How ", "can ", "I help?"],
        ));

        let chat_client = ChatClient::new(provider);
        let seen = Arc::new(Mutex::new(Vec::new()));
        chat_client
            .send_request(request("Hi"), {
                let seen = Arc::clone(&seen);
                move |event| seen.lock().unwrap().push(event)
            })
            .await
            .unwrap();
        assert_eq!(
            *seen.lock().unwrap(),
            [
                ChatEvent::HistoryId(MessageId::new("31")),
                ChatEvent::Token("How ".to_owned()),
                ChatEvent::Token("can ".to_owned()),
                ChatEvent::Token("I help?".to_owned()),
            ]
        );
    }

    #[tokio::test]
    async fn test_partial_stream_error() {
        let provider = TestChatProvider::default();
        provider.add_response(
            PresetResponse::with_tokens("32", ["Par", "tial"])
                .with_ending(PresetEnding::Drop),
        );

        let chat_client = ChatClient::new(provider);
        let tokens = Arc::new(Mutex::new(String::new()));
        let err = chat_client
            .send_request(request("Hi"), {
                let tokens = Arc::clone(&tokens);
                move |event| {
                    if let ChatEvent::Token(token) = event {
                        tokens.lock().unwrap().push_str(&token);
                    }
                }
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transport);
        assert_eq!(*tokens.lock().unwrap(), "Partial");
    }

    #[tokio::test]
    async fn test_request_error() {
        let chat_client = ChatClient::new(TestChatProvider::default());
        let resp_or_err = chat_client.send_request(request("Hi"), |_| {}).await;
        assert!(resp_or_err.is_err());
    }
}
