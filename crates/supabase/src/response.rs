use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll, ready};

use pin_project_lite::pin_project;
use rcm_model::{ChatEvent, ChatResponse, ErrorKind};

use crate::Error;
use crate::io::{Sse, SseError};
use crate::proto::EventFrame;

struct PartialState {
    sse: Sse,
    // A single frame may carry both an id and a token. They are queued
    // here and handed out one per poll, id first.
    pending_events: VecDeque<ChatEvent>,
}

type PinnedFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;
type NextEvent = Result<(Option<ChatEvent>, PartialState), Error>;

pin_project! {
    pub struct SupabaseChatResponse {
        next_event_fut: Option<PinnedFuture<NextEvent>>,
    }
}

impl SupabaseChatResponse {
    #[inline]
    pub(crate) fn from_sse(sse: Sse) -> Self {
        let partial_state = PartialState {
            sse,
            pending_events: Default::default(),
        };
        let next_event_fut = async move { next_event(partial_state).await };
        Self {
            next_event_fut: Some(Box::pin(next_event_fut)),
        }
    }
}

impl ChatResponse for SupabaseChatResponse {
    type Error = crate::Error;

    fn poll_next_event(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Option<ChatEvent>, Self::Error>> {
        let this = self.project();
        let Some(next_event_fut) = this.next_event_fut else {
            return Poll::Ready(Ok(None));
        };
        let (event, partial_state) =
            match ready!(next_event_fut.as_mut().poll(cx)) {
                Ok((Some(event), partial_state)) => (event, partial_state),
                Ok((None, _)) => {
                    *this.next_event_fut = None;
                    return Poll::Ready(Ok(None));
                }
                Err(err) => {
                    *this.next_event_fut = None;
                    return Poll::Ready(Err(err));
                }
            };

        // The stream may still have more data to pull, create a new future for
        // the next event.
        let next_event_fut = async move { next_event(partial_state).await };
        *this.next_event_fut = Some(Box::pin(next_event_fut));

        Poll::Ready(Ok(Some(event)))
    }
}

async fn next_event(
    mut partial_state: PartialState,
) -> Result<(Option<ChatEvent>, PartialState), Error> {
    loop {
        if let Some(event) = partial_state.pending_events.pop_front() {
            return Ok((Some(event), partial_state));
        }

        let sse_event = match partial_state.sse.next_event().await {
            Ok(Some(event)) => event,
            Ok(None) => return Ok((None, partial_state)),
            Err(SseError::InvalidPayload) => {
                return Err(Error::new(
                    "chat stream is not valid UTF-8",
                    ErrorKind::InvalidResponse,
                ));
            }
            Err(err) => {
                return Err(Error::new(format!("{err:?}"), ErrorKind::Transport));
            }
        };
        trace!("got sse event: {sse_event}");

        let frame = match serde_json::from_str::<EventFrame>(&sse_event) {
            Ok(frame) => frame,
            Err(err) => {
                warn!("skipping malformed chat frame: {err}");
                continue;
            }
        };
        if let Some(id) = frame.history_id {
            partial_state.pending_events.push_back(ChatEvent::HistoryId(id));
        }
        if let Some(token) = frame.token.filter(|t| !t.is_empty()) {
            partial_state.pending_events.push_back(ChatEvent::Token(token));
        }
    }
}

#[cfg(test)]
mod tests {
    use std::future::poll_fn;
    use std::pin::pin;

    use bytes::Bytes;
    use rcm_model::MessageId;

    use super::*;
    use crate::io::Chunks;

    async fn collect(
        chunks: &[&'static [u8]],
    ) -> Vec<Result<ChatEvent, ErrorKind>> {
        let chunks = Chunks::from_vec_deque(
            chunks.iter().map(|c| Bytes::from_static(*c)).collect(),
        );
        let mut resp = pin!(SupabaseChatResponse::from_sse(Sse::new(chunks)));
        let mut events = vec![];
        loop {
            match poll_fn(|cx| resp.as_mut().poll_next_event(cx)).await {
                Ok(Some(event)) => events.push(Ok(event)),
                Ok(None) => break,
                Err(err) => {
                    events.push(Err(rcm_model::ChatProviderError::kind(&err)));
                    break;
                }
            }
        }
        events
    }

    #[tokio::test]
    async fn test_token_stream() {
        let events = collect(&[
            b"data: {\"history_id\": 9}\n\n",
            b"data: {\"token\": \"Your \"}\n\ndata: {\"tok",
            b"en\": \"appeal\"}\n\n",
        ])
        .await;
        assert_eq!(
            events,
            vec![
                Ok(ChatEvent::HistoryId(MessageId::new("9"))),
                Ok(ChatEvent::Token("Your ".to_owned())),
                Ok(ChatEvent::Token("appeal".to_owned())),
            ]
        );
    }

    #[tokio::test]
    async fn test_combined_and_malformed_frames() {
        let events = collect(&[
            b"data: {\"history_id\": \"a1\", \"token\": \"Hi\"}\n\n",
            b"data: [DONE]\n\n",
            b"data: {\"token\": \"\"}\n\n",
            b"data: {\"token\": \"!\"}\n\n",
        ])
        .await;
        assert_eq!(
            events,
            vec![
                Ok(ChatEvent::HistoryId(MessageId::new("a1"))),
                Ok(ChatEvent::Token("Hi".to_owned())),
                Ok(ChatEvent::Token("!".to_owned())),
            ]
        );
    }

    #[tokio::test]
    async fn test_broken_payload() {
        let events =
            collect(&[b"data: {\"token\": \"ok\"}\n\n", b"data: \xFF\n\n"])
                .await;
        assert_eq!(
            events,
            vec![
                Ok(ChatEvent::Token("ok".to_owned())),
                Err(ErrorKind::InvalidResponse),
            ]
        );
    }
}
