//! Cancelable neutral event streams
//!
//! `CompletionProvider` is the adapter seam: the engine only ever sees
//! `EventStream`s, never vendor frames.

use futures::Stream;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_util::sync::CancellationToken;

use super::types::{AiTool, Message, StreamEvent};

/// Everything an adapter needs to open one completion stream
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub tools: Vec<AiTool>,
    pub max_tokens: usize,
}

/// A source of neutral completion streams
///
/// Implementations must end every stream with exactly one terminal event and
/// stop producing once `cancel` fires.
pub trait CompletionProvider: Send + Sync {
    fn stream(&self, request: CompletionRequest, cancel: CancellationToken) -> EventStream;
}

/// Lazy, cancelable sequence of `StreamEvent`s
pub struct EventStream {
    inner: UnboundedReceiverStream<StreamEvent>,
    cancel: CancellationToken,
}

impl EventStream {
    pub fn new(rx: mpsc::UnboundedReceiver<StreamEvent>, cancel: CancellationToken) -> Self {
        Self {
            inner: UnboundedReceiverStream::new(rx),
            cancel,
        }
    }

    /// Stream that yields the given events and then ends
    pub fn from_events(events: Vec<StreamEvent>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        for event in events {
            let _ = tx.send(event);
        }
        Self::new(rx, CancellationToken::new())
    }

    /// Request cancellation; calling it again has no further effect
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

impl Drop for EventStream {
    /// Nobody is listening anymore; stop the producer
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl Stream for EventStream {
    type Item = StreamEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn test_from_events_yields_in_order() {
        let mut stream = EventStream::from_events(vec![
            StreamEvent::Content {
                content: "a".to_string(),
            },
            StreamEvent::Done,
        ]);
        assert_eq!(
            stream.next().await,
            Some(StreamEvent::Content {
                content: "a".to_string()
            })
        );
        assert_eq!(stream.next().await, Some(StreamEvent::Done));
        assert_eq!(stream.next().await, None);
    }

    #[test]
    fn test_cancel_is_idempotent() {
        let stream = EventStream::from_events(Vec::new());
        let token = stream.cancel_token();
        stream.cancel();
        stream.cancel();
        assert!(token.is_cancelled());
        assert!(stream.is_cancelled());
    }
}
