use crate::core::metrics::get_metrics;
use futures::stream::Stream;
use std::pin::Pin;
use std::task::{Context, Poll};

/// Response body wrapper that notices when the client goes away.
///
/// Hyper drops the body when the client disconnects. The wrapped relay, and
/// with it the backend response, is dropped at the same time, which closes
/// the backend connection. This wrapper only records whether that happened
/// before the relay reached its end.
pub struct DisconnectStream<S> {
    stream: S,
    request_id: String,
    finished: bool,
}

impl<S> DisconnectStream<S> {
    pub fn new(stream: S, request_id: String) -> Self {
        Self {
            stream,
            request_id,
            finished: false,
        }
    }

    /// True once the relay ended or yielded an error.
    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

impl<S, T, E> Stream for DisconnectStream<S>
where
    S: Stream<Item = Result<T, E>> + Unpin,
{
    type Item = S::Item;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let poll = Pin::new(&mut self.stream).poll_next(cx);
        if matches!(poll, Poll::Ready(None) | Poll::Ready(Some(Err(_)))) {
            self.finished = true;
        }
        poll
    }
}

impl<S> Drop for DisconnectStream<S> {
    fn drop(&mut self) {
        if !self.finished {
            tracing::info!(
                request_id = %self.request_id,
                "Client disconnected before the backend stream finished"
            );
            get_metrics().client_disconnects.inc();
        }
    }
}
