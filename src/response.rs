//! Streamed replies from a chat provider.

use crate::{Error, StreamEvent};
use futures_util::stream::Stream;
use std::pin::Pin;

pub type EventStream = Pin<Box<dyn Stream<Item = Result<StreamEvent, Error>> + Send>>;

/// A streamed reply. Consuming it drives the underlying HTTP body; dropping
/// it closes the upstream connection.
pub struct Response {
    stream: EventStream,
}

impl Response {
    pub fn from_stream<S>(stream: S) -> Self
    where
        S: Stream<Item = Result<StreamEvent, Error>> + Send + 'static,
    {
        Self {
            stream: Box::pin(stream),
        }
    }

    /// The event stream, in arrival order.
    pub fn stream(self) -> EventStream {
        self.stream
    }
}
