//! Stream adapter turning an HTTP byte stream into Server-Sent Events.

use crate::Error;
use futures_util::{Stream, StreamExt};
use memchr::memmem;
use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{ready, Context, Poll};

/// Upper bound on bytes held while waiting for an event terminator.
const MAX_BUFFERED_BYTES: usize = 1_000_000;

/// A single Server-Sent Event. Only the fields chat providers use are kept.
#[derive(Debug, Clone, PartialEq)]
pub struct SseEvent {
    pub event_type: Option<String>,
    pub data: String,
}

impl SseEvent {
    /// OpenAI-compatible providers close a stream with `data: [DONE]`.
    pub fn is_done(&self) -> bool {
        self.data.trim() == "[DONE]"
    }

    /// Parse the text of one event block (everything between blank lines).
    fn parse_block(block: &str) -> Option<SseEvent> {
        let mut event_type = None;
        let mut data_lines: Vec<&str> = Vec::new();

        for line in block.lines() {
            if line.is_empty() || line.starts_with(':') {
                continue;
            }
            let (field, value) = match line.split_once(':') {
                Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
                None => (line, ""),
            };
            match field {
                "event" => event_type = Some(value.to_string()),
                "data" => data_lines.push(value),
                _ => {}
            }
        }

        if data_lines.is_empty() {
            return None;
        }

        Some(SseEvent {
            event_type,
            data: data_lines.join("\n"),
        })
    }
}

/// Parses SSE events out of a byte stream, carrying partial events (and
/// partial UTF-8 sequences) across chunk boundaries.
pub struct SseStream<S> {
    inner: S,
    buffer: Vec<u8>,
    pending: VecDeque<SseEvent>,
    finder: memmem::Finder<'static>,
    finished: bool,
}

impl<S> SseStream<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            buffer: Vec::new(),
            pending: VecDeque::new(),
            finder: memmem::Finder::new(b"\n\n"),
            finished: false,
        }
    }

    /// Append a chunk, dropping carriage returns so CRLF framing parses like LF.
    fn push_chunk(&mut self, chunk: &[u8]) {
        self.buffer
            .extend(chunk.iter().copied().filter(|byte| *byte != b'\r'));
    }

    /// Move every complete event from the byte buffer into `pending`.
    fn drain_complete_events(&mut self) -> Result<(), Error> {
        let mut consumed = 0;

        while let Some(offset) = self.finder.find(&self.buffer[consumed..]) {
            let block = &self.buffer[consumed..consumed + offset];
            let text = std::str::from_utf8(block)
                .map_err(|e| Error::streaming(format!("Invalid UTF-8 in SSE event: {e}")))?;
            if let Some(event) = SseEvent::parse_block(text) {
                self.pending.push_back(event);
            }
            consumed += offset + 2;
        }

        if consumed > 0 {
            self.buffer.drain(..consumed);
        }
        Ok(())
    }

    /// Body ended: whatever is left may be a final event without its blank line.
    fn take_trailing_event(&mut self) -> Option<Result<SseEvent, Error>> {
        let rest = std::mem::take(&mut self.buffer);
        match std::str::from_utf8(&rest) {
            Ok(text) => SseEvent::parse_block(text.trim()).map(Ok),
            Err(e) => Some(Err(Error::streaming(format!(
                "Invalid UTF-8 in trailing SSE event: {e}"
            )))),
        }
    }
}

impl<S, B, E> Stream for SseStream<S>
where
    S: Stream<Item = Result<B, E>> + Unpin,
    B: AsRef<[u8]>,
    E: std::fmt::Display,
{
    type Item = Result<SseEvent, Error>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Poll::Ready(Some(Ok(event)));
            }

            if self.finished {
                return Poll::Ready(None);
            }

            match ready!(self.inner.poll_next_unpin(cx)) {
                Some(Ok(chunk)) => {
                    self.push_chunk(chunk.as_ref());
                    if let Err(e) = self.drain_complete_events() {
                        return Poll::Ready(Some(Err(e)));
                    }
                    // Only bytes still waiting for a terminator count against the limit.
                    if self.buffer.len() > MAX_BUFFERED_BYTES {
                        self.buffer.clear();
                        return Poll::Ready(Some(Err(Error::streaming(
                            "SSE buffer exceeded maximum size",
                        ))));
                    }
                }
                Some(Err(e)) => {
                    return Poll::Ready(Some(Err(Error::streaming(format!(
                        "Stream error: {e}"
                    )))));
                }
                None => {
                    self.finished = true;
                    return Poll::Ready(self.take_trailing_event());
                }
            }
        }
    }
}

/// Extension trait to add SSE parsing to byte streams.
pub trait SseStreamExt: Stream + Sized {
    fn sse_events(self) -> SseStream<Self> {
        SseStream::new(self)
    }
}

impl<S: Stream> SseStreamExt for S {}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use futures_util::stream;

    fn byte_stream(chunks: &[&[u8]]) -> impl Stream<Item = Result<Bytes, std::io::Error>> + Unpin {
        let chunks: Vec<_> = chunks
            .iter()
            .map(|c| Ok(Bytes::copy_from_slice(c)))
            .collect();
        stream::iter(chunks)
    }

    #[tokio::test]
    async fn test_complete_events() {
        let chunks: [&[u8]; 1] = [b"data: Hello\n\ndata: World\n\n"];
        let mut events = byte_stream(&chunks).sse_events();

        assert_eq!(events.next().await.unwrap().unwrap().data, "Hello");
        assert_eq!(events.next().await.unwrap().unwrap().data, "World");
        assert!(events.next().await.is_none());
    }

    #[tokio::test]
    async fn test_event_split_across_chunks() {
        let chunks: [&[u8]; 4] = [b"data: Hel", b"lo World\n", b"\ndata: ", b"Second\n\n"];
        let mut events = byte_stream(&chunks).sse_events();

        assert_eq!(events.next().await.unwrap().unwrap().data, "Hello World");
        assert_eq!(events.next().await.unwrap().unwrap().data, "Second");
        assert!(events.next().await.is_none());
    }

    #[tokio::test]
    async fn test_crlf_framing_and_comments() {
        let chunks: [&[u8]; 1] = [b": keep-alive\r\n\r\nevent: delta\r\ndata: a\r\ndata: b\r\n\r\n"];
        let mut events = byte_stream(&chunks).sse_events();

        let event = events.next().await.unwrap().unwrap();
        assert_eq!(event.event_type.as_deref(), Some("delta"));
        assert_eq!(event.data, "a\nb");
        assert!(events.next().await.is_none());
    }

    #[tokio::test]
    async fn test_utf8_split_across_chunks() {
        // "你" is E4 BD A0 in UTF-8.
        let chunks: [&[u8]; 2] = [b"data: \xE4\xBD", b"\xA0\xE5\xA5\xBD\n\n"];
        let mut events = byte_stream(&chunks).sse_events();

        assert_eq!(events.next().await.unwrap().unwrap().data, "你好");
    }

    #[tokio::test]
    async fn test_invalid_utf8_is_an_error() {
        let chunks: [&[u8]; 1] = [b"data: bad \xFF\xFE bytes\n\n"];
        let mut events = byte_stream(&chunks).sse_events();
        assert!(events.next().await.unwrap().is_err());
    }

    #[tokio::test]
    async fn test_trailing_event_without_blank_line() {
        let chunks: [&[u8]; 2] = [b"data: first\n\n", b"data: [DONE]"];
        let mut events = byte_stream(&chunks).sse_events();

        assert_eq!(events.next().await.unwrap().unwrap().data, "first");
        let last = events.next().await.unwrap().unwrap();
        assert!(last.is_done());
        assert!(events.next().await.is_none());
    }

    #[tokio::test]
    async fn test_transport_error_surfaces() {
        let chunks: Vec<Result<Bytes, std::io::Error>> = vec![
            Ok(Bytes::from_static(b"data: ok\n\n")),
            Err(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset")),
        ];
        let mut events = stream::iter(chunks).sse_events();

        assert_eq!(events.next().await.unwrap().unwrap().data, "ok");
        let err = events.next().await.unwrap().unwrap_err();
        assert!(err.to_string().contains("reset"));
    }

    #[tokio::test]
    async fn test_invalid_utf8_in_trailing_event_is_an_error() {
        let chunks: [&[u8]; 2] = [b"data: ok\n\n", b"data: bad \xFF tail"];
        let mut events = byte_stream(&chunks).sse_events();

        assert_eq!(events.next().await.unwrap().unwrap().data, "ok");
        let err = events.next().await.unwrap().unwrap_err();
        assert!(matches!(err, Error::Streaming(_)));
        assert!(events.next().await.is_none());
    }

    #[tokio::test]
    async fn test_large_chunk_of_complete_events_is_accepted() {
        let event = format!("data: {}\n\n", "x".repeat(1000));
        let body = event.repeat(MAX_BUFFERED_BYTES / event.len() + 10);
        assert!(body.len() > MAX_BUFFERED_BYTES);

        let chunks: [&[u8]; 1] = [body.as_bytes()];
        let events: Vec<_> = byte_stream(&chunks).sse_events().collect().await;

        assert_eq!(events.len(), MAX_BUFFERED_BYTES / event.len() + 10);
        assert!(events.iter().all(|e| e.is_ok()));
    }

    #[tokio::test]
    async fn test_unterminated_event_over_limit_is_an_error() {
        let body = format!("data: {}", "x".repeat(MAX_BUFFERED_BYTES + 1));
        let chunks: [&[u8]; 1] = [body.as_bytes()];
        let mut events = byte_stream(&chunks).sse_events();

        let err = events.next().await.unwrap().unwrap_err();
        assert!(err.to_string().contains("maximum size"));
    }
}
