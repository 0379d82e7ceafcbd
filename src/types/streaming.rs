//! Types for streaming responses.

use crate::types::FinishReason;

/// Events that can be emitted during streaming.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// A fragment of reply text was received.
    ContentDelta { delta: String },
    /// The stream has finished.
    Done { finish_reason: FinishReason },
}

impl StreamEvent {
    /// The text carried by this event, if any.
    pub fn as_delta(&self) -> Option<&str> {
        match self {
            StreamEvent::ContentDelta { delta } => Some(delta),
            StreamEvent::Done { .. } => None,
        }
    }
}
