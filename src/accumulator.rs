//! Accumulation of streamed fragments into a complete reply.

use crate::types::{FinishReason, StreamEvent};

/// Collects streamed text so the full reply can be persisted once the stream ends.
#[derive(Debug, Default)]
pub struct ReplyAccumulator {
    text: String,
    fragments: usize,
    finish_reason: Option<FinishReason>,
}

impl ReplyAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one stream event into the reply.
    pub fn process_event(&mut self, event: &StreamEvent) {
        match event {
            StreamEvent::ContentDelta { delta } => self.push(delta),
            StreamEvent::Done { finish_reason } => {
                self.finish_reason = Some(finish_reason.clone());
            }
        }
    }

    pub fn push(&mut self, fragment: &str) {
        self.text.push_str(fragment);
        self.fragments += 1;
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Length of the reply in characters (not bytes).
    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }

    pub fn fragment_count(&self) -> usize {
        self.fragments
    }

    pub fn finish_reason(&self) -> Option<&FinishReason> {
        self.finish_reason.as_ref()
    }

    pub fn into_text(self) -> String {
        self.text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accumulates_deltas_in_order() {
        let mut acc = ReplyAccumulator::new();
        for delta in ["你好", "，", "world"] {
            acc.process_event(&StreamEvent::ContentDelta {
                delta: delta.to_string(),
            });
        }
        acc.process_event(&StreamEvent::Done {
            finish_reason: FinishReason::Stop,
        });

        assert_eq!(acc.text(), "你好，world");
        assert_eq!(acc.fragment_count(), 3);
        assert_eq!(acc.char_count(), 8);
        assert_eq!(acc.finish_reason(), Some(&FinishReason::Stop));
    }

    #[test]
    fn test_empty_accumulator() {
        let acc = ReplyAccumulator::new();
        assert_eq!(acc.char_count(), 0);
        assert!(acc.finish_reason().is_none());
        assert_eq!(acc.into_text(), "");
    }
}
