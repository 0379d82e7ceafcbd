//! Streaming chat: forward fragments as they arrive, persist the full reply at the end.

use crate::accumulator::ReplyAccumulator;
use crate::analysis::preview;
use crate::provider::ChatProvider;
use crate::store::{NewRecord, RecordStore};
use crate::{Error, FinishReason, Prompt};
use futures_util::{Stream, StreamExt};
use std::sync::Arc;

pub const CHAT_SYSTEM_PROMPT: &str = "你是一个乐于助人的聊天助手。";

/// Sentiment stored for chat exchanges, which are never analysed.
pub const CHAT_SENTIMENT: &str = "对话模式";

pub fn chat_prompt(text: &str) -> Prompt {
    Prompt::system(CHAT_SYSTEM_PROMPT).with_user(text)
}

/// The last fragment a client receives when the upstream stream fails.
pub fn error_fragment(error: &Error) -> String {
    format!("出错了: {error}")
}

/// Relay one chat exchange as a stream of text fragments.
///
/// Fragments are yielded in upstream order. Once the upstream stream ends
/// normally the concatenated reply is stored as one record. If the upstream
/// fails, at open or mid-stream, a single error fragment closes the stream
/// and nothing is stored. A failed save also ends with an error fragment.
/// Dropping the returned stream drops the upstream response, which closes
/// its connection; nothing is stored then either.
pub fn relay_chat(
    provider: Option<Arc<dyn ChatProvider>>,
    store: RecordStore,
    text: String,
) -> impl Stream<Item = String> + Send + 'static {
    async_stream::stream! {
        let provider = match provider {
            Some(provider) => provider,
            None => {
                yield error_fragment(&Error::config("upstream API key is not configured"));
                return;
            }
        };

        let mut events = match provider.complete_streaming(&chat_prompt(&text)).await {
            Ok(response) => response.stream(),
            Err(e) => {
                tracing::warn!(error = %e, "chat stream could not be opened");
                yield error_fragment(&e);
                return;
            }
        };

        let mut reply = ReplyAccumulator::new();
        while let Some(event) = events.next().await {
            match event {
                Ok(event) => {
                    reply.process_event(&event);
                    let fragment = event.as_delta().filter(|d| !d.is_empty()).map(str::to_string);
                    if let Some(fragment) = fragment {
                        yield fragment;
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        fragments = reply.fragment_count(),
                        "chat stream failed, discarding partial reply"
                    );
                    yield error_fragment(&e);
                    return;
                }
            }
        }
        drop(events);

        if reply.finish_reason() == Some(&FinishReason::Length) {
            tracing::warn!("chat reply was cut off by the upstream token limit");
        }
        tracing::debug!(reply = %preview(reply.text()), "chat stream finished, saving record");
        let record = NewRecord {
            text_content: text,
            word_count: reply.char_count() as i64,
            ai_reply: reply.into_text(),
            sentiment: CHAT_SENTIMENT.to_string(),
        };
        match store.insert(record).await {
            Ok(saved) => tracing::info!(record_id = saved.id, "chat saved"),
            Err(e) => {
                tracing::error!(error = %e, "failed to save chat record");
                yield error_fragment(&e);
            }
        }
    }
}
