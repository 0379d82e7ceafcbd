use crate::{Error, Prompt, Response};

/// An upstream chat-completion service.
///
/// Implementations never retry; every failure is returned to the caller as is.
#[async_trait::async_trait]
pub trait ChatProvider: Send + Sync + 'static {
    /// Single-shot completion, returning the whole reply text.
    async fn complete(&self, prompt: &Prompt) -> Result<String, Error>;

    /// Streamed completion. The returned response yields events as the
    /// provider emits them and ends when the provider signals completion.
    async fn complete_streaming(&self, prompt: &Prompt) -> Result<Response, Error>;

    /// Model ids offered by the provider.
    async fn list_models(&self) -> Result<Vec<String>, Error>;
}
