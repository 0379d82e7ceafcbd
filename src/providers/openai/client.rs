use super::types::{
    ApiErrorBody, ChatCompletionChunk, ChatCompletionRequest, ChatCompletionResponse, ModelList,
    StreamPayload,
};
use crate::provider::ChatProvider;
use crate::sse_stream::SseStreamExt;
use crate::{Error, FinishReason, Prompt, Response, StreamEvent};
use futures_util::{future, stream, StreamExt};
use reqwest::Client;
use std::time::Duration;

const PROVIDER: &str = "OpenAI";
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Client for any service speaking the OpenAI chat completions protocol.
#[derive(Clone)]
pub struct OpenAIProvider {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl OpenAIProvider {
    /// Create a provider against a custom OpenAI-compatible base URL.
    pub fn new_with_base_url(
        api_key: String,
        base_url: String,
        model: String,
    ) -> Result<Self, Error> {
        // Only the connect phase is bounded: a streamed reply may legitimately
        // stay open for as long as the model keeps producing tokens.
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
        })
    }

    fn build_request<'a>(&'a self, prompt: &'a Prompt, stream: bool) -> ChatCompletionRequest<'a> {
        ChatCompletionRequest {
            model: &self.model,
            messages: prompt.messages(),
            temperature: prompt.temperature(),
            stream,
        }
    }

    async fn post_completions(
        &self,
        body: &ChatCompletionRequest<'_>,
    ) -> Result<reqwest::Response, Error> {
        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await?;

        Self::check_status(response).await
    }

    /// Turn a non-2xx reply into a provider error carrying the upstream message.
    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, Error> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = match serde_json::from_str::<ApiErrorBody>(&body) {
            Ok(parsed) => parsed.error.describe(),
            Err(_) => body,
        };
        Err(Error::provider(
            PROVIDER,
            format!("API error ({status}): {message}"),
        ))
    }

    /// Convert one streamed `data:` payload into stream events.
    fn convert_chunk(data: &str) -> Result<Vec<StreamEvent>, Error> {
        let payload: StreamPayload = serde_json::from_str(data)?;
        let chunk: ChatCompletionChunk = match payload {
            StreamPayload::Chunk(chunk) => chunk,
            StreamPayload::Error(body) => {
                return Err(Error::provider(PROVIDER, body.error.describe()));
            }
        };

        let mut events = Vec::new();
        for choice in chunk.choices {
            if let Some(delta) = choice.delta.content.filter(|d| !d.is_empty()) {
                events.push(StreamEvent::ContentDelta { delta });
            }
            if let Some(reason) = choice.finish_reason {
                events.push(StreamEvent::Done {
                    finish_reason: FinishReason::from_wire(Some(reason.as_str())),
                });
            }
        }
        Ok(events)
    }
}

#[async_trait::async_trait]
impl ChatProvider for OpenAIProvider {
    async fn complete(&self, prompt: &Prompt) -> Result<String, Error> {
        let body = self.build_request(prompt, false);
        let response = self.post_completions(&body).await?;
        let parsed: ChatCompletionResponse = serde_json::from_slice(&response.bytes().await?)?;

        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| Error::provider(PROVIDER, "completion contained no choices"))?;
        if FinishReason::from_wire(choice.finish_reason.as_deref()) == FinishReason::Length {
            tracing::warn!(model = %self.model, "completion was cut off by the token limit");
        }
        choice
            .message
            .content
            .ok_or_else(|| Error::provider(PROVIDER, "completion contained no message content"))
    }

    async fn complete_streaming(&self, prompt: &Prompt) -> Result<Response, Error> {
        let body = self.build_request(prompt, true);
        let response = self.post_completions(&body).await?;

        let events = response
            .bytes_stream()
            .sse_events()
            .take_while(|event| future::ready(!matches!(event, Ok(sse) if sse.is_done())))
            .map(|event| {
                let converted = event.and_then(|sse| Self::convert_chunk(&sse.data));
                let items: Vec<Result<StreamEvent, Error>> = match converted {
                    Ok(events) => events.into_iter().map(Ok).collect(),
                    Err(e) => vec![Err(e)],
                };
                stream::iter(items)
            })
            .flatten();

        Ok(Response::from_stream(events))
    }

    async fn list_models(&self) -> Result<Vec<String>, Error> {
        let response = self
            .client
            .get(format!("{}/models", self.base_url))
            .bearer_auth(&self.api_key)
            .send()
            .await?;
        let response = Self::check_status(response).await?;
        let list: ModelList = response.json().await?;

        let mut ids: Vec<String> = list.data.into_iter().map(|m| m.id).collect();
        ids.sort();
        Ok(ids)
    }
}
