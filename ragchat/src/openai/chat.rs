//! Chat completions over an OpenAI-compatible API via `async-openai`.

use async_openai::Client;
use async_openai::config::OpenAIConfig as ClientConfig;
use async_openai::error::OpenAIError;
use async_openai::types::{
    ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
    ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
    CreateChatCompletionRequest, CreateChatCompletionRequestArgs,
};
use async_stream::try_stream;
use async_trait::async_trait;
use futures::StreamExt;
use tracing::debug;

use super::config::OpenAIConfig;
use crate::chat::{ChatModel, ChatRequest, ChatStream, Role};
use crate::error::{RagError, Result};

/// A [`ChatModel`] for any OpenAI-compatible chat completions endpoint.
///
/// The model id comes from each [`ChatRequest`], so one client serves every
/// model the endpoint offers.
pub struct OpenAIChatModel {
    client: Client<ClientConfig>,
}

impl OpenAIChatModel {
    pub fn new(config: &OpenAIConfig) -> Self {
        let client_config =
            ClientConfig::new().with_api_key(&config.api_key).with_api_base(&config.base_url);
        Self { client: Client::with_config(client_config) }
    }
}

fn chat_error(context: &str, e: OpenAIError) -> RagError {
    RagError::ChatError { provider: "OpenAI".to_string(), message: format!("{context}: {e}") }
}

/// Translate a [`ChatRequest`] into the wire request.
fn build_request(request: &ChatRequest, stream: bool) -> Result<CreateChatCompletionRequest> {
    let invalid = |e| chat_error("failed to build request", e);

    let mut messages: Vec<ChatCompletionRequestMessage> = Vec::with_capacity(request.history.len() + 2);
    messages.push(
        ChatCompletionRequestSystemMessageArgs::default()
            .content(request.system_prompt.clone())
            .build()
            .map_err(invalid)?
            .into(),
    );
    for message in &request.history {
        let message = match message.role {
            Role::User => ChatCompletionRequestUserMessageArgs::default()
                .content(message.content.clone())
                .build()
                .map_err(invalid)?
                .into(),
            Role::Assistant => ChatCompletionRequestAssistantMessageArgs::default()
                .content(message.content.clone())
                .build()
                .map_err(invalid)?
                .into(),
        };
        messages.push(message);
    }
    messages.push(
        ChatCompletionRequestUserMessageArgs::default()
            .content(request.user_turn.clone())
            .build()
            .map_err(invalid)?
            .into(),
    );

    CreateChatCompletionRequestArgs::default()
        .model(&request.model)
        .messages(messages)
        .temperature(request.temperature)
        .stream(stream)
        .build()
        .map_err(invalid)
}

#[async_trait]
impl ChatModel for OpenAIChatModel {
    fn name(&self) -> &str {
        "OpenAI"
    }

    async fn complete(&self, request: &ChatRequest) -> Result<String> {
        debug!(model = %request.model, history = request.history.len(), "chat completion");
        let wire = build_request(request, false)?;
        let response =
            self.client.chat().create(wire).await.map_err(|e| chat_error("API error", e))?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| RagError::ChatError {
                provider: "OpenAI".to_string(),
                message: "response contained no message content".to_string(),
            })
    }

    async fn stream(&self, request: &ChatRequest) -> Result<ChatStream> {
        debug!(model = %request.model, history = request.history.len(), "streaming chat completion");
        let wire = build_request(request, true)?;
        let mut events = self
            .client
            .chat()
            .create_stream(wire)
            .await
            .map_err(|e| chat_error("API error", e))?;

        // Dropping this stream drops `events` and closes the connection.
        let stream = try_stream! {
            while let Some(event) = events.next().await {
                let event = event.map_err(|e| chat_error("stream error", e))?;
                for choice in event.choices {
                    if let Some(content) = choice.delta.content {
                        if !content.is_empty() {
                            yield content;
                        }
                    }
                }
            }
        };
        Ok(Box::pin(stream))
    }
}
