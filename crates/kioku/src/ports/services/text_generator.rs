//! Text Generator Port
//!
//! Abstract interface for text-generation invocations. The memory core
//! decides what to send and when; the transport, model and provider are
//! the implementation's concern.

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use serde::{Deserialize, Serialize};

use crate::domain::errors::DomainError;

/// Who a prompt message speaks for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// Persona and task instructions
    System,
    /// Assembled context or a consolidation request
    User,
}

/// One prompt message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }
}

/// Sampling limits for a generation call; `None` leaves the collaborator's default
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompletionOptions {
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

impl CompletionOptions {
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// Generated text and the model that produced it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionResponse {
    pub content: String,
    pub model: String,
}

impl CompletionResponse {
    pub fn new(content: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            model: model.into(),
        }
    }
}

/// Incremental piece of a streamed generation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamChunk {
    /// Delta content
    pub content: String,
    /// Whether this is the final chunk
    pub is_final: bool,
}

/// Stream of generated chunks; a failure ends the stream
pub type TextStream = BoxStream<'static, Result<StreamChunk, DomainError>>;

/// Text-generation collaborator
///
/// Failures surface as `DomainError::ExternalService` carrying the
/// underlying transport message. Timeouts are the implementation's
/// contract and must surface as errors, not hangs.
///
/// # Example
///
/// ```rust,ignore
/// use kioku::ports::TextGenerator;
///
/// struct GatewayClient { /* ... */ }
///
/// #[async_trait]
/// impl TextGenerator for GatewayClient {
///     async fn complete(&self, messages: &[ChatMessage], options: &CompletionOptions)
///         -> Result<CompletionResponse, DomainError> {
///         // POST to the gateway
///     }
///     fn model_id(&self) -> &str { "gemini-2.5-flash" }
/// }
/// ```
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Generate a completion from messages
    async fn complete(
        &self,
        messages: &[ChatMessage],
        options: &CompletionOptions,
    ) -> Result<CompletionResponse, DomainError>;

    /// Generate a completion and return only its text
    async fn generate(
        &self,
        messages: &[ChatMessage],
        options: &CompletionOptions,
    ) -> Result<String, DomainError> {
        Ok(self.complete(messages, options).await?.content)
    }

    /// Streaming variant. The default emits the whole completion as one final chunk.
    async fn complete_stream(
        &self,
        messages: &[ChatMessage],
        options: &CompletionOptions,
    ) -> Result<TextStream, DomainError> {
        let content = self.generate(messages, options).await?;
        Ok(stream::once(async move {
            Ok(StreamChunk {
                content,
                is_final: true,
            })
        })
        .boxed())
    }

    /// Model name reported in logs
    fn model_id(&self) -> &str;
}

/// Drain a stream into the full text
pub async fn collect_stream(mut stream: TextStream) -> Result<String, DomainError> {
    let mut text = String::new();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        text.push_str(&chunk.content);
        if chunk.is_final {
            break;
        }
    }
    Ok(text)
}
