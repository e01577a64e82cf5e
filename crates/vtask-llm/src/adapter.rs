//! Provider-neutral LLM interface.

use async_trait::async_trait;
use futures_util::Stream;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use std::pin::Pin;

use crate::credentials::ModelCredentials;
use crate::error::{LlmError, LlmResult};
use crate::schema::response_schema_for;

/// One event of a streaming generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// Next chunk of generated text
    Delta(String),
    /// The provider closed the stream normally
    End,
}

/// Stream of generation events. A stream that stops without [`StreamEvent::End`]
/// was cut short and [`collect_stream`](crate::collect_stream) rejects it.
pub type TextStream = Pin<Box<dyn Stream<Item = LlmResult<StreamEvent>> + Send>>;

/// The two request shapes the pipelines use.
#[async_trait]
pub trait LlmAdapter: Send + Sync {
    /// Free-text generation, delivered as deltas.
    async fn generate_stream(&self, prompt: &str, credentials: &ModelCredentials) -> LlmResult<TextStream>;

    /// Generation constrained to `schema`; returns the parsed JSON value.
    async fn structured_output(
        &self,
        prompt: &str,
        credentials: &ModelCredentials,
        schema: serde_json::Value,
    ) -> LlmResult<serde_json::Value>;
}

/// Typed wrapper around [`LlmAdapter::structured_output`].
pub async fn structured_output_as<T>(
    adapter: &dyn LlmAdapter,
    prompt: &str,
    credentials: &ModelCredentials,
) -> LlmResult<T>
where
    T: DeserializeOwned + JsonSchema,
{
    let schema = response_schema_for::<T>()?;
    let value = adapter.structured_output(prompt, credentials, schema).await?;
    serde_json::from_value(value)
        .map_err(|e| LlmError::invalid_response(format!("output does not match the requested shape: {e}")))
}
