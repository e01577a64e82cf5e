//! LLM adapter for the media task pipeline.
//!
//! Two request shapes are exposed through [`LlmAdapter`]: streaming free-text
//! generation and schema-constrained structured output. [`GeminiAdapter`]
//! implements both against the Gemini REST API. The [`rewrite`] module builds
//! the tag-delimited subtitle rewrite on top of the streaming mode.

pub mod adapter;
pub mod credentials;
pub mod error;
pub mod gemini;
pub mod rewrite;
pub mod schema;
mod types;

pub use adapter::{structured_output_as, LlmAdapter, StreamEvent, TextStream};
pub use credentials::{ModelCredentials, ModelDirectory, StaticModelDirectory};
pub use error::{LlmError, LlmResult};
pub use gemini::{GeminiAdapter, GeminiConfig};
pub use rewrite::{collect_stream, rewrite_or_original, rewrite_subtitles, RewriteError};
pub use schema::response_schema_for;
