//! LLM-driven subtitle rewriting.
//!
//! The model is asked to wrap its answer in `<updated_content>` tags. Only
//! the text strictly between the first opening tag and the next closing tag
//! is kept; everything the model says around it is discarded.

use futures_util::StreamExt;
use thiserror::Error;
use tracing::{info, warn};

use crate::adapter::{LlmAdapter, StreamEvent, TextStream};
use crate::credentials::ModelDirectory;
use crate::error::LlmError;

pub const OPENING_TAG: &str = "<updated_content>";
pub const CLOSING_TAG: &str = "</updated_content>";

/// Failure of a single rewrite request.
#[derive(Debug, Error)]
pub enum RewriteError {
    #[error("Model output has no <updated_content> tag")]
    OpeningTagNotFound,

    #[error("Model output has no </updated_content> tag after the opening tag")]
    ClosingTagNotFound,

    #[error("Model returned empty content between the tags")]
    EmptyContent,

    #[error(transparent)]
    Llm(#[from] LlmError),
}

/// Prompt asking the model to apply `instruction` to `content`.
pub fn build_rewrite_prompt(content: &str, instruction: &str) -> String {
    format!(
        "You are editing a subtitle file. Apply the following instruction to it.\n\
         \n\
         Instruction: {instruction}\n\
         \n\
         Keep the subtitle format exactly as it is: cue numbers, timing lines and blank \
         lines between cues must stay intact. Only change the text of the cues.\n\
         \n\
         Write the complete updated subtitle file between {OPENING_TAG} and {CLOSING_TAG} \
         and nothing else inside those tags.\n\
         \n\
         Subtitle file:\n\
         {content}\n"
    )
}

/// Substring strictly between the delimiter tags, trimmed.
pub fn extract_tagged(output: &str) -> Result<&str, RewriteError> {
    let start = output
        .find(OPENING_TAG)
        .map(|i| i + OPENING_TAG.len())
        .ok_or(RewriteError::OpeningTagNotFound)?;
    let len = output[start..]
        .find(CLOSING_TAG)
        .ok_or(RewriteError::ClosingTagNotFound)?;

    let inner = output[start..start + len].trim();
    if inner.is_empty() {
        return Err(RewriteError::EmptyContent);
    }
    Ok(inner)
}

/// Concatenate every delta until [`StreamEvent::End`].
///
/// A stream that errors, or stops before sending `End`, fails the whole
/// collection.
pub async fn collect_stream(mut stream: TextStream) -> Result<String, LlmError> {
    let mut buffer = String::new();
    while let Some(event) = stream.next().await {
        match event? {
            StreamEvent::Delta(text) => buffer.push_str(&text),
            StreamEvent::End => return Ok(buffer),
        }
    }
    Err(LlmError::invalid_response("stream ended before completion"))
}

/// Rewrite `content` according to `instruction` with the model `model_id`.
pub async fn rewrite_subtitles(
    adapter: &dyn LlmAdapter,
    directory: &dyn ModelDirectory,
    model_id: &str,
    content: &str,
    instruction: &str,
) -> Result<String, RewriteError> {
    let credentials = directory.resolve(model_id).await?;
    let prompt = build_rewrite_prompt(content, instruction);

    info!(model = %credentials.model_name, "Rewriting subtitles");
    let stream = adapter.generate_stream(&prompt, &credentials).await?;
    let output = collect_stream(stream).await?;

    extract_tagged(&output).map(str::to_string)
}

/// Like [`rewrite_subtitles`], but falls back to `content` on any failure.
pub async fn rewrite_or_original(
    adapter: &dyn LlmAdapter,
    directory: &dyn ModelDirectory,
    model_id: &str,
    content: &str,
    instruction: &str,
) -> String {
    match rewrite_subtitles(adapter, directory, model_id, content, instruction).await {
        Ok(rewritten) => rewritten,
        Err(e) => {
            warn!("Subtitle rewrite failed, keeping original content: {}", e);
            content.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::{ModelCredentials, StaticModelDirectory};
    use crate::error::LlmResult;
    use async_trait::async_trait;
    use futures_util::stream;
    use std::sync::Mutex;

    /// Streams fixed deltas and records the prompt it was given.
    struct ScriptedAdapter {
        deltas: Vec<&'static str>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedAdapter {
        fn new(deltas: Vec<&'static str>) -> Self {
            Self {
                deltas,
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl LlmAdapter for ScriptedAdapter {
        async fn generate_stream(&self, prompt: &str, _credentials: &ModelCredentials) -> LlmResult<TextStream> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            let mut events: Vec<LlmResult<StreamEvent>> = self
                .deltas
                .iter()
                .map(|d| Ok(StreamEvent::Delta(d.to_string())))
                .collect();
            events.push(Ok(StreamEvent::End));
            Ok(Box::pin(stream::iter(events)))
        }

        async fn structured_output(
            &self,
            _prompt: &str,
            _credentials: &ModelCredentials,
            _schema: serde_json::Value,
        ) -> LlmResult<serde_json::Value> {
            unreachable!("rewrite never asks for structured output")
        }
    }

    fn directory() -> StaticModelDirectory {
        StaticModelDirectory::new().with_model("m", ModelCredentials::new("gemini-2.5-flash", "key"))
    }

    #[tokio::test]
    async fn test_extracts_between_tags() {
        let adapter = ScriptedAdapter::new(vec!["noise<updated", "_content>HEL", "LO</updated_content>", "trailer"]);
        let out = rewrite_subtitles(&adapter, &directory(), "m", "hello", "uppercase").await.unwrap();
        assert_eq!(out, "HELLO");

        let prompts = adapter.prompts.lock().unwrap();
        assert!(prompts[0].contains("uppercase"));
        assert!(prompts[0].contains(OPENING_TAG));
    }

    #[tokio::test]
    async fn test_missing_opening_tag() {
        let adapter = ScriptedAdapter::new(vec!["HELLO</updated_content>"]);
        let err = rewrite_subtitles(&adapter, &directory(), "m", "hello", "x").await.unwrap_err();
        assert!(matches!(err, RewriteError::OpeningTagNotFound));
    }

    #[tokio::test]
    async fn test_missing_closing_tag() {
        let adapter = ScriptedAdapter::new(vec!["noise<updated_content>HELLO"]);
        let err = rewrite_subtitles(&adapter, &directory(), "m", "hello", "x").await.unwrap_err();
        assert!(matches!(err, RewriteError::ClosingTagNotFound));
    }

    #[tokio::test]
    async fn test_empty_content() {
        let adapter = ScriptedAdapter::new(vec!["<updated_content>  \n </updated_content>"]);
        let err = rewrite_subtitles(&adapter, &directory(), "m", "hello", "x").await.unwrap_err();
        assert!(matches!(err, RewriteError::EmptyContent));
    }

    #[tokio::test]
    async fn test_unknown_model_fails_before_generation() {
        let adapter = ScriptedAdapter::new(vec![]);
        let err = rewrite_subtitles(&adapter, &directory(), "other", "hello", "x").await.unwrap_err();
        assert!(matches!(err, RewriteError::Llm(LlmError::ModelNotFound(_))));
        assert!(adapter.prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_fallback_keeps_original() {
        let adapter = ScriptedAdapter::new(vec!["no tags at all"]);
        let out = rewrite_or_original(&adapter, &directory(), "m", "original text", "x").await;
        assert_eq!(out, "original text");
    }

    #[tokio::test]
    async fn test_collect_stops_at_end_event() {
        let events: Vec<LlmResult<StreamEvent>> = vec![
            Ok(StreamEvent::Delta("a".into())),
            Ok(StreamEvent::End),
            Ok(StreamEvent::Delta("ignored".into())),
        ];
        let text = collect_stream(Box::pin(stream::iter(events))).await.unwrap();
        assert_eq!(text, "a");
    }

    #[tokio::test]
    async fn test_collect_rejects_stream_without_end_event() {
        let events: Vec<LlmResult<StreamEvent>> = vec![Ok(StreamEvent::Delta("half a sen".into()))];
        let err = collect_stream(Box::pin(stream::iter(events))).await.unwrap_err();
        assert!(matches!(err, LlmError::InvalidResponse(_)));

        let empty: Vec<LlmResult<StreamEvent>> = Vec::new();
        assert!(collect_stream(Box::pin(stream::iter(empty))).await.is_err());
    }
}
