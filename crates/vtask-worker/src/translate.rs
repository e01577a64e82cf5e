//! Subtitle translation.
//!
//! Cues are translated one at a time; timing fields never pass through the
//! translator.

use std::sync::Arc;

use async_trait::async_trait;
use vtask_llm::{collect_stream, LlmAdapter, ModelDirectory};
use vtask_media::srt;

use crate::error::{WorkerError, WorkerResult};

/// Translates one subtitle text block.
#[async_trait]
pub trait SegmentTranslator: Send + Sync {
    async fn translate_segment(&self, text: &str, target_language: &str) -> WorkerResult<String>;
}

/// [`SegmentTranslator`] using the LLM adapter's plain-text streaming mode.
pub struct LlmTranslator {
    adapter: Arc<dyn LlmAdapter>,
    models: Arc<dyn ModelDirectory>,
    model_id: String,
}

impl LlmTranslator {
    pub fn new(adapter: Arc<dyn LlmAdapter>, models: Arc<dyn ModelDirectory>, model_id: impl Into<String>) -> Self {
        Self {
            adapter,
            models,
            model_id: model_id.into(),
        }
    }
}

fn translation_prompt(text: &str, target_language: &str) -> String {
    format!(
        "Translate the following subtitle text into {target_language}. \
         Keep the line breaks. Reply with the translation only, without quotes or commentary.\n\n{text}"
    )
}

#[async_trait]
impl SegmentTranslator for LlmTranslator {
    async fn translate_segment(&self, text: &str, target_language: &str) -> WorkerResult<String> {
        let credentials = self.models.resolve(&self.model_id).await?;
        let stream = self
            .adapter
            .generate_stream(&translation_prompt(text, target_language), &credentials)
            .await?;
        let translated = collect_stream(stream).await?;
        let translated = translated.trim();
        if translated.is_empty() {
            return Err(WorkerError::invalid_output("translation came back empty"));
        }
        Ok(translated.to_string())
    }
}

/// Translator used when no translation model is configured.
pub struct UnconfiguredTranslator;

#[async_trait]
impl SegmentTranslator for UnconfiguredTranslator {
    async fn translate_segment(&self, _text: &str, target_language: &str) -> WorkerResult<String> {
        Err(WorkerError::config_error(format!(
            "translation to {} requested but TRANSLATION_MODEL_ID is not set",
            target_language
        )))
    }
}

/// Translate every cue of an SRT document, keeping indices and timings.
pub async fn translate_srt(
    translator: &dyn SegmentTranslator,
    srt_text: &str,
    target_language: &str,
) -> WorkerResult<String> {
    let mut cues = srt::parse(srt_text)?;
    for cue in cues.iter_mut() {
        cue.text = translator.translate_segment(&cue.text, target_language).await?;
    }
    Ok(srt::format(&cues))
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;
    use vtask_llm::{LlmResult, ModelCredentials, StaticModelDirectory, StreamEvent, TextStream};

    struct Upper;

    #[async_trait]
    impl SegmentTranslator for Upper {
        async fn translate_segment(&self, text: &str, _target: &str) -> WorkerResult<String> {
            Ok(text.to_uppercase())
        }
    }

    #[tokio::test]
    async fn test_translate_srt_keeps_timings() {
        let input = "1\n00:00:01,000 --> 00:00:02,500\nhello\n\n2\n00:00:03,000 --> 00:00:04,000\ntwo\nlines\n\n";
        let out = translate_srt(&Upper, input, "de").await.unwrap();
        assert_eq!(
            out,
            "1\n00:00:01,000 --> 00:00:02,500\nHELLO\n\n2\n00:00:03,000 --> 00:00:04,000\nTWO\nLINES\n\n"
        );
    }

    #[tokio::test]
    async fn test_unconfigured_translator_fails() {
        let err = UnconfiguredTranslator.translate_segment("hi", "fr").await.unwrap_err();
        assert!(err.to_string().contains("TRANSLATION_MODEL_ID"));
    }

    #[test]
    fn test_prompt_names_language() {
        let prompt = translation_prompt("Hallo", "English");
        assert!(prompt.contains("into English"));
        assert!(prompt.ends_with("Hallo"));
    }

    struct CutOffLlm;

    #[async_trait]
    impl LlmAdapter for CutOffLlm {
        async fn generate_stream(&self, _prompt: &str, _credentials: &ModelCredentials) -> LlmResult<TextStream> {
            let events: Vec<LlmResult<StreamEvent>> = vec![Ok(StreamEvent::Delta("Guten Tag, mein".into()))];
            Ok(Box::pin(stream::iter(events)))
        }

        async fn structured_output(
            &self,
            _prompt: &str,
            _credentials: &ModelCredentials,
            _schema: serde_json::Value,
        ) -> LlmResult<serde_json::Value> {
            unreachable!("translation only streams")
        }
    }

    #[tokio::test]
    async fn test_truncated_translation_is_rejected() {
        let models = StaticModelDirectory::new().with_model("t", ModelCredentials::new("gemini-2.5-flash", "key"));
        let translator = LlmTranslator::new(Arc::new(CutOffLlm), Arc::new(models), "t");

        let err = translator.translate_segment("Good day, my friend", "de").await.unwrap_err();
        assert!(err.to_string().contains("stream ended before completion"), "{err}");
    }
}
