//! Gemini REST implementation of [`LlmAdapter`].

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{stream, Stream, StreamExt};
use reqwest::{Client, Response, StatusCode};
use tracing::{debug, warn};

use crate::adapter::{LlmAdapter, StreamEvent, TextStream};
use crate::credentials::ModelCredentials;
use crate::error::{LlmError, LlmResult};
use crate::types::{GenerateContentRequest, GenerateContentResponse};

/// Configuration for the Gemini client.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    /// API root, without the `/v1beta` suffix
    pub base_url: String,
    /// Request timeout for non-streaming calls
    pub timeout: Duration,
    /// Retries for transient failures of non-streaming calls
    pub max_retries: u32,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            timeout: Duration::from_secs(300),
            max_retries: 2,
        }
    }
}

impl GeminiConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            base_url: std::env::var("GEMINI_BASE_URL").unwrap_or(defaults.base_url),
            timeout: std::env::var("GEMINI_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
            max_retries: std::env::var("GEMINI_MAX_RETRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_retries),
        }
    }
}

/// Gemini API client.
pub struct GeminiAdapter {
    http: Client,
    config: GeminiConfig,
}

impl GeminiAdapter {
    pub fn new(config: GeminiConfig) -> LlmResult<Self> {
        // No client-wide timeout: it would also cut long streams
        let http = Client::builder().build().map_err(LlmError::Network)?;
        Ok(Self { http, config })
    }

    pub fn from_env() -> LlmResult<Self> {
        Self::new(GeminiConfig::from_env())
    }

    fn endpoint(&self, model: &str, method: &str) -> String {
        format!(
            "{}/v1beta/models/{}:{}",
            self.config.base_url.trim_end_matches('/'),
            model,
            method
        )
    }

    async fn generate_once(
        &self,
        request: &GenerateContentRequest,
        credentials: &ModelCredentials,
    ) -> LlmResult<GenerateContentResponse> {
        let url = self.endpoint(&credentials.model_name, "generateContent");
        debug!(model = %credentials.model_name, "Sending Gemini generateContent request");

        let response = self
            .http
            .post(&url)
            .header("x-goog-api-key", &credentials.api_key)
            .timeout(self.config.timeout)
            .json(request)
            .send()
            .await?;

        let response = check_status(response).await?;
        let body: GenerateContentResponse = response.json().await?;
        if let Some(err) = body.error {
            return Err(LlmError::RequestFailed(err.to_string()));
        }
        Ok(body)
    }

    /// Execute with retry logic.
    async fn with_retry<F, Fut, T>(&self, operation: F) -> LlmResult<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = LlmResult<T>>,
    {
        let mut attempt = 0;
        loop {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) if e.is_retryable() && attempt < self.config.max_retries => {
                    let delay = Duration::from_millis(500 * 2u64.pow(attempt));
                    warn!(
                        "Gemini request failed (attempt {}), retrying in {:?}: {}",
                        attempt + 1,
                        delay,
                        e
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

async fn check_status(response: Response) -> LlmResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = format!("Gemini API returned {}: {}", status, body);
    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        Err(LlmError::ServiceUnavailable(message))
    } else {
        Err(LlmError::RequestFailed(message))
    }
}

#[async_trait]
impl LlmAdapter for GeminiAdapter {
    async fn generate_stream(&self, prompt: &str, credentials: &ModelCredentials) -> LlmResult<TextStream> {
        let url = format!(
            "{}?alt=sse",
            self.endpoint(&credentials.model_name, "streamGenerateContent")
        );
        debug!(model = %credentials.model_name, "Opening Gemini stream");

        let response = self
            .http
            .post(&url)
            .header("x-goog-api-key", &credentials.api_key)
            .json(&GenerateContentRequest::from_prompt(prompt))
            .send()
            .await?;
        let response = check_status(response).await?;

        Ok(sse_events(response.bytes_stream()))
    }

    async fn structured_output(
        &self,
        prompt: &str,
        credentials: &ModelCredentials,
        schema: serde_json::Value,
    ) -> LlmResult<serde_json::Value> {
        let request = GenerateContentRequest::from_prompt(prompt).with_response_schema(schema);
        let response = self.with_retry(|| self.generate_once(&request, credentials)).await?;

        if let Some(reason) = response.block_reason() {
            return Err(LlmError::RequestFailed(format!("prompt blocked: {}", reason)));
        }

        let text = response.text();
        if text.trim().is_empty() {
            return Err(LlmError::EmptyResponse);
        }

        serde_json::from_str(strip_code_fence(&text))
            .map_err(|e| LlmError::invalid_response(format!("structured output is not JSON: {}", e)))
    }
}

/// Remove a surrounding markdown code fence, if any.
pub(crate) fn strip_code_fence(text: &str) -> &str {
    let text = text.trim();
    let text = text
        .strip_prefix("```json")
        .or_else(|| text.strip_prefix("```"))
        .unwrap_or(text);
    text.strip_suffix("```").unwrap_or(text).trim()
}

struct SseState<S> {
    body: std::pin::Pin<Box<S>>,
    buffer: Vec<u8>,
    pending: VecDeque<LlmResult<StreamEvent>>,
    finished: bool,
}

impl<S> SseState<S> {
    fn push_bytes(&mut self, bytes: &[u8]) {
        self.buffer.extend(bytes.iter().copied().filter(|b| *b != b'\r'));
        while let Some(pos) = self.buffer.windows(2).position(|w| w == b"\n\n") {
            let block: Vec<u8> = self.buffer.drain(..pos + 2).collect();
            self.push_block(&block);
        }
    }

    fn flush(&mut self) {
        let block = std::mem::take(&mut self.buffer);
        self.push_block(&block);
    }

    fn push_block(&mut self, block: &[u8]) {
        if let Some(event) = parse_sse_block(&String::from_utf8_lossy(block)) {
            self.pending.push_back(event);
        }
    }
}

/// Turn an SSE byte stream of `GenerateContentResponse` chunks into text events.
pub(crate) fn sse_events<S, B>(body: S) -> TextStream
where
    S: Stream<Item = reqwest::Result<B>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
{
    let state = SseState {
        body: Box::pin(body),
        buffer: Vec::new(),
        pending: VecDeque::new(),
        finished: false,
    };

    Box::pin(stream::unfold(state, |mut state| async move {
        loop {
            if let Some(event) = state.pending.pop_front() {
                return Some((event, state));
            }
            if state.finished {
                return None;
            }
            match state.body.next().await {
                Some(Ok(chunk)) => state.push_bytes(chunk.as_ref()),
                Some(Err(e)) => {
                    state.finished = true;
                    state.pending.push_back(Err(LlmError::Network(e)));
                }
                None => {
                    state.finished = true;
                    state.flush();
                    state.pending.push_back(Ok(StreamEvent::End));
                }
            }
        }
    }))
}

fn parse_sse_block(block: &str) -> Option<LlmResult<StreamEvent>> {
    let data: Vec<&str> = block
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(str::trim)
        .collect();
    if data.is_empty() {
        return None;
    }
    let payload = data.join("\n");
    if payload == "[DONE]" {
        return None;
    }

    let chunk: GenerateContentResponse = match serde_json::from_str(&payload) {
        Ok(chunk) => chunk,
        Err(e) => return Some(Err(LlmError::Json(e))),
    };
    if let Some(err) = chunk.error {
        return Some(Err(LlmError::RequestFailed(err.to_string())));
    }

    let text = chunk.text();
    (!text.is_empty()).then(|| Ok(StreamEvent::Delta(text)))
}
