//! Generative model clients
//!
//! `GeminiGenerator` talks to the Generative Language REST API, either as a
//! single `generateContent` call or as a server-sent event stream.

use artalk_common::config::GenerationConfig;
use artalk_common::errors::{AppError, Result};
use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Emitted for a streamed response chunk that carries no candidate
pub const NO_VALID_RESPONSE: &str = "Pas de réponse valide générée.";

/// Streamed answer text, in arrival order
pub type TextStream = BoxStream<'static, Result<String>>;

#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String>;

    async fn generate_stream(&self, prompt: &str) -> Result<TextStream>;

    fn model_name(&self) -> &str;
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

impl GenerateResponse {
    /// Joined text of every candidate, or `None` when there is no candidate
    fn text(&self) -> Option<String> {
        if self.candidates.is_empty() {
            return None;
        }
        let text: String = self
            .candidates
            .iter()
            .filter_map(|c| c.content.as_ref())
            .flat_map(|c| c.parts.iter())
            .filter_map(|p| p.text.as_deref())
            .collect();
        Some(text)
    }
}

/// Splits an SSE byte stream into `data:` payloads.
///
/// Bytes are buffered until a full line arrives, so a multi-byte character
/// split across network chunks is decoded intact.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    data: Vec<String>,
}

impl SseDecoder {
    /// Feed raw bytes; returns the payload of every event completed by them
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(bytes);
        let mut events = Vec::new();

        while let Some(line_end) = self.buffer.iter().position(|&b| b == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=line_end).collect();
            let line = String::from_utf8_lossy(&raw[..line_end]);
            let line = line.trim_end_matches('\r');

            if line.is_empty() {
                // blank line terminates an event
                if !self.data.is_empty() {
                    events.push(self.data.join("\n"));
                    self.data.clear();
                }
            } else if let Some(data) = line.strip_prefix("data:") {
                self.data.push(data.trim_start().to_string());
            }
        }
        events
    }

    /// Payload of an unterminated trailing event, if any
    pub fn finish(&mut self) -> Option<String> {
        let rest = String::from_utf8_lossy(&self.buffer).into_owned();
        if let Some(data) = rest.trim().strip_prefix("data:") {
            self.data.push(data.trim_start().to_string());
        }
        self.buffer.clear();
        if self.data.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.data).join("\n"))
        }
    }
}

/// Text carried by one streamed event
fn event_text(payload: &str) -> Result<String> {
    let response: GenerateResponse = serde_json::from_str(payload)?;
    Ok(response.text().unwrap_or_else(|| NO_VALID_RESPONSE.to_string()))
}

/// Client for the Gemini REST API
pub struct GeminiGenerator {
    client: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
    model: String,
}

impl GeminiGenerator {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Configuration {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            base_url: config.api_base.trim_end_matches('/').to_string(),
            model: config.model.clone(),
        })
    }

    fn request(
        &self,
        method: &str,
        query: &[(&str, &str)],
        prompt: &str,
    ) -> reqwest::RequestBuilder {
        let url = format!("{}/models/{}:{}", self.base_url, self.model, method);
        let mut request = self
            .client
            .post(url)
            .query(query)
            .json(&json!({ "contents": [{ "parts": [{ "text": prompt }] }] }));
        if let Some(ref key) = self.api_key {
            request = request.header("x-goog-api-key", key);
        }
        request
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response> {
        let response = request.send().await.map_err(|e| AppError::GenerationError {
            message: format!("Request failed: {}", e),
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::GenerationError {
                message: format!("API error {}: {}", status, body),
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl Generator for GeminiGenerator {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let response = self.send(self.request("generateContent", &[], prompt)).await?;
        let body: GenerateResponse = response.json().await.map_err(|e| AppError::GenerationError {
            message: format!("Failed to parse response: {}", e),
        })?;

        body.text().ok_or_else(|| AppError::GenerationError {
            message: "Response has no candidates".to_string(),
        })
    }

    async fn generate_stream(&self, prompt: &str) -> Result<TextStream> {
        let response = self
            .send(self.request("streamGenerateContent", &[("alt", "sse")], prompt))
            .await?;

        let (tx, rx) = mpsc::channel::<Result<String>>(64);
        let mut bytes = response.bytes_stream();

        tokio::spawn(async move {
            let mut decoder = SseDecoder::default();
            while let Some(chunk) = bytes.next().await {
                let chunk = match chunk {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        let _ = tx
                            .send(Err(AppError::GenerationError {
                                message: format!("Stream read error: {}", e),
                            }))
                            .await;
                        return;
                    }
                };
                for payload in decoder.push(&chunk) {
                    if tx.send(event_text(&payload)).await.is_err() {
                        debug!("Stream receiver dropped");
                        return;
                    }
                }
            }
            if let Some(payload) = decoder.finish() {
                let _ = tx.send(event_text(&payload)).await;
            }
        });

        Ok(receiver_stream(rx))
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

fn receiver_stream(rx: mpsc::Receiver<Result<String>>) -> TextStream {
    stream::unfold(rx, |mut rx| async move { rx.recv().await.map(|item| (item, rx)) }).boxed()
}

/// Canned generator for tests and offline runs: echoes the prompt length and
/// records every prompt it receives.
#[derive(Debug, Default)]
pub struct MockGenerator {
    prompts: std::sync::Mutex<Vec<String>>,
}

impl MockGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prompts received so far
    pub fn prompts(&self) -> Vec<String> {
        match self.prompts.lock() {
            Ok(prompts) => prompts.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn record(&self, prompt: &str) {
        match self.prompts.lock() {
            Ok(mut prompts) => prompts.push(prompt.to_string()),
            Err(_) => warn!("Mock generator prompt log poisoned"),
        }
    }

    fn answer(prompt: &str) -> String {
        format!("Réponse simulée ({} caractères de prompt)", prompt.chars().count())
    }
}

#[async_trait]
impl Generator for MockGenerator {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.record(prompt);
        Ok(Self::answer(prompt))
    }

    async fn generate_stream(&self, prompt: &str) -> Result<TextStream> {
        self.record(prompt);
        let words: Vec<Result<String>> = Self::answer(prompt)
            .split_inclusive(' ')
            .map(|w| Ok(w.to_string()))
            .collect();
        Ok(stream::iter(words).boxed())
    }

    fn model_name(&self) -> &str {
        "mock-generator"
    }
}

/// Build the configured generator
pub fn create_generator(config: &GenerationConfig) -> Result<Arc<dyn Generator>> {
    match config.provider.as_str() {
        "gemini" => Ok(Arc::new(GeminiGenerator::new(config)?)),
        "mock" => Ok(Arc::new(MockGenerator::new())),
        other => Err(AppError::Configuration {
            message: format!("Unknown generation provider: {}", other),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decoder_splits_events_across_chunks() {
        let mut decoder = SseDecoder::default();
        assert!(decoder.push(b"data: {\"a\":").is_empty());
        let events = decoder.push(b"1}\n\ndata: {\"b\":2}\r\n\r\n: comment\n");
        assert_eq!(events, vec!["{\"a\":1}", "{\"b\":2}"]);
        assert!(decoder.finish().is_none());
    }

    #[test]
    fn test_decoder_flushes_trailing_event() {
        let mut decoder = SseDecoder::default();
        assert!(decoder.push(b"data: {\"c\":3}").is_empty());
        assert_eq!(decoder.finish().as_deref(), Some("{\"c\":3}"));
    }

    #[test]
    fn test_multibyte_char_split_across_chunks() {
        let bytes = "data: {\"t\":\"é\"}\n\n".as_bytes();
        let split = bytes.iter().position(|&b| b == 0xC3).unwrap() + 1;

        let mut decoder = SseDecoder::default();
        assert!(decoder.push(&bytes[..split]).is_empty());
        assert_eq!(decoder.push(&bytes[split..]), vec!["{\"t\":\"é\"}"]);
    }

    #[test]
    fn test_event_text_joins_parts() {
        let payload = r#"{"candidates":[{"content":{"parts":[{"text":"Le "},{"text":"Louvre"}]}}]}"#;
        assert_eq!(event_text(payload).unwrap(), "Le Louvre");
    }

    #[test]
    fn test_event_without_candidates() {
        assert_eq!(event_text(r#"{"promptFeedback":{}}"#).unwrap(), NO_VALID_RESPONSE);
        assert!(event_text("not json").is_err());
    }

    #[tokio::test]
    async fn test_mock_stream_reassembles() {
        let generator = MockGenerator::new();
        let full = generator.generate("abc").await.unwrap();
        let streamed: Vec<String> = generator
            .generate_stream("abc")
            .await
            .unwrap()
            .map(|r| r.unwrap())
            .collect()
            .await;

        assert_eq!(streamed.concat(), full);
        assert_eq!(generator.prompts(), vec!["abc", "abc"]);
    }

    #[tokio::test]
    async fn test_receiver_stream_ends_when_sender_drops() {
        let (tx, rx) = mpsc::channel(4);
        tx.send(Ok("a".to_string())).await.unwrap();
        drop(tx);
        let items: Vec<Result<String>> = receiver_stream(rx).collect().await;
        assert_eq!(items.len(), 1);
    }

    #[test]
    fn test_unknown_provider_rejected() {
        let config = GenerationConfig {
            provider: "gpt".into(),
            ..GenerationConfig::default()
        };
        assert!(create_generator(&config).is_err());
    }
}
