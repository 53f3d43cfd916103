//! OpenAI HTTP client — chat completions, Whisper transcription, and speech.
//!
//! Talks to any OpenAI-compatible API: `/chat/completions` for the text
//! capabilities, `/audio/transcriptions` (multipart) for speech-to-text, and
//! `/audio/speech` for synthesis. Responses are typed; a completion without
//! content is a provider error.

use std::path::Path;

use polyglot_core::{Result, ServiceError};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::classify::{classify_status, classify_transport};

const PROVIDER: &str = "openai";
const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";

// ─────────────────────────────────────────────
// Wire types
// ─────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    text: String,
}

#[derive(Debug, Serialize)]
struct SpeechRequest<'a> {
    model: &'a str,
    input: &'a str,
    voice: &'a str,
    response_format: &'static str,
}

// ─────────────────────────────────────────────
// OpenAiClient
// ─────────────────────────────────────────────

/// HTTP client for OpenAI-compatible APIs.
pub struct OpenAiClient {
    client: reqwest::Client,
    api_base: String,
    api_key: String,
}

impl std::fmt::Debug for OpenAiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiClient")
            .field("api_base", &self.api_base)
            .finish()
    }
}

impl OpenAiClient {
    pub fn new(api_key: impl Into<String>, api_base: Option<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            api_base: api_base.unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            api_key: api_key.into(),
        }
    }

    fn url(&self, endpoint: &str) -> String {
        let base = self.api_base.trim_end_matches('/');
        format!("{base}/{endpoint}")
    }

    /// One chat completion round: optional system prompt plus one user turn.
    pub async fn chat_text(
        &self,
        model: &str,
        system: Option<&str>,
        user: &str,
    ) -> Result<String> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = system {
            messages.push(ChatMessage {
                role: "system",
                content: system,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: user,
        });

        debug!(model, "calling OpenAI chat completions");
        let response = self
            .client
            .post(self.url("chat/completions"))
            .bearer_auth(&self.api_key)
            .json(&ChatRequest { model, messages })
            .send()
            .await
            .map_err(|e| classify_transport(PROVIDER, &e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(PROVIDER, status, &body, model));
        }

        let chat: ChatResponse = response.json().await.map_err(|e| {
            ServiceError::provider_error(format!("openai response parse: {e}"))
                .with_provider(PROVIDER)
        })?;

        chat.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.is_empty())
            .ok_or_else(|| {
                ServiceError::provider_error("no usable content in openai response")
                    .with_provider(PROVIDER)
                    .with_detail("model", model)
            })
    }

    /// Transcribe an audio file via the Whisper endpoint.
    pub async fn transcribe_file(
        &self,
        model: &str,
        file_path: &Path,
        language: Option<&str>,
    ) -> Result<String> {
        let file_name = file_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "audio".to_string());

        let bytes = tokio::fs::read(file_path).await.map_err(|e| {
            ServiceError::resource(format!("failed to read audio file: {e}"))
        })?;

        let file_part = reqwest::multipart::Part::bytes(bytes)
            .file_name(file_name)
            .mime_str("application/octet-stream")
            .map_err(|e| ServiceError::resource(format!("multipart part: {e}")))?;

        let mut form = reqwest::multipart::Form::new()
            .part("file", file_part)
            .text("model", model.to_string());
        if let Some(language) = language {
            form = form.text("language", language.to_string());
        }

        debug!(model, path = %file_path.display(), "calling OpenAI transcription");
        let response = self
            .client
            .post(self.url("audio/transcriptions"))
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| classify_transport(PROVIDER, &e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(PROVIDER, status, &body, model));
        }

        let transcription: TranscriptionResponse = response.json().await.map_err(|e| {
            ServiceError::provider_error(format!("openai response parse: {e}"))
                .with_provider(PROVIDER)
        })?;
        Ok(transcription.text)
    }

    /// Synthesize speech. Returns raw MP3 bytes.
    pub async fn speech(&self, model: &str, input: &str, voice: &str) -> Result<Vec<u8>> {
        debug!(model, voice, "calling OpenAI speech");
        let response = self
            .client
            .post(self.url("audio/speech"))
            .bearer_auth(&self.api_key)
            .json(&SpeechRequest {
                model,
                input,
                voice,
                response_format: "mp3",
            })
            .send()
            .await
            .map_err(|e| classify_transport(PROVIDER, &e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(PROVIDER, status, &body, model));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| classify_transport(PROVIDER, &e))?;
        if bytes.is_empty() {
            return Err(ServiceError::provider_error("empty audio response")
                .with_provider(PROVIDER)
                .with_detail("model", model));
        }
        Ok(bytes.to_vec())
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use polyglot_core::ErrorKind;
    use serde_json::json;
    use std::io::Write;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_chat_text_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("Authorization", "Bearer o-key"))
            .and(body_partial_json(json!({
                "model": "gpt-4o-mini",
                "messages": [
                    {"role": "system", "content": "You translate."},
                    {"role": "user", "content": "hola"}
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"content": "hello"}}]
            })))
            .mount(&server)
            .await;

        let client = OpenAiClient::new("o-key", Some(server.uri()));
        let text = client
            .chat_text("gpt-4o-mini", Some("You translate."), "hola")
            .await
            .unwrap();
        assert_eq!(text, "hello");
    }

    #[tokio::test]
    async fn test_chat_text_empty_content_is_provider_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"content": null}}]
            })))
            .mount(&server)
            .await;

        let client = OpenAiClient::new("o-key", Some(server.uri()));
        let err = client.chat_text("gpt-4o-mini", None, "x").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Provider);
        assert!(err.message().contains("no usable content"));
    }

    #[tokio::test]
    async fn test_chat_rate_limit() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(429).set_body_string("Rate limit exceeded"),
            )
            .mount(&server)
            .await;

        let client = OpenAiClient::new("o-key", Some(server.uri()));
        let err = client.chat_text("gpt-4o-mini", None, "x").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RateLimit);
    }

    #[tokio::test]
    async fn test_transcribe_file_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/audio/transcriptions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "text": "hello from audio"
            })))
            .mount(&server)
            .await;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"fake-audio-bytes").unwrap();
        file.flush().unwrap();

        let client = OpenAiClient::new("o-key", Some(server.uri()));
        let text = client
            .transcribe_file("whisper-1", file.path(), Some("en"))
            .await
            .unwrap();
        assert_eq!(text, "hello from audio");
    }

    #[tokio::test]
    async fn test_transcribe_missing_file_is_resource_error() {
        let client = OpenAiClient::new("o-key", Some("http://127.0.0.1:1".to_string()));
        let err = client
            .transcribe_file("whisper-1", Path::new("/nonexistent/audio.ogg"), None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Resource);
    }

    #[tokio::test]
    async fn test_speech_returns_bytes() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/audio/speech"))
            .and(body_partial_json(json!({
                "model": "tts-1", "input": "hi", "voice": "alloy"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"MP3DATA".to_vec()))
            .mount(&server)
            .await;

        let client = OpenAiClient::new("o-key", Some(server.uri()));
        let audio = client.speech("tts-1", "hi", "alloy").await.unwrap();
        assert_eq!(audio, b"MP3DATA");
    }

    #[tokio::test]
    async fn test_speech_empty_body_is_provider_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let client = OpenAiClient::new("o-key", Some(server.uri()));
        let err = client.speech("tts-1", "hi", "alloy").await.unwrap_err();
        assert!(err.message().contains("empty audio"));
    }
}
