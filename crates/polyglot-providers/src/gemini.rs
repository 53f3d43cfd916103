//! Gemini HTTP client — `generateContent` over REST.
//!
//! All four capabilities ride on the same endpoint: text parts for
//! translation/interpretation, an inline audio part for transcription, and an
//! audio response modality for speech synthesis. The response is a typed
//! structure matched exhaustively; a reply without usable content is a
//! provider error, not a silent empty string.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use polyglot_core::{Result, ServiceError};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::classify::{classify_status, classify_transport};

const PROVIDER: &str = "gemini";
const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

// ─────────────────────────────────────────────
// Wire types
// ─────────────────────────────────────────────

/// One part of a Gemini content entry, in requests and responses alike.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum GeminiPart {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: GeminiBlob,
    },
}

/// Base64-encoded binary payload with its MIME type.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GeminiBlob {
    pub mime_type: String,
    pub data: String,
}

/// Build a text part.
pub fn text_part(text: impl Into<String>) -> GeminiPart {
    GeminiPart::Text { text: text.into() }
}

/// Build an inline audio part from raw bytes.
pub fn audio_part(bytes: &[u8], mime_type: &str) -> GeminiPart {
    GeminiPart::InlineData {
        inline_data: GeminiBlob {
            mime_type: mime_type.to_string(),
            data: BASE64.encode(bytes),
        },
    }
}

#[derive(Debug, Serialize)]
struct GenerateContentRequest<'a> {
    contents: Vec<ContentEntry<'a>>,
    #[serde(rename = "generationConfig", skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Serialize)]
struct ContentEntry<'a> {
    parts: &'a [GeminiPart],
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    response_modalities: Option<Vec<&'static str>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    speech_config: Option<SpeechConfig>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SpeechConfig {
    voice_config: VoiceConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VoiceConfig {
    prebuilt_voice_config: PrebuiltVoiceConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PrebuiltVoiceConfig {
    voice_name: String,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

// ─────────────────────────────────────────────
// GeminiClient
// ─────────────────────────────────────────────

/// HTTP client for the Gemini `generateContent` API.
pub struct GeminiClient {
    client: reqwest::Client,
    api_base: String,
    api_key: String,
}

impl std::fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiClient")
            .field("api_base", &self.api_base)
            .finish()
    }
}

impl GeminiClient {
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

    fn generate_url(&self, model: &str) -> String {
        let base = self.api_base.trim_end_matches('/');
        format!("{base}/models/{model}:generateContent")
    }

    async fn call(
        &self,
        model: &str,
        body: &GenerateContentRequest<'_>,
    ) -> Result<GenerateContentResponse> {
        let url = self.generate_url(model);
        debug!(model, "calling Gemini generateContent");

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| classify_transport(PROVIDER, &e))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(classify_status(PROVIDER, status, &body_text, model));
        }

        response
            .json()
            .await
            .map_err(|e| {
                ServiceError::provider_error(format!("gemini response parse: {e}"))
                    .with_provider(PROVIDER)
            })
    }

    /// Generate text from the given parts. Concatenates every text part of the
    /// first candidate; a candidate without text is an error.
    pub async fn generate_text(&self, model: &str, parts: &[GeminiPart]) -> Result<String> {
        let request = GenerateContentRequest {
            contents: vec![ContentEntry { parts }],
            generation_config: None,
        };
        let response = self.call(model, &request).await?;

        let text: String = response
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|p| match p {
                        GeminiPart::Text { text } => Some(text),
                        GeminiPart::InlineData { .. } => None,
                    })
                    .collect()
            })
            .unwrap_or_default();

        if text.is_empty() {
            return Err(
                ServiceError::provider_error("no usable content in gemini response")
                    .with_provider(PROVIDER)
                    .with_detail("model", model),
            );
        }
        Ok(text)
    }

    /// Synthesize speech for `text` with the given prebuilt voice. Returns the
    /// decoded audio bytes (PCM/WAV as published by the model).
    pub async fn generate_audio(&self, model: &str, text: &str, voice: &str) -> Result<Vec<u8>> {
        let parts = [text_part(text)];
        let request = GenerateContentRequest {
            contents: vec![ContentEntry { parts: &parts }],
            generation_config: Some(GenerationConfig {
                response_modalities: Some(vec!["AUDIO"]),
                speech_config: Some(SpeechConfig {
                    voice_config: VoiceConfig {
                        prebuilt_voice_config: PrebuiltVoiceConfig {
                            voice_name: voice.to_string(),
                        },
                    },
                }),
            }),
        };
        let response = self.call(model, &request).await?;

        let blob = response
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .and_then(|content| {
                content.parts.into_iter().find_map(|p| match p {
                    GeminiPart::InlineData { inline_data } => Some(inline_data),
                    GeminiPart::Text { .. } => None,
                })
            })
            .ok_or_else(|| {
                ServiceError::provider_error("no audio content in gemini response")
                    .with_provider(PROVIDER)
                    .with_detail("model", model)
            })?;

        BASE64.decode(blob.data.as_bytes()).map_err(|e| {
            ServiceError::provider_error(format!("gemini audio decode: {e}"))
                .with_provider(PROVIDER)
        })
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
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_part_serialization() {
        let part = text_part("hello");
        assert_eq!(serde_json::to_value(&part).unwrap(), json!({"text": "hello"}));

        let part = audio_part(b"abc", "audio/wav");
        let value = serde_json::to_value(&part).unwrap();
        assert_eq!(value["inlineData"]["mimeType"], "audio/wav");
        assert_eq!(value["inlineData"]["data"], BASE64.encode(b"abc"));
    }

    #[test]
    fn test_part_deserialization_is_untagged() {
        let part: GeminiPart = serde_json::from_value(json!({"text": "hi"})).unwrap();
        assert_eq!(part, text_part("hi"));

        let part: GeminiPart =
            serde_json::from_value(json!({"inlineData": {"mimeType": "audio/wav", "data": "QUJD"}}))
                .unwrap();
        match part {
            GeminiPart::InlineData { inline_data } => {
                assert_eq!(inline_data.mime_type, "audio/wav");
            }
            _ => panic!("expected inline data part"),
        }
    }

    #[tokio::test]
    async fn test_generate_text_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/models/gemini-2.0-flash:generateContent"))
            .and(header("x-goog-api-key", "g-key"))
            .and(body_partial_json(json!({
                "contents": [{"parts": [{"text": "Translate: hola"}]}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{"content": {"parts": [{"text": "hello"}]}}]
            })))
            .mount(&server)
            .await;

        let client = GeminiClient::new("g-key", Some(server.uri()));
        let text = client
            .generate_text("gemini-2.0-flash", &[text_part("Translate: hola")])
            .await
            .unwrap();
        assert_eq!(text, "hello");
    }

    #[tokio::test]
    async fn test_generate_text_concatenates_parts() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{"content": {"parts": [{"text": "Hello "}, {"text": "world"}]}}]
            })))
            .mount(&server)
            .await;

        let client = GeminiClient::new("g-key", Some(server.uri()));
        let text = client
            .generate_text("gemini-2.0-flash", &[text_part("x")])
            .await
            .unwrap();
        assert_eq!(text, "Hello world");
    }

    #[tokio::test]
    async fn test_generate_text_no_candidates_is_provider_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"candidates": []})))
            .mount(&server)
            .await;

        let client = GeminiClient::new("g-key", Some(server.uri()));
        let err = client
            .generate_text("gemini-2.0-flash", &[text_part("x")])
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Provider);
        assert!(err.message().contains("no usable content"));
    }

    #[tokio::test]
    async fn test_unauthorized_is_authentication_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("API key not valid"))
            .mount(&server)
            .await;

        let client = GeminiClient::new("bad-key", Some(server.uri()));
        let err = client
            .generate_text("gemini-2.0-flash", &[text_part("x")])
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Authentication);
        assert_eq!(err.provider(), Some("gemini"));
    }

    #[tokio::test]
    async fn test_generate_audio_decodes_inline_data() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/models/gemini-2.5-flash-preview-tts:generateContent"))
            .and(body_partial_json(json!({
                "generationConfig": {
                    "responseModalities": ["AUDIO"],
                    "speechConfig": {"voiceConfig": {"prebuiltVoiceConfig": {"voiceName": "Kore"}}}
                }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{"content": {"parts": [
                    {"inlineData": {"mimeType": "audio/wav", "data": BASE64.encode(b"PCMDATA")}}
                ]}}]
            })))
            .mount(&server)
            .await;

        let client = GeminiClient::new("g-key", Some(server.uri()));
        let audio = client
            .generate_audio("gemini-2.5-flash-preview-tts", "say this", "Kore")
            .await
            .unwrap();
        assert_eq!(audio, b"PCMDATA");
    }

    #[tokio::test]
    async fn test_generate_audio_without_inline_data_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{"content": {"parts": [{"text": "not audio"}]}}]
            })))
            .mount(&server)
            .await;

        let client = GeminiClient::new("g-key", Some(server.uri()));
        let err = client
            .generate_audio("gemini-tts", "say this", "Kore")
            .await
            .unwrap_err();
        assert!(err.message().contains("no audio content"));
    }

    #[test]
    fn test_generate_url_trailing_slash() {
        let client = GeminiClient::new("k", Some("https://example.com/v1beta/".to_string()));
        assert_eq!(
            client.generate_url("gemini-2.0-flash"),
            "https://example.com/v1beta/models/gemini-2.0-flash:generateContent"
        );
    }
}
