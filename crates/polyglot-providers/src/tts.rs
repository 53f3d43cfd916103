//! Speech synthesis service — text to audio with ordered provider fallback.
//!
//! Gemini publishes WAV/PCM audio through a `generateContent` response
//! modality; OpenAI returns MP3 from `/audio/speech`. The result carries the
//! format so callers can name the file correctly.

use std::sync::Arc;
use std::time::Instant;

use polyglot_core::config::Config;
use polyglot_core::types::{AudioFormat, Capability, ProviderId, SpeechResult};
use polyglot_core::{with_retry, MetricsRecorder, Result, RetryPolicy, ServiceError};
use tracing::warn;

use crate::gemini::GeminiClient;
use crate::model_cache::ModelRegistryCache;
use crate::openai::OpenAiClient;
use crate::registry::{resolve_order, static_default_model};

const CAPABILITY: Capability = Capability::TextToSpeech;

/// Hard cap on input length; everything beyond it is rejected up front rather
/// than truncated silently by a provider.
const MAX_INPUT_CHARS: usize = 5000;

const DEFAULT_GEMINI_VOICE: &str = "Kore";
const DEFAULT_OPENAI_VOICE: &str = "alloy";

#[derive(Clone, Debug)]
pub struct SynthesisRequest {
    pub text: String,
    /// Provider-specific voice name; each provider has its own default.
    pub voice: Option<String>,
    pub provider: String,
    pub model: Option<String>,
}

impl SynthesisRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            voice: None,
            provider: "auto".to_string(),
            model: None,
        }
    }
}

// ─────────────────────────────────────────────
// SynthesisService
// ─────────────────────────────────────────────

pub struct SynthesisService {
    gemini: Option<Arc<GeminiClient>>,
    openai: Option<Arc<OpenAiClient>>,
    registry: Option<Arc<ModelRegistryCache>>,
    metrics: Arc<MetricsRecorder>,
    policy: RetryPolicy,
}

impl SynthesisService {
    pub fn new(
        config: &Config,
        registry: Option<Arc<ModelRegistryCache>>,
        metrics: Arc<MetricsRecorder>,
    ) -> Self {
        let gemini = config.providers.gemini.is_configured().then(|| {
            Arc::new(GeminiClient::new(
                config.providers.gemini.api_key.clone(),
                config.providers.gemini.api_base.clone(),
            ))
        });
        let openai = config.providers.openai.is_configured().then(|| {
            Arc::new(OpenAiClient::new(
                config.providers.openai.api_key.clone(),
                config.providers.openai.api_base.clone(),
            ))
        });

        Self {
            gemini,
            openai,
            registry,
            metrics,
            policy: config.retry.to_policy(),
        }
    }

    pub fn configured_providers(&self) -> Vec<ProviderId> {
        let mut providers = Vec::new();
        if self.gemini.is_some() {
            providers.push(ProviderId::Gemini);
        }
        if self.openai.is_some() {
            providers.push(ProviderId::OpenAi);
        }
        providers
    }

    pub async fn synthesize(&self, request: SynthesisRequest) -> Result<SpeechResult> {
        if request.text.trim().is_empty() {
            return Err(ServiceError::validation("text to synthesize is empty"));
        }
        if request.text.chars().count() > MAX_INPUT_CHARS {
            return Err(ServiceError::validation(format!(
                "text to synthesize exceeds {MAX_INPUT_CHARS} characters"
            )));
        }

        let order = resolve_order(&request.provider, &self.configured_providers(), CAPABILITY);
        if order.is_empty() {
            return Err(ServiceError::config(
                "no providers configured for speech synthesis",
            ));
        }

        let mut last_error: Option<ServiceError> = None;
        for provider in &order {
            let attempt = match provider {
                ProviderId::Gemini => self.via_gemini(&request).await,
                ProviderId::OpenAi => self.via_openai(&request).await,
            };
            match attempt {
                Ok(result) => return Ok(result),
                Err(e) => {
                    warn!(provider = %provider, error = %e, "synthesis provider failed");
                    self.metrics.record_fallback("synthesis");
                    last_error = Some(e.with_provider(provider.as_str()));
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            let attempted: Vec<&str> = order.iter().map(|p| p.as_str()).collect();
            ServiceError::service(format!(
                "speech synthesis failed on every provider: [{}]",
                attempted.join(", ")
            ))
        }))
    }

    async fn via_gemini(&self, request: &SynthesisRequest) -> Result<SpeechResult> {
        let client = self
            .gemini
            .as_ref()
            .ok_or_else(|| ServiceError::config("gemini not configured"))?;
        let model = self.resolve_gemini_model(request.model.as_deref()).await;
        let voice = request
            .voice
            .clone()
            .unwrap_or_else(|| DEFAULT_GEMINI_VOICE.to_string());

        let started = Instant::now();
        let audio = with_retry(&self.policy, "synthesis.gemini", &self.metrics, || {
            let client = Arc::clone(client);
            let model = model.clone();
            let text = request.text.clone();
            let voice = voice.clone();
            async move { client.generate_audio(&model, &text, &voice).await }
        })
        .await?;

        self.metrics.record_success(
            "synthesis.gemini",
            started.elapsed(),
            request.text.chars().count(),
        );

        Ok(SpeechResult {
            audio,
            model,
            format: AudioFormat::Wav,
        })
    }

    async fn via_openai(&self, request: &SynthesisRequest) -> Result<SpeechResult> {
        let client = self
            .openai
            .as_ref()
            .ok_or_else(|| ServiceError::config("openai not configured"))?;
        let model = request
            .model
            .clone()
            .unwrap_or_else(|| static_default_model(ProviderId::OpenAi, CAPABILITY).to_string());
        let voice = request
            .voice
            .clone()
            .unwrap_or_else(|| DEFAULT_OPENAI_VOICE.to_string());

        let started = Instant::now();
        let audio = with_retry(&self.policy, "synthesis.openai", &self.metrics, || {
            let client = Arc::clone(client);
            let model = model.clone();
            let text = request.text.clone();
            let voice = voice.clone();
            async move { client.speech(&model, &text, &voice).await }
        })
        .await?;

        self.metrics.record_success(
            "synthesis.openai",
            started.elapsed(),
            request.text.chars().count(),
        );

        Ok(SpeechResult {
            audio,
            model,
            format: AudioFormat::Mp3,
        })
    }

    async fn resolve_gemini_model(&self, preferred: Option<&str>) -> String {
        match &self.registry {
            Some(registry) => {
                let choice = registry
                    .get_best_model_for_capability(CAPABILITY, preferred)
                    .await;
                if choice.is_fallback {
                    registry.register_fallback(
                        preferred.unwrap_or("auto"),
                        &choice.model_id,
                        &choice.reason,
                    );
                }
                choice.model_id
            }
            None => match preferred {
                Some(model) => model.to_string(),
                None => {
                    let model = static_default_model(ProviderId::Gemini, CAPABILITY);
                    warn!(model, "model registry unavailable, using static fallback model");
                    self.metrics.record_fallback("synthesis.gemini");
                    model.to_string()
                }
            },
        }
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::STANDARD as BASE64;
    use base64::Engine;
    use polyglot_core::ErrorKind;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(gemini_base: Option<&str>, openai_base: Option<&str>) -> Config {
        let mut config = Config::default();
        if let Some(base) = gemini_base {
            config.providers.gemini.api_key = "g-key".to_string();
            config.providers.gemini.api_base = Some(base.to_string());
        }
        if let Some(base) = openai_base {
            config.providers.openai.api_key = "o-key".to_string();
            config.providers.openai.api_base = Some(base.to_string());
        }
        config.retry.initial_delay_ms = 1;
        config
    }

    fn service(config: &Config) -> SynthesisService {
        SynthesisService::new(config, None, Arc::new(MetricsRecorder::new()))
    }

    #[tokio::test]
    async fn test_empty_text_is_validation_error() {
        let svc = service(&test_config(Some("http://127.0.0.1:1"), None));
        let err = svc
            .synthesize(SynthesisRequest::new(""))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn test_oversized_text_is_validation_error() {
        let svc = service(&test_config(Some("http://127.0.0.1:1"), None));
        let err = svc
            .synthesize(SynthesisRequest::new("x".repeat(MAX_INPUT_CHARS + 1)))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn test_no_providers_is_configuration_error() {
        let svc = service(&Config::default());
        let err = svc
            .synthesize(SynthesisRequest::new("hello"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[tokio::test]
    async fn test_gemini_synthesis_defaults() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/models/gemini-2.5-flash-preview-tts:generateContent"))
            .and(body_partial_json(json!({
                "generationConfig": {
                    "speechConfig": {"voiceConfig": {"prebuiltVoiceConfig": {"voiceName": "Kore"}}}
                }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{"content": {"parts": [
                    {"inlineData": {"mimeType": "audio/wav", "data": BASE64.encode(b"WAVDATA")}}
                ]}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let svc = service(&test_config(Some(&server.uri()), None));
        let result = svc.synthesize(SynthesisRequest::new("hello")).await.unwrap();
        assert_eq!(result.audio, b"WAVDATA");
        assert_eq!(result.format, AudioFormat::Wav);
        assert_eq!(result.model, "gemini-2.5-flash-preview-tts");
    }

    #[tokio::test]
    async fn test_openai_synthesis_custom_voice() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/audio/speech"))
            .and(body_partial_json(json!({"voice": "nova"})))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"MP3DATA".to_vec()))
            .expect(1)
            .mount(&server)
            .await;

        let svc = service(&test_config(None, Some(&server.uri())));
        let mut req = SynthesisRequest::new("hello");
        req.provider = "openai".to_string();
        req.voice = Some("nova".to_string());
        let result = svc.synthesize(req).await.unwrap();
        assert_eq!(result.audio, b"MP3DATA");
        assert_eq!(result.format, AudioFormat::Mp3);
    }

    #[tokio::test]
    async fn test_falls_back_to_openai() {
        let gemini = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("down"))
            .mount(&gemini)
            .await;

        let openai = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/audio/speech"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"MP3DATA".to_vec()))
            .mount(&openai)
            .await;

        let svc = service(&test_config(Some(&gemini.uri()), Some(&openai.uri())));
        let result = svc.synthesize(SynthesisRequest::new("hello")).await.unwrap();
        assert_eq!(result.format, AudioFormat::Mp3);
    }

    #[tokio::test]
    async fn test_static_model_degrade_counts_as_fallback() {
        let gemini = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/models/gemini-2.5-flash-preview-tts:generateContent"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{"content": {"parts": [
                    {"inlineData": {"mimeType": "audio/wav", "data": BASE64.encode(b"WAV")}}
                ]}}]
            })))
            .mount(&gemini)
            .await;

        let metrics = Arc::new(MetricsRecorder::new());
        let svc = SynthesisService::new(
            &test_config(Some(&gemini.uri()), None),
            None,
            Arc::clone(&metrics),
        );
        svc.synthesize(SynthesisRequest::new("hello")).await.unwrap();

        assert_eq!(metrics.stats("synthesis.gemini").unwrap().fallback, 1);
    }
}
