//! Transcription service — speech-to-text with ordered provider fallback.
//!
//! Gemini is tried first (registry-backed model selection, inline audio via
//! `generateContent`), then OpenAI Whisper. Gemini output passes through the
//! transcript cleanup pipeline because the models sometimes emit timestamps
//! and sound annotations despite instructions not to.

use std::sync::Arc;
use std::time::Instant;

use polyglot_core::config::Config;
use polyglot_core::types::{Capability, ProviderId, TranscriptionResult};
use polyglot_core::{with_retry, MetricsRecorder, Result, RetryPolicy, ServiceError};
use tracing::warn;

use crate::cleanup::TranscriptCleaner;
use crate::gemini::{audio_part, text_part, GeminiClient};
use crate::model_cache::ModelRegistryCache;
use crate::openai::OpenAiClient;
use crate::registry::{resolve_order, static_default_model};

const CAPABILITY: Capability = Capability::Transcription;

/// A transcription request. `provider` is `"auto"` or an explicit name;
/// `model` overrides registry-based selection.
#[derive(Clone, Debug)]
pub struct TranscriptionRequest {
    pub audio: Vec<u8>,
    /// MIME type of `audio`; defaults to `audio/wav`.
    pub mime_type: Option<String>,
    /// ISO language hint (e.g. `"en"`).
    pub language: Option<String>,
    pub provider: String,
    pub model: Option<String>,
}

impl TranscriptionRequest {
    pub fn new(audio: Vec<u8>) -> Self {
        Self {
            audio,
            mime_type: None,
            language: None,
            provider: "auto".to_string(),
            model: None,
        }
    }
}

/// Map a filename extension to the MIME type sent to providers.
pub fn mime_for_extension(filename: &str) -> Option<&'static str> {
    let lower = filename.to_lowercase();
    let ext = lower.rsplit('.').next()?;
    match ext {
        "ogg" | "oga" => Some("audio/ogg"),
        "opus" => Some("audio/opus"),
        "mp3" => Some("audio/mpeg"),
        "m4a" => Some("audio/mp4"),
        "wav" => Some("audio/wav"),
        "flac" => Some("audio/flac"),
        "aac" => Some("audio/aac"),
        "webm" => Some("audio/webm"),
        _ => None,
    }
}

// ─────────────────────────────────────────────
// TranscriptionService
// ─────────────────────────────────────────────

pub struct TranscriptionService {
    gemini: Option<Arc<GeminiClient>>,
    openai: Option<Arc<OpenAiClient>>,
    registry: Option<Arc<ModelRegistryCache>>,
    metrics: Arc<MetricsRecorder>,
    policy: RetryPolicy,
    cleaner: TranscriptCleaner,
}

impl TranscriptionService {
    /// Build from config. Providers without credentials are skipped; an empty
    /// provider set is allowed here and rejected per call.
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
            cleaner: TranscriptCleaner::new(),
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

    /// Transcribe audio, falling back across providers in computed order.
    pub async fn transcribe(&self, request: TranscriptionRequest) -> Result<TranscriptionResult> {
        if request.audio.is_empty() {
            return Err(ServiceError::validation("audio payload is empty"));
        }

        let order = resolve_order(&request.provider, &self.configured_providers(), CAPABILITY);
        if order.is_empty() {
            return Err(ServiceError::config(
                "no providers configured for transcription",
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
                    warn!(provider = %provider, error = %e, "transcription provider failed");
                    self.metrics.record_fallback("transcription");
                    last_error = Some(e.with_provider(provider.as_str()));
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            let attempted: Vec<&str> = order.iter().map(|p| p.as_str()).collect();
            ServiceError::service(format!(
                "transcription failed on every provider: [{}]",
                attempted.join(", ")
            ))
        }))
    }

    async fn via_gemini(&self, request: &TranscriptionRequest) -> Result<TranscriptionResult> {
        let client = self
            .gemini
            .as_ref()
            .ok_or_else(|| ServiceError::config("gemini not configured"))?;
        let model = self.resolve_gemini_model(request.model.as_deref()).await;

        let mime = request.mime_type.as_deref().unwrap_or("audio/wav");
        let mut prompt = String::from(
            "Transcribe this audio recording verbatim. Return only the spoken words, \
             without timestamps, speaker labels, or sound annotations.",
        );
        if let Some(language) = &request.language {
            prompt.push_str(&format!(" The audio is in {language}."));
        }
        let parts = Arc::new(vec![text_part(prompt), audio_part(&request.audio, mime)]);

        let started = Instant::now();
        let raw = with_retry(&self.policy, "transcription.gemini", &self.metrics, || {
            let client = Arc::clone(client);
            let parts = Arc::clone(&parts);
            let model = model.clone();
            async move { client.generate_text(&model, &parts).await }
        })
        .await?;

        let text = self.cleaner.clean(&raw);
        self.metrics
            .record_success("transcription.gemini", started.elapsed(), text.chars().count());

        Ok(TranscriptionResult {
            text,
            model,
            language: request.language.clone(),
        })
    }

    async fn via_openai(&self, request: &TranscriptionRequest) -> Result<TranscriptionResult> {
        let client = self
            .openai
            .as_ref()
            .ok_or_else(|| ServiceError::config("openai not configured"))?;
        let model = request
            .model
            .clone()
            .unwrap_or_else(|| static_default_model(ProviderId::OpenAi, CAPABILITY).to_string());

        // Whisper wants a file; spool the bytes into a scoped temp file that
        // is removed on every exit path, including retry-exhausted errors.
        let spool = tempfile::NamedTempFile::new()
            .map_err(|e| ServiceError::resource(format!("temp audio file: {e}")))?;
        tokio::fs::write(spool.path(), &request.audio)
            .await
            .map_err(|e| ServiceError::resource(format!("temp audio file: {e}")))?;
        let path = spool.path().to_path_buf();

        let started = Instant::now();
        let text = with_retry(&self.policy, "transcription.openai", &self.metrics, || {
            let client = Arc::clone(client);
            let model = model.clone();
            let path = path.clone();
            let language = request.language.clone();
            async move { client.transcribe_file(&model, &path, language.as_deref()).await }
        })
        .await?;

        self.metrics
            .record_success("transcription.openai", started.elapsed(), text.chars().count());

        Ok(TranscriptionResult {
            text,
            model,
            language: request.language.clone(),
        })
    }

    /// Registry-backed model resolution, degrading to the static table.
    ///
    /// An explicit model is passed to the registry as the preferred id so a
    /// substitution is still surfaced; with no registry at all the static
    /// default is used and explicitly counted as a fallback.
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
                    self.metrics.record_fallback("transcription.gemini");
                    model.to_string()
                }
            },
        }
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
