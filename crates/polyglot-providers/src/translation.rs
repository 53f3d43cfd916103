//! Translation service — text translation with ordered provider fallback.

use std::sync::Arc;
use std::time::Instant;

use polyglot_core::config::Config;
use polyglot_core::types::{Capability, ProviderId, TranslationResult};
use polyglot_core::{with_retry, MetricsRecorder, Result, RetryPolicy, ServiceError};
use tracing::warn;

use crate::gemini::{text_part, GeminiClient};
use crate::model_cache::ModelRegistryCache;
use crate::openai::OpenAiClient;
use crate::registry::{resolve_order, static_default_model};

const CAPABILITY: Capability = Capability::Translation;

const SYSTEM_PROMPT: &str =
    "You are a professional translator. Translate the user's text faithfully, \
     preserving tone and formatting. Return only the translation, with no \
     commentary or quotation marks around it.";

#[derive(Clone, Debug)]
pub struct TranslationRequest {
    pub text: String,
    /// Source language; detected by the model when absent.
    pub source_language: Option<String>,
    pub target_language: String,
    pub provider: String,
    pub model: Option<String>,
}

impl TranslationRequest {
    pub fn new(text: impl Into<String>, target_language: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            source_language: None,
            target_language: target_language.into(),
            provider: "auto".to_string(),
            model: None,
        }
    }
}

// ─────────────────────────────────────────────
// TranslationService
// ─────────────────────────────────────────────

pub struct TranslationService {
    gemini: Option<Arc<GeminiClient>>,
    openai: Option<Arc<OpenAiClient>>,
    registry: Option<Arc<ModelRegistryCache>>,
    metrics: Arc<MetricsRecorder>,
    policy: RetryPolicy,
}

impl TranslationService {
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

    pub async fn translate(&self, request: TranslationRequest) -> Result<TranslationResult> {
        if request.text.trim().is_empty() {
            return Err(ServiceError::validation("text to translate is empty"));
        }
        if request.target_language.trim().is_empty() {
            return Err(ServiceError::validation("target language is empty"));
        }

        let order = resolve_order(&request.provider, &self.configured_providers(), CAPABILITY);
        if order.is_empty() {
            return Err(ServiceError::config(
                "no providers configured for translation",
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
                    warn!(provider = %provider, error = %e, "translation provider failed");
                    self.metrics.record_fallback("translation");
                    last_error = Some(e.with_provider(provider.as_str()));
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            let attempted: Vec<&str> = order.iter().map(|p| p.as_str()).collect();
            ServiceError::service(format!(
                "translation failed on every provider: [{}]",
                attempted.join(", ")
            ))
        }))
    }

    fn user_prompt(request: &TranslationRequest) -> String {
        match &request.source_language {
            Some(source) => format!(
                "Translate the following text from {} into {}:\n\n{}",
                source, request.target_language, request.text
            ),
            None => format!(
                "Translate the following text into {}:\n\n{}",
                request.target_language, request.text
            ),
        }
    }

    async fn via_gemini(&self, request: &TranslationRequest) -> Result<TranslationResult> {
        let client = self
            .gemini
            .as_ref()
            .ok_or_else(|| ServiceError::config("gemini not configured"))?;
        let model = self.resolve_gemini_model(request.model.as_deref()).await;

        let prompt = format!("{SYSTEM_PROMPT}\n\n{}", Self::user_prompt(request));
        let parts = Arc::new(vec![text_part(prompt)]);

        let started = Instant::now();
        let text = with_retry(&self.policy, "translation.gemini", &self.metrics, || {
            let client = Arc::clone(client);
            let parts = Arc::clone(&parts);
            let model = model.clone();
            async move { client.generate_text(&model, &parts).await }
        })
        .await?;

        self.metrics
            .record_success("translation.gemini", started.elapsed(), text.chars().count());

        Ok(TranslationResult {
            text: text.trim().to_string(),
            model,
            source_language: request
                .source_language
                .clone()
                .unwrap_or_else(|| "auto".to_string()),
            target_language: request.target_language.clone(),
        })
    }

    async fn via_openai(&self, request: &TranslationRequest) -> Result<TranslationResult> {
        let client = self
            .openai
            .as_ref()
            .ok_or_else(|| ServiceError::config("openai not configured"))?;
        let model = request
            .model
            .clone()
            .unwrap_or_else(|| static_default_model(ProviderId::OpenAi, CAPABILITY).to_string());

        let user = Self::user_prompt(request);

        let started = Instant::now();
        let text = with_retry(&self.policy, "translation.openai", &self.metrics, || {
            let client = Arc::clone(client);
            let model = model.clone();
            let user = user.clone();
            async move { client.chat_text(&model, Some(SYSTEM_PROMPT), &user).await }
        })
        .await?;

        self.metrics
            .record_success("translation.openai", started.elapsed(), text.chars().count());

        Ok(TranslationResult {
            text: text.trim().to_string(),
            model,
            source_language: request
                .source_language
                .clone()
                .unwrap_or_else(|| "auto".to_string()),
            target_language: request.target_language.clone(),
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
                    self.metrics.record_fallback("translation.gemini");
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

    fn service(config: &Config) -> TranslationService {
        TranslationService::new(config, None, Arc::new(MetricsRecorder::new()))
    }

    #[tokio::test]
    async fn test_empty_text_is_validation_error() {
        let svc = service(&test_config(Some("http://127.0.0.1:1"), None));
        let err = svc
            .translate(TranslationRequest::new("   ", "French"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn test_empty_target_is_validation_error() {
        let svc = service(&test_config(Some("http://127.0.0.1:1"), None));
        let err = svc
            .translate(TranslationRequest::new("bonjour", ""))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn test_no_providers_is_configuration_error() {
        let svc = service(&Config::default());
        let err = svc
            .translate(TranslationRequest::new("bonjour", "English"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[tokio::test]
    async fn test_gemini_translation() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/models/gemini-2.0-flash:generateContent"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{"content": {"parts": [{"text": "  hello  "}]}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let svc = service(&test_config(Some(&server.uri()), None));
        let result = svc
            .translate(TranslationRequest::new("bonjour", "English"))
            .await
            .unwrap();
        assert_eq!(result.text, "hello");
        assert_eq!(result.source_language, "auto");
        assert_eq!(result.target_language, "English");
    }

    #[tokio::test]
    async fn test_explicit_openai_provider_with_source_language() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_partial_json(json!({"model": "gpt-4o-mini"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"content": "hola"}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let svc = service(&test_config(None, Some(&server.uri())));
        let mut req = TranslationRequest::new("hello", "Spanish");
        req.provider = "openai".to_string();
        req.source_language = Some("English".to_string());
        let result = svc.translate(req).await.unwrap();
        assert_eq!(result.text, "hola");
        assert_eq!(result.source_language, "English");
        assert_eq!(result.model, "gpt-4o-mini");
    }

    #[tokio::test]
    async fn test_fallback_preserves_last_provider_error() {
        let gemini = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("g down"))
            .mount(&gemini)
            .await;

        let openai = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
            .mount(&openai)
            .await;

        let svc = service(&test_config(Some(&gemini.uri()), Some(&openai.uri())));
        let err = svc
            .translate(TranslationRequest::new("bonjour", "English"))
            .await
            .unwrap_err();
        assert_eq!(err.provider(), Some("openai"));
        assert_eq!(err.kind(), ErrorKind::RateLimit);
    }
}
