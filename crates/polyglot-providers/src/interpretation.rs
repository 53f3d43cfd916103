//! Interpretation service — rephrasing text in a named style or under a
//! free-form instruction, with ordered provider fallback.

use std::sync::Arc;
use std::time::Instant;

use polyglot_core::config::Config;
use polyglot_core::types::{Capability, InterpretationResult, ProviderId};
use polyglot_core::{with_retry, MetricsRecorder, Result, RetryPolicy, ServiceError};
use tracing::warn;

use crate::gemini::{text_part, GeminiClient};
use crate::model_cache::ModelRegistryCache;
use crate::openai::OpenAiClient;
use crate::registry::{resolve_order, static_default_model};

const CAPABILITY: Capability = Capability::Interpretation;

/// Named rewriting styles accepted when no free-form instruction is given.
pub const STYLES: &[&str] = &["formal", "casual", "simple", "summary"];

const SYSTEM_PROMPT: &str =
    "You rewrite text as instructed. Preserve the meaning and the original \
     language of the text. Return only the rewritten text, with no commentary.";

fn style_instruction(style: &str) -> Option<&'static str> {
    match style {
        "formal" => Some("Rewrite the text in a formal, professional register."),
        "casual" => Some("Rewrite the text in a relaxed, conversational tone."),
        "simple" => Some("Rewrite the text in plain language that is easy to follow."),
        "summary" => Some("Condense the text to its essential points."),
        _ => None,
    }
}

#[derive(Clone, Debug)]
pub struct InterpretationRequest {
    pub text: String,
    /// One of [`STYLES`]; ignored when `instruction` is set.
    pub style: String,
    /// Free-form rewriting instruction overriding the named style.
    pub instruction: Option<String>,
    pub provider: String,
    pub model: Option<String>,
}

impl InterpretationRequest {
    pub fn new(text: impl Into<String>, style: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            style: style.into(),
            instruction: None,
            provider: "auto".to_string(),
            model: None,
        }
    }
}

// ─────────────────────────────────────────────
// InterpretationService
// ─────────────────────────────────────────────

pub struct InterpretationService {
    gemini: Option<Arc<GeminiClient>>,
    openai: Option<Arc<OpenAiClient>>,
    registry: Option<Arc<ModelRegistryCache>>,
    metrics: Arc<MetricsRecorder>,
    policy: RetryPolicy,
}

impl InterpretationService {
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

    pub async fn interpret(&self, request: InterpretationRequest) -> Result<InterpretationResult> {
        if request.text.trim().is_empty() {
            return Err(ServiceError::validation("text to interpret is empty"));
        }
        let instruction = match &request.instruction {
            Some(custom) if !custom.trim().is_empty() => custom.clone(),
            _ => style_instruction(&request.style)
                .ok_or_else(|| {
                    ServiceError::validation(format!(
                        "unknown style '{}', expected one of: {}",
                        request.style,
                        STYLES.join(", ")
                    ))
                })?
                .to_string(),
        };

        let order = resolve_order(&request.provider, &self.configured_providers(), CAPABILITY);
        if order.is_empty() {
            return Err(ServiceError::config(
                "no providers configured for interpretation",
            ));
        }

        let mut last_error: Option<ServiceError> = None;
        for provider in &order {
            let attempt = match provider {
                ProviderId::Gemini => self.via_gemini(&request, &instruction).await,
                ProviderId::OpenAi => self.via_openai(&request, &instruction).await,
            };
            match attempt {
                Ok(result) => return Ok(result),
                Err(e) => {
                    warn!(provider = %provider, error = %e, "interpretation provider failed");
                    self.metrics.record_fallback("interpretation");
                    last_error = Some(e.with_provider(provider.as_str()));
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            let attempted: Vec<&str> = order.iter().map(|p| p.as_str()).collect();
            ServiceError::service(format!(
                "interpretation failed on every provider: [{}]",
                attempted.join(", ")
            ))
        }))
    }

    async fn via_gemini(
        &self,
        request: &InterpretationRequest,
        instruction: &str,
    ) -> Result<InterpretationResult> {
        let client = self
            .gemini
            .as_ref()
            .ok_or_else(|| ServiceError::config("gemini not configured"))?;
        let model = self.resolve_gemini_model(request.model.as_deref()).await;

        let prompt = format!("{SYSTEM_PROMPT}\n\n{instruction}\n\n{}", request.text);
        let parts = Arc::new(vec![text_part(prompt)]);

        let started = Instant::now();
        let text = with_retry(&self.policy, "interpretation.gemini", &self.metrics, || {
            let client = Arc::clone(client);
            let parts = Arc::clone(&parts);
            let model = model.clone();
            async move { client.generate_text(&model, &parts).await }
        })
        .await?;

        self.metrics.record_success(
            "interpretation.gemini",
            started.elapsed(),
            text.chars().count(),
        );

        Ok(InterpretationResult {
            text: text.trim().to_string(),
            model,
            style: request.style.clone(),
        })
    }

    async fn via_openai(
        &self,
        request: &InterpretationRequest,
        instruction: &str,
    ) -> Result<InterpretationResult> {
        let client = self
            .openai
            .as_ref()
            .ok_or_else(|| ServiceError::config("openai not configured"))?;
        let model = request
            .model
            .clone()
            .unwrap_or_else(|| static_default_model(ProviderId::OpenAi, CAPABILITY).to_string());

        let user = format!("{instruction}\n\n{}", request.text);

        let started = Instant::now();
        let text = with_retry(&self.policy, "interpretation.openai", &self.metrics, || {
            let client = Arc::clone(client);
            let model = model.clone();
            let user = user.clone();
            async move { client.chat_text(&model, Some(SYSTEM_PROMPT), &user).await }
        })
        .await?;

        self.metrics.record_success(
            "interpretation.openai",
            started.elapsed(),
            text.chars().count(),
        );

        Ok(InterpretationResult {
            text: text.trim().to_string(),
            model,
            style: request.style.clone(),
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
                    self.metrics.record_fallback("interpretation.gemini");
                    model.to_string()
                }
            },
        }
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
