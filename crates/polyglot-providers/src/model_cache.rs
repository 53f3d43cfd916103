//! Dynamically refreshed, cached model registry.
//!
//! Two independent tiers hold the provider's published model list: an
//! in-memory snapshot guarded by a TTL, and an on-disk JSON file guarded by
//! its own embedded `fetched_at`. A live fetch refreshes both; a failed fetch
//! degrades to a stale disk snapshot if one exists, else to an empty snapshot.
//! `get_available_models` never fails.
//!
//! The disk file is written via temp-file-then-rename so concurrent worker
//! processes can never observe a torn write.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use polyglot_core::config::{expand_home, Config};
use polyglot_core::types::Capability;
use polyglot_core::{MetricsRecorder, Result, ServiceError};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::registry::{DEFAULT_GEMINI_MODEL, GEMINI_FAMILY_PREFERENCE};

/// Timeout for the registry list call.
const FETCH_TIMEOUT_SECS: u64 = 30;

// ─────────────────────────────────────────────
// Snapshot types
// ─────────────────────────────────────────────

/// One entry in the provider's published model list.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct RegistryModel {
    /// Fully-qualified name as published (e.g. `"models/gemini-2.0-flash"`).
    pub name: String,
    #[serde(rename = "supportedGenerationMethods", default)]
    pub supported_generation_methods: Vec<String>,
}

impl RegistryModel {
    /// Model id without the `models/` prefix.
    pub fn short_id(&self) -> &str {
        self.name.strip_prefix("models/").unwrap_or(&self.name)
    }

    fn supports(&self, required: &[&str]) -> bool {
        required
            .iter()
            .all(|m| self.supported_generation_methods.iter().any(|s| s == m))
    }
}

/// A fetched model list plus its freshness metadata.
///
/// Valid only while `now - fetched_at < ttl`; an expired snapshot is returned
/// only as last resort after a failed live fetch.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ModelRegistrySnapshot {
    pub models: Vec<RegistryModel>,
    pub fetched_at: DateTime<Utc>,
    pub total_models: usize,
}

impl ModelRegistrySnapshot {
    pub fn empty() -> Self {
        Self {
            models: Vec::new(),
            fetched_at: Utc::now(),
            total_models: 0,
        }
    }

    fn is_fresh(&self, ttl: Duration) -> bool {
        Utc::now() - self.fetched_at < ttl
    }
}

/// Wire shape of the registry list endpoint.
#[derive(Debug, Deserialize)]
struct ModelListResponse {
    #[serde(default)]
    models: Vec<RegistryModel>,
}

/// Outcome of model selection for a capability.
#[derive(Clone, Debug, PartialEq)]
pub struct ModelChoice {
    pub model_id: String,
    /// Whether the chosen model substitutes for something better.
    pub is_fallback: bool,
    /// Human-readable selection reason, for logs and observability.
    pub reason: String,
}

// ─────────────────────────────────────────────
// ModelRegistryCache
// ─────────────────────────────────────────────

/// Process-wide cache of the provider's model registry.
///
/// Shared between services via `Arc`; the in-memory tier sits behind an async
/// mutex so concurrent refreshes converge on the same overwritten state.
pub struct ModelRegistryCache {
    client: reqwest::Client,
    models_url: String,
    api_key: String,
    cache_path: PathBuf,
    ttl: Duration,
    memory: Mutex<Option<ModelRegistrySnapshot>>,
    metrics: Arc<MetricsRecorder>,
}

impl std::fmt::Debug for ModelRegistryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelRegistryCache")
            .field("models_url", &self.models_url)
            .field("cache_path", &self.cache_path)
            .finish()
    }
}

impl ModelRegistryCache {
    pub fn new(
        models_url: impl Into<String>,
        api_key: impl Into<String>,
        cache_path: PathBuf,
        ttl_hours: u64,
        metrics: Arc<MetricsRecorder>,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(FETCH_TIMEOUT_SECS))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            models_url: models_url.into(),
            api_key: api_key.into(),
            cache_path,
            ttl: Duration::hours(ttl_hours as i64),
            memory: Mutex::new(None),
            metrics,
        }
    }

    /// Build a cache from config. `None` when Gemini has no credentials (the
    /// registry endpoint is keyed by the Gemini API key).
    pub fn from_config(config: &Config, metrics: Arc<MetricsRecorder>) -> Option<Self> {
        if !config.providers.gemini.is_configured() {
            return None;
        }
        Some(Self::new(
            config.registry.models_url.clone(),
            config.providers.gemini.api_key.clone(),
            expand_home(&config.registry.cache_path),
            config.registry.cache_ttl_hours,
            metrics,
        ))
    }

    // ── Public contract ──

    /// Return the current snapshot, refreshing as needed.
    ///
    /// Tier order: fresh memory (unless forced) → fresh disk → live fetch
    /// (writes both tiers) → stale disk → empty snapshot. Never fails.
    pub async fn get_available_models(&self, force_refresh: bool) -> ModelRegistrySnapshot {
        let mut memory = self.memory.lock().await;

        if !force_refresh {
            if let Some(snapshot) = memory.as_ref() {
                if snapshot.is_fresh(self.ttl) {
                    debug!(models = snapshot.total_models, "registry served from memory");
                    return snapshot.clone();
                }
            }

            if let Some(snapshot) = self.read_disk().await {
                if snapshot.is_fresh(self.ttl) {
                    debug!(models = snapshot.total_models, "registry served from disk");
                    *memory = Some(snapshot.clone());
                    return snapshot;
                }
            }
        }

        match self.fetch_models().await {
            Ok(models) => {
                let snapshot = ModelRegistrySnapshot {
                    total_models: models.len(),
                    models,
                    fetched_at: Utc::now(),
                };
                info!(models = snapshot.total_models, "model registry refreshed");
                self.write_disk(&snapshot).await;
                *memory = Some(snapshot.clone());
                snapshot
            }
            Err(e) => {
                warn!(error = %e, "registry fetch failed");
                self.metrics.record_error("model_registry.fetch");
                if let Some(stale) = self.read_disk().await {
                    warn!(
                        fetched_at = %stale.fetched_at,
                        "serving stale registry snapshot from disk"
                    );
                    return stale;
                }
                ModelRegistrySnapshot::empty()
            }
        }
    }

    /// Resolve the best concrete model id for a capability.
    pub async fn get_best_model_for_capability(
        &self,
        capability: Capability,
        preferred: Option<&str>,
    ) -> ModelChoice {
        let snapshot = self.get_available_models(false).await;
        select_model(&snapshot, capability, preferred)
    }

    /// Record a model substitution for observability. No persistence.
    pub fn register_fallback(&self, original: &str, chosen: &str, reason: &str) {
        warn!(original, chosen, reason, "model fallback");
        self.metrics.record_fallback("model_registry");
    }

    /// Drop the in-memory tier and delete the on-disk snapshot.
    pub async fn clear_cache(&self) {
        *self.memory.lock().await = None;
        match tokio::fs::remove_file(&self.cache_path).await {
            Ok(()) => debug!(path = %self.cache_path.display(), "registry cache file removed"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(error = %e, "failed to remove registry cache file"),
        }
    }

    // ── Tiers ──

    async fn fetch_models(&self) -> Result<Vec<RegistryModel>> {
        let response = self
            .client
            .get(&self.models_url)
            .query(&[("pageSize", "1000")])
            .header("x-goog-api-key", &self.api_key)
            .send()
            .await
            .map_err(|e| ServiceError::provider_error(format!("registry fetch: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ServiceError::provider_error(format!(
                "registry fetch returned {status}: {body}"
            )));
        }

        let list: ModelListResponse = response
            .json()
            .await
            .map_err(|e| ServiceError::provider_error(format!("registry parse: {e}")))?;
        Ok(list.models)
    }

    async fn read_disk(&self) -> Option<ModelRegistrySnapshot> {
        let content = match tokio::fs::read_to_string(&self.cache_path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(error = %e, "failed to read registry cache file");
                return None;
            }
        };
        match serde_json::from_str(&content) {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                warn!(error = %e, "registry cache file is corrupt, ignoring");
                None
            }
        }
    }

    /// Overwrite the disk tier wholesale. Write-to-temp-then-rename keeps the
    /// file valid under concurrent writers. Failures are logged, not raised.
    ///
    /// The temp-file dance is blocking filesystem work, so it runs on the
    /// blocking pool rather than stalling the runtime.
    async fn write_disk(&self, snapshot: &ModelRegistrySnapshot) {
        let parent = match self.cache_path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        if let Err(e) = tokio::fs::create_dir_all(&parent).await {
            warn!(error = %e, "failed to create registry cache directory");
            return;
        }

        let json = match serde_json::to_vec_pretty(snapshot) {
            Ok(j) => j,
            Err(e) => {
                warn!(error = %e, "failed to serialize registry snapshot");
                return;
            }
        };

        let cache_path = self.cache_path.clone();
        let result = tokio::task::spawn_blocking(move || -> std::io::Result<()> {
            let mut tmp = tempfile::NamedTempFile::new_in(&parent)?;
            tmp.write_all(&json)?;
            tmp.flush()?;
            tmp.persist(&cache_path)?;
            Ok(())
        })
        .await;

        match result {
            Ok(Ok(())) => debug!(path = %self.cache_path.display(), "registry snapshot written"),
            Ok(Err(e)) => warn!(error = %e, "failed to write registry snapshot"),
            Err(e) => warn!(error = %e, "registry snapshot write task failed"),
        }
    }
}

// ─────────────────────────────────────────────
// Selection algorithm
// ─────────────────────────────────────────────

/// Pick the best model in `snapshot` for `capability`.
///
/// In order: exact preferred match → tts-substring special case → preferred
/// family walk over compatible models → first compatible → emergency first
/// model → hardcoded default when the snapshot is empty.
pub fn select_model(
    snapshot: &ModelRegistrySnapshot,
    capability: Capability,
    preferred: Option<&str>,
) -> ModelChoice {
    let required = capability.required_methods();

    // 1. Preferred model, present and capable.
    if let Some(wanted) = preferred {
        if let Some(model) = snapshot
            .models
            .iter()
            .find(|m| m.short_id() == wanted && m.supports(required))
        {
            return ModelChoice {
                model_id: model.short_id().to_string(),
                is_fallback: false,
                reason: "preferred model available".to_string(),
            };
        }
    }

    // 2. TTS rides on dedicated models; any id containing "tts" wins. Only a
    //    fallback if the caller asked for something else.
    if capability == Capability::TextToSpeech {
        if let Some(model) = snapshot.models.iter().find(|m| m.short_id().contains("tts")) {
            return ModelChoice {
                model_id: model.short_id().to_string(),
                is_fallback: preferred.is_some(),
                reason: format!("tts-capable model '{}' selected", model.short_id()),
            };
        }
    }

    // 3. Everything supporting the required methods.
    let compatible: Vec<&RegistryModel> = snapshot
        .models
        .iter()
        .filter(|m| m.supports(required))
        .collect();

    // 4. Walk the family preference list, best first.
    for family in GEMINI_FAMILY_PREFERENCE {
        if let Some(model) = compatible.iter().find(|m| m.short_id().contains(family)) {
            return ModelChoice {
                model_id: model.short_id().to_string(),
                is_fallback: true,
                reason: format!("selected from {family} family"),
            };
        }
    }

    // 5. Any compatible model.
    if let Some(model) = compatible.first() {
        return ModelChoice {
            model_id: model.short_id().to_string(),
            is_fallback: true,
            reason: "first compatible model selected".to_string(),
        };
    }

    // 6. Nothing compatible: take the first model regardless.
    if let Some(model) = snapshot.models.first() {
        return ModelChoice {
            model_id: model.short_id().to_string(),
            is_fallback: true,
            reason: "emergency fallback - no compatible models found".to_string(),
        };
    }

    // 7. Empty snapshot.
    ModelChoice {
        model_id: DEFAULT_GEMINI_MODEL.to_string(),
        is_fallback: true,
        reason: "no models available".to_string(),
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
