//! Configuration schema for the capability layer.
//!
//! Hierarchy: `Config` → `ProvidersConfig`, `RegistryConfig`, `RetrySettings`.
//!
//! JSON on disk uses **camelCase** keys; Rust uses snake_case.
//! We use `#[serde(rename_all = "camelCase")]` to handle the conversion.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::retry::RetryPolicy;

// ─────────────────────────────────────────────
// Root Config
// ─────────────────────────────────────────────

/// Root configuration — loaded from `~/.polyglot/config.json` + env vars.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    pub providers: ProvidersConfig,
    pub registry: RegistryConfig,
    pub retry: RetrySettings,
}

// ─────────────────────────────────────────────
// Providers
// ─────────────────────────────────────────────

/// Credentials for the supported vendor backends.
///
/// A provider with an empty `api_key` is treated as absent: it never appears
/// in a computed provider order and no client is built for it.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProvidersConfig {
    pub gemini: ProviderConfig,
    pub openai: ProviderConfig,
}

/// Configuration for a single provider (API key, base URL).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProviderConfig {
    /// API key for authentication.
    #[serde(default)]
    pub api_key: String,
    /// Custom API base URL (overrides the provider default).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,
}

impl ProviderConfig {
    /// Whether this provider has a configured API key.
    pub fn is_configured(&self) -> bool {
        !self.api_key.is_empty()
    }
}

// ─────────────────────────────────────────────
// Model registry
// ─────────────────────────────────────────────

/// Settings for the dynamic model registry cache.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RegistryConfig {
    /// Endpoint publishing the model list.
    pub models_url: String,
    /// On-disk snapshot location. `~` expands to the home directory.
    pub cache_path: String,
    /// Hours a snapshot stays valid in both tiers.
    pub cache_ttl_hours: u64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            models_url: "https://generativelanguage.googleapis.com/v1beta/models".to_string(),
            cache_path: "~/.polyglot/model_registry.json".to_string(),
            cache_ttl_hours: 24,
        }
    }
}

// ─────────────────────────────────────────────
// Retry
// ─────────────────────────────────────────────

/// Retry knobs shared by every capability service.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RetrySettings {
    /// Additional attempts after the first.
    pub max_retries: u32,
    /// Delay before the first re-attempt, in milliseconds.
    pub initial_delay_ms: u64,
    /// Multiplier applied after each generic-backoff sleep.
    pub backoff_factor: f64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_delay_ms: 1000,
            backoff_factor: 2.0,
        }
    }
}

impl RetrySettings {
    /// Convert to the executor's policy value.
    pub fn to_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            initial_delay: Duration::from_millis(self.initial_delay_ms),
            backoff_factor: self.backoff_factor,
        }
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
