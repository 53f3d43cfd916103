//! Config loader — reads `~/.polyglot/config.json` and merges env vars.
//!
//! # Loading precedence
//! 1. Defaults (from `Config::default()`)
//! 2. JSON file at `~/.polyglot/config.json`
//! 3. Environment variables (override JSON)
//!
//! The loader never fails: a missing or unparsable file degrades to defaults
//! with a logged warning, so a service can always be constructed (it will then
//! reject calls with a configuration error if no provider has credentials).

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use super::schema::{Config, ProviderConfig};

/// Default config file path.
pub fn get_config_path() -> PathBuf {
    get_data_path().join("config.json")
}

/// The Polyglot data directory (e.g. `~/.polyglot/`).
pub fn get_data_path() -> PathBuf {
    let home = home_dir().unwrap_or_else(|| PathBuf::from("."));
    home.join(".polyglot")
}

/// Load configuration from the default path (or an explicit one) + env vars.
pub fn load_config(path: Option<&Path>) -> Config {
    let config_path = path.map(PathBuf::from).unwrap_or_else(get_config_path);
    load_config_from_path(&config_path)
}

fn load_config_from_path(path: &Path) -> Config {
    if !path.exists() {
        info!("No config file found at {}, using defaults", path.display());
        return apply_env_overrides(Config::default());
    }

    debug!("Loading config from {}", path.display());

    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            warn!("Failed to read config file {}: {}", path.display(), e);
            return apply_env_overrides(Config::default());
        }
    };

    let config: Config = match serde_json::from_str(&content) {
        Ok(c) => c,
        Err(e) => {
            warn!("Failed to parse config JSON: {}", e);
            return apply_env_overrides(Config::default());
        }
    };

    apply_env_overrides(config)
}

/// Apply environment variable overrides on top of a loaded config.
///
/// Supported overrides:
/// - `POLYGLOT_GEMINI_API_KEY` / `GEMINI_API_KEY` → `providers.gemini.api_key`
/// - `POLYGLOT_OPENAI_API_KEY` / `OPENAI_API_KEY` → `providers.openai.api_key`
/// - `POLYGLOT_GEMINI_API_BASE` / `POLYGLOT_OPENAI_API_BASE` → base URLs
/// - `POLYGLOT_MODELS_URL` → `registry.models_url`
/// - `POLYGLOT_REGISTRY_CACHE` → `registry.cache_path`
///
/// The `POLYGLOT_`-prefixed variable wins over the bare vendor variable.
fn apply_env_overrides(mut config: Config) -> Config {
    apply_provider_env(&mut config.providers.gemini, "GEMINI");
    apply_provider_env(&mut config.providers.openai, "OPENAI");

    if let Ok(val) = std::env::var("POLYGLOT_MODELS_URL") {
        config.registry.models_url = val;
    }
    if let Ok(val) = std::env::var("POLYGLOT_REGISTRY_CACHE") {
        config.registry.cache_path = val;
    }

    config
}

fn apply_provider_env(provider: &mut ProviderConfig, name: &str) {
    if let Ok(val) = std::env::var(format!("{name}_API_KEY")) {
        provider.api_key = val;
    }
    if let Ok(val) = std::env::var(format!("POLYGLOT_{name}_API_KEY")) {
        provider.api_key = val;
    }
    if let Ok(val) = std::env::var(format!("POLYGLOT_{name}_API_BASE")) {
        provider.api_base = Some(val);
    }
}

/// Expand `~` to the home directory in a path string.
pub fn expand_home(path: &str) -> PathBuf {
    if path.starts_with("~/") || path == "~" {
        let home = home_dir().unwrap_or_else(|| PathBuf::from("."));
        home.join(path.trim_start_matches("~/"))
    } else {
        PathBuf::from(path)
    }
}

fn home_dir() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(PathBuf::from)
        .or_else(|| std::env::var("USERPROFILE").ok().map(PathBuf::from))
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
