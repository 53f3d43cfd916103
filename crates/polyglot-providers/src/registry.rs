//! Provider registry — static specs, default try-orders, and the static model
//! fallback table.
//!
//! Each `ProviderSpec` describes how to identify one backend: env var for the
//! key, display name for logs. The per-capability default orders decide which
//! provider is tried first when the caller asks for `"auto"`; the static model
//! table is the degrade path used when the dynamic registry cache is not
//! available (its result is always flagged as a fallback).

use polyglot_core::types::{Capability, ProviderId};
use tracing::warn;

// ─────────────────────────────────────────────
// ProviderSpec
// ─────────────────────────────────────────────

/// Static specification describing one provider backend.
#[derive(Clone, Copy, Debug)]
pub struct ProviderSpec {
    pub id: ProviderId,
    /// Human-readable name for logs.
    pub display_name: &'static str,
    /// Environment variable for the API key.
    pub env_key: &'static str,
}

/// All supported providers, in registry order.
pub static PROVIDERS: &[ProviderSpec] = &[
    ProviderSpec {
        id: ProviderId::Gemini,
        display_name: "Gemini",
        env_key: "GEMINI_API_KEY",
    },
    ProviderSpec {
        id: ProviderId::OpenAi,
        display_name: "OpenAI",
        env_key: "OPENAI_API_KEY",
    },
];

/// Find a provider spec by id.
pub fn spec_for(id: ProviderId) -> &'static ProviderSpec {
    PROVIDERS
        .iter()
        .find(|s| s.id == id)
        .expect("every ProviderId has a spec")
}

// ─────────────────────────────────────────────
// Default try-orders
// ─────────────────────────────────────────────

/// Fixed, capability-specific provider order used for `"auto"` requests.
///
/// Gemini leads everywhere: it is the registry-backed backend with dynamic
/// model selection; OpenAI is the interchangeable fallback.
pub fn default_order(capability: Capability) -> &'static [ProviderId] {
    match capability {
        Capability::Transcription
        | Capability::Translation
        | Capability::TextToSpeech
        | Capability::Interpretation => &[ProviderId::Gemini, ProviderId::OpenAi],
    }
}

/// Compute the provider try-order for one request.
///
/// - `"auto"` → the capability default order filtered to configured providers.
/// - An explicit configured provider → that provider first, then the remaining
///   configured providers in default order.
/// - An explicit but unconfigured or unknown name → logged warning, full
///   filtered default order (never an error).
///
/// The result never contains a provider absent from `configured`.
pub fn resolve_order(
    requested: &str,
    configured: &[ProviderId],
    capability: Capability,
) -> Vec<ProviderId> {
    let defaults: Vec<ProviderId> = default_order(capability)
        .iter()
        .copied()
        .filter(|p| configured.contains(p))
        .collect();

    if requested.eq_ignore_ascii_case("auto") {
        return defaults;
    }

    match ProviderId::parse(requested) {
        Some(p) if configured.contains(&p) => {
            let mut order = vec![p];
            order.extend(defaults.into_iter().filter(|d| *d != p));
            order
        }
        Some(p) => {
            warn!(
                provider = %p,
                capability = %capability,
                "requested provider not configured, using default order"
            );
            defaults
        }
        None => {
            warn!(
                provider = requested,
                capability = %capability,
                "unknown provider requested, using default order"
            );
            defaults
        }
    }
}

// ─────────────────────────────────────────────
// Static model table (degrade path)
// ─────────────────────────────────────────────

/// Hardcoded default when even the static table cannot be consulted.
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";

/// Gemini family-name substrings, best first. The model selector walks this
/// list when a preferred model is unavailable.
pub static GEMINI_FAMILY_PREFERENCE: &[&str] = &[
    "gemini-2.5-flash",
    "gemini-2.5-pro",
    "gemini-2.0-flash",
    "gemini-1.5-flash",
    "gemini-1.5-pro",
    "gemini-pro",
];

/// Static model ids per provider × capability.
///
/// Used when the registry cache is unavailable; callers must treat the result
/// as a fallback, never as "preferred model available".
pub fn static_default_model(provider: ProviderId, capability: Capability) -> &'static str {
    match (provider, capability) {
        (ProviderId::Gemini, Capability::Transcription) => "gemini-2.0-flash",
        (ProviderId::Gemini, Capability::Translation) => "gemini-2.0-flash",
        (ProviderId::Gemini, Capability::TextToSpeech) => "gemini-2.5-flash-preview-tts",
        (ProviderId::Gemini, Capability::Interpretation) => "gemini-2.0-flash",
        (ProviderId::OpenAi, Capability::Transcription) => "whisper-1",
        (ProviderId::OpenAi, Capability::Translation) => "gpt-4o-mini",
        (ProviderId::OpenAi, Capability::TextToSpeech) => "tts-1",
        (ProviderId::OpenAi, Capability::Interpretation) => "gpt-4o-mini",
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const BOTH: &[ProviderId] = &[ProviderId::Gemini, ProviderId::OpenAi];

    #[test]
    fn test_auto_uses_default_order() {
        let order = resolve_order("auto", BOTH, Capability::Translation);
        assert_eq!(order, vec![ProviderId::Gemini, ProviderId::OpenAi]);
    }

    #[test]
    fn test_auto_filters_unconfigured() {
        let order = resolve_order("auto", &[ProviderId::OpenAi], Capability::Transcription);
        assert_eq!(order, vec![ProviderId::OpenAi]);
    }

    #[test]
    fn test_explicit_provider_goes_first() {
        let order = resolve_order("openai", BOTH, Capability::Translation);
        assert_eq!(order, vec![ProviderId::OpenAi, ProviderId::Gemini]);
    }

    #[test]
    fn test_explicit_unconfigured_falls_back_to_defaults() {
        let order = resolve_order("openai", &[ProviderId::Gemini], Capability::Translation);
        assert_eq!(order, vec![ProviderId::Gemini]);
    }

    #[test]
    fn test_unknown_provider_falls_back_to_defaults() {
        let order = resolve_order("anthropic", BOTH, Capability::TextToSpeech);
        assert_eq!(order, vec![ProviderId::Gemini, ProviderId::OpenAi]);
    }

    #[test]
    fn test_no_configured_providers_yields_empty_order() {
        let order = resolve_order("auto", &[], Capability::Interpretation);
        assert!(order.is_empty());
    }

    #[test]
    fn test_all_providers_have_specs() {
        assert_eq!(spec_for(ProviderId::Gemini).display_name, "Gemini");
        assert_eq!(spec_for(ProviderId::OpenAi).env_key, "OPENAI_API_KEY");
    }

    #[test]
    fn test_static_table_covers_every_pair() {
        for provider in [ProviderId::Gemini, ProviderId::OpenAi] {
            for capability in [
                Capability::Transcription,
                Capability::Translation,
                Capability::TextToSpeech,
                Capability::Interpretation,
            ] {
                assert!(!static_default_model(provider, capability).is_empty());
            }
        }
    }

    #[test]
    fn test_family_preference_is_best_first() {
        assert!(GEMINI_FAMILY_PREFERENCE[0].contains("2.5"));
        assert_eq!(*GEMINI_FAMILY_PREFERENCE.last().unwrap(), "gemini-pro");
    }
}
