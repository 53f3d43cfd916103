//! Polyglot provider layer — HTTP clients, model registry, and the four
//! capability services.
//!
//! # Architecture
//!
//! - [`gemini::GeminiClient`] / [`openai::OpenAiClient`] — direct HTTP clients
//! - [`classify`] — maps HTTP statuses and transport failures to error kinds
//! - [`registry`] — provider specs, fallback order, static model defaults
//! - [`model_cache::ModelRegistryCache`] — two-tier cached Gemini model list
//! - [`cleanup`] — transcript artifact scrubbing
//! - [`transcription`] / [`translation`] / [`tts`] / [`interpretation`] — the
//!   capability services with retry and ordered provider fallback

pub mod classify;
pub mod cleanup;
pub mod gemini;
pub mod interpretation;
pub mod model_cache;
pub mod openai;
pub mod registry;
pub mod transcription;
pub mod translation;
pub mod tts;

// Re-export main types for convenience
pub use cleanup::{clean_transcript, TranscriptCleaner};
pub use gemini::GeminiClient;
pub use interpretation::{InterpretationRequest, InterpretationService, STYLES};
pub use model_cache::{ModelChoice, ModelRegistryCache, ModelRegistrySnapshot, RegistryModel};
pub use openai::OpenAiClient;
pub use registry::{default_order, resolve_order, ProviderSpec, PROVIDERS};
pub use transcription::{mime_for_extension, TranscriptionRequest, TranscriptionService};
pub use translation::{TranslationRequest, TranslationService};
pub use tts::{SynthesisRequest, SynthesisService};
