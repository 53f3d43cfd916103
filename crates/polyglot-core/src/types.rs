//! Shared capability and result types.
//!
//! A `Capability` is one category of AI task; a `ProviderId` names one of the
//! interchangeable vendor backends. Each capability service returns a typed
//! result carrying the text or audio plus the concrete model that produced it.

use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────
// Capability
// ─────────────────────────────────────────────

/// A category of AI task handled by this layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Transcription,
    Translation,
    TextToSpeech,
    Interpretation,
}

impl Capability {
    /// Stable name used in metrics keys, logs, and fallback reasons.
    pub fn as_str(self) -> &'static str {
        match self {
            Capability::Transcription => "transcription",
            Capability::Translation => "translation",
            Capability::TextToSpeech => "tts",
            Capability::Interpretation => "interpretation",
        }
    }

    /// API methods a registry model must support to serve this capability.
    ///
    /// Static mapping, fixed at compile time. All four capabilities ride on
    /// `generateContent` against the Gemini registry; the TTS special-casing
    /// happens in model selection, not here.
    pub fn required_methods(self) -> &'static [&'static str] {
        match self {
            Capability::Transcription
            | Capability::Translation
            | Capability::TextToSpeech
            | Capability::Interpretation => &["generateContent"],
        }
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─────────────────────────────────────────────
// ProviderId
// ─────────────────────────────────────────────

/// One of the configured vendor backends.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderId {
    Gemini,
    OpenAi,
}

impl ProviderId {
    pub fn as_str(self) -> &'static str {
        match self {
            ProviderId::Gemini => "gemini",
            ProviderId::OpenAi => "openai",
        }
    }

    /// Parse a user-supplied provider name. Case-insensitive; returns `None`
    /// for unknown names (callers fall back to the default order, they do not
    /// error).
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "gemini" | "google" => Some(ProviderId::Gemini),
            "openai" => Some(ProviderId::OpenAi),
            _ => None,
        }
    }
}

impl std::fmt::Display for ProviderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─────────────────────────────────────────────
// Capability results
// ─────────────────────────────────────────────

/// Output of a transcription request.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct TranscriptionResult {
    pub text: String,
    /// Concrete model id that produced the text.
    pub model: String,
    /// Language hint echoed back, if the caller supplied one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

/// Output of a translation request.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct TranslationResult {
    pub text: String,
    pub model: String,
    /// Source language, or `"auto"` when detected by the model.
    pub source_language: String,
    pub target_language: String,
}

/// Output of an interpretation (rephrase) request.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct InterpretationResult {
    pub text: String,
    pub model: String,
    pub style: String,
}

/// Output audio format of a speech synthesis request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioFormat {
    /// 16-bit PCM WAV (Gemini native output).
    Wav,
    /// MP3 (OpenAI default output).
    Mp3,
}

/// Output of a text-to-speech request.
#[derive(Clone, Debug, PartialEq)]
pub struct SpeechResult {
    pub audio: Vec<u8>,
    pub model: String,
    pub format: AudioFormat,
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
