//! Polyglot core — error taxonomy, metrics, retry executor, and configuration.
//!
//! This crate holds the leaf components of the capability layer: everything a
//! provider adapter needs before it can talk to the network. The provider
//! clients, the model registry cache, and the capability services live in
//! `polyglot-providers`.

pub mod config;
pub mod error;
pub mod metrics;
pub mod retry;
pub mod types;

pub use error::{ErrorKind, Result, ServiceError};
pub use metrics::{MetricsRecorder, OperationStats};
pub use retry::{with_retry, RetryPolicy};
pub use types::{
    AudioFormat, Capability, InterpretationResult, ProviderId, SpeechResult, TranscriptionResult,
    TranslationResult,
};
