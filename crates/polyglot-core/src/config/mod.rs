//! Configuration — schema and loader.

pub mod loader;
pub mod schema;

pub use loader::{expand_home, get_config_path, load_config};
pub use schema::{Config, ProviderConfig, ProvidersConfig, RegistryConfig, RetrySettings};
