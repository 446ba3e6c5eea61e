//! # BSL Config
//!
//! The `.bsl-language-server.json` file model: rule settings, engine tuning,
//! discovery by walking up the directory tree, and JSON / YAML loading.

mod config;
mod error;
mod loader;

pub use config::{EngineConfig, ServerConfig, DEFAULT_QUEUE_CAPACITY};
pub use error::{ConfigError, Result};
pub use loader::{find_config, load_config, load_config_from_str, CONFIG_FILES};
