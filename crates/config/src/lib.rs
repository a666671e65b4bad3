//! Configuration loading and validation.
//!
//! Config file: `mqttgram.toml`, searched in `./` then
//! `~/.config/mqttgram/`. Environment variables (see [`env`]) override any
//! value from the file.

pub mod env;
pub mod error;
pub mod loader;
pub mod schema;
pub mod validate;

pub use {
    error::{Error, Result},
    loader::{find_config_file, load, load_from_path},
    schema::{AlertsConfig, BridgeConfig, DeliveryConfig, MqttConfig, RateLimitConfig, TelegramConfig},
    validate::{Diagnostic, Severity, ValidationResult, validate},
};
