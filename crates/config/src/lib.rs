//! Configuration loading and validation for keysafe.
//!
//! Config files: `keysafe.toml`, `keysafe.yaml`, or `keysafe.json`
//! Searched in `./` then `~/.config/keysafe/`.
//!
//! Supports `${ENV_VAR}` substitution in all string values and `KEYSAFE_*`
//! environment overrides.

pub mod env_subst;
pub mod loader;
pub mod schema;
pub mod validate;

pub use {
    loader::{
        apply_env_overrides, apply_env_overrides_with, config_dir, data_dir, load_config,
        load_discovered, load_or_default, save_config,
    },
    schema::{CiphersConfig, KeysafeConfig, LoggingConfig, PlatformConfig, StorageConfig},
    validate::{Diagnostic, Severity, ValidationResult},
};
