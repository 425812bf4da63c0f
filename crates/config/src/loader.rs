use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::{env_subst::substitute_env, schema::KeysafeConfig};

/// Standard config file names, checked in order.
const CONFIG_FILENAMES: &[&str] = &[
    "keysafe.toml",
    "keysafe.yaml",
    "keysafe.yml",
    "keysafe.json",
];

/// Load config from the given path (any supported format).
pub fn load_config(path: &Path) -> anyhow::Result<KeysafeConfig> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", path.display()))?;
    let raw = substitute_env(&raw);
    parse_config(&raw, path)
}

/// Discover and load config from standard locations.
///
/// Search order:
/// 1. `./keysafe.{toml,yaml,yml,json}` (project-local)
/// 2. `~/.config/keysafe/keysafe.{toml,yaml,yml,json}` (user-global)
///
/// Returns `KeysafeConfig::default()` only when no file is found. A file that
/// exists but cannot be loaded is an error, never replaced by defaults.
pub fn load_discovered() -> anyhow::Result<KeysafeConfig> {
    load_or_default(find_config_file().as_deref())
}

/// Load `path` if given, otherwise return `KeysafeConfig::default()`.
pub fn load_or_default(path: Option<&Path>) -> anyhow::Result<KeysafeConfig> {
    match path {
        Some(path) => {
            debug!(path = %path.display(), "loading config");
            load_config(path)
        },
        None => {
            debug!("no config file found, using defaults");
            Ok(KeysafeConfig::default())
        },
    }
}

/// Find the first config file in standard locations.
pub(crate) fn find_config_file() -> Option<PathBuf> {
    for name in CONFIG_FILENAMES {
        let p = PathBuf::from(name);
        if p.exists() {
            return Some(p);
        }
    }

    let config_dir = config_dir()?;
    CONFIG_FILENAMES
        .iter()
        .map(|name| config_dir.join(name))
        .find(|p| p.exists())
}

/// Returns the user-global config directory (`~/.config/keysafe/`).
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "keysafe").map(|d| d.config_dir().to_path_buf())
}

/// Returns the user data directory holding settings and device keys.
///
/// Falls back to `./.keysafe` when no home directory can be determined.
pub fn data_dir() -> PathBuf {
    directories::ProjectDirs::from("", "", "keysafe")
        .map(|d| d.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".keysafe"))
}

/// Apply `KEYSAFE_*` environment overrides on top of a loaded config.
pub fn apply_env_overrides(config: &mut KeysafeConfig) {
    apply_env_overrides_with(config, |name| std::env::var(name).ok());
}

/// Apply overrides using a custom lookup function.
///
/// Recognised variables:
/// - `KEYSAFE_KEY_CIPHER_ALGORITHM`
/// - `KEYSAFE_STORAGE_CIPHER_ALGORITHM`
/// - `KEYSAFE_PLATFORM_VERSION` (ignored with a warning unless numeric)
/// - `KEYSAFE_LOG_LEVEL`
pub fn apply_env_overrides_with(
    config: &mut KeysafeConfig,
    lookup: impl Fn(&str) -> Option<String>,
) {
    if let Some(v) = lookup("KEYSAFE_KEY_CIPHER_ALGORITHM") {
        config.ciphers.key_cipher_algorithm = Some(v);
    }
    if let Some(v) = lookup("KEYSAFE_STORAGE_CIPHER_ALGORITHM") {
        config.ciphers.storage_cipher_algorithm = Some(v);
    }
    if let Some(v) = lookup("KEYSAFE_PLATFORM_VERSION") {
        match v.trim().parse::<u32>() {
            Ok(version) => config.platform.version = Some(version),
            Err(e) => warn!(value = %v, error = %e, "ignoring invalid KEYSAFE_PLATFORM_VERSION"),
        }
    }
    if let Some(v) = lookup("KEYSAFE_LOG_LEVEL") {
        config.logging.level = v;
    }
}

/// Serialize `config` to TOML and write it to `path`.
///
/// Creates parent directories if needed.
pub fn save_config(config: &KeysafeConfig, path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str =
        toml::to_string_pretty(config).map_err(|e| anyhow::anyhow!("serialize config: {e}"))?;
    std::fs::write(path, toml_str)?;
    debug!(path = %path.display(), "saved config");
    Ok(())
}

pub(crate) fn parse_config(raw: &str, path: &Path) -> anyhow::Result<KeysafeConfig> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match ext {
        "toml" => Ok(toml::from_str(raw)?),
        "yaml" | "yml" => Ok(serde_yaml::from_str(raw)?),
        "json" => Ok(serde_json::from_str(raw)?),
        _ => anyhow::bail!("unsupported config format: .{ext}"),
    }
}
