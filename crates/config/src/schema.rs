//! Config schema types (ciphers, platform, storage, logging).

use std::path::PathBuf;

use {
    keysafe_ciphers::{
        CipherNegotiator, CipherOptions, FallbackPolicy, KEY_CIPHER_ALGORITHM, PlatformVersion,
        STORAGE_CIPHER_ALGORITHM, keystore::DEFAULT_KEY_BITS,
    },
    serde::{Deserialize, Serialize},
};

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct KeysafeConfig {
    pub ciphers: CiphersConfig,
    pub platform: PlatformConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

impl KeysafeConfig {
    /// Negotiator for the configured platform and fallback policy.
    pub fn negotiator(&self) -> CipherNegotiator {
        CipherNegotiator::new(self.platform.resolved()).with_fallback(self.ciphers.fallback)
    }
}

/// Requested cipher algorithms.
///
/// Identifiers are passed through as-is; unknown ones fall back to the
/// dimension default at negotiation time.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CiphersConfig {
    /// e.g. "RSA_ECB_OAEPwithSHA_256andMGF1Padding"
    pub key_cipher_algorithm: Option<String>,
    /// e.g. "AES_GCM_NoPadding"
    pub storage_cipher_algorithm: Option<String>,
    /// What to pick when a requested algorithm is unavailable on the platform.
    pub fallback: FallbackPolicy,
}

impl CiphersConfig {
    pub fn to_options(&self) -> CipherOptions {
        let mut options = CipherOptions::new();
        if let Some(ref key) = self.key_cipher_algorithm {
            options.insert(KEY_CIPHER_ALGORITHM, key.as_str());
        }
        if let Some(ref storage) = self.storage_cipher_algorithm {
            options.insert(STORAGE_CIPHER_ALGORITHM, storage.as_str());
        }
        options
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatformConfig {
    /// Platform release to negotiate against. Defaults to the first release
    /// with modern ciphers.
    pub version: Option<u32>,
}

impl PlatformConfig {
    pub fn resolved(&self) -> PlatformVersion {
        self.version.map(PlatformVersion::new).unwrap_or_default()
    }
}

/// Where the settings file and device keys live.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Settings JSON file. Defaults to `<data_dir>/settings.json`.
    pub settings_path: Option<PathBuf>,
    /// Directory of PEM device keys. Defaults to `<data_dir>/keys`.
    pub keystore_dir: Option<PathBuf>,
    /// RSA modulus size for newly generated device keys.
    pub key_bits: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            settings_path: None,
            keystore_dir: None,
            key_bits: DEFAULT_KEY_BITS,
        }
    }
}

impl StorageConfig {
    pub fn settings_path(&self) -> PathBuf {
        self.settings_path
            .clone()
            .unwrap_or_else(|| crate::loader::data_dir().join("settings.json"))
    }

    pub fn keystore_dir(&self) -> PathBuf {
        self.keystore_dir
            .clone()
            .unwrap_or_else(|| crate::loader::data_dir().join("keys"))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive, e.g. "info" or "keysafe_ciphers=debug".
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            json: false,
        }
    }
}
