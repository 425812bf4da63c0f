//! Device keystore: source of the RSA key material used by key ciphers.

use std::{
    collections::HashMap,
    path::PathBuf,
    sync::{
        RwLock,
        atomic::{AtomicBool, Ordering},
    },
};

use {
    rand_core::OsRng,
    rsa::{
        RsaPrivateKey,
        pkcs8::{DecodePrivateKey, EncodePrivateKey, LineEnding},
    },
};

use crate::{
    error::{CipherError, Result},
    settings::write_private_file,
};

/// Modulus size for newly generated device keys.
pub const DEFAULT_KEY_BITS: usize = 2048;

/// Provider of device-bound private keys.
///
/// `private_key` returns the key stored under `alias`, generating it on first
/// use. Calls may block on hardware or disk.
pub trait DeviceKeystore: Send + Sync {
    fn private_key(&self, alias: &str) -> Result<RsaPrivateKey>;
}

fn generate(bits: usize) -> Result<RsaPrivateKey> {
    RsaPrivateKey::new(&mut OsRng, bits)
        .map_err(|e| CipherError::Keystore(format!("RSA key generation failed: {e}")))
}

// ── Software ────────────────────────────────────────────────────────────────

/// In-process keystore. Keys live only as long as the instance.
pub struct SoftwareKeystore {
    bits: usize,
    keys: RwLock<HashMap<String, RsaPrivateKey>>,
    revoked: AtomicBool,
}

impl SoftwareKeystore {
    pub fn new() -> Self {
        Self::with_key_bits(DEFAULT_KEY_BITS)
    }

    /// Keystore generating `bits`-sized keys. Smaller sizes keep tests fast.
    pub fn with_key_bits(bits: usize) -> Self {
        Self {
            bits,
            keys: RwLock::new(HashMap::new()),
            revoked: AtomicBool::new(false),
        }
    }

    /// Drop every key and refuse further requests, as when the platform
    /// invalidates hardware-backed material.
    pub fn revoke_all(&self) {
        self.revoked.store(true, Ordering::SeqCst);
        self.keys
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }
}

impl Default for SoftwareKeystore {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceKeystore for SoftwareKeystore {
    fn private_key(&self, alias: &str) -> Result<RsaPrivateKey> {
        if self.revoked.load(Ordering::SeqCst) {
            return Err(CipherError::Keystore(format!("key {alias} has been revoked")));
        }

        if let Some(key) = self
            .keys
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(alias)
        {
            return Ok(key.clone());
        }

        let mut keys = self.keys.write().unwrap_or_else(|e| e.into_inner());
        if let Some(key) = keys.get(alias) {
            return Ok(key.clone());
        }
        let key = generate(self.bits)?;
        keys.insert(alias.to_string(), key.clone());

        #[cfg(feature = "tracing")]
        tracing::debug!(alias, bits = self.bits, "generated device key");

        Ok(key)
    }
}

// ── File ────────────────────────────────────────────────────────────────────

/// Keystore persisting each key as PKCS#8 PEM.
///
/// Directory layout:
/// ```text
/// keys/
///   {alias}.pem
/// ```
pub struct FileKeystore {
    dir: PathBuf,
    bits: usize,
    lock: RwLock<()>,
}

impl FileKeystore {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        Self::with_key_bits(dir, DEFAULT_KEY_BITS)
    }

    pub fn with_key_bits(dir: impl Into<PathBuf>, bits: usize) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .map_err(|e| CipherError::Keystore(format!("create {}: {e}", dir.display())))?;
        Ok(Self {
            dir,
            bits,
            lock: RwLock::new(()),
        })
    }

    fn key_path(&self, alias: &str) -> PathBuf {
        self.dir.join(format!("{alias}.pem"))
    }
}

impl DeviceKeystore for FileKeystore {
    fn private_key(&self, alias: &str) -> Result<RsaPrivateKey> {
        let _guard = self.lock.write().unwrap_or_else(|e| e.into_inner());
        let path = self.key_path(alias);

        if path.exists() {
            let pem = std::fs::read_to_string(&path)
                .map_err(|e| CipherError::Keystore(format!("read {}: {e}", path.display())))?;
            return RsaPrivateKey::from_pkcs8_pem(&pem)
                .map_err(|e| CipherError::Keystore(format!("parse {}: {e}", path.display())));
        }

        let key = generate(self.bits)?;
        let pem = key
            .to_pkcs8_pem(LineEnding::LF)
            .map_err(|e| CipherError::Keystore(format!("encode key {alias}: {e}")))?;
        write_private_file(&path, pem.as_bytes())
            .map_err(|e| CipherError::Keystore(format!("write {}: {e}", path.display())))?;

        #[cfg(feature = "tracing")]
        tracing::info!(alias, path = %path.display(), "generated device key");

        Ok(key)
    }
}
