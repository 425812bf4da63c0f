//! Algorithm variants for the two negotiated dimensions.
//!
//! A store is protected by a *key cipher* (wraps the symmetric data key with
//! device-bound key material) and a *storage cipher* (encrypts entry payloads
//! with the unwrapped data key). Each dimension has a legacy member available
//! everywhere and a modern member gated on [`PlatformVersion::MODERN_CIPHERS`].

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{
    error::{CipherError, Result},
    platform::PlatformVersion,
    registry::{self, AlgorithmDescriptor},
};

/// The two independent negotiation dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlgorithmKind {
    KeyCipher,
    StorageCipher,
}

impl fmt::Display for AlgorithmKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::KeyCipher => write!(f, "key cipher"),
            Self::StorageCipher => write!(f, "storage cipher"),
        }
    }
}

/// Algorithm used to wrap the data key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyCipherAlgorithm {
    #[serde(rename = "RSA_ECB_PKCS1Padding")]
    RsaEcbPkcs1Padding,
    #[serde(rename = "RSA_ECB_OAEPwithSHA_256andMGF1Padding")]
    RsaEcbOaepWithSha256AndMgf1Padding,
}

/// Algorithm used to encrypt entry payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StorageCipherAlgorithm {
    #[serde(rename = "AES_CBC_PKCS7Padding")]
    AesCbcPkcs7Padding,
    #[serde(rename = "AES_GCM_NoPadding")]
    AesGcmNoPadding,
}

/// Behaviour shared by both algorithm enums.
///
/// Identity, gating and lookup all come from the static catalog in
/// [`registry`]; implementors only point at their descriptor.
pub trait Algorithm: Copy + Eq + fmt::Debug + Send + Sync + 'static {
    /// Dimension this algorithm belongs to.
    const KIND: AlgorithmKind;

    /// Variant chosen when nothing is persisted or requested.
    const DEFAULT: Self;

    /// Every variant, weakest first.
    const ALL: &'static [Self];

    fn descriptor(self) -> &'static AlgorithmDescriptor<Self>;

    /// Tag persisted in settings and accepted in options.
    fn identifier(self) -> &'static str {
        self.descriptor().identifier
    }

    fn min_version(self) -> PlatformVersion {
        self.descriptor().min_version
    }

    /// `min_version <= platform`.
    fn is_available(self, platform: PlatformVersion) -> bool {
        self.min_version() <= platform
    }

    /// Look up a variant by its stored tag.
    fn resolve(identifier: &str) -> Result<Self> {
        registry::resolve(identifier)
    }
}

impl fmt::Display for KeyCipherAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.identifier())
    }
}

impl fmt::Display for StorageCipherAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.identifier())
    }
}

impl FromStr for KeyCipherAlgorithm {
    type Err = CipherError;

    fn from_str(s: &str) -> Result<Self> {
        Self::resolve(s)
    }
}

impl FromStr for StorageCipherAlgorithm {
    type Err = CipherError;

    fn from_str(s: &str) -> Result<Self> {
        Self::resolve(s)
    }
}

/// One complete encryption scheme: a key cipher plus a storage cipher.
///
/// Two pairs are equal iff both components are equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AlgorithmPair {
    pub key: KeyCipherAlgorithm,
    pub storage: StorageCipherAlgorithm,
}

impl AlgorithmPair {
    /// The strongest pair, used when nothing is persisted or requested.
    pub const DEFAULT: Self = Self {
        key: KeyCipherAlgorithm::DEFAULT,
        storage: StorageCipherAlgorithm::DEFAULT,
    };

    /// The pair available on every platform.
    pub const LEGACY: Self = Self {
        key: KeyCipherAlgorithm::RsaEcbPkcs1Padding,
        storage: StorageCipherAlgorithm::AesCbcPkcs7Padding,
    };

    pub const fn new(key: KeyCipherAlgorithm, storage: StorageCipherAlgorithm) -> Self {
        Self { key, storage }
    }

    /// Resolve a pair from two stored tags.
    pub fn resolve(key: &str, storage: &str) -> Result<Self> {
        Ok(Self {
            key: KeyCipherAlgorithm::resolve(key)?,
            storage: StorageCipherAlgorithm::resolve(storage)?,
        })
    }

    /// Whether both components can be used on `platform`.
    pub fn is_available(self, platform: PlatformVersion) -> bool {
        self.key.is_available(platform) && self.storage.is_available(platform)
    }
}

impl Default for AlgorithmPair {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Display for AlgorithmPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.key, self.storage)
    }
}
