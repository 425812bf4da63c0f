//! Cipher negotiation and migration detection for an encrypted key-value store.
//!
//! Each store is protected by an [`AlgorithmPair`]: a [`KeyCipher`] that wraps
//! the data key with a device-held RSA key, and a [`StorageCipher`] that
//! encrypts entry values with that data key. [`CipherNegotiator`] decides which
//! pair wrote the existing data and which pair should be used from now on, and
//! reports whether the store has to be re-encrypted in between.

pub mod aes_cbc;
pub mod aes_gcm;
pub mod algorithm;
pub mod context;
pub mod error;
pub mod key_wrap;
pub mod keystore;
pub mod negotiator;
pub mod options;
pub mod platform;
pub mod registry;
pub mod rsa_oaep;
pub mod rsa_pkcs1;
pub mod settings;
pub mod traits;

pub use {
    algorithm::{Algorithm, AlgorithmKind, AlgorithmPair, KeyCipherAlgorithm, StorageCipherAlgorithm},
    context::CipherContext,
    error::{CipherError, Result},
    keystore::{DeviceKeystore, FileKeystore, SoftwareKeystore},
    negotiator::{CipherNegotiator, CipherSuite, FallbackPolicy, NegotiationResult, NegotiationState},
    options::{CipherOptions, KEY_CIPHER_ALGORITHM, STORAGE_CIPHER_ALGORITHM},
    platform::PlatformVersion,
    settings::{FileSettings, InMemorySettings, SettingsStore},
    traits::{KeyCipher, StorageCipher},
};
