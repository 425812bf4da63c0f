//! Capability traits for key wrapping and payload encryption.

use zeroize::Zeroizing;

use crate::{
    algorithm::{KeyCipherAlgorithm, StorageCipherAlgorithm},
    error::CipherError,
};

/// Wraps and unwraps a symmetric data key with device-bound key material.
///
/// The negotiator only ever sees this trait; concrete implementations are
/// picked by the registry.
pub trait KeyCipher: Send + Sync {
    /// Catalog variant this cipher implements.
    fn algorithm(&self) -> KeyCipherAlgorithm;

    /// Encrypt `key` so it can be persisted next to the data it protects.
    fn wrap(&self, key: &[u8]) -> Result<Vec<u8>, CipherError>;

    /// Recover a key previously produced by [`wrap`](Self::wrap).
    fn unwrap(&self, wrapped: &[u8]) -> Result<Zeroizing<Vec<u8>>, CipherError>;
}

/// Encrypts and decrypts entry payloads.
pub trait StorageCipher: Send + Sync {
    fn algorithm(&self) -> StorageCipherAlgorithm;

    /// Returns a self-contained blob (IV/nonce included) parseable by
    /// [`decrypt`](Self::decrypt).
    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, CipherError>;

    fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, CipherError>;
}
