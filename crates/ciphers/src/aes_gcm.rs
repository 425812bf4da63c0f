//! Modern storage cipher: AES-256-GCM.

use std::sync::Arc;

use {
    aes_gcm::{
        Aes256Gcm, Nonce,
        aead::{Aead, KeyInit},
    },
    rand::RngCore,
    zeroize::Zeroizing,
};

use crate::{
    algorithm::StorageCipherAlgorithm, error::CipherError, key_wrap, settings::SettingsStore,
    traits::{KeyCipher, StorageCipher},
};

/// Data key length (AES-256).
pub const KEY_LEN: usize = 32;

/// Nonce size for AES-GCM (12 bytes).
const NONCE_LEN: usize = 12;

/// GCM authentication tag size.
const TAG_LEN: usize = 16;

/// AES/GCM/NoPadding storage cipher.
///
/// Encrypted blob layout: `[nonce: 12 bytes][ciphertext + GCM tag: N + 16 bytes]`.
pub struct AesGcmStorageCipher {
    key: Zeroizing<Vec<u8>>,
}

impl AesGcmStorageCipher {
    /// Load (or create) the data key wrapped by `key_cipher`.
    pub fn new(
        settings: &dyn SettingsStore,
        key_cipher: Arc<dyn KeyCipher>,
    ) -> Result<Self, CipherError> {
        let key = key_wrap::load_or_create_data_key(
            settings,
            key_cipher.as_ref(),
            StorageCipherAlgorithm::AesGcmNoPadding,
            KEY_LEN,
        )?;
        Ok(Self { key })
    }

    fn cipher(&self) -> Result<Aes256Gcm, CipherError> {
        Aes256Gcm::new_from_slice(&self.key)
            .map_err(|e| CipherError::Cipher(format!("invalid AES-GCM key: {e}")))
    }
}

impl StorageCipher for AesGcmStorageCipher {
    fn algorithm(&self) -> StorageCipherAlgorithm {
        StorageCipherAlgorithm::AesGcmNoPadding
    }

    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, CipherError> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher()?
            .encrypt(nonce, plaintext)
            .map_err(|e| CipherError::Cipher(e.to_string()))?;

        let mut result = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        result.extend_from_slice(&nonce_bytes);
        result.extend_from_slice(&ciphertext);
        Ok(result)
    }

    fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, CipherError> {
        if ciphertext.len() < NONCE_LEN + TAG_LEN {
            return Err(CipherError::Cipher("ciphertext too short".to_string()));
        }

        let (nonce_bytes, ct) = ciphertext.split_at(NONCE_LEN);
        let nonce = Nonce::from_slice(nonce_bytes);

        self.cipher()?
            .decrypt(nonce, ct)
            .map_err(|e| CipherError::Cipher(e.to_string()))
    }
}
