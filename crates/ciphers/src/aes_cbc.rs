//! Legacy storage cipher: AES-128-CBC with PKCS#7 padding.
//!
//! Unauthenticated. Only selected when explicitly requested or when reading a
//! store written on a baseline platform.

use std::sync::Arc;

use {
    aes::{
        Aes128,
        cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit, block_padding::Pkcs7},
    },
    rand::RngCore,
    zeroize::Zeroizing,
};

use crate::{
    algorithm::StorageCipherAlgorithm, error::CipherError, key_wrap, settings::SettingsStore,
    traits::{KeyCipher, StorageCipher},
};

type Aes128CbcEnc = cbc::Encryptor<Aes128>;
type Aes128CbcDec = cbc::Decryptor<Aes128>;

/// Data key length (AES-128).
pub const KEY_LEN: usize = 16;

/// CBC initialisation vector size, one AES block.
const IV_LEN: usize = 16;

/// AES/CBC/PKCS7Padding storage cipher.
///
/// Encrypted blob layout: `[iv: 16 bytes][ciphertext: padded to 16-byte blocks]`.
pub struct AesCbcStorageCipher {
    key: Zeroizing<Vec<u8>>,
}

impl AesCbcStorageCipher {
    /// Load (or create) the data key wrapped by `key_cipher`.
    pub fn new(
        settings: &dyn SettingsStore,
        key_cipher: Arc<dyn KeyCipher>,
    ) -> Result<Self, CipherError> {
        let key = key_wrap::load_or_create_data_key(
            settings,
            key_cipher.as_ref(),
            StorageCipherAlgorithm::AesCbcPkcs7Padding,
            KEY_LEN,
        )?;
        Ok(Self { key })
    }
}

impl StorageCipher for AesCbcStorageCipher {
    fn algorithm(&self) -> StorageCipherAlgorithm {
        StorageCipherAlgorithm::AesCbcPkcs7Padding
    }

    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, CipherError> {
        let mut iv = [0u8; IV_LEN];
        rand::rng().fill_bytes(&mut iv);

        let ciphertext = Aes128CbcEnc::new_from_slices(&self.key, &iv)
            .map_err(|e| CipherError::Cipher(format!("invalid AES-CBC key: {e}")))?
            .encrypt_padded_vec_mut::<Pkcs7>(plaintext);

        let mut result = Vec::with_capacity(IV_LEN + ciphertext.len());
        result.extend_from_slice(&iv);
        result.extend_from_slice(&ciphertext);
        Ok(result)
    }

    fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, CipherError> {
        // IV plus at least one padded block.
        if ciphertext.len() < IV_LEN * 2 || ciphertext.len() % IV_LEN != 0 {
            return Err(CipherError::Cipher("ciphertext has invalid length".to_string()));
        }

        let (iv, ct) = ciphertext.split_at(IV_LEN);
        Aes128CbcDec::new_from_slices(&self.key, iv)
            .map_err(|e| CipherError::Cipher(format!("invalid AES-CBC key: {e}")))?
            .decrypt_padded_vec_mut::<Pkcs7>(ct)
            .map_err(|_| CipherError::Cipher("bad padding".to_string()))
    }
}
