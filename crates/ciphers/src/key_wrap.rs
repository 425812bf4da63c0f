//! Data key wrapping and persistence for storage ciphers.
//!
//! Every storage cipher encrypts payloads with a random data key. The key is
//! wrapped by the paired [`KeyCipher`] and kept in the settings store under a
//! name derived from *both* algorithms, so the saved and current suites of a
//! migration never share (or overwrite) each other's data key.

use {
    base64::Engine,
    rand::RngCore,
    zeroize::{Zeroize, Zeroizing},
};

use crate::{
    algorithm::{Algorithm, StorageCipherAlgorithm},
    error::{CipherError, Result},
    settings::SettingsStore,
    traits::KeyCipher,
};

/// Prefix of the settings keys holding wrapped data keys.
pub const DATA_KEY_PREFIX: &str = "KeysafeDataKey";

/// Settings key for the data key of `storage` wrapped by `key_cipher`.
pub fn data_key_setting(key_cipher: &dyn KeyCipher, storage: StorageCipherAlgorithm) -> String {
    format!(
        "{DATA_KEY_PREFIX}.{}.{}",
        storage.identifier(),
        key_cipher.algorithm().identifier()
    )
}

/// Wrap `data_key` and encode it as base64.
pub fn wrap_data_key(key_cipher: &dyn KeyCipher, data_key: &[u8]) -> Result<String> {
    let wrapped = key_cipher.wrap(data_key)?;
    Ok(base64::engine::general_purpose::STANDARD.encode(wrapped))
}

/// Decode and unwrap a data key, checking it has `expected_len` bytes.
pub fn unwrap_data_key(
    key_cipher: &dyn KeyCipher,
    wrapped_b64: &str,
    expected_len: usize,
) -> Result<Zeroizing<Vec<u8>>> {
    let wrapped = base64::engine::general_purpose::STANDARD.decode(wrapped_b64)?;
    if wrapped.is_empty() {
        return Err(CipherError::Cipher("empty wrapped data key".to_string()));
    }

    let key = key_cipher.unwrap(&wrapped)?;
    if key.len() != expected_len {
        return Err(CipherError::Cipher(format!(
            "unwrapped data key has wrong length: {} (expected {expected_len})",
            key.len()
        )));
    }
    Ok(key)
}

/// Load the data key for `storage`, generating and persisting one if absent.
///
/// A stored key that cannot be unwrapped is an error, never silently
/// replaced: entries encrypted under it would become unreadable.
pub fn load_or_create_data_key(
    settings: &dyn SettingsStore,
    key_cipher: &dyn KeyCipher,
    storage: StorageCipherAlgorithm,
    len: usize,
) -> Result<Zeroizing<Vec<u8>>> {
    let setting = data_key_setting(key_cipher, storage);

    if let Some(wrapped) = settings.get_string(&setting)? {
        return unwrap_data_key(key_cipher, &wrapped, len);
    }

    let mut key = Zeroizing::new(vec![0u8; len]);
    rand::rng().fill_bytes(key.as_mut_slice());

    let mut wrapped = wrap_data_key(key_cipher, &key)?;
    settings.put_string(&setting, &wrapped)?;
    wrapped.zeroize();

    #[cfg(feature = "tracing")]
    tracing::info!(setting = %setting, "generated data key");

    Ok(key)
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{
            algorithm::KeyCipherAlgorithm, keystore::SoftwareKeystore,
            rsa_oaep::RsaOaepKeyCipher, rsa_pkcs1::RsaPkcs1KeyCipher, settings::InMemorySettings,
        },
    };

    #[test]
    fn round_trip() {
        let keystore = SoftwareKeystore::with_key_bits(1024);
        let cipher = RsaOaepKeyCipher::new(&keystore).unwrap();
        let data_key = [0xBB; 32];

        let wrapped = wrap_data_key(&cipher, &data_key).unwrap();
        let unwrapped = unwrap_data_key(&cipher, &wrapped, 32).unwrap();
        assert_eq!(unwrapped.as_slice(), &data_key);
    }

    #[test]
    fn wrong_length_fails() {
        let keystore = SoftwareKeystore::with_key_bits(1024);
        let cipher = RsaPkcs1KeyCipher::new(&keystore).unwrap();

        let wrapped = wrap_data_key(&cipher, &[0xBB; 16]).unwrap();
        assert!(matches!(
            unwrap_data_key(&cipher, &wrapped, 32),
            Err(CipherError::Cipher(_))
        ));
    }

    #[test]
    fn load_or_create_is_stable() {
        let keystore = SoftwareKeystore::with_key_bits(1024);
        let settings = InMemorySettings::new();
        let cipher = RsaOaepKeyCipher::new(&keystore).unwrap();

        let first = load_or_create_data_key(
            &settings,
            &cipher,
            StorageCipherAlgorithm::AesGcmNoPadding,
            32,
        )
        .unwrap();
        let second = load_or_create_data_key(
            &settings,
            &cipher,
            StorageCipherAlgorithm::AesGcmNoPadding,
            32,
        )
        .unwrap();
        assert_eq!(*first, *second);
        assert_eq!(settings.snapshot().len(), 1);
    }

    #[test]
    fn setting_name_covers_both_dimensions() {
        let keystore = SoftwareKeystore::with_key_bits(1024);
        let pkcs1 = RsaPkcs1KeyCipher::new(&keystore).unwrap();
        let oaep = RsaOaepKeyCipher::new(&keystore).unwrap();
        assert_eq!(pkcs1.algorithm(), KeyCipherAlgorithm::RsaEcbPkcs1Padding);

        let cbc_pkcs1 = data_key_setting(&pkcs1, StorageCipherAlgorithm::AesCbcPkcs7Padding);
        let cbc_oaep = data_key_setting(&oaep, StorageCipherAlgorithm::AesCbcPkcs7Padding);
        assert_ne!(cbc_pkcs1, cbc_oaep);
        assert_eq!(
            cbc_pkcs1,
            "KeysafeDataKey.AES_CBC_PKCS7Padding.RSA_ECB_PKCS1Padding"
        );
    }

    #[test]
    fn undecryptable_stored_key_is_not_replaced() {
        let keystore = SoftwareKeystore::with_key_bits(1024);
        let settings = InMemorySettings::new();
        let cipher = RsaOaepKeyCipher::new(&keystore).unwrap();
        let setting = data_key_setting(&cipher, StorageCipherAlgorithm::AesGcmNoPadding);
        settings.put_string(&setting, "AAAA").unwrap();

        let result = load_or_create_data_key(
            &settings,
            &cipher,
            StorageCipherAlgorithm::AesGcmNoPadding,
            32,
        );
        assert!(result.is_err());
        assert_eq!(settings.get_string(&setting).unwrap().as_deref(), Some("AAAA"));
    }
}
