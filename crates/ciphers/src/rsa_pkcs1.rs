//! Legacy key cipher: RSA with PKCS#1 v1.5 padding.

use {
    rand_core::OsRng,
    rsa::{Pkcs1v15Encrypt, RsaPrivateKey, RsaPublicKey},
    zeroize::Zeroizing,
};

use crate::{
    algorithm::KeyCipherAlgorithm, error::CipherError, keystore::DeviceKeystore,
    traits::KeyCipher,
};

/// Keystore alias of the PKCS#1 device key.
pub const KEY_ALIAS: &str = "keysafe.rsa.pkcs1";

/// RSA/ECB/PKCS1Padding key cipher.
///
/// Kept so stores written on baseline platforms remain readable.
pub struct RsaPkcs1KeyCipher {
    private: RsaPrivateKey,
    public: RsaPublicKey,
}

impl RsaPkcs1KeyCipher {
    pub fn new(keystore: &dyn DeviceKeystore) -> Result<Self, CipherError> {
        let private = keystore.private_key(KEY_ALIAS)?;
        let public = RsaPublicKey::from(&private);
        Ok(Self { private, public })
    }
}

impl KeyCipher for RsaPkcs1KeyCipher {
    fn algorithm(&self) -> KeyCipherAlgorithm {
        KeyCipherAlgorithm::RsaEcbPkcs1Padding
    }

    fn wrap(&self, key: &[u8]) -> Result<Vec<u8>, CipherError> {
        self.public
            .encrypt(&mut OsRng, Pkcs1v15Encrypt, key)
            .map_err(|e| CipherError::Cipher(format!("RSA/PKCS1 wrap failed: {e}")))
    }

    fn unwrap(&self, wrapped: &[u8]) -> Result<Zeroizing<Vec<u8>>, CipherError> {
        self.private
            .decrypt(Pkcs1v15Encrypt, wrapped)
            .map(Zeroizing::new)
            .map_err(|e| CipherError::Cipher(format!("RSA/PKCS1 unwrap failed: {e}")))
    }
}
