//! Modern key cipher: RSA-OAEP with SHA-256 and MGF1.

use {
    rand_core::OsRng,
    rsa::{Oaep, RsaPrivateKey, RsaPublicKey},
    sha2::Sha256,
    zeroize::Zeroizing,
};

use crate::{
    algorithm::KeyCipherAlgorithm, error::CipherError, keystore::DeviceKeystore,
    traits::KeyCipher,
};

/// Keystore alias of the OAEP device key. Distinct from the PKCS#1 alias so
/// both ciphers can coexist during a migration.
pub const KEY_ALIAS: &str = "keysafe.rsa.oaep";

/// RSA/ECB/OAEPwithSHA-256andMGF1Padding key cipher.
pub struct RsaOaepKeyCipher {
    private: RsaPrivateKey,
    public: RsaPublicKey,
}

impl RsaOaepKeyCipher {
    pub fn new(keystore: &dyn DeviceKeystore) -> Result<Self, CipherError> {
        let private = keystore.private_key(KEY_ALIAS)?;
        let public = RsaPublicKey::from(&private);
        Ok(Self { private, public })
    }
}

impl KeyCipher for RsaOaepKeyCipher {
    fn algorithm(&self) -> KeyCipherAlgorithm {
        KeyCipherAlgorithm::RsaEcbOaepWithSha256AndMgf1Padding
    }

    fn wrap(&self, key: &[u8]) -> Result<Vec<u8>, CipherError> {
        self.public
            .encrypt(&mut OsRng, Oaep::new::<Sha256>(), key)
            .map_err(|e| CipherError::Cipher(format!("RSA/OAEP wrap failed: {e}")))
    }

    fn unwrap(&self, wrapped: &[u8]) -> Result<Zeroizing<Vec<u8>>, CipherError> {
        self.private
            .decrypt(Oaep::new::<Sha256>(), wrapped)
            .map(Zeroizing::new)
            .map_err(|e| CipherError::Cipher(format!("RSA/OAEP unwrap failed: {e}")))
    }
}
