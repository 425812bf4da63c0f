//! Static catalog of known algorithm variants and their factories.
//!
//! The catalog is fixed at compile time and never mutated, so it is shared
//! freely across threads. Factories are dispatched by matching on the variant.

use std::sync::Arc;

use crate::{
    aes_cbc::AesCbcStorageCipher,
    aes_gcm::AesGcmStorageCipher,
    algorithm::{Algorithm, AlgorithmKind, KeyCipherAlgorithm, StorageCipherAlgorithm},
    context::CipherContext,
    error::{CipherError, Result},
    platform::PlatformVersion,
    rsa_oaep::RsaOaepKeyCipher,
    rsa_pkcs1::RsaPkcs1KeyCipher,
    traits::{KeyCipher, StorageCipher},
};

/// Catalog entry: stored tag and platform gate for one variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlgorithmDescriptor<A> {
    pub algorithm: A,
    pub identifier: &'static str,
    pub min_version: PlatformVersion,
}

const RSA_PKCS1: AlgorithmDescriptor<KeyCipherAlgorithm> = AlgorithmDescriptor {
    algorithm: KeyCipherAlgorithm::RsaEcbPkcs1Padding,
    identifier: "RSA_ECB_PKCS1Padding",
    min_version: PlatformVersion::BASELINE,
};

const RSA_OAEP: AlgorithmDescriptor<KeyCipherAlgorithm> = AlgorithmDescriptor {
    algorithm: KeyCipherAlgorithm::RsaEcbOaepWithSha256AndMgf1Padding,
    identifier: "RSA_ECB_OAEPwithSHA_256andMGF1Padding",
    min_version: PlatformVersion::MODERN_CIPHERS,
};

const AES_CBC: AlgorithmDescriptor<StorageCipherAlgorithm> = AlgorithmDescriptor {
    algorithm: StorageCipherAlgorithm::AesCbcPkcs7Padding,
    identifier: "AES_CBC_PKCS7Padding",
    min_version: PlatformVersion::BASELINE,
};

const AES_GCM: AlgorithmDescriptor<StorageCipherAlgorithm> = AlgorithmDescriptor {
    algorithm: StorageCipherAlgorithm::AesGcmNoPadding,
    identifier: "AES_GCM_NoPadding",
    min_version: PlatformVersion::MODERN_CIPHERS,
};

impl Algorithm for KeyCipherAlgorithm {
    const ALL: &'static [Self] = &[
        Self::RsaEcbPkcs1Padding,
        Self::RsaEcbOaepWithSha256AndMgf1Padding,
    ];
    const DEFAULT: Self = Self::RsaEcbOaepWithSha256AndMgf1Padding;
    const KIND: AlgorithmKind = AlgorithmKind::KeyCipher;

    fn descriptor(self) -> &'static AlgorithmDescriptor<Self> {
        match self {
            Self::RsaEcbPkcs1Padding => &RSA_PKCS1,
            Self::RsaEcbOaepWithSha256AndMgf1Padding => &RSA_OAEP,
        }
    }
}

impl Algorithm for StorageCipherAlgorithm {
    const ALL: &'static [Self] = &[Self::AesCbcPkcs7Padding, Self::AesGcmNoPadding];
    const DEFAULT: Self = Self::AesGcmNoPadding;
    const KIND: AlgorithmKind = AlgorithmKind::StorageCipher;

    fn descriptor(self) -> &'static AlgorithmDescriptor<Self> {
        match self {
            Self::AesCbcPkcs7Padding => &AES_CBC,
            Self::AesGcmNoPadding => &AES_GCM,
        }
    }
}

/// Look up a variant of dimension `A` by its stored tag.
///
/// Matching is exact; there is no case folding or trimming.
pub fn resolve<A: Algorithm>(identifier: &str) -> Result<A> {
    A::ALL
        .iter()
        .copied()
        .find(|alg| alg.identifier() == identifier)
        .ok_or_else(|| CipherError::UnknownAlgorithm {
            kind: A::KIND,
            identifier: identifier.to_string(),
        })
}

/// Every descriptor of dimension `A`, weakest first.
pub fn catalog<A: Algorithm>() -> impl Iterator<Item = &'static AlgorithmDescriptor<A>> {
    A::ALL.iter().map(|alg| alg.descriptor())
}

/// `variant.min_version <= platform`.
pub fn is_available<A: Algorithm>(variant: A, platform: PlatformVersion) -> bool {
    variant.is_available(platform)
}

/// Build the runtime key cipher for `algorithm`.
///
/// Blocks while the keystore produces (or generates) the device key.
pub fn instantiate_key_cipher(
    algorithm: KeyCipherAlgorithm,
    ctx: &CipherContext<'_>,
) -> Result<Arc<dyn KeyCipher>> {
    let built: Result<Arc<dyn KeyCipher>> = match algorithm {
        KeyCipherAlgorithm::RsaEcbPkcs1Padding => {
            RsaPkcs1KeyCipher::new(ctx.keystore).map(|c| Arc::new(c) as Arc<dyn KeyCipher>)
        },
        KeyCipherAlgorithm::RsaEcbOaepWithSha256AndMgf1Padding => {
            RsaOaepKeyCipher::new(ctx.keystore).map(|c| Arc::new(c) as Arc<dyn KeyCipher>)
        },
    };

    #[cfg(feature = "tracing")]
    {
        if built.is_ok() {
            tracing::debug!(algorithm = %algorithm, "key cipher ready");
        }
    }

    built.map_err(|e| initialization_error(algorithm.identifier(), e))
}

/// Build the runtime storage cipher for `algorithm`, protecting its data key
/// with `key_cipher`.
pub fn instantiate_storage_cipher(
    algorithm: StorageCipherAlgorithm,
    ctx: &CipherContext<'_>,
    key_cipher: Arc<dyn KeyCipher>,
) -> Result<Box<dyn StorageCipher>> {
    let built: Result<Box<dyn StorageCipher>> = match algorithm {
        StorageCipherAlgorithm::AesCbcPkcs7Padding => {
            AesCbcStorageCipher::new(ctx.settings, key_cipher)
                .map(|c| Box::new(c) as Box<dyn StorageCipher>)
        },
        StorageCipherAlgorithm::AesGcmNoPadding => AesGcmStorageCipher::new(ctx.settings, key_cipher)
            .map(|c| Box::new(c) as Box<dyn StorageCipher>),
    };

    #[cfg(feature = "tracing")]
    {
        if built.is_ok() {
            tracing::debug!(algorithm = %algorithm, "storage cipher ready");
        }
    }

    built.map_err(|e| initialization_error(algorithm.identifier(), e))
}

fn initialization_error(algorithm: &str, err: CipherError) -> CipherError {
    match err {
        CipherError::CipherInitialization { .. } => err,
        other => CipherError::CipherInitialization {
            algorithm: algorithm.to_string(),
            reason: other.to_string(),
        },
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{keystore::SoftwareKeystore, settings::InMemorySettings},
    };

    #[test]
    fn resolves_every_cataloged_identifier() {
        for desc in catalog::<KeyCipherAlgorithm>() {
            assert_eq!(resolve::<KeyCipherAlgorithm>(desc.identifier).unwrap(), desc.algorithm);
        }
        for desc in catalog::<StorageCipherAlgorithm>() {
            assert_eq!(
                resolve::<StorageCipherAlgorithm>(desc.identifier).unwrap(),
                desc.algorithm
            );
        }
    }

    #[test]
    fn unknown_identifier_reports_dimension() {
        let err = resolve::<KeyCipherAlgorithm>("BOGUS_ALGO").unwrap_err();
        assert!(matches!(
            err,
            CipherError::UnknownAlgorithm {
                kind: AlgorithmKind::KeyCipher,
                ref identifier,
            } if identifier == "BOGUS_ALGO"
        ));

        // A key-cipher tag is not a storage-cipher tag.
        let err = resolve::<StorageCipherAlgorithm>("RSA_ECB_PKCS1Padding").unwrap_err();
        assert!(matches!(err, CipherError::UnknownAlgorithm {
            kind: AlgorithmKind::StorageCipher,
            ..
        }));
    }

    #[test]
    fn modern_members_are_default_and_gated() {
        assert_eq!(
            KeyCipherAlgorithm::DEFAULT,
            KeyCipherAlgorithm::RsaEcbOaepWithSha256AndMgf1Padding
        );
        assert_eq!(StorageCipherAlgorithm::DEFAULT, StorageCipherAlgorithm::AesGcmNoPadding);

        let below = PlatformVersion::new(PlatformVersion::MODERN_CIPHERS.get() - 1);
        assert!(!is_available(KeyCipherAlgorithm::DEFAULT, below));
        assert!(!is_available(StorageCipherAlgorithm::DEFAULT, below));
        assert!(is_available(KeyCipherAlgorithm::DEFAULT, PlatformVersion::MODERN_CIPHERS));
        assert!(is_available(
            StorageCipherAlgorithm::AesCbcPkcs7Padding,
            PlatformVersion::BASELINE
        ));
    }

    #[test]
    fn instantiates_every_variant() {
        let keystore = SoftwareKeystore::with_key_bits(1024);
        let settings = InMemorySettings::new();
        let ctx = CipherContext::new(&keystore, &settings);

        for key_alg in KeyCipherAlgorithm::ALL {
            let key = instantiate_key_cipher(*key_alg, &ctx).unwrap();
            assert_eq!(key.algorithm(), *key_alg);
            for storage_alg in StorageCipherAlgorithm::ALL {
                let storage = instantiate_storage_cipher(*storage_alg, &ctx, key.clone()).unwrap();
                assert_eq!(storage.algorithm(), *storage_alg);
            }
        }
    }

    #[test]
    fn keystore_failure_becomes_initialization_error() {
        let keystore = SoftwareKeystore::with_key_bits(1024);
        keystore.revoke_all();
        let settings = InMemorySettings::new();
        let ctx = CipherContext::new(&keystore, &settings);

        let err = instantiate_key_cipher(KeyCipherAlgorithm::DEFAULT, &ctx)
            .err()
            .unwrap();
        assert!(matches!(err, CipherError::CipherInitialization { ref algorithm, .. }
            if algorithm == "RSA_ECB_OAEPwithSHA_256andMGF1Padding"));
    }
}
