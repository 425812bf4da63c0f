//! Algorithm negotiation and migration detection.
//!
//! [`CipherNegotiator::negotiate`] compares the pair recorded in settings (the
//! *saved* pair, which wrote the existing entries) with the pair that should
//! be used from now on (the *current* pair, chosen from the caller's options
//! and gated on the platform version). When they differ the store must be
//! re-encrypted before further use:
//!
//! 1. build [`saved_ciphers`](CipherNegotiator::saved_ciphers) and decrypt every entry,
//! 2. build [`current_ciphers`](CipherNegotiator::current_ciphers) and re-encrypt every entry,
//! 3. write all entries back,
//! 4. only then call [`persist_current`](CipherNegotiator::persist_current).
//!
//! Negotiation is a pure function of settings, options and platform version,
//! so a crash between 3 and 4 yields the same result on restart. Both suites
//! are rebuilt with the data keys they had before the crash, so entries
//! rewritten under the current suite stay readable while the pass is redone.
//! Stores that cannot tell migrated entries apart should stage the rewrite and
//! commit it together with [`persist_current`](CipherNegotiator::persist_current).
//! The caller must hold an exclusive lock on the store for the whole sequence.

use std::{fmt, sync::Arc};

use serde::{Deserialize, Serialize};

use crate::{
    algorithm::{Algorithm, AlgorithmPair, KeyCipherAlgorithm, StorageCipherAlgorithm},
    context::CipherContext,
    error::{CipherError, Result},
    options::{CipherOptions, KEY_CIPHER_ALGORITHM, STORAGE_CIPHER_ALGORITHM},
    platform::PlatformVersion,
    registry,
    settings::{ALGORITHM_KEY, ALGORITHM_STORAGE, SettingsStore},
    traits::{KeyCipher, StorageCipher},
};

/// What to select when a requested variant is unavailable on the platform.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FallbackPolicy {
    /// Substitute the dimension default without re-checking it against the
    /// platform. Below [`PlatformVersion::MODERN_CIPHERS`] this can select a
    /// variant the device does not support.
    #[default]
    Default,
    /// Substitute the strongest variant the platform supports, walking down
    /// from the default towards the legacy member.
    BaselineChain,
}

/// Derived state of a negotiated store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NegotiationState {
    /// Saved and current pairs match; the store can be used as is.
    Stable,
    /// Entries must be re-encrypted under the current pair.
    NeedsMigration,
}

impl fmt::Display for NegotiationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stable => write!(f, "stable"),
            Self::NeedsMigration => write!(f, "needs migration"),
        }
    }
}

/// Outcome of one negotiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NegotiationResult {
    saved: AlgorithmPair,
    current: AlgorithmPair,
}

impl NegotiationResult {
    pub fn new(saved: AlgorithmPair, current: AlgorithmPair) -> Self {
        Self { saved, current }
    }

    /// Pair under which existing entries were written.
    pub fn saved(&self) -> AlgorithmPair {
        self.saved
    }

    /// Pair to use for all future writes.
    pub fn current(&self) -> AlgorithmPair {
        self.current
    }

    /// `true` when either dimension changed.
    pub fn requires_re_encryption(&self) -> bool {
        self.saved != self.current
    }

    pub fn state(&self) -> NegotiationState {
        if self.requires_re_encryption() {
            NegotiationState::NeedsMigration
        } else {
            NegotiationState::Stable
        }
    }
}

/// Key cipher and storage cipher built for one [`AlgorithmPair`].
pub struct CipherSuite {
    pub key: Arc<dyn KeyCipher>,
    pub storage: Box<dyn StorageCipher>,
}

impl CipherSuite {
    pub fn pair(&self) -> AlgorithmPair {
        AlgorithmPair::new(self.key.algorithm(), self.storage.algorithm())
    }

    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        self.storage.encrypt(plaintext)
    }

    pub fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>> {
        self.storage.decrypt(ciphertext)
    }
}

impl fmt::Debug for CipherSuite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CipherSuite")
            .field("pair", &self.pair())
            .finish()
    }
}

/// Chooses saved and current algorithm pairs for a store.
#[derive(Debug, Clone, Copy)]
pub struct CipherNegotiator {
    platform: PlatformVersion,
    fallback: FallbackPolicy,
}

impl CipherNegotiator {
    pub fn new(platform: PlatformVersion) -> Self {
        Self {
            platform,
            fallback: FallbackPolicy::Default,
        }
    }

    #[must_use]
    pub fn with_fallback(mut self, fallback: FallbackPolicy) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn platform(&self) -> PlatformVersion {
        self.platform
    }

    pub fn fallback(&self) -> FallbackPolicy {
        self.fallback
    }

    /// Compute the saved and current pairs.
    ///
    /// Fails with [`CipherError::UnknownAlgorithm`] when a persisted
    /// identifier is present but not cataloged: the settings are corrupt and
    /// the store needs recovery. Unknown *requested* identifiers are not
    /// errors; the dimension default is used instead.
    pub fn negotiate(
        &self,
        settings: &dyn SettingsStore,
        options: &CipherOptions,
    ) -> Result<NegotiationResult> {
        let saved = saved_pair(settings)?;
        let current = AlgorithmPair {
            key: self.select::<KeyCipherAlgorithm>(options.get_string(KEY_CIPHER_ALGORITHM)),
            storage: self
                .select::<StorageCipherAlgorithm>(options.get_string(STORAGE_CIPHER_ALGORITHM)),
        };
        let result = NegotiationResult { saved, current };

        #[cfg(feature = "tracing")]
        {
            if result.requires_re_encryption() {
                tracing::info!(
                    saved = %saved,
                    current = %current,
                    platform = %self.platform,
                    "store requires re-encryption"
                );
            } else {
                tracing::debug!(pair = %current, platform = %self.platform, "cipher pair unchanged");
            }
        }

        Ok(result)
    }

    /// Build the ciphers that wrote the existing entries.
    ///
    /// Failure here means stored data cannot be read and is reported as
    /// [`CipherError::SavedCiphersUnavailable`].
    pub fn saved_ciphers(
        &self,
        ctx: &CipherContext<'_>,
        result: &NegotiationResult,
    ) -> Result<CipherSuite> {
        build_suite(ctx, result.saved).map_err(|e| {
            #[cfg(feature = "tracing")]
            tracing::error!(pair = %result.saved, error = %e, "saved ciphers unavailable");
            CipherError::SavedCiphersUnavailable(Box::new(e))
        })
    }

    /// Build the ciphers for future writes.
    ///
    /// Failure is reported as [`CipherError::CurrentCiphersUnavailable`].
    pub fn current_ciphers(
        &self,
        ctx: &CipherContext<'_>,
        result: &NegotiationResult,
    ) -> Result<CipherSuite> {
        build_suite(ctx, result.current).map_err(|e| {
            #[cfg(feature = "tracing")]
            tracing::warn!(pair = %result.current, error = %e, "current ciphers unavailable");
            CipherError::CurrentCiphersUnavailable(Box::new(e))
        })
    }

    /// Record the current pair as the one protecting the store.
    ///
    /// Call only after every entry has been rewritten under it. Both
    /// identifiers are committed in a single write; on failure the previous
    /// pair stays recorded.
    pub fn persist_current(
        &self,
        writer: &dyn SettingsStore,
        result: &NegotiationResult,
    ) -> Result<()> {
        writer.put_strings(&[
            (ALGORITHM_KEY, result.current.key.identifier()),
            (ALGORITHM_STORAGE, result.current.storage.identifier()),
        ])?;

        #[cfg(feature = "tracing")]
        tracing::info!(pair = %result.current, "persisted cipher pair");

        Ok(())
    }

    /// Forget the recorded pair; the next negotiation sees defaults.
    pub fn clear_persisted(&self, writer: &dyn SettingsStore) -> Result<()> {
        writer.remove_all(&[ALGORITHM_KEY, ALGORITHM_STORAGE])?;

        #[cfg(feature = "tracing")]
        tracing::info!("cleared persisted cipher pair");

        Ok(())
    }

    /// Pick the current variant of dimension `A`.
    fn select<A: Algorithm + fmt::Display>(&self, requested: Option<String>) -> A {
        let requested = match requested {
            None => A::DEFAULT,
            Some(identifier) => A::resolve(&identifier).unwrap_or_else(|_e| {
                #[cfg(feature = "tracing")]
                tracing::warn!(
                    kind = %A::KIND,
                    requested = %identifier,
                    default = %A::DEFAULT,
                    "unknown requested algorithm, using default"
                );
                A::DEFAULT
            }),
        };

        if requested.is_available(self.platform) {
            return requested;
        }

        match self.fallback {
            FallbackPolicy::Default => {
                #[cfg(feature = "tracing")]
                {
                    if !A::DEFAULT.is_available(self.platform) {
                        tracing::warn!(
                            kind = %A::KIND,
                            selected = %A::DEFAULT,
                            platform = %self.platform,
                            "default algorithm is not supported by this platform"
                        );
                    }
                }
                A::DEFAULT
            },
            FallbackPolicy::BaselineChain => A::ALL
                .iter()
                .rev()
                .copied()
                .find(|alg| alg.is_available(self.platform))
                .unwrap_or(A::DEFAULT),
        }
    }
}

/// Read the persisted pair, substituting defaults for absent settings.
fn saved_pair(settings: &dyn SettingsStore) -> Result<AlgorithmPair> {
    let key = settings.get_string_or(ALGORITHM_KEY, KeyCipherAlgorithm::DEFAULT.identifier())?;
    let storage =
        settings.get_string_or(ALGORITHM_STORAGE, StorageCipherAlgorithm::DEFAULT.identifier())?;
    AlgorithmPair::resolve(&key, &storage)
}

fn build_suite(ctx: &CipherContext<'_>, pair: AlgorithmPair) -> Result<CipherSuite> {
    let key = registry::instantiate_key_cipher(pair.key, ctx)?;
    let storage = registry::instantiate_storage_cipher(pair.storage, ctx, Arc::clone(&key))?;
    Ok(CipherSuite { key, storage })
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{algorithm::AlgorithmKind, settings::InMemorySettings},
        serde_json::json,
    };

    const BELOW_MODERN: PlatformVersion = PlatformVersion::new(22);

    fn legacy_settings() -> InMemorySettings {
        InMemorySettings::with_values([
            (ALGORITHM_KEY, "RSA_ECB_PKCS1Padding"),
            (ALGORITHM_STORAGE, "AES_CBC_PKCS7Padding"),
        ])
    }

    #[test]
    fn fresh_store_is_stable_on_defaults() {
        let result = CipherNegotiator::new(PlatformVersion::MODERN_CIPHERS)
            .negotiate(&InMemorySettings::new(), &CipherOptions::new())
            .unwrap();
        assert_eq!(result.saved(), AlgorithmPair::DEFAULT);
        assert_eq!(result.current(), AlgorithmPair::DEFAULT);
        assert_eq!(result.state(), NegotiationState::Stable);
    }

    #[test]
    fn legacy_store_needs_migration() {
        let result = CipherNegotiator::new(PlatformVersion::new(30))
            .negotiate(&legacy_settings(), &CipherOptions::new())
            .unwrap();
        assert_eq!(result.saved(), AlgorithmPair::LEGACY);
        assert_eq!(result.current(), AlgorithmPair::DEFAULT);
        assert!(result.requires_re_encryption());
    }

    #[test]
    fn one_dimension_is_enough_to_trigger_migration() {
        let settings = InMemorySettings::with_values([(ALGORITHM_STORAGE, "AES_CBC_PKCS7Padding")]);
        let result = CipherNegotiator::new(PlatformVersion::MODERN_CIPHERS)
            .negotiate(&settings, &CipherOptions::new())
            .unwrap();
        assert_eq!(result.saved().key, result.current().key);
        assert_eq!(result.state(), NegotiationState::NeedsMigration);
    }

    #[test]
    fn requested_legacy_is_honoured() {
        let options = CipherOptions::new()
            .with_key_cipher(KeyCipherAlgorithm::RsaEcbPkcs1Padding)
            .with_storage_cipher(StorageCipherAlgorithm::AesCbcPkcs7Padding);
        let result = CipherNegotiator::new(PlatformVersion::MODERN_CIPHERS)
            .negotiate(&legacy_settings(), &options)
            .unwrap();
        assert_eq!(result.current(), AlgorithmPair::LEGACY);
        assert!(!result.requires_re_encryption());
    }

    #[test]
    fn unknown_persisted_identifier_is_fatal() {
        let settings = InMemorySettings::with_values([(ALGORITHM_KEY, "BOGUS_ALGO")]);
        let err = CipherNegotiator::new(PlatformVersion::MODERN_CIPHERS)
            .negotiate(&settings, &CipherOptions::new())
            .unwrap_err();
        assert!(matches!(err, CipherError::UnknownAlgorithm {
            kind: AlgorithmKind::KeyCipher,
            ..
        }));
    }

    #[test]
    fn unknown_requested_identifier_falls_back_to_default() {
        let options: CipherOptions = [
            (KEY_CIPHER_ALGORITHM, json!("BOGUS_ALGO")),
            (STORAGE_CIPHER_ALGORITHM, json!(7)),
        ]
        .into_iter()
        .collect();
        let result = CipherNegotiator::new(PlatformVersion::MODERN_CIPHERS)
            .negotiate(&InMemorySettings::new(), &options)
            .unwrap();
        assert_eq!(result.current(), AlgorithmPair::DEFAULT);
    }

    #[test]
    fn default_fallback_is_not_rechecked() {
        // Faithful behaviour: below the modern release the unavailable default
        // is still selected.
        let options = CipherOptions::new()
            .with_key_cipher(KeyCipherAlgorithm::RsaEcbOaepWithSha256AndMgf1Padding);
        let result = CipherNegotiator::new(BELOW_MODERN)
            .negotiate(&legacy_settings(), &options)
            .unwrap();
        assert_eq!(result.current(), AlgorithmPair::DEFAULT);
        assert!(!result.current().is_available(BELOW_MODERN));
    }

    #[test]
    fn baseline_chain_stays_within_platform() {
        let negotiator =
            CipherNegotiator::new(BELOW_MODERN).with_fallback(FallbackPolicy::BaselineChain);
        let result = negotiator
            .negotiate(&legacy_settings(), &CipherOptions::new())
            .unwrap();
        assert_eq!(result.current(), AlgorithmPair::LEGACY);
        assert!(!result.requires_re_encryption());

        // Above the gate the chain picks the default again.
        let result = CipherNegotiator::new(PlatformVersion::MODERN_CIPHERS)
            .with_fallback(FallbackPolicy::BaselineChain)
            .negotiate(&legacy_settings(), &CipherOptions::new())
            .unwrap();
        assert_eq!(result.current(), AlgorithmPair::DEFAULT);
    }

    #[test]
    fn available_request_is_unaffected_by_fallback_policy() {
        let options =
            CipherOptions::new().with_storage_cipher(StorageCipherAlgorithm::AesCbcPkcs7Padding);
        for policy in [FallbackPolicy::Default, FallbackPolicy::BaselineChain] {
            let result = CipherNegotiator::new(PlatformVersion::MODERN_CIPHERS)
                .with_fallback(policy)
                .negotiate(&InMemorySettings::new(), &options)
                .unwrap();
            assert_eq!(result.current().storage, StorageCipherAlgorithm::AesCbcPkcs7Padding);
            assert_eq!(result.current().key, KeyCipherAlgorithm::DEFAULT);
        }
    }

    #[test]
    fn persist_then_clear() {
        let settings = legacy_settings();
        let negotiator = CipherNegotiator::new(PlatformVersion::MODERN_CIPHERS);
        let result = negotiator
            .negotiate(&settings, &CipherOptions::new())
            .unwrap();

        negotiator.persist_current(&settings, &result).unwrap();
        assert_eq!(
            settings.get_string(ALGORITHM_KEY).unwrap().as_deref(),
            Some("RSA_ECB_OAEPwithSHA_256andMGF1Padding")
        );
        assert_eq!(
            settings.get_string(ALGORITHM_STORAGE).unwrap().as_deref(),
            Some("AES_GCM_NoPadding")
        );

        negotiator.clear_persisted(&settings).unwrap();
        assert!(settings.snapshot().is_empty());
    }

    #[test]
    fn result_serializes_with_identifiers() {
        let result = NegotiationResult::new(AlgorithmPair::LEGACY, AlgorithmPair::DEFAULT);
        let value = serde_json::to_value(result).unwrap();
        assert_eq!(value["saved"]["key"], "RSA_ECB_PKCS1Padding");
        assert_eq!(value["current"]["storage"], "AES_GCM_NoPadding");
    }
}
