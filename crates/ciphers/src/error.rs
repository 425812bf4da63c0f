//! Cipher negotiation error types.

use crate::algorithm::AlgorithmKind;

/// Errors produced by negotiation, cipher construction and cipher operations.
#[derive(Debug, thiserror::Error)]
pub enum CipherError {
    /// A persisted or requested identifier matches no cataloged variant.
    #[error("unknown {kind} algorithm: {identifier:?}")]
    UnknownAlgorithm {
        kind: AlgorithmKind,
        identifier: String,
    },

    /// The platform could not produce a cipher for a resolved variant.
    #[error("failed to initialize {algorithm}: {reason}")]
    CipherInitialization { algorithm: String, reason: String },

    /// The ciphers that wrote the existing entries cannot be built.
    ///
    /// Stored data is unreadable until the underlying platform issue is fixed.
    #[error("saved ciphers unavailable, stored entries cannot be read: {0}")]
    SavedCiphersUnavailable(#[source] Box<CipherError>),

    /// The ciphers selected for future writes cannot be built.
    #[error("current ciphers unavailable, new entries cannot be written: {0}")]
    CurrentCiphersUnavailable(#[source] Box<CipherError>),

    /// Encryption, decryption, wrapping or unwrapping failed.
    #[error("cipher error: {0}")]
    Cipher(String),

    /// The device keystore could not provide key material.
    #[error("keystore error: {0}")]
    Keystore(String),

    /// The settings store could not be read or written.
    #[error("settings error: {0}")]
    Settings(String),

    /// Base64 decoding failed.
    #[error("base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),

    /// JSON serialization / deserialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl CipherError {
    /// Whether this error (or the error it wraps) is a cipher construction failure.
    #[must_use]
    pub fn is_cipher_initialization(&self) -> bool {
        match self {
            Self::CipherInitialization { .. } => true,
            Self::SavedCiphersUnavailable(inner) | Self::CurrentCiphersUnavailable(inner) => {
                inner.is_cipher_initialization()
            },
            _ => false,
        }
    }

    /// Whether existing entries are unreadable because of this error.
    #[must_use]
    pub fn is_data_unreadable(&self) -> bool {
        matches!(self, Self::SavedCiphersUnavailable(_))
    }
}

pub type Result<T> = std::result::Result<T, CipherError>;
