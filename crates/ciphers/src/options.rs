//! Caller-supplied cipher options.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::algorithm::{KeyCipherAlgorithm, StorageCipherAlgorithm};

/// Option naming the requested key cipher.
pub const KEY_CIPHER_ALGORITHM: &str = "keyCipherAlgorithm";

/// Option naming the requested storage cipher.
pub const STORAGE_CIPHER_ALGORITHM: &str = "storageCipherAlgorithm";

/// Loosely-typed option map, as received from the embedding application.
///
/// Unrecognised names are ignored. Values are converted to their string form
/// before being resolved against the catalog.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CipherOptions(HashMap<String, serde_json::Value>);

impl CipherOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request `algorithm` for the key dimension.
    #[must_use]
    pub fn with_key_cipher(mut self, algorithm: KeyCipherAlgorithm) -> Self {
        self.insert(KEY_CIPHER_ALGORITHM, algorithm.to_string());
        self
    }

    /// Request `algorithm` for the storage dimension.
    #[must_use]
    pub fn with_storage_cipher(mut self, algorithm: StorageCipherAlgorithm) -> Self {
        self.insert(STORAGE_CIPHER_ALGORITHM, algorithm.to_string());
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<serde_json::Value>) {
        self.0.insert(name.into(), value.into());
    }

    /// String form of option `name`, or `None` when absent.
    ///
    /// JSON strings are returned verbatim; `null` counts as absent; any other
    /// value is rendered as its JSON text.
    pub fn get_string(&self, name: &str) -> Option<String> {
        match self.0.get(name)? {
            serde_json::Value::Null => None,
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<serde_json::Value>> FromIterator<(K, V)> for CipherOptions {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl From<HashMap<String, serde_json::Value>> for CipherOptions {
    fn from(map: HashMap<String, serde_json::Value>) -> Self {
        Self(map)
    }
}
