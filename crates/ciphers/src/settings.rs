//! Settings store: where the algorithm choice and wrapped data keys live.

use std::{
    collections::BTreeMap,
    io::Write,
    path::{Path, PathBuf},
    sync::RwLock,
};

use crate::error::{CipherError, Result};

/// Prefix shared by the persisted algorithm identifiers.
pub const ALGORITHM_PREFIX: &str = "KeysafeAlgorithm";

/// Persisted key-cipher identifier.
pub const ALGORITHM_KEY: &str = "KeysafeAlgorithmKey";

/// Persisted storage-cipher identifier.
pub const ALGORITHM_STORAGE: &str = "KeysafeAlgorithmStorage";

/// String key-value settings owned by the host store.
///
/// Implement this for your persistence layer:
/// - [`InMemorySettings`] (testing)
/// - [`FileSettings`] (single JSON file)
/// - the preferences store of the embedding application
pub trait SettingsStore: Send + Sync {
    fn get_string(&self, key: &str) -> Result<Option<String>>;

    fn put_string(&self, key: &str, value: &str) -> Result<()>;

    fn remove(&self, key: &str) -> Result<()>;

    /// Write every pair in one commit: afterwards either all of them are
    /// stored or none is.
    fn put_strings(&self, entries: &[(&str, &str)]) -> Result<()>;

    /// Remove every key in one commit.
    fn remove_all(&self, keys: &[&str]) -> Result<()>;

    /// Value for `key`, or `default` when the key is absent.
    fn get_string_or(&self, key: &str, default: &str) -> Result<String> {
        Ok(self
            .get_string(key)?
            .unwrap_or_else(|| default.to_string()))
    }
}

// ── In-memory ───────────────────────────────────────────────────────────────

/// In-memory settings (for testing and ephemeral stores).
#[derive(Debug, Default)]
pub struct InMemorySettings {
    values: RwLock<BTreeMap<String, String>>,
}

impl InMemorySettings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populated settings, e.g. to simulate state left by an older release.
    pub fn with_values<K, V>(values: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            values: RwLock::new(
                values
                    .into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
            ),
        }
    }

    /// Copy of every stored pair.
    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.values
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl SettingsStore for InMemorySettings {
    fn get_string(&self, key: &str) -> Result<Option<String>> {
        let values = self.values.read().unwrap_or_else(|e| e.into_inner());
        Ok(values.get(key).cloned())
    }

    fn put_string(&self, key: &str, value: &str) -> Result<()> {
        let mut values = self.values.write().unwrap_or_else(|e| e.into_inner());
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut values = self.values.write().unwrap_or_else(|e| e.into_inner());
        values.remove(key);
        Ok(())
    }

    fn put_strings(&self, entries: &[(&str, &str)]) -> Result<()> {
        let mut values = self.values.write().unwrap_or_else(|e| e.into_inner());
        for (key, value) in entries {
            values.insert((*key).to_string(), (*value).to_string());
        }
        Ok(())
    }

    fn remove_all(&self, keys: &[&str]) -> Result<()> {
        let mut values = self.values.write().unwrap_or_else(|e| e.into_inner());
        for key in keys {
            values.remove(*key);
        }
        Ok(())
    }
}

// ── File ────────────────────────────────────────────────────────────────────

/// Replace `path` with `contents`, readable by the owner only.
///
/// Writes a `0600` sibling temp file, syncs it, then renames it over `path`.
pub(crate) fn write_private_file(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let tmp = path.with_extension("tmp");
    let mut options = std::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(&tmp)?;

    // A leftover temp file keeps its old mode.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(std::fs::Permissions::from_mode(0o600))?;
    }

    file.write_all(contents)?;
    file.sync_all()?;
    drop(file);
    std::fs::rename(&tmp, path)
}

/// File-backed settings: one JSON object holding every key.
///
/// Each mutation rewrites the whole file through a temp file and a rename, so
/// a crash never leaves a half-written settings file behind.
#[derive(Debug)]
pub struct FileSettings {
    path: PathBuf,
    lock: RwLock<()>,
}

impl FileSettings {
    /// Open (or lazily create) the settings file at `path`.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        Ok(Self {
            path,
            lock: RwLock::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<BTreeMap<String, String>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let raw = std::fs::read_to_string(&self.path).map_err(|e| {
            CipherError::Settings(format!("failed to read {}: {e}", self.path.display()))
        })?;
        if raw.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        Ok(serde_json::from_str(&raw)?)
    }

    fn write_all(&self, values: &BTreeMap<String, String>) -> Result<()> {
        let json = serde_json::to_string_pretty(values)?;
        write_private_file(&self.path, json.as_bytes()).map_err(|e| {
            CipherError::Settings(format!("failed to write {}: {e}", self.path.display()))
        })
    }

    fn update(&self, f: impl FnOnce(&mut BTreeMap<String, String>)) -> Result<()> {
        let _guard = self.lock.write().unwrap_or_else(|e| e.into_inner());
        let mut values = self.read_all()?;
        f(&mut values);
        self.write_all(&values)
    }
}

impl SettingsStore for FileSettings {
    fn get_string(&self, key: &str) -> Result<Option<String>> {
        let _guard = self.lock.read().unwrap_or_else(|e| e.into_inner());
        Ok(self.read_all()?.remove(key))
    }

    fn put_string(&self, key: &str, value: &str) -> Result<()> {
        self.update(|values| {
            values.insert(key.to_string(), value.to_string());
        })
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.update(|values| {
            values.remove(key);
        })
    }

    fn put_strings(&self, entries: &[(&str, &str)]) -> Result<()> {
        self.update(|values| {
            for (key, value) in entries {
                values.insert((*key).to_string(), (*value).to_string());
            }
        })
    }

    fn remove_all(&self, keys: &[&str]) -> Result<()> {
        self.update(|values| {
            for key in keys {
                values.remove(*key);
            }
        })
    }
}
