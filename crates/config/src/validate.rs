//! Configuration validation engine.
//!
//! Detects unknown/misspelled fields in TOML files and checks the cipher
//! section against the algorithm catalog and the configured platform.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use keysafe_ciphers::{
    Algorithm, FallbackPolicy, KeyCipherAlgorithm, PlatformVersion, StorageCipherAlgorithm,
};

use crate::schema::KeysafeConfig;

/// Smallest RSA modulus that can still wrap an AES-256 key under OAEP/SHA-256.
const MIN_KEY_BITS: usize = 1024;

/// Severity level for a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
            Self::Info => write!(f, "info"),
        }
    }
}

/// A single validation diagnostic.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Category: "syntax", "unknown-field", "type-error", "unknown-algorithm",
    /// "platform", "security", "fallback"
    pub category: &'static str,
    /// Dotted path, e.g. "ciphers.fallback"
    pub path: String,
    pub message: String,
}

/// Result of validating a configuration.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub diagnostics: Vec<Diagnostic>,
    pub config_path: Option<PathBuf>,
}

impl ValidationResult {
    /// Returns `true` if any diagnostic is an error.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    /// Count diagnostics by severity.
    #[must_use]
    pub fn count(&self, severity: Severity) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }
}

// ── Schema tree for unknown-field detection ─────────────────────────────────

enum KnownKeys {
    Struct(HashMap<&'static str, KnownKeys>),
    Leaf,
}

/// Build the schema map mirroring every field in `schema.rs`.
fn build_schema_map() -> KnownKeys {
    use KnownKeys::{Leaf, Struct};

    Struct(HashMap::from([
        (
            "ciphers",
            Struct(HashMap::from([
                ("key_cipher_algorithm", Leaf),
                ("storage_cipher_algorithm", Leaf),
                ("fallback", Leaf),
            ])),
        ),
        ("platform", Struct(HashMap::from([("version", Leaf)]))),
        (
            "storage",
            Struct(HashMap::from([
                ("settings_path", Leaf),
                ("keystore_dir", Leaf),
                ("key_bits", Leaf),
            ])),
        ),
        (
            "logging",
            Struct(HashMap::from([("level", Leaf), ("json", Leaf)])),
        ),
    ]))
}

// ── Levenshtein distance ────────────────────────────────────────────────────

fn levenshtein(a: &str, b: &str) -> usize {
    let b_chars: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b_chars.len()).collect();
    let mut curr = vec![0; b_chars.len() + 1];

    for (i, ca) in a.chars().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b_chars.iter().enumerate() {
            let cost = usize::from(ca != *cb);
            curr[j + 1] = (prev[j] + cost).min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b_chars.len()]
}

/// Closest candidate within `max_distance` edits. Case-only differences
/// always match.
fn suggest<'a>(needle: &str, candidates: &[&'a str], max_distance: usize) -> Option<&'a str> {
    if let Some(exact) = candidates
        .iter()
        .find(|c| c.eq_ignore_ascii_case(needle) && **c != needle)
    {
        return Some(*exact);
    }

    let mut best: Option<(&'a str, usize)> = None;
    for &candidate in candidates {
        let d = levenshtein(needle, candidate);
        if d > 0 && d <= max_distance && best.as_ref().is_none_or(|(_, bd)| d < *bd) {
            best = Some((candidate, d));
        }
    }
    best.map(|(s, _)| s)
}

// ── Core validation ─────────────────────────────────────────────────────────

/// Validate a config file at the given path, or discover the default config
/// file location if `path` is `None`.
#[must_use]
pub fn validate(path: Option<&Path>) -> ValidationResult {
    let config_path = match path {
        Some(p) => Some(p.to_path_buf()),
        None => crate::loader::find_config_file(),
    };

    let Some(ref actual_path) = config_path else {
        let mut result = validate_config(&KeysafeConfig::default());
        result.diagnostics.insert(0, Diagnostic {
            severity: Severity::Info,
            category: "syntax",
            path: String::new(),
            message: "no config file found; using defaults".into(),
        });
        return result;
    };

    let content = match std::fs::read_to_string(actual_path) {
        Ok(content) => content,
        Err(e) => {
            return ValidationResult {
                diagnostics: vec![Diagnostic {
                    severity: Severity::Error,
                    category: "syntax",
                    path: String::new(),
                    message: format!("failed to read config file: {e}"),
                }],
                config_path: Some(actual_path.clone()),
            };
        },
    };
    let content = crate::env_subst::substitute_env(&content);

    let is_toml = actual_path
        .extension()
        .and_then(|e| e.to_str())
        .is_none_or(|ext| ext == "toml");

    let mut result = if is_toml {
        validate_toml_str(&content)
    } else {
        match crate::loader::parse_config(&content, actual_path) {
            Ok(config) => validate_config(&config),
            Err(e) => ValidationResult {
                diagnostics: vec![Diagnostic {
                    severity: Severity::Error,
                    category: "type-error",
                    path: String::new(),
                    message: format!("parse error: {e}"),
                }],
                config_path: None,
            },
        }
    };
    result.config_path = Some(actual_path.clone());
    result
}

/// Validate a TOML string without file-system side effects.
#[must_use]
pub fn validate_toml_str(toml_str: &str) -> ValidationResult {
    let mut diagnostics = Vec::new();

    // 1. Syntax
    let toml_value: toml::Value = match toml::from_str(toml_str) {
        Ok(v) => v,
        Err(e) => {
            diagnostics.push(Diagnostic {
                severity: Severity::Error,
                category: "syntax",
                path: String::new(),
                message: format!("TOML syntax error: {e}"),
            });
            return ValidationResult {
                diagnostics,
                config_path: None,
            };
        },
    };

    // 2. Unknown fields
    check_unknown_fields(&toml_value, &build_schema_map(), "", &mut diagnostics);

    // 3. Types, then semantics on the parsed config
    match toml::from_str::<KeysafeConfig>(toml_str) {
        Ok(config) => check_semantics(&config, &mut diagnostics),
        Err(e) => diagnostics.push(Diagnostic {
            severity: Severity::Error,
            category: "type-error",
            path: String::new(),
            message: format!("type error: {e}"),
        }),
    }

    ValidationResult {
        diagnostics,
        config_path: None,
    }
}

/// Semantic checks on an already-loaded config (e.g. after env overrides).
#[must_use]
pub fn validate_config(config: &KeysafeConfig) -> ValidationResult {
    let mut diagnostics = Vec::new();
    check_semantics(config, &mut diagnostics);
    ValidationResult {
        diagnostics,
        config_path: None,
    }
}

fn check_unknown_fields(
    value: &toml::Value,
    schema: &KnownKeys,
    prefix: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let (toml::Value::Table(table), KnownKeys::Struct(fields)) = (value, schema) else {
        return;
    };

    let known_keys: Vec<&str> = fields.keys().copied().collect();
    for (key, child_value) in table {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        if let Some(child_schema) = fields.get(key.as_str()) {
            check_unknown_fields(child_value, child_schema, &path, diagnostics);
            continue;
        }

        let message = match suggest(key, &known_keys, 3) {
            Some(s) => format!("unknown field (did you mean \"{s}\"?)"),
            None => "unknown field".to_string(),
        };
        diagnostics.push(Diagnostic {
            severity: Severity::Error,
            category: "unknown-field",
            path,
            message,
        });
    }
}

fn check_semantics(config: &KeysafeConfig, diagnostics: &mut Vec<Diagnostic>) {
    if config.platform.version == Some(0) {
        diagnostics.push(Diagnostic {
            severity: Severity::Error,
            category: "platform",
            path: "platform.version".into(),
            message: "platform version must be at least 1".into(),
        });
    }
    let platform = config.platform.resolved();

    check_requested::<KeyCipherAlgorithm>(
        config.ciphers.key_cipher_algorithm.as_deref(),
        "ciphers.key_cipher_algorithm",
        platform,
        config.ciphers.fallback,
        diagnostics,
    );
    check_requested::<StorageCipherAlgorithm>(
        config.ciphers.storage_cipher_algorithm.as_deref(),
        "ciphers.storage_cipher_algorithm",
        platform,
        config.ciphers.fallback,
        diagnostics,
    );

    if config.ciphers.fallback == FallbackPolicy::BaselineChain {
        diagnostics.push(Diagnostic {
            severity: Severity::Info,
            category: "fallback",
            path: "ciphers.fallback".into(),
            message: "baseline-chain fallback enabled: unavailable algorithms are replaced by \
                      the strongest one the platform supports"
                .into(),
        });
    }

    let bits = config.storage.key_bits;
    if bits < MIN_KEY_BITS {
        diagnostics.push(Diagnostic {
            severity: Severity::Error,
            category: "security",
            path: "storage.key_bits".into(),
            message: format!("RSA keys of {bits} bits cannot wrap data keys (minimum {MIN_KEY_BITS})"),
        });
    } else if bits < keysafe_ciphers::keystore::DEFAULT_KEY_BITS {
        diagnostics.push(Diagnostic {
            severity: Severity::Warning,
            category: "security",
            path: "storage.key_bits".into(),
            message: format!("RSA keys of {bits} bits are weak; use at least 2048"),
        });
    }
}

fn check_requested<A: Algorithm + std::fmt::Display>(
    requested: Option<&str>,
    path: &str,
    platform: PlatformVersion,
    fallback: FallbackPolicy,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let algorithm = match requested {
        None => A::DEFAULT,
        Some(requested) => match A::resolve(requested) {
            Ok(algorithm) => algorithm,
            Err(_) => {
                let identifiers: Vec<&str> = A::ALL.iter().map(|a| a.identifier()).collect();
                let message = match suggest(requested, &identifiers, 4) {
                    Some(s) => format!(
                        "unknown {} \"{requested}\" (did you mean \"{s}\"?); {} will be used",
                        A::KIND,
                        A::DEFAULT
                    ),
                    None => format!(
                        "unknown {} \"{requested}\"; {} will be used",
                        A::KIND,
                        A::DEFAULT
                    ),
                };
                diagnostics.push(Diagnostic {
                    severity: Severity::Warning,
                    category: "unknown-algorithm",
                    path: path.into(),
                    message,
                });
                A::DEFAULT
            },
        },
    };

    if algorithm.is_available(platform) {
        return;
    }

    let replacement = match fallback {
        FallbackPolicy::Default => A::DEFAULT,
        FallbackPolicy::BaselineChain => A::ALL
            .iter()
            .rev()
            .copied()
            .find(|a| a.is_available(platform))
            .unwrap_or(A::DEFAULT),
    };

    // The default fallback is selected without re-checking the platform.
    if replacement == algorithm {
        diagnostics.push(Diagnostic {
            severity: Severity::Warning,
            category: "platform",
            path: path.into(),
            message: format!(
                "{algorithm} requires platform {} (configured {platform}) but is used anyway; \
                 set ciphers.fallback = \"baseline-chain\" to stay within the platform",
                algorithm.min_version()
            ),
        });
        return;
    }

    diagnostics.push(Diagnostic {
        severity: Severity::Warning,
        category: "platform",
        path: path.into(),
        message: format!(
            "{algorithm} requires platform {} (configured {platform}); {replacement} will be used",
            algorithm.min_version()
        ),
    });

    if !replacement.is_available(platform) {
        diagnostics.push(Diagnostic {
            severity: Severity::Warning,
            category: "platform",
            path: path.into(),
            message: format!(
                "{replacement} is not available on platform {platform} either; set \
                 ciphers.fallback = \"baseline-chain\" to stay within the platform"
            ),
        });
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn find<'a>(result: &'a ValidationResult, category: &str, path: &str) -> Option<&'a Diagnostic> {
        result
            .diagnostics
            .iter()
            .find(|d| d.category == category && d.path == path)
    }

    #[test]
    fn levenshtein_basics() {
        assert_eq!(levenshtein("", "abc"), 3);
        assert_eq!(levenshtein("cipher", "cipher"), 0);
        assert_eq!(levenshtein("ciphrs", "ciphers"), 1);
        assert_eq!(levenshtein("AES_GCM", "AES_CBC"), 3);
    }

    #[test]
    fn empty_config_is_clean() {
        let result = validate_toml_str("");
        assert!(result.diagnostics.is_empty(), "{:?}", result.diagnostics);
    }

    #[test]
    fn misspelled_section_gets_suggestion() {
        let result = validate_toml_str("[ciphrs]\nfallback = \"default\"\n");
        let d = find(&result, "unknown-field", "ciphrs").unwrap();
        assert!(d.message.contains("did you mean \"ciphers\""));
        assert!(result.has_errors());
    }

    #[test]
    fn misspelled_field_gets_suggestion() {
        let result = validate_toml_str("[storage]\nkey_bit = 2048\n");
        let d = find(&result, "unknown-field", "storage.key_bit").unwrap();
        assert!(d.message.contains("key_bits"));
    }

    #[test]
    fn syntax_error_stops_early() {
        let result = validate_toml_str("[ciphers\n");
        assert_eq!(result.diagnostics.len(), 1);
        assert_eq!(result.diagnostics[0].category, "syntax");
    }

    #[test]
    fn type_error_is_reported() {
        let result = validate_toml_str("[platform]\nversion = \"lollipop\"\n");
        assert!(find(&result, "type-error", "").is_some());
    }

    #[test]
    fn unknown_algorithm_is_a_warning_with_hint() {
        let result =
            validate_toml_str("[ciphers]\nstorage_cipher_algorithm = \"aes_gcm_nopadding\"\n");
        let d = find(&result, "unknown-algorithm", "ciphers.storage_cipher_algorithm").unwrap();
        assert_eq!(d.severity, Severity::Warning);
        assert!(d.message.contains("did you mean \"AES_GCM_NoPadding\""));
        assert!(!result.has_errors());
    }

    #[test]
    fn platform_zero_is_an_error() {
        let result = validate_toml_str("[platform]\nversion = 0\n");
        assert!(result.has_errors());
        assert!(find(&result, "platform", "platform.version").is_some());
    }

    #[test]
    fn unavailable_request_warns_about_default() {
        let result = validate_toml_str(
            "[platform]\nversion = 19\n[ciphers]\nkey_cipher_algorithm = \
             \"RSA_ECB_OAEPwithSHA_256andMGF1Padding\"\n",
        );
        let warnings: Vec<_> = result
            .diagnostics
            .iter()
            .filter(|d| d.path == "ciphers.key_cipher_algorithm")
            .collect();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].message.contains("used anyway"));
        assert!(warnings[0].message.contains("baseline-chain"));
    }

    #[test]
    fn unavailable_default_is_reported_without_request() {
        let result = validate_toml_str("[platform]\nversion = 19\n");
        for path in ["ciphers.key_cipher_algorithm", "ciphers.storage_cipher_algorithm"] {
            let d = find(&result, "platform", path).unwrap();
            assert_eq!(d.severity, Severity::Warning);
            assert!(d.message.contains("baseline-chain"));
        }
        assert!(!result.has_errors());

        let chained =
            validate_toml_str("[platform]\nversion = 19\n[ciphers]\nfallback = \"baseline-chain\"\n");
        let d = find(&chained, "platform", "ciphers.storage_cipher_algorithm").unwrap();
        assert!(d.message.contains("AES_CBC_PKCS7Padding will be used"));
    }

    #[test]
    fn baseline_chain_reports_replacement() {
        let result = validate_toml_str(
            "[platform]\nversion = 19\n[ciphers]\nfallback = \"baseline-chain\"\n\
             storage_cipher_algorithm = \"AES_GCM_NoPadding\"\n",
        );
        let warnings: Vec<_> = result
            .diagnostics
            .iter()
            .filter(|d| d.path == "ciphers.storage_cipher_algorithm")
            .collect();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].message.contains("AES_CBC_PKCS7Padding will be used"));
        assert_eq!(result.count(Severity::Info), 1);
    }

    #[test]
    fn small_keys_are_flagged() {
        let weak = validate_toml_str("[storage]\nkey_bits = 1024\n");
        assert_eq!(weak.count(Severity::Warning), 1);
        let broken = validate_toml_str("[storage]\nkey_bits = 512\n");
        assert!(broken.has_errors());
    }

    #[test]
    fn validates_yaml_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keysafe.yaml");
        std::fs::write(&path, "platform:\n  version: 0\n").unwrap();
        let result = validate(Some(path.as_path()));
        assert!(result.has_errors());
        assert_eq!(result.config_path.as_deref(), Some(path.as_path()));
    }

    #[test]
    fn unreadable_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.toml");
        let result = validate(Some(missing.as_path()));
        assert!(result.has_errors());
        assert_eq!(result.diagnostics[0].category, "syntax");
    }
}
