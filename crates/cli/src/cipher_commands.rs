//! `keysafe algorithms|negotiate|commit|clear|encrypt|decrypt`.

use {
    anyhow::{Context, Result},
    base64::Engine,
    keysafe_ciphers::{
        Algorithm, CipherContext, CipherNegotiator, CipherSuite, FileKeystore,
        FileSettings, KeyCipherAlgorithm, NegotiationResult, PlatformVersion, SettingsStore,
        StorageCipherAlgorithm, registry,
    },
    keysafe_config::KeysafeConfig,
};

const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const DIM: &str = "\x1b[2m";
const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";

/// File-backed settings and keystore resolved from `[storage]`.
struct Store {
    settings: FileSettings,
    keystore: FileKeystore,
}

impl Store {
    fn open(config: &KeysafeConfig) -> Result<Self> {
        let settings_path = config.storage.settings_path();
        let keystore_dir = config.storage.keystore_dir();
        let settings = FileSettings::open(&settings_path)
            .with_context(|| format!("opening settings {}", settings_path.display()))?;
        let keystore = FileKeystore::with_key_bits(&keystore_dir, config.storage.key_bits)
            .with_context(|| format!("opening keystore {}", keystore_dir.display()))?;
        Ok(Self { settings, keystore })
    }

    fn context(&self) -> CipherContext<'_> {
        CipherContext::new(&self.keystore, &self.settings)
    }
}

fn negotiate_with(
    config: &KeysafeConfig,
    settings: &dyn SettingsStore,
) -> Result<(CipherNegotiator, NegotiationResult)> {
    let negotiator = config.negotiator();
    let result = negotiator.negotiate(settings, &config.ciphers.to_options())?;
    Ok((negotiator, result))
}

// ── algorithms ──────────────────────────────────────────────────────────────

pub fn algorithms(config: &KeysafeConfig) -> Result<()> {
    let platform = config.platform.resolved();
    println!("{BOLD}Platform {platform}{RESET}\n");

    println!("{BOLD}Key ciphers{RESET}");
    print_catalog::<KeyCipherAlgorithm>(platform);
    println!("\n{BOLD}Storage ciphers{RESET}");
    print_catalog::<StorageCipherAlgorithm>(platform);
    Ok(())
}

fn print_catalog<A: Algorithm>(platform: PlatformVersion) {
    for descriptor in registry::catalog::<A>() {
        let alg = descriptor.algorithm;
        let (color, status) = if alg.is_available(platform) {
            (GREEN, "available")
        } else {
            (YELLOW, "unavailable")
        };
        let default = if alg == A::DEFAULT {
            " (default)"
        } else {
            ""
        };
        println!(
            "  {:<40} {DIM}min {:>2}{RESET}  {color}{status}{RESET}{default}",
            descriptor.identifier,
            descriptor.min_version.get()
        );
    }
}

// ── negotiate / commit / clear ──────────────────────────────────────────────

pub fn negotiate(config: &KeysafeConfig, json: bool) -> Result<()> {
    let store = Store::open(config)?;
    let (negotiator, result) = negotiate_with(config, &store.settings)?;

    if json {
        let out = serde_json::json!({
            "platform": negotiator.platform(),
            "fallback": negotiator.fallback(),
            "saved": result.saved(),
            "current": result.current(),
            "requires_re_encryption": result.requires_re_encryption(),
            "state": result.state(),
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!("Saved:   {}", result.saved());
    println!("Current: {}", result.current());
    if result.requires_re_encryption() {
        println!("{YELLOW}Store needs migration{RESET} (re-encrypt entries, then run `keysafe commit`)");
    } else {
        println!("{GREEN}Store is stable{RESET}");
    }
    Ok(())
}

pub fn commit(config: &KeysafeConfig) -> Result<()> {
    let store = Store::open(config)?;
    let (negotiator, result) = negotiate_with(config, &store.settings)?;
    if !result.requires_re_encryption() {
        println!("Already committed: {}", result.current());
        return Ok(());
    }
    negotiator.persist_current(&store.settings, &result)?;
    println!("Committed {}", result.current());
    Ok(())
}

pub fn clear(config: &KeysafeConfig) -> Result<()> {
    let store = Store::open(config)?;
    config.negotiator().clear_persisted(&store.settings)?;
    println!("Cleared persisted algorithms.");
    Ok(())
}

// ── encrypt / decrypt ───────────────────────────────────────────────────────

fn suite(config: &KeysafeConfig, store: &Store, saved: bool) -> Result<CipherSuite> {
    let (negotiator, result) = negotiate_with(config, &store.settings)?;
    let ctx = store.context();
    let suite = if saved {
        negotiator.saved_ciphers(&ctx, &result)?
    } else {
        negotiator.current_ciphers(&ctx, &result)?
    };
    Ok(suite)
}

pub fn encrypt(config: &KeysafeConfig, text: &str, saved: bool) -> Result<()> {
    let store = Store::open(config)?;
    let ciphertext = suite(config, &store, saved)?.encrypt(text.as_bytes())?;
    println!("{}", base64::engine::general_purpose::STANDARD.encode(ciphertext));
    Ok(())
}

pub fn decrypt(config: &KeysafeConfig, ciphertext: &str, saved: bool) -> Result<()> {
    let store = Store::open(config)?;
    let raw = base64::engine::general_purpose::STANDARD
        .decode(ciphertext.trim())
        .context("ciphertext is not valid base64")?;
    let plaintext = suite(config, &store, saved)?.decrypt(&raw)?;
    println!("{}", String::from_utf8_lossy(&plaintext));
    Ok(())
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, keysafe_ciphers::AlgorithmPair};

    fn config_in(dir: &std::path::Path) -> KeysafeConfig {
        let mut config = KeysafeConfig::default();
        config.storage.settings_path = Some(dir.join("settings.json"));
        config.storage.keystore_dir = Some(dir.join("keys"));
        config.storage.key_bits = 1024;
        config
    }

    #[test]
    fn current_suite_round_trips_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());

        let ciphertext = {
            let store = Store::open(&config).unwrap();
            suite(&config, &store, false).unwrap().encrypt(b"hunter2").unwrap()
        };

        let store = Store::open(&config).unwrap();
        let plain = suite(&config, &store, false).unwrap().decrypt(&ciphertext).unwrap();
        assert_eq!(plain, b"hunter2");
        assert!(dir.path().join("keys").join("keysafe.rsa.oaep.pem").exists());
    }

    #[test]
    fn legacy_request_needs_migration_until_committed() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config_in(dir.path());
        config.ciphers.key_cipher_algorithm = Some("RSA_ECB_PKCS1Padding".into());
        config.ciphers.storage_cipher_algorithm = Some("AES_CBC_PKCS7Padding".into());

        let store = Store::open(&config).unwrap();
        let (_, result) = negotiate_with(&config, &store.settings).unwrap();
        assert!(result.requires_re_encryption());
        assert_eq!(result.current(), AlgorithmPair::LEGACY);

        commit(&config).unwrap();
        let (_, result) = negotiate_with(&config, &store.settings).unwrap();
        assert!(!result.requires_re_encryption());
        assert_eq!(result.saved(), AlgorithmPair::LEGACY);

        clear(&config).unwrap();
        let (_, result) = negotiate_with(&config, &store.settings).unwrap();
        assert_eq!(result.saved(), AlgorithmPair::DEFAULT);
    }
}
