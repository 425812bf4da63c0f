//! Collaborators handed to cipher factories.

use crate::{keystore::DeviceKeystore, settings::SettingsStore};

/// What a factory needs to build a cipher on this device.
///
/// Key ciphers draw their private key from `keystore`; storage ciphers keep
/// their wrapped data key in `settings`.
#[derive(Clone, Copy)]
pub struct CipherContext<'a> {
    pub keystore: &'a dyn DeviceKeystore,
    pub settings: &'a dyn SettingsStore,
}

impl<'a> CipherContext<'a> {
    pub fn new(keystore: &'a dyn DeviceKeystore, settings: &'a dyn SettingsStore) -> Self {
        Self { keystore, settings }
    }
}
