//! Platform capability version used for algorithm gating.

use std::fmt;

/// Integer capability level of the host platform.
///
/// Only ever compared against an algorithm's minimum version; it carries no
/// other meaning.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(transparent)]
pub struct PlatformVersion(u32);

impl PlatformVersion {
    /// Oldest supported platform. Legacy algorithms are available from here.
    pub const BASELINE: Self = Self(1);

    /// First release whose keystore offers RSA/OAEP and AES/GCM.
    pub const MODERN_CIPHERS: Self = Self(23);

    pub const fn new(version: u32) -> Self {
        Self(version)
    }

    pub const fn get(self) -> u32 {
        self.0
    }
}

impl Default for PlatformVersion {
    fn default() -> Self {
        Self::MODERN_CIPHERS
    }
}

impl From<u32> for PlatformVersion {
    fn from(version: u32) -> Self {
        Self(version)
    }
}

impl fmt::Display for PlatformVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_follows_integer() {
        assert!(PlatformVersion::BASELINE < PlatformVersion::MODERN_CIPHERS);
        assert!(PlatformVersion::new(30) > PlatformVersion::MODERN_CIPHERS);
        assert_eq!(PlatformVersion::from(23), PlatformVersion::MODERN_CIPHERS);
    }

    #[test]
    fn serializes_as_plain_integer() {
        let json = serde_json::to_string(&PlatformVersion::new(28)).unwrap();
        assert_eq!(json, "28");
    }
}
