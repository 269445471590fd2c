use std::fmt;

use ed25519_dalek::VerifyingKey;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Account address: lowercase hex of the first 20 bytes of a SHA-256 digest
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Address(String);

impl Address {
    pub const LEN: usize = 20;

    pub fn from_pubkey(key: &VerifyingKey) -> Self {
        Self::from_digest(key.as_bytes())
    }

    /// Address of a module-owned account such as the fee collector
    pub fn module(name: &str) -> Self {
        Self::from_digest(format!("module/{}", name).as_bytes())
    }

    /// Wraps an already formatted address without checking it
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Address(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn from_digest(input: &[u8]) -> Self {
        let digest = Sha256::digest(input);
        Address(hex::encode(&digest[..Self::LEN]))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
