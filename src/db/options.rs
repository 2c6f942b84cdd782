use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Key prefix reserved for always-durable writes unless configured otherwise.
pub const DEFAULT_PERSISTENT_PREFIX: &[u8] = b"validatorsKey";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheOptions {
    /// Keys starting with any of these prefixes skip generational buffering
    /// and are written to the store synchronously.
    pub persistent_prefixes: Vec<Vec<u8>>,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            persistent_prefixes: vec![DEFAULT_PERSISTENT_PREFIX.to_vec()],
        }
    }
}

impl CacheOptions {
    pub fn is_persistent_key(&self, key: &[u8]) -> bool {
        self.persistent_prefixes
            .iter()
            .any(|prefix| key.starts_with(prefix))
    }

    pub fn with_persistent_prefix(mut self, prefix: impl Into<Bytes>) -> Self {
        self.persistent_prefixes.push(prefix.into().to_vec());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreOptions {
    pub create_if_missing: bool,
    pub read_only: bool,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            create_if_missing: true,
            read_only: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteOptions {
    pub sync: bool,
}

impl WriteOptions {
    pub const SYNC: Self = Self { sync: true };
    pub const NO_SYNC: Self = Self { sync: false };
}
