use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Where the object table lives.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageLocation {
    /// Private in-memory database, discarded when the store is closed
    #[default]
    Memory,
    /// Database file on disk
    File(PathBuf),
}

impl StorageLocation {
    pub const MEMORY_PATH: &'static str = ":memory:";

    pub fn is_memory(&self) -> bool {
        matches!(self, Self::Memory)
    }
}

/// Store connection configuration
///
/// Everything the store needs at connect time: storage location, statement
/// tracing, object cache capacity and write-ahead logging.
#[derive(Debug, Clone, Deserialize)]
pub struct ConnectionConfig {
    /// Storage location (in-memory or file)
    #[serde(default)]
    pub location: StorageLocation,

    /// Log every executed statement at debug level
    #[serde(default)]
    pub debug: bool,

    /// Object cache capacity; 0 disables caching
    #[serde(default = "default_cache_size")]
    pub cache_size: usize,

    /// Enable write-ahead logging
    #[serde(default = "default_use_wal")]
    pub use_wal: bool,
}

fn default_cache_size() -> usize {
    1000
}

fn default_use_wal() -> bool {
    true
}

impl ConnectionConfig {
    /// Create a configuration for a private in-memory store
    pub fn in_memory() -> Self {
        Self {
            location: StorageLocation::Memory,
            debug: false,
            cache_size: default_cache_size(),
            use_wal: default_use_wal(),
        }
    }

    /// Create a configuration for a file-backed store
    pub fn file(path: impl AsRef<Path>) -> Self {
        Self::in_memory().location(StorageLocation::File(path.as_ref().to_path_buf()))
    }

    /// Parse a storage path; `":memory:"` (or an empty string) selects an in-memory store
    ///
    /// # Examples
    ///
    /// ```
    /// use jsonpersist::{ConnectionConfig, StorageLocation};
    ///
    /// let config = ConnectionConfig::from_path(":memory:");
    /// assert_eq!(config.location, StorageLocation::Memory);
    /// ```
    pub fn from_path(path: &str) -> Self {
        let trimmed = path.trim();
        if trimmed.is_empty() || trimmed == StorageLocation::MEMORY_PATH {
            Self::in_memory()
        } else {
            Self::file(trimmed)
        }
    }

    /// Set the storage location
    pub fn location(mut self, location: StorageLocation) -> Self {
        self.location = location;
        self
    }

    /// Enable or disable statement tracing
    pub fn debug(mut self, enabled: bool) -> Self {
        self.debug = enabled;
        self
    }

    /// Set object cache capacity
    pub fn cache_size(mut self, capacity: usize) -> Self {
        self.cache_size = capacity;
        self
    }

    /// Enable or disable write-ahead logging
    pub fn use_wal(mut self, enabled: bool) -> Self {
        self.use_wal = enabled;
        self
    }

    /// Human-readable location, used in logs
    pub fn describe_location(&self) -> String {
        match &self.location {
            StorageLocation::Memory => StorageLocation::MEMORY_PATH.to_string(),
            StorageLocation::File(path) => path.display().to_string(),
        }
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self::in_memory()
    }
}
