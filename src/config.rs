//! Store configuration and builder.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::Result;
use crate::store::Store;

/// Default bound on waiting for the engine file lock at open.
pub const DEFAULT_OPEN_TIMEOUT: Duration = Duration::from_secs(10);

/// Configuration for opening a [`Store`].
///
/// Pure data; all validation happens when the store is opened.
#[derive(Debug, Clone)]
pub struct Config {
    /// Filesystem location of the single store file.
    pub path: PathBuf,

    /// Use a volatile in-memory engine instead of a file. Data is lost
    /// when the store is dropped; `path` is ignored.
    pub in_memory: bool,

    /// How long to wait for the engine file lock before giving up.
    ///
    /// Another process (or another `Store` in this one) holding the store
    /// file open blocks acquisition; past this deadline open fails instead
    /// of waiting forever.
    pub open_timeout: Duration,

    /// Engine cache size in bytes. `None` uses the engine's default.
    pub cache_size: Option<usize>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            path: PathBuf::new(),
            in_memory: false,
            open_timeout: DEFAULT_OPEN_TIMEOUT,
            cache_size: None,
        }
    }
}

/// Builder for opening a [`Store`] with custom configuration.
///
/// # Example
///
/// ```ignore
/// use std::time::Duration;
/// use carton::Store;
///
/// let store = Store::builder()
///     .path("data/widgets.carton")
///     .open_timeout(Duration::from_secs(2))
///     .cache_size(64 * 1024 * 1024)
///     .open()?;
/// ```
#[derive(Debug, Default)]
pub struct StoreBuilder {
    config: Config,
}

impl StoreBuilder {
    /// Create a builder with default options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a builder for an in-memory store.
    #[must_use]
    pub fn in_memory() -> Self {
        Self { config: Config { in_memory: true, ..Config::default() } }
    }

    /// Set the store file path.
    #[must_use]
    pub fn path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.path = path.into();
        self
    }

    /// Set the bound on waiting for the engine file lock.
    #[must_use]
    pub const fn open_timeout(mut self, timeout: Duration) -> Self {
        self.config.open_timeout = timeout;
        self
    }

    /// Set the engine cache size in bytes.
    #[must_use]
    pub const fn cache_size(mut self, bytes: usize) -> Self {
        self.config.cache_size = Some(bytes);
        self
    }

    /// Open the store with this configuration.
    ///
    /// # Errors
    ///
    /// See [`Store::open`].
    pub fn open(self) -> Result<Store> {
        Store::open_with_config(self.config)
    }
}
