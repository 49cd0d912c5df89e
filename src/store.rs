//! The store handle.
//!
//! [`Store`] exclusively owns the open engine database: opening the store
//! acquires the file, [`Store::close`] (or drop) releases it. All reads and
//! writes go through transactions obtained from the store.

use std::fs;
use std::path::Path;
use std::time::{Duration, Instant};

use redb::{Database, DatabaseError};
use tracing::{debug, trace};

use crate::config::{Config, StoreBuilder};
use crate::error::{Error, Result};
use crate::transaction::{StoreTransaction, OBJECTS, SEQUENCES};

/// How often to re-attempt acquisition of a locked store file.
const LOCK_RETRY_INTERVAL: Duration = Duration::from_millis(100);

/// A transactional object store backed by a single engine file.
///
/// The store hands out transactions; see [`StoreTransaction`] for the
/// bucket operations. `Store` is `Send + Sync` — share it across threads
/// with an `Arc`. The engine serializes writers: at most one
/// [`update`](Store::update) body runs at a time, while
/// [`view`](Store::view) snapshots run concurrently with each other and
/// with the writer.
///
/// # Example
///
/// ```ignore
/// use carton::Store;
///
/// let store = Store::open("data/app.carton")?;
/// store.update(|tx| tx.init_bucket("widgets"))?;
/// store.close()?;
/// ```
#[derive(Debug)]
pub struct Store {
    /// The underlying engine database.
    db: Database,
    /// The configuration used to open this store.
    config: Config,
}

impl Store {
    /// Open or create a store at the given path with default options.
    ///
    /// The parent directory is created if absent (recursively, owner-only
    /// permissions on Unix) and the store file is created owner-only. If
    /// another process holds the store file, acquisition is retried until
    /// the default timeout elapses.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DirectoryCreation`] if the parent directory cannot
    /// be created and [`Error::Open`] if the engine file cannot be opened,
    /// including the lock-timeout case.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::builder().path(path.as_ref()).open()
    }

    /// Open a volatile in-memory store.
    ///
    /// Useful for tests; all data is lost when the store is dropped.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Open`] if the in-memory engine cannot be created.
    pub fn in_memory() -> Result<Self> {
        StoreBuilder::in_memory().open()
    }

    /// Returns a builder for opening a store with custom configuration.
    #[must_use]
    pub fn builder() -> StoreBuilder {
        StoreBuilder::new()
    }

    /// Open the store described by `config`.
    ///
    /// This is typically called through [`StoreBuilder::open`].
    pub(crate) fn open_with_config(config: Config) -> Result<Self> {
        let db = if config.in_memory {
            Database::builder()
                .create_with_backend(redb::backends::InMemoryBackend::new())
                .map_err(|e| Error::Open(e.to_string()))?
        } else {
            ensure_parent_dir(&config.path)?;
            ensure_store_file(&config.path)?;
            open_with_deadline(&config)?
        };

        let store = Self { db, config };
        store.init_tables()?;
        debug!(
            path = %store.config.path.display(),
            in_memory = store.config.in_memory,
            "store opened"
        );
        Ok(store)
    }

    /// Get the configuration used to open this store.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Begin a read-only transaction over a consistent snapshot.
    ///
    /// The snapshot is fixed at this call; concurrent commits are not
    /// visible through the returned handle.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if the engine cannot start the
    /// transaction.
    pub fn begin_read(&self) -> Result<StoreTransaction> {
        let tx = self
            .db
            .begin_read()
            .map_err(|e| Error::storage("begin read transaction", e))?;
        Ok(StoreTransaction::new_read(tx))
    }

    /// Begin a read-write transaction.
    ///
    /// Blocks while another write transaction is in flight; the engine
    /// admits one writer at a time. The caller owns commit and rollback;
    /// dropping the handle uncommitted rolls back.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if the engine cannot start the
    /// transaction.
    pub fn begin_write(&self) -> Result<StoreTransaction> {
        let tx = self
            .db
            .begin_write()
            .map_err(|e| Error::storage("begin write transaction", e))?;
        Ok(StoreTransaction::new_write(tx))
    }

    /// Run `f` inside a read-write transaction.
    ///
    /// If `f` returns `Ok`, the transaction commits and the value is
    /// returned; a failed commit surfaces as
    /// [`Error::Commit`] (converted into `E`) with every write discarded.
    /// If `f` returns `Err`, the transaction rolls back — none of its
    /// writes survive — and the error is propagated unchanged.
    ///
    /// `E` is the caller's error type; anything that can absorb a store
    /// error via `From<Error>` works, including [`Error`] itself.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let id = store.update(|tx| {
    ///     tx.init_bucket("widgets")?;
    ///     tx.create("widgets", |id| id)
    /// })?;
    /// ```
    pub fn update<T, E>(&self, f: impl FnOnce(&mut StoreTransaction) -> std::result::Result<T, E>) -> std::result::Result<T, E>
    where
        E: From<Error>,
    {
        let mut trx = self.begin_write().map_err(E::from)?;
        match f(&mut trx) {
            Ok(value) => {
                trx.commit().map_err(E::from)?;
                Ok(value)
            }
            Err(err) => {
                trace!("rolling back write transaction after caller error");
                trx.rollback();
                Err(err)
            }
        }
    }

    /// Run `f` inside a read-only transaction over a consistent snapshot.
    ///
    /// The transaction is discarded afterward regardless of outcome —
    /// read-only transactions have nothing to commit. Many views may run
    /// concurrently, each pinned to the database state as of its own
    /// start.
    pub fn view<T, E>(&self, f: impl FnOnce(&mut StoreTransaction) -> std::result::Result<T, E>) -> std::result::Result<T, E>
    where
        E: From<Error>,
    {
        let mut trx = self.begin_read().map_err(E::from)?;
        let result = f(&mut trx);
        trx.rollback();
        result
    }

    /// Close the store, releasing the engine file.
    ///
    /// Consuming `self` makes use-after-close and double-close
    /// unrepresentable; dropping the store without calling `close` releases
    /// the engine just the same. All committed transactions are already
    /// durable, and the redb engine reports no close-time failure, so with
    /// this backend the call always succeeds.
    pub fn close(self) -> Result<()> {
        debug!(path = %self.config.path.display(), "store closed");
        drop(self.db);
        Ok(())
    }

    /// Eagerly create the physical tables so read transactions never
    /// observe them missing.
    fn init_tables(&self) -> Result<()> {
        let tx = self
            .db
            .begin_write()
            .map_err(|e| Error::Open(format!("begin setup transaction: {e}")))?;
        {
            tx.open_table(OBJECTS)
                .map_err(|e| Error::Open(format!("create objects table: {e}")))?;
            tx.open_table(SEQUENCES)
                .map_err(|e| Error::Open(format!("create sequence table: {e}")))?;
        }
        tx.commit().map_err(|e| Error::Open(format!("commit setup transaction: {e}")))
    }
}

/// Create the parent directory of the store file, owner-only on Unix.
fn ensure_parent_dir(path: &Path) -> Result<()> {
    let Some(parent) = path.parent() else { return Ok(()) };
    if parent.as_os_str().is_empty() {
        return Ok(());
    }

    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o700);
    }
    builder
        .create(parent)
        .map_err(|source| Error::DirectoryCreation { path: parent.to_path_buf(), source })
}

/// Create the store file owner-only if it does not exist yet.
///
/// The engine creates missing files itself, but without a mode; an
/// existing file keeps whatever permissions it has.
fn ensure_store_file(path: &Path) -> Result<()> {
    let mut options = fs::OpenOptions::new();
    options.read(true).write(true).create(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    options
        .open(path)
        .map(drop)
        .map_err(|e| Error::Open(format!("create store file {}: {e}", path.display())))
}

/// Open the engine database, retrying while the file lock is held until
/// the configured deadline.
fn open_with_deadline(config: &Config) -> Result<Database> {
    let deadline = Instant::now() + config.open_timeout;
    loop {
        let mut builder = Database::builder();
        if let Some(cache_size) = config.cache_size {
            builder.set_cache_size(cache_size);
        }
        match builder.create(&config.path) {
            Ok(db) => return Ok(db),
            Err(DatabaseError::DatabaseAlreadyOpen) => {
                if Instant::now() >= deadline {
                    return Err(Error::Open(format!(
                        "timed out waiting for lock on {} after {:?}",
                        config.path.display(),
                        config.open_timeout
                    )));
                }
                std::thread::sleep(LOCK_RETRY_INTERVAL);
            }
            Err(e) => return Err(Error::Open(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_memory_store_opens() {
        let store = Store::in_memory().expect("failed to open in-memory store");
        assert!(store.config().in_memory);
    }

    #[test]
    fn begin_read_is_read_only() {
        let store = Store::in_memory().expect("failed to open in-memory store");
        let tx = store.begin_read().expect("failed to begin read");
        assert!(tx.is_read_only());
        tx.rollback();
    }

    #[test]
    fn begin_write_is_not_read_only() {
        let store = Store::in_memory().expect("failed to open in-memory store");
        let tx = store.begin_write().expect("failed to begin write");
        assert!(!tx.is_read_only());
        tx.rollback();
    }
}
