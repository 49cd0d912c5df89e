//! Transaction handle and bucket operations.
//!
//! A [`StoreTransaction`] wraps one engine transaction, read-only or
//! read-write, and exposes the bucket-scoped operations: initialize,
//! create, put, fetch, delete, scan. Buckets are logical namespaces inside
//! two physical redb tables:
//!
//! - `objects` maps `bucket ‖ 0x00 ‖ id` to the JSON payload;
//! - `bucket_sequences` maps bucket name to the last allocated id and
//!   doubles as the bucket registry — a bucket exists iff it has an entry.
//!
//! Write transactions commit all-or-nothing; read transactions observe a
//! consistent snapshot as of their start. The handle is consumed by
//! [`commit`](StoreTransaction::commit) / [`rollback`](StoreTransaction::rollback),
//! so no operation can run on a finished transaction.

use redb::{ReadTransaction, ReadableTable, TableDefinition, TableError, WriteTransaction};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{Error, Result};
use crate::keys::{bucket_end_key, bucket_start_key, decode_id, object_key, Id};

/// Physical table holding every bucket's objects under prefixed keys.
pub(crate) const OBJECTS: TableDefinition<'static, &[u8], &[u8]> = TableDefinition::new("objects");

/// Physical table holding each bucket's last allocated id.
pub(crate) const SEQUENCES: TableDefinition<'static, &str, u64> =
    TableDefinition::new("bucket_sequences");

/// A transaction against the store.
///
/// Obtained from [`Store::update`](crate::Store::update) /
/// [`Store::view`](crate::Store::view) (which finalize it automatically) or
/// from [`Store::begin_write`](crate::Store::begin_write) /
/// [`Store::begin_read`](crate::Store::begin_read) (which leave commit and
/// rollback to the caller). Dropping an uncommitted write transaction rolls
/// it back.
///
/// Note: we allow the `large_enum_variant` lint here because boxing the
/// write transaction would add indirection on every operation, and
/// transactions are short-lived.
#[allow(clippy::large_enum_variant)]
pub enum StoreTransaction {
    /// A read-only transaction over a consistent snapshot.
    Read(ReadTransaction),
    /// A read-write transaction.
    Write(WriteTransaction),
}

impl StoreTransaction {
    /// Wrap a read-only engine transaction.
    pub(crate) const fn new_read(tx: ReadTransaction) -> Self {
        Self::Read(tx)
    }

    /// Wrap a read-write engine transaction.
    pub(crate) const fn new_write(tx: WriteTransaction) -> Self {
        Self::Write(tx)
    }

    /// Check if this is a read-only transaction.
    #[must_use]
    pub const fn is_read_only(&self) -> bool {
        matches!(self, Self::Read(_))
    }

    /// Get the write transaction, or fail on a read-only one.
    fn write_tx(&self) -> Result<&WriteTransaction> {
        match self {
            Self::Write(tx) => Ok(tx),
            Self::Read(_) => Err(Error::ReadOnly),
        }
    }

    /// Create the named bucket if it does not exist.
    ///
    /// Idempotent: initializing an existing bucket is a no-op success.
    /// Every other operation on a bucket requires it to have been
    /// initialized, in this transaction or a previously committed one.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ReadOnly`] in a read-only transaction and
    /// [`Error::InvalidBucketName`] if `bucket` is empty or contains a NUL
    /// byte (the physical key separator).
    pub fn init_bucket(&mut self, bucket: &str) -> Result<()> {
        let tx = self.write_tx()?;

        if bucket.is_empty() || bucket.as_bytes().contains(&0) {
            return Err(Error::InvalidBucketName(bucket.to_string()));
        }

        let mut sequences = tx
            .open_table(SEQUENCES)
            .map_err(|e| Error::storage("open sequence table", e))?;
        let registered = sequences
            .get(bucket)
            .map_err(|e| Error::storage("read bucket registry", e))?
            .is_some();
        if !registered {
            sequences
                .insert(bucket, 0)
                .map_err(|e| Error::Write {
                    bucket: bucket.to_string(),
                    detail: format!("register bucket: {e}"),
                })?;
        }

        Ok(())
    }

    /// Check whether the named bucket has been initialized.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if the registry cannot be read.
    pub fn bucket_exists(&self, bucket: &str) -> Result<bool> {
        match self {
            Self::Read(tx) => match tx.open_table(SEQUENCES) {
                Ok(t) => Ok(t
                    .get(bucket)
                    .map_err(|e| Error::storage("read bucket registry", e))?
                    .is_some()),
                // No registry table means no bucket was ever initialized.
                Err(TableError::TableDoesNotExist(_)) => Ok(false),
                Err(e) => Err(Error::storage("open sequence table", e)),
            },
            Self::Write(tx) => {
                let t = tx
                    .open_table(SEQUENCES)
                    .map_err(|e| Error::storage("open sequence table", e))?;
                let exists = t
                    .get(bucket)
                    .map_err(|e| Error::storage("read bucket registry", e))?
                    .is_some();
                Ok(exists)
            }
        }
    }

    /// Fail with [`Error::NoSuchBucket`] unless the bucket is initialized.
    fn require_bucket(&self, bucket: &str) -> Result<()> {
        if self.bucket_exists(bucket)? {
            Ok(())
        } else {
            Err(Error::NoSuchBucket(bucket.to_string()))
        }
    }

    /// Allocate the next id in a bucket, build an object with it, and
    /// persist the object.
    ///
    /// This is the only path that allocates identifiers. The id handed to
    /// `build` is strictly greater than every id previously allocated in
    /// the bucket — including ids of since-deleted objects — and the first
    /// id in a fresh bucket is 1. The counter update commits or rolls back
    /// together with the rest of the transaction.
    ///
    /// Returns the object `build` produced.
    ///
    /// # Errors
    ///
    /// - [`Error::ReadOnly`] in a read-only transaction
    /// - [`Error::NoSuchBucket`] if the bucket was never initialized
    /// - [`Error::Sequence`] if the counter cannot be advanced
    /// - [`Error::Serialization`] if the object cannot be encoded
    /// - [`Error::Write`] if the engine write fails
    pub fn create<T, F>(&mut self, bucket: &str, build: F) -> Result<T>
    where
        T: Serialize,
        F: FnOnce(Id) -> T,
    {
        let tx = self.write_tx()?;

        let mut sequences = tx
            .open_table(SEQUENCES)
            .map_err(|e| Error::storage("open sequence table", e))?;
        let last = match sequences
            .get(bucket)
            .map_err(|e| Error::storage("read bucket sequence", e))?
        {
            Some(guard) => guard.value(),
            None => return Err(Error::NoSuchBucket(bucket.to_string())),
        };
        let next = last.checked_add(1).ok_or_else(|| Error::Sequence {
            bucket: bucket.to_string(),
            detail: "sequence exhausted".to_string(),
        })?;
        sequences.insert(bucket, next).map_err(|e| Error::Sequence {
            bucket: bucket.to_string(),
            detail: e.to_string(),
        })?;
        drop(sequences);

        let id = Id::new(next);
        let object = build(id);
        let bytes = serde_json::to_vec(&object).map_err(|e| Error::Serialization {
            bucket: bucket.to_string(),
            detail: e.to_string(),
        })?;

        let mut objects = tx
            .open_table(OBJECTS)
            .map_err(|e| Error::storage("open objects table", e))?;
        objects
            .insert(object_key(bucket, id).as_slice(), bytes.as_slice())
            .map_err(|e| Error::Write { bucket: bucket.to_string(), detail: e.to_string() })?;

        Ok(object)
    }

    /// Write an object at the given id, inserting or overwriting.
    ///
    /// The id does not have to exist already; `put` never allocates ids,
    /// it only stores under the one given.
    ///
    /// # Errors
    ///
    /// - [`Error::ReadOnly`] in a read-only transaction
    /// - [`Error::NoSuchBucket`] if the bucket was never initialized
    /// - [`Error::Serialization`] if the object cannot be encoded
    /// - [`Error::Write`] if the engine write fails
    pub fn put<T: Serialize>(&mut self, bucket: &str, id: Id, object: &T) -> Result<()> {
        let tx = self.write_tx()?;
        self.require_bucket(bucket)?;

        let bytes = serde_json::to_vec(object).map_err(|e| Error::Serialization {
            bucket: bucket.to_string(),
            detail: e.to_string(),
        })?;

        let mut objects = tx
            .open_table(OBJECTS)
            .map_err(|e| Error::storage("open objects table", e))?;
        objects
            .insert(object_key(bucket, id).as_slice(), bytes.as_slice())
            .map_err(|e| Error::Write { bucket: bucket.to_string(), detail: e.to_string() })?;

        Ok(())
    }

    /// Fetch the object stored at the given id.
    ///
    /// Returns `Ok(None)` if no object is stored under the id — absence is
    /// a normal outcome, not an error, and is distinct from
    /// [`Error::Deserialization`], which reports a present but undecodable
    /// value. Inside a write transaction this sees the transaction's own
    /// uncommitted writes.
    ///
    /// # Errors
    ///
    /// - [`Error::NoSuchBucket`] if the bucket was never initialized
    /// - [`Error::Deserialization`] if the stored value does not decode
    ///   into `T`
    pub fn fetch<T: DeserializeOwned>(&self, bucket: &str, id: Id) -> Result<Option<T>> {
        self.require_bucket(bucket)?;

        match self.read_object(&object_key(bucket, id))? {
            None => Ok(None),
            Some(raw) => serde_json::from_slice(&raw).map(Some).map_err(|e| {
                Error::Deserialization {
                    bucket: bucket.to_string(),
                    id,
                    detail: e.to_string(),
                }
            }),
        }
    }

    /// Delete the object stored at the given id.
    ///
    /// Deleting an absent id is a no-op success; the id is never reused
    /// either way.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ReadOnly`] in a read-only transaction,
    /// [`Error::NoSuchBucket`] if the bucket was never initialized, and
    /// [`Error::Write`] if the engine delete fails.
    pub fn delete(&mut self, bucket: &str, id: Id) -> Result<()> {
        let tx = self.write_tx()?;
        self.require_bucket(bucket)?;

        let mut objects = tx
            .open_table(OBJECTS)
            .map_err(|e| Error::storage("open objects table", e))?;
        objects
            .remove(object_key(bucket, id).as_slice())
            .map_err(|e| Error::Write { bucket: bucket.to_string(), detail: e.to_string() })?;

        Ok(())
    }

    /// List every object in a bucket in ascending id order.
    ///
    /// Ordering falls out of the key encoding: big-endian ids sort
    /// byte-lexicographically in numeric order.
    ///
    /// # Errors
    ///
    /// - [`Error::NoSuchBucket`] if the bucket was never initialized
    /// - [`Error::MalformedKey`] if a stored key is not 8 bytes
    /// - [`Error::Deserialization`] if a stored value does not decode
    ///   into `T`
    pub fn scan<T: DeserializeOwned>(&self, bucket: &str) -> Result<Vec<(Id, T)>> {
        self.require_bucket(bucket)?;

        let start = bucket_start_key(bucket);
        let end = bucket_end_key(bucket);
        let mut entries = Vec::new();

        match self {
            Self::Read(tx) => match tx.open_table(OBJECTS) {
                Ok(t) => {
                    let range = t
                        .range(start.as_slice()..end.as_slice())
                        .map_err(|e| Error::storage("scan bucket", e))?;
                    for entry in range {
                        let (k, v) = entry.map_err(|e| Error::storage("scan bucket", e))?;
                        let id = decode_id(&k.value()[start.len()..])?;
                        let object = serde_json::from_slice(v.value()).map_err(|e| {
                            Error::Deserialization {
                                bucket: bucket.to_string(),
                                id,
                                detail: e.to_string(),
                            }
                        })?;
                        entries.push((id, object));
                    }
                }
                // No objects table means nothing was ever written.
                Err(TableError::TableDoesNotExist(_)) => {}
                Err(e) => return Err(Error::storage("open objects table", e)),
            },
            Self::Write(tx) => {
                let t = tx
                    .open_table(OBJECTS)
                    .map_err(|e| Error::storage("open objects table", e))?;
                let range = t
                    .range(start.as_slice()..end.as_slice())
                    .map_err(|e| Error::storage("scan bucket", e))?;
                for entry in range {
                    let (k, v) = entry.map_err(|e| Error::storage("scan bucket", e))?;
                    let id = decode_id(&k.value()[start.len()..])?;
                    let object = serde_json::from_slice(v.value()).map_err(|e| {
                        Error::Deserialization {
                            bucket: bucket.to_string(),
                            id,
                            detail: e.to_string(),
                        }
                    })?;
                    entries.push((id, object));
                }
            }
        }

        Ok(entries)
    }

    /// Commit the transaction, making all writes durable.
    ///
    /// Committing a read-only transaction is a no-op success.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Commit`] if the engine commit fails; no writes
    /// from this transaction survive in that case.
    pub fn commit(self) -> Result<()> {
        match self {
            Self::Read(_) => Ok(()),
            Self::Write(tx) => tx.commit().map_err(|e| Error::Commit(e.to_string())),
        }
    }

    /// Roll back the transaction, discarding all writes.
    ///
    /// Dropping the handle has the same effect; this spelling is for
    /// clarity at call sites.
    pub fn rollback(self) {
        match self {
            Self::Read(_) => {}
            // Ignore abort chatter; the transaction is being thrown away.
            Self::Write(tx) => drop(tx.abort()),
        }
    }

    /// Read raw object bytes at a physical key.
    fn read_object(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        match self {
            Self::Read(tx) => match tx.open_table(OBJECTS) {
                Ok(t) => match t.get(key).map_err(|e| Error::storage("read object", e))? {
                    Some(guard) => Ok(Some(guard.value().to_vec())),
                    None => Ok(None),
                },
                // No objects table means nothing was ever written.
                Err(TableError::TableDoesNotExist(_)) => Ok(None),
                Err(e) => Err(Error::storage("open objects table", e)),
            },
            Self::Write(tx) => {
                let t = tx
                    .open_table(OBJECTS)
                    .map_err(|e| Error::storage("open objects table", e))?;
                let value = match t.get(key).map_err(|e| Error::storage("read object", e))? {
                    Some(guard) => Some(guard.value().to_vec()),
                    None => None,
                };
                Ok(value)
            }
        }
    }
}
