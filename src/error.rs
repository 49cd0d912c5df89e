//! Error types for Carton.

use std::path::PathBuf;

use thiserror::Error;

use crate::keys::Id;

/// Errors that can occur when using a Carton store.
#[derive(Debug, Error)]
pub enum Error {
    /// The parent directory of the store file could not be created.
    #[error("failed to create store directory {path}: {source}")]
    DirectoryCreation {
        /// The directory that could not be created.
        path: PathBuf,
        /// The underlying filesystem error.
        #[source]
        source: std::io::Error,
    },

    /// The store could not be opened, including the case where the file
    /// lock could not be acquired within the configured timeout.
    #[error("failed to open store: {0}")]
    Open(String),

    /// The store could not be closed cleanly.
    ///
    /// Not produced by the redb engine, which makes commits durable at
    /// commit time and reports no close-time failure.
    #[error("failed to close store: {0}")]
    Close(String),

    /// An operation targeted a bucket that was never initialized.
    #[error("no such bucket: {0}")]
    NoSuchBucket(String),

    /// A bucket name was empty or contained a NUL byte.
    #[error("invalid bucket name {0:?}")]
    InvalidBucketName(String),

    /// The next identifier for a bucket could not be allocated.
    #[error("failed to allocate id in bucket {bucket}: {detail}")]
    Sequence {
        /// The bucket whose sequence failed.
        bucket: String,
        /// What went wrong.
        detail: String,
    },

    /// An object could not be serialized for storage.
    #[error("failed to serialize object for bucket {bucket}: {detail}")]
    Serialization {
        /// The bucket the object was bound for.
        bucket: String,
        /// The encoder's message.
        detail: String,
    },

    /// A stored value could not be deserialized into the requested type.
    ///
    /// Distinct from a missing entry, which [`fetch`](crate::StoreTransaction::fetch)
    /// reports as `Ok(None)`.
    #[error("failed to deserialize object {id} in bucket {bucket}: {detail}")]
    Deserialization {
        /// The bucket the object was read from.
        bucket: String,
        /// The identifier of the undecodable object.
        id: Id,
        /// The decoder's message.
        detail: String,
    },

    /// A write into a bucket failed at the engine level.
    #[error("failed to write to bucket {bucket}: {detail}")]
    Write {
        /// The bucket being written.
        bucket: String,
        /// The engine's message.
        detail: String,
    },

    /// A transaction could not be committed; none of its writes survive.
    #[error("failed to commit transaction: {0}")]
    Commit(String),

    /// A write operation was attempted on a read-only transaction.
    #[error("cannot write in read-only transaction")]
    ReadOnly,

    /// An object key did not have the fixed 8-byte encoding.
    #[error("malformed object key: expected 8 bytes, got {0}")]
    MalformedKey(usize),

    /// A residual engine failure (beginning a transaction, opening a
    /// table, reading a value).
    #[error("storage error: {0}")]
    Storage(String),
}

impl Error {
    /// Returns `true` if this error reports an uninitialized bucket.
    #[must_use]
    pub const fn is_no_such_bucket(&self) -> bool {
        matches!(self, Self::NoSuchBucket(_))
    }

    /// Wrap an engine failure with the operation that triggered it.
    pub(crate) fn storage(operation: &str, err: impl std::fmt::Display) -> Self {
        Self::Storage(format!("{operation}: {err}"))
    }
}

/// A specialized `Result` type for Carton operations.
pub type Result<T> = std::result::Result<T, Error>;
