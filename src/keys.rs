//! Identifier type and key encoding.
//!
//! Every object key is the 8-byte big-endian encoding of its [`Id`],
//! prefixed with the bucket name and a `0x00` separator:
//!
//! ```text
//! [bucket name][0x00][id as big-endian u64]
//! ```
//!
//! Big-endian fixed-width encoding makes lexicographic key order equal
//! numeric id order, so the engine's ordered iteration returns a bucket's
//! entries in ascending id order for free.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Length of an encoded identifier in bytes.
pub const KEY_LEN: usize = 8;

/// Separator byte between bucket name and id in a physical key.
///
/// Bucket names must not contain this byte; `init_bucket` enforces it.
pub(crate) const KEY_SEPARATOR: u8 = 0x00;

/// Unique identifier of an object within a bucket.
///
/// Ids are assigned by [`create`](crate::StoreTransaction::create) from the
/// bucket's durable sequence counter, starting at 1. They are strictly
/// increasing and never reused, even after deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Id(u64);

impl Id {
    /// Create a new `Id` from a raw u64 value.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the raw u64 value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl From<u64> for Id {
    fn from(id: u64) -> Self {
        Self::new(id)
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Encode an identifier as a fixed-width big-endian key.
#[inline]
#[must_use]
pub fn encode_id(id: Id) -> [u8; KEY_LEN] {
    id.as_u64().to_be_bytes()
}

/// Decode an identifier from its fixed-width big-endian encoding.
///
/// Validation is strict: input of any length other than 8 bytes fails with
/// [`Error::MalformedKey`] rather than trusting the engine's key invariant,
/// so a corrupted key surfaces as an error instead of a misread id.
#[inline]
pub fn decode_id(bytes: &[u8]) -> Result<Id> {
    let arr: [u8; KEY_LEN] =
        bytes.try_into().map_err(|_| Error::MalformedKey(bytes.len()))?;
    Ok(Id::new(u64::from_be_bytes(arr)))
}

/// Encode the physical key for an object in a bucket.
pub(crate) fn object_key(bucket: &str, id: Id) -> Vec<u8> {
    let mut key = Vec::with_capacity(bucket.len() + 1 + KEY_LEN);
    key.extend_from_slice(bucket.as_bytes());
    key.push(KEY_SEPARATOR);
    key.extend_from_slice(&encode_id(id));
    key
}

/// First physical key of a bucket's range.
pub(crate) fn bucket_start_key(bucket: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(bucket.len() + 1);
    key.extend_from_slice(bucket.as_bytes());
    key.push(KEY_SEPARATOR);
    key
}

/// First physical key past a bucket's range.
pub(crate) fn bucket_end_key(bucket: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(bucket.len() + 1);
    key.extend_from_slice(bucket.as_bytes());
    key.push(KEY_SEPARATOR + 1);
    key
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn id_roundtrip() {
        for raw in [0u64, 1, 42, u64::MAX] {
            let id = Id::new(raw);
            let decoded = decode_id(&encode_id(id)).expect("decode failed");
            assert_eq!(decoded, id);
        }
    }

    #[test]
    fn decode_rejects_wrong_lengths() {
        assert!(matches!(decode_id(&[]), Err(Error::MalformedKey(0))));
        assert!(matches!(decode_id(&[1, 2, 3]), Err(Error::MalformedKey(3))));
        assert!(matches!(decode_id(&[0; 9]), Err(Error::MalformedKey(9))));
    }

    #[test]
    fn object_key_layout() {
        let key = object_key("widgets", Id::new(1));
        assert_eq!(key.len(), "widgets".len() + 1 + KEY_LEN);
        assert_eq!(&key[..7], b"widgets");
        assert_eq!(key[7], KEY_SEPARATOR);
        assert_eq!(&key[8..], &[0, 0, 0, 0, 0, 0, 0, 1]);
    }

    #[test]
    fn object_keys_stay_inside_bucket_range() {
        let start = bucket_start_key("widgets");
        let end = bucket_end_key("widgets");

        let lowest = object_key("widgets", Id::new(0));
        let highest = object_key("widgets", Id::new(u64::MAX));
        assert!(lowest.as_slice() >= start.as_slice());
        assert!(highest.as_slice() < end.as_slice());

        // A key from another bucket falls outside the range.
        let other = object_key("zebras", Id::new(0));
        assert!(other.as_slice() >= end.as_slice());
    }

    proptest! {
        #[test]
        fn encoding_preserves_id_order(a in any::<u64>(), b in any::<u64>()) {
            let ka = encode_id(Id::new(a));
            let kb = encode_id(Id::new(b));
            prop_assert_eq!(a.cmp(&b), ka.cmp(&kb));
        }
    }
}
