//! The codec's typed error taxonomy (see spec §7 / §10.2).
//!
//! The teacher crate (`zenit_lvl`) propagates everything through
//! `anyhow::Error`, which is fine for an in-process game asset loader where
//! every failure is fatal to the load. A persistence codec's callers need to
//! tell "the bytes are corrupt" apart from "the blob store is down" apart
//! from "a blob went missing and I've configured you to shrug it off", so
//! the public API surfaces two small `thiserror` enums instead.

use std::io;

/// Failure of the external blob store, split the way the spec requires so a
/// missing blob can be selectively downgraded to a warning (§4.5, §8.9).
#[derive(Debug, thiserror::Error)]
pub enum BlobError {
    #[error("blob not found")]
    MissingBlob,
    #[error("blob store I/O error: {0}")]
    Other(#[source] io::Error),
}

/// Errors surfaced by [`crate::reader::read`] and [`crate::read`].
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// The source ended in the middle of a field.
    #[error("bundle truncated")]
    Truncated,

    /// A sentinel, header bit pattern, or UTF-8 sequence was illegal.
    #[error("invalid bundle format: {0}")]
    InvalidFormat(String),

    /// The leading version byte wasn't 1, 2, or 3.
    #[error("unsupported bundle version: {0}")]
    UnsupportedVersion(u8),

    /// Failure reading a BINARY value from the blob store.
    #[error("blob store error: {0}")]
    BlobIo(#[source] BlobError),

    /// Failure reading a BINARY value from the content-addressed data store.
    #[error("data store error: {0}")]
    DataStoreIo(#[source] io::Error),

    /// An I/O error on the underlying transport that isn't a clean EOF.
    #[error("I/O error: {0}")]
    Io(#[source] io::Error),
}

impl DecodeError {
    /// Normalizes an I/O error from a primitive read into `Truncated` on a
    /// clean EOF, or `Io` otherwise - every VarCodec primitive read goes
    /// through this so truncation is never misreported as `Internal` or a
    /// silently short bundle (Testable Property 8).
    pub(crate) fn from_io(e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::UnexpectedEof => DecodeError::Truncated,
            _ => DecodeError::Io(e),
        }
    }
}

impl From<io::Error> for DecodeError {
    fn from(e: io::Error) -> Self {
        DecodeError::from_io(e)
    }
}

/// Errors surfaced by [`crate::writer::write`] and [`crate::write`].
#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    /// An invariant of the `Bundle` value passed to the writer didn't hold
    /// (e.g. a property's `values` and `blob_ids` lengths disagree).
    #[error("invalid bundle: {0}")]
    Internal(String),

    /// Failure writing a BINARY value to the blob store.
    #[error("blob store error: {0}")]
    BlobIo(#[source] BlobError),

    /// Failure writing a BINARY value to the content-addressed data store.
    #[error("data store error: {0}")]
    DataStoreIo(#[source] io::Error),

    /// An I/O error on the underlying transport.
    #[error("I/O error: {0}")]
    Io(#[source] io::Error),
}

impl From<io::Error> for EncodeError {
    fn from(e: io::Error) -> Self {
        EncodeError::Io(e)
    }
}
