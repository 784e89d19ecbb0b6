//! Trait interfaces for the external services the codec borrows but never
//! owns (spec §5 "External resources", §6).
//!
//! The teacher crate never talks to an external store - `zenit_lvl` reads
//! everything from one self-contained chunk stream. These traits exist
//! purely because this format offloads large BINARY values outside the
//! bundle itself; they're deliberately narrow (one verb each) so a caller
//! can back them with anything from a local directory to a network blob
//! service.

use std::io::{self, Read};

use crate::error::BlobError;

/// Content-addressed storage for large BINARY values that overflow
/// `minBlobSize` when no data store is configured (spec §4.5).
pub trait BlobStore {
    /// Mints a fresh, as-yet-unused blob id.
    fn create_id(&mut self) -> Result<String, BlobError>;

    /// Stores `bytes` under `id`, replacing any prior content.
    fn put(&mut self, id: &str, bytes: &[u8]) -> Result<(), BlobError>;

    /// Fetches the bytes stored under `id`. `Err(BlobError::MissingBlob)` iff
    /// no such id is known (spec §8.9, MissingBlob policy).
    fn get(&mut self, id: &str) -> Result<Vec<u8>, BlobError>;

    /// Removes `id`, if present. Used by callers that GC orphaned blobs;
    /// the codec itself never calls this.
    fn remove(&mut self, id: &str) -> Result<(), BlobError>;
}

/// A record-oriented content-addressed store that can also hold small
/// values inline (spec §4.5, branch 1).
pub trait DataStore {
    /// Below this length, the BinaryPlacer inlines the value instead of
    /// calling [`DataStore::store`].
    fn min_record_length(&self) -> u64;

    /// Consumes `stream` and returns the content id it was stored under.
    fn store(&mut self, stream: &mut dyn Read) -> io::Result<String>;

    /// Opens a readable stream for a previously stored content id.
    fn open_stream(&mut self, id: &str) -> io::Result<Box<dyn Read + '_>>;
}

/// External lookup services used by the V1/V2 legacy reader, which stores
/// names as small integer indices into tables it doesn't own (spec §4.7).
pub trait StringIndex {
    fn namespace_uri(&self, index: i32) -> Option<&str>;
    fn local_name(&self, index: i32) -> Option<&str>;
}

/// An in-memory [`StringIndex`] for tests and small embedders, backed by
/// plain `Vec<String>` tables indexed positionally.
#[derive(Debug, Default, Clone)]
pub struct VecStringIndex {
    pub namespaces: Vec<String>,
    pub local_names: Vec<String>,
}

impl StringIndex for VecStringIndex {
    fn namespace_uri(&self, index: i32) -> Option<&str> {
        usize::try_from(index)
            .ok()
            .and_then(|i| self.namespaces.get(i))
            .map(String::as_str)
    }

    fn local_name(&self, index: i32) -> Option<&str> {
        usize::try_from(index)
            .ok()
            .and_then(|i| self.local_names.get(i))
            .map(String::as_str)
    }
}
