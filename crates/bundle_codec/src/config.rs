//! The codec's recognized configuration knobs (spec §6 / §10.3).
//!
//! Plain data, constructed by the embedding application. The codec never
//! reads a config file or an environment variable on its own.

/// Default threshold above which a BINARY value written via the blob-store
/// path is offloaded rather than inlined (spec §4.5).
pub const DEFAULT_MIN_BLOB_SIZE: u64 = 0x4000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodecConfig {
    /// Threshold above which a binary value written via the blob-store path
    /// is offloaded instead of inlined. Default `0x4000` (16384).
    pub min_blob_size: u64,

    /// Enables [`crate::safe_writer::write_verified`]'s write-then-read-back
    /// verification. Default `false`.
    pub verify_bundles: bool,

    /// If [`CodecConfig::verify_bundles`] is set and every verification
    /// attempt still mismatches, emit the last attempt's bytes anyway
    /// instead of failing the write. Default `false`.
    pub allow_broken_bundles: bool,

    /// On a missing blob during read, substitute empty bytes and log a
    /// warning instead of failing. Default `false`.
    pub ignore_missing_blobs: bool,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            min_blob_size: DEFAULT_MIN_BLOB_SIZE,
            verify_bundles: false,
            allow_broken_bundles: false,
            ignore_missing_blobs: false,
        }
    }
}
