//! BinaryPlacer: the three-tier decision of where a BINARY property value's
//! bytes actually live on the wire (spec §4.5).
//!
//! Nothing in the teacher crate externalizes payloads this way - every
//! chunk field in `zenit_lvl` is inline - so this module is grounded
//! directly on the source's own description rather than adapted from a
//! teacher file; see DESIGN.md.

use std::io::{self, Read, Write};

use crate::config::CodecConfig;
use crate::error::{BlobError, DecodeError, EncodeError};
use crate::stores::{BlobStore, DataStore};
use crate::varint::{read_i32, read_utf8, write_i32, write_utf8};

/// Sentinel written in place of an inline length when the value lives in a
/// blob store.
pub const BINARY_IN_BLOB_STORE: i32 = -1;
/// Sentinel written in place of an inline length when the value lives in a
/// content-addressed data store.
pub const BINARY_IN_DATA_STORE: i32 = -2;

/// Where a decoded BINARY value's bytes were found. Replaces the source's
/// inheritance hierarchy of binary-value subclasses (spec §9, "Inheritance
/// replaced by tagged variants") with a plain enum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlacedBinary {
    Inline(Vec<u8>),
    InBlobStore(String),
    InDataStore(String),
}

impl PlacedBinary {
    pub fn bytes(&self) -> Option<&[u8]> {
        match self {
            PlacedBinary::Inline(b) => Some(b),
            _ => None,
        }
    }
}

/// Borrowed store handles for a single write call (spec §5, "External
/// resources" - borrowed for the call, never retained).
pub struct StoreHandles<'a> {
    pub data_store: Option<&'a mut dyn DataStore>,
    pub blob_store: Option<&'a mut dyn BlobStore>,
}

impl<'a> StoreHandles<'a> {
    pub fn none() -> Self {
        Self {
            data_store: None,
            blob_store: None,
        }
    }
}

fn write_inline<W: Write>(w: &mut W, bytes: &[u8]) -> io::Result<()> {
    write_i32(w, bytes.len() as i32)?;
    w.write_all(bytes)
}

/// Writes one BINARY value, returning the blob id it ended up under if it
/// was placed in the blob store (so the caller can record it on the owning
/// `PropertyEntry`, per `PropertyEntry.blob_ids`'s invariant).
///
/// `existing_blob_id` lets a value already backed by the blob store reuse
/// its id across rewrites instead of minting a new one every time.
pub fn write_binary<W: Write>(
    w: &mut W,
    bytes: &[u8],
    existing_blob_id: Option<&str>,
    config: &CodecConfig,
    stores: &mut StoreHandles<'_>,
) -> Result<Option<String>, EncodeError> {
    if let Some(data_store) = stores.data_store.as_deref_mut() {
        if (bytes.len() as u64) < data_store.min_record_length() {
            write_inline(w, bytes)?;
            return Ok(None);
        }

        write_i32(w, BINARY_IN_DATA_STORE)?;
        let mut cursor = io::Cursor::new(bytes);
        let id = data_store
            .store(&mut cursor)
            .map_err(EncodeError::DataStoreIo)?;
        write_utf8(w, &id)?;
        return Ok(None);
    }

    // The corruption-recovery branch for a negative incoming length (spec
    // §4.5 step 3a) doesn't apply here: `bytes: &[u8]` can't carry a
    // negative length in the first place, so the defensive check the
    // source needed against its own mutable length field has no
    // counterpart to guard against. See DESIGN.md.

    if (bytes.len() as u64) <= config.min_blob_size {
        write_inline(w, bytes)?;
        return Ok(None);
    }

    let blob_store = stores
        .blob_store
        .as_deref_mut()
        .ok_or_else(|| EncodeError::Internal("no blob store configured for large BINARY value".into()))?;

    let id = match existing_blob_id {
        Some(id) => id.to_string(),
        None => blob_store.create_id().map_err(EncodeError::BlobIo)?,
    };
    blob_store.put(&id, bytes).map_err(EncodeError::BlobIo)?;

    write_i32(w, BINARY_IN_BLOB_STORE)?;
    write_utf8(w, &id)?;
    Ok(Some(id))
}

/// Reads one BINARY value, resolving blob/data-store references through the
/// borrowed store handles (spec §4.5).
pub fn read_binary<R: Read + io::Seek>(
    r: &mut R,
    config: &CodecConfig,
    stores: &mut StoreHandles<'_>,
) -> Result<PlacedBinary, DecodeError> {
    let len = read_i32(r)?;

    match len {
        BINARY_IN_BLOB_STORE => {
            let id = read_utf8(r)?;
            let blob_store = stores.blob_store.as_deref_mut().ok_or_else(|| {
                DecodeError::InvalidFormat("no blob store configured to resolve a blob reference".into())
            })?;
            match blob_store.get(&id) {
                Ok(bytes) => Ok(PlacedBinary::Inline(bytes)),
                Err(BlobError::MissingBlob) if config.ignore_missing_blobs => {
                    log::warn!("blob {id} missing; substituting zero-length bytes");
                    Ok(PlacedBinary::Inline(Vec::new()))
                }
                Err(e) => Err(DecodeError::BlobIo(e)),
            }
        }
        BINARY_IN_DATA_STORE => {
            let id = read_utf8(r)?;
            let data_store = stores.data_store.as_deref_mut().ok_or_else(|| {
                DecodeError::InvalidFormat(
                    "no data store configured to resolve a data-store reference".into(),
                )
            })?;
            let mut stream = data_store
                .open_stream(&id)
                .map_err(DecodeError::DataStoreIo)?;
            let mut buf = Vec::new();
            stream
                .read_to_end(&mut buf)
                .map_err(DecodeError::DataStoreIo)?;
            drop(stream);
            Ok(PlacedBinary::Inline(buf))
        }
        len if len >= 0 => {
            let mut buf = vec![0u8; len as usize];
            r.read_exact(&mut buf)?;
            Ok(PlacedBinary::Inline(buf))
        }
        other => Err(DecodeError::InvalidFormat(format!(
            "unrecognized binary length word: {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Cursor;

    #[derive(Default)]
    struct FakeBlobStore {
        next_id: u64,
        blobs: HashMap<String, Vec<u8>>,
        put_calls: u32,
        create_calls: u32,
    }

    impl BlobStore for FakeBlobStore {
        fn create_id(&mut self) -> Result<String, BlobError> {
            self.create_calls += 1;
            self.next_id += 1;
            Ok(format!("blob-{}", self.next_id))
        }

        fn put(&mut self, id: &str, bytes: &[u8]) -> Result<(), BlobError> {
            self.put_calls += 1;
            self.blobs.insert(id.to_string(), bytes.to_vec());
            Ok(())
        }

        fn get(&mut self, id: &str) -> Result<Vec<u8>, BlobError> {
            self.blobs.get(id).cloned().ok_or(BlobError::MissingBlob)
        }

        fn remove(&mut self, id: &str) -> Result<(), BlobError> {
            self.blobs.remove(id);
            Ok(())
        }
    }

    #[test]
    fn small_binary_is_inlined() {
        let config = CodecConfig::default();
        let mut buf = Vec::new();
        let mut stores = StoreHandles::none();
        write_binary(&mut buf, b"hello", None, &config, &mut stores).unwrap();

        let mut cursor = Cursor::new(buf);
        let mut stores = StoreHandles::none();
        let placed = read_binary(&mut cursor, &config, &mut stores).unwrap();
        assert_eq!(placed, PlacedBinary::Inline(b"hello".to_vec()));
    }

    #[test]
    fn large_binary_goes_to_the_blob_store_exactly_once() {
        let config = CodecConfig {
            min_blob_size: 8,
            ..Default::default()
        };
        let payload = vec![7u8; 64];
        let mut blob_store = FakeBlobStore::default();

        let mut buf = Vec::new();
        {
            let mut stores = StoreHandles {
                data_store: None,
                blob_store: Some(&mut blob_store),
            };
            let id = write_binary(&mut buf, &payload, None, &config, &mut stores).unwrap();
            assert!(id.is_some());
        }
        assert_eq!(blob_store.create_calls, 1);
        assert_eq!(blob_store.put_calls, 1);

        let mut cursor = Cursor::new(buf);
        let mut stores = StoreHandles {
            data_store: None,
            blob_store: Some(&mut blob_store),
        };
        let placed = read_binary(&mut cursor, &config, &mut stores).unwrap();
        assert_eq!(placed, PlacedBinary::Inline(payload));
    }

    #[test]
    fn missing_blob_is_an_error_unless_configured_to_ignore() {
        let mut buf = Vec::new();
        write_i32(&mut buf, BINARY_IN_BLOB_STORE).unwrap();
        write_utf8(&mut buf, "ghost").unwrap();

        let strict = CodecConfig::default();
        let mut blob_store = FakeBlobStore::default();
        let mut cursor = Cursor::new(buf.clone());
        let mut stores = StoreHandles {
            data_store: None,
            blob_store: Some(&mut blob_store),
        };
        assert!(matches!(
            read_binary(&mut cursor, &strict, &mut stores),
            Err(DecodeError::BlobIo(BlobError::MissingBlob))
        ));

        let lenient = CodecConfig {
            ignore_missing_blobs: true,
            ..Default::default()
        };
        let mut cursor = Cursor::new(buf);
        let mut stores = StoreHandles {
            data_store: None,
            blob_store: Some(&mut blob_store),
        };
        let placed = read_binary(&mut cursor, &lenient, &mut stores).unwrap();
        assert_eq!(placed, PlacedBinary::Inline(Vec::new()));
    }
}
