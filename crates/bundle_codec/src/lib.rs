//! Hierarchical content repository bundle codec (spec-speak: V1/V2/V3 node
//! serialization).
//!
//! This crate holds the hard, interesting core of a larger persistence
//! subsystem: the wire format for a *bundle*, the self-contained binary
//! record for one repository node's identity, type, mixins, properties,
//! child references, and shareable-parent set. It writes only the current
//! format (V3) but reads all three historical versions. Everything the
//! bundle format doesn't own - the blob store, the content-addressed data
//! store, the two name-index services, and the persistence manager that
//! keys raw byte blocks by node id - is modeled as a narrow trait in
//! [`stores`] and borrowed for the duration of a single call.
//!
//! Module map, leaves first: [`varint`] (VarCodec primitives), [`name`]
//! (NameCatalog + NameCodec), [`date`] (DateCodec), [`binary`]
//! (BinaryPlacer), [`property`] (PropertyCodec), [`bundle`] (the `Bundle`
//! value object), [`reader`] and [`writer`] (BundleReader/BundleWriter),
//! [`safe_writer`] (the optional write-then-read-back guard).

pub mod binary;
pub mod bundle;
pub mod config;
pub mod date;
pub mod error;
pub mod name;
pub mod property;
pub mod reader;
pub mod safe_writer;
pub mod stores;
pub mod summary;
pub mod varint;
pub mod writer;

/// Opaque 128-bit node identifier (spec §3 "NodeId"). Supplied by the
/// caller out of band; never serialized as part of a bundle's own fields
/// except where it appears as a parent/child/reference/shared-set value.
pub type NodeId = uuid::Uuid;

pub use bundle::{Bundle, ChildEntry, NULL_PARENT_ID};
pub use config::CodecConfig;
pub use error::{BlobError, DecodeError, EncodeError};
pub use summary::BundleSummary;

use std::io::{Read, Seek, Write};

use binary::StoreHandles;
use stores::StringIndex;

/// Writes one bundle to `sink` (spec §6, "Codec API"). Emits the V3 format
/// unconditionally. When `config.verify_bundles` is set, routes through
/// [`safe_writer`] first; otherwise writes directly.
pub fn write<W: Write>(
    sink: &mut W,
    bundle: &Bundle,
    config: &CodecConfig,
    stores: &mut StoreHandles<'_>,
) -> Result<(), EncodeError> {
    if config.verify_bundles {
        let bytes = safe_writer::write_verified(bundle, config, stores)?;
        sink.write_all(&bytes).map_err(EncodeError::Io)
    } else {
        writer::write(sink, bundle, config, stores)
    }
}

/// Reads one bundle from `source` (spec §6, "Codec API"). `id` is supplied
/// by the caller; it is not part of the wire format. `strings` is required
/// to resolve a V1/V2 bundle's indexed names and is ignored for V3.
pub fn read<R: Read + Seek>(
    source: &mut R,
    id: NodeId,
    config: &CodecConfig,
    strings: Option<&dyn StringIndex>,
    stores: &mut StoreHandles<'_>,
) -> Result<Bundle, DecodeError> {
    reader::read(source, id, config, strings, stores)
}

/// Best-effort structural check used by a diagnostic dumper (spec §6,
/// "inspect"). Succeeds on any well-formed bundle of any known version and
/// tolerates a malformed trailer by returning a partial summary alongside
/// the error that stopped it.
pub fn inspect<R: Read + Seek>(source: &mut R) -> (BundleSummary, Option<DecodeError>) {
    reader::inspect(source)
}

impl Bundle {
    /// Convenience wrapper around [`crate::write`] for a V3 bundle with no
    /// external stores configured (the common case: all binaries inline).
    pub fn write_inline<W: Write>(&self, sink: &mut W, config: &CodecConfig) -> Result<(), EncodeError> {
        write(sink, self, config, &mut StoreHandles::none())
    }

    /// Convenience wrapper around [`crate::read`] for a V3 bundle with no
    /// external stores configured.
    pub fn read_inline<R: Read + Seek>(
        source: &mut R,
        id: NodeId,
        config: &CodecConfig,
    ) -> Result<Bundle, DecodeError> {
        read(source, id, config, None, &mut StoreHandles::none())
    }
}
