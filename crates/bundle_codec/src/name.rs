//! `Name`, the static dictionaries of [`NameCatalog`], and the V3 wire
//! encoding of a name (spec §3 "Name", §4.2, §4.3).
//!
//! The teacher's chunk format names things with 4-byte ASCII/hash
//! `NodeName`s (`zenit_lvl::node::NodeName`); this format instead carries
//! full `(namespace_uri, local_name)` pairs, so the fixed-width tag is
//! replaced by a lookup into a frozen dictionary plus a small per-bundle
//! cache - the one piece of codec-visible mutable state this format has
//! (spec §5 "Shared state").

use std::io::{self, Read, Write};

use crate::error::DecodeError;
use crate::varint::{read_u8, write_u8};
use bundle_codec_utils::SeekableTakeExt;

/// A fully qualified property or node type name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Name {
    pub namespace_uri: String,
    pub local_name: String,
}

impl Name {
    pub fn new(namespace_uri: impl Into<String>, local_name: impl Into<String>) -> Self {
        Self {
            namespace_uri: namespace_uri.into(),
            local_name: local_name.into(),
        }
    }

    /// A name in the empty (default) namespace.
    pub fn unqualified(local_name: impl Into<String>) -> Self {
        Self::new("", local_name)
    }
}

/// The jcr-reserved property names that are never stored in a bundle's
/// property map (spec §3 Bundle invariants); they're reconstructed from
/// `node_type_name`, `mixin_types`, and the node id instead.
pub fn is_fabricated_property_name(name: &Name) -> bool {
    name.namespace_uri == COMMON_NAMESPACES[1]
        && matches!(
            name.local_name.as_str(),
            "primaryType" | "mixinTypes" | "uuid"
        )
}

/// The frozen namespace table. Index `7` is not a real table entry; it's the
/// sentinel meaning "explicit URI on the wire" (spec §4.2). Slot 1 is the
/// conventional `jcr:` namespace used by [`is_fabricated_property_name`].
pub const COMMON_NAMESPACES: [&str; 7] = [
    "",
    "http://www.jcp.org/jcr/1.0",
    "http://www.jcp.org/jcr/nt/1.0",
    "http://www.jcp.org/jcr/mix/1.0",
    "http://www.jcp.org/jcr/sv/1.0",
    "http://www.w3.org/XML/1998/namespace",
    "http://www.jcp.org/jcr/rep/1.0",
];

/// The frozen common-name table: full `(namespace index, local name)` pairs
/// that fit in a single header byte (spec §4.2, §4.3). Generated once and
/// treated as a wire-format constant - changing a slot here is a
/// compatibility break like changing `COMMON_NAMESPACES` would be.
pub const COMMON_NAMES: [(u8, &str); 31] = [
    (1, "primaryType"),
    (1, "mixinTypes"),
    (1, "uuid"),
    (1, "created"),
    (1, "createdBy"),
    (1, "lastModified"),
    (1, "lastModifiedBy"),
    (1, "content"),
    (1, "data"),
    (1, "encoding"),
    (1, "mimeType"),
    (2, "base"),
    (2, "unstructured"),
    (2, "file"),
    (2, "folder"),
    (2, "resource"),
    (2, "hierarchyNode"),
    (2, "linkedFile"),
    (2, "query"),
    (3, "referenceable"),
    (3, "versionable"),
    (3, "lockable"),
    (3, "created"),
    (3, "shareable"),
    (3, "title"),
    (0, "name"),
    (0, "title"),
    (0, "description"),
    (0, "value"),
    (0, "count"),
    (0, "text"),
];

fn name_at(index: u8) -> Option<Name> {
    COMMON_NAMES.get(index as usize).map(|&(ns, local)| Name {
        namespace_uri: COMMON_NAMESPACES[ns as usize].to_string(),
        local_name: local.to_string(),
    })
}

/// Looks up a name's slot in [`COMMON_NAMES`], if it has one.
pub fn name_index(name: &Name) -> Option<u8> {
    let ns_index = COMMON_NAMESPACES
        .iter()
        .position(|&uri| uri == name.namespace_uri)?;
    COMMON_NAMES
        .iter()
        .position(|&(ns, local)| ns as usize == ns_index && local == name.local_name)
        .map(|i| i as u8)
}

/// Looks up a namespace URI's slot in [`COMMON_NAMESPACES`]; returns `7` (the
/// "explicit URI follows" sentinel) for anything not in the table.
pub fn namespace_index(uri: &str) -> u8 {
    COMMON_NAMESPACES
        .iter()
        .position(|&common| common == uri)
        .map(|i| i as u8)
        .unwrap_or(7)
}

/// Per-bundle namespace state shared by [`write_name`]/[`read_name`] across
/// every `Name` in one bundle. Lives exactly as long as a single
/// `read`/`write` call (spec §5 "Shared state").
///
/// Resolution of an Open Question (spec §9, "the writer's namespace-slot
/// reuse policy when the cache is full is underspecified in the source"):
/// this implementation is the dialect the spec describes as writing `ns ==
/// 7` for *every* non-common namespace and relying on "the reader's
/// identical slot-fill policy" rather than on any header value ever
/// referencing a previously-cached slot - ns in 0..6 is reserved
/// exclusively for [`COMMON_NAMESPACES`] lookups, never repurposed as a
/// cache reference. The seven addressable slots therefore carry no
/// compression weight in this implementation; what the spec calls "slot 7"
/// is kept here purely as the last-seen explicit URI, useful to
/// [`crate::bundle::BundleSummary`]'s diagnostic dump but never consulted
/// by the encoder. See DESIGN.md for the full rationale.
#[derive(Debug, Default)]
pub struct NamespaceCache {
    last_explicit: Option<String>,
}

impl NamespaceCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The most recently seen explicit (non-common) namespace URI, if any.
    pub fn last_explicit(&self) -> Option<&str> {
        self.last_explicit.as_deref()
    }

    fn record(&mut self, uri: &str) {
        self.last_explicit = Some(uri.to_string());
    }
}

/// Writes a `Name` using the V3 encoding (spec §4.3).
pub fn write_name<W: Write>(w: &mut W, name: &Name, cache: &mut NamespaceCache) -> io::Result<()> {
    if let Some(common) = name_index(name) {
        write_u8(w, common)?;
        return Ok(());
    }

    let local_bytes = name.local_name.as_bytes();
    assert!(!local_bytes.is_empty(), "empty local names are illegal");

    let ns = namespace_index(&name.namespace_uri);
    let llen = (local_bytes.len().saturating_sub(1)).min(15) as u8;
    let header = 0x80 | (ns << 4) | llen;
    write_u8(w, header)?;

    if ns == 7 {
        crate::varint::write_utf8(w, &name.namespace_uri)?;
        cache.record(&name.namespace_uri);
    }

    if llen == 15 {
        crate::varint::write_utf8(w, &name.local_name)?;
    } else {
        w.write_all(local_bytes)?;
    }

    Ok(())
}

/// Reads a `Name` using the V3 encoding (spec §4.3).
pub fn read_name<R: Read + io::Seek>(
    r: &mut R,
    cache: &mut NamespaceCache,
) -> Result<Name, DecodeError> {
    let header = read_u8(r)?;

    if header & 0x80 == 0 {
        return name_at(header).ok_or_else(|| {
            DecodeError::InvalidFormat(format!("unknown common name index {header}"))
        });
    }

    let ns = (header >> 4) & 0x07;
    let llen = header & 0x0F;

    let namespace_uri = if ns < 7 {
        COMMON_NAMESPACES[ns as usize].to_string()
    } else {
        let uri = crate::varint::read_utf8(r)?;
        cache.record(&uri);
        uri
    };

    let local_name = if llen == 15 {
        crate::varint::read_utf8(r)?
    } else {
        let len = (llen as u64) + 1;
        let mut bounded = r.seekable_take(len).map_err(DecodeError::from)?;
        let mut buf = vec![0u8; len as usize];
        bounded.read_exact(&mut buf).map_err(DecodeError::from)?;
        String::from_utf8(buf)
            .map_err(|e| DecodeError::InvalidFormat(format!("invalid UTF-8 in local name: {e}")))?
    };

    if local_name.is_empty() {
        return Err(DecodeError::InvalidFormat("empty local name".into()));
    }

    Ok(Name {
        namespace_uri,
        local_name,
    })
}
