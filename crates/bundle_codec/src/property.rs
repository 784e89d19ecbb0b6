//! PropertyCodec: the tagged-union property value encoding (spec §3
//! "PropertyValue"/"PropertyEntry", §4.6).

use std::io::{self, Read, Write};

use bigdecimal::BigDecimal;
use std::str::FromStr;
use uuid::Uuid;

use crate::binary::{read_binary, write_binary, PlacedBinary, StoreHandles};
use crate::config::CodecConfig;
use crate::date::{read_date, write_date, BundleDate};
use crate::error::{DecodeError, EncodeError};
use crate::name::{read_name, write_name, Name, NamespaceCache};
use crate::varint::{
    read_count_with_base, read_u8, read_utf8, read_var_int, read_var_long, split_count_for_header,
    write_u8, write_utf8, write_var_int, write_var_long,
};
use crate::NodeId;

/// One value a property can hold. Tag numbers are the wire contract (spec
/// §3's PropertyValue table) and MUST NOT be renumbered.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    String(String),
    Binary(PlacedBinary),
    Long(i64),
    Double(f64),
    Date(BundleDate),
    Boolean(bool),
    Name(Name),
    Path(String),
    Reference(NodeId),
    WeakReference(NodeId),
    Uri(String),
    Decimal(Option<BigDecimal>),
}

impl PropertyValue {
    /// The wire tag for this value's variant (spec §3's PropertyValue table).
    /// Used only to cross-check [`PropertyEntry::type_tag`] against the
    /// values actually present; the tag written to the wire is always
    /// `type_tag` itself, since an empty multi-valued list has no value to
    /// derive a tag from.
    fn tag(&self) -> u8 {
        match self {
            PropertyValue::String(_) => 1,
            PropertyValue::Binary(_) => 2,
            PropertyValue::Long(_) => 3,
            PropertyValue::Double(_) => 4,
            PropertyValue::Date(_) => 5,
            PropertyValue::Boolean(_) => 6,
            PropertyValue::Name(_) => 7,
            PropertyValue::Path(_) => 8,
            PropertyValue::Reference(_) => 9,
            PropertyValue::WeakReference(_) => 10,
            PropertyValue::Uri(_) => 11,
            PropertyValue::Decimal(_) => 12,
        }
    }
}

/// One named, possibly multi-valued property on a [`crate::bundle::Bundle`]
/// (spec §3).
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyEntry {
    pub name: Name,
    /// The property's wire type tag (spec §3's `type: tag`, 1..12), carried
    /// explicitly rather than recovered from `values[0]` so an empty
    /// multi-valued property (legal per §3; `!multiValued` is the only case
    /// that forces `values.len == 1`) still has somewhere to record its
    /// type.
    pub type_tag: u8,
    pub multi_valued: bool,
    pub mod_count: u16,
    pub values: Vec<PropertyValue>,
    /// `Some(id)` at index `i` iff `values[i]` is a BINARY currently backed
    /// by the blob store under that id.
    pub blob_ids: Vec<Option<String>>,
}

impl PropertyEntry {
    /// Checks the invariants spec §3 states for a `PropertyEntry`.
    pub fn validate(&self) -> Result<(), EncodeError> {
        if self.values.len() != self.blob_ids.len() {
            return Err(EncodeError::Internal(format!(
                "property {:?}: {} values but {} blob_ids",
                self.name,
                self.values.len(),
                self.blob_ids.len()
            )));
        }
        if !self.multi_valued && self.values.len() != 1 {
            return Err(EncodeError::Internal(format!(
                "property {:?}: single-valued but has {} values",
                self.name,
                self.values.len()
            )));
        }
        if !(1..=12).contains(&self.type_tag) {
            return Err(EncodeError::Internal(format!(
                "property {:?}: type tag {} out of range",
                self.name, self.type_tag
            )));
        }
        for value in &self.values {
            if value.tag() != self.type_tag {
                return Err(EncodeError::Internal(format!(
                    "property {:?}: type tag {} disagrees with a value of tag {}",
                    self.name,
                    self.type_tag,
                    value.tag()
                )));
            }
        }
        for (value, blob_id) in self.values.iter().zip(&self.blob_ids) {
            let is_blob_backed_binary =
                matches!(value, PropertyValue::Binary(PlacedBinary::InBlobStore(_)));
            if blob_id.is_some() != is_blob_backed_binary {
                return Err(EncodeError::Internal(format!(
                    "property {:?}: blob_id presence disagrees with value placement",
                    self.name
                )));
            }
        }
        Ok(())
    }
}

fn write_value<W: Write>(
    w: &mut W,
    value: &PropertyValue,
    existing_blob_id: Option<&str>,
    config: &CodecConfig,
    namespace_cache: &mut NamespaceCache,
    stores: &mut StoreHandles<'_>,
) -> Result<Option<String>, EncodeError> {
    match value {
        PropertyValue::String(s) | PropertyValue::Path(s) | PropertyValue::Uri(s) => {
            write_utf8(w, s)?;
            Ok(None)
        }
        PropertyValue::Binary(placed) => match placed {
            PlacedBinary::Inline(bytes) => {
                write_binary(w, bytes, existing_blob_id, config, stores)
            }
            PlacedBinary::InBlobStore(id) | PlacedBinary::InDataStore(id) => {
                Err(EncodeError::Internal(format!(
                    "BINARY value must be materialized before writing (saw cached placement {id})"
                )))
            }
        },
        PropertyValue::Long(n) => {
            write_var_long(w, *n)?;
            Ok(None)
        }
        PropertyValue::Double(d) => {
            crate::varint::write_f64(w, *d)?;
            Ok(None)
        }
        PropertyValue::Date(date) => {
            write_date(w, date)?;
            Ok(None)
        }
        PropertyValue::Boolean(b) => {
            write_u8(w, *b as u8)?;
            Ok(None)
        }
        PropertyValue::Name(name) => {
            write_name(w, name, namespace_cache)?;
            Ok(None)
        }
        PropertyValue::Reference(id) | PropertyValue::WeakReference(id) => {
            w.write_all(id.as_bytes())?;
            Ok(None)
        }
        PropertyValue::Decimal(None) => {
            write_u8(w, 0)?;
            Ok(None)
        }
        PropertyValue::Decimal(Some(d)) => {
            write_u8(w, 1)?;
            write_utf8(w, &d.to_string())?;
            Ok(None)
        }
    }
}

fn read_value<R: Read + io::Seek>(
    r: &mut R,
    tag: u8,
    config: &CodecConfig,
    namespace_cache: &mut NamespaceCache,
    stores: &mut StoreHandles<'_>,
) -> Result<(PropertyValue, Option<String>), DecodeError> {
    Ok(match tag {
        1 => (PropertyValue::String(read_utf8(r)?), None),
        2 => {
            let placed = read_binary(r, config, stores)?;
            let blob_id = match &placed {
                PlacedBinary::InBlobStore(id) => Some(id.clone()),
                _ => None,
            };
            (PropertyValue::Binary(placed), blob_id)
        }
        3 => (PropertyValue::Long(read_var_long(r)?), None),
        4 => (PropertyValue::Double(crate::varint::read_f64(r)?), None),
        5 => (PropertyValue::Date(read_date(r)?), None),
        6 => (PropertyValue::Boolean(read_u8(r)? != 0), None),
        7 => (PropertyValue::Name(read_name(r, namespace_cache)?), None),
        8 => (PropertyValue::Path(read_utf8(r)?), None),
        9 => (PropertyValue::Reference(read_node_id(r)?), None),
        10 => (PropertyValue::WeakReference(read_node_id(r)?), None),
        11 => (PropertyValue::Uri(read_utf8(r)?), None),
        12 => {
            let present = read_u8(r)? != 0;
            let value = if present {
                let text = read_utf8(r)?;
                Some(BigDecimal::from_str(&text).map_err(|e| {
                    DecodeError::InvalidFormat(format!("invalid decimal {text:?}: {e}"))
                })?)
            } else {
                None
            };
            (PropertyValue::Decimal(value), None)
        }
        other => {
            return Err(DecodeError::InvalidFormat(format!(
                "unknown property type tag {other}"
            )))
        }
    })
}

fn read_node_id<R: Read>(r: &mut R) -> Result<NodeId, DecodeError> {
    let mut bytes = [0u8; 16];
    r.read_exact(&mut bytes)?;
    Ok(Uuid::from_bytes(bytes))
}

/// `PlacedBinary::Inline` never reaches the wire as anything but
/// `write_binary`'s own output; this materializes an already-placed value
/// (e.g. read back from a blob store) into `Inline` bytes so it can be
/// rewritten, reusing its existing blob id if it had one.
pub fn materialize_binary_for_write(
    value: PropertyValue,
    config: &CodecConfig,
    stores: &mut StoreHandles<'_>,
) -> Result<(PropertyValue, Option<String>), EncodeError> {
    match value {
        PropertyValue::Binary(PlacedBinary::InBlobStore(id)) => {
            let blob_store = stores
                .blob_store
                .as_deref_mut()
                .ok_or_else(|| EncodeError::Internal("no blob store to resolve a cached binary".into()))?;
            let bytes = blob_store.get(&id).map_err(EncodeError::BlobIo)?;
            Ok((
                PropertyValue::Binary(PlacedBinary::Inline(bytes)),
                Some(id),
            ))
        }
        PropertyValue::Binary(PlacedBinary::InDataStore(id)) => {
            Err(EncodeError::Internal(format!(
                "cannot rewrite a data-store-backed binary without the original bytes (id {id})"
            )))
        }
        other => {
            let _ = config;
            Ok((other, None))
        }
    }
}

/// Writes one `(Name, PropertyEntry)` pair using the V3 encoding.
pub fn write_property<W: Write>(
    w: &mut W,
    entry: &PropertyEntry,
    config: &CodecConfig,
    namespace_cache: &mut NamespaceCache,
    stores: &mut StoreHandles<'_>,
) -> Result<Vec<Option<String>>, EncodeError> {
    entry.validate()?;
    write_name(w, &entry.name, namespace_cache)?;

    let tag = entry.type_tag;
    let (disc, overflow): (u8, Option<u32>) = if !entry.multi_valued {
        (0, None)
    } else {
        let (base, overflow) = split_count_for_header(entry.values.len() as u32, 14);
        ((base + 1) as u8, overflow)
    };
    let header = tag | (disc << 4);
    write_u8(w, header)?;
    if let Some(overflow) = overflow {
        write_var_int(w, overflow)?;
    }

    write_var_int(w, entry.mod_count as u32)?;

    let mut new_blob_ids = Vec::with_capacity(entry.values.len());
    for (value, existing_blob_id) in entry.values.iter().zip(&entry.blob_ids) {
        let blob_id = write_value(
            w,
            value,
            existing_blob_id.as_deref(),
            config,
            namespace_cache,
            stores,
        )?;
        new_blob_ids.push(blob_id.or_else(|| existing_blob_id.clone()));
    }

    Ok(new_blob_ids)
}

/// Reads one `(Name, PropertyEntry)` pair using the V3 encoding.
pub fn read_property<R: Read + io::Seek>(
    r: &mut R,
    config: &CodecConfig,
    namespace_cache: &mut NamespaceCache,
    stores: &mut StoreHandles<'_>,
) -> Result<PropertyEntry, DecodeError> {
    let name = read_name(r, namespace_cache)?;
    let header = read_u8(r)?;
    let tag = header & 0x0F;
    let disc = (header >> 4) & 0x0F;

    let (multi_valued, count) = if disc == 0 {
        (false, 1)
    } else {
        (true, read_count_with_base(r, (disc as u32) - 1, 14)?)
    };

    let mod_count = read_var_int(r)?.min(u16::MAX as u32) as u16;

    let mut values = Vec::with_capacity(count as usize);
    let mut blob_ids = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let (value, blob_id) = read_value(r, tag, config, namespace_cache, stores)?;
        values.push(value);
        blob_ids.push(blob_id);
    }

    Ok(PropertyEntry {
        name,
        type_tag: tag,
        multi_valued,
        mod_count,
        values,
        blob_ids,
    })
}

/// Lengths and indexed-name dereferencing for the V1/V2 legacy layout (spec
/// §4.7). Read-only: there is no `write_legacy_property`.
pub mod legacy {
    use super::*;
    use crate::stores::StringIndex;

    pub fn indexed_name_from(
        ns_index: i32,
        local_index: i32,
        strings: &dyn StringIndex,
    ) -> Result<Name, DecodeError> {
        let namespace_uri = strings
            .namespace_uri(ns_index)
            .ok_or_else(|| DecodeError::InvalidFormat(format!("unknown namespace index {ns_index}")))?
            .to_string();
        let local_name = strings
            .local_name(local_index)
            .ok_or_else(|| DecodeError::InvalidFormat(format!("unknown local name index {local_index}")))?
            .to_string();
        Ok(Name {
            namespace_uri,
            local_name,
        })
    }

    fn read_indexed_name<R: Read>(r: &mut R, strings: &dyn StringIndex) -> Result<Name, DecodeError> {
        let ns_index = crate::varint::read_i32(r)?;
        let local_index = crate::varint::read_i32(r)?;
        indexed_name_from(ns_index, local_index, strings)
    }

    /// Reads one `(nsIndex, localNameIndex)` pair from a terminated list
    /// (mixins, properties): `Ok(None)` when `nsIndex == -1` signals the end
    /// of the list (spec §4.7).
    pub fn read_indexed_name_or_terminator<R: Read>(
        r: &mut R,
        strings: &dyn StringIndex,
    ) -> Result<Option<Name>, DecodeError> {
        let ns_index = crate::varint::read_i32(r)?;
        if ns_index == -1 {
            return Ok(None);
        }
        let local_index = crate::varint::read_i32(r)?;
        Ok(Some(indexed_name_from(ns_index, local_index, strings)?))
    }

    fn read_utf16<R: Read>(r: &mut R) -> Result<String, DecodeError> {
        let len = crate::varint::read_i32(r)?;
        if len < 0 {
            return Err(DecodeError::InvalidFormat("negative utf16 length".into()));
        }
        let mut units = Vec::with_capacity(len as usize);
        for _ in 0..len {
            units.push(crate::varint::read_u16(r)?);
        }
        String::from_utf16(&units)
            .map_err(|e| DecodeError::InvalidFormat(format!("invalid UTF-16: {e}")))
    }

    /// Reads one legacy `(Name, PropertyEntry)` pair. `jcr:primaryType`,
    /// `jcr:mixinTypes`, and `jcr:uuid` are the caller's responsibility to
    /// drop (spec §4.7's "consumed and discarded").
    pub fn read_legacy_property<R: Read + io::Seek>(
        r: &mut R,
        strings: &dyn StringIndex,
    ) -> Result<PropertyEntry, DecodeError> {
        let name = read_indexed_name(r, strings)?;
        read_legacy_property_body(r, name, strings)
    }

    /// Reads everything after a property's indexed name has already been
    /// consumed by the caller's terminated-list loop (spec §4.7).
    pub fn read_legacy_property_body<R: Read + io::Seek>(
        r: &mut R,
        name: Name,
        strings: &dyn StringIndex,
    ) -> Result<PropertyEntry, DecodeError> {
        let header = crate::varint::read_i32(r)?;
        let tag = (header >> 16) as u8;
        let mod_count = (header & 0xFFFF) as u16;
        let multi_valued = read_u8(r)? != 0;
        let _definition_id = read_utf16(r)?;
        let count = crate::varint::read_i32(r)?.max(0) as u32;

        let mut values = Vec::with_capacity(count as usize);
        for _ in 0..count {
            values.push(read_legacy_value(r, tag, strings)?);
        }

        Ok(PropertyEntry {
            name,
            type_tag: tag,
            multi_valued,
            mod_count,
            blob_ids: vec![None; values.len()],
            values,
        })
    }

    fn read_legacy_value<R: Read + io::Seek>(
        r: &mut R,
        tag: u8,
        strings: &dyn StringIndex,
    ) -> Result<PropertyValue, DecodeError> {
        Ok(match tag {
            1 => PropertyValue::String(read_utf16(r)?),
            2 => {
                // Legacy bundles never externalize BINARY through a
                // blob/data store reference of their own; the raw bytes are
                // always inline, length-prefixed the same way V3 inlines.
                let len = crate::varint::read_i32(r)?.max(0) as usize;
                let mut buf = vec![0u8; len];
                r.read_exact(&mut buf)?;
                PropertyValue::Binary(PlacedBinary::Inline(buf))
            }
            3 => PropertyValue::Long(crate::varint::read_i64(r)?),
            4 => PropertyValue::Double(crate::varint::read_f64(r)?),
            5 => PropertyValue::Date(BundleDate::from_chrono(
                &chrono::DateTime::parse_from_rfc3339(&read_utf16(r)?)
                    .map_err(|e| DecodeError::InvalidFormat(format!("invalid legacy date: {e}")))?,
            )),
            6 => PropertyValue::Boolean(read_u8(r)? != 0),
            7 => PropertyValue::Name(read_indexed_name(r, strings)?),
            8 => PropertyValue::Path(read_utf16(r)?),
            9 => PropertyValue::Reference(read_node_id(r)?),
            10 => PropertyValue::WeakReference(read_node_id(r)?),
            11 => PropertyValue::Uri(read_utf16(r)?),
            12 => {
                let present = read_u8(r)? != 0;
                if present {
                    let text = read_utf16(r)?;
                    PropertyValue::Decimal(Some(BigDecimal::from_str(&text).map_err(|e| {
                        DecodeError::InvalidFormat(format!("invalid legacy decimal: {e}"))
                    })?))
                } else {
                    PropertyValue::Decimal(None)
                }
            }
            other => {
                return Err(DecodeError::InvalidFormat(format!(
                    "unknown legacy property type tag {other}"
                )))
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn roundtrip(entry: PropertyEntry) -> PropertyEntry {
        let config = CodecConfig::default();
        let mut buf = Vec::new();
        let mut wcache = NamespaceCache::new();
        let mut stores = StoreHandles::none();
        write_property(&mut buf, &entry, &config, &mut wcache, &mut stores).unwrap();

        let mut cursor = Cursor::new(buf);
        let mut rcache = NamespaceCache::new();
        let mut stores = StoreHandles::none();
        read_property(&mut cursor, &config, &mut rcache, &mut stores).unwrap()
    }

    #[test]
    fn single_valued_long_round_trips() {
        let entry = PropertyEntry {
            name: Name::unqualified("count"),
            type_tag: 3,
            multi_valued: false,
            mod_count: 1,
            values: vec![PropertyValue::Long(42)],
            blob_ids: vec![None],
        };
        assert_eq!(roundtrip(entry.clone()), entry);
    }

    #[test]
    fn multi_valued_strings_round_trip_including_overflow_count() {
        let values: Vec<PropertyValue> = (0..20)
            .map(|i| PropertyValue::String(format!("v{i}")))
            .collect();
        let entry = PropertyEntry {
            name: Name::unqualified("tags"),
            type_tag: 1,
            multi_valued: true,
            mod_count: 3,
            blob_ids: vec![None; values.len()],
            values,
        };
        assert_eq!(roundtrip(entry.clone()), entry);
    }

    #[test]
    fn null_decimal_round_trips() {
        let entry = PropertyEntry {
            name: Name::unqualified("amount"),
            type_tag: 12,
            multi_valued: false,
            mod_count: 0,
            values: vec![PropertyValue::Decimal(None)],
            blob_ids: vec![None],
        };
        assert_eq!(roundtrip(entry.clone()), entry);
    }

    #[test]
    fn reference_round_trips() {
        let id = Uuid::new_v4();
        let entry = PropertyEntry {
            name: Name::unqualified("ref"),
            type_tag: 9,
            multi_valued: false,
            mod_count: 0,
            values: vec![PropertyValue::Reference(id)],
            blob_ids: vec![None],
        };
        assert_eq!(roundtrip(entry.clone()), entry);
    }

    #[test]
    fn mismatched_blob_ids_length_is_rejected() {
        let entry = PropertyEntry {
            name: Name::unqualified("bad"),
            type_tag: 3,
            multi_valued: false,
            mod_count: 0,
            values: vec![PropertyValue::Long(1)],
            blob_ids: vec![],
        };
        assert!(entry.validate().is_err());
    }

    #[test]
    fn empty_multi_valued_property_round_trips() {
        let entry = PropertyEntry {
            name: Name::unqualified("empty"),
            type_tag: 1,
            multi_valued: true,
            mod_count: 0,
            values: vec![],
            blob_ids: vec![],
        };
        assert_eq!(roundtrip(entry.clone()), entry);
    }

    #[test]
    fn type_tag_disagreeing_with_a_value_is_rejected() {
        let entry = PropertyEntry {
            name: Name::unqualified("mismatched"),
            type_tag: 1,
            multi_valued: false,
            mod_count: 0,
            values: vec![PropertyValue::Long(1)],
            blob_ids: vec![None],
        };
        assert!(entry.validate().is_err());
    }
}
