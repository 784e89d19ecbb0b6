//! `BundleReader`: version dispatch and the V3/V1/V2 decode paths (spec
//! §4.7, §6).

use std::collections::{BTreeMap, BTreeSet};
use std::io::{self, Read, Seek, SeekFrom};

use uuid::Uuid;

use crate::binary::StoreHandles;
use crate::bundle::{Bundle, ChildEntry, NULL_PARENT_ID};
use crate::config::CodecConfig;
use crate::error::DecodeError;
use crate::name::{read_name, Name, NamespaceCache};
use crate::property::{legacy, read_property};
use crate::stores::StringIndex;
use crate::summary::BundleSummary;
use crate::varint::{read_count_with_base, read_i16, read_i32, read_u8, read_var_int};
use crate::NodeId;

fn read_node_id<R: Read>(r: &mut R) -> Result<NodeId, DecodeError> {
    let mut bytes = [0u8; 16];
    r.read_exact(&mut bytes)?;
    Ok(Uuid::from_bytes(bytes))
}

/// Reads one bundle, dispatching on its leading version byte (spec §4.7).
/// `strings` is required for V1/V2 bundles (they store names as indices
/// into an external table) and ignored for V3.
pub fn read<R: Read + Seek>(
    r: &mut R,
    id: NodeId,
    config: &CodecConfig,
    strings: Option<&dyn StringIndex>,
    stores: &mut StoreHandles<'_>,
) -> Result<Bundle, DecodeError> {
    let first = read_u8(r)?;
    match first {
        3 => read_v3(r, id, config, stores),
        1 | 2 => {
            let mut rest = [0u8; 3];
            r.read_exact(&mut rest)?;
            let ns_index = ((rest[0] as i32) << 16) | ((rest[1] as i32) << 8) | (rest[2] as i32);
            let local_name_index = read_i32(r)?;
            let strings = strings.ok_or_else(|| {
                DecodeError::InvalidFormat(
                    "a V1/V2 bundle requires a StringIndex to resolve indexed names".into(),
                )
            })?;
            read_legacy(r, id, first, ns_index, local_name_index, strings)
        }
        other => Err(DecodeError::UnsupportedVersion(other)),
    }
}

fn read_v3<R: Read + Seek>(
    r: &mut R,
    id: NodeId,
    config: &CodecConfig,
    stores: &mut StoreHandles<'_>,
) -> Result<Bundle, DecodeError> {
    let mut namespace_cache = NamespaceCache::new();

    let node_type_name = read_name(r, &mut namespace_cache)?;
    let parent_id = read_node_id(r)?;
    let mod_count = read_var_int(r)?.min(u16::MAX as u32) as u16;

    let summary = read_u8(r)?;
    let referenceable = summary & 1 != 0;
    let mixin_count = read_count_with_base(r, ((summary >> 1) & 1) as u32, 1)?;
    let child_count = read_count_with_base(r, ((summary >> 2) & 3) as u32, 3)?;
    let property_count = read_count_with_base(r, ((summary >> 4) & 7) as u32, 7)?;
    let shared_set_count = read_count_with_base(r, ((summary >> 7) & 1) as u32, 1)?;

    let mut mixin_types = BTreeSet::new();
    for _ in 0..mixin_count {
        mixin_types.insert(read_name(r, &mut namespace_cache)?);
    }

    let mut properties = BTreeMap::new();
    for _ in 0..property_count {
        let entry = read_property(r, config, &mut namespace_cache, stores)?;
        properties.insert(entry.name.clone(), entry);
    }

    let mut children = Vec::with_capacity(child_count as usize);
    for _ in 0..child_count {
        let name = read_name(r, &mut namespace_cache)?;
        let child_id = read_node_id(r)?;
        children.push(ChildEntry { name, id: child_id });
    }

    let mut shared_set = BTreeSet::new();
    for _ in 0..shared_set_count {
        shared_set.insert(read_node_id(r)?);
    }

    Ok(Bundle {
        id,
        node_type_name,
        parent_id,
        mixin_types,
        properties,
        referenceable,
        children,
        mod_count,
        shared_set,
    })
}

fn read_legacy<R: Read + Seek>(
    r: &mut R,
    id: NodeId,
    version: u8,
    ns_index: i32,
    local_name_index: i32,
    strings: &dyn StringIndex,
) -> Result<Bundle, DecodeError> {
    let node_type_name = legacy::indexed_name_from(ns_index, local_name_index, strings)?;

    let parent_present = read_u8(r)? != 0;
    let parent_id = if parent_present {
        read_node_id(r)?
    } else {
        NULL_PARENT_ID
    };

    let _definition_id = read_legacy_utf16(r)?;

    let mut mixin_types = BTreeSet::new();
    while let Some(name) = legacy::read_indexed_name_or_terminator(r, strings)? {
        mixin_types.insert(name);
    }

    let mut properties = BTreeMap::new();
    while let Some(name) = legacy::read_indexed_name_or_terminator(r, strings)? {
        let entry = legacy::read_legacy_property_body(r, name.clone(), strings)?;
        if !crate::name::is_fabricated_property_name(&name) {
            properties.insert(name, entry);
        }
    }

    let referenceable = read_u8(r)? != 0;

    let mut children = Vec::new();
    loop {
        let present = read_u8(r)? != 0;
        if !present {
            break;
        }
        let child_id = read_node_id(r)?;
        let ns = read_i32(r)?;
        let local = read_i32(r)?;
        let name = legacy::indexed_name_from(ns, local, strings)?;
        children.push(ChildEntry { name, id: child_id });
    }

    let mod_count = read_i16(r)? as u16;

    let mut shared_set = BTreeSet::new();
    if version >= 2 {
        loop {
            let present = read_u8(r)? != 0;
            if !present {
                break;
            }
            shared_set.insert(read_node_id(r)?);
        }
    }

    Ok(Bundle {
        id,
        node_type_name,
        parent_id,
        mixin_types,
        properties,
        referenceable,
        children,
        mod_count,
        shared_set,
    })
}

fn read_legacy_utf16<R: Read>(r: &mut R) -> Result<String, DecodeError> {
    let len = read_i32(r)?.max(0) as usize;
    let mut units = Vec::with_capacity(len);
    for _ in 0..len {
        units.push(crate::varint::read_u16(r)?);
    }
    String::from_utf16(&units).map_err(|e| DecodeError::InvalidFormat(format!("invalid UTF-16: {e}")))
}

/// Best-effort structural dump (spec §6, "inspect"). Tolerates a malformed
/// trailer by returning what it managed to parse alongside the error that
/// stopped it, rather than failing outright. Succeeds on any well-formed
/// bundle of any known version (V1, V2, or V3); V1/V2 names are reported
/// unresolved since `inspect` takes no `StringIndex`, but every count is
/// still derivable by skipping over the indexed-name pairs structurally.
pub fn inspect<R: Read + Seek>(r: &mut R) -> (BundleSummary, Option<DecodeError>) {
    match inspect_inner(r) {
        Ok(summary) => (summary, None),
        Err((summary, e)) => (summary, Some(e)),
    }
}

fn inspect_inner<R: Read + Seek>(r: &mut R) -> Result<BundleSummary, (BundleSummary, DecodeError)> {
    let mut partial = BundleSummary {
        version: 0,
        node_type_name: Name::unqualified("unknown"),
        is_root: false,
        mixin_count: 0,
        property_count: 0,
        child_count: 0,
        shared_set_count: 0,
        referenceable: false,
        mod_count: 0,
        truncated: true,
    };

    let first = read_u8(r).map_err(|e| (partial.clone(), e))?;
    partial.version = first;
    match first {
        3 => inspect_v3(r, partial),
        1 | 2 => inspect_legacy(r, first, partial),
        other => Err((partial, DecodeError::UnsupportedVersion(other))),
    }
}

fn inspect_v3<R: Read + Seek>(
    r: &mut R,
    mut partial: BundleSummary,
) -> Result<BundleSummary, (BundleSummary, DecodeError)> {
    let mut namespace_cache = NamespaceCache::new();
    let node_type_name = read_name(r, &mut namespace_cache).map_err(|e| (partial.clone(), e))?;
    partial.node_type_name = node_type_name.clone();

    let parent_id = read_node_id(r).map_err(|e| (partial.clone(), e))?;
    partial.is_root = parent_id == NULL_PARENT_ID;

    let mod_count = read_var_int(r)
        .map_err(|e| (partial.clone(), e))?
        .min(u16::MAX as u32) as u16;
    partial.mod_count = mod_count;

    let summary = read_u8(r).map_err(|e| (partial.clone(), e))?;
    partial.referenceable = summary & 1 != 0;

    partial.mixin_count = read_count_with_base(r, ((summary >> 1) & 1) as u32, 1)
        .map_err(|e| (partial.clone(), e))?;
    partial.child_count = read_count_with_base(r, ((summary >> 2) & 3) as u32, 3)
        .map_err(|e| (partial.clone(), e))?;
    partial.property_count = read_count_with_base(r, ((summary >> 4) & 7) as u32, 7)
        .map_err(|e| (partial.clone(), e))?;
    partial.shared_set_count = read_count_with_base(r, ((summary >> 7) & 1) as u32, 1)
        .map_err(|e| (partial.clone(), e))?;

    partial.truncated = false;
    Ok(partial)
}

fn inspect_legacy<R: Read + Seek>(
    r: &mut R,
    version: u8,
    mut partial: BundleSummary,
) -> Result<BundleSummary, (BundleSummary, DecodeError)> {
    let mut rest = [0u8; 3];
    r.read_exact(&mut rest).map_err(DecodeError::from).map_err(|e| (partial.clone(), e))?;
    let ns_index = ((rest[0] as i32) << 16) | ((rest[1] as i32) << 8) | (rest[2] as i32);
    let local_name_index = read_i32(r).map_err(|e| (partial.clone(), e))?;
    // inspect() takes no StringIndex, so the node type name is reported
    // unresolved; only the indices are known at this point.
    partial.node_type_name = Name::new(format!("ns#{ns_index}"), format!("local#{local_name_index}"));

    let parent_present = read_u8(r).map_err(|e| (partial.clone(), e))? != 0;
    partial.is_root = !parent_present;
    if parent_present {
        let mut id = [0u8; 16];
        r.read_exact(&mut id).map_err(DecodeError::from).map_err(|e| (partial.clone(), e))?;
    }

    skip_legacy_utf16(r).map_err(|e| (partial.clone(), e))?; // definitionId

    let mut mixin_count = 0u32;
    while skip_indexed_name_or_terminator(r).map_err(|e| (partial.clone(), e))? {
        mixin_count += 1;
    }
    partial.mixin_count = mixin_count;

    let mut property_count = 0u32;
    while skip_indexed_name_or_terminator(r).map_err(|e| (partial.clone(), e))? {
        skip_legacy_property_body(r).map_err(|e| (partial.clone(), e))?;
        property_count += 1;
    }
    partial.property_count = property_count;

    partial.referenceable = read_u8(r).map_err(|e| (partial.clone(), e))? != 0;

    let mut child_count = 0u32;
    loop {
        let present = read_u8(r).map_err(|e| (partial.clone(), e))? != 0;
        if !present {
            break;
        }
        let mut id = [0u8; 16];
        r.read_exact(&mut id).map_err(DecodeError::from).map_err(|e| (partial.clone(), e))?;
        skip_indexed_name(r).map_err(|e| (partial.clone(), e))?;
        child_count += 1;
    }
    partial.child_count = child_count;

    partial.mod_count = read_i16(r).map_err(|e| (partial.clone(), e))? as u16;

    let mut shared_set_count = 0u32;
    if version >= 2 {
        loop {
            let present = read_u8(r).map_err(|e| (partial.clone(), e))? != 0;
            if !present {
                break;
            }
            let mut id = [0u8; 16];
            r.read_exact(&mut id).map_err(DecodeError::from).map_err(|e| (partial.clone(), e))?;
            shared_set_count += 1;
        }
    }
    partial.shared_set_count = shared_set_count;

    partial.truncated = false;
    Ok(partial)
}

fn skip_indexed_name<R: Read>(r: &mut R) -> Result<(), DecodeError> {
    read_i32(r)?;
    read_i32(r)?;
    Ok(())
}

/// Reads one `(nsIndex, localNameIndex)` pair from a terminated list without
/// resolving it against a `StringIndex`; `Ok(false)` when `nsIndex == -1`
/// signals the end of the list, matching [`legacy::read_indexed_name_or_terminator`]'s
/// wire shape but skipping the name lookup entirely.
fn skip_indexed_name_or_terminator<R: Read>(r: &mut R) -> Result<bool, DecodeError> {
    let ns_index = read_i32(r)?;
    if ns_index == -1 {
        return Ok(false);
    }
    read_i32(r)?;
    Ok(true)
}

fn skip_legacy_property_body<R: Read + Seek>(r: &mut R) -> Result<(), DecodeError> {
    let header = read_i32(r)?;
    let tag = (header >> 16) as u8;
    let _multi_valued = read_u8(r)? != 0;
    skip_legacy_utf16(r)?; // definitionId
    let count = read_i32(r)?.max(0) as u32;
    for _ in 0..count {
        skip_legacy_value(r, tag)?;
    }
    Ok(())
}

fn skip_legacy_value<R: Read + Seek>(r: &mut R, tag: u8) -> Result<(), DecodeError> {
    match tag {
        1 | 8 | 11 => {
            skip_legacy_utf16(r)?;
        }
        2 => {
            let len = read_i32(r)?.max(0) as i64;
            r.seek(SeekFrom::Current(len)).map_err(DecodeError::from)?;
        }
        3 => {
            crate::varint::read_i64(r)?;
        }
        4 => {
            crate::varint::read_f64(r)?;
        }
        5 => {
            skip_legacy_utf16(r)?;
        }
        6 => {
            read_u8(r)?;
        }
        7 => {
            skip_indexed_name(r)?;
        }
        9 | 10 => {
            let mut buf = [0u8; 16];
            r.read_exact(&mut buf)?;
        }
        12 => {
            if read_u8(r)? != 0 {
                skip_legacy_utf16(r)?;
            }
        }
        other => {
            return Err(DecodeError::InvalidFormat(format!(
                "unknown legacy property type tag {other}"
            )))
        }
    }
    Ok(())
}

fn skip_legacy_utf16<R: Read>(r: &mut R) -> Result<(), DecodeError> {
    let len = read_i32(r)?.max(0);
    for _ in 0..len {
        crate::varint::read_u16(r)?;
    }
    Ok(())
}
