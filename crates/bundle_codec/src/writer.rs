//! `BundleWriter`: the V3-only emission path (spec §4.8).

use std::io::Write;

use crate::binary::StoreHandles;
use crate::bundle::Bundle;
use crate::config::CodecConfig;
use crate::error::EncodeError;
use crate::name::{write_name, NamespaceCache};
use crate::property::write_property;
use crate::varint::{split_count_for_header, write_u8, write_var_int};

/// Writes one bundle in the V3 wire format (spec §4.8). Only ever emits V3;
/// there is no legacy writer.
pub fn write<W: Write>(
    w: &mut W,
    bundle: &Bundle,
    config: &CodecConfig,
    stores: &mut StoreHandles<'_>,
) -> Result<(), EncodeError> {
    bundle.validate()?;

    // Namespace caching is scoped to exactly this call and reset for every
    // bundle (spec §4.8, §5 "Shared state").
    let mut namespace_cache = NamespaceCache::new();

    write_u8(w, 3)?;
    write_name(w, &bundle.node_type_name, &mut namespace_cache)?;
    w.write_all(bundle.parent_id.as_bytes())?;
    write_var_int(w, bundle.mod_count as u32)?;

    // The decoder reads the summary byte before any variable-length
    // section, so every count that feeds it must be known up front.
    let (mixin_h, mixin_overflow) = split_count_for_header(bundle.mixin_types.len() as u32, 1);
    let (child_h, child_overflow) = split_count_for_header(bundle.children.len() as u32, 3);
    let (props_h, props_overflow) = split_count_for_header(bundle.properties.len() as u32, 7);
    let (shared_h, shared_overflow) = split_count_for_header(bundle.shared_set.len() as u32, 1);

    let summary = (bundle.referenceable as u8)
        | ((mixin_h as u8) << 1)
        | ((child_h as u8) << 2)
        | ((props_h as u8) << 4)
        | ((shared_h as u8) << 7);
    write_u8(w, summary)?;

    for overflow in [mixin_overflow, child_overflow, props_overflow, shared_overflow] {
        if let Some(v) = overflow {
            write_var_int(w, v)?;
        }
    }

    for name in &bundle.mixin_types {
        write_name(w, name, &mut namespace_cache)?;
    }

    for entry in bundle.properties.values() {
        write_property(w, entry, config, &mut namespace_cache, stores)?;
    }

    for child in &bundle.children {
        write_name(w, &child.name, &mut namespace_cache)?;
        w.write_all(child.id.as_bytes())?;
    }

    for id in &bundle.shared_set {
        w.write_all(id.as_bytes())?;
    }

    Ok(())
}
