//! General purpose I/O helpers shared by the bundle codec.
//!
//! This crate intentionally stays small: it holds the bits of plumbing that
//! don't belong to any single wire-format component (name catalog, varint
//! codec, property codec, ...) but that several of them need. Nothing in
//! here is aware of bundles, names, or properties.

mod ascii_display;
mod result_ext;
mod seekable_take;

pub use ascii_display::AsciiDisplay;
pub use result_ext::AnyhowResultExt;
pub use seekable_take::{SeekableTake, SeekableTakeExt};

/// Shorthand for `anyhow::Result`, used only by test and fixture-loading code.
///
/// The codec's public API never returns this type - see `bundle_codec::error`
/// for the typed `EncodeError`/`DecodeError` taxonomy it uses instead.
pub type AnyResult<T = (), E = anyhow::Error> = anyhow::Result<T, E>;

/// Shorthand for `Ok(())`, cause it looks ugly otherwise.
pub const fn ok<E>() -> Result<(), E> {
    Ok(())
}
