//! `BundleSummary`, the result of [`crate::reader::inspect`] - a best-effort
//! structural dump used by diagnostic tooling (spec §6, "inspect").

use std::fmt;

use bundle_codec_utils::AsciiDisplay;

use crate::name::Name;

/// A lightweight structural summary of a bundle, read without fully
/// resolving BINARY placements or legacy string-index lookups. Not
/// authoritative: a caller that needs the real `Bundle` should use
/// [`crate::reader::read`] instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleSummary {
    pub version: u8,
    pub node_type_name: Name,
    pub is_root: bool,
    pub mixin_count: u32,
    pub property_count: u32,
    pub child_count: u32,
    pub shared_set_count: u32,
    pub referenceable: bool,
    pub mod_count: u16,
    /// Set when the trailer (children, shared set) couldn't be fully read;
    /// the counts above reflect only what was parsed before the failure
    /// (spec §6: "SHOULD tolerate malformed trailers by returning a partial
    /// summary plus an error").
    pub truncated: bool,
}

impl fmt::Display for BundleSummary {
    /// Prints the shape a diagnostic dumper cares about: version, node
    /// type, and the five section counts. The local name is printed
    /// defensively through [`AsciiDisplay`] rather than trusted as
    /// display-safe, since `inspect()` may be run against bytes an
    /// attacker controls.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "bundle(v{}, type={}, root={}, mixins={}, properties={}, children={}, shared_set={}{})",
            self.version,
            AsciiDisplay(self.node_type_name.local_name.as_bytes()),
            self.is_root,
            self.mixin_count,
            self.property_count,
            self.child_count,
            self.shared_set_count,
            if self.truncated { ", truncated" } else { "" }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_the_section_counts() {
        let summary = BundleSummary {
            version: 3,
            node_type_name: Name::unqualified("unstructured"),
            is_root: true,
            mixin_count: 1,
            property_count: 2,
            child_count: 0,
            shared_set_count: 0,
            referenceable: false,
            mod_count: 0,
            truncated: false,
        };
        let rendered = summary.to_string();
        assert!(rendered.contains("unstructured"));
        assert!(rendered.contains("mixins=1"));
        assert!(!rendered.contains("truncated"));
    }

    #[test]
    fn display_flags_a_truncated_summary() {
        let mut summary = BundleSummary {
            version: 3,
            node_type_name: Name::unqualified("unstructured"),
            is_root: false,
            mixin_count: 0,
            property_count: 0,
            child_count: 0,
            shared_set_count: 0,
            referenceable: false,
            mod_count: 0,
            truncated: false,
        };
        summary.truncated = true;
        assert!(summary.to_string().contains("truncated"));
    }
}
