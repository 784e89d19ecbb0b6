//! `Bundle`, `ChildEntry`, and the node-id sentinel (spec §3 "Bundle").

use std::collections::{BTreeMap, BTreeSet};

use uuid::Uuid;

use crate::name::{is_fabricated_property_name, Name};
use crate::property::PropertyEntry;
use crate::NodeId;

/// The sentinel parent id meaning "no parent; this is the root" (spec §3).
/// Implementations MUST use this exact value for stored bundles to remain
/// compatible with each other.
pub const NULL_PARENT_ID: NodeId = Uuid::from_u128(0xbb4e9d10_d857_11df_937b_0800200c9a66);

/// One entry in a bundle's ordered child list (spec §3 "ChildEntry"). Order
/// is significant and MUST be preserved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildEntry {
    pub name: Name,
    pub id: NodeId,
}

/// The unit of persistence: one node's complete serialized state (spec §3
/// "Bundle").
///
/// `mixin_types` and `shared_set` are `BTreeSet` rather than a general
/// `HashSet` so two independent writer instances produce byte-identical
/// output for the same bundle (Testable Property 5); see §3.1.
#[derive(Debug, Clone, PartialEq)]
pub struct Bundle {
    pub id: NodeId,
    pub node_type_name: Name,
    pub parent_id: NodeId,
    pub mixin_types: BTreeSet<Name>,
    pub properties: BTreeMap<Name, PropertyEntry>,
    pub referenceable: bool,
    pub children: Vec<ChildEntry>,
    pub mod_count: u16,
    pub shared_set: BTreeSet<NodeId>,
}

impl Bundle {
    /// A bare bundle with no properties, mixins, or children - a starting
    /// point for tests and for a caller building up a new node.
    pub fn new(id: NodeId, node_type_name: Name, parent_id: NodeId) -> Self {
        Self {
            id,
            node_type_name,
            parent_id,
            mixin_types: BTreeSet::new(),
            properties: BTreeMap::new(),
            referenceable: false,
            children: Vec::new(),
            mod_count: 0,
            shared_set: BTreeSet::new(),
        }
    }

    pub fn is_root(&self) -> bool {
        self.parent_id == NULL_PARENT_ID
    }

    /// Checks the invariants spec §3 states for a `Bundle`, beyond what each
    /// `PropertyEntry::validate` already checks for itself.
    pub fn validate(&self) -> Result<(), crate::error::EncodeError> {
        use crate::error::EncodeError;

        if !self.referenceable && !self.shared_set.is_empty() {
            return Err(EncodeError::Internal(
                "shared_set must be empty on a non-referenceable node".into(),
            ));
        }
        for name in self.properties.keys() {
            if is_fabricated_property_name(name) {
                return Err(EncodeError::Internal(format!(
                    "fabricated property {name:?} must not be stored explicitly"
                )));
            }
        }
        for (name, entry) in &self.properties {
            if entry.name != *name {
                return Err(EncodeError::Internal(format!(
                    "property map key {name:?} disagrees with entry name {:?}",
                    entry.name
                )));
            }
            entry.validate()?;
        }
        Ok(())
    }
}
