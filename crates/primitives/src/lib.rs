//! Identifiers and small value types shared by every k9db crate.
//!
//! Mirrors the role `spacetimedb-primitives` plays in the teacher codebase:
//! a dependency-light leaf crate that every other crate can import without
//! pulling in the storage or planning machinery.

use std::fmt;

macro_rules! newtype_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(pub u32);

        impl From<u32> for $name {
            fn from(id: u32) -> Self {
                Self(id)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

newtype_id!(
    /// Identifies a table within a database. Stable for the table's lifetime.
    TableId
);
newtype_id!(
    /// Identifies a column by its zero-based position in a table's schema.
    ColId
);
newtype_id!(
    /// Identifies a secondary or PK index within a table.
    IndexId
);

/// A column position together with whether it participates in a composite
/// index as a prefix column. Used by the index-selection algorithm (C4 §4.4).
pub type ColList = smallvec::SmallVec<[ColId; 2]>;

/// The kind of a shard descriptor edge (C5 §4.5).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ShardType {
    /// This table's rows live directly in the referenced ancestor's shard.
    Direct,
    /// This table's rows live in a shard reached by following one or more
    /// intermediate ownership edges.
    Transitive,
    /// This table's shard assignment is established by an `OWNS` edge in
    /// some other table and moves on insert ("varowned").
    Variable,
}

bitflags::bitflags! {
    /// Convenience flags mirrored from a [`ShardType`] plus the access-only bit,
    /// used where code wants to test properties without matching on the enum.
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    pub struct DescriptorFlags: u8 {
        const IS_VAROWNED   = 0b0001;
        const IS_TRANSITIVE = 0b0010;
        const ACCESS_ONLY   = 0b0100;
    }
}

impl DescriptorFlags {
    pub fn from_shard_type(ty: ShardType, access_only: bool) -> Self {
        let mut flags = Self::empty();
        if ty == ShardType::Variable {
            flags |= Self::IS_VAROWNED;
        }
        if ty == ShardType::Transitive {
            flags |= Self::IS_TRANSITIVE;
        }
        if access_only {
            flags |= Self::ACCESS_ONLY;
        }
        flags
    }
}

/// The reserved shard kind/id pair rows fall into when no ownership chain
/// resolves at insert time (spec.md §3, "Lifecycle").
pub const DEFAULT_SHARD_KIND: &str = "default";
pub const DEFAULT_SHARD_ID: &str = "default";

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn newtype_ids_round_trip_through_u32() {
        let t: TableId = 7u32.into();
        assert_eq!(t.0, 7);
        assert_eq!(format!("{t}"), "7");
    }

    #[test]
    fn descriptor_flags_mark_varowned_and_access_only() {
        let f = DescriptorFlags::from_shard_type(ShardType::Variable, true);
        assert!(f.contains(DescriptorFlags::IS_VAROWNED));
        assert!(f.contains(DescriptorFlags::ACCESS_ONLY));
        assert!(!f.contains(DescriptorFlags::IS_TRANSITIVE));
    }
}
