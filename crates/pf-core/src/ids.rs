//! Typed `u32` identifiers.
//!
//! Every ID reserves `u32::MAX` as its invalid sentinel, which is also what
//! `Default` produces, so a slot nobody filled in is visibly wrong in logs.
//! The inner integer stays `pub` for construction in tables and tests.

use std::fmt;

macro_rules! typed_id {
    ($($(#[$attr:meta])* $name:ident => $label:literal;)+) => {$(
        $(#[$attr])*
        #[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
        pub struct $name(pub u32);

        impl $name {
            pub const INVALID: $name = $name(u32::MAX);

            /// Checked conversion from a container index.
            #[inline]
            pub fn from_index(index: usize) -> Option<Self> {
                u32::try_from(index).ok().map($name).filter(|id| id.is_valid())
            }

            #[inline(always)]
            pub fn index(self) -> usize {
                self.0 as usize
            }

            #[inline(always)]
            pub fn is_valid(self) -> bool {
                self.0 != u32::MAX
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::INVALID
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                if self.is_valid() {
                    write!(f, concat!($label, "#{}"), self.0)
                } else {
                    f.write_str(concat!($label, "#invalid"))
                }
            }
        }
    )+};
}

typed_id! {
    /// Dense per-agent key used by the status registries.
    AgentId => "agent";

    /// Stable identity of a candidate node: its index in the agent's full,
    /// unsorted node list.
    CandidateId => "node";

    /// Caller-assigned tag separating mutually exclusive selection requests
    /// (e.g. "evade" vs "hide") on the same agent.
    PurposeId => "purpose";

    /// Reference to one navmesh polygon.
    PolyRef => "poly";

    /// Navmesh agent type (humanoid, large creature, ...).  Meshes are baked
    /// per agent type and a query for a different type maps to nothing.
    AgentTypeId => "agent-type";
}
