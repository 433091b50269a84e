//! Agent navigation profile: which mesh and which area categories a query may
//! use.

use crate::AgentTypeId;

/// Navmesh area category of a polygon.
pub type AreaId = u8;

/// Default walkable area.
pub const AREA_WALKABLE: AreaId = 0;

/// Never traversable, whatever the agent's mask says.
pub const AREA_NOT_WALKABLE: AreaId = 1;

/// Bitmask of traversable area categories (bit `n` ⇔ area `n`).
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct AreaMask(pub u32);

impl AreaMask {
    pub const ALL: AreaMask = AreaMask(u32::MAX);
    pub const NONE: AreaMask = AreaMask(0);

    /// `true` if a polygon of `area` may be entered under this mask.
    #[inline]
    pub fn allows(self, area: AreaId) -> bool {
        area != AREA_NOT_WALKABLE && area < 32 && self.0 & (1u32 << area) != 0
    }

    pub fn without(self, area: AreaId) -> AreaMask {
        if area < 32 { AreaMask(self.0 & !(1u32 << area)) } else { self }
    }
}

impl Default for AreaMask {
    fn default() -> Self {
        Self::ALL
    }
}

/// Navigable-area filter for one agent.  Immutable for the duration of a
/// query batch.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct AgentProfile {
    pub agent_type: AgentTypeId,
    pub area_mask:  AreaMask,
}

impl AgentProfile {
    /// Agent type baked into meshes that do not specify one.
    pub const HUMANOID: AgentTypeId = AgentTypeId(0);

    pub fn new(agent_type: AgentTypeId, area_mask: AreaMask) -> Self {
        Self { agent_type, area_mask }
    }
}

impl Default for AgentProfile {
    fn default() -> Self {
        Self { agent_type: Self::HUMANOID, area_mask: AreaMask::ALL }
    }
}
