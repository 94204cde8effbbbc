//! `CellId`: a strong, zero-cost handle for cells of the refinement forest,
//! plus the per-cell storage record.
//!
//! Cells live in a per-level arena; a handle is the pair
//! `(level, index-in-level)`. Parent/child/neighbor relations are stored as
//! handles rather than references, so the refinement hierarchy never forms
//! an ownership cycle and freed slots can be reused after coarsening.

use crate::geometry::FacePerm;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Boundary indicator attached to boundary faces.
pub type BoundaryId = u32;
/// Material indicator attached to cells.
pub type MaterialId = u32;
/// Owner tag used by external domain-partitioning collaborators.
pub type SubdomainId = u32;

/// Handle of one cell: refinement level and index within that level's arena.
///
/// `Ord` sorts level-major, then by in-level index — the deterministic
/// traversal order used for DoF distribution.
#[derive(
    Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct CellId {
    /// Refinement level (0 = coarse mesh).
    pub level: u32,
    /// Index within the level's cell arena.
    pub index: u32,
}

impl CellId {
    /// Construct a handle from raw level and index.
    #[inline]
    pub const fn new(level: u32, index: u32) -> Self {
        Self { level, index }
    }
}

impl fmt::Debug for CellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CellId")
            .field(&self.level)
            .field(&self.index)
            .finish()
    }
}

impl fmt::Display for CellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.level, self.index)
    }
}

/// Transient per-cell adaptation flag, cleared by
/// [`execute_coarsening_and_refinement`](crate::adapt::execute_coarsening_and_refinement).
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
pub enum RefineFlag {
    /// No structural change requested.
    #[default]
    None,
    /// Split isotropically into `2^d` children.
    Refine,
    /// Merge this cell and its siblings back into the parent.
    Coarsen,
}

/// Link to the cell on the other side of a level-0 face.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub(crate) struct CoarseNeighbor {
    /// The adjacent coarse cell.
    pub cell: CellId,
    /// The neighbor's local index of the shared face.
    pub face: u8,
    /// Permutation from our face-corner frame to the neighbor's.
    pub orientation: FacePerm,
}

/// Storage record of one cell in the level arena.
#[derive(Clone, Debug)]
pub(crate) struct CellData {
    /// Global vertex indices, lexicographic local order; first `2^d` used.
    pub vertices: [u32; 8],
    /// Parent cell, `None` on level 0.
    pub parent: Option<CellId>,
    /// Children in child-position order; empty for active (leaf) cells.
    pub children: Vec<CellId>,
    /// Position among the parent's children (bit per axis); 0 on level 0.
    pub child_position: u8,
    /// Transient adaptation flag.
    pub flag: RefineFlag,
    /// Material indicator, inherited by children.
    pub material_id: MaterialId,
    /// Partitioning owner tag, inherited by children.
    pub subdomain_id: SubdomainId,
    /// Active finite-element index for hp-style discretizations.
    pub active_fe_index: usize,
    /// Per-face boundary indicator; `None` on interior faces.
    pub boundary_ids: [Option<BoundaryId>; 6],
    /// Level-0 face neighbors; unused (all `None`) above level 0, where
    /// neighbors are resolved through the parent.
    pub coarse_neighbors: [Option<CoarseNeighbor>; 6],
    /// False once the slot has been freed by coarsening.
    pub alive: bool,
}

impl CellData {
    pub(crate) fn is_active(&self) -> bool {
        self.alive && self.children.is_empty()
    }
}

#[cfg(test)]
mod layout_tests {
    use super::*;
    use static_assertions::assert_eq_size;

    // A handle is exactly one machine word on 64-bit targets.
    assert_eq_size!(CellId, u64);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_is_level_major() {
        let a = CellId::new(0, 9);
        let b = CellId::new(1, 0);
        let c = CellId::new(1, 3);
        assert!(a < b);
        assert!(b < c);
    }

    #[test]
    fn display_and_debug() {
        let id = CellId::new(2, 7);
        assert_eq!(format!("{id}"), "2:7");
        assert_eq!(format!("{id:?}"), "CellId(2, 7)");
    }

    #[test]
    fn serde_round_trip() {
        let id = CellId::new(3, 11);
        let json = serde_json::to_string(&id).unwrap();
        let back: CellId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
        let bytes = bincode::serialize(&id).unwrap();
        let back: CellId = bincode::deserialize(&bytes).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn default_flag_is_none() {
        assert_eq!(RefineFlag::default(), RefineFlag::None);
    }
}
