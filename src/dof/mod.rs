//! Degree-of-freedom management: entity keys, the block atlas, and the
//! distribution handler.
//!
//! DoFs attach to geometric entities (vertices, edge interiors, face
//! interiors, cell interiors). Entities that are shared between cells are
//! keyed by their sorted global vertex ids, so two cells touching the same
//! edge agree on the key without any extra connectivity structure; cell
//! interiors are keyed by the cell handle.

pub mod atlas;
pub mod handler;

pub use atlas::DofAtlas;
pub use handler::{DofMap, distribute_dofs};

use crate::topology::cell::CellId;
use serde::{Deserialize, Serialize};

/// Global DoF index.
pub type DofIndex = usize;

/// Key of a DoF-carrying geometric entity.
///
/// Shared entities (vertices, lines, quads) are keyed by sorted global
/// vertex ids; interiors by the owning cell. `Ord` gives a deterministic
/// entity ordering for exports.
#[derive(
    Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum EntityKey {
    /// A mesh vertex.
    Vertex(u32),
    /// An edge (3D) or face (2D) interior, endpoints sorted ascending.
    Line(u32, u32),
    /// A quad face interior (3D), corners sorted ascending.
    Quad([u32; 4]),
    /// A cell interior.
    Cell(CellId),
}

impl EntityKey {
    /// Line key from endpoints in any order.
    #[inline]
    pub fn line(a: u32, b: u32) -> Self {
        if a <= b { Self::Line(a, b) } else { Self::Line(b, a) }
    }

    /// Quad key from corners in any order.
    #[inline]
    pub fn quad(mut corners: [u32; 4]) -> Self {
        corners.sort_unstable();
        Self::Quad(corners)
    }
}
