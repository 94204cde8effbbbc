//! # mesh-forest
//!
//! Hierarchical adaptive mesh refinement for PDE codes: a forest of
//! refinement trees over a coarse quad/hex mesh with 2:1-balanced
//! refine/coarsen execution, deterministic DoF distribution, and
//! hanging-node constraint generation.
//!
//! The crate splits into:
//! - [`geometry`] — reference-cell combinatorics and face permutations;
//! - [`topology`] — the [`Forest`](topology::Forest) store with arena cell
//!   handles and structural neighbor resolution;
//! - [`adapt`] — flag consolidation and refinement/coarsening execution;
//! - [`element`] — per-entity DoF counts and 1D Lagrange bases;
//! - [`dof`] — entity-keyed DoF atlas, distribution, renumbering;
//! - [`constraints`] — affine constraint sets and the hanging-node builder;
//! - [`linalg`] / [`assembly`] — triplet sinks and the worker/copier loop;
//! - [`meshgen`] — structured coarse-mesh generators.
//!
//! ```
//! use mesh_forest::prelude::*;
//!
//! # fn main() -> Result<(), MeshForestError> {
//! let mut forest = subdivided_hyper_rectangle(
//!     2, [2, 1, 1], [0.0; 3], [2.0, 1.0, 0.0], false)?;
//! let left = forest.active_cells().next().unwrap();
//! forest.set_refine_flag(left)?;
//! execute_coarsening_and_refinement(&mut forest)?;
//!
//! let layout = ElementLayout::lagrange(2, 1)?;
//! let dofs = distribute_dofs(&forest, &layout)?;
//! let mut constraints = AffineConstraints::<f64>::new();
//! make_hanging_node_constraints(&forest, &dofs, &layout, &mut constraints)?;
//! constraints.close()?;
//! assert_eq!(constraints.n_constraints(), 1);
//! # Ok(())
//! # }
//! ```

pub mod adapt;
pub mod assembly;
pub mod constraints;
pub mod debug_invariants;
pub mod dof;
pub mod element;
pub mod geometry;
pub mod linalg;
pub mod mesh_error;
pub mod meshgen;
pub mod topology;

pub use mesh_error::MeshForestError;

/// Commonly used types and entry points.
pub mod prelude {
    pub use crate::adapt::{
        AdaptationSummary, execute_coarsening_and_refinement,
        fix_coarsening_and_refinement_flags, refine_global,
    };
    pub use crate::assembly::{assemble_cells, make_sparsity_pattern};
    pub use crate::constraints::{
        AffineConstraints, ConstraintLine, make_hanging_node_constraints,
    };
    pub use crate::debug_invariants::DebugInvariants;
    pub use crate::dof::{
        DofAtlas, DofIndex, DofMap, EntityKey, distribute_dofs,
    };
    pub use crate::element::{Continuity, ElementLayout, lagrange_basis_1d};
    pub use crate::geometry::{FacePerm, ReferenceCell};
    pub use crate::linalg::{CooMatrix, SparsityPattern, TripletSink};
    pub use crate::mesh_error::MeshForestError;
    pub use crate::meshgen::{hyper_cube, subdivided_hyper_rectangle};
    pub use crate::topology::{
        BoundaryId, CellId, Forest, InvalidateCache, MaterialId, NeighborLink,
        RefineFlag, SubdomainId,
    };
}
