//! MeshForestError: unified error type for mesh-forest public APIs.
//!
//! Every fallible public operation in this crate reports through this enum.
//! Recoverable, expected-to-sometimes-fail conditions (stale numberings,
//! unsupported refinement modes, usage errors on constraint sets) travel as
//! `Result`; true structural-invariant violations are caught by the
//! [`DebugInvariants`](crate::debug_invariants::DebugInvariants) machinery and
//! panic at the point of violation.

use crate::dof::EntityKey;
use crate::topology::cell::CellId;
use thiserror::Error;

/// Unified error type for mesh-forest operations.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum MeshForestError {
    /// Spatial dimension outside the supported range {1, 2, 3}.
    #[error("unsupported spatial dimension {0} (expected 1, 2 or 3)")]
    InvalidDimension(usize),
    /// A coarse cell references a vertex outside the vertex array.
    #[error("cell {cell} references vertex {vertex}, but only {n_vertices} vertices exist")]
    VertexOutOfRange {
        /// Index of the offending coarse cell in the connectivity list.
        cell: usize,
        /// The out-of-range vertex index.
        vertex: u32,
        /// Number of vertices supplied to `create`.
        n_vertices: usize,
    },
    /// A coarse cell lists the wrong number of vertices for the dimension.
    #[error("cell {cell} has {found} vertices, expected {expected}")]
    CellArityMismatch {
        /// Index of the offending coarse cell.
        cell: usize,
        /// `2^dim` for the requested dimension.
        expected: usize,
        /// Number of vertices actually listed.
        found: usize,
    },
    /// A coarse cell lists the same vertex twice.
    #[error("cell {cell} lists vertex {vertex} more than once")]
    RepeatedCellVertex {
        /// Index of the offending coarse cell.
        cell: usize,
        /// The repeated vertex index.
        vertex: u32,
    },
    /// An interior face is shared by more than the two permitted cells.
    #[error("face shared by {count} cells; interior faces join at most two")]
    OversharedFace {
        /// Number of cells found sharing the face.
        count: usize,
    },
    /// Two cells listed as sharing a face disagree about its vertices.
    #[error("cells disagree about the vertices of a shared face")]
    MismatchedFace,
    /// Face-adjacent active cells differ by more than one refinement level.
    #[error("2:1 balance violated between cells {cell} and {neighbor}")]
    BalanceViolation {
        /// The coarser cell of the offending pair.
        cell: CellId,
        /// The finer cell of the offending pair.
        neighbor: CellId,
    },
    /// The cell handle does not refer to a live cell of the forest.
    #[error("no such cell: {0}")]
    NoSuchCell(CellId),
    /// Operation requires an active (leaf) cell.
    #[error("cell {0} is not active")]
    InactiveCell(CellId),
    /// Face index outside `0..2*dim`.
    #[error("face index {face} out of range (cell has {n_faces} faces)")]
    FaceIndexOutOfRange {
        /// The requested face index.
        face: usize,
        /// Number of faces per cell, `2*dim`.
        n_faces: usize,
    },
    /// Subface index outside `0..2^(dim-1)`.
    #[error("subface index {subface} out of range (face has {n_subfaces} subfaces)")]
    SubfaceIndexOutOfRange {
        /// The requested subface index.
        subface: usize,
        /// Number of subfaces per face, `2^(dim-1)`.
        n_subfaces: usize,
    },
    /// `neighbor_child_on_subface` requires the neighbor to be refined.
    #[error("neighbor of cell {cell} across face {face} is not refined")]
    NeighborNotRefined {
        /// The querying cell.
        cell: CellId,
        /// The face across which the neighbor was requested.
        face: usize,
    },
    /// Boundary indicators can only be set on boundary faces.
    #[error("face {face} of cell {cell} is interior, not a boundary face")]
    NotABoundaryFace {
        /// The cell whose face was addressed.
        cell: CellId,
        /// The interior face index.
        face: usize,
    },
    /// Requested refinement mode is not part of this crate's data model.
    #[error("unsupported refinement: {0}")]
    UnsupportedRefinement(&'static str),
    /// A DoF block of length zero was requested in the atlas.
    #[error("atlas blocks must have non-zero length")]
    ZeroLengthBlock,
    /// The entity is already registered in the atlas.
    #[error("duplicate entity in atlas: {0:?}")]
    DuplicateEntity(EntityKey),
    /// The entity is not registered in the atlas.
    #[error("entity not present in atlas: {0:?}")]
    MissingEntity(EntityKey),
    /// Atlas blocks are not contiguous (invariant violation surfaced by
    /// validation).
    #[error("atlas block at offset {found} breaks contiguity (expected offset {expected})")]
    NonContiguousBlock {
        /// Offset the block should start at.
        expected: usize,
        /// Offset actually recorded.
        found: usize,
    },
    /// A DoF numbering was used against a forest that has since changed.
    #[error("stale DoF numbering: computed for generation {computed}, forest is at {current}")]
    StaleDofMap {
        /// Generation the numbering was computed against.
        computed: u64,
        /// Current forest generation.
        current: u64,
    },
    /// The supplied renumbering is not a bijection on `[0, n_dofs)`.
    #[error("invalid renumbering permutation: {0}")]
    InvalidPermutation(String),
    /// A DoF index lies outside the numbering's range.
    #[error("DoF index {index} out of range (n_dofs = {n_dofs})")]
    DofIndexOutOfRange {
        /// The offending index.
        index: usize,
        /// Total number of DoFs.
        n_dofs: usize,
    },
    /// Mutation attempted on a constraint set after `close()`.
    #[error("constraint set is closed; no further modifications allowed")]
    ConstraintsClosed,
    /// Consumer contract (`distribute`/`condense`) requires a closed set.
    #[error("constraint set must be closed first")]
    ConstraintsNotClosed,
    /// A constraint cannot reference itself directly.
    #[error("DoF {0} cannot be constrained against itself")]
    SelfReferencingConstraint(usize),
    /// Two different weights were supplied for the same (constrained, source)
    /// pair.
    #[error("conflicting weights for constraint {constrained} against source {source_dof}")]
    ConflictingConstraint {
        /// The constrained DoF index.
        constrained: usize,
        /// The source DoF index.
        source_dof: usize,
    },
    /// `add_entry`/`set_inhomogeneity` on a line never created with
    /// `add_line`.
    #[error("no constraint line exists for DoF {0}")]
    UnknownConstraintLine(usize),
    /// A DoF transitively constrains itself.
    #[error("cyclic constraint detected through DoF {0}")]
    CyclicConstraint(usize),
    /// Element configuration the engine cannot honor.
    #[error("unsupported element: {0}")]
    UnsupportedElement(&'static str),
    /// Element description is malformed (e.g. degree zero).
    #[error("invalid element: {0}")]
    InvalidElement(&'static str),
    /// Element and forest dimensions disagree.
    #[error("dimension mismatch: element is {element}-dimensional, forest is {forest}-dimensional")]
    DimensionMismatch {
        /// Element dimension.
        element: usize,
        /// Forest dimension.
        forest: usize,
    },
    /// A refinement-created vertex expected on a hanging interface is absent.
    /// Indicates topology/constraint bookkeeping went out of sync.
    #[error("missing refinement vertex on entity {0:?}")]
    MissingRefinementVertex(EntityKey),
    /// A data buffer does not match the numbering it is used with.
    #[error("buffer length {found} does not match n_dofs {expected}")]
    BufferLengthMismatch {
        /// Expected length (`n_dofs`).
        expected: usize,
        /// Length supplied.
        found: usize,
    },
}
