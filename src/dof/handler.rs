//! DoF distribution over the active cells of a forest.
//!
//! [`distribute_dofs`] walks the active cells in the deterministic
//! level-major order and allocates one contiguous block per touched entity
//! on first contact, so the resulting numbering is reproducible for a given
//! forest state and element layout. The per-cell local-to-global arrays are
//! materialized once at distribution time; afterwards the [`DofMap`] is an
//! immutable lookup structure (modulo [`DofMap::renumber`]).
//!
//! Edge-interior blocks are direction-normalized: the block runs from the
//! edge endpoint with the smaller global vertex id, and a cell traversing
//! the edge the other way reads the block with the node order reversed
//! (component order within each node unchanged). This keeps higher-order
//! continuous elements conforming without per-edge orientation state.

use crate::debug_invariants::DebugInvariants;
use crate::dof::atlas::DofAtlas;
use crate::dof::{DofIndex, EntityKey};
use crate::element::ElementLayout;
use crate::mesh_error::MeshForestError;
use crate::topology::cache::InvalidateCache;
use crate::topology::cell::CellId;
use crate::topology::forest::Forest;
use hashbrown::HashMap;
use log::debug;

/// Immutable DoF numbering of one forest state.
#[derive(Clone, Debug)]
pub struct DofMap {
    atlas: DofAtlas,
    cells: Vec<CellId>,
    cell_dofs: Vec<DofIndex>,
    cell_index: HashMap<CellId, usize>,
    /// Composed renumbering, canonical atlas index -> current index.
    numbering: Vec<DofIndex>,
    dofs_per_cell: usize,
    generation: u64,
    n_dofs: usize,
}

impl DofMap {
    /// Total number of DoFs.
    #[inline]
    pub fn n_dofs(&self) -> usize {
        self.n_dofs
    }

    /// Forest generation this numbering was computed against.
    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Number of cells covered (the active cells at distribution time).
    #[inline]
    pub fn n_cells(&self) -> usize {
        self.cells.len()
    }

    /// DoFs per cell of the layout this map was built for.
    #[inline]
    pub fn dofs_per_cell(&self) -> usize {
        self.dofs_per_cell
    }

    /// Covered cells in distribution order.
    pub fn cells(&self) -> impl Iterator<Item = CellId> + '_ {
        self.cells.iter().copied()
    }

    fn check_generation(&self, forest: &Forest) -> Result<(), MeshForestError> {
        if self.generation != forest.generation() {
            return Err(MeshForestError::StaleDofMap {
                computed: self.generation,
                current: forest.generation(),
            });
        }
        Ok(())
    }

    /// Local-to-global DoF array of an active cell, in the local order
    /// vertices / lines / quads / interior.
    ///
    /// # Errors
    /// `StaleDofMap` if the forest has changed since distribution;
    /// `NoSuchCell` for cells the map does not cover.
    pub fn cell_dofs(
        &self,
        forest: &Forest,
        cell: CellId,
    ) -> Result<&[DofIndex], MeshForestError> {
        self.check_generation(forest)?;
        let ci = *self
            .cell_index
            .get(&cell)
            .ok_or(MeshForestError::NoSuchCell(cell))?;
        Ok(&self.cell_dofs[ci * self.dofs_per_cell..(ci + 1) * self.dofs_per_cell])
    }

    /// Global DoF indices of one entity's block, in canonical block order.
    ///
    /// # Errors
    /// `StaleDofMap`, or `MissingEntity` if no DoFs were attached to `key`.
    pub fn entity_dofs(
        &self,
        forest: &Forest,
        key: &EntityKey,
    ) -> Result<Vec<DofIndex>, MeshForestError> {
        self.check_generation(forest)?;
        let (offset, len) = self.atlas.try_get(key)?;
        Ok((offset..offset + len).map(|i| self.numbering[i]).collect())
    }

    /// Whether any DoFs are attached to `key`.
    pub fn has_entity(&self, key: &EntityKey) -> bool {
        self.atlas.contains(key)
    }

    /// Apply a renumbering: `new_numbering[current] = new`.
    ///
    /// Successive calls compose. Entity blocks keep their canonical order;
    /// only the index values change. The atlas version is bumped so data
    /// cached against the previous numbering can detect the change.
    ///
    /// # Errors
    /// `InvalidPermutation` unless `new_numbering` is a bijection on
    /// `[0, n_dofs)`; `DofIndexOutOfRange` for out-of-range targets.
    pub fn renumber(&mut self, new_numbering: &[DofIndex]) -> Result<(), MeshForestError> {
        if new_numbering.len() != self.n_dofs {
            return Err(MeshForestError::InvalidPermutation(format!(
                "permutation has length {}, numbering has {} DoFs",
                new_numbering.len(),
                self.n_dofs
            )));
        }
        let mut seen = vec![false; self.n_dofs];
        for &target in new_numbering {
            if target >= self.n_dofs {
                return Err(MeshForestError::DofIndexOutOfRange {
                    index: target,
                    n_dofs: self.n_dofs,
                });
            }
            if seen[target] {
                return Err(MeshForestError::InvalidPermutation(format!(
                    "target index {target} appears more than once"
                )));
            }
            seen[target] = true;
        }
        for dof in &mut self.cell_dofs {
            *dof = new_numbering[*dof];
        }
        for dof in &mut self.numbering {
            *dof = new_numbering[*dof];
        }
        self.atlas.invalidate_cache();
        Ok(())
    }
}

fn block(
    atlas: &mut DofAtlas,
    key: EntityKey,
    len: usize,
) -> Result<usize, MeshForestError> {
    match atlas.get(&key) {
        Some((offset, _)) => Ok(offset),
        None => atlas.try_insert(key, len),
    }
}

/// Assign densely packed global DoF indices over the active cells.
///
/// Shared entities (vertices, edges, faces) receive one block on first
/// touch; every later cell reuses it, so cells agree on the indices of
/// shared entities by construction.
///
/// # Errors
/// `DimensionMismatch` if element and forest dimensions differ.
pub fn distribute_dofs(
    forest: &Forest,
    layout: &ElementLayout,
) -> Result<DofMap, MeshForestError> {
    if layout.dim != forest.dim() {
        return Err(MeshForestError::DimensionMismatch {
            element: layout.dim,
            forest: forest.dim(),
        });
    }
    let rc = forest.reference();
    let dim = forest.dim();
    let dofs_per_cell = layout.dofs_per_cell();
    let cells: Vec<CellId> = forest.active_cells().collect();

    let mut atlas = DofAtlas::new();
    let mut cell_dofs = Vec::with_capacity(cells.len() * dofs_per_cell);
    let mut cell_index = HashMap::with_capacity(cells.len());

    for (ci, &id) in cells.iter().enumerate() {
        cell_index.insert(id, ci);
        let vids = forest.cell_vertices(id)?;

        if layout.dofs_per_vertex > 0 {
            for &vid in vids {
                let offset =
                    block(&mut atlas, EntityKey::Vertex(vid), layout.dofs_per_vertex)?;
                cell_dofs.extend(offset..offset + layout.dofs_per_vertex);
            }
        }

        if layout.dofs_per_line > 0 && dim >= 2 {
            let n_lines = if dim == 2 { rc.n_faces() } else { rc.n_edges() };
            for line in 0..n_lines {
                let (a, b) = if dim == 2 {
                    (rc.face_vertex(line, 0), rc.face_vertex(line, 1))
                } else {
                    rc.edge_vertices(line)
                };
                let (va, vb) = (vids[a], vids[b]);
                let offset =
                    block(&mut atlas, EntityKey::line(va, vb), layout.dofs_per_line)?;
                if va <= vb {
                    cell_dofs.extend(offset..offset + layout.dofs_per_line);
                } else {
                    // reversed traversal flips the node order, not the
                    // component order within a node
                    let nodes = layout.dofs_per_line / layout.components;
                    for node in (0..nodes).rev() {
                        let start = offset + node * layout.components;
                        cell_dofs.extend(start..start + layout.components);
                    }
                }
            }
        }

        if layout.dofs_per_quad > 0 && dim == 3 {
            for face in 0..rc.n_faces() {
                let corners = [
                    vids[rc.face_vertex(face, 0)],
                    vids[rc.face_vertex(face, 1)],
                    vids[rc.face_vertex(face, 2)],
                    vids[rc.face_vertex(face, 3)],
                ];
                let offset = block(
                    &mut atlas,
                    EntityKey::quad(corners),
                    layout.dofs_per_quad,
                )?;
                // quad-interior blocks are emitted in canonical block order
                cell_dofs.extend(offset..offset + layout.dofs_per_quad);
            }
        }

        let interior = layout.dofs_per_cell_interior();
        if interior > 0 {
            let offset = block(&mut atlas, EntityKey::Cell(id), interior)?;
            cell_dofs.extend(offset..offset + interior);
        }
    }

    atlas.debug_assert_invariants();
    let n_dofs = atlas.total_len();
    debug!(
        "distributed {} DoFs over {} active cells ({} entities)",
        n_dofs,
        cells.len(),
        atlas.len()
    );
    Ok(DofMap {
        atlas,
        cells,
        cell_dofs,
        cell_index,
        numbering: (0..n_dofs).collect(),
        dofs_per_cell,
        generation: forest.generation(),
        n_dofs,
    })
}
