//! `Forest`: the level-structured mesh topology store.
//!
//! A forest holds, per refinement level, an arena of cells plus the shared
//! vertex pool. Level 0 is the coarse mesh handed to [`Forest::create`];
//! deeper levels are produced exclusively by
//! [`execute_coarsening_and_refinement`](crate::adapt::execute_coarsening_and_refinement).
//! Parent, child and neighbor relations are stored as [`CellId`] handles.
//!
//! Neighbor queries above level 0 are resolved structurally through the
//! parent chain instead of stored fine-level pointers, so there is nothing
//! to go stale when cells are split or merged. A query returns the neighbor
//! at the same level (possibly inactive, i.e. further refined) or the
//! coarser active cell; callers descend into finer neighbors with
//! [`Forest::neighbor_child_on_subface`].
//!
//! Every structural mutation bumps a generation counter. Derived data such
//! as DoF numberings record the generation they were computed against and
//! refuse to be used across a mutation.

use crate::debug_invariants::DebugInvariants;
use crate::geometry::{FacePerm, ReferenceCell};
use crate::mesh_error::MeshForestError;
use crate::topology::cache::InvalidateCache;
use crate::topology::cell::{
    BoundaryId, CellData, CellId, CoarseNeighbor, MaterialId, RefineFlag, SubdomainId,
};
use hashbrown::HashMap;
use once_cell::sync::OnceCell;

/// Resolved link to the cell across a face: the neighbor handle, the
/// neighbor's local face index, and the face-frame permutation.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct NeighborLink {
    /// The adjacent cell (same level as the querying cell, or coarser).
    pub cell: CellId,
    /// The neighbor's local index of the shared face.
    pub face: usize,
    /// Permutation from the querying cell's face-corner frame to the
    /// neighbor's.
    pub orientation: FacePerm,
}

#[derive(Clone, Debug, Default)]
pub(crate) struct Level {
    pub cells: Vec<CellData>,
    /// Slots freed by coarsening, reused by later refinement.
    pub free: Vec<u32>,
}

/// Hierarchical mesh over a coarse quad/hex mesh.
#[derive(Debug)]
pub struct Forest {
    pub(crate) dim: usize,
    pub(crate) reference: ReferenceCell,
    pub(crate) vertices: Vec<[f64; 3]>,
    pub(crate) levels: Vec<Level>,
    /// Refinement-created vertices, keyed by the sorted ids of the corner
    /// vertices spanning the bisected entity. Shared between neighbors that
    /// refine at different times.
    pub(crate) midpoints: HashMap<Vec<u32>, u32>,
    pub(crate) generation: u64,
    active: OnceCell<Vec<CellId>>,
}

impl Forest {
    /// Build the level-0 mesh from explicit vertices and cell connectivity.
    ///
    /// Each cell lists its `2^dim` vertices in the lexicographic local order
    /// of [`ReferenceCell`].
    ///
    /// # Errors
    /// `InvalidDimension`, `CellArityMismatch`, `VertexOutOfRange`,
    /// `RepeatedCellVertex`, or `OversharedFace` if an interior face is
    /// claimed by more than two cells.
    pub fn create(
        dim: usize,
        vertices: Vec<[f64; 3]>,
        cells: &[Vec<u32>],
    ) -> Result<Self, MeshForestError> {
        let reference = ReferenceCell::new(dim)?;
        let n_cell_vertices = reference.n_vertices();

        let mut arena = Vec::with_capacity(cells.len());
        for (ci, conn) in cells.iter().enumerate() {
            if conn.len() != n_cell_vertices {
                return Err(MeshForestError::CellArityMismatch {
                    cell: ci,
                    expected: n_cell_vertices,
                    found: conn.len(),
                });
            }
            let mut verts = [0u32; 8];
            for (vi, &v) in conn.iter().enumerate() {
                if v as usize >= vertices.len() {
                    return Err(MeshForestError::VertexOutOfRange {
                        cell: ci,
                        vertex: v,
                        n_vertices: vertices.len(),
                    });
                }
                if conn[..vi].contains(&v) {
                    return Err(MeshForestError::RepeatedCellVertex { cell: ci, vertex: v });
                }
                verts[vi] = v;
            }
            arena.push(CellData {
                vertices: verts,
                parent: None,
                children: Vec::new(),
                child_position: 0,
                flag: RefineFlag::None,
                material_id: 0,
                subdomain_id: 0,
                active_fe_index: 0,
                boundary_ids: [None; 6],
                coarse_neighbors: [None; 6],
                alive: true,
            });
        }

        // Match faces by their sorted vertex key.
        let mut face_map: HashMap<Vec<u32>, Vec<(usize, usize)>> = HashMap::new();
        for (ci, cell) in arena.iter().enumerate() {
            for face in 0..reference.n_faces() {
                let mut key: Vec<u32> = (0..reference.n_face_vertices())
                    .map(|k| cell.vertices[reference.face_vertex(face, k)])
                    .collect();
                key.sort_unstable();
                face_map.entry(key).or_default().push((ci, face));
            }
        }

        for users in face_map.values() {
            match users[..] {
                [(ci, face)] => {
                    arena[ci].boundary_ids[face] = Some(0);
                }
                [(c0, f0), (c1, f1)] => {
                    let corners = |cell: &CellData, face: usize| -> Vec<u32> {
                        (0..reference.n_face_vertices())
                            .map(|k| cell.vertices[reference.face_vertex(face, k)])
                            .collect()
                    };
                    let mine = corners(&arena[c0], f0);
                    let theirs = corners(&arena[c1], f1);
                    let orientation = FacePerm::match_faces(&mine, &theirs)
                        .ok_or(MeshForestError::MismatchedFace)?;
                    arena[c0].coarse_neighbors[f0] = Some(CoarseNeighbor {
                        cell: CellId::new(0, c1 as u32),
                        face: f1 as u8,
                        orientation,
                    });
                    arena[c1].coarse_neighbors[f1] = Some(CoarseNeighbor {
                        cell: CellId::new(0, c0 as u32),
                        face: f0 as u8,
                        orientation: orientation.inverted(),
                    });
                }
                _ => {
                    return Err(MeshForestError::OversharedFace { count: users.len() });
                }
            }
        }

        let forest = Self {
            dim,
            reference,
            vertices,
            levels: vec![Level {
                cells: arena,
                free: Vec::new(),
            }],
            midpoints: HashMap::new(),
            generation: 0,
            active: OnceCell::new(),
        };
        forest.debug_assert_invariants();
        Ok(forest)
    }

    //=== basic accessors ===

    /// Spatial dimension.
    #[inline]
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Reference-cell combinatorics for this dimension.
    #[inline]
    pub fn reference(&self) -> ReferenceCell {
        self.reference
    }

    /// Generation counter; bumped by every structural mutation.
    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Number of refinement levels currently allocated.
    #[inline]
    pub fn n_levels(&self) -> usize {
        self.levels.len()
    }

    /// Number of vertices, including refinement-created ones.
    #[inline]
    pub fn n_vertices(&self) -> usize {
        self.vertices.len()
    }

    /// Coordinates of a vertex, or `None` if the index is out of range.
    #[inline]
    pub fn vertex(&self, v: u32) -> Option<[f64; 3]> {
        self.vertices.get(v as usize).copied()
    }

    /// All vertex coordinates, indexed by vertex id.
    #[inline]
    pub fn vertices(&self) -> &[[f64; 3]] {
        &self.vertices
    }

    /// Total number of live cells across all levels.
    pub fn n_cells(&self) -> usize {
        self.levels
            .iter()
            .map(|l| l.cells.iter().filter(|c| c.alive).count())
            .sum()
    }

    /// Number of active (leaf) cells.
    pub fn n_active_cells(&self) -> usize {
        self.active_order().len()
    }

    pub(crate) fn cell(&self, id: CellId) -> Result<&CellData, MeshForestError> {
        self.levels
            .get(id.level as usize)
            .and_then(|l| l.cells.get(id.index as usize))
            .filter(|c| c.alive)
            .ok_or(MeshForestError::NoSuchCell(id))
    }

    pub(crate) fn cell_mut(&mut self, id: CellId) -> Result<&mut CellData, MeshForestError> {
        self.levels
            .get_mut(id.level as usize)
            .and_then(|l| l.cells.get_mut(id.index as usize))
            .filter(|c| c.alive)
            .ok_or(MeshForestError::NoSuchCell(id))
    }

    /// Whether the cell is an active leaf.
    pub fn is_active(&self, id: CellId) -> Result<bool, MeshForestError> {
        Ok(self.cell(id)?.is_active())
    }

    /// Parent cell, `None` on level 0.
    pub fn parent(&self, id: CellId) -> Result<Option<CellId>, MeshForestError> {
        Ok(self.cell(id)?.parent)
    }

    /// Children in child-position order; empty for active cells.
    pub fn children(&self, id: CellId) -> Result<&[CellId], MeshForestError> {
        Ok(&self.cell(id)?.children)
    }

    /// Global vertex ids of the cell, lexicographic local order.
    pub fn cell_vertices(&self, id: CellId) -> Result<&[u32], MeshForestError> {
        Ok(&self.cell(id)?.vertices[..self.reference.n_vertices()])
    }

    /// Vertex coordinates of the cell, lexicographic local order.
    pub fn cell_vertex_positions(&self, id: CellId) -> Result<Vec<[f64; 3]>, MeshForestError> {
        let vids = self.cell_vertices(id)?;
        Ok(vids.iter().map(|&v| self.vertices[v as usize]).collect())
    }

    //=== iteration ===

    fn active_order(&self) -> &[CellId] {
        self.active.get_or_init(|| {
            let mut order = Vec::new();
            for (level, l) in self.levels.iter().enumerate() {
                for (index, c) in l.cells.iter().enumerate() {
                    if c.is_active() {
                        order.push(CellId::new(level as u32, index as u32));
                    }
                }
            }
            order
        })
    }

    /// Active cells in the deterministic traversal order: level-major, then
    /// by in-level index. This order is a correctness requirement for
    /// reproducible DoF numberings.
    pub fn active_cells(&self) -> impl Iterator<Item = CellId> + '_ {
        self.active_order().iter().copied()
    }

    /// All live cells (any level), level-major.
    pub fn all_cells(&self) -> impl Iterator<Item = CellId> + '_ {
        self.levels.iter().enumerate().flat_map(|(level, l)| {
            l.cells.iter().enumerate().filter_map(move |(index, c)| {
                c.alive.then_some(CellId::new(level as u32, index as u32))
            })
        })
    }

    //=== neighbor topology ===

    fn check_face(&self, face: usize) -> Result<(), MeshForestError> {
        if face >= self.reference.n_faces() {
            return Err(MeshForestError::FaceIndexOutOfRange {
                face,
                n_faces: self.reference.n_faces(),
            });
        }
        Ok(())
    }

    /// Resolved neighbor link across `face`: same-level neighbor (active or
    /// refined) where one exists, otherwise the coarser active neighbor;
    /// `None` at the domain boundary.
    pub fn neighbor_link(
        &self,
        id: CellId,
        face: usize,
    ) -> Result<Option<NeighborLink>, MeshForestError> {
        self.check_face(face)?;
        self.link_inner(id, face)
    }

    fn link_inner(
        &self,
        id: CellId,
        face: usize,
    ) -> Result<Option<NeighborLink>, MeshForestError> {
        let rc = self.reference;
        let c = self.cell(id)?;
        let Some(parent) = c.parent else {
            return Ok(c.coarse_neighbors[face].map(|cn| NeighborLink {
                cell: cn.cell,
                face: cn.face as usize,
                orientation: cn.orientation,
            }));
        };
        let axis = rc.face_axis(face);
        let side = rc.face_side(face);
        let pos = c.child_position as usize;
        if (pos >> axis) & 1 != side {
            // sibling inside the same parent
            let sibling = self.cell(parent)?.children[pos ^ (1 << axis)];
            return Ok(Some(NeighborLink {
                cell: sibling,
                face: rc.opposite_face(face),
                orientation: FacePerm::identity(rc.n_face_vertices()),
            }));
        }
        let Some(plink) = self.link_inner(parent, face)? else {
            return Ok(None);
        };
        let nd = self.cell(plink.cell)?;
        if nd.children.is_empty() {
            // coarser neighbor; caller sees a level gap of (at least) one
            return Ok(Some(plink));
        }
        // descend into the neighbor's child touching our subface; children
        // inherit the parent's face frame, so the stored permutation applies
        // unchanged at every level
        let sub = rc
            .subface_of_child(face, pos)
            .expect("child on the parent's face has a subface there");
        let their_child = rc.child_at_subface(plink.face, plink.orientation.apply(sub));
        Ok(Some(NeighborLink {
            cell: nd.children[their_child],
            face: plink.face,
            orientation: plink.orientation,
        }))
    }

    /// The cell across `face`, or `None` at the boundary. If the neighbor is
    /// more refined, the same-level (inactive) neighbor is returned and the
    /// caller descends via [`Forest::neighbor_child_on_subface`].
    pub fn neighbor(&self, id: CellId, face: usize) -> Result<Option<CellId>, MeshForestError> {
        Ok(self.neighbor_link(id, face)?.map(|l| l.cell))
    }

    /// Whether the active neighbor across `face` lives on a coarser level.
    pub fn neighbor_is_coarser(&self, id: CellId, face: usize) -> Result<bool, MeshForestError> {
        Ok(self
            .neighbor_link(id, face)?
            .is_some_and(|l| l.cell.level < id.level))
    }

    /// The finer neighbor cell matching `subface` of `face`.
    ///
    /// Requires the neighbor to be refined; with 2:1 balance the returned
    /// cell is exactly one level finer than `id`.
    ///
    /// # Errors
    /// `NeighborNotRefined` if there is no neighbor or it has no children;
    /// `FaceIndexOutOfRange` / `SubfaceIndexOutOfRange` on bad indices.
    pub fn neighbor_child_on_subface(
        &self,
        id: CellId,
        face: usize,
        subface: usize,
    ) -> Result<CellId, MeshForestError> {
        self.check_face(face)?;
        let rc = self.reference;
        if subface >= rc.n_subfaces() {
            return Err(MeshForestError::SubfaceIndexOutOfRange {
                subface,
                n_subfaces: rc.n_subfaces(),
            });
        }
        let link = self
            .link_inner(id, face)?
            .ok_or(MeshForestError::NeighborNotRefined { cell: id, face })?;
        let nd = self.cell(link.cell)?;
        if nd.children.is_empty() || link.cell.level < id.level {
            return Err(MeshForestError::NeighborNotRefined { cell: id, face });
        }
        let their_child = rc.child_at_subface(link.face, link.orientation.apply(subface));
        let child = nd.children[their_child];

        // Under a non-standard face frame the neighbor enumerates this
        // subface's corners in a different sequence than we do, so the child
        // may only be validated against the coarse corner as a set-membership
        // relation, never by comparing corner sequences position by position.
        #[cfg(any(debug_assertions, feature = "check-invariants"))]
        {
            let my_corner = self.cell(id)?.vertices[rc.face_vertex(face, subface)];
            let cd = self.cell(child)?;
            let on_face = (0..rc.n_face_vertices())
                .map(|k| cd.vertices[rc.face_vertex(link.face, k)])
                .any(|v| v == my_corner);
            debug_assert!(
                on_face,
                "subface child {child} does not touch coarse corner of {id}"
            );
        }
        Ok(child)
    }

    //=== flags and attributes ===

    /// Current adaptation flag of a cell.
    pub fn refine_flag(&self, id: CellId) -> Result<RefineFlag, MeshForestError> {
        Ok(self.cell(id)?.flag)
    }

    fn set_flag(&mut self, id: CellId, flag: RefineFlag) -> Result<(), MeshForestError> {
        let c = self.cell_mut(id)?;
        if !c.is_active() {
            return Err(MeshForestError::InactiveCell(id));
        }
        c.flag = flag;
        Ok(())
    }

    /// Mark an active cell for isotropic refinement.
    pub fn set_refine_flag(&mut self, id: CellId) -> Result<(), MeshForestError> {
        self.set_flag(id, RefineFlag::Refine)
    }

    /// Mark an active cell for coarsening (merged with its siblings).
    pub fn set_coarsen_flag(&mut self, id: CellId) -> Result<(), MeshForestError> {
        self.set_flag(id, RefineFlag::Coarsen)
    }

    /// Clear the adaptation flag of an active cell.
    pub fn clear_flag(&mut self, id: CellId) -> Result<(), MeshForestError> {
        self.set_flag(id, RefineFlag::None)
    }

    /// Clear all adaptation flags on all cells.
    pub fn clear_all_flags(&mut self) {
        for level in &mut self.levels {
            for c in &mut level.cells {
                c.flag = RefineFlag::None;
            }
        }
    }

    /// Anisotropic refinement is not part of this forest's data model; the
    /// request is rejected explicitly rather than silently ignored.
    pub fn set_anisotropic_refine_flag(
        &mut self,
        _id: CellId,
        _axis: usize,
    ) -> Result<(), MeshForestError> {
        Err(MeshForestError::UnsupportedRefinement(
            "anisotropic refinement is not part of the forest data model",
        ))
    }

    /// Material indicator of a cell.
    pub fn material_id(&self, id: CellId) -> Result<MaterialId, MeshForestError> {
        Ok(self.cell(id)?.material_id)
    }

    /// Set the material indicator of a cell.
    pub fn set_material_id(&mut self, id: CellId, m: MaterialId) -> Result<(), MeshForestError> {
        self.cell_mut(id)?.material_id = m;
        Ok(())
    }

    /// Subdomain owner tag of a cell (consumed by external partitioners).
    pub fn subdomain_id(&self, id: CellId) -> Result<SubdomainId, MeshForestError> {
        Ok(self.cell(id)?.subdomain_id)
    }

    /// Set the subdomain owner tag of a cell.
    pub fn set_subdomain_id(&mut self, id: CellId, s: SubdomainId) -> Result<(), MeshForestError> {
        self.cell_mut(id)?.subdomain_id = s;
        Ok(())
    }

    /// Active finite-element index (hp discretizations).
    pub fn active_fe_index(&self, id: CellId) -> Result<usize, MeshForestError> {
        Ok(self.cell(id)?.active_fe_index)
    }

    /// Set the active finite-element index of an active cell.
    pub fn set_active_fe_index(&mut self, id: CellId, fe: usize) -> Result<(), MeshForestError> {
        let c = self.cell_mut(id)?;
        if !c.is_active() {
            return Err(MeshForestError::InactiveCell(id));
        }
        c.active_fe_index = fe;
        Ok(())
    }

    /// Boundary indicator of a face; `None` on interior faces.
    pub fn boundary_id(
        &self,
        id: CellId,
        face: usize,
    ) -> Result<Option<BoundaryId>, MeshForestError> {
        self.check_face(face)?;
        Ok(self.cell(id)?.boundary_ids[face])
    }

    /// Set the boundary indicator of a boundary face, propagating to all
    /// descendants sharing that face.
    ///
    /// # Errors
    /// `NotABoundaryFace` on interior faces.
    pub fn set_boundary_id(
        &mut self,
        id: CellId,
        face: usize,
        b: BoundaryId,
    ) -> Result<(), MeshForestError> {
        self.check_face(face)?;
        if self.neighbor_link(id, face)?.is_some() {
            return Err(MeshForestError::NotABoundaryFace { cell: id, face });
        }
        // collect the descendants touching this face before mutating
        let rc = self.reference;
        let mut stack = vec![id];
        let mut touched = Vec::new();
        while let Some(c) = stack.pop() {
            touched.push(c);
            let cd = self.cell(c)?;
            for &child in &cd.children {
                let pos = self.cell(child)?.child_position as usize;
                if rc.subface_of_child(face, pos).is_some() {
                    stack.push(child);
                }
            }
        }
        for c in touched {
            self.cell_mut(c)?.boundary_ids[face] = Some(b);
        }
        Ok(())
    }

    //=== refinement-support plumbing (used by crate::adapt) ===

    /// Vertex created by refinement on the entity spanned by `corners`
    /// (edge endpoints, face corners or cell corners), if it exists.
    pub(crate) fn refinement_vertex(&self, corners: &[u32]) -> Option<u32> {
        let mut key = corners.to_vec();
        key.sort_unstable();
        self.midpoints.get(&key).copied()
    }

    /// Look up or create the midpoint vertex of the entity spanned by
    /// `corners`; the position is the mean of the corner positions
    /// (multilinear interpolation; curved manifolds are external).
    pub(crate) fn midpoint_or_create(&mut self, corners: &[u32]) -> u32 {
        let mut key = corners.to_vec();
        key.sort_unstable();
        if let Some(&v) = self.midpoints.get(&key) {
            return v;
        }
        let mut pos = [0.0f64; 3];
        for &c in corners {
            let p = self.vertices[c as usize];
            for (acc, x) in pos.iter_mut().zip(p) {
                *acc += x;
            }
        }
        let n = corners.len() as f64;
        for acc in &mut pos {
            *acc /= n;
        }
        let v = self.vertices.len() as u32;
        self.vertices.push(pos);
        self.midpoints.insert(key, v);
        v
    }

    /// Allocate a cell slot on `level`, reusing freed slots.
    pub(crate) fn alloc_cell(&mut self, level: usize, data: CellData) -> CellId {
        while self.levels.len() <= level {
            self.levels.push(Level::default());
        }
        let l = &mut self.levels[level];
        if let Some(index) = l.free.pop() {
            l.cells[index as usize] = data;
            CellId::new(level as u32, index)
        } else {
            l.cells.push(data);
            CellId::new(level as u32, (l.cells.len() - 1) as u32)
        }
    }

    /// Free a cell slot for reuse. The caller is responsible for unlinking
    /// it from its parent first.
    pub(crate) fn free_cell(&mut self, id: CellId) {
        let l = &mut self.levels[id.level as usize];
        let c = &mut l.cells[id.index as usize];
        c.alive = false;
        c.children.clear();
        c.parent = None;
        l.free.push(id.index);
    }

    /// Record a structural mutation: new generation, caches dropped.
    pub(crate) fn bump_generation(&mut self) {
        self.generation += 1;
        self.invalidate_cache();
    }
}

impl InvalidateCache for Forest {
    fn invalidate_cache(&mut self) {
        self.active.take();
    }
}

impl DebugInvariants for Forest {
    fn debug_assert_invariants(&self) {
        crate::forest_debug_assert_ok!(self.validate_invariants(), "Forest invalid");
    }

    fn validate_invariants(&self) -> Result<(), MeshForestError> {
        let rc = self.reference;
        for (level, l) in self.levels.iter().enumerate() {
            for (index, c) in l.cells.iter().enumerate() {
                if !c.alive {
                    continue;
                }
                let id = CellId::new(level as u32, index as u32);
                for &v in &c.vertices[..rc.n_vertices()] {
                    if v as usize >= self.vertices.len() {
                        return Err(MeshForestError::VertexOutOfRange {
                            cell: index,
                            vertex: v,
                            n_vertices: self.vertices.len(),
                        });
                    }
                }
                if !c.children.is_empty() && c.children.len() != rc.n_children() {
                    return Err(MeshForestError::NoSuchCell(id));
                }
                for (pos, &child) in c.children.iter().enumerate() {
                    let cd = self.cell(child)?;
                    if cd.parent != Some(id) || cd.child_position as usize != pos {
                        return Err(MeshForestError::NoSuchCell(child));
                    }
                }
                if let Some(parent) = c.parent {
                    let pd = self.cell(parent)?;
                    if pd.children.get(c.child_position as usize) != Some(&id) {
                        return Err(MeshForestError::NoSuchCell(id));
                    }
                }
            }
        }
        // 2:1 balance over active cells: a refined same-level neighbor may
        // not have grandchildren on the shared face
        for id in self.active_cells() {
            for face in 0..rc.n_faces() {
                let Some(link) = self.neighbor_link(id, face)? else {
                    continue;
                };
                let nd = self.cell(link.cell)?;
                if nd.children.is_empty() {
                    continue;
                }
                for sub in 0..rc.n_subfaces() {
                    let their_child =
                        rc.child_at_subface(link.face, link.orientation.apply(sub));
                    let child = nd.children[their_child];
                    if !self.cell(child)?.children.is_empty() {
                        return Err(MeshForestError::BalanceViolation {
                            cell: id,
                            neighbor: child,
                        });
                    }
                }
            }
        }
        Ok(())
    }
}
