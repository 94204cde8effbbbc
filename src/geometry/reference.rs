//! `ReferenceCell`: local numbering of vertices, faces, edges and children
//! for line (1D), quadrilateral (2D) and hexahedral (3D) cells.
//!
//! The numbering is lexicographic throughout: vertex `v ∈ 0..2^d` has
//! coordinate `(v >> axis) & 1` along each axis, face `f = 2*axis + side`
//! collects the vertices whose bit along `axis` equals `side`, and the
//! `2^d` children of an isotropically refined cell reuse the vertex bit
//! scheme for their position inside the parent. This makes every mapping in
//! this module a few lines of bit arithmetic and keeps subface and
//! face-corner enumerations aligned, which the neighbor-descent code in
//! [`Forest`](crate::topology::forest::Forest) relies on.
//!
//! Out-of-range arguments are programming errors and abort via `assert!`;
//! there is nothing recoverable about asking for face 7 of a quad.

use crate::mesh_error::MeshForestError;

/// Combinatorics of the `d`-dimensional reference cell, `d ∈ {1, 2, 3}`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ReferenceCell {
    dim: usize,
}

impl ReferenceCell {
    /// Reference cell for spatial dimension `dim`.
    ///
    /// # Errors
    /// Returns `Err(InvalidDimension)` unless `dim ∈ {1, 2, 3}`.
    pub fn new(dim: usize) -> Result<Self, MeshForestError> {
        if !(1..=3).contains(&dim) {
            return Err(MeshForestError::InvalidDimension(dim));
        }
        Ok(Self { dim })
    }

    /// Spatial dimension.
    #[inline]
    pub const fn dim(self) -> usize {
        self.dim
    }

    /// Vertices per cell: `2^d`.
    #[inline]
    pub const fn n_vertices(self) -> usize {
        1 << self.dim
    }

    /// Faces per cell: `2d`.
    #[inline]
    pub const fn n_faces(self) -> usize {
        2 * self.dim
    }

    /// Children per isotropically refined cell: `2^d`.
    #[inline]
    pub const fn n_children(self) -> usize {
        1 << self.dim
    }

    /// Vertices per face: `2^(d-1)`.
    #[inline]
    pub const fn n_face_vertices(self) -> usize {
        1 << (self.dim - 1)
    }

    /// Subfaces a refined face decomposes into: `2^(d-1)`.
    #[inline]
    pub const fn n_subfaces(self) -> usize {
        1 << (self.dim - 1)
    }

    /// Edges per cell; only 3D cells have edges distinct from faces (12).
    #[inline]
    pub const fn n_edges(self) -> usize {
        if self.dim == 3 { 12 } else { 0 }
    }

    /// Coordinate bit of local vertex `v` along `axis`.
    #[inline]
    pub fn vertex_bit(self, v: usize, axis: usize) -> usize {
        assert!(v < self.n_vertices(), "vertex index {v} out of range");
        assert!(axis < self.dim, "axis {axis} out of range");
        (v >> axis) & 1
    }

    /// Axis a face is orthogonal to.
    #[inline]
    pub fn face_axis(self, face: usize) -> usize {
        assert!(face < self.n_faces(), "face index {face} out of range");
        face / 2
    }

    /// Side of the axis the face sits on (0 = low, 1 = high).
    #[inline]
    pub fn face_side(self, face: usize) -> usize {
        assert!(face < self.n_faces(), "face index {face} out of range");
        face % 2
    }

    /// The face on the opposite side of the same axis.
    #[inline]
    pub fn opposite_face(self, face: usize) -> usize {
        assert!(face < self.n_faces(), "face index {face} out of range");
        face ^ 1
    }

    /// Local vertex index of face corner `k` of `face`.
    ///
    /// Face corners enumerate the transverse axes in ascending order, so the
    /// corner index `k` carries one bit per axis other than the face axis.
    pub fn face_vertex(self, face: usize, k: usize) -> usize {
        assert!(face < self.n_faces(), "face index {face} out of range");
        assert!(k < self.n_face_vertices(), "face corner {k} out of range");
        let axis = face / 2;
        let side = face % 2;
        let mut v = side << axis;
        let mut bits = k;
        for a in 0..self.dim {
            if a != axis {
                v |= (bits & 1) << a;
                bits >>= 1;
            }
        }
        v
    }

    /// Whether local vertex `v` lies on `face`.
    #[inline]
    pub fn face_contains_vertex(self, face: usize, v: usize) -> bool {
        self.vertex_bit(v, self.face_axis(face)) == self.face_side(face)
    }

    /// Child-cell index adjacent to subface `subface` of `face`.
    ///
    /// Subfaces and face corners share one enumeration (the transverse-bit
    /// scheme), so this is the same mapping as [`face_vertex`](Self::face_vertex).
    #[inline]
    pub fn child_at_subface(self, face: usize, subface: usize) -> usize {
        assert!(subface < self.n_subfaces(), "subface {subface} out of range");
        self.face_vertex(face, subface)
    }

    /// Subface of `face` a child at position `child` touches, or `None` if
    /// the child does not border that face of the parent.
    pub fn subface_of_child(self, face: usize, child: usize) -> Option<usize> {
        assert!(face < self.n_faces(), "face index {face} out of range");
        assert!(child < self.n_children(), "child index {child} out of range");
        let axis = face / 2;
        let side = face % 2;
        if (child >> axis) & 1 != side {
            return None;
        }
        let mut s = 0;
        let mut shift = 0;
        for a in 0..self.dim {
            if a != axis {
                s |= ((child >> a) & 1) << shift;
                shift += 1;
            }
        }
        Some(s)
    }

    /// Local endpoint vertices of edge `e` (3D only).
    ///
    /// Edges are grouped by direction axis (4 per axis); within a group the
    /// transverse bits of the two remaining axes enumerate in ascending axis
    /// order.
    pub fn edge_vertices(self, e: usize) -> (usize, usize) {
        assert!(self.dim == 3, "edges are only enumerated for 3D cells");
        assert!(e < self.n_edges(), "edge index {e} out of range");
        let axis = e / 4;
        let mut bits = e % 4;
        let mut v0 = 0;
        for a in 0..3 {
            if a != axis {
                v0 |= (bits & 1) << a;
                bits >>= 1;
            }
        }
        (v0, v0 | (1 << axis))
    }

    /// Lattice coordinates (each in `{0, 1, 2}`, on the parent's half-step
    /// grid) of local vertex `vertex` of child `child`.
    pub fn child_vertex_lattice(self, child: usize, vertex: usize) -> [u8; 3] {
        assert!(child < self.n_children(), "child index {child} out of range");
        assert!(vertex < self.n_vertices(), "vertex index {vertex} out of range");
        let mut l = [0u8; 3];
        for (a, slot) in l.iter_mut().enumerate().take(self.dim) {
            *slot = (((child >> a) & 1) + ((vertex >> a) & 1)) as u8;
        }
        l
    }
}
