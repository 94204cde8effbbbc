//! Finite-element capability descriptions.
//!
//! The mesh does not evaluate basis functions over cells; it only needs to
//! know how many DoFs an element attaches to each entity class, whether the
//! element is continuous across faces, and the 1D Lagrange node values from
//! which hanging-node interpolation weights are built. [`ElementLayout`]
//! captures exactly that. Quadrature and shape-value tables are external
//! collaborators.

use crate::mesh_error::MeshForestError;

/// Inter-cell continuity class of an element.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Continuity {
    /// Continuous across faces; shared entities carry shared DoFs.
    C0,
    /// Discontinuous; all DoFs live on the cell interior.
    Discontinuous,
}

/// Per-entity DoF counts of a tensor-product element on quads/hexes.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ElementLayout {
    /// Spatial dimension the layout was built for.
    pub dim: usize,
    /// Polynomial degree per coordinate direction.
    pub degree: usize,
    /// Number of vector components (1 = scalar).
    pub components: usize,
    /// DoFs per vertex.
    pub dofs_per_vertex: usize,
    /// DoFs per line interior (edge in 3D, face in 2D, cell in 1D).
    pub dofs_per_line: usize,
    /// DoFs per quad interior (face in 3D, cell in 2D).
    pub dofs_per_quad: usize,
    /// DoFs per hex interior (cell in 3D).
    pub dofs_per_hex: usize,
    /// Continuity class.
    pub continuity: Continuity,
}

impl ElementLayout {
    /// Continuous Lagrange element `Q_degree` on equidistant nodes.
    ///
    /// # Errors
    /// `InvalidDimension` outside `{1, 2, 3}`; `InvalidElement` for degree 0
    /// (a continuous element needs vertex nodes).
    pub fn lagrange(dim: usize, degree: usize) -> Result<Self, MeshForestError> {
        if !(1..=3).contains(&dim) {
            return Err(MeshForestError::InvalidDimension(dim));
        }
        if degree == 0 {
            return Err(MeshForestError::InvalidElement(
                "continuous Lagrange elements require degree >= 1",
            ));
        }
        let i = degree - 1;
        Ok(Self {
            dim,
            degree,
            components: 1,
            dofs_per_vertex: 1,
            dofs_per_line: i,
            dofs_per_quad: i * i,
            dofs_per_hex: i * i * i,
            continuity: Continuity::C0,
        })
    }

    /// Discontinuous element `DG_degree`; every DoF sits on the cell
    /// interior, so no entity sharing and no hanging-node coupling.
    pub fn discontinuous(dim: usize, degree: usize) -> Result<Self, MeshForestError> {
        if !(1..=3).contains(&dim) {
            return Err(MeshForestError::InvalidDimension(dim));
        }
        let per_cell = (degree + 1).pow(dim as u32);
        let mut layout = Self {
            dim,
            degree,
            components: 1,
            dofs_per_vertex: 0,
            dofs_per_line: 0,
            dofs_per_quad: 0,
            dofs_per_hex: 0,
            continuity: Continuity::Discontinuous,
        };
        match dim {
            1 => layout.dofs_per_line = per_cell,
            2 => layout.dofs_per_quad = per_cell,
            _ => layout.dofs_per_hex = per_cell,
        }
        Ok(layout)
    }

    /// Vector-valued composition: `components` identical copies of this
    /// layout, interleaved per node.
    pub fn with_components(self, components: usize) -> Result<Self, MeshForestError> {
        if components == 0 {
            return Err(MeshForestError::InvalidElement(
                "an element needs at least one component",
            ));
        }
        Ok(Self {
            components: self.components * components,
            dofs_per_vertex: self.dofs_per_vertex * components,
            dofs_per_line: self.dofs_per_line * components,
            dofs_per_quad: self.dofs_per_quad * components,
            dofs_per_hex: self.dofs_per_hex * components,
            ..self
        })
    }

    /// DoFs on the interior of one cell of this layout's dimension.
    pub fn dofs_per_cell_interior(&self) -> usize {
        match self.dim {
            1 => self.dofs_per_line,
            2 => self.dofs_per_quad,
            _ => self.dofs_per_hex,
        }
    }

    /// Total DoFs on one cell, all entity classes included.
    pub fn dofs_per_cell(&self) -> usize {
        let (n_v, n_l, n_q) = match self.dim {
            1 => (2, 1, 0),
            2 => (4, 4, 1),
            _ => (8, 12, 6),
        };
        let interior = match self.dim {
            1 | 2 => 0,
            _ => self.dofs_per_hex,
        };
        // in 1D/2D the "interior" slot is already one of n_l/n_q
        n_v * self.dofs_per_vertex
            + n_l * self.dofs_per_line
            + n_q * self.dofs_per_quad
            + interior
    }

    /// Nodes per coordinate direction (`degree + 1` per component copy).
    pub fn nodes_per_direction(&self) -> usize {
        self.degree + 1
    }

    /// Interpolation matrix of one refined subface against the coarse face:
    /// `fine[i] = Σ_j M[i][j] · coarse[j]`.
    ///
    /// Nodes on both sides are enumerated lexicographically per face axis,
    /// `(degree + 1)^(dim-1)` of them. Subface `s` covers the half of the
    /// face selected by bit `a` of `s` along face axis `a`, so fine node
    /// coordinate `t` maps to coarse coordinate `(bit + t) / 2`.
    ///
    /// # Errors
    /// `SubfaceIndexOutOfRange`; `InvalidDimension` for 1D (faces are
    /// points there and carry no interpolation).
    pub fn face_interpolation_matrix(
        &self,
        subface: usize,
    ) -> Result<Vec<Vec<f64>>, MeshForestError> {
        if self.dim < 2 {
            return Err(MeshForestError::InvalidDimension(self.dim));
        }
        let fd = self.dim - 1;
        let n_subfaces = 1 << fd;
        if subface >= n_subfaces {
            return Err(MeshForestError::SubfaceIndexOutOfRange {
                subface,
                n_subfaces,
            });
        }
        let p = self.degree;
        let n = p + 1;
        let n_nodes = n.pow(fd as u32);
        let mut matrix = vec![vec![0.0; n_nodes]; n_nodes];
        for (i, row) in matrix.iter_mut().enumerate() {
            for (j, entry) in row.iter_mut().enumerate() {
                let mut w = 1.0;
                for a in 0..fd {
                    let fine_node = (i / n.pow(a as u32)) % n;
                    let coarse_node = (j / n.pow(a as u32)) % n;
                    let bit = ((subface >> a) & 1) as f64;
                    let t = if p == 0 {
                        0.5
                    } else {
                        fine_node as f64 / p as f64
                    };
                    w *= lagrange_basis_1d(p, coarse_node, (bit + t) / 2.0);
                }
                *entry = w;
            }
        }
        Ok(matrix)
    }
}

/// Value of the `node`-th 1D Lagrange basis function of degree `degree`
/// (equidistant nodes `j / degree` on `[0, 1]`) at `x`.
///
/// Degree 0 is the constant function 1.
pub fn lagrange_basis_1d(degree: usize, node: usize, x: f64) -> f64 {
    debug_assert!(node <= degree);
    if degree == 0 {
        return 1.0;
    }
    let p = degree as f64;
    let xi = node as f64 / p;
    let mut value = 1.0;
    for j in 0..=degree {
        if j == node {
            continue;
        }
        let xj = j as f64 / p;
        value *= (x - xj) / (xi - xj);
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn q1_counts() {
        let q1 = ElementLayout::lagrange(2, 1).unwrap();
        assert_eq!(q1.dofs_per_vertex, 1);
        assert_eq!(q1.dofs_per_line, 0);
        assert_eq!(q1.dofs_per_quad, 0);
        assert_eq!(q1.dofs_per_cell(), 4);
        let q1_3d = ElementLayout::lagrange(3, 1).unwrap();
        assert_eq!(q1_3d.dofs_per_cell(), 8);
    }

    #[test]
    fn q2_and_q3_counts() {
        let q2 = ElementLayout::lagrange(2, 2).unwrap();
        assert_eq!(q2.dofs_per_line, 1);
        assert_eq!(q2.dofs_per_quad, 1);
        assert_eq!(q2.dofs_per_cell(), 9);
        let q3_3d = ElementLayout::lagrange(3, 3).unwrap();
        assert_eq!(q3_3d.dofs_per_line, 2);
        assert_eq!(q3_3d.dofs_per_quad, 4);
        assert_eq!(q3_3d.dofs_per_hex, 8);
        assert_eq!(q3_3d.dofs_per_cell(), 8 + 12 * 2 + 6 * 4 + 8);
    }

    #[test]
    fn dg_is_interior_only() {
        let dg1 = ElementLayout::discontinuous(2, 1).unwrap();
        assert_eq!(dg1.dofs_per_vertex, 0);
        assert_eq!(dg1.dofs_per_line, 0);
        assert_eq!(dg1.dofs_per_quad, 4);
        assert_eq!(dg1.dofs_per_cell(), 4);
        let dg0 = ElementLayout::discontinuous(3, 0).unwrap();
        assert_eq!(dg0.dofs_per_cell(), 1);
    }

    #[test]
    fn vector_composition_multiplies_counts() {
        let sys = ElementLayout::lagrange(2, 2)
            .unwrap()
            .with_components(3)
            .unwrap();
        assert_eq!(sys.components, 3);
        assert_eq!(sys.dofs_per_vertex, 3);
        assert_eq!(sys.dofs_per_line, 3);
        assert_eq!(sys.dofs_per_cell(), 27);
    }

    #[test]
    fn degree_zero_lagrange_is_rejected() {
        assert!(matches!(
            ElementLayout::lagrange(2, 0),
            Err(MeshForestError::InvalidElement(_))
        ));
        assert!(matches!(
            ElementLayout::lagrange(4, 1),
            Err(MeshForestError::InvalidDimension(4))
        ));
    }

    #[test]
    fn basis_is_nodal_and_partitions_unity() {
        for degree in 1..=3 {
            for node in 0..=degree {
                for other in 0..=degree {
                    let x = other as f64 / degree as f64;
                    let v = lagrange_basis_1d(degree, node, x);
                    let expect = if node == other { 1.0 } else { 0.0 };
                    assert!((v - expect).abs() < 1e-12);
                }
            }
            for &x in &[0.1, 0.25, 0.5, 0.9] {
                let sum: f64 = (0..=degree)
                    .map(|n| lagrange_basis_1d(degree, n, x))
                    .sum();
                assert!((sum - 1.0).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn face_interpolation_q1_edge() {
        let q1 = ElementLayout::lagrange(2, 1).unwrap();
        let m0 = q1.face_interpolation_matrix(0).unwrap();
        assert_eq!(m0, vec![vec![1.0, 0.0], vec![0.5, 0.5]]);
        let m1 = q1.face_interpolation_matrix(1).unwrap();
        assert_eq!(m1, vec![vec![0.5, 0.5], vec![0.0, 1.0]]);
        assert!(matches!(
            q1.face_interpolation_matrix(2),
            Err(MeshForestError::SubfaceIndexOutOfRange { .. })
        ));
    }

    #[test]
    fn face_interpolation_rows_partition_unity() {
        let q2 = ElementLayout::lagrange(3, 2).unwrap();
        for subface in 0..4 {
            let m = q2.face_interpolation_matrix(subface).unwrap();
            assert_eq!(m.len(), 9);
            for row in &m {
                let sum: f64 = row.iter().sum();
                assert!((sum - 1.0).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn midpoint_weights_for_linear_basis() {
        // the value at an edge midpoint is the mean of the endpoint values
        assert!((lagrange_basis_1d(1, 0, 0.5) - 0.5).abs() < 1e-15);
        assert!((lagrange_basis_1d(1, 1, 0.5) - 0.5).abs() < 1e-15);
    }
}
