//! Structured coarse-mesh generators.
//!
//! These produce the small lexicographic grids most programs start from;
//! anything irregular comes in through [`Forest::create`] directly.

use crate::mesh_error::MeshForestError;
use crate::topology::forest::Forest;
use itertools::iproduct;

/// The unit line/square/cube as a single coarse cell.
pub fn hyper_cube(dim: usize) -> Result<Forest, MeshForestError> {
    subdivided_hyper_rectangle(dim, [1; 3], [0.0; 3], [1.0; 3], false)
}

/// Axis-aligned box `[lower, upper]` split into
/// `repetitions[0] × … × repetitions[dim-1]` equal cells, lexicographic
/// vertex and cell numbering. Entries beyond `dim` are ignored.
///
/// With `colorize`, boundary faces get the indicator `2*axis + side`
/// instead of the default 0.
///
/// # Panics
/// If any used repetition count is zero.
pub fn subdivided_hyper_rectangle(
    dim: usize,
    repetitions: [usize; 3],
    lower: [f64; 3],
    upper: [f64; 3],
    colorize: bool,
) -> Result<Forest, MeshForestError> {
    if !(1..=3).contains(&dim) {
        return Err(MeshForestError::InvalidDimension(dim));
    }
    let mut reps = [1usize; 3];
    for a in 0..dim {
        assert!(repetitions[a] > 0, "repetition count along axis {a} is zero");
        reps[a] = repetitions[a];
    }

    // axes beyond `dim` have no lattice extent
    let mut n = [1usize; 3];
    for a in 0..dim {
        n[a] = reps[a] + 1;
    }
    let step = |a: usize| (upper[a] - lower[a]) / reps[a] as f64;
    let mut vertices = Vec::with_capacity(n[0] * n[1] * n[2]);
    for (iz, iy, ix) in iproduct!(0..n[2], 0..n[1], 0..n[0]) {
        let coord = |a: usize, i: usize| {
            if a < dim { lower[a] + step(a) * i as f64 } else { 0.0 }
        };
        vertices.push([coord(0, ix), coord(1, iy), coord(2, iz)]);
    }

    let vid = |ix: usize, iy: usize, iz: usize| (ix + n[0] * (iy + n[1] * iz)) as u32;
    let mut cells = Vec::with_capacity(reps[0] * reps[1] * reps[2]);
    for (cz, cy, cx) in iproduct!(0..reps[2], 0..reps[1], 0..reps[0]) {
        let conn: Vec<u32> = (0..1usize << dim)
            .map(|v| vid(cx + (v & 1), cy + ((v >> 1) & 1), cz + ((v >> 2) & 1)))
            .collect();
        cells.push(conn);
    }

    let mut forest = Forest::create(dim, vertices, &cells)?;
    if colorize {
        // on a lexicographic grid the local face index is the geometric side
        for cell in forest.all_cells().collect::<Vec<_>>() {
            for face in 0..2 * dim {
                if forest.boundary_id(cell, face)?.is_some() {
                    forest.set_boundary_id(cell, face, face as u32)?;
                }
            }
        }
    }
    Ok(forest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::cell::CellId;

    #[test]
    fn hyper_cube_counts() {
        let line = hyper_cube(1).unwrap();
        assert_eq!((line.n_vertices(), line.n_active_cells()), (2, 1));
        let square = hyper_cube(2).unwrap();
        assert_eq!((square.n_vertices(), square.n_active_cells()), (4, 1));
        let cube = hyper_cube(3).unwrap();
        assert_eq!((cube.n_vertices(), cube.n_active_cells()), (8, 1));
    }

    #[test]
    fn subdivided_grid_counts_and_geometry() {
        let forest =
            subdivided_hyper_rectangle(2, [3, 2, 1], [0.0; 3], [3.0, 2.0, 0.0], false)
                .unwrap();
        assert_eq!(forest.n_active_cells(), 6);
        assert_eq!(forest.n_vertices(), 12);
        // cells are unit squares
        let p = forest
            .cell_vertex_positions(CellId::new(0, 4))
            .unwrap();
        assert_eq!(p[0], [1.0, 1.0, 0.0]);
        assert_eq!(p[3], [2.0, 2.0, 0.0]);
    }

    #[test]
    fn unused_axes_add_no_vertex_layers() {
        let line =
            subdivided_hyper_rectangle(1, [4, 1, 1], [0.0; 3], [4.0, 0.0, 0.0], false)
                .unwrap();
        assert_eq!(line.n_vertices(), 5);
        assert_eq!(line.n_active_cells(), 4);
        let p = line.cell_vertex_positions(CellId::new(0, 2)).unwrap();
        assert_eq!(p[0], [2.0, 0.0, 0.0]);
        assert_eq!(p[1], [3.0, 0.0, 0.0]);
    }

    #[test]
    fn interior_faces_have_neighbors() {
        let forest =
            subdivided_hyper_rectangle(3, [2, 2, 2], [0.0; 3], [1.0; 3], false).unwrap();
        assert_eq!(forest.n_active_cells(), 8);
        let first = CellId::new(0, 0);
        assert_eq!(forest.neighbor(first, 0).unwrap(), None);
        assert_eq!(
            forest.neighbor(first, 1).unwrap(),
            Some(CellId::new(0, 1))
        );
        assert_eq!(
            forest.neighbor(first, 5).unwrap(),
            Some(CellId::new(0, 4))
        );
    }

    #[test]
    fn colorize_labels_sides() {
        let forest =
            subdivided_hyper_rectangle(2, [2, 1, 1], [0.0; 3], [2.0, 1.0, 0.0], true)
                .unwrap();
        let left = CellId::new(0, 0);
        let right = CellId::new(0, 1);
        assert_eq!(forest.boundary_id(left, 0).unwrap(), Some(0));
        assert_eq!(forest.boundary_id(right, 1).unwrap(), Some(1));
        assert_eq!(forest.boundary_id(left, 2).unwrap(), Some(2));
        assert_eq!(forest.boundary_id(left, 3).unwrap(), Some(3));
        assert_eq!(forest.boundary_id(left, 1).unwrap(), None);
    }

    #[test]
    fn bad_dimension_is_rejected() {
        assert!(matches!(
            subdivided_hyper_rectangle(4, [1; 3], [0.0; 3], [1.0; 3], false),
            Err(MeshForestError::InvalidDimension(4))
        ));
    }
}
