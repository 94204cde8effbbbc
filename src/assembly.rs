//! Worker/copier cell assembly.
//!
//! Per-cell local systems are embarrassingly parallel: workers only read
//! the forest and the DoF map. All mutation funnels through a single
//! copier, a mutex around the global matrix sink and right-hand side, which
//! performs the constraint-resolved local-to-global scatter. Triplet sinks
//! accumulate duplicates, so copy order does not affect the result beyond
//! floating-point summation order.

use crate::constraints::AffineConstraints;
use crate::dof::DofIndex;
use crate::dof::handler::DofMap;
use crate::linalg::{SparsityPattern, TripletSink};
use crate::mesh_error::MeshForestError;
use crate::topology::cell::CellId;
use crate::topology::forest::Forest;
use num_traits::Float;
use parking_lot::Mutex;
use rayon::prelude::*;

/// Symbolic coupling structure: one block of nonzeros per active cell.
///
/// Feed the result through
/// [`AffineConstraints::condense_pattern`](crate::constraints::AffineConstraints::condense_pattern)
/// before building a matrix against a constrained system.
///
/// # Errors
/// `StaleDofMap` if `dofs` does not match the forest state.
pub fn make_sparsity_pattern(
    forest: &Forest,
    dofs: &DofMap,
) -> Result<SparsityPattern, MeshForestError> {
    let n = dofs.n_dofs();
    let mut pattern = SparsityPattern::new(n, n);
    for cell in dofs.cells().collect::<Vec<_>>() {
        let cell_dofs = dofs.cell_dofs(forest, cell)?;
        for &i in cell_dofs {
            for &j in cell_dofs {
                pattern.add(i, j);
            }
        }
    }
    Ok(pattern)
}

/// Assemble every active cell's local system into `matrix` and `rhs`.
///
/// `kernel` returns the row-major local matrix and local right-hand side
/// for one cell; it runs on the rayon pool and must only read shared state.
/// Constraints are resolved during the scatter, so constrained rows and
/// columns land on their source DoFs.
///
/// # Errors
/// `ConstraintsNotClosed`, `StaleDofMap`, `BufferLengthMismatch` if `rhs`
/// or a kernel result has the wrong size.
pub fn assemble_cells<V, S, K>(
    forest: &Forest,
    dofs: &DofMap,
    constraints: &AffineConstraints<V>,
    kernel: K,
    matrix: &mut S,
    rhs: &mut [V],
) -> Result<(), MeshForestError>
where
    V: Float + Send + Sync,
    S: TripletSink<V> + Send,
    K: Fn(&Forest, CellId, &[DofIndex]) -> (Vec<V>, Vec<V>) + Send + Sync,
{
    if rhs.len() != dofs.n_dofs() {
        return Err(MeshForestError::BufferLengthMismatch {
            expected: dofs.n_dofs(),
            found: rhs.len(),
        });
    }
    let cells: Vec<CellId> = dofs.cells().collect();
    let cell_dofs: Vec<&[DofIndex]> = cells
        .iter()
        .map(|&cell| dofs.cell_dofs(forest, cell))
        .collect::<Result<_, _>>()?;

    let copier = Mutex::new((matrix, rhs));
    cells
        .par_iter()
        .zip(cell_dofs.par_iter())
        .try_for_each(|(&cell, &local_dofs)| {
            let (local_matrix, local_rhs) = kernel(forest, cell, local_dofs);
            let mut guard = copier.lock();
            let (matrix, rhs) = &mut *guard;
            constraints.distribute_local_to_global(
                &local_matrix,
                &local_rhs,
                local_dofs,
                *matrix,
                rhs,
            )
        })
}
