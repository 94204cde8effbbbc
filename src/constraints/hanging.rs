//! Hanging-node constraints for continuous Lagrange layouts.
//!
//! On a face where an active cell borders a refined neighbor, the fine
//! side's face DoFs are not free: continuity requires each of them to equal
//! the coarse face's Lagrange interpolant at its node position. This module
//! walks the coarse side of every such face and emits one constraint line
//! per fine face DoF not already present on the coarse side, with weights
//! from the tensor-product 1D basis.
//!
//! The builder is orientation-free: fine face entities are identified by
//! their global vertex ids (corner vids plus midpoint vids looked up in the
//! forest's refinement-vertex registry), so the neighbor's face frame never
//! enters the weight computation.

use crate::constraints::AffineConstraints;
use crate::dof::handler::DofMap;
use crate::dof::{DofIndex, EntityKey};
use crate::element::{Continuity, ElementLayout, lagrange_basis_1d};
use crate::mesh_error::MeshForestError;
use crate::topology::forest::Forest;
use hashbrown::HashSet;
use log::debug;
use num_traits::Float;

/// A DoF-carrying node on a (coarse or fine) face, with its position in the
/// coarse face's unit coordinate frame. `dofs` holds one index per
/// component.
struct FaceNode {
    dofs: Vec<DofIndex>,
    pos: [f64; 2],
}

fn missing(spanning: &[u32]) -> MeshForestError {
    let key = match spanning {
        &[a, b] => EntityKey::line(a, b),
        &[a, b, c, d] => EntityKey::quad([a, b, c, d]),
        _ => EntityKey::Vertex(spanning.first().copied().unwrap_or(0)),
    };
    MeshForestError::MissingRefinementVertex(key)
}

/// Component-grouped DoFs of edge-interior node `t ∈ 1..p`, honoring the
/// canonical smaller-vid-first block direction.
fn line_node_dofs(
    block: &[DofIndex],
    va: u32,
    vb: u32,
    t: usize,
    degree: usize,
    components: usize,
) -> Vec<DofIndex> {
    let node = if va <= vb { t - 1 } else { degree - 1 - t };
    block[node * components..(node + 1) * components].to_vec()
}

/// Face-frame edges of a quad face: corner-index pairs with the lattice
/// position of the edge midpoint (degree-2 layout).
const QUAD_FACE_EDGES: [([usize; 2], [f64; 2]); 4] = [
    ([0, 1], [0.5, 0.0]),
    ([2, 3], [0.5, 1.0]),
    ([0, 2], [0.0, 0.5]),
    ([1, 3], [1.0, 0.5]),
];

/// Constrain fine-side face DoFs against the coarse Lagrange interpolation
/// on every hanging face. Discontinuous layouts have no inter-cell
/// continuity and produce nothing.
///
/// # Errors
/// `DimensionMismatch`, `StaleDofMap`; `UnsupportedElement` for 3D layouts
/// with more than one interior DoF per face (degree > 2);
/// `MissingRefinementVertex` if the topology and the DoF map disagree.
pub fn make_hanging_node_constraints<V: Float>(
    forest: &Forest,
    dofs: &DofMap,
    layout: &ElementLayout,
    constraints: &mut AffineConstraints<V>,
) -> Result<(), MeshForestError> {
    if layout.dim != forest.dim() {
        return Err(MeshForestError::DimensionMismatch {
            element: layout.dim,
            forest: forest.dim(),
        });
    }
    if layout.continuity == Continuity::Discontinuous {
        return Ok(());
    }
    let dim = forest.dim();
    // 1D faces are vertices, always shared; nothing hangs
    if dim == 1 {
        return Ok(());
    }
    if dim == 3 && layout.dofs_per_quad > layout.components {
        return Err(MeshForestError::UnsupportedElement(
            "3D hanging-node closure is limited to at most one interior DoF per face",
        ));
    }
    let rc = forest.reference();
    let fd = dim - 1;
    let degree = layout.degree;
    let m = layout.components;
    let mut n_faces_done = 0usize;

    for cell in forest.active_cells().collect::<Vec<_>>() {
        for face in 0..rc.n_faces() {
            let Some(link) = forest.neighbor_link(cell, face)? else {
                continue;
            };
            // the coarse side of a hanging face sees a same-level neighbor
            // that is refined
            if link.cell.level != cell.level || forest.is_active(link.cell)? {
                continue;
            }
            let vids = forest.cell_vertices(cell)?.to_vec();
            let cv: Vec<u32> = (0..rc.n_face_vertices())
                .map(|k| vids[rc.face_vertex(face, k)])
                .collect();

            let coarse = coarse_face_nodes(forest, dofs, layout, &cv)?;
            let coarse_set: HashSet<DofIndex> =
                coarse.iter().flat_map(|n| n.dofs.iter().copied()).collect();

            for subface in 0..rc.n_subfaces() {
                let fine = fine_subface_nodes(forest, dofs, layout, &cv, subface)?;
                for node in &fine {
                    for c in 0..m {
                        let dof = node.dofs[c];
                        if coarse_set.contains(&dof) || constraints.is_constrained(dof) {
                            continue;
                        }
                        constraints.add_line(dof)?;
                        for cnode in &coarse {
                            let mut w = 1.0;
                            for a in 0..fd {
                                w *= lagrange_basis_1d(
                                    degree,
                                    (cnode.pos[a] * degree as f64).round() as usize,
                                    node.pos[a],
                                );
                            }
                            if w.abs() > 1e-14 {
                                let weight = V::from(w).ok_or(
                                    MeshForestError::UnsupportedElement(
                                        "constraint weight is not representable in the scalar type",
                                    ),
                                )?;
                                constraints.add_entry(dof, cnode.dofs[c], weight)?;
                            }
                        }
                    }
                }
            }
            n_faces_done += 1;
        }
    }
    debug!(
        "hanging-node pass: {} coarse faces, {} constraints",
        n_faces_done,
        constraints.n_constraints()
    );
    Ok(())
}

/// Nodes of the coarse face, positions in the unit face frame.
fn coarse_face_nodes(
    forest: &Forest,
    dofs: &DofMap,
    layout: &ElementLayout,
    cv: &[u32],
) -> Result<Vec<FaceNode>, MeshForestError> {
    let fd = layout.dim - 1;
    let p = layout.degree;
    let m = layout.components;
    let mut nodes = Vec::new();

    for (k, &vid) in cv.iter().enumerate() {
        nodes.push(FaceNode {
            dofs: dofs.entity_dofs(forest, &EntityKey::Vertex(vid))?,
            pos: [(k & 1) as f64, ((k >> 1) & 1) as f64],
        });
    }
    if p >= 2 {
        if fd == 1 {
            let block = dofs.entity_dofs(forest, &EntityKey::line(cv[0], cv[1]))?;
            for t in 1..p {
                nodes.push(FaceNode {
                    dofs: line_node_dofs(&block, cv[0], cv[1], t, p, m),
                    pos: [t as f64 / p as f64, 0.0],
                });
            }
        } else {
            for ([i, j], pos) in QUAD_FACE_EDGES {
                nodes.push(FaceNode {
                    dofs: dofs.entity_dofs(forest, &EntityKey::line(cv[i], cv[j]))?,
                    pos,
                });
            }
            nodes.push(FaceNode {
                dofs: dofs.entity_dofs(
                    forest,
                    &EntityKey::quad([cv[0], cv[1], cv[2], cv[3]]),
                )?,
                pos: [0.5, 0.5],
            });
        }
    }
    Ok(nodes)
}

/// Nodes of one fine subface, positions mapped into the coarse face frame.
fn fine_subface_nodes(
    forest: &Forest,
    dofs: &DofMap,
    layout: &ElementLayout,
    cv: &[u32],
    subface: usize,
) -> Result<Vec<FaceNode>, MeshForestError> {
    let fd = layout.dim - 1;
    let p = layout.degree;
    let m = layout.components;

    // fine corner vids on the half-step lattice of the coarse face
    let mut fc = vec![0u32; 1 << fd];
    for (k, slot) in fc.iter_mut().enumerate() {
        let mut spanning = Vec::new();
        for (j, &vid) in cv.iter().enumerate() {
            let spans = (0..fd).all(|a| {
                let h = ((subface >> a) & 1) + ((k >> a) & 1);
                h == 1 || ((j >> a) & 1) == h / 2
            });
            if spans {
                spanning.push(vid);
            }
        }
        *slot = if spanning.len() == 1 {
            spanning[0]
        } else {
            forest
                .refinement_vertex(&spanning)
                .ok_or_else(|| missing(&spanning))?
        };
    }

    let half = |bit: usize, local: f64| ((bit & 1) as f64 + local) / 2.0;
    let mut nodes = Vec::new();
    for (k, &vid) in fc.iter().enumerate() {
        nodes.push(FaceNode {
            dofs: dofs.entity_dofs(forest, &EntityKey::Vertex(vid))?,
            pos: [
                half(subface, (k & 1) as f64),
                half(subface >> 1, ((k >> 1) & 1) as f64),
            ],
        });
    }
    if p >= 2 {
        if fd == 1 {
            let block = dofs.entity_dofs(forest, &EntityKey::line(fc[0], fc[1]))?;
            for t in 1..p {
                nodes.push(FaceNode {
                    dofs: line_node_dofs(&block, fc[0], fc[1], t, p, m),
                    pos: [half(subface, t as f64 / p as f64), 0.0],
                });
            }
        } else {
            for ([i, j], pos) in QUAD_FACE_EDGES {
                nodes.push(FaceNode {
                    dofs: dofs.entity_dofs(forest, &EntityKey::line(fc[i], fc[j]))?,
                    pos: [half(subface, pos[0]), half(subface >> 1, pos[1])],
                });
            }
            nodes.push(FaceNode {
                dofs: dofs.entity_dofs(
                    forest,
                    &EntityKey::quad([fc[0], fc[1], fc[2], fc[3]]),
                )?,
                pos: [half(subface, 0.5), half(subface >> 1, 0.5)],
            });
        }
    }
    Ok(nodes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapt::execute_coarsening_and_refinement;
    use crate::dof::handler::distribute_dofs;
    use crate::topology::cell::CellId;

    fn refined_two_cell_square() -> Forest {
        let vertices = vec![
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [2.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
            [1.0, 1.0, 0.0],
            [2.0, 1.0, 0.0],
        ];
        let mut forest =
            Forest::create(2, vertices, &[vec![0, 1, 3, 4], vec![1, 2, 4, 5]]).unwrap();
        forest.set_refine_flag(CellId::new(0, 0)).unwrap();
        execute_coarsening_and_refinement(&mut forest).unwrap();
        forest
    }

    #[test]
    fn q1_scalar_constrains_the_edge_midpoint() {
        let forest = refined_two_cell_square();
        let layout = ElementLayout::lagrange(2, 1).unwrap();
        let dofs = distribute_dofs(&forest, &layout).unwrap();
        let mut constraints = AffineConstraints::<f64>::new();
        make_hanging_node_constraints(&forest, &dofs, &layout, &mut constraints)
            .unwrap();
        constraints.close().unwrap();
        assert_eq!(constraints.n_constraints(), 1);
        let (_, line) = constraints.lines().next().unwrap();
        let mut weights: Vec<f64> = line.entries.iter().map(|&(_, w)| w).collect();
        weights.sort_by(f64::total_cmp);
        assert_eq!(weights, vec![0.5, 0.5]);
    }

    #[test]
    fn two_components_give_two_constraints() {
        let forest = refined_two_cell_square();
        let layout = ElementLayout::lagrange(2, 1)
            .unwrap()
            .with_components(2)
            .unwrap();
        let dofs = distribute_dofs(&forest, &layout).unwrap();
        let mut constraints = AffineConstraints::<f64>::new();
        make_hanging_node_constraints(&forest, &dofs, &layout, &mut constraints)
            .unwrap();
        assert_eq!(constraints.n_constraints(), 2);
    }

    #[test]
    fn discontinuous_layouts_produce_nothing() {
        let forest = refined_two_cell_square();
        let layout = ElementLayout::discontinuous(2, 1).unwrap();
        let dofs = distribute_dofs(&forest, &layout).unwrap();
        let mut constraints = AffineConstraints::<f64>::new();
        make_hanging_node_constraints(&forest, &dofs, &layout, &mut constraints)
            .unwrap();
        assert_eq!(constraints.n_constraints(), 0);
    }

    #[test]
    fn q2_constrains_vertex_and_edge_nodes() {
        let forest = refined_two_cell_square();
        let layout = ElementLayout::lagrange(2, 2).unwrap();
        let dofs = distribute_dofs(&forest, &layout).unwrap();
        let mut constraints = AffineConstraints::<f64>::new();
        make_hanging_node_constraints(&forest, &dofs, &layout, &mut constraints)
            .unwrap();
        constraints.close().unwrap();
        // hanging on the shared edge: midpoint vertex + two fine edge nodes
        assert_eq!(constraints.n_constraints(), 3);
        // every constrained value is a combination of the 3 coarse edge dofs
        for (_, line) in constraints.lines() {
            assert!(line.entries.len() <= 3);
            let sum: f64 = line.entries.iter().map(|&(_, w)| w).sum();
            assert!((sum - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn unsupported_3d_element_is_reported() {
        let vertices = vec![
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
            [1.0, 1.0, 0.0],
            [0.0, 0.0, 1.0],
            [1.0, 0.0, 1.0],
            [0.0, 1.0, 1.0],
            [1.0, 1.0, 1.0],
        ];
        let forest =
            Forest::create(3, vertices, &[vec![0, 1, 2, 3, 4, 5, 6, 7]]).unwrap();
        let layout = ElementLayout::lagrange(3, 3).unwrap();
        let dofs = distribute_dofs(&forest, &layout).unwrap();
        let mut constraints = AffineConstraints::<f64>::new();
        assert!(matches!(
            make_hanging_node_constraints(&forest, &dofs, &layout, &mut constraints),
            Err(MeshForestError::UnsupportedElement(_))
        ));
    }
}
