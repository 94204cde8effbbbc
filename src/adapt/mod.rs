//! Mesh adaptation: flag preparation, isotropic refinement and family
//! coarsening with 2:1 face balance.
//!
//! The entry point is [`execute_coarsening_and_refinement`]: it first runs
//! [`fix_coarsening_and_refinement_flags`] to turn the user's per-cell flags
//! into a consistent set, then splits every `Refine`-flagged cell into
//! `2^d` children and merges every complete `Coarsen`-flagged family back
//! into its parent. All flags are cleared afterwards and the forest
//! generation is bumped iff the structure changed.
//!
//! Flag preparation is a fixpoint iteration over three rules:
//! - a `Refine`-flagged cell drags a coarser active face neighbor along
//!   (otherwise its children would violate the 2:1 balance) and cancels a
//!   `Coarsen` flag on a same-level face neighbor;
//! - a `Coarsen` flag is vetoed when a same-level face neighbor is already
//!   finer or is itself flagged `Refine`;
//! - `Coarsen` flags survive only in complete sibling families.
//!
//! `Refine` flags only ever get added and `Coarsen` flags only ever get
//! removed, so the iteration terminates.

use crate::debug_invariants::DebugInvariants;
use crate::mesh_error::MeshForestError;
use crate::topology::cell::{CellData, CellId, RefineFlag};
use crate::topology::forest::Forest;
use hashbrown::HashMap;
use log::debug;

/// What [`execute_coarsening_and_refinement`] did.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct AdaptationSummary {
    /// Number of cells that were split.
    pub n_refined: usize,
    /// Number of sibling families merged back into their parent.
    pub n_coarsened: usize,
    /// Forest generation after the operation.
    pub generation: u64,
}

/// Rewrite the adaptation flags into a consistent set (see module docs).
///
/// Returns `true` if any flag was changed. Idempotent.
pub fn fix_coarsening_and_refinement_flags(
    forest: &mut Forest,
) -> Result<bool, MeshForestError> {
    let rc = forest.reference();
    let ids: Vec<CellId> = forest.active_cells().collect();
    let mut any_change = false;
    loop {
        let mut changed = false;

        for &id in &ids {
            if forest.refine_flag(id)? != RefineFlag::Refine {
                continue;
            }
            for face in 0..rc.n_faces() {
                let Some(link) = forest.neighbor_link(id, face)? else {
                    continue;
                };
                if link.cell.level < id.level {
                    if forest.refine_flag(link.cell)? != RefineFlag::Refine {
                        forest.set_refine_flag(link.cell)?;
                        changed = true;
                    }
                } else if link.cell.level == id.level
                    && forest.is_active(link.cell)?
                    && forest.refine_flag(link.cell)? == RefineFlag::Coarsen
                {
                    forest.clear_flag(link.cell)?;
                    changed = true;
                }
            }
        }

        for &id in &ids {
            if forest.refine_flag(id)? != RefineFlag::Coarsen {
                continue;
            }
            let mut veto = false;
            for face in 0..rc.n_faces() {
                let Some(link) = forest.neighbor_link(id, face)? else {
                    continue;
                };
                if link.cell.level == id.level
                    && (!forest.is_active(link.cell)?
                        || forest.refine_flag(link.cell)? == RefineFlag::Refine)
                {
                    veto = true;
                    break;
                }
            }
            if veto {
                forest.clear_flag(id)?;
                changed = true;
            }
        }

        // Coarsening merges whole families only.
        let mut families: HashMap<CellId, usize> = HashMap::new();
        for &id in &ids {
            if forest.refine_flag(id)? == RefineFlag::Coarsen
                && let Some(parent) = forest.parent(id)?
            {
                *families.entry(parent).or_default() += 1;
            }
        }
        for &id in &ids {
            if forest.refine_flag(id)? != RefineFlag::Coarsen {
                continue;
            }
            let complete = forest
                .parent(id)?
                .is_some_and(|p| families.get(&p) == Some(&rc.n_children()));
            if !complete {
                forest.clear_flag(id)?;
                changed = true;
            }
        }

        if !changed {
            break;
        }
        any_change = true;
    }
    Ok(any_change)
}

/// Apply all pending `Refine`/`Coarsen` flags, restoring 2:1 balance.
///
/// Flags are consolidated first via [`fix_coarsening_and_refinement_flags`],
/// so the executed set may differ from the flags the caller set. All flags
/// are cleared on return.
pub fn execute_coarsening_and_refinement(
    forest: &mut Forest,
) -> Result<AdaptationSummary, MeshForestError> {
    fix_coarsening_and_refinement_flags(forest)?;

    let mut to_refine = Vec::new();
    let mut parents: HashMap<CellId, ()> = HashMap::new();
    for id in forest.active_cells().collect::<Vec<_>>() {
        match forest.refine_flag(id)? {
            RefineFlag::Refine => to_refine.push(id),
            RefineFlag::Coarsen => {
                if let Some(p) = forest.parent(id)? {
                    parents.insert(p, ());
                }
            }
            RefineFlag::None => {}
        }
    }
    // deterministic processing order
    to_refine.sort_unstable();
    let mut to_coarsen: Vec<CellId> = parents.into_keys().collect();
    to_coarsen.sort_unstable();

    for &parent in &to_coarsen {
        merge_family(forest, parent)?;
    }
    for &id in &to_refine {
        split_cell(forest, id)?;
    }

    forest.clear_all_flags();
    let changed = !to_refine.is_empty() || !to_coarsen.is_empty();
    if changed {
        forest.bump_generation();
    }
    debug!(
        "adaptation: refined {} cells, coarsened {} families, generation {}",
        to_refine.len(),
        to_coarsen.len(),
        forest.generation()
    );
    forest.debug_assert_invariants();
    Ok(AdaptationSummary {
        n_refined: to_refine.len(),
        n_coarsened: to_coarsen.len(),
        generation: forest.generation(),
    })
}

/// Uniformly refine every active cell, `times` times.
pub fn refine_global(forest: &mut Forest, times: usize) -> Result<(), MeshForestError> {
    for _ in 0..times {
        let ids: Vec<CellId> = forest.active_cells().collect();
        for id in ids {
            forest.set_refine_flag(id)?;
        }
        execute_coarsening_and_refinement(forest)?;
    }
    Ok(())
}

/// Split one active cell into its `2^d` children.
///
/// Child geometry lives on the `3^d` lattice of the parent: lattice
/// coordinate 0/2 per axis picks a parent corner bit, coordinate 1 the
/// bisection midpoint. Midpoint vertices are deduplicated through the
/// forest-wide registry, so neighbors refined at different times share
/// them.
fn split_cell(forest: &mut Forest, id: CellId) -> Result<(), MeshForestError> {
    let rc = forest.reference();
    let d = forest.dim();
    let parent = forest.cell(id)?.clone();

    let n_nodes = 3usize.pow(d as u32);
    let mut nodes = [0u32; 27];
    for n in 0..n_nodes {
        let coords = [n % 3, (n / 3) % 3, (n / 9) % 3];
        let mut corners = Vec::with_capacity(1 << d);
        for v in 0..rc.n_vertices() {
            let spans = (0..d).all(|a| {
                coords[a] == 1 || ((v >> a) & 1) == coords[a] / 2
            });
            if spans {
                corners.push(parent.vertices[v]);
            }
        }
        nodes[n] = if corners.len() == 1 {
            corners[0]
        } else {
            forest.midpoint_or_create(&corners)
        };
    }

    let mut children = Vec::with_capacity(rc.n_children());
    for c in 0..rc.n_children() {
        let mut vertices = [0u32; 8];
        for (v, slot) in vertices.iter_mut().enumerate().take(rc.n_vertices()) {
            let lat = rc.child_vertex_lattice(c, v);
            *slot = nodes[lat[0] as usize + 3 * lat[1] as usize + 9 * lat[2] as usize];
        }
        let mut boundary_ids = [None; 6];
        for face in 0..rc.n_faces() {
            // only the child faces lying on the parent's face inherit its id
            if (c >> rc.face_axis(face)) & 1 == rc.face_side(face) {
                boundary_ids[face] = parent.boundary_ids[face];
            }
        }
        let child = forest.alloc_cell(
            id.level as usize + 1,
            CellData {
                vertices,
                parent: Some(id),
                children: Vec::new(),
                child_position: c as u8,
                flag: RefineFlag::None,
                material_id: parent.material_id,
                subdomain_id: parent.subdomain_id,
                active_fe_index: parent.active_fe_index,
                boundary_ids,
                coarse_neighbors: [None; 6],
                alive: true,
            },
        );
        children.push(child);
    }
    forest.cell_mut(id)?.children = children;
    Ok(())
}

/// Merge the complete child family of `parent` back into it.
fn merge_family(forest: &mut Forest, parent: CellId) -> Result<(), MeshForestError> {
    let children = forest.cell(parent)?.children.clone();
    forest.cell_mut(parent)?.children.clear();
    for child in children {
        forest.free_cell(child);
    }
    Ok(())
}
