//! DoF-partition properties: dense coverage, shared-entity agreement,
//! determinism, renumbering.

use mesh_forest::prelude::*;

fn covered_indices(forest: &Forest, dofs: &DofMap) -> Vec<usize> {
    let mut all = Vec::new();
    for cell in forest.active_cells() {
        all.extend_from_slice(dofs.cell_dofs(forest, cell).unwrap());
    }
    all.sort_unstable();
    all.dedup();
    all
}

#[test]
fn union_of_cell_dofs_is_dense() {
    for degree in 1..=3 {
        let forest =
            subdivided_hyper_rectangle(2, [3, 2, 1], [0.0; 3], [3.0, 2.0, 0.0], false)
                .unwrap();
        let layout = ElementLayout::lagrange(2, degree).unwrap();
        let dofs = distribute_dofs(&forest, &layout).unwrap();
        assert_eq!(
            covered_indices(&forest, &dofs),
            (0..dofs.n_dofs()).collect::<Vec<_>>()
        );
    }
}

#[test]
fn partition_holds_on_adapted_mesh() {
    let mut forest =
        subdivided_hyper_rectangle(2, [2, 1, 1], [0.0; 3], [2.0, 1.0, 0.0], false)
            .unwrap();
    forest.set_refine_flag(CellId::new(0, 0)).unwrap();
    execute_coarsening_and_refinement(&mut forest).unwrap();

    let layout = ElementLayout::lagrange(2, 1).unwrap();
    let dofs = distribute_dofs(&forest, &layout).unwrap();
    // 6 coarse vertices + 5 refinement vertices, one dof each
    assert_eq!(dofs.n_dofs(), 11);
    assert_eq!(
        covered_indices(&forest, &dofs),
        (0..11).collect::<Vec<_>>()
    );
}

#[test]
fn no_cell_lists_a_dof_twice() {
    let forest =
        subdivided_hyper_rectangle(3, [2, 2, 1], [0.0; 3], [2.0, 2.0, 1.0], false)
            .unwrap();
    let layout = ElementLayout::lagrange(3, 2).unwrap();
    let dofs = distribute_dofs(&forest, &layout).unwrap();
    for cell in forest.active_cells() {
        let mut local = dofs.cell_dofs(&forest, cell).unwrap().to_vec();
        let n = local.len();
        local.sort_unstable();
        local.dedup();
        assert_eq!(local.len(), n);
    }
}

#[test]
fn shared_entities_carry_identical_index_sets() {
    let forest =
        subdivided_hyper_rectangle(2, [2, 2, 1], [0.0; 3], [2.0, 2.0, 0.0], false)
            .unwrap();
    let layout = ElementLayout::lagrange(2, 3).unwrap();
    let dofs = distribute_dofs(&forest, &layout).unwrap();
    let rc = forest.reference();
    for cell in forest.active_cells().collect::<Vec<_>>() {
        for face in 0..rc.n_faces() {
            let Some(link) = forest.neighbor_link(cell, face).unwrap() else {
                continue;
            };
            let mine: std::collections::BTreeSet<usize> = dofs
                .cell_dofs(&forest, cell)
                .unwrap()
                .iter()
                .copied()
                .collect();
            let theirs: std::collections::BTreeSet<usize> = dofs
                .cell_dofs(&forest, link.cell)
                .unwrap()
                .iter()
                .copied()
                .collect();
            // the shared face (2 vertices + 2 edge dofs for Q3) is in both
            let shared: Vec<usize> = mine.intersection(&theirs).copied().collect();
            assert_eq!(shared.len(), 2 + 2);
        }
    }
}

#[test]
fn distribution_is_deterministic_across_identical_histories() {
    let build = || {
        let mut forest =
            subdivided_hyper_rectangle(2, [2, 1, 1], [0.0; 3], [2.0, 1.0, 0.0], false)
                .unwrap();
        forest.set_refine_flag(CellId::new(0, 1)).unwrap();
        execute_coarsening_and_refinement(&mut forest).unwrap();
        let layout = ElementLayout::lagrange(2, 2).unwrap();
        let dofs = distribute_dofs(&forest, &layout).unwrap();
        (forest, dofs)
    };
    let (fa, da) = build();
    let (fb, db) = build();
    assert_eq!(da.n_dofs(), db.n_dofs());
    for (ca, cb) in fa.active_cells().zip(fb.active_cells()) {
        assert_eq!(ca, cb);
        assert_eq!(
            da.cell_dofs(&fa, ca).unwrap(),
            db.cell_dofs(&fb, cb).unwrap()
        );
    }
}

#[test]
fn renumbering_preserves_the_partition() {
    let forest =
        subdivided_hyper_rectangle(2, [2, 2, 1], [0.0; 3], [2.0, 2.0, 0.0], false)
            .unwrap();
    let layout = ElementLayout::lagrange(2, 1).unwrap();
    let mut dofs = distribute_dofs(&forest, &layout).unwrap();
    let n = dofs.n_dofs();
    // rotate all indices by one
    let rotation: Vec<usize> = (0..n).map(|i| (i + 1) % n).collect();
    dofs.renumber(&rotation).unwrap();
    assert_eq!(
        covered_indices(&forest, &dofs),
        (0..n).collect::<Vec<_>>()
    );
    // renumberings compose
    dofs.renumber(&rotation).unwrap();
    assert_eq!(
        covered_indices(&forest, &dofs),
        (0..n).collect::<Vec<_>>()
    );
}

#[test]
fn stale_map_is_rejected_after_adaptation() {
    let mut forest = hyper_cube(2).unwrap();
    let layout = ElementLayout::lagrange(2, 1).unwrap();
    let dofs = distribute_dofs(&forest, &layout).unwrap();
    refine_global(&mut forest, 1).unwrap();
    let err = dofs.cell_dofs(&forest, CellId::new(0, 0)).unwrap_err();
    assert!(matches!(err, MeshForestError::StaleDofMap { .. }));
    let err = dofs
        .entity_dofs(&forest, &EntityKey::Vertex(0))
        .unwrap_err();
    assert!(matches!(err, MeshForestError::StaleDofMap { .. }));
}
