//! Global refinement followed by coarsening everything restores the
//! original active set.

use mesh_forest::prelude::*;

fn coarsen_everything_once(forest: &mut Forest) -> AdaptationSummary {
    let active: Vec<CellId> = forest.active_cells().collect();
    for id in active {
        forest.set_coarsen_flag(id).unwrap();
    }
    execute_coarsening_and_refinement(forest).unwrap()
}

#[test]
fn square_round_trip() {
    let mut forest =
        subdivided_hyper_rectangle(2, [2, 2, 1], [0.0; 3], [2.0, 2.0, 0.0], false)
            .unwrap();
    let original: Vec<CellId> = forest.active_cells().collect();

    refine_global(&mut forest, 2).unwrap();
    assert_eq!(forest.n_active_cells(), 4 * 16);

    // each coarsening pass strips one level
    coarsen_everything_once(&mut forest);
    assert_eq!(forest.n_active_cells(), 4 * 4);
    coarsen_everything_once(&mut forest);

    let restored: Vec<CellId> = forest.active_cells().collect();
    assert_eq!(restored, original);
    forest.validate_invariants().unwrap();
}

#[test]
fn cube_round_trip() {
    let mut forest = hyper_cube(3).unwrap();
    refine_global(&mut forest, 1).unwrap();
    assert_eq!(forest.n_active_cells(), 8);
    let summary = coarsen_everything_once(&mut forest);
    assert_eq!(summary.n_coarsened, 1);
    assert_eq!(forest.n_active_cells(), 1);
    assert!(forest.is_active(CellId::new(0, 0)).unwrap());
}

#[test]
fn freed_slots_are_reused() {
    let mut forest = hyper_cube(2).unwrap();
    refine_global(&mut forest, 1).unwrap();
    let first_children: Vec<CellId> = forest.active_cells().collect();
    coarsen_everything_once(&mut forest);
    refine_global(&mut forest, 1).unwrap();
    let second_children: Vec<CellId> = forest.active_cells().collect();
    // the level-1 arena reuses the freed slots instead of growing
    assert_eq!(
        first_children.iter().collect::<std::collections::HashSet<_>>(),
        second_children.iter().collect::<std::collections::HashSet<_>>()
    );
}

#[test]
fn coarsening_level_zero_is_a_no_op() {
    let mut forest = hyper_cube(2).unwrap();
    let summary = coarsen_everything_once(&mut forest);
    assert_eq!(summary.n_coarsened, 0);
    assert_eq!(forest.n_active_cells(), 1);
}

#[test]
fn round_trip_keeps_generation_moving() {
    let mut forest = hyper_cube(2).unwrap();
    let g0 = forest.generation();
    refine_global(&mut forest, 1).unwrap();
    coarsen_everything_once(&mut forest);
    // the mesh is back to the original shape but it is a new state
    assert!(forest.generation() > g0);
}
