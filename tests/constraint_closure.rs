//! Closure and consumer-contract properties of `AffineConstraints`.

use mesh_forest::prelude::*;

#[test]
fn deep_chains_resolve_to_unconstrained_sources() {
    // x4 -> x3 -> x2 -> x1 -> x0
    let mut c = AffineConstraints::<f64>::new();
    for dof in 1..=4 {
        c.add_line(dof).unwrap();
        c.add_entry(dof, dof - 1, 0.5).unwrap();
    }
    c.close().unwrap();
    for dof in 1..=4 {
        let line = c.line(dof).unwrap();
        assert_eq!(line.entries.len(), 1);
        assert_eq!(line.entries[0].0, 0);
        assert_eq!(line.entries[0].1, 0.5f64.powi(dof as i32));
    }
}

#[test]
fn closure_then_distribute_is_idempotent() {
    let mut c = AffineConstraints::<f64>::new();
    c.add_line(2).unwrap();
    c.add_entry(2, 0, 0.25).unwrap();
    c.add_entry(2, 1, 0.75).unwrap();
    c.add_line(3).unwrap();
    c.add_entry(3, 2, 1.0).unwrap();
    c.set_inhomogeneity(3, 1.0).unwrap();
    c.close().unwrap();
    let before = c.clone();
    c.close().unwrap();
    assert_eq!(c, before);

    let mut values = vec![4.0, 0.0, -1.0, -1.0];
    c.distribute(&mut values).unwrap();
    let once = values.clone();
    c.distribute(&mut values).unwrap();
    assert_eq!(values, once);
    assert_eq!(values[2], 1.0);
    assert_eq!(values[3], 2.0);
}

#[test]
fn indirect_cycles_are_reported() {
    let mut c = AffineConstraints::<f64>::new();
    c.add_line(0).unwrap();
    c.add_entry(0, 1, 0.5).unwrap();
    c.add_line(1).unwrap();
    c.add_entry(1, 2, 0.5).unwrap();
    c.add_line(2).unwrap();
    c.add_entry(2, 0, 0.5).unwrap();
    assert!(matches!(
        c.close(),
        Err(MeshForestError::CyclicConstraint(_))
    ));
}

#[test]
fn trivial_lines_survive_closure_and_serialization() {
    let mut c = AffineConstraints::<f64>::new();
    c.add_line(7).unwrap();
    c.add_line(2).unwrap();
    c.add_entry(2, 0, 1.0).unwrap();
    c.close().unwrap();
    assert_eq!(c.n_constraints(), 2);

    let json = serde_json::to_string(&c).unwrap();
    let back: AffineConstraints<f64> = serde_json::from_str(&json).unwrap();
    assert_eq!(back, c);
    assert!(back.line(7).unwrap().entries.is_empty());

    let bytes = bincode::serialize(&c).unwrap();
    let back: AffineConstraints<f64> = bincode::deserialize(&bytes).unwrap();
    assert_eq!(back, c);
}

#[test]
fn exports_iterate_in_ascending_dof_order() {
    let mut c = AffineConstraints::<f64>::new();
    for dof in [9, 1, 5] {
        c.add_line(dof).unwrap();
    }
    c.close().unwrap();
    let order: Vec<usize> = c.lines().map(|(dof, _)| dof).collect();
    assert_eq!(order, vec![1, 5, 9]);
}

#[test]
fn condensation_matches_manual_elimination() {
    // x2 = (x0 + x1) / 2; condense A = diag(1, 1, 4)
    let mut c = AffineConstraints::<f64>::new();
    c.add_line(2).unwrap();
    c.add_entry(2, 0, 0.5).unwrap();
    c.add_entry(2, 1, 0.5).unwrap();
    c.close().unwrap();

    let triplets = vec![(0, 0, 1.0), (1, 1, 1.0), (2, 2, 4.0)];
    let mut m = CooMatrix::new(3, 3);
    c.condense_into(&triplets, &mut m).unwrap();
    c.add_constrained_diagonals(&mut m).unwrap();
    let dense = m.to_dense();
    assert_eq!(dense[0], vec![2.0, 1.0, 0.0]);
    assert_eq!(dense[1], vec![1.0, 2.0, 0.0]);
    assert_eq!(dense[2], vec![0.0, 0.0, 1.0]);

    let mut pattern = SparsityPattern::new(3, 3);
    for &(r, col, _) in &triplets {
        pattern.add(r, col);
    }
    c.condense_pattern(&mut pattern).unwrap();
    for &(r, col) in &[(0, 0), (0, 1), (1, 0), (1, 1), (2, 2)] {
        assert!(pattern.contains(r, col));
    }
}
