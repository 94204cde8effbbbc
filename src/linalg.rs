//! Minimal linear-algebra shims for the assembly and condensation
//! interfaces.
//!
//! Real solver backends bring their own matrix types; they plug in through
//! [`TripletSink`]. [`CooMatrix`] and [`SparsityPattern`] are the reference
//! implementations used by the tests and small consumers.

use num_traits::Float;
use std::collections::BTreeSet;

/// Receiver of `(row, col, value)` matrix contributions.
pub trait TripletSink<V> {
    /// Accumulate one contribution.
    fn add(&mut self, row: usize, col: usize, value: V);
}

/// Coordinate-format matrix accumulating duplicate triplets.
#[derive(Clone, Debug)]
pub struct CooMatrix<V> {
    n_rows: usize,
    n_cols: usize,
    triplets: Vec<(usize, usize, V)>,
}

impl<V: Float> CooMatrix<V> {
    /// Empty matrix of the given shape.
    pub fn new(n_rows: usize, n_cols: usize) -> Self {
        Self {
            n_rows,
            n_cols,
            triplets: Vec::new(),
        }
    }

    /// Number of rows.
    #[inline]
    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    /// Number of columns.
    #[inline]
    pub fn n_cols(&self) -> usize {
        self.n_cols
    }

    /// Raw triplets, duplicates not merged.
    pub fn triplets(&self) -> &[(usize, usize, V)] {
        &self.triplets
    }

    /// Dense copy with duplicates summed; for tests and small problems.
    pub fn to_dense(&self) -> Vec<Vec<V>> {
        let mut dense = vec![vec![V::zero(); self.n_cols]; self.n_rows];
        for &(r, c, v) in &self.triplets {
            dense[r][c] = dense[r][c] + v;
        }
        dense
    }
}

impl<V: Float> TripletSink<V> for CooMatrix<V> {
    fn add(&mut self, row: usize, col: usize, value: V) {
        debug_assert!(row < self.n_rows && col < self.n_cols);
        self.triplets.push((row, col, value));
    }
}

/// Symbolic nonzero structure of a square-ish sparse matrix.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SparsityPattern {
    rows: Vec<BTreeSet<usize>>,
    n_cols: usize,
}

impl SparsityPattern {
    /// Empty pattern of the given shape.
    pub fn new(n_rows: usize, n_cols: usize) -> Self {
        Self {
            rows: vec![BTreeSet::new(); n_rows],
            n_cols,
        }
    }

    /// Number of rows.
    #[inline]
    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    /// Number of columns.
    #[inline]
    pub fn n_cols(&self) -> usize {
        self.n_cols
    }

    /// Record position `(row, col)` as nonzero.
    pub fn add(&mut self, row: usize, col: usize) {
        debug_assert!(row < self.rows.len() && col < self.n_cols);
        self.rows[row].insert(col);
    }

    /// Whether `(row, col)` is recorded.
    pub fn contains(&self, row: usize, col: usize) -> bool {
        self.rows.get(row).is_some_and(|r| r.contains(&col))
    }

    /// Column indices of one row, ascending.
    pub fn row(&self, row: usize) -> impl Iterator<Item = usize> + '_ {
        self.rows[row].iter().copied()
    }

    /// Total number of recorded nonzeros.
    pub fn n_nonzeros(&self) -> usize {
        self.rows.iter().map(|r| r.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coo_accumulates_duplicates() {
        let mut m = CooMatrix::<f64>::new(2, 2);
        m.add(0, 0, 1.0);
        m.add(0, 0, 2.0);
        m.add(1, 0, -1.0);
        let dense = m.to_dense();
        assert_eq!(dense[0][0], 3.0);
        assert_eq!(dense[1][0], -1.0);
        assert_eq!(dense[0][1], 0.0);
    }

    #[test]
    fn pattern_records_positions_once() {
        let mut p = SparsityPattern::new(3, 3);
        p.add(0, 1);
        p.add(0, 1);
        p.add(2, 0);
        assert_eq!(p.n_nonzeros(), 2);
        assert!(p.contains(0, 1));
        assert!(!p.contains(1, 0));
        assert_eq!(p.row(0).collect::<Vec<_>>(), vec![1]);
    }
}
