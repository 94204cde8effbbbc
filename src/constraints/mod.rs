//! Affine algebraic constraints `x[i] = Σ w_j · x[j] + b` on DoF vectors.
//!
//! Lines are stored in a `BTreeMap`, so iteration and serialized exports are
//! deterministic. A constraint set goes through two phases: an open phase in
//! which lines and entries are accumulated (hanging-node builder, boundary
//! conditions), and a closed phase after [`AffineConstraints::close`] in
//! which every line references only unconstrained DoFs and the consumer
//! operations ([`distribute`](AffineConstraints::distribute), condensation,
//! local-to-global scatter) become available.
//!
//! A line with no entries and zero inhomogeneity pins its DoF to zero; such
//! trivial lines are deliberately preserved by closure and serialization.

pub mod hanging;

pub use hanging::make_hanging_node_constraints;

use crate::dof::DofIndex;
use crate::linalg::{SparsityPattern, TripletSink};
use crate::mesh_error::MeshForestError;
use num_traits::Float;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// One constraint line: `x[constrained] = Σ entries + inhomogeneity`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConstraintLine<V> {
    /// `(source DoF, weight)` pairs, sorted by source after closure.
    pub entries: Vec<(DofIndex, V)>,
    /// Additive constant.
    pub inhomogeneity: V,
}

impl<V: Float> Default for ConstraintLine<V> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            inhomogeneity: V::zero(),
        }
    }
}

/// A set of affine constraints over a DoF numbering.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AffineConstraints<V> {
    lines: BTreeMap<DofIndex, ConstraintLine<V>>,
    closed: bool,
}

impl<V: Float> Default for AffineConstraints<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Float> AffineConstraints<V> {
    /// Empty, open constraint set.
    pub fn new() -> Self {
        Self {
            lines: BTreeMap::new(),
            closed: false,
        }
    }

    /// Number of constrained DoFs.
    #[inline]
    pub fn n_constraints(&self) -> usize {
        self.lines.len()
    }

    /// Whether [`close`](Self::close) has been called.
    #[inline]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Whether `dof` carries a constraint line.
    #[inline]
    pub fn is_constrained(&self, dof: DofIndex) -> bool {
        self.lines.contains_key(&dof)
    }

    /// The line of `dof`, if constrained.
    pub fn line(&self, dof: DofIndex) -> Option<&ConstraintLine<V>> {
        self.lines.get(&dof)
    }

    /// All lines in ascending constrained-DoF order.
    pub fn lines(&self) -> impl Iterator<Item = (DofIndex, &ConstraintLine<V>)> {
        self.lines.iter().map(|(&i, l)| (i, l))
    }

    fn check_open(&self) -> Result<(), MeshForestError> {
        if self.closed {
            return Err(MeshForestError::ConstraintsClosed);
        }
        Ok(())
    }

    fn check_closed(&self) -> Result<(), MeshForestError> {
        if !self.closed {
            return Err(MeshForestError::ConstraintsNotClosed);
        }
        Ok(())
    }

    /// Open a (possibly empty) line for `dof`. Idempotent.
    ///
    /// # Errors
    /// `ConstraintsClosed` after closure.
    pub fn add_line(&mut self, dof: DofIndex) -> Result<(), MeshForestError> {
        self.check_open()?;
        self.lines.entry(dof).or_default();
        Ok(())
    }

    /// Append `weight · x[source]` to the line of `constrained`.
    ///
    /// Repeating an existing pair with the same weight is a no-op.
    ///
    /// # Errors
    /// `ConstraintsClosed`, `UnknownConstraintLine` without a prior
    /// `add_line`, `SelfReferencingConstraint` for `source == constrained`,
    /// `ConflictingConstraint` when the pair exists with another weight.
    pub fn add_entry(
        &mut self,
        constrained: DofIndex,
        source: DofIndex,
        weight: V,
    ) -> Result<(), MeshForestError> {
        self.check_open()?;
        if source == constrained {
            return Err(MeshForestError::SelfReferencingConstraint(constrained));
        }
        let line = self
            .lines
            .get_mut(&constrained)
            .ok_or(MeshForestError::UnknownConstraintLine(constrained))?;
        if let Some(&(_, existing)) = line.entries.iter().find(|&&(j, _)| j == source) {
            if existing == weight {
                return Ok(());
            }
            return Err(MeshForestError::ConflictingConstraint {
                constrained,
                source_dof: source,
            });
        }
        line.entries.push((source, weight));
        Ok(())
    }

    /// Set the additive constant of an existing line.
    ///
    /// # Errors
    /// `ConstraintsClosed`, `UnknownConstraintLine`.
    pub fn set_inhomogeneity(
        &mut self,
        constrained: DofIndex,
        value: V,
    ) -> Result<(), MeshForestError> {
        self.check_open()?;
        let line = self
            .lines
            .get_mut(&constrained)
            .ok_or(MeshForestError::UnknownConstraintLine(constrained))?;
        line.inhomogeneity = value;
        Ok(())
    }

    /// Resolve constraint chains so every line references only
    /// unconstrained DoFs, merge duplicate sources, drop exact zero
    /// weights, and sort entries. Empty lines are kept: they pin their DoF
    /// to the inhomogeneity. Calling `close` on a closed set is a no-op.
    ///
    /// # Errors
    /// `CyclicConstraint` when a DoF transitively constrains itself.
    pub fn close(&mut self) -> Result<(), MeshForestError> {
        if self.closed {
            return Ok(());
        }
        let keys: Vec<DofIndex> = self.lines.keys().copied().collect();
        let mut resolved: BTreeMap<DofIndex, ConstraintLine<V>> = BTreeMap::new();
        for &dof in &keys {
            let mut visiting = BTreeSet::new();
            self.resolve(dof, &mut visiting, &mut resolved)?;
        }
        self.lines = resolved;
        self.closed = true;
        Ok(())
    }

    fn resolve(
        &self,
        dof: DofIndex,
        visiting: &mut BTreeSet<DofIndex>,
        resolved: &mut BTreeMap<DofIndex, ConstraintLine<V>>,
    ) -> Result<ConstraintLine<V>, MeshForestError> {
        if let Some(line) = resolved.get(&dof) {
            return Ok(line.clone());
        }
        if !visiting.insert(dof) {
            return Err(MeshForestError::CyclicConstraint(dof));
        }
        let raw = &self.lines[&dof];
        let mut merged: BTreeMap<DofIndex, V> = BTreeMap::new();
        let mut inhomogeneity = raw.inhomogeneity;
        for &(source, weight) in &raw.entries {
            if self.lines.contains_key(&source) {
                let sub = self.resolve(source, visiting, resolved)?;
                for &(k, w) in &sub.entries {
                    let e = merged.entry(k).or_insert_with(V::zero);
                    *e = *e + weight * w;
                }
                inhomogeneity = inhomogeneity + weight * sub.inhomogeneity;
            } else {
                let e = merged.entry(source).or_insert_with(V::zero);
                *e = *e + weight;
            }
        }
        visiting.remove(&dof);
        let line = ConstraintLine {
            entries: merged
                .into_iter()
                .filter(|&(_, w)| w != V::zero())
                .collect(),
            inhomogeneity,
        };
        resolved.insert(dof, line.clone());
        Ok(line)
    }

    /// Overwrite every constrained entry of `values` with its constraint's
    /// value. Idempotent on a closed set.
    ///
    /// # Errors
    /// `ConstraintsNotClosed`; `DofIndexOutOfRange` if a referenced index
    /// does not fit the vector.
    pub fn distribute(&self, values: &mut [V]) -> Result<(), MeshForestError> {
        self.check_closed()?;
        for (&dof, line) in &self.lines {
            if dof >= values.len() {
                return Err(MeshForestError::DofIndexOutOfRange {
                    index: dof,
                    n_dofs: values.len(),
                });
            }
            let mut value = line.inhomogeneity;
            for &(source, weight) in &line.entries {
                if source >= values.len() {
                    return Err(MeshForestError::DofIndexOutOfRange {
                        index: source,
                        n_dofs: values.len(),
                    });
                }
                value = value + weight * values[source];
            }
            values[dof] = value;
        }
        Ok(())
    }

    fn expansion(&self, dof: DofIndex) -> Vec<(DofIndex, V)> {
        match self.lines.get(&dof) {
            Some(line) => line.entries.clone(),
            None => vec![(dof, V::one())],
        }
    }

    /// Expand a sparsity pattern so condensed rows/columns couple the
    /// sources of their constraints, and give every constrained DoF its
    /// diagonal slot.
    ///
    /// # Errors
    /// `ConstraintsNotClosed`.
    pub fn condense_pattern(
        &self,
        pattern: &mut SparsityPattern,
    ) -> Result<(), MeshForestError> {
        self.check_closed()?;
        for row in 0..pattern.n_rows() {
            let cols: Vec<usize> = pattern.row(row).collect();
            let row_targets = self.expansion(row);
            for col in cols {
                let col_targets = self.expansion(col);
                for &(rt, _) in &row_targets {
                    for &(ct, _) in &col_targets {
                        pattern.add(rt, ct);
                    }
                }
            }
        }
        for &dof in self.lines.keys() {
            pattern.add(dof, dof);
        }
        Ok(())
    }

    /// Fold raw triplets through the constraints into `sink`: constrained
    /// rows and columns are redistributed onto their sources with the
    /// product of the weights.
    ///
    /// # Errors
    /// `ConstraintsNotClosed`.
    pub fn condense_into(
        &self,
        triplets: &[(usize, usize, V)],
        sink: &mut impl TripletSink<V>,
    ) -> Result<(), MeshForestError> {
        self.check_closed()?;
        for &(row, col, value) in triplets {
            for &(rt, rw) in &self.expansion(row) {
                for &(ct, cw) in &self.expansion(col) {
                    sink.add(rt, ct, rw * cw * value);
                }
            }
        }
        Ok(())
    }

    /// Put `1` on the diagonal of every constrained DoF so the condensed
    /// matrix stays regular.
    ///
    /// # Errors
    /// `ConstraintsNotClosed`.
    pub fn add_constrained_diagonals(
        &self,
        sink: &mut impl TripletSink<V>,
    ) -> Result<(), MeshForestError> {
        self.check_closed()?;
        for &dof in self.lines.keys() {
            sink.add(dof, dof, V::one());
        }
        Ok(())
    }

    /// Scatter a local system into the global matrix and right-hand side,
    /// resolving constraints on the fly. `local_matrix` is row-major
    /// `dofs.len() × dofs.len()`; inhomogeneities are moved to the
    /// right-hand side.
    ///
    /// # Errors
    /// `ConstraintsNotClosed`; `BufferLengthMismatch` if the local system
    /// does not match `dofs`; `DofIndexOutOfRange` against `rhs`.
    pub fn distribute_local_to_global(
        &self,
        local_matrix: &[V],
        local_rhs: &[V],
        dofs: &[DofIndex],
        matrix: &mut impl TripletSink<V>,
        rhs: &mut [V],
    ) -> Result<(), MeshForestError> {
        self.check_closed()?;
        let n = dofs.len();
        if local_matrix.len() != n * n {
            return Err(MeshForestError::BufferLengthMismatch {
                expected: n * n,
                found: local_matrix.len(),
            });
        }
        if local_rhs.len() != n {
            return Err(MeshForestError::BufferLengthMismatch {
                expected: n,
                found: local_rhs.len(),
            });
        }
        for (a, &i) in dofs.iter().enumerate() {
            let row_targets = self.expansion(i);
            for &(rt, rw) in &row_targets {
                if rt >= rhs.len() {
                    return Err(MeshForestError::DofIndexOutOfRange {
                        index: rt,
                        n_dofs: rhs.len(),
                    });
                }
                rhs[rt] = rhs[rt] + rw * local_rhs[a];
            }
            for (b, &j) in dofs.iter().enumerate() {
                let value = local_matrix[a * n + b];
                if value == V::zero() {
                    continue;
                }
                let col_line = self.lines.get(&j);
                for &(rt, rw) in &row_targets {
                    for &(ct, cw) in &self.expansion(j) {
                        matrix.add(rt, ct, rw * cw * value);
                    }
                    // the constant part of a constrained column goes to the rhs
                    if let Some(line) = col_line
                        && line.inhomogeneity != V::zero()
                    {
                        rhs[rt] = rhs[rt] - rw * value * line.inhomogeneity;
                    }
                }
            }
        }
        Ok(())
    }
}
