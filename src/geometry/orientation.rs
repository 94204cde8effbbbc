//! Face-frame permutations relating two cells adjacent across a face.
//!
//! Two cells sharing a face each enumerate that face's corners in their own
//! local order. A [`FacePerm`] records the small permutation between the two
//! enumerations (identity, a flip in 2D, one of the eight quad symmetries in
//! 3D). Neighbor descent uses it to translate subface indices, because
//! subfaces and face corners share an enumeration.

use serde::{Deserialize, Serialize};

/// Permutation of the `2^(d-1)` corners of a shared face, mapping *this*
/// cell's corner index to the neighbor's index of the same global vertex.
///
/// Compact and `Copy`; at most four corners are ever involved.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct FacePerm {
    n: u8,
    perm: [u8; 4],
}

impl FacePerm {
    /// Identity permutation on `n` face corners (`n ∈ {1, 2, 4}`).
    pub fn identity(n: usize) -> Self {
        assert!(matches!(n, 1 | 2 | 4), "faces have 1, 2 or 4 corners");
        let mut perm = [0u8; 4];
        for (i, slot) in perm.iter_mut().enumerate().take(n) {
            *slot = i as u8;
        }
        Self { n: n as u8, perm }
    }

    /// Derive the permutation between two corner enumerations of the same
    /// face, given the global vertex ids each side sees.
    ///
    /// Returns `None` if the two lists are not permutations of each other
    /// (i.e. the faces do not actually coincide).
    pub fn match_faces(mine: &[u32], theirs: &[u32]) -> Option<Self> {
        if mine.len() != theirs.len() || !matches!(mine.len(), 1 | 2 | 4) {
            return None;
        }
        let mut perm = [0u8; 4];
        for (k, &v) in mine.iter().enumerate() {
            let j = theirs.iter().position(|&w| w == v)?;
            perm[k] = j as u8;
        }
        // reject duplicate targets (degenerate vertex lists)
        let mut seen = [false; 4];
        for &j in &perm[..mine.len()] {
            if std::mem::replace(&mut seen[j as usize], true) {
                return None;
            }
        }
        Some(Self {
            n: mine.len() as u8,
            perm,
        })
    }

    /// Number of face corners this permutation acts on.
    #[inline]
    pub fn len(self) -> usize {
        self.n as usize
    }

    /// Whether the permutation acts on zero corners (never, by construction).
    #[inline]
    pub fn is_empty(self) -> bool {
        self.n == 0
    }

    /// Map a corner/subface index from this cell's frame to the neighbor's.
    #[inline]
    pub fn apply(self, k: usize) -> usize {
        assert!(k < self.len(), "corner index {k} out of range");
        self.perm[k] as usize
    }

    /// The inverse permutation (neighbor's frame to this cell's).
    pub fn inverted(self) -> Self {
        let mut inv = [0u8; 4];
        for i in 0..self.len() {
            inv[self.perm[i] as usize] = i as u8;
        }
        Self {
            n: self.n,
            perm: inv,
        }
    }

    /// Whether both sides enumerate the face identically.
    pub fn is_identity(self) -> bool {
        self.perm[..self.len()]
            .iter()
            .enumerate()
            .all(|(i, &j)| i == j as usize)
    }
}

impl Default for FacePerm {
    fn default() -> Self {
        Self::identity(1)
    }
}
