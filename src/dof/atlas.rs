//! `DofAtlas`: insertion-ordered map from entity keys to contiguous DoF
//! blocks.
//!
//! The atlas owns the canonical numbering: entity `k` inserted with length
//! `len` receives the block `[total_len, total_len + len)`. Blocks are
//! allocated in first-touch order and never move, so the numbering is a
//! function of the traversal order alone. Renumbering is layered on top by
//! [`DofMap`](crate::dof::handler::DofMap) as a permutation; the atlas
//! itself stays contiguous.

use crate::debug_invariants::DebugInvariants;
use crate::dof::EntityKey;
use crate::mesh_error::MeshForestError;
use crate::topology::cache::InvalidateCache;
use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

/// Map from entity key to `(offset, len)` block in the canonical numbering.
///
/// Serializes as the insertion-ordered `(key, len)` list; offsets and the
/// lookup map are rebuilt on deserialization.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(into = "AtlasEntries", from = "AtlasEntries")]
pub struct DofAtlas {
    map: HashMap<EntityKey, (usize, usize)>,
    order: Vec<EntityKey>,
    total_len: usize,
    version: u64,
}

#[derive(Serialize, Deserialize)]
struct AtlasEntries {
    entries: Vec<(EntityKey, usize)>,
}

impl From<DofAtlas> for AtlasEntries {
    fn from(atlas: DofAtlas) -> Self {
        Self {
            entries: atlas.iter().map(|(k, _, len)| (k, len)).collect(),
        }
    }
}

impl From<AtlasEntries> for DofAtlas {
    fn from(entries: AtlasEntries) -> Self {
        let mut atlas = DofAtlas::new();
        for (key, len) in entries.entries {
            // lengths written by `into` are non-zero and keys unique
            let _ = atlas.try_insert(key, len);
        }
        atlas
    }
}

impl DofAtlas {
    /// Empty atlas.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `key` with a fresh block of length `len`; returns the
    /// block's offset.
    ///
    /// # Errors
    /// `ZeroLengthBlock` for `len == 0`, `DuplicateEntity` if the key is
    /// already present.
    pub fn try_insert(
        &mut self,
        key: EntityKey,
        len: usize,
    ) -> Result<usize, MeshForestError> {
        if len == 0 {
            return Err(MeshForestError::ZeroLengthBlock);
        }
        if self.map.contains_key(&key) {
            return Err(MeshForestError::DuplicateEntity(key));
        }
        let offset = self.total_len;
        self.map.insert(key, (offset, len));
        self.order.push(key);
        self.total_len += len;
        self.version += 1;
        Ok(offset)
    }

    /// Block of `key`, if registered.
    #[inline]
    pub fn get(&self, key: &EntityKey) -> Option<(usize, usize)> {
        self.map.get(key).copied()
    }

    /// Block of `key`, `MissingEntity` otherwise.
    pub fn try_get(&self, key: &EntityKey) -> Result<(usize, usize), MeshForestError> {
        self.get(key).ok_or(MeshForestError::MissingEntity(*key))
    }

    /// Whether `key` has a block.
    #[inline]
    pub fn contains(&self, key: &EntityKey) -> bool {
        self.map.contains_key(key)
    }

    /// Number of registered entities.
    #[inline]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// True when no entity is registered.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Sum of all block lengths (the canonical `n_dofs`).
    #[inline]
    pub fn total_len(&self) -> usize {
        self.total_len
    }

    /// Mutation counter.
    #[inline]
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Entities with their blocks, in insertion (allocation) order.
    pub fn iter(&self) -> impl Iterator<Item = (EntityKey, usize, usize)> + '_ {
        self.order.iter().map(move |k| {
            let (offset, len) = self.map[k];
            (*k, offset, len)
        })
    }
}

impl InvalidateCache for DofAtlas {
    fn invalidate_cache(&mut self) {
        self.version += 1;
    }
}

impl DebugInvariants for DofAtlas {
    fn debug_assert_invariants(&self) {
        crate::forest_debug_assert_ok!(self.validate_invariants(), "DofAtlas invalid");
    }

    fn validate_invariants(&self) -> Result<(), MeshForestError> {
        let mut expected = 0;
        for key in &self.order {
            let (offset, len) = self.map[key];
            if len == 0 {
                return Err(MeshForestError::ZeroLengthBlock);
            }
            if offset != expected {
                return Err(MeshForestError::NonContiguousBlock {
                    expected,
                    found: offset,
                });
            }
            expected += len;
        }
        if expected != self.total_len {
            return Err(MeshForestError::NonContiguousBlock {
                expected,
                found: self.total_len,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocks_are_contiguous_in_insertion_order() {
        let mut atlas = DofAtlas::new();
        assert_eq!(atlas.try_insert(EntityKey::Vertex(0), 1).unwrap(), 0);
        assert_eq!(atlas.try_insert(EntityKey::line(0, 1), 2).unwrap(), 1);
        assert_eq!(atlas.try_insert(EntityKey::Vertex(1), 1).unwrap(), 3);
        assert_eq!(atlas.total_len(), 4);
        assert_eq!(atlas.get(&EntityKey::line(1, 0)), Some((1, 2)));
        atlas.validate_invariants().unwrap();
        let order: Vec<_> = atlas.iter().map(|(k, _, _)| k).collect();
        assert_eq!(
            order,
            vec![
                EntityKey::Vertex(0),
                EntityKey::Line(0, 1),
                EntityKey::Vertex(1)
            ]
        );
    }

    #[test]
    fn duplicate_and_zero_length_rejected() {
        let mut atlas = DofAtlas::new();
        atlas.try_insert(EntityKey::Vertex(0), 1).unwrap();
        assert_eq!(
            atlas.try_insert(EntityKey::Vertex(0), 1).unwrap_err(),
            MeshForestError::DuplicateEntity(EntityKey::Vertex(0))
        );
        assert_eq!(
            atlas.try_insert(EntityKey::Vertex(1), 0).unwrap_err(),
            MeshForestError::ZeroLengthBlock
        );
        assert_eq!(
            atlas.try_get(&EntityKey::Vertex(9)).unwrap_err(),
            MeshForestError::MissingEntity(EntityKey::Vertex(9))
        );
    }

    #[test]
    fn version_tracks_mutations() {
        let mut atlas = DofAtlas::new();
        let v0 = atlas.version();
        atlas.try_insert(EntityKey::Vertex(0), 1).unwrap();
        assert!(atlas.version() > v0);
    }

    #[test]
    fn serde_round_trip() {
        let mut atlas = DofAtlas::new();
        atlas.try_insert(EntityKey::Vertex(3), 2).unwrap();
        atlas.try_insert(EntityKey::line(3, 4), 1).unwrap();
        let json = serde_json::to_string(&atlas).unwrap();
        let back: DofAtlas = serde_json::from_str(&json).unwrap();
        assert_eq!(back.total_len(), atlas.total_len());
        assert_eq!(back.get(&EntityKey::Vertex(3)), Some((0, 2)));
        back.validate_invariants().unwrap();
    }
}
