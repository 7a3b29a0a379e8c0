//! Ownership snapshot - a plain, owned copy of the ownership table
//!
//! Used both as the persisted baseline from the previous session and as the
//! immutable copy of the live cache handed to readers.

use std::collections::HashMap;

use claimwatch_core::{ChunkCoord, ChunkKey, ChunkPos, Dimension, OwnerId};

/// Per-dimension chunk -> owner table; absent keys are unclaimed
#[derive(Clone, Debug, Default)]
pub struct OwnershipSnapshot {
    dimensions: HashMap<Dimension, HashMap<ChunkKey, OwnerId>>,
}

impl OwnershipSnapshot {
    pub fn new() -> Self {
        OwnershipSnapshot::default()
    }

    /// Insert or overwrite a claim
    pub fn insert(&mut self, dimension: Dimension, pos: ChunkPos, owner: OwnerId) -> Option<OwnerId> {
        self.dimensions
            .entry(dimension)
            .or_default()
            .insert(pos.key(), owner)
    }

    /// Owner of a chunk, if claimed
    pub fn get(&self, dimension: &Dimension, pos: ChunkPos) -> Option<OwnerId> {
        self.dimensions
            .get(dimension)
            .and_then(|chunks| chunks.get(&pos.key()))
            .copied()
    }

    pub fn contains(&self, dimension: &Dimension, pos: ChunkPos) -> bool {
        self.get(dimension, pos).is_some()
    }

    /// Total number of claimed chunks across all dimensions
    pub fn total(&self) -> usize {
        self.dimensions.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    /// Number of claimed chunks in one dimension
    pub fn dimension_count(&self, dimension: &Dimension) -> usize {
        self.dimensions.get(dimension).map_or(0, HashMap::len)
    }

    /// Claimed-chunk count per dimension (dimensions without claims omitted)
    pub fn dimension_counts(&self) -> HashMap<Dimension, usize> {
        self.dimensions
            .iter()
            .filter(|(_, chunks)| !chunks.is_empty())
            .map(|(dim, chunks)| (dim.clone(), chunks.len()))
            .collect()
    }

    /// Dimensions holding at least one claim, sorted by identifier
    pub fn dimensions(&self) -> Vec<Dimension> {
        let mut dims: Vec<_> = self
            .dimensions
            .iter()
            .filter(|(_, chunks)| !chunks.is_empty())
            .map(|(dim, _)| dim.clone())
            .collect();
        dims.sort();
        dims
    }

    /// Claims of one dimension, sorted by position
    pub fn claims_in(&self, dimension: &Dimension) -> Vec<(ChunkPos, OwnerId)> {
        let mut claims: Vec<_> = self
            .dimensions
            .get(dimension)
            .map(|chunks| {
                chunks
                    .iter()
                    .map(|(key, owner)| (key.unpack(), *owner))
                    .collect()
            })
            .unwrap_or_default();
        claims.sort_by_key(|(pos, _)| *pos);
        claims
    }

    /// Every claim, in no particular order
    pub fn iter(&self) -> impl Iterator<Item = (&Dimension, ChunkPos, OwnerId)> + '_ {
        self.dimensions.iter().flat_map(|(dim, chunks)| {
            chunks.iter().map(move |(key, owner)| (dim, key.unpack(), *owner))
        })
    }

    /// Chunks held by one owner, optionally restricted to a dimension
    pub fn claims_of(&self, owner: OwnerId, dimension: Option<&Dimension>) -> Vec<ChunkCoord> {
        self.iter()
            .filter(|(dim, _, holder)| *holder == owner && dimension.map_or(true, |d| d == *dim))
            .map(|(dim, pos, _)| ChunkCoord::new(dim.clone(), pos))
            .collect()
    }
}

/// Equal when both hold the same claims; empty dimension tables are ignored
impl PartialEq for OwnershipSnapshot {
    fn eq(&self, other: &Self) -> bool {
        self.total() == other.total()
            && self
                .iter()
                .all(|(dim, pos, owner)| other.get(dim, pos) == Some(owner))
    }
}

impl Eq for OwnershipSnapshot {}

impl FromIterator<(Dimension, ChunkPos, OwnerId)> for OwnershipSnapshot {
    fn from_iter<T: IntoIterator<Item = (Dimension, ChunkPos, OwnerId)>>(iter: T) -> Self {
        let mut snapshot = OwnershipSnapshot::new();
        for (dimension, pos, owner) in iter {
            snapshot.insert(dimension, pos, owner);
        }
        snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn owner(n: u128) -> OwnerId {
        OwnerId::new(Uuid::from_u128(n))
    }

    #[test]
    fn test_snapshot_counts() {
        let snapshot: OwnershipSnapshot = [
            (Dimension::overworld(), ChunkPos::new(0, 0), owner(1)),
            (Dimension::overworld(), ChunkPos::new(0, 1), owner(1)),
            (Dimension::nether(), ChunkPos::new(-4, 2), owner(2)),
        ]
        .into_iter()
        .collect();

        assert_eq!(snapshot.total(), 3);
        assert_eq!(snapshot.dimension_count(&Dimension::overworld()), 2);
        assert_eq!(snapshot.dimension_count(&Dimension::end()), 0);
        assert_eq!(snapshot.dimensions(), vec![Dimension::overworld(), Dimension::nether()]);
        assert_eq!(snapshot.get(&Dimension::nether(), ChunkPos::new(-4, 2)), Some(owner(2)));
        assert_eq!(snapshot.claims_of(owner(1), None).len(), 2);
        assert!(snapshot
            .claims_of(owner(1), Some(&Dimension::nether()))
            .is_empty());
    }

    #[test]
    fn test_claims_in_sorted() {
        let mut snapshot = OwnershipSnapshot::new();
        snapshot.insert(Dimension::overworld(), ChunkPos::new(3, 0), owner(1));
        snapshot.insert(Dimension::overworld(), ChunkPos::new(-3, 0), owner(1));
        let positions: Vec<_> = snapshot
            .claims_in(&Dimension::overworld())
            .into_iter()
            .map(|(pos, _)| pos)
            .collect();
        assert_eq!(positions, vec![ChunkPos::new(-3, 0), ChunkPos::new(3, 0)]);
    }
}
