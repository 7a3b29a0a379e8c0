//! Live chunk ownership cache
//!
//! Written by the event path, read concurrently by queries and rendering.
//! Only claimed chunks are stored; an unclaim removes the entry.

use std::collections::HashMap;

use claimwatch_core::{ChunkCoord, ChunkKey, ChunkPos, Dimension, OwnerId};
use dashmap::DashMap;

use crate::OwnershipSnapshot;

/// Concurrent per-dimension chunk -> owner table
#[derive(Debug, Default)]
pub struct ChunkOwnershipCache {
    dimensions: DashMap<Dimension, DashMap<ChunkKey, OwnerId>>,
}

impl ChunkOwnershipCache {
    pub fn new() -> Self {
        ChunkOwnershipCache::default()
    }

    /// Current owner of a chunk
    pub fn get(&self, dimension: &Dimension, pos: ChunkPos) -> Option<OwnerId> {
        self.dimensions
            .get(dimension)
            .and_then(|chunks| chunks.get(&pos.key()).map(|owner| *owner))
    }

    /// Set the owner of a chunk (`None` unclaims). Returns the previous owner.
    pub fn set(&self, dimension: &Dimension, pos: ChunkPos, owner: Option<OwnerId>) -> Option<OwnerId> {
        let key = pos.key();
        match owner {
            Some(owner) => {
                if let Some(chunks) = self.dimensions.get(dimension) {
                    return chunks.insert(key, owner);
                }
                self.dimensions
                    .entry(dimension.clone())
                    .or_default()
                    .insert(key, owner)
            }
            None => self
                .dimensions
                .get(dimension)
                .and_then(|chunks| chunks.remove(&key).map(|(_, previous)| previous)),
        }
    }

    pub fn remove(&self, dimension: &Dimension, pos: ChunkPos) -> Option<OwnerId> {
        self.set(dimension, pos, None)
    }

    pub fn clear(&self) {
        self.dimensions.clear();
    }

    pub fn total_claims(&self) -> usize {
        self.dimensions.iter().map(|chunks| chunks.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total_claims() == 0
    }

    pub fn dimension_count(&self, dimension: &Dimension) -> usize {
        self.dimensions.get(dimension).map_or(0, |chunks| chunks.len())
    }

    /// Dimensions currently holding claims, sorted
    pub fn dimensions(&self) -> Vec<Dimension> {
        let mut dims: Vec<_> = self
            .dimensions
            .iter()
            .filter(|chunks| !chunks.is_empty())
            .map(|chunks| chunks.key().clone())
            .collect();
        dims.sort();
        dims
    }

    /// Owned copy of the whole table
    pub fn snapshot(&self) -> OwnershipSnapshot {
        let mut snapshot = OwnershipSnapshot::new();
        for dim in self.dimensions.iter() {
            for chunk in dim.value().iter() {
                snapshot.insert(dim.key().clone(), chunk.key().unpack(), *chunk.value());
            }
        }
        snapshot
    }

    /// Every claimed chunk grouped by owner
    pub fn claims_by_owner(&self) -> HashMap<OwnerId, Vec<ChunkCoord>> {
        let mut by_owner: HashMap<OwnerId, Vec<ChunkCoord>> = HashMap::new();
        for dim in self.dimensions.iter() {
            for chunk in dim.value().iter() {
                by_owner
                    .entry(*chunk.value())
                    .or_default()
                    .push(ChunkCoord::new(dim.key().clone(), chunk.key().unpack()));
            }
        }
        by_owner
    }

    /// Chunks held by one owner, optionally restricted to a dimension
    pub fn claims_of(&self, owner: OwnerId, dimension: Option<&Dimension>) -> Vec<ChunkCoord> {
        let mut claims = Vec::new();
        for dim in self.dimensions.iter() {
            if dimension.map_or(false, |d| d != dim.key()) {
                continue;
            }
            claims.extend(
                dim.value()
                    .iter()
                    .filter(|chunk| *chunk.value() == owner)
                    .map(|chunk| ChunkCoord::new(dim.key().clone(), chunk.key().unpack())),
            );
        }
        claims
    }
}
