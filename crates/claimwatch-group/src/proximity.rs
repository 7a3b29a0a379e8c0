//! Proximity grouping of an owner's claims
//!
//! Two claims belong together when both axes differ by at most the radius;
//! groups are the transitive closure of that relation per dimension.
//! Candidates come from a bucket index so each fill step only looks at the
//! 3x3 neighbouring buckets instead of every claim.

use std::collections::HashMap;
use std::time::Duration;

use claimwatch_core::{ChangeCount, ChunkCoord, ChunkPos, Dimension};

use crate::flood::connected_components;
use crate::group::sort_largest_first;
use crate::{ChunkGroup, GroupMember};

/// Default grouping radius in chunks
pub const DEFAULT_RADIUS: u32 = 5;

/// Proximity grouping configuration
#[derive(Clone, Debug)]
pub struct ProximityConfig {
    /// Maximum per-axis chunk distance between neighbouring claims
    pub radius: u32,
    /// How long computed groups are reused
    pub ttl: Duration,
}

impl Default for ProximityConfig {
    fn default() -> Self {
        ProximityConfig {
            radius: DEFAULT_RADIUS,
            ttl: Duration::from_secs(5),
        }
    }
}

/// Positions bucketed into square cells of `radius` chunks
struct SpatialIndex {
    cell: i64,
    buckets: HashMap<(i64, i64), Vec<ChunkPos>>,
}

impl SpatialIndex {
    fn build(positions: &[ChunkPos], radius: u32) -> Self {
        let cell = i64::from(radius.max(1));
        let mut index = SpatialIndex {
            cell,
            buckets: HashMap::new(),
        };
        for &pos in positions {
            let bucket = index.bucket_of(pos);
            index.buckets.entry(bucket).or_default().push(pos);
        }
        index
    }

    fn bucket_of(&self, pos: ChunkPos) -> (i64, i64) {
        (
            i64::from(pos.x).div_euclid(self.cell),
            i64::from(pos.z).div_euclid(self.cell),
        )
    }

    /// Positions within `radius` of `pos`, excluding `pos` itself
    fn near(&self, pos: ChunkPos, radius: u32) -> Vec<ChunkPos> {
        let (bx, bz) = self.bucket_of(pos);
        let mut found = Vec::new();
        for dx in -1..=1 {
            for dz in -1..=1 {
                if let Some(bucket) = self.buckets.get(&(bx + dx, bz + dz)) {
                    found.extend(
                        bucket
                            .iter()
                            .copied()
                            .filter(|other| *other != pos && pos.chebyshev(*other) <= radius),
                    );
                }
            }
        }
        found
    }
}

/// Group positions of one dimension
pub fn group_positions(dimension: &Dimension, positions: &[ChunkPos], radius: u32) -> Vec<ChunkGroup> {
    let index = SpatialIndex::build(positions, radius);
    let mut groups: Vec<ChunkGroup> = connected_components(positions, |pos| index.near(pos, radius))
        .into_iter()
        .filter_map(|component| {
            let members = component
                .into_iter()
                .map(|pos| GroupMember { pos, class: None })
                .collect();
            ChunkGroup::new(dimension.clone(), members, ChangeCount::default())
        })
        .collect();
    sort_largest_first(&mut groups);
    groups
}

/// Group claims (possibly spanning dimensions) by proximity, largest first
pub fn group_by_proximity(claims: &[ChunkCoord], radius: u32) -> Vec<ChunkGroup> {
    let mut by_dimension: Vec<(Dimension, Vec<ChunkPos>)> = Vec::new();
    for claim in claims {
        match by_dimension.iter_mut().find(|(d, _)| *d == claim.dimension) {
            Some((_, positions)) => positions.push(claim.pos),
            None => by_dimension.push((claim.dimension.clone(), vec![claim.pos])),
        }
    }

    let mut groups: Vec<ChunkGroup> = by_dimension
        .iter()
        .flat_map(|(dimension, positions)| group_positions(dimension, positions, radius))
        .collect();
    sort_largest_first(&mut groups);
    groups
}
