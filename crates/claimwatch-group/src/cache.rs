//! TTL cache for proximity groups
//!
//! Presentation code asks for the same owner's groups on every refresh.
//! Results are reused until they are `ttl` old; staleness is bounded by the
//! TTL rather than invalidated eagerly on every ownership change.

use std::collections::HashMap;
use std::sync::Arc;

use claimwatch_core::{ChunkCoord, Dimension, OwnerId, Timestamp};
use claimwatch_time::elapsed;
use parking_lot::Mutex;
use tracing::trace;

use crate::{group_by_proximity, ChunkGroup, ProximityConfig};

/// Which claims of an owner to group
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum GroupScope {
    Dimension(Dimension),
    AllDimensions,
}

impl GroupScope {
    pub fn includes(&self, dimension: &Dimension) -> bool {
        match self {
            GroupScope::Dimension(d) => d == dimension,
            GroupScope::AllDimensions => true,
        }
    }
}

#[derive(Debug)]
struct CachedGroups {
    computed_at: Timestamp,
    groups: Arc<Vec<ChunkGroup>>,
}

/// Owner/scope keyed cache of proximity groups
#[derive(Debug, Default)]
pub struct ProximityCache {
    config: ProximityConfig,
    entries: Mutex<HashMap<(OwnerId, GroupScope), CachedGroups>>,
}

impl ProximityCache {
    pub fn new(config: ProximityConfig) -> Self {
        ProximityCache {
            config,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &ProximityConfig {
        &self.config
    }

    /// Groups for `owner` within `scope`, recomputed from `claims` when stale.
    ///
    /// `claims` is only called on a miss; claims outside `scope` are ignored.
    pub fn groups_for(
        &self,
        owner: OwnerId,
        scope: GroupScope,
        now: Timestamp,
        claims: impl FnOnce() -> Vec<ChunkCoord>,
    ) -> Arc<Vec<ChunkGroup>> {
        let ttl = self.config.ttl;
        let key = (owner, scope);
        {
            let mut entries = self.entries.lock();
            entries.retain(|_, cached| elapsed(cached.computed_at, now) < ttl);
            if let Some(cached) = entries.get(&key) {
                return Arc::clone(&cached.groups);
            }
        }

        let scoped: Vec<ChunkCoord> = claims()
            .into_iter()
            .filter(|c| key.1.includes(&c.dimension))
            .collect();
        let groups = Arc::new(group_by_proximity(&scoped, self.config.radius));
        trace!(%owner, claims = scoped.len(), groups = groups.len(), "recomputed proximity groups");

        self.entries.lock().insert(
            key,
            CachedGroups {
                computed_at: now,
                groups: Arc::clone(&groups),
            },
        );
        groups
    }

    /// Drop cached groups of one owner, or of everyone
    pub fn invalidate(&self, owner: Option<OwnerId>) {
        let mut entries = self.entries.lock();
        match owner {
            Some(owner) => entries.retain(|(cached_owner, _), _| *cached_owner != owner),
            None => entries.clear(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use claimwatch_core::ChunkPos;
    use claimwatch_time::shift;
    use std::cell::Cell;
    use std::time::Duration;
    use uuid::Uuid;

    fn t0() -> Timestamp {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn at(ms: u64) -> Timestamp {
        shift(t0(), Duration::from_millis(ms))
    }

    fn owner() -> OwnerId {
        OwnerId::new(Uuid::from_u128(9))
    }

    fn claims() -> Vec<ChunkCoord> {
        vec![
            ChunkCoord::new(Dimension::overworld(), ChunkPos::new(0, 0)),
            ChunkCoord::new(Dimension::overworld(), ChunkPos::new(2, 0)),
            ChunkCoord::new(Dimension::nether(), ChunkPos::new(0, 0)),
        ]
    }

    #[test]
    fn test_reuse_within_ttl() {
        let cache = ProximityCache::default();
        let calls = Cell::new(0);
        let source = || {
            calls.set(calls.get() + 1);
            claims()
        };

        let first = cache.groups_for(owner(), GroupScope::AllDimensions, at(0), source);
        let second = cache.groups_for(owner(), GroupScope::AllDimensions, at(4_999), source);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(calls.get(), 1);

        cache.groups_for(owner(), GroupScope::AllDimensions, at(5_000), source);
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn test_scope_filters_claims() {
        let cache = ProximityCache::default();
        let nether = cache.groups_for(owner(), GroupScope::Dimension(Dimension::nether()), at(0), claims);
        assert_eq!(nether.len(), 1);
        assert_eq!(nether[0].dimension, Dimension::nether());

        let all = cache.groups_for(owner(), GroupScope::AllDimensions, at(0), claims);
        assert_eq!(all.len(), 2);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_invalidate_owner() {
        let cache = ProximityCache::default();
        cache.groups_for(owner(), GroupScope::AllDimensions, at(0), claims);
        cache.invalidate(Some(OwnerId::new(Uuid::from_u128(1))));
        assert_eq!(cache.len(), 1);
        cache.invalidate(Some(owner()));
        assert!(cache.is_empty());
    }
}
