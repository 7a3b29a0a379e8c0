//! Presentation directory
//!
//! Read-only queries for a UI refresh loop. Everything returned is a copy;
//! nothing here mutates ownership state.

use std::collections::HashMap;
use std::sync::Arc;

use claimwatch_core::{display_name, ChunkCoord, Dimension, OwnerId};
use claimwatch_group::{group_changes, ChunkGroup, GroupScope, ProximityCache};
use claimwatch_store::{group_by_owner, HistoryWindow, OwnerHistory};
use tracing::debug;

use crate::ClaimTracker;

/// Host bulk enumeration of every known claim.
///
/// Used when the tracker cache is empty, e.g. before a session has synced.
pub trait ClaimSource: Send + Sync {
    fn all_claims(&self) -> Vec<(ChunkCoord, OwnerId)>;
}

impl<F> ClaimSource for F
where
    F: Fn() -> Vec<(ChunkCoord, OwnerId)> + Send + Sync,
{
    fn all_claims(&self) -> Vec<(ChunkCoord, OwnerId)> {
        self()
    }
}

/// One owner and the chunks they hold
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OwnerClaims {
    pub owner: OwnerId,
    pub display_name: String,
    pub claims: Vec<ChunkCoord>,
}

impl OwnerClaims {
    pub fn len(&self) -> usize {
        self.claims.len()
    }

    pub fn is_empty(&self) -> bool {
        self.claims.is_empty()
    }
}

pub struct ClaimDirectory {
    tracker: Arc<ClaimTracker>,
    source: Option<Arc<dyn ClaimSource>>,
    proximity: ProximityCache,
}

impl ClaimDirectory {
    pub fn new(tracker: Arc<ClaimTracker>) -> Self {
        let proximity = ProximityCache::new(tracker.config().proximity.clone());
        ClaimDirectory {
            tracker,
            source: None,
            proximity,
        }
    }

    pub fn with_source(mut self, source: Arc<dyn ClaimSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// Claims per owner, each list sorted
    fn all_claims(&self) -> HashMap<OwnerId, Vec<ChunkCoord>> {
        let mut by_owner = self.tracker.claims_by_owner();
        if by_owner.is_empty() {
            if let Some(source) = &self.source {
                for (coord, owner) in source.all_claims() {
                    if !owner.is_nil() {
                        by_owner.entry(owner).or_default().push(coord);
                    }
                }
                debug!(owners = by_owner.len(), "listing claims from host enumeration");
            }
        }
        for claims in by_owner.values_mut() {
            claims.sort();
        }
        by_owner
    }

    /// Owners with at least one claim, most claims first.
    ///
    /// With `dimension` set only claims in that dimension count.
    pub fn owners(&self, dimension: Option<&Dimension>) -> Vec<OwnerClaims> {
        let names = self.tracker.names();
        let mut owners: Vec<OwnerClaims> = self
            .all_claims()
            .into_iter()
            .filter_map(|(owner, mut claims)| {
                if let Some(dim) = dimension {
                    claims.retain(|c| &c.dimension == dim);
                }
                (!claims.is_empty()).then(|| OwnerClaims {
                    owner,
                    display_name: display_name(names, Some(owner)),
                    claims,
                })
            })
            .collect();

        owners.sort_by(|a, b| {
            b.len()
                .cmp(&a.len())
                .then_with(|| a.display_name.cmp(&b.display_name))
                .then_with(|| a.owner.cmp(&b.owner))
        });
        owners
    }

    pub fn claims_of(&self, owner: OwnerId, scope: &GroupScope) -> Vec<ChunkCoord> {
        self.all_claims()
            .remove(&owner)
            .unwrap_or_default()
            .into_iter()
            .filter(|c| scope.includes(&c.dimension))
            .collect()
    }

    /// Proximity groups of one owner's claims, reused for the cache TTL
    pub fn groups_for(&self, owner: OwnerId, scope: GroupScope) -> Arc<Vec<ChunkGroup>> {
        let now = self.tracker.now();
        let all = GroupScope::AllDimensions;
        self.proximity
            .groups_for(owner, scope, now, || self.claims_of(owner, &all))
    }

    /// Change batches of the active session within `window`
    pub fn change_groups(&self, window: HistoryWindow) -> Vec<ChunkGroup> {
        let Some(log) = self.tracker.change_log() else {
            return Vec::new();
        };
        group_changes(&log.records_within(window, self.tracker.now()))
    }

    pub fn owner_histories(&self, window: HistoryWindow) -> Vec<OwnerHistory> {
        let Some(log) = self.tracker.change_log() else {
            return Vec::new();
        };
        group_by_owner(&log.records_within(window, self.tracker.now()))
    }

    /// Start decaying highlights for one change batch
    pub fn highlight_group(&self, group: &ChunkGroup) {
        self.tracker
            .highlights()
            .highlight_group(group, self.tracker.now());
    }

    /// Forget cached proximity groups
    pub fn refresh(&self) {
        self.proximity.invalidate(None);
    }
}
