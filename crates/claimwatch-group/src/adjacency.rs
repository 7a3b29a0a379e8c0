//! Change-batch grouping (8-adjacency)
//!
//! Each touched chunk contributes one classified member no matter how many
//! records reference it. BASELINE records are not changes and are ignored.

use std::collections::HashMap;

use claimwatch_core::{ChangeCount, ChangeRecord, ChunkKey, ChunkPos, Dimension};

use crate::flood::connected_components;
use crate::group::sort_largest_first;
use crate::{ChangeClass, ChunkGroup, GroupMember};

/// Touched chunks of one dimension, in first-touch order
#[derive(Clone, Debug, Default)]
pub struct ClassifiedChunks {
    order: Vec<ChunkPos>,
    classes: HashMap<ChunkKey, ChangeClass>,
    counts: HashMap<ChunkKey, ChangeCount>,
}

impl ClassifiedChunks {
    fn touch(&mut self, record: &ChangeRecord) {
        let Some(class) = ChangeClass::of(record.change) else {
            return;
        };
        let key = record.pos.key();
        match self.classes.get_mut(&key) {
            Some(existing) => *existing = existing.merge(class),
            None => {
                self.classes.insert(key, class);
                self.order.push(record.pos);
            }
        }
        self.counts.entry(key).or_default().record(record.change);
    }

    pub fn class_of(&self, pos: ChunkPos) -> Option<ChangeClass> {
        self.classes.get(&pos.key()).copied()
    }

    pub fn positions(&self) -> &[ChunkPos] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// Classify a batch per dimension, dimensions in first-seen order
pub fn classify(records: &[ChangeRecord]) -> Vec<(Dimension, ClassifiedChunks)> {
    let mut by_dimension: Vec<(Dimension, ClassifiedChunks)> = Vec::new();
    for record in records {
        if ChangeClass::of(record.change).is_none() {
            continue;
        }
        let index = match by_dimension.iter().position(|(d, _)| *d == record.dimension) {
            Some(index) => index,
            None => {
                by_dimension.push((record.dimension.clone(), ClassifiedChunks::default()));
                by_dimension.len() - 1
            }
        };
        by_dimension[index].1.touch(record);
    }
    by_dimension
}

/// Group one change batch into 8-connected groups, largest first
pub fn group_changes(records: &[ChangeRecord]) -> Vec<ChunkGroup> {
    let mut groups = Vec::new();

    for (dimension, chunks) in classify(records) {
        let components = connected_components(chunks.positions(), |pos| pos.neighbours().collect());
        for component in components {
            let mut counts = ChangeCount::default();
            let members = component
                .into_iter()
                .map(|pos| {
                    if let Some(c) = chunks.counts.get(&pos.key()) {
                        counts.added += c.added;
                        counts.removed += c.removed;
                    }
                    GroupMember {
                        pos,
                        class: chunks.class_of(pos),
                    }
                })
                .collect();
            groups.extend(ChunkGroup::new(dimension.clone(), members, counts));
        }
    }

    sort_largest_first(&mut groups);
    groups
}
