//! Group value types

use claimwatch_core::{ChangeCount, ChangeType, ChunkPos, Dimension, BLOCKS_PER_CHUNK};

/// Per-chunk classification within one change batch
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChangeClass {
    Add,
    Remove,
    /// The batch both added and removed this chunk
    Both,
}

impl ChangeClass {
    /// Class of a single record; BASELINE has none
    pub fn of(change: ChangeType) -> Option<Self> {
        match change {
            ChangeType::Add => Some(ChangeClass::Add),
            ChangeType::Remove => Some(ChangeClass::Remove),
            ChangeType::Baseline => None,
        }
    }

    pub fn merge(self, other: ChangeClass) -> ChangeClass {
        if self == other {
            self
        } else {
            ChangeClass::Both
        }
    }
}

/// One chunk of a group
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GroupMember {
    pub pos: ChunkPos,
    /// Set for change-batch groups, `None` for ownership groups
    pub class: Option<ChangeClass>,
}

/// Block-coordinate bounding box, max edges exclusive
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockBounds {
    pub min_x: i64,
    pub min_z: i64,
    pub max_x: i64,
    pub max_z: i64,
}

impl BlockBounds {
    /// Bounds covering every given chunk; `None` for an empty set
    pub fn of_chunks(chunks: impl IntoIterator<Item = ChunkPos>) -> Option<Self> {
        let mut chunks = chunks.into_iter();
        let first = chunks.next()?;
        let (mut min_x, mut max_x, mut min_z, mut max_z) = (first.x, first.x, first.z, first.z);
        for pos in chunks {
            min_x = min_x.min(pos.x);
            max_x = max_x.max(pos.x);
            min_z = min_z.min(pos.z);
            max_z = max_z.max(pos.z);
        }
        Some(BlockBounds {
            min_x: i64::from(min_x) * BLOCKS_PER_CHUNK,
            min_z: i64::from(min_z) * BLOCKS_PER_CHUNK,
            max_x: (i64::from(max_x) + 1) * BLOCKS_PER_CHUNK,
            max_z: (i64::from(max_z) + 1) * BLOCKS_PER_CHUNK,
        })
    }

    /// Geometric center in block units
    pub fn center(&self) -> (i64, i64) {
        ((self.min_x + self.max_x) / 2, (self.min_z + self.max_z) / 2)
    }

    pub fn width(&self) -> i64 {
        self.max_x - self.min_x
    }

    pub fn depth(&self) -> i64 {
        self.max_z - self.min_z
    }
}

/// Connected set of chunks in one dimension
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChunkGroup {
    pub dimension: Dimension,
    pub members: Vec<GroupMember>,
    pub bounds: BlockBounds,
    /// Center of `bounds` in block units
    pub center: (i64, i64),
    /// ADD/REMOVE records covered by this group (zero for ownership groups)
    pub counts: ChangeCount,
}

impl ChunkGroup {
    /// Build a group; `None` when `members` is empty
    pub fn new(dimension: Dimension, members: Vec<GroupMember>, counts: ChangeCount) -> Option<Self> {
        let bounds = BlockBounds::of_chunks(members.iter().map(|m| m.pos))?;
        Some(ChunkGroup {
            dimension,
            center: bounds.center(),
            bounds,
            members,
            counts,
        })
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn positions(&self) -> impl Iterator<Item = ChunkPos> + '_ {
        self.members.iter().map(|m| m.pos)
    }

    pub fn contains(&self, pos: ChunkPos) -> bool {
        self.members.iter().any(|m| m.pos == pos)
    }

    /// Chunk holding the center block
    pub fn center_chunk(&self) -> ChunkPos {
        let (x, z) = self.center;
        ChunkPos::new(
            x.div_euclid(BLOCKS_PER_CHUNK) as i32,
            z.div_euclid(BLOCKS_PER_CHUNK) as i32,
        )
    }
}

/// Largest groups first; equal sizes keep their discovery order
pub(crate) fn sort_largest_first(groups: &mut [ChunkGroup]) {
    groups.sort_by(|a, b| b.len().cmp(&a.len()));
}
