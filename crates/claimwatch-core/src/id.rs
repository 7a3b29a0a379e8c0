//! Identity types for claim tracking
//!
//! Chunks are addressed by a dimension plus integer (x, z). Inside the
//! storage layer a position is packed into a single 64-bit key; the packing
//! is an internal detail and never part of a file format.

use std::fmt;
use std::sync::Arc;

use uuid::Uuid;

/// Width of a chunk in block units
pub const BLOCKS_PER_CHUNK: i64 = 16;

/// Independently addressed coordinate space (e.g. `minecraft:overworld`)
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Dimension(Arc<str>);

impl Dimension {
    /// Create a dimension from an identifier, kept verbatim
    pub fn new(id: impl AsRef<str>) -> Self {
        Dimension(Arc::from(id.as_ref()))
    }

    /// Parse an identifier as read from disk.
    ///
    /// Identifiers are lowercased, and bare vanilla names gain their
    /// namespace so that `OVERWORLD` and `minecraft:overworld` address the
    /// same space.
    pub fn parse(id: &str) -> Option<Self> {
        let id = id.trim();
        if id.is_empty() || id.contains(',') || id.contains(char::is_whitespace) {
            return None;
        }
        let lower = id.to_ascii_lowercase();
        match lower.as_str() {
            "overworld" | "the_nether" | "the_end" => Some(Dimension::new(format!("minecraft:{lower}"))),
            _ => Some(Dimension::new(lower)),
        }
    }

    pub fn overworld() -> Self {
        Dimension::new("minecraft:overworld")
    }

    pub fn nether() -> Self {
        Dimension::new("minecraft:the_nether")
    }

    pub fn end() -> Self {
        Dimension::new("minecraft:the_end")
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Identifier without its namespace (`minecraft:the_end` -> `the_end`)
    pub fn path(&self) -> &str {
        self.0.rsplit_once(':').map(|(_, path)| path).unwrap_or(&self.0)
    }
}

impl fmt::Debug for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Dim({})", self.0)
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Chunk position within a dimension
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct ChunkPos {
    pub x: i32,
    pub z: i32,
}

impl ChunkPos {
    #[inline]
    pub const fn new(x: i32, z: i32) -> Self {
        ChunkPos { x, z }
    }

    #[inline]
    pub fn key(self) -> ChunkKey {
        ChunkKey::pack(self)
    }

    /// Chebyshev distance (max of the per-axis distances)
    #[inline]
    pub fn chebyshev(self, other: ChunkPos) -> u32 {
        let dx = (self.x as i64 - other.x as i64).unsigned_abs();
        let dz = (self.z as i64 - other.z as i64).unsigned_abs();
        dx.max(dz).min(u32::MAX as u64) as u32
    }

    /// Whether two positions touch orthogonally or diagonally
    #[inline]
    pub fn touches(self, other: ChunkPos) -> bool {
        self != other && self.chebyshev(other) <= 1
    }

    /// The eight surrounding positions, skipping any that would overflow
    pub fn neighbours(self) -> impl Iterator<Item = ChunkPos> {
        (-1i32..=1)
            .flat_map(|dx| (-1i32..=1).map(move |dz| (dx, dz)))
            .filter(|&(dx, dz)| dx != 0 || dz != 0)
            .filter_map(move |(dx, dz)| {
                Some(ChunkPos::new(self.x.checked_add(dx)?, self.z.checked_add(dz)?))
            })
    }

    /// Lowest block coordinate covered by this chunk
    #[inline]
    pub fn min_block(self) -> (i64, i64) {
        (self.x as i64 * BLOCKS_PER_CHUNK, self.z as i64 * BLOCKS_PER_CHUNK)
    }
}

impl fmt::Debug for ChunkPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Chunk({}, {})", self.x, self.z)
    }
}

impl fmt::Display for ChunkPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {}", self.x, self.z)
    }
}

/// Packed chunk position: x in the low 32 bits, z in the high 32 bits
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ChunkKey(u64);

impl ChunkKey {
    #[inline]
    pub fn pack(pos: ChunkPos) -> Self {
        ChunkKey((pos.x as u32 as u64) | ((pos.z as u32 as u64) << 32))
    }

    #[inline]
    pub fn unpack(self) -> ChunkPos {
        ChunkPos::new(self.0 as u32 as i32, (self.0 >> 32) as u32 as i32)
    }
}

impl From<ChunkPos> for ChunkKey {
    fn from(pos: ChunkPos) -> Self {
        ChunkKey::pack(pos)
    }
}

impl fmt::Debug for ChunkKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Key({:016x})", self.0)
    }
}

/// Fully qualified chunk address
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct ChunkCoord {
    pub dimension: Dimension,
    pub pos: ChunkPos,
}

impl ChunkCoord {
    pub fn new(dimension: Dimension, pos: ChunkPos) -> Self {
        ChunkCoord { dimension, pos }
    }
}

/// Identity holding a claim (an individual or a group)
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct OwnerId(pub Uuid);

impl OwnerId {
    pub const NIL: OwnerId = OwnerId(Uuid::nil());

    #[inline]
    pub fn new(id: Uuid) -> Self {
        OwnerId(id)
    }

    pub fn parse(s: &str) -> Option<Self> {
        Uuid::parse_str(s.trim()).ok().map(OwnerId)
    }

    #[inline]
    pub fn is_nil(self) -> bool {
        self.0.is_nil()
    }

    /// First eight hex digits, used as a deterministic placeholder name
    pub fn short(self) -> String {
        let mut text = self.0.hyphenated().to_string();
        text.truncate(8);
        text
    }
}

impl fmt::Debug for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Owner({})", self.short())
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_key_roundtrip_negative() {
        for pos in [
            ChunkPos::new(0, 0),
            ChunkPos::new(-1, 1),
            ChunkPos::new(i32::MIN, i32::MAX),
            ChunkPos::new(123_456, -654_321),
        ] {
            assert_eq!(pos.key().unpack(), pos);
        }
    }

    #[test]
    fn test_chunk_key_distinct_axes() {
        assert_ne!(ChunkPos::new(1, 0).key(), ChunkPos::new(0, 1).key());
    }

    #[test]
    fn test_dimension_parse_normalises_vanilla() {
        assert_eq!(Dimension::parse("overworld"), Some(Dimension::overworld()));
        assert_eq!(Dimension::parse("THE_END"), Some(Dimension::end()));
        assert_eq!(
            Dimension::parse("mymod:mining"),
            Some(Dimension::new("mymod:mining"))
        );
        assert_eq!(Dimension::parse(""), None);
        assert_eq!(Dimension::parse("a,b"), None);
        assert_eq!(Dimension::nether().path(), "the_nether");
    }

    #[test]
    fn test_dimension_parse_lowercases_namespaced() {
        assert_eq!(Dimension::parse("MINECRAFT:OVERWORLD"), Some(Dimension::overworld()));
        assert_eq!(
            Dimension::parse(" MyMod:Mining "),
            Some(Dimension::new("mymod:mining"))
        );
    }

    #[test]
    fn test_neighbours_and_distance() {
        let origin = ChunkPos::new(0, 0);
        let around: Vec<_> = origin.neighbours().collect();
        assert_eq!(around.len(), 8);
        assert!(around.iter().all(|p| origin.touches(*p)));
        assert!(!origin.touches(ChunkPos::new(2, 0)));
        assert_eq!(origin.chebyshev(ChunkPos::new(-3, 5)), 5);

        let edge = ChunkPos::new(i32::MAX, 0);
        assert_eq!(edge.neighbours().count(), 5);
    }

    #[test]
    fn test_owner_short() {
        let owner = OwnerId::parse("1234abcd-0000-0000-0000-000000000000").unwrap();
        assert_eq!(owner.short(), "1234abcd");
        assert!(OwnerId::NIL.is_nil());
    }
}
