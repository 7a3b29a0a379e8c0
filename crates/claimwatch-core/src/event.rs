//! Inputs delivered by the host: ownership updates and player motion

use crate::{ChunkCoord, ChunkPos, ClaimError, ClaimResult, Dimension, OwnerId};

/// Raw ownership update for one chunk
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClaimEvent {
    pub dimension: Dimension,
    pub pos: ChunkPos,
    pub claimed: bool,
    pub owner: Option<OwnerId>,
}

impl ClaimEvent {
    pub fn claimed(dimension: Dimension, pos: ChunkPos, owner: OwnerId) -> Self {
        ClaimEvent {
            dimension,
            pos,
            claimed: true,
            owner: Some(owner),
        }
    }

    pub fn unclaimed(dimension: Dimension, pos: ChunkPos) -> Self {
        ClaimEvent {
            dimension,
            pos,
            claimed: false,
            owner: None,
        }
    }

    /// Owner the chunk holds after this event, `None` when unclaimed.
    ///
    /// A claim without a usable owner id cannot be stored and is rejected.
    pub fn resulting_owner(&self) -> ClaimResult<Option<OwnerId>> {
        if !self.claimed {
            return Ok(None);
        }
        match self.owner {
            Some(owner) if !owner.is_nil() => Ok(Some(owner)),
            _ => Err(ClaimError::InvalidEvent(format!(
                "claim at {} {} carries no owner",
                self.dimension, self.pos
            ))),
        }
    }

    pub fn coord(&self) -> ChunkCoord {
        ChunkCoord::new(self.dimension.clone(), self.pos)
    }
}

/// Player position and orientation used for AFK evaluation
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct MotionSample {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub yaw: f32,
    pub pitch: f32,
}

impl MotionSample {
    pub fn new(x: f64, y: f64, z: f64, yaw: f32, pitch: f32) -> Self {
        MotionSample { x, y, z, yaw, pitch }
    }

    /// Largest per-axis positional delta
    pub fn moved_from(&self, other: &MotionSample) -> f64 {
        (self.x - other.x)
            .abs()
            .max((self.y - other.y).abs())
            .max((self.z - other.z).abs())
    }

    /// Largest rotational delta in degrees
    pub fn turned_from(&self, other: &MotionSample) -> f32 {
        (self.yaw - other.yaw).abs().max((self.pitch - other.pitch).abs())
    }
}
