//! Claimwatch Core - Fundamental types shared by every claimwatch crate
//!
//! This crate defines:
//! - Identifiers (Dimension, ChunkPos, ChunkKey, OwnerId)
//! - Change records and their classification
//! - Raw ownership events and motion samples delivered by the host
//! - Owner display-name resolution with placeholder fallback
//! - The error taxonomy

pub mod id;
pub mod record;
pub mod event;
pub mod owner;
pub mod error;

pub use id::*;
pub use record::*;
pub use event::*;
pub use owner::*;
pub use error::*;
