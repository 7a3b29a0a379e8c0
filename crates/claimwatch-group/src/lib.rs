//! Claimwatch Grouping
//!
//! Spatial grouping of chunk sets into connected components.
//!
//! Two adjacency rules share one iterative flood fill:
//! - Change batches: chunks touching on a side or corner (8-adjacency)
//! - Ownership overviews: chunks within a Chebyshev radius of each other
//!
//! Every group carries its exclusive block-coordinate bounds, the geometric
//! center of those bounds, and the add/remove tally of the changes it covers.
//! Groups are always ordered largest first.

pub mod group;
pub mod flood;
pub mod adjacency;
pub mod proximity;
pub mod cache;

pub use group::*;
pub use adjacency::*;
pub use proximity::*;
pub use cache::*;
