//! Iterative flood fill over a sparse position set

use std::collections::{HashSet, VecDeque};

use claimwatch_core::{ChunkKey, ChunkPos};

/// Connected components of `positions`.
///
/// `candidates` yields positions that may be adjacent to the given one;
/// only candidates present in `positions` are followed. Components are
/// returned in seed order, members in breadth-first order. Duplicate input
/// positions are collapsed.
pub fn connected_components<F>(positions: &[ChunkPos], mut candidates: F) -> Vec<Vec<ChunkPos>>
where
    F: FnMut(ChunkPos) -> Vec<ChunkPos>,
{
    let known: HashSet<ChunkKey> = positions.iter().map(|p| p.key()).collect();
    let mut visited: HashSet<ChunkKey> = HashSet::with_capacity(known.len());
    let mut queue = VecDeque::new();
    let mut components = Vec::new();

    for &seed in positions {
        if !visited.insert(seed.key()) {
            continue;
        }
        let mut component = Vec::new();
        queue.push_back(seed);

        while let Some(pos) = queue.pop_front() {
            component.push(pos);
            for next in candidates(pos) {
                let key = next.key();
                if known.contains(&key) && visited.insert(key) {
                    queue.push_back(next);
                }
            }
        }
        components.push(component);
    }

    components
}
