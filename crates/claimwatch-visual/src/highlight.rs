//! Highlight decay store

use std::collections::HashMap;
use std::time::Duration;

use claimwatch_core::{ChunkKey, ChunkPos, Dimension, Timestamp};
use claimwatch_group::{ChangeClass, ChunkGroup};
use claimwatch_time::elapsed;
use dashmap::DashMap;
use tracing::trace;

/// RGB of added chunks (green)
pub const ADD_RGB: u32 = 0x40FF40;
/// RGB of removed chunks (red)
pub const REMOVE_RGB: u32 = 0xFF4040;
/// RGB of chunks both added and removed (neutral gray)
pub const BOTH_RGB: u32 = 0xA0A0A0;

/// Highlight configuration
#[derive(Clone, Debug)]
pub struct HighlightConfig {
    /// Time for a highlight to fade from peak to nothing
    pub fade: Duration,
    /// Opacity at creation
    pub peak_alpha: f32,
}

impl Default for HighlightConfig {
    fn default() -> Self {
        HighlightConfig {
            fade: Duration::from_secs(10),
            peak_alpha: 0.6,
        }
    }
}

/// Marker on one recently changed chunk
#[derive(Clone, Debug, PartialEq)]
pub struct Highlight {
    pub dimension: Dimension,
    pub pos: ChunkPos,
    pub created_at: Timestamp,
    pub class: ChangeClass,
    fade: Duration,
    peak_alpha: f32,
}

impl Highlight {
    pub fn new(
        dimension: Dimension,
        pos: ChunkPos,
        class: ChangeClass,
        created_at: Timestamp,
        config: &HighlightConfig,
    ) -> Self {
        Highlight {
            dimension,
            pos,
            created_at,
            class,
            fade: config.fade,
            peak_alpha: config.peak_alpha,
        }
    }

    /// Fade progress in `[0, 1]`
    fn progress(&self, now: Timestamp) -> f32 {
        if self.fade.is_zero() {
            return 1.0;
        }
        let ratio = elapsed(self.created_at, now).as_secs_f64() / self.fade.as_secs_f64();
        ratio.min(1.0) as f32
    }

    /// Opacity at `now`: peak at creation, falling linearly to zero at the fade time
    pub fn alpha(&self, now: Timestamp) -> f32 {
        if self.is_expired(now) {
            return 0.0;
        }
        self.peak_alpha * (1.0 - self.progress(now))
    }

    pub fn is_expired(&self, now: Timestamp) -> bool {
        elapsed(self.created_at, now) >= self.fade
    }

    pub fn rgb(&self) -> u32 {
        match self.class {
            ChangeClass::Add => ADD_RGB,
            ChangeClass::Remove => REMOVE_RGB,
            ChangeClass::Both => BOTH_RGB,
        }
    }

    /// ARGB colour with the alpha byte taken from `alpha(now)`
    pub fn color(&self, now: Timestamp) -> u32 {
        let alpha = (self.alpha(now).clamp(0.0, 1.0) * 255.0).round() as u32;
        (alpha << 24) | self.rgb()
    }
}

/// Highlight table, readable while the event path writes to it
#[derive(Debug, Default)]
pub struct HighlightDecay {
    config: HighlightConfig,
    dimensions: DashMap<Dimension, HashMap<ChunkKey, Highlight>>,
}

impl HighlightDecay {
    pub fn new(config: HighlightConfig) -> Self {
        HighlightDecay {
            config,
            dimensions: DashMap::new(),
        }
    }

    pub fn config(&self) -> &HighlightConfig {
        &self.config
    }

    /// Mark every classified member of `group`, replacing existing markers
    pub fn highlight_group(&self, group: &ChunkGroup, now: Timestamp) {
        let mut table = self.dimensions.entry(group.dimension.clone()).or_default();
        for member in &group.members {
            let Some(class) = member.class else {
                continue;
            };
            table.insert(
                member.pos.key(),
                Highlight::new(group.dimension.clone(), member.pos, class, now, &self.config),
            );
        }
    }

    pub fn highlight_groups(&self, groups: &[ChunkGroup], now: Timestamp) {
        for group in groups {
            self.highlight_group(group, now);
        }
    }

    /// Live highlights of one dimension, sorted by position.
    ///
    /// Expired entries of that dimension are removed as a side effect.
    pub fn active(&self, dimension: &Dimension, now: Timestamp) -> Vec<Highlight> {
        let Some(mut table) = self.dimensions.get_mut(dimension) else {
            return Vec::new();
        };
        table.retain(|_, h| !h.is_expired(now));
        let mut live: Vec<Highlight> = table.values().cloned().collect();
        live.sort_by_key(|h| h.pos);
        live
    }

    /// Drop every expired highlight. Returns how many were removed.
    pub fn purge(&self, now: Timestamp) -> usize {
        let mut removed = 0;
        for mut table in self.dimensions.iter_mut() {
            let before = table.len();
            table.retain(|_, h| !h.is_expired(now));
            removed += before - table.len();
        }
        self.dimensions.retain(|_, table| !table.is_empty());
        if removed > 0 {
            trace!(removed, "purged expired highlights");
        }
        removed
    }

    pub fn has_active(&self, now: Timestamp) -> bool {
        self.purge(now);
        !self.dimensions.is_empty()
    }

    /// Dimensions with live highlights and their counts, sorted by dimension
    pub fn active_dimensions(&self, now: Timestamp) -> Vec<(Dimension, usize)> {
        self.purge(now);
        let mut dims: Vec<_> = self
            .dimensions
            .iter()
            .map(|table| (table.key().clone(), table.len()))
            .collect();
        dims.sort_by(|a, b| a.0.cmp(&b.0));
        dims
    }

    /// Number of stored highlights, expired or not
    pub fn len(&self) -> usize {
        self.dimensions.iter().map(|table| table.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.dimensions.clear();
    }
}
