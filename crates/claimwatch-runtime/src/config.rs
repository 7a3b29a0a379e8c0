//! Tracker configuration
//!
//! The host builds this; nothing here is read from disk.

use std::path::PathBuf;
use std::time::Duration;

use claimwatch_group::ProximityConfig;
use claimwatch_state::SafetyThresholds;
use claimwatch_store::{StorageLayout, RETENTION};
use claimwatch_time::{ActivityConfig, SyncWindowConfig};
use claimwatch_visual::HighlightConfig;

/// Complete tracker configuration
#[derive(Clone, Debug)]
pub struct TrackerConfig {
    /// When false, joining a session does not start tracking
    pub tracking_enabled: bool,
    pub storage: StorageLayout,
    /// Change records older than this are pruned on load
    pub retention: Duration,
    pub sync_window: SyncWindowConfig,
    pub activity: ActivityConfig,
    pub safety: SafetyThresholds,
    pub highlight: HighlightConfig,
    pub proximity: ProximityConfig,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        TrackerConfig {
            tracking_enabled: true,
            storage: StorageLayout::default(),
            retention: RETENTION,
            sync_window: SyncWindowConfig::default(),
            activity: ActivityConfig::default(),
            safety: SafetyThresholds::default(),
            highlight: HighlightConfig::default(),
            proximity: ProximityConfig::default(),
        }
    }
}

impl TrackerConfig {
    /// Default configuration storing session files under `dir`
    pub fn with_base_dir(dir: impl Into<PathBuf>) -> Self {
        TrackerConfig {
            storage: StorageLayout::new(dir),
            ..TrackerConfig::default()
        }
    }

    pub fn tracking(mut self, enabled: bool) -> Self {
        self.tracking_enabled = enabled;
        self
    }
}
