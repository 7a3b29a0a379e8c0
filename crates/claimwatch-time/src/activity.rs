//! Activity monitor - AFK detection from sampled player motion
//!
//! While the player is active, samples closer together than the sampling
//! interval are ignored. Once AFK, every sample is evaluated so that a single
//! qualifying movement clears the state immediately.

use std::time::Duration;

use claimwatch_core::{MotionSample, Timestamp};
use tracing::debug;

use crate::elapsed;

/// Activity monitor configuration
#[derive(Clone, Debug)]
pub struct ActivityConfig {
    /// Minimum spacing between evaluated samples
    pub sample_interval: Duration,
    /// Continuous inactivity before the player counts as AFK
    pub afk_threshold: Duration,
    /// Per-axis positional change that counts as activity
    pub movement_threshold: f64,
    /// Yaw or pitch change (degrees) that counts as activity
    pub rotation_threshold: f32,
}

impl Default for ActivityConfig {
    fn default() -> Self {
        ActivityConfig {
            sample_interval: Duration::from_secs(5),
            afk_threshold: Duration::from_secs(15 * 60),
            movement_threshold: 0.1,
            rotation_threshold: 0.5,
        }
    }
}

/// AFK state transition
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AfkChange {
    WentAfk,
    Resumed,
}

/// Tracks player activity and derives the AFK flag
#[derive(Clone, Debug)]
pub struct ActivityMonitor {
    config: ActivityConfig,
    /// Last evaluated sample
    last_sample: Option<MotionSample>,
    /// When the last sample was evaluated
    last_evaluated: Option<Timestamp>,
    /// Last qualifying movement (or reset)
    last_activity: Timestamp,
    afk: bool,
}

impl ActivityMonitor {
    pub fn new(config: ActivityConfig, now: Timestamp) -> Self {
        ActivityMonitor {
            config,
            last_sample: None,
            last_evaluated: None,
            last_activity: now,
            afk: false,
        }
    }

    /// Forget all motion history; the player counts as active from `now`
    pub fn reset(&mut self, now: Timestamp) {
        self.last_sample = None;
        self.last_evaluated = None;
        self.last_activity = now;
        self.afk = false;
    }

    #[inline]
    pub fn is_afk(&self) -> bool {
        self.afk
    }

    /// Time since the last qualifying movement
    pub fn inactive_for(&self, now: Timestamp) -> Duration {
        elapsed(self.last_activity, now)
    }

    fn qualifies(&self, sample: &MotionSample) -> bool {
        match &self.last_sample {
            Some(previous) => {
                sample.moved_from(previous) >= self.config.movement_threshold
                    || sample.turned_from(previous) >= self.config.rotation_threshold
            }
            None => false,
        }
    }

    /// Feed a motion sample
    pub fn observe(&mut self, sample: MotionSample, now: Timestamp) -> Option<AfkChange> {
        if !self.afk {
            if let Some(at) = self.last_evaluated {
                if elapsed(at, now) < self.config.sample_interval {
                    return None;
                }
            }
        }
        self.last_evaluated = Some(now);

        let active = self.qualifies(&sample);
        self.last_sample = Some(sample);

        if active {
            self.last_activity = now;
            if self.afk {
                self.afk = false;
                debug!("player activity resumed");
                return Some(AfkChange::Resumed);
            }
            return None;
        }

        self.poll(now)
    }

    /// Re-check the inactivity threshold without a new sample.
    ///
    /// Nothing happens until at least one sample has been seen.
    pub fn poll(&mut self, now: Timestamp) -> Option<AfkChange> {
        if self.afk || self.last_sample.is_none() {
            return None;
        }
        if self.inactive_for(now) > self.config.afk_threshold {
            self.afk = true;
            debug!(inactive_secs = self.inactive_for(now).as_secs(), "player is AFK");
            return Some(AfkChange::WentAfk);
        }
        None
    }
}
