//! Sync window - decides when the initial bulk synchronization is over
//!
//! The window closes after a period of silence following the last received
//! event. When the silence passes the base window while the cache still
//! looks suspiciously empty, the window is stretched once.

use std::time::Duration;

use claimwatch_core::Timestamp;

use crate::elapsed;

/// Sync window configuration
#[derive(Clone, Debug)]
pub struct SyncWindowConfig {
    /// Silence after which the sync is considered complete
    pub base: Duration,
    /// Silence required instead once the window has been extended
    pub extended: Duration,
}

impl Default for SyncWindowConfig {
    fn default() -> Self {
        SyncWindowConfig {
            base: Duration::from_secs(10),
            extended: Duration::from_secs(20),
        }
    }
}

/// Result of evaluating the window at some instant
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WindowState {
    /// Still inside the window
    Open,
    /// The window was stretched during this evaluation
    Extended,
    /// Idle time exceeded the current window
    Elapsed,
}

/// Idle-time window for the initial sync
#[derive(Clone, Debug)]
pub struct SyncWindow {
    config: SyncWindowConfig,
    /// Time of the last received event (or of the reset)
    last_event: Timestamp,
    /// Currently required silence
    current: Duration,
    /// Events received since the reset
    events: u64,
}

impl SyncWindow {
    pub fn new(config: SyncWindowConfig, now: Timestamp) -> Self {
        let current = config.base;
        SyncWindow {
            config,
            last_event: now,
            current,
            events: 0,
        }
    }

    /// Restart the window from scratch
    pub fn reset(&mut self, now: Timestamp) {
        self.last_event = now;
        self.current = self.config.base;
        self.events = 0;
    }

    /// Note an incoming event; restarts the idle timer
    pub fn record_event(&mut self, now: Timestamp) {
        self.last_event = now;
        self.events += 1;
    }

    /// Silence since the last event
    pub fn idle(&self, now: Timestamp) -> Duration {
        elapsed(self.last_event, now)
    }

    pub fn current(&self) -> Duration {
        self.current
    }

    pub fn is_extended(&self) -> bool {
        self.current > self.config.base
    }

    pub fn events(&self) -> u64 {
        self.events
    }

    /// Whole seconds left before the window closes at the current length
    pub fn remaining_secs(&self, now: Timestamp) -> u64 {
        self.current.saturating_sub(self.idle(now)).as_secs()
    }

    /// Evaluate the window.
    ///
    /// `suspicious` is consulted only while the idle time sits between the
    /// base and extended lengths and the window has not been stretched yet.
    pub fn evaluate(&mut self, now: Timestamp, suspicious: impl FnOnce() -> bool) -> WindowState {
        let idle = self.idle(now);
        let mut state = WindowState::Open;

        if idle > self.config.base
            && idle < self.config.extended
            && !self.is_extended()
            && suspicious()
        {
            self.current = self.config.extended;
            state = WindowState::Extended;
        }

        if idle > self.current {
            WindowState::Elapsed
        } else {
            state
        }
    }
}
