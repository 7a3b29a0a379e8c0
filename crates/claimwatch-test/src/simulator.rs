//! Session simulator
//!
//! Drives a real `ClaimTracker` against a seeded random world. The simulator
//! keeps the authoritative ownership table itself, so tests can compare what
//! the tracker believes against what actually happened.

use std::collections::HashMap;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use claimwatch_core::{
    ChangeRecord, ChunkCoord, ChunkPos, ClaimEvent, ClaimResult, Dimension, MotionSample, OwnerId,
    Timestamp,
};
use claimwatch_runtime::{ClaimTracker, SyncReport, TrackerConfig};
use claimwatch_state::OwnershipSnapshot;
use claimwatch_store::{SessionFiles, SessionIdentity};
use claimwatch_time::ManualClock;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tempfile::TempDir;
use uuid::Uuid;

/// Simulated world parameters
#[derive(Clone, Debug)]
pub struct SimConfig {
    pub dimensions: Vec<Dimension>,
    pub owners: usize,
    /// Chunk coordinates are drawn from `-extent..extent` on both axes
    pub extent: i32,
    /// Claims placed before the first session
    pub initial_claims: usize,
    /// Probability that a random event unclaims rather than claims
    pub unclaim_prob: f64,
    pub seed: u64,
}

impl Default for SimConfig {
    fn default() -> Self {
        SimConfig {
            dimensions: vec![Dimension::overworld(), Dimension::nether(), Dimension::end()],
            owners: 6,
            extent: 24,
            initial_claims: 200,
            unclaim_prob: 0.3,
            seed: 42,
        }
    }
}

impl SimConfig {
    /// Small world for quick tests
    pub fn light() -> Self {
        SimConfig {
            dimensions: vec![Dimension::overworld(), Dimension::nether()],
            owners: 3,
            extent: 8,
            initial_claims: 40,
            unclaim_prob: 0.3,
            seed: 7,
        }
    }

    /// Large, crowded world
    pub fn heavy() -> Self {
        SimConfig {
            owners: 20,
            extent: 64,
            initial_claims: 4000,
            ..SimConfig::default()
        }
    }
}

/// Clock start for every simulation
pub fn epoch() -> Timestamp {
    NaiveDate::from_ymd_opt(2024, 6, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or_default()
}

/// Owner names the simulated host knows: every owner but the last
fn owner_name(owners: &[OwnerId], id: OwnerId) -> Option<String> {
    let idx = owners.iter().position(|o| *o == id)?;
    (idx + 1 < owners.len()).then(|| format!("Team {idx}"))
}

/// One steady-state event and what the tracker made of it
#[derive(Clone, Debug)]
pub struct StepOutcome {
    pub event: ClaimEvent,
    /// World owner before the event
    pub before: Option<OwnerId>,
    pub after: Option<OwnerId>,
    pub records: Vec<ChangeRecord>,
}

pub struct SessionSimulator {
    config: SimConfig,
    rng: StdRng,
    clock: ManualClock,
    dir: TempDir,
    tracker: Arc<ClaimTracker>,
    identity: SessionIdentity,
    owners: Vec<OwnerId>,
    world: HashMap<ChunkCoord, OwnerId>,
    player: MotionSample,
}

impl SessionSimulator {
    pub fn new(config: SimConfig) -> io::Result<Self> {
        let dir = tempfile::tempdir()?;
        let mut rng = StdRng::seed_from_u64(config.seed);
        let owners: Vec<OwnerId> = (0..config.owners.max(1))
            .map(|_| OwnerId::new(Uuid::from_u128(rng.gen::<u128>() | 1)))
            .collect();

        let clock = ManualClock::new(epoch());
        let names = {
            let owners = owners.clone();
            move |id: OwnerId| owner_name(&owners, id)
        };
        let tracker = Arc::new(ClaimTracker::new(
            TrackerConfig::with_base_dir(dir.path()),
            Arc::new(clock.clone()),
            Arc::new(names),
        ));
        let identity = SessionIdentity::new(
            Uuid::from_u128(rng.gen()),
            false,
            Some("sim.example.org".to_string()),
        );

        let mut sim = SessionSimulator {
            config,
            rng,
            clock,
            dir,
            tracker,
            identity,
            owners,
            world: HashMap::new(),
            player: MotionSample::new(0.0, 64.0, 0.0, 0.0, 0.0),
        };
        for _ in 0..sim.config.initial_claims {
            let coord = sim.random_coord();
            let owner = sim.random_owner();
            sim.world.insert(coord, owner);
        }
        Ok(sim)
    }

    pub fn tracker(&self) -> &Arc<ClaimTracker> {
        &self.tracker
    }

    pub fn clock(&self) -> &ManualClock {
        &self.clock
    }

    pub fn identity(&self) -> &SessionIdentity {
        &self.identity
    }

    pub fn owners(&self) -> &[OwnerId] {
        &self.owners
    }

    pub fn files(&self) -> SessionFiles {
        self.tracker.config().storage.files_for(&self.identity)
    }

    pub fn storage_dir(&self) -> &std::path::Path {
        self.dir.path()
    }

    /// Authoritative ownership table
    pub fn world(&self) -> OwnershipSnapshot {
        self.world
            .iter()
            .map(|(coord, owner)| (coord.dimension.clone(), coord.pos, *owner))
            .collect()
    }

    pub fn world_owner(&self, coord: &ChunkCoord) -> Option<OwnerId> {
        self.world.get(coord).copied()
    }

    pub fn random_coord(&mut self) -> ChunkCoord {
        let dims = &self.config.dimensions;
        let dimension = dims[self.rng.gen_range(0..dims.len())].clone();
        let extent = self.config.extent.max(1);
        let pos = ChunkPos::new(
            self.rng.gen_range(-extent..extent),
            self.rng.gen_range(-extent..extent),
        );
        ChunkCoord::new(dimension, pos)
    }

    pub fn random_owner(&mut self) -> OwnerId {
        self.owners[self.rng.gen_range(0..self.owners.len())]
    }

    /// A random claim or unclaim, already applied to the world
    pub fn random_event(&mut self) -> ClaimEvent {
        let coord = self.random_coord();
        self.random_event_at(coord)
    }

    fn random_event_at(&mut self, coord: ChunkCoord) -> ClaimEvent {
        if self.rng.gen_bool(self.config.unclaim_prob) {
            self.world.remove(&coord);
            ClaimEvent::unclaimed(coord.dimension, coord.pos)
        } else {
            let owner = self.random_owner();
            self.world.insert(coord.clone(), owner);
            ClaimEvent::claimed(coord.dimension, coord.pos, owner)
        }
    }

    /// The event that re-announces the world's current owner of `coord`
    pub fn replay_event(&self, coord: &ChunkCoord) -> ClaimEvent {
        match self.world.get(coord) {
            Some(owner) => ClaimEvent::claimed(coord.dimension.clone(), coord.pos, *owner),
            None => ClaimEvent::unclaimed(coord.dimension.clone(), coord.pos),
        }
    }

    /// Join and stream the whole world to the tracker, as the host does on connect
    pub fn join(&mut self) -> ClaimResult<()> {
        self.tracker.join(self.identity.clone());
        let mut coords: Vec<ChunkCoord> = self.world.keys().cloned().collect();
        coords.sort();
        for coord in coords {
            self.clock.advance(Duration::from_millis(2));
            self.tracker.on_chunk_update(self.replay_event(&coord))?;
        }
        Ok(())
    }

    /// Tick once a second until the initial sync completes
    pub fn finish_sync(&mut self) -> Option<SyncReport> {
        for _ in 0..60 {
            self.move_player();
            self.clock.advance(Duration::from_secs(1));
            if let Some(report) = self.tracker.tick() {
                return Some(report);
            }
        }
        None
    }

    /// Apply one random event while connected
    pub fn step(&mut self) -> ClaimResult<StepOutcome> {
        self.clock.advance(Duration::from_millis(50));
        let coord = self.random_coord();
        let before = self.world_owner(&coord);
        let event = self.random_event_at(coord);
        let records = self.tracker.on_chunk_update(event.clone())?;
        Ok(StepOutcome {
            after: event.owner.filter(|_| event.claimed),
            event,
            before,
            records,
        })
    }

    /// Change the world while disconnected
    pub fn offline_changes(&mut self, count: usize) {
        for _ in 0..count {
            self.random_event();
        }
    }

    pub fn leave(&mut self) -> Option<SessionIdentity> {
        self.tracker.leave()
    }

    /// Let wall time pass
    pub fn advance(&self, dt: Duration) {
        self.clock.advance(dt);
    }

    fn move_player(&mut self) {
        let dx = self.rng.gen_range(-2.0..2.0);
        let dz = self.rng.gen_range(-2.0..2.0);
        self.player = MotionSample::new(
            self.player.x + dx,
            self.player.y,
            self.player.z + dz,
            self.player.yaw,
            self.player.pitch,
        );
        self.tracker.observe_motion(self.player);
    }
}
