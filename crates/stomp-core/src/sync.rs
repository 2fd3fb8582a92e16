//! Full-state snapshots for rollback, resimulation, and late join.
//!
//! A snapshot carries everything `step` reads, including the RNG with its
//! stream position, so a restored world replays the exact same future. No
//! hidden accumulators live outside it.

use serde::{Deserialize, Serialize};

use crate::world::GameWorld;

/// Snapshot encode/decode failure.
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("snapshot encode failed: {0}")]
    Encode(postcard::Error),
    #[error("snapshot decode failed: {0}")]
    Decode(postcard::Error),
}

/// A compact, serializable copy of the whole simulation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSnapshot {
    world: GameWorld,
}

impl SyncSnapshot {
    pub fn capture(world: &GameWorld) -> Self {
        Self {
            world: world.clone(),
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, SnapshotError> {
        postcard::to_allocvec(self).map_err(SnapshotError::Encode)
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self, SnapshotError> {
        postcard::from_bytes(data).map_err(SnapshotError::Decode)
    }

    pub fn tick(&self) -> u64 {
        self.world.tick()
    }

    pub fn compute_hash(&self) -> u64 {
        self.world.compute_hash()
    }

    pub fn into_world(self) -> GameWorld {
        self.world
    }
}

impl GameWorld {
    /// Captures a snapshot of the current state.
    pub fn create_snapshot(&self) -> SyncSnapshot {
        SyncSnapshot::capture(self)
    }

    /// Replaces the current state with a snapshot's.
    pub fn restore_from_snapshot(&mut self, snapshot: SyncSnapshot) {
        *self = snapshot.into_world();
    }
}
