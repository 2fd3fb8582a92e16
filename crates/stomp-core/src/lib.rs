//! Stomp Core Library
//!
//! Deterministic tile/entity collision and interaction core for a lockstep
//! networked platformer. Fixed-point math throughout, no wall clock, no
//! unordered iteration: every peer stepping the same inputs computes
//! bit-identical state.

#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::module_name_repetitions)]

pub mod body;
pub mod contacts;
pub mod entities;
pub mod events;
pub mod fp;
pub mod interact;
pub mod resolver;
pub mod sync;
pub mod tiles;
pub mod world;

pub use body::PhysicsBody;
pub use contacts::{
    ContactLedger, InteractionDirection, OBJECT_CONTACT_CAPACITY, ObjectContact,
    TILE_CONTACT_CAPACITY, TileContact,
};
pub use entities::{
    Behavior, Collectible, CollectibleKind, CollectibleState, Entity, EntityCore, EntityId,
    Interactable, PlayerState, PowerState, Powerup, PowerupSpawnMode, ShellEnemy, ShellState,
    TickContext, TickTimer,
};
pub use events::{GameEvent, SimEvents, TileSignal};
pub use fp::{Aabb, Fp, FpVec2, fp, fp_ratio, fp_sqrt, unwrap_x};
pub use sync::{SnapshotError, SyncSnapshot};
pub use tiles::{StageDef, StageError, StageGrid, TileCoordinate, TileInstance, TileKind};
pub use world::{GameWorld, TICK_RATE, tick_dt};
