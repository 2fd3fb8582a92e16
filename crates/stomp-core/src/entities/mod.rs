//! Entity storage and the interaction capability.
//!
//! Concrete behaviors (shelled enemy, collectible, powerup) implement the
//! [`Interactable`] capability; the [`Behavior`] enum is the kind tag the
//! dispatcher selects the handler through. Behavioral state only ever
//! changes through dispatched calls — entities never poll each other.

pub mod collectible;
pub mod player;
pub mod powerup;
pub mod shell;

use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::body::PhysicsBody;
use crate::contacts::InteractionDirection;
use crate::events::{GameEvent, SimEvents};
use crate::fp::FpVec2;
use crate::tiles::{StageGrid, TileCoordinate};

pub use collectible::{Collectible, CollectibleKind, CollectibleState};
pub use player::{PlayerState, PowerState};
pub use powerup::{Powerup, PowerupSpawnMode};
pub use shell::{ShellEnemy, ShellState};

/// Stable entity identifier; also the canonical ordering key.
pub type EntityId = u32;

/// Tick-stamped timer. Stored as an absolute expiry tick so it survives
/// rollback and resimulation, unlike a boolean latch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash, Serialize, Deserialize)]
pub struct TickTimer {
    expires_at: Option<u64>,
}

impl TickTimer {
    pub const NONE: TickTimer = TickTimer { expires_at: None };

    pub fn from_delay(now: u64, delay: u64) -> Self {
        Self {
            expires_at: Some(now + delay),
        }
    }

    pub fn is_running(&self, now: u64) -> bool {
        self.expires_at.is_some_and(|t| t > now)
    }

    pub fn expired_or_not_running(&self, now: u64) -> bool {
        !self.is_running(now)
    }
}

/// Mutable per-tick context threaded through behavior updates and
/// interaction handlers.
pub struct TickContext<'a> {
    pub tick: u64,
    pub stage: &'a mut StageGrid,
    pub events: &'a mut SimEvents,
    pub rng: &'a mut ChaCha8Rng,
    /// Start-of-phase position snapshot, id-ordered; read-only reference
    /// for behaviors that follow another entity.
    pub positions: &'a [(EntityId, FpVec2)],
}

impl TickContext<'_> {
    pub fn position_of(&self, id: EntityId) -> Option<FpVec2> {
        self.positions
            .binary_search_by_key(&id, |(e, _)| *e)
            .ok()
            .map(|i| self.positions[i].1)
    }
}

/// Identity, body, and lifecycle of an entity — everything except its
/// behavioral state. Split out so a handler can borrow its own core
/// mutably alongside its behavior.
#[derive(Debug, Clone, Hash, Serialize, Deserialize)]
pub struct EntityCore {
    pub id: EntityId,
    pub body: PhysicsBody,
    /// Set when the entity leaves the simulation this tick; skipped by the
    /// dispatcher for the rest of the pass and removed at tick end.
    pub despawned: bool,
    /// Scheduled removal tick, for delayed despawns.
    pub despawn_at: Option<u64>,
}

impl EntityCore {
    pub fn new(id: EntityId, body: PhysicsBody) -> Self {
        Self {
            id,
            body,
            despawned: false,
            despawn_at: None,
        }
    }

    /// Removes the entity at the end of the current tick.
    pub fn despawn(&mut self) {
        self.despawned = true;
    }

    /// Removes the entity `delay` ticks from now.
    pub fn schedule_despawn(&mut self, now: u64, delay: u64) {
        self.despawn_at = Some(now + delay);
    }
}

/// The interaction capability every interactable behavior implements.
///
/// `contact` may be [`InteractionDirection::NONE`] for non-directional
/// touches; handlers must treat that as a generic touch.
pub trait Interactable {
    fn interact_with_player(
        &mut self,
        own: &mut EntityCore,
        player: &mut Entity,
        contact: InteractionDirection,
        ctx: &mut TickContext<'_>,
    );

    /// A block this entity stands on or occupies was bumped. Default is to
    /// ignore the bump.
    fn block_bump(
        &mut self,
        own: &mut EntityCore,
        bumper: EntityId,
        tile: TileCoordinate,
        direction: InteractionDirection,
        ctx: &mut TickContext<'_>,
    ) {
        let _ = (own, bumper, tile, direction, ctx);
    }
}

/// Behavioral state, tagged by entity kind.
#[derive(Debug, Clone, Hash, Serialize, Deserialize)]
pub enum Behavior {
    Player(PlayerState),
    ShellEnemy(ShellEnemy),
    Collectible(Collectible),
    Powerup(Powerup),
    /// Moving or static ride-able platform; carries no behavioral state,
    /// the body's `moving_platform` flag does the work.
    Platform,
}

impl Behavior {
    /// Kind-tag dispatch into the concrete handler. Players and platforms
    /// are sources, not targets; touching them directly does nothing.
    pub fn interact_with_player(
        &mut self,
        own: &mut EntityCore,
        player: &mut Entity,
        contact: InteractionDirection,
        ctx: &mut TickContext<'_>,
    ) {
        match self {
            Behavior::ShellEnemy(shell) => shell.interact_with_player(own, player, contact, ctx),
            Behavior::Collectible(collectible) => {
                collectible.interact_with_player(own, player, contact, ctx);
            }
            Behavior::Powerup(powerup) => powerup.interact_with_player(own, player, contact, ctx),
            Behavior::Player(_) | Behavior::Platform => {}
        }
    }

    /// Per-tick behavior update, after contact resolution and before
    /// interaction dispatch. Players are driven by their own controller
    /// outside this core; platforms carry no behavioral state.
    pub fn update(&mut self, own: &mut EntityCore, ctx: &mut TickContext<'_>) {
        match self {
            Behavior::ShellEnemy(shell) => shell.update(own, ctx),
            Behavior::Collectible(collectible) => collectible.update(own, ctx),
            Behavior::Powerup(powerup) => powerup.update(own, ctx),
            Behavior::Player(_) | Behavior::Platform => {}
        }
    }

    pub fn block_bump(
        &mut self,
        own: &mut EntityCore,
        bumper: EntityId,
        tile: TileCoordinate,
        direction: InteractionDirection,
        ctx: &mut TickContext<'_>,
    ) {
        match self {
            Behavior::ShellEnemy(shell) => shell.block_bump(own, bumper, tile, direction, ctx),
            Behavior::Collectible(collectible) => {
                collectible.block_bump(own, bumper, tile, direction, ctx);
            }
            Behavior::Powerup(powerup) => powerup.block_bump(own, bumper, tile, direction, ctx),
            Behavior::Player(_) | Behavior::Platform => {}
        }
    }
}

/// One simulated entity.
#[derive(Debug, Clone, Hash, Serialize, Deserialize)]
pub struct Entity {
    pub core: EntityCore,
    pub behavior: Behavior,
}

impl Entity {
    pub fn new(id: EntityId, body: PhysicsBody, behavior: Behavior) -> Self {
        Self {
            core: EntityCore::new(id, body),
            behavior,
        }
    }

    pub fn id(&self) -> EntityId {
        self.core.id
    }

    pub fn is_active(&self) -> bool {
        !self.core.despawned
    }

    pub fn player(&self) -> Option<&PlayerState> {
        match &self.behavior {
            Behavior::Player(state) => Some(state),
            _ => None,
        }
    }

    pub fn player_mut(&mut self) -> Option<&mut PlayerState> {
        match &mut self.behavior {
            Behavior::Player(state) => Some(state),
            _ => None,
        }
    }

    pub fn is_player(&self) -> bool {
        matches!(self.behavior, Behavior::Player(_))
    }

    /// Marks the entity despawned and queues the notification.
    pub fn despawn(&mut self, events: &mut SimEvents) {
        if !self.core.despawned {
            self.core.despawn();
            events.push(GameEvent::EntityDespawned { entity: self.core.id });
        }
    }
}

/// Disjoint mutable borrows of two entities in one slice, `i < j`.
pub(crate) fn pair_mut(entities: &mut [Entity], i: usize, j: usize) -> (&mut Entity, &mut Entity) {
    debug_assert!(i < j);
    let (head, tail) = entities.split_at_mut(j);
    (&mut head[i], &mut tail[0])
}
