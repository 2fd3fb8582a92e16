//! The tick driver.
//!
//! One [`GameWorld::step`] call advances the whole simulation exactly one
//! fixed tick: integrate bodies, resolve contacts, run behavior updates,
//! dispatch interactions, consume internal signals, commit despawns. Every
//! phase walks entities in ascending id order and nothing reads a wall
//! clock, so two worlds fed the same inputs stay bit-identical.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::body::PhysicsBody;
use crate::entities::{
    Behavior, Collectible, Entity, EntityId, PlayerState, Powerup, PowerupSpawnMode, ShellEnemy,
    TickContext,
};
use crate::events::{GameEvent, SimEvents, TileSignal};
use crate::fp::{Fp, FpVec2, fp_ratio};
use crate::interact::{bump_tile, dispatch_interactions};
use crate::resolver::resolve_contacts;
use crate::tiles::{StageGrid, TileCoordinate};

/// Simulation ticks per second.
pub const TICK_RATE: u32 = 60;

/// Duration of one tick in seconds.
pub fn tick_dt() -> Fp {
    fp_ratio(1, i64::from(TICK_RATE))
}

/// Downward acceleration on unfrozen, non-platform bodies, world units per
/// second squared.
const GRAVITY_Y: Fp = Fp::const_from_int(-40);

/// The whole simulation state plus its tick driver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameWorld {
    stage: StageGrid,
    entities: Vec<Entity>,
    tick: u64,
    rng_seed: u64,
    rng: ChaCha8Rng,
    next_entity_id: EntityId,
    star_spawn_index: usize,
    events: SimEvents,
}

impl GameWorld {
    pub fn new(stage: StageGrid, rng_seed: u64) -> Self {
        Self {
            stage,
            entities: Vec::new(),
            tick: 0,
            rng_seed,
            rng: ChaCha8Rng::seed_from_u64(rng_seed),
            next_entity_id: 0,
            star_spawn_index: 0,
            events: SimEvents::new(),
        }
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn rng_seed(&self) -> u64 {
        self.rng_seed
    }

    pub fn stage(&self) -> &StageGrid {
        &self.stage
    }

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities
            .binary_search_by_key(&id, Entity::id)
            .ok()
            .map(|i| &self.entities[i])
    }

    pub fn entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities
            .binary_search_by_key(&id, Entity::id)
            .ok()
            .map(|i| &mut self.entities[i])
    }

    fn alloc_id(&mut self) -> EntityId {
        let id = self.next_entity_id;
        self.next_entity_id += 1;
        id
    }

    fn spawn(&mut self, body: PhysicsBody, behavior: Behavior) -> EntityId {
        let id = self.alloc_id();
        // Ids are handed out in ascending order, so pushing keeps the
        // canonical ordering.
        self.entities.push(Entity::new(id, body, behavior));
        id
    }

    pub fn spawn_player(
        &mut self,
        position: FpVec2,
        half_extents: FpVec2,
        state: PlayerState,
    ) -> EntityId {
        self.spawn(PhysicsBody::new(position, half_extents), Behavior::Player(state))
    }

    pub fn spawn_shell_enemy(
        &mut self,
        position: FpVec2,
        half_extents: FpVec2,
        spiky: bool,
        facing_right: bool,
    ) -> EntityId {
        self.spawn(
            PhysicsBody::new(position, half_extents),
            Behavior::ShellEnemy(ShellEnemy::new(spiky, facing_right)),
        )
    }

    /// Pops a loose coin with a seeded-random upward kick in [5.5, 6.0].
    pub fn spawn_loose_coin(&mut self, position: FpVec2, half_extents: FpVec2) -> EntityId {
        // 0.5 spans 1 << 15 raw fractional bits.
        let offset = Fp::from_bits(self.rng.random_range(0..=1_i64 << 15));
        let mut body = PhysicsBody::new(position, half_extents);
        body.velocity.y = fp_ratio(11, 2) + offset;
        let tick = self.tick;
        let id = self.spawn(body, Behavior::Collectible(Collectible::loose_coin(tick)));
        if let Some(coin) = self.entity_mut(id) {
            coin.core
                .schedule_despawn(tick, crate::entities::collectible::COIN_LIFESPAN_TICKS);
        }
        id
    }

    pub fn spawn_star(
        &mut self,
        position: FpVec2,
        half_extents: FpVec2,
        direction: u8,
        stationary: bool,
        dropped_by_pit: bool,
    ) -> EntityId {
        let star = Collectible::star(direction, stationary, dropped_by_pit);
        let mut body = PhysicsBody::new(position, half_extents);
        if stationary {
            body.freeze = true;
        } else {
            // Dropped stars launch on an arc and pass through the level
            // until they clear it.
            body.velocity = star.launch_velocity();
        }
        body.disable_collision = star.passthrough;
        let tick = self.tick;
        let id = self.spawn(body, Behavior::Collectible(star));
        if !stationary {
            if let Some(star) = self.entity_mut(id) {
                star.core
                    .schedule_despawn(tick, crate::entities::collectible::STAR_LIFESPAN_TICKS);
            }
        }
        id
    }

    pub fn spawn_powerup(
        &mut self,
        position: FpVec2,
        half_extents: FpVec2,
        powerup_id: u8,
        mode: PowerupSpawnMode,
        animation_ticks: u32,
    ) -> EntityId {
        let powerup = Powerup::new(powerup_id, mode, animation_ticks);
        let mut body = PhysicsBody::new(position, half_extents);
        powerup.configure_body(&mut body);
        let tick = self.tick;
        let id = self.spawn(body, Behavior::Powerup(powerup));
        if let Some(entity) = self.entity_mut(id) {
            // Lifespan starts once the spawn animation completes.
            entity.core.schedule_despawn(
                tick,
                crate::entities::powerup::POWERUP_LIFESPAN_TICKS + u64::from(animation_ticks),
            );
        }
        id
    }

    /// A ride-able platform. Frozen to gravity, moved by its own velocity.
    pub fn spawn_platform(
        &mut self,
        position: FpVec2,
        half_extents: FpVec2,
        velocity: FpVec2,
    ) -> EntityId {
        let mut body = PhysicsBody::new(position, half_extents);
        body.velocity = velocity;
        body.moving_platform = true;
        self.spawn(body, Behavior::Platform)
    }

    /// Spawns the next stationary big star, rotating through the stage's
    /// spawnpoints. Returns `None` when the stage defines none.
    pub fn spawn_next_big_star(&mut self, half_extents: FpVec2) -> Option<EntityId> {
        if self.stage.big_star_spawnpoints().is_empty() {
            return None;
        }
        let index = self.star_spawn_index % self.stage.big_star_spawnpoints().len();
        self.star_spawn_index += 1;
        let position = self.stage.big_star_spawnpoints()[index];
        debug!(index, "spawning big star");
        Some(self.spawn_star(position, half_extents, 0, true, false))
    }

    /// Bumps a grid cell on behalf of `bumper` (a block hit from below, or
    /// groundpounded). Returns whether the tile reacted.
    pub fn bump_tile(&mut self, bumper: EntityId, location: TileCoordinate) -> bool {
        let positions = position_snapshot(&self.entities);
        let mut ctx = TickContext {
            tick: self.tick,
            stage: &mut self.stage,
            events: &mut self.events,
            rng: &mut self.rng,
            positions: &positions,
        };
        bump_tile(&mut self.entities, bumper, location, &mut ctx)
    }

    /// Restores the stage to its template and signals listeners.
    pub fn reset_stage(&mut self, full: bool) {
        self.stage.reset_stage(full, &mut self.events);
    }

    /// Takes the pending external notifications, in emission order.
    pub fn drain_events(&mut self) -> Vec<GameEvent> {
        self.events.drain_notifications()
    }

    /// Advances the simulation exactly one tick.
    ///
    /// Contacts are resolved against the pre-move positions with the
    /// tick's motion swept in, and velocity into a contact is stopped
    /// before the move, so resting bodies neither sink nor tunnel.
    pub fn step(&mut self) {
        self.tick += 1;
        let tick = self.tick;
        let dt = tick_dt();

        self.apply_forces(dt);
        resolve_contacts(&self.stage, &mut self.entities, dt);
        stop_at_contacts(&mut self.entities);
        self.move_bodies(dt);

        let positions = position_snapshot(&self.entities);
        {
            let mut ctx = TickContext {
                tick,
                stage: &mut self.stage,
                events: &mut self.events,
                rng: &mut self.rng,
                positions: &positions,
            };

            for entity in &mut self.entities {
                if entity.core.despawned {
                    continue;
                }
                let Entity { core, behavior } = entity;
                behavior.update(core, &mut ctx);
            }

            dispatch_interactions(&mut self.entities, &mut ctx);
        }

        self.consume_signals();
        self.commit_despawns(tick);
    }

    pub fn step_n(&mut self, ticks: u64) {
        for _ in 0..ticks {
            self.step();
        }
    }

    fn apply_forces(&mut self, dt: Fp) {
        for entity in &mut self.entities {
            let body = &mut entity.core.body;
            body.previous_tick_velocity = body.velocity;
            if body.freeze || entity.core.despawned {
                continue;
            }
            // Platforms are kinematic; everything else falls.
            if !body.moving_platform {
                body.velocity.y += GRAVITY_Y * dt;
            }
        }
    }

    fn move_bodies(&mut self, dt: Fp) {
        for entity in &mut self.entities {
            let body = &mut entity.core.body;
            if body.freeze || entity.core.despawned {
                continue;
            }
            // Ground reference frame from this tick's support.
            let motion = (body.velocity + body.ground_velocity) * dt;
            body.position += motion;
            body.position.x = self.stage.wrap_world_x(body.position.x);
        }
    }

    /// Consumes this tick's internal signals. A completed stage reset puts
    /// the next big star into play; plain tile changes have no standing
    /// consumer here, the bump path notifies occupants directly.
    fn consume_signals(&mut self) {
        for signal in self.events.drain_signals() {
            match signal {
                TileSignal::StageReset { full } => {
                    debug!(full, "stage reset signal");
                    self.spawn_next_big_star(FpVec2::new(fp_ratio(1, 4), fp_ratio(1, 4)));
                }
                TileSignal::TileChanged { .. } => {}
            }
        }
    }

    fn commit_despawns(&mut self, tick: u64) {
        for entity in &mut self.entities {
            if entity.core.despawn_at.is_some_and(|at| at <= tick) {
                entity.despawn(&mut self.events);
            }
        }
        self.entities.retain(|e| !e.core.despawned);
    }

    /// Deterministic hash of the full simulation state, for cross-peer
    /// desync detection.
    pub fn compute_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.tick.hash(&mut hasher);
        self.stage.tiles().hash(&mut hasher);
        self.entities.hash(&mut hasher);
        self.next_entity_id.hash(&mut hasher);
        self.star_spawn_index.hash(&mut hasher);
        hasher.finish()
    }
}

/// Halts motion into whatever the resolver just recorded: grounded bodies
/// stop falling, roofed bodies stop rising, side hits stop the run. Bounce
/// responses read `previous_tick_velocity`, which this leaves alone.
fn stop_at_contacts(entities: &mut [Entity]) {
    for entity in entities.iter_mut() {
        let body = &mut entity.core.body;
        if body.contacts.on_ground() && body.velocity.y < Fp::ZERO {
            body.velocity.y = Fp::ZERO;
        }
        if body.contacts.hit_roof() && body.velocity.y > Fp::ZERO {
            body.velocity.y = Fp::ZERO;
        }
        if body.contacts.hit_left() && body.velocity.x < Fp::ZERO {
            body.velocity.x = Fp::ZERO;
        }
        if body.contacts.hit_right() && body.velocity.x > Fp::ZERO {
            body.velocity.x = Fp::ZERO;
        }
    }
}

fn position_snapshot(entities: &[Entity]) -> Vec<(EntityId, FpVec2)> {
    entities
        .iter()
        .map(|e| (e.id(), e.core.body.position))
        .collect()
}
