//! Spawn-sequenced powerup: cosmetic during its spawn animation, then
//! physics-active in one of three initial modes.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::body::PhysicsBody;
use crate::contacts::InteractionDirection;
use crate::entities::{Entity, EntityCore, EntityId, Interactable, TickContext};
use crate::events::GameEvent;
use crate::fp::{Fp, FpVec2, fp};

/// Default spawn animation length in ticks.
pub const SPAWN_ANIMATION_TICKS: u32 = 60;

/// Uncollected powerup lifespan, counted from the end of the spawn
/// animation.
pub const POWERUP_LIFESPAN_TICKS: u64 = 600;

/// Launch arc applied when a launched powerup spawns.
const LAUNCH_VELOCITY: FpVec2 = FpVec2 {
    x: Fp::const_from_int(2),
    y: Fp::const_from_int(9),
};

/// How the powerup enters the world once its animation completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PowerupSpawnMode {
    /// Rises out of a block from `origin` toward `destination`, frozen
    /// until the animation completes, then dropped.
    Block { origin: FpVec2, destination: FpVec2 },
    /// Launched on an arc immediately; collision stays off during the
    /// animation.
    Launch,
    /// Follows its owning player during the animation, then dropped.
    Parent { owner: EntityId },
}

#[derive(Debug, Clone, Hash, Serialize, Deserialize)]
pub struct Powerup {
    /// Which powerup this grants; opaque to the collision core.
    pub powerup_id: u8,
    pub mode: PowerupSpawnMode,
    pub spawn_animation_total: u32,
    pub spawn_animation_remaining: u32,
    pub collected: bool,
}

impl Powerup {
    pub fn new(powerup_id: u8, mode: PowerupSpawnMode, animation_ticks: u32) -> Self {
        Self {
            powerup_id,
            mode,
            spawn_animation_total: animation_ticks,
            spawn_animation_remaining: animation_ticks,
            collected: false,
        }
    }

    pub fn is_spawning(&self) -> bool {
        self.spawn_animation_remaining > 0
    }

    /// Configures the body for the spawn animation. Collision is off for
    /// the whole animation; block and parent spawns are also frozen.
    pub fn configure_body(&self, body: &mut PhysicsBody) {
        body.disable_collision = true;
        match self.mode {
            PowerupSpawnMode::Block { origin, .. } => {
                body.freeze = true;
                body.position = origin;
            }
            PowerupSpawnMode::Launch => {
                body.velocity = LAUNCH_VELOCITY;
            }
            PowerupSpawnMode::Parent { .. } => {
                body.freeze = true;
            }
        }
    }

    pub fn update(&mut self, own: &mut EntityCore, ctx: &mut TickContext<'_>) {
        if !self.is_spawning() {
            return;
        }

        self.spawn_animation_remaining -= 1;

        match self.mode {
            PowerupSpawnMode::Block {
                origin,
                destination,
            } => {
                // Exact fixed-point interpolation along the rise.
                let total = fp(i64::from(self.spawn_animation_total));
                let elapsed =
                    fp(i64::from(self.spawn_animation_total - self.spawn_animation_remaining));
                own.body.position = origin + (destination - origin) * (elapsed / total);
            }
            PowerupSpawnMode::Parent { owner } => {
                if let Some(position) = ctx.position_of(owner) {
                    own.body.position = position;
                }
            }
            PowerupSpawnMode::Launch => {}
        }

        if self.spawn_animation_remaining == 0 {
            own.body.disable_collision = false;
            own.body.freeze = false;
            debug!(entity = own.id, "powerup activated");
            ctx.events.push(GameEvent::PowerupActivated { entity: own.id });
        }
    }
}

impl Interactable for Powerup {
    fn interact_with_player(
        &mut self,
        own: &mut EntityCore,
        player: &mut Entity,
        contact: InteractionDirection,
        ctx: &mut TickContext<'_>,
    ) {
        let _ = contact;

        // Purely cosmetic until the animation budget elapses.
        if self.is_spawning() || self.collected {
            return;
        }
        if player.player().is_none_or(|p| p.dead) {
            return;
        }

        self.collected = true;
        if let Some(state) = player.player_mut() {
            state.power = state.power.upgraded();
        }
        ctx.events.push(GameEvent::Collected {
            entity: own.id,
            player: player.id(),
        });
        own.body.disable_collision = true;
        own.schedule_despawn(ctx.tick, 1);
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;
    use crate::entities::{Behavior, player::PlayerState, player::PowerState};
    use crate::events::SimEvents;
    use crate::fp::fp_ratio;
    use crate::tiles::{StageGrid, tests::open_stage};

    struct Harness {
        stage: StageGrid,
        events: SimEvents,
        rng: ChaCha8Rng,
        positions: Vec<(EntityId, FpVec2)>,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                stage: open_stage(16, 8),
                events: SimEvents::new(),
                rng: ChaCha8Rng::seed_from_u64(3),
                positions: Vec::new(),
            }
        }

        fn ctx(&mut self, tick: u64) -> TickContext<'_> {
            TickContext {
                tick,
                stage: &mut self.stage,
                events: &mut self.events,
                rng: &mut self.rng,
                positions: &self.positions,
            }
        }
    }

    fn body_at(x: Fp, y: Fp) -> PhysicsBody {
        PhysicsBody::new(
            FpVec2::new(x, y),
            FpVec2::new(fp_ratio(1, 4), fp_ratio(1, 4)),
        )
    }

    fn player_at(id: EntityId, x: Fp, y: Fp) -> Entity {
        Entity::new(id, body_at(x, y), Behavior::Player(PlayerState::default()))
    }

    #[test]
    fn test_block_spawn_rises_exactly_to_its_destination() {
        let mut harness = Harness::new();
        let origin = FpVec2::from_ints(2, 1);
        let destination = FpVec2::from_ints(2, 2);
        let mut powerup = Powerup::new(
            0,
            PowerupSpawnMode::Block {
                origin,
                destination,
            },
            4,
        );
        let mut own = EntityCore::new(1, body_at(fp(0), fp(0)));
        powerup.configure_body(&mut own.body);

        assert!(own.body.freeze);
        assert!(own.body.disable_collision);
        assert_eq!(own.body.position, origin);

        let mut ctx = harness.ctx(10);
        powerup.update(&mut own, &mut ctx);
        assert_eq!(own.body.position.y, fp(1) + fp_ratio(1, 4));

        for tick in 11..14 {
            let mut ctx = harness.ctx(tick);
            powerup.update(&mut own, &mut ctx);
        }

        assert_eq!(own.body.position, destination);
        assert!(!powerup.is_spawning());
        assert!(!own.body.freeze);
        assert!(!own.body.disable_collision);
        assert!(harness
            .events
            .notifications()
            .contains(&GameEvent::PowerupActivated { entity: 1 }));
    }

    #[test]
    fn test_launch_spawn_gets_its_arc_immediately() {
        let mut powerup = Powerup::new(2, PowerupSpawnMode::Launch, SPAWN_ANIMATION_TICKS);
        let mut body = body_at(fp(3), fp(3));
        powerup.configure_body(&mut body);

        assert_eq!(body.velocity, LAUNCH_VELOCITY);
        assert!(body.disable_collision);
        assert!(!body.freeze);
    }

    #[test]
    fn test_parent_spawn_follows_its_owner() {
        let mut harness = Harness::new();
        harness.positions = vec![(7, FpVec2::from_ints(5, 4))];

        let mut powerup = Powerup::new(1, PowerupSpawnMode::Parent { owner: 7 }, 30);
        let mut own = EntityCore::new(2, body_at(fp(0), fp(0)));
        powerup.configure_body(&mut own.body);

        let mut ctx = harness.ctx(10);
        powerup.update(&mut own, &mut ctx);

        assert_eq!(own.body.position, FpVec2::from_ints(5, 4));
    }

    #[test]
    fn test_spawning_powerup_ignores_touches() {
        let mut harness = Harness::new();
        let mut powerup = Powerup::new(0, PowerupSpawnMode::Launch, 3);
        let mut own = EntityCore::new(1, body_at(fp(4), fp(2)));
        powerup.configure_body(&mut own.body);
        let mut player = player_at(0, fp(4), fp(2));
        if let Some(state) = player.player_mut() {
            state.power = PowerState::Small;
        }

        let mut ctx = harness.ctx(10);
        powerup.interact_with_player(&mut own, &mut player, InteractionDirection::NONE, &mut ctx);
        assert!(!powerup.collected);
        assert_eq!(player.player().map(|p| p.power), Some(PowerState::Small));

        for tick in 10..13 {
            let mut ctx = harness.ctx(tick);
            powerup.update(&mut own, &mut ctx);
        }

        let mut ctx = harness.ctx(13);
        powerup.interact_with_player(&mut own, &mut player, InteractionDirection::NONE, &mut ctx);
        assert!(powerup.collected);
        assert_eq!(player.player().map(|p| p.power), Some(PowerState::Large));
        assert_eq!(own.despawn_at, Some(14));

        // Repeats are no-ops.
        let mut ctx = harness.ctx(14);
        powerup.interact_with_player(&mut own, &mut player, InteractionDirection::NONE, &mut ctx);
        assert_eq!(player.player().map(|p| p.power), Some(PowerState::Large));
    }
}
