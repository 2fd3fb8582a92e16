//! Falling and stationary collectibles: loose coins and big stars.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::contacts::InteractionDirection;
use crate::entities::{Entity, EntityCore, EntityId, Interactable, TickContext, TickTimer};
use crate::events::GameEvent;
use crate::fp::{Fp, FpVec2, fp, fp_ratio};
use crate::tiles::TileCoordinate;

/// Ticks after spawn before a popped coin can be picked up.
pub const COIN_ARM_DELAY_TICKS: u64 = 12;
/// Ticks a collected collectible lingers before removal, so dependent
/// observers see the collected state first.
pub const COLLECT_DESPAWN_DELAY_TICKS: u64 = 60;
/// Lifespan of a player-dropped star.
pub const STAR_LIFESPAN_TICKS: u64 = 900;
/// Lifespan of a loose coin.
pub const COIN_LIFESPAN_TICKS: u64 = 480;

const STAR_MOVE_SPEED: Fp = Fp::const_from_int(3);
const STAR_BOUNCE: Fp = Fp::const_from_int(4);
/// Upward boost a dropped star leaves its owner with.
const STAR_LAUNCH_BOOST: Fp = Fp::const_from_int(20);
/// Extra upward velocity when the drop came from a pit death.
const PIT_DROP_BOOST: Fp = Fp::const_from_int(3);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CollectibleKind {
    Coin,
    Star,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CollectibleState {
    /// Mid-arc or otherwise not yet armed.
    Uncollectable,
    Collectable,
    /// One-shot: repeated contacts after this are no-ops.
    Collected { by: EntityId },
}

#[derive(Debug, Clone, Hash, Serialize, Deserialize)]
pub struct Collectible {
    pub kind: CollectibleKind,
    pub state: CollectibleState,
    pub stationary: bool,
    pub fast: bool,
    pub dropped_by_pit: bool,
    pub facing_right: bool,
    /// Arming delay for popped coins; stars ignore it.
    pub collectable_at: TickTimer,
    /// Dropped stars pass through everything until they clear the level
    /// geometry.
    pub passthrough: bool,
    /// Counts hard landings; each increment is the external layer's cue to
    /// play the drop effect.
    pub bounce_counter: u8,
}

impl Collectible {
    /// A coin knocked loose from a block or enemy.
    pub fn loose_coin(now: u64) -> Self {
        Self {
            kind: CollectibleKind::Coin,
            state: CollectibleState::Collectable,
            stationary: false,
            fast: false,
            dropped_by_pit: false,
            facing_right: true,
            collectable_at: TickTimer::from_delay(now, COIN_ARM_DELAY_TICKS),
            passthrough: false,
            bounce_counter: 0,
        }
    }

    /// A big star. Stationary stars are immediately collectable; dropped
    /// stars arm at the apex of their arc. `direction` packs facing and
    /// speed the way spawners encode it: 0/3 are fast, >=2 face right.
    pub fn star(direction: u8, stationary: bool, dropped_by_pit: bool) -> Self {
        Self {
            kind: CollectibleKind::Star,
            state: if stationary {
                CollectibleState::Collectable
            } else {
                CollectibleState::Uncollectable
            },
            stationary,
            fast: direction == 0 || direction == 3,
            dropped_by_pit,
            facing_right: direction >= 2,
            collectable_at: TickTimer::NONE,
            passthrough: !stationary,
            bounce_counter: 0,
        }
    }

    pub fn is_collectable(&self) -> bool {
        matches!(self.state, CollectibleState::Collectable)
    }

    /// Spawn velocity of a dropped star: sideways at its move speed, up on
    /// the launch arc it arms at the apex of. Pit drops start deeper and
    /// get extra height.
    pub fn launch_velocity(&self) -> FpVec2 {
        let speed = STAR_MOVE_SPEED * if self.fast { fp(2) } else { fp(1) };
        let x = if self.facing_right { speed } else { -speed };
        let mut y = STAR_LAUNCH_BOOST;
        if self.dropped_by_pit {
            y += PIT_DROP_BOOST;
        }
        FpVec2::new(x, y)
    }

    pub fn update(&mut self, own: &mut EntityCore, ctx: &mut TickContext<'_>) {
        match self.kind {
            CollectibleKind::Coin => self.update_coin(own, ctx),
            CollectibleKind::Star => self.update_star(own, ctx),
        }
    }

    fn update_coin(&mut self, own: &mut EntityCore, ctx: &mut TickContext<'_>) {
        if !own.body.contacts.on_ground() {
            return;
        }

        if own.body.contacts.hit_roof() {
            // Squeezed between floor and ceiling.
            own.despawn();
            ctx.events.push(GameEvent::EntityDespawned { entity: own.id });
            return;
        }

        let previous = own.body.previous_tick_velocity;
        own.body.velocity = -previous * fp_ratio(1, 2);
        // Bounces slower than this stick to the floor.
        if own.body.velocity.y < fp_ratio(1, 5) {
            own.body.velocity.y = Fp::ZERO;
        }

        // Hard-landing cue. This threshold does not fire on every landing;
        // see test_coin_bounce_cue_is_not_guaranteed.
        let floor_angle = own.body.contacts.floor_angle();
        if previous.y < -fp_ratio(1, 2) * (floor_angle + fp(1)) {
            self.bounce_counter = self.bounce_counter.wrapping_add(1);
            ctx.events.push(GameEvent::CoinBounced { entity: own.id });
        }
    }

    fn update_star(&mut self, own: &mut EntityCore, ctx: &mut TickContext<'_>) {
        if self.stationary {
            return;
        }

        let speed = STAR_MOVE_SPEED * if self.fast { fp(2) } else { fp(1) };
        own.body.velocity.x = if self.facing_right { speed } else { -speed };

        if own.body.velocity.y < Fp::ZERO && self.state == CollectibleState::Uncollectable {
            // Apex of the drop arc: armed from here on.
            self.state = CollectibleState::Collectable;
        }

        // Wall and floor responses.
        let contacts = &own.body.contacts;
        if contacts.hit_left() {
            self.facing_right = true;
        } else if contacts.hit_right() {
            self.facing_right = false;
        }
        if contacts.on_ground() && self.is_collectable() {
            if contacts.hit_roof() {
                own.despawn();
                ctx.events.push(GameEvent::EntityDespawned { entity: own.id });
                return;
            }
            own.body.velocity.y = STAR_BOUNCE;
        }

        if self.passthrough {
            if self.is_collectable()
                && own.body.velocity.y <= Fp::ZERO
                && !ctx.stage.is_any_tile_solid_in_box(&own.body.aabb())
            {
                self.passthrough = false;
                own.body.disable_collision = false;
                debug!(entity = own.id, "star left passthrough");
            }
        } else {
            if own.body.position.y < ctx.stage.stage_world_min().y {
                own.despawn();
                ctx.events.push(GameEvent::EntityDespawned { entity: own.id });
                return;
            }
            // Inside a wall the star stops colliding until it exits.
            own.body.disable_collision = ctx.stage.is_any_tile_solid_in_box(&own.body.aabb());
        }
    }
}

impl Interactable for Collectible {
    fn interact_with_player(
        &mut self,
        own: &mut EntityCore,
        player: &mut Entity,
        contact: InteractionDirection,
        ctx: &mut TickContext<'_>,
    ) {
        let _ = contact;

        if player.player().is_none_or(|p| p.dead) {
            return;
        }

        // Exactly-once guard: simultaneous contacts in one tick collect once.
        if matches!(self.state, CollectibleState::Collected { .. }) {
            return;
        }

        match self.kind {
            CollectibleKind::Coin => {
                if self.collectable_at.is_running(ctx.tick) {
                    return;
                }
                if let Some(state) = player.player_mut() {
                    state.coins = state.coins.saturating_add(1);
                }
            }
            CollectibleKind::Star => {
                if !self.is_collectable() {
                    return;
                }
                if let Some(state) = player.player_mut() {
                    state.stars = state.stars.saturating_add(1);
                }
            }
        }

        self.state = CollectibleState::Collected { by: player.id() };
        ctx.events.push(GameEvent::Collected {
            entity: own.id,
            player: player.id(),
        });

        // Collecting the main star rebuilds the stage for the next round.
        if self.kind == CollectibleKind::Star && self.stationary {
            ctx.stage.reset_stage(false, ctx.events);
        }

        own.body.disable_collision = true;
        own.schedule_despawn(ctx.tick, COLLECT_DESPAWN_DELAY_TICKS);
    }

    fn block_bump(
        &mut self,
        _own: &mut EntityCore,
        _bumper: EntityId,
        _tile: TileCoordinate,
        _direction: InteractionDirection,
        _ctx: &mut TickContext<'_>,
    ) {
        // Coins and stars ignore bumps.
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;
    use crate::body::PhysicsBody;
    use crate::entities::{Behavior, player::PlayerState};
    use crate::events::{SimEvents, TileSignal};
    use crate::fp::FpVec2;
    use crate::tiles::{StageGrid, tests::open_stage};

    struct Harness {
        stage: StageGrid,
        events: SimEvents,
        rng: ChaCha8Rng,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                stage: open_stage(16, 8),
                events: SimEvents::new(),
                rng: ChaCha8Rng::seed_from_u64(7),
            }
        }

        fn ctx(&mut self, tick: u64) -> TickContext<'_> {
            TickContext {
                tick,
                stage: &mut self.stage,
                events: &mut self.events,
                rng: &mut self.rng,
                positions: &[],
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
    fn test_coin_arms_after_its_delay() {
        let mut harness = Harness::new();
        let mut coin = Collectible::loose_coin(100);
        let mut own = EntityCore::new(1, body_at(fp(4), fp(2)));
        let mut player = player_at(0, fp(4), fp(2));

        let mut ctx = harness.ctx(105);
        coin.interact_with_player(&mut own, &mut player, InteractionDirection::NONE, &mut ctx);
        assert_eq!(player.player().map(|p| p.coins), Some(0));
        assert!(coin.is_collectable());

        let mut ctx = harness.ctx(100 + COIN_ARM_DELAY_TICKS);
        coin.interact_with_player(&mut own, &mut player, InteractionDirection::NONE, &mut ctx);
        assert_eq!(player.player().map(|p| p.coins), Some(1));
        assert_eq!(coin.state, CollectibleState::Collected { by: 0 });
        assert!(own.body.disable_collision);
        assert_eq!(
            own.despawn_at,
            Some(100 + COIN_ARM_DELAY_TICKS + COLLECT_DESPAWN_DELAY_TICKS)
        );
    }

    #[test]
    fn test_collect_is_one_shot() {
        let mut harness = Harness::new();
        let mut coin = Collectible::loose_coin(0);
        let mut own = EntityCore::new(1, body_at(fp(4), fp(2)));
        let mut player = player_at(0, fp(4), fp(2));

        for _ in 0..2 {
            let mut ctx = harness.ctx(50);
            coin.interact_with_player(&mut own, &mut player, InteractionDirection::NONE, &mut ctx);
        }

        assert_eq!(player.player().map(|p| p.coins), Some(1));
        let collected: Vec<_> = harness
            .events
            .notifications()
            .iter()
            .filter(|e| matches!(e, GameEvent::Collected { .. }))
            .collect();
        assert_eq!(collected.len(), 1);
    }

    #[test]
    fn test_coin_crushed_between_floor_and_roof() {
        let mut harness = Harness::new();
        let mut coin = Collectible::loose_coin(0);
        let mut own = EntityCore::new(1, body_at(fp(4), fp(2)));
        own.body.contacts.set_on_ground(true);
        own.body.contacts.set_hit_roof(true);

        let mut ctx = harness.ctx(10);
        coin.update(&mut own, &mut ctx);

        assert!(own.despawned);
        assert!(harness
            .events
            .notifications()
            .contains(&GameEvent::EntityDespawned { entity: 1 }));
    }

    #[test]
    fn test_coin_bounce_cue_is_not_guaranteed() {
        let mut harness = Harness::new();
        let mut coin = Collectible::loose_coin(0);
        let mut own = EntityCore::new(1, body_at(fp(4), fp(2)));
        own.body.contacts.set_on_ground(true);

        // Soft landing on flat ground: halved bounce, no cue.
        own.body.previous_tick_velocity = FpVec2::new(Fp::ZERO, -fp_ratio(2, 5));
        let mut ctx = harness.ctx(10);
        coin.update(&mut own, &mut ctx);
        assert_eq!(coin.bounce_counter, 0);
        assert!(harness.events.notifications().is_empty());

        // Hard landing: cue fires.
        own.body.previous_tick_velocity = FpVec2::new(Fp::ZERO, fp(-2));
        let mut ctx = harness.ctx(11);
        coin.update(&mut own, &mut ctx);
        assert_eq!(coin.bounce_counter, 1);
        assert!(harness
            .events
            .notifications()
            .contains(&GameEvent::CoinBounced { entity: 1 }));
        assert_eq!(own.body.velocity, FpVec2::new(Fp::ZERO, fp(1)));
    }

    #[test]
    fn test_coin_slow_bounce_sticks_to_the_floor() {
        let mut harness = Harness::new();
        let mut coin = Collectible::loose_coin(0);
        let mut own = EntityCore::new(1, body_at(fp(4), fp(2)));
        own.body.contacts.set_on_ground(true);
        own.body.previous_tick_velocity = FpVec2::new(Fp::ZERO, -fp_ratio(1, 4));

        let mut ctx = harness.ctx(10);
        coin.update(&mut own, &mut ctx);

        assert_eq!(own.body.velocity.y, Fp::ZERO);
    }

    #[test]
    fn test_dropped_star_arms_at_apex_then_lands() {
        let mut harness = Harness::new();
        let mut star = Collectible::star(2, false, false);
        assert!(!star.is_collectable());
        assert!(star.passthrough);

        let mut own = EntityCore::new(1, body_at(fp(4), fp(3)));
        own.body.disable_collision = true;
        own.body.velocity.y = fp(3);

        // Still rising: unarmed, still intangible.
        let mut ctx = harness.ctx(10);
        star.update(&mut own, &mut ctx);
        assert!(!star.is_collectable());
        assert!(own.body.disable_collision);
        assert_eq!(own.body.velocity.x, fp(3));

        // Past the apex: armed, and the open stage re-enables collision.
        own.body.velocity.y = fp(-1);
        let mut ctx = harness.ctx(11);
        star.update(&mut own, &mut ctx);
        assert!(star.is_collectable());
        assert!(!star.passthrough);
        assert!(!own.body.disable_collision);

        // Grounded: fixed upward bounce.
        own.body.contacts.set_on_ground(true);
        let mut ctx = harness.ctx(12);
        star.update(&mut own, &mut ctx);
        assert_eq!(own.body.velocity.y, STAR_BOUNCE);
    }

    #[test]
    fn test_star_launch_velocity() {
        // direction 3: fast, facing right.
        let pit_drop = Collectible::star(3, false, true);
        assert_eq!(pit_drop.launch_velocity(), FpVec2::new(fp(6), fp(23)));

        // direction 1: slow, facing left, no pit boost.
        let drop = Collectible::star(1, false, false);
        assert_eq!(drop.launch_velocity(), FpVec2::new(fp(-3), fp(20)));
    }

    #[test]
    fn test_star_despawns_below_the_stage() {
        let mut harness = Harness::new();
        let mut star = Collectible::star(1, false, false);
        star.state = CollectibleState::Collectable;
        star.passthrough = false;

        let mut own = EntityCore::new(1, body_at(fp(4), fp(-5)));
        own.body.velocity.y = fp(-1);

        let mut ctx = harness.ctx(10);
        star.update(&mut own, &mut ctx);

        assert!(own.despawned);
    }

    #[test]
    fn test_stationary_star_collect_resets_the_stage() {
        let mut harness = Harness::new();
        let mut star = Collectible::star(0, true, false);
        let mut own = EntityCore::new(1, body_at(fp(4), fp(2)));
        let mut player = player_at(0, fp(4), fp(2));

        let mut ctx = harness.ctx(10);
        star.interact_with_player(&mut own, &mut player, InteractionDirection::NONE, &mut ctx);

        assert_eq!(player.player().map(|p| p.stars), Some(1));
        assert_eq!(star.state, CollectibleState::Collected { by: 0 });
        assert!(harness
            .events
            .signals()
            .contains(&TileSignal::StageReset { full: false }));
        assert!(harness
            .events
            .notifications()
            .contains(&GameEvent::StageReset { full: false }));
        assert_eq!(own.despawn_at, Some(10 + COLLECT_DESPAWN_DELAY_TICKS));
    }

    #[test]
    fn test_dead_player_collects_nothing() {
        let mut harness = Harness::new();
        let mut coin = Collectible::loose_coin(0);
        let mut own = EntityCore::new(1, body_at(fp(4), fp(2)));
        let mut player = player_at(0, fp(4), fp(2));
        if let Some(state) = player.player_mut() {
            state.dead = true;
        }

        let mut ctx = harness.ctx(50);
        coin.interact_with_player(&mut own, &mut player, InteractionDirection::NONE, &mut ctx);

        assert!(coin.is_collectable());
        assert!(harness.events.notifications().is_empty());
    }
}
