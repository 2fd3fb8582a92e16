//! Shelled enemy state machine (walker that retracts, slides, and can be
//! carried). A `spiky` enemy runs the same table except it can never be
//! stomped into its shell from above.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::contacts::InteractionDirection;
use crate::entities::player::PowerState;
use crate::entities::{
    Behavior, Entity, EntityCore, EntityId, Interactable, TickContext, TickTimer,
};
use crate::events::GameEvent;
use crate::fp::{Fp, FpVec2, fp, fp_ratio};
use crate::tiles::TileCoordinate;

/// Ticks the previous holder cannot re-trigger the shell after a kick or
/// throw. A timestamp window, not a latch, so resimulation replays it
/// correctly.
const THROW_INVINCIBILITY_TICKS: u64 = 30;
/// Upward pop applied when the block under the enemy is bumped.
const BLOCK_BUMP_POP: Fp = Fp::const_from_int(4);
/// Corpse upward boost for special kills.
const DEATH_BOOST: Fp = Fp::const_from_int(5);
/// Delay before a dead enemy leaves the simulation.
const DEATH_DESPAWN_DELAY_TICKS: u64 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShellState {
    Walking,
    InShellStationary,
    InShellSliding,
    Held,
    Dead,
}

#[derive(Debug, Clone, Hash, Serialize, Deserialize)]
pub struct ShellEnemy {
    pub state: ShellState,
    /// Spiky enemies damage from above instead of shelling.
    pub spiky: bool,
    pub facing_right: bool,
    pub walk_speed: Fp,
    pub shell_speed: Fp,
    pub holder: Option<EntityId>,
    pub previous_holder: Option<EntityId>,
    pub throw_invincibility: TickTimer,
}

impl ShellEnemy {
    pub fn new(spiky: bool, facing_right: bool) -> Self {
        Self {
            state: ShellState::Walking,
            spiky,
            facing_right,
            walk_speed: fp_ratio(3, 2),
            shell_speed: fp(8),
            holder: None,
            previous_holder: None,
            throw_invincibility: TickTimer::NONE,
        }
    }

    pub fn is_in_shell(&self) -> bool {
        matches!(
            self.state,
            ShellState::InShellStationary | ShellState::InShellSliding | ShellState::Held
        )
    }

    /// Per-tick locomotion. Walkers and sliding shells turn around at
    /// walls; held shells track their holder.
    pub fn update(&mut self, own: &mut EntityCore, ctx: &mut TickContext<'_>) {
        let contacts = &own.body.contacts;
        match self.state {
            ShellState::Walking => {
                if contacts.hit_left() {
                    self.facing_right = true;
                } else if contacts.hit_right() {
                    self.facing_right = false;
                }
                own.body.velocity.x = self.direction() * self.walk_speed;
            }
            ShellState::InShellStationary => {
                own.body.velocity.x = Fp::ZERO;
            }
            ShellState::InShellSliding => {
                if contacts.hit_left() {
                    self.facing_right = true;
                } else if contacts.hit_right() {
                    self.facing_right = false;
                }
                own.body.velocity.x = self.direction() * self.shell_speed;
            }
            ShellState::Held => {
                if let Some(holder) = self.holder {
                    if let Some(position) = ctx.position_of(holder) {
                        own.body.position = position;
                    }
                }
                own.body.velocity = FpVec2::ZERO;
            }
            ShellState::Dead => {}
        }
    }

    fn direction(&self) -> Fp {
        if self.facing_right { fp(1) } else { fp(-1) }
    }

    fn enter_shell(&mut self, own: &mut EntityCore, ctx: &mut TickContext<'_>) {
        self.state = ShellState::InShellStationary;
        self.holder = None;
        own.body.velocity.x = Fp::ZERO;
        debug!(entity = own.id, "enemy entered shell");
        ctx.events.push(GameEvent::EnemyShellEntered { entity: own.id });
    }

    fn kick(
        &mut self,
        own: &mut EntityCore,
        player: &mut Entity,
        to_right: bool,
        groundpound: bool,
        ctx: &mut TickContext<'_>,
    ) {
        let run_speed = player.player().map_or(fp(6), |p| p.run_speed);
        let mut ratio = player.core.body.velocity.x.abs() / run_speed;
        if ratio > fp(1) {
            ratio = fp(1);
        }

        self.state = ShellState::InShellSliding;
        self.facing_right = to_right;
        let boost = if groundpound { fp(1) } else { Fp::ZERO };
        own.body.velocity.x = self.direction() * (self.shell_speed + self.shell_speed / 2 * ratio);
        own.body.velocity.y = boost;

        self.previous_holder = Some(player.id());
        self.throw_invincibility = TickTimer::from_delay(ctx.tick, THROW_INVINCIBILITY_TICKS);
        ctx.events.push(GameEvent::EnemyKicked {
            entity: own.id,
            player: player.id(),
        });
    }

    fn pickup(&mut self, own: &mut EntityCore, player: &mut Entity, ctx: &mut TickContext<'_>) {
        self.state = ShellState::Held;
        self.holder = Some(player.id());
        self.previous_holder = Some(player.id());
        own.body.disable_collision = true;
        if let Some(state) = player.player_mut() {
            state.held_entity = Some(own.id);
        }
        ctx.events.push(GameEvent::EnemyHeld {
            entity: own.id,
            player: player.id(),
        });
    }

    fn special_kill(&mut self, own: &mut EntityCore, to_right: bool, ctx: &mut TickContext<'_>) {
        self.state = ShellState::Dead;
        self.holder = None;
        own.body.velocity.x = if to_right { fp(2) } else { fp(-2) };
        own.body.velocity.y = DEATH_BOOST;
        own.body.disable_collision = true;
        own.schedule_despawn(ctx.tick, DEATH_DESPAWN_DELAY_TICKS);
        debug!(entity = own.id, "enemy special-killed");
        ctx.events.push(GameEvent::EnemyKilled {
            entity: own.id,
            special: true,
        });
    }
}

impl Interactable for ShellEnemy {
    #[allow(clippy::too_many_lines)]
    fn interact_with_player(
        &mut self,
        own: &mut EntityCore,
        player: &mut Entity,
        contact: InteractionDirection,
        ctx: &mut TickContext<'_>,
    ) {
        let _ = contact;

        // Held shells and corpses do not react to touches.
        if self.holder.is_some() || self.state == ShellState::Dead {
            return;
        }

        let player_id = player.id();
        let player_dead = player.player().is_none_or(|p| p.dead);
        if player_dead {
            return;
        }

        // Post-kick grace against whoever just threw or kicked us.
        if self.previous_holder == Some(player_id)
            && self.throw_invincibility.is_running(ctx.tick)
        {
            return;
        }

        // Who hit whom from which side, by position delta. Stationary
        // attackers still resolve correctly this way, and the wrap seam is
        // unwrapped first.
        let our_x = own.body.position.x;
        let their_x = ctx
            .stage
            .unwrap_world_x(our_x, player.core.body.position.x);
        let from_right = our_x < their_x;
        let attacked_from_above = player.core.body.position.y > own.body.position.y;

        // Shell-vs-shell precedence: a sliding shell meeting a shelled,
        // non-invincible player knocks the player back and dies itself.
        let player_in_shell = player.player().is_some_and(|p| p.in_shell);
        let player_starman = player.player().is_some_and(|p| p.is_starman(ctx.tick));
        if player_in_shell && !player_starman && self.state == ShellState::InShellSliding {
            let velocity = &mut player.core.body.velocity;
            if let Behavior::Player(state) = &mut player.behavior {
                state.do_knockback(player_id, velocity, !from_right, ctx.events);
                state.star_combo = state.star_combo.saturating_add(1);
            }
            self.special_kill(own, !from_right, ctx);
            return;
        }

        // Instant-kill capability is evaluated before any positional logic.
        if player
            .player()
            .is_some_and(|p| p.instakills_enemies(ctx.tick))
        {
            let facing_right = player.player().is_some_and(|p| p.facing_right);
            if let Some(state) = player.player_mut() {
                state.star_combo = state.star_combo.saturating_add(1);
            }
            self.special_kill(own, !facing_right, ctx);
            return;
        }

        // Crouched shell players deflect side hits.
        let crouched = player.player().is_some_and(|p| p.crouched_in_shell);
        if !attacked_from_above && crouched {
            self.facing_right = !from_right;
            return;
        }

        if self.is_in_shell() {
            if self.state == ShellState::InShellStationary {
                let can_pickup = player.player().is_some_and(|p| p.can_pickup);
                let groundpound = player.player().is_some_and(|p| p.groundpounding);
                if can_pickup {
                    self.pickup(own, player, ctx);
                } else {
                    self.kick(own, player, !from_right, groundpound, ctx);
                }
                return;
            }

            // Sliding shell.
            if attacked_from_above {
                let mini = player.player().is_some_and(|p| p.power == PowerState::Mini);
                let groundpound = player.player().is_some_and(|p| p.groundpounding);
                if mini {
                    if groundpound {
                        self.enter_shell(own, ctx);
                        if let Some(state) = player.player_mut() {
                            state.groundpounding = false;
                        }
                    }
                    if let Some(state) = player.player_mut() {
                        state.do_entity_bounce = true;
                        ctx.events.push(GameEvent::PlayerBounced { player: player_id });
                    }
                } else if groundpound {
                    self.kick(own, player, !from_right, true, ctx);
                } else {
                    self.enter_shell(own, ctx);
                    self.facing_right = from_right;
                    if let Some(state) = player.player_mut() {
                        state.do_entity_bounce = true;
                        ctx.events.push(GameEvent::PlayerBounced { player: player_id });
                    }
                }
                return;
            }

            // Side hit from a moving shell: plain damage.
            let damageable = player.player().is_some_and(|p| p.is_damageable(ctx.tick));
            if damageable {
                if let Behavior::Player(state) = &mut player.behavior {
                    state.powerdown(player_id, ctx.tick, ctx.events);
                }
                self.facing_right = from_right;
            }
            return;
        }

        // Walking. Stompable unless spiky.
        if attacked_from_above && !self.spiky {
            self.enter_shell(own, ctx);
            self.facing_right = from_right;
            if let Some(state) = player.player_mut() {
                state.do_entity_bounce = true;
                ctx.events.push(GameEvent::PlayerBounced { player: player_id });
            }
            return;
        }

        let damageable = player.player().is_some_and(|p| p.is_damageable(ctx.tick));
        if damageable {
            if let Behavior::Player(state) = &mut player.behavior {
                state.powerdown(player_id, ctx.tick, ctx.events);
            }
            self.facing_right = from_right;
        }
    }

    fn block_bump(
        &mut self,
        own: &mut EntityCore,
        _bumper: EntityId,
        _tile: TileCoordinate,
        _direction: InteractionDirection,
        ctx: &mut TickContext<'_>,
    ) {
        if matches!(self.state, ShellState::Dead | ShellState::Held) {
            return;
        }

        // Bumped from below: retract and pop upward.
        if self.state != ShellState::InShellStationary {
            self.enter_shell(own, ctx);
        }
        own.body.velocity.y = BLOCK_BUMP_POP;
        self.facing_right = !self.facing_right;
    }
}
