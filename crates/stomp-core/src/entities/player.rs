//! Player-side state read and written by interaction handlers.
//!
//! The player's movement controller lives outside this core; handlers only
//! need the flags below to decide stomp/kick/damage outcomes and to hand
//! results (bounce, knockback, pickups) back.

use serde::{Deserialize, Serialize};

use crate::entities::{EntityId, TickTimer};
use crate::events::{GameEvent, SimEvents};
use crate::fp::{Fp, FpVec2, fp};

/// Powerup tier, as far as interactions care.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash, Serialize, Deserialize)]
pub enum PowerState {
    Small,
    #[default]
    Large,
    /// Mini players bounce off shells instead of stopping them.
    Mini,
    /// Mega players instantly kill enemies on contact.
    Mega,
}

impl PowerState {
    /// Next tier after collecting a powerup; mini and mega stay put.
    pub fn upgraded(self) -> Self {
        match self {
            PowerState::Small => PowerState::Large,
            other => other,
        }
    }
}

/// How hard a sliding shell knocks a player back.
const KNOCKBACK_SPEED: Fp = Fp::const_from_int(4);
/// Ticks of damage invincibility after a powerdown.
const DAMAGE_INVINCIBILITY_TICKS: u64 = 180;

#[derive(Debug, Clone, Hash, Serialize, Deserialize)]
pub struct PlayerState {
    pub facing_right: bool,
    pub power: PowerState,
    pub dead: bool,
    /// Sliding inside a blue shell.
    pub in_shell: bool,
    /// Crouched inside a blue shell: side hits only flip the attacker.
    pub crouched_in_shell: bool,
    pub groundpounding: bool,
    /// Star power window; instant-kills enemies while running.
    pub star_timer: TickTimer,
    pub damage_invincibility: TickTimer,
    /// Whether the player is currently able to carry an item (run held,
    /// hands free). Owned by the input layer, read here.
    pub can_pickup: bool,
    pub held_entity: Option<EntityId>,
    /// Set by handlers when the player should bounce off what it stomped;
    /// consumed by the movement controller.
    pub do_entity_bounce: bool,
    /// Consecutive-kill counter used for score escalation during a combo.
    pub star_combo: u8,
    pub stars: u8,
    pub coins: u8,
    /// Top running speed, the reference for kick-speed scaling.
    pub run_speed: Fp,
}

impl Default for PlayerState {
    fn default() -> Self {
        Self {
            facing_right: true,
            power: PowerState::default(),
            dead: false,
            in_shell: false,
            crouched_in_shell: false,
            groundpounding: false,
            star_timer: TickTimer::NONE,
            damage_invincibility: TickTimer::NONE,
            can_pickup: false,
            held_entity: None,
            do_entity_bounce: false,
            star_combo: 0,
            stars: 0,
            coins: 0,
            run_speed: fp(6),
        }
    }
}

impl PlayerState {
    pub fn is_starman(&self, now: u64) -> bool {
        self.star_timer.is_running(now)
    }

    /// Any-state instant kill: star power or mega size.
    pub fn instakills_enemies(&self, now: u64) -> bool {
        self.is_starman(now) || self.power == PowerState::Mega
    }

    pub fn is_damageable(&self, now: u64) -> bool {
        !self.dead
            && !self.is_starman(now)
            && self.power != PowerState::Mega
            && self.damage_invincibility.expired_or_not_running(now)
    }

    /// Takes a powerdown hit: drop one tier, gain an invincibility window.
    pub fn powerdown(&mut self, own_id: EntityId, now: u64, events: &mut SimEvents) {
        self.power = match self.power {
            PowerState::Small | PowerState::Mini => {
                self.dead = true;
                PowerState::Small
            }
            PowerState::Large | PowerState::Mega => PowerState::Small,
        };
        self.damage_invincibility = TickTimer::from_delay(now, DAMAGE_INVINCIBILITY_TICKS);
        events.push(GameEvent::PlayerDamaged { player: own_id });
    }

    /// Shoves the player away from a shell hit and reports it.
    pub fn do_knockback(
        &mut self,
        own_id: EntityId,
        velocity: &mut FpVec2,
        from_right: bool,
        events: &mut SimEvents,
    ) {
        velocity.x = if from_right {
            -KNOCKBACK_SPEED
        } else {
            KNOCKBACK_SPEED
        };
        velocity.y = KNOCKBACK_SPEED / 2;
        events.push(GameEvent::PlayerKnockback {
            player: own_id,
            from_right,
        });
    }
}
