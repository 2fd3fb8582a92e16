//! Signals and notifications emitted by the simulation.
//!
//! Two independent ordered queues with a fixed firing order: internal
//! signals are consumed by rule logic inside the core during the same tick,
//! external notifications are drained by the embedding layer (rendering,
//! audio). For every committed tile mutation the signal is queued before the
//! notification. The core never depends on a consumer existing; undrained
//! notifications are simply dropped on the next drain.

use serde::{Deserialize, Serialize};

use crate::entities::EntityId;
use crate::tiles::{TileCoordinate, TileInstance};

/// Internal signal, consumed by gameplay rules before any external
/// notification for the same mutation is observable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TileSignal {
    /// A grid cell changed. Coordinates are grid-relative.
    TileChanged {
        location: TileCoordinate,
        tile: TileInstance,
    },
    /// A reset pass over the stage completed.
    StageReset { full: bool },
}

/// Fire-and-forget notification for external consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameEvent {
    /// A tile changed; coordinates are world tile coordinates.
    TileChanged {
        x: i32,
        y: i32,
        tile: TileInstance,
    },
    /// A stage reset pass completed.
    StageReset { full: bool },
    /// A loose coin bounced hard enough to play its drop effect.
    CoinBounced { entity: EntityId },
    /// A collectible was picked up.
    Collected { entity: EntityId, player: EntityId },
    /// A walking enemy retracted into its shell.
    EnemyShellEntered { entity: EntityId },
    /// A stationary shell was kicked into a slide.
    EnemyKicked { entity: EntityId, player: EntityId },
    /// A shell was picked up and is now held.
    EnemyHeld { entity: EntityId, player: EntityId },
    /// An enemy died. `special` marks instant kills (star power, shell
    /// collisions) that use the boosted death animation.
    EnemyKilled { entity: EntityId, special: bool },
    /// A player took knockback from a sliding shell.
    PlayerKnockback { player: EntityId, from_right: bool },
    /// A player bounced off an enemy they stomped.
    PlayerBounced { player: EntityId },
    /// A player took a powerdown hit.
    PlayerDamaged { player: EntityId },
    /// A powerup finished its spawn animation and became physical.
    PowerupActivated { entity: EntityId },
    /// An entity left the simulation.
    EntityDespawned { entity: EntityId },
}

/// The per-tick event sink carried through stage mutation and dispatch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SimEvents {
    signals: Vec<TileSignal>,
    notifications: Vec<GameEvent>,
}

impl SimEvents {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues the signal/notification pair for one committed tile change.
    /// Signal first, notification second.
    pub fn emit_tile_changed(
        &mut self,
        relative: TileCoordinate,
        world: TileCoordinate,
        tile: TileInstance,
    ) {
        self.signals.push(TileSignal::TileChanged {
            location: relative,
            tile,
        });
        self.notifications.push(GameEvent::TileChanged {
            x: world.x,
            y: world.y,
            tile,
        });
    }

    /// Queues the trailing pair for a completed reset pass.
    pub fn emit_stage_reset(&mut self, full: bool) {
        self.signals.push(TileSignal::StageReset { full });
        self.notifications.push(GameEvent::StageReset { full });
    }

    /// Queues a gameplay notification with no internal signal counterpart.
    pub fn push(&mut self, event: GameEvent) {
        self.notifications.push(event);
    }

    /// Takes the pending internal signals, in emission order.
    pub fn drain_signals(&mut self) -> Vec<TileSignal> {
        std::mem::take(&mut self.signals)
    }

    /// Takes the pending external notifications, in emission order.
    pub fn drain_notifications(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.notifications)
    }

    pub fn signals(&self) -> &[TileSignal] {
        &self.signals
    }

    pub fn notifications(&self) -> &[GameEvent] {
        &self.notifications
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tiles::TileKind;

    #[test]
    fn test_tile_change_queues_signal_and_notification() {
        let mut events = SimEvents::new();
        let tile = TileInstance::of_kind(TileKind::Solid);

        events.emit_tile_changed(
            TileCoordinate::new(2, 3),
            TileCoordinate::new(5, 7),
            tile,
        );

        assert_eq!(
            events.signals(),
            &[TileSignal::TileChanged {
                location: TileCoordinate::new(2, 3),
                tile,
            }]
        );
        assert_eq!(
            events.notifications(),
            &[GameEvent::TileChanged { x: 5, y: 7, tile }]
        );
    }

    #[test]
    fn test_drain_empties_queues() {
        let mut events = SimEvents::new();
        events.emit_stage_reset(true);

        assert_eq!(events.drain_signals().len(), 1);
        assert_eq!(events.drain_notifications().len(), 1);
        assert!(events.signals().is_empty());
        assert!(events.notifications().is_empty());
    }
}
