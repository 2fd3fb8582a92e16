//! Physics body state attached to every entity.

use serde::{Deserialize, Serialize};

use crate::contacts::ContactLedger;
use crate::fp::{Aabb, FpVec2};

/// Position, motion, and the contact ledger for one entity.
#[derive(Debug, Clone, Default, Hash, Serialize, Deserialize)]
pub struct PhysicsBody {
    pub position: FpVec2,
    /// Velocity in world units per second.
    pub velocity: FpVec2,
    /// Velocity as it was at the start of the previous tick's integration;
    /// bounce responses read this, not the post-collision velocity.
    pub previous_tick_velocity: FpVec2,
    pub half_extents: FpVec2,
    /// Frozen bodies skip integration and gravity entirely.
    pub freeze: bool,
    /// Disabled bodies produce and receive no contacts at all.
    pub disable_collision: bool,
    /// Entities standing on this body inherit its velocity as their ground
    /// reference frame.
    pub moving_platform: bool,
    /// Reference-frame velocity of whatever this body stands on, refreshed
    /// by the resolver each tick.
    pub ground_velocity: FpVec2,
    pub contacts: ContactLedger,
}

impl PhysicsBody {
    pub fn new(position: FpVec2, half_extents: FpVec2) -> Self {
        Self {
            position,
            half_extents,
            ..Self::default()
        }
    }

    pub fn aabb(&self) -> Aabb {
        Aabb::new(self.position, self.half_extents)
    }
}
