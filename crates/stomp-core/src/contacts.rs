//! Per-entity physics contact ledger.
//!
//! Each entity's body owns one ledger. The collision resolver clears and
//! fully repopulates it once per tick before any handler reads it; nothing
//! carries over between ticks. Both contact lists are bounded, dropping the
//! oldest entry of that kind on overflow.

use serde::{Deserialize, Serialize};

use crate::entities::EntityId;
use crate::fp::Fp;
use crate::tiles::TileCoordinate;

/// Bitmask over the four contact directions, from the owning entity's
/// perspective: `DOWN` means the contact is under the entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash, Serialize, Deserialize)]
pub struct InteractionDirection(u8);

impl InteractionDirection {
    pub const NONE: Self = Self(0);
    pub const UP: Self = Self(1);
    pub const DOWN: Self = Self(1 << 1);
    pub const LEFT: Self = Self(1 << 2);
    pub const RIGHT: Self = Self(1 << 3);
    pub const SIDES: Self = Self(Self::LEFT.0 | Self::RIGHT.0);

    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// True when any direction bit is shared with `other`.
    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn is_none(self) -> bool {
        self.0 == 0
    }

    /// Mirror of the mask, for reading a contact from the other party's
    /// perspective.
    pub const fn opposite(self) -> Self {
        let mut bits = 0;
        if self.0 & Self::UP.0 != 0 {
            bits |= Self::DOWN.0;
        }
        if self.0 & Self::DOWN.0 != 0 {
            bits |= Self::UP.0;
        }
        if self.0 & Self::LEFT.0 != 0 {
            bits |= Self::RIGHT.0;
        }
        if self.0 & Self::RIGHT.0 != 0 {
            bits |= Self::LEFT.0;
        }
        Self(bits)
    }
}

impl std::ops::BitOr for InteractionDirection {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

impl std::ops::BitOrAssign for InteractionDirection {
    fn bitor_assign(&mut self, rhs: Self) {
        *self = self.union(rhs);
    }
}

/// A directional overlap with a tile cell, valid for one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileContact {
    pub location: TileCoordinate,
    pub direction: InteractionDirection,
}

/// A directional overlap with another entity, valid for one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectContact {
    pub entity: EntityId,
    pub direction: InteractionDirection,
}

/// Most simultaneous tile contacts a ledger keeps.
pub const TILE_CONTACT_CAPACITY: usize = 16;
/// Most simultaneous object contacts a ledger keeps.
pub const OBJECT_CONTACT_CAPACITY: usize = 8;

const FLAG_ON_GROUND: u8 = 1;
const FLAG_CRUSHABLE_GROUND: u8 = 1 << 1;
const FLAG_HIT_ROOF: u8 = 1 << 2;
const FLAG_HIT_LEFT: u8 = 1 << 3;
const FLAG_HIT_RIGHT: u8 = 1 << 4;
const FLAG_ON_MOVING_PLATFORM: u8 = 1 << 5;

/// This tick's contacts plus the aggregate flags derived from them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContactLedger {
    flags: u8,
    floor_angle: Fp,
    tile_contacts: Vec<TileContact>,
    object_contacts: Vec<ObjectContact>,
}

impl ContactLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clears contacts, flags, and floor angle ahead of repopulation.
    pub fn reset(&mut self) {
        self.flags = 0;
        self.floor_angle = Fp::ZERO;
        self.tile_contacts.clear();
        self.object_contacts.clear();
    }

    /// Records a tile contact, discarding the oldest one at capacity.
    pub fn push_tile_contact(&mut self, contact: TileContact) {
        if self.tile_contacts.len() == TILE_CONTACT_CAPACITY {
            self.tile_contacts.remove(0);
        }
        self.tile_contacts.push(contact);
    }

    /// Records an object contact, discarding the oldest one at capacity.
    pub fn push_object_contact(&mut self, contact: ObjectContact) {
        if self.object_contacts.len() == OBJECT_CONTACT_CAPACITY {
            self.object_contacts.remove(0);
        }
        self.object_contacts.push(contact);
    }

    pub fn tile_contacts(&self) -> &[TileContact] {
        &self.tile_contacts
    }

    pub fn object_contacts(&self) -> &[ObjectContact] {
        &self.object_contacts
    }

    /// Tile contacts carrying any of the given direction bits.
    pub fn tiles_from_direction(
        &self,
        direction: InteractionDirection,
    ) -> impl Iterator<Item = &TileContact> + '_ {
        self.tile_contacts
            .iter()
            .filter(move |c| c.direction.intersects(direction))
    }

    /// Object contacts carrying any of the given direction bits.
    pub fn objects_from_direction(
        &self,
        direction: InteractionDirection,
    ) -> impl Iterator<Item = &ObjectContact> + '_ {
        self.object_contacts
            .iter()
            .filter(move |c| c.direction.intersects(direction))
    }

    pub fn tiles_standing_on(&self) -> impl Iterator<Item = &TileContact> + '_ {
        self.tiles_from_direction(InteractionDirection::DOWN)
    }

    pub fn tiles_hit_side(&self) -> impl Iterator<Item = &TileContact> + '_ {
        self.tiles_from_direction(InteractionDirection::SIDES)
    }

    pub fn tiles_hit_roof(&self) -> impl Iterator<Item = &TileContact> + '_ {
        self.tiles_from_direction(InteractionDirection::UP)
    }

    pub fn objects_standing_on(&self) -> impl Iterator<Item = &ObjectContact> + '_ {
        self.objects_from_direction(InteractionDirection::DOWN)
    }

    fn test(&self, flag: u8) -> bool {
        self.flags & flag != 0
    }

    fn set(&mut self, flag: u8, value: bool) {
        if value {
            self.flags |= flag;
        } else {
            self.flags &= !flag;
        }
    }

    pub fn on_ground(&self) -> bool {
        self.test(FLAG_ON_GROUND)
    }

    pub fn set_on_ground(&mut self, value: bool) {
        self.set(FLAG_ON_GROUND, value);
    }

    pub fn crushable_ground(&self) -> bool {
        self.test(FLAG_CRUSHABLE_GROUND)
    }

    pub fn set_crushable_ground(&mut self, value: bool) {
        self.set(FLAG_CRUSHABLE_GROUND, value);
    }

    pub fn hit_roof(&self) -> bool {
        self.test(FLAG_HIT_ROOF)
    }

    pub fn set_hit_roof(&mut self, value: bool) {
        self.set(FLAG_HIT_ROOF, value);
    }

    pub fn hit_left(&self) -> bool {
        self.test(FLAG_HIT_LEFT)
    }

    pub fn set_hit_left(&mut self, value: bool) {
        self.set(FLAG_HIT_LEFT, value);
    }

    pub fn hit_right(&self) -> bool {
        self.test(FLAG_HIT_RIGHT)
    }

    pub fn set_hit_right(&mut self, value: bool) {
        self.set(FLAG_HIT_RIGHT, value);
    }

    pub fn on_moving_platform(&self) -> bool {
        self.test(FLAG_ON_MOVING_PLATFORM)
    }

    pub fn set_on_moving_platform(&mut self, value: bool) {
        self.set(FLAG_ON_MOVING_PLATFORM, value);
    }

    /// Sine of the floor angle under the entity this tick.
    pub fn floor_angle(&self) -> Fp {
        self.floor_angle
    }

    pub fn set_floor_angle(&mut self, value: Fp) {
        self.floor_angle = value;
    }
}
