//! Tile and object contact resolution.
//!
//! Runs once per tick after integration. Every ledger is cleared up front
//! and repopulated in a fixed order: tile contacts per entity in id order,
//! then object contacts per entity pair in (lower id, higher id) order.
//! Identical input state produces identical ledgers on every peer.

use tracing::trace;

use crate::body::PhysicsBody;
use crate::contacts::{InteractionDirection, ObjectContact, TileContact};
use crate::entities::{Entity, pair_mut};
use crate::fp::{Aabb, Fp, FpVec2, fp_ratio};
use crate::tiles::{StageGrid, TileCoordinate, TileInstance, TileKind};

/// Tile half extent in world units. Tiles are half a unit across.
fn tile_half_extents() -> FpVec2 {
    FpVec2::new(fp_ratio(1, 4), fp_ratio(1, 4))
}

/// Rebuilds every entity's contact ledger for this tick. `entities` must be
/// sorted by id; `dt` is the tick duration the velocities are swept over.
pub fn resolve_contacts(stage: &StageGrid, entities: &mut [Entity], dt: Fp) {
    for entity in entities.iter_mut() {
        entity.core.body.contacts.reset();
        entity.core.body.ground_velocity = FpVec2::ZERO;
    }

    for entity in entities.iter_mut() {
        if entity.core.despawned {
            continue;
        }
        resolve_tile_contacts(stage, &mut entity.core.body, dt);
    }

    resolve_object_contacts(stage, entities);
}

fn resolve_tile_contacts(stage: &StageGrid, body: &mut PhysicsBody, dt: Fp) {
    if body.disable_collision {
        return;
    }
    let current = body.aabb();
    if current.is_degenerate() {
        return;
    }

    let motion = body.velocity * dt;
    let swept = current.expanded_by_motion(motion);
    // Raw (unwrapped) coordinates keep the candidate range contiguous across
    // the seam; each column wraps individually at lookup time.
    let min = stage.world_to_relative_tile_raw(swept.min());
    let max = stage.world_to_relative_tile_raw(swept.max());

    for y in min.y..=max.y {
        for x in min.x..=max.x {
            let column = stage.wrap_tile_x(x);
            let tile = lookup_tile(stage, column, y);
            if !tile.is_collidable() {
                continue;
            }

            let tile_box = Aabb::new(
                stage.relative_tile_to_world(TileCoordinate::new(x, y)),
                tile_half_extents(),
            );
            if !swept.overlaps(&tile_box) {
                continue;
            }

            let Some(mut direction) = classify(&current, motion, &tile_box) else {
                continue;
            };

            if tile.kind == TileKind::Platform {
                // Semisolid: only the top edge exists, and only for bodies
                // moving down onto it.
                if !direction.contains(InteractionDirection::DOWN)
                    || body.velocity.y > Fp::ZERO
                {
                    continue;
                }
                direction = InteractionDirection::DOWN;
            }

            trace!(x = column, y, ?direction, "tile contact");
            body.contacts.push_tile_contact(TileContact {
                location: TileCoordinate::new(column, y),
                direction,
            });
            apply_tile_flags(body, tile, direction);
        }
    }
}

/// Tile lookup for collision purposes. Rows above the grid top read as
/// solid on stages with extended ceiling hitboxes.
fn lookup_tile(stage: &StageGrid, x: i32, y: i32) -> TileInstance {
    if y >= stage.height() && stage.extend_ceiling_hitboxes() {
        return TileInstance::of_kind(TileKind::Solid);
    }
    stage.tile_at(x, y)
}

/// Classifies a candidate box against the body's current box and motion.
/// Returns the direction mask from the body's perspective, or `None` when
/// the candidate sits in the swept region but is never actually reached.
fn classify(current: &Aabb, motion: FpVec2, other: &Aabb) -> Option<InteractionDirection> {
    let dx = other.center.x - current.center.x;
    let dy = other.center.y - current.center.y;
    let overlap_x = (current.half_extents.x + other.half_extents.x) - dx.abs();
    let overlap_y = (current.half_extents.y + other.half_extents.y) - dy.abs();

    if overlap_x > Fp::ZERO && overlap_y > Fp::ZERO {
        return Some(penetration_direction(dx, dy, overlap_x, overlap_y));
    }

    // Not yet touching: the contact only exists if this tick's motion
    // carries the body toward the candidate on the open axis.
    let mut direction = InteractionDirection::NONE;
    if overlap_y > Fp::ZERO {
        if motion.x < Fp::ZERO && dx < Fp::ZERO {
            direction |= InteractionDirection::LEFT;
        } else if motion.x > Fp::ZERO && dx > Fp::ZERO {
            direction |= InteractionDirection::RIGHT;
        }
    }
    if overlap_x > Fp::ZERO {
        if motion.y < Fp::ZERO && dy < Fp::ZERO {
            direction |= InteractionDirection::DOWN;
        } else if motion.y > Fp::ZERO && dy > Fp::ZERO {
            direction |= InteractionDirection::UP;
        }
    }

    if direction.is_none() {
        None
    } else {
        Some(direction)
    }
}

/// Direction of an established interpenetration: the shallower axis wins,
/// equal overlaps are a corner hit and set both bits.
fn penetration_direction(dx: Fp, dy: Fp, overlap_x: Fp, overlap_y: Fp) -> InteractionDirection {
    let horizontal = if dx < Fp::ZERO {
        InteractionDirection::LEFT
    } else {
        InteractionDirection::RIGHT
    };
    let vertical = if dy < Fp::ZERO {
        InteractionDirection::DOWN
    } else {
        InteractionDirection::UP
    };

    match overlap_x.cmp(&overlap_y) {
        std::cmp::Ordering::Less => horizontal,
        std::cmp::Ordering::Greater => vertical,
        std::cmp::Ordering::Equal => horizontal | vertical,
    }
}

fn apply_tile_flags(body: &mut PhysicsBody, tile: TileInstance, direction: InteractionDirection) {
    if direction.contains(InteractionDirection::DOWN) {
        body.contacts.set_on_ground(true);
        if tile.kind == TileKind::Breakable {
            body.contacts.set_crushable_ground(true);
        }
        // The steepest slope under the body this tick wins.
        if tile.floor_slope.abs() > body.contacts.floor_angle().abs() {
            body.contacts.set_floor_angle(tile.floor_slope);
        }
    }
    if direction.contains(InteractionDirection::UP) {
        body.contacts.set_hit_roof(true);
    }
    if direction.contains(InteractionDirection::LEFT) {
        body.contacts.set_hit_left(true);
    }
    if direction.contains(InteractionDirection::RIGHT) {
        body.contacts.set_hit_right(true);
    }
}

fn resolve_object_contacts(stage: &StageGrid, entities: &mut [Entity]) {
    let len = entities.len();
    for i in 0..len {
        for j in (i + 1)..len {
            let (a, b) = pair_mut(entities, i, j);
            if a.core.despawned || b.core.despawned {
                continue;
            }

            let body_a = &mut a.core.body;
            let body_b = &mut b.core.body;
            if body_a.disable_collision || body_b.disable_collision {
                continue;
            }
            if body_a.aabb().is_degenerate() || body_b.aabb().is_degenerate() {
                continue;
            }

            // Compare through the seam-unwrapped representation of b.
            let bx = stage.unwrap_world_x(body_a.position.x, body_b.position.x);
            let dx = bx - body_a.position.x;
            let dy = body_b.position.y - body_a.position.y;
            let overlap_x = (body_a.half_extents.x + body_b.half_extents.x) - dx.abs();
            let overlap_y = (body_a.half_extents.y + body_b.half_extents.y) - dy.abs();
            if overlap_x <= Fp::ZERO || overlap_y <= Fp::ZERO {
                continue;
            }

            let direction = penetration_direction(dx, dy, overlap_x, overlap_y);
            trace!(a = a.core.id, b = b.core.id, ?direction, "object contact");

            body_a.contacts.push_object_contact(ObjectContact {
                entity: b.core.id,
                direction,
            });
            body_b.contacts.push_object_contact(ObjectContact {
                entity: a.core.id,
                direction: direction.opposite(),
            });

            apply_object_flags(body_a, &*body_b, direction);
            apply_object_flags(body_b, &*body_a, direction.opposite());
        }
    }
}

fn apply_object_flags(body: &mut PhysicsBody, other: &PhysicsBody, direction: InteractionDirection) {
    if direction.contains(InteractionDirection::DOWN) {
        body.contacts.set_on_ground(true);
        if other.moving_platform {
            body.contacts.set_on_moving_platform(true);
            body.ground_velocity = other.velocity;
        }
    }
    if direction.contains(InteractionDirection::UP) {
        body.contacts.set_hit_roof(true);
    }
    if direction.contains(InteractionDirection::LEFT) {
        body.contacts.set_hit_left(true);
    }
    if direction.contains(InteractionDirection::RIGHT) {
        body.contacts.set_hit_right(true);
    }
}
