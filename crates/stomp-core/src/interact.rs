//! Interaction dispatch.
//!
//! Turns this tick's object contacts into at most one handler call per
//! entity pair. Pairs are canonicalized to (lower id, higher id), deduped,
//! and processed in ascending canonical order, so the outcome does not
//! depend on how the ledgers happened to be filled. The dispatcher itself
//! holds no game rules; everything interesting lives in the handlers.

use tracing::trace;

use crate::contacts::InteractionDirection;
use crate::entities::{Entity, EntityId, TickContext, pair_mut};
use crate::tiles::{TileCoordinate, TileInstance, TileKind};

/// Runs every pairwise interaction recorded by the resolver this tick.
/// `entities` must be sorted by id.
pub fn dispatch_interactions(entities: &mut [Entity], ctx: &mut TickContext<'_>) {
    let mut pairs: Vec<(EntityId, EntityId)> = Vec::new();
    for entity in entities.iter() {
        if !entity.is_active() {
            continue;
        }
        for contact in entity.core.body.contacts.object_contacts() {
            let (lo, hi) = if entity.id() < contact.entity {
                (entity.id(), contact.entity)
            } else {
                (contact.entity, entity.id())
            };
            pairs.push((lo, hi));
        }
    }
    pairs.sort_unstable();
    pairs.dedup();

    for (lo, hi) in pairs {
        dispatch_pair(entities, lo, hi, ctx);
    }
}

fn dispatch_pair(entities: &mut [Entity], lo: EntityId, hi: EntityId, ctx: &mut TickContext<'_>) {
    let Ok(i) = entities.binary_search_by_key(&lo, Entity::id) else {
        return;
    };
    let Ok(j) = entities.binary_search_by_key(&hi, Entity::id) else {
        return;
    };

    let (a, b) = pair_mut(entities, i, j);
    // An earlier handler this pass may have despawned either party.
    if !a.is_active() || !b.is_active() {
        return;
    }

    match (a.is_player(), b.is_player()) {
        (true, false) => {
            let direction = contact_direction(b, a.id());
            trace!(player = a.id(), target = b.id(), ?direction, "interaction");
            let Entity { core, behavior } = b;
            behavior.interact_with_player(core, a, direction, ctx);
        }
        (false, true) => {
            let direction = contact_direction(a, b.id());
            trace!(player = b.id(), target = a.id(), ?direction, "interaction");
            let Entity { core, behavior } = a;
            behavior.interact_with_player(core, b, direction, ctx);
        }
        // Player-player and non-player pairs resolve through physics alone.
        (true, true) | (false, false) => {}
    }
}

/// Direction of the recorded contact with `other`, from `entity`'s
/// perspective. Falls back to `NONE` when the ledger entry was ring-dropped.
fn contact_direction(entity: &Entity, other: EntityId) -> InteractionDirection {
    entity
        .core
        .body
        .contacts
        .object_contacts()
        .iter()
        .find(|c| c.entity == other)
        .map_or(InteractionDirection::NONE, |c| c.direction)
}

/// Bumps a grid cell (a block hit from below, or groundpounded from above).
///
/// Breakable tiles break to empty; bump blocks keep their tile but still
/// shake. Either way the entities recorded standing on or against the cell
/// get their `block_bump` callback, in id order. Returns whether the tile
/// reacted at all.
pub fn bump_tile(
    entities: &mut [Entity],
    bumper: EntityId,
    location: TileCoordinate,
    ctx: &mut TickContext<'_>,
) -> bool {
    let tile = ctx.stage.tile_at_coord(location);
    match tile.kind {
        TileKind::Breakable => {
            ctx.stage.set_tile(
                location.x,
                location.y,
                TileInstance::default(),
                ctx.events,
            );
        }
        TileKind::BumpBlock => {
            // The block stays; occupants still get popped.
        }
        TileKind::Empty | TileKind::Solid | TileKind::Platform => return false,
    }

    for entity in entities.iter_mut() {
        if !entity.is_active() || entity.id() == bumper {
            continue;
        }
        let Some(contact) = entity
            .core
            .body
            .contacts
            .tile_contacts()
            .iter()
            .find(|c| c.location == location)
            .copied()
        else {
            continue;
        };

        let Entity { core, behavior } = entity;
        behavior.block_bump(core, bumper, location, contact.direction, ctx);
    }
    true
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;
    use crate::body::PhysicsBody;
    use crate::contacts::ObjectContact;
    use crate::entities::{Behavior, Collectible, PlayerState, ShellEnemy, ShellState};
    use crate::events::{GameEvent, SimEvents};
    use crate::fp::{Fp, FpVec2, fp, fp_ratio};
    use crate::resolver::resolve_contacts;
    use crate::tiles::{StageGrid, tests::open_stage};

    fn body_at(x: i64, y: i64) -> PhysicsBody {
        PhysicsBody::new(FpVec2::from_ints(x, y), FpVec2::new(fp_ratio(1, 4), fp_ratio(1, 4)))
    }

    fn run_dispatch(stage: &mut StageGrid, entities: &mut [Entity]) -> SimEvents {
        let mut events = SimEvents::new();
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let positions: Vec<_> = entities
            .iter()
            .map(|e| (e.id(), e.core.body.position))
            .collect();
        let mut ctx = TickContext {
            tick: 100,
            stage,
            events: &mut events,
            rng: &mut rng,
            positions: &positions,
        };
        dispatch_interactions(entities, &mut ctx);
        events
    }

    #[test]
    fn test_pair_dispatched_once_despite_mirrored_contacts() {
        let mut stage = open_stage(16, 8);
        let mut entities = vec![
            Entity::new(0, body_at(2, 1), Behavior::Player(PlayerState::default())),
            Entity::new(1, body_at(2, 1), Behavior::Collectible(Collectible::loose_coin(0))),
        ];
        resolve_contacts(&stage, &mut entities, fp_ratio(1, 60));
        // Both ledgers carry the contact.
        assert!(!entities[0].core.body.contacts.object_contacts().is_empty());
        assert!(!entities[1].core.body.contacts.object_contacts().is_empty());

        let events = run_dispatch(&mut stage, &mut entities);

        assert_eq!(entities[0].player().map(|p| p.coins), Some(1));
        let collected: Vec<_> = events
            .notifications()
            .iter()
            .filter(|e| matches!(e, GameEvent::Collected { .. }))
            .collect();
        assert_eq!(collected.len(), 1);
    }

    #[test]
    fn test_collectible_collected_exactly_once_with_two_players() {
        let mut stage = open_stage(16, 8);
        let mut entities = vec![
            Entity::new(3, body_at(2, 1), Behavior::Player(PlayerState::default())),
            Entity::new(5, body_at(2, 1), Behavior::Collectible(Collectible::loose_coin(0))),
            Entity::new(9, body_at(2, 1), Behavior::Player(PlayerState::default())),
        ];
        resolve_contacts(&stage, &mut entities, fp_ratio(1, 60));

        let events = run_dispatch(&mut stage, &mut entities);

        // Lower canonical pair (3, 5) wins; (5, 9) hits the collected guard.
        assert_eq!(entities[0].player().map(|p| p.coins), Some(1));
        assert_eq!(entities[2].player().map(|p| p.coins), Some(0));
        let collected: Vec<_> = events
            .notifications()
            .iter()
            .filter(|e| matches!(e, GameEvent::Collected { .. }))
            .collect();
        assert_eq!(collected.len(), 1);
    }

    #[test]
    fn test_despawned_party_is_skipped() {
        let mut stage = open_stage(16, 8);
        let mut entities = vec![
            Entity::new(0, body_at(2, 1), Behavior::Player(PlayerState::default())),
            Entity::new(1, body_at(2, 1), Behavior::Collectible(Collectible::loose_coin(0))),
        ];
        resolve_contacts(&stage, &mut entities, fp_ratio(1, 60));
        entities[1].core.despawn();

        run_dispatch(&mut stage, &mut entities);

        assert_eq!(entities[0].player().map(|p| p.coins), Some(0));
    }

    #[test]
    fn test_direction_passed_from_target_perspective() {
        let mut stage = open_stage(16, 8);
        // Player above the shell: the shell sees an UP contact and treats it
        // as a stomp.
        let mut shell_body = body_at(2, 1);
        let mut player_body = body_at(2, 1);
        player_body.position.y += fp_ratio(3, 8);
        shell_body.half_extents = FpVec2::new(fp_ratio(1, 4), fp_ratio(1, 4));

        let mut entities = vec![
            Entity::new(0, player_body, Behavior::Player(PlayerState::default())),
            Entity::new(1, shell_body, Behavior::ShellEnemy(ShellEnemy::new(false, true))),
        ];
        resolve_contacts(&stage, &mut entities, fp_ratio(1, 60));
        assert_eq!(
            entities[1].core.body.contacts.object_contacts(),
            &[ObjectContact {
                entity: 0,
                direction: InteractionDirection::UP,
            }]
        );

        run_dispatch(&mut stage, &mut entities);

        match &entities[1].behavior {
            Behavior::ShellEnemy(shell) => assert_eq!(shell.state, ShellState::InShellStationary),
            other => panic!("unexpected behavior {other:?}"),
        }
        assert_eq!(entities[0].player().map(|p| p.do_entity_bounce), Some(true));
    }

    #[test]
    fn test_bump_breaks_breakable_and_pops_occupant() {
        let mut stage = open_stage(16, 8);
        let mut events = SimEvents::new();
        stage.set_tile(4, 2, TileInstance::of_kind(TileKind::Breakable), &mut events);
        let top = stage.relative_tile_to_world(TileCoordinate::new(4, 2));

        let mut shell_body = PhysicsBody::new(
            FpVec2::new(top.x, top.y + fp_ratio(3, 8)),
            FpVec2::new(fp_ratio(1, 8), fp_ratio(1, 8)),
        );
        shell_body.velocity.y = fp(-1);
        let mut entities = vec![
            Entity::new(2, body_at(1, 1), Behavior::Player(PlayerState::default())),
            Entity::new(4, shell_body, Behavior::ShellEnemy(ShellEnemy::new(false, true))),
        ];
        resolve_contacts(&stage, &mut entities, fp_ratio(1, 60));
        assert!(entities[1].core.body.contacts.on_ground());

        let mut bump_events = SimEvents::new();
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let positions: Vec<_> = entities
            .iter()
            .map(|e| (e.id(), e.core.body.position))
            .collect();
        let mut ctx = TickContext {
            tick: 100,
            stage: &mut stage,
            events: &mut bump_events,
            rng: &mut rng,
            positions: &positions,
        };
        assert!(bump_tile(&mut entities, 2, TileCoordinate::new(4, 2), &mut ctx));

        assert_eq!(stage.tile_at(4, 2), TileInstance::default());
        // Tile change first, then the enemy's own reaction.
        assert!(matches!(
            bump_events.notifications()[0],
            GameEvent::TileChanged { x: 4, y: 2, .. }
        ));
        match &entities[1].behavior {
            Behavior::ShellEnemy(shell) => assert_eq!(shell.state, ShellState::InShellStationary),
            other => panic!("unexpected behavior {other:?}"),
        }
        assert!(entities[1].core.body.velocity.y > Fp::ZERO);

        // Solid tiles do not react.
        let mut scratch = SimEvents::new();
        stage.set_tile(5, 2, TileInstance::of_kind(TileKind::Solid), &mut scratch);
        let positions: Vec<_> = entities
            .iter()
            .map(|e| (e.id(), e.core.body.position))
            .collect();
        let mut plain = SimEvents::new();
        let mut rng2 = ChaCha8Rng::seed_from_u64(7);
        let mut ctx2 = TickContext {
            tick: 101,
            stage: &mut stage,
            events: &mut plain,
            rng: &mut rng2,
            positions: &positions,
        };
        assert!(!bump_tile(&mut entities, 2, TileCoordinate::new(5, 2), &mut ctx2));
    }
}
