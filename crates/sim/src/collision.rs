use tracing::trace;

use crate::component::system_for;
use crate::entity::EntityId;
use crate::events::SimEvent;
use crate::geometry::PlacedBox;
use crate::hitbox::{CollisionType, HitboxFlag};
use crate::math::Point;
use crate::terrain::{TerrainQuery, SUBTILE_SIZE};
use crate::world::World;

/// Velocity added per unit of overlap when either side is soft.
const SOFT_COLLISION_RESPONSE: f32 = 12.0;

/// One side's view of an overlapping hitbox pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HitboxCollision {
    pub entity: EntityId,
    pub other: EntityId,
    pub hitbox: usize,
    pub other_hitbox: usize,
    pub point: Point,
    /// Moves `entity`'s hitbox out of `other`'s.
    pub push: Point,
}

impl HitboxCollision {
    pub fn mirrored(&self) -> HitboxCollision {
        HitboxCollision {
            entity: self.other,
            other: self.entity,
            hitbox: self.other_hitbox,
            other_hitbox: self.hitbox,
            point: self.point,
            push: -self.push,
        }
    }
}

fn reach_of(world: &World, entity: EntityId) -> f32 {
    let transform = world.components.transform.get(entity);
    let origin = transform.position();
    transform
        .hitboxes()
        .iter()
        .map(|hitbox| origin.distance_to(hitbox.position) + hitbox.shape.bounding_radius())
        .fold(0.0, f32::max)
}

/// Furthest any live entity's hitboxes extend from its chunk-registered
/// position. Broadphase searches widen by this much.
pub(crate) fn max_entity_reach(world: &World) -> f32 {
    live_colliders(world)
        .into_iter()
        .map(|entity| reach_of(world, entity))
        .fold(0.0, f32::max)
}

fn live_colliders(world: &World) -> Vec<EntityId> {
    let mut entities = world
        .components
        .transform
        .active()
        .iter()
        .copied()
        .filter(|entity| !world.is_flagged_for_removal(*entity))
        .collect::<Vec<_>>();
    entities.sort();
    entities
}

fn detect_entity_collisions(world: &World) -> Vec<HitboxCollision> {
    let entities = live_colliders(world);
    let max_reach = max_entity_reach(world);

    let mut found = Vec::new();
    for &entity in &entities {
        let transform = world.components.transform.get(entity);
        let search = world
            .chunks
            .bounds_around(transform.position(), reach_of(world, entity) + max_reach);
        let bounds = transform.bounds();

        for other in world.chunks.entities_in_bounds(search) {
            if other <= entity
                || world.is_flagged_for_removal(other)
                || !world.components.transform.is_joined(other)
            {
                continue;
            }
            let other_transform = world.components.transform.get(other);
            if !bounds.overlaps(&other_transform.bounds()) {
                continue;
            }
            for (index, hitbox) in transform.hitboxes().iter().enumerate() {
                for (other_index, other_hitbox) in other_transform.hitboxes().iter().enumerate() {
                    if !hitbox.can_collide_with(other_hitbox) {
                        continue;
                    }
                    if let Some(result) = hitbox.placed().collide(&other_hitbox.placed()) {
                        found.push(HitboxCollision {
                            entity,
                            other,
                            hitbox: index,
                            other_hitbox: other_index,
                            point: result.point,
                            push: result.push,
                        });
                    }
                }
            }
        }
    }
    found
}

fn resolve_overlap(world: &mut World, collision: &HitboxCollision) {
    let (a, b) = {
        let transform = world.components.transform.get(collision.entity);
        let other_transform = world.components.transform.get(collision.other);
        (
            transform.hitboxes()[collision.hitbox].clone(),
            other_transform.hitboxes()[collision.other_hitbox].clone(),
        )
    };
    if a.has_flag(HitboxFlag::DamagesOnContact) || b.has_flag(HitboxFlag::DamagesOnContact) {
        return;
    }
    let root_a = world
        .components
        .transform
        .get(collision.entity)
        .root_of(collision.hitbox);
    let root_b = world
        .components
        .transform
        .get(collision.other)
        .root_of(collision.other_hitbox);

    let total_mass = a.mass + b.mass;
    let (share_a, share_b) = if total_mass > 0.0 {
        (b.mass / total_mass, a.mass / total_mass)
    } else {
        (0.5, 0.5)
    };

    if a.collision_type == CollisionType::Solid && b.collision_type == CollisionType::Solid {
        world
            .components
            .transform
            .get_mut(collision.entity)
            .push_by(root_a, collision.push * share_a);
        world
            .components
            .transform
            .get_mut(collision.other)
            .push_by(root_b, -collision.push * share_b);
    } else {
        world
            .components
            .transform
            .get_mut(collision.entity)
            .add_velocity(root_a, collision.push * (SOFT_COLLISION_RESPONSE * share_a));
        world
            .components
            .transform
            .get_mut(collision.other)
            .add_velocity(root_b, -collision.push * (SOFT_COLLISION_RESPONSE * share_b));
    }
}

fn dispatch_hitbox_collision(world: &mut World, collision: &HitboxCollision) {
    if world.is_flagged_for_removal(collision.entity) {
        return;
    }
    for kind in world.components.kinds_of(collision.entity) {
        system_for(kind).on_hitbox_collision(world, collision);
    }
}

/// Detects overlapping hitbox pairs between entities, separates them and
/// runs every collision hook on both sides.
pub fn run_entity_collisions(world: &mut World) -> u32 {
    let collisions = detect_entity_collisions(world);
    for collision in &collisions {
        if world.is_flagged_for_removal(collision.entity) || world.is_flagged_for_removal(collision.other) {
            continue;
        }
        resolve_overlap(world, collision);
        world.emit(SimEvent::HitboxCollision {
            entity: collision.entity,
            other: collision.other,
        });
        dispatch_hitbox_collision(world, collision);
        dispatch_hitbox_collision(world, &collision.mirrored());
    }
    for entity in live_colliders(world) {
        world.components.transform.get_mut(entity).update_poses();
    }
    collisions.len() as u32
}

#[derive(Debug, Clone, Copy)]
struct WallContact {
    hitbox: usize,
    subtile: (u32, u32),
    push: Point,
}

fn detect_wall_contacts(world: &World, entity: EntityId) -> Vec<WallContact> {
    let terrain = &world.terrain;
    let max_subtile_x = (terrain.width() / SUBTILE_SIZE) as u32;
    let max_subtile_y = (terrain.height() / SUBTILE_SIZE) as u32;
    let mut contacts = Vec::new();

    for (index, hitbox) in world.components.transform.get(entity).hitboxes().iter().enumerate() {
        if !hitbox.collides_with_walls() {
            continue;
        }
        let placed = hitbox.placed();
        let aabb = placed.aabb();
        if aabb.max.x < 0.0 || aabb.max.y < 0.0 {
            continue;
        }
        let min_x = (aabb.min.x.max(0.0) / SUBTILE_SIZE) as u32;
        let min_y = (aabb.min.y.max(0.0) / SUBTILE_SIZE) as u32;
        let max_x = ((aabb.max.x / SUBTILE_SIZE) as u32).min(max_subtile_x);
        let max_y = ((aabb.max.y / SUBTILE_SIZE) as u32).min(max_subtile_y);

        for subtile_y in min_y..=max_y {
            for subtile_x in min_x..=max_x {
                if !terrain.is_wall_subtile(subtile_x, subtile_y) {
                    continue;
                }
                let wall = PlacedBox::rectangle(
                    crate::terrain::subtile_center(subtile_x, subtile_y),
                    SUBTILE_SIZE,
                    SUBTILE_SIZE,
                    0.0,
                );
                if let Some(result) = placed.collide(&wall) {
                    contacts.push(WallContact {
                        hitbox: index,
                        subtile: (subtile_x, subtile_y),
                        push: result.push,
                    });
                }
            }
        }
    }
    contacts
}

/// Per-axis largest push, so adjacent wall segments do not stack.
fn combine_pushes(pushes: impl Iterator<Item = Point>) -> Point {
    let mut combined = Point::ZERO;
    for push in pushes {
        if push.x.abs() > combined.x.abs() {
            combined.x = push.x;
        }
        if push.y.abs() > combined.y.abs() {
            combined.y = push.y;
        }
    }
    combined
}

/// Pushes hitboxes out of wall subtiles. Every overlapping segment produces
/// exactly one callback; hitboxes that ignore walls produce none.
pub fn run_wall_collisions(world: &mut World) -> u32 {
    let mut total = 0;
    for entity in live_colliders(world) {
        let contacts = detect_wall_contacts(world, entity);
        if contacts.is_empty() {
            continue;
        }

        let transform = world.components.transform.get_mut(entity);
        let mut roots = contacts
            .iter()
            .map(|contact| transform.root_of(contact.hitbox))
            .collect::<Vec<_>>();
        roots.sort_unstable();
        roots.dedup();
        for root in roots {
            let push = combine_pushes(
                contacts
                    .iter()
                    .filter(|contact| transform.root_of(contact.hitbox) == root)
                    .map(|contact| contact.push),
            );
            transform.push_by(root, push);
            if let Some(normal) = push.normalized() {
                let velocity = transform.hitboxes()[root].velocity;
                let into_wall = velocity.dot(normal);
                if into_wall < 0.0 {
                    transform.add_velocity(root, -(normal * into_wall));
                }
            }
        }
        transform.update_poses();

        for contact in &contacts {
            total += 1;
            world.emit(SimEvent::WallCollision {
                entity,
                hitbox: contact.hitbox,
                subtile: contact.subtile,
            });
            trace!(
                entity = entity.0,
                subtile_x = contact.subtile.0,
                subtile_y = contact.subtile.1,
                "wall_collision"
            );
            for kind in world.components.kinds_of(entity) {
                system_for(kind).on_wall_collision(world, entity, contact.hitbox);
            }
        }
    }
    total
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn combined_push_takes_largest_component_per_axis() {
        let combined = combine_pushes(
            [Point::new(-2.0, 0.0), Point::new(-3.0, 1.0), Point::new(1.0, 0.5)].into_iter(),
        );
        assert_eq!(combined, Point::new(-3.0, 1.0));
    }

    #[test]
    fn mirrored_collision_swaps_sides() {
        let collision = HitboxCollision {
            entity: EntityId(1),
            other: EntityId(2),
            hitbox: 0,
            other_hitbox: 3,
            point: Point::new(1.0, 1.0),
            push: Point::new(2.0, 0.0),
        };
        let mirrored = collision.mirrored();
        assert_eq!(mirrored.entity, EntityId(2));
        assert_eq!(mirrored.other_hitbox, 0);
        assert_eq!(mirrored.push, Point::new(-2.0, 0.0));
        assert_eq!(mirrored.mirrored(), collision);
    }

    #[test]
    fn weightless_overlap_is_split_evenly() {
        use crate::config::SimConfig;
        use crate::entities::EntityConfig;
        use crate::entity::EntityType;
        use crate::hitbox::HitboxDef;
        use crate::terrain::{Biome, TerrainGrid, TileType};
        use crate::transform::TransformComponent;

        let weightless = |position: Point| {
            EntityConfig::new(
                EntityType::Boulder,
                TransformComponent::new(position, 0.0, HitboxDef::circle(32.0).mass(0.0)),
            )
        };
        let mut world = World::new(
            SimConfig::default(),
            TerrainGrid::filled(16, 16, TileType::Grass, Biome::Grasslands),
        )
        .expect("world");
        let left = world.create_entity(weightless(Point::new(480.0, 500.0)), 0).expect("left");
        let right = world.create_entity(weightless(Point::new(520.0, 500.0)), 0).expect("right");
        let report = world.tick();
        assert!(report.hitbox_collisions > 0);

        let (left, right) = (world.position_of(left), world.position_of(right));
        assert!(left.is_finite() && right.is_finite());
        assert!(right.x - left.x > 40.0);
        assert!((left.midpoint(right).x - 500.0).abs() < 1e-3);
    }
}
