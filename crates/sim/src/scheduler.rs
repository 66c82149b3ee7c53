use std::collections::BTreeSet;

use tracing::{debug, warn};

use crate::collision::{run_entity_collisions, run_wall_collisions};
use crate::commands::CommandApplyStats;
use crate::component::{system_for, ComponentKind, COMPONENT_ORDER};
use crate::components::player;
use crate::entity::EntityId;
use crate::events::SimEvent;
use crate::physics::run_physics;
use crate::world::World;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickPhase {
    Commands,
    Joins,
    ComponentTicks,
    Physics,
    Collisions,
    Removals,
    DirtyFlags,
}

impl TickPhase {
    pub fn name(self) -> &'static str {
        match self {
            Self::Commands => "commands",
            Self::Joins => "joins",
            Self::ComponentTicks => "component_ticks",
            Self::Physics => "physics",
            Self::Collisions => "collisions",
            Self::Removals => "removals",
            Self::DirtyFlags => "dirty_flags",
        }
    }
}

/// Commands land before AI, AI before physics, physics before collisions,
/// and collisions before removal and dirty propagation.
pub const TICK_PHASE_ORDER: [TickPhase; 7] = [
    TickPhase::Commands,
    TickPhase::Joins,
    TickPhase::ComponentTicks,
    TickPhase::Physics,
    TickPhase::Collisions,
    TickPhase::Removals,
    TickPhase::DirtyFlags,
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub tick: u64,
    pub commands: CommandApplyStats,
    pub joined: u32,
    pub component_updates: u32,
    pub failed_updates: u32,
    pub hitbox_collisions: u32,
    pub wall_collisions: u32,
    pub removed: u32,
    pub dirty: u32,
}

#[derive(Debug, Default)]
pub struct TickScheduler {
    last_tick_order: Vec<TickPhase>,
    last_report: TickReport,
}

impl TickScheduler {
    pub fn last_tick_order(&self) -> &[TickPhase] {
        &self.last_tick_order
    }

    pub fn last_report(&self) -> TickReport {
        self.last_report
    }

    pub fn run_tick(&mut self, world: &mut World) -> TickReport {
        self.last_tick_order.clear();
        let mut report = TickReport {
            tick: world.tick_count(),
            ..TickReport::default()
        };
        for phase in TICK_PHASE_ORDER {
            self.last_tick_order.push(phase);
            self.run_phase(phase, world, &mut report);
        }

        world.set_tick_count(world.tick_count().saturating_add(1));
        world.events.finish_tick_rollover();
        self.last_report = report;
        report
    }

    fn run_phase(&self, phase: TickPhase, world: &mut World, report: &mut TickReport) {
        match phase {
            TickPhase::Commands => {
                report.commands = apply_commands(world);
            }
            TickPhase::Joins => {
                report.joined = run_joins(world);
            }
            TickPhase::ComponentTicks => {
                let (updates, failures) = run_component_ticks(world);
                report.component_updates = updates;
                report.failed_updates = failures;
            }
            TickPhase::Physics => {
                run_physics(world);
            }
            TickPhase::Collisions => {
                report.hitbox_collisions = run_entity_collisions(world);
                report.wall_collisions = run_wall_collisions(world);
            }
            TickPhase::Removals => {
                report.removed = run_removals(world);
            }
            TickPhase::DirtyFlags => {
                report.dirty = propagate_dirty_flags(world);
            }
        }
    }
}

fn apply_commands(world: &mut World) -> CommandApplyStats {
    let mut stats = CommandApplyStats::default();
    for queued in world.commands.drain_current_tick() {
        match player::apply_command(world, queued.entity, queued.command) {
            Ok(()) => stats.record(true),
            Err(error) => {
                stats.record(false);
                warn!(
                    entity = queued.entity.0,
                    command = queued.command.name(),
                    error = %error,
                    "command_rejected"
                );
            }
        }
    }
    world.commands.set_last_tick_apply_stats(stats);
    stats
}

fn run_joins(world: &mut World) -> u32 {
    let mut joined_by_kind = Vec::with_capacity(COMPONENT_ORDER.len());
    for kind in COMPONENT_ORDER {
        let joined = world.components.table_mut(kind).advance_join_delays();
        joined_by_kind.push((kind, joined));
    }

    let mut joined_entities = 0;
    for (kind, entities) in joined_by_kind {
        let system = system_for(kind);
        for entity in entities {
            if kind == ComponentKind::Transform {
                joined_entities += 1;
                world.emit(SimEvent::EntityJoined { entity });
                debug!(entity = entity.0, "entity_joined");
            }
            system.on_join(world, entity);
        }
    }
    joined_entities
}

fn run_component_ticks(world: &mut World) -> (u32, u32) {
    let tick = world.tick_count();
    let mut updates = 0;
    let mut failures = 0;
    for kind in COMPONENT_ORDER {
        let system = system_for(kind);
        let interval = u64::from(system.tick_interval(world.config()).max(1));
        let entities = world.components.table(kind).active_entities();
        for entity in entities {
            if world.is_flagged_for_removal(entity) {
                continue;
            }
            if interval > 1 {
                let Some(phase) = world.components.table(kind).tick_phase(entity) else {
                    continue;
                };
                if (tick + u64::from(phase)) % interval != 0 {
                    continue;
                }
            }
            match system.on_tick(world, entity) {
                Ok(()) => updates += 1,
                Err(error) => {
                    failures += 1;
                    warn!(
                        entity = entity.0,
                        component = ?kind,
                        error = %error,
                        "component_tick_failed"
                    );
                }
            }
        }
    }
    (updates, failures)
}

/// Flags attached children that go down with their parent.
fn cascade_removals(world: &World, doomed: &mut BTreeSet<EntityId>) {
    loop {
        let children = world
            .components
            .transform
            .entity_ids()
            .into_iter()
            .filter(|entity| !doomed.contains(entity))
            .filter(|entity| {
                let transform = world.components.transform.get(*entity);
                transform.destroy_with_parent
                    && transform
                        .attached_to
                        .is_some_and(|parent| doomed.contains(&parent))
            })
            .collect::<Vec<_>>();
        if children.is_empty() {
            return;
        }
        doomed.extend(children);
    }
}

fn run_removals(world: &mut World) -> u32 {
    if world.removal_flags.is_empty() {
        return 0;
    }
    let mut doomed = std::mem::take(&mut world.removal_flags);
    cascade_removals(world, &mut doomed);

    for entity in &doomed {
        for kind in world.components.kinds_of(*entity) {
            system_for(kind).pre_remove(world, *entity);
        }
    }
    for entity in &doomed {
        for kind in world.components.kinds_of(*entity) {
            system_for(kind).on_remove(world, *entity);
        }
    }
    for entity in &doomed {
        for kind in world.components.kinds_of(*entity) {
            world.components.table_mut(kind).remove_slot(*entity);
        }
        world.forget_entity(*entity);
        world.pending_dirty.remove(entity);
        world.emit(SimEvent::EntityRemoved { entity: *entity });
        debug!(entity = entity.0, "entity_removed");
    }
    doomed.len() as u32
}

fn propagate_dirty_flags(world: &mut World) -> u32 {
    for entity in world.components.transform.active().to_vec() {
        if world.components.transform.get_mut(entity).take_moved_since_report() {
            world.pending_dirty.insert(entity);
        }
    }
    let pending = std::mem::take(&mut world.pending_dirty);
    world.dirty_entities = pending
        .into_iter()
        .filter(|entity| world.entity_exists(*entity))
        .collect();
    world.dirty_entities.len() as u32
}
