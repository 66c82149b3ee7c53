use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::component::system_for;
use crate::components::cow::CowSpecies;
use crate::components::guardian_projectile::ProjectileKind;
use crate::components::slime::SlimeSize;
use crate::config::SimConfig;
use crate::entities::{self, EntityConfig};
use crate::entity::{EntityId, EntityType};
use crate::error::SimError;
use crate::math::Point;
use crate::terrain::{TerrainGrid, TerrainQuery};
use crate::world::World;

pub const SNAPSHOT_VERSION: u32 = 1;

/// Fixed-slot packet body. Every slot is one little-endian `f32`.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct PacketWriter {
    slots: Vec<f32>,
}

impl PacketWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write_f32(&mut self, value: f32) {
        self.slots.push(value);
    }

    pub fn write_point(&mut self, point: Point) {
        self.slots.push(point.x);
        self.slots.push(point.y);
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn slots(&self) -> &[f32] {
        &self.slots
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.slots.iter().flat_map(|slot| slot.to_le_bytes()).collect()
    }
}

/// Encodes every component of `entity` in registration order. Each component
/// must write exactly the slot count it declares.
pub fn encode_entity_packet(world: &World, entity: EntityId) -> Result<Vec<u8>, SimError> {
    if !world.entity_exists(entity) {
        return Err(SimError::UnknownEntity(entity.0));
    }
    let kinds = world.components().kinds_of(entity);
    let mut packet = PacketWriter::new();
    packet.write_f32(entity.0 as f32);
    packet.write_f32(kinds.len() as f32);
    for kind in kinds {
        let system = system_for(kind);
        let declared = system.packet_length(world, entity);
        let before = packet.len();
        system.add_to_packet(world, entity, &mut packet);
        let written = packet.len() - before;
        if written != declared {
            return Err(SimError::PacketLengthMismatch {
                component: kind,
                declared,
                written,
            });
        }
    }
    Ok(packet.into_bytes())
}

/// Type-specific state needed to rebuild an entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EntityState {
    Inert,
    Player {
        username: String,
    },
    Slime {
        size: SlimeSize,
        orbs: Vec<SlimeSize>,
        merge_weight: u32,
    },
    Cow {
        species: CowSpecies,
    },
    Krumblid,
    Serpent {
        segment_count: u32,
    },
    Guardian {
        home: Point,
    },
    GuardianSpikyBall {
        owner: EntityId,
        remaining_ticks: u32,
    },
    GuardianProjectile {
        projectile: ProjectileKind,
        owner: EntityId,
        velocity: Point,
        remaining_ticks: u32,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RootPose {
    pub position: Point,
    pub angle: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySnapshot {
    pub id: EntityId,
    pub entity_type: EntityType,
    pub roots: Vec<RootPose>,
    pub velocity: Point,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health: Option<f32>,
    pub state: EntityState,
}

impl EntitySnapshot {
    pub fn capture(world: &World, entity: EntityId) -> Option<Self> {
        let entity_type = world.entity_type(entity)?;
        let components = world.components();
        let transform = components.transform.try_get(entity)?;
        let roots = transform
            .hitboxes()
            .iter()
            .filter(|hitbox| hitbox.is_root())
            .map(|hitbox| RootPose {
                position: hitbox.position,
                angle: hitbox.angle,
            })
            .collect();

        let state = if let Some(player) = components.player.try_get(entity) {
            EntityState::Player {
                username: player.username.clone(),
            }
        } else if let Some(slime) = components.slime.try_get(entity) {
            EntityState::Slime {
                size: slime.size,
                orbs: slime.orbs.clone(),
                merge_weight: slime.merge_weight,
            }
        } else if let Some(cow) = components.cow.try_get(entity) {
            EntityState::Cow { species: cow.species }
        } else if components.krumblid.has(entity) {
            EntityState::Krumblid
        } else if let Some(serpent) = components.serpent.try_get(entity) {
            EntityState::Serpent {
                segment_count: serpent.segment_count,
            }
        } else if let Some(guardian) = components.guardian.try_get(entity) {
            EntityState::Guardian { home: guardian.home }
        } else if let Some(ball) = components.guardian_spiky_ball.try_get(entity) {
            EntityState::GuardianSpikyBall {
                owner: ball.owner,
                remaining_ticks: ball.remaining_ticks,
            }
        } else if let Some(projectile) = components.guardian_projectile.try_get(entity) {
            EntityState::GuardianProjectile {
                projectile: projectile.kind,
                owner: projectile.owner,
                velocity: projectile.velocity,
                remaining_ticks: projectile.remaining_ticks,
            }
        } else {
            EntityState::Inert
        };

        Some(Self {
            id: entity,
            entity_type,
            roots,
            velocity: transform.velocity(),
            health: components.health.try_get(entity).map(|health| health.health),
            state,
        })
    }

    fn origin(&self) -> Option<Point> {
        self.roots.first().map(|root| root.position)
    }

    fn reject(&self, reason: impl Into<String>) -> SimError {
        SimError::SnapshotEntity {
            entity: self.id.0,
            reason: reason.into(),
        }
    }

    /// Rebuilds the component bundle through the regular factories, then
    /// overlays the saved poses and health.
    pub fn to_entity_config(&self, config: &SimConfig) -> Result<EntityConfig, SimError> {
        let origin = self.origin().ok_or_else(|| self.reject("no root hitbox"))?;
        let mut bundle = match (&self.state, self.entity_type) {
            (EntityState::Inert, EntityType::Boulder) => entities::boulder(origin),
            (EntityState::Player { username }, EntityType::Player) => entities::player(origin, username),
            (
                EntityState::Slime {
                    size,
                    orbs,
                    merge_weight,
                },
                EntityType::Slime,
            ) => entities::slime_with_state(origin, *size, orbs.clone(), *merge_weight),
            (EntityState::Cow { species }, EntityType::Cow) => entities::cow_of_species(origin, *species, config),
            (EntityState::Krumblid, EntityType::Krumblid) => entities::krumblid(origin),
            (EntityState::Serpent { segment_count }, EntityType::Serpent) => {
                entities::serpent(origin, *segment_count)
            }
            (EntityState::Guardian { home }, EntityType::Guardian) => {
                let mut bundle = entities::guardian(origin, config);
                if let Some(guardian) = bundle.guardian.as_mut() {
                    guardian.home = *home;
                }
                bundle
            }
            (EntityState::GuardianSpikyBall { owner, remaining_ticks }, EntityType::GuardianSpikyBall) => {
                let mut bundle = entities::guardian_spiky_ball(origin, *owner, config);
                if let Some(ball) = bundle.guardian_spiky_ball.as_mut() {
                    ball.remaining_ticks = *remaining_ticks;
                }
                bundle
            }
            (
                EntityState::GuardianProjectile {
                    projectile,
                    owner,
                    velocity,
                    remaining_ticks,
                },
                entity_type,
            ) if entity_type == projectile.entity_type() => {
                let mut bundle = entities::guardian_projectile(origin, *owner, *projectile, *velocity, config);
                if let Some(state) = bundle.guardian_projectile.as_mut() {
                    state.remaining_ticks = *remaining_ticks;
                }
                bundle
            }
            (state, entity_type) => {
                return Err(self.reject(format!(
                    "state {state:?} does not match type {}",
                    entity_type.as_str()
                )))
            }
        };

        let root_indices = bundle
            .transform
            .hitboxes()
            .iter()
            .enumerate()
            .filter(|(_, hitbox)| hitbox.is_root())
            .map(|(index, _)| index)
            .collect::<Vec<_>>();
        if root_indices.len() != self.roots.len() {
            return Err(self.reject(format!(
                "expected {} roots, found {}",
                root_indices.len(),
                self.roots.len()
            )));
        }
        for (index, pose) in root_indices.into_iter().zip(&self.roots) {
            bundle.transform.set_root_pose(index, pose.position, pose.angle);
        }
        bundle.transform.set_velocity(self.velocity);
        bundle.transform.update_poses();

        match (bundle.health.as_mut(), self.health) {
            (Some(health), Some(saved)) => health.health = saved.clamp(0.0, health.max_health),
            (None, None) | (Some(_), None) => {}
            (None, Some(_)) => return Err(self.reject("health saved for an entity without health")),
        }
        Ok(bundle)
    }
}

/// Serializable world state: every live entity plus the clock and RNG position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldSnapshot {
    pub version: u32,
    pub tick: u64,
    pub seed: u64,
    pub rng_word_pos: u128,
    pub entities: Vec<EntitySnapshot>,
}

impl WorldSnapshot {
    pub fn capture(world: &World) -> Self {
        let entities = world
            .entity_ids()
            .into_iter()
            .filter(|entity| !world.is_flagged_for_removal(*entity))
            .filter_map(|entity| EntitySnapshot::capture(world, entity))
            .collect();
        Self {
            version: SNAPSHOT_VERSION,
            tick: world.tick_count(),
            seed: world.config().seed,
            rng_word_pos: world.rng_word_pos(),
            entities,
        }
    }

    pub fn to_json(&self) -> Result<String, SimError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(text: &str) -> Result<Self, SimError> {
        let mut deserializer = serde_json::Deserializer::from_str(text);
        let snapshot: WorldSnapshot =
            serde_path_to_error::deserialize(&mut deserializer).map_err(|error| SimError::SnapshotParse {
                path: error.path().to_string(),
                message: error.inner().to_string(),
            })?;
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(SimError::SnapshotVersion {
                found: snapshot.version,
                expected: SNAPSHOT_VERSION,
            });
        }
        Ok(snapshot)
    }

    /// Hex SHA-256 of the compact JSON encoding.
    pub fn digest(&self) -> Result<String, SimError> {
        let bytes = serde_json::to_vec(self)?;
        Ok(to_hex_lower(&Sha256::digest(&bytes)))
    }

    pub fn save(&self, path: &Path) -> Result<(), SimError> {
        let text = self.to_json()?;
        write_text_atomic(path, &text).map_err(|source| SimError::SnapshotIo {
            path: path.to_path_buf(),
            source,
        })?;
        info!(path = %path.display(), entities = self.entities.len(), tick = self.tick, "snapshot_saved");
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, SimError> {
        let text = fs::read_to_string(path).map_err(|source| SimError::SnapshotIo {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }
}

/// Digest of the current world state, used for determinism checks.
pub fn state_digest(world: &World) -> Result<String, SimError> {
    WorldSnapshot::capture(world).digest()
}

/// Builds a fresh world from a snapshot. Entities keep their ids and join on
/// the first tick. AI memory (wander targets, anger, cooldowns) starts empty.
pub fn restore_world(snapshot: &WorldSnapshot, config: SimConfig, terrain: TerrainGrid) -> Result<World, SimError> {
    let config = SimConfig {
        seed: snapshot.seed,
        ..config
    };
    let mut world = World::new(config, terrain)?;
    world.set_tick_count(snapshot.tick);
    let mut rng = ChaCha8Rng::seed_from_u64(snapshot.seed);
    rng.set_word_pos(snapshot.rng_word_pos);
    world.set_rng(rng);

    for entity in &snapshot.entities {
        let bundle = entity.to_entity_config(&config)?;
        let origin = bundle.transform.position();
        if !world.terrain().contains(origin) {
            return Err(entity.reject("origin outside the world"));
        }
        world.create_entity_with_id(entity.id, bundle, 0);
        debug!(entity = entity.id.0, entity_type = entity.entity_type.as_str(), "entity_restored");
    }
    info!(entities = snapshot.entities.len(), tick = snapshot.tick, "world_restored");
    Ok(world)
}

fn write_text_atomic(path: &Path, text: &str) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp_path = temp_path_for(path);
    fs::write(&tmp_path, text.as_bytes())?;
    if let Err(error) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(error);
    }
    Ok(())
}

fn temp_path_for(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("snapshot.json");
    let tmp_name = format!("{file_name}.tmp");
    match path.parent() {
        Some(parent) => parent.join(tmp_name),
        None => PathBuf::from(tmp_name),
    }
}

fn to_hex_lower(bytes: &[u8]) -> String {
    let mut output = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        use std::fmt::Write as _;
        let _ = write!(&mut output, "{byte:02x}");
    }
    output
}
