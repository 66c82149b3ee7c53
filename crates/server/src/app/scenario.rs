use std::fs;
use std::path::Path;

use frost_sim::components::cow::CowSpecies;
use frost_sim::components::slime::SlimeSize;
use frost_sim::entities::{self, EntityConfig};
use frost_sim::{Biome, EntityId, Point, SimConfig, SimError, TerrainGrid, TileType, World};
use serde::Deserialize;
use tracing::{debug, info};

use super::config::ConfigError;

/// Distance between repeated copies of one spawn entry, laid out along +x.
pub const SPAWN_ROW_SPACING: f32 = 96.0;
pub const MAX_SERPENT_SEGMENTS: u32 = 32;

/// Initial world layout: terrain fills, wall rectangles, and the starting population.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Scenario {
    pub width_tiles: u32,
    pub height_tiles: u32,
    #[serde(default)]
    pub base_tile: TileType,
    #[serde(default)]
    pub base_biome: Biome,
    #[serde(default)]
    pub terrain: Vec<TerrainRect>,
    #[serde(default)]
    pub walls: Vec<WallRect>,
    #[serde(default)]
    pub spawns: Vec<SpawnEntry>,
}

/// Inclusive tile rectangle painted with one tile type and biome.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TerrainRect {
    pub min: [u32; 2],
    pub max: [u32; 2],
    pub tile: TileType,
    pub biome: Biome,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WallRect {
    pub min: [u32; 2],
    pub max: [u32; 2],
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SpawnEntry {
    pub entity: SpawnKind,
    pub position: Point,
    #[serde(default = "default_spawn_count")]
    pub count: u32,
}

fn default_spawn_count() -> u32 {
    1
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", deny_unknown_fields)]
pub enum SpawnKind {
    Player { name: String },
    Slime { size: SlimeSize },
    Cow {
        #[serde(default)]
        species: Option<CowSpecies>,
    },
    Krumblid,
    Serpent { segments: u32 },
    Guardian,
    Boulder,
}

impl SpawnKind {
    fn bundle(&self, position: Point, config: &SimConfig) -> EntityConfig {
        match self {
            Self::Player { name } => entities::player(position, name),
            Self::Slime { size } => entities::slime(position, *size),
            Self::Cow { species: None } => entities::cow(position, config),
            Self::Cow {
                species: Some(species),
            } => entities::cow_of_species(position, *species, config),
            Self::Krumblid => entities::krumblid(position),
            Self::Serpent { segments } => entities::serpent(position, *segments),
            Self::Guardian => entities::guardian(position, config),
            Self::Boulder => entities::boulder(position),
        }
    }
}

impl Scenario {
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let mut deserializer = serde_json::Deserializer::from_str(raw);
        let scenario: Self = serde_path_to_error::deserialize(&mut deserializer).map_err(|error| {
            let path = error.path().to_string();
            ConfigError::ScenarioParse {
                path,
                message: error.into_inner().to_string(),
            }
        })?;
        scenario.validate()?;
        Ok(scenario)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::ReadScenario {
            path: path.to_path_buf(),
            source,
        })?;
        let scenario = Self::from_json(&raw)?;
        info!(
            path = %path.display(),
            width_tiles = scenario.width_tiles,
            height_tiles = scenario.height_tiles,
            spawn_entries = scenario.spawns.len(),
            "scenario_loaded"
        );
        Ok(scenario)
    }

    /// Small mixed-biome arena used when no scenario file is configured.
    pub fn builtin() -> Self {
        let spawn = |entity: SpawnKind, x: f32, y: f32, count: u32| SpawnEntry {
            entity,
            position: Point::new(x, y),
            count,
        };
        Self {
            width_tiles: 64,
            height_tiles: 64,
            base_tile: TileType::Grass,
            base_biome: Biome::Grasslands,
            terrain: vec![
                TerrainRect {
                    min: [4, 40],
                    max: [20, 58],
                    tile: TileType::Slime,
                    biome: Biome::Swamp,
                },
                TerrainRect {
                    min: [36, 4],
                    max: [60, 28],
                    tile: TileType::Sand,
                    biome: Biome::Desert,
                },
                TerrainRect {
                    min: [40, 40],
                    max: [60, 60],
                    tile: TileType::Rock,
                    biome: Biome::Mountains,
                },
            ],
            walls: vec![
                WallRect {
                    min: [28, 20],
                    max: [28, 34],
                },
                WallRect {
                    min: [44, 36],
                    max: [56, 36],
                },
            ],
            spawns: vec![
                spawn(SpawnKind::Player { name: "host".to_string() }, 1600.0, 1600.0, 1),
                spawn(SpawnKind::Cow { species: None }, 900.0, 1000.0, 4),
                spawn(SpawnKind::Krumblid, 1900.0, 1200.0, 2),
                spawn(SpawnKind::Slime { size: SlimeSize::Small }, 600.0, 3000.0, 6),
                spawn(SpawnKind::Serpent { segments: 6 }, 3000.0, 900.0, 1),
                spawn(SpawnKind::Guardian, 3200.0, 3200.0, 1),
                spawn(SpawnKind::Boulder, 2000.0, 2200.0, 3),
            ],
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |path: String, message: String| ConfigError::ScenarioInvalid { path, message };
        if self.width_tiles == 0 || self.height_tiles == 0 {
            return Err(invalid(
                "width_tiles".to_string(),
                format!(
                    "world must be at least one tile, got {}x{}",
                    self.width_tiles, self.height_tiles
                ),
            ));
        }
        let rects = self
            .terrain
            .iter()
            .enumerate()
            .map(|(index, rect)| (format!("terrain[{index}]"), rect.min, rect.max))
            .chain(
                self.walls
                    .iter()
                    .enumerate()
                    .map(|(index, rect)| (format!("walls[{index}]"), rect.min, rect.max)),
            );
        for (path, min, max) in rects {
            if min[0] > max[0] || min[1] > max[1] {
                return Err(invalid(path, format!("min {min:?} exceeds max {max:?}")));
            }
            if max[0] >= self.width_tiles || max[1] >= self.height_tiles {
                return Err(invalid(path, format!("max {max:?} is outside the world")));
            }
        }
        for (index, entry) in self.spawns.iter().enumerate() {
            if entry.count == 0 {
                return Err(invalid(
                    format!("spawns[{index}].count"),
                    "count must be positive".to_string(),
                ));
            }
            if let SpawnKind::Serpent { segments } = entry.entity {
                if segments == 0 || segments > MAX_SERPENT_SEGMENTS {
                    return Err(invalid(
                        format!("spawns[{index}].entity.segments"),
                        format!("expected 1..={MAX_SERPENT_SEGMENTS}, got {segments}"),
                    ));
                }
            }
        }
        Ok(())
    }

    pub fn build_terrain(&self) -> TerrainGrid {
        let mut terrain =
            TerrainGrid::filled(self.width_tiles, self.height_tiles, self.base_tile, self.base_biome);
        for rect in &self.terrain {
            terrain.fill_tiles(
                (rect.min[0], rect.min[1]),
                (rect.max[0], rect.max[1]),
                rect.tile,
                rect.biome,
            );
        }
        for rect in &self.walls {
            terrain.fill_wall_tiles((rect.min[0], rect.min[1]), (rect.max[0], rect.max[1]));
        }
        terrain
    }

    pub fn build_world(&self, config: SimConfig) -> Result<World, SimError> {
        let mut world = World::new(config, self.build_terrain())?;
        let spawned = self.populate(&mut world)?;
        info!(
            seed = config.seed,
            spawned = spawned.len(),
            entity_count = world.entity_count(),
            "world_populated"
        );
        Ok(world)
    }

    /// Queues every spawn entry. Entities join on the first tick.
    pub fn populate(&self, world: &mut World) -> Result<Vec<EntityId>, SimError> {
        let config = *world.config();
        let mut spawned = Vec::new();
        for entry in &self.spawns {
            for copy in 0..entry.count {
                let position = Point::new(
                    entry.position.x + copy as f32 * SPAWN_ROW_SPACING,
                    entry.position.y,
                );
                let entity = world.create_entity(entry.entity.bundle(position, &config), 0)?;
                debug!(entity = entity.0, kind = ?entry.entity, "scenario_spawn");
                spawned.push(entity);
            }
        }
        Ok(spawned)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use frost_sim::TerrainQuery;

    use super::*;

    const ARENA: &str = r#"{
        "width_tiles": 20,
        "height_tiles": 16,
        "terrain": [
            { "min": [0, 0], "max": [4, 4], "tile": "slime", "biome": "swamp" }
        ],
        "walls": [ { "min": [10, 2], "max": [10, 8] } ],
        "spawns": [
            { "entity": { "kind": "player", "name": "ada" }, "position": { "x": 400.0, "y": 400.0 } },
            { "entity": { "kind": "slime", "size": "small" }, "position": { "x": 100.0, "y": 100.0 }, "count": 3 },
            { "entity": { "kind": "cow", "species": "black" }, "position": { "x": 900.0, "y": 700.0 } }
        ]
    }"#;

    #[test]
    fn arena_builds_terrain_and_population() {
        let scenario = Scenario::from_json(ARENA).expect("scenario");
        let terrain = scenario.build_terrain();
        assert_eq!(terrain.width_tiles(), 20);
        assert_eq!(terrain.height_tiles(), 16);

        let mut world = scenario.build_world(SimConfig::default()).expect("world");
        world.tick();
        assert_eq!(world.entity_count(), 5);
        assert_eq!(world.components().slime.entity_ids().len(), 3);
        assert_eq!(world.components().player.entity_ids().len(), 1);
    }

    #[test]
    fn repeated_spawns_are_laid_out_in_a_row() {
        let scenario = Scenario::from_json(ARENA).expect("scenario");
        let mut world = World::new(SimConfig::default(), scenario.build_terrain()).expect("world");
        let spawned = scenario.populate(&mut world).expect("populate");
        world.tick();

        let slimes = &spawned[1..4];
        for (copy, slime) in slimes.iter().enumerate() {
            let expected = Point::new(100.0 + copy as f32 * SPAWN_ROW_SPACING, 100.0);
            assert!(world.position_of(*slime).distance_to(expected) < 1.0);
        }
    }

    #[test]
    fn parse_errors_report_json_path() {
        let raw = r#"{
            "width_tiles": 8,
            "height_tiles": 8,
            "spawns": [ { "entity": { "kind": "krumblid" }, "position": { "x": "far", "y": 1.0 } } ]
        }"#;
        match Scenario::from_json(raw) {
            Err(ConfigError::ScenarioParse { path, .. }) => {
                assert_eq!(path, "spawns[0].position.x");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn out_of_world_wall_is_rejected() {
        let raw = r#"{ "width_tiles": 8, "height_tiles": 8, "walls": [ { "min": [2, 2], "max": [9, 3] } ] }"#;
        match Scenario::from_json(raw) {
            Err(ConfigError::ScenarioInvalid { path, .. }) => assert_eq!(path, "walls[0]"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn spawn_outside_the_world_fails_to_populate() {
        let raw = r#"{
            "width_tiles": 4,
            "height_tiles": 4,
            "spawns": [ { "entity": { "kind": "boulder" }, "position": { "x": 5000.0, "y": 10.0 } } ]
        }"#;
        let scenario = Scenario::from_json(raw).expect("scenario");
        assert!(matches!(
            scenario.build_world(SimConfig::default()),
            Err(SimError::SpawnOutOfBounds { .. })
        ));
    }

    #[test]
    fn load_reads_scenario_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(ARENA.as_bytes()).expect("write");

        let scenario = Scenario::load(file.path()).expect("load");
        assert_eq!(scenario.spawns.len(), 3);
        assert_eq!(scenario.base_tile, TileType::Grass);
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let dir = tempfile::tempdir().expect("temp dir");
        let missing = dir.path().join("absent.json");
        assert!(matches!(
            Scenario::load(&missing),
            Err(ConfigError::ReadScenario { .. })
        ));
    }

    #[test]
    fn builtin_scenario_is_valid() {
        let scenario = Scenario::builtin();
        scenario.validate().expect("valid builtin");
        let expected: u32 = scenario.spawns.iter().map(|entry| entry.count).sum();
        let mut world = scenario.build_world(SimConfig::default()).expect("world");
        world.tick();
        assert!(world.entity_count() >= expected as usize);
    }
}
