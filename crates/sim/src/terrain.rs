use serde::{Deserialize, Serialize};

use crate::error::SimError;
use crate::math::Point;

pub const TILE_SIZE: f32 = 64.0;
pub const SUBTILES_PER_TILE: u32 = 4;
pub const SUBTILE_SIZE: f32 = TILE_SIZE / SUBTILES_PER_TILE as f32;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TileType {
    #[default]
    Grass,
    Dirt,
    Sand,
    Snow,
    Ice,
    Water,
    Sludge,
    Slime,
    Rock,
}

impl TileType {
    pub fn move_speed_multiplier(self) -> f32 {
        match self {
            Self::Sludge => 0.6,
            Self::Slime => 0.8,
            Self::Water => 0.5,
            Self::Snow => 0.85,
            Self::Ice => 1.3,
            _ => 1.0,
        }
    }

    /// Linear drag coefficient, in fractions of velocity lost per second.
    pub fn drag(self) -> f32 {
        match self {
            Self::Ice => 0.75,
            Self::Water | Self::Sludge => 5.0,
            _ => 3.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Biome {
    #[default]
    Grasslands,
    Swamp,
    Desert,
    Tundra,
    Mountains,
}

/// Read-only world oracle consumed by AI position checks and wall collisions.
pub trait TerrainQuery {
    fn width_tiles(&self) -> u32;
    fn height_tiles(&self) -> u32;
    fn tile_type(&self, tile_x: u32, tile_y: u32) -> Option<TileType>;
    fn biome(&self, tile_x: u32, tile_y: u32) -> Option<Biome>;
    fn is_wall_subtile(&self, subtile_x: u32, subtile_y: u32) -> bool;

    fn width(&self) -> f32 {
        self.width_tiles() as f32 * TILE_SIZE
    }

    fn height(&self) -> f32 {
        self.height_tiles() as f32 * TILE_SIZE
    }

    fn contains(&self, position: Point) -> bool {
        position.x >= 0.0
            && position.y >= 0.0
            && position.x < self.width()
            && position.y < self.height()
    }

    fn tile_type_at(&self, position: Point) -> Option<TileType> {
        let (tile_x, tile_y) = tile_coords(position)?;
        self.tile_type(tile_x, tile_y)
    }

    fn biome_at(&self, position: Point) -> Option<Biome> {
        let (tile_x, tile_y) = tile_coords(position)?;
        self.biome(tile_x, tile_y)
    }

    fn is_wall_at(&self, position: Point) -> bool {
        if position.x < 0.0 || position.y < 0.0 {
            return false;
        }
        self.is_wall_subtile(
            (position.x / SUBTILE_SIZE) as u32,
            (position.y / SUBTILE_SIZE) as u32,
        )
    }
}

pub fn tile_coords(position: Point) -> Option<(u32, u32)> {
    if !position.is_finite() || position.x < 0.0 || position.y < 0.0 {
        return None;
    }
    Some(((position.x / TILE_SIZE) as u32, (position.y / TILE_SIZE) as u32))
}

pub fn tile_center(tile_x: u32, tile_y: u32) -> Point {
    Point::new(
        (tile_x as f32 + 0.5) * TILE_SIZE,
        (tile_y as f32 + 0.5) * TILE_SIZE,
    )
}

pub fn subtile_center(subtile_x: u32, subtile_y: u32) -> Point {
    Point::new(
        (subtile_x as f32 + 0.5) * SUBTILE_SIZE,
        (subtile_y as f32 + 0.5) * SUBTILE_SIZE,
    )
}

#[derive(Debug, Clone, PartialEq)]
pub struct TerrainGrid {
    width_tiles: u32,
    height_tiles: u32,
    tiles: Vec<TileType>,
    biomes: Vec<Biome>,
    walls: Vec<bool>,
}

impl TerrainGrid {
    pub fn filled(width_tiles: u32, height_tiles: u32, tile: TileType, biome: Biome) -> Self {
        let tile_count = width_tiles as usize * height_tiles as usize;
        let subtile_count = tile_count * (SUBTILES_PER_TILE * SUBTILES_PER_TILE) as usize;
        Self {
            width_tiles,
            height_tiles,
            tiles: vec![tile; tile_count],
            biomes: vec![biome; tile_count],
            walls: vec![false; subtile_count],
        }
    }

    pub fn from_layers(
        width_tiles: u32,
        height_tiles: u32,
        tiles: Vec<TileType>,
        biomes: Vec<Biome>,
    ) -> Result<Self, SimError> {
        let expected = width_tiles as usize * height_tiles as usize;
        if tiles.len() != expected {
            return Err(SimError::TerrainSizeMismatch {
                layer: "tile",
                expected,
                actual: tiles.len(),
            });
        }
        if biomes.len() != expected {
            return Err(SimError::TerrainSizeMismatch {
                layer: "biome",
                expected,
                actual: biomes.len(),
            });
        }
        let mut grid = Self::filled(width_tiles, height_tiles, TileType::Grass, Biome::Grasslands);
        grid.tiles = tiles;
        grid.biomes = biomes;
        Ok(grid)
    }

    fn tile_index(&self, tile_x: u32, tile_y: u32) -> Option<usize> {
        if tile_x >= self.width_tiles || tile_y >= self.height_tiles {
            return None;
        }
        Some(tile_y as usize * self.width_tiles as usize + tile_x as usize)
    }

    fn subtile_index(&self, subtile_x: u32, subtile_y: u32) -> Option<usize> {
        let width = self.width_tiles * SUBTILES_PER_TILE;
        let height = self.height_tiles * SUBTILES_PER_TILE;
        if subtile_x >= width || subtile_y >= height {
            return None;
        }
        Some(subtile_y as usize * width as usize + subtile_x as usize)
    }

    /// Fills an inclusive tile rectangle, clipped to the grid.
    pub fn fill_tiles(&mut self, min: (u32, u32), max: (u32, u32), tile: TileType, biome: Biome) {
        for tile_y in min.1..=max.1.min(self.height_tiles.saturating_sub(1)) {
            for tile_x in min.0..=max.0.min(self.width_tiles.saturating_sub(1)) {
                if let Some(index) = self.tile_index(tile_x, tile_y) {
                    self.tiles[index] = tile;
                    self.biomes[index] = biome;
                }
            }
        }
    }

    pub fn set_wall_subtile(&mut self, subtile_x: u32, subtile_y: u32, is_wall: bool) {
        if let Some(index) = self.subtile_index(subtile_x, subtile_y) {
            self.walls[index] = is_wall;
        }
    }

    /// Marks every subtile of an inclusive tile rectangle as wall.
    pub fn fill_wall_tiles(&mut self, min: (u32, u32), max: (u32, u32)) {
        for tile_y in min.1..=max.1 {
            for tile_x in min.0..=max.0 {
                for offset_y in 0..SUBTILES_PER_TILE {
                    for offset_x in 0..SUBTILES_PER_TILE {
                        self.set_wall_subtile(
                            tile_x * SUBTILES_PER_TILE + offset_x,
                            tile_y * SUBTILES_PER_TILE + offset_y,
                            true,
                        );
                    }
                }
            }
        }
    }
}

impl TerrainQuery for TerrainGrid {
    fn width_tiles(&self) -> u32 {
        self.width_tiles
    }

    fn height_tiles(&self) -> u32 {
        self.height_tiles
    }

    fn tile_type(&self, tile_x: u32, tile_y: u32) -> Option<TileType> {
        self.tile_index(tile_x, tile_y)
            .and_then(|index| self.tiles.get(index).copied())
    }

    fn biome(&self, tile_x: u32, tile_y: u32) -> Option<Biome> {
        self.tile_index(tile_x, tile_y)
            .and_then(|index| self.biomes.get(index).copied())
    }

    fn is_wall_subtile(&self, subtile_x: u32, subtile_y: u32) -> bool {
        self.subtile_index(subtile_x, subtile_y)
            .and_then(|index| self.walls.get(index).copied())
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_layers_rejects_mismatched_counts() {
        let result = TerrainGrid::from_layers(2, 2, vec![TileType::Grass; 3], vec![Biome::Swamp; 4]);
        assert!(matches!(
            result,
            Err(SimError::TerrainSizeMismatch {
                layer: "tile",
                expected: 4,
                actual: 3
            })
        ));
    }

    #[test]
    fn fill_tiles_clips_to_grid() {
        let mut grid = TerrainGrid::filled(4, 4, TileType::Grass, Biome::Grasslands);
        grid.fill_tiles((2, 2), (10, 10), TileType::Slime, Biome::Swamp);
        assert_eq!(grid.tile_type(3, 3), Some(TileType::Slime));
        assert_eq!(grid.biome(1, 1), Some(Biome::Grasslands));
        assert_eq!(grid.tile_type(4, 4), None);
    }

    #[test]
    fn wall_tiles_cover_all_subtiles() {
        let mut grid = TerrainGrid::filled(4, 4, TileType::Grass, Biome::Grasslands);
        grid.fill_wall_tiles((1, 1), (1, 1));
        assert!(grid.is_wall_at(Point::new(65.0, 65.0)));
        assert!(grid.is_wall_at(Point::new(127.0, 127.0)));
        assert!(!grid.is_wall_at(Point::new(129.0, 65.0)));
        assert!(!grid.is_wall_at(Point::new(-1.0, 65.0)));
    }

    #[test]
    fn lookups_outside_world_are_none() {
        let grid = TerrainGrid::filled(2, 2, TileType::Sand, Biome::Desert);
        assert_eq!(grid.tile_type_at(Point::new(-5.0, 10.0)), None);
        assert_eq!(grid.biome_at(Point::new(10.0, 10.0)), Some(Biome::Desert));
        assert!(!grid.contains(Point::new(128.0, 0.0)));
    }
}
