use std::collections::{BTreeMap, BTreeSet};

use crate::entity::EntityId;
use crate::math::Point;
use crate::terrain::TILE_SIZE;

pub const CHUNK_SIZE_TILES: u32 = 4;
pub const CHUNK_SIZE: f32 = TILE_SIZE * CHUNK_SIZE_TILES as f32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkCoord {
    pub x: u32,
    pub y: u32,
}

/// Inclusive rectangle of chunk coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkBounds {
    pub min_x: u32,
    pub min_y: u32,
    pub max_x: u32,
    pub max_y: u32,
}

impl ChunkBounds {
    pub fn contains(&self, coord: ChunkCoord) -> bool {
        coord.x >= self.min_x && coord.x <= self.max_x && coord.y >= self.min_y && coord.y <= self.max_y
    }

    pub fn coords(&self) -> impl Iterator<Item = ChunkCoord> + '_ {
        (self.min_y..=self.max_y)
            .flat_map(move |y| (self.min_x..=self.max_x).map(move |x| ChunkCoord { x, y }))
    }

    pub fn chunk_count(&self) -> usize {
        ((self.max_x - self.min_x + 1) * (self.max_y - self.min_y + 1)) as usize
    }
}

#[derive(Debug, Clone, Default)]
pub struct Chunk {
    entities: BTreeSet<EntityId>,
    viewing_entities: BTreeSet<EntityId>,
}

impl Chunk {
    pub fn entities(&self) -> &BTreeSet<EntityId> {
        &self.entities
    }

    pub fn viewing_entities(&self) -> &BTreeSet<EntityId> {
        &self.viewing_entities
    }
}

/// Membership changes a viewer must apply after its vision bounds moved.
///
/// Each entry appears once per chunk it was found in, so counts stay exact when
/// an entity is listed under several chunks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewerBoundsDiff {
    pub left: Vec<EntityId>,
    pub entered: Vec<EntityId>,
}

#[derive(Debug, Clone)]
pub struct ChunkGrid {
    width: u32,
    height: u32,
    chunks: Vec<Chunk>,
}

impl ChunkGrid {
    pub fn new(width_tiles: u32, height_tiles: u32) -> Self {
        let width = width_tiles.div_ceil(CHUNK_SIZE_TILES).max(1);
        let height = height_tiles.div_ceil(CHUNK_SIZE_TILES).max(1);
        Self {
            width,
            height,
            chunks: vec![Chunk::default(); (width * height) as usize],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    fn index_of(&self, coord: ChunkCoord) -> Option<usize> {
        if coord.x >= self.width || coord.y >= self.height {
            return None;
        }
        Some(coord.y as usize * self.width as usize + coord.x as usize)
    }

    pub fn get_chunk(&self, x: u32, y: u32) -> Option<&Chunk> {
        self.index_of(ChunkCoord { x, y })
            .map(|index| &self.chunks[index])
    }

    fn chunk_mut(&mut self, coord: ChunkCoord) -> Option<&mut Chunk> {
        self.index_of(coord).map(|index| &mut self.chunks[index])
    }

    fn clamp_axis(value: f32, chunk_count: u32) -> u32 {
        if !value.is_finite() || value <= 0.0 {
            return 0;
        }
        ((value / CHUNK_SIZE) as u32).min(chunk_count - 1)
    }

    /// Chunk holding `position`; points outside the world land in the border chunk.
    pub fn coord_at(&self, position: Point) -> ChunkCoord {
        ChunkCoord {
            x: Self::clamp_axis(position.x, self.width),
            y: Self::clamp_axis(position.y, self.height),
        }
    }

    pub fn bounds_around(&self, center: Point, radius: f32) -> ChunkBounds {
        ChunkBounds {
            min_x: Self::clamp_axis(center.x - radius, self.width),
            min_y: Self::clamp_axis(center.y - radius, self.height),
            max_x: Self::clamp_axis(center.x + radius, self.width),
            max_y: Self::clamp_axis(center.y + radius, self.height),
        }
    }

    /// Adds `entity` to a chunk and returns the viewers that should now consider it.
    pub fn insert_entity(&mut self, coord: ChunkCoord, entity: EntityId) -> Vec<EntityId> {
        let Some(chunk) = self.chunk_mut(coord) else {
            return Vec::new();
        };
        if !chunk.entities.insert(entity) {
            return Vec::new();
        }
        chunk.viewing_entities.iter().copied().collect()
    }

    /// Removes `entity` from a chunk and returns the viewers that were tracking it there.
    pub fn remove_entity(&mut self, coord: ChunkCoord, entity: EntityId) -> Vec<EntityId> {
        let Some(chunk) = self.chunk_mut(coord) else {
            return Vec::new();
        };
        if !chunk.entities.remove(&entity) {
            return Vec::new();
        }
        chunk.viewing_entities.iter().copied().collect()
    }

    /// Moves a viewer's registration from `old` to `new` bounds.
    ///
    /// Both sides of the diff are computed from `old` before any chunk is
    /// touched. Unchanged bounds produce an empty diff.
    pub fn update_viewer(
        &mut self,
        viewer: EntityId,
        old: Option<ChunkBounds>,
        new: Option<ChunkBounds>,
    ) -> ViewerBoundsDiff {
        if old == new {
            return ViewerBoundsDiff::default();
        }

        let leaving = old
            .map(|bounds| {
                bounds
                    .coords()
                    .filter(|coord| !new.is_some_and(|new| new.contains(*coord)))
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();
        let entering = new
            .map(|bounds| {
                bounds
                    .coords()
                    .filter(|coord| !old.is_some_and(|old| old.contains(*coord)))
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();

        let mut diff = ViewerBoundsDiff::default();
        for coord in leaving {
            if let Some(chunk) = self.chunk_mut(coord) {
                chunk.viewing_entities.remove(&viewer);
                diff.left.extend(chunk.entities.iter().copied());
            }
        }
        for coord in entering {
            if let Some(chunk) = self.chunk_mut(coord) {
                chunk.viewing_entities.insert(viewer);
                diff.entered.extend(chunk.entities.iter().copied());
            }
        }
        diff
    }

    /// Entities registered in any chunk of `bounds`, ascending and deduplicated.
    pub fn entities_in_bounds(&self, bounds: ChunkBounds) -> Vec<EntityId> {
        let mut found = BTreeSet::new();
        for coord in bounds.coords() {
            if let Some(chunk) = self.get_chunk(coord.x, coord.y) {
                found.extend(chunk.entities.iter().copied());
            }
        }
        found.into_iter().collect()
    }
}

/// Per-viewer count of how many tracked chunks list each candidate entity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VisionCandidates {
    counts: BTreeMap<EntityId, u32>,
}

impl VisionCandidates {
    pub fn increment(&mut self, entity: EntityId) {
        *self.counts.entry(entity).or_insert(0) += 1;
    }

    /// Returns true when the candidate was evicted.
    pub fn decrement(&mut self, entity: EntityId) -> bool {
        let Some(count) = self.counts.get_mut(&entity) else {
            return false;
        };
        *count = count.saturating_sub(1);
        if *count == 0 {
            self.counts.remove(&entity);
            return true;
        }
        false
    }

    pub fn contains(&self, entity: EntityId) -> bool {
        self.counts.contains_key(&entity)
    }

    pub fn count_of(&self, entity: EntityId) -> u32 {
        self.counts.get(&entity).copied().unwrap_or(0)
    }

    pub fn iter(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.counts.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn clear(&mut self) {
        self.counts.clear();
    }

    /// Applies a bounds diff, skipping entities rejected by `is_candidate`.
    pub fn apply_diff(&mut self, diff: &ViewerBoundsDiff, is_candidate: impl Fn(EntityId) -> bool) {
        for entity in &diff.left {
            if is_candidate(*entity) {
                self.decrement(*entity);
            }
        }
        for entity in &diff.entered {
            if is_candidate(*entity) {
                self.increment(*entity);
            }
        }
    }
}
