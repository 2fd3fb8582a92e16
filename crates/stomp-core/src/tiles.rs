//! Tile grid store with mutation signaling.
//!
//! The grid owns a live tile array plus the immutable template it was built
//! from. Mutations go through [`StageGrid::set_tile`] and
//! [`StageGrid::reset_stage`] only, which queue the internal signal before
//! the external notification for every committed change. Reads never fail:
//! out-of-range coordinates return the default empty tile.
//!
//! Tiles are half a world unit across; coordinate conversion between grid
//! and world space is exact fixed-point arithmetic with no float rounding.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::events::SimEvents;
use crate::fp::{Aabb, Fp, FpVec2, fp, fp_ratio, unwrap_x};

/// Grid-relative tile coordinate. Valid cells are `[0, dimensions)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileCoordinate {
    pub x: i32,
    pub y: i32,
}

impl TileCoordinate {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Static collision behavior of a tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TileKind {
    /// No collision.
    #[default]
    Empty,
    /// Solid on all four edges.
    Solid,
    /// Semisolid platform: only the top edge collides.
    Platform,
    /// Solid, and breaks to `Empty` when bumped from below. Ground made of
    /// these counts as crushable.
    Breakable,
    /// Solid block that stays in place when bumped but pops its occupants.
    BumpBlock,
}

/// Value type describing one placed tile. Immutable once stored except via
/// [`StageGrid::set_tile`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash, Serialize, Deserialize)]
pub struct TileInstance {
    /// Art/behavior id, opaque to the collision core.
    pub tile_id: u16,
    pub kind: TileKind,
    /// Sine of the floor angle for sloped tops, stored as an exact fixed
    /// constant. Flat tiles store zero; nothing in the core computes this
    /// at runtime.
    #[serde(default)]
    pub floor_slope: Fp,
}

impl TileInstance {
    pub fn of_kind(kind: TileKind) -> Self {
        Self {
            tile_id: 0,
            kind,
            floor_slope: Fp::ZERO,
        }
    }

    /// Whether the tile blocks movement from every side.
    pub fn is_fully_solid(&self) -> bool {
        matches!(
            self.kind,
            TileKind::Solid | TileKind::Breakable | TileKind::BumpBlock
        )
    }

    /// Whether the tile has any collision surface at all.
    pub fn is_collidable(&self) -> bool {
        self.is_fully_solid() || self.kind == TileKind::Platform
    }
}

/// Serializable stage description loaded from data files at level load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageDef {
    pub tile_dimensions: [i32; 2],
    pub tile_origin: [i32; 2],
    pub tilemap_world_position: FpVec2,
    #[serde(default = "default_wrapping")]
    pub wrapping: bool,
    #[serde(default)]
    pub extend_ceiling_hitboxes: bool,
    pub spawnpoint: FpVec2,
    #[serde(default)]
    pub big_star_spawnpoints: Vec<FpVec2>,
    pub tiles: Vec<TileInstance>,
}

fn default_wrapping() -> bool {
    true
}

/// Error building a [`StageGrid`] from a [`StageDef`].
#[derive(Debug, thiserror::Error)]
pub enum StageError {
    #[error("stage dimensions must be positive, got {0}x{1}")]
    InvalidDimensions(i32, i32),
    #[error("tile template holds {actual} tiles, dimensions require {expected}")]
    TileCountMismatch { expected: usize, actual: usize },
}

/// Tiles span half a world unit.
fn half_tiles_to_world(v: i32) -> Fp {
    fp(i64::from(v)) / 2
}

/// The tile grid: live tiles, template, and the mapping between grid-local
/// and world coordinates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageGrid {
    width: i32,
    height: i32,
    origin: TileCoordinate,
    world_position: FpVec2,
    wrapping: bool,
    extend_ceiling_hitboxes: bool,
    spawnpoint: FpVec2,
    big_star_spawnpoints: Vec<FpVec2>,
    template: Vec<TileInstance>,
    tiles: Vec<TileInstance>,
}

impl StageGrid {
    /// Builds the grid from stage data; the live array starts as a copy of
    /// the template.
    pub fn from_def(def: StageDef) -> Result<Self, StageError> {
        let [width, height] = def.tile_dimensions;
        if width <= 0 || height <= 0 {
            return Err(StageError::InvalidDimensions(width, height));
        }

        let expected = (width as usize) * (height as usize);
        if def.tiles.len() != expected {
            return Err(StageError::TileCountMismatch {
                expected,
                actual: def.tiles.len(),
            });
        }

        Ok(Self {
            width,
            height,
            origin: TileCoordinate::new(def.tile_origin[0], def.tile_origin[1]),
            world_position: def.tilemap_world_position,
            wrapping: def.wrapping,
            extend_ceiling_hitboxes: def.extend_ceiling_hitboxes,
            spawnpoint: def.spawnpoint,
            big_star_spawnpoints: def.big_star_spawnpoints,
            tiles: def.tiles.clone(),
            template: def.tiles,
        })
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn is_wrapping(&self) -> bool {
        self.wrapping
    }

    pub fn extend_ceiling_hitboxes(&self) -> bool {
        self.extend_ceiling_hitboxes
    }

    pub fn spawnpoint(&self) -> FpVec2 {
        self.spawnpoint
    }

    pub fn big_star_spawnpoints(&self) -> &[FpVec2] {
        &self.big_star_spawnpoints
    }

    fn index(&self, x: i32, y: i32) -> Option<usize> {
        if x < 0 || y < 0 || x >= self.width || y >= self.height {
            return None;
        }
        Some((x + y * self.width) as usize)
    }

    fn coordinate_of(&self, index: usize) -> TileCoordinate {
        let index = index as i32;
        TileCoordinate::new(index % self.width, index / self.width)
    }

    fn to_world_tile(&self, relative: TileCoordinate) -> TileCoordinate {
        TileCoordinate::new(relative.x + self.origin.x, relative.y + self.origin.y)
    }

    /// Returns the tile at the grid-relative coordinate, or the default
    /// empty tile when out of range.
    pub fn tile_at(&self, x: i32, y: i32) -> TileInstance {
        self.index(x, y)
            .map_or_else(TileInstance::default, |i| self.tiles[i])
    }

    /// The live tile array in linear index order, for state hashing.
    pub fn tiles(&self) -> &[TileInstance] {
        &self.tiles
    }

    pub fn tile_at_coord(&self, coord: TileCoordinate) -> TileInstance {
        self.tile_at(coord.x, coord.y)
    }

    /// Returns the tile under a world position, wrap-aware.
    pub fn tile_at_world(&self, position: FpVec2) -> TileInstance {
        self.tile_at_coord(self.world_to_relative_tile(position))
    }

    /// Writes a tile. Out-of-range writes are no-ops; writes that do not
    /// change the stored value emit nothing.
    pub fn set_tile(&mut self, x: i32, y: i32, tile: TileInstance, events: &mut SimEvents) {
        let Some(index) = self.index(x, y) else {
            return;
        };

        if self.tiles[index] == tile {
            return;
        }

        self.tiles[index] = tile;
        let relative = TileCoordinate::new(x, y);
        events.emit_tile_changed(relative, self.to_world_tile(relative), tile);
    }

    /// Restores every cell that differs from the template, in ascending
    /// linear index order, emitting the signal/notification pair per
    /// differing cell and one trailing stage-reset pair. The `full` flag is
    /// forwarded to listeners untouched.
    pub fn reset_stage(&mut self, full: bool, events: &mut SimEvents) {
        let mut restored = 0usize;
        for index in 0..self.template.len() {
            let template = self.template[index];
            if self.tiles[index] != template {
                let relative = self.coordinate_of(index);
                events.emit_tile_changed(relative, self.to_world_tile(relative), template);
                restored += 1;
            }
            self.tiles[index] = template;
        }
        debug!(restored, full, "stage reset");
        events.emit_stage_reset(full);
    }

    /// Lower-left corner of the tilemap in world units.
    pub fn stage_world_min(&self) -> FpVec2 {
        FpVec2::new(
            half_tiles_to_world(self.origin.x) + self.world_position.x,
            half_tiles_to_world(self.origin.y) + self.world_position.y,
        )
    }

    /// Upper-right corner of the tilemap in world units.
    pub fn stage_world_max(&self) -> FpVec2 {
        FpVec2::new(
            half_tiles_to_world(self.origin.x + self.width) + self.world_position.x,
            half_tiles_to_world(self.origin.y + self.height) + self.world_position.y,
        )
    }

    /// Level width in world units.
    pub fn level_width(&self) -> Fp {
        half_tiles_to_world(self.width)
    }

    /// Converts a world position to the grid-relative tile containing it.
    pub fn world_to_relative_tile(&self, position: FpVec2) -> TileCoordinate {
        self.world_to_relative_tile_raw(FpVec2::new(self.wrap_world_x(position.x), position.y))
    }

    /// Like [`Self::world_to_relative_tile`] but without the wrap, so a
    /// sweep straddling the seam can keep a contiguous coordinate range and
    /// wrap per column instead.
    pub fn world_to_relative_tile_raw(&self, position: FpVec2) -> TileCoordinate {
        let local_x = (position.x - self.world_position.x) * 2;
        let local_y = (position.y - self.world_position.y) * 2;

        #[allow(clippy::cast_possible_truncation)]
        TileCoordinate::new(
            local_x.floor().to_num::<i64>() as i32 - self.origin.x,
            local_y.floor().to_num::<i64>() as i32 - self.origin.y,
        )
    }

    /// Wraps a grid-relative column index into `[0, width)` on wrapping
    /// stages.
    pub fn wrap_tile_x(&self, x: i32) -> i32 {
        if !self.wrapping {
            return x;
        }
        x.rem_euclid(self.width)
    }

    /// Center of a grid-relative tile in world units.
    pub fn relative_tile_to_world(&self, coord: TileCoordinate) -> FpVec2 {
        let quarter = fp_ratio(1, 4);
        FpVec2::new(
            half_tiles_to_world(coord.x + self.origin.x) + self.world_position.x + quarter,
            half_tiles_to_world(coord.y + self.origin.y) + self.world_position.y + quarter,
        )
    }

    /// Reinterprets a world x position modulo the level width on wrapping
    /// stages. Non-wrapping stages return the input unchanged.
    pub fn wrap_world_x(&self, x: Fp) -> Fp {
        if !self.wrapping {
            return x;
        }

        let min = half_tiles_to_world(self.origin.x) + self.world_position.x;
        let width = self.level_width();
        let mut x = x;
        while x < min {
            x += width;
        }
        while x >= min + width {
            x -= width;
        }
        x
    }

    /// Remaps `x` to the representation closest to `reference`, accounting
    /// for level wrap.
    pub fn unwrap_world_x(&self, reference: Fp, x: Fp) -> Fp {
        if !self.wrapping {
            return x;
        }
        unwrap_x(reference, x, self.level_width())
    }

    /// Whether any fully solid tile overlaps the world-space box. Used by
    /// collectibles deciding in-wall passthrough.
    pub fn is_any_tile_solid_in_box(&self, aabb: &Aabb) -> bool {
        if aabb.is_degenerate() {
            return false;
        }

        // Raw coordinates keep the range contiguous when the box straddles
        // the seam; each column wraps individually.
        let min = self.world_to_relative_tile_raw(aabb.min());
        let max = self.world_to_relative_tile_raw(aabb.max());
        for y in min.y..=max.y {
            for x in min.x..=max.x {
                if self.tile_at(self.wrap_tile_x(x), y).is_fully_solid() {
                    return true;
                }
            }
        }
        false
    }
}
