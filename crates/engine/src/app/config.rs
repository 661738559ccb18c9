use serde::Deserialize;

use super::behavior::Game;
use super::tilemap::{TileGeometry, TileMap};
use super::viewport::{Positioning, WorldBounds, DEFAULT_TOLERANCE};
use super::world::{GameError, World};

/// Everything a world needs before the first cycle. Usually deserialized from
/// a level file.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WorldConfig {
    pub bounds: WorldBounds,
    pub screen_width: i32,
    pub screen_height: i32,
    #[serde(default)]
    pub tiles: Option<TileMapConfig>,
    #[serde(default)]
    pub viewport: ViewportConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TileMapConfig {
    pub cell_width: i32,
    pub cell_height: i32,
    #[serde(default)]
    pub origin_x: i32,
    #[serde(default)]
    pub origin_y: i32,
    pub kind_count: u8,
    pub rows: Vec<Vec<u8>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ViewportConfig {
    #[serde(default)]
    pub positioning: Vec<PositioningName>,
    #[serde(default = "default_tolerance")]
    pub horizontal_tolerance: f64,
    #[serde(default = "default_tolerance")]
    pub vertical_tolerance: f64,
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self {
            positioning: Vec::new(),
            horizontal_tolerance: DEFAULT_TOLERANCE,
            vertical_tolerance: DEFAULT_TOLERANCE,
        }
    }
}

fn default_tolerance() -> f64 {
    DEFAULT_TOLERANCE
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositioningName {
    Top,
    Vcenter,
    Bottom,
    Left,
    Hcenter,
    Right,
    Fixed,
}

impl From<PositioningName> for Positioning {
    fn from(name: PositioningName) -> Self {
        match name {
            PositioningName::Top => Positioning::TOP,
            PositioningName::Vcenter => Positioning::VCENTER,
            PositioningName::Bottom => Positioning::BOTTOM,
            PositioningName::Left => Positioning::LEFT,
            PositioningName::Hcenter => Positioning::HCENTER,
            PositioningName::Right => Positioning::RIGHT,
            PositioningName::Fixed => Positioning::FIXED,
        }
    }
}

impl WorldConfig {
    pub fn validate(&self) -> Result<(), GameError> {
        if self.screen_width <= 0 || self.screen_height <= 0 {
            return Err(GameError::InvalidConfig(format!(
                "screen size must be positive, got {}x{}",
                self.screen_width, self.screen_height
            )));
        }
        let bounds = self.bounds;
        if bounds.min_x >= bounds.max_x || bounds.min_y >= bounds.max_y {
            return Err(GameError::InvalidConfig(format!(
                "world bounds are empty: ({}, {})..({}, {})",
                bounds.min_x, bounds.min_y, bounds.max_x, bounds.max_y
            )));
        }
        for (axis, tolerance) in [
            ("horizontal", self.viewport.horizontal_tolerance),
            ("vertical", self.viewport.vertical_tolerance),
        ] {
            if !(0.0..=1.0).contains(&tolerance) {
                return Err(GameError::InvalidConfig(format!(
                    "{axis} tolerance {tolerance} is outside 0..=1"
                )));
            }
        }
        Ok(())
    }

    /// Union of the configured positioning bits; nothing configured means fixed.
    pub fn positioning(&self) -> Positioning {
        self.viewport
            .positioning
            .iter()
            .copied()
            .map(Positioning::from)
            .reduce(Positioning::union)
            .unwrap_or(Positioning::FIXED)
    }

    pub fn build_tiles(&self) -> Result<Option<TileMap>, GameError> {
        let Some(tiles) = &self.tiles else {
            return Ok(None);
        };
        let geometry = TileGeometry {
            cell_width: tiles.cell_width,
            cell_height: tiles.cell_height,
            origin_x: tiles.origin_x,
            origin_y: tiles.origin_y,
        };
        let map = TileMap::from_rows(&tiles.rows, geometry, tiles.kind_count)?;
        Ok(Some(map))
    }

    pub fn build_world<G: Game>(&self, game: G) -> Result<World<G>, GameError> {
        self.validate()?;
        let mut world = World::new(game, self.bounds, self.screen_width, self.screen_height);
        world.set_tiles(self.build_tiles()?);
        world.set_positioning(self.positioning());
        world.set_tolerance(
            self.viewport.horizontal_tolerance,
            self.viewport.vertical_tolerance,
        );
        Ok(world)
    }
}
