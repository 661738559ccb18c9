use super::entity::EntityId;
use super::tilemap::VisibleTile;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpriteDraw<T> {
    pub id: EntityId,
    pub tag: T,
    pub screen_x: i32,
    pub screen_y: i32,
    pub width: i32,
    pub height: i32,
    pub frame: u32,
}

/// Everything the renderer needs for one frame, in draw order.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderFrame<T> {
    pub cycle: u64,
    pub camera_x: i32,
    pub camera_y: i32,
    pub screen_width: i32,
    pub screen_height: i32,
    pub tile_width: i32,
    pub tile_height: i32,
    pub tiles: Vec<VisibleTile>,
    /// Static entities first, then moving ones, then the player.
    pub sprites: Vec<SpriteDraw<T>>,
}
