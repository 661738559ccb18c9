use std::error::Error as StdError;
use std::fmt;

use thiserror::Error;

use super::entity::{Axis, Body, EntityId, EntityIdAllocator, Rect, Role};
use super::input::GameAction;
use super::registry::Entity;
use super::tilemap::{TileMap, TileMapError};
use super::timers::ListenerId;
use super::viewport::WorldBounds;

/// Game-wide types plugged into the engine.
///
/// The implementing type is also the shared game state every callback can
/// reach through [`Context::game`].
pub trait Game: 'static {
    type Tag: Copy + Eq + fmt::Debug + 'static;

    fn background_color(&self) -> [u8; 4] {
        [20, 22, 28, 255]
    }

    fn tile_color(&self, kind: u8) -> [u8; 4] {
        let shade = 60u8.saturating_add(kind.saturating_mul(40));
        [shade, shade, shade, 255]
    }

    fn sprite_color(&self, _tag: Self::Tag, _frame: u32) -> [u8; 4] {
        [220, 220, 240, 255]
    }

    /// Called once when the host stops running the game.
    fn on_exit(&mut self, _cycle: u64) {}
}

#[derive(Debug, Error)]
pub enum BehaviorError {
    #[error("{0}")]
    Failed(String),
    #[error(transparent)]
    TileMap(#[from] TileMapError),
    #[error(transparent)]
    Other(#[from] Box<dyn StdError + Send + Sync>),
}

impl BehaviorError {
    pub fn msg(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

pub type CallbackResult = Result<(), BehaviorError>;

/// Read-only view of another entity handed to collision callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Contact<T> {
    pub id: EntityId,
    pub tag: T,
    pub role: Role,
    pub rect: Rect,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileHit {
    /// Bit `n - 1` is set for every tile kind `n` met at the crossing.
    pub pattern: u32,
    pub axis: Axis,
    /// Entity x (horizontal) or y (vertical) at the moment of crossing.
    pub position: i32,
}

impl TileHit {
    pub fn is_horizontal(&self) -> bool {
        self.axis == Axis::Horizontal
    }

    pub fn contains_kind(&self, kind: u8) -> bool {
        super::tilemap::tile_bit(kind) & self.pattern != 0
    }
}

pub trait Behavior<G: Game> {
    fn tag(&self) -> G::Tag;

    /// Runs once per rendered frame while the entity is in view.
    fn animate(&mut self, body: &mut Body) {
        body.next_frame();
    }

    fn as_collision_receiver(&mut self) -> Option<&mut dyn CollisionReceiver<G>> {
        None
    }

    fn as_input_receiver(&mut self) -> Option<&mut dyn InputReceiver<G>> {
        None
    }

    fn as_step_listener(&mut self) -> Option<&mut dyn StepListener<G>> {
        None
    }

    fn as_alarm_listener(&mut self) -> Option<&mut dyn AlarmListener<G>> {
        None
    }
}

pub trait CollisionReceiver<G: Game> {
    fn on_entity_collision(
        &mut self,
        _body: &mut Body,
        _other: &Contact<G::Tag>,
        _ctx: &mut Context<'_, G>,
    ) -> CallbackResult {
        Ok(())
    }

    fn on_tile_collision(
        &mut self,
        _body: &mut Body,
        _hit: TileHit,
        _ctx: &mut Context<'_, G>,
    ) -> CallbackResult {
        Ok(())
    }

    fn on_outside_world(&mut self, _body: &mut Body, _ctx: &mut Context<'_, G>) -> CallbackResult {
        Ok(())
    }
}

pub trait InputReceiver<G: Game> {
    fn on_action(
        &mut self,
        body: &mut Body,
        action: GameAction,
        ctx: &mut Context<'_, G>,
    ) -> CallbackResult;
}

pub trait StepListener<G: Game> {
    fn on_step(&mut self, body: &mut Body, cycle: u64, ctx: &mut Context<'_, G>) -> CallbackResult;
}

pub trait AlarmListener<G: Game> {
    fn on_alarm(
        &mut self,
        body: &mut Body,
        timer_id: u32,
        ctx: &mut Context<'_, G>,
    ) -> CallbackResult;
}

/// Alarm and step listener that is not an entity.
pub trait Controller<G: Game> {
    fn on_alarm(&mut self, _timer_id: u32, _ctx: &mut Context<'_, G>) -> CallbackResult {
        Ok(())
    }

    fn on_step(&mut self, _cycle: u64, _ctx: &mut Context<'_, G>) -> CallbackResult {
        Ok(())
    }
}

pub(crate) enum Command<G: Game> {
    Add(Entity<G>),
    Delete(EntityId),
    SetTimer {
        delta: u64,
        timer_id: u32,
        listener: ListenerId,
    },
    RegisterStep(ListenerId),
    UnregisterStep(ListenerId),
    ChangeTile {
        column: i32,
        row: i32,
        kind: u8,
    },
}

/// What a callback may touch besides its own body. Structural changes are
/// queued and applied by the world as soon as the callback returns.
pub struct Context<'a, G: Game> {
    game: &'a mut G,
    commands: &'a mut Vec<Command<G>>,
    ids: &'a mut EntityIdAllocator,
    tiles: Option<&'a TileMap>,
    cycle: u64,
    bounds: WorldBounds,
    player: Option<Contact<G::Tag>>,
    listener: ListenerId,
}

impl<'a, G: Game> Context<'a, G> {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        game: &'a mut G,
        commands: &'a mut Vec<Command<G>>,
        ids: &'a mut EntityIdAllocator,
        tiles: Option<&'a TileMap>,
        cycle: u64,
        bounds: WorldBounds,
        player: Option<Contact<G::Tag>>,
        listener: ListenerId,
    ) -> Self {
        Self {
            game,
            commands,
            ids,
            tiles,
            cycle,
            bounds,
            player,
            listener,
        }
    }

    pub fn game(&mut self) -> &mut G {
        self.game
    }

    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    pub fn bounds(&self) -> WorldBounds {
        self.bounds
    }

    /// Player snapshot taken when the callback started.
    pub fn player(&self) -> Option<&Contact<G::Tag>> {
        self.player.as_ref()
    }

    /// Listener the running callback belongs to.
    pub fn listener(&self) -> ListenerId {
        self.listener
    }

    /// Stages a new entity; it joins the registry at the next cleanup.
    pub fn add(&mut self, body: Body, behavior: impl Behavior<G> + 'static) -> EntityId {
        let id = self.ids.allocate();
        self.commands
            .push(Command::Add(Entity::new(id, body, Box::new(behavior))));
        id
    }

    pub fn delete(&mut self, id: EntityId) {
        self.commands.push(Command::Delete(id));
    }

    pub fn delete_self(&mut self) {
        if let ListenerId::Entity(id) = self.listener {
            self.delete(id);
        }
    }

    pub fn set_timer(&mut self, delta: u64, timer_id: u32) {
        self.set_timer_for(self.listener, delta, timer_id);
    }

    pub fn set_timer_for(&mut self, listener: ListenerId, delta: u64, timer_id: u32) {
        self.commands.push(Command::SetTimer {
            delta,
            timer_id,
            listener,
        });
    }

    pub fn add_step_listener(&mut self) {
        self.commands.push(Command::RegisterStep(self.listener));
    }

    pub fn remove_step_listener(&mut self) {
        self.commands.push(Command::UnregisterStep(self.listener));
    }

    pub fn find_tiles_at(&self, area: Rect) -> u32 {
        self.tiles.map_or(0, |tiles| tiles.find_tiles_at(area))
    }

    /// Validated now, applied when the callback returns.
    pub fn change_tile(&mut self, column: i32, row: i32, kind: u8) -> Result<(), TileMapError> {
        if let Some(tiles) = self.tiles {
            tiles.check_change(column, row, kind)?;
        }
        self.commands
            .push(Command::ChangeTile { column, row, kind });
        Ok(())
    }
}
