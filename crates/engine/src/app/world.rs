use thiserror::Error;
use tracing::{debug, error, info, warn};

use super::behavior::{
    Behavior, BehaviorError, CallbackResult, Command, Contact, Context, Controller, Game,
};
use super::entity::{Body, EntityId, EntityIdAllocator, Rect, Role};
use super::frame::{RenderFrame, SpriteDraw};
use super::input::{ActionSlot, GameAction};
use super::registry::{Entity, EntityRegistry};
use super::tilemap::{TileMap, TileMapError};
use super::timers::{AlarmRegistry, ControllerId, ListenerId, StepRegistry};
use super::viewport::{Positioning, Viewport, WorldBounds};

#[derive(Debug, Error)]
pub enum GameError {
    #[error("no player entity is present; {operation} needs one")]
    NoPlayer { operation: &'static str },
    #[error("a player entity is already present; entity {0:?} rejected")]
    DuplicatePlayer(EntityId),
    #[error("unknown entity {0:?}")]
    UnknownEntity(EntityId),
    #[error("unknown controller {0:?}")]
    UnknownController(ControllerId),
    #[error("no tile map is loaded")]
    NoTileMap,
    #[error(transparent)]
    TileMap(#[from] TileMapError),
    #[error("invalid world config: {0}")]
    InvalidConfig(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Move,
    Input,
    Collide,
    Alarms,
    Steps,
    Cleanup,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Move => "move",
            Self::Input => "input",
            Self::Collide => "collide",
            Self::Alarms => "alarms",
            Self::Steps => "steps",
            Self::Cleanup => "cleanup",
        }
    }
}

#[derive(Debug, Default)]
pub struct CycleReport {
    pub cycle: u64,
    pub callback_failures: usize,
    pub capped_sweeps: usize,
    pub errors: Vec<GameError>,
}

#[derive(Debug, Clone, Copy)]
pub(super) enum Locator {
    Index(usize),
    Id(EntityId),
}

/// Entities, tiles, timers and the viewport of one running game, stepped one
/// cycle at a time.
///
/// Callbacks never see the world directly; they get a [`Context`] whose
/// queued commands are applied right after each callback returns.
pub struct World<G: Game> {
    pub(super) game: G,
    pub(super) registry: EntityRegistry<G>,
    controllers: Vec<(ControllerId, Box<dyn Controller<G>>)>,
    pub(super) alarms: AlarmRegistry,
    pub(super) steps: StepRegistry,
    pub(super) tiles: Option<TileMap>,
    pub(super) viewport: Viewport,
    pub(super) bounds: WorldBounds,
    keys: ActionSlot,
    pub(super) ids: EntityIdAllocator,
    pub(super) commands: Vec<Command<G>>,
    pub(super) cycle: u64,
    next_controller: u32,
    pub(super) failures: usize,
}

impl<G: Game> World<G> {
    pub fn new(game: G, bounds: WorldBounds, screen_width: i32, screen_height: i32) -> Self {
        Self {
            game,
            registry: EntityRegistry::default(),
            controllers: Vec::new(),
            alarms: AlarmRegistry::default(),
            steps: StepRegistry::default(),
            tiles: None,
            viewport: Viewport::new(screen_width, screen_height),
            bounds,
            keys: ActionSlot::default(),
            ids: EntityIdAllocator::default(),
            commands: Vec::new(),
            cycle: 0,
            next_controller: 0,
            failures: 0,
        }
    }

    pub fn with_tiles(mut self, tiles: TileMap) -> Self {
        self.tiles = Some(tiles);
        self
    }

    pub fn set_tiles(&mut self, tiles: Option<TileMap>) {
        self.tiles = tiles;
    }

    pub fn tiles(&self) -> Option<&TileMap> {
        self.tiles.as_ref()
    }

    pub fn game(&self) -> &G {
        &self.game
    }

    pub fn game_mut(&mut self) -> &mut G {
        &mut self.game
    }

    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    pub fn bounds(&self) -> WorldBounds {
        self.bounds
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    /// Stages an entity; it becomes visible to the cycle at the next cleanup.
    pub fn add(
        &mut self,
        body: Body,
        behavior: impl Behavior<G> + 'static,
    ) -> Result<EntityId, GameError> {
        let id = self.ids.allocate();
        self.stage(Entity::new(id, body, Box::new(behavior)))?;
        Ok(id)
    }

    fn stage(&mut self, entity: Entity<G>) -> Result<(), GameError> {
        if entity.body.role() == Role::Player {
            if self.registry.has_live_player() {
                return Err(GameError::DuplicatePlayer(entity.id));
            }
            self.viewport
                .attach_player(entity.body.width(), entity.body.height());
        }
        debug!(entity = entity.id.0, role = ?entity.body.role(), "entity_staged");
        self.registry.stage(entity);
        Ok(())
    }

    /// Marks an entity deleted; it stays in the list until cleanup.
    pub fn delete(&mut self, id: EntityId) -> Result<(), GameError> {
        if self.registry.mark_deleted(id) {
            Ok(())
        } else {
            Err(GameError::UnknownEntity(id))
        }
    }

    pub fn delete_all(&mut self) {
        self.registry.mark_all_deleted();
    }

    pub fn add_controller(&mut self, controller: impl Controller<G> + 'static) -> ControllerId {
        let id = ControllerId(self.next_controller);
        self.next_controller = self.next_controller.saturating_add(1);
        self.controllers.push((id, Box::new(controller)));
        id
    }

    pub fn remove_controller(&mut self, id: ControllerId) -> Result<(), GameError> {
        let index = self
            .controllers
            .iter()
            .position(|(candidate, _)| *candidate == id)
            .ok_or(GameError::UnknownController(id))?;
        self.controllers.remove(index);
        self.forget_listener(ListenerId::Controller(id));
        Ok(())
    }

    /// Alarm for `listener` on cycle `current + delta`.
    pub fn set_timer(&mut self, listener: ListenerId, delta: u64, timer_id: u32) {
        self.alarms.schedule(self.cycle, delta, timer_id, listener);
    }

    pub fn add_step_listener(&mut self, listener: ListenerId) -> bool {
        self.steps.register(listener)
    }

    pub fn remove_step_listener(&mut self, listener: ListenerId) -> bool {
        self.steps.unregister(listener)
    }

    pub fn pending_alarms(&self) -> usize {
        self.alarms.len()
    }

    pub fn is_step_listener(&self, listener: ListenerId) -> bool {
        self.steps.contains(listener)
    }

    pub fn body(&self, id: EntityId) -> Option<&Body> {
        self.registry.get(id).map(|entity| &entity.body)
    }

    pub fn body_mut(&mut self, id: EntityId) -> Option<&mut Body> {
        self.registry.get_mut(id).map(|entity| &mut entity.body)
    }

    pub fn player_id(&self) -> Option<EntityId> {
        self.live_player().map(|entity| entity.id)
    }

    /// Committed entity ids in list order.
    pub fn entity_ids(&self) -> Vec<EntityId> {
        self.registry.ids()
    }

    pub fn entity_count(&self) -> usize {
        self.registry.len()
    }

    pub fn pending_count(&self) -> usize {
        self.registry.pending_len()
    }

    /// `(first_moving, player_index)` zone boundaries.
    pub fn zones(&self) -> (usize, usize) {
        (self.registry.first_moving(), self.registry.player_index())
    }

    pub fn query_by_tag(&self, tag: G::Tag) -> Vec<EntityId> {
        self.registry.query_by_tag(tag)
    }

    pub fn exists_by_tag(&self, tag: G::Tag) -> bool {
        self.registry.exists_by_tag(tag)
    }

    pub fn find_at(&self, area: Rect) -> Option<EntityId> {
        self.registry.find_at(area)
    }

    pub fn find_tiles_at(&self, area: Rect) -> u32 {
        self.tiles.as_ref().map_or(0, |tiles| tiles.find_tiles_at(area))
    }

    pub fn change_tile(&mut self, column: i32, row: i32, kind: u8) -> Result<(), GameError> {
        let tiles = self.tiles.as_mut().ok_or(GameError::NoTileMap)?;
        tiles.change_tile(column, row, kind)?;
        Ok(())
    }

    pub fn set_positioning(&mut self, positioning: Positioning) {
        self.viewport.set_positioning(positioning);
    }

    pub fn set_tolerance(&mut self, horizontal: f64, vertical: f64) {
        self.viewport.set_tolerance(horizontal, vertical);
    }

    pub fn set_viewport(&mut self, x: i32, y: i32) {
        self.viewport.set_position(x, y);
    }

    pub fn press_key(&mut self, action: GameAction) {
        self.keys.press(action);
    }

    pub fn release_key(&mut self, action: GameAction) {
        self.keys.release(action);
    }

    pub fn clear_keys(&mut self) {
        self.keys.clear();
    }

    /// Commits pending additions and places the viewport on the player.
    pub fn setup(&mut self) {
        self.cleanup();
        if let Some(player) = self.live_player().map(|entity| entity.body.rect()) {
            self.viewport.place_on_player(player);
            self.viewport.update(Some(player), self.bounds);
        }
        info!(
            entities = self.registry.len(),
            player = self.player_id().map(|id| id.0),
            "world_setup"
        );
    }

    /// Clears every pending alarm and restarts the cycle counter.
    pub fn reset_game_time(&mut self) {
        let dropped = self.alarms.len();
        self.alarms.clear();
        self.cycle = 0;
        info!(dropped_alarms = dropped, "game_time_reset");
    }

    /// One game cycle without rendering.
    pub fn run_cycle(&mut self) -> CycleReport {
        let report = self.run_phases();
        self.advance_cycle();
        report
    }

    /// Move, input, collide, alarms, steps, cleanup, then the viewport
    /// follows the player if it moved. The cycle counter is
    /// left for [`World::advance_cycle`] so rendering sees the same cycle.
    pub fn run_phases(&mut self) -> CycleReport {
        self.failures = 0;
        let mut report = CycleReport {
            cycle: self.cycle,
            ..CycleReport::default()
        };

        report.capped_sweeps += self.move_phase();
        match self.input_phase() {
            Ok(capped) => report.capped_sweeps += capped,
            Err(err) => {
                warn!(phase = Phase::Input.as_str(), error = %err, "phase_failed");
                report.errors.push(err);
            }
        }
        self.collision_phase();
        self.alarm_phase();
        self.step_phase();
        self.cleanup();
        let player = self.live_player().map(|entity| entity.body.rect());
        self.viewport.update(player, self.bounds);

        report.callback_failures = self.failures;
        report
    }

    pub fn advance_cycle(&mut self) {
        self.cycle = self.cycle.saturating_add(1);
    }

    fn move_phase(&mut self) -> usize {
        let mut capped = 0;
        for index in self.registry.first_moving()..self.registry.len() {
            let Some(entity) = self.registry.entry_mut(index) else {
                break;
            };
            let body = &mut entity.body;
            if !body.is_active() || body.speed() <= 0.0 {
                continue;
            }
            if !body.advance() {
                continue;
            }
            let is_player = body.role() == Role::Player;
            let sweeps = body.has_collision_detection();
            if is_player {
                self.viewport.mark_dirty();
            }
            if sweeps && self.sweep_entity(index, Phase::Move) {
                capped += 1;
            }
            let outside = self
                .registry
                .entries()
                .get(index)
                .is_some_and(|entity| self.bounds.is_outside(entity.body.rect()));
            if outside {
                self.dispatch_entity(Locator::Index(index), Phase::Move, |entity, ctx| {
                    let Entity { body, behavior, .. } = entity;
                    behavior
                        .as_collision_receiver()
                        .map(|receiver| receiver.on_outside_world(body, ctx))
                });
            }
        }
        capped
    }

    fn input_phase(&mut self) -> Result<usize, GameError> {
        let sample = self.keys.sample();
        let Some(index) = self.live_player().map(|_| self.registry.player_index()) else {
            if sample.has_key {
                return Err(GameError::NoPlayer {
                    operation: "key handling",
                });
            }
            return Ok(0);
        };

        if let Some(player) = self.registry.entry_mut(index) {
            player.body.set_key_state(sample.has_key, sample.is_repeat);
        }
        if let Some(action) = sample.action {
            self.dispatch_entity(Locator::Index(index), Phase::Input, |entity, ctx| {
                let Entity { body, behavior, .. } = entity;
                behavior
                    .as_input_receiver()
                    .map(|receiver| receiver.on_action(body, action, ctx))
            });
        }

        let Some(player) = self.registry.entry_mut(index) else {
            return Ok(0);
        };
        if !player.body.take_player_moved() {
            return Ok(0);
        }
        let sweeps = player.body.has_collision_detection();
        self.viewport.mark_dirty();
        if sweeps && self.sweep_entity(index, Phase::Input) {
            return Ok(1);
        }
        Ok(0)
    }

    fn alarm_phase(&mut self) {
        while let Some(alarm) = self.alarms.take_due(self.cycle) {
            let timer_id = alarm.timer_id;
            match alarm.listener {
                ListenerId::Entity(id) => {
                    self.dispatch_entity(Locator::Id(id), Phase::Alarms, |entity, ctx| {
                        let Entity { body, behavior, .. } = entity;
                        behavior
                            .as_alarm_listener()
                            .map(|listener| listener.on_alarm(body, timer_id, ctx))
                    });
                }
                ListenerId::Controller(id) => {
                    self.dispatch_controller(id, Phase::Alarms, |controller, ctx| {
                        controller.on_alarm(timer_id, ctx)
                    });
                }
            }
        }
    }

    fn step_phase(&mut self) {
        let cycle = self.cycle;
        for listener in self.steps.snapshot() {
            if !self.steps.contains(listener) {
                continue;
            }
            match listener {
                ListenerId::Entity(id) => {
                    self.dispatch_entity(Locator::Id(id), Phase::Steps, |entity, ctx| {
                        let Entity { body, behavior, .. } = entity;
                        behavior
                            .as_step_listener()
                            .map(|listener| listener.on_step(body, cycle, ctx))
                    });
                }
                ListenerId::Controller(id) => {
                    self.dispatch_controller(id, Phase::Steps, |controller, ctx| {
                        controller.on_step(cycle, ctx)
                    });
                }
            }
        }
    }

    /// Removes deleted entities, commits pending ones and drops the timers
    /// of everything that left.
    pub fn cleanup(&mut self) {
        let report = self.registry.cleanup();
        for id in &report.rejected {
            error!(entity = id.0, "duplicate_player_rejected");
        }
        for &id in report.removed.iter().chain(report.rejected.iter()) {
            self.forget_listener(ListenerId::Entity(id));
        }
        let player = self
            .live_player()
            .map(|entity| (entity.id, entity.body.width(), entity.body.height()));
        match player {
            Some((id, width, height)) if report.added.contains(&id) => {
                self.viewport.attach_player(width, height);
            }
            Some(_) => {}
            None => self.viewport.detach_player(),
        }
        if !report.removed.is_empty() || !report.added.is_empty() {
            debug!(
                removed = report.removed.len(),
                added = report.added.len(),
                entities = self.registry.len(),
                "registry_cleanup"
            );
        }
    }

    fn forget_listener(&mut self, listener: ListenerId) {
        self.alarms.remove_listener(listener);
        self.steps.unregister(listener);
    }

    /// Animates in-view entities and collects what to draw.
    pub fn prepare_frame(&mut self) -> RenderFrame<G::Tag> {
        let view = self.viewport.rect();

        let (tile_width, tile_height, tiles) = match self.tiles.as_ref() {
            Some(tiles) => {
                let geometry = tiles.geometry();
                (geometry.cell_width, geometry.cell_height, tiles.visible_tiles(view))
            }
            None => (0, 0, Vec::new()),
        };

        let viewport = &self.viewport;
        let mut sprites = Vec::new();
        for entity in self.registry.entries_mut() {
            if !entity.body.is_active() || !viewport.is_in_view(entity.body.rect()) {
                continue;
            }
            entity.behavior.animate(&mut entity.body);
            if !entity.body.is_visible() {
                continue;
            }
            sprites.push(SpriteDraw {
                id: entity.id,
                tag: entity.behavior.tag(),
                screen_x: entity.body.x() - view.x,
                screen_y: entity.body.y() - view.y,
                width: entity.body.width(),
                height: entity.body.height(),
                frame: entity.body.frame(),
            });
        }

        RenderFrame {
            cycle: self.cycle,
            camera_x: view.x,
            camera_y: view.y,
            screen_width: view.w,
            screen_height: view.h,
            tile_width,
            tile_height,
            tiles,
            sprites,
        }
    }

    fn live_player(&self) -> Option<&Entity<G>> {
        self.registry
            .player()
            .filter(|entity| entity.body.role() == Role::Player && entity.body.is_active())
    }

    pub(super) fn player_contact(&self) -> Option<Contact<G::Tag>> {
        self.live_player().map(Entity::contact)
    }

    /// Runs one entity callback with a fresh context, then applies its commands.
    pub(super) fn dispatch_entity(
        &mut self,
        locator: Locator,
        phase: Phase,
        callback: impl FnOnce(&mut Entity<G>, &mut Context<'_, G>) -> Option<CallbackResult>,
    ) {
        let player = self.player_contact();
        let World {
            game,
            registry,
            tiles,
            ids,
            commands,
            cycle,
            bounds,
            ..
        } = self;
        let entity = match locator {
            Locator::Index(index) => registry.entry_mut(index),
            Locator::Id(id) => registry.get_mut(id),
        };
        let Some(entity) = entity else {
            debug!(phase = phase.as_str(), ?locator, "callback_target_missing");
            return;
        };
        let listener = ListenerId::Entity(entity.id);
        let mut ctx = Context::new(
            game,
            commands,
            ids,
            tiles.as_ref(),
            *cycle,
            *bounds,
            player,
            listener,
        );
        let outcome = callback(entity, &mut ctx);
        if let Some(Err(err)) = outcome {
            self.record_failure(phase, listener, &err);
        }
        self.flush_commands();
    }

    fn dispatch_controller(
        &mut self,
        id: ControllerId,
        phase: Phase,
        callback: impl FnOnce(&mut dyn Controller<G>, &mut Context<'_, G>) -> CallbackResult,
    ) {
        let player = self.player_contact();
        let World {
            game,
            controllers,
            tiles,
            ids,
            commands,
            cycle,
            bounds,
            ..
        } = self;
        let Some((_, controller)) = controllers.iter_mut().find(|(candidate, _)| *candidate == id)
        else {
            debug!(phase = phase.as_str(), controller = id.0, "callback_target_missing");
            return;
        };
        let listener = ListenerId::Controller(id);
        let mut ctx = Context::new(
            game,
            commands,
            ids,
            tiles.as_ref(),
            *cycle,
            *bounds,
            player,
            listener,
        );
        let outcome = callback(controller.as_mut(), &mut ctx);
        if let Err(err) = outcome {
            self.record_failure(phase, listener, &err);
        }
        self.flush_commands();
    }

    pub(super) fn record_failure(
        &mut self,
        phase: Phase,
        listener: ListenerId,
        err: &BehaviorError,
    ) {
        self.failures += 1;
        warn!(
            phase = phase.as_str(),
            listener = ?listener,
            error = %err,
            "callback_failed"
        );
    }

    /// Applies structural changes queued by callbacks, in order.
    pub(super) fn flush_commands(&mut self) {
        for command in std::mem::take(&mut self.commands) {
            match command {
                Command::Add(entity) => {
                    if let Err(err) = self.stage(entity) {
                        warn!(error = %err, "entity_add_rejected");
                    }
                }
                Command::Delete(id) => {
                    if !self.registry.mark_deleted(id) {
                        debug!(entity = id.0, "delete_of_unknown_entity");
                    }
                }
                Command::SetTimer {
                    delta,
                    timer_id,
                    listener,
                } => self.alarms.schedule(self.cycle, delta, timer_id, listener),
                Command::RegisterStep(listener) => {
                    self.steps.register(listener);
                }
                Command::UnregisterStep(listener) => {
                    self.steps.unregister(listener);
                }
                Command::ChangeTile { column, row, kind } => {
                    if let Err(err) = self.change_tile(column, row, kind) {
                        warn!(column, row, kind, error = %err, "tile_change_rejected");
                    }
                }
            }
        }
    }
}
