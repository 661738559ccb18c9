mod behavior;
mod collision;
mod config;
mod entity;
mod frame;
mod game_loop;
mod input;
mod loop_runner;
mod metrics;
mod registry;
mod rendering;
mod tilemap;
mod timers;
mod viewport;
mod world;

pub use behavior::{
    AlarmListener, Behavior, BehaviorError, CallbackResult, CollisionReceiver, Contact, Context,
    Controller, Game, InputReceiver, StepListener, TileHit,
};
pub use config::{PositioningName, TileMapConfig, ViewportConfig, WorldConfig};
pub use entity::{Axis, Body, EntityId, Lifecycle, Rect, Role};
pub use frame::{RenderFrame, SpriteDraw};
pub use game_loop::{
    cycle_budget, remaining_budget, GameLoop, LoopState, Tick, DEFAULT_CYCLES_PER_SECOND,
};
pub use input::{GameAction, KeySample};
pub use loop_runner::{run_app, run_app_with_metrics, AppError, LoopConfig};
pub use metrics::{LoopMetricsSnapshot, MetricsHandle};
pub use rendering::Renderer;
pub use tilemap::{
    tile_bit, TileGeometry, TileMap, TileMapError, VisibleTile, MAX_TILE_KINDS, NO_TILE,
};
pub use timers::{Alarm, AlarmRegistry, ControllerId, ListenerId, StepRegistry};
pub use viewport::{Positioning, Viewport, ViewportLimits, WorldBounds, DEFAULT_TOLERANCE};
pub use world::{CycleReport, GameError, Phase, World};
