use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use pixels::Error as PixelsError;
use thiserror::Error;
use tracing::{info, warn};
use winit::dpi::LogicalSize;
use winit::error::{EventLoopError, OsError};
use winit::event::{ElementState, Event, KeyEvent, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::WindowBuilder;

use super::game_loop::{remaining_budget, GameLoop, DEFAULT_CYCLES_PER_SECOND};
use super::metrics::MetricsAccumulator;
use super::{Game, GameAction, MetricsHandle, Renderer, World};

#[derive(Debug, Clone)]
pub struct LoopConfig {
    pub window_title: String,
    /// Window size is the world screen size times this factor.
    pub window_scale: u32,
    pub cycles_per_second: u32,
    pub metrics_log_interval: Duration,
    /// Suspend when the window loses focus and resume when it regains it.
    pub pause_on_focus_loss: bool,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            window_title: "Tile Engine".to_string(),
            window_scale: 3,
            cycles_per_second: DEFAULT_CYCLES_PER_SECOND,
            metrics_log_interval: Duration::from_secs(5),
            pause_on_focus_loss: true,
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("failed to create event loop: {0}")]
    CreateEventLoop(#[source] EventLoopError),
    #[error("failed to create application window: {0}")]
    CreateWindow(#[source] OsError),
    #[error("failed to initialize renderer: {0}")]
    CreateRenderer(#[source] PixelsError),
    #[error("event loop failed: {0}")]
    EventLoopRun(#[source] EventLoopError),
}

pub fn run_app<G: Game>(config: LoopConfig, world: World<G>) -> Result<(), AppError> {
    let metrics_handle = MetricsHandle::default();
    run_app_with_metrics(config, world, metrics_handle)
}

/// Opens a window and runs `world` in it until the window closes or Escape
/// is pressed. One cycle runs per redraw while the loop is running.
pub fn run_app_with_metrics<G: Game>(
    config: LoopConfig,
    world: World<G>,
    metrics_handle: MetricsHandle,
) -> Result<(), AppError> {
    let screen_width = world.viewport().screen_width().max(1) as u32;
    let screen_height = world.viewport().screen_height().max(1) as u32;
    let scale = config.window_scale.max(1);

    let event_loop = EventLoop::new().map_err(AppError::CreateEventLoop)?;
    let window = Arc::new(
        WindowBuilder::new()
            .with_title(config.window_title.clone())
            .with_inner_size(LogicalSize::new(
                f64::from(screen_width * scale),
                f64::from(screen_height * scale),
            ))
            .build(&event_loop)
            .map_err(AppError::CreateWindow)?,
    );
    let mut renderer = Renderer::new(Arc::clone(&window), screen_width, screen_height)
        .map_err(AppError::CreateRenderer)?;

    event_loop.set_control_flow(ControlFlow::Poll);

    let metrics_log_interval =
        normalize_non_zero_duration(config.metrics_log_interval, Duration::from_secs(5));
    let mut game_loop = GameLoop::new(world, config.cycles_per_second);
    let cycle_budget = game_loop.cycle_budget();
    let mut input_collector = InputCollector::default();
    let mut pause = PauseControl::default();
    let mut metrics_accumulator = MetricsAccumulator::new(metrics_log_interval);

    info!(
        cycles_per_second = config.cycles_per_second.max(1),
        cycle_budget_ms = cycle_budget.as_millis() as u64,
        screen_width,
        screen_height,
        window_scale = scale,
        "loop_config"
    );
    game_loop.start();

    event_loop
        .run(move |event, window_target| match event {
            Event::WindowEvent { window_id, event } if window_id == window.id() => match event {
                WindowEvent::CloseRequested => {
                    info!(reason = "window_close", "shutdown_requested");
                    window_target.exit();
                }
                WindowEvent::Resized(new_size) => {
                    if let Err(error) = renderer.resize(new_size.width, new_size.height) {
                        warn!(error = %error, "renderer_resize_failed");
                        window_target.exit();
                    }
                }
                WindowEvent::Focused(focused) if config.pause_on_focus_loss => {
                    pause.set_focused(&mut game_loop, focused);
                }
                WindowEvent::KeyboardInput { event, .. } => {
                    input_collector.handle_keyboard_input(&event);
                    if input_collector.quit_requested {
                        info!(reason = "escape_key", "shutdown_requested");
                        window_target.exit();
                    }
                    if input_collector.take_pause_pressed() {
                        pause.toggle_user_pause(&mut game_loop);
                    }
                    input_collector.apply_to(game_loop.world_mut());
                }
                WindowEvent::RedrawRequested => {
                    let started = Instant::now();
                    let Some(tick) = game_loop.tick() else {
                        window_target.set_control_flow(ControlFlow::Wait);
                        return;
                    };
                    window_target.set_control_flow(ControlFlow::Poll);

                    if let Err(error) = renderer.render(&tick.frame, game_loop.world().game()) {
                        warn!(error = %error, "renderer_draw_failed");
                        window_target.exit();
                    }

                    let work = started.elapsed();
                    metrics_accumulator.record_cycle(
                        work,
                        cycle_budget,
                        tick.report.callback_failures,
                    );
                    let sleep = remaining_budget(work, cycle_budget);
                    if sleep > Duration::ZERO {
                        thread::sleep(sleep);
                    }

                    if let Some(snapshot) = metrics_accumulator.maybe_snapshot(Instant::now()) {
                        metrics_handle.publish(snapshot);
                        info!(
                            cps = snapshot.cps,
                            cycle_time_ms = snapshot.cycle_time_ms,
                            overruns = snapshot.overruns,
                            callback_failures = snapshot.callback_failures,
                            cycle = tick.frame.cycle,
                            entity_count = game_loop.world().entity_count(),
                            "loop_metrics"
                        );
                    }
                }
                _ => {}
            },
            Event::AboutToWait => {
                if game_loop.is_running() {
                    window.request_redraw();
                }
            }
            Event::LoopExiting => {
                game_loop.stop();
                let cycle = game_loop.world().cycle();
                game_loop.world_mut().game_mut().on_exit(cycle);
                info!(cycle, "shutdown");
            }
            _ => {}
        })
        .map_err(AppError::EventLoopRun)
}

/// Combines the user's pause toggle with window focus. The loop only runs
/// while focused and not paused, so regaining focus never lifts a user pause.
#[derive(Debug)]
struct PauseControl {
    user_paused: bool,
    focused: bool,
}

impl Default for PauseControl {
    fn default() -> Self {
        Self {
            user_paused: false,
            focused: true,
        }
    }
}

impl PauseControl {
    fn toggle_user_pause<G: Game>(&mut self, game_loop: &mut GameLoop<G>) {
        self.user_paused = !self.user_paused;
        info!(paused = self.user_paused, "user_pause_toggled");
        self.apply(game_loop);
    }

    fn set_focused<G: Game>(&mut self, game_loop: &mut GameLoop<G>, focused: bool) {
        self.focused = focused;
        self.apply(game_loop);
    }

    fn apply<G: Game>(&self, game_loop: &mut GameLoop<G>) {
        if self.focused && !self.user_paused {
            game_loop.resume();
        } else {
            game_loop.suspend();
        }
    }
}

/// Turns keyboard events into game actions between cycles.
#[derive(Debug, Default)]
struct InputCollector {
    quit_requested: bool,
    pause_key_is_down: bool,
    pause_pressed_edge: bool,
    transitions: Vec<(GameAction, bool)>,
}

impl InputCollector {
    fn handle_keyboard_input(&mut self, key_event: &KeyEvent) {
        if key_event.repeat {
            return;
        }
        let is_pressed = key_event.state == ElementState::Pressed;
        self.handle_physical_key(key_event.physical_key, is_pressed);
        self.handle_pause_key_state(is_pause_key(key_event.physical_key), key_event.state);
    }

    fn handle_physical_key(&mut self, key: PhysicalKey, is_pressed: bool) {
        if key == PhysicalKey::Code(KeyCode::Escape) {
            if is_pressed {
                self.quit_requested = true;
            }
            return;
        }
        if let Some(action) = action_for_key(key) {
            self.transitions.push((action, is_pressed));
        }
    }

    fn handle_pause_key_state(&mut self, is_pause_key: bool, state: ElementState) {
        if !is_pause_key {
            return;
        }
        match state {
            ElementState::Pressed => {
                if !self.pause_key_is_down {
                    self.pause_pressed_edge = true;
                }
                self.pause_key_is_down = true;
            }
            ElementState::Released => self.pause_key_is_down = false,
        }
    }

    fn take_pause_pressed(&mut self) -> bool {
        std::mem::take(&mut self.pause_pressed_edge)
    }

    fn apply_to<G: Game>(&mut self, world: &mut World<G>) {
        for (action, is_pressed) in self.transitions.drain(..) {
            if is_pressed {
                world.press_key(action);
            } else {
                world.release_key(action);
            }
        }
    }
}

fn action_for_key(key: PhysicalKey) -> Option<GameAction> {
    let PhysicalKey::Code(code) = key else {
        return None;
    };
    let action = match code {
        KeyCode::KeyW | KeyCode::ArrowUp => GameAction::Up,
        KeyCode::KeyS | KeyCode::ArrowDown => GameAction::Down,
        KeyCode::KeyA | KeyCode::ArrowLeft => GameAction::Left,
        KeyCode::KeyD | KeyCode::ArrowRight => GameAction::Right,
        KeyCode::Space | KeyCode::Enter => GameAction::Fire,
        KeyCode::KeyZ | KeyCode::Digit1 => GameAction::ButtonA,
        KeyCode::KeyX | KeyCode::Digit2 => GameAction::ButtonB,
        KeyCode::KeyC | KeyCode::Digit3 => GameAction::ButtonC,
        KeyCode::KeyV | KeyCode::Digit4 => GameAction::ButtonD,
        _ => return None,
    };
    Some(action)
}

fn is_pause_key(key: PhysicalKey) -> bool {
    key == PhysicalKey::Code(KeyCode::KeyP)
}

fn normalize_non_zero_duration(value: Duration, fallback: Duration) -> Duration {
    if value.is_zero() {
        fallback
    } else {
        value
    }
}
