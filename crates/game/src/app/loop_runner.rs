use std::process::ExitCode;

use tile_engine::{run_app, GameLoop, Game};
use tracing::{error, info};

use super::bootstrap::{AppWiring, RunMode};

/// Cycles between progress lines in headless mode.
const HEADLESS_LOG_INTERVAL: u64 = 50;

pub(crate) fn run(app: AppWiring) -> ExitCode {
    match app.mode {
        RunMode::Windowed => {
            if let Err(err) = run_app(app.config, app.world) {
                error!(error = %err, "startup_failed");
                return ExitCode::FAILURE;
            }
        }
        RunMode::Headless { cycles } => run_headless(app, cycles),
    }

    ExitCode::SUCCESS
}

fn run_headless(app: AppWiring, cycles: u64) {
    let mut game_loop = GameLoop::new(app.world, app.config.cycles_per_second);
    game_loop.start();

    let completed = game_loop.run_cycles(cycles, |world, tick| {
        if tick.report.callback_failures > 0 || !tick.report.errors.is_empty() {
            error!(
                cycle = tick.report.cycle,
                failures = tick.report.callback_failures,
                errors = tick.report.errors.len(),
                "cycle_had_failures"
            );
        }
        if tick.frame.cycle % HEADLESS_LOG_INTERVAL == 0 {
            info!(
                cycle = tick.frame.cycle,
                entities = world.entity_count(),
                sprites = tick.frame.sprites.len(),
                score = world.game().score(),
                "headless_progress"
            );
        }
    });

    game_loop.stop();
    let cycle = game_loop.world().cycle();
    game_loop.world_mut().game_mut().on_exit(cycle);
    info!(completed, score = game_loop.world().game().score(), "shutdown");
}
