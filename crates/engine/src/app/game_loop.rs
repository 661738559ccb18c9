use std::thread;
use std::time::{Duration, Instant};

use tracing::info;

use super::behavior::Game;
use super::frame::RenderFrame;
use super::world::{CycleReport, World};

pub const DEFAULT_CYCLES_PER_SECOND: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Stopped,
    Running,
    Suspended,
}

impl LoopState {
    fn as_str(self) -> &'static str {
        match self {
            Self::Stopped => "stopped",
            Self::Running => "running",
            Self::Suspended => "suspended",
        }
    }
}

/// Result of one cycle: what the phases did and what to draw.
#[derive(Debug)]
pub struct Tick<T> {
    pub report: CycleReport,
    pub frame: RenderFrame<T>,
}

/// Fixed-budget driver around a [`World`].
///
/// Suspension is host driven and only resumes what was running; an explicit
/// stop always needs a new [`GameLoop::start`].
pub struct GameLoop<G: Game> {
    world: World<G>,
    state: LoopState,
    cycle_budget: Duration,
}

impl<G: Game> GameLoop<G> {
    pub fn new(world: World<G>, cycles_per_second: u32) -> Self {
        Self {
            world,
            state: LoopState::Stopped,
            cycle_budget: cycle_budget(cycles_per_second),
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == LoopState::Running
    }

    pub fn cycle_budget(&self) -> Duration {
        self.cycle_budget
    }

    pub fn world(&self) -> &World<G> {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World<G> {
        &mut self.world
    }

    pub fn into_world(self) -> World<G> {
        self.world
    }

    pub fn start(&mut self) -> bool {
        if self.state != LoopState::Stopped {
            return false;
        }
        if self.world.cycle() == 0 {
            self.world.setup();
        } else {
            self.world.cleanup();
        }
        self.transition(LoopState::Running, "loop_started");
        true
    }

    pub fn stop(&mut self) -> bool {
        if self.state == LoopState::Stopped {
            return false;
        }
        self.world.clear_keys();
        self.transition(LoopState::Stopped, "loop_stopped");
        true
    }

    pub fn suspend(&mut self) -> bool {
        if self.state != LoopState::Running {
            return false;
        }
        self.transition(LoopState::Suspended, "loop_suspended");
        true
    }

    pub fn resume(&mut self) -> bool {
        if self.state != LoopState::Suspended {
            return false;
        }
        self.transition(LoopState::Running, "loop_resumed");
        true
    }

    fn transition(&mut self, next: LoopState, event: &'static str) {
        info!(
            from = self.state.as_str(),
            to = next.as_str(),
            cycle = self.world.cycle(),
            "{event}"
        );
        self.state = next;
    }

    /// Runs the phases of one cycle and prepares its frame. Does nothing
    /// unless the loop is running. The cycle counter advances even when
    /// callbacks failed.
    pub fn tick(&mut self) -> Option<Tick<G::Tag>> {
        if !self.is_running() {
            return None;
        }
        let report = self.world.run_phases();
        let frame = self.world.prepare_frame();
        self.world.advance_cycle();
        Some(Tick { report, frame })
    }

    /// Blocking loop for hosts without an event loop: runs up to
    /// `max_cycles` cycles, rendering each through `render` and sleeping out
    /// the rest of every cycle budget. Returns the number of cycles run.
    pub fn run_cycles(
        &mut self,
        max_cycles: u64,
        mut render: impl FnMut(&World<G>, &Tick<G::Tag>),
    ) -> u64 {
        let mut completed = 0;
        while completed < max_cycles {
            let started = Instant::now();
            let Some(tick) = self.tick() else {
                break;
            };
            render(&self.world, &tick);
            completed += 1;
            let sleep = remaining_budget(started.elapsed(), self.cycle_budget);
            if sleep > Duration::ZERO {
                thread::sleep(sleep);
            }
        }
        completed
    }
}

pub fn cycle_budget(cycles_per_second: u32) -> Duration {
    Duration::from_nanos(1_000_000_000 / u64::from(cycles_per_second.max(1)))
}

/// Time left in the budget; cycles that ran long are not caught up.
pub fn remaining_budget(elapsed: Duration, budget: Duration) -> Duration {
    budget.saturating_sub(elapsed)
}
