use std::process::ExitCode;

use tracing::error;

mod app;

fn main() -> ExitCode {
    let wiring = match app::bootstrap::build_app(std::env::args().skip(1)) {
        Ok(wiring) => wiring,
        Err(err) => {
            error!(error = %err, "startup_failed");
            return ExitCode::FAILURE;
        }
    };
    app::loop_runner::run(wiring)
}
