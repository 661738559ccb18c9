use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tile_engine::{
    resolve_app_paths, GameError, LoopConfig, SaveSlot, StartupError, World, WorldConfig,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

use super::gameplay::{self, Aquarium};

pub(crate) const LEVEL_FILE: &str = "aquarium.json";
const HEADLESS_FLAG: &str = "--headless";
const WINDOW_TITLE: &str = "Aquarium";

#[derive(Debug, Error)]
pub(crate) enum BootstrapError {
    #[error(transparent)]
    Startup(#[from] StartupError),
    #[error("failed to read level '{path}': {source}")]
    ReadLevel {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse level '{path}': {message}")]
    ParseLevel { path: PathBuf, message: String },
    #[error("failed to build world: {0}")]
    World(#[from] GameError),
    #[error("invalid arguments: {0}")]
    Args(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RunMode {
    Windowed,
    /// Runs a fixed number of cycles without opening a window.
    Headless { cycles: u64 },
}

/// Level file: world layout plus the seed for random spawns.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct LevelFile {
    pub(crate) world: WorldConfig,
    #[serde(default)]
    pub(crate) seed: Option<u64>,
}

pub(crate) struct AppWiring {
    pub(crate) config: LoopConfig,
    pub(crate) world: World<Aquarium>,
    pub(crate) mode: RunMode,
}

pub(crate) fn build_app(
    args: impl IntoIterator<Item = String>,
) -> Result<AppWiring, BootstrapError> {
    init_tracing();
    info!("=== Aquarium Startup ===");

    let mode = parse_run_mode(args)?;
    let paths = resolve_app_paths()?;
    let level_path = paths.levels_dir.join(LEVEL_FILE);
    let level = load_level(&level_path)?;

    let game = Aquarium::with_save_slot(SaveSlot::new(&paths.saves_dir));
    let mut world = level.world.build_world(game)?;
    gameplay::populate(&mut world, level.seed)?;
    info!(
        level = %level_path.display(),
        entities = world.pending_count(),
        ?mode,
        "level_loaded"
    );

    let config = LoopConfig {
        window_title: WINDOW_TITLE.to_string(),
        ..LoopConfig::default()
    };
    Ok(AppWiring {
        config,
        world,
        mode,
    })
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .compact()
        .init();
}

pub(crate) fn parse_run_mode(
    args: impl IntoIterator<Item = String>,
) -> Result<RunMode, BootstrapError> {
    let mut args = args.into_iter();
    let mut mode = RunMode::Windowed;
    while let Some(arg) = args.next() {
        if arg != HEADLESS_FLAG {
            return Err(BootstrapError::Args(format!("unknown argument '{arg}'")));
        }
        let raw = args
            .next()
            .ok_or_else(|| BootstrapError::Args(format!("{HEADLESS_FLAG} needs a cycle count")))?;
        let cycles = raw
            .parse::<u64>()
            .map_err(|error| BootstrapError::Args(format!("bad cycle count '{raw}': {error}")))?;
        mode = RunMode::Headless { cycles };
    }
    Ok(mode)
}

pub(crate) fn load_level(path: &Path) -> Result<LevelFile, BootstrapError> {
    let raw = fs::read_to_string(path).map_err(|source| BootstrapError::ReadLevel {
        path: path.to_path_buf(),
        source,
    })?;
    parse_level_json(&raw).map_err(|message| BootstrapError::ParseLevel {
        path: path.to_path_buf(),
        message,
    })
}

pub(crate) fn parse_level_json(raw: &str) -> Result<LevelFile, String> {
    let mut deserializer = serde_json::Deserializer::from_str(raw);
    match serde_path_to_error::deserialize::<_, LevelFile>(&mut deserializer) {
        Ok(level) => Ok(level),
        Err(error) => {
            let path = error.path().to_string();
            let source = error.into_inner();
            if path.is_empty() || path == "." {
                Err(source.to_string())
            } else {
                Err(format!("at {path}: {source}"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(raw: &[&str]) -> Vec<String> {
        raw.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn no_arguments_opens_a_window() {
        assert_eq!(parse_run_mode(args(&[])).expect("mode"), RunMode::Windowed);
    }

    #[test]
    fn headless_flag_takes_a_cycle_count() {
        assert_eq!(
            parse_run_mode(args(&["--headless", "120"])).expect("mode"),
            RunMode::Headless { cycles: 120 }
        );
    }

    #[test]
    fn headless_flag_without_count_is_rejected() {
        assert!(matches!(
            parse_run_mode(args(&["--headless"])),
            Err(BootstrapError::Args(_))
        ));
        assert!(matches!(
            parse_run_mode(args(&["--headless", "many"])),
            Err(BootstrapError::Args(_))
        ));
    }

    #[test]
    fn unknown_argument_is_rejected() {
        assert!(matches!(
            parse_run_mode(args(&["--fullscreen"])),
            Err(BootstrapError::Args(_))
        ));
    }

    #[test]
    fn missing_level_file_reports_its_path() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(LEVEL_FILE);

        let error = load_level(&path).expect_err("missing level");

        assert!(matches!(error, BootstrapError::ReadLevel { .. }));
        assert!(error.to_string().contains(LEVEL_FILE));
    }
}
