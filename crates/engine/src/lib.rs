use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

pub mod app;
pub mod persistence;

pub use app::{
    run_app, run_app_with_metrics, AppError, Axis, Behavior, BehaviorError, Body, CallbackResult,
    CollisionReceiver, Contact, Context, Controller, ControllerId, CycleReport, EntityId, Game,
    GameAction, GameError, GameLoop, InputReceiver, ListenerId, LoopConfig, LoopMetricsSnapshot,
    LoopState, MetricsHandle, Positioning, Rect, RenderFrame, Role, StepListener, TileHit, TileMap,
    TileMapError, WorldBounds, WorldConfig, World,
};
pub use persistence::{SaveError, SaveSlot, SAVE_SLOT_NAME};

pub const ROOT_ENV_VAR: &str = "TILE_ENGINE_ROOT";

#[derive(Debug, Clone)]
pub struct AppPaths {
    pub root: PathBuf,
    pub levels_dir: PathBuf,
    pub saves_dir: PathBuf,
}

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to read environment variable {var}: {source}")]
    EnvVar {
        var: &'static str,
        #[source]
        source: env::VarError,
    },
    #[error("failed to resolve current executable path: {0}")]
    CurrentExe(#[source] std::io::Error),
    #[error("current executable path has no parent directory: {0}")]
    ExeHasNoParent(PathBuf),
    #[error("failed to create saves directory at {path}: {source}")]
    CreateSavesDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(
        "TILE_ENGINE_ROOT is set but does not point to a valid project root: {path}\n\
A valid root must contain Cargo.toml and either crates/ or assets/."
    )]
    InvalidEnvRoot { path: PathBuf },
    #[error(
        "Could not detect project root by walking upward from executable directory: {start_dir}\n\
Expected a directory containing Cargo.toml and either crates/ or assets/.\n\
Set {env_var} explicitly, for example:\n\
Bash/zsh: export {env_var}=\"/path/to/tile-engine\""
    )]
    RootNotFound {
        start_dir: PathBuf,
        env_var: &'static str,
    },
}

pub fn resolve_app_paths() -> Result<AppPaths, StartupError> {
    let root = resolve_root()?;
    app_paths_under(root)
}

fn app_paths_under(root: PathBuf) -> Result<AppPaths, StartupError> {
    let levels_dir = root.join("assets").join("levels");
    let saves_dir = root.join("saves");

    fs::create_dir_all(&saves_dir).map_err(|source| StartupError::CreateSavesDir {
        path: saves_dir.clone(),
        source,
    })?;

    Ok(AppPaths {
        root,
        levels_dir,
        saves_dir,
    })
}

fn resolve_root() -> Result<PathBuf, StartupError> {
    match env::var(ROOT_ENV_VAR) {
        Ok(value) => {
            let normalized = normalize_path(Path::new(&value));
            if is_repo_marker(&normalized) {
                Ok(normalized)
            } else {
                Err(StartupError::InvalidEnvRoot { path: normalized })
            }
        }
        Err(env::VarError::NotPresent) => {
            let exe = env::current_exe().map_err(StartupError::CurrentExe)?;
            let exe_dir = exe
                .parent()
                .map(Path::to_path_buf)
                .ok_or_else(|| StartupError::ExeHasNoParent(exe.clone()))?;

            exe_dir
                .ancestors()
                .find(|candidate| is_repo_marker(candidate))
                .map(normalize_path)
                .ok_or_else(|| StartupError::RootNotFound {
                    start_dir: normalize_path(&exe_dir),
                    env_var: ROOT_ENV_VAR,
                })
        }
        Err(source) => Err(StartupError::EnvVar {
            var: ROOT_ENV_VAR,
            source,
        }),
    }
}

fn is_repo_marker(path: &Path) -> bool {
    let cargo_toml = path.join("Cargo.toml").is_file();
    let has_crates = path.join("crates").is_dir();
    let has_assets = path.join("assets").is_dir();

    cargo_toml && (has_crates || has_assets)
}

fn normalize_path(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}
