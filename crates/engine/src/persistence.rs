use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};

/// Storage name of the default slot.
pub const SAVE_SLOT_NAME: &str = "GameAPI";
const SAVE_EXTENSION: &str = "sav";

#[derive(Debug, Error)]
pub enum SaveError {
    #[error("failed to write save slot {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to read save slot {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to remove save slot {path}: {source}")]
    Remove {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Opaque byte buffer kept in a single file under the saves directory.
#[derive(Debug, Clone)]
pub struct SaveSlot {
    path: PathBuf,
}

impl SaveSlot {
    pub fn new(saves_dir: &Path) -> Self {
        Self::named(saves_dir, SAVE_SLOT_NAME)
    }

    pub fn named(saves_dir: &Path, name: &str) -> Self {
        Self {
            path: saves_dir.join(format!("{name}.{SAVE_EXTENSION}")),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn save(&self, bytes: &[u8]) -> Result<(), SaveError> {
        write_bytes_atomic(&self.path, bytes).map_err(|source| SaveError::Write {
            path: self.path.clone(),
            source,
        })?;
        info!(path = %self.path.display(), bytes = bytes.len(), "save_written");
        Ok(())
    }

    /// `None` when nothing was saved yet.
    pub fn load(&self) -> Result<Option<Vec<u8>>, SaveError> {
        match fs::read(&self.path) {
            Ok(bytes) => {
                debug!(path = %self.path.display(), bytes = bytes.len(), "save_loaded");
                Ok(Some(bytes))
            }
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(SaveError::Read {
                path: self.path.clone(),
                source,
            }),
        }
    }

    pub fn clear(&self) -> Result<bool, SaveError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(true),
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(source) => Err(SaveError::Remove {
                path: self.path.clone(),
                source,
            }),
        }
    }
}

fn write_bytes_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let tmp_path = temp_path_for(path);
    fs::write(&tmp_path, bytes)?;
    replace_file(&tmp_path, path)
}

fn replace_file(tmp_path: &Path, final_path: &Path) -> io::Result<()> {
    match fs::remove_file(final_path) {
        Ok(_) => {}
        Err(error) if error.kind() == io::ErrorKind::NotFound => {}
        Err(error) => {
            let _ = fs::remove_file(tmp_path);
            return Err(error);
        }
    }

    if let Err(error) = fs::rename(tmp_path, final_path) {
        let _ = fs::remove_file(tmp_path);
        return Err(error);
    }
    Ok(())
}

fn temp_path_for(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("slot");
    let tmp_name = format!("{file_name}.tmp");
    match path.parent() {
        Some(parent) => parent.join(tmp_name),
        None => PathBuf::from(tmp_name),
    }
}
