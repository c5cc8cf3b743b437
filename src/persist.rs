//! JSON files under the persistence directory.
//!
//! A missing file is a first run and yields the default value. A file that
//! exists but cannot be read or parsed is an error so callers can decide
//! whether to continue degraded.

use crate::error::Result;
use log::info;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs;
use std::path::Path;

/// Load `path`, returning `T::default()` when the file does not exist.
pub fn load_json<T>(path: &Path) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    match fs::read(path) {
        Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            info!("No persisted state at {:?} (first run)", path);
            Ok(T::default())
        }
        Err(e) => Err(e.into()),
    }
}

/// Write `value` as pretty JSON, creating parent directories as needed.
pub fn save_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let data = serde_json::to_vec_pretty(value)?;
    fs::write(path, data)?;
    Ok(())
}

/// Remove `path` if present.
pub fn remove(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
pub(crate) fn temp_dir() -> std::path::PathBuf {
    let dir = std::env::temp_dir().join(format!("espnow-bridge-light-{}", uuid::Uuid::new_v4()));
    let _ = fs::create_dir_all(&dir);
    dir
}
