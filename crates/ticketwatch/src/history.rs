use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::types::HistorySnapshot;

#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Malformed history document: {0}")]
    Json(#[from] serde_json::Error),
}

/// Single JSON document holding the latest run and the all-time best.
#[derive(Debug, Clone)]
pub struct HistoryStore {
    path: PathBuf,
}

impl HistoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the stored snapshot. `Ok(None)` when nothing has been saved yet.
    pub fn try_load(&self) -> Result<Option<HistorySnapshot>, HistoryError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(HistoryError::Io {
                    path: self.path.clone(),
                    source,
                });
            }
        };
        Ok(Some(serde_json::from_str(&raw)?))
    }

    /// Like [`HistoryStore::try_load`], but an unreadable or corrupt file is
    /// reported and treated as a first run.
    pub fn load(&self) -> Option<HistorySnapshot> {
        self.try_load()
            .inspect_err(|e| {
                log::warn!(
                    "Failed reading history at {}, starting fresh: {}",
                    self.path.display(),
                    e
                )
            })
            .ok()
            .flatten()
    }

    /// Replaces the stored document. The new content is written to a sibling
    /// temporary file and renamed over the old one.
    pub fn save(&self, snapshot: &HistorySnapshot) -> Result<(), HistoryError> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir).map_err(|source| self.io_error(source))?;

        let json = serde_json::to_string_pretty(snapshot)?;

        let mut file = NamedTempFile::new_in(dir).map_err(|source| self.io_error(source))?;
        file.write_all(json.as_bytes())
            .and_then(|_| file.as_file().sync_all())
            .map_err(|source| self.io_error(source))?;
        file.persist(&self.path)
            .map_err(|e| self.io_error(e.error))?;

        log::info!("History saved to {}", self.path.display());
        Ok(())
    }

    fn io_error(&self, source: io::Error) -> HistoryError {
        HistoryError::Io {
            path: self.path.clone(),
            source,
        }
    }
}
