//! File-backed storage for the selection history.
//!
//! The whole history lives in a single pretty-printed JSON document which is
//! rewritten in full on every save.

use crate::randomizer::ledger::HistoryDocument;
use log::{debug, info};
use mockall::automock;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Cannot access history file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Malformed history document: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Loads and saves the complete [`HistoryDocument`].
#[automock]
pub trait HistoryStore {
    /// Reads the stored document. A store that was never written yields an empty document.
    fn load(&self) -> Result<HistoryDocument, Error>;
    /// Replaces the stored document.
    fn save(&self, document: &HistoryDocument) -> Result<(), Error>;
}

pub struct JsonFileHistoryStore {
    path: PathBuf,
}

impl JsonFileHistoryStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl HistoryStore for JsonFileHistoryStore {
    fn load(&self) -> Result<HistoryDocument, Error> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(error) if error.kind() == ErrorKind::NotFound => {
                info!(
                    "No history file at {}, starting empty",
                    self.path.display()
                );
                return Ok(HistoryDocument::new());
            }
            Err(error) => return Err(error.into()),
        };
        if contents.trim().is_empty() {
            return Ok(HistoryDocument::new());
        }
        Ok(serde_json::from_str(&contents)?)
    }

    fn save(&self, document: &HistoryDocument) -> Result<(), Error> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(document)?;
        fs::write(&self.path, json)?;
        debug!("Saved history for {} scopes", document.len());
        Ok(())
    }
}
