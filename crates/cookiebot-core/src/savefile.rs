//! Save-blob persistence.
//!
//! The save string is opaque: whatever the game exports is written to disk
//! verbatim and re-injected verbatim. The file is overwritten wholesale;
//! there is no versioning or checksum.

use std::path::{Path, PathBuf};

use crate::error::BotError;

/// Handle on the configured save-file path.
#[derive(Debug, Clone)]
pub struct SaveFile {
    path: PathBuf,
}

impl SaveFile {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the blob. A missing file is `None`, not an error.
    pub fn load(&self) -> Result<Option<String>, BotError> {
        match std::fs::read_to_string(&self.path) {
            Ok(blob) => Ok(Some(blob)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(BotError::Save {
                path: self.path.display().to_string(),
                source: e,
            }),
        }
    }

    /// Overwrite the file with `blob`.
    pub fn store(&self, blob: &str) -> Result<(), BotError> {
        std::fs::write(&self.path, blob).map_err(|e| BotError::Save {
            path: self.path.display().to_string(),
            source: e,
        })?;
        tracing::info!(path = %self.path.display(), bytes = blob.len(), "save blob written");
        Ok(())
    }
}

/// Write the last captured blob, if any, taking it so a second call is a
/// no-op. This is the only place the blob ever reaches disk.
pub fn flush_last_save(savefile: &SaveFile, blob: &mut Option<String>) -> Result<bool, BotError> {
    match blob.take() {
        Some(blob) => {
            savefile.store(&blob)?;
            Ok(true)
        }
        None => Ok(false),
    }
}
