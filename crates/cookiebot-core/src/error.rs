//! Error type for the bot crate.

use thiserror::Error;

use cookiebot_browser::BrowserError;
use cookiebot_types::ConfigError;

/// Anything that can go wrong while the bot runs.
#[derive(Debug, Error)]
pub enum BotError {
    #[error(transparent)]
    Browser(#[from] BrowserError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Save-file I/O failure.
    #[error("save file {path}: {source}")]
    Save {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The game returned state we cannot work with.
    #[error("game state error: {0}")]
    Game(String),
}

impl BotError {
    /// Fatal errors end the run; the rest abort only the current tick.
    pub fn is_fatal(&self) -> bool {
        match self {
            BotError::Browser(e) => e.is_fatal(),
            BotError::Config(_) => true,
            BotError::Save { .. } => false,
            BotError::Game(_) => false,
        }
    }
}
