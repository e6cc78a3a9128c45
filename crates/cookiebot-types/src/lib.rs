//! Shared configuration types for the cookiebot workspace.
//!
//! The bot is configured through a small line-oriented grammar
//! (see [`value`]): quoted strings, integers, floats, booleans, lists,
//! and `file(template, mode)` output-file declarations, grouped under
//! optional `[Section]` headers. [`config::BotConfig`] is the typed view
//! the rest of the workspace consumes, with explicit defaults for every
//! recognized key.

pub mod config;
pub mod error;
pub mod value;

pub use config::{BotConfig, TimestampPrefix, BOT_SECTION, CONFIG_FILE_CANDIDATES};
pub use error::ConfigError;
pub use value::{ConfigValue, FileMode, OutFileSpec};
