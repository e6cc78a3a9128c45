//! Error type for configuration loading.

use thiserror::Error;

/// Errors that can occur while locating or reading a configuration file.
///
/// Malformed *lines* are not errors: the grammar silently skips anything
/// it cannot parse. Only a missing or unreadable file aborts startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// None of the candidate configuration filenames exist.
    #[error("no configuration file found (tried {tried})")]
    NotFound { tried: String },

    /// A configuration file exists but could not be read.
    #[error("cannot read configuration file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
