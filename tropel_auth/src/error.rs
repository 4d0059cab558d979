use std::path::PathBuf;

use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors raised while setting up a run. Failures during a run are recorded
/// as checks instead.
#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to read config file {path}: {source}")]
    ReadConfig {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    ParseConfig(#[from] toml::de::Error),

    #[error("invalid base url `{url}`: {reason}")]
    BaseUrl { url: String, reason: String },

    #[error("failed to build http client: {0}")]
    Client(#[from] reqwest::Error),

    #[error(transparent)]
    Harness(#[from] tropel::Error),
}
