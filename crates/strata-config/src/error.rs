//! Errors of the configuration layer.

/// Failure to load or store `config.ron`.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config.ron: {0}")]
    ReadError(#[source] std::io::Error),

    #[error("cannot write config.ron: {0}")]
    WriteError(#[source] std::io::Error),

    /// The file exists but does not describe a [`crate::Config`].
    #[error("invalid config.ron: {0}")]
    ParseError(#[source] ron::error::SpannedError),

    #[error("cannot encode config as RON: {0}")]
    SerializeError(#[source] ron::Error),
}
