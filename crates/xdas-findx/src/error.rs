use thiserror::Error;

/// Errors raised when starting a FindX pool.
#[derive(Debug, Error)]
pub enum FindxError {
    /// The keyspace configuration does not enable FindX.
    #[error("FindX not enabled")]
    Disabled,

    /// The configured endpoint URL does not parse.
    #[error("invalid FindX URL: {0}")]
    InvalidUrl(String),
}
