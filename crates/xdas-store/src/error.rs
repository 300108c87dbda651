use thiserror::Error;

/// Errors raised by the storage backends.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Could not obtain or establish a connection.
    #[error("connection error: {0}")]
    Connection(String),

    /// The backend rejected or failed the command.
    #[error("backend error: {0}")]
    Backend(String),

    /// A stored value in a framed keyspace was shorter than one byte.
    /// This is a server-side consistency problem, not a miss.
    #[error("stored value has no magic byte")]
    MissingMagicByte,
}
