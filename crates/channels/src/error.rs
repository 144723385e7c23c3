/// Crate-wide result type for connection and port operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Typed errors surfaced to callers of the registry and ports.
///
/// Connection-level failures (start failure, disconnect) are never returned
/// here; they travel over the event bus. A missing channel is an `Option`.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The API token is missing or blank.
    #[error("invalid credential: token is empty")]
    InvalidCredential,

    /// Operation is unavailable (port closed, connection gone).
    #[error("unavailable: {message}")]
    Unavailable { message: String },
}

impl Error {
    #[must_use]
    pub fn unavailable(message: impl std::fmt::Display) -> Self {
        Self::Unavailable {
            message: message.to_string(),
        }
    }
}
