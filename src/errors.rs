//! Typed conditions surfaced by the session and POI engines.
//!
//! The web layer maps these onto API error codes; everything unexpected
//! (connection loss, constraint weirdness) travels as `Database`.

/// Error type for engine operations.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("session not found")]
    SessionNotFound,

    #[error("POI not found")]
    PoiNotFound,

    #[error("map not found")]
    MapNotFound,

    #[error("user not found")]
    UserNotFound,

    #[error("user already has an active session in this map")]
    UserAlreadyInMap,

    #[error("user is already a participant of this POI")]
    AlreadyJoined,

    #[error("user is not a participant of this POI")]
    NotJoined,

    #[error("POI is at capacity")]
    CapacityExceeded,

    #[error("a POI already exists at this location")]
    DuplicateLocation,

    #[error("email is already in use")]
    EmailInUse,

    #[error("{0}")]
    Validation(String),

    #[error("caller does not own this resource")]
    Forbidden,

    #[error(transparent)]
    Database(#[from] anyhow::Error),
}

impl ServiceError {
    /// Shorthand for a semantic validation failure.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}

pub type Result<T> = std::result::Result<T, ServiceError>;
