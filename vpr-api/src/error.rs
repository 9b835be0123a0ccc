#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum Error {
    #[error("Unknown error: {0}")]
    Unknown(String),

    #[error("Permission denied")]
    PermissionDenied,

    #[error("Not authenticated")]
    NotAuthenticated,

    #[error("Duplicate key {0}")]
    DuplicateKey(String),

    #[error("Foreign key violation {0}")]
    ForeignKeyViolation(String),

    #[error("Not found")]
    NotFound,

    #[error("Null byte in string is not allowed {0:?}")]
    NullByteInString(String),

    #[error("Empty text is not allowed")]
    EmptyText,

    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    #[error("Network error: {0}")]
    Network(String),
}

impl Error {
    /// Postgres-style error code, as the hosted backend reports it
    pub fn code(&self) -> Option<&'static str> {
        match self {
            Error::PermissionDenied => Some("42501"),
            Error::DuplicateKey(_) => Some("23505"),
            Error::ForeignKeyViolation(_) => Some("23503"),
            Error::NullByteInString(_) => Some("22021"),
            Error::Unknown(_)
            | Error::NotAuthenticated
            | Error::NotFound
            | Error::EmptyText
            | Error::InvalidPayload(_)
            | Error::Network(_) => None,
        }
    }

    pub fn is_duplicate_key(&self) -> bool {
        matches!(self, Error::DuplicateKey(_))
    }
}
