use thiserror::Error;

use gatehouse_db::error::DbError;

/// Service layer errors
///
/// Authentication and authorization failures are deliberately coarse: callers only learn the
/// error kind, never which check failed underneath.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Invalid user name")]
    InvalidUserName,

    #[error("Invalid password")]
    InvalidPassword,

    #[error("User is disabled")]
    UserDisable,

    #[error("Invalid token")]
    InvalidToken,

    #[error("No permission")]
    NoPerm,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal server error: {0:#}")]
    InternalServer(#[from] anyhow::Error),
}

impl ServiceError {
    /// Wraps an underlying failure with context for diagnostics.
    pub fn internal<E>(context: &'static str, err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::InternalServer(anyhow::Error::new(err).context(context))
    }

    #[must_use]
    pub const fn is_internal(&self) -> bool {
        matches!(self, Self::InternalServer(_))
    }
}

impl From<DbError> for ServiceError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => Self::NotFound(format!("{entity} {id}")),
            DbError::Conflict(msg) => Self::BadRequest(msg),
            other => Self::internal("store failure", other),
        }
    }
}

impl From<casbin::Error> for ServiceError {
    fn from(err: casbin::Error) -> Self {
        Self::internal("policy engine failure", err)
    }
}

pub type ServiceResult<T> = std::result::Result<T, ServiceError>;
