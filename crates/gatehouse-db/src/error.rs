use thiserror::Error;

/// Store layer errors
#[derive(Error, Debug)]
pub enum DbError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Seed error: {0}")]
    SeedError(#[from] serde_json::Error),
}

impl DbError {
    #[must_use]
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }
}

pub type DbResult<T> = std::result::Result<T, DbError>;
