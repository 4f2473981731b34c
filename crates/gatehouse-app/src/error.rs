use salvo::http::StatusCode;
use salvo::prelude::Json;
use salvo::{Depot, Request, Response, Writer, async_trait};
use serde::Serialize;
use thiserror::Error;

use gatehouse_service::error::ServiceError;

/// Application-level errors (HTTP layer)
#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    ServiceError(#[from] ServiceError),

    #[error(transparent)]
    CoreError(#[from] gatehouse_core::error::CoreError),

    #[error("Invalid request body: {0}")]
    InvalidBody(String),
}

pub type AppResult<T> = std::result::Result<T, AppError>;

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: ErrorItem,
}

#[derive(Debug, Serialize)]
struct ErrorItem {
    code: &'static str,
    message: String,
}

impl AppError {
    /// ## Summary
    /// Maps the error to a status, a stable code and a client-safe message.
    ///
    /// Unknown user names and wrong passwords share one message.
    #[must_use]
    pub fn classify(&self) -> (StatusCode, &'static str, String) {
        match self {
            Self::ServiceError(err) => match err {
                ServiceError::InvalidUserName | ServiceError::InvalidPassword => (
                    StatusCode::BAD_REQUEST,
                    "invalid_credentials",
                    "invalid user name or password".to_string(),
                ),
                ServiceError::UserDisable => (
                    StatusCode::BAD_REQUEST,
                    "user_disabled",
                    "user is disabled".to_string(),
                ),
                ServiceError::BadRequest(msg) => {
                    (StatusCode::BAD_REQUEST, "bad_request", msg.clone())
                }
                ServiceError::InvalidToken => (
                    StatusCode::UNAUTHORIZED,
                    "invalid_token",
                    "invalid token".to_string(),
                ),
                ServiceError::NoPerm => (
                    StatusCode::FORBIDDEN,
                    "no_permission",
                    "no permission".to_string(),
                ),
                ServiceError::NotFound(what) => {
                    (StatusCode::NOT_FOUND, "not_found", format!("{what} not found"))
                }
                ServiceError::InternalServer(_) => internal(),
            },
            Self::InvalidBody(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg.clone()),
            Self::CoreError(_) => internal(),
        }
    }
}

fn internal() -> (StatusCode, &'static str, String) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "internal_error",
        "internal server error".to_string(),
    )
}

#[async_trait]
impl Writer for AppError {
    async fn write(self, _req: &mut Request, _depot: &mut Depot, res: &mut Response) {
        let (status, code, message) = self.classify();
        if status.is_server_error() {
            tracing::error!(error = ?self, "Request failed");
        } else {
            tracing::debug!(error = %self, "Request rejected");
        }
        res.status_code(status);
        res.render(Json(ErrorBody {
            error: ErrorItem { code, message },
        }));
    }
}
