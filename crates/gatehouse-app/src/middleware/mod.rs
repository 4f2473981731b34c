pub mod auth;
pub mod casbin;

pub mod depot_keys {
    pub const IDENTITY: &str = "__identity";
    pub const ACCESS_TOKEN: &str = "__access_token";
}

use gatehouse_service::auth::Identity;
use gatehouse_service::error::ServiceError;

use crate::error::AppResult;

/// ## Summary
/// Returns the identity stored by [`auth::AuthMiddleware`].
///
/// ## Errors
/// Returns `InvalidToken` when the request was not authenticated.
pub fn get_identity_from_depot(depot: &salvo::Depot) -> AppResult<&Identity> {
    depot
        .get::<Identity>(depot_keys::IDENTITY)
        .map_err(|_e| ServiceError::InvalidToken.into())
}

/// ## Errors
/// Returns `InvalidToken` when the request was not authenticated.
pub fn get_token_from_depot(depot: &salvo::Depot) -> AppResult<&str> {
    depot
        .get::<String>(depot_keys::ACCESS_TOKEN)
        .map(String::as_str)
        .map_err(|_e| ServiceError::InvalidToken.into())
}
