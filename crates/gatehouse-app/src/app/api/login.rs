use salvo::http::header::REFERER;
use salvo::prelude::Json;
use salvo::{Depot, Request, Router, handler};
use serde::{Deserialize, Serialize};

use gatehouse_service::auth::{LoginProfile, TokenInfo};

use super::{StatusOk, parse_body, status_ok};
use crate::error::AppResult;
use crate::middleware::auth::{AuthMiddleware, bearer_token};
use crate::middleware::get_identity_from_depot;
use crate::services_handler::get_gatekeeper_from_depot;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub user_name: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub profile: LoginProfile,
    pub token: TokenInfo,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub email: String,
}

/// ## Summary
/// POST /api/v1/pub/login
///
/// The `Referer` header feeds the root sign-in page guard.
#[handler]
async fn login(req: &mut Request, depot: &mut Depot) -> AppResult<Json<LoginResponse>> {
    let body: LoginRequest = parse_body(req).await?;
    let referer = req.header::<String>(REFERER).unwrap_or_default();
    let gatekeeper = get_gatekeeper_from_depot(depot)?;

    let (profile, token) = gatekeeper
        .login(&body.user_name, &body.password, &referer)
        .await?;
    Ok(Json(LoginResponse { profile, token }))
}

/// ## Summary
/// POST /api/v1/pub/login/exit
///
/// Succeeds for any token, valid or not.
#[handler]
async fn logout(req: &mut Request, depot: &mut Depot) -> AppResult<Json<StatusOk>> {
    if let Some(token) = bearer_token(req) {
        get_gatekeeper_from_depot(depot)?.logout(&token).await?;
    }
    Ok(status_ok())
}

/// POST /api/v1/pub/refresh-token
#[handler]
async fn refresh_token(depot: &mut Depot) -> AppResult<Json<TokenInfo>> {
    let identity = get_identity_from_depot(depot)?.clone();
    let token = get_gatekeeper_from_depot(depot)?
        .refresh_token(&identity)
        .await?;
    Ok(Json(token))
}

/// ## Summary
/// POST /api/v1/pub/reset-password
///
/// Always answers OK for a well-formed address so callers cannot test which accounts exist.
#[handler]
async fn reset_password(req: &mut Request, depot: &mut Depot) -> AppResult<Json<StatusOk>> {
    let body: ResetPasswordRequest = parse_body(req).await?;
    get_gatekeeper_from_depot(depot)?
        .send_reset_password_mail(&body.email)
        .await?;
    Ok(status_ok())
}

#[must_use]
pub fn routes() -> Router {
    Router::new()
        .push(
            Router::with_path("login")
                .post(login)
                .push(Router::with_path("exit").post(logout)),
        )
        .push(
            Router::with_path("refresh-token")
                .hoop(AuthMiddleware)
                .post(refresh_token),
        )
        .push(Router::with_path("reset-password").post(reset_password))
}
