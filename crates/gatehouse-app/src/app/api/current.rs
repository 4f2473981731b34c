use salvo::prelude::Json;
use salvo::{Depot, Request, Router, handler};
use serde::Deserialize;

use gatehouse_service::auth::{LoginProfile, MenuNode};

use super::{StatusOk, parse_body, status_ok};
use crate::error::AppResult;
use crate::middleware::get_identity_from_depot;
use crate::services_handler::get_gatekeeper_from_depot;

#[derive(Debug, Deserialize)]
pub struct UpdatePasswordRequest {
    pub old_password: String,
    pub new_password: String,
}

/// GET /api/v1/pub/current/user
#[handler]
async fn current_user(depot: &mut Depot) -> AppResult<Json<LoginProfile>> {
    let user_id = get_identity_from_depot(depot)?.user_id.clone();
    let profile = get_gatekeeper_from_depot(depot)?
        .login_info(&user_id)
        .await?;
    Ok(Json(profile))
}

/// GET /api/v1/pub/current/menutree
#[handler]
async fn menu_tree(depot: &mut Depot) -> AppResult<Json<Vec<MenuNode>>> {
    let user_id = get_identity_from_depot(depot)?.user_id.clone();
    let forest = get_gatekeeper_from_depot(depot)?.menu_tree(&user_id).await?;
    Ok(Json(forest))
}

/// PUT /api/v1/pub/current/password
#[handler]
async fn update_password(req: &mut Request, depot: &mut Depot) -> AppResult<Json<StatusOk>> {
    let body: UpdatePasswordRequest = parse_body(req).await?;
    let user_id = get_identity_from_depot(depot)?.user_id.clone();
    get_gatekeeper_from_depot(depot)?
        .update_password(&user_id, &body.old_password, &body.new_password)
        .await?;
    Ok(status_ok())
}

#[must_use]
pub fn routes() -> Router {
    Router::with_path("current")
        .push(Router::with_path("user").get(current_user))
        .push(Router::with_path("menutree").get(menu_tree))
        .push(Router::with_path("password").put(update_password))
}
