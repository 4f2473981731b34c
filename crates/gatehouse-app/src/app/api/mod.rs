mod admin;
mod current;
mod healthcheck;
mod login;

use salvo::http::StatusCode;
use salvo::prelude::Json;
use salvo::{Request, Response, Router};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{AppError, AppResult};
use crate::middleware::{auth::AuthMiddleware, casbin::CasbinMiddleware};

// Re-export route constants from core
pub use gatehouse_core::constants::{
    API_ROUTE_COMPONENT, API_ROUTE_PREFIX, PUB_ROUTE_COMPONENT, PUB_ROUTE_PREFIX,
    V1_ROUTE_COMPONENT, V1_ROUTE_PREFIX,
};

/// ## Summary
/// Constructs the API router.
///
/// Routes under `pub` only need a valid token. Admin routes additionally pass the casbin
/// middleware unless enforcement is disabled.
#[must_use]
pub fn routes(enforce_policy: bool) -> Router {
    let mut admin_routes = Router::new().hoop(AuthMiddleware);
    if enforce_policy {
        admin_routes = admin_routes.hoop(CasbinMiddleware);
    }
    let admin_routes = admin_routes.push(admin::routes());

    Router::with_path(API_ROUTE_COMPONENT)
        .push(healthcheck::routes())
        .push(
            Router::with_path(V1_ROUTE_COMPONENT)
                .push(
                    Router::with_path(PUB_ROUTE_COMPONENT)
                        .push(login::routes())
                        .push(Router::new().hoop(AuthMiddleware).push(current::routes())),
                )
                .push(admin_routes),
        )
}

async fn parse_body<T: DeserializeOwned>(req: &mut Request) -> AppResult<T> {
    req.parse_json::<T>()
        .await
        .map_err(|e| AppError::InvalidBody(e.to_string()))
}

fn path_id(req: &Request) -> AppResult<String> {
    req.param::<String>("id")
        .ok_or_else(|| AppError::InvalidBody("missing id".to_string()))
}

#[derive(Debug, Serialize)]
struct StatusOk {
    status: &'static str,
}

const fn status_ok() -> Json<StatusOk> {
    Json(StatusOk { status: "OK" })
}

fn created<T: Serialize + Send>(res: &mut Response, body: T) -> Json<T> {
    res.status_code(StatusCode::CREATED);
    Json(body)
}
