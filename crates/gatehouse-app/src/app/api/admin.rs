use salvo::prelude::Json;
use salvo::{Depot, Request, Response, Router, handler};

use gatehouse_db::db::enums::Status;
use gatehouse_db::model::role::Role;
use gatehouse_db::model::tenant::Tenant;
use gatehouse_db::model::user::User;
use gatehouse_service::admin::{CreateRole, CreateTenant, CreateUser, UpdateUser};

use super::{StatusOk, created, parse_body, path_id, status_ok};
use crate::error::AppResult;
use crate::middleware::get_identity_from_depot;
use crate::services_handler::{
    get_roles_from_depot, get_tenants_from_depot, get_users_from_depot,
};

/// POST /api/v1/users
#[handler]
async fn create_user(
    req: &mut Request,
    depot: &mut Depot,
    res: &mut Response,
) -> AppResult<Json<User>> {
    let params: CreateUser = parse_body(req).await?;
    let actor = get_identity_from_depot(depot)?.clone();
    let user = get_users_from_depot(depot)?.create(&actor, params).await?;
    Ok(created(res, user))
}

/// PUT /api/v1/users/{id}
#[handler]
async fn update_user(req: &mut Request, depot: &mut Depot) -> AppResult<Json<User>> {
    let id = path_id(req)?;
    let params: UpdateUser = parse_body(req).await?;
    let actor = get_identity_from_depot(depot)?;
    let user = get_users_from_depot(depot)?
        .update(actor, &id, params)
        .await?;
    Ok(Json(user))
}

/// DELETE /api/v1/users/{id}
#[handler]
async fn delete_user(req: &mut Request, depot: &mut Depot) -> AppResult<Json<StatusOk>> {
    let id = path_id(req)?;
    let actor = get_identity_from_depot(depot)?;
    get_users_from_depot(depot)?.delete(actor, &id).await?;
    Ok(status_ok())
}

async fn set_user_status(
    id: &str,
    depot: &Depot,
    status: Status,
) -> AppResult<Json<StatusOk>> {
    let actor = get_identity_from_depot(depot)?;
    get_users_from_depot(depot)?
        .update_status(actor, id, status)
        .await?;
    Ok(status_ok())
}

/// PATCH /api/v1/users/{id}/enable
#[handler]
async fn enable_user(req: &mut Request, depot: &mut Depot) -> AppResult<Json<StatusOk>> {
    set_user_status(&path_id(req)?, depot, Status::Enabled).await
}

/// PATCH /api/v1/users/{id}/disable
#[handler]
async fn disable_user(req: &mut Request, depot: &mut Depot) -> AppResult<Json<StatusOk>> {
    set_user_status(&path_id(req)?, depot, Status::Disabled).await
}

/// POST /api/v1/tenants
#[handler]
async fn create_tenant(
    req: &mut Request,
    depot: &mut Depot,
    res: &mut Response,
) -> AppResult<Json<Tenant>> {
    let params: CreateTenant = parse_body(req).await?;
    let creator = get_identity_from_depot(depot)?.user_id.clone();
    let tenant = get_tenants_from_depot(depot)?.create(&creator, params).await?;
    Ok(created(res, tenant))
}

async fn set_tenant_status(
    id: &str,
    depot: &Depot,
    status: Status,
) -> AppResult<Json<StatusOk>> {
    let actor = get_identity_from_depot(depot)?;
    get_tenants_from_depot(depot)?
        .update_status(actor, id, status)
        .await?;
    Ok(status_ok())
}

/// PATCH /api/v1/tenants/{id}/enable
#[handler]
async fn enable_tenant(req: &mut Request, depot: &mut Depot) -> AppResult<Json<StatusOk>> {
    set_tenant_status(&path_id(req)?, depot, Status::Enabled).await
}

/// PATCH /api/v1/tenants/{id}/disable
#[handler]
async fn disable_tenant(req: &mut Request, depot: &mut Depot) -> AppResult<Json<StatusOk>> {
    set_tenant_status(&path_id(req)?, depot, Status::Disabled).await
}

/// POST /api/v1/roles
#[handler]
async fn create_role(
    req: &mut Request,
    depot: &mut Depot,
    res: &mut Response,
) -> AppResult<Json<Role>> {
    let params: CreateRole = parse_body(req).await?;
    let role = get_roles_from_depot(depot)?.create(params).await?;
    Ok(created(res, role))
}

/// DELETE /api/v1/roles/{id}
#[handler]
async fn delete_role(req: &mut Request, depot: &mut Depot) -> AppResult<Json<StatusOk>> {
    let id = path_id(req)?;
    get_roles_from_depot(depot)?.delete(&id).await?;
    Ok(status_ok())
}

async fn set_role_status(
    id: &str,
    depot: &Depot,
    status: Status,
) -> AppResult<Json<StatusOk>> {
    get_roles_from_depot(depot)?.update_status(id, status).await?;
    Ok(status_ok())
}

/// PATCH /api/v1/roles/{id}/enable
#[handler]
async fn enable_role(req: &mut Request, depot: &mut Depot) -> AppResult<Json<StatusOk>> {
    set_role_status(&path_id(req)?, depot, Status::Enabled).await
}

/// PATCH /api/v1/roles/{id}/disable
#[handler]
async fn disable_role(req: &mut Request, depot: &mut Depot) -> AppResult<Json<StatusOk>> {
    set_role_status(&path_id(req)?, depot, Status::Disabled).await
}

#[must_use]
pub fn routes() -> Router {
    Router::new()
        .push(
            Router::with_path("users").post(create_user).push(
                Router::with_path("{id}")
                    .put(update_user)
                    .delete(delete_user)
                    .push(Router::with_path("enable").patch(enable_user))
                    .push(Router::with_path("disable").patch(disable_user)),
            ),
        )
        .push(
            Router::with_path("tenants").post(create_tenant).push(
                Router::with_path("{id}")
                    .push(Router::with_path("enable").patch(enable_tenant))
                    .push(Router::with_path("disable").patch(disable_tenant)),
            ),
        )
        .push(
            Router::with_path("roles").post(create_role).push(
                Router::with_path("{id}")
                    .delete(delete_role)
                    .push(Router::with_path("enable").patch(enable_role))
                    .push(Router::with_path("disable").patch(disable_role)),
            ),
        )
}
