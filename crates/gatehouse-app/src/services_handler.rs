use std::sync::Arc;

use salvo::async_trait;

use gatehouse_core::error::CoreError;
use gatehouse_service::admin::{RoleService, TenantService, UserService};
use gatehouse_service::auth::Gatekeeper;
use gatehouse_service::bootstrap::Services;

use crate::error::AppResult;

/// Injects the shared services into every request's depot.
#[derive(Clone)]
pub struct ServicesHandler {
    pub gatekeeper: Arc<Gatekeeper>,
    pub users: Arc<UserService>,
    pub tenants: Arc<TenantService>,
    pub roles: Arc<RoleService>,
}

impl From<&Services> for ServicesHandler {
    fn from(services: &Services) -> Self {
        Self {
            gatekeeper: services.gatekeeper.clone(),
            users: services.users.clone(),
            tenants: services.tenants.clone(),
            roles: services.roles.clone(),
        }
    }
}

#[async_trait]
impl salvo::Handler for ServicesHandler {
    #[tracing::instrument(skip(self, _req, depot, _res, _ctrl))]
    async fn handle(
        &self,
        _req: &mut salvo::Request,
        depot: &mut salvo::Depot,
        _res: &mut salvo::Response,
        _ctrl: &mut salvo::FlowCtrl,
    ) {
        depot.inject(self.gatekeeper.clone());
        depot.inject(self.users.clone());
        depot.inject(self.tenants.clone());
        depot.inject(self.roles.clone());
    }
}

fn obtain<T: Send + Sync + 'static>(depot: &salvo::Depot, what: &'static str) -> AppResult<Arc<T>> {
    depot
        .obtain::<Arc<T>>()
        .cloned()
        .map_err(|_err| CoreError::InvariantViolation(what).into())
}

/// ## Errors
/// Returns an error if the gatekeeper is not found in the depot.
pub fn get_gatekeeper_from_depot(depot: &salvo::Depot) -> AppResult<Arc<Gatekeeper>> {
    obtain(depot, "Gatekeeper not found in depot")
}

/// ## Errors
/// Returns an error if the user service is not found in the depot.
pub fn get_users_from_depot(depot: &salvo::Depot) -> AppResult<Arc<UserService>> {
    obtain(depot, "User service not found in depot")
}

/// ## Errors
/// Returns an error if the tenant service is not found in the depot.
pub fn get_tenants_from_depot(depot: &salvo::Depot) -> AppResult<Arc<TenantService>> {
    obtain(depot, "Tenant service not found in depot")
}

/// ## Errors
/// Returns an error if the role service is not found in the depot.
pub fn get_roles_from_depot(depot: &salvo::Depot) -> AppResult<Arc<RoleService>> {
    obtain(depot, "Role service not found in depot")
}
