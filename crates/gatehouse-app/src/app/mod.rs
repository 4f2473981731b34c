pub mod api;

use salvo::Router;

use gatehouse_service::bootstrap::Services;

use crate::services_handler::ServicesHandler;

/// ## Summary
/// Builds the full router: service injection plus every API route.
#[must_use]
pub fn router(services: &Services, enforce_policy: bool) -> Router {
    Router::new()
        .hoop(ServicesHandler::from(services))
        .push(api::routes(enforce_policy))
}
