use salvo::{Depot, Request, Writer};

use super::get_identity_from_depot;
use crate::error::AppResult;
use crate::services_handler::get_gatekeeper_from_depot;

/// ## Summary
/// Authorization middleware. Must run after [`super::auth::AuthMiddleware`].
///
/// The request path and method are checked against the caller's policy in their own tenant.
/// Routes are only wrapped with this middleware when casbin is enabled.
pub struct CasbinMiddleware;

fn check(req: &Request, depot: &Depot) -> AppResult<()> {
    let gatekeeper = get_gatekeeper_from_depot(depot)?;
    let identity = get_identity_from_depot(depot)?;
    gatekeeper.authorize(identity, req.uri().path(), req.method().as_str())?;
    Ok(())
}

#[salvo::async_trait]
impl salvo::Handler for CasbinMiddleware {
    #[tracing::instrument(skip(self, req, depot, res, ctrl), fields(
        method = %req.method(),
        path = %req.uri().path()
    ))]
    async fn handle(
        &self,
        req: &mut Request,
        depot: &mut Depot,
        res: &mut salvo::Response,
        ctrl: &mut salvo::FlowCtrl,
    ) {
        if let Err(e) = check(req, depot) {
            e.write(req, depot, res).await;
            ctrl.skip_rest();
        }
    }
}
