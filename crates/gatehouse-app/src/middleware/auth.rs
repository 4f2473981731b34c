use salvo::http::header::AUTHORIZATION;
use salvo::{Depot, Request, Writer};

use gatehouse_core::constants::TOKEN_TYPE_BEARER;
use gatehouse_service::error::ServiceError;

use super::depot_keys;
use crate::error::AppError;
use crate::services_handler::get_gatekeeper_from_depot;

/// Query parameter accepted in place of the `Authorization` header.
pub const ACCESS_TOKEN_QUERY: &str = "access_token";

/// ## Summary
/// Extracts the bearer token from the `Authorization` header, falling back to the
/// `access_token` query parameter.
#[must_use]
pub fn bearer_token(req: &Request) -> Option<String> {
    let from_header = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split_once(' '))
        .filter(|(scheme, _)| scheme.eq_ignore_ascii_case(TOKEN_TYPE_BEARER))
        .map(|(_, token)| token.trim().to_string());

    from_header
        .or_else(|| req.query::<String>(ACCESS_TOKEN_QUERY))
        .filter(|token| !token.is_empty())
}

/// ## Summary
/// Authentication middleware that validates the bearer token and stores the identity in the
/// depot. Requests without a usable token get a 401 and never reach the handler.
///
/// The rest of the chain runs inside this middleware's span, which carries `user_id` and
/// `tenant_id` once the token is resolved.
pub struct AuthMiddleware;

#[salvo::async_trait]
impl salvo::Handler for AuthMiddleware {
    #[tracing::instrument(skip(self, req, depot, res, ctrl), fields(
        method = %req.method(),
        path = %req.uri().path(),
        user_id = tracing::field::Empty,
        tenant_id = tracing::field::Empty
    ))]
    async fn handle(
        &self,
        req: &mut Request,
        depot: &mut Depot,
        res: &mut salvo::Response,
        ctrl: &mut salvo::FlowCtrl,
    ) {
        let result = match get_gatekeeper_from_depot(depot) {
            Ok(gatekeeper) => match bearer_token(req) {
                Some(token) => gatekeeper
                    .authenticate(&token)
                    .await
                    .map(|identity| (identity, token))
                    .map_err(AppError::from),
                None => Err(ServiceError::InvalidToken.into()),
            },
            Err(e) => Err(e),
        };

        match result {
            Ok((identity, token)) => {
                tracing::trace!(user_id = %identity.user_id, "Request authenticated");
                depot.insert(depot_keys::IDENTITY, identity);
                depot.insert(depot_keys::ACCESS_TOKEN, token);
                ctrl.call_next(req, depot, res).await;
            }
            Err(e) => {
                e.write(req, depot, res).await;
                ctrl.skip_rest();
            }
        }
    }
}
