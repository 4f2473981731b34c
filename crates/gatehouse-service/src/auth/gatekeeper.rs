//! Single entry point for the HTTP layer.
//!
//! Every request-scoped call is bounded by the configured request timeout. Dropping the
//! timed-out future aborts the store calls it was making.

use std::future::Future;
use std::time::Duration;

use super::login::{LoginProfile, LoginVerifier};
use super::menu_tree::{MenuNode, MenuTreeResolver};
use super::reload::PolicyReloader;
use super::service::Authorizer;
use super::subject::Subject;
use super::token::{Identity, TokenInfo};
use crate::error::{ServiceError, ServiceResult};

pub struct Gatekeeper {
    verifier: LoginVerifier,
    authorizer: Authorizer,
    menus: MenuTreeResolver,
    reloader: PolicyReloader,
    request_timeout: Duration,
}

impl Gatekeeper {
    #[must_use]
    pub const fn new(
        verifier: LoginVerifier,
        authorizer: Authorizer,
        menus: MenuTreeResolver,
        reloader: PolicyReloader,
        request_timeout: Duration,
    ) -> Self {
        Self {
            verifier,
            authorizer,
            menus,
            reloader,
            request_timeout,
        }
    }

    async fn bounded<T>(
        &self,
        operation: &'static str,
        fut: impl Future<Output = ServiceResult<T>>,
    ) -> ServiceResult<T> {
        tokio::time::timeout(self.request_timeout, fut)
            .await
            .unwrap_or_else(|_elapsed| {
                tracing::warn!(
                    operation,
                    timeout_ms = self.request_timeout.as_millis(),
                    "Request timed out"
                );
                Err(ServiceError::InternalServer(anyhow::anyhow!(
                    "{operation} timed out"
                )))
            })
    }

    #[must_use]
    pub fn subject_of(&self, user_id: &str) -> Subject {
        self.verifier.subject_of(user_id)
    }

    #[must_use]
    pub const fn reloader(&self) -> &PolicyReloader {
        &self.reloader
    }

    /// ## Summary
    /// Resolves a bearer token. Every failure, a timeout included, is reported as
    /// `InvalidToken` so callers treat it as unauthenticated.
    ///
    /// ## Errors
    /// Returns `InvalidToken` for any unusable token.
    pub async fn authenticate(&self, token: &str) -> ServiceResult<Identity> {
        self.bounded("authenticate", self.verifier.authenticate(token))
            .await
            .map_err(|e| {
                if !matches!(e, ServiceError::InvalidToken) {
                    tracing::warn!(error = %e, "Authentication failed, treating as invalid token");
                }
                ServiceError::InvalidToken
            })
    }

    /// ## Summary
    /// Checks `identity` may call `method` on `path` in its own tenant.
    ///
    /// ## Errors
    /// Returns `NoPerm` when denied.
    pub fn authorize(&self, identity: &Identity, path: &str, method: &str) -> ServiceResult<()> {
        let subject = self.subject_of(&identity.user_id);
        self.authorizer
            .require(&subject, &identity.tenant_id, path, method)
    }

    /// ## Errors
    /// See [`LoginVerifier::login`].
    pub async fn login(
        &self,
        user_name: &str,
        password: &str,
        referer: &str,
    ) -> ServiceResult<(LoginProfile, TokenInfo)> {
        self.bounded("login", self.verifier.login(user_name, password, referer))
            .await
    }

    /// ## Errors
    /// Returns `InternalServer` only if the token store fails.
    pub async fn logout(&self, token: &str) -> ServiceResult<()> {
        self.bounded("logout", self.verifier.destroy_token(token))
            .await
    }

    /// ## Errors
    /// See [`LoginVerifier::refresh_token`].
    pub async fn refresh_token(&self, identity: &Identity) -> ServiceResult<TokenInfo> {
        self.bounded("refresh_token", self.verifier.refresh_token(identity))
            .await
    }

    /// ## Errors
    /// See [`MenuTreeResolver::query_user_menu_tree`].
    pub async fn menu_tree(&self, user_id: &str) -> ServiceResult<Vec<MenuNode>> {
        let subject = self.subject_of(user_id);
        self.bounded("menu_tree", self.menus.query_user_menu_tree(&subject))
            .await
    }

    /// ## Errors
    /// See [`LoginVerifier::login_info`].
    pub async fn login_info(&self, user_id: &str) -> ServiceResult<LoginProfile> {
        self.bounded("login_info", self.verifier.login_info(user_id))
            .await
    }

    /// ## Errors
    /// See [`LoginVerifier::update_password`].
    pub async fn update_password(
        &self,
        user_id: &str,
        old_password: &str,
        new_password: &str,
    ) -> ServiceResult<()> {
        self.bounded(
            "update_password",
            self.verifier
                .update_password(user_id, old_password, new_password),
        )
        .await
    }

    /// ## Errors
    /// See [`LoginVerifier::send_reset_password_mail`].
    pub async fn send_reset_password_mail(&self, email: &str) -> ServiceResult<()> {
        self.bounded(
            "send_reset_password_mail",
            self.verifier.send_reset_password_mail(email),
        )
        .await
    }
}
