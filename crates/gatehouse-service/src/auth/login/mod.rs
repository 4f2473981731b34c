//! Username/password login, profile assembly and password management.

use std::sync::Arc;

use serde::Serialize;
use url::Url;

use gatehouse_core::config::{MailConfig, RootConfig, Settings};
use gatehouse_db::db::enums::Status;
use gatehouse_db::db::store::{
    CredentialStore, PermissionStore, RoleFilter, UserFilter, UserRoleFilter,
};
use gatehouse_db::model::role::{self, Role};
use gatehouse_db::model::tenant::Tenant;
use gatehouse_db::model::user::{User, user_role};

use super::password::{hash_password, secrets_match, verify_password};
use super::subject::Subject;
use super::token::{Identity, TokenAuthenticator, TokenInfo};
use crate::error::{ServiceError, ServiceResult};
use crate::mail::{MailDispatcher, MailMessage};

/// A caller whose credentials have been checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedUser {
    pub subject: Subject,
    pub user_id: String,
    pub user_name: String,
    pub tenant_id: String,
}

impl VerifiedUser {
    #[must_use]
    pub fn identity(&self) -> Identity {
        Identity {
            user_id: self.user_id.clone(),
            tenant_id: self.tenant_id.clone(),
        }
    }
}

/// What a logged-in caller learns about themselves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoginProfile {
    pub user_id: String,
    pub user_name: String,
    pub real_name: String,
    pub email: String,
    pub phone: String,
    pub tenant_id: String,
    pub tenant: Option<Tenant>,
    pub roles: Vec<Role>,
    pub is_root: bool,
    pub is_admin: bool,
}

pub struct LoginVerifier {
    root: RootConfig,
    owner_role_id: String,
    mail: MailConfig,
    credentials: Arc<dyn CredentialStore>,
    permissions: Arc<dyn PermissionStore>,
    tokens: Arc<TokenAuthenticator>,
    mailer: Arc<dyn MailDispatcher>,
}

impl LoginVerifier {
    #[must_use]
    pub fn new(
        settings: &Settings,
        credentials: Arc<dyn CredentialStore>,
        permissions: Arc<dyn PermissionStore>,
        tokens: Arc<TokenAuthenticator>,
        mailer: Arc<dyn MailDispatcher>,
    ) -> Self {
        Self {
            root: settings.root.clone(),
            owner_role_id: settings.tenant_owner_role.id.clone(),
            mail: settings.mail.clone(),
            credentials,
            permissions,
            tokens,
            mailer,
        }
    }

    #[must_use]
    pub fn subject_of(&self, user_id: &str) -> Subject {
        Subject::from_user_id(user_id, &self.root)
    }

    fn is_excluded_referer(&self, referer: &str) -> bool {
        let suffix = self.root.excluded_referer_suffix.to_lowercase();
        !suffix.is_empty() && referer.to_lowercase().ends_with(&suffix)
    }

    fn root_user(&self) -> VerifiedUser {
        VerifiedUser {
            subject: Subject::Root,
            user_id: self.root.user_name.clone(),
            user_name: self.root.user_name.clone(),
            tenant_id: self.root.tenant_id.clone(),
        }
    }

    /// ## Summary
    /// Checks a user name and password.
    ///
    /// The configured root identity matches on exact user name and password unless the
    /// request comes from the excluded sign-in page; it is always placed in the configured
    /// root tenant.
    ///
    /// ## Errors
    /// - `InvalidUserName` if no user has that name.
    /// - `InvalidPassword` if the password does not match.
    /// - `UserDisable` if the user is disabled.
    #[tracing::instrument(skip(self, password))]
    pub async fn verify(
        &self,
        user_name: &str,
        password: &str,
        referer: &str,
    ) -> ServiceResult<VerifiedUser> {
        if user_name == self.root.user_name
            && secrets_match(password, &self.root.password)
            && !self.is_excluded_referer(referer)
        {
            tracing::info!("Root identity verified");
            return Ok(self.root_user());
        }

        let user = self
            .credentials
            .query_users(UserFilter::by_user_name(user_name))
            .await?
            .into_iter()
            .next()
            .ok_or(ServiceError::InvalidUserName)?;

        verify_password(password, &user.password_hash)?;
        if !user.is_enabled() {
            return Err(ServiceError::UserDisable);
        }

        Ok(VerifiedUser {
            subject: Subject::User(user.id.clone()),
            user_id: user.id,
            user_name: user.user_name,
            tenant_id: user.tenant_id,
        })
    }

    /// ## Summary
    /// Verifies credentials, issues a token and assembles the caller's profile.
    ///
    /// ## Errors
    /// Returns the errors of [`Self::verify`], or `InternalServer` if issuing the token fails.
    #[tracing::instrument(
        skip(self, password),
        fields(user_id = tracing::field::Empty, tenant_id = tracing::field::Empty)
    )]
    pub async fn login(
        &self,
        user_name: &str,
        password: &str,
        referer: &str,
    ) -> ServiceResult<(LoginProfile, TokenInfo)> {
        let verified = self.verify(user_name, password, referer).await?;
        record_identity(&verified.user_id, &verified.tenant_id);

        let profile = self.login_info(&verified.user_id).await?;
        let token = self.generate_token(&verified).await?;
        tracing::info!("Login succeeded");
        Ok((profile, token))
    }

    /// ## Errors
    /// Returns `InternalServer` if the token cannot be issued.
    pub async fn generate_token(&self, user: &VerifiedUser) -> ServiceResult<TokenInfo> {
        record_identity(&user.user_id, &user.tenant_id);
        self.tokens.generate_token(&user.user_id, &user.tenant_id).await
    }

    /// ## Summary
    /// Resolves a bearer token to the identity it carries.
    ///
    /// ## Errors
    /// Returns `InvalidToken` for any unusable token.
    pub async fn authenticate(&self, token: &str) -> ServiceResult<Identity> {
        let identity = self.tokens.parse_user_id(token).await?;
        record_identity(&identity.user_id, &identity.tenant_id);
        Ok(identity)
    }

    /// ## Errors
    /// Returns `InternalServer` only if the token store fails.
    pub async fn destroy_token(&self, token: &str) -> ServiceResult<()> {
        self.tokens.destroy_token(token).await
    }

    /// ## Summary
    /// Issues a brand-new token for an already authenticated identity.
    ///
    /// ## Errors
    /// - `InvalidToken` if the user no longer exists.
    /// - `UserDisable` if the user has been disabled since logging in.
    #[tracing::instrument(
        skip(self),
        fields(user_id = %identity.user_id, tenant_id = %identity.tenant_id)
    )]
    pub async fn refresh_token(&self, identity: &Identity) -> ServiceResult<TokenInfo> {
        if let Subject::User(user_id) = self.subject_of(&identity.user_id) {
            self.check_and_get_user(&user_id).await?;
        }
        self.tokens
            .generate_token(&identity.user_id, &identity.tenant_id)
            .await
    }

    /// Loads a user for an authenticated session.
    async fn check_and_get_user(&self, user_id: &str) -> ServiceResult<User> {
        let user = self
            .credentials
            .get_user(user_id)
            .await?
            .ok_or(ServiceError::InvalidToken)?;
        if !user.is_enabled() {
            return Err(ServiceError::UserDisable);
        }
        Ok(user)
    }

    /// ## Summary
    /// Builds the profile of `user_id`.
    ///
    /// Root gets a synthesized profile. A registered user is an administrator of their tenant
    /// exactly when they hold the configured owner role.
    ///
    /// ## Errors
    /// - `InvalidToken` if the user no longer exists.
    /// - `UserDisable` if the user is disabled.
    #[tracing::instrument(skip(self))]
    pub async fn login_info(&self, user_id: &str) -> ServiceResult<LoginProfile> {
        let Subject::User(user_id) = self.subject_of(user_id) else {
            return Ok(LoginProfile {
                user_id: self.root.user_name.clone(),
                user_name: self.root.user_name.clone(),
                real_name: self.root.real_name.clone(),
                email: String::new(),
                phone: String::new(),
                tenant_id: self.root.tenant_id.clone(),
                tenant: None,
                roles: Vec::new(),
                is_root: true,
                is_admin: false,
            });
        };

        let user = self.check_and_get_user(&user_id).await?;
        let assignments = self
            .credentials
            .query_user_roles(UserRoleFilter::by_user(&user.id))
            .await?;
        let role_ids = user_role::role_ids(&assignments);
        let is_admin = role_ids.iter().any(|id| *id == self.owner_role_id);

        let mut roles = if role_ids.is_empty() {
            Vec::new()
        } else {
            self.permissions
                .query_roles(RoleFilter {
                    ids: Some(role_ids),
                    status: Some(Status::Enabled),
                })
                .await?
        };
        role::sort_for_display(&mut roles);

        let tenant = self.credentials.get_tenant(&user.tenant_id).await?;

        Ok(LoginProfile {
            user_id: user.id,
            user_name: user.user_name,
            real_name: user.real_name,
            email: user.email,
            phone: user.phone,
            tenant_id: user.tenant_id,
            tenant,
            roles,
            is_root: false,
            is_admin,
        })
    }

    /// ## Summary
    /// Changes the caller's password after checking the current one.
    ///
    /// ## Errors
    /// - `BadRequest` for the root identity, a blank new password, or a wrong old password.
    /// - `InvalidToken` / `UserDisable` if the user is gone or disabled.
    #[tracing::instrument(skip(self, old_password, new_password))]
    pub async fn update_password(
        &self,
        user_id: &str,
        old_password: &str,
        new_password: &str,
    ) -> ServiceResult<()> {
        let Subject::User(user_id) = self.subject_of(user_id) else {
            return Err(ServiceError::BadRequest(
                "the root password cannot be changed".to_string(),
            ));
        };
        if new_password.is_empty() {
            return Err(ServiceError::BadRequest(
                "new password must not be blank".to_string(),
            ));
        }

        let user = self.check_and_get_user(&user_id).await?;
        verify_password(old_password, &user.password_hash).map_err(|e| match e {
            ServiceError::InvalidPassword => {
                ServiceError::BadRequest("old password is incorrect".to_string())
            }
            other => other,
        })?;

        let hash = hash_password(new_password)?;
        self.credentials.update_password(&user.id, &hash).await?;
        tracing::info!("Password updated");
        Ok(())
    }

    /// ## Summary
    /// Mails password reset links to the enabled users registered with `email`.
    ///
    /// Unknown addresses succeed without sending anything.
    ///
    /// ## Errors
    /// Returns `InternalServer` if the lookup fails or the mail queue is closed.
    #[tracing::instrument(skip(self, email))]
    pub async fn send_reset_password_mail(&self, email: &str) -> ServiceResult<()> {
        if email.trim().is_empty() {
            return Err(ServiceError::BadRequest("email must not be blank".to_string()));
        }
        let users = self
            .credentials
            .query_users(UserFilter {
                email: Some(email.to_string()),
                status: Some(Status::Enabled),
                ..UserFilter::default()
            })
            .await?;
        if users.is_empty() {
            tracing::debug!("No enabled user for reset address");
            return Ok(());
        }

        let reset_url = Url::parse(&self.mail.reset_url)
            .map_err(|e| ServiceError::internal("parsing mail.reset_url", e))?;
        let links: String = users
            .iter()
            .map(|user| {
                let mut link = reset_url.clone();
                link.query_pairs_mut()
                    .append_pair("username", &user.user_name);
                format!(
                    r#"<a href="{}">Change for user {}.</a><br>"#,
                    escape_html(link.as_str()),
                    escape_html(&user.user_name)
                )
            })
            .collect();

        self.mailer.send(MailMessage {
            from: self.mail.from.clone(),
            to: email.to_string(),
            subject: "Reset Password".to_string(),
            html_body: format!("Please use the link below to change your password. <br>{links}"),
        })
    }
}

/// Escapes text for HTML element content and double-quoted attributes.
fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Attaches the caller's identity to the current span so later log lines carry it.
fn record_identity(user_id: &str, tenant_id: &str) {
    let span = tracing::Span::current();
    span.record("user_id", user_id);
    span.record("tenant_id", tenant_id);
}

#[cfg(test)]
mod tests;
