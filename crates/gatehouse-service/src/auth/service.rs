//! Authorization service for centralized access control.
//!
//! Handlers and middleware go through [`Authorizer`] rather than the enforcer directly.

use std::sync::Arc;

use super::casbin::PolicyEnforcer;
use super::subject::Subject;
use crate::error::{ServiceError, ServiceResult};

/// Result of an authorization check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthzResult {
    Allowed,
    Denied,
}

impl AuthzResult {
    #[must_use]
    pub const fn is_allowed(self) -> bool {
        matches!(self, Self::Allowed)
    }

    /// ## Errors
    ///
    /// Returns `NoPerm` if access is denied.
    pub fn require(self) -> ServiceResult<()> {
        match self {
            Self::Allowed => Ok(()),
            Self::Denied => Err(ServiceError::NoPerm),
        }
    }
}

#[derive(Clone)]
pub struct Authorizer {
    enforcer: Arc<dyn PolicyEnforcer>,
}

impl Authorizer {
    #[must_use]
    pub fn new(enforcer: Arc<dyn PolicyEnforcer>) -> Self {
        Self { enforcer }
    }

    #[must_use]
    pub fn enforcer(&self) -> &Arc<dyn PolicyEnforcer> {
        &self.enforcer
    }

    /// ## Summary
    /// Checks whether `subject` may call `method` on `path` within `tenant`.
    ///
    /// ## Errors
    ///
    /// Returns `InternalServer` if policy evaluation fails.
    pub fn check(
        &self,
        subject: &Subject,
        tenant: &str,
        path: &str,
        method: &str,
    ) -> ServiceResult<AuthzResult> {
        if self.enforcer.enforce(subject, tenant, path, method)? {
            tracing::debug!(%subject, tenant, path, method, "Authorization granted");
            Ok(AuthzResult::Allowed)
        } else {
            tracing::debug!(%subject, tenant, path, method, "Authorization denied");
            Ok(AuthzResult::Denied)
        }
    }

    /// ## Errors
    ///
    /// - Returns `NoPerm` if access is denied.
    /// - Returns `InternalServer` if policy evaluation fails.
    pub fn require(
        &self,
        subject: &Subject,
        tenant: &str,
        path: &str,
        method: &str,
    ) -> ServiceResult<()> {
        self.check(subject, tenant, path, method)?.require()
    }
}
