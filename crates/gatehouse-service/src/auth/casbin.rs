//! Casbin-backed policy enforcement.
//!
//! The loaded policy lives in an immutable `casbin::Enforcer` snapshot. A reload builds a fresh
//! enforcer off to the side and swaps it in, so concurrent checks see either the old policy or
//! the new one, never a half-loaded mix.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use arc_swap::ArcSwap;
use async_trait::async_trait;
use casbin::{CoreApi, DefaultModel, Enforcer, MemoryAdapter, MgmtApi};

use super::policy::PolicySnapshot;
use super::subject::Subject;
use crate::error::{ServiceError, ServiceResult};

pub const MODEL_CONF: &str = include_str!("casbin_model.conf");

/// Decision engine consulted on every authorized request.
#[async_trait]
pub trait PolicyEnforcer: Send + Sync {
    /// ## Summary
    /// Decides whether `subject` may perform `action` on `resource` within `tenant`.
    ///
    /// ## Errors
    /// Returns `InternalServer` if the engine fails to evaluate the request.
    fn enforce(
        &self,
        subject: &Subject,
        tenant: &str,
        resource: &str,
        action: &str,
    ) -> ServiceResult<bool>;

    /// ## Summary
    /// Replaces the loaded policy with `snapshot`.
    ///
    /// ## Errors
    /// Returns `InternalServer` if the snapshot cannot be compiled; the previous policy stays.
    async fn load(&self, snapshot: PolicySnapshot) -> ServiceResult<()>;

    /// Number of policies successfully loaded so far.
    fn generation(&self) -> u64;
}

/// Enforcer used when policy enforcement is switched off in configuration.
#[derive(Debug, Default)]
pub struct AllowAllEnforcer;

#[async_trait]
impl PolicyEnforcer for AllowAllEnforcer {
    fn enforce(&self, _: &Subject, _: &str, _: &str, _: &str) -> ServiceResult<bool> {
        Ok(true)
    }

    async fn load(&self, _snapshot: PolicySnapshot) -> ServiceResult<()> {
        Ok(())
    }

    fn generation(&self) -> u64 {
        0
    }
}

pub struct CasbinPolicyEnforcer {
    model_text: String,
    current: ArcSwap<Enforcer>,
    generation: AtomicU64,
}

impl CasbinPolicyEnforcer {
    /// ## Summary
    /// Creates an enforcer with the given model and an empty policy.
    ///
    /// ## Errors
    /// Returns `InternalServer` if the model does not parse.
    #[tracing::instrument(skip(model_text))]
    pub async fn new(model_text: &str) -> ServiceResult<Self> {
        tracing::debug!("Initializing Casbin enforcer");
        let enforcer = build_enforcer(model_text, &PolicySnapshot::default()).await?;
        Ok(Self {
            model_text: model_text.to_string(),
            current: ArcSwap::from_pointee(enforcer),
            generation: AtomicU64::new(0),
        })
    }

    /// ## Summary
    /// Creates an enforcer from the embedded model.
    ///
    /// ## Errors
    /// Returns `InternalServer` if the model does not parse.
    pub async fn with_default_model() -> ServiceResult<Self> {
        Self::new(MODEL_CONF).await
    }

    /// ## Summary
    /// Creates an enforcer from a model file on disk.
    ///
    /// ## Errors
    /// Returns `InternalServer` if the file cannot be read or does not parse.
    pub async fn from_model_file(path: impl AsRef<Path>) -> ServiceResult<Self> {
        let model_text = tokio::fs::read_to_string(path.as_ref())
            .await
            .map_err(|e| ServiceError::internal("reading casbin model file", e))?;
        Self::new(&model_text).await
    }
}

#[async_trait]
impl PolicyEnforcer for CasbinPolicyEnforcer {
    fn enforce(
        &self,
        subject: &Subject,
        tenant: &str,
        resource: &str,
        action: &str,
    ) -> ServiceResult<bool> {
        let Some(sub) = subject.casbin_subject() else {
            return Ok(true);
        };
        let enforcer = self.current.load();
        let allowed = enforcer.enforce((sub.as_str(), tenant, resource, action))?;
        tracing::trace!(
            subject = %sub,
            tenant,
            resource,
            action,
            allowed,
            "Policy decision"
        );
        Ok(allowed)
    }

    async fn load(&self, snapshot: PolicySnapshot) -> ServiceResult<()> {
        let enforcer = build_enforcer(&self.model_text, &snapshot).await?;
        self.current.store(Arc::new(enforcer));
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        tracing::info!(
            generation,
            policy_count = snapshot.policies.len(),
            grouping_count = snapshot.groupings.len(),
            "Casbin policy swapped in"
        );
        Ok(())
    }

    fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }
}

/// ## Summary
/// Builds an in-memory enforcer holding exactly the rules of `snapshot`.
///
/// ## Errors
/// Returns `InternalServer` for an invalid model or rule insertion failure.
pub async fn build_enforcer(model_text: &str, snapshot: &PolicySnapshot) -> ServiceResult<Enforcer> {
    let model = DefaultModel::from_str(model_text).await?;
    let mut enforcer = Enforcer::new(model, MemoryAdapter::default()).await?;

    let policies = snapshot.policy_rows();
    if !policies.is_empty() {
        enforcer.add_policies(policies).await?;
    }
    let groupings = snapshot.grouping_rows();
    if !groupings.is_empty() {
        enforcer.add_grouping_policies(groupings).await?;
    }

    enforcer.build_role_links()?;
    Ok(enforcer)
}
