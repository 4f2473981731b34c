use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;

use gatehouse_db::db::enums::Status;
use gatehouse_db::db::store::{CredentialStore, TransactionRunner, UserFilter, UserRoleFilter};
use gatehouse_db::db::transaction::WriteOp;
use gatehouse_db::model::new_id;
use gatehouse_db::model::user::{User, UserRole};

use super::require_non_blank;
use crate::auth::password::hash_password;
use crate::auth::reload::PolicyReloader;
use crate::auth::token::Identity;
use crate::error::{ServiceError, ServiceResult};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CreateUser {
    pub user_name: String,
    pub real_name: String,
    pub password: String,
    pub email: String,
    pub phone: String,
    /// Only honoured for the root identity; other callers create users in their own tenant.
    pub tenant_id: Option<String>,
    pub status: Status,
    pub role_ids: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct UpdateUser {
    pub user_name: String,
    pub real_name: String,
    /// Blank keeps the current password.
    pub password: String,
    pub email: String,
    pub phone: String,
    pub status: Status,
    pub role_ids: Vec<String>,
}

/// Splits a role update into role ids to add and assignments to remove.
#[must_use]
pub fn compare_user_roles(
    current: &[UserRole],
    wanted_role_ids: &[String],
) -> (Vec<String>, Vec<UserRole>) {
    let current_ids: HashSet<&str> = current.iter().map(|ur| ur.role_id.as_str()).collect();
    let wanted: HashSet<&str> = wanted_role_ids.iter().map(String::as_str).collect();

    let mut seen = HashSet::new();
    let added = wanted_role_ids
        .iter()
        .filter(|id| !current_ids.contains(id.as_str()) && seen.insert(id.as_str()))
        .cloned()
        .collect();
    let removed = current
        .iter()
        .filter(|ur| !wanted.contains(ur.role_id.as_str()))
        .cloned()
        .collect();
    (added, removed)
}

fn assignment(user_id: &str, role_id: &str) -> WriteOp {
    WriteOp::InsertUserRole(UserRole {
        id: new_id(),
        user_id: user_id.to_string(),
        role_id: role_id.to_string(),
    })
}

fn dedup(ids: &[String]) -> Vec<&String> {
    let mut seen = HashSet::new();
    ids.iter().filter(|id| seen.insert(id.as_str())).collect()
}

pub struct UserService {
    credentials: Arc<dyn CredentialStore>,
    transactions: Arc<dyn TransactionRunner>,
    reloader: PolicyReloader,
    root_user_name: String,
}

impl UserService {
    #[must_use]
    pub fn new(
        credentials: Arc<dyn CredentialStore>,
        transactions: Arc<dyn TransactionRunner>,
        reloader: PolicyReloader,
        root_user_name: impl Into<String>,
    ) -> Self {
        Self {
            credentials,
            transactions,
            reloader,
            root_user_name: root_user_name.into(),
        }
    }

    async fn check_user_name(&self, user_name: &str, except_id: Option<&str>) -> ServiceResult<()> {
        require_non_blank(user_name, "user name")?;
        if user_name == self.root_user_name {
            return Err(ServiceError::BadRequest(format!(
                "user name {user_name} is reserved"
            )));
        }
        let taken = self
            .credentials
            .query_users(UserFilter::by_user_name(user_name))
            .await?
            .iter()
            .any(|u| Some(u.id.as_str()) != except_id);
        if taken {
            return Err(ServiceError::BadRequest(format!(
                "user name {user_name} already exists"
            )));
        }
        Ok(())
    }

    fn is_root(&self, actor: &Identity) -> bool {
        actor.user_id == self.root_user_name
    }

    fn tenant_for(&self, actor: &Identity, requested: Option<&str>) -> String {
        match requested {
            Some(tenant_id) if self.is_root(actor) => tenant_id.to_string(),
            _ => actor.tenant_id.clone(),
        }
    }

    /// Loads user `id` if `actor` may manage it. Users of other tenants are reported as
    /// missing to everyone but root.
    async fn managed(&self, actor: &Identity, id: &str) -> ServiceResult<User> {
        let user = self
            .credentials
            .get_user(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("user {id}")))?;
        if !self.is_root(actor) && user.tenant_id != actor.tenant_id {
            tracing::warn!(
                actor = %actor.user_id,
                actor_tenant = %actor.tenant_id,
                target_tenant = %user.tenant_id,
                "Refusing to manage a user of another tenant"
            );
            return Err(ServiceError::NotFound(format!("user {id}")));
        }
        Ok(user)
    }

    /// ## Summary
    /// Creates a user with the given role assignments.
    ///
    /// ## Errors
    /// Returns `BadRequest` for a blank or reserved user name, a duplicate user name or a blank
    /// password.
    #[tracing::instrument(skip(self, params), fields(user_name = %params.user_name))]
    pub async fn create(&self, actor: &Identity, params: CreateUser) -> ServiceResult<User> {
        self.check_user_name(&params.user_name, None).await?;
        require_non_blank(&params.password, "password")?;

        let user = User {
            id: new_id(),
            user_name: params.user_name,
            real_name: params.real_name,
            password_hash: hash_password(&params.password)?,
            email: params.email,
            phone: params.phone,
            status: params.status,
            tenant_id: self.tenant_for(actor, params.tenant_id.as_deref()),
            created_at: Utc::now(),
            creator: actor.user_id.clone(),
        };

        let mut ops = vec![WriteOp::InsertUser(user.clone())];
        ops.extend(
            dedup(&params.role_ids)
                .into_iter()
                .map(|role_id| assignment(&user.id, role_id)),
        );
        self.transactions.run_in_transaction(ops).await?;
        self.reloader.trigger();

        tracing::info!(user_id = %user.id, tenant_id = %user.tenant_id, "User created");
        Ok(user)
    }

    /// ## Summary
    /// Updates a user and reconciles their role assignments.
    ///
    /// ## Errors
    /// - `NotFound` if the user does not exist or belongs to another tenant than `actor`.
    /// - `BadRequest` for a blank, reserved or duplicate user name.
    #[tracing::instrument(skip(self, actor, params), fields(actor = %actor.user_id))]
    pub async fn update(
        &self,
        actor: &Identity,
        id: &str,
        params: UpdateUser,
    ) -> ServiceResult<User> {
        let current = self.managed(actor, id).await?;
        self.check_user_name(&params.user_name, Some(id)).await?;

        let password_hash = if params.password.is_empty() {
            current.password_hash.clone()
        } else {
            hash_password(&params.password)?
        };
        let updated = User {
            user_name: params.user_name,
            real_name: params.real_name,
            password_hash,
            email: params.email,
            phone: params.phone,
            status: params.status,
            ..current
        };

        let assignments = self
            .credentials
            .query_user_roles(UserRoleFilter::by_user(id))
            .await?;
        let (added, removed) = compare_user_roles(&assignments, &params.role_ids);
        tracing::debug!(added = added.len(), removed = removed.len(), "Role diff");

        let mut ops = vec![WriteOp::UpdateUser(updated.clone())];
        ops.extend(
            removed
                .into_iter()
                .map(|ur| WriteOp::DeleteUserRole { id: ur.id }),
        );
        ops.extend(added.iter().map(|role_id| assignment(id, role_id)));
        self.transactions.run_in_transaction(ops).await?;
        self.reloader.trigger();
        Ok(updated)
    }

    /// ## Errors
    /// Returns `NotFound` if the user does not exist or belongs to another tenant than `actor`.
    #[tracing::instrument(skip(self, actor), fields(actor = %actor.user_id))]
    pub async fn delete(&self, actor: &Identity, id: &str) -> ServiceResult<()> {
        self.managed(actor, id).await?;
        self.transactions
            .run_in_transaction(vec![
                WriteOp::DeleteUserRolesOfUser {
                    user_id: id.to_string(),
                },
                WriteOp::DeleteUser { id: id.to_string() },
            ])
            .await?;
        self.reloader.trigger();
        tracing::info!("User deleted");
        Ok(())
    }

    /// ## Errors
    /// Returns `NotFound` if the user does not exist or belongs to another tenant than `actor`.
    #[tracing::instrument(skip(self, actor), fields(actor = %actor.user_id))]
    pub async fn update_status(
        &self,
        actor: &Identity,
        id: &str,
        status: Status,
    ) -> ServiceResult<()> {
        self.managed(actor, id).await?;
        self.transactions
            .run_in_transaction(vec![WriteOp::SetUserStatus {
                id: id.to_string(),
                status,
            }])
            .await?;
        self.reloader.trigger();
        Ok(())
    }
}
