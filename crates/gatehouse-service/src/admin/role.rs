use std::sync::Arc;

use serde::Deserialize;

use gatehouse_db::db::enums::Status;
use gatehouse_db::db::store::{PermissionStore, RoleFilter, TransactionRunner};
use gatehouse_db::db::transaction::WriteOp;
use gatehouse_db::model::new_id;
use gatehouse_db::model::role::{Role, RoleMenu};

use super::require_non_blank;
use crate::auth::reload::PolicyReloader;
use crate::error::{ServiceError, ServiceResult};

/// Menu visibility granted to a role, with the actions allowed on it.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RoleGrant {
    pub menu_id: String,
    pub action_ids: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CreateRole {
    pub name: String,
    pub sequence: i32,
    pub status: Status,
    pub role_type: String,
    pub memo: String,
    pub grants: Vec<RoleGrant>,
}

fn grant_rows(role_id: &str, grants: &[RoleGrant]) -> Vec<RoleMenu> {
    grants
        .iter()
        .flat_map(|grant| {
            let actions: Vec<Option<String>> = if grant.action_ids.is_empty() {
                vec![None]
            } else {
                grant.action_ids.iter().cloned().map(Some).collect()
            };
            actions.into_iter().map(move |action_id| RoleMenu {
                id: new_id(),
                role_id: role_id.to_string(),
                menu_id: grant.menu_id.clone(),
                action_id,
            })
        })
        .collect()
}

pub struct RoleService {
    permissions: Arc<dyn PermissionStore>,
    transactions: Arc<dyn TransactionRunner>,
    reloader: PolicyReloader,
}

impl RoleService {
    #[must_use]
    pub fn new(
        permissions: Arc<dyn PermissionStore>,
        transactions: Arc<dyn TransactionRunner>,
        reloader: PolicyReloader,
    ) -> Self {
        Self {
            permissions,
            transactions,
            reloader,
        }
    }

    async fn existing(&self, id: &str) -> ServiceResult<Role> {
        self.permissions
            .query_roles(RoleFilter {
                ids: Some(vec![id.to_string()]),
                ..RoleFilter::default()
            })
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| ServiceError::NotFound(format!("role {id}")))
    }

    /// ## Summary
    /// Creates a role and its menu/action grants in one transaction.
    ///
    /// ## Errors
    /// Returns `BadRequest` for a blank name or a grant without a menu.
    #[tracing::instrument(skip(self, params), fields(name = %params.name))]
    pub async fn create(&self, params: CreateRole) -> ServiceResult<Role> {
        require_non_blank(&params.name, "role name")?;
        if params.grants.iter().any(|g| g.menu_id.trim().is_empty()) {
            return Err(ServiceError::BadRequest("grant without menu".to_string()));
        }

        let role = Role {
            id: new_id(),
            name: params.name,
            sequence: params.sequence,
            status: params.status,
            role_type: params.role_type,
            memo: params.memo,
        };
        let mut ops = vec![WriteOp::InsertRole(role.clone())];
        ops.extend(
            grant_rows(&role.id, &params.grants)
                .into_iter()
                .map(WriteOp::InsertRoleMenu),
        );
        self.transactions.run_in_transaction(ops).await?;
        self.reloader.trigger();

        tracing::info!(role_id = %role.id, "Role created");
        Ok(role)
    }

    /// ## Errors
    /// Returns `NotFound` if the role does not exist.
    #[tracing::instrument(skip(self))]
    pub async fn update_status(&self, id: &str, status: Status) -> ServiceResult<()> {
        self.transactions
            .run_in_transaction(vec![WriteOp::SetRoleStatus {
                id: id.to_string(),
                status,
            }])
            .await?;
        self.reloader.trigger();
        Ok(())
    }

    /// ## Summary
    /// Deletes a role with its grants and assignments.
    ///
    /// ## Errors
    /// Returns `NotFound` if the role does not exist.
    #[tracing::instrument(skip(self))]
    pub async fn delete(&self, id: &str) -> ServiceResult<()> {
        self.existing(id).await?;
        self.transactions
            .run_in_transaction(vec![
                WriteOp::DeleteRoleMenusOfRole {
                    role_id: id.to_string(),
                },
                WriteOp::DeleteUserRolesOfRole {
                    role_id: id.to_string(),
                },
                WriteOp::DeleteRole { id: id.to_string() },
            ])
            .await?;
        self.reloader.trigger();
        tracing::info!("Role deleted");
        Ok(())
    }
}
