use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;

use gatehouse_db::db::enums::Status;
use gatehouse_db::db::store::{CredentialStore, TransactionRunner, UserFilter};
use gatehouse_db::db::transaction::WriteOp;
use gatehouse_db::model::new_id;
use gatehouse_db::model::tenant::Tenant;
use gatehouse_db::model::user::{User, UserRole};

use super::require_non_blank;
use crate::auth::password::hash_password;
use crate::auth::reload::PolicyReloader;
use crate::auth::token::Identity;
use crate::error::{ServiceError, ServiceResult};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CreateTenant {
    pub name: String,
    pub admin_user_name: String,
    pub admin_password: String,
    pub admin_email: String,
}

pub struct TenantService {
    credentials: Arc<dyn CredentialStore>,
    transactions: Arc<dyn TransactionRunner>,
    reloader: PolicyReloader,
    root_user_name: String,
    owner_role_id: String,
}

impl TenantService {
    #[must_use]
    pub fn new(
        credentials: Arc<dyn CredentialStore>,
        transactions: Arc<dyn TransactionRunner>,
        reloader: PolicyReloader,
        root_user_name: impl Into<String>,
        owner_role_id: impl Into<String>,
    ) -> Self {
        Self {
            credentials,
            transactions,
            reloader,
            root_user_name: root_user_name.into(),
            owner_role_id: owner_role_id.into(),
        }
    }

    /// ## Summary
    /// Creates a tenant together with its administrator, who holds the tenant owner role.
    /// Either all three rows are written or none.
    ///
    /// ## Errors
    /// Returns `BadRequest` for a blank name or password, or a reserved or taken user name.
    #[tracing::instrument(skip(self, params), fields(name = %params.name))]
    pub async fn create(&self, creator: &str, params: CreateTenant) -> ServiceResult<Tenant> {
        require_non_blank(&params.name, "tenant name")?;
        require_non_blank(&params.admin_user_name, "administrator user name")?;
        require_non_blank(&params.admin_password, "administrator password")?;
        if params.admin_user_name == self.root_user_name {
            return Err(ServiceError::BadRequest(format!(
                "user name {} is reserved",
                params.admin_user_name
            )));
        }
        let taken = !self
            .credentials
            .query_users(UserFilter::by_user_name(&params.admin_user_name))
            .await?
            .is_empty();
        if taken {
            return Err(ServiceError::BadRequest(format!(
                "user name {} already exists",
                params.admin_user_name
            )));
        }

        let now = Utc::now();
        let tenant = Tenant {
            id: new_id(),
            name: params.name,
            status: Status::Enabled,
            created_at: now,
        };
        let admin = User {
            id: new_id(),
            user_name: params.admin_user_name,
            real_name: String::new(),
            password_hash: hash_password(&params.admin_password)?,
            email: params.admin_email,
            phone: String::new(),
            status: Status::Enabled,
            tenant_id: tenant.id.clone(),
            created_at: now,
            creator: creator.to_string(),
        };
        let ownership = UserRole {
            id: new_id(),
            user_id: admin.id.clone(),
            role_id: self.owner_role_id.clone(),
        };

        self.transactions
            .run_in_transaction(vec![
                WriteOp::InsertTenant(tenant.clone()),
                WriteOp::InsertUser(admin),
                WriteOp::InsertUserRole(ownership),
            ])
            .await?;
        self.reloader.trigger();

        tracing::info!(tenant_id = %tenant.id, "Tenant created");
        Ok(tenant)
    }

    /// ## Summary
    /// Enables or disables a tenant. Only root may change a tenant other than its own.
    ///
    /// ## Errors
    /// Returns `NotFound` if the tenant does not exist or `actor` may not see it.
    #[tracing::instrument(skip(self, actor), fields(actor = %actor.user_id))]
    pub async fn update_status(
        &self,
        actor: &Identity,
        id: &str,
        status: Status,
    ) -> ServiceResult<()> {
        if actor.user_id != self.root_user_name && actor.tenant_id != id {
            tracing::warn!(actor_tenant = %actor.tenant_id, "Refusing to change another tenant");
            return Err(ServiceError::NotFound(format!("tenant {id}")));
        }
        self.transactions
            .run_in_transaction(vec![WriteOp::SetTenantStatus {
                id: id.to_string(),
                status,
            }])
            .await?;
        self.reloader.trigger();
        Ok(())
    }
}
