//! Collaborator interfaces consumed by the identity and authorization services.
//!
//! Filters use `Option` fields: `None` means "do not filter on this column", while
//! `ids: Some(vec![])` matches nothing.

use async_trait::async_trait;

use crate::db::enums::Status;
use crate::db::transaction::WriteOp;
use crate::error::DbResult;
use crate::model::menu::{Menu, MenuAction};
use crate::model::role::{Role, RoleMenu};
use crate::model::tenant::Tenant;
use crate::model::user::{User, UserRole};

#[derive(Debug, Clone, Default)]
pub struct UserFilter {
    pub ids: Option<Vec<String>>,
    pub user_name: Option<String>,
    pub email: Option<String>,
    pub status: Option<Status>,
    pub tenant_id: Option<String>,
}

impl UserFilter {
    #[must_use]
    pub fn by_user_name(user_name: impl Into<String>) -> Self {
        Self {
            user_name: Some(user_name.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn matches(&self, user: &User) -> bool {
        matches_ids(self.ids.as_deref(), &user.id)
            && self.user_name.as_ref().is_none_or(|n| *n == user.user_name)
            && self.email.as_ref().is_none_or(|e| *e == user.email)
            && self.status.is_none_or(|s| s == user.status)
            && self.tenant_id.as_ref().is_none_or(|t| *t == user.tenant_id)
    }
}

#[derive(Debug, Clone, Default)]
pub struct UserRoleFilter {
    pub user_ids: Option<Vec<String>>,
    pub role_ids: Option<Vec<String>>,
}

impl UserRoleFilter {
    #[must_use]
    pub fn by_user(user_id: impl Into<String>) -> Self {
        Self {
            user_ids: Some(vec![user_id.into()]),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn matches(&self, user_role: &UserRole) -> bool {
        matches_ids(self.user_ids.as_deref(), &user_role.user_id)
            && matches_ids(self.role_ids.as_deref(), &user_role.role_id)
    }
}

#[derive(Debug, Clone, Default)]
pub struct TenantFilter {
    pub ids: Option<Vec<String>>,
    pub status: Option<Status>,
}

impl TenantFilter {
    #[must_use]
    pub fn matches(&self, tenant: &Tenant) -> bool {
        matches_ids(self.ids.as_deref(), &tenant.id) && self.status.is_none_or(|s| s == tenant.status)
    }
}

#[derive(Debug, Clone, Default)]
pub struct RoleFilter {
    pub ids: Option<Vec<String>>,
    pub status: Option<Status>,
}

impl RoleFilter {
    #[must_use]
    pub fn matches(&self, role: &Role) -> bool {
        matches_ids(self.ids.as_deref(), &role.id) && self.status.is_none_or(|s| s == role.status)
    }
}

#[derive(Debug, Clone, Default)]
pub struct MenuFilter {
    pub ids: Option<Vec<String>>,
    pub status: Option<Status>,
}

impl MenuFilter {
    #[must_use]
    pub fn matches(&self, menu: &Menu) -> bool {
        matches_ids(self.ids.as_deref(), &menu.id) && self.status.is_none_or(|s| s == menu.status)
    }
}

#[derive(Debug, Clone, Default)]
pub struct MenuActionFilter {
    pub ids: Option<Vec<String>>,
    pub menu_ids: Option<Vec<String>>,
}

impl MenuActionFilter {
    #[must_use]
    pub fn matches(&self, action: &MenuAction) -> bool {
        matches_ids(self.ids.as_deref(), &action.id)
            && matches_ids(self.menu_ids.as_deref(), &action.menu_id)
    }
}

#[derive(Debug, Clone, Default)]
pub struct RoleMenuFilter {
    pub role_ids: Option<Vec<String>>,
}

impl RoleMenuFilter {
    #[must_use]
    pub fn matches(&self, grant: &RoleMenu) -> bool {
        matches_ids(self.role_ids.as_deref(), &grant.role_id)
    }
}

fn matches_ids(ids: Option<&[String]>, id: &str) -> bool {
    ids.is_none_or(|ids| ids.iter().any(|candidate| candidate == id))
}

/// Lookup of users, their role assignments and their tenants.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// ## Errors
    /// Returns `Unavailable` when the store cannot be read.
    async fn query_users(&self, filter: UserFilter) -> DbResult<Vec<User>>;

    /// ## Errors
    /// Returns `Unavailable` when the store cannot be read.
    async fn get_user(&self, id: &str) -> DbResult<Option<User>>;

    /// ## Errors
    /// Returns `Unavailable` when the store cannot be read.
    async fn query_user_roles(&self, filter: UserRoleFilter) -> DbResult<Vec<UserRole>>;

    /// ## Errors
    /// Returns `Unavailable` when the store cannot be read.
    async fn get_tenant(&self, id: &str) -> DbResult<Option<Tenant>>;

    /// ## Errors
    /// Returns `Unavailable` when the store cannot be read.
    async fn query_tenants(&self, filter: TenantFilter) -> DbResult<Vec<Tenant>>;

    /// ## Summary
    /// Replaces the stored password hash of a user.
    ///
    /// ## Errors
    /// Returns `NotFound` if the user does not exist.
    async fn update_password(&self, user_id: &str, password_hash: &str) -> DbResult<()>;
}

/// Lookup of roles, menus, menu actions and role-menu grants.
#[async_trait]
pub trait PermissionStore: Send + Sync {
    /// ## Errors
    /// Returns `Unavailable` when the store cannot be read.
    async fn query_roles(&self, filter: RoleFilter) -> DbResult<Vec<Role>>;

    /// ## Errors
    /// Returns `Unavailable` when the store cannot be read.
    async fn query_menus(&self, filter: MenuFilter) -> DbResult<Vec<Menu>>;

    /// ## Errors
    /// Returns `Unavailable` when the store cannot be read.
    async fn query_menu_actions(&self, filter: MenuActionFilter) -> DbResult<Vec<MenuAction>>;

    /// ## Errors
    /// Returns `Unavailable` when the store cannot be read.
    async fn query_role_menus(&self, filter: RoleMenuFilter) -> DbResult<Vec<RoleMenu>>;
}

/// Applies multi-step mutations atomically.
#[async_trait]
pub trait TransactionRunner: Send + Sync {
    /// ## Summary
    /// Applies every write in order. Either all writes become visible or none do.
    ///
    /// ## Errors
    /// Returns the error of the first failing write; earlier writes of the batch are discarded.
    async fn run_in_transaction(&self, ops: Vec<WriteOp>) -> DbResult<()>;
}
