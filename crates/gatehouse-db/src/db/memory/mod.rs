//! In-process store used by the server binary and the test suites.

use std::path::Path;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::RwLock;

use crate::db::store::{
    CredentialStore, MenuActionFilter, MenuFilter, PermissionStore, RoleFilter, RoleMenuFilter,
    TenantFilter, TransactionRunner, UserFilter, UserRoleFilter,
};
use crate::db::transaction::WriteOp;
use crate::error::{DbError, DbResult};
use crate::model::menu::{Menu, MenuAction};
use crate::model::role::{Role, RoleMenu};
use crate::model::tenant::Tenant;
use crate::model::user::{User, UserRole};

/// Initial content of a `MemoryStore`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Seed {
    pub tenants: Vec<Tenant>,
    pub users: Vec<User>,
    pub user_roles: Vec<UserRole>,
    pub roles: Vec<Role>,
    pub menus: Vec<Menu>,
    pub menu_actions: Vec<MenuAction>,
    pub role_menus: Vec<RoleMenu>,
}

impl Seed {
    /// ## Errors
    /// Returns `SeedError` if the document is not a valid seed.
    pub fn from_json_str(document: &str) -> DbResult<Self> {
        Ok(serde_json::from_str(document)?)
    }

    /// ## Errors
    /// Returns `Unavailable` if the file cannot be read, `SeedError` if it cannot be parsed.
    pub async fn from_file(path: impl AsRef<Path>) -> DbResult<Self> {
        let path = path.as_ref();
        let document = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| DbError::Unavailable(format!("reading {}: {e}", path.display())))?;
        Self::from_json_str(&document)
    }

    fn into_ops(self) -> Vec<WriteOp> {
        let mut ops = Vec::new();
        ops.extend(self.tenants.into_iter().map(WriteOp::InsertTenant));
        ops.extend(self.users.into_iter().map(WriteOp::InsertUser));
        ops.extend(self.roles.into_iter().map(WriteOp::InsertRole));
        ops.extend(self.user_roles.into_iter().map(WriteOp::InsertUserRole));
        ops.extend(self.menus.into_iter().map(WriteOp::InsertMenu));
        ops.extend(self.menu_actions.into_iter().map(WriteOp::InsertMenuAction));
        ops.extend(self.role_menus.into_iter().map(WriteOp::InsertRoleMenu));
        ops
    }
}

#[derive(Debug, Clone, Default)]
struct Tables {
    users: Vec<User>,
    user_roles: Vec<UserRole>,
    tenants: Vec<Tenant>,
    roles: Vec<Role>,
    menus: Vec<Menu>,
    menu_actions: Vec<MenuAction>,
    role_menus: Vec<RoleMenu>,
}

impl Tables {
    fn apply(&mut self, op: WriteOp) -> DbResult<()> {
        match op {
            WriteOp::InsertUser(user) => {
                if self.users.iter().any(|u| u.id == user.id) {
                    return Err(DbError::Conflict(format!("user id {}", user.id)));
                }
                if self.users.iter().any(|u| u.user_name == user.user_name) {
                    return Err(DbError::Conflict(format!("user name {}", user.user_name)));
                }
                self.users.push(user);
            }
            WriteOp::UpdateUser(user) => {
                if self
                    .users
                    .iter()
                    .any(|u| u.id != user.id && u.user_name == user.user_name)
                {
                    return Err(DbError::Conflict(format!("user name {}", user.user_name)));
                }
                let slot = find_mut(&mut self.users, "user", &user.id, |u| &u.id)?;
                *slot = user;
            }
            WriteOp::DeleteUser { id } => remove(&mut self.users, "user", &id, |u| &u.id)?,
            WriteOp::SetUserStatus { id, status } => {
                find_mut(&mut self.users, "user", &id, |u| &u.id)?.status = status;
            }
            WriteOp::InsertUserRole(user_role) => {
                if self
                    .user_roles
                    .iter()
                    .any(|ur| {
                        ur.id == user_role.id
                            || (ur.user_id == user_role.user_id && ur.role_id == user_role.role_id)
                    })
                {
                    return Err(DbError::Conflict(format!(
                        "user {} already holds role {}",
                        user_role.user_id, user_role.role_id
                    )));
                }
                self.user_roles.push(user_role);
            }
            WriteOp::DeleteUserRole { id } => {
                remove(&mut self.user_roles, "user_role", &id, |ur| &ur.id)?;
            }
            WriteOp::DeleteUserRolesOfUser { user_id } => {
                self.user_roles.retain(|ur| ur.user_id != user_id);
            }
            WriteOp::DeleteUserRolesOfRole { role_id } => {
                self.user_roles.retain(|ur| ur.role_id != role_id);
            }
            WriteOp::InsertTenant(tenant) => {
                insert_unique(&mut self.tenants, "tenant", tenant, |t| &t.id)?;
            }
            WriteOp::SetTenantStatus { id, status } => {
                find_mut(&mut self.tenants, "tenant", &id, |t| &t.id)?.status = status;
            }
            WriteOp::InsertRole(role) => insert_unique(&mut self.roles, "role", role, |r| &r.id)?,
            WriteOp::SetRoleStatus { id, status } => {
                find_mut(&mut self.roles, "role", &id, |r| &r.id)?.status = status;
            }
            WriteOp::DeleteRole { id } => remove(&mut self.roles, "role", &id, |r| &r.id)?,
            WriteOp::InsertMenu(menu) => insert_unique(&mut self.menus, "menu", menu, |m| &m.id)?,
            WriteOp::InsertMenuAction(action) => {
                insert_unique(&mut self.menu_actions, "menu_action", action, |a| &a.id)?;
            }
            WriteOp::InsertRoleMenu(grant) => {
                insert_unique(&mut self.role_menus, "role_menu", grant, |g| &g.id)?;
            }
            WriteOp::DeleteRoleMenusOfRole { role_id } => {
                self.role_menus.retain(|g| g.role_id != role_id);
            }
        }
        Ok(())
    }
}

fn insert_unique<T>(
    rows: &mut Vec<T>,
    entity: &'static str,
    row: T,
    id_of: impl Fn(&T) -> &String,
) -> DbResult<()> {
    if rows.iter().any(|existing| id_of(existing) == id_of(&row)) {
        return Err(DbError::Conflict(format!("{entity} id {}", id_of(&row))));
    }
    rows.push(row);
    Ok(())
}

fn find_mut<'a, T>(
    rows: &'a mut [T],
    entity: &'static str,
    id: &str,
    id_of: impl Fn(&T) -> &String,
) -> DbResult<&'a mut T> {
    rows.iter_mut()
        .find(|row| id_of(row) == id)
        .ok_or_else(|| DbError::not_found(entity, id))
}

fn remove<T>(
    rows: &mut Vec<T>,
    entity: &'static str,
    id: &str,
    id_of: impl Fn(&T) -> &String,
) -> DbResult<()> {
    let before = rows.len();
    rows.retain(|row| id_of(row) != id);
    if rows.len() == before {
        return Err(DbError::not_found(entity, id));
    }
    Ok(())
}

/// Store over in-process tables guarded by a many-readers/one-writer lock.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// ## Summary
    /// Creates a store populated from a seed document.
    ///
    /// ## Errors
    /// Returns `Conflict` if the seed contains duplicate ids or user names.
    pub async fn seeded(seed: Seed) -> DbResult<Self> {
        let store = Self::new();
        store.run_in_transaction(seed.into_ops()).await?;
        Ok(store)
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn query_users(&self, filter: UserFilter) -> DbResult<Vec<User>> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .iter()
            .filter(|u| filter.matches(u))
            .cloned()
            .collect())
    }

    async fn get_user(&self, id: &str) -> DbResult<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables.users.iter().find(|u| u.id == id).cloned())
    }

    async fn query_user_roles(&self, filter: UserRoleFilter) -> DbResult<Vec<UserRole>> {
        let tables = self.tables.read().await;
        Ok(tables
            .user_roles
            .iter()
            .filter(|ur| filter.matches(ur))
            .cloned()
            .collect())
    }

    async fn get_tenant(&self, id: &str) -> DbResult<Option<Tenant>> {
        let tables = self.tables.read().await;
        Ok(tables.tenants.iter().find(|t| t.id == id).cloned())
    }

    async fn query_tenants(&self, filter: TenantFilter) -> DbResult<Vec<Tenant>> {
        let tables = self.tables.read().await;
        Ok(tables
            .tenants
            .iter()
            .filter(|t| filter.matches(t))
            .cloned()
            .collect())
    }

    #[tracing::instrument(skip(self, password_hash))]
    async fn update_password(&self, user_id: &str, password_hash: &str) -> DbResult<()> {
        let mut tables = self.tables.write().await;
        find_mut(&mut tables.users, "user", user_id, |u| &u.id)?.password_hash =
            password_hash.to_string();
        Ok(())
    }
}

#[async_trait]
impl PermissionStore for MemoryStore {
    async fn query_roles(&self, filter: RoleFilter) -> DbResult<Vec<Role>> {
        let tables = self.tables.read().await;
        Ok(tables
            .roles
            .iter()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect())
    }

    async fn query_menus(&self, filter: MenuFilter) -> DbResult<Vec<Menu>> {
        let tables = self.tables.read().await;
        Ok(tables
            .menus
            .iter()
            .filter(|m| filter.matches(m))
            .cloned()
            .collect())
    }

    async fn query_menu_actions(&self, filter: MenuActionFilter) -> DbResult<Vec<MenuAction>> {
        let tables = self.tables.read().await;
        Ok(tables
            .menu_actions
            .iter()
            .filter(|a| filter.matches(a))
            .cloned()
            .collect())
    }

    async fn query_role_menus(&self, filter: RoleMenuFilter) -> DbResult<Vec<RoleMenu>> {
        let tables = self.tables.read().await;
        Ok(tables
            .role_menus
            .iter()
            .filter(|g| filter.matches(g))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl TransactionRunner for MemoryStore {
    #[tracing::instrument(skip_all, fields(op_count = ops.len()))]
    async fn run_in_transaction(&self, ops: Vec<WriteOp>) -> DbResult<()> {
        let mut tables = self.tables.write().await;
        let mut staged = tables.clone();
        for op in ops {
            let kind = op.kind();
            if let Err(e) = staged.apply(op) {
                tracing::debug!(op = kind, error = %e, "Transaction rolled back");
                return Err(e);
            }
        }
        *tables = staged;
        tracing::trace!("Transaction committed");
        Ok(())
    }
}
