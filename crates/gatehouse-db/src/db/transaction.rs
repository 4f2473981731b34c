//! Write operations applied through a `TransactionRunner`.
//!
//! ## Usage
//!
//! Build the whole batch first, then hand it to the runner:
//!
//! ```rust,ignore
//! store
//!     .run_in_transaction(vec![
//!         WriteOp::InsertTenant(tenant),
//!         WriteOp::InsertUser(admin),
//!         WriteOp::InsertUserRole(owner_role),
//!     ])
//!     .await?;
//! ```

use crate::db::enums::Status;
use crate::model::menu::{Menu, MenuAction};
use crate::model::role::{Role, RoleMenu};
use crate::model::tenant::Tenant;
use crate::model::user::{User, UserRole};

#[derive(Debug, Clone)]
pub enum WriteOp {
    InsertUser(User),
    UpdateUser(User),
    DeleteUser { id: String },
    SetUserStatus { id: String, status: Status },
    InsertUserRole(UserRole),
    DeleteUserRole { id: String },
    /// Removes every role assignment of a user.
    DeleteUserRolesOfUser { user_id: String },
    /// Removes every assignment of a role.
    DeleteUserRolesOfRole { role_id: String },
    InsertTenant(Tenant),
    SetTenantStatus { id: String, status: Status },
    InsertRole(Role),
    SetRoleStatus { id: String, status: Status },
    DeleteRole { id: String },
    InsertMenu(Menu),
    InsertMenuAction(MenuAction),
    InsertRoleMenu(RoleMenu),
    /// Removes every grant of a role.
    DeleteRoleMenusOfRole { role_id: String },
}

impl WriteOp {
    /// Short label used in logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::InsertUser(_) => "insert_user",
            Self::UpdateUser(_) => "update_user",
            Self::DeleteUser { .. } => "delete_user",
            Self::SetUserStatus { .. } => "set_user_status",
            Self::InsertUserRole(_) => "insert_user_role",
            Self::DeleteUserRole { .. } => "delete_user_role",
            Self::DeleteUserRolesOfUser { .. } => "delete_user_roles_of_user",
            Self::DeleteUserRolesOfRole { .. } => "delete_user_roles_of_role",
            Self::InsertTenant(_) => "insert_tenant",
            Self::SetTenantStatus { .. } => "set_tenant_status",
            Self::InsertRole(_) => "insert_role",
            Self::SetRoleStatus { .. } => "set_role_status",
            Self::DeleteRole { .. } => "delete_role",
            Self::InsertMenu(_) => "insert_menu",
            Self::InsertMenuAction(_) => "insert_menu_action",
            Self::InsertRoleMenu(_) => "insert_role_menu",
            Self::DeleteRoleMenusOfRole { .. } => "delete_role_menus_of_role",
        }
    }
}
