//! Mutations of users, tenants and roles.
//!
//! Every mutation commits through the transaction runner and then asks the policy reload
//! coordinator for a refresh. The trigger never blocks and a failed reload does not undo the
//! committed write.

pub mod role;
pub mod tenant;
pub mod user;

pub use role::{CreateRole, RoleGrant, RoleService};
pub use tenant::{CreateTenant, TenantService};
pub use user::{CreateUser, UpdateUser, UserService};

use crate::error::{ServiceError, ServiceResult};

fn require_non_blank(value: &str, what: &str) -> ServiceResult<()> {
    if value.trim().is_empty() {
        return Err(ServiceError::BadRequest(format!("{what} must not be blank")));
    }
    Ok(())
}
