use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db::enums::Status;

pub mod user_role;

pub use user_role::UserRole;

/// A registered user row.
///
/// The root identity is never stored as a `User`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub user_name: String,
    #[serde(default)]
    pub real_name: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub status: Status,
    pub tenant_id: String,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub creator: String,
}

impl User {
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.status.is_enabled()
    }
}
