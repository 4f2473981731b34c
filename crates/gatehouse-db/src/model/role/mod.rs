use serde::{Deserialize, Serialize};

use crate::db::enums::Status;

pub mod role_menu;

pub use role_menu::RoleMenu;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: String,
    pub name: String,
    /// Display order, higher first.
    #[serde(default)]
    pub sequence: i32,
    #[serde(default)]
    pub status: Status,
    #[serde(default)]
    pub role_type: String,
    #[serde(default)]
    pub memo: String,
}

/// Orders roles for display: `sequence` descending, then id.
pub fn sort_for_display(roles: &mut [Role]) {
    roles.sort_by(|a, b| b.sequence.cmp(&a.sequence).then_with(|| a.id.cmp(&b.id)));
}
