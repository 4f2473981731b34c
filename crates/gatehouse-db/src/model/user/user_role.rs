use serde::{Deserialize, Serialize};

/// Assignment of a role to a user.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserRole {
    pub id: String,
    pub user_id: String,
    pub role_id: String,
}

/// Collects the role ids of a set of assignments, keeping first-seen order.
#[must_use]
pub fn role_ids(user_roles: &[UserRole]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    user_roles
        .iter()
        .filter(|ur| seen.insert(ur.role_id.as_str()))
        .map(|ur| ur.role_id.clone())
        .collect()
}
