use serde::{Deserialize, Serialize};

/// The unit granted by RBAC policy: a role may see a menu, and optionally perform one of its actions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoleMenu {
    pub id: String,
    pub role_id: String,
    pub menu_id: String,
    #[serde(default)]
    pub action_id: Option<String>,
}

#[must_use]
pub fn menu_ids(grants: &[RoleMenu]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    grants
        .iter()
        .filter(|g| seen.insert(g.menu_id.as_str()))
        .map(|g| g.menu_id.clone())
        .collect()
}

#[must_use]
pub fn action_ids(grants: &[RoleMenu]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    grants
        .iter()
        .filter_map(|g| g.action_id.as_deref())
        .filter(|id| seen.insert(*id))
        .map(str::to_string)
        .collect()
}
