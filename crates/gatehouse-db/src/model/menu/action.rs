use serde::{Deserialize, Serialize};

/// A fine-grained operation attached to a menu node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuAction {
    pub id: String,
    pub menu_id: String,
    pub code: String,
    #[serde(default)]
    pub name: String,
    /// Endpoints this action authorizes.
    #[serde(default)]
    pub resources: Vec<MenuActionResource>,
}

/// An HTTP endpoint pattern (`keyMatch2` syntax, e.g. `/api/v1/users/:id`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MenuActionResource {
    pub method: String,
    pub path: String,
}
