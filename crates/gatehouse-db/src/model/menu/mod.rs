use serde::{Deserialize, Serialize};

use crate::db::enums::Status;

pub mod action;

pub use action::{MenuAction, MenuActionResource};

/// A node of the navigation forest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Menu {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub parent_id: Option<String>,
    /// Slash-separated ancestor ids, outermost first. Empty for top-level menus.
    #[serde(default)]
    pub parent_path: String,
    #[serde(default)]
    pub sequence: i32,
    #[serde(default)]
    pub status: Status,
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub router: String,
}

impl Menu {
    /// Ancestor ids of this menu, outermost first.
    ///
    /// Uses `parent_path` when present and always includes `parent_id`.
    #[must_use]
    pub fn ancestor_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self
            .parent_path
            .split('/')
            .filter(|segment| !segment.is_empty())
            .collect();
        if let Some(parent_id) = self.parent_id.as_deref()
            && !parent_id.is_empty()
            && !ids.contains(&parent_id)
        {
            ids.push(parent_id);
        }
        ids
    }

    /// Number of ancestors above this menu.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.ancestor_ids().len()
    }
}
