//! Resolution of the menu forest a subject may see.
//!
//! Grants are flat `(role, menu, action)` rows. A role can be given a leaf without the section
//! that contains it, so after collecting the granted menus the resolver pulls in every missing
//! ancestor (whatever its status) to keep the tree navigable. Those repaired ancestors carry no
//! actions of their own.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::Serialize;

use gatehouse_db::db::enums::Status;
use gatehouse_db::db::store::{
    CredentialStore, MenuActionFilter, MenuFilter, PermissionStore, RoleFilter, RoleMenuFilter,
    UserRoleFilter,
};
use gatehouse_db::model::menu::{Menu, MenuAction};
use gatehouse_db::model::role::role_menu;
use gatehouse_db::model::user::user_role;

use super::subject::Subject;
use crate::error::{ServiceError, ServiceResult};

/// A menu with its visible actions and children.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MenuNode {
    #[serde(flatten)]
    pub menu: Menu,
    pub actions: Vec<MenuAction>,
    pub children: Vec<MenuNode>,
}

pub struct MenuTreeResolver {
    credentials: Arc<dyn CredentialStore>,
    permissions: Arc<dyn PermissionStore>,
    owner_role_id: String,
}

impl MenuTreeResolver {
    #[must_use]
    pub fn new(
        credentials: Arc<dyn CredentialStore>,
        permissions: Arc<dyn PermissionStore>,
        owner_role_id: impl Into<String>,
    ) -> Self {
        Self {
            credentials,
            permissions,
            owner_role_id: owner_role_id.into(),
        }
    }

    /// ## Summary
    /// Computes the menu forest visible to `subject`.
    ///
    /// Root sees every enabled menu with all of its actions. A registered user sees the enabled
    /// menus granted to their enabled roles, the ancestors needed to reach them, and only the
    /// actions explicitly granted.
    ///
    /// ## Errors
    /// - `NoPerm` if the user holds no role, the roles grant no menu, or every granted menu is
    ///   disabled.
    /// - `InternalServer` if a store read fails.
    #[tracing::instrument(skip(self), fields(subject = %subject))]
    pub async fn query_user_menu_tree(&self, subject: &Subject) -> ServiceResult<Vec<MenuNode>> {
        match subject {
            Subject::Root => self.root_menu_tree().await,
            Subject::User(user_id) => self.user_menu_tree(user_id).await,
        }
    }

    async fn root_menu_tree(&self) -> ServiceResult<Vec<MenuNode>> {
        let menus = self
            .permissions
            .query_menus(MenuFilter {
                status: Some(Status::Enabled),
                ..MenuFilter::default()
            })
            .await?;
        let actions = self
            .permissions
            .query_menu_actions(MenuActionFilter::default())
            .await?;
        Ok(build_forest(menus, actions))
    }

    async fn user_menu_tree(&self, user_id: &str) -> ServiceResult<Vec<MenuNode>> {
        let assignments = self
            .credentials
            .query_user_roles(UserRoleFilter::by_user(user_id))
            .await?;
        let role_ids = self.enabled_role_ids(user_role::role_ids(&assignments)).await?;
        if role_ids.is_empty() {
            tracing::debug!("User holds no enabled role");
            return Err(ServiceError::NoPerm);
        }

        let grants = self
            .permissions
            .query_role_menus(RoleMenuFilter {
                role_ids: Some(role_ids),
            })
            .await?;
        if grants.is_empty() {
            tracing::debug!("Roles grant no menu");
            return Err(ServiceError::NoPerm);
        }

        let mut menus = self
            .permissions
            .query_menus(MenuFilter {
                ids: Some(role_menu::menu_ids(&grants)),
                status: Some(Status::Enabled),
            })
            .await?;
        if menus.is_empty() {
            tracing::debug!("Every granted menu is disabled");
            return Err(ServiceError::NoPerm);
        }

        self.repair_ancestors(&mut menus).await?;

        let actions = self
            .permissions
            .query_menu_actions(MenuActionFilter {
                ids: Some(role_menu::action_ids(&grants)),
                ..MenuActionFilter::default()
            })
            .await?;
        Ok(build_forest(menus, actions))
    }

    /// Keeps the roles that are enabled. The tenant owner role counts as enabled without a row.
    async fn enabled_role_ids(&self, role_ids: Vec<String>) -> ServiceResult<Vec<String>> {
        if role_ids.is_empty() {
            return Ok(role_ids);
        }
        let enabled: HashSet<String> = self
            .permissions
            .query_roles(RoleFilter {
                ids: Some(role_ids.clone()),
                status: Some(Status::Enabled),
            })
            .await?
            .into_iter()
            .map(|role| role.id)
            .collect();
        Ok(role_ids
            .into_iter()
            .filter(|id| *id == self.owner_role_id || enabled.contains(id))
            .collect())
    }

    /// Fetches every ancestor referenced by `menus` but absent from it, regardless of status.
    async fn repair_ancestors(&self, menus: &mut Vec<Menu>) -> ServiceResult<()> {
        let mut requested: HashSet<String> = HashSet::new();
        loop {
            let present: HashSet<&str> = menus.iter().map(|m| m.id.as_str()).collect();
            let missing: Vec<String> = menus
                .iter()
                .flat_map(Menu::ancestor_ids)
                .filter(|id| !present.contains(id) && !requested.contains(*id))
                .map(str::to_string)
                .collect::<HashSet<_>>()
                .into_iter()
                .collect();
            if missing.is_empty() {
                return Ok(());
            }

            tracing::debug!(missing = missing.len(), "Fetching ungranted ancestor menus");
            requested.extend(missing.iter().cloned());
            let ancestors = self
                .permissions
                .query_menus(MenuFilter {
                    ids: Some(missing),
                    ..MenuFilter::default()
                })
                .await?;
            if ancestors.is_empty() {
                return Ok(());
            }
            menus.extend(ancestors);
        }
    }
}

/// Total order used at every level: outer nodes first, then `sequence` descending, then id.
fn sort_menus(menus: &mut [Menu]) {
    menus.sort_by(|a, b| {
        a.depth()
            .cmp(&b.depth())
            .then_with(|| b.sequence.cmp(&a.sequence))
            .then_with(|| a.id.cmp(&b.id))
    });
}

fn immediate_parent(menu: &Menu) -> Option<&str> {
    menu.parent_id
        .as_deref()
        .filter(|id| !id.is_empty())
        .or_else(|| menu.ancestor_ids().last().copied())
        .filter(|id| *id != menu.id)
}

/// ## Summary
/// Folds a flat parent-pointer list into a forest.
///
/// Actions are attached to their owning menu; actions of menus outside the list are dropped.
/// Nodes whose parent is not in the list become roots.
#[must_use]
pub fn build_forest(mut menus: Vec<Menu>, actions: Vec<MenuAction>) -> Vec<MenuNode> {
    sort_menus(&mut menus);
    menus.dedup_by(|a, b| a.id == b.id);

    let mut actions_by_menu: HashMap<String, Vec<MenuAction>> = HashMap::new();
    for action in actions {
        actions_by_menu
            .entry(action.menu_id.clone())
            .or_default()
            .push(action);
    }

    let index: HashMap<&str, usize> = menus
        .iter()
        .enumerate()
        .map(|(i, m)| (m.id.as_str(), i))
        .collect();

    let mut children: Vec<Vec<usize>> = vec![Vec::new(); menus.len()];
    let mut roots = Vec::new();
    for (i, menu) in menus.iter().enumerate() {
        match immediate_parent(menu).and_then(|pid| index.get(pid)) {
            Some(&parent) => children[parent].push(i),
            None => roots.push(i),
        }
    }

    let mut arena: Vec<Option<Menu>> = menus.into_iter().map(Some).collect();
    roots
        .into_iter()
        .filter_map(|root| assemble(root, &mut arena, &children, &mut actions_by_menu))
        .collect()
}

fn assemble(
    idx: usize,
    arena: &mut [Option<Menu>],
    children: &[Vec<usize>],
    actions_by_menu: &mut HashMap<String, Vec<MenuAction>>,
) -> Option<MenuNode> {
    let menu = arena.get_mut(idx)?.take()?;
    let actions = actions_by_menu.remove(&menu.id).unwrap_or_default();
    let children = children[idx]
        .iter()
        .filter_map(|&child| assemble(child, arena, children, actions_by_menu))
        .collect();
    Some(MenuNode {
        menu,
        actions,
        children,
    })
}
