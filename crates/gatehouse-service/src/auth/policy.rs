//! Policy rows derived from role, menu and user data.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;

use gatehouse_db::db::enums::Status;
use gatehouse_db::db::store::{
    CredentialStore, MenuActionFilter, MenuFilter, PermissionStore, RoleFilter, RoleMenuFilter,
    TenantFilter, UserFilter, UserRoleFilter,
};
use gatehouse_db::model::role::role_menu;

use super::subject::{role_casbin_subject, user_casbin_subject};
use crate::error::ServiceResult;

/// Any tenant.
pub const ANY_DOMAIN: &str = "*";

/// `p, subject, domain, object, action`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PolicyRule {
    pub subject: String,
    pub domain: String,
    pub object: String,
    pub action: String,
}

/// `g, user, role, domain`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GroupingRule {
    pub user: String,
    pub role: String,
    pub domain: String,
}

/// A complete, deduplicated policy set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PolicySnapshot {
    pub policies: Vec<PolicyRule>,
    pub groupings: Vec<GroupingRule>,
}

impl PolicySnapshot {
    #[must_use]
    pub fn new(
        policies: impl IntoIterator<Item = PolicyRule>,
        groupings: impl IntoIterator<Item = GroupingRule>,
    ) -> Self {
        Self {
            policies: policies.into_iter().collect::<BTreeSet<_>>().into_iter().collect(),
            groupings: groupings.into_iter().collect::<BTreeSet<_>>().into_iter().collect(),
        }
    }

    #[must_use]
    pub fn policy_rows(&self) -> Vec<Vec<String>> {
        self.policies
            .iter()
            .map(|p| {
                vec![
                    p.subject.clone(),
                    p.domain.clone(),
                    p.object.clone(),
                    p.action.clone(),
                ]
            })
            .collect()
    }

    #[must_use]
    pub fn grouping_rows(&self) -> Vec<Vec<String>> {
        self.groupings
            .iter()
            .map(|g| vec![g.user.clone(), g.role.clone(), g.domain.clone()])
            .collect()
    }
}

/// Produces the current policy from authoritative data.
#[async_trait]
pub trait PolicySource: Send + Sync {
    /// ## Errors
    /// Returns `InternalServer` if the underlying data cannot be read.
    async fn snapshot(&self) -> ServiceResult<PolicySnapshot>;
}

/// Reads policy from the credential and permission stores.
///
/// - every resource of every action granted to an enabled role on an enabled menu becomes
///   `p, role:<role>, *, <path>, <method>`;
/// - every assignment of an enabled role to an enabled user of an enabled tenant becomes
///   `g, user:<user>, role:<role>, <tenant>`.
///
/// The tenant owner role counts as enabled whether or not it has a row.
pub struct StorePolicySource {
    credentials: Arc<dyn CredentialStore>,
    permissions: Arc<dyn PermissionStore>,
    owner_role_id: String,
}

impl StorePolicySource {
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

    async fn enabled_role_ids(&self) -> ServiceResult<HashSet<String>> {
        let mut ids: HashSet<String> = self
            .permissions
            .query_roles(RoleFilter {
                status: Some(Status::Enabled),
                ..RoleFilter::default()
            })
            .await?
            .into_iter()
            .map(|role| role.id)
            .collect();
        ids.insert(self.owner_role_id.clone());
        Ok(ids)
    }

    async fn policy_rules(&self, enabled_roles: &HashSet<String>) -> ServiceResult<Vec<PolicyRule>> {
        let grants: Vec<_> = self
            .permissions
            .query_role_menus(RoleMenuFilter {
                role_ids: Some(enabled_roles.iter().cloned().collect()),
            })
            .await?;

        let enabled_menus: HashSet<String> = self
            .permissions
            .query_menus(MenuFilter {
                ids: Some(role_menu::menu_ids(&grants)),
                status: Some(Status::Enabled),
            })
            .await?
            .into_iter()
            .map(|menu| menu.id)
            .collect();

        let actions: HashMap<String, _> = self
            .permissions
            .query_menu_actions(MenuActionFilter {
                ids: Some(role_menu::action_ids(&grants)),
                ..MenuActionFilter::default()
            })
            .await?
            .into_iter()
            .map(|action| (action.id.clone(), action))
            .collect();

        let mut rules = Vec::new();
        for grant in grants.iter().filter(|g| enabled_menus.contains(&g.menu_id)) {
            let Some(action) = grant.action_id.as_ref().and_then(|id| actions.get(id)) else {
                continue;
            };
            if action.menu_id != grant.menu_id {
                tracing::warn!(
                    role_id = %grant.role_id,
                    action_id = %action.id,
                    "Grant pairs an action with a menu it does not belong to; skipped"
                );
                continue;
            }
            rules.extend(action.resources.iter().map(|resource| PolicyRule {
                subject: role_casbin_subject(&grant.role_id),
                domain: ANY_DOMAIN.to_string(),
                object: resource.path.clone(),
                action: resource.method.to_uppercase(),
            }));
        }
        Ok(rules)
    }

    async fn grouping_rules(
        &self,
        enabled_roles: &HashSet<String>,
    ) -> ServiceResult<Vec<GroupingRule>> {
        let enabled_tenants: HashSet<String> = self
            .credentials
            .query_tenants(TenantFilter {
                status: Some(Status::Enabled),
                ..TenantFilter::default()
            })
            .await?
            .into_iter()
            .map(|tenant| tenant.id)
            .collect();

        let users: HashMap<String, String> = self
            .credentials
            .query_users(UserFilter {
                status: Some(Status::Enabled),
                ..UserFilter::default()
            })
            .await?
            .into_iter()
            .filter(|user| enabled_tenants.contains(&user.tenant_id))
            .map(|user| (user.id, user.tenant_id))
            .collect();

        let assignments = self
            .credentials
            .query_user_roles(UserRoleFilter::default())
            .await?;

        Ok(assignments
            .into_iter()
            .filter(|ur| enabled_roles.contains(&ur.role_id))
            .filter_map(|ur| {
                users.get(&ur.user_id).map(|tenant_id| GroupingRule {
                    user: user_casbin_subject(&ur.user_id),
                    role: role_casbin_subject(&ur.role_id),
                    domain: tenant_id.clone(),
                })
            })
            .collect())
    }
}

#[async_trait]
impl PolicySource for StorePolicySource {
    #[tracing::instrument(skip(self))]
    async fn snapshot(&self) -> ServiceResult<PolicySnapshot> {
        let enabled_roles = self.enabled_role_ids().await?;
        let policies = self.policy_rules(&enabled_roles).await?;
        let groupings = self.grouping_rules(&enabled_roles).await?;
        Ok(PolicySnapshot::new(policies, groupings))
    }
}
