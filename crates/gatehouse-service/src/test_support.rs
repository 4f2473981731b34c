//! Fixtures shared by the unit tests of this crate.

use std::sync::Arc;

use chrono::Utc;
use gatehouse_core::config::Settings;
use gatehouse_db::db::enums::Status;
use gatehouse_db::db::{MemoryStore, Seed};
use gatehouse_db::model::menu::{Menu, MenuAction, MenuActionResource};
use gatehouse_db::model::role::{Role, RoleMenu};
use gatehouse_db::model::tenant::Tenant;
use gatehouse_db::model::user::{User, UserRole};

use crate::auth::password::hash_password;

pub const OWNER_ROLE: &str = "tenant-owner";

pub fn settings() -> Settings {
    Settings::from_toml_str(
        r#"
        [root]
        password = "root-secret"

        [tenant_owner_role]
        id = "tenant-owner"

        [auth]
        signing_key = "unit-test-key"
        signing_method = "hs256"
        expired = 3600
        request_timeout_ms = 2000

        [mail]
        from = "noreply@example.com"
        reset_url = "https://admin.example.com/reset-password"
        "#,
    )
    .unwrap()
}

pub fn tenant(id: &str) -> Tenant {
    Tenant {
        id: id.to_string(),
        name: format!("Tenant {id}"),
        status: Status::Enabled,
        created_at: Utc::now(),
    }
}

pub fn user(id: &str, user_name: &str, password: &str, tenant_id: &str) -> User {
    User {
        id: id.to_string(),
        user_name: user_name.to_string(),
        real_name: user_name.to_uppercase(),
        password_hash: hash_password(password).unwrap(),
        email: format!("{user_name}@example.com"),
        phone: String::new(),
        status: Status::Enabled,
        tenant_id: tenant_id.to_string(),
        created_at: Utc::now(),
        creator: String::new(),
    }
}

pub fn role(id: &str, sequence: i32) -> Role {
    Role {
        id: id.to_string(),
        name: format!("Role {id}"),
        sequence,
        status: Status::Enabled,
        role_type: String::new(),
        memo: String::new(),
    }
}

pub fn user_role(user_id: &str, role_id: &str) -> UserRole {
    UserRole {
        id: format!("{user_id}-{role_id}"),
        user_id: user_id.to_string(),
        role_id: role_id.to_string(),
    }
}

pub fn menu(id: &str, parent_path: &[&str], sequence: i32) -> Menu {
    Menu {
        id: id.to_string(),
        name: format!("Menu {id}"),
        parent_id: parent_path.last().map(|p| (*p).to_string()),
        parent_path: parent_path.join("/"),
        sequence,
        status: Status::Enabled,
        icon: String::new(),
        router: format!("/{id}"),
    }
}

pub fn action(id: &str, menu_id: &str, method: &str, path: &str) -> MenuAction {
    MenuAction {
        id: id.to_string(),
        menu_id: menu_id.to_string(),
        code: id.to_string(),
        name: id.to_string(),
        resources: vec![MenuActionResource {
            method: method.to_string(),
            path: path.to_string(),
        }],
    }
}

pub fn grant(role_id: &str, menu_id: &str, action_id: Option<&str>) -> RoleMenu {
    RoleMenu {
        id: format!("{role_id}-{menu_id}-{}", action_id.unwrap_or("-")),
        role_id: role_id.to_string(),
        menu_id: menu_id.to_string(),
        action_id: action_id.map(str::to_string),
    }
}

/// Tenant `t1`, user `alice` (password `alice-pw`) holding `R1`, which is granted leaf `M2`
/// under section `M1` together with action `A2`. `M3` is a sibling section nobody is granted.
pub fn alice_seed() -> Seed {
    Seed {
        tenants: vec![tenant("t1")],
        users: vec![user("alice", "alice", "alice-pw", "t1")],
        user_roles: vec![user_role("alice", "R1")],
        roles: vec![role("R1", 10)],
        menus: vec![menu("M1", &[], 5), menu("M2", &["M1"], 3), menu("M3", &[], 1)],
        menu_actions: vec![
            action("A2", "M2", "GET", "/api/v1/articles"),
            action("A2-del", "M2", "DELETE", "/api/v1/articles/:id"),
            action("A3", "M3", "GET", "/api/v1/reports"),
        ],
        role_menus: vec![grant("R1", "M2", Some("A2"))],
    }
}

pub async fn store_from(seed: Seed) -> Arc<MemoryStore> {
    Arc::new(MemoryStore::seeded(seed).await.unwrap())
}
