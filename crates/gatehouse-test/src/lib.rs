#![expect(
    clippy::expect_used,
    clippy::missing_panics_doc,
    reason = "fixture failures abort the test"
)]
//! Integration test support: a fully wired application over a seeded in-memory store,
//! driven through salvo's test client.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use salvo::http::header::{AUTHORIZATION, HeaderName};
use salvo::http::{Method, StatusCode};
use salvo::prelude::Service;
use salvo::test::{RequestBuilder, ResponseExt};
use serde_json::Value;
use tokio::sync::mpsc::UnboundedReceiver;

use gatehouse_app::app::router;
use gatehouse_core::config::Settings;
use gatehouse_db::db::enums::Status;
use gatehouse_db::db::{MemoryStore, Seed};
use gatehouse_db::model::menu::{Menu, MenuAction, MenuActionResource};
use gatehouse_db::model::role::{Role, RoleMenu};
use gatehouse_db::model::tenant::Tenant;
use gatehouse_db::model::user::{User, UserRole};
use gatehouse_service::auth::MemoryTokenStore;
use gatehouse_service::auth::password::hash_password;
use gatehouse_service::bootstrap::{Services, build_services};
use gatehouse_service::mail::{ChannelMailer, MailMessage};

pub const ROOT_PASSWORD: &str = "root-pw";
pub const OWNER_ROLE: &str = "tenant-owner";

#[must_use]
pub fn test_settings() -> Settings {
    Settings::from_toml_str(
        r#"
        [root]
        password = "root-pw"

        [auth]
        signing_key = "integration-signing-key"
        expired = 600

        [mail]
        from = "noreply@gatehouse.test"
        reset_url = "https://console.gatehouse.test/reset"
        "#,
    )
    .expect("test settings should load")
}

fn tenant(id: &str) -> Tenant {
    Tenant {
        id: id.to_string(),
        name: format!("Tenant {id}"),
        status: Status::Enabled,
        created_at: Utc::now(),
    }
}

fn user(id: &str, password: &str, tenant_id: &str, status: Status) -> User {
    User {
        id: id.to_string(),
        user_name: id.to_string(),
        real_name: id.to_uppercase(),
        password_hash: hash_password(password).expect("hashing should work"),
        email: format!("{id}@gatehouse.test"),
        phone: String::new(),
        status,
        tenant_id: tenant_id.to_string(),
        created_at: Utc::now(),
        creator: "root".to_string(),
    }
}

fn assign(user_id: &str, role_id: &str) -> UserRole {
    UserRole {
        id: format!("{user_id}:{role_id}"),
        user_id: user_id.to_string(),
        role_id: role_id.to_string(),
    }
}

fn role(id: &str, sequence: i32) -> Role {
    Role {
        id: id.to_string(),
        name: id.to_string(),
        sequence,
        status: Status::Enabled,
        role_type: String::new(),
        memo: String::new(),
    }
}

fn menu(id: &str, parent_path: &[&str], sequence: i32) -> Menu {
    Menu {
        id: id.to_string(),
        name: id.to_string(),
        parent_id: parent_path.last().map(|p| (*p).to_string()),
        parent_path: parent_path.join("/"),
        sequence,
        status: Status::Enabled,
        icon: String::new(),
        router: format!("/{id}"),
    }
}

fn action(id: &str, menu_id: &str, endpoints: &[(&str, &str)]) -> MenuAction {
    MenuAction {
        id: id.to_string(),
        menu_id: menu_id.to_string(),
        code: id.to_string(),
        name: id.to_string(),
        resources: endpoints
            .iter()
            .map(|(method, path)| MenuActionResource {
                method: (*method).to_string(),
                path: (*path).to_string(),
            })
            .collect(),
    }
}

fn grant(role_id: &str, menu_id: &str, action_id: &str) -> RoleMenu {
    RoleMenu {
        id: format!("{role_id}:{menu_id}:{action_id}"),
        role_id: role_id.to_string(),
        menu_id: menu_id.to_string(),
        action_id: Some(action_id.to_string()),
    }
}

/// ## Summary
/// Tenant `acme` with:
/// - `alice` (`alice-pw`) in `user-admins`, which may manage users through the
///   `sys/sys-users` menu;
/// - `bob` (`bob-pw`) in `readers`, which may view reports through the `reports` menu;
/// - `carol` (`carol-pw`), disabled.
///
/// The tenant owner role is granted every user-management action.
#[must_use]
pub fn acme_seed() -> Seed {
    let user_management = [
        ("users-create", "POST", "/api/v1/users"),
        ("users-enable", "PATCH", "/api/v1/users/:id/enable"),
        ("users-disable", "PATCH", "/api/v1/users/:id/disable"),
        ("users-update", "PUT", "/api/v1/users/:id"),
        ("users-delete", "DELETE", "/api/v1/users/:id"),
    ];

    let mut menu_actions: Vec<MenuAction> = user_management
        .iter()
        .map(|&(id, method, path)| action(id, "sys-users", &[(method, path)]))
        .collect();
    menu_actions.push(action("reports-view", "reports", &[("GET", "/api/v1/reports")]));

    let mut role_menus: Vec<RoleMenu> = user_management
        .iter()
        .flat_map(|&(id, _, _)| {
            [
                grant("user-admins", "sys-users", id),
                grant(OWNER_ROLE, "sys-users", id),
            ]
        })
        .collect();
    role_menus.push(grant("readers", "reports", "reports-view"));

    Seed {
        tenants: vec![tenant("acme")],
        users: vec![
            user("alice", "alice-pw", "acme", Status::Enabled),
            user("bob", "bob-pw", "acme", Status::Enabled),
            user("carol", "carol-pw", "acme", Status::Disabled),
        ],
        user_roles: vec![assign("alice", "user-admins"), assign("bob", "readers")],
        roles: vec![role("user-admins", 20), role("readers", 10)],
        menus: vec![
            menu("sys", &[], 50),
            menu("sys-users", &["sys"], 10),
            menu("reports", &[], 40),
        ],
        menu_actions,
        role_menus,
    }
}

/// [`acme_seed`] plus tenant `globex` with its user `gary` (`gary-pw`).
#[must_use]
pub fn acme_and_globex_seed() -> Seed {
    let mut seed = acme_seed();
    seed.tenants.push(tenant("globex"));
    seed.users
        .push(user("gary", "gary-pw", "globex", Status::Enabled));
    seed
}

pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl TestResponse {
    #[must_use]
    pub fn assert_status(self, expected: StatusCode) -> Self {
        assert_eq!(
            self.status, expected,
            "Expected status {expected} but got {}: {}",
            self.status, self.body
        );
        self
    }

    /// The `error.code` of an error body.
    #[must_use]
    pub fn error_code(&self) -> &str {
        self.body["error"]["code"].as_str().unwrap_or_default()
    }
}

/// Request under construction against a [`TestApp`].
pub struct Call<'a> {
    app: &'a TestApp,
    builder: RequestBuilder,
}

impl Call<'_> {
    #[must_use]
    pub fn bearer(self, token: &str) -> Self {
        self.header(AUTHORIZATION, &format!("Bearer {token}"))
    }

    #[must_use]
    pub fn header(mut self, name: HeaderName, value: &str) -> Self {
        self.builder = self.builder.add_header(name, value, true);
        self
    }

    #[must_use]
    pub fn json(mut self, body: &Value) -> Self {
        self.builder = self.builder.json(body);
        self
    }

    pub async fn send(self) -> TestResponse {
        let mut response = self.builder.send(&self.app.service).await;
        let status = response
            .status_code
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let text = response.take_string().await.unwrap_or_default();
        let body = serde_json::from_str(&text).unwrap_or(Value::String(text));
        TestResponse { status, body }
    }
}

pub struct TestApp {
    pub service: Service,
    pub services: Services,
    pub store: Arc<MemoryStore>,
    pub mail: UnboundedReceiver<MailMessage>,
}

impl TestApp {
    pub async fn start() -> Self {
        Self::with_settings(test_settings(), acme_seed()).await
    }

    pub async fn with_settings(settings: Settings, seed: Seed) -> Self {
        let store = Arc::new(MemoryStore::seeded(seed).await.expect("seed should apply"));
        let (mailer, mail) = ChannelMailer::channel();
        let services = build_services(
            &settings,
            store.clone(),
            Arc::new(MemoryTokenStore::new()),
            Arc::new(mailer),
        )
        .await
        .expect("services should build");
        let service = Service::new(router(&services, settings.casbin.enable));
        Self {
            service,
            services,
            store,
            mail,
        }
    }

    #[must_use]
    pub fn call(&self, method: Method, path: &str) -> Call<'_> {
        let url = format!("http://127.0.0.1:5800{path}");
        Call {
            app: self,
            builder: RequestBuilder::new(&url, method),
        }
    }

    pub async fn login_response(&self, user_name: &str, password: &str) -> TestResponse {
        self.call(Method::POST, "/api/v1/pub/login")
            .json(&serde_json::json!({ "user_name": user_name, "password": password }))
            .send()
            .await
    }

    /// Logs in and returns the access token.
    pub async fn login(&self, user_name: &str, password: &str) -> String {
        let response = self
            .login_response(user_name, password)
            .await
            .assert_status(StatusCode::OK);
        response.body["token"]["access_token"]
            .as_str()
            .expect("login response carries a token")
            .to_string()
    }

    /// ## Summary
    /// Repeats the request built by `make` until it answers `expected`, failing the test after
    /// five seconds. Used where a policy reload has to land first.
    pub async fn wait_for_status<F>(&self, expected: StatusCode, mut make: F)
    where
        F: FnMut(&Self) -> Call<'_>,
    {
        tokio::time::timeout(Duration::from_secs(5), async {
            while make(self).send().await.status != expected {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("expected status should be reached within five seconds");
    }
}
