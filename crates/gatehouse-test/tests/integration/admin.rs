use salvo::http::{Method, StatusCode};
use serde_json::json;

use gatehouse_test::{
    OWNER_ROLE, ROOT_PASSWORD, TestApp, acme_and_globex_seed, acme_seed, test_settings,
};

fn new_user(user_name: &str) -> serde_json::Value {
    json!({
        "user_name": user_name,
        "real_name": "New Hire",
        "password": "hire-pw",
        "email": format!("{user_name}@gatehouse.test"),
        "tenant_id": "elsewhere",
        "role_ids": ["readers"],
    })
}

#[test_log::test(tokio::test)]
async fn granted_user_can_create_users_in_own_tenant() {
    let app = TestApp::start().await;
    let token = app.login("alice", "alice-pw").await;

    let response = app
        .call(Method::POST, "/api/v1/users")
        .bearer(&token)
        .json(&new_user("dave"))
        .send()
        .await
        .assert_status(StatusCode::CREATED);
    assert_eq!(response.body["tenant_id"], "acme");
    assert_eq!(response.body["creator"], "alice");
    assert!(response.body.get("password_hash").is_none());

    app.login_response("dave", "hire-pw")
        .await
        .assert_status(StatusCode::OK);
}

#[test_log::test(tokio::test)]
async fn ungranted_user_is_forbidden() {
    let app = TestApp::start().await;
    let token = app.login("bob", "bob-pw").await;
    let response = app
        .call(Method::POST, "/api/v1/users")
        .bearer(&token)
        .json(&new_user("eve"))
        .send()
        .await
        .assert_status(StatusCode::FORBIDDEN);
    assert_eq!(response.error_code(), "no_permission");
}

#[test_log::test(tokio::test)]
async fn admin_routes_require_a_token_before_policy() {
    let app = TestApp::start().await;
    app.call(Method::POST, "/api/v1/users")
        .json(&new_user("eve"))
        .send()
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
}

#[test_log::test(tokio::test)]
async fn root_bypasses_policy_and_picks_the_tenant() {
    let app = TestApp::start().await;
    let token = app.login("root", ROOT_PASSWORD).await;
    let response = app
        .call(Method::POST, "/api/v1/users")
        .bearer(&token)
        .json(&new_user("frank"))
        .send()
        .await
        .assert_status(StatusCode::CREATED);
    assert_eq!(response.body["tenant_id"], "elsewhere");
}

#[test_log::test(tokio::test)]
async fn reserved_and_duplicate_user_names_are_rejected() {
    let app = TestApp::start().await;
    let token = app.login("alice", "alice-pw").await;
    for name in ["root", "bob"] {
        app.call(Method::POST, "/api/v1/users")
            .bearer(&token)
            .json(&new_user(name))
            .send()
            .await
            .assert_status(StatusCode::BAD_REQUEST);
    }
}

#[test_log::test(tokio::test)]
async fn disabling_a_user_revokes_their_grants_after_reload() {
    let app = TestApp::start().await;
    let alice = app.login("alice", "alice-pw").await;
    let root = app.login("root", ROOT_PASSWORD).await;

    app.call(Method::PATCH, "/api/v1/users/bob/enable")
        .bearer(&alice)
        .send()
        .await
        .assert_status(StatusCode::OK);

    app.call(Method::PATCH, "/api/v1/users/alice/disable")
        .bearer(&root)
        .send()
        .await
        .assert_status(StatusCode::OK);

    app.wait_for_status(StatusCode::FORBIDDEN, |app| {
        app.call(Method::PATCH, "/api/v1/users/bob/enable")
            .bearer(&alice)
    })
    .await;
    app.login_response("alice", "alice-pw")
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

#[test_log::test(tokio::test)]
async fn status_change_of_unknown_user_is_not_found() {
    let app = TestApp::start().await;
    let root = app.login("root", ROOT_PASSWORD).await;
    let response = app
        .call(Method::PATCH, "/api/v1/users/ghost/disable")
        .bearer(&root)
        .send()
        .await
        .assert_status(StatusCode::NOT_FOUND);
    assert_eq!(response.error_code(), "not_found");
}

#[test_log::test(tokio::test)]
async fn new_tenant_admin_holds_the_owner_role() {
    let app = TestApp::start().await;
    let root = app.login("root", ROOT_PASSWORD).await;

    let response = app
        .call(Method::POST, "/api/v1/tenants")
        .bearer(&root)
        .json(&json!({
            "name": "Globex",
            "admin_user_name": "hank",
            "admin_password": "hank-pw",
            "admin_email": "hank@globex.test",
        }))
        .send()
        .await
        .assert_status(StatusCode::CREATED);
    let tenant_id = response.body["id"].as_str().unwrap_or_default().to_string();

    let login = app
        .login_response("hank", "hank-pw")
        .await
        .assert_status(StatusCode::OK);
    assert_eq!(login.body["profile"]["is_admin"], true);
    assert_eq!(login.body["profile"]["tenant_id"], tenant_id.as_str());
    let hank = login.body["token"]["access_token"]
        .as_str()
        .unwrap_or_default()
        .to_string();

    app.wait_for_status(StatusCode::CREATED, |app| {
        app.call(Method::POST, "/api/v1/users")
            .bearer(&hank)
            .json(&json!({ "user_name": "globex-staff", "password": "pw" }))
    })
    .await;
}

#[test_log::test(tokio::test)]
async fn deleted_user_loses_access_to_profile() {
    let app = TestApp::start().await;
    let bob = app.login("bob", "bob-pw").await;
    let root = app.login("root", ROOT_PASSWORD).await;

    app.call(Method::DELETE, "/api/v1/users/bob")
        .bearer(&root)
        .send()
        .await
        .assert_status(StatusCode::OK);

    app.call(Method::GET, "/api/v1/pub/current/user")
        .bearer(&bob)
        .send()
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
}

#[test_log::test(tokio::test)]
async fn disabled_enforcement_lets_any_authenticated_user_through() {
    let mut settings = test_settings();
    settings.casbin.enable = false;
    let app = TestApp::with_settings(settings, acme_seed()).await;
    let bob = app.login("bob", "bob-pw").await;

    app.call(Method::POST, "/api/v1/users")
        .bearer(&bob)
        .json(&new_user("gina"))
        .send()
        .await
        .assert_status(StatusCode::CREATED);
    assert!(!app.services.gatekeeper.reloader().is_enabled());
}

#[test_log::test(tokio::test)]
async fn tenant_admin_cannot_manage_users_of_another_tenant() {
    let app = TestApp::with_settings(test_settings(), acme_and_globex_seed()).await;
    let alice = app.login("alice", "alice-pw").await;

    let response = app
        .call(Method::PATCH, "/api/v1/users/gary/disable")
        .bearer(&alice)
        .send()
        .await
        .assert_status(StatusCode::NOT_FOUND);
    assert_eq!(response.error_code(), "not_found");

    app.call(Method::PUT, "/api/v1/users/gary")
        .bearer(&alice)
        .json(&json!({
            "user_name": "gary",
            "password": "taken-over",
            "role_ids": [OWNER_ROLE],
        }))
        .send()
        .await
        .assert_status(StatusCode::NOT_FOUND);

    app.call(Method::DELETE, "/api/v1/users/gary")
        .bearer(&alice)
        .send()
        .await
        .assert_status(StatusCode::NOT_FOUND);

    app.login_response("gary", "gary-pw")
        .await
        .assert_status(StatusCode::OK);
}
