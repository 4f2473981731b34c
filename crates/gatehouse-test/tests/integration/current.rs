use salvo::http::{Method, StatusCode};
use serde_json::Value;

use gatehouse_test::{ROOT_PASSWORD, TestApp};

fn ids(nodes: &Value) -> Vec<&str> {
    nodes
        .as_array()
        .map(|nodes| nodes.iter().filter_map(|n| n["id"].as_str()).collect())
        .unwrap_or_default()
}

#[test_log::test(tokio::test)]
async fn current_user_lists_enabled_roles() {
    let app = TestApp::start().await;
    let token = app.login("alice", "alice-pw").await;
    let response = app
        .call(Method::GET, "/api/v1/pub/current/user")
        .bearer(&token)
        .send()
        .await
        .assert_status(StatusCode::OK);

    assert_eq!(response.body["user_id"], "alice");
    assert_eq!(response.body["is_admin"], false);
    assert_eq!(response.body["tenant"]["id"], "acme");
    assert_eq!(ids(&response.body["roles"]), vec!["user-admins"]);
}

#[test_log::test(tokio::test)]
async fn menu_tree_repairs_ancestors_and_limits_actions() {
    let app = TestApp::start().await;
    let token = app.login("alice", "alice-pw").await;
    let response = app
        .call(Method::GET, "/api/v1/pub/current/menutree")
        .bearer(&token)
        .send()
        .await
        .assert_status(StatusCode::OK);

    assert_eq!(ids(&response.body), vec!["sys"]);
    let sys = &response.body[0];
    assert_eq!(ids(&sys["actions"]), Vec::<&str>::new());
    assert_eq!(ids(&sys["children"]), vec!["sys-users"]);
    let mut actions = ids(&sys["children"][0]["actions"]);
    actions.sort_unstable();
    assert_eq!(
        actions,
        vec![
            "users-create",
            "users-delete",
            "users-disable",
            "users-enable",
            "users-update"
        ]
    );
}

#[test_log::test(tokio::test)]
async fn root_menu_tree_contains_every_menu() {
    let app = TestApp::start().await;
    let token = app.login("root", ROOT_PASSWORD).await;
    let response = app
        .call(Method::GET, "/api/v1/pub/current/menutree")
        .bearer(&token)
        .send()
        .await
        .assert_status(StatusCode::OK);
    assert_eq!(ids(&response.body), vec!["sys", "reports"]);
}

#[test_log::test(tokio::test)]
async fn password_change_requires_the_old_password() {
    let app = TestApp::start().await;
    let token = app.login("bob", "bob-pw").await;

    let response = app
        .call(Method::PUT, "/api/v1/pub/current/password")
        .bearer(&token)
        .json(&serde_json::json!({ "old_password": "nope", "new_password": "bob-pw-2" }))
        .send()
        .await
        .assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(response.error_code(), "bad_request");

    app.call(Method::PUT, "/api/v1/pub/current/password")
        .bearer(&token)
        .json(&serde_json::json!({ "old_password": "bob-pw", "new_password": "bob-pw-2" }))
        .send()
        .await
        .assert_status(StatusCode::OK);

    app.login_response("bob", "bob-pw")
        .await
        .assert_status(StatusCode::BAD_REQUEST);
    app.login_response("bob", "bob-pw-2")
        .await
        .assert_status(StatusCode::OK);
}

#[test_log::test(tokio::test)]
async fn root_password_cannot_be_changed() {
    let app = TestApp::start().await;
    let token = app.login("root", ROOT_PASSWORD).await;
    app.call(Method::PUT, "/api/v1/pub/current/password")
        .bearer(&token)
        .json(&serde_json::json!({ "old_password": ROOT_PASSWORD, "new_password": "x" }))
        .send()
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

#[test_log::test(tokio::test)]
async fn reset_mail_goes_to_known_addresses_only() {
    let mut app = TestApp::start().await;

    app.call(Method::POST, "/api/v1/pub/reset-password")
        .json(&serde_json::json!({ "email": "nobody@gatehouse.test" }))
        .send()
        .await
        .assert_status(StatusCode::OK);
    assert!(app.mail.try_recv().is_err());

    app.call(Method::POST, "/api/v1/pub/reset-password")
        .json(&serde_json::json!({ "email": "alice@gatehouse.test" }))
        .send()
        .await
        .assert_status(StatusCode::OK);
    let message = app.mail.try_recv().expect("a reset mail should be queued");
    assert_eq!(message.to, "alice@gatehouse.test");
    assert!(
        message
            .html_body
            .contains("https://console.gatehouse.test/reset?username=alice")
    );
}
