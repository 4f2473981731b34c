use salvo::http::header::REFERER;
use salvo::http::{Method, StatusCode};

use gatehouse_test::{ROOT_PASSWORD, TestApp};

#[test_log::test(tokio::test)]
async fn healthcheck_answers_ok() {
    let app = TestApp::start().await;
    let response = app
        .call(Method::GET, "/api/healthcheck")
        .send()
        .await
        .assert_status(StatusCode::OK);
    assert_eq!(response.body, "OK");
}

#[test_log::test(tokio::test)]
async fn login_returns_profile_and_bearer_token() {
    let app = TestApp::start().await;
    let response = app
        .login_response("alice", "alice-pw")
        .await
        .assert_status(StatusCode::OK);

    assert_eq!(response.body["profile"]["user_name"], "alice");
    assert_eq!(response.body["profile"]["tenant_id"], "acme");
    assert_eq!(response.body["profile"]["is_root"], false);
    assert_eq!(response.body["token"]["token_type"], "Bearer");
    assert!(response.body["profile"].get("password_hash").is_none());
}

#[test_log::test(tokio::test)]
async fn unknown_user_and_wrong_password_are_indistinguishable() {
    let app = TestApp::start().await;
    let unknown = app
        .login_response("mallory", "whatever")
        .await
        .assert_status(StatusCode::BAD_REQUEST);
    let wrong = app
        .login_response("alice", "not-alice-pw")
        .await
        .assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(unknown.body, wrong.body);
    assert_eq!(unknown.error_code(), "invalid_credentials");
}

#[test_log::test(tokio::test)]
async fn disabled_user_cannot_log_in() {
    let app = TestApp::start().await;
    let response = app
        .login_response("carol", "carol-pw")
        .await
        .assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(response.error_code(), "user_disabled");
}

#[test_log::test(tokio::test)]
async fn root_login_is_placed_in_root_tenant() {
    let app = TestApp::start().await;
    let response = app
        .login_response("root", ROOT_PASSWORD)
        .await
        .assert_status(StatusCode::OK);
    assert_eq!(response.body["profile"]["is_root"], true);
    assert_eq!(response.body["profile"]["tenant_id"], "root");
}

#[test_log::test(tokio::test)]
async fn root_login_from_sign_in_page_is_refused() {
    let app = TestApp::start().await;
    let response = app
        .call(Method::POST, "/api/v1/pub/login")
        .header(REFERER, "https://console.gatehouse.test/Sessions/SignIn")
        .json(&serde_json::json!({ "user_name": "root", "password": ROOT_PASSWORD }))
        .send()
        .await
        .assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(response.error_code(), "invalid_credentials");
}

#[test_log::test(tokio::test)]
async fn malformed_login_body_is_a_bad_request() {
    let app = TestApp::start().await;
    let response = app
        .call(Method::POST, "/api/v1/pub/login")
        .json(&serde_json::json!({ "user": "alice" }))
        .send()
        .await
        .assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(response.error_code(), "bad_request");
}

#[test_log::test(tokio::test)]
async fn logout_revokes_the_token_and_is_idempotent() {
    let app = TestApp::start().await;
    let token = app.login("alice", "alice-pw").await;

    app.call(Method::GET, "/api/v1/pub/current/user")
        .bearer(&token)
        .send()
        .await
        .assert_status(StatusCode::OK);

    for _ in 0..2 {
        let response = app
            .call(Method::POST, "/api/v1/pub/login/exit")
            .bearer(&token)
            .send()
            .await
            .assert_status(StatusCode::OK);
        assert_eq!(response.body["status"], "OK");
    }

    let response = app
        .call(Method::GET, "/api/v1/pub/current/user")
        .bearer(&token)
        .send()
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
    assert_eq!(response.error_code(), "invalid_token");
}

#[test_log::test(tokio::test)]
async fn logout_with_garbage_token_still_succeeds() {
    let app = TestApp::start().await;
    app.call(Method::POST, "/api/v1/pub/login/exit")
        .bearer("not-a-token")
        .send()
        .await
        .assert_status(StatusCode::OK);
}

#[test_log::test(tokio::test)]
async fn refresh_issues_an_independent_token() {
    let app = TestApp::start().await;
    let token = app.login("bob", "bob-pw").await;

    let response = app
        .call(Method::POST, "/api/v1/pub/refresh-token")
        .bearer(&token)
        .send()
        .await
        .assert_status(StatusCode::OK);
    let refreshed = response.body["access_token"]
        .as_str()
        .unwrap_or_default()
        .to_string();
    assert!(!refreshed.is_empty());
    assert_ne!(refreshed, token);

    app.call(Method::POST, "/api/v1/pub/login/exit")
        .bearer(&token)
        .send()
        .await
        .assert_status(StatusCode::OK);
    app.call(Method::GET, "/api/v1/pub/current/user")
        .bearer(&refreshed)
        .send()
        .await
        .assert_status(StatusCode::OK);
}

#[test_log::test(tokio::test)]
async fn token_is_accepted_from_query_parameter() {
    let app = TestApp::start().await;
    let token = app.login("bob", "bob-pw").await;
    let response = app
        .call(
            Method::GET,
            &format!("/api/v1/pub/current/user?access_token={token}"),
        )
        .send()
        .await
        .assert_status(StatusCode::OK);
    assert_eq!(response.body["user_name"], "bob");
}

#[test_log::test(tokio::test)]
async fn missing_or_forged_tokens_are_unauthorized() {
    let app = TestApp::start().await;
    app.call(Method::GET, "/api/v1/pub/current/user")
        .send()
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
    app.call(Method::GET, "/api/v1/pub/current/menutree")
        .bearer("eyJhbGciOiJIUzUxMiJ9.e30.forged")
        .send()
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
}
