use tokio::sync::mpsc::UnboundedReceiver;

use super::*;
use crate::auth::token_store::MemoryTokenStore;
use crate::mail::ChannelMailer;
use crate::test_support::{OWNER_ROLE, alice_seed, settings, store_from, user, user_role};
use gatehouse_db::db::store::{MenuActionFilter, MenuFilter, RoleMenuFilter};
use gatehouse_db::db::{MemoryStore, Seed};
use gatehouse_db::error::{DbError, DbResult};
use gatehouse_db::model::menu::{Menu, MenuAction};
use gatehouse_db::model::role::RoleMenu;

struct Fixture {
    verifier: LoginVerifier,
    store: Arc<MemoryStore>,
    mail: UnboundedReceiver<MailMessage>,
}

async fn fixture(seed: Seed) -> Fixture {
    let settings = settings();
    let store = store_from(seed).await;
    let tokens = Arc::new(TokenAuthenticator::new(
        &settings.auth,
        Arc::new(MemoryTokenStore::new()),
    ));
    let (mailer, mail) = ChannelMailer::channel();
    let verifier = LoginVerifier::new(
        &settings,
        store.clone(),
        store.clone(),
        tokens,
        Arc::new(mailer),
    );
    Fixture {
        verifier,
        store,
        mail,
    }
}

#[test_log::test(tokio::test)]
async fn root_login_from_normal_referer_gets_fixed_tenant() {
    let f = fixture(Seed::default()).await;
    let verified = f
        .verifier
        .verify("root", "root-secret", "https://admin.example.com/dashboard")
        .await
        .unwrap();
    assert_eq!(verified.subject, Subject::Root);
    assert_eq!(verified.tenant_id, "root");
    assert_eq!(verified.user_id, "root");
}

#[test_log::test(tokio::test)]
async fn root_login_from_sign_in_page_is_refused() {
    let f = fixture(Seed::default()).await;
    let result = f
        .verifier
        .verify("root", "root-secret", "https://admin.example.com/Sessions/SignIn")
        .await;
    assert!(matches!(result, Err(ServiceError::InvalidUserName)));
}

#[test_log::test(tokio::test)]
async fn root_with_wrong_password_is_not_root() {
    let f = fixture(Seed::default()).await;
    let result = f.verifier.verify("root", "nope", "").await;
    assert!(matches!(result, Err(ServiceError::InvalidUserName)));
}

#[test_log::test(tokio::test)]
async fn regular_user_verification_outcomes() {
    let mut seed = alice_seed();
    let mut bob = user("bob", "bob", "bob-pw", "t1");
    bob.status = Status::Disabled;
    seed.users.push(bob);
    let f = fixture(seed).await;

    let alice = f.verifier.verify("alice", "alice-pw", "").await.unwrap();
    assert_eq!(alice.subject, Subject::User("alice".to_string()));
    assert_eq!(alice.tenant_id, "t1");

    assert!(matches!(
        f.verifier.verify("nobody", "x", "").await,
        Err(ServiceError::InvalidUserName)
    ));
    assert!(matches!(
        f.verifier.verify("alice", "wrong", "").await,
        Err(ServiceError::InvalidPassword)
    ));
    assert!(matches!(
        f.verifier.verify("bob", "bob-pw", "").await,
        Err(ServiceError::UserDisable)
    ));
}

#[test_log::test(tokio::test)]
async fn login_issues_token_that_authenticates_and_logout_revokes_it() {
    let f = fixture(alice_seed()).await;
    let (profile, token) = f.verifier.login("alice", "alice-pw", "").await.unwrap();
    assert_eq!(profile.user_name, "alice");
    assert!(!profile.is_admin);

    let identity = f.verifier.authenticate(&token.access_token).await.unwrap();
    assert_eq!(identity.user_id, "alice");
    assert_eq!(identity.tenant_id, "t1");

    f.verifier.destroy_token(&token.access_token).await.unwrap();
    assert!(matches!(
        f.verifier.authenticate(&token.access_token).await,
        Err(ServiceError::InvalidToken)
    ));
}

#[test_log::test(tokio::test)]
async fn refresh_issues_a_distinct_token() {
    let f = fixture(alice_seed()).await;
    let (_, token) = f.verifier.login("alice", "alice-pw", "").await.unwrap();
    let identity = f.verifier.authenticate(&token.access_token).await.unwrap();

    let refreshed = f.verifier.refresh_token(&identity).await.unwrap();
    assert_ne!(refreshed.access_token, token.access_token);
    assert_eq!(
        f.verifier.authenticate(&refreshed.access_token).await.unwrap(),
        identity
    );
    // the old token is not chained to the new one
    assert!(f.verifier.authenticate(&token.access_token).await.is_ok());
}

#[test_log::test(tokio::test)]
async fn owner_role_marks_user_as_admin() {
    let mut seed = alice_seed();
    seed.user_roles.push(user_role("alice", OWNER_ROLE));
    let f = fixture(seed).await;

    let profile = f.verifier.login_info("alice").await.unwrap();
    assert!(profile.is_admin);
    assert!(!profile.is_root);
    assert_eq!(profile.tenant.map(|t| t.id).as_deref(), Some("t1"));
    // the owner role has no row; only R1 is listed
    assert_eq!(
        profile.roles.iter().map(|r| r.id.as_str()).collect::<Vec<_>>(),
        vec!["R1"]
    );
}

#[test_log::test(tokio::test)]
async fn root_profile_is_synthesized() {
    let f = fixture(Seed::default()).await;
    let profile = f.verifier.login_info("root").await.unwrap();
    assert!(profile.is_root);
    assert_eq!(profile.real_name, "Root");
    assert_eq!(profile.tenant_id, "root");
}

#[test_log::test(tokio::test)]
async fn update_password_requires_old_password() {
    let f = fixture(alice_seed()).await;

    let wrong = f
        .verifier
        .update_password("alice", "not-it", "new-pw")
        .await;
    assert!(matches!(wrong, Err(ServiceError::BadRequest(msg)) if msg.contains("old password")));

    f.verifier
        .update_password("alice", "alice-pw", "new-pw")
        .await
        .unwrap();
    assert!(f.verifier.verify("alice", "new-pw", "").await.is_ok());
    assert!(matches!(
        f.verifier.verify("alice", "alice-pw", "").await,
        Err(ServiceError::InvalidPassword)
    ));
    let stored = f.store.get_user("alice").await.unwrap().unwrap();
    assert!(stored.password_hash.starts_with("$argon2"));
}

#[test_log::test(tokio::test)]
async fn root_password_cannot_be_updated() {
    let f = fixture(Seed::default()).await;
    let result = f
        .verifier
        .update_password("root", "root-secret", "whatever")
        .await;
    assert!(matches!(result, Err(ServiceError::BadRequest(msg)) if msg.contains("root")));
}

#[test_log::test(tokio::test)]
async fn reset_mail_lists_every_matching_user() {
    let mut seed = alice_seed();
    let mut alt = user("alice2", "alice.alt", "pw", "t1");
    alt.email = "alice@example.com".to_string();
    seed.users.push(alt);
    let mut f = fixture(seed).await;

    f.verifier
        .send_reset_password_mail("alice@example.com")
        .await
        .unwrap();
    let message = f.mail.recv().await.unwrap();
    assert_eq!(message.to, "alice@example.com");
    assert_eq!(message.from, "noreply@example.com");
    assert!(message.html_body.contains("username=alice\""));
    assert!(message.html_body.contains("username=alice.alt\""));
}

#[test_log::test(tokio::test)]
async fn reset_mail_for_unknown_address_is_silent() {
    let mut f = fixture(alice_seed()).await;
    f.verifier
        .send_reset_password_mail("ghost@example.com")
        .await
        .unwrap();
    assert!(f.mail.try_recv().is_err());
}

/// Permission store whose role lookup is down.
struct RolesUnavailable;

#[async_trait::async_trait]
impl PermissionStore for RolesUnavailable {
    async fn query_roles(&self, _filter: RoleFilter) -> DbResult<Vec<Role>> {
        Err(DbError::Unavailable("roles table offline".to_string()))
    }

    async fn query_menus(&self, _filter: MenuFilter) -> DbResult<Vec<Menu>> {
        Ok(Vec::new())
    }

    async fn query_menu_actions(&self, _filter: MenuActionFilter) -> DbResult<Vec<MenuAction>> {
        Ok(Vec::new())
    }

    async fn query_role_menus(&self, _filter: RoleMenuFilter) -> DbResult<Vec<RoleMenu>> {
        Ok(Vec::new())
    }
}

#[test_log::test(tokio::test)]
async fn failed_profile_leaves_no_token_behind() {
    let settings = settings();
    let store = store_from(alice_seed()).await;
    let token_store = Arc::new(MemoryTokenStore::new());
    let tokens = Arc::new(TokenAuthenticator::new(&settings.auth, token_store.clone()));
    let (mailer, _mail) = ChannelMailer::channel();
    let verifier = LoginVerifier::new(
        &settings,
        store,
        Arc::new(RolesUnavailable),
        tokens,
        Arc::new(mailer),
    );

    let result = verifier.login("alice", "alice-pw", "").await;
    assert!(matches!(result, Err(ServiceError::InternalServer(_))));
    assert!(token_store.is_empty());
}

#[test_log::test(tokio::test)]
async fn reset_mail_encodes_the_link_and_escapes_the_name() {
    let mut seed = alice_seed();
    let mut odd = user("odd", "o&d <b>", "pw", "t1");
    odd.email = "odd@example.com".to_string();
    seed.users.push(odd);
    let mut f = fixture(seed).await;

    f.verifier
        .send_reset_password_mail("odd@example.com")
        .await
        .unwrap();
    let body = f.mail.recv().await.unwrap().html_body;
    assert!(body.contains(r#"href="https://admin.example.com/reset-password?username=o%26d+%3Cb%3E""#));
    assert!(body.contains("Change for user o&amp;d &lt;b&gt;."));
    assert!(!body.contains("<b>"));
}
