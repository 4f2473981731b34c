//! Wires settings and stores into the services used by the HTTP layer.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use gatehouse_core::config::Settings;
use gatehouse_db::db::store::{CredentialStore, PermissionStore, TransactionRunner};

use crate::admin::{RoleService, TenantService, UserService};
use crate::auth::casbin::{AllowAllEnforcer, CasbinPolicyEnforcer, PolicyEnforcer};
use crate::auth::gatekeeper::Gatekeeper;
use crate::auth::login::LoginVerifier;
use crate::auth::menu_tree::MenuTreeResolver;
use crate::auth::policy::StorePolicySource;
use crate::auth::reload::{PolicyReloader, reload_policy};
use crate::auth::service::Authorizer;
use crate::auth::token::TokenAuthenticator;
use crate::auth::token_store::TokenStore;
use crate::error::ServiceResult;
use crate::mail::MailDispatcher;

/// Everything a request handler may need.
pub struct Services {
    pub gatekeeper: Arc<Gatekeeper>,
    pub users: Arc<UserService>,
    pub tenants: Arc<TenantService>,
    pub roles: Arc<RoleService>,
    pub enforcer: Arc<dyn PolicyEnforcer>,
    /// Present when casbin is enabled. The worker exits once every reloader clone is dropped.
    pub reload_worker: Option<JoinHandle<()>>,
}

async fn policy_enforcer<S>(
    settings: &Settings,
    store: &Arc<S>,
) -> ServiceResult<(Arc<dyn PolicyEnforcer>, PolicyReloader, Option<JoinHandle<()>>)>
where
    S: CredentialStore + PermissionStore + 'static,
{
    if !settings.casbin.enable {
        tracing::warn!("Casbin is disabled; every authenticated request is allowed");
        return Ok((Arc::new(AllowAllEnforcer), PolicyReloader::disabled(), None));
    }

    let enforcer: Arc<dyn PolicyEnforcer> = match &settings.casbin.model_file {
        Some(path) => Arc::new(CasbinPolicyEnforcer::from_model_file(path).await?),
        None => Arc::new(CasbinPolicyEnforcer::with_default_model().await?),
    };
    let source = Arc::new(StorePolicySource::new(
        store.clone(),
        store.clone(),
        settings.tenant_owner_role.id.clone(),
    ));
    let slow = Duration::from_millis(settings.casbin.slow_reload_warn_ms);

    reload_policy(enforcer.as_ref(), source.as_ref(), slow).await?;
    let (reloader, worker) = PolicyReloader::spawn(enforcer.clone(), source, slow);
    Ok((enforcer, reloader, Some(worker)))
}

/// ## Summary
/// Builds the gatekeeper and the mutation services on top of `store`.
///
/// When casbin is enabled the initial policy is loaded before this returns.
///
/// ## Errors
/// Returns `InternalServer` if the casbin model cannot be loaded or the initial policy read
/// fails.
#[tracing::instrument(skip_all)]
pub async fn build_services<S>(
    settings: &Settings,
    store: Arc<S>,
    token_store: Arc<dyn TokenStore>,
    mailer: Arc<dyn MailDispatcher>,
) -> ServiceResult<Services>
where
    S: CredentialStore + PermissionStore + TransactionRunner + 'static,
{
    let (enforcer, reloader, reload_worker) = policy_enforcer(settings, &store).await?;

    let tokens = Arc::new(TokenAuthenticator::new(&settings.auth, token_store));
    let owner_role_id = settings.tenant_owner_role.id.clone();
    let root_user_name = settings.root.user_name.clone();

    let verifier = LoginVerifier::new(settings, store.clone(), store.clone(), tokens, mailer);
    let menus = MenuTreeResolver::new(store.clone(), store.clone(), owner_role_id.clone());
    let gatekeeper = Gatekeeper::new(
        verifier,
        Authorizer::new(enforcer.clone()),
        menus,
        reloader.clone(),
        Duration::from_millis(settings.auth.request_timeout_ms),
    );

    let users = UserService::new(
        store.clone(),
        store.clone(),
        reloader.clone(),
        root_user_name.clone(),
    );
    let tenants = TenantService::new(
        store.clone(),
        store.clone(),
        reloader.clone(),
        root_user_name,
        owner_role_id,
    );
    let roles = RoleService::new(store.clone(), store, reloader);

    tracing::info!(casbin = settings.casbin.enable, "Services ready");
    Ok(Services {
        gatekeeper: Arc::new(gatekeeper),
        users: Arc::new(users),
        tenants: Arc::new(tenants),
        roles: Arc::new(roles),
        enforcer,
        reload_worker,
    })
}
