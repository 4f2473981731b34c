//! Identity and authorization core.
//!
//! ## Module Organization
//!
//! - `casbin`: policy enforcers (Casbin snapshot-swapping, allow-all)
//! - `gatekeeper`: facade used by the HTTP layer, with request timeouts
//! - `login`: credential verification, profiles, password change and reset mail
//! - `menu_tree`: menu forest resolution with ancestor repair
//! - `password`: Argon2 hashing and secret comparison
//! - `policy`: policy rows and the store-backed policy source
//! - `reload`: coalescing background policy reloads
//! - `service`: `Authorizer`
//! - `subject`: root vs. registered user
//! - `token`: JWT issuance, validation and revocation
//! - `token_store`: server-side token registries

pub mod casbin;
pub mod gatekeeper;
pub mod login;
pub mod menu_tree;
pub mod password;
pub mod policy;
pub mod reload;
pub mod service;
pub mod subject;
pub mod token;
pub mod token_store;


pub use casbin::{AllowAllEnforcer, CasbinPolicyEnforcer, PolicyEnforcer};
pub use gatekeeper::Gatekeeper;
pub use login::{LoginProfile, LoginVerifier, VerifiedUser};
pub use menu_tree::{MenuNode, MenuTreeResolver};
pub use policy::{PolicySnapshot, PolicySource, StorePolicySource};
pub use reload::{PolicyReloader, ReloadOutcome};
pub use service::{Authorizer, AuthzResult};
pub use subject::Subject;
pub use token::{Identity, TokenAuthenticator, TokenInfo};
pub use token_store::{MemoryTokenStore, TokenStore};
