//! Subject types for authorization.
//!
//! The root identity has no storage row; it is carried as its own variant so every lookup
//! branches on the tag instead of comparing against a magic id.

use gatehouse_core::config::RootConfig;

/// Who is acting.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Subject {
    /// The configuration-defined superuser.
    Root,
    /// A user with a storage row, identified by id.
    User(String),
}

impl Subject {
    /// Classifies a user id. The root identity's id is its configured user name.
    #[must_use]
    pub fn from_user_id(user_id: &str, root: &RootConfig) -> Self {
        if user_id == root.user_name {
            Self::Root
        } else {
            Self::User(user_id.to_string())
        }
    }

    #[must_use]
    pub const fn is_root(&self) -> bool {
        matches!(self, Self::Root)
    }

    /// Returns the Casbin subject string, `None` for root which bypasses the policy.
    #[must_use]
    pub fn casbin_subject(&self) -> Option<String> {
        match self {
            Self::Root => None,
            Self::User(id) => Some(user_casbin_subject(id)),
        }
    }
}

impl std::fmt::Display for Subject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Root => f.write_str("root"),
            Self::User(id) => write!(f, "user:{id}"),
        }
    }
}

#[must_use]
pub fn user_casbin_subject(user_id: &str) -> String {
    format!("user:{user_id}")
}

#[must_use]
pub fn role_casbin_subject(role_id: &str) -> String {
    format!("role:{role_id}")
}
