//! Bearer token issuance, validation and revocation.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use gatehouse_core::config::{AuthConfig, SigningMethod};
use gatehouse_core::constants::TOKEN_TYPE_BEARER;

use super::token_store::TokenStore;
use crate::error::{ServiceError, ServiceResult};

/// JWT claims carried by every access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id.
    pub sub: String,
    /// Tenant id.
    pub tid: String,
    /// Token id, the key under which the token is registered server-side.
    pub jti: String,
    pub iat: i64,
    pub nbf: i64,
    pub exp: i64,
}

/// The (user, tenant) pair a token is bound to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: String,
    pub tenant_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenInfo {
    pub access_token: String,
    pub token_type: String,
    pub expires_at: DateTime<Utc>,
}

pub struct TokenAuthenticator {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    algorithm: Algorithm,
    ttl: Duration,
    store: Arc<dyn TokenStore>,
}

const fn algorithm_for(method: SigningMethod) -> Algorithm {
    match method {
        SigningMethod::Hs256 => Algorithm::HS256,
        SigningMethod::Hs384 => Algorithm::HS384,
        SigningMethod::Hs512 => Algorithm::HS512,
    }
}

impl TokenAuthenticator {
    #[must_use]
    pub fn new(config: &AuthConfig, store: Arc<dyn TokenStore>) -> Self {
        let secret = config.signing_key.as_bytes();
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            algorithm: algorithm_for(config.signing_method),
            ttl: Duration::from_secs(config.expired),
            store,
        }
    }

    fn validation(&self, check_expiry: bool) -> Validation {
        let mut validation = Validation::new(self.algorithm);
        validation.leeway = 0;
        validation.validate_nbf = check_expiry;
        validation.validate_exp = check_expiry;
        if !check_expiry {
            validation.required_spec_claims.clear();
        }
        validation
    }

    /// ## Summary
    /// Issues a signed token bound to `(user_id, tenant_id)` and registers it for its lifetime.
    ///
    /// ## Errors
    /// Returns `InternalServer` if signing or the store write fails.
    #[tracing::instrument(skip(self))]
    pub async fn generate_token(&self, user_id: &str, tenant_id: &str) -> ServiceResult<TokenInfo> {
        let now = Utc::now();
        let ttl = chrono::Duration::from_std(self.ttl)
            .map_err(|e| ServiceError::internal("token ttl out of range", e))?;
        let expires_at = now + ttl;
        let claims = Claims {
            sub: user_id.to_string(),
            tid: tenant_id.to_string(),
            jti: uuid::Uuid::new_v4().to_string(),
            iat: now.timestamp(),
            nbf: now.timestamp(),
            exp: expires_at.timestamp(),
        };

        let access_token = encode(&Header::new(self.algorithm), &claims, &self.encoding_key)
            .map_err(|e| ServiceError::internal("signing token", e))?;
        self.store.set(&claims.jti, self.ttl).await?;

        tracing::debug!(jti = %claims.jti, "Token issued");
        Ok(TokenInfo {
            access_token,
            token_type: TOKEN_TYPE_BEARER.to_string(),
            expires_at,
        })
    }

    /// ## Summary
    /// Validates a token and returns the identity it is bound to.
    ///
    /// ## Errors
    /// Returns `InvalidToken` for malformed, expired or revoked tokens alike, and when the
    /// store cannot be asked. The store failure is logged.
    pub async fn parse_user_id(&self, token: &str) -> ServiceResult<Identity> {
        let claims = decode::<Claims>(token, &self.decoding_key, &self.validation(true))
            .map_err(|e| {
                tracing::trace!("Token rejected: {e}");
                ServiceError::InvalidToken
            })?
            .claims;

        let registered = self.store.check(&claims.jti).await.map_err(|e| {
            tracing::error!(jti = %claims.jti, error = %e, "Token store check failed");
            ServiceError::InvalidToken
        })?;
        if !registered {
            tracing::trace!(jti = %claims.jti, "Token not registered");
            return Err(ServiceError::InvalidToken);
        }

        Ok(Identity {
            user_id: claims.sub,
            tenant_id: claims.tid,
        })
    }

    /// ## Summary
    /// Revokes a token. Destroying an unknown, expired or already destroyed token succeeds.
    ///
    /// ## Errors
    /// Returns `InternalServer` only if the store fails.
    pub async fn destroy_token(&self, token: &str) -> ServiceResult<()> {
        match decode::<Claims>(token, &self.decoding_key, &self.validation(false)) {
            Ok(data) => {
                self.store.delete(&data.claims.jti).await?;
                tracing::debug!(jti = %data.claims.jti, "Token destroyed");
            }
            Err(e) => tracing::trace!("Ignoring destroy of undecodable token: {e}"),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::token_store::MemoryTokenStore;
    use gatehouse_core::config::TokenStoreKind;

    fn auth_config(expired: u64) -> AuthConfig {
        AuthConfig {
            signing_key: "test-signing-key".to_string(),
            signing_method: SigningMethod::Hs512,
            expired,
            store: TokenStoreKind::Memory,
            redis_url: None,
            redis_key_prefix: "t:".to_string(),
            request_timeout_ms: 1000,
            cleanup_interval_secs: 60,
        }
    }

    fn authenticator(expired: u64) -> (TokenAuthenticator, Arc<MemoryTokenStore>) {
        let store = Arc::new(MemoryTokenStore::new());
        (TokenAuthenticator::new(&auth_config(expired), store.clone()), store)
    }

    #[test_log::test(tokio::test)]
    async fn issued_token_parses_back_to_identity() {
        let (auth, _) = authenticator(3600);
        let token = auth.generate_token("u1", "t1").await.unwrap();
        assert_eq!(token.token_type, "Bearer");
        assert!(token.expires_at > Utc::now());

        let identity = auth.parse_user_id(&token.access_token).await.unwrap();
        assert_eq!(
            identity,
            Identity {
                user_id: "u1".to_string(),
                tenant_id: "t1".to_string(),
            }
        );
    }

    #[test_log::test(tokio::test)]
    async fn destroyed_token_is_rejected_even_though_signature_verifies() {
        let (auth, _) = authenticator(3600);
        let token = auth.generate_token("u1", "t1").await.unwrap();

        auth.destroy_token(&token.access_token).await.unwrap();

        // Signature is still fine.
        assert!(
            decode::<Claims>(
                &token.access_token,
                &auth.decoding_key,
                &auth.validation(true)
            )
            .is_ok()
        );
        assert!(matches!(
            auth.parse_user_id(&token.access_token).await,
            Err(ServiceError::InvalidToken)
        ));
    }

    #[test_log::test(tokio::test)]
    async fn destroy_is_idempotent() {
        let (auth, _) = authenticator(3600);
        let token = auth.generate_token("u1", "t1").await.unwrap();

        auth.destroy_token(&token.access_token).await.unwrap();
        auth.destroy_token(&token.access_token).await.unwrap();
        auth.destroy_token("never-issued").await.unwrap();
    }

    #[test_log::test(tokio::test)]
    async fn garbage_and_foreign_tokens_are_invalid() {
        let (auth, _) = authenticator(3600);
        assert!(matches!(
            auth.parse_user_id("not.a.token").await,
            Err(ServiceError::InvalidToken)
        ));

        let mut other_config = auth_config(3600);
        other_config.signing_key = "another-key".to_string();
        let other = TokenAuthenticator::new(&other_config, Arc::new(MemoryTokenStore::new()));
        let foreign = other.generate_token("u1", "t1").await.unwrap();
        assert!(matches!(
            auth.parse_user_id(&foreign.access_token).await,
            Err(ServiceError::InvalidToken)
        ));
    }

    #[test_log::test(tokio::test)]
    async fn expired_token_is_invalid() {
        let (auth, _) = authenticator(3600);
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: "u1".to_string(),
            tid: "t1".to_string(),
            jti: "old".to_string(),
            iat: now - 100,
            nbf: now - 100,
            exp: now - 10,
        };
        let token = encode(&Header::new(auth.algorithm), &claims, &auth.encoding_key).unwrap();
        auth.store.set("old", Duration::from_secs(60)).await.unwrap();

        assert!(matches!(
            auth.parse_user_id(&token).await,
            Err(ServiceError::InvalidToken)
        ));
        // Expired tokens can still be logged out.
        auth.destroy_token(&token).await.unwrap();
        assert!(!auth.store.check("old").await.unwrap());
    }

    /// Registry that cannot be reached.
    struct UnreachableStore;

    #[async_trait::async_trait]
    impl TokenStore for UnreachableStore {
        async fn set(&self, _key: &str, _ttl: Duration) -> ServiceResult<()> {
            Err(ServiceError::InternalServer(anyhow::anyhow!("connection refused")))
        }

        async fn check(&self, _key: &str) -> ServiceResult<bool> {
            Err(ServiceError::InternalServer(anyhow::anyhow!("connection refused")))
        }

        async fn delete(&self, _key: &str) -> ServiceResult<()> {
            Err(ServiceError::InternalServer(anyhow::anyhow!("connection refused")))
        }
    }

    #[test_log::test(tokio::test)]
    async fn unreachable_store_makes_tokens_invalid() {
        let (issuer, _) = authenticator(3600);
        let token = issuer.generate_token("u1", "t1").await.unwrap();

        let auth = TokenAuthenticator::new(&auth_config(3600), Arc::new(UnreachableStore));
        assert!(matches!(
            auth.parse_user_id(&token.access_token).await,
            Err(ServiceError::InvalidToken)
        ));
    }

    #[test_log::test(tokio::test)]
    async fn concurrent_issuance_for_different_subjects() {
        let (auth, store) = authenticator(3600);
        let auth = Arc::new(auth);
        let tasks = (0..32).map(|i| {
            let auth = Arc::clone(&auth);
            tokio::spawn(async move { auth.generate_token(&format!("u{i}"), "t1").await })
        });
        let tokens = futures::future::join_all(tasks).await;
        for (i, token) in tokens.into_iter().enumerate() {
            let token = token.unwrap().unwrap();
            let identity = auth.parse_user_id(&token.access_token).await.unwrap();
            assert_eq!(identity.user_id, format!("u{i}"));
        }
        assert_eq!(store.len(), 32);
    }
}
