use anyhow::Result;
use config::{Config, ConfigBuilder, builder::DefaultState};
use serde::Deserialize;

use crate::constants::ENV_PREFIX;
use crate::error::{CoreError, CoreResult};

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub root: RootConfig,
    pub tenant_owner_role: TenantOwnerRoleConfig,
    pub casbin: CasbinConfig,
    pub auth: AuthConfig,
    pub mail: MailConfig,
    pub bootstrap: BootstrapConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    /// ## Summary
    /// Returns the bind address in the format "host:port".
    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

/// The configuration-defined superuser. It has no storage row.
#[derive(Clone, Deserialize)]
pub struct RootConfig {
    pub user_name: String,
    pub password: String,
    pub real_name: String,
    /// Tenant assigned to every root login.
    pub tenant_id: String,
    /// Root login is refused when the referer ends with this path.
    pub excluded_referer_suffix: String,
}

impl std::fmt::Debug for RootConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RootConfig")
            .field("user_name", &self.user_name)
            .field("password", &"<redacted>")
            .field("real_name", &self.real_name)
            .field("tenant_id", &self.tenant_id)
            .field("excluded_referer_suffix", &self.excluded_referer_suffix)
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TenantOwnerRoleConfig {
    pub id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CasbinConfig {
    pub enable: bool,
    pub model_file: Option<String>,
    pub slow_reload_warn_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SigningMethod {
    Hs256,
    Hs384,
    Hs512,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenStoreKind {
    Memory,
    Redis,
}

/// Upper bound for `auth.expired`: ten years.
pub const MAX_TOKEN_TTL_SECS: u64 = 10 * 365 * 24 * 60 * 60;

#[derive(Clone, Deserialize)]
pub struct AuthConfig {
    pub signing_key: String,
    pub signing_method: SigningMethod,
    /// Token lifetime in seconds.
    pub expired: u64,
    pub store: TokenStoreKind,
    pub redis_url: Option<String>,
    pub redis_key_prefix: String,
    pub request_timeout_ms: u64,
    pub cleanup_interval_secs: u64,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("signing_key", &"<redacted>")
            .field("signing_method", &self.signing_method)
            .field("expired", &self.expired)
            .field("store", &self.store)
            .field("redis_url", &self.redis_url)
            .field("redis_key_prefix", &self.redis_key_prefix)
            .field("request_timeout_ms", &self.request_timeout_ms)
            .field("cleanup_interval_secs", &self.cleanup_interval_secs)
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MailConfig {
    pub from: String,
    pub reset_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BootstrapConfig {
    pub seed_file: Option<String>,
}

impl Settings {
    fn builder_with_defaults() -> Result<ConfigBuilder<DefaultState>> {
        Ok(Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8698)?
            .set_default("logging.level", "info")?
            .set_default("root.user_name", "root")?
            .set_default("root.real_name", "Root")?
            .set_default("root.tenant_id", "root")?
            .set_default("root.excluded_referer_suffix", "sessions/signin")?
            .set_default("tenant_owner_role.id", "tenant-owner")?
            .set_default("casbin.enable", true)?
            .set_default("casbin.slow_reload_warn_ms", 2000)?
            .set_default("auth.signing_method", "hs512")?
            .set_default("auth.expired", 7200)?
            .set_default("auth.store", "memory")?
            .set_default("auth.redis_key_prefix", "gatehouse:token:")?
            .set_default("auth.request_timeout_ms", 5000)?
            .set_default("auth.cleanup_interval_secs", 300)?
            .set_default("mail.from", "noreply@localhost")?
            .set_default("mail.reset_url", "http://localhost/reset-password")?)
    }

    /// ## Summary
    /// Loads configuration from `config.toml` and environment variables into a `Settings`.
    /// Environment variables take precedence over file values.
    ///
    /// ## Errors
    /// Returns an error if building the configuration, deserializing it, or validating it fails.
    pub fn load() -> Result<Self> {
        let settings = Self::builder_with_defaults()?
            // TOML file
            .add_source(config::File::with_name("config.toml").required(false))
            // Env
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .ignore_empty(true)
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize::<Settings>()?;
        settings.validate()?;
        Ok(settings)
    }

    /// ## Summary
    /// Builds settings from an inline TOML document layered over the defaults.
    ///
    /// ## Errors
    /// Returns an error if the document cannot be parsed, deserialized or validated.
    pub fn from_toml_str(document: &str) -> Result<Self> {
        let settings = Self::builder_with_defaults()?
            .add_source(config::File::from_str(document, config::FileFormat::Toml))
            .build()?
            .try_deserialize::<Settings>()?;
        settings.validate()?;
        Ok(settings)
    }

    /// ## Summary
    /// Rejects settings that would leave the root identity or token signing unusable.
    ///
    /// ## Errors
    /// Returns `ConfigError` describing the first problem found.
    pub fn validate(&self) -> CoreResult<()> {
        if self.root.user_name.trim().is_empty() {
            return Err(CoreError::ConfigError("root.user_name must not be blank".into()));
        }
        if self.root.password.is_empty() {
            return Err(CoreError::ConfigError("root.password must not be blank".into()));
        }
        if self.auth.signing_key.is_empty() {
            return Err(CoreError::ConfigError("auth.signing_key must not be blank".into()));
        }
        if self.auth.expired == 0 {
            return Err(CoreError::ConfigError("auth.expired must be positive".into()));
        }
        if self.auth.expired > MAX_TOKEN_TTL_SECS {
            return Err(CoreError::ConfigError(format!(
                "auth.expired must not exceed {MAX_TOKEN_TTL_SECS} seconds"
            )));
        }
        if self.auth.store == TokenStoreKind::Redis && self.auth.redis_url.is_none() {
            return Err(CoreError::ConfigError(
                "auth.redis_url is required when auth.store = \"redis\"".into(),
            ));
        }
        Ok(())
    }
}

/// ## Summary
/// Loads configuration from environment variables and `.env` file.
///
/// ## Errors
/// Returns an error if loading or deserializing the configuration fails.
pub fn load_config() -> Result<Settings> {
    dotenvy::dotenv().ok();

    tracing::debug!("Loading settings");
    Settings::load()
}
