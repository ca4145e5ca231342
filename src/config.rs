use std::time::Duration;

use anyhow::{bail, Context};
use serde::Deserialize;

/// Secret used only when `APP_ENV=development` and `JWT_SECRET` is unset.
pub const DEV_JWT_SECRET: &str = "kaizen-dev-secret-do-not-deploy";

/// Token validity for the cookie-token strategy.
pub const DEFAULT_COOKIE_TOKEN_TTL: Duration = Duration::from_secs(60 * 60 * 24 * 7);
/// Token validity for the provider-session strategy.
pub const DEFAULT_SESSION_TOKEN_TTL: Duration = Duration::from_secs(60 * 60 * 24 * 30);
/// Upper bound accepted for either token TTL.
pub const MAX_TOKEN_TTL: Duration = Duration::from_secs(60 * 60 * 24 * 365);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    pub fn is_development(self) -> bool {
        self == Environment::Development
    }
}

/// How inbound requests are resolved to an identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthStrategy {
    /// Token in the `kaizen_auth_token` cookie.
    Cookie,
    /// Provider-managed session: bearer header, falling back to the cookie.
    Session,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Postgres,
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub cookie_ttl: Duration,
    pub session_ttl: Duration,
}

// keeps the secret out of logs
impl std::fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtConfig")
            .field("secret", &"<redacted>")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("cookie_ttl", &self.cookie_ttl)
            .field("session_ttl", &self.session_ttl)
            .finish()
    }
}

#[derive(Clone, Deserialize)]
pub struct DatabaseConfig {
    pub backend: StoreBackend,
    pub url: Option<String>,
    pub max_connections: u32,
    pub connect_attempts: u32,
    pub connect_timeout: Duration,
    pub query_timeout: Duration,
    pub degraded_fallback: bool,
}

impl std::fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("backend", &self.backend)
            .field("url", &self.url.as_ref().map(|_| "<redacted>"))
            .field("max_connections", &self.max_connections)
            .field("connect_attempts", &self.connect_attempts)
            .field("connect_timeout", &self.connect_timeout)
            .field("query_timeout", &self.query_timeout)
            .field("degraded_fallback", &self.degraded_fallback)
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    pub strategy: AuthStrategy,
    pub secure_cookies: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub server: ServerConfig,
    pub jwt: JwtConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let environment = match var("APP_ENV").as_deref() {
            Some("development") | Some("dev") => Environment::Development,
            Some("production") | Some("prod") | None => Environment::Production,
            Some(other) => bail!("APP_ENV must be development or production, got {other:?}"),
        };

        let server = ServerConfig {
            host: var("APP_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port: parse_or(&var, "APP_PORT", 8080)?,
        };

        let secret = match var("JWT_SECRET") {
            Some(secret) => secret,
            None if environment.is_development() => {
                tracing::warn!("JWT_SECRET not set; using the development secret");
                DEV_JWT_SECRET.to_string()
            }
            None => bail!("JWT_SECRET must be set outside development"),
        };

        let jwt = JwtConfig {
            secret,
            issuer: var("JWT_ISSUER").unwrap_or_else(|| "kaizen".into()),
            audience: var("JWT_AUDIENCE").unwrap_or_else(|| "kaizen-web".into()),
            cookie_ttl: ttl_or(&var, "COOKIE_TOKEN_TTL_SECS", DEFAULT_COOKIE_TOKEN_TTL)?,
            session_ttl: ttl_or(&var, "SESSION_TOKEN_TTL_SECS", DEFAULT_SESSION_TOKEN_TTL)?,
        };

        let backend = match var("STORE_BACKEND").as_deref() {
            Some("postgres") | None => StoreBackend::Postgres,
            Some("memory") => StoreBackend::Memory,
            Some(other) => bail!("STORE_BACKEND must be postgres or memory, got {other:?}"),
        };
        let url = var("DATABASE_URL");
        if backend == StoreBackend::Postgres && url.is_none() {
            bail!("DATABASE_URL must be set when STORE_BACKEND=postgres");
        }

        let database = DatabaseConfig {
            backend,
            url,
            max_connections: parse_or(&var, "DB_MAX_CONNECTIONS", 10)?,
            connect_attempts: parse_or(&var, "DB_CONNECT_ATTEMPTS", 3u32)?.max(1),
            connect_timeout: parse_or(&var, "DB_CONNECT_TIMEOUT_MS", 5_000)
                .map(Duration::from_millis)?,
            query_timeout: parse_or(&var, "DB_QUERY_TIMEOUT_MS", 5_000)
                .map(Duration::from_millis)?,
            degraded_fallback: parse_or(&var, "DB_DEGRADED_FALLBACK", false)?,
        };

        let strategy = match var("AUTH_STRATEGY").as_deref() {
            Some("cookie") | None => AuthStrategy::Cookie,
            Some("session") => AuthStrategy::Session,
            Some(other) => bail!("AUTH_STRATEGY must be cookie or session, got {other:?}"),
        };

        let auth = AuthConfig {
            strategy,
            secure_cookies: !environment.is_development(),
        };

        Ok(Self {
            environment,
            server,
            jwt,
            database,
            auth,
        })
    }

    /// Validity window of tokens issued under the active strategy.
    pub fn token_ttl(&self) -> Duration {
        match self.auth.strategy {
            AuthStrategy::Cookie => self.jwt.cookie_ttl,
            AuthStrategy::Session => self.jwt.session_ttl,
        }
    }
}

fn parse_or<T, F>(var: &F, key: &str, default: T) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    F: Fn(&str) -> Option<String>,
{
    match var(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("invalid value for {key}")),
        None => Ok(default),
    }
}

/// Token TTL in seconds; must be positive and at most [`MAX_TOKEN_TTL`].
fn ttl_or<F>(var: &F, key: &str, default: Duration) -> anyhow::Result<Duration>
where
    F: Fn(&str) -> Option<String>,
{
    let secs: u64 = parse_or(var, key, default.as_secs())?;
    if secs == 0 || secs > MAX_TOKEN_TTL.as_secs() {
        bail!(
            "{key} must be between 1 and {} seconds, got {secs}",
            MAX_TOKEN_TTL.as_secs()
        );
    }
    Ok(Duration::from_secs(secs))
}
