use std::sync::Arc;

use axum::http::{header::AUTHORIZATION, HeaderMap};

use super::{
    cookie::{self, AUTH_COOKIE_NAME},
    jwt::{Identity, TokenService},
};
use crate::config::AuthStrategy;

/// Turns inbound request headers into a verified identity.
///
/// Never fails: any problem with the credential yields `None`, which callers
/// treat as unauthenticated.
pub trait IdentityResolver: Send + Sync {
    fn resolve(&self, headers: &HeaderMap) -> Option<Identity>;
}

/// Reads the session cookie only.
pub struct CookieTokenResolver {
    tokens: TokenService,
}

impl CookieTokenResolver {
    pub fn new(tokens: TokenService) -> Self {
        Self { tokens }
    }
}

impl IdentityResolver for CookieTokenResolver {
    fn resolve(&self, headers: &HeaderMap) -> Option<Identity> {
        let token = cookie::read(headers, AUTH_COOKIE_NAME).filter(|t| !t.is_empty())?;
        self.tokens.verify(token).map(Identity::from)
    }
}

/// Provider-managed session: `Authorization: Bearer` first, then the cookie.
pub struct SessionTokenResolver {
    tokens: TokenService,
}

impl SessionTokenResolver {
    pub fn new(tokens: TokenService) -> Self {
        Self { tokens }
    }
}

fn bearer(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    value
        .strip_prefix("Bearer ")
        .or_else(|| value.strip_prefix("bearer "))
        .map(str::trim)
}

impl IdentityResolver for SessionTokenResolver {
    fn resolve(&self, headers: &HeaderMap) -> Option<Identity> {
        let token = bearer(headers)
            .or_else(|| cookie::read(headers, AUTH_COOKIE_NAME))
            .filter(|t| !t.is_empty())?;
        self.tokens.verify(token).map(Identity::from)
    }
}

pub fn for_strategy(strategy: AuthStrategy, tokens: TokenService) -> Arc<dyn IdentityResolver> {
    match strategy {
        AuthStrategy::Cookie => Arc::new(CookieTokenResolver::new(tokens)),
        AuthStrategy::Session => Arc::new(SessionTokenResolver::new(tokens)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::JwtConfig;
    use axum::http::{header::COOKIE, HeaderValue};
    use std::time::Duration;
    use uuid::Uuid;

    fn tokens(secret: &str) -> TokenService {
        let cfg = JwtConfig {
            secret: secret.into(),
            issuer: "kaizen".into(),
            audience: "kaizen-web".into(),
            cookie_ttl: Duration::from_secs(3600),
            session_ttl: Duration::from_secs(7200),
        };
        TokenService::new(&cfg, cfg.cookie_ttl)
    }

    fn who() -> Identity {
        Identity {
            id: Uuid::new_v4(),
            name: "A".into(),
            email: "a@x.com".into(),
        }
    }

    fn with_cookie(token: &str) -> HeaderMap {
        let mut h = HeaderMap::new();
        h.insert(
            COOKIE,
            HeaderValue::from_str(&format!("{AUTH_COOKIE_NAME}={token}")).unwrap(),
        );
        h
    }

    fn with_bearer(token: &str) -> HeaderMap {
        let mut h = HeaderMap::new();
        h.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
        );
        h
    }

    #[test]
    fn cookie_resolver_accepts_valid_cookie() {
        let t = tokens("s");
        let id = who();
        let token = t.issue(&id).unwrap();
        let resolver = for_strategy(AuthStrategy::Cookie, t);
        assert_eq!(resolver.resolve(&with_cookie(&token)), Some(id));
    }

    #[test]
    fn cookie_resolver_ignores_bearer_header() {
        let t = tokens("s");
        let token = t.issue(&who()).unwrap();
        let resolver = for_strategy(AuthStrategy::Cookie, t);
        assert_eq!(resolver.resolve(&with_bearer(&token)), None);
    }

    #[test]
    fn empty_or_foreign_cookie_is_none() {
        let resolver = for_strategy(AuthStrategy::Cookie, tokens("s"));
        assert_eq!(resolver.resolve(&with_cookie("")), None);
        let foreign = tokens("other").issue(&who()).unwrap();
        assert_eq!(resolver.resolve(&with_cookie(&foreign)), None);
        assert_eq!(resolver.resolve(&HeaderMap::new()), None);
    }

    #[test]
    fn session_resolver_prefers_bearer_then_cookie() {
        let t = tokens("s");
        let id = who();
        let token = t.issue(&id).unwrap();
        let resolver = for_strategy(AuthStrategy::Session, t);
        assert_eq!(resolver.resolve(&with_bearer(&token)), Some(id.clone()));
        assert_eq!(resolver.resolve(&with_cookie(&token)), Some(id));
    }

    #[test]
    fn session_resolver_rejects_other_schemes() {
        let t = tokens("s");
        let token = t.issue(&who()).unwrap();
        let resolver = for_strategy(AuthStrategy::Session, t);
        let mut h = HeaderMap::new();
        h.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Basic {token}")).unwrap(),
        );
        assert_eq!(resolver.resolve(&h), None);
    }
}
