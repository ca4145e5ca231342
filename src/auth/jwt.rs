use std::time::Duration;

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::debug;
use uuid::Uuid;

use crate::config::JwtConfig;

/// Canonical identity of an authenticated caller. Request-scoped, never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: Uuid,
    pub name: String,
    pub email: String,
}

/// JWT payload carried in the session cookie or bearer header.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    pub sub: Uuid,   // user id
    pub name: String,
    pub email: String,
    pub iat: usize,
    pub exp: usize,
    pub iss: String,
    pub aud: String,
}

impl From<Claims> for Identity {
    fn from(c: Claims) -> Self {
        Self {
            id: c.sub,
            name: c.name,
            email: c.email,
        }
    }
}

/// Signs and verifies stateless session tokens.
#[derive(Clone)]
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    issuer: String,
    audience: String,
    ttl: Duration,
}

impl TokenService {
    pub fn new(cfg: &JwtConfig, ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(cfg.secret.as_bytes()),
            decoding: DecodingKey::from_secret(cfg.secret.as_bytes()),
            issuer: cfg.issuer.clone(),
            audience: cfg.audience.clone(),
            ttl,
        }
    }

    /// Validity window of issued tokens; also the cookie Max-Age.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn issue(&self, identity: &Identity) -> anyhow::Result<String> {
        self.issue_at(identity, OffsetDateTime::now_utc())
    }

    pub fn issue_at(&self, identity: &Identity, issued_at: OffsetDateTime) -> anyhow::Result<String> {
        let exp = i64::try_from(self.ttl.as_secs())
            .ok()
            .and_then(|secs| issued_at.checked_add(TimeDuration::seconds(secs)))
            .ok_or_else(|| anyhow::anyhow!("token ttl out of range"))?;
        let claims = Claims {
            sub: identity.id,
            name: identity.name.clone(),
            email: identity.email.clone(),
            iat: issued_at.unix_timestamp().max(0) as usize,
            exp: exp.unix_timestamp().max(0) as usize,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?;
        debug!(user_id = %identity.id, "jwt signed");
        Ok(token)
    }

    /// Returns `None` for tampered, malformed, foreign or expired tokens.
    pub fn verify(&self, token: &str) -> Option<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        validation.leeway = 0;
        match decode::<Claims>(token, &self.decoding, &validation) {
            Ok(data) => {
                debug!(user_id = %data.claims.sub, "jwt verified");
                Some(data.claims)
            }
            Err(e) => {
                debug!(error = %e, "jwt rejected");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_service(secret: &str, issuer: &str, audience: &str) -> TokenService {
        let cfg = JwtConfig {
            secret: secret.into(),
            issuer: issuer.into(),
            audience: audience.into(),
            cookie_ttl: Duration::from_secs(60 * 60 * 24 * 7),
            session_ttl: Duration::from_secs(60 * 60 * 24 * 30),
        };
        TokenService::new(&cfg, cfg.cookie_ttl)
    }

    fn identity() -> Identity {
        Identity {
            id: Uuid::new_v4(),
            name: "A".into(),
            email: "a@x.com".into(),
        }
    }

    #[test]
    fn issue_and_verify_returns_original_claims() {
        let tokens = make_service("dev-secret", "kaizen", "kaizen-web");
        let who = identity();
        let token = tokens.issue(&who).expect("issue");
        let claims = tokens.verify(&token).expect("valid token");
        assert_eq!(claims.iss, "kaizen");
        assert_eq!(claims.aud, "kaizen-web");
        assert_eq!(claims.exp - claims.iat, 60 * 60 * 24 * 7);
        assert_eq!(Identity::from(claims), who);
    }

    #[test]
    fn expired_token_is_rejected() {
        let tokens = make_service("dev-secret", "kaizen", "kaizen-web");
        let issued = OffsetDateTime::now_utc() - TimeDuration::days(8);
        let token = tokens.issue_at(&identity(), issued).expect("issue");
        assert!(tokens.verify(&token).is_none());
    }

    #[test]
    fn token_just_inside_window_is_accepted() {
        let tokens = make_service("dev-secret", "kaizen", "kaizen-web");
        let issued = OffsetDateTime::now_utc() - TimeDuration::days(6);
        let token = tokens.issue_at(&identity(), issued).expect("issue");
        assert!(tokens.verify(&token).is_some());
    }

    #[test]
    fn tampered_token_is_rejected() {
        let tokens = make_service("dev-secret", "kaizen", "kaizen-web");
        let token = tokens.issue(&identity()).expect("issue");
        let mut parts: Vec<String> = token.split('.').map(str::to_string).collect();
        parts[2] = parts[2].chars().rev().collect();
        assert!(tokens.verify(&parts.join(".")).is_none());
    }

    #[test]
    fn other_secret_is_rejected() {
        let a = make_service("secret-a", "kaizen", "kaizen-web");
        let b = make_service("secret-b", "kaizen", "kaizen-web");
        let token = a.issue(&identity()).expect("issue");
        assert!(b.verify(&token).is_none());
    }

    #[test]
    fn wrong_issuer_or_audience_is_rejected() {
        let good = make_service("same-secret", "good-iss", "good-aud");
        let bad = make_service("same-secret", "bad-iss", "bad-aud");
        let token = good.issue(&identity()).expect("issue");
        assert!(bad.verify(&token).is_none());
    }

    #[test]
    fn out_of_range_ttl_errors_instead_of_panicking() {
        let cfg = JwtConfig {
            secret: "dev-secret".into(),
            issuer: "kaizen".into(),
            audience: "kaizen-web".into(),
            cookie_ttl: Duration::from_secs(u64::MAX),
            session_ttl: Duration::from_secs(i64::MAX as u64),
        };
        assert!(TokenService::new(&cfg, cfg.cookie_ttl).issue(&identity()).is_err());
        assert!(TokenService::new(&cfg, cfg.session_ttl).issue(&identity()).is_err());
    }

    #[test]
    fn garbage_is_rejected() {
        let tokens = make_service("dev-secret", "kaizen", "kaizen-web");
        assert!(tokens.verify("").is_none());
        assert!(tokens.verify("not.a.jwt").is_none());
    }
}
