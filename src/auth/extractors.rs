use axum::{
    async_trait,
    extract::FromRequestParts,
    http::request::Parts,
    response::Response,
};
use tracing::warn;

use super::jwt::Identity;
use crate::{error::unauthorized, state::AppState};

/// Identity of the caller, resolved with the configured strategy.
pub struct AuthUser(pub Identity);

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        match state.resolver.resolve(&parts.headers) {
            Some(identity) => Ok(AuthUser(identity)),
            None => {
                warn!(path = %parts.uri.path(), "missing or invalid session");
                Err(unauthorized())
            }
        }
    }
}
