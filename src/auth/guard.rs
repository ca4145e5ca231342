use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use tracing::{debug, info};

use crate::{error::unauthorized, state::AppState};

/// Never classified: auth endpoints and static assets.
const EXCLUDED_PREFIXES: &[&str] = &["/api/auth", "/_next/static", "/_next/image", "/favicon.ico"];
const PROTECTED_PAGE_PREFIXES: &[&str] = &["/dashboard"];
const PROTECTED_API_PREFIXES: &[&str] = &["/api/tasks", "/api/teams", "/api/user", "/api/analytics"];

pub const LOGIN_PATH: &str = "/login";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathClass {
    Excluded,
    Public,
    ProtectedPage,
    ProtectedApi,
}

impl PathClass {
    pub fn requires_auth(self) -> bool {
        matches!(self, PathClass::ProtectedPage | PathClass::ProtectedApi)
    }
}

/// `prefix` matches itself and anything below it, segment-wise.
fn under(path: &str, prefix: &str) -> bool {
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

pub fn classify(path: &str) -> PathClass {
    if EXCLUDED_PREFIXES.iter().any(|p| under(path, p)) {
        PathClass::Excluded
    } else if PROTECTED_API_PREFIXES.iter().any(|p| under(path, p)) {
        PathClass::ProtectedApi
    } else if PROTECTED_PAGE_PREFIXES.iter().any(|p| under(path, p)) {
        PathClass::ProtectedPage
    } else {
        PathClass::Public
    }
}

/// `/login?callbackUrl=<path>`, with the path kept readable.
pub fn login_redirect_target(path: &str) -> String {
    let mut encoded = String::with_capacity(path.len());
    for b in path.bytes() {
        match b {
            b'%' | b'&' | b'+' | b'=' | b'#' | b'?' => encoded.push_str(&format!("%{b:02X}")),
            0x21..=0x7E => encoded.push(b as char),
            _ => encoded.push_str(&format!("%{b:02X}")),
        }
    }
    format!("{LOGIN_PATH}?callbackUrl={encoded}")
}

/// Rejects unauthenticated requests to protected paths before they reach a handler.
pub async fn require_auth(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let path = req.uri().path().to_owned();
    let class = classify(&path);
    if !class.requires_auth() {
        return next.run(req).await;
    }

    if state.resolver.resolve(req.headers()).is_some() {
        debug!(%path, "authenticated");
        return next.run(req).await;
    }

    info!(%path, ?class, "unauthenticated request rejected");
    match class {
        PathClass::ProtectedApi => unauthorized(),
        _ => Redirect::temporary(&login_redirect_target(&path)).into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_protected_pages() {
        assert_eq!(classify("/dashboard"), PathClass::ProtectedPage);
        assert_eq!(classify("/dashboard/tasks"), PathClass::ProtectedPage);
        assert_eq!(classify("/dashboard/team/42"), PathClass::ProtectedPage);
    }

    #[test]
    fn classifies_protected_apis() {
        for p in ["/api/tasks", "/api/tasks/1", "/api/teams/7/members", "/api/user/profile", "/api/analytics"] {
            assert_eq!(classify(p), PathClass::ProtectedApi, "{p}");
        }
    }

    #[test]
    fn excludes_auth_and_assets() {
        for p in ["/api/auth/login", "/api/auth/session", "/_next/static/chunk.js", "/_next/image", "/favicon.ico"] {
            assert_eq!(classify(p), PathClass::Excluded, "{p}");
        }
    }

    #[test]
    fn everything_else_is_public() {
        for p in ["/", "/login", "/signup", "/health", "/dashboards", "/api/tasksx"] {
            assert_eq!(classify(p), PathClass::Public, "{p}");
        }
    }

    #[test]
    fn redirect_keeps_path_verbatim() {
        assert_eq!(
            login_redirect_target("/dashboard/tasks"),
            "/login?callbackUrl=/dashboard/tasks"
        );
    }

    #[test]
    fn redirect_escapes_query_breaking_bytes() {
        assert_eq!(
            login_redirect_target("/dashboard/a&b=c%20"),
            "/login?callbackUrl=/dashboard/a%26b%3Dc%2520"
        );
    }
}
