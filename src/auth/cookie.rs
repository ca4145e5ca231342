use axum::http::{
    header::{COOKIE, SET_COOKIE},
    HeaderMap, HeaderValue,
};

use super::jwt::{Identity, TokenService};

/// The one cookie name used to issue, read and clear the session.
pub const AUTH_COOKIE_NAME: &str = "kaizen_auth_token";

fn build(value: &str, max_age_secs: u64, secure: bool) -> anyhow::Result<HeaderValue> {
    let mut cookie = format!(
        "{AUTH_COOKIE_NAME}={value}; Path=/; Max-Age={max_age_secs}; HttpOnly; SameSite=Lax"
    );
    if secure {
        cookie.push_str("; Secure");
    }
    Ok(HeaderValue::from_str(&cookie)?)
}

/// Issues a token for `identity` and appends it as the session cookie.
pub fn attach(
    headers: &mut HeaderMap,
    tokens: &TokenService,
    identity: &Identity,
    secure: bool,
) -> anyhow::Result<()> {
    let token = tokens.issue(identity)?;
    headers.append(SET_COOKIE, build(&token, tokens.ttl().as_secs(), secure)?);
    Ok(())
}

/// Overwrites the session cookie with an empty, immediately expired value.
pub fn clear(headers: &mut HeaderMap, secure: bool) -> anyhow::Result<()> {
    headers.append(SET_COOKIE, build("", 0, secure)?);
    Ok(())
}

/// Reads a cookie value from the request `Cookie` headers.
pub fn read<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(k, _)| *k == name)
        .map(|(_, v)| v.trim())
}
