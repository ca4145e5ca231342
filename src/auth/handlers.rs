use axum::{
    extract::{rejection::JsonRejection, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        cookie,
        dto::{
            is_valid_email, AuthResponse, LoginRequest, LogoutResponse, PublicUser,
            SessionResponse, SignupRequest, MIN_PASSWORD_CHARS,
        },
        jwt::Identity,
        password::{hash_password_async, verify_dummy_async, verify_password_async},
        repo_types::{NewUser, UserSettings},
    },
    error::AppError,
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/api/auth/signup", post(signup))
        .route("/api/auth/login", post(login))
        .route("/api/auth/logout", post(logout))
        .route("/api/auth/session", get(session))
}

fn bad_body(e: JsonRejection) -> AppError {
    warn!(error = %e, "invalid request body");
    AppError::Validation("Invalid request body".into())
}

/// Issues the session cookie for `user` into a fresh header map.
fn session_headers(state: &AppState, user: &PublicUser) -> Result<HeaderMap, AppError> {
    let mut headers = HeaderMap::new();
    cookie::attach(
        &mut headers,
        &state.tokens,
        &Identity::from(user),
        state.config.auth.secure_cookies,
    )?;
    Ok(headers)
}

#[instrument(skip(state, payload))]
pub async fn signup(
    State(state): State<AppState>,
    payload: Result<Json<SignupRequest>, JsonRejection>,
) -> Result<(StatusCode, HeaderMap, Json<AuthResponse>), AppError> {
    let Json(payload) = payload.map_err(bad_body)?;
    let name = payload.name.trim().to_string();
    let email = payload.email.trim().to_string();

    if name.is_empty() || email.is_empty() || payload.password.is_empty() {
        warn!(
            name = !name.is_empty(),
            email = !email.is_empty(),
            password = !payload.password.is_empty(),
            "signup missing required fields"
        );
        return Err(AppError::Validation("Missing required fields".into()));
    }
    if !is_valid_email(&email) {
        warn!(%email, "invalid email");
        return Err(AppError::Validation("Invalid email".into()));
    }
    if payload.password.chars().count() < MIN_PASSWORD_CHARS {
        warn!("password too short");
        return Err(AppError::Validation(format!(
            "Password must be at least {MIN_PASSWORD_CHARS} characters"
        )));
    }

    // check-then-insert: the loser of a concurrent signup race gets Duplicate
    // from the store's unique index instead
    if state.users.find_by_email(&email).await?.is_some() {
        warn!(%email, "email already registered");
        return Err(AppError::Conflict("User already exists".into()));
    }

    let password_hash = hash_password_async(payload.password).await?;

    let record = state
        .users
        .insert(NewUser {
            name,
            email,
            password_hash,
            settings: UserSettings::default(),
        })
        .await?;

    let user = PublicUser::from(&record);
    let headers = session_headers(&state, &user)?;

    info!(user_id = %user.id, email = %user.email, "user registered");
    Ok((
        StatusCode::CREATED,
        headers,
        Json(AuthResponse {
            success: true,
            user,
        }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<(HeaderMap, Json<AuthResponse>), AppError> {
    let Json(payload) = payload.map_err(bad_body)?;
    let email = payload.email.trim();

    if email.is_empty() || payload.password.is_empty() {
        return Err(AppError::Validation(
            "Email and password are required".into(),
        ));
    }

    let Some(record) = state.users.find_by_email(email).await? else {
        verify_dummy_async(payload.password).await?;
        warn!(%email, "login unknown email");
        return Err(AppError::Authentication("Invalid credentials".into()));
    };

    let ok = verify_password_async(payload.password, record.password_hash.clone()).await?;
    if !ok {
        warn!(%email, user_id = %record.id, "login invalid password");
        return Err(AppError::Authentication("Invalid credentials".into()));
    }

    let user = PublicUser::from(&record);
    let headers = session_headers(&state, &user)?;

    info!(user_id = %user.id, "user logged in");
    Ok((
        headers,
        Json(AuthResponse {
            success: true,
            user,
        }),
    ))
}

#[instrument(skip(state))]
pub async fn logout(
    State(state): State<AppState>,
) -> Result<(HeaderMap, Json<LogoutResponse>), AppError> {
    let mut headers = HeaderMap::new();
    cookie::clear(&mut headers, state.config.auth.secure_cookies)?;
    info!("session cleared");
    Ok((headers, Json(LogoutResponse { success: true })))
}

/// Reports the caller as currently stored, or `{user: null}` when the token is
/// missing, invalid, or names a user the store does not know.
#[instrument(skip(state, headers))]
pub async fn session(State(state): State<AppState>, headers: HeaderMap) -> Json<SessionResponse> {
    let Some(identity) = state.resolver.resolve(&headers) else {
        return Json(SessionResponse { user: None });
    };

    let user = match state.users.find_by_id(identity.id).await {
        Ok(Some(record)) => Some(PublicUser::from(&record)),
        Ok(None) => {
            warn!(user_id = %identity.id, "session token for unknown user");
            None
        }
        Err(e) => {
            warn!(user_id = %identity.id, error = %e, "session lookup failed");
            None
        }
    };
    Json(SessionResponse { user })
}
