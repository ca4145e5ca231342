use crate::state::AppState;
use axum::Router;

pub mod cookie;
pub mod dto;
pub(crate) mod extractors;
pub mod guard;
pub mod handlers;
pub mod jwt;
pub mod password;
pub mod repo;
pub mod repo_types;
pub mod resolver;

pub fn router() -> Router<AppState> {
    Router::new().merge(handlers::auth_routes())
}
