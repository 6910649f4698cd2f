use crate::state::AppState;
use axum::Router;

mod dto;
pub mod error;
pub(crate) mod extract;
pub mod handlers;
pub mod password;
pub mod service;
pub mod token;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(handlers::auth_routes())
        .merge(handlers::protected_routes())
}
