use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Form, Json, Router,
};
use serde_json::json;
use tracing::instrument;

use crate::{
    auth::{
        dto::{LoginForm, RegisterRequest, TokenResponse, UserResponse},
        error::AuthError,
        extract::CurrentUser,
    },
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/users", get(list_users))
        .route("/auth/users/:id", get(get_user).delete(delete_user))
}

pub fn protected_routes() -> Router<AppState> {
    Router::new().route("/protected", get(protected))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<UserResponse>), AuthError> {
    let user = state.auth.register(payload).await?;
    Ok((StatusCode::CREATED, Json(user.into())))
}

#[instrument(skip(state, form))]
pub async fn login(
    State(state): State<AppState>,
    Form(form): Form<LoginForm>,
) -> Result<Json<TokenResponse>, AuthError> {
    let user = state.auth.authenticate(&form.username, &form.password).await?;
    let access_token = state.tokens.issue(&user.email)?;
    Ok(Json(TokenResponse {
        access_token,
        token_type: "bearer".into(),
    }))
}

#[instrument(skip(state, _auth))]
pub async fn list_users(
    State(state): State<AppState>,
    _auth: CurrentUser,
) -> Result<Json<Vec<UserResponse>>, AuthError> {
    let users = state.auth.list_users().await?;
    Ok(Json(users.into_iter().map(UserResponse::from).collect()))
}

#[instrument(skip(state, _auth))]
pub async fn get_user(
    State(state): State<AppState>,
    _auth: CurrentUser,
    Path(id): Path<i64>,
) -> Result<Json<UserResponse>, AuthError> {
    let user = state.auth.get_user_by_id(id).await?;
    Ok(Json(user.into()))
}

#[instrument(skip(state, _auth))]
pub async fn delete_user(
    State(state): State<AppState>,
    _auth: CurrentUser,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>, AuthError> {
    state.auth.delete_user(id).await?;
    Ok(Json(json!({
        "success": true,
        "message": "User deleted successfully."
    })))
}

#[instrument(skip(user))]
pub async fn protected(CurrentUser(user): CurrentUser) -> Json<serde_json::Value> {
    Json(json!({
        "message": format!("Hello {}, you are authorized to see this content.", user.username)
    }))
}
