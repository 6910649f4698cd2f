use axum::{
    async_trait,
    extract::FromRequestParts,
    http::request::Parts,
};
use tracing::warn;

use crate::auth::error::AuthError;
use crate::auth::token::TokenIssuer;
use crate::state::AppState;
use crate::store::{User, UserStore};

/// The identity authenticated for the current request.
pub struct CurrentUser(pub User);

/// Validate a bearer token and resolve its subject to a live user. A user
/// deleted after issuance invalidates the token.
pub async fn authenticate_bearer(
    token: &str,
    tokens: &TokenIssuer,
    store: &dyn UserStore,
) -> Result<User, AuthError> {
    let subject = tokens.validate(token)?;
    let user = store.find_by_email(&subject).await?;
    user.ok_or_else(|| {
        warn!(subject = %subject, "token subject no longer exists");
        AuthError::Unauthorized
    })
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .ok_or(AuthError::Unauthorized)?;

        // Expect "Bearer <token>"
        let token = auth
            .strip_prefix("Bearer ")
            .or_else(|| auth.strip_prefix("bearer "))
            .ok_or(AuthError::Unauthorized)?;

        let user = authenticate_bearer(token, &state.tokens, state.store.as_ref()).await?;
        Ok(CurrentUser(user))
    }
}
