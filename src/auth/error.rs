use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::{error, warn};

use crate::auth::token::TokenError;
use crate::store::{DuplicateField, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Passwords do not match")]
    PasswordMismatch,
    #[error("Email is already registered")]
    EmailTaken,
    #[error("Username is already taken")]
    UsernameTaken,
    #[error("Incorrect username or password")]
    InvalidCredentials,
    #[error("User not found")]
    UserNotFound,
    #[error("Could not validate credentials")]
    Unauthorized,
    #[error("Could not validate credentials")]
    Token(#[from] TokenError),
    #[error("Internal Server Error")]
    Storage(#[source] StoreError),
    #[error("Internal Server Error")]
    Internal(#[from] anyhow::Error),
}

impl From<StoreError> for AuthError {
    fn from(e: StoreError) -> Self {
        match e {
            // A write that lost the race to a concurrent registration lands
            // here; email takes priority when the constraint is unknown.
            StoreError::Duplicate { field } => match field {
                Some(DuplicateField::Username) => AuthError::UsernameTaken,
                _ => AuthError::EmailTaken,
            },
            StoreError::Backend(_) => AuthError::Storage(e),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = match &self {
            AuthError::PasswordMismatch
            | AuthError::EmailTaken
            | AuthError::UsernameTaken
            | AuthError::InvalidCredentials => StatusCode::BAD_REQUEST,
            AuthError::UserNotFound => StatusCode::NOT_FOUND,
            AuthError::Unauthorized | AuthError::Token(_) => StatusCode::UNAUTHORIZED,
            AuthError::Storage(_) | AuthError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        match &self {
            AuthError::Storage(e) => error!(error = ?e, "storage failure"),
            AuthError::Internal(e) => error!(error = ?e, "internal error"),
            AuthError::Token(kind) => warn!(kind = ?kind, "token rejected"),
            _ => {}
        }

        let body = Json(json!({ "success": false, "message": self.to_string() }));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_failures_render_like_unauthorized() {
        // Token failures and a plain Unauthorized share one outward message.
        assert_eq!(
            AuthError::Token(TokenError::Expired).to_string(),
            AuthError::Unauthorized.to_string()
        );
        assert_eq!(
            AuthError::Token(TokenError::Invalid).to_string(),
            AuthError::Unauthorized.to_string()
        );
    }

    #[test]
    fn duplicate_store_errors_map_to_taken_fields() {
        let email = AuthError::from(StoreError::Duplicate {
            field: Some(DuplicateField::Email),
        });
        assert!(matches!(email, AuthError::EmailTaken));

        let username = AuthError::from(StoreError::Duplicate {
            field: Some(DuplicateField::Username),
        });
        assert!(matches!(username, AuthError::UsernameTaken));

        let unknown = AuthError::from(StoreError::Duplicate { field: None });
        assert!(matches!(unknown, AuthError::EmailTaken));
    }
}
