use std::sync::Arc;

use tracing::{info, warn};

use crate::auth::dto::RegisterRequest;
use crate::auth::error::AuthError;
use crate::auth::password::{hash_password, verify_password};
use crate::store::{NewUser, User, UserStore};

/// Registration and credential verification against the user store.
#[derive(Clone)]
pub struct AuthService {
    store: Arc<dyn UserStore>,
}

impl AuthService {
    pub fn new(store: Arc<dyn UserStore>) -> Self {
        Self { store }
    }

    pub async fn register(&self, req: RegisterRequest) -> Result<User, AuthError> {
        let email = req.email.trim().to_lowercase();
        info!(username = %req.username, email = %email, "registration attempt");

        if req.password != req.confirm_password {
            warn!(email = %email, "registration rejected: passwords do not match");
            return Err(AuthError::PasswordMismatch);
        }

        if let Some(existing) = self
            .store
            .find_by_email_or_username(&email, &req.username)
            .await?
        {
            if existing.email == email {
                warn!(email = %email, "registration rejected: email already registered");
                return Err(AuthError::EmailTaken);
            }
            warn!(username = %req.username, "registration rejected: username already taken");
            return Err(AuthError::UsernameTaken);
        }

        let password_hash = hash_password(&req.password)?;
        // A registration racing this one past the check above is caught by
        // the store's uniqueness constraint and mapped back to Taken.
        let user = self
            .store
            .insert(NewUser {
                username: req.username,
                email,
                password_hash,
            })
            .await?;

        info!(user_id = user.id, username = %user.username, "user registered");
        Ok(user)
    }

    pub async fn authenticate(&self, email: &str, password: &str) -> Result<User, AuthError> {
        let email = email.trim().to_lowercase();
        info!(email = %email, "login attempt");

        match self.store.find_by_email(&email).await? {
            Some(user) if verify_password(password, &user.password_hash) => {
                info!(user_id = user.id, username = %user.username, "user authenticated");
                Ok(user)
            }
            // Unknown email and wrong password produce the same error.
            _ => {
                warn!(email = %email, "login rejected: incorrect credentials");
                Err(AuthError::InvalidCredentials)
            }
        }
    }

    pub async fn get_user_by_id(&self, id: i64) -> Result<User, AuthError> {
        self.store
            .find_by_id(id)
            .await?
            .ok_or(AuthError::UserNotFound)
    }

    pub async fn list_users(&self) -> Result<Vec<User>, AuthError> {
        Ok(self.store.list_all().await?)
    }

    pub async fn delete_user(&self, id: i64) -> Result<(), AuthError> {
        let user = self
            .store
            .find_by_id(id)
            .await?
            .ok_or(AuthError::UserNotFound)?;
        self.store.delete(&user).await?;
        info!(user_id = user.id, username = %user.username, "user deleted");
        Ok(())
    }
}
