use axum::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use tokio::sync::Mutex;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: OffsetDateTime,
}

/// Column values for a user that has not been assigned an id yet.
#[derive(Debug)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicateField {
    Email,
    Username,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A unique constraint rejected the write. `field` is known when the
    /// backend can name the violated constraint.
    #[error("duplicate user")]
    Duplicate { field: Option<DuplicateField> },
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
    async fn find_by_id(&self, id: i64) -> Result<Option<User>, StoreError>;
    /// Matches on either column; when both collide with different rows the
    /// email match wins.
    async fn find_by_email_or_username(
        &self,
        email: &str,
        username: &str,
    ) -> Result<Option<User>, StoreError>;
    async fn list_all(&self) -> Result<Vec<User>, StoreError>;
    async fn insert(&self, user: NewUser) -> Result<User, StoreError>;
    async fn delete(&self, user: &User) -> Result<(), StoreError>;
}

#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

fn map_sqlx(e: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(ref db) = e {
        if matches!(db.kind(), sqlx::error::ErrorKind::UniqueViolation) {
            let field = match db.constraint() {
                Some(c) if c.contains("email") => Some(DuplicateField::Email),
                Some(c) if c.contains("username") => Some(DuplicateField::Username),
                _ => None,
            };
            return StoreError::Duplicate { field };
        }
    }
    StoreError::Backend(e.into())
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, email, password_hash, created_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.db)
        .await
        .map_err(map_sqlx)?;
        Ok(user)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, email, password_hash, created_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .map_err(map_sqlx)?;
        Ok(user)
    }

    async fn find_by_email_or_username(
        &self,
        email: &str,
        username: &str,
    ) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, email, password_hash, created_at
            FROM users
            WHERE email = $1 OR username = $2
            ORDER BY (email = $1) DESC
            LIMIT 1
            "#,
        )
        .bind(email)
        .bind(username)
        .fetch_optional(&self.db)
        .await
        .map_err(map_sqlx)?;
        Ok(user)
    }

    async fn list_all(&self) -> Result<Vec<User>, StoreError> {
        let users = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, email, password_hash, created_at
            FROM users
            ORDER BY id
            "#,
        )
        .fetch_all(&self.db)
        .await
        .map_err(map_sqlx)?;
        Ok(users)
    }

    async fn insert(&self, user: NewUser) -> Result<User, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (username, email, password_hash)
            VALUES ($1, $2, $3)
            RETURNING id, username, email, password_hash, created_at
            "#,
        )
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .fetch_one(&self.db)
        .await
        .map_err(map_sqlx)?;
        Ok(user)
    }

    async fn delete(&self, user: &User) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(user.id)
            .execute(&self.db)
            .await
            .map_err(map_sqlx)?;
        Ok(())
    }
}

/// Store backed by process memory. Used by tests and `AppState::fake`;
/// enforces the same uniqueness rules as the Postgres constraints.
#[derive(Default)]
pub struct InMemoryUserStore {
    inner: Mutex<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    users: Vec<User>,
    next_id: i64,
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner.users.iter().find(|u| u.email == email).cloned())
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<User>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner.users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_by_email_or_username(
        &self,
        email: &str,
        username: &str,
    ) -> Result<Option<User>, StoreError> {
        let inner = self.inner.lock().await;
        let user = inner
            .users
            .iter()
            .find(|u| u.email == email)
            .or_else(|| inner.users.iter().find(|u| u.username == username));
        Ok(user.cloned())
    }

    async fn list_all(&self) -> Result<Vec<User>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner.users.clone())
    }

    async fn insert(&self, user: NewUser) -> Result<User, StoreError> {
        let mut inner = self.inner.lock().await;
        if inner.users.iter().any(|u| u.email == user.email) {
            return Err(StoreError::Duplicate {
                field: Some(DuplicateField::Email),
            });
        }
        if inner.users.iter().any(|u| u.username == user.username) {
            return Err(StoreError::Duplicate {
                field: Some(DuplicateField::Username),
            });
        }
        inner.next_id += 1;
        let user = User {
            id: inner.next_id,
            username: user.username,
            email: user.email,
            password_hash: user.password_hash,
            created_at: OffsetDateTime::now_utc(),
        };
        inner.users.push(user.clone());
        Ok(user)
    }

    async fn delete(&self, user: &User) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        inner.users.retain(|u| u.id != user.id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(username: &str, email: &str) -> NewUser {
        NewUser {
            username: username.into(),
            email: email.into(),
            password_hash: "$argon2id$fake".into(),
        }
    }

    #[tokio::test]
    async fn insert_assigns_increasing_ids() {
        let store = InMemoryUserStore::default();
        let a = store.insert(new_user("alice", "alice@x.com")).await.unwrap();
        let b = store.insert(new_user("bob", "bob@x.com")).await.unwrap();
        assert_eq!(a.id, 1);
        assert_eq!(b.id, 2);
    }

    #[tokio::test]
    async fn insert_rejects_duplicate_email() {
        let store = InMemoryUserStore::default();
        store.insert(new_user("alice", "alice@x.com")).await.unwrap();
        let err = store
            .insert(new_user("someone-else", "alice@x.com"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::Duplicate {
                field: Some(DuplicateField::Email)
            }
        ));
    }

    #[tokio::test]
    async fn insert_rejects_duplicate_username() {
        let store = InMemoryUserStore::default();
        store.insert(new_user("alice", "alice@x.com")).await.unwrap();
        let err = store
            .insert(new_user("alice", "other@x.com"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::Duplicate {
                field: Some(DuplicateField::Username)
            }
        ));
    }

    #[tokio::test]
    async fn email_match_wins_over_username_match() {
        let store = InMemoryUserStore::default();
        store.insert(new_user("alice", "alice@x.com")).await.unwrap();
        store.insert(new_user("bob", "bob@x.com")).await.unwrap();
        // "alice@x.com" matches alice by email, "bob" matches bob by username
        let found = store
            .find_by_email_or_username("alice@x.com", "bob")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.username, "alice");
    }

    #[tokio::test]
    async fn delete_removes_the_user() {
        let store = InMemoryUserStore::default();
        let user = store.insert(new_user("alice", "alice@x.com")).await.unwrap();
        store.delete(&user).await.unwrap();
        assert!(store.find_by_id(user.id).await.unwrap().is_none());
        assert!(store.list_all().await.unwrap().is_empty());
    }
}
