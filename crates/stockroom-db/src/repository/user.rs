//! # User Repository
//!
//! Users only carry what the sale engine and reports need: identity, role
//! and an active flag. Credentials live elsewhere.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;

use super::generate_id;
use crate::error::DbResult;
use stockroom_core::validation::validate_name;
use stockroom_core::{CoreError, Role, User};

/// Repository for user records.
#[derive(Debug, Clone)]
pub struct UserRepository {
    pool: SqlitePool,
}

impl UserRepository {
    pub fn new(pool: SqlitePool) -> Self {
        UserRepository { pool }
    }

    /// Creates an active user.
    ///
    /// ## Returns
    /// * `Err(DbError::UniqueViolation)` - username already taken
    pub async fn create(&self, username: &str, full_name: &str, role: Role) -> DbResult<User> {
        validate_name("username", username).map_err(CoreError::from)?;
        validate_name("full_name", full_name).map_err(CoreError::from)?;

        let user = User {
            id: generate_id(),
            username: username.trim().to_string(),
            full_name: full_name.trim().to_string(),
            role,
            is_active: true,
            created_at: Utc::now(),
        };

        debug!(id = %user.id, username = %user.username, role = user.role.as_str(), "Inserting user");

        sqlx::query(
            r#"
            INSERT INTO users (id, username, full_name, role, is_active, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&user.id)
        .bind(&user.username)
        .bind(&user.full_name)
        .bind(user.role)
        .bind(user.is_active)
        .bind(user.created_at)
        .execute(&self.pool)
        .await?;

        Ok(user)
    }

    /// Gets a user by ID, active or not.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, full_name, role, is_active, created_at
            FROM users
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    pub async fn get_by_username(&self, username: &str) -> DbResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, full_name, role, is_active, created_at
            FROM users
            WHERE username = ?1
            "#,
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    /// Deactivates a user. Their past sales stay attributed to them.
    pub async fn deactivate(&self, id: &str) -> DbResult<bool> {
        debug!(id = %id, "Deactivating user");

        let result = sqlx::query("UPDATE users SET is_active = 0 WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE is_active = 1")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};

    #[tokio::test]
    async fn test_create_and_fetch() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        let user = db
            .users()
            .create("ana", "Ana Cashier", Role::Cashier)
            .await
            .unwrap();

        let fetched = db.users().get_by_id(&user.id).await.unwrap().unwrap();
        assert_eq!(fetched.username, "ana");
        assert_eq!(fetched.role, Role::Cashier);
        assert!(fetched.is_active);

        let by_name = db.users().get_by_username("ana").await.unwrap().unwrap();
        assert_eq!(by_name.id, user.id);
    }

    #[tokio::test]
    async fn test_deactivate() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let user = db
            .users()
            .create("boss", "The Boss", Role::Admin)
            .await
            .unwrap();

        assert!(db.users().deactivate(&user.id).await.unwrap());
        assert!(!db.users().deactivate("missing").await.unwrap());

        let fetched = db.users().get_by_id(&user.id).await.unwrap().unwrap();
        assert!(!fetched.is_active);
        assert_eq!(db.users().count().await.unwrap(), 0);
    }
}
