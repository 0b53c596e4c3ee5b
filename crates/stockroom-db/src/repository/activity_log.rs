//! # Activity Log Repository
//!
//! Persistence for audit entries. Rows are written by the audit worker in
//! stockroom-service, never from inside a sale transaction.

use sqlx::SqlitePool;
use tracing::debug;

use crate::error::DbResult;
use stockroom_core::ActivityLog;

#[derive(Debug, Clone)]
pub struct ActivityLogRepository {
    pool: SqlitePool,
}

impl ActivityLogRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ActivityLogRepository { pool }
    }

    /// Inserts one entry.
    pub async fn insert(&self, entry: &ActivityLog) -> DbResult<()> {
        debug!(action = %entry.action, user_id = ?entry.user_id, "Writing activity log");

        sqlx::query(
            r#"
            INSERT INTO activity_logs (id, user_id, action, description, metadata, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&entry.id)
        .bind(&entry.user_id)
        .bind(&entry.action)
        .bind(&entry.description)
        .bind(&entry.metadata)
        .bind(entry.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Most recent entries, newest first.
    pub async fn recent(&self, limit: u32) -> DbResult<Vec<ActivityLog>> {
        let entries = sqlx::query_as::<_, ActivityLog>(
            r#"
            SELECT id, user_id, action, description, metadata, created_at
            FROM activity_logs
            ORDER BY created_at DESC, rowid DESC
            LIMIT ?1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    /// Most recent entries of one user, newest first.
    pub async fn for_user(&self, user_id: &str, limit: u32) -> DbResult<Vec<ActivityLog>> {
        let entries = sqlx::query_as::<_, ActivityLog>(
            r#"
            SELECT id, user_id, action, description, metadata, created_at
            FROM activity_logs
            WHERE user_id = ?1
            ORDER BY created_at DESC, rowid DESC
            LIMIT ?2
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use crate::repository::generate_id;
    use crate::{Database, DbConfig};
    use stockroom_core::{ActivityLog, Role};

    fn entry(user_id: Option<&str>, action: &str, minutes_ago: i64) -> ActivityLog {
        ActivityLog {
            id: generate_id(),
            user_id: user_id.map(str::to_string),
            action: action.to_string(),
            description: format!("{action} happened"),
            metadata: Some(r#"{"k":1}"#.to_string()),
            created_at: Utc::now() - Duration::minutes(minutes_ago),
        }
    }

    #[tokio::test]
    async fn test_recent_and_for_user() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let ana = db.users().create("ana", "Ana", Role::Cashier).await.unwrap();
        let ben = db.users().create("ben", "Ben", Role::Manager).await.unwrap();

        let logs = db.activity_logs();
        logs.insert(&entry(Some(&ana.id), "SALE_CREATED", 10)).await.unwrap();
        logs.insert(&entry(Some(&ben.id), "STOCK_RECEIVED", 5)).await.unwrap();
        logs.insert(&entry(None, "SYSTEM", 1)).await.unwrap();

        let actions: Vec<String> = logs
            .recent(10)
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.action)
            .collect();
        assert_eq!(actions, vec!["SYSTEM", "STOCK_RECEIVED", "SALE_CREATED"]);

        assert_eq!(logs.recent(1).await.unwrap().len(), 1);

        let ana_logs = logs.for_user(&ana.id, 10).await.unwrap();
        assert_eq!(ana_logs.len(), 1);
        assert_eq!(ana_logs[0].metadata.as_deref(), Some(r#"{"k":1}"#));
    }
}
