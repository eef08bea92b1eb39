/// Task mirror persistence operations
///
/// This module provides the store for mirrored and manually entered tasks.
/// All queries use parameterized queries for SQL injection prevention.
/// Each statement is individually atomic; the reconciler relies on that and
/// on upsert/delete idempotence rather than on multi-row transactions.
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sqlx::{Row, SqlitePool};
use std::collections::HashSet;
use uuid::Uuid;

/// A mirrored or manually entered task
///
/// `course_id` is the tracked course the record was mirrored from, or
/// `None` for manual tasks. Reconciliation scope is keyed on it, so manual
/// tasks never appear in any course's remove-set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: String,
    pub title: String,
    pub description: String,
    pub course_name: Option<String>,
    pub course_id: Option<String>,
}

/// Task store for database operations
#[derive(Clone)]
pub struct TaskStore {
    pool: SqlitePool,
}

impl TaskStore {
    /// Create a new task store
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// List every task in the mirror
    ///
    /// Order is by id for stable output; callers must not rely on it.
    pub async fn list(&self) -> Result<Vec<TaskRecord>> {
        let rows = sqlx::query(
            "SELECT id, title, description, course_name, course_id FROM tasks ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to list tasks")?;

        Ok(rows.into_iter().map(|r| record_from_row(&r)).collect())
    }

    /// Get a task by id
    pub async fn get(&self, id: &str) -> Result<Option<TaskRecord>> {
        let row = sqlx::query(
            "SELECT id, title, description, course_name, course_id FROM tasks WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch task")?;

        Ok(row.map(|r| record_from_row(&r)))
    }

    /// Ids currently mirrored for one tracked course
    ///
    /// This is the reconciliation scope used to compute removals. Manual
    /// tasks carry a NULL course_id and are never returned here.
    pub async fn ids_for_course(&self, course_id: &str) -> Result<HashSet<String>> {
        let ids: Vec<String> = sqlx::query_scalar("SELECT id FROM tasks WHERE course_id = ?")
            .bind(course_id)
            .fetch_all(&self.pool)
            .await
            .context("Failed to fetch mirrored ids")?;

        Ok(ids.into_iter().collect())
    }

    /// Create-or-replace a task record
    ///
    /// Applying the same upsert twice yields the same final state.
    pub async fn upsert(&self, record: &TaskRecord) -> Result<()> {
        sqlx::query(
            "INSERT INTO tasks (id, title, description, course_name, course_id) \
             VALUES (?, ?, ?, ?, ?) \
             ON CONFLICT(id) DO UPDATE SET \
               title = excluded.title, \
               description = excluded.description, \
               course_name = excluded.course_name, \
               course_id = excluded.course_id",
        )
        .bind(&record.id)
        .bind(&record.title)
        .bind(&record.description)
        .bind(&record.course_name)
        .bind(&record.course_id)
        .execute(&self.pool)
        .await
        .context("Failed to upsert task")?;

        Ok(())
    }

    /// Delete a task by id
    ///
    /// Deleting a nonexistent id is a no-op, not an error.
    pub async fn delete(&self, id: &str) -> Result<()> {
        sqlx::query("DELETE FROM tasks WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to delete task")?;

        Ok(())
    }

    /// Add a manually entered task with a store-assigned id
    ///
    /// Manual tasks have no provider-side counterpart: course fields stay
    /// NULL so the reconciler never treats them as orphans.
    pub async fn add_generated(&self, title: &str, description: &str) -> Result<String> {
        let id = Uuid::new_v4().to_string();

        sqlx::query(
            "INSERT INTO tasks (id, title, description, course_name, course_id) \
             VALUES (?, ?, ?, NULL, NULL)",
        )
        .bind(&id)
        .bind(title)
        .bind(description)
        .execute(&self.pool)
        .await
        .context("Failed to add task")?;

        Ok(id)
    }

    /// Total number of stored tasks
    pub async fn count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tasks")
            .fetch_one(&self.pool)
            .await
            .context("Failed to count tasks")?;

        Ok(count)
    }
}

fn record_from_row(r: &sqlx::sqlite::SqliteRow) -> TaskRecord {
    TaskRecord {
        id: r.get("id"),
        title: r.get("title"),
        description: r.get("description"),
        course_name: r.get("course_name"),
        course_id: r.get("course_id"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use tempfile::TempDir;

    async fn open_store(dir: &TempDir) -> TaskStore {
        let db = Database::new(&dir.path().join("test.db")).await.unwrap();
        db.tasks()
    }

    fn mirrored(id: &str, title: &str, course_id: &str) -> TaskRecord {
        TaskRecord {
            id: id.to_string(),
            title: title.to_string(),
            description: String::new(),
            course_name: Some("Historia".to_string()),
            course_id: Some(course_id.to_string()),
        }
    }

    #[tokio::test]
    async fn test_upsert_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir).await;

        let record = mirrored("1", "Essay", "c-1");
        store.upsert(&record).await.unwrap();
        store.upsert(&record).await.unwrap();

        assert_eq!(store.count().await.unwrap(), 1);
        assert_eq!(store.get("1").await.unwrap(), Some(record));
    }

    #[tokio::test]
    async fn test_upsert_replaces_content() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir).await;

        store.upsert(&mirrored("1", "Essay", "c-1")).await.unwrap();

        let mut updated = mirrored("1", "Essay (v2)", "c-1");
        updated.description = "Bring sources".to_string();
        store.upsert(&updated).await.unwrap();

        assert_eq!(store.get("1").await.unwrap(), Some(updated));
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_delete_missing_id_is_noop() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir).await;

        store.delete("no-such-id").await.unwrap();
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_add_generated_assigns_unique_ids_outside_scope() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir).await;

        let a = store.add_generated("Comprar cuaderno", "").await.unwrap();
        let b = store.add_generated("Comprar cuaderno", "").await.unwrap();
        assert_ne!(a, b);

        // Manual tasks are invisible to every course scope
        store.upsert(&mirrored("1", "Essay", "c-1")).await.unwrap();
        let scope = store.ids_for_course("c-1").await.unwrap();
        assert_eq!(scope, ["1".to_string()].into_iter().collect());
        assert_eq!(store.count().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_ids_for_course_scoped_per_course() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir).await;

        store.upsert(&mirrored("1", "Essay", "c-1")).await.unwrap();
        store.upsert(&mirrored("2", "Lab", "c-2")).await.unwrap();

        let scope = store.ids_for_course("c-1").await.unwrap();
        assert!(scope.contains("1"));
        assert!(!scope.contains("2"));
    }
}
