//! Board repository
//!
//! Boards are seeded by migrations and read-only at runtime; the repository
//! only exposes lookups and the aggregate listing for the home page.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{Board, BoardSummary};
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

/// Board repository trait
#[async_trait]
pub trait BoardRepository: Send + Sync {
    /// List all boards with topic and post counts
    async fn list_all(&self) -> Result<Vec<BoardSummary>>;

    /// Get a board by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<Board>>;
}

/// SQLx-based board repository supporting SQLite and MySQL
pub struct SqlxBoardRepository {
    pool: DynDatabasePool,
}

impl SqlxBoardRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a shared repository for dependency injection
    pub fn shared(pool: DynDatabasePool) -> Arc<dyn BoardRepository> {
        Arc::new(Self::new(pool))
    }
}

const LIST_SQL: &str = r#"
    SELECT b.id, b.name, b.description,
           (SELECT COUNT(*) FROM topics t WHERE t.board_id = b.id) AS topic_count,
           (SELECT COUNT(*) FROM posts p
              JOIN topics t ON p.topic_id = t.id
             WHERE t.board_id = b.id) AS post_count
    FROM boards b
    ORDER BY b.id
"#;

#[async_trait]
impl BoardRepository for SqlxBoardRepository {
    async fn list_all(&self) -> Result<Vec<BoardSummary>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => list_all_sqlite(self.pool.as_sqlite().unwrap()).await,
            DatabaseDriver::Mysql => list_all_mysql(self.pool.as_mysql().unwrap()).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Board>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_by_id_sqlite(self.pool.as_sqlite().unwrap(), id).await,
            DatabaseDriver::Mysql => get_by_id_mysql(self.pool.as_mysql().unwrap(), id).await,
        }
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn list_all_sqlite(pool: &SqlitePool) -> Result<Vec<BoardSummary>> {
    let rows = sqlx::query(LIST_SQL)
        .fetch_all(pool)
        .await
        .context("Failed to list boards")?;

    Ok(rows
        .into_iter()
        .map(|row| BoardSummary {
            id: row.get("id"),
            name: row.get("name"),
            description: row.get("description"),
            topic_count: row.get("topic_count"),
            post_count: row.get("post_count"),
        })
        .collect())
}

async fn get_by_id_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<Board>> {
    let row = sqlx::query("SELECT id, name, description, created_at FROM boards WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get board")?;

    Ok(row.map(|r| Board {
        id: r.get("id"),
        name: r.get("name"),
        description: r.get("description"),
        created_at: r.get("created_at"),
    }))
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn list_all_mysql(pool: &MySqlPool) -> Result<Vec<BoardSummary>> {
    let rows = sqlx::query(LIST_SQL)
        .fetch_all(pool)
        .await
        .context("Failed to list boards")?;

    Ok(rows
        .into_iter()
        .map(|row| BoardSummary {
            id: row.get("id"),
            name: row.get("name"),
            description: row.get("description"),
            topic_count: row.get("topic_count"),
            post_count: row.get("post_count"),
        })
        .collect())
}

async fn get_by_id_mysql(pool: &MySqlPool, id: i64) -> Result<Option<Board>> {
    let row = sqlx::query("SELECT id, name, description, created_at FROM boards WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get board")?;

    Ok(row.map(|r| Board {
        id: r.get("id"),
        name: r.get("name"),
        description: r.get("description"),
        created_at: r.get("created_at"),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};

    async fn setup() -> SqlxBoardRepository {
        let pool = create_test_pool().await.expect("pool");
        migrations::run_migrations(&pool).await.expect("migrations");
        SqlxBoardRepository::new(pool)
    }

    #[tokio::test]
    async fn test_list_all_returns_seeded_boards() {
        let repo = setup().await;
        let boards = repo.list_all().await.expect("list");

        assert!(boards.len() >= 2);
        assert!(boards.iter().any(|b| b.name == "General"));
        assert!(boards.iter().all(|b| b.topic_count == 0));
    }

    #[tokio::test]
    async fn test_get_by_id() {
        let repo = setup().await;

        let board = repo.get_by_id(1).await.expect("get").unwrap();
        assert_eq!(board.id, 1);
        assert!(!board.name.is_empty());
    }

    #[tokio::test]
    async fn test_get_missing_board_returns_none() {
        let repo = setup().await;
        assert!(repo.get_by_id(999).await.expect("get").is_none());
    }
}
