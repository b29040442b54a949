//! Topic repository
//!
//! Database operations for topics, including the transactional
//! topic-plus-first-post creation and per-viewer view counting.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{ListParams, NewTopic, Post, Topic, TopicSummary};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

/// Topic repository trait
#[async_trait]
pub trait TopicRepository: Send + Sync {
    /// Create a topic together with its first post in one transaction.
    ///
    /// The first post carries the topic's opening message and the same
    /// author as the topic starter.
    async fn create_with_first_post(&self, input: &NewTopic) -> Result<(Topic, Post)>;

    /// Get a topic by ID, scoped to a board.
    ///
    /// Returns `None` when the topic doesn't exist or belongs to a
    /// different board.
    async fn get_in_board(&self, board_id: i64, topic_id: i64) -> Result<Option<Topic>>;

    /// List topics for a board, most recently updated first, paginated.
    /// Returns the page of summaries and the total topic count.
    async fn list_by_board(
        &self,
        board_id: i64,
        params: &ListParams,
    ) -> Result<(Vec<TopicSummary>, i64)>;

    /// Record a view for the given viewer token.
    ///
    /// The counter is incremented only the first time a token views the
    /// topic; repeat views return `false` and leave the counter untouched.
    async fn record_view(&self, topic_id: i64, viewer: &str) -> Result<bool>;

    /// Bump the topic's last_updated timestamp
    async fn touch_last_updated(&self, topic_id: i64, at: DateTime<Utc>) -> Result<()>;
}

/// SQLx-based topic repository supporting SQLite and MySQL
pub struct SqlxTopicRepository {
    pool: DynDatabasePool,
}

impl SqlxTopicRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a shared repository for dependency injection
    pub fn shared(pool: DynDatabasePool) -> Arc<dyn TopicRepository> {
        Arc::new(Self::new(pool))
    }
}

const LIST_SQL: &str = r#"
    SELECT t.id, t.board_id, t.subject, t.views, t.last_updated,
           u.username AS starter_name,
           (SELECT COUNT(*) FROM posts p WHERE p.topic_id = t.id) AS post_count
    FROM topics t
    JOIN users u ON u.id = t.starter_id
    WHERE t.board_id = ?
    ORDER BY t.last_updated DESC
    LIMIT ? OFFSET ?
"#;

#[async_trait]
impl TopicRepository for SqlxTopicRepository {
    async fn create_with_first_post(&self, input: &NewTopic) -> Result<(Topic, Post)> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                create_with_first_post_sqlite(self.pool.as_sqlite().unwrap(), input).await
            }
            DatabaseDriver::Mysql => {
                create_with_first_post_mysql(self.pool.as_mysql().unwrap(), input).await
            }
        }
    }

    async fn get_in_board(&self, board_id: i64, topic_id: i64) -> Result<Option<Topic>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                get_in_board_sqlite(self.pool.as_sqlite().unwrap(), board_id, topic_id).await
            }
            DatabaseDriver::Mysql => {
                get_in_board_mysql(self.pool.as_mysql().unwrap(), board_id, topic_id).await
            }
        }
    }

    async fn list_by_board(
        &self,
        board_id: i64,
        params: &ListParams,
    ) -> Result<(Vec<TopicSummary>, i64)> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                list_by_board_sqlite(self.pool.as_sqlite().unwrap(), board_id, params).await
            }
            DatabaseDriver::Mysql => {
                list_by_board_mysql(self.pool.as_mysql().unwrap(), board_id, params).await
            }
        }
    }

    async fn record_view(&self, topic_id: i64, viewer: &str) -> Result<bool> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                record_view_sqlite(self.pool.as_sqlite().unwrap(), topic_id, viewer).await
            }
            DatabaseDriver::Mysql => {
                record_view_mysql(self.pool.as_mysql().unwrap(), topic_id, viewer).await
            }
        }
    }

    async fn touch_last_updated(&self, topic_id: i64, at: DateTime<Utc>) -> Result<()> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                touch_last_updated_sqlite(self.pool.as_sqlite().unwrap(), topic_id, at).await
            }
            DatabaseDriver::Mysql => {
                touch_last_updated_mysql(self.pool.as_mysql().unwrap(), topic_id, at).await
            }
        }
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_with_first_post_sqlite(
    pool: &SqlitePool,
    input: &NewTopic,
) -> Result<(Topic, Post)> {
    let now = Utc::now();
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    let topic_result = sqlx::query(
        r#"
        INSERT INTO topics (board_id, starter_id, subject, views, last_updated, created_at)
        VALUES (?, ?, ?, 0, ?, ?)
        "#,
    )
    .bind(input.board_id)
    .bind(input.starter_id)
    .bind(&input.subject)
    .bind(now)
    .bind(now)
    .execute(&mut *tx)
    .await
    .context("Failed to create topic")?;

    let topic_id = topic_result.last_insert_rowid();

    let post_result = sqlx::query(
        r#"
        INSERT INTO posts (topic_id, created_by, message, created_at)
        VALUES (?, ?, ?, ?)
        "#,
    )
    .bind(topic_id)
    .bind(input.starter_id)
    .bind(&input.message)
    .bind(now)
    .execute(&mut *tx)
    .await
    .context("Failed to create first post")?;

    let post_id = post_result.last_insert_rowid();

    tx.commit().await.context("Failed to commit topic creation")?;

    Ok(build_created(input, topic_id, post_id, now))
}

async fn get_in_board_sqlite(
    pool: &SqlitePool,
    board_id: i64,
    topic_id: i64,
) -> Result<Option<Topic>> {
    let row = sqlx::query("SELECT * FROM topics WHERE id = ? AND board_id = ?")
        .bind(topic_id)
        .bind(board_id)
        .fetch_optional(pool)
        .await
        .context("Failed to get topic")?;

    Ok(row.map(|r| Topic {
        id: r.get("id"),
        board_id: r.get("board_id"),
        starter_id: r.get("starter_id"),
        subject: r.get("subject"),
        views: r.get("views"),
        last_updated: r.get("last_updated"),
        created_at: r.get("created_at"),
    }))
}

async fn list_by_board_sqlite(
    pool: &SqlitePool,
    board_id: i64,
    params: &ListParams,
) -> Result<(Vec<TopicSummary>, i64)> {
    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM topics WHERE board_id = ?")
        .bind(board_id)
        .fetch_one(pool)
        .await
        .context("Failed to count topics")?;

    let rows = sqlx::query(LIST_SQL)
        .bind(board_id)
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(pool)
        .await
        .context("Failed to list topics")?;

    let topics = rows
        .into_iter()
        .map(|row| {
            let post_count: i64 = row.get("post_count");
            TopicSummary {
                id: row.get("id"),
                board_id: row.get("board_id"),
                subject: row.get("subject"),
                starter_name: row.get("starter_name"),
                views: row.get("views"),
                reply_count: (post_count - 1).max(0),
                last_updated: row.get("last_updated"),
            }
        })
        .collect();

    Ok((topics, total))
}

async fn record_view_sqlite(pool: &SqlitePool, topic_id: i64, viewer: &str) -> Result<bool> {
    let inserted = sqlx::query("INSERT OR IGNORE INTO topic_views (topic_id, viewer) VALUES (?, ?)")
        .bind(topic_id)
        .bind(viewer)
        .execute(pool)
        .await
        .context("Failed to record topic view")?;

    if inserted.rows_affected() == 0 {
        return Ok(false);
    }

    sqlx::query("UPDATE topics SET views = views + 1 WHERE id = ?")
        .bind(topic_id)
        .execute(pool)
        .await
        .context("Failed to increment view counter")?;

    Ok(true)
}

async fn touch_last_updated_sqlite(
    pool: &SqlitePool,
    topic_id: i64,
    at: DateTime<Utc>,
) -> Result<()> {
    sqlx::query("UPDATE topics SET last_updated = ? WHERE id = ?")
        .bind(at)
        .bind(topic_id)
        .execute(pool)
        .await
        .context("Failed to update topic timestamp")?;
    Ok(())
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_with_first_post_mysql(
    pool: &MySqlPool,
    input: &NewTopic,
) -> Result<(Topic, Post)> {
    let now = Utc::now();
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    let topic_result = sqlx::query(
        r#"
        INSERT INTO topics (board_id, starter_id, subject, views, last_updated, created_at)
        VALUES (?, ?, ?, 0, ?, ?)
        "#,
    )
    .bind(input.board_id)
    .bind(input.starter_id)
    .bind(&input.subject)
    .bind(now)
    .bind(now)
    .execute(&mut *tx)
    .await
    .context("Failed to create topic")?;

    let topic_id = topic_result.last_insert_id() as i64;

    let post_result = sqlx::query(
        r#"
        INSERT INTO posts (topic_id, created_by, message, created_at)
        VALUES (?, ?, ?, ?)
        "#,
    )
    .bind(topic_id)
    .bind(input.starter_id)
    .bind(&input.message)
    .bind(now)
    .execute(&mut *tx)
    .await
    .context("Failed to create first post")?;

    let post_id = post_result.last_insert_id() as i64;

    tx.commit().await.context("Failed to commit topic creation")?;

    Ok(build_created(input, topic_id, post_id, now))
}

async fn get_in_board_mysql(
    pool: &MySqlPool,
    board_id: i64,
    topic_id: i64,
) -> Result<Option<Topic>> {
    let row = sqlx::query("SELECT * FROM topics WHERE id = ? AND board_id = ?")
        .bind(topic_id)
        .bind(board_id)
        .fetch_optional(pool)
        .await
        .context("Failed to get topic")?;

    Ok(row.map(|r| Topic {
        id: r.get("id"),
        board_id: r.get("board_id"),
        starter_id: r.get("starter_id"),
        subject: r.get("subject"),
        views: r.get("views"),
        last_updated: r.get("last_updated"),
        created_at: r.get("created_at"),
    }))
}

async fn list_by_board_mysql(
    pool: &MySqlPool,
    board_id: i64,
    params: &ListParams,
) -> Result<(Vec<TopicSummary>, i64)> {
    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM topics WHERE board_id = ?")
        .bind(board_id)
        .fetch_one(pool)
        .await
        .context("Failed to count topics")?;

    let rows = sqlx::query(LIST_SQL)
        .bind(board_id)
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(pool)
        .await
        .context("Failed to list topics")?;

    let topics = rows
        .into_iter()
        .map(|row| {
            let post_count: i64 = row.get("post_count");
            TopicSummary {
                id: row.get("id"),
                board_id: row.get("board_id"),
                subject: row.get("subject"),
                starter_name: row.get("starter_name"),
                views: row.get("views"),
                reply_count: (post_count - 1).max(0),
                last_updated: row.get("last_updated"),
            }
        })
        .collect();

    Ok((topics, total))
}

async fn record_view_mysql(pool: &MySqlPool, topic_id: i64, viewer: &str) -> Result<bool> {
    let inserted = sqlx::query("INSERT IGNORE INTO topic_views (topic_id, viewer) VALUES (?, ?)")
        .bind(topic_id)
        .bind(viewer)
        .execute(pool)
        .await
        .context("Failed to record topic view")?;

    if inserted.rows_affected() == 0 {
        return Ok(false);
    }

    sqlx::query("UPDATE topics SET views = views + 1 WHERE id = ?")
        .bind(topic_id)
        .execute(pool)
        .await
        .context("Failed to increment view counter")?;

    Ok(true)
}

async fn touch_last_updated_mysql(
    pool: &MySqlPool,
    topic_id: i64,
    at: DateTime<Utc>,
) -> Result<()> {
    sqlx::query("UPDATE topics SET last_updated = ? WHERE id = ?")
        .bind(at)
        .bind(topic_id)
        .execute(pool)
        .await
        .context("Failed to update topic timestamp")?;
    Ok(())
}

// ============================================================================
// Shared helpers
// ============================================================================

fn build_created(
    input: &NewTopic,
    topic_id: i64,
    post_id: i64,
    now: DateTime<Utc>,
) -> (Topic, Post) {
    let topic = Topic {
        id: topic_id,
        board_id: input.board_id,
        starter_id: input.starter_id,
        subject: input.subject.clone(),
        views: 0,
        last_updated: now,
        created_at: now,
    };
    let post = Post {
        id: post_id,
        topic_id,
        created_by: input.starter_id,
        message: input.message.clone(),
        created_at: now,
        updated_at: None,
        updated_by: None,
    };
    (topic, post)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{SqlxUserRepository, UserRepository};
    use crate::db::{create_test_pool, migrations, DynDatabasePool};
    use crate::models::User;

    async fn setup() -> (SqlxTopicRepository, DynDatabasePool, i64) {
        let pool = create_test_pool().await.expect("pool");
        migrations::run_migrations(&pool).await.expect("migrations");

        let users = SqlxUserRepository::new(pool.clone());
        let user = users
            .create(&User::new(
                "jane".to_string(),
                "jane@example.com".to_string(),
                "hash".to_string(),
            ))
            .await
            .expect("user");

        (SqlxTopicRepository::new(pool.clone()), pool, user.id)
    }

    fn new_topic(board_id: i64, starter_id: i64, subject: &str) -> NewTopic {
        NewTopic {
            board_id,
            starter_id,
            subject: subject.to_string(),
            message: format!("Opening message for {}", subject),
        }
    }

    #[tokio::test]
    async fn test_create_with_first_post() {
        let (repo, pool, user_id) = setup().await;

        let (topic, post) = repo
            .create_with_first_post(&new_topic(1, user_id, "Hello"))
            .await
            .expect("create");

        assert!(topic.id > 0);
        assert_eq!(post.topic_id, topic.id);
        assert_eq!(post.created_by, user_id);
        assert_eq!(post.message, "Opening message for Hello");

        // Exactly one post linked to the topic
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM posts WHERE topic_id = ?")
            .bind(topic.id)
            .fetch_one(pool.as_sqlite().unwrap())
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_create_rolls_back_when_post_insert_fails() {
        let (repo, pool, user_id) = setup().await;

        // Drop the posts table so the second insert in the transaction fails
        sqlx::query("DROP TABLE posts")
            .execute(pool.as_sqlite().unwrap())
            .await
            .unwrap();

        let result = repo
            .create_with_first_post(&new_topic(1, user_id, "Broken"))
            .await;
        assert!(result.is_err());

        // The topic insert must not survive the failed transaction
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM topics")
            .fetch_one(pool.as_sqlite().unwrap())
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_get_in_board_scopes_to_board() {
        let (repo, _pool, user_id) = setup().await;

        let (topic, _) = repo
            .create_with_first_post(&new_topic(1, user_id, "Scoped"))
            .await
            .expect("create");

        assert!(repo.get_in_board(1, topic.id).await.unwrap().is_some());
        // Same topic through the wrong board is not found
        assert!(repo.get_in_board(2, topic.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_by_board_orders_by_last_updated() {
        let (repo, _pool, user_id) = setup().await;

        let (first, _) = repo
            .create_with_first_post(&new_topic(1, user_id, "First"))
            .await
            .unwrap();
        let (_second, _) = repo
            .create_with_first_post(&new_topic(1, user_id, "Second"))
            .await
            .unwrap();

        // Bump the first topic so it becomes the most recent
        repo.touch_last_updated(first.id, Utc::now() + chrono::Duration::seconds(5))
            .await
            .unwrap();

        let (topics, total) = repo
            .list_by_board(1, &ListParams::new(1, 10))
            .await
            .expect("list");

        assert_eq!(total, 2);
        assert_eq!(topics[0].subject, "First");
        assert_eq!(topics[1].subject, "Second");
        assert_eq!(topics[0].reply_count, 0);
    }

    #[tokio::test]
    async fn test_list_by_board_pagination_limit() {
        let (repo, _pool, user_id) = setup().await;

        for i in 0..12 {
            repo.create_with_first_post(&new_topic(1, user_id, &format!("Topic {}", i)))
                .await
                .unwrap();
        }

        let (page1, total) = repo
            .list_by_board(1, &ListParams::new(1, 10))
            .await
            .expect("list");
        assert_eq!(total, 12);
        assert_eq!(page1.len(), 10);

        let (page2, _) = repo
            .list_by_board(1, &ListParams::new(2, 10))
            .await
            .expect("list");
        assert_eq!(page2.len(), 2);
    }

    #[tokio::test]
    async fn test_record_view_increments_once_per_viewer() {
        let (repo, _pool, user_id) = setup().await;

        let (topic, _) = repo
            .create_with_first_post(&new_topic(1, user_id, "Counted"))
            .await
            .unwrap();

        assert!(repo.record_view(topic.id, "viewer-a").await.unwrap());
        assert!(!repo.record_view(topic.id, "viewer-a").await.unwrap());
        assert!(!repo.record_view(topic.id, "viewer-a").await.unwrap());
        assert!(repo.record_view(topic.id, "viewer-b").await.unwrap());

        let reloaded = repo.get_in_board(1, topic.id).await.unwrap().unwrap();
        assert_eq!(reloaded.views, 2);
    }
}
