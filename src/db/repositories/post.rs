//! Post repository
//!
//! Database operations for posts within a topic. Listing joins the
//! author so pages can show usernames and avatars without extra lookups.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{ListParams, Post, PostView};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

/// Post repository trait
#[async_trait]
pub trait PostRepository: Send + Sync {
    /// Create a reply post in a topic
    async fn create(&self, topic_id: i64, created_by: i64, message: &str) -> Result<Post>;

    /// Get a post by ID, scoped to a topic.
    ///
    /// Returns `None` when the post doesn't exist or belongs to a
    /// different topic.
    async fn get_in_topic(&self, topic_id: i64, post_id: i64) -> Result<Option<Post>>;

    /// List posts for a topic, oldest first, paginated, with author info.
    /// Returns the page of posts and the total post count.
    async fn list_by_topic(
        &self,
        topic_id: i64,
        params: &ListParams,
    ) -> Result<(Vec<PostView>, i64)>;

    /// Replace a post's message, stamping who edited it and when
    async fn update_message(
        &self,
        post_id: i64,
        message: &str,
        editor_id: i64,
        at: DateTime<Utc>,
    ) -> Result<()>;
}

/// SQLx-based post repository supporting SQLite and MySQL
pub struct SqlxPostRepository {
    pool: DynDatabasePool,
}

impl SqlxPostRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a shared repository for dependency injection
    pub fn shared(pool: DynDatabasePool) -> Arc<dyn PostRepository> {
        Arc::new(Self::new(pool))
    }
}

const LIST_SQL: &str = r#"
    SELECT p.id, p.topic_id, p.created_by, p.message, p.created_at, p.updated_at,
           u.username AS author_name, u.email AS author_email
    FROM posts p
    JOIN users u ON u.id = p.created_by
    WHERE p.topic_id = ?
    ORDER BY p.created_at ASC, p.id ASC
    LIMIT ? OFFSET ?
"#;

#[async_trait]
impl PostRepository for SqlxPostRepository {
    async fn create(&self, topic_id: i64, created_by: i64, message: &str) -> Result<Post> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                create_sqlite(self.pool.as_sqlite().unwrap(), topic_id, created_by, message).await
            }
            DatabaseDriver::Mysql => {
                create_mysql(self.pool.as_mysql().unwrap(), topic_id, created_by, message).await
            }
        }
    }

    async fn get_in_topic(&self, topic_id: i64, post_id: i64) -> Result<Option<Post>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                get_in_topic_sqlite(self.pool.as_sqlite().unwrap(), topic_id, post_id).await
            }
            DatabaseDriver::Mysql => {
                get_in_topic_mysql(self.pool.as_mysql().unwrap(), topic_id, post_id).await
            }
        }
    }

    async fn list_by_topic(
        &self,
        topic_id: i64,
        params: &ListParams,
    ) -> Result<(Vec<PostView>, i64)> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                list_by_topic_sqlite(self.pool.as_sqlite().unwrap(), topic_id, params).await
            }
            DatabaseDriver::Mysql => {
                list_by_topic_mysql(self.pool.as_mysql().unwrap(), topic_id, params).await
            }
        }
    }

    async fn update_message(
        &self,
        post_id: i64,
        message: &str,
        editor_id: i64,
        at: DateTime<Utc>,
    ) -> Result<()> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                update_message_sqlite(self.pool.as_sqlite().unwrap(), post_id, message, editor_id, at)
                    .await
            }
            DatabaseDriver::Mysql => {
                update_message_mysql(self.pool.as_mysql().unwrap(), post_id, message, editor_id, at)
                    .await
            }
        }
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_sqlite(
    pool: &SqlitePool,
    topic_id: i64,
    created_by: i64,
    message: &str,
) -> Result<Post> {
    let now = Utc::now();
    let result = sqlx::query(
        r#"
        INSERT INTO posts (topic_id, created_by, message, created_at)
        VALUES (?, ?, ?, ?)
        "#,
    )
    .bind(topic_id)
    .bind(created_by)
    .bind(message)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create post")?;

    Ok(Post {
        id: result.last_insert_rowid(),
        topic_id,
        created_by,
        message: message.to_string(),
        created_at: now,
        updated_at: None,
        updated_by: None,
    })
}

async fn get_in_topic_sqlite(
    pool: &SqlitePool,
    topic_id: i64,
    post_id: i64,
) -> Result<Option<Post>> {
    let row = sqlx::query("SELECT * FROM posts WHERE id = ? AND topic_id = ?")
        .bind(post_id)
        .bind(topic_id)
        .fetch_optional(pool)
        .await
        .context("Failed to get post")?;

    Ok(row.map(map_post_sqlite))
}

async fn list_by_topic_sqlite(
    pool: &SqlitePool,
    topic_id: i64,
    params: &ListParams,
) -> Result<(Vec<PostView>, i64)> {
    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM posts WHERE topic_id = ?")
        .bind(topic_id)
        .fetch_one(pool)
        .await
        .context("Failed to count posts")?;

    let rows = sqlx::query(LIST_SQL)
        .bind(topic_id)
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(pool)
        .await
        .context("Failed to list posts")?;

    Ok((rows.into_iter().map(map_post_view_sqlite).collect(), total))
}

async fn update_message_sqlite(
    pool: &SqlitePool,
    post_id: i64,
    message: &str,
    editor_id: i64,
    at: DateTime<Utc>,
) -> Result<()> {
    sqlx::query("UPDATE posts SET message = ?, updated_by = ?, updated_at = ? WHERE id = ?")
        .bind(message)
        .bind(editor_id)
        .bind(at)
        .bind(post_id)
        .execute(pool)
        .await
        .context("Failed to update post")?;
    Ok(())
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_mysql(
    pool: &MySqlPool,
    topic_id: i64,
    created_by: i64,
    message: &str,
) -> Result<Post> {
    let now = Utc::now();
    let result = sqlx::query(
        r#"
        INSERT INTO posts (topic_id, created_by, message, created_at)
        VALUES (?, ?, ?, ?)
        "#,
    )
    .bind(topic_id)
    .bind(created_by)
    .bind(message)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create post")?;

    Ok(Post {
        id: result.last_insert_id() as i64,
        topic_id,
        created_by,
        message: message.to_string(),
        created_at: now,
        updated_at: None,
        updated_by: None,
    })
}

async fn get_in_topic_mysql(
    pool: &MySqlPool,
    topic_id: i64,
    post_id: i64,
) -> Result<Option<Post>> {
    let row = sqlx::query("SELECT * FROM posts WHERE id = ? AND topic_id = ?")
        .bind(post_id)
        .bind(topic_id)
        .fetch_optional(pool)
        .await
        .context("Failed to get post")?;

    Ok(row.map(map_post_mysql))
}

async fn list_by_topic_mysql(
    pool: &MySqlPool,
    topic_id: i64,
    params: &ListParams,
) -> Result<(Vec<PostView>, i64)> {
    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM posts WHERE topic_id = ?")
        .bind(topic_id)
        .fetch_one(pool)
        .await
        .context("Failed to count posts")?;

    let rows = sqlx::query(LIST_SQL)
        .bind(topic_id)
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(pool)
        .await
        .context("Failed to list posts")?;

    Ok((rows.into_iter().map(map_post_view_mysql).collect(), total))
}

async fn update_message_mysql(
    pool: &MySqlPool,
    post_id: i64,
    message: &str,
    editor_id: i64,
    at: DateTime<Utc>,
) -> Result<()> {
    sqlx::query("UPDATE posts SET message = ?, updated_by = ?, updated_at = ? WHERE id = ?")
        .bind(message)
        .bind(editor_id)
        .bind(at)
        .bind(post_id)
        .execute(pool)
        .await
        .context("Failed to update post")?;
    Ok(())
}

// ============================================================================
// Row mapping
// ============================================================================

fn map_post_sqlite(row: sqlx::sqlite::SqliteRow) -> Post {
    Post {
        id: row.get("id"),
        topic_id: row.get("topic_id"),
        created_by: row.get("created_by"),
        message: row.get("message"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        updated_by: row.get("updated_by"),
    }
}

fn map_post_mysql(row: sqlx::mysql::MySqlRow) -> Post {
    Post {
        id: row.get("id"),
        topic_id: row.get("topic_id"),
        created_by: row.get("created_by"),
        message: row.get("message"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        updated_by: row.get("updated_by"),
    }
}

fn map_post_view_sqlite(row: sqlx::sqlite::SqliteRow) -> PostView {
    let email: String = row.get("author_email");
    PostView {
        id: row.get("id"),
        topic_id: row.get("topic_id"),
        created_by: row.get("created_by"),
        author_name: row.get("author_name"),
        avatar_url: PostView::gravatar_url(&email),
        message: row.get("message"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn map_post_view_mysql(row: sqlx::mysql::MySqlRow) -> PostView {
    let email: String = row.get("author_email");
    PostView {
        id: row.get("id"),
        topic_id: row.get("topic_id"),
        created_by: row.get("created_by"),
        author_name: row.get("author_name"),
        avatar_url: PostView::gravatar_url(&email),
        message: row.get("message"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{
        SqlxTopicRepository, SqlxUserRepository, TopicRepository, UserRepository,
    };
    use crate::db::{create_test_pool, migrations};
    use crate::models::{NewTopic, User};

    async fn setup() -> (SqlxPostRepository, i64, i64) {
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

        let topics = SqlxTopicRepository::new(pool.clone());
        let (topic, _first) = topics
            .create_with_first_post(&NewTopic {
                board_id: 1,
                starter_id: user.id,
                subject: "Discussion".to_string(),
                message: "Opening message".to_string(),
            })
            .await
            .expect("topic");

        (SqlxPostRepository::new(pool), topic.id, user.id)
    }

    #[tokio::test]
    async fn test_create_and_get_post() {
        let (repo, topic_id, user_id) = setup().await;

        let post = repo
            .create(topic_id, user_id, "A reply")
            .await
            .expect("create");
        assert!(post.id > 0);
        assert!(post.updated_at.is_none());

        let loaded = repo
            .get_in_topic(topic_id, post.id)
            .await
            .expect("get")
            .unwrap();
        assert_eq!(loaded.message, "A reply");
        assert_eq!(loaded.created_by, user_id);
    }

    #[tokio::test]
    async fn test_get_in_topic_scopes_to_topic() {
        let (repo, topic_id, user_id) = setup().await;

        let post = repo
            .create(topic_id, user_id, "A reply")
            .await
            .expect("create");

        // Wrong topic, not found
        assert!(repo
            .get_in_topic(topic_id + 100, post.id)
            .await
            .expect("get")
            .is_none());
    }

    #[tokio::test]
    async fn test_list_by_topic_oldest_first() {
        let (repo, topic_id, user_id) = setup().await;

        repo.create(topic_id, user_id, "First reply").await.unwrap();
        repo.create(topic_id, user_id, "Second reply").await.unwrap();

        let (posts, total) = repo
            .list_by_topic(topic_id, &ListParams::new(1, 10))
            .await
            .expect("list");

        // Opening post plus two replies, in posting order
        assert_eq!(total, 3);
        assert_eq!(posts[0].message, "Opening message");
        assert_eq!(posts[2].message, "Second reply");
        assert_eq!(posts[0].author_name, "jane");
        assert!(posts[0].avatar_url.contains("gravatar.com"));
    }

    #[tokio::test]
    async fn test_list_by_topic_pagination() {
        let (repo, topic_id, user_id) = setup().await;

        for i in 0..3 {
            repo.create(topic_id, user_id, &format!("Reply {}", i))
                .await
                .unwrap();
        }

        // Two per page, four posts total including the opener
        let (page1, total) = repo
            .list_by_topic(topic_id, &ListParams::new(1, 2))
            .await
            .expect("list");
        assert_eq!(total, 4);
        assert_eq!(page1.len(), 2);
        assert_eq!(page1[0].message, "Opening message");

        let (page2, _) = repo
            .list_by_topic(topic_id, &ListParams::new(2, 2))
            .await
            .expect("list");
        assert_eq!(page2.len(), 2);
        assert_eq!(page2[0].message, "Reply 1");
    }

    #[tokio::test]
    async fn test_update_message_stamps_editor() {
        let (repo, topic_id, user_id) = setup().await;

        let post = repo
            .create(topic_id, user_id, "Original")
            .await
            .expect("create");

        repo.update_message(post.id, "Edited", user_id, Utc::now())
            .await
            .expect("update");

        let loaded = repo
            .get_in_topic(topic_id, post.id)
            .await
            .expect("get")
            .unwrap();
        assert_eq!(loaded.message, "Edited");
        assert_eq!(loaded.updated_by, Some(user_id));
        assert!(loaded.updated_at.is_some());
    }
}
