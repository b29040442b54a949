//! Forum service
//!
//! Implements business logic for boards, topics and posts:
//! - Board listing with aggregate counts
//! - Topic listing, creation (topic plus opening post) and view counting
//! - Replies, which bump the topic's last_updated timestamp
//! - Post editing, restricted to the original author

use crate::db::repositories::{BoardRepository, PostRepository, TopicRepository};
use crate::models::{
    Board, BoardSummary, ListParams, NewTopic, PagedResult, Post, PostView, Topic, TopicSummary,
};
use anyhow::{Context, Result};
use chrono::Utc;
use std::sync::Arc;

/// Topics shown per page on a board
pub const TOPICS_PER_PAGE: u32 = 10;

/// Posts shown per page in a topic
pub const POSTS_PER_PAGE: u32 = 2;

/// Error types for forum operations
#[derive(Debug, thiserror::Error)]
pub enum ForumError {
    /// The board, topic or post does not exist
    #[error("{0} not found")]
    NotFound(&'static str),

    /// Someone other than the post author tried to edit it
    #[error("Only the author can edit this post")]
    NotAuthor,

    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Forum service coordinating boards, topics and posts
pub struct ForumService {
    board_repo: Arc<dyn BoardRepository>,
    topic_repo: Arc<dyn TopicRepository>,
    post_repo: Arc<dyn PostRepository>,
}

impl ForumService {
    /// Create a new forum service with the given repositories
    pub fn new(
        board_repo: Arc<dyn BoardRepository>,
        topic_repo: Arc<dyn TopicRepository>,
        post_repo: Arc<dyn PostRepository>,
    ) -> Self {
        Self {
            board_repo,
            topic_repo,
            post_repo,
        }
    }

    /// List all boards with topic and post counts
    pub async fn list_boards(&self) -> Result<Vec<BoardSummary>, ForumError> {
        let boards = self
            .board_repo
            .list_all()
            .await
            .context("Failed to list boards")?;
        Ok(boards)
    }

    /// Get a board by ID
    pub async fn get_board(&self, board_id: i64) -> Result<Board, ForumError> {
        self.board_repo
            .get_by_id(board_id)
            .await
            .context("Failed to load board")?
            .ok_or(ForumError::NotFound("Board"))
    }

    /// List a page of topics for a board, most recently updated first
    pub async fn board_topics(
        &self,
        board_id: i64,
        page: u32,
    ) -> Result<(Board, PagedResult<TopicSummary>), ForumError> {
        let board = self.get_board(board_id).await?;

        let params = ListParams::new(page, TOPICS_PER_PAGE);
        let (topics, total) = self
            .topic_repo
            .list_by_board(board_id, &params)
            .await
            .context("Failed to list topics")?;

        Ok((board, PagedResult::new(topics, total, &params)))
    }

    /// Start a topic with its opening post.
    ///
    /// Validation of the subject and message happens at the form layer;
    /// this only checks that the board exists and persists both rows
    /// atomically.
    pub async fn create_topic(
        &self,
        board_id: i64,
        starter_id: i64,
        subject: String,
        message: String,
    ) -> Result<(Topic, Post), ForumError> {
        // 404 before insert so a bad board never hits the FK
        self.get_board(board_id).await?;

        let created = self
            .topic_repo
            .create_with_first_post(&NewTopic {
                board_id,
                starter_id,
                subject,
                message,
            })
            .await
            .context("Failed to create topic")?;
        Ok(created)
    }

    /// Get a topic by ID, scoped to its board
    pub async fn get_topic(&self, board_id: i64, topic_id: i64) -> Result<Topic, ForumError> {
        self.topic_repo
            .get_in_board(board_id, topic_id)
            .await
            .context("Failed to load topic")?
            .ok_or(ForumError::NotFound("Topic"))
    }

    /// List a page of posts for a topic, oldest first
    pub async fn topic_posts(
        &self,
        board_id: i64,
        topic_id: i64,
        page: u32,
    ) -> Result<(Topic, PagedResult<PostView>), ForumError> {
        let topic = self.get_topic(board_id, topic_id).await?;

        let params = ListParams::new(page, POSTS_PER_PAGE);
        let (posts, total) = self
            .post_repo
            .list_by_topic(topic_id, &params)
            .await
            .context("Failed to list posts")?;

        Ok((topic, PagedResult::new(posts, total, &params)))
    }

    /// Count a view of a topic for the given viewer token.
    ///
    /// Each viewer increments the counter at most once; repeat visits
    /// return `false`.
    pub async fn record_view(&self, topic_id: i64, viewer: &str) -> Result<bool, ForumError> {
        let counted = self
            .topic_repo
            .record_view(topic_id, viewer)
            .await
            .context("Failed to record view")?;
        Ok(counted)
    }

    /// Reply to a topic.
    ///
    /// Creates the post and bumps the topic's last_updated timestamp so
    /// the topic moves to the top of its board.
    pub async fn reply(
        &self,
        board_id: i64,
        topic_id: i64,
        user_id: i64,
        message: &str,
    ) -> Result<Post, ForumError> {
        let topic = self.get_topic(board_id, topic_id).await?;

        let post = self
            .post_repo
            .create(topic.id, user_id, message)
            .await
            .context("Failed to create reply")?;

        self.topic_repo
            .touch_last_updated(topic.id, post.created_at)
            .await
            .context("Failed to bump topic")?;

        Ok(post)
    }

    /// Load a post for editing, enforcing that the editor is its author
    pub async fn post_for_edit(
        &self,
        board_id: i64,
        topic_id: i64,
        post_id: i64,
        editor_id: i64,
    ) -> Result<Post, ForumError> {
        self.get_topic(board_id, topic_id).await?;

        let post = self
            .post_repo
            .get_in_topic(topic_id, post_id)
            .await
            .context("Failed to load post")?
            .ok_or(ForumError::NotFound("Post"))?;

        if post.created_by != editor_id {
            return Err(ForumError::NotAuthor);
        }
        Ok(post)
    }

    /// Replace a post's message, stamping the editor and edit time
    pub async fn edit_post(
        &self,
        board_id: i64,
        topic_id: i64,
        post_id: i64,
        editor_id: i64,
        message: &str,
    ) -> Result<(), ForumError> {
        let post = self
            .post_for_edit(board_id, topic_id, post_id, editor_id)
            .await?;

        self.post_repo
            .update_message(post.id, message, editor_id, Utc::now())
            .await
            .context("Failed to update post")?;
        Ok(())
    }
}
