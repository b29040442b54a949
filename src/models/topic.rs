//! Topic model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Topic entity
///
/// A topic always owns at least one post: the first post is created in the
/// same transaction as the topic itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Topic {
    pub id: i64,
    pub board_id: i64,
    pub starter_id: i64,
    pub subject: String,
    pub views: i64,
    pub last_updated: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Input for creating a topic together with its first post
#[derive(Debug, Clone)]
pub struct NewTopic {
    pub board_id: i64,
    pub starter_id: i64,
    pub subject: String,
    pub message: String,
}

/// Topic with starter name and reply count for board listings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicSummary {
    pub id: i64,
    pub board_id: i64,
    pub subject: String,
    pub starter_name: String,
    pub views: i64,
    /// Number of posts excluding the opening post
    pub reply_count: i64,
    pub last_updated: DateTime<Utc>,
}
