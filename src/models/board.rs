//! Board model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Board entity
///
/// Boards are seeded by migrations; there is no creation path at runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Board {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

/// Board with aggregate counts for the home page
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoardSummary {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub topic_count: i64,
    pub post_count: i64,
}
