//! Post model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Post entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: i64,
    pub topic_id: i64,
    pub created_by: i64,
    pub message: String,
    pub created_at: DateTime<Utc>,
    /// Set when the author edits the post
    pub updated_at: Option<DateTime<Utc>>,
    pub updated_by: Option<i64>,
}

/// Post with author info for topic pages
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostView {
    pub id: i64,
    pub topic_id: i64,
    pub created_by: i64,
    pub author_name: String,
    pub avatar_url: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl PostView {
    /// Generate Gravatar URL from the author's email
    pub fn gravatar_url(email: &str) -> String {
        if email.is_empty() {
            return "https://www.gravatar.com/avatar/?d=mp&s=80".to_string();
        }
        let hash = format!("{:x}", md5::compute(email.trim().to_lowercase()));
        format!("https://www.gravatar.com/avatar/{}?d=mp&s=80", hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gravatar_url_hashes_normalized_email() {
        let a = PostView::gravatar_url("User@Example.com ");
        let b = PostView::gravatar_url("user@example.com");
        assert_eq!(a, b);
        assert!(a.starts_with("https://www.gravatar.com/avatar/"));
    }

    #[test]
    fn test_gravatar_url_empty_email_uses_placeholder() {
        let url = PostView::gravatar_url("");
        assert_eq!(url, "https://www.gravatar.com/avatar/?d=mp&s=80");
    }
}
