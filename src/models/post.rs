use chrono::{DateTime, Utc};
use garde::Validate;
use serde::{Deserialize, Serialize};

/// Represents a blog post.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub post_id: i32,
    pub title: String,
    pub content: String,
    /// The author.
    #[serde(rename = "userId")]
    pub user_id: i32,
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
    /// Restricted posts are only visible to users with elevated access.
    pub restricted: bool,
}

/// Title, body and visibility of a post, as written by an admin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct PostDraft {
    #[garde(length(min = 1))]
    pub title: String,
    #[garde(length(min = 1))]
    pub content: String,
    #[serde(default)]
    #[garde(skip)]
    pub restricted: bool,
}

/// Envelope used by the create and update endpoints.
#[derive(Debug, Deserialize)]
pub struct PostRequest {
    #[serde(rename = "postData")]
    pub post_data: PostDraft,
}
