use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A media attachment row. The bytes live in the blob store under `blob_name`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Media {
    pub post_id: i32,
    pub blob_name: String,
    pub content_type: String,
    pub created_at: DateTime<Utc>,
    pub restricted: bool,
}

/// What the media endpoint returns for each attachment.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaLink {
    pub url: String,
    pub content_type: String,
    pub name: String,
    pub post_id: i32,
}
