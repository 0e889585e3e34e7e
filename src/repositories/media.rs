use async_trait::async_trait;
use deadpool_postgres::Pool;
use tokio_postgres::Row;

use crate::{error::Result, models::media::Media};

#[async_trait]
pub trait MediaRepository: Send + Sync {
    async fn for_post(&self, post_id: i32) -> Result<Vec<Media>>;
    async fn insert(
        &self,
        post_id: i32,
        blob_name: &str,
        content_type: &str,
        restricted: bool,
    ) -> Result<Media>;
    /// Removes every attachment of a post and returns the removed rows so
    /// their blobs can be deleted too.
    async fn delete_for_post(&self, post_id: i32) -> Result<Vec<Media>>;
}

const MEDIA_COLUMNS: &str = "post_id, blob_name, content_type, created_at, restricted";

fn row_to_media(row: &Row) -> Result<Media> {
    Ok(Media {
        post_id: row.try_get("post_id")?,
        blob_name: row.try_get("blob_name")?,
        content_type: row.try_get("content_type")?,
        created_at: row.try_get("created_at")?,
        restricted: row.try_get("restricted")?,
    })
}

#[derive(Clone)]
pub struct PgMediaRepository {
    pool: Pool,
}

impl PgMediaRepository {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MediaRepository for PgMediaRepository {
    async fn for_post(&self, post_id: i32) -> Result<Vec<Media>> {
        let client = self.pool.get().await?;
        let rows = client
            .query(
                &format!(
                    "SELECT {} FROM media WHERE post_id = $1 ORDER BY created_at ASC",
                    MEDIA_COLUMNS
                ),
                &[&post_id],
            )
            .await?;
        rows.iter().map(row_to_media).collect()
    }

    async fn insert(
        &self,
        post_id: i32,
        blob_name: &str,
        content_type: &str,
        restricted: bool,
    ) -> Result<Media> {
        let client = self.pool.get().await?;
        let row = client
            .query_one(
                &format!(
                    r#"
                    INSERT INTO media (post_id, blob_name, content_type, restricted)
                    VALUES ($1, $2, $3, $4)
                    RETURNING {}
                    "#,
                    MEDIA_COLUMNS
                ),
                &[&post_id, &blob_name, &content_type, &restricted],
            )
            .await?;
        tracing::debug!("🖼️ Media {} attached to post {}", blob_name, post_id);
        row_to_media(&row)
    }

    async fn delete_for_post(&self, post_id: i32) -> Result<Vec<Media>> {
        let client = self.pool.get().await?;
        let rows = client
            .query(
                &format!("DELETE FROM media WHERE post_id = $1 RETURNING {}", MEDIA_COLUMNS),
                &[&post_id],
            )
            .await?;
        rows.iter().map(row_to_media).collect()
    }
}
