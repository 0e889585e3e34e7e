use async_trait::async_trait;
use deadpool_postgres::Pool;
use tokio_postgres::Row;

use crate::{
    error::Result,
    models::post::{Post, PostDraft},
};

/// How many posts the listing endpoints return.
pub const RECENT_POSTS_LIMIT: i64 = 10;

#[async_trait]
pub trait PostRepository: Send + Sync {
    /// Newest first. Restricted posts are left out unless asked for.
    async fn recent(&self, include_restricted: bool) -> Result<Vec<Post>>;
    async fn find(&self, post_id: i32) -> Result<Option<Post>>;
    async fn create(&self, draft: &PostDraft, author_id: i32) -> Result<Post>;
    async fn update(&self, post_id: i32, draft: &PostDraft, author_id: i32) -> Result<Option<Post>>;
    async fn delete(&self, post_id: i32) -> Result<bool>;
}

const POST_COLUMNS: &str = "post_id, title, content, user_id, created_at, updated_at, restricted";

fn row_to_post(row: &Row) -> Result<Post> {
    Ok(Post {
        post_id: row.try_get("post_id")?,
        title: row.try_get("title")?,
        content: row.try_get("content")?,
        user_id: row.try_get("user_id")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        restricted: row.try_get("restricted")?,
    })
}

#[derive(Clone)]
pub struct PgPostRepository {
    pool: Pool,
}

impl PgPostRepository {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PostRepository for PgPostRepository {
    async fn recent(&self, include_restricted: bool) -> Result<Vec<Post>> {
        let client = self.pool.get().await?;
        let rows = client
            .query(
                &format!(
                    r#"
                    SELECT {}
                    FROM posts
                    WHERE $1 OR restricted = false
                    ORDER BY created_at DESC
                    LIMIT $2
                    "#,
                    POST_COLUMNS
                ),
                &[&include_restricted, &RECENT_POSTS_LIMIT],
            )
            .await?;
        rows.iter().map(row_to_post).collect()
    }

    async fn find(&self, post_id: i32) -> Result<Option<Post>> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                &format!("SELECT {} FROM posts WHERE post_id = $1", POST_COLUMNS),
                &[&post_id],
            )
            .await?;
        row.map(|r| row_to_post(&r)).transpose()
    }

    async fn create(&self, draft: &PostDraft, author_id: i32) -> Result<Post> {
        let client = self.pool.get().await?;
        let row = client
            .query_one(
                &format!(
                    r#"
                    INSERT INTO posts (title, content, restricted, user_id)
                    VALUES ($1, $2, $3, $4)
                    RETURNING {}
                    "#,
                    POST_COLUMNS
                ),
                &[&draft.title, &draft.content, &draft.restricted, &author_id],
            )
            .await?;
        tracing::info!("📝 Created post {}", draft.title);
        row_to_post(&row)
    }

    async fn update(&self, post_id: i32, draft: &PostDraft, author_id: i32) -> Result<Option<Post>> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                &format!(
                    r#"
                    UPDATE posts
                    SET
                        title = $1,
                        content = $2,
                        restricted = $3,
                        user_id = $4,
                        updated_at = NOW()
                    WHERE post_id = $5
                    RETURNING {}
                    "#,
                    POST_COLUMNS
                ),
                &[&draft.title, &draft.content, &draft.restricted, &author_id, &post_id],
            )
            .await?;
        row.map(|r| row_to_post(&r)).transpose()
    }

    async fn delete(&self, post_id: i32) -> Result<bool> {
        let client = self.pool.get().await?;
        let removed = client
            .execute("DELETE FROM posts WHERE post_id = $1", &[&post_id])
            .await?;
        Ok(removed > 0)
    }
}
