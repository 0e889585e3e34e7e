//! In-process repositories used when no database is configured and by the
//! test suites.

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::BTreeMap;

use crate::{
    error::{AppError, Result},
    models::{
        media::Media,
        post::{Post, PostDraft},
        user::{NewUser, User, UserCredentials, UserUpdate},
    },
    repositories::{
        media::MediaRepository,
        post::{PostRepository, RECENT_POSTS_LIMIT},
        user::UserRepository,
    },
};

#[derive(Default)]
pub struct MemoryUserRepository {
    rows: Mutex<BTreeMap<i32, UserCredentials>>,
}

#[async_trait]
impl UserRepository for MemoryUserRepository {
    async fn create(&self, user: NewUser) -> Result<User> {
        let mut rows = self.rows.lock();
        if rows.values().any(|row| row.user.email == user.email) {
            return Err(AppError::bad_request(
                "could not create account",
                "email is already registered",
            ));
        }

        let id = rows.keys().next_back().map_or(1, |last| last + 1);
        let now = Utc::now();
        let created = User {
            id,
            first_name: user.first_name,
            last_name: user.last_name,
            email: user.email,
            role: user.role,
            email_notification: user.email_notification,
            created_at: now,
            updated_at: now,
        };
        rows.insert(
            id,
            UserCredentials {
                user: created.clone(),
                password_hash: user.password_hash,
            },
        );
        Ok(created)
    }

    async fn find_by_id(&self, id: i32) -> Result<Option<User>> {
        Ok(self.rows.lock().get(&id).map(|row| row.user.clone()))
    }

    async fn find_credentials(&self, email: &str) -> Result<Option<UserCredentials>> {
        Ok(self
            .rows
            .lock()
            .values()
            .find(|row| row.user.email == email)
            .cloned())
    }

    async fn update(&self, id: i32, update: &UserUpdate) -> Result<Option<User>> {
        let mut rows = self.rows.lock();
        let Some(row) = rows.get_mut(&id) else {
            return Ok(None);
        };
        let user = &mut row.user;
        user.first_name = update.first_name.clone();
        user.last_name = update.last_name.clone();
        user.email = update.email.clone();
        user.role = update.role;
        user.email_notification = update.email_notification;
        user.updated_at = Utc::now();
        Ok(Some(user.clone()))
    }

    async fn delete(&self, id: i32) -> Result<bool> {
        Ok(self.rows.lock().remove(&id).is_some())
    }

    async fn list(&self) -> Result<Vec<User>> {
        Ok(self.rows.lock().values().map(|row| row.user.clone()).collect())
    }

    async fn subscribers(&self) -> Result<Vec<User>> {
        Ok(self
            .rows
            .lock()
            .values()
            .filter(|row| row.user.email_notification)
            .map(|row| row.user.clone())
            .collect())
    }
}

#[derive(Default)]
pub struct MemoryPostRepository {
    rows: Mutex<BTreeMap<i32, Post>>,
}

#[async_trait]
impl PostRepository for MemoryPostRepository {
    async fn recent(&self, include_restricted: bool) -> Result<Vec<Post>> {
        let rows = self.rows.lock();
        // Ids grow with creation time, so reverse id order is newest first.
        Ok(rows
            .values()
            .rev()
            .filter(|post| include_restricted || !post.restricted)
            .take(RECENT_POSTS_LIMIT as usize)
            .cloned()
            .collect())
    }

    async fn find(&self, post_id: i32) -> Result<Option<Post>> {
        Ok(self.rows.lock().get(&post_id).cloned())
    }

    async fn create(&self, draft: &PostDraft, author_id: i32) -> Result<Post> {
        let mut rows = self.rows.lock();
        let post_id = rows.keys().next_back().map_or(1, |last| last + 1);
        let now = Utc::now();
        let post = Post {
            post_id,
            title: draft.title.clone(),
            content: draft.content.clone(),
            user_id: author_id,
            created_at: now,
            updated_at: now,
            restricted: draft.restricted,
        };
        rows.insert(post_id, post.clone());
        Ok(post)
    }

    async fn update(&self, post_id: i32, draft: &PostDraft, author_id: i32) -> Result<Option<Post>> {
        let mut rows = self.rows.lock();
        let Some(post) = rows.get_mut(&post_id) else {
            return Ok(None);
        };
        post.title = draft.title.clone();
        post.content = draft.content.clone();
        post.restricted = draft.restricted;
        post.user_id = author_id;
        post.updated_at = Utc::now();
        Ok(Some(post.clone()))
    }

    async fn delete(&self, post_id: i32) -> Result<bool> {
        Ok(self.rows.lock().remove(&post_id).is_some())
    }
}

#[derive(Default)]
pub struct MemoryMediaRepository {
    rows: Mutex<Vec<Media>>,
}

#[async_trait]
impl MediaRepository for MemoryMediaRepository {
    async fn for_post(&self, post_id: i32) -> Result<Vec<Media>> {
        Ok(self
            .rows
            .lock()
            .iter()
            .filter(|media| media.post_id == post_id)
            .cloned()
            .collect())
    }

    async fn insert(
        &self,
        post_id: i32,
        blob_name: &str,
        content_type: &str,
        restricted: bool,
    ) -> Result<Media> {
        let media = Media {
            post_id,
            blob_name: blob_name.to_string(),
            content_type: content_type.to_string(),
            created_at: Utc::now(),
            restricted,
        };
        self.rows.lock().push(media.clone());
        Ok(media)
    }

    async fn delete_for_post(&self, post_id: i32) -> Result<Vec<Media>> {
        let mut rows = self.rows.lock();
        let (removed, kept): (Vec<Media>, Vec<Media>) =
            rows.drain(..).partition(|media| media.post_id == post_id);
        *rows = kept;
        Ok(removed)
    }
}
