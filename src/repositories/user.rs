use async_trait::async_trait;
use deadpool_postgres::Pool;
use tokio_postgres::{Row, error::SqlState};

use crate::{
    error::{AppError, Result},
    models::{
        role::Role,
        user::{NewUser, User, UserCredentials, UserUpdate},
    },
};

/// Persistence for user accounts.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Inserts a user. A duplicate email is a `BadRequest`.
    async fn create(&self, user: NewUser) -> Result<User>;
    async fn find_by_id(&self, id: i32) -> Result<Option<User>>;
    /// The only lookup that returns the password hash.
    async fn find_credentials(&self, email: &str) -> Result<Option<UserCredentials>>;
    async fn update(&self, id: i32, update: &UserUpdate) -> Result<Option<User>>;
    /// Returns whether a row was removed.
    async fn delete(&self, id: i32) -> Result<bool>;
    /// Every user, oldest first.
    async fn list(&self) -> Result<Vec<User>>;
    /// Users who opted into new-post emails.
    async fn subscribers(&self) -> Result<Vec<User>>;
}

const USER_COLUMNS: &str =
    "id, first_name, last_name, email, role, email_notification, created_at, updated_at";

/// A helper function to map a `tokio_postgres::Row` to a `User`.
fn row_to_user(row: &Row) -> Result<User> {
    let role: i32 = row.try_get("role")?;
    Ok(User {
        id: row.try_get("id")?,
        first_name: row.try_get("first_name")?,
        last_name: row.try_get("last_name")?,
        email: row.try_get("email")?,
        role: Role::try_from(role).map_err(|e| AppError::Internal(e.to_string()))?,
        email_notification: row.try_get("email_notification")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

/// PostgreSQL-backed [`UserRepository`].
#[derive(Clone)]
pub struct PgUserRepository {
    pool: Pool,
}

impl PgUserRepository {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn create(&self, user: NewUser) -> Result<User> {
        let client = self.pool.get().await?;
        let result = client
            .query_one(
                &format!(
                    r#"
                    INSERT INTO users (first_name, last_name, email, password, role, email_notification)
                    VALUES ($1, $2, $3, $4, $5, $6)
                    RETURNING {}
                    "#,
                    USER_COLUMNS
                ),
                &[
                    &user.first_name,
                    &user.last_name,
                    &user.email,
                    &user.password_hash,
                    &user.role.code(),
                    &user.email_notification,
                ],
            )
            .await;

        match result {
            Ok(row) => row_to_user(&row),
            Err(e) if e.code() == Some(&SqlState::UNIQUE_VIOLATION) => Err(AppError::bad_request(
                "could not create account",
                "email is already registered",
            )),
            Err(e) => Err(e.into()),
        }
    }

    async fn find_by_id(&self, id: i32) -> Result<Option<User>> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                &format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS),
                &[&id],
            )
            .await?;
        row.map(|r| row_to_user(&r)).transpose()
    }

    async fn find_credentials(&self, email: &str) -> Result<Option<UserCredentials>> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                &format!("SELECT {}, password FROM users WHERE email = $1", USER_COLUMNS),
                &[&email],
            )
            .await?;

        row.map(|r| {
            Ok(UserCredentials {
                user: row_to_user(&r)?,
                password_hash: r.try_get("password")?,
            })
        })
        .transpose()
    }

    async fn update(&self, id: i32, update: &UserUpdate) -> Result<Option<User>> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                &format!(
                    r#"
                    UPDATE users
                    SET
                        first_name = $1,
                        last_name = $2,
                        email = $3,
                        role = $4,
                        email_notification = $5,
                        updated_at = NOW()
                    WHERE id = $6
                    RETURNING {}
                    "#,
                    USER_COLUMNS
                ),
                &[
                    &update.first_name,
                    &update.last_name,
                    &update.email,
                    &update.role.code(),
                    &update.email_notification,
                    &id,
                ],
            )
            .await?;
        row.map(|r| row_to_user(&r)).transpose()
    }

    async fn delete(&self, id: i32) -> Result<bool> {
        let client = self.pool.get().await?;
        let removed = client
            .execute("DELETE FROM users WHERE id = $1", &[&id])
            .await?;
        Ok(removed > 0)
    }

    async fn list(&self) -> Result<Vec<User>> {
        let client = self.pool.get().await?;
        let rows = client
            .query(
                &format!("SELECT {} FROM users ORDER BY created_at ASC", USER_COLUMNS),
                &[],
            )
            .await?;
        rows.iter().map(row_to_user).collect()
    }

    async fn subscribers(&self) -> Result<Vec<User>> {
        let client = self.pool.get().await?;
        let rows = client
            .query(
                &format!(
                    "SELECT {} FROM users WHERE email_notification = true",
                    USER_COLUMNS
                ),
                &[],
            )
            .await?;
        rows.iter().map(row_to_user).collect()
    }
}
