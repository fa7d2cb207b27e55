//! Database query functions for users.

use anyhow::{Context, Result};
use sqlx::PgPool;
use uuid::Uuid;

use super::models::{AccountType, User};

/// Fields for a new user row. The id is assigned by the caller.
pub struct NewUser<'a> {
    pub id: Uuid,
    pub display_name: &'a str,
    pub email: Option<&'a str>,
    pub password_hash: Option<&'a str>,
    pub about_me: Option<&'a str>,
    pub account_type: AccountType,
}

/// Insert a new user. A duplicate email surfaces as a unique violation on
/// `users_email_key`.
pub async fn create_user(pool: &PgPool, new: NewUser<'_>) -> Result<User> {
    sqlx::query_as::<_, User>(
        r#"
        INSERT INTO users (id, display_name, email, password_hash, about_me, account_type)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING *
        "#,
    )
    .bind(new.id)
    .bind(new.display_name)
    .bind(new.email)
    .bind(new.password_hash)
    .bind(new.about_me)
    .bind(new.account_type)
    .fetch_one(pool)
    .await
    .context("failed to create user")
}

/// Fetch a user by id.
pub async fn get_user(pool: &PgPool, id: Uuid) -> Result<Option<User>> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("failed to get user")
}

/// Fetch a user by email (full accounts only; guests have none).
pub async fn get_user_by_email(pool: &PgPool, email: &str) -> Result<Option<User>> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
        .bind(email)
        .fetch_optional(pool)
        .await
        .context("failed to get user by email")
}

/// Partial profile update. `None` fields are left untouched.
pub async fn update_profile(
    pool: &PgPool,
    id: Uuid,
    display_name: Option<&str>,
    about_me: Option<&str>,
) -> Result<Option<User>> {
    sqlx::query_as::<_, User>(
        r#"
        UPDATE users
        SET display_name = COALESCE($2, display_name),
            about_me = COALESCE($3, about_me),
            updated_at = now()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(display_name)
    .bind(about_me)
    .fetch_optional(pool)
    .await
    .context("failed to update profile")
}

/// Store the avatar image URL for a user, returning the updated row if found.
pub async fn set_avatar_url(pool: &PgPool, id: Uuid, avatar_url: &str) -> Result<Option<User>> {
    sqlx::query_as::<_, User>(
        r#"
        UPDATE users
        SET avatar_url = $2, updated_at = now()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(avatar_url)
    .fetch_optional(pool)
    .await
    .context("failed to set avatar url")
}

/// Update the last-active timestamp for a user.
pub async fn touch_last_active(pool: &PgPool, id: Uuid) -> Result<()> {
    sqlx::query("UPDATE users SET last_active_at = now() WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await
        .context("failed to touch user")?;
    Ok(())
}

/// Resolve a batch of user ids to rows, for participant listings.
pub async fn get_users_by_ids(pool: &PgPool, ids: &[Uuid]) -> Result<Vec<User>> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ANY($1)")
        .bind(ids)
        .fetch_all(pool)
        .await
        .context("failed to get users by ids")
}
