use std::sync::Arc;

use sqlx::sqlite::SqlitePool;

use crate::create_timestamp;
use crate::routes::UserRecord;

pub async fn fetch_user(id: u32, pool: Arc<SqlitePool>) -> sqlx::Result<Option<UserRecord>> {
    sqlx::query_as::<_, UserRecord>("SELECT id, username, password FROM users WHERE id = ?")
        .bind(id)
        .fetch_optional(pool.as_ref())
        .await
}

/// Looks the name up, registering it with `password` when it is new
///
/// The insert is a no-op for a taken name, so concurrent first logins under
/// one name all end up with the same row. Returns the row and whether it was
/// created by this call.
pub async fn find_or_create_user(
    username: &str,
    password: &str,
    pool: Arc<SqlitePool>,
) -> sqlx::Result<(UserRecord, bool)> {
    let inserted = sqlx::query(
        "INSERT INTO users (username, password) VALUES (?, ?) ON CONFLICT(username) DO NOTHING",
    )
    .bind(username)
    .bind(password)
    .execute(pool.as_ref())
    .await?
    .rows_affected();

    let user = sqlx::query_as::<_, UserRecord>(
        "SELECT id, username, password FROM users WHERE username = ?",
    )
    .bind(username)
    .fetch_one(pool.as_ref())
    .await?;

    Ok((user, inserted == 1))
}

/// Opens a session for the user and returns its bearer token
pub async fn create_session(user_id: u32, pool: Arc<SqlitePool>) -> sqlx::Result<String> {
    let now = create_timestamp();

    let (token,): (String,) = sqlx::query_as(
        r#"
        INSERT INTO sessions (token, user_id, created_time)
        VALUES (lower(hex(randomblob(16))), ?, ?)
        RETURNING token
        "#,
    )
    .bind(user_id)
    .bind(now)
    .fetch_one(pool.as_ref())
    .await?;

    Ok(token)
}

/// Resolves a bearer token to the id of its user
pub async fn session_user(token: &str, pool: Arc<SqlitePool>) -> sqlx::Result<Option<u32>> {
    let row: Option<(u32,)> = sqlx::query_as("SELECT user_id FROM sessions WHERE token = ?")
        .bind(token)
        .fetch_optional(pool.as_ref())
        .await?;

    Ok(row.map(|(user_id,)| user_id))
}

/// Returns whether a session was removed
pub async fn delete_session(token: &str, pool: Arc<SqlitePool>) -> sqlx::Result<bool> {
    let result = sqlx::query("DELETE FROM sessions WHERE token = ?")
        .bind(token)
        .execute(pool.as_ref())
        .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn favorite_course_ids(user_id: u32, pool: Arc<SqlitePool>) -> sqlx::Result<Vec<u32>> {
    let rows: Vec<(u32,)> = sqlx::query_as(
        "SELECT course_id FROM favorite_courses WHERE user_id = ? ORDER BY course_id",
    )
    .bind(user_id)
    .fetch_all(pool.as_ref())
    .await?;

    Ok(rows.into_iter().map(|(id,)| id).collect())
}

/// Flips the favorite flag of a course for a user and returns the new state
pub async fn toggle_favorite(
    user_id: u32,
    course_id: u32,
    pool: Arc<SqlitePool>,
) -> sqlx::Result<bool> {
    let mut tx = pool.begin().await?;

    let removed = sqlx::query("DELETE FROM favorite_courses WHERE user_id = ? AND course_id = ?")
        .bind(user_id)
        .bind(course_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

    if removed == 0 {
        sqlx::query("INSERT INTO favorite_courses (user_id, course_id) VALUES (?, ?)")
            .bind(user_id)
            .bind(course_id)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;
    Ok(removed == 0)
}
