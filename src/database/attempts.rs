use std::sync::Arc;

use sqlx::sqlite::SqlitePool;

use crate::attempt::NewAttempt;
use crate::create_timestamp;
use crate::routes::{Attempt, Task};

pub async fn fetch_task(id: u32, pool: Arc<SqlitePool>) -> sqlx::Result<Option<Task>> {
    sqlx::query_as::<_, Task>(
        r#"
        SELECT id, lesson_id, title, description, starter_code, checker_code
        FROM tasks
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(pool.as_ref())
    .await
}

/// Appends one attempt; rows in `attempts` are never updated or deleted
pub async fn insert_attempt(attempt: &NewAttempt, pool: Arc<SqlitePool>) -> sqlx::Result<Attempt> {
    let now = create_timestamp();

    sqlx::query_as::<_, Attempt>(
        r#"
        INSERT INTO attempts (task_id, user_id, code, is_passed, output, created_time)
        VALUES (?, ?, ?, ?, ?, ?)
        RETURNING id, task_id, user_id, code, is_passed, output, created_time
        "#,
    )
    .bind(attempt.task_id)
    .bind(attempt.user_id)
    .bind(&attempt.code)
    .bind(attempt.is_passed)
    .bind(&attempt.output)
    .bind(now)
    .fetch_one(pool.as_ref())
    .await
}

/// Attempts of a user on a task, oldest first
pub async fn fetch_attempts(
    task_id: u32,
    user_id: u32,
    pool: Arc<SqlitePool>,
) -> sqlx::Result<Vec<Attempt>> {
    sqlx::query_as::<_, Attempt>(
        r#"
        SELECT id, task_id, user_id, code, is_passed, output, created_time
        FROM attempts
        WHERE task_id = ? AND user_id = ?
        ORDER BY id
        "#,
    )
    .bind(task_id)
    .bind(user_id)
    .fetch_all(pool.as_ref())
    .await
}

pub async fn count_attempts(pool: Arc<SqlitePool>) -> sqlx::Result<u32> {
    let (count,): (u32,) = sqlx::query_as("SELECT COUNT(*) FROM attempts")
        .fetch_one(pool.as_ref())
        .await?;

    Ok(count)
}
