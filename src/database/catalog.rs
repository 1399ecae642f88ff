use std::sync::Arc;

use sqlx::sqlite::SqlitePool;

use crate::create_timestamp;
use crate::routes::{
    CourseDetail, CourseProgress, CourseSummary, Lesson, LessonSummary, ModuleView, TaskView,
};

/// Lists every course, flagging the ones the user marked as favorite
pub async fn fetch_courses(
    user_id: Option<u32>,
    pool: Arc<SqlitePool>,
) -> sqlx::Result<Vec<CourseSummary>> {
    sqlx::query_as::<_, CourseSummary>(
        r#"
        SELECT c.id, c.title, c.description, c.category, c.duration, c.level, c.image_path, c.is_popular,
               EXISTS (
                   SELECT 1 FROM favorite_courses f WHERE f.course_id = c.id AND f.user_id = ?
               ) AS is_favorite
        FROM courses c
        ORDER BY c.id
        "#,
    )
    .bind(user_id)
    .fetch_all(pool.as_ref())
    .await
}

pub async fn fetch_course(id: u32, pool: Arc<SqlitePool>) -> sqlx::Result<Option<CourseDetail>> {
    sqlx::query_as::<_, CourseDetail>(
        r#"
        SELECT id, title, description, long_description, category, duration, level, image_path, materials_path
        FROM courses
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(pool.as_ref())
    .await
}

pub async fn find_course(id: u32, pool: Arc<SqlitePool>) -> sqlx::Result<bool> {
    let result: Option<(i32,)> = sqlx::query_as("SELECT 1 FROM courses WHERE id = ?")
        .bind(id)
        .fetch_optional(pool.as_ref())
        .await?;

    Ok(result.is_some())
}

/// Modules of a course in position order, each with its lessons
pub async fn fetch_modules(
    course_id: u32,
    user_id: Option<u32>,
    pool: Arc<SqlitePool>,
) -> sqlx::Result<Vec<ModuleView>> {
    let modules: Vec<(u32, u32, String)> = sqlx::query_as(
        "SELECT id, position, title FROM modules WHERE course_id = ? ORDER BY position, id",
    )
    .bind(course_id)
    .fetch_all(pool.as_ref())
    .await?;

    let lessons = sqlx::query_as::<_, LessonSummary>(
        r#"
        SELECT l.id, l.module_id, l.position, l.title,
               EXISTS (
                   SELECT 1 FROM lesson_completions lc WHERE lc.lesson_id = l.id AND lc.user_id = ?
               ) AS is_completed
        FROM lessons l JOIN modules m ON m.id = l.module_id
        WHERE m.course_id = ?
        ORDER BY l.position, l.id
        "#,
    )
    .bind(user_id)
    .bind(course_id)
    .fetch_all(pool.as_ref())
    .await?;

    let mut views: Vec<ModuleView> = modules
        .into_iter()
        .map(|(id, position, title)| ModuleView {
            id,
            position,
            title,
            lessons: Vec::new(),
        })
        .collect();

    for lesson in lessons {
        if let Some(module) = views.iter_mut().find(|m| m.id == lesson.module_id) {
            module.lessons.push(lesson);
        }
    }

    Ok(views)
}

pub async fn fetch_lesson(id: u32, pool: Arc<SqlitePool>) -> sqlx::Result<Option<Lesson>> {
    sqlx::query_as::<_, Lesson>(
        r#"
        SELECT l.id, l.module_id, m.course_id, l.position, l.title, l.content
        FROM lessons l JOIN modules m ON m.id = l.module_id
        WHERE l.id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(pool.as_ref())
    .await
}

pub async fn is_lesson_completed(
    lesson_id: u32,
    user_id: u32,
    pool: Arc<SqlitePool>,
) -> sqlx::Result<bool> {
    let result: Option<(i32,)> =
        sqlx::query_as("SELECT 1 FROM lesson_completions WHERE lesson_id = ? AND user_id = ?")
            .bind(lesson_id)
            .bind(user_id)
            .fetch_optional(pool.as_ref())
            .await?;

    Ok(result.is_some())
}

/// Marks a lesson as completed; completing it again keeps the first timestamp
pub async fn complete_lesson(
    lesson_id: u32,
    user_id: u32,
    pool: Arc<SqlitePool>,
) -> sqlx::Result<()> {
    let now = create_timestamp();

    sqlx::query(
        r#"
        INSERT OR IGNORE INTO lesson_completions (user_id, lesson_id, completed_time)
        VALUES (?, ?, ?)
        "#,
    )
    .bind(user_id)
    .bind(lesson_id)
    .bind(now)
    .execute(pool.as_ref())
    .await?;

    Ok(())
}

/// Share of the course's lessons the user has completed, as a whole percentage
pub async fn course_progress(
    course_id: u32,
    user_id: Option<u32>,
    pool: Arc<SqlitePool>,
) -> sqlx::Result<CourseProgress> {
    let (total_lessons, completed_lessons): (u32, u32) = sqlx::query_as(
        r#"
        SELECT COUNT(l.id), COUNT(lc.lesson_id)
        FROM lessons l
        JOIN modules m ON m.id = l.module_id
        LEFT JOIN lesson_completions lc ON lc.lesson_id = l.id AND lc.user_id = ?
        WHERE m.course_id = ?
        "#,
    )
    .bind(user_id)
    .bind(course_id)
    .fetch_one(pool.as_ref())
    .await?;

    Ok(CourseProgress::new(course_id, completed_lessons, total_lessons))
}

/// Tasks of a lesson, without their checkers
pub async fn fetch_lesson_tasks(
    lesson_id: u32,
    pool: Arc<SqlitePool>,
) -> sqlx::Result<Vec<TaskView>> {
    sqlx::query_as::<_, TaskView>(
        r#"
        SELECT id, lesson_id, title, description, starter_code
        FROM tasks
        WHERE lesson_id = ?
        ORDER BY id
        "#,
    )
    .bind(lesson_id)
    .fetch_all(pool.as_ref())
    .await
}
