use super::*;

use actix_web::{Responder, get};

/// Exercise as stored, including the checker that must stay server-side
#[derive(sqlx::FromRow, Debug, Clone, PartialEq)]
pub struct Task {
    pub id: u32,
    pub lesson_id: u32,
    pub title: String,
    pub description: String,
    pub starter_code: String,
    pub checker_code: Option<String>,
}

/// Exercise as shown to learners
#[derive(sqlx::FromRow, Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct TaskView {
    pub id: u32,
    pub lesson_id: u32,
    pub title: String,
    pub description: String,
    pub starter_code: String,
}

impl From<Task> for TaskView {
    fn from(task: Task) -> Self {
        Self {
            id: task.id,
            lesson_id: task.lesson_id,
            title: task.title,
            description: task.description,
            starter_code: task.starter_code,
        }
    }
}

#[derive(sqlx::FromRow, Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Attempt {
    pub id: u32,
    pub task_id: Option<u32>,
    pub user_id: u32,
    pub code: String,
    pub is_passed: bool,
    pub output: String,
    pub created_time: String,
}

#[get("/tasks/{id}")]
pub async fn get_task_handler(
    pool: web::Data<SqlitePool>,
    path: web::Path<(u32,)>,
) -> impl Responder {
    let task_id = path.into_inner().0;

    match db::fetch_task(task_id, pool.into_inner()).await {
        Ok(Some(task)) => HttpResponse::Ok().json(TaskView::from(task)),
        Ok(None) => not_found("task"),
        Err(e) => {
            log::error!("Failed to retrieve task {task_id}: {e}");
            external_error()
        }
    }
}

/// The caller's own attempts on a task, oldest first
#[get("/tasks/{id}/attempts")]
pub async fn get_task_attempts_handler(
    req: HttpRequest,
    pool: web::Data<SqlitePool>,
    path: web::Path<(u32,)>,
) -> impl Responder {
    let task_id = path.into_inner().0;
    let pool = pool.into_inner();

    let user_id = match require_caller(&req, pool.clone()).await {
        Ok(id) => id,
        Err(response) => return response,
    };

    match db::fetch_task(task_id, pool.clone()).await {
        Ok(Some(_)) => {}
        Ok(None) => return not_found("task"),
        Err(e) => {
            log::error!("Failed to retrieve task {task_id}: {e}");
            return external_error();
        }
    }

    match db::fetch_attempts(task_id, user_id, pool).await {
        Ok(attempts) => {
            log::debug!("Got {} attempts of user {user_id} on task {task_id}", attempts.len());
            HttpResponse::Ok().json(attempts)
        }
        Err(e) => {
            log::error!("Failed to retrieve attempts on task {task_id}: {e}");
            external_error()
        }
    }
}
