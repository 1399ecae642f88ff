use super::*;

use actix_web::{Responder, get, post};

#[derive(sqlx::FromRow, Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Lesson {
    pub id: u32,
    pub module_id: u32,
    pub course_id: u32,
    pub position: u32,
    pub title: String,
    pub content: String,
}

#[derive(Serialize, Deserialize, Debug, PartialEq)]
pub struct LessonDetail {
    #[serde(flatten)]
    pub lesson: Lesson,
    pub is_completed: bool,
    pub tasks: Vec<TaskView>,
}

#[get("/lessons/{id}")]
pub async fn get_lesson_handler(
    req: HttpRequest,
    pool: web::Data<SqlitePool>,
    path: web::Path<(u32,)>,
) -> impl Responder {
    let lesson_id = path.into_inner().0;
    let pool = pool.into_inner();

    let user_id = match caller_id(&req, pool.clone()).await {
        Ok(id) => id,
        Err(response) => return response,
    };

    let lesson = match db::fetch_lesson(lesson_id, pool.clone()).await {
        Ok(Some(lesson)) => lesson,
        Ok(None) => return not_found("lesson"),
        Err(e) => {
            log::error!("Failed to retrieve lesson {lesson_id}: {e}");
            return external_error();
        }
    };

    let is_completed = match user_id {
        Some(user_id) => match db::is_lesson_completed(lesson_id, user_id, pool.clone()).await {
            Ok(done) => done,
            Err(e) => {
                log::error!("Failed to check completion of lesson {lesson_id}: {e}");
                return external_error();
            }
        },
        None => false,
    };

    match db::fetch_lesson_tasks(lesson_id, pool).await {
        Ok(tasks) => HttpResponse::Ok().json(LessonDetail {
            lesson,
            is_completed,
            tasks,
        }),
        Err(e) => {
            log::error!("Failed to retrieve tasks of lesson {lesson_id}: {e}");
            external_error()
        }
    }
}

/// Marks the lesson as completed for the caller; repeating it is a no-op
#[post("/lessons/{id}/complete")]
pub async fn complete_lesson_handler(
    req: HttpRequest,
    pool: web::Data<SqlitePool>,
    path: web::Path<(u32,)>,
) -> impl Responder {
    let lesson_id = path.into_inner().0;
    let pool = pool.into_inner();

    let user_id = match require_caller(&req, pool.clone()).await {
        Ok(id) => id,
        Err(response) => return response,
    };

    match db::fetch_lesson(lesson_id, pool.clone()).await {
        Ok(Some(_)) => {}
        Ok(None) => return not_found("lesson"),
        Err(e) => {
            log::error!("Failed to retrieve lesson {lesson_id}: {e}");
            return external_error();
        }
    }

    match db::complete_lesson(lesson_id, user_id, pool).await {
        Ok(()) => {
            log::info!("User {user_id} completed lesson {lesson_id}");
            HttpResponse::Ok().json(OkResponse::new())
        }
        Err(e) => {
            log::error!("Failed to record completion of lesson {lesson_id}: {e}");
            external_error()
        }
    }
}
