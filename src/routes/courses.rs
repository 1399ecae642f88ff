use super::*;

use actix_web::{Responder, get, post};

#[derive(sqlx::FromRow, Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CourseSummary {
    pub id: u32,
    pub title: String,
    pub description: String,
    pub category: String,
    pub duration: String,
    pub level: String,
    pub image_path: String,
    pub is_popular: bool,
    pub is_favorite: bool,
}

#[derive(sqlx::FromRow, Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CourseDetail {
    pub id: u32,
    pub title: String,
    pub description: String,
    pub long_description: Option<String>,
    pub category: String,
    pub duration: String,
    pub level: String,
    pub image_path: String,
    pub materials_path: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ModuleView {
    pub id: u32,
    pub position: u32,
    pub title: String,
    pub lessons: Vec<LessonSummary>,
}

#[derive(sqlx::FromRow, Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct LessonSummary {
    pub id: u32,
    pub module_id: u32,
    pub position: u32,
    pub title: String,
    pub is_completed: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CourseProgress {
    pub course_id: u32,
    pub completed_lessons: u32,
    pub total_lessons: u32,
    pub percent: u32,
}

impl CourseProgress {
    /// Percent is rounded down; a course without lessons is at 0
    pub fn new(course_id: u32, completed_lessons: u32, total_lessons: u32) -> Self {
        let percent = if total_lessons == 0 {
            0
        } else {
            completed_lessons * 100 / total_lessons
        };

        Self {
            course_id,
            completed_lessons,
            total_lessons,
            percent,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, PartialEq)]
pub struct FavoriteResponse {
    pub ok: bool,
    pub is_favorite: bool,
}

#[get("/courses")]
pub async fn get_courses_handler(req: HttpRequest, pool: web::Data<SqlitePool>) -> impl Responder {
    let pool = pool.into_inner();
    let user_id = match caller_id(&req, pool.clone()).await {
        Ok(id) => id,
        Err(response) => return response,
    };

    match db::fetch_courses(user_id, pool).await {
        Ok(courses) => {
            log::debug!("Got {} courses", courses.len());
            HttpResponse::Ok().json(courses)
        }
        Err(e) => {
            log::error!("Failed to retrieve courses: {e}");
            external_error()
        }
    }
}

#[get("/courses/{id}")]
pub async fn get_course_handler(
    pool: web::Data<SqlitePool>,
    path: web::Path<(u32,)>,
) -> impl Responder {
    let course_id = path.into_inner().0;

    match db::fetch_course(course_id, pool.into_inner()).await {
        Ok(Some(course)) => HttpResponse::Ok().json(course),
        Ok(None) => not_found("course"),
        Err(e) => {
            log::error!("Failed to retrieve course {course_id}: {e}");
            external_error()
        }
    }
}

#[post("/courses/{id}/favorite")]
pub async fn toggle_favorite_handler(
    req: HttpRequest,
    pool: web::Data<SqlitePool>,
    path: web::Path<(u32,)>,
) -> impl Responder {
    let course_id = path.into_inner().0;
    let pool = pool.into_inner();

    let user_id = match require_caller(&req, pool.clone()).await {
        Ok(id) => id,
        Err(response) => return response,
    };

    match db::find_course(course_id, pool.clone()).await {
        Ok(true) => {}
        Ok(false) => return not_found("course"),
        Err(e) => {
            log::error!("Failed to validate if course {course_id} exists: {e}");
            return external_error();
        }
    }

    match db::toggle_favorite(user_id, course_id, pool).await {
        Ok(is_favorite) => {
            log::info!("User {user_id} set favorite of course {course_id} to {is_favorite}");
            HttpResponse::Ok().json(FavoriteResponse {
                ok: true,
                is_favorite,
            })
        }
        Err(e) => {
            log::error!("Failed to toggle favorite of course {course_id}: {e}");
            external_error()
        }
    }
}

#[get("/courses/{id}/modules")]
pub async fn get_course_modules_handler(
    req: HttpRequest,
    pool: web::Data<SqlitePool>,
    path: web::Path<(u32,)>,
) -> impl Responder {
    let course_id = path.into_inner().0;
    let pool = pool.into_inner();

    let user_id = match caller_id(&req, pool.clone()).await {
        Ok(id) => id,
        Err(response) => return response,
    };

    match db::find_course(course_id, pool.clone()).await {
        Ok(true) => {}
        Ok(false) => return not_found("course"),
        Err(e) => {
            log::error!("Failed to validate if course {course_id} exists: {e}");
            return external_error();
        }
    }

    match db::fetch_modules(course_id, user_id, pool).await {
        Ok(modules) => HttpResponse::Ok().json(modules),
        Err(e) => {
            log::error!("Failed to retrieve modules of course {course_id}: {e}");
            external_error()
        }
    }
}

#[get("/courses/{id}/progress")]
pub async fn get_course_progress_handler(
    req: HttpRequest,
    pool: web::Data<SqlitePool>,
    path: web::Path<(u32,)>,
) -> impl Responder {
    let course_id = path.into_inner().0;
    let pool = pool.into_inner();

    let user_id = match caller_id(&req, pool.clone()).await {
        Ok(id) => id,
        Err(response) => return response,
    };

    match db::find_course(course_id, pool.clone()).await {
        Ok(true) => {}
        Ok(false) => return not_found("course"),
        Err(e) => {
            log::error!("Failed to validate if course {course_id} exists: {e}");
            return external_error();
        }
    }

    match db::course_progress(course_id, user_id, pool).await {
        Ok(progress) => HttpResponse::Ok().json(progress),
        Err(e) => {
            log::error!("Failed to compute progress of course {course_id}: {e}");
            external_error()
        }
    }
}
