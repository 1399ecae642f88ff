mod courses;
mod lessons;
mod run;
mod tasks;
mod users;

pub use courses::*;
pub use lessons::*;
pub use run::*;
pub use tasks::*;
pub use users::*;

use std::sync::Arc;

use actix_web::error::{InternalError, JsonPayloadError, PathError};
use actix_web::http::header;
use actix_web::{HttpRequest, HttpResponse, web};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqlitePool;

use crate::database as db;

#[derive(Serialize, Deserialize, Debug, PartialEq)]
pub struct ErrorResponse {
    pub ok: bool,
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            error: error.into(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, PartialEq)]
pub struct OkResponse {
    pub ok: bool,
}

impl OkResponse {
    pub fn new() -> Self {
        Self { ok: true }
    }
}

impl Default for OkResponse {
    fn default() -> Self {
        Self::new()
    }
}

/// Registers every handler, shared by the server and the tests
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(json_error_handler))
        .app_data(web::PathConfig::default().error_handler(path_error_handler))
        .service(login_handler)
        .service(logout_handler)
        .service(get_current_user_handler)
        .service(get_courses_handler)
        .service(get_course_handler)
        .service(toggle_favorite_handler)
        .service(get_course_modules_handler)
        .service(get_course_progress_handler)
        .service(get_lesson_handler)
        .service(complete_lesson_handler)
        .service(get_task_handler)
        .service(get_task_attempts_handler)
        .service(post_run_handler);
}

pub fn json_error_handler(err: JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    let response = HttpResponse::BadRequest().json(ErrorResponse::new("invalid argument"));
    InternalError::from_response(err, response).into()
}

pub fn path_error_handler(err: PathError, _req: &HttpRequest) -> actix_web::Error {
    let response = HttpResponse::BadRequest().json(ErrorResponse::new("invalid argument"));
    InternalError::from_response(err, response).into()
}

/// Token from an `Authorization: Bearer <token>` header
pub fn bearer_token(req: &HttpRequest) -> Option<&str> {
    req.headers()
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Resolves the caller from its session token; a missing or stale token is anonymous
async fn caller_id(req: &HttpRequest, pool: Arc<SqlitePool>) -> Result<Option<u32>, HttpResponse> {
    let Some(token) = bearer_token(req) else {
        return Ok(None);
    };

    db::session_user(token, pool).await.map_err(|e| {
        log::error!("Failed to look up session: {e}");
        external_error()
    })
}

/// Like [`caller_id`], but anonymous callers get a 401 response
async fn require_caller(req: &HttpRequest, pool: Arc<SqlitePool>) -> Result<u32, HttpResponse> {
    caller_id(req, pool)
        .await?
        .ok_or_else(|| HttpResponse::Unauthorized().json(ErrorResponse::new("login required")))
}

fn not_found(what: &str) -> HttpResponse {
    HttpResponse::NotFound().json(ErrorResponse::new(format!("{what} not found")))
}

fn external_error() -> HttpResponse {
    HttpResponse::InternalServerError().json(ErrorResponse::new("database error"))
}
