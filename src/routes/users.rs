use super::*;

use actix_web::{Responder, get, post};

use crate::database::ANONYMOUS_USER_ID;

#[derive(sqlx::FromRow, Debug, Clone)]
pub struct UserRecord {
    pub id: u32,
    pub username: String,
    // NOTE: stored and compared as plain text
    pub password: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct User {
    pub id: u32,
    pub username: String,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct LoginResponse {
    pub ok: bool,
    pub user: User,
    pub token: String,
}

#[derive(Serialize, Deserialize, Debug, PartialEq)]
pub struct CurrentUser {
    pub id: u32,
    pub username: String,
    pub favorite_course_ids: Vec<u32>,
}

/// Logs a user in, registering the name on first use
#[post("/login")]
pub async fn login_handler(
    pool: web::Data<SqlitePool>,
    body: web::Json<LoginRequest>,
) -> impl Responder {
    let LoginRequest { username, password } = body.into_inner();
    let username = username.trim().to_string();

    if username.is_empty() {
        return HttpResponse::BadRequest().json(ErrorResponse::new("username must not be empty"));
    }

    let user = match db::find_or_create_user(&username, &password, pool.clone().into_inner()).await
    {
        Ok((user, _)) if user.id == ANONYMOUS_USER_ID => {
            return HttpResponse::BadRequest().json(ErrorResponse::new("username is reserved"));
        }
        Ok((user, _)) if user.password != password => {
            log::info!("Rejected login of user {}", user.id);
            return HttpResponse::Unauthorized().json(ErrorResponse::new("invalid password"));
        }
        Ok((user, created)) => {
            if created {
                log::info!("Registered user {} ({})", user.id, user.username);
            }
            user
        }
        Err(e) => {
            log::error!("Failed to log in user {username}: {e}");
            return external_error();
        }
    };

    match db::create_session(user.id, pool.into_inner()).await {
        Ok(token) => HttpResponse::Ok().json(LoginResponse {
            ok: true,
            user: User {
                id: user.id,
                username: user.username,
            },
            token,
        }),
        Err(e) => {
            log::error!("Failed to create session for user {}: {e}", user.id);
            external_error()
        }
    }
}

#[post("/logout")]
pub async fn logout_handler(req: HttpRequest, pool: web::Data<SqlitePool>) -> impl Responder {
    if let Some(token) = bearer_token(&req)
        && let Err(e) = db::delete_session(token, pool.into_inner()).await
    {
        log::error!("Failed to delete session: {e}");
        return external_error();
    }

    HttpResponse::Ok().json(OkResponse::new())
}

/// Current user with favorites, or `null` for anonymous callers
#[get("/users/me")]
pub async fn get_current_user_handler(
    req: HttpRequest,
    pool: web::Data<SqlitePool>,
) -> impl Responder {
    let pool = pool.into_inner();
    let user_id = match caller_id(&req, pool.clone()).await {
        Ok(Some(id)) => id,
        Ok(None) => return HttpResponse::Ok().json(Option::<CurrentUser>::None),
        Err(response) => return response,
    };

    let user = match db::fetch_user(user_id, pool.clone()).await {
        Ok(Some(user)) => user,
        Ok(None) => return HttpResponse::Ok().json(Option::<CurrentUser>::None),
        Err(e) => {
            log::error!("Failed to fetch user {user_id}: {e}");
            return external_error();
        }
    };

    match db::favorite_course_ids(user_id, pool).await {
        Ok(favorite_course_ids) => HttpResponse::Ok().json(Some(CurrentUser {
            id: user.id,
            username: user.username,
            favorite_course_ids,
        })),
        Err(e) => {
            log::error!("Failed to fetch favorites of user {user_id}: {e}");
            external_error()
        }
    }
}
