use std::fs;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use actix_web::http::{StatusCode, header};
use actix_web::{App, test, web};
use assert_json_diff::assert_json_include;
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use sqlx::sqlite::SqlitePool;
use tokio_util::sync::CancellationToken;

use coursebox::attempt::RunJob;
use coursebox::config::{SandboxConfig, Second};
use coursebox::database as db;
use coursebox::queue::RunQueue;
use coursebox::routes::{
    self, Attempt, CourseProgress, CourseSummary, CurrentUser, ErrorResponse, LessonDetail,
    LoginResponse, ModuleView, RunCodeResponse, RunMessage,
};
use coursebox::worker::worker;

// Global counter to ensure unique test database names
static TEST_DB_COUNTER: AtomicU32 = AtomicU32::new(0);

// Helper function to create isolated test database
async fn create_test_db() -> (Arc<SqlitePool>, TestDbGuard) {
    let test_id = TEST_DB_COUNTER.fetch_add(1, Ordering::SeqCst);
    let db_path = format!("data/test_server_{}.db", test_id);

    // Remove existing test database if it exists
    cleanup_test_db(&db_path);

    let db_pool = db::init_db(&db_path).await.unwrap();
    (Arc::new(db_pool), TestDbGuard { db_path })
}

fn cleanup_test_db(db_path: &str) {
    let _ = fs::remove_file(db_path);
    let _ = fs::remove_file(format!("{}-wal", db_path));
    let _ = fs::remove_file(format!("{}-shm", db_path));
}

// Test guard that ensures cleanup on drop
struct TestDbGuard {
    db_path: String,
}

impl Drop for TestDbGuard {
    fn drop(&mut self) {
        cleanup_test_db(&self.db_path);
    }
}

// Starts one sandbox worker on the test runtime; cancel the token to stop it
fn spawn_worker(pool: Arc<SqlitePool>, queue: Arc<RunQueue>) -> CancellationToken {
    let token = CancellationToken::new();
    let config = SandboxConfig {
        time_limit: Some(Second(1.0)),
        ..Default::default()
    };
    actix_web::rt::spawn(worker(1, Arc::new(config), pool, queue, token.clone()));
    token
}

macro_rules! init_app {
    ($pool:expr, $queue:expr) => {
        test::init_service(
            App::new()
                .app_data(web::Data::from($pool.clone()))
                .app_data(web::Data::from($queue.clone()))
                .configure(routes::configure),
        )
        .await
    };
}

macro_rules! login {
    ($app:expr, $username:expr, $password:expr) => {{
        let req = test::TestRequest::post()
            .uri("/login")
            .set_json(json!({ "username": $username, "password": $password }))
            .to_request();
        let resp: LoginResponse = test::call_and_read_body_json(&$app, req).await;
        resp
    }};
}

fn bearer(token: &str) -> (header::HeaderName, String) {
    (header::AUTHORIZATION, format!("Bearer {token}"))
}

#[actix_web::test]
async fn test_login_registers_then_checks_password() {
    let (pool, _guard) = create_test_db().await;
    let queue = Arc::new(RunQueue::new());
    let app = init_app!(pool, queue);

    let first = login!(app, "alice", "secret");
    assert!(first.ok);
    assert_eq!(first.user.username, "alice");
    assert!(first.user.id > 0);
    assert_eq!(first.token.len(), 32);

    let second = login!(app, "alice", "secret");
    assert_eq!(second.user.id, first.user.id);
    assert_ne!(second.token, first.token);

    let req = test::TestRequest::post()
        .uri("/login")
        .set_json(json!({ "username": "alice", "password": "wrong" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body: ErrorResponse = test::read_body_json(resp).await;
    assert!(!body.ok);

    let req = test::TestRequest::post()
        .uri("/login")
        .set_json(json!({ "username": "anonymous", "password": "" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn test_simultaneous_first_logins_share_one_user() {
    let (pool, _guard) = create_test_db().await;
    let queue = Arc::new(RunQueue::new());
    let app = init_app!(pool, queue);

    let request = || {
        test::TestRequest::post()
            .uri("/login")
            .set_json(json!({ "username": "frank", "password": "pw" }))
            .to_request()
    };
    let (a, b) = tokio::join!(
        test::call_service(&app, request()),
        test::call_service(&app, request())
    );
    assert_eq!(a.status(), StatusCode::OK);
    assert_eq!(b.status(), StatusCode::OK);

    let a: LoginResponse = test::read_body_json(a).await;
    let b: LoginResponse = test::read_body_json(b).await;
    assert_eq!(a.user, b.user);

    let (users,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users WHERE username = 'frank'")
        .fetch_one(pool.as_ref())
        .await
        .unwrap();
    assert_eq!(users, 1);
}

#[actix_web::test]
async fn test_current_user_and_logout() {
    let (pool, _guard) = create_test_db().await;
    let queue = Arc::new(RunQueue::new());
    let app = init_app!(pool, queue);

    let req = test::TestRequest::get().uri("/users/me").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body, Value::Null);

    let login = login!(app, "bob", "pw");
    let req = test::TestRequest::get()
        .uri("/users/me")
        .insert_header(bearer(&login.token))
        .to_request();
    let me: Option<CurrentUser> = test::call_and_read_body_json(&app, req).await;
    assert_eq!(
        me,
        Some(CurrentUser {
            id: login.user.id,
            username: "bob".to_string(),
            favorite_course_ids: vec![],
        })
    );

    let req = test::TestRequest::post()
        .uri("/logout")
        .insert_header(bearer(&login.token))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());

    let req = test::TestRequest::get()
        .uri("/users/me")
        .insert_header(bearer(&login.token))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body, Value::Null);
}

#[actix_web::test]
async fn test_courses_and_favorites() {
    let (pool, _guard) = create_test_db().await;
    let queue = Arc::new(RunQueue::new());
    let app = init_app!(pool, queue);

    let req = test::TestRequest::get().uri("/courses").to_request();
    let courses: Vec<CourseSummary> = test::call_and_read_body_json(&app, req).await;
    assert_eq!(courses.len(), 6);
    assert!(courses.iter().all(|c| !c.is_favorite));
    assert_eq!(courses.iter().filter(|c| c.is_popular).count(), 3);

    // Anonymous callers cannot toggle
    let req = test::TestRequest::post().uri("/courses/2/favorite").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let login = login!(app, "carol", "pw");

    let req = test::TestRequest::post()
        .uri("/courses/2/favorite")
        .insert_header(bearer(&login.token))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_json_include!(actual: body, expected: json!({ "ok": true, "is_favorite": true }));

    let req = test::TestRequest::get()
        .uri("/courses")
        .insert_header(bearer(&login.token))
        .to_request();
    let courses: Vec<CourseSummary> = test::call_and_read_body_json(&app, req).await;
    let favorites: Vec<u32> = courses.iter().filter(|c| c.is_favorite).map(|c| c.id).collect();
    assert_eq!(favorites, vec![2]);

    let req = test::TestRequest::post()
        .uri("/courses/2/favorite")
        .insert_header(bearer(&login.token))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_json_include!(actual: body, expected: json!({ "ok": true, "is_favorite": false }));

    let req = test::TestRequest::post()
        .uri("/courses/99/favorite")
        .insert_header(bearer(&login.token))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn test_course_detail() {
    let (pool, _guard) = create_test_db().await;
    let queue = Arc::new(RunQueue::new());
    let app = init_app!(pool, queue);

    let req = test::TestRequest::get().uri("/courses/4").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_json_include!(
        actual: body,
        expected: json!({
            "id": 4,
            "title": "Backend на Python",
            "materials_path": "./static/materials/Course1.zip",
        })
    );

    let req = test::TestRequest::get().uri("/courses/42").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body: ErrorResponse = test::read_body_json(resp).await;
    assert_eq!(body, ErrorResponse::new("course not found"));
}

#[actix_web::test]
async fn test_modules_completion_and_progress() {
    let (pool, _guard) = create_test_db().await;
    let queue = Arc::new(RunQueue::new());
    let app = init_app!(pool, queue);

    let login = login!(app, "dave", "pw");

    let req = test::TestRequest::get().uri("/courses/4/modules").to_request();
    let modules: Vec<ModuleView> = test::call_and_read_body_json(&app, req).await;
    assert_eq!(modules.len(), 2);
    assert_eq!(modules[0].title, "Основы Python");
    let lesson_ids: Vec<u32> = modules[0].lessons.iter().map(|l| l.id).collect();
    assert_eq!(lesson_ids, vec![1, 2]);

    for _ in 0..2 {
        let req = test::TestRequest::post()
            .uri("/lessons/1/complete")
            .insert_header(bearer(&login.token))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert!(resp.status().is_success());
    }

    let req = test::TestRequest::get()
        .uri("/courses/4/progress")
        .insert_header(bearer(&login.token))
        .to_request();
    let progress: CourseProgress = test::call_and_read_body_json(&app, req).await;
    assert_eq!(progress, CourseProgress::new(4, 1, 4));
    assert_eq!(progress.percent, 25);

    let req = test::TestRequest::get()
        .uri("/courses/4/modules")
        .insert_header(bearer(&login.token))
        .to_request();
    let modules: Vec<ModuleView> = test::call_and_read_body_json(&app, req).await;
    assert!(modules[0].lessons[0].is_completed);
    assert!(!modules[0].lessons[1].is_completed);

    // Other users and anonymous callers are unaffected
    let req = test::TestRequest::get().uri("/courses/4/progress").to_request();
    let progress: CourseProgress = test::call_and_read_body_json(&app, req).await;
    assert_eq!(progress.percent, 0);

    let req = test::TestRequest::get().uri("/courses/2/progress").to_request();
    let progress: CourseProgress = test::call_and_read_body_json(&app, req).await;
    assert_eq!(progress, CourseProgress::new(2, 0, 0));

    let req = test::TestRequest::post()
        .uri("/lessons/1/complete")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn test_lesson_hides_checker() {
    let (pool, _guard) = create_test_db().await;
    let queue = Arc::new(RunQueue::new());
    let app = init_app!(pool, queue);

    let req = test::TestRequest::get().uri("/lessons/1").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert!(!body.to_string().contains("checker"));
    assert!(!body.to_string().contains("print('OK')"));

    let lesson: LessonDetail = serde_json::from_value(body).unwrap();
    assert_eq!(lesson.lesson.course_id, 4);
    assert!(!lesson.is_completed);
    assert_eq!(lesson.tasks.len(), 1);
    assert_eq!(lesson.tasks[0].starter_code, "def greet(name):\n    pass\n");

    let req = test::TestRequest::get().uri("/tasks/1").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert!(body.get("checker_code").is_none());
    assert_json_include!(actual: body, expected: json!({ "id": 1, "lesson_id": 1 }));

    let req = test::TestRequest::get().uri("/lessons/77").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn test_run_task_through_worker() {
    let (pool, _guard) = create_test_db().await;
    let queue = Arc::new(RunQueue::new());
    let token = spawn_worker(pool.clone(), queue.clone());
    let app = init_app!(pool, queue);

    let login = login!(app, "erin", "pw");

    let req = test::TestRequest::post()
        .uri("/run")
        .insert_header(bearer(&login.token))
        .set_json(json!({
            "code": "def greet(name):\n    return f\"Привет, {name}!\"",
            "task_id": 1,
        }))
        .to_request();
    let resp: RunCodeResponse = test::call_and_read_body_json(&app, req).await;
    let (ok, is_passed, stdout, attempt_id) = match resp {
        RunCodeResponse::Completed {
            ok,
            is_passed,
            stdout,
            attempt_id,
            ..
        } => (ok, is_passed, stdout, attempt_id),
        failed => panic!("run failed: {failed:?}"),
    };
    assert!(ok);
    assert!(is_passed);
    assert!(stdout.contains("OK"));

    let req = test::TestRequest::post()
        .uri("/run")
        .insert_header(bearer(&login.token))
        .set_json(json!({ "code": "def greet(name): pass", "task_id": 1 }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_json_include!(actual: body.clone(), expected: json!({ "ok": true, "is_passed": false }));
    assert!(body["stderr"].as_str().unwrap().contains("AssertionError"));

    let req = test::TestRequest::get()
        .uri("/tasks/1/attempts")
        .insert_header(bearer(&login.token))
        .to_request();
    let attempts: Vec<Attempt> = test::call_and_read_body_json(&app, req).await;
    assert_eq!(attempts.len(), 2);
    assert_eq!(attempts[0].id, attempt_id);
    assert!(attempts[0].is_passed);
    assert!(!attempts[1].is_passed);
    assert!(attempts.iter().all(|a| a.user_id == login.user.id));

    token.cancel();
}

#[actix_web::test]
async fn test_run_anonymous_and_timeout() {
    let (pool, _guard) = create_test_db().await;
    let queue = Arc::new(RunQueue::new());
    let token = spawn_worker(pool.clone(), queue.clone());
    let app = init_app!(pool, queue);

    let req = test::TestRequest::post()
        .uri("/run")
        .set_json(json!({ "code": "while True: pass" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_json_include!(
        actual: body,
        expected: json!({
            "ok": true,
            "is_passed": false,
            "stdout": "",
            "stderr": "Execution timed out after 1 seconds",
        })
    );

    let attempts = db::count_attempts(pool.clone()).await.unwrap();
    assert_eq!(attempts, 1);

    token.cancel();
}

#[actix_web::test]
async fn test_run_unknown_task() {
    let (pool, _guard) = create_test_db().await;
    let queue = Arc::new(RunQueue::new());
    let app = init_app!(pool, queue);

    // No worker is running: the request must be refused before queueing
    let req = test::TestRequest::post()
        .uri("/run")
        .set_json(json!({ "code": "print('OK')", "task_id": 12345 }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body: RunCodeResponse = test::read_body_json(resp).await;
    assert_eq!(body, RunCodeResponse::failed("task not found"));

    assert_eq!(db::count_attempts(pool.clone()).await.unwrap(), 0);
}

#[actix_web::test]
async fn test_run_refused_when_backlog_is_full() {
    let (pool, _guard) = create_test_db().await;
    let queue = Arc::new(RunQueue::with_limit(1));
    let app = init_app!(pool, queue);

    // No worker is running, so this run stays queued
    let (responder, _rx) = tokio::sync::oneshot::channel();
    let waiting = RunMessage {
        job: RunJob {
            code: "print(1)".to_string(),
            task: None,
            user_id: None,
        },
        responder,
    };
    assert!(queue.push(waiting).await.is_ok());

    let req = test::TestRequest::post()
        .uri("/run")
        .set_json(json!({ "code": "print(2)" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body: RunCodeResponse = test::read_body_json(resp).await;
    assert_eq!(body, RunCodeResponse::failed("too many pending runs"));

    assert_eq!(queue.pending().await, 1);
    assert_eq!(db::count_attempts(pool.clone()).await.unwrap(), 0);
}

#[actix_web::test]
async fn test_invalid_json_is_bad_request() {
    let (pool, _guard) = create_test_db().await;
    let queue = Arc::new(RunQueue::new());
    let app = init_app!(pool, queue);

    let req = test::TestRequest::post()
        .uri("/run")
        .insert_header((header::CONTENT_TYPE, "application/json"))
        .set_payload("{\"task_id\": 1}")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: ErrorResponse = test::read_body_json(resp).await;
    assert_eq!(body, ErrorResponse::new("invalid argument"));
}
