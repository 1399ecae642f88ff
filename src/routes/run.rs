use super::*;

use actix_web::{Responder, post};
use tokio::sync::oneshot;

use crate::attempt::{self, RunCodeError, RunJob, RunReport};
use crate::queue::RunQueue;

#[derive(Serialize, Deserialize, Debug)]
pub struct RunCodeRequest {
    pub code: String,
    pub task_id: Option<u32>,
}

#[derive(Serialize, Deserialize, Debug, PartialEq)]
#[serde(untagged)]
pub enum RunCodeResponse {
    Completed {
        ok: bool,
        is_passed: bool,
        stdout: String,
        stderr: String,
        attempt_id: u32,
    },
    Failed {
        ok: bool,
        error: String,
    },
}

impl RunCodeResponse {
    pub fn failed(error: impl Into<String>) -> Self {
        Self::Failed {
            ok: false,
            error: error.into(),
        }
    }
}

impl From<RunReport> for RunCodeResponse {
    fn from(report: RunReport) -> Self {
        Self::Completed {
            ok: true,
            is_passed: report.is_passed,
            stdout: report.stdout,
            stderr: report.stderr,
            attempt_id: report.attempt.id,
        }
    }
}

/// A run handed to the sandbox workers, answered through `responder`
pub struct RunMessage {
    pub job: RunJob,
    pub responder: oneshot::Sender<Result<RunReport, RunCodeError>>,
}

/// Executes code, optionally graded by a task's checker, and waits for the verdict
#[post("/run")]
pub async fn post_run_handler(
    req: HttpRequest,
    run_queue: web::Data<RunQueue>,
    pool: web::Data<SqlitePool>,
    body: web::Json<RunCodeRequest>,
) -> impl Responder {
    let pool = pool.into_inner();
    let user_id = match caller_id(&req, pool.clone()).await {
        Ok(id) => id,
        Err(response) => return response,
    };

    let RunCodeRequest { code, task_id } = body.into_inner();
    let job = match attempt::resolve_job(code, task_id, user_id, pool).await {
        Ok(job) => job,
        Err(e) => return run_error_response(e),
    };

    let (tx, rx) = oneshot::channel();
    let message = RunMessage {
        job,
        responder: tx,
    };
    if run_queue.push(message).await.is_err() {
        log::warn!("Run of task {task_id:?} refused, run queue is full");
        return HttpResponse::ServiceUnavailable()
            .json(RunCodeResponse::failed("too many pending runs"));
    }
    log::debug!("Sent run of task {task_id:?} to queue");

    match rx.await {
        Ok(Ok(report)) => HttpResponse::Ok().json(RunCodeResponse::from(report)),
        Ok(Err(e)) => run_error_response(e),
        Err(e) => {
            log::error!("Failed to receive run result: {e}");
            HttpResponse::InternalServerError().json(RunCodeResponse::failed("internal error"))
        }
    }
}

fn run_error_response(err: RunCodeError) -> HttpResponse {
    match &err {
        RunCodeError::TaskNotFound(id) => {
            log::info!("Run refused, task {id} not found");
            HttpResponse::NotFound().json(RunCodeResponse::failed(err.to_string()))
        }
        RunCodeError::Database(_) | RunCodeError::Sandbox(_) => {
            log::error!("Run failed: {err}");
            HttpResponse::InternalServerError().json(RunCodeResponse::failed(err.to_string()))
        }
    }
}
