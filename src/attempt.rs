use std::sync::Arc;

use sqlx::sqlite::SqlitePool;
use thiserror::Error;

use crate::database::{self as db, ANONYMOUS_USER_ID};
use crate::routes::{Attempt, Task};
use crate::sandbox::{RunOutcome, Sandbox, assemble, classify};

/// Failures of `run_code` that are not a grading verdict
#[derive(Error, Debug)]
pub enum RunCodeError {
    #[error("task not found")]
    TaskNotFound(u32),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("sandbox error: {0:#}")]
    Sandbox(#[from] anyhow::Error),
}

/// One request to execute code, with the task already resolved
#[derive(Debug, Clone)]
pub struct RunJob {
    pub code: String,
    pub task: Option<Task>,
    pub user_id: Option<u32>,
}

/// What the caller gets back from a finished run
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub attempt: Attempt,
    pub is_passed: bool,
    pub stdout: String,
    pub stderr: String,
}

/// Row to append to the attempt log
#[derive(Debug, Clone, PartialEq)]
pub struct NewAttempt {
    pub task_id: Option<u32>,
    pub user_id: u32,
    pub code: String,
    pub is_passed: bool,
    pub output: String,
}

impl NewAttempt {
    pub fn new(
        task_id: Option<u32>,
        user_id: Option<u32>,
        code: &str,
        is_passed: bool,
        stdout: &str,
        stderr: &str,
    ) -> Self {
        Self {
            task_id,
            user_id: user_id.unwrap_or(ANONYMOUS_USER_ID),
            code: code.to_string(),
            is_passed,
            output: combine_output(stdout, stderr),
        }
    }
}

/// Joins both streams into the single stored output field
pub fn combine_output(stdout: &str, stderr: &str) -> String {
    format!("{stdout}\n{stderr}").trim().to_string()
}

/// Looks up the task a run refers to
pub async fn resolve_job(
    code: String,
    task_id: Option<u32>,
    user_id: Option<u32>,
    pool: Arc<SqlitePool>,
) -> Result<RunJob, RunCodeError> {
    let task = match task_id {
        Some(id) => Some(
            db::fetch_task(id, pool)
                .await?
                .ok_or(RunCodeError::TaskNotFound(id))?,
        ),
        None => None,
    };

    Ok(RunJob {
        code,
        task,
        user_id,
    })
}

/// Appends the attempt for a finished run
pub async fn record(
    job: &RunJob,
    is_passed: bool,
    outcome: &RunOutcome,
    pool: Arc<SqlitePool>,
) -> sqlx::Result<Attempt> {
    let attempt = NewAttempt::new(
        job.task.as_ref().map(|t| t.id),
        job.user_id,
        &job.code,
        is_passed,
        &outcome.stdout,
        &outcome.stderr,
    );
    db::insert_attempt(&attempt, pool).await
}

/// Assembles, runs, grades and records one job
pub async fn execute(
    sandbox: &Sandbox,
    job: RunJob,
    pool: Arc<SqlitePool>,
) -> Result<RunReport, RunCodeError> {
    let checker = job.task.as_ref().and_then(|t| t.checker_code.as_deref());
    let unit = assemble(&job.code, checker);

    let outcome = sandbox.run(&unit).await?;
    let is_passed = classify(outcome.succeeded, &outcome.stdout, unit.has_checker());

    let attempt = record(&job, is_passed, &outcome, pool).await?;
    log::info!(
        "Attempt {} (task {:?}, user {}) {}",
        attempt.id,
        attempt.task_id,
        attempt.user_id,
        match (is_passed, outcome.timed_out) {
            (true, _) => "passed",
            (false, true) => "timed out",
            (false, false) => "failed",
        }
    );

    Ok(RunReport {
        attempt,
        is_passed,
        stdout: outcome.stdout,
        stderr: outcome.stderr,
    })
}

/// Runs code directly on a sandbox, bypassing the run queue
pub async fn run_code(
    sandbox: &Sandbox,
    code: String,
    task_id: Option<u32>,
    user_id: Option<u32>,
    pool: Arc<SqlitePool>,
) -> Result<RunReport, RunCodeError> {
    let job = resolve_job(code, task_id, user_id, pool.clone()).await?;
    execute(sandbox, job, pool).await
}
