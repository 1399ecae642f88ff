use std::sync::Arc;

use sqlx::SqlitePool;
use tokio_util::sync::CancellationToken;

use crate::attempt;
use crate::config::SandboxConfig;
use crate::queue::RunQueue;
use crate::routes::RunMessage;
use crate::sandbox::Sandbox;

/// Serves runs from the queue one at a time until `token` is cancelled
///
/// A run already in progress when the token fires is finished and answered
/// before the worker stops.
pub async fn worker(
    id: u8,
    sandbox_config: Arc<SandboxConfig>,
    db_pool: Arc<SqlitePool>,
    queue: Arc<RunQueue>,
    token: CancellationToken,
) -> anyhow::Result<()> {
    let sandbox = Sandbox::build(id, &sandbox_config)?;
    log::info!("Worker {id} initialized");

    loop {
        tokio::select! {
            _ = token.cancelled() => {
                log::info!("Worker {id} received shutdown signal, stopping");
                break;
            }

            message = queue.pop() => {
                let RunMessage { job, responder } = message;
                log::debug!("Worker {id} got run of task {:?}", job.task.as_ref().map(|t| t.id));

                let result = attempt::execute(&sandbox, job, db_pool.clone()).await;
                if let Err(e) = &result {
                    log::error!("Run failed on worker {id}: {e}");
                }

                if responder.send(result).is_err() {
                    log::warn!("Caller of a run on worker {id} went away before the result");
                }
            }
        };
    }

    log::info!("Worker {id} has shut down gracefully");
    Ok(())
}
