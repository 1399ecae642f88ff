use std::collections::VecDeque;

use tokio::sync::{Mutex, Notify};

use crate::routes::RunMessage;

pub const DEFAULT_MAX_PENDING: usize = 64;

/// Runs waiting for a sandbox worker, served in arrival order
///
/// At most `max_pending` runs wait at once; past that, [`RunQueue::push`]
/// hands the run back so the caller can be turned away instead of piling up
/// behind a slow backlog.
pub struct RunQueue {
    pending: Mutex<VecDeque<RunMessage>>,
    arrived: Notify,
    max_pending: usize,
}

impl RunQueue {
    pub fn new() -> Self {
        Self::with_limit(DEFAULT_MAX_PENDING)
    }

    pub fn with_limit(max_pending: usize) -> Self {
        Self {
            pending: Mutex::new(VecDeque::with_capacity(max_pending.min(DEFAULT_MAX_PENDING))),
            arrived: Notify::new(),
            max_pending,
        }
    }

    /// Enqueues the run, or returns it when the backlog is full
    pub async fn push(&self, message: RunMessage) -> Result<(), RunMessage> {
        {
            let mut pending = self.pending.lock().await;
            if pending.len() >= self.max_pending {
                return Err(message);
            }
            pending.push_back(message);
        }
        self.arrived.notify_one();
        Ok(())
    }

    /// Waits for the oldest pending run
    pub async fn pop(&self) -> RunMessage {
        loop {
            if let Some(message) = self.pending.lock().await.pop_front() {
                return message;
            }
            self.arrived.notified().await;
        }
    }

    pub async fn pending(&self) -> usize {
        self.pending.lock().await.len()
    }
}

impl Default for RunQueue {
    fn default() -> Self {
        Self::new()
    }
}
