mod assembler;
mod runner;
mod verdict;

pub use assembler::{ENCODING_HEADER, ExecutionUnit, assemble};
pub use verdict::{SENTINEL, classify};

use std::process::Command;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};

use crate::config::SandboxConfig;

/// Outcome of a single execution of an assembled unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    /// Exit status was zero
    pub succeeded: bool,
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
}

impl RunOutcome {
    fn timed_out(time_limit: Duration) -> Self {
        Self {
            succeeded: false,
            stdout: String::new(),
            stderr: timeout_message(time_limit),
            timed_out: true,
        }
    }
}

/// Message reported on stderr when a run is killed for exceeding its time limit
pub fn timeout_message(time_limit: Duration) -> String {
    format!(
        "Execution timed out after {} seconds",
        time_limit.as_secs_f64()
    )
}

/// Runs learner programs with a Python interpreter started in isolated mode
///
/// Every call to [`Sandbox::run`] gets its own temporary directory and its own
/// process group, so one `Sandbox` can serve any number of sequential runs and
/// several sandboxes can run side by side without sharing scratch space.
/// Output is capped per stream. There is no memory, network or filesystem
/// confinement beyond that.
pub struct Sandbox {
    /// Unique identifier for this instance
    id: u8,
    interpreter: String,
    interpreter_args: Vec<String>,
    time_limit: Duration,
    /// Bytes kept from each of stdout and stderr
    output_limit: usize,
}

impl Sandbox {
    /// Creates a sandbox and checks that the configured interpreter can be started
    pub fn build(id: u8, config: &SandboxConfig) -> Result<Self> {
        let interpreter = config.interpreter().to_string();
        let time_limit = Duration::try_from(config.time_limit())
            .with_context(|| format!("Invalid time limit {:?}", config.time_limit()))?;
        let output_limit = usize::try_from(config.output_limit())
            .context("Output limit does not fit in memory")?;

        let output = Command::new(&interpreter)
            .arg("--version")
            .output()
            .map_err(|e| anyhow!("Failed to spawn interpreter {interpreter}: {e}"))?;
        if !output.status.success() {
            return Err(anyhow!(
                "Interpreter {interpreter} --version exited with {:?}",
                output.status.code()
            ));
        }

        log::info!(
            "Sandbox {id} initialized with {}",
            String::from_utf8_lossy(&output.stdout).trim()
        );

        Ok(Self {
            id,
            interpreter,
            interpreter_args: config.interpreter_args(),
            time_limit,
            output_limit,
        })
    }
}
