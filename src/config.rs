use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Result, bail};
use clap::Parser;
use serde::Deserialize;

use crate::queue::DEFAULT_MAX_PENDING;

#[derive(Parser)]
#[command(name = "coursebox", version = "0.1", about, long_about = None)]
pub struct CliArgs {
    /// Path to the configuration file
    #[arg(long = "config", short = 'c')]
    pub config_path: Option<String>,

    /// Whether to flush the existing database
    #[arg(long = "flush-data", short = 'f', default_value_t = false)]
    pub flush_data: bool,

    /// Number of sandbox workers, overrides the configuration file
    #[arg(long = "workers", short = 'w')]
    pub workers: Option<u8>,
}

impl CliArgs {
    /// Load the configuration from the specified file, or the defaults when none is given
    pub fn to_config(&self) -> Result<Config> {
        let mut config = match &self.config_path {
            Some(path) => {
                let file = std::fs::File::open(path)?;
                let reader = std::io::BufReader::new(file);
                serde_json::from_reader(reader)?
            }
            None => Config::default(),
        };

        if let Some(workers) = self.workers {
            config.sandbox.workers = Some(workers);
        }

        config.validate()?;
        Ok(config)
    }
}

#[derive(Deserialize, Debug, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub sandbox: SandboxConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        let limit = self.sandbox.time_limit();
        if Duration::try_from(limit).is_err() || limit.0 <= 0.0 {
            bail!("sandbox.time_limit must be a positive number of seconds, got {}", limit.0);
        }
        if self.sandbox.output_limit() == 0 {
            bail!("sandbox.output_limit must not be 0");
        }
        if self.sandbox.max_pending() == 0 {
            bail!("sandbox.max_pending must not be 0");
        }
        if self.sandbox.workers() == 0 {
            bail!("sandbox.workers must not be 0");
        }
        if self.sandbox.interpreter().trim().is_empty() {
            bail!("sandbox.interpreter must not be empty");
        }
        Ok(())
    }
}

#[derive(Deserialize, Debug, Default)]
pub struct ServerConfig {
    pub bind_address: Option<String>,
    pub bind_port: Option<u16>,
}

#[derive(Deserialize, Debug, Default)]
pub struct DatabaseConfig {
    pub path: Option<PathBuf>,
}

const DEFAULT_INTERPRETER: &str = "python3";
const DEFAULT_INTERPRETER_ARGS: [&str; 4] = ["-I", "-B", "-X", "utf8"];
const DEFAULT_TIME_LIMIT: Second = Second(3.0);
const DEFAULT_WORKERS: u8 = 2;
const DEFAULT_OUTPUT_LIMIT: u64 = 1024 * 1024;

#[derive(Deserialize, Debug, Default, Clone)]
pub struct SandboxConfig {
    pub interpreter: Option<String>,
    pub interpreter_args: Option<Vec<String>>,
    pub time_limit: Option<Second>,
    pub workers: Option<u8>,
    /// Bytes kept from each output stream of a run
    pub output_limit: Option<u64>,
    /// Runs allowed to wait for a worker before new ones are refused
    pub max_pending: Option<usize>,
}

impl SandboxConfig {
    pub fn interpreter(&self) -> &str {
        self.interpreter.as_deref().unwrap_or(DEFAULT_INTERPRETER)
    }

    /// Flags placing the interpreter in its isolated startup mode
    pub fn interpreter_args(&self) -> Vec<String> {
        match &self.interpreter_args {
            Some(args) => args.clone(),
            None => DEFAULT_INTERPRETER_ARGS.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn time_limit(&self) -> Second {
        self.time_limit.unwrap_or(DEFAULT_TIME_LIMIT)
    }

    pub fn workers(&self) -> u8 {
        self.workers.unwrap_or(DEFAULT_WORKERS)
    }

    pub fn output_limit(&self) -> u64 {
        self.output_limit.unwrap_or(DEFAULT_OUTPUT_LIMIT)
    }

    pub fn max_pending(&self) -> usize {
        self.max_pending.unwrap_or(DEFAULT_MAX_PENDING)
    }
}

/// Wall-clock duration in seconds, as written in the configuration file
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Second(pub f64);

/// Fails for negative, non-finite or overflowing values
impl TryFrom<Second> for Duration {
    type Error = std::time::TryFromFloatSecsError;

    fn try_from(value: Second) -> Result<Self, Self::Error> {
        Duration::try_from_secs_f64(value.0)
    }
}
