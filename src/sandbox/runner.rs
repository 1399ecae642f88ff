use std::process::Stdio;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::time::timeout;

use super::{ExecutionUnit, RunOutcome, Sandbox};

const SOURCE_FILE_NAME: &str = "main.py";
const SANDBOX_PATH: &str = "/usr/local/sbin:/usr/local/bin:/usr/sbin:/usr/bin:/sbin:/bin";
const SANDBOX_LOCALE: &str = "C.UTF-8";
const READ_CHUNK: usize = 8192;

/// How long the pipes may stay open once the interpreter has exited
const DRAIN_GRACE: Duration = Duration::from_millis(200);

/// Bytes read from one output pipe, cut at `limit`
///
/// Reading continues past the limit and discards the rest, so a chatty
/// program is never blocked on a full pipe.
struct Capture {
    buf: Vec<u8>,
    limit: usize,
    truncated: bool,
}

impl Capture {
    fn new(limit: usize) -> Self {
        Self {
            buf: Vec::new(),
            limit,
            truncated: false,
        }
    }

    /// Reads until EOF; whatever was read stays in `buf` if this is cancelled
    async fn fill<R: AsyncRead + Unpin>(&mut self, reader: &mut R) -> std::io::Result<()> {
        let mut chunk = [0u8; READ_CHUNK];
        loop {
            let n = reader.read(&mut chunk).await?;
            if n == 0 {
                return Ok(());
            }

            let room = self.limit - self.buf.len();
            if n > room {
                self.buf.extend_from_slice(&chunk[..room]);
                self.truncated = true;
            } else {
                self.buf.extend_from_slice(&chunk[..n]);
            }
        }
    }

    fn into_string(self, stream: &str) -> (String, Option<String>) {
        let marker = self
            .truncated
            .then(|| format!("[{stream} truncated after {} bytes]", self.limit));
        (String::from_utf8_lossy(&self.buf).into_owned(), marker)
    }
}

impl Sandbox {
    /// Executes the unit under the sandbox's configured time limit
    pub async fn run(&self, unit: &ExecutionUnit) -> Result<RunOutcome> {
        self.run_with_limit(unit, self.time_limit).await
    }

    /// Executes the unit in a fresh interpreter process
    ///
    /// The verdict follows the interpreter's own exit: once it has exited the
    /// rest of its process group is killed and the pipes get [`DRAIN_GRACE`]
    /// to reach EOF. A non-zero exit or a timeout is reported through
    /// [`RunOutcome`]; `Err` is reserved for failures of the sandbox itself
    /// (scratch directory, source file, spawning the interpreter, collecting
    /// its output).
    ///
    /// Descendants that move to a session of their own are out of reach of
    /// the group kill and may outlive the run.
    pub async fn run_with_limit(
        &self,
        unit: &ExecutionUnit,
        time_limit: Duration,
    ) -> Result<RunOutcome> {
        // Removed on drop, whichever way this function returns
        let work_dir = tempfile::Builder::new()
            .prefix(&format!("coursebox-{}-", self.id))
            .tempdir()
            .context("Failed to create sandbox work directory")?;

        let source_path = work_dir.path().join(SOURCE_FILE_NAME);
        tokio::fs::write(&source_path, unit.source())
            .await
            .with_context(|| format!("Failed to write {}", source_path.display()))?;

        let mut child = self.spawn(work_dir.path())?;
        let pid = child.id();
        let mut stdout = child.stdout.take().context("Child stdout was not piped")?;
        let mut stderr = child.stderr.take().context("Child stderr was not piped")?;

        let start_time = Instant::now();
        let mut stdout_cap = Capture::new(self.output_limit);
        let mut stderr_cap = Capture::new(self.output_limit);

        let status = {
            let reading = async {
                tokio::try_join!(stdout_cap.fill(&mut stdout), stderr_cap.fill(&mut stderr))
            };
            tokio::pin!(reading);
            let mut drained = false;

            let exited = timeout(time_limit, async {
                loop {
                    tokio::select! {
                        status = child.wait() => break status,
                        res = &mut reading, if !drained => {
                            if let Err(e) = res {
                                break Err(e);
                            }
                            drained = true;
                        }
                    }
                }
            })
            .await;

            match exited {
                Ok(Ok(status)) => {
                    kill_group(pid);
                    if !drained {
                        match timeout(DRAIN_GRACE, &mut reading).await {
                            Ok(res) => {
                                res.context("Failed to collect interpreter output")?;
                            }
                            Err(_) => log::debug!(
                                "Sandbox {} output still open {DRAIN_GRACE:?} after exit",
                                self.id
                            ),
                        }
                    }
                    status
                }
                Ok(Err(e)) => {
                    self.terminate(pid, &mut child).await;
                    return Err(e).context("Failed to collect interpreter output");
                }
                Err(_) => {
                    self.terminate(pid, &mut child).await;
                    log::warn!(
                        "Sandbox {} run killed after {:?} (limit {time_limit:?})",
                        self.id,
                        start_time.elapsed()
                    );
                    return Ok(RunOutcome::timed_out(time_limit));
                }
            }
        };

        log::debug!(
            "Sandbox {} run finished in {:?} with {status}",
            self.id,
            start_time.elapsed()
        );

        let (stdout, stdout_marker) = stdout_cap.into_string("stdout");
        let (mut stderr, stderr_marker) = stderr_cap.into_string("stderr");
        for marker in [stdout_marker, stderr_marker].into_iter().flatten() {
            log::info!("Sandbox {}: {marker}", self.id);
            if !stderr.is_empty() && !stderr.ends_with('\n') {
                stderr.push('\n');
            }
            stderr.push_str(&marker);
        }

        Ok(RunOutcome {
            succeeded: status.success(),
            stdout,
            stderr,
            timed_out: false,
        })
    }

    /// Starts the interpreter on the source file inside `work_dir`
    fn spawn(&self, work_dir: &std::path::Path) -> Result<Child> {
        let mut cmd = Command::new(&self.interpreter);
        cmd.args(&self.interpreter_args)
            .arg(SOURCE_FILE_NAME)
            .current_dir(work_dir)
            .env_clear()
            .env("PATH", SANDBOX_PATH)
            .env("LANG", SANDBOX_LOCALE)
            .env("LC_ALL", SANDBOX_LOCALE)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .process_group(0)
            .kill_on_drop(true);

        cmd.spawn()
            .with_context(|| format!("Failed to spawn interpreter {}", self.interpreter))
    }

    /// Kills the child's whole process group and reaps the child
    ///
    /// `pid` is taken at spawn time: once the child has been reaped `Child::id`
    /// returns `None`, while descendants holding the output pipes may still live
    /// in its group.
    async fn terminate(&self, pid: Option<u32>, child: &mut Child) {
        kill_group(pid);

        if let Ok(None) = child.try_wait()
            && let Err(e) = child.kill().await
        {
            log::error!("Sandbox {} failed to kill interpreter: {e}", self.id);
        }
    }
}

/// Sends `SIGKILL` to the group led by `pid`, see `process_group(0)` in `spawn`
fn kill_group(pid: Option<u32>) {
    let Some(pid) = pid else {
        return;
    };

    let ret = unsafe { libc::killpg(pid as libc::pid_t, libc::SIGKILL) };
    if ret != 0 {
        // ESRCH once every member is gone
        log::trace!("killpg({pid}) failed: {}", std::io::Error::last_os_error());
    }
}
