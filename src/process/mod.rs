//! Subprocess execution for engine commands.
//!
//! Commands run with piped output that is drained on reader threads while the
//! process is alive, so a chatty child can never block on a full pipe. The
//! execution context is polled between short waits: a cancelled context
//! interrupts the child, an expired deadline kills it.

use std::borrow::Cow;
use std::io::Read;
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use shell_escape::escape;
use wait_timeout::ChildExt;

use crate::context::ExecContext;
use crate::error::{EngineError, EngineResult};

/// How long to block in a single wait before re-checking the context
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Time a child gets to exit after SIGINT before it is killed
#[cfg_attr(not(unix), allow(dead_code))]
const INTERRUPT_GRACE: Duration = Duration::from_secs(5);

/// Timeout for collecting output from child process pipes
const OUTPUT_COLLECTION_TIMEOUT: Duration = Duration::from_secs(10);

/// Maximum captured size per stream (10MB)
const MAX_OUTPUT_SIZE: usize = 10 * 1024 * 1024;

/// A fully described command invocation.
#[derive(Debug, Clone)]
pub struct CommandSpec {
    program: PathBuf,
    args: Vec<String>,
    current_dir: Option<PathBuf>,
    env: Vec<(String, String)>,
}

impl CommandSpec {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            current_dir: None,
            env: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Shell-quoted command line, for logs and error messages.
    pub fn display(&self) -> String {
        let program = self
            .program
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.program.display().to_string());

        std::iter::once(program)
            .chain(
                self.args
                    .iter()
                    .map(|arg| escape(Cow::Borrowed(arg.as_str())).into_owned()),
            )
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Captured result of a command that ran to completion.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
    pub duration: Duration,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Run a command to completion under `ctx`.
///
/// A non-zero exit status is not an error here; callers classify it.
pub fn run_command(ctx: &ExecContext, spec: &CommandSpec) -> EngineResult<CommandOutput> {
    ctx.check()?;

    let command_line = spec.display();
    tracing::debug!(command = %command_line, "running engine command");

    let start = Instant::now();
    let mut child = spawn(spec, &command_line)?;

    // Drain pipes before waiting, otherwise the child can block on write()
    // once the pipe buffer fills.
    let stdout_rx = collect_stream(child.stdout.take());
    let stderr_rx = collect_stream(child.stderr.take());

    let status = wait_under_context(ctx, &mut child, &command_line, start)?;
    let duration = start.elapsed();

    let stdout = stdout_rx
        .recv_timeout(OUTPUT_COLLECTION_TIMEOUT)
        .unwrap_or_else(|_| "[output collection timed out]".to_string());
    let stderr = stderr_rx
        .recv_timeout(OUTPUT_COLLECTION_TIMEOUT)
        .unwrap_or_else(|_| "[output collection timed out]".to_string());

    tracing::debug!(
        command = %command_line,
        exit_code = ?status.code(),
        duration_ms = duration.as_millis() as u64,
        "engine command finished"
    );

    Ok(CommandOutput {
        stdout,
        stderr,
        exit_code: status.code(),
        duration,
    })
}

fn spawn(spec: &CommandSpec, command_line: &str) -> EngineResult<Child> {
    let mut cmd = Command::new(&spec.program);
    cmd.args(&spec.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    if let Some(dir) = &spec.current_dir {
        cmd.current_dir(dir);
    }
    for (key, value) in &spec.env {
        cmd.env(key, value);
    }

    cmd.spawn().map_err(|source| EngineError::Spawn {
        command: command_line.to_string(),
        source,
    })
}

fn collect_stream<R: Read + Send + 'static>(stream: Option<R>) -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel();
    match stream {
        Some(stream) => {
            thread::spawn(move || {
                let _ = tx.send(read_stream_to_string(stream));
            });
        }
        None => {
            let _ = tx.send(String::new());
        }
    }
    rx
}

fn wait_under_context(
    ctx: &ExecContext,
    child: &mut Child,
    command_line: &str,
    start: Instant,
) -> EngineResult<ExitStatus> {
    loop {
        let slice = match ctx.remaining() {
            Some(remaining) => remaining.min(POLL_INTERVAL),
            None => POLL_INTERVAL,
        };

        let waited = child.wait_timeout(slice).map_err(|e| {
            kill_child_process(child);
            EngineError::Io(e)
        })?;
        if let Some(status) = waited {
            // A terminal Ctrl+C reaches the whole process group, so the child
            // often exits on its own before the flag is polled.
            if ctx.is_cancelled() {
                tracing::warn!(command = %command_line, ?status, "engine command exited after cancellation");
                return Err(EngineError::Cancelled);
            }
            return Ok(status);
        }

        if ctx.is_cancelled() {
            tracing::warn!(command = %command_line, "cancelled, interrupting engine command");
            interrupt_child_process(child);
            return Err(EngineError::Cancelled);
        }

        if ctx.remaining() == Some(Duration::ZERO) {
            tracing::warn!(command = %command_line, "deadline reached, killing engine command");
            kill_child_process(child);
            return Err(EngineError::Timeout {
                command: command_line.to_string(),
                timeout: ctx.timeout().unwrap_or_else(|| start.elapsed()),
            });
        }
    }
}

/// Read a stream to string, capped at MAX_OUTPUT_SIZE.
///
/// Data past the cap is drained and discarded so the writer never sees a
/// broken pipe.
fn read_stream_to_string<R: Read>(mut stream: R) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 8192];

    loop {
        match stream.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => {
                let remaining = MAX_OUTPUT_SIZE.saturating_sub(buf.len());
                let to_copy = n.min(remaining);
                buf.extend_from_slice(&chunk[..to_copy]);
                if to_copy < n {
                    while stream.read(&mut chunk).unwrap_or(0) > 0 {}
                    buf.extend_from_slice(b"\n[output truncated at 10MB]");
                    break;
                }
            }
            Err(_) => {
                if buf.is_empty() {
                    return "[error reading output]".to_string();
                }
                break;
            }
        }
    }

    String::from_utf8_lossy(&buf).into_owned()
}

/// Ask the child to stop (SIGINT), then kill it if it ignores the request.
fn interrupt_child_process(child: &mut Child) {
    #[cfg(unix)]
    {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        if let Ok(pid) = i32::try_from(child.id()) {
            if kill(Pid::from_raw(pid), Signal::SIGINT).is_ok() {
                if let Ok(Some(_)) = child.wait_timeout(INTERRUPT_GRACE) {
                    return;
                }
            }
        }
    }

    kill_child_process(child);
}

fn kill_child_process(child: &mut Child) {
    // The process may already have exited
    let _ = child.kill();
    // Reap the zombie
    let _ = child.wait();
}
