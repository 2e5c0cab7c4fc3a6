//! Tokio-backed process runner.

use std::io;
use std::process::{ExitStatus, Stdio};

use dmachine_shared::errors::{MachineError, MachineResult};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;

use super::sink::{DiagnosticSink, SinkLine};
use super::{
    ExitOutcome, FORCED_KILL_EXIT_CODE, HookGuard, ProcessExecutor, ProcessHooks, RunnerOptions,
    TerminalCause,
};

/// Runs the machine tool as a child process.
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner {
    options: RunnerOptions,
}

impl ProcessRunner {
    pub fn new(options: RunnerOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &RunnerOptions {
        &self.options
    }
}

#[async_trait::async_trait]
impl ProcessExecutor for ProcessRunner {
    async fn run(
        &self,
        argv: &[String],
        on_line: &mut (dyn for<'l> FnMut(&'l str) + Send),
        hooks: ProcessHooks<'_>,
    ) -> MachineResult<ExitOutcome> {
        let guard = hooks.enter();

        let command_line = argv.join(" ");
        let mut child = spawn(argv, &command_line)?;
        tracing::debug!(command = %command_line, pid = ?child.id(), "Spawned machine tool");

        close_stdin(&mut child, &command_line).await;

        let (stdout, stderr) = match (child.stdout.take(), child.stderr.take()) {
            (Some(stdout), Some(stderr)) => (stdout, stderr),
            _ => {
                destroy(&mut child, &command_line).await;
                return Err(MachineError::Stream {
                    command: command_line,
                    stream: "stdio",
                    source: io::Error::other("child pipes were not captured"),
                });
            }
        };

        self.supervise(&mut child, command_line, stdout, stderr, on_line, guard)
            .await
    }
}

impl ProcessRunner {
    /// Drain both streams of a spawned child and wait for it to exit.
    ///
    /// Every failure path kills the child before returning; `_guard` fires the
    /// end hook when this returns.
    async fn supervise<O, E>(
        &self,
        child: &mut Child,
        command_line: String,
        stdout: O,
        stderr: E,
        on_line: &mut (dyn for<'l> FnMut(&'l str) + Send),
        _guard: HookGuard<'_>,
    ) -> MachineResult<ExitOutcome>
    where
        O: AsyncRead + Unpin + Send,
        E: AsyncRead + Unpin + Send + 'static,
    {
        let sink = DiagnosticSink::spawn(command_line.clone(), self.options.surface_stderr);
        let mut drain = tokio::spawn(drain_stderr(stderr, sink.sender()));

        let stdout_sink = sink.sender();
        let pumped = pump_stdout(stdout, on_line, &stdout_sink).await;
        drop(stdout_sink);
        if let Err(source) = pumped {
            drain.abort();
            destroy(child, &command_line).await;
            return Err(MachineError::Stream {
                command: command_line,
                stream: "stdout",
                source,
            });
        }

        let drain_timeout = self.options.stderr_drain_timeout;
        let drained = match tokio::time::timeout(drain_timeout, &mut drain).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) => Err(io::Error::other(join_err)),
            Err(_) => {
                drain.abort();
                destroy(child, &command_line).await;
                return Err(MachineError::Timeout {
                    command: command_line,
                    waiting_for: "stderr drain",
                    timeout: drain_timeout,
                });
            }
        };
        if let Err(source) = drained {
            destroy(child, &command_line).await;
            return Err(MachineError::Stream {
                command: command_line,
                stream: "stderr",
                source,
            });
        }

        let stderr = sink.finish().await;

        let (exit_code, cause) =
            match tokio::time::timeout(self.options.exit_timeout, child.wait()).await {
                Ok(Ok(status)) => (exit_code_of(status), TerminalCause::Exited),
                Ok(Err(source)) => {
                    destroy(child, &command_line).await;
                    return Err(MachineError::Stream {
                        command: command_line,
                        stream: "exit status",
                        source,
                    });
                }
                Err(_) => {
                    tracing::warn!(
                        command = %command_line,
                        timeout = ?self.options.exit_timeout,
                        "Machine tool did not exit, killing it"
                    );
                    destroy(child, &command_line).await;
                    (
                        FORCED_KILL_EXIT_CODE,
                        TerminalCause::ForcedKill {
                            after: self.options.exit_timeout,
                        },
                    )
                }
            };

        tracing::debug!(command = %command_line, exit_code, ?cause, "Machine tool finished");

        Ok(ExitOutcome {
            exit_code,
            stderr,
            cause,
        })
    }
}

fn spawn(argv: &[String], command_line: &str) -> MachineResult<Child> {
    let (program, args) = argv.split_first().ok_or_else(|| MachineError::Spawn {
        command: String::new(),
        source: io::Error::new(io::ErrorKind::InvalidInput, "empty argument vector"),
    })?;

    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    cmd.spawn().map_err(|source| {
        tracing::error!(command = %command_line, error = %source, "Failed to spawn machine tool");
        MachineError::Spawn {
            command: command_line.to_string(),
            source,
        }
    })
}

// The tool never reads input; a failed close is only worth a log line.
async fn close_stdin(child: &mut Child, command_line: &str) {
    if let Some(mut stdin) = child.stdin.take()
        && let Err(e) = stdin.shutdown().await
    {
        tracing::info!(command = %command_line, error = %e, "Failed to close machine tool stdin");
    }
}

async fn destroy(child: &mut Child, command_line: &str) {
    if let Err(e) = child.kill().await {
        tracing::debug!(command = %command_line, error = %e, "Failed to kill machine tool");
    }
}

async fn pump_stdout<R>(
    stdout: R,
    on_line: &mut (dyn for<'l> FnMut(&'l str) + Send),
    sink: &mpsc::Sender<SinkLine>,
) -> io::Result<()>
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(stdout);
    let mut buf = Vec::new();
    while let Some(line) = read_line_lossy(&mut reader, &mut buf).await? {
        on_line(&line);
        let _ = sink.send(SinkLine::Stdout(line)).await;
    }
    Ok(())
}

async fn drain_stderr<R>(stderr: R, sink: mpsc::Sender<SinkLine>) -> io::Result<()>
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(stderr);
    let mut buf = Vec::new();
    while let Some(line) = read_line_lossy(&mut reader, &mut buf).await? {
        let _ = sink.send(SinkLine::Stderr(line)).await;
    }
    Ok(())
}

/// Read one line without its terminator. `None` at end-of-stream.
async fn read_line_lossy<R>(reader: &mut R, buf: &mut Vec<u8>) -> io::Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    buf.clear();
    if reader.read_until(b'\n', buf).await? == 0 {
        return Ok(None);
    }
    while matches!(buf.last(), Some(b'\n' | b'\r')) {
        buf.pop();
    }
    Ok(Some(String::from_utf8_lossy(buf).into_owned()))
}

#[cfg(unix)]
fn exit_code_of(status: ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    // Shell convention for signal deaths.
    status
        .code()
        .or_else(|| status.signal().map(|sig| 128 + sig))
        .unwrap_or(FORCED_KILL_EXIT_CODE)
}

#[cfg(not(unix))]
fn exit_code_of(status: ExitStatus) -> i32 {
    status.code().unwrap_or(FORCED_KILL_EXIT_CODE)
}
