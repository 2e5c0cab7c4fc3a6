//! Process execution for the machine tool.
//!
//! ## Architecture
//!
//! - **ProcessExecutor**: seam for running one argument vector (real or fake)
//! - **ProcessRunner**: tokio-backed executor that drains both pipes
//! - **ProcessHooks**: start/end callbacks bracketing one run
//!
//! ```text
//! spawn ─► close stdin ─┬─► stdout pump (caller) ──► on_line
//!                       └─► stderr drain (task) ──► diagnostic sink
//!          stdout EOF ─► join drain (bounded) ─► wait exit (bounded, kill on expiry)
//! ```
//!
//! Both pipes are read continuously; reading one at a time lets the child
//! block on a full pipe buffer and never exit.

mod hooks;
mod runner;
mod sink;

use std::time::Duration;

use dmachine_shared::MachineResult;

pub use hooks::{HookGuard, ProcessHooks};
pub use runner::ProcessRunner;

/// Exit code reported when the process had to be killed.
pub const FORCED_KILL_EXIT_CODE: i32 = -1;

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalCause {
    /// The process exited on its own.
    Exited,
    /// The process outlived the exit bound and was killed.
    ForcedKill { after: Duration },
}

/// Result of one process run.
///
/// A non-zero `exit_code` is not an error at this level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExitOutcome {
    pub exit_code: i32,
    /// Everything the process wrote to stderr, one line per line.
    pub stderr: String,
    pub cause: TerminalCause,
}

impl ExitOutcome {
    pub fn exited(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            exit_code,
            stderr: stderr.into(),
            cause: TerminalCause::Exited,
        }
    }

    pub fn success(&self) -> bool {
        self.exit_code == 0 && self.cause == TerminalCause::Exited
    }
}

/// Timing and logging knobs for [`ProcessRunner`].
#[derive(Debug, Clone)]
pub struct RunnerOptions {
    /// Bound on the stderr drain after stdout reaches end-of-stream.
    pub stderr_drain_timeout: Duration,
    /// Bound on process exit after both streams are drained.
    pub exit_timeout: Duration,
    /// Log stderr lines as warnings in addition to capturing them.
    pub surface_stderr: bool,
}

impl Default for RunnerOptions {
    fn default() -> Self {
        Self {
            stderr_drain_timeout: Duration::from_secs(2),
            exit_timeout: Duration::from_secs(10),
            surface_stderr: true,
        }
    }
}

/// Runs one external process per call.
///
/// Implementations must call `hooks.enter()` before doing anything else so
/// the end hook fires on every exit path.
#[async_trait::async_trait]
pub trait ProcessExecutor: Send + Sync {
    /// Run `argv`, feeding each stdout line to `on_line`.
    async fn run(
        &self,
        argv: &[String],
        on_line: &mut (dyn for<'l> FnMut(&'l str) + Send),
        hooks: ProcessHooks<'_>,
    ) -> MachineResult<ExitOutcome>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runner_options_default() {
        let opts = RunnerOptions::default();
        assert_eq!(opts.stderr_drain_timeout, Duration::from_secs(2));
        assert_eq!(opts.exit_timeout, Duration::from_secs(10));
        assert!(opts.surface_stderr);
    }

    #[test]
    fn test_outcome_success() {
        assert!(ExitOutcome::exited(0, "").success());
        assert!(!ExitOutcome::exited(1, "").success());

        let killed = ExitOutcome {
            exit_code: FORCED_KILL_EXIT_CODE,
            stderr: String::new(),
            cause: TerminalCause::ForcedKill {
                after: Duration::from_secs(10),
            },
        };
        assert!(!killed.success());
    }
}
