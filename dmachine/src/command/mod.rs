//! Data-driven machine commands.
//!
//! A [`MachineCommand`] is a value: an [`Action`], a pure argument builder
//! over [`MachineConfig`], a per-line stdout handler and optional start/end
//! hooks. One generic [`MachineCommand::execute`] runs any of them through a
//! [`ProcessExecutor`] and turns the exit outcome into a typed result.
//!
//! | action | argument vector                                   |
//! |--------|---------------------------------------------------|
//! | status | `tool status <name>`                              |
//! | env    | `tool env <name> --shell cmd`                     |
//! | create | `tool create [--flag [value]]... <name>`          |
//! | start  | `tool start <name>`                               |

mod env;
mod provision;
mod status;

use std::fmt;

use dmachine_shared::errors::{MachineError, MachineResult};

use crate::config::MachineConfig;
use crate::process::{ExitOutcome, ProcessExecutor, ProcessHooks, TerminalCause};

pub use env::{
    Environment, EnvironmentCollector, SET_PREFIX, env_args, fetch_environment, parse_set_line,
};
pub use provision::{create_args, create_machine, start_args, start_machine};
pub use status::{Status, StatusCollector, query_status, status_args};

/// Builds the full argument vector (tool first) from the configuration.
pub type ArgsBuilder = fn(&MachineConfig) -> Vec<String>;

/// Tool subcommand a command runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Status,
    Env,
    Create,
    Start,
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Action::Status => "status",
            Action::Env => "env",
            Action::Create => "create",
            Action::Start => "start",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One invocation of the machine tool.
pub struct MachineCommand<'a> {
    action: Action,
    build_args: ArgsBuilder,
    on_line: Box<dyn FnMut(&str) + Send + 'a>,
    hooks: ProcessHooks<'a>,
}

impl<'a> MachineCommand<'a> {
    /// Command with a no-op line handler and no hooks.
    pub fn new(action: Action, build_args: ArgsBuilder) -> Self {
        Self {
            action,
            build_args,
            on_line: Box::new(|_: &str| {}),
            hooks: ProcessHooks::new(),
        }
    }

    pub fn on_line(mut self, handler: impl FnMut(&str) + Send + 'a) -> Self {
        self.on_line = Box::new(handler);
        self
    }

    pub fn hooks(mut self, hooks: ProcessHooks<'a>) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn action(&self) -> Action {
        self.action
    }

    pub fn args(&self, config: &MachineConfig) -> Vec<String> {
        (self.build_args)(config)
    }

    /// Run the command once.
    ///
    /// Non-zero exits become [`MachineError::CommandFailed`] carrying the
    /// captured stderr; a forced kill becomes [`MachineError::Timeout`].
    pub async fn execute(
        self,
        executor: &dyn ProcessExecutor,
        config: &MachineConfig,
    ) -> MachineResult<ExitOutcome> {
        let Self {
            action,
            build_args,
            mut on_line,
            hooks,
        } = self;

        let argv = build_args(config);
        tracing::debug!(machine = %config.name, %action, ?argv, "Executing machine command");

        let outcome = executor.run(&argv, &mut *on_line, hooks).await?;

        if let TerminalCause::ForcedKill { after } = outcome.cause {
            return Err(MachineError::Timeout {
                command: argv.join(" "),
                waiting_for: "process exit",
                timeout: after,
            });
        }
        if outcome.exit_code != 0 {
            return Err(MachineError::CommandFailed {
                machine: config.name.clone(),
                action: action.to_string(),
                exit_code: outcome.exit_code,
                stderr: outcome.stderr,
            });
        }
        Ok(outcome)
    }
}

impl fmt::Debug for MachineCommand<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MachineCommand")
            .field("action", &self.action)
            .field("hooks", &self.hooks)
            .finish_non_exhaustive()
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{FakeExecutor, Reply};
    use super::*;
    use parking_lot::Mutex;

    fn echo_args(config: &MachineConfig) -> Vec<String> {
        vec![config.tool.clone(), "status".to_string(), config.name.clone()]
    }

    #[test]
    fn test_action_names() {
        assert_eq!(Action::Status.to_string(), "status");
        assert_eq!(Action::Env.to_string(), "env");
        assert_eq!(Action::Create.to_string(), "create");
        assert_eq!(Action::Start.to_string(), "start");
    }

    #[tokio::test]
    async fn test_execute_feeds_lines_and_returns_outcome() {
        let executor = FakeExecutor::new().reply("status", Reply::lines(&["a", "b"]));
        let config = MachineConfig::new("dev");
        let mut seen = Vec::new();

        let outcome = MachineCommand::new(Action::Status, echo_args)
            .on_line(|line| seen.push(line.to_string()))
            .execute(&executor, &config)
            .await
            .unwrap();

        assert!(outcome.success());
        assert_eq!(seen, vec!["a", "b"]);
        assert_eq!(
            executor.calls(),
            vec![vec!["docker-machine".to_string(), "status".into(), "dev".into()]]
        );
    }

    #[tokio::test]
    async fn test_nonzero_exit_becomes_command_failed() {
        let executor = FakeExecutor::new().reply("status", Reply::exit(2, "boom"));
        let config = MachineConfig::new("dev");

        let err = MachineCommand::new(Action::Status, echo_args)
            .execute(&executor, &config)
            .await
            .unwrap_err();

        match err {
            MachineError::CommandFailed {
                machine,
                action,
                exit_code,
                stderr,
            } => {
                assert_eq!(machine, "dev");
                assert_eq!(action, "status");
                assert_eq!(exit_code, 2);
                assert!(stderr.contains("boom"));
            }
            other => panic!("expected CommandFailed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_forced_kill_becomes_timeout() {
        let mut reply = Reply::exit(-1, "");
        reply.forced_kill = true;
        let executor = FakeExecutor::new().reply("status", reply);
        let config = MachineConfig::new("dev");

        let err = MachineCommand::new(Action::Status, echo_args)
            .execute(&executor, &config)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            MachineError::Timeout {
                waiting_for: "process exit",
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_hooks_bracket_execution() {
        let executor = FakeExecutor::new().reply("status", Reply::exit(5, "nope"));
        let config = MachineConfig::new("dev");
        let events = Mutex::new(Vec::new());

        let result = MachineCommand::new(Action::Status, echo_args)
            .on_line(|_| events.lock().push("line"))
            .hooks(
                ProcessHooks::new()
                    .on_start(|| events.lock().push("start"))
                    .on_end(|| events.lock().push("end")),
            )
            .execute(&executor, &config)
            .await;

        assert!(result.is_err());
        assert_eq!(*events.lock(), vec!["start", "end"]);
    }
}
