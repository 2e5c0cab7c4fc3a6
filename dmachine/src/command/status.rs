//! `status` command and status classification.

use std::fmt;

use dmachine_shared::errors::{MachineError, MachineResult};

use super::{Action, MachineCommand};
use crate::config::MachineConfig;
use crate::process::ProcessExecutor;

/// Exit code with which the tool reports an unknown machine.
const DOES_NOT_EXIST_EXIT_CODE: i32 = 1;

/// Machine state as reported by the tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    DoesNotExist,
    Running,
    Stopped,
}

impl Status {
    /// Classify one status line. Only the exact tool spellings match.
    pub fn from_line(line: &str) -> Option<Self> {
        match line {
            "Running" => Some(Status::Running),
            "Stopped" => Some(Status::Stopped),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Status::DoesNotExist => "DoesNotExist",
            Status::Running => "Running",
            Status::Stopped => "Stopped",
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self, Status::Running)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Line handler state for the `status` command.
///
/// The last recognized line wins; any unrecognized line turns the result into
/// an error once the command has finished.
#[derive(Debug, Default)]
pub struct StatusCollector {
    status: Option<Status>,
    unrecognized: Option<String>,
}

impl StatusCollector {
    pub fn observe(&mut self, machine: &str, line: &str) {
        if line.trim().is_empty() {
            return;
        }
        tracing::info!("Docker machine \"{}\" is {}", machine, line.to_lowercase());
        match Status::from_line(line) {
            Some(status) => self.status = Some(status),
            None => self.unrecognized = Some(line.to_string()),
        }
    }

    pub fn finish(self, machine: &str) -> MachineResult<Status> {
        if let Some(status) = self.unrecognized {
            return Err(MachineError::UnrecognizedStatus {
                machine: machine.to_string(),
                status,
            });
        }
        self.status
            .ok_or_else(|| MachineError::UnrecognizedStatus {
                machine: machine.to_string(),
                status: "<no output>".to_string(),
            })
    }
}

pub fn status_args(config: &MachineConfig) -> Vec<String> {
    vec![
        config.tool.clone(),
        Action::Status.name().to_string(),
        config.name.clone(),
    ]
}

/// Ask the tool for the machine's status.
///
/// Exit code 1 means the machine does not exist; that is a status, not a
/// failure, whatever the tool printed.
pub async fn query_status(
    executor: &dyn ProcessExecutor,
    config: &MachineConfig,
) -> MachineResult<Status> {
    let machine = config.name.as_str();
    let mut collector = StatusCollector::default();

    let result = MachineCommand::new(Action::Status, status_args)
        .on_line(|line| collector.observe(machine, line))
        .execute(executor, config)
        .await;

    match result {
        Ok(_) => collector.finish(machine),
        Err(e) if e.exit_code() == Some(DOES_NOT_EXIST_EXIT_CODE) => {
            tracing::info!("Docker machine \"{}\" does not exist", machine);
            Ok(Status::DoesNotExist)
        }
        Err(e) => Err(e),
    }
}
