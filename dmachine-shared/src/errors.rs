//! Error taxonomy for driving the machine tool.
//!
//! Every variant aborts the current command or controller step; nothing in
//! the library retries. Messages keep the tool's own diagnostic text verbatim.

use std::io;
use std::time::Duration;

use thiserror::Error;

/// Result alias used throughout dmachine.
pub type MachineResult<T> = Result<T, MachineError>;

#[derive(Debug, Error)]
pub enum MachineError {
    /// The tool process could not be launched (not found, permission denied).
    #[error("failed to start `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },

    /// Reading one of the process streams failed. The process has been killed.
    #[error("failed to read {stream} of `{command}`: {source}")]
    Stream {
        command: String,
        stream: &'static str,
        #[source]
        source: io::Error,
    },

    /// A bounded wait expired. The process has been killed.
    #[error("timed out after {timeout:?} waiting for {waiting_for} of `{command}`")]
    Timeout {
        command: String,
        waiting_for: &'static str,
        timeout: Duration,
    },

    /// The tool exited with a non-zero status.
    #[error("docker machine \"{machine}\" {action} failed with exit code {exit_code}{}", format_stderr(.stderr))]
    CommandFailed {
        machine: String,
        action: String,
        exit_code: i32,
        stderr: String,
    },

    /// The status line matched none of the known states.
    #[error("docker machine \"{machine}\" reported unknown status - {status}")]
    UnrecognizedStatus { machine: String, status: String },

    /// The machine cannot be brought up with the given configuration.
    #[error("{0}")]
    Config(String),

    /// A configuration file or value could not be used.
    #[error("invalid machine configuration: {0}")]
    InvalidConfig(String),

    /// Re-verification after create/start found the machine in another state.
    #[error("docker machine \"{machine}\" is {status} after start, expected running")]
    NotRunning { machine: String, status: String },
}

impl MachineError {
    /// Exit code of the failed tool invocation, if this error carries one.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            MachineError::CommandFailed { exit_code, .. } => Some(*exit_code),
            _ => None,
        }
    }
}

fn format_stderr(stderr: &str) -> String {
    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!(": {}", trimmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_failed_includes_diagnostics() {
        let err = MachineError::CommandFailed {
            machine: "default".to_string(),
            action: "create".to_string(),
            exit_code: 3,
            stderr: "Error creating machine: boom\n".to_string(),
        };

        let msg = err.to_string();
        assert!(msg.contains("\"default\""));
        assert!(msg.contains("create"));
        assert!(msg.contains("exit code 3"));
        assert!(msg.ends_with("Error creating machine: boom"));
        assert_eq!(err.exit_code(), Some(3));
    }

    #[test]
    fn test_command_failed_without_diagnostics() {
        let err = MachineError::CommandFailed {
            machine: "default".to_string(),
            action: "start".to_string(),
            exit_code: 2,
            stderr: String::new(),
        };

        assert!(err.to_string().ends_with("exit code 2"));
    }

    #[test]
    fn test_unrecognized_status_mentions_line() {
        let err = MachineError::UnrecognizedStatus {
            machine: "default".to_string(),
            status: "Saved".to_string(),
        };

        assert!(err.to_string().contains("Saved"));
        assert_eq!(err.exit_code(), None);
    }

    #[test]
    fn test_timeout_display() {
        let err = MachineError::Timeout {
            command: "docker-machine status default".to_string(),
            waiting_for: "stderr drain",
            timeout: Duration::from_secs(2),
        };

        let msg = err.to_string();
        assert!(msg.contains("2s"));
        assert!(msg.contains("stderr drain"));
        assert!(msg.contains("docker-machine status default"));
    }
}
