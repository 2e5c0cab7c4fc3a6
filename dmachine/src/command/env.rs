//! `env` command: connection variables in cmd-shell export syntax.

use std::collections::HashMap;

use dmachine_shared::errors::MachineResult;

use super::{Action, MachineCommand};
use crate::config::MachineConfig;
use crate::process::ProcessExecutor;

/// Variable name to value, case-sensitive.
pub type Environment = HashMap<String, String>;

/// Marker of a significant `env --shell cmd` line.
pub const SET_PREFIX: &str = "SET ";

/// Split `SET NAME=VALUE` into `(NAME, VALUE)`.
///
/// Lines without the marker, or without `=` after it, yield `None`.
pub fn parse_set_line(line: &str) -> Option<(&str, &str)> {
    line.strip_prefix(SET_PREFIX)?.split_once('=')
}

/// Accumulates assignments in the order seen; later duplicates win.
#[derive(Debug, Default)]
pub struct EnvironmentCollector {
    env: Environment,
}

impl EnvironmentCollector {
    pub fn observe(&mut self, line: &str) {
        match parse_set_line(line) {
            Some((name, value)) => {
                tracing::debug!("{}={}", name, value);
                self.env.insert(name.to_string(), value.to_string());
            }
            None => tracing::trace!(line, "Ignoring env output line"),
        }
    }

    pub fn into_environment(self) -> Environment {
        self.env
    }
}

pub fn env_args(config: &MachineConfig) -> Vec<String> {
    vec![
        config.tool.clone(),
        Action::Env.name().to_string(),
        config.name.clone(),
        "--shell".to_string(),
        "cmd".to_string(),
    ]
}

/// Run `env` and collect the exported variables.
pub async fn fetch_environment(
    executor: &dyn ProcessExecutor,
    config: &MachineConfig,
) -> MachineResult<Environment> {
    let mut collector = EnvironmentCollector::default();

    MachineCommand::new(Action::Env, env_args)
        .on_line(|line| collector.observe(line))
        .execute(executor, config)
        .await?;

    Ok(collector.into_environment())
}
