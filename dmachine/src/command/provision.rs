//! `create` and `start` commands with progress reporting.

use std::time::Instant;

use dmachine_shared::errors::MachineResult;
use parking_lot::Mutex;

use super::{Action, MachineCommand};
use crate::config::MachineConfig;
use crate::process::{ProcessExecutor, ProcessHooks};

pub fn create_args(config: &MachineConfig) -> Vec<String> {
    let mut args = vec![config.tool.clone(), Action::Create.name().to_string()];
    for option in &config.create_options {
        args.push(format!("--{}", option.flag));
        if let Some(value) = option.argument() {
            args.push(value.to_string());
        }
    }
    args.push(config.name.clone());
    args
}

pub fn start_args(config: &MachineConfig) -> Vec<String> {
    vec![
        config.tool.clone(),
        Action::Start.name().to_string(),
        config.name.clone(),
    ]
}

/// Create the machine. Can take minutes.
pub async fn create_machine(
    executor: &dyn ProcessExecutor,
    config: &MachineConfig,
) -> MachineResult<()> {
    let machine = config.name.as_str();
    let started = Mutex::new(None::<Instant>);

    let hooks = ProcessHooks::new()
        .on_start(|| {
            tracing::info!(
                "Creating docker machine \"{}\" with args {}",
                machine,
                config.describe_create_options()
            );
            tracing::info!("This might take a while ...");
            *started.lock() = Some(Instant::now());
        })
        .on_end(|| {
            tracing::info!(
                "Docker machine \"{}\" create finished in {} seconds",
                machine,
                elapsed_secs(&started)
            );
        });

    MachineCommand::new(Action::Create, create_args)
        .hooks(hooks)
        .execute(executor, config)
        .await?;
    Ok(())
}

/// Start a stopped machine.
pub async fn start_machine(
    executor: &dyn ProcessExecutor,
    config: &MachineConfig,
) -> MachineResult<()> {
    let machine = config.name.as_str();
    let started = Mutex::new(None::<Instant>);

    let hooks = ProcessHooks::new()
        .on_start(|| {
            tracing::info!("Starting docker machine \"{}\"", machine);
            *started.lock() = Some(Instant::now());
        })
        .on_end(|| {
            tracing::info!(
                "Docker machine \"{}\" start finished in {} seconds",
                machine,
                elapsed_secs(&started)
            );
        });

    MachineCommand::new(Action::Start, start_args)
        .hooks(hooks)
        .execute(executor, config)
        .await?;
    Ok(())
}

fn elapsed_secs(started: &Mutex<Option<Instant>>) -> u64 {
    started
        .lock()
        .map(|at| at.elapsed().as_secs())
        .unwrap_or_default()
}
