//! dmachine - bring a docker-machine host up and read its connection environment.
//!
//! ```ignore
//! use dmachine::{MachineConfig, MachineController, RunnerOptions};
//!
//! let config = MachineConfig::new("default")
//!     .with_auto_create(true)
//!     .with_create_option("driver", Some("virtualbox"));
//! let machine = MachineController::connect_with(config, RunnerOptions::default()).await?;
//! let env = machine.environment().await?;
//! println!("DOCKER_HOST={}", env["DOCKER_HOST"]);
//! ```
//!
//! ## Architecture
//!
//! - `process`: runs one tool invocation, draining stdout and stderr concurrently
//! - `command`: the status/env/create/start commands as data
//! - `controller`: the ensure-running state machine
//! - `config`: caller-supplied machine configuration

pub mod command;
pub mod config;
pub mod controller;
pub mod logging;
pub mod process;

pub use command::{Action, Environment, MachineCommand, Status};
pub use config::{CreateOption, DEFAULT_TOOL, MachineConfig};
pub use controller::{MachineController, ensure_running};
pub use dmachine_shared::errors::{MachineError, MachineResult};
pub use process::{
    ExitOutcome, ProcessExecutor, ProcessHooks, ProcessRunner, RunnerOptions, TerminalCause,
};
