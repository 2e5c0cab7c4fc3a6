//! Machine controller: bring the machine to `Running`, then serve queries.
//!
//! ```text
//! status ──► Running ─────────────────────────────► done
//!        ├─► Stopped ──► start ───────────────────► Running
//!        └─► DoesNotExist ─┬─ auto_create ─► create ► Running
//!                          └─ otherwise ──► Config error
//! ```
//!
//! After create/start the machine is assumed running without another status
//! round-trip unless `verify_after_start` is set.

use dmachine_shared::errors::{MachineError, MachineResult};

use crate::command::{
    Environment, Status, create_machine, fetch_environment, query_status, start_machine,
};
use crate::config::MachineConfig;
use crate::process::{ProcessExecutor, ProcessRunner, RunnerOptions};

/// Handle to a machine that was running when it was constructed.
pub struct MachineController<E = ProcessRunner> {
    config: MachineConfig,
    executor: E,
    initial_status: Status,
}

impl MachineController<ProcessRunner> {
    /// Connect using the real tool with the given runner options.
    pub async fn connect_with(
        config: MachineConfig,
        options: RunnerOptions,
    ) -> MachineResult<Self> {
        Self::connect(config, ProcessRunner::new(options)).await
    }
}

impl<E: ProcessExecutor> MachineController<E> {
    /// Ensure the machine is running, creating or starting it as needed.
    pub async fn connect(config: MachineConfig, executor: E) -> MachineResult<Self> {
        config.validate()?;
        let initial_status = ensure_running(&executor, &config).await?;
        Ok(Self {
            config,
            executor,
            initial_status,
        })
    }

    pub fn config(&self) -> &MachineConfig {
        &self.config
    }

    /// Status observed before any create/start was issued.
    pub fn initial_status(&self) -> Status {
        self.initial_status
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    /// Query the current status without changing anything.
    pub async fn status(&self) -> MachineResult<Status> {
        query_status(&self.executor, &self.config).await
    }

    /// Connection variables for the running machine.
    pub async fn environment(&self) -> MachineResult<Environment> {
        fetch_environment(&self.executor, &self.config).await
    }
}

/// Run the ensure-running state machine once.
///
/// Returns the status found before acting. Nothing is retried.
pub async fn ensure_running(
    executor: &dyn ProcessExecutor,
    config: &MachineConfig,
) -> MachineResult<Status> {
    let status = query_status(executor, config).await?;
    tracing::debug!(machine = %config.name, %status, "Machine status retrieved, determining action");

    match status {
        Status::Running => return Ok(status),
        Status::Stopped => start_machine(executor, config).await?,
        Status::DoesNotExist if config.auto_create => create_machine(executor, config).await?,
        Status::DoesNotExist => {
            return Err(MachineError::Config(format!(
                "{} does not exist and auto-create is disabled",
                config.name
            )));
        }
    }

    if config.verify_after_start {
        let now = query_status(executor, config).await?;
        if !now.is_running() {
            return Err(MachineError::NotRunning {
                machine: config.name.clone(),
                status: now.to_string(),
            });
        }
    }

    tracing::info!(machine = %config.name, from = %status, "Docker machine is running");
    Ok(status)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::testing::{FakeExecutor, Reply};

    fn does_not_exist() -> Reply {
        Reply::exit(1, "Host does not exist: \"dev\"")
    }

    #[tokio::test]
    async fn test_running_needs_no_action() {
        let executor = FakeExecutor::new().reply("status", Reply::lines(&["Running"]));

        let controller = MachineController::connect(MachineConfig::new("dev"), executor)
            .await
            .unwrap();

        assert_eq!(controller.initial_status(), Status::Running);
        assert_eq!(controller.executor().calls().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_without_auto_create_fails() {
        let executor = FakeExecutor::new()
            .reply("status", does_not_exist())
            .reply("create", Reply::lines(&[]));

        let err = ensure_running(&executor, &MachineConfig::new("dev"))
            .await
            .unwrap_err();

        assert!(matches!(err, MachineError::Config(_)));
        assert!(err.to_string().contains("dev does not exist"));
        assert_eq!(executor.count("create"), 0);
    }

    #[tokio::test]
    async fn test_stopped_starts_once_without_requery() {
        let executor = FakeExecutor::new()
            .reply("status", Reply::lines(&["Stopped"]))
            .reply("start", Reply::lines(&["Starting \"dev\"..."]));

        let controller = MachineController::connect(MachineConfig::new("dev"), executor)
            .await
            .unwrap();

        let executor = controller.executor();
        assert_eq!(controller.initial_status(), Status::Stopped);
        assert_eq!(executor.count("start"), 1);
        assert_eq!(executor.count("status"), 1);
        assert_eq!(executor.count("create"), 0);
    }

    #[tokio::test]
    async fn test_missing_with_auto_create_creates_once_without_requery() {
        let executor = FakeExecutor::new()
            .reply("status", does_not_exist())
            .reply("create", Reply::lines(&["Running pre-create checks..."]));
        let config = MachineConfig::new("dev")
            .with_auto_create(true)
            .with_create_option("driver", Some("virtualbox"));

        let controller = MachineController::connect(config, executor).await.unwrap();

        let executor = controller.executor();
        assert_eq!(controller.initial_status(), Status::DoesNotExist);
        assert_eq!(executor.count("create"), 1);
        assert_eq!(executor.count("status"), 1);
        assert_eq!(
            executor.calls()[1],
            vec!["docker-machine", "create", "--driver", "virtualbox", "dev"]
        );
    }

    #[tokio::test]
    async fn test_create_failure_propagates() {
        let executor = FakeExecutor::new()
            .reply("status", does_not_exist())
            .reply("create", Reply::exit(3, "Error with pre-create check"));
        let config = MachineConfig::new("dev").with_auto_create(true);

        let err = ensure_running(&executor, &config).await.unwrap_err();

        assert_eq!(err.exit_code(), Some(3));
        assert!(err.to_string().contains("Error with pre-create check"));
    }

    #[tokio::test]
    async fn test_unrecognized_status_stops_the_controller() {
        let executor = FakeExecutor::new().reply("status", Reply::lines(&["Saved"]));

        let err = ensure_running(&executor, &MachineConfig::new("dev"))
            .await
            .unwrap_err();

        assert!(matches!(err, MachineError::UnrecognizedStatus { .. }));
        assert_eq!(executor.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_verify_after_start_requeries() {
        let executor = FakeExecutor::new()
            .reply("status", Reply::lines(&["Stopped"]))
            .reply("status", Reply::lines(&["Running"]))
            .reply("start", Reply::lines(&[]));
        let config = MachineConfig::new("dev").with_verify_after_start(true);

        let status = ensure_running(&executor, &config).await.unwrap();

        assert_eq!(status, Status::Stopped);
        assert_eq!(executor.count("status"), 2);
    }

    #[tokio::test]
    async fn test_verify_after_start_detects_stopped_machine() {
        let executor = FakeExecutor::new()
            .reply("status", Reply::lines(&["Stopped"]))
            .reply("start", Reply::lines(&[]));
        let config = MachineConfig::new("dev").with_verify_after_start(true);

        let err = ensure_running(&executor, &config).await.unwrap_err();

        assert!(matches!(err, MachineError::NotRunning { .. }));
    }

    #[tokio::test]
    async fn test_environment_after_connect() {
        let executor = FakeExecutor::new()
            .reply("status", Reply::lines(&["Running"]))
            .reply("env", Reply::lines(&["SET DOCKER_HOST=tcp://10.0.0.5:2376"]));

        let controller = MachineController::connect(MachineConfig::new("dev"), executor)
            .await
            .unwrap();
        let env = controller.environment().await.unwrap();

        assert_eq!(env["DOCKER_HOST"], "tcp://10.0.0.5:2376");
        assert_eq!(
            controller.executor().calls()[1],
            vec!["docker-machine", "env", "dev", "--shell", "cmd"]
        );
    }

    #[tokio::test]
    async fn test_connect_rejects_invalid_config() {
        let executor = FakeExecutor::new();
        let err = MachineController::connect(MachineConfig::new(""), executor)
            .await
            .err()
            .unwrap();

        assert!(matches!(err, MachineError::InvalidConfig(_)));
    }
}
