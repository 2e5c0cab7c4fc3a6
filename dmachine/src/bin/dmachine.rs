//! dmachine CLI
//!
//! ```text
//! dmachine --name dev status
//! dmachine --name dev --auto-create --create-option driver=virtualbox ensure
//! dmachine --config machine.json env
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use dmachine::command::query_status;
use dmachine::{
    CreateOption, Environment, MachineConfig, MachineController, MachineError, ProcessRunner,
    RunnerOptions, logging,
};

/// Bring a docker-machine host up and print its connection environment.
#[derive(Debug, Parser)]
#[command(name = "dmachine", version, about)]
struct Cli {
    /// JSON machine configuration file
    #[arg(long, short = 'c', global = true)]
    config: Option<PathBuf>,

    /// Machine name (overrides the config file)
    #[arg(long, short = 'n', global = true)]
    name: Option<String>,

    /// Create the machine if it does not exist
    #[arg(long, global = true)]
    auto_create: bool,

    /// Flag passed to `create`, as key or key=value (repeatable, ordered)
    #[arg(long = "create-option", value_name = "KEY[=VALUE]", global = true)]
    create_options: Vec<String>,

    /// Machine tool executable
    #[arg(long, global = true)]
    tool: Option<String>,

    /// Query status again after create/start
    #[arg(long, global = true)]
    verify: bool,

    /// Enable debug logging
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print the machine status without changing it
    Status,
    /// Make sure the machine is running
    Ensure,
    /// Make sure the machine is running and print its environment
    Env {
        /// Output syntax
        #[arg(long, value_enum, default_value_t = Shell::Posix)]
        shell: Shell,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Shell {
    /// export NAME='VALUE'
    Posix,
    /// SET NAME=VALUE
    Cmd,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = logging::init(cli.verbose) {
        eprintln!("Failed to initialize logging: {}", e);
        return ExitCode::FAILURE;
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            exit_code_for(&e)
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = build_config(&cli)?;

    match cli.command {
        Commands::Status => {
            let runner = ProcessRunner::new(RunnerOptions::default());
            let status = query_status(&runner, &config).await?;
            println!("{}", status);
        }
        Commands::Ensure => {
            let name = config.name.clone();
            let controller = MachineController::connect_with(config, RunnerOptions::default())
                .await
                .with_context(|| format!("cannot bring docker machine \"{}\" up", name))?;
            println!(
                "{} is running (was {})",
                controller.config().name,
                controller.initial_status()
            );
        }
        Commands::Env { shell } => {
            let name = config.name.clone();
            let controller = MachineController::connect_with(config, RunnerOptions::default())
                .await
                .with_context(|| format!("cannot bring docker machine \"{}\" up", name))?;
            let env = controller.environment().await?;
            print!("{}", render_environment(&env, shell));
        }
    }
    Ok(())
}

fn build_config(cli: &Cli) -> anyhow::Result<MachineConfig> {
    let mut config = match (&cli.config, &cli.name) {
        (Some(path), _) => MachineConfig::from_file(path)?,
        (None, Some(name)) => MachineConfig::new(name.clone()),
        (None, None) => anyhow::bail!("either --config or --name is required"),
    };

    if let Some(name) = &cli.name {
        config.name = name.clone();
    }
    if cli.auto_create {
        config.auto_create = true;
    }
    for raw in &cli.create_options {
        config.create_options.push(CreateOption::parse(raw)?);
    }
    if let Some(tool) = &cli.tool {
        config.tool = tool.clone();
    }
    if cli.verify {
        config.verify_after_start = true;
    }

    config.validate()?;
    Ok(config)
}

fn render_environment(env: &Environment, shell: Shell) -> String {
    let mut names: Vec<&String> = env.keys().collect();
    names.sort();

    let mut out = String::new();
    for name in names {
        let value = &env[name];
        match shell {
            Shell::Posix => {
                out.push_str(&format!("export {}={}\n", name, posix_quote(value)))
            }
            Shell::Cmd => out.push_str(&format!("SET {}={}\n", name, value)),
        }
    }
    out
}

// Single quotes suppress every expansion; an embedded quote closes the
// string, adds an escaped quote and reopens it.
fn posix_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "'\\''"))
}

fn exit_code_for(err: &anyhow::Error) -> ExitCode {
    match err.downcast_ref::<MachineError>() {
        Some(MachineError::Config(_)) | Some(MachineError::InvalidConfig(_)) => ExitCode::from(2),
        Some(MachineError::Timeout { .. }) => ExitCode::from(3),
        Some(_) => ExitCode::FAILURE,
        None => ExitCode::from(2),
    }
}
