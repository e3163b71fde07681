//! netbridge - run bridge command scripts from the shell

mod script;

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use netbridge_array::ExecutionMode;
use netbridge_dispatch::{BridgeConfig, BridgeContext, Dispatcher};
use netbridge_engine::ENGINE_VERSION;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use script::Session;

#[derive(Parser, Debug)]
#[command(name = "netbridge")]
#[command(author, version, about = "Drive the netbridge command set from scripts", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log at debug level (otherwise RUST_LOG, default warn)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a script of bridge commands
    Run {
        /// Script file, one command per line
        script: PathBuf,

        /// Bridge configuration file (TOML)
        #[arg(short, long, value_name = "FILE")]
        config: Option<PathBuf>,

        /// Initial execution mode (cpu or gpu)
        #[arg(long)]
        mode: Option<ExecutionMode>,

        /// Reject host arrays whose dims differ from the tensor's
        #[arg(long)]
        strict_shapes: bool,
    },
    /// List the available commands with their usage
    Commands,
    /// Print version information
    Version,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Run {
            script,
            config,
            mode,
            strict_shapes,
        } => {
            let config = load_config(config.as_deref(), mode, strict_shapes)?;
            run_script(&script, config)
        }
        Commands::Commands => list_commands(),
        Commands::Version => {
            println!("netbridge {} ({})", netbridge_dispatch::VERSION, ENGINE_VERSION);
            Ok(())
        }
    }
}

/// File, then environment, then command-line flags
fn load_config(
    path: Option<&Path>,
    mode: Option<ExecutionMode>,
    strict_shapes: bool,
) -> Result<BridgeConfig> {
    let config = match path {
        Some(path) => BridgeConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => BridgeConfig::default(),
    };
    let mut config = config.with_env_overrides()?;
    if let Some(mode) = mode {
        config.mode = mode;
    }
    if strict_shapes {
        config.strict_shapes = true;
    }
    Ok(config)
}

fn run_script(path: &Path, config: BridgeConfig) -> Result<()> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read script {}", path.display()))?;
    let statements = script::parse(&text)?;
    debug!(?config, statements = statements.len(), "starting session");

    let mut session = Session::new(Dispatcher::new()?, BridgeContext::with_cpu_engine(config)?);
    let stdout = io::stdout();
    let mut out = stdout.lock();
    for statement in &statements {
        let value = session.execute(statement)?;
        if let Some(line) = statement.render(&value) {
            writeln!(out, "{}", line)?;
        }
    }

    info!(statements = statements.len(), script = %path.display(), "script finished");
    Ok(())
}

fn list_commands() -> Result<()> {
    let dispatcher = Dispatcher::new()?;
    let stdout = io::stdout();
    let mut out = stdout.lock();
    for command in dispatcher.commands() {
        writeln!(out, "{:<28} {}", command.name, command.usage)?;
    }
    Ok(())
}
