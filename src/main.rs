// ABOUTME: Entry point for the harbor CLI application.
// ABOUTME: Parses arguments and dispatches to appropriate command handlers.

mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands, GatewayCommand};
use harbor::config;
use harbor::error::{Error, Result};
use harbor::output::{Output, OutputMode};
use std::env;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // RUST_LOG wins over --verbose
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info")
        }
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let mode = if cli.json {
        OutputMode::Json
    } else if cli.quiet {
        OutputMode::Quiet
    } else {
        OutputMode::Normal
    };
    let output = Output::new(mode);

    match run(cli, output).await {
        Ok(()) => {}
        Err(Error::CommandExit(code)) => std::process::exit(code),
        Err(e) => {
            Output::new(mode).error(&e.to_string());
            std::process::exit(1);
        }
    }
}

async fn run(cli: Cli, output: Output) -> Result<()> {
    let dir = match cli.directory {
        Some(dir) => dir,
        None => env::current_dir()?,
    };

    match cli.command {
        Commands::Init { project, force } => {
            config::init_config(&dir, project.as_deref(), force)?;
            output.success(&format!("Created {}", config::CONFIG_FILENAME));
            Ok(())
        }
        Commands::Start(args) => commands::start(&dir, args, output).await,
        Commands::Stop(args) => commands::stop(&dir, args, output).await,
        Commands::Restart(args) => commands::restart(&dir, args, output).await,
        Commands::Remove {
            selection,
            with_image,
        } => commands::remove(&dir, selection, with_image, output).await,
        Commands::Pull(args) => commands::pull(&dir, args, output).await,
        Commands::Upgrade(args) => commands::upgrade(&dir, args, output).await,
        Commands::List {
            selection,
            group_by,
        } => commands::list(&dir, selection, group_by, output).await,
        Commands::Service(command) => commands::service(&dir, command, output).await,
        Commands::Gateway(GatewayCommand::Reload) => commands::reload_gateway(&dir, output).await,
    }
}
