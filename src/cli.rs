// ABOUTME: Command-line interface definition using clap derive macros.
// ABOUTME: Defines all subcommands and their arguments.

use clap::{Args, Parser, Subcommand, ValueEnum};
use harbor::deploy::UpdateStrategy;
use harbor::types::InstanceNum;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "harbor")]
#[command(about = "Rolling updates and service operations for docker-compose projects")]
#[command(version)]
pub struct Cli {
    /// Enable verbose output (debug logging)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only print final results
    #[arg(short, long, global = true, conflicts_with = "json")]
    pub quiet: bool,

    /// Print results as JSON lines
    #[arg(long, global = true)]
    pub json: bool,

    /// Project directory (defaults to the current directory)
    #[arg(short = 'C', long, global = true)]
    pub directory: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a harbor.yml configuration file
    Init {
        /// Compose project name
        #[arg(short, long)]
        project: Option<String>,

        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },

    /// Create and start the selected services, in priority order
    Start(StartArgs),

    /// Stop the selected services without removing containers
    Stop(ProfileArgs),

    /// Restart the selected services
    Restart(ProfileArgs),

    /// Stop and remove containers of the selected services (volumes are kept)
    Remove {
        #[command(flatten)]
        selection: ProfileArgs,

        /// Remove the images of the removed containers too
        #[arg(short, long)]
        with_image: bool,
    },

    /// Pull images of the selected services
    Pull(ProfileArgs),

    /// Pull images, start services and reload the gateway
    Upgrade(StartArgs),

    /// List declared services
    List {
        #[command(flatten)]
        selection: ProfileArgs,

        /// Group rows by domain
        #[arg(short, long, value_enum, default_value_t = GroupBy::None)]
        group_by: GroupBy,
    },

    /// Operations on a single service
    #[command(subcommand)]
    Service(ServiceCommand),

    /// Reverse proxy operations
    #[command(subcommand)]
    Gateway(GatewayCommand),
}

#[derive(Args)]
pub struct ProfileArgs {
    /// Selector profile from apps/profile/<name>.profile.py
    #[arg(short, long)]
    pub profile: Option<String>,
}

#[derive(Args)]
pub struct StartArgs {
    #[command(flatten)]
    pub selection: ProfileArgs,

    #[command(flatten)]
    pub rollout: RolloutArgs,
}

#[derive(Args)]
pub struct RolloutArgs {
    /// Update strategy
    #[arg(short, long, value_enum, default_value_t = UpdateStrategy::Auto)]
    pub strategy: UpdateStrategy,

    /// Remove images of the replaced containers
    #[arg(long)]
    pub remove_previous_images: bool,

    /// Seconds a new replica gets to become healthy
    #[arg(short, long)]
    pub timeout: Option<u64>,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum GroupBy {
    None,
    Url,
}

#[derive(Args)]
pub struct InstanceArgs {
    /// Service name
    pub name: String,

    /// Instance number, the newest one when omitted
    #[arg(short, long)]
    pub instance: Option<InstanceNum>,
}

#[derive(Subcommand)]
pub enum ServiceCommand {
    /// Start a single service
    Up {
        /// Service name
        name: String,

        #[command(flatten)]
        rollout: RolloutArgs,

        /// Keep existing containers (compose strategy only)
        #[arg(short = 'd', long)]
        dont_recreate: bool,

        /// Extra arguments passed to compose
        #[arg(last = true)]
        extra_args: Vec<String>,
    },

    /// Stop and remove a service's containers
    Rm {
        /// Service name
        name: String,

        /// Remove the images too
        #[arg(short, long)]
        with_image: bool,

        #[arg(last = true)]
        extra_args: Vec<String>,
    },

    /// Stop a service without removing its containers
    Stop {
        /// Service name
        name: String,

        #[arg(last = true)]
        extra_args: Vec<String>,
    },

    /// Wait until a replica is healthy
    WaitFor {
        #[command(flatten)]
        target: InstanceArgs,

        /// Timeout in seconds
        #[arg(short, long, default_value_t = 120)]
        timeout: u64,
    },

    /// Show a replica's output
    Logs {
        #[command(flatten)]
        target: InstanceArgs,

        /// Keep streaming new output
        #[arg(short, long)]
        follow: bool,

        /// Number of lines from the end
        #[arg(long)]
        tail: Option<u64>,
    },

    /// Print the engine's inspection of a replica as JSON
    Inspect {
        #[command(flatten)]
        target: InstanceArgs,
    },

    /// Print the full container name of a replica
    GetContainerName {
        #[command(flatten)]
        target: InstanceArgs,
    },

    /// Compare running containers with the declaration
    Report {
        /// Service name
        name: String,
    },

    /// Run a command inside a replica
    Exec {
        #[command(flatten)]
        target: InstanceArgs,

        /// Do not allocate a TTY
        #[arg(long)]
        no_tty: bool,

        /// Command to run
        #[arg(last = true, default_value = "/bin/sh")]
        command: Vec<String>,
    },
}

#[derive(Subcommand)]
pub enum GatewayCommand {
    /// Validate and reload the nginx configuration
    Reload,
}
