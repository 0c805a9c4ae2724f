/// `deploy` subcommand.
mod deploy;

/// `init` subcommand.
mod init;

/// `login` subcommand.
mod login;

/// `logout` subcommand.
mod logout;

pub(crate) use deploy::{deploy, DeployError};
pub(crate) use init::init;
pub(crate) use login::login;
pub(crate) use logout::logout;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// CLI configuration.
#[derive(Parser)]
#[command(
    version,
    about = "Launch preview environments for static front-end builds",
    long_about = "Launch preview environments for static front-end builds.

Run `peek login` to authenticate, then `peek init` to describe where your build
output lives. Push your branch, run your build step and run `peek` to upload the
assets and get a link to the preview environment.",
    args_conflicts_with_subcommands = true
)]
pub(crate) struct Cli {
    /// Client configuration file path (default is ~/.config/peek/config.toml).
    #[arg(long, global = true)]
    pub client_config: Option<PathBuf>,

    /// Enable debug output.
    #[arg(long, global = true)]
    pub debug: bool,

    /// Use the development environment.
    #[arg(long, global = true, hide = true)]
    pub dev: bool,

    /// Selected subcommand, `deploy` when omitted.
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Arguments of the implicit `deploy` subcommand.
    #[command(flatten)]
    pub deploy: Deploy,
}

/// Supported subcommands.
#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Package the static build and launch a preview environment.
    Deploy(Deploy),

    /// Create a peek.yml project configuration.
    Init(Init),

    /// Log in with your account.
    Login,

    /// Remove stored credentials from this computer.
    Logout,
}

/// `deploy` subcommand configuration.
#[derive(Args)]
pub struct Deploy {
    /// Name of the static service to upload, the first static service by default.
    #[arg(short, long)]
    pub service: Option<String>,

    /// Project configuration path, searched upward from the current directory by default.
    #[arg(short, long)]
    pub config_file: Option<PathBuf>,

    /// Continue without asking when the working tree has uncommitted changes.
    #[arg(short, long)]
    pub yes: bool,

    /// Print the payload summary without uploading.
    #[arg(long)]
    pub dry_run: bool,
}

/// `init` subcommand configuration.
#[derive(Args)]
pub struct Init {
    /// Path of statically built assets, relative to the repository root.
    #[arg(short, long)]
    pub path: Option<String>,

    /// Serve the assets as a single-page application.
    #[arg(long)]
    pub spa: bool,

    /// Overwrite an existing peek.yml.
    #[arg(short, long)]
    pub force: bool,
}
