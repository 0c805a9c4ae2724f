//! # Peek
//!
//! Command-line client that launches preview environments for statically built
//! front-end assets.
//!
//! Running `peek` inside of a git repository locates the nearest `peek.yml`,
//! selects a static service from it and checks that the current branch is pushed
//! to `origin` with the same commit checked out locally. Once the checks pass,
//! the asset directory is fingerprinted, packaged into a ZIP archive and uploaded
//! together with the repository identity. The preview service responds with the
//! URL of the launched environment.

#![deny(missing_docs)]
#![deny(clippy::missing_docs_in_private_items)]

use std::process::ExitCode;

use clap::Parser;
use commands::{Cli, Commands, DeployError};
use common::config::{Config, Environment, Logging};
use config::CredentialsError;

/// Asset directory archiving utilities.
mod archiver;

/// CLI subcommands.
mod commands;

/// CLI-specific configuration (credentials).
mod config;

/// Content fingerprint of the asset directory.
mod fingerprint;

/// Preconditions on the repository state.
mod gate;

/// Repository state queries.
mod git;

/// Upload payload assembly.
mod payload;

/// Terminal progress reporting.
mod progress;

/// Project configuration (`peek.yml`).
mod service;

/// Preview API client.
mod transport;

/// CLI entrypoint.
fn main() -> ExitCode {
    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("Error: {error:#}");

            if let Some(hint) = hint(&error) {
                eprintln!("{hint}");
            }

            ExitCode::FAILURE
        }
    }
}

/// Load the configuration, install logging and dispatch the selected subcommand.
fn run(cli: Cli) -> Result<(), anyhow::Error> {
    let environment = Environment::from_dev_flag(cli.dev);

    let mut config = Config::new(cli.client_config, environment)?;

    if cli.debug {
        config.logging = Logging::debug();
    }

    common::logging::init(&config.logging);

    tracing::debug!("using {environment:?} environment");

    match cli.command {
        None => commands::deploy(cli.deploy, &config, environment)?,
        Some(Commands::Deploy(args)) => commands::deploy(args, &config, environment)?,
        Some(Commands::Init(args)) => commands::init(args)?,
        Some(Commands::Login) => commands::login(&config, environment)?,
        Some(Commands::Logout) => commands::logout(environment)?,
    }

    Ok(())
}

/// Remediation hint for errors that carry one.
fn hint(error: &anyhow::Error) -> Option<&'static str> {
    error
        .downcast_ref::<DeployError>()
        .and_then(DeployError::hint)
        .or_else(|| {
            error
                .downcast_ref::<CredentialsError>()
                .and_then(CredentialsError::hint)
        })
}
