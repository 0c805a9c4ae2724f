use std::{env::current_dir, io};

use common::config::{Config, Environment};
use derive_more::{Display, Error, From};
use is_terminal::IsTerminal;

use crate::{
    commands::Deploy,
    config::{Credentials, CredentialsError},
    gate::{Confirmation, DirtyTreePolicy, GateError, ReleaseGate, TerminalConfirmation},
    git::{GitCli, GitError, GitStateReader},
    payload::{assemble, PayloadError, UploadPayload},
    progress::Spinner,
    service::{find_config, resolve_static_service, ResolvedService, ServiceConfigError},
    transport::{PreviewClient, TransportError},
};

/// Version tag sent to the preview service.
const CLIENT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// `deploy` subcommand errors.
#[derive(Debug, Display, From, Error)]
pub(crate) enum DeployError {
    /// Credentials are missing or unreadable.
    #[display(fmt = "unable to load credentials")]
    Credentials(CredentialsError),

    /// IO-related error.
    #[display(fmt = "unable to determine the current directory")]
    Io(io::Error),

    /// Project configuration error.
    #[display(fmt = "unable to resolve the static service")]
    Service(ServiceConfigError),

    /// Unable to locate `git`.
    #[display(fmt = "unable to use git")]
    Git(GitError),

    /// Repository state does not allow a release.
    #[display(fmt = "release check failed")]
    Gate(GateError),

    /// Unable to package the assets.
    #[display(fmt = "unable to package the assets")]
    Payload(PayloadError),

    /// Upload failed.
    #[display(fmt = "unable to upload the assets")]
    Transport(TransportError),
}

impl DeployError {
    /// Remediation hint shown next to the error.
    pub(crate) fn hint(&self) -> Option<&'static str> {
        match self {
            DeployError::Credentials(error) => error.hint(),
            DeployError::Service(ServiceConfigError::ConfigNotFound) => {
                Some("Run `peek init` to create a config.")
            }
            DeployError::Service(
                ServiceConfigError::ConfigParse(_) | ServiceConfigError::NotAMapping,
            ) => Some("Fix the syntax of peek.yml or recreate it with `peek init --force`."),
            DeployError::Service(
                ServiceConfigError::NoStaticService | ServiceConfigError::ServiceNotFound { .. },
            ) => Some("Add a service with `type: static` and a `path` to peek.yml."),
            DeployError::Git(GitError::Which(_)) => Some("Install git and make sure it is on your PATH."),
            DeployError::Gate(error) => gate_hint(error),
            DeployError::Payload(PayloadError::DirectoryRead(_)) => {
                Some("Run your build step before launching a preview.")
            }
            DeployError::Transport(error) => error.hint(),
            _ => None,
        }
    }
}

/// Remediation hints for release gate failures.
fn gate_hint(error: &GateError) -> Option<&'static str> {
    match error {
        GateError::NoRemoteBranch { .. } => Some("Push your branch to `origin` first."),
        GateError::OutOfSync { .. } => Some("Push your changes, or pull the remote ones."),
        GateError::UserDeclined => Some("Commit your changes and push them first."),
        GateError::DirtyWorkingTree { .. } => {
            Some("Commit and push your changes, or pass --yes to continue anyway.")
        }
        GateError::NoOriginRemote => Some("Add a remote with `git remote add origin <url>`."),
        GateError::UnparseableOriginRemote { .. } => {
            Some("Point `origin` at the hosted repository with `git remote set-url origin <url>`.")
        }
        GateError::UnsupportedHost { .. } => {
            Some("Contact support@featurepeek.com to request adding your git host.")
        }
        GateError::Git(GitError::DetachedHead) => {
            Some("Check out a branch, previews must reference one.")
        }
        GateError::Git(_) | GateError::Prompt(_) => None,
    }
}

/// Check the repository state and, once the release gate passes, assemble the payload.
///
/// The spinner starts only after the gate, so a confirmation prompt is never drawn over it.
fn prepare(
    service: &ResolvedService,
    git: &dyn GitStateReader,
    policy: DirtyTreePolicy,
    confirmation: &dyn Confirmation,
) -> Result<(UploadPayload, Spinner), DeployError> {
    let release = ReleaseGate::new(git, policy, confirmation).evaluate()?;

    let progress = Spinner::start("Packaging...");
    let payload = assemble(service, &release, &progress)?;

    Ok((payload, progress))
}

/// Deploy flow entrypoint.
pub(crate) fn deploy(
    Deploy {
        service,
        config_file,
        yes,
        dry_run,
    }: Deploy,
    config: &Config,
    environment: Environment,
) -> Result<(), DeployError> {
    let credentials = if dry_run {
        None
    } else {
        Some(Credentials::load(environment)?)
    };

    let config_path = match config_file {
        Some(path) => path,
        None => find_config(&current_dir()?)?,
    };

    tracing::debug!("using project config {}", config_path.display());

    let service = resolve_static_service(&config_path, service.as_deref())?;

    let git = GitCli::new(&service.project_root)?;

    let policy = if yes {
        DirtyTreePolicy::Allow
    } else if io::stdin().is_terminal() {
        DirtyTreePolicy::Prompt
    } else {
        DirtyTreePolicy::Abort
    };

    let (payload, progress) = prepare(&service, &git, policy, &TerminalConfirmation)?;

    let Some(credentials) = credentials else {
        progress.stop("Packaging... done");
        println!("{payload}");
        return Ok(());
    };

    progress.set_message("Uploading...");

    let url = PreviewClient::new(&config.api_url, CLIENT_VERSION).submit(payload, &credentials)?;

    progress.stop("Assets uploaded successfully!");

    println!("Visit your new preview environment here:");
    println!("{url}");

    Ok(())
}
