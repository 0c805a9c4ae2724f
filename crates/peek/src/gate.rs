use std::collections::BTreeSet;

use derive_more::{Display, Error, From};
use dialoguer::Confirm;
use itertools::Itertools;

use crate::git::{parse_remote_url, GitError, GitStateReader, ORIGIN};

/// Git hosting platforms the preview service can link builds to.
const SUPPORTED_HOSTS: &[&str] = &["github.com"];

/// Reasons for refusing to package the current working tree.
#[derive(Debug, Display, From, Error)]
pub(crate) enum GateError {
    /// Unable to query the repository.
    #[display(fmt = "unable to query the repository")]
    Git(GitError),

    /// Unable to ask for confirmation.
    #[display(fmt = "unable to read confirmation")]
    Prompt(dialoguer::Error),

    /// The current branch has no remote-tracking branch.
    #[from(ignore)]
    #[display(fmt = "branch `{}` does not exist on `{}`", branch, ORIGIN)]
    NoRemoteBranch {
        /// Local branch name.
        branch: String,
    },

    /// Local HEAD differs from the remote-tracking branch.
    #[from(ignore)]
    #[display(
        fmt = "local branch `{}` ({}) does not match `{}/{}` ({})",
        branch,
        local_sha,
        ORIGIN,
        branch,
        remote_sha
    )]
    OutOfSync {
        /// Local branch name.
        branch: String,

        /// Local HEAD commit.
        local_sha: String,

        /// Remote-tracking branch commit.
        remote_sha: String,
    },

    /// User refused to continue with uncommitted changes.
    #[from(ignore)]
    #[display(fmt = "aborted due to uncommitted changes")]
    UserDeclined,

    /// Uncommitted changes exist and nobody can be asked about them.
    #[from(ignore)]
    #[display(fmt = "working tree has {} uncommitted change(s)", count)]
    DirtyWorkingTree {
        /// Number of changed paths.
        count: usize,
    },

    /// No `origin` remote is configured.
    #[from(ignore)]
    #[display(fmt = "git remote `{}` is not configured", ORIGIN)]
    NoOriginRemote,

    /// The `origin` URL does not point at an `owner/repo` location.
    #[from(ignore)]
    #[display(fmt = "unable to parse the URL of git remote `{}`: {}", ORIGIN, url)]
    UnparseableOriginRemote {
        /// Fetch URL of the remote.
        url: String,
    },

    /// The `origin` remote points at an unsupported hosting platform.
    #[from(ignore)]
    #[display(fmt = "{} is not currently a supported git hosting platform", host)]
    UnsupportedHost {
        /// Remote host name.
        host: String,
    },
}

/// How to treat uncommitted changes in the working tree.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum DirtyTreePolicy {
    /// Warn and ask for explicit confirmation.
    Prompt,

    /// Warn and abort, used when no terminal is attached.
    Abort,

    /// Warn and continue, the user opted in up front.
    Allow,
}

/// Source of explicit confirmation for packaging a dirty working tree.
pub(crate) trait Confirmation {
    /// Returns `true` when the user agrees to continue despite `files` being uncommitted.
    fn confirm_dirty(&self, files: &BTreeSet<String>) -> Result<bool, dialoguer::Error>;
}

/// Terminal prompt backed by [`dialoguer`].
pub(crate) struct TerminalConfirmation;

impl Confirmation for TerminalConfirmation {
    fn confirm_dirty(&self, _files: &BTreeSet<String>) -> Result<bool, dialoguer::Error> {
        Confirm::new()
            .with_prompt("Uncommitted changes will not be part of the preview commit. Continue?")
            .default(false)
            .interact()
    }
}

/// Repository identity and revision a build is uploaded for.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct ReleaseInfo {
    /// Branch name.
    pub branch: String,

    /// HEAD commit, equal to the remote-tracking branch commit.
    pub sha: String,

    /// Repository owner of the `origin` remote.
    pub org: String,

    /// Repository name of the `origin` remote.
    pub repo: String,
}

/// Precondition check that the repository state is pushed and clean enough to package.
pub(crate) struct ReleaseGate<'a> {
    /// Repository state source.
    git: &'a dyn GitStateReader,

    /// Uncommitted changes handling.
    policy: DirtyTreePolicy,

    /// Confirmation source used by [`DirtyTreePolicy::Prompt`].
    confirmation: &'a dyn Confirmation,
}

impl<'a> ReleaseGate<'a> {
    /// Create a new gate over the provided repository state.
    pub(crate) fn new(
        git: &'a dyn GitStateReader,
        policy: DirtyTreePolicy,
        confirmation: &'a dyn Confirmation,
    ) -> Self {
        Self {
            git,
            policy,
            confirmation,
        }
    }

    /// Run every check in order and return the release identity once all of them pass.
    ///
    /// The first failing check aborts the evaluation.
    pub(crate) fn evaluate(&self) -> Result<ReleaseInfo, GateError> {
        let branch = self.git.current_branch()?;
        let local_sha = self.git.current_sha()?;

        let Some(remote_sha) = self.git.remote_sha_for_branch(&branch)? else {
            return Err(GateError::NoRemoteBranch { branch });
        };

        if local_sha != remote_sha {
            return Err(GateError::OutOfSync {
                branch,
                local_sha,
                remote_sha,
            });
        }

        self.check_dirty()?;

        let url = self
            .git
            .remotes()?
            .remove(ORIGIN)
            .ok_or(GateError::NoOriginRemote)?;

        let Some(remote) = parse_remote_url(&url) else {
            return Err(GateError::UnparseableOriginRemote { url });
        };

        if !SUPPORTED_HOSTS.contains(&remote.host.as_str()) {
            return Err(GateError::UnsupportedHost { host: remote.host });
        }

        tracing::debug!(
            "release gate passed for {}/{} at {branch}@{local_sha}",
            remote.owner,
            remote.repo
        );

        Ok(ReleaseInfo {
            branch,
            sha: local_sha,
            org: remote.owner,
            repo: remote.repo,
        })
    }

    /// Warn about uncommitted changes and apply the configured policy.
    fn check_dirty(&self) -> Result<(), GateError> {
        let files = self.git.uncommitted_files()?;

        if files.is_empty() {
            return Ok(());
        }

        tracing::warn!(
            "{} uncommitted change(s): {}",
            files.len(),
            files.iter().join(", ")
        );

        match self.policy {
            DirtyTreePolicy::Allow => Ok(()),
            DirtyTreePolicy::Abort => Err(GateError::DirtyWorkingTree { count: files.len() }),
            DirtyTreePolicy::Prompt => {
                if self.confirmation.confirm_dirty(&files)? {
                    Ok(())
                } else {
                    Err(GateError::UserDeclined)
                }
            }
        }
    }
}
