use std::{
    collections::{BTreeMap, BTreeSet},
    io,
    path::{Path, PathBuf},
    process::{Command, Output, Stdio},
};

use derive_more::{Display, Error, From};

/// Conventional name of the remote that identifies the hosted repository.
pub(crate) const ORIGIN: &str = "origin";

/// Errors that may occur while querying the local repository.
#[derive(Debug, Display, From, Error)]
pub(crate) enum GitError {
    /// IO-related error.
    #[display(fmt = "unable to run git")]
    Io(io::Error),

    /// [`which`] crate was unable to determine location of the `git` binary file.
    #[display(fmt = "unable to locate git")]
    Which(which::Error),

    /// `git` exited with a failure status.
    #[from(ignore)]
    #[display(fmt = "`git {}` failed: {}", command, stderr)]
    CommandFailed {
        /// Arguments passed to `git`.
        command: String,

        /// Captured standard error output.
        stderr: String,
    },

    /// HEAD does not point at a branch.
    #[from(ignore)]
    #[display(fmt = "cannot find current branch, HEAD is detached")]
    DetachedHead,
}

/// Repository location parsed from a remote URL.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Remote {
    /// Hosting platform, for example `github.com`.
    pub host: String,

    /// Repository owner (user or organization).
    pub owner: String,

    /// Repository name.
    pub repo: String,
}

/// Read-only view of the local repository state.
pub(crate) trait GitStateReader {
    /// Name of the branch HEAD points at.
    fn current_branch(&self) -> Result<String, GitError>;

    /// Commit id of HEAD.
    fn current_sha(&self) -> Result<String, GitError>;

    /// Commit id of the `origin` remote-tracking branch, if it exists.
    fn remote_sha_for_branch(&self, branch: &str) -> Result<Option<String>, GitError>;

    /// Paths with uncommitted changes, including untracked files.
    fn uncommitted_files(&self) -> Result<BTreeSet<String>, GitError>;

    /// Fetch URLs of the configured remotes, by remote name.
    fn remotes(&self) -> Result<BTreeMap<String, String>, GitError>;
}

/// [`GitStateReader`] backed by the `git` command-line tool.
pub(crate) struct GitCli {
    /// Location of the `git` binary.
    git: PathBuf,

    /// Directory inside of the repository, used as the working directory.
    work_dir: PathBuf,
}

impl GitCli {
    /// Locate `git` and bind it to the repository containing `work_dir`.
    pub(crate) fn new(work_dir: &Path) -> Result<Self, GitError> {
        Ok(Self {
            git: which::which("git")?,
            work_dir: work_dir.to_path_buf(),
        })
    }

    /// Run `git` with the provided arguments and capture its output.
    fn output(&self, args: &[&str]) -> Result<Output, GitError> {
        tracing::debug!("running git {}", args.join(" "));

        Ok(Command::new(&self.git)
            .current_dir(&self.work_dir)
            .stdin(Stdio::null())
            .args(args)
            .output()?)
    }

    /// Run `git` and return its standard output, failing on a non-zero exit status.
    fn run(&self, args: &[&str]) -> Result<String, GitError> {
        let output = self.output(args)?;

        if !output.status.success() {
            return Err(GitError::CommandFailed {
                command: args.join(" "),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl GitStateReader for GitCli {
    fn current_branch(&self) -> Result<String, GitError> {
        let output = self.output(&["symbolic-ref", "--quiet", "--short", "HEAD"])?;

        // Exit status 1 with --quiet means HEAD is not a symbolic ref.
        match output.status.code() {
            Some(0) => Ok(String::from_utf8_lossy(&output.stdout).trim().to_owned()),
            Some(1) => Err(GitError::DetachedHead),
            _ => Err(GitError::CommandFailed {
                command: String::from("symbolic-ref --quiet --short HEAD"),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
            }),
        }
    }

    fn current_sha(&self) -> Result<String, GitError> {
        Ok(self.run(&["rev-parse", "HEAD"])?.trim().to_owned())
    }

    fn remote_sha_for_branch(&self, branch: &str) -> Result<Option<String>, GitError> {
        let revision = format!("refs/remotes/{ORIGIN}/{branch}^{{commit}}");
        let output = self.output(&["rev-parse", "--verify", "--quiet", &revision])?;
        let sha = String::from_utf8_lossy(&output.stdout).trim().to_owned();

        if output.status.success() && !sha.is_empty() {
            Ok(Some(sha))
        } else if output.stderr.is_empty() {
            Ok(None)
        } else {
            Err(GitError::CommandFailed {
                command: format!("rev-parse --verify --quiet {revision}"),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
            })
        }
    }

    fn uncommitted_files(&self) -> Result<BTreeSet<String>, GitError> {
        // Porcelain lines start with a two-column status, leading spaces are significant.
        Ok(parse_porcelain_status(
            &self.run(&["status", "--porcelain", "--untracked-files=normal"])?,
        ))
    }

    fn remotes(&self) -> Result<BTreeMap<String, String>, GitError> {
        Ok(parse_remote_list(&self.run(&["remote", "-v"])?))
    }
}

/// Extract paths from `git status --porcelain` output.
///
/// Renames are reported by their destination path.
pub(crate) fn parse_porcelain_status(status: &str) -> BTreeSet<String> {
    status
        .lines()
        .filter_map(|line| line.get(3..))
        .map(|path| match path.split_once(" -> ") {
            Some((_, destination)) => destination,
            None => path,
        })
        .map(|path| path.trim_matches('"').to_owned())
        .filter(|path| !path.is_empty())
        .collect()
}

/// Parse `git remote -v` output into remote names and their fetch URLs.
pub(crate) fn parse_remote_list(list: &str) -> BTreeMap<String, String> {
    list.lines()
        .filter_map(|line| {
            let mut columns = line.split_whitespace();

            match (columns.next(), columns.next(), columns.next()) {
                (Some(name), Some(url), Some("(fetch)")) => {
                    Some((name.to_owned(), url.to_owned()))
                }
                _ => None,
            }
        })
        .collect()
}

/// Parse a remote URL into its host, owner and repository name.
///
/// Supports the scp-like syntax (`git@github.com:owner/repo.git`) as well as
/// URLs with a scheme (`https://github.com/owner/repo.git`, `ssh://git@host:22/owner/repo`).
pub(crate) fn parse_remote_url(url: &str) -> Option<Remote> {
    let (host, path) = match url.split_once("://") {
        Some((_, rest)) => {
            let (authority, path) = rest.split_once('/')?;
            let host = authority.rsplit('@').next()?;
            let host = host.split(':').next()?;
            (host, path)
        }
        None => {
            let (authority, path) = url.split_once(':')?;
            let host = authority.rsplit('@').next()?;
            (host, path)
        }
    };

    let path = path.trim_end_matches('/');
    let path = path.strip_suffix(".git").unwrap_or(path);

    let (owner, repo) = path.trim_start_matches('/').rsplit_once('/')?;

    if host.is_empty() || owner.is_empty() || repo.is_empty() {
        return None;
    }

    Some(Remote {
        host: host.to_ascii_lowercase(),
        owner: owner.to_owned(),
        repo: repo.to_owned(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scp_like_url() {
        assert_eq!(
            parse_remote_url("git@github.com:featurepeek/peek-cli.git"),
            Some(Remote {
                host: String::from("github.com"),
                owner: String::from("featurepeek"),
                repo: String::from("peek-cli"),
            })
        );
    }

    #[test]
    fn https_url() {
        let remote = parse_remote_url("https://github.com/featurepeek/peek-cli.git").unwrap();

        assert_eq!(remote.host, "github.com");
        assert_eq!(remote.owner, "featurepeek");
        assert_eq!(remote.repo, "peek-cli");

        let without_suffix =
            parse_remote_url("https://user@GitHub.com/featurepeek/peek-cli/").unwrap();
        assert_eq!(without_suffix, remote);
    }

    #[test]
    fn ssh_url_with_port_and_nested_owner() {
        let remote =
            parse_remote_url("ssh://git@gitlab.example.com:2222/group/sub/app.git").unwrap();

        assert_eq!(remote.host, "gitlab.example.com");
        assert_eq!(remote.owner, "group/sub");
        assert_eq!(remote.repo, "app");
    }

    #[test]
    fn unsupported_urls() {
        assert_eq!(parse_remote_url("/srv/git/repo.git"), None);
        assert_eq!(parse_remote_url("https://github.com/repo.git"), None);
        assert_eq!(parse_remote_url("git@github.com:"), None);
    }

    #[test]
    fn remote_list() {
        let remotes = parse_remote_list(
            "origin\tgit@github.com:acme/site.git (fetch)\n\
             origin\tgit@github.com:acme/site.git (push)\n\
             fork\thttps://github.com/someone/site (fetch)\n\
             fork\thttps://github.com/someone/site (push)\n\
             local\t/srv/site.git (fetch)\n",
        );

        assert_eq!(remotes.len(), 3);
        assert_eq!(remotes[ORIGIN], "git@github.com:acme/site.git");
        assert_eq!(remotes["fork"], "https://github.com/someone/site");
        assert_eq!(remotes["local"], "/srv/site.git");
    }

    #[test]
    fn porcelain_status() {
        let files = parse_porcelain_status(
            " M src/index.js\n\
             ?? notes.txt\n\
             R  old.css -> new.css\n\
             A  \"with space.txt\"\n",
        );

        assert_eq!(
            files.into_iter().collect::<Vec<_>>(),
            ["new.css", "notes.txt", "src/index.js", "with space.txt"]
        );
    }

    #[test]
    fn clean_status() {
        assert!(parse_porcelain_status("").is_empty());
    }
}
