use std::{
    fmt,
    io::{self, Read, Seek, SeekFrom},
};

use derive_more::{Display, Error, From};
use tempfile::NamedTempFile;

use crate::{
    archiver::{build_zip_archive, ArchiverError},
    fingerprint::{fingerprint, DirectoryReadError},
    gate::ReleaseInfo,
    progress::Spinner,
    service::ResolvedService,
};

/// Errors that may occur while assembling the upload payload.
#[derive(Debug, Display, From, Error)]
pub(crate) enum PayloadError {
    /// Asset directory is missing or unreadable.
    #[display(fmt = "unable to fingerprint the asset directory")]
    DirectoryRead(DirectoryReadError),

    /// Zip archiver error.
    #[display(fmt = "unable to create zip archive")]
    Archiver(ArchiverError),

    /// IO error while handling the temporary archive file.
    #[display(fmt = "unable to read temporary archive")]
    Io(io::Error),
}

/// Everything the preview service needs to launch an environment for one build.
pub(crate) struct UploadPayload {
    /// Name of the static service.
    pub service_name: String,

    /// ZIP archive of the asset directory.
    pub archive: Vec<u8>,

    /// Repository owner.
    pub org: String,

    /// Repository name.
    pub repo: String,

    /// Commit the build was produced from.
    pub sha: String,

    /// Branch the build was produced from.
    pub branch: String,

    /// Content fingerprint of the asset directory.
    pub checksum: String,
}

impl fmt::Display for UploadPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "service:  {}", self.service_name)?;
        writeln!(f, "repo:     {}/{}", self.org, self.repo)?;
        writeln!(f, "branch:   {}", self.branch)?;
        writeln!(f, "sha:      {}", self.sha)?;
        writeln!(f, "checksum: {}", self.checksum)?;
        write!(f, "archive:  {} bytes", self.archive.len())
    }
}

/// Package the service assets and combine them with the release identity.
///
/// The archive is written to a temporary file which is removed once this
/// function returns, whether assembly succeeded or not. The checksum is
/// computed from the asset directory itself, independently of the archive.
pub(crate) fn assemble(
    service: &ResolvedService,
    release: &ReleaseInfo,
    progress: &Spinner,
) -> Result<UploadPayload, PayloadError> {
    let asset_dir = service.asset_dir();

    if !asset_dir.is_dir() {
        return Err(DirectoryReadError::new(
            &asset_dir,
            io::Error::new(io::ErrorKind::NotFound, "asset directory does not exist"),
        )
        .into());
    }

    progress.set_message("Computing checksum...");
    let checksum = fingerprint(&asset_dir)?;
    tracing::debug!("asset checksum {checksum}");

    progress.set_message("Archiving...");

    let mut archive_file = build_zip_archive(NamedTempFile::new()?, &asset_dir)?;

    let mut archive = Vec::with_capacity(archive_file.stream_position()? as usize);
    archive_file.seek(SeekFrom::Start(0))?;
    archive_file.read_to_end(&mut archive)?;

    tracing::debug!(
        "archived {} into {} bytes",
        asset_dir.display(),
        archive.len()
    );

    Ok(UploadPayload {
        service_name: service.definition.name.clone(),
        archive,
        org: release.org.clone(),
        repo: release.repo.clone(),
        sha: release.sha.clone(),
        branch: release.branch.clone(),
        checksum,
    })
}

#[cfg(test)]
mod tests {
    use std::{fs, io::Cursor};

    use tempfile::TempDir;
    use zip::ZipArchive;

    use super::*;
    use crate::service::{find_config, resolve_static_service, CONFIG_FILE};

    fn release() -> ReleaseInfo {
        ReleaseInfo {
            branch: String::from("feature-x"),
            sha: String::from("abc123"),
            org: String::from("acme"),
            repo: String::from("site"),
        }
    }

    fn project(config: &str) -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(CONFIG_FILE), config).unwrap();
        dir
    }

    #[test]
    fn assembles_payload() {
        let dir = project("version: 2\nmain:\n  type: static\n  path: dist\n");
        fs::create_dir_all(dir.path().join("dist")).unwrap();
        fs::write(dir.path().join("dist/index.html"), "<h1>hi</h1>").unwrap();

        let service = resolve_static_service(&find_config(dir.path()).unwrap(), None).unwrap();
        let payload = assemble(&service, &release(), &Spinner::hidden()).unwrap();

        assert_eq!(payload.service_name, "main");
        assert_eq!(payload.org, "acme");
        assert_eq!(payload.repo, "site");
        assert_eq!(payload.sha, "abc123");
        assert_eq!(payload.branch, "feature-x");
        assert_eq!(
            payload.checksum,
            fingerprint(&dir.path().join("dist")).unwrap()
        );

        let archive = ZipArchive::new(Cursor::new(payload.archive)).unwrap();
        assert_eq!(archive.file_names().collect::<Vec<_>>(), ["index.html"]);
    }

    #[test]
    fn missing_asset_directory() {
        let dir = project("version: 2\nmain:\n  type: static\n  path: build\n");

        let service = resolve_static_service(&find_config(dir.path()).unwrap(), None).unwrap();
        let result = assemble(&service, &release(), &Spinner::hidden());

        assert!(matches!(
            result,
            Err(PayloadError::DirectoryRead(DirectoryReadError { path, .. })) if path == dir.path().join("build")
        ));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn files_missing_from_archive_fail_assembly() {
        use std::{ffi::OsStr, os::unix::ffi::OsStrExt};

        let dir = project("version: 2\nmain:\n  type: static\n  path: dist\n");
        fs::create_dir_all(dir.path().join("dist")).unwrap();
        fs::write(dir.path().join("dist").join(OsStr::from_bytes(b"\xff.js")), "1").unwrap();

        let service = resolve_static_service(&find_config(dir.path()).unwrap(), None).unwrap();
        let result = assemble(&service, &release(), &Spinner::hidden());

        assert!(matches!(
            result,
            Err(PayloadError::Archiver(ArchiverError::NonUnicodePath(_)))
        ));
    }
}
