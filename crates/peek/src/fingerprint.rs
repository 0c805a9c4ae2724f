use std::{
    fmt,
    fs::File,
    io::{self, Read},
    path::{Path, PathBuf},
};

use common::hash::{finalize_hex, Blake2b256, Digest};
use derive_more::Error;
use walkdir::WalkDir;

/// Read buffer size used while streaming file contents into the hasher.
const READ_BUFFER_SIZE: usize = 64 * 1024;

/// Unable to read some part of the fingerprinted directory tree.
#[derive(Debug, Error)]
pub(crate) struct DirectoryReadError {
    /// Path of the entry that failed.
    pub path: PathBuf,

    /// Underlying IO error.
    pub source: io::Error,
}

impl fmt::Display for DirectoryReadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unable to read {}", self.path.display())
    }
}

impl DirectoryReadError {
    /// Attach path context to an IO error.
    pub(crate) fn new(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self {
            path: path.into(),
            source,
        }
    }
}

/// Compute a content fingerprint of the directory tree rooted at `dir`.
///
/// Regular files are visited depth-first with entries sorted by file name on
/// every level, so the result does not depend on the order in which the
/// filesystem enumerates directory entries. Only file contents are fed into
/// the hasher; names, timestamps and permissions contribute only through the
/// traversal order. Symlinks and special files are skipped.
///
/// The digest is a change-detection signal for uploaded builds, not an integrity check.
pub(crate) fn fingerprint(dir: &Path) -> Result<String, DirectoryReadError> {
    let mut hasher = Blake2b256::default();
    let mut buf = vec![0; READ_BUFFER_SIZE];

    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.map_err(|error| {
            let path = error.path().unwrap_or(dir).to_path_buf();
            DirectoryReadError::new(path, io::Error::from(error))
        })?;

        if !entry.file_type().is_file() {
            continue;
        }

        let mut file =
            File::open(entry.path()).map_err(|e| DirectoryReadError::new(entry.path(), e))?;

        loop {
            let read = file
                .read(&mut buf)
                .map_err(|e| DirectoryReadError::new(entry.path(), e))?;

            if read == 0 {
                break;
            }

            hasher.update(&buf[..read]);
        }
    }

    Ok(finalize_hex(hasher))
}

#[cfg(test)]
mod tests {
    use std::fs;

    use proptest::prelude::*;
    use tempfile::TempDir;

    use super::*;

    fn write(root: &Path, path: &str, contents: &[u8]) {
        let path = root.join(path);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    #[test]
    fn stable_across_runs() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "dist/index.html", b"<h1>hi</h1>");

        let first = fingerprint(&dir.path().join("dist")).unwrap();
        let second = fingerprint(&dir.path().join("dist")).unwrap();

        assert_eq!(first, second);
        assert_eq!(first.len(), 64);
    }

    #[test]
    fn single_byte_change_changes_digest() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "index.html", b"<h1>hi</h1>");
        let before = fingerprint(dir.path()).unwrap();

        write(dir.path(), "index.html", b"<h1>hI</h1>");
        let after = fingerprint(dir.path()).unwrap();

        assert_ne!(before, after);
    }

    #[test]
    fn ignores_names_and_depth() {
        let flat = TempDir::new().unwrap();
        write(flat.path(), "a.js", b"first");
        write(flat.path(), "b.js", b"second");

        let nested = TempDir::new().unwrap();
        write(nested.path(), "assets/js/app.js", b"first");
        write(nested.path(), "z/vendor.js", b"second");

        assert_eq!(
            fingerprint(flat.path()).unwrap(),
            fingerprint(nested.path()).unwrap()
        );
    }

    #[test]
    fn content_order_matters() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "a.js", b"first");
        write(dir.path(), "b.js", b"second");

        let swapped = TempDir::new().unwrap();
        write(swapped.path(), "a.js", b"second");
        write(swapped.path(), "b.js", b"first");

        assert_ne!(
            fingerprint(dir.path()).unwrap(),
            fingerprint(swapped.path()).unwrap()
        );
    }

    #[test]
    fn empty_directories_do_not_contribute() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "index.html", b"<h1>hi</h1>");
        let before = fingerprint(dir.path()).unwrap();

        fs::create_dir_all(dir.path().join("empty/nested")).unwrap();

        assert_eq!(before, fingerprint(dir.path()).unwrap());
    }

    #[cfg(unix)]
    #[test]
    fn symlinks_are_skipped() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "index.html", b"<h1>hi</h1>");
        let before = fingerprint(dir.path()).unwrap();

        std::os::unix::fs::symlink(dir.path().join("index.html"), dir.path().join("link.html"))
            .unwrap();

        assert_eq!(before, fingerprint(dir.path()).unwrap());
    }

    #[test]
    fn missing_directory_is_an_error() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("dist");

        let error = fingerprint(&missing).unwrap_err();

        assert_eq!(error.path, missing);
    }

    proptest! {
        #[test]
        fn independent_of_creation_order(
            files in prop::collection::btree_map("[a-z]{1,8}", prop::collection::vec(any::<u8>(), 0..64), 1..8)
        ) {
            let forward = TempDir::new().unwrap();
            for (name, contents) in &files {
                write(forward.path(), name, contents);
            }

            let backward = TempDir::new().unwrap();
            for (name, contents) in files.iter().rev() {
                write(backward.path(), name, contents);
            }

            prop_assert_eq!(
                fingerprint(forward.path()).unwrap(),
                fingerprint(backward.path()).unwrap()
            );
        }
    }
}
