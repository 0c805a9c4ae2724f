use std::{
    fs::File,
    io::{self, Seek, Write},
    path::{Path, StripPrefixError},
};

use derive_more::{Display, Error, From};
use walkdir::WalkDir;
use zip::{write::FileOptions, CompressionMethod, ZipWriter};

/// Errors that may occur during the archive creation process.
#[derive(Debug, Display, From, Error)]
pub(crate) enum ArchiverError {
    /// [`zip`]-crate specific error.
    #[display(fmt = "unable to write zip entry")]
    Zip(zip::result::ZipError),

    /// [`walkdir`]-crate specific error.
    #[display(fmt = "unable to walk the asset directory")]
    WalkDir(walkdir::Error),

    /// IO error.
    #[display(fmt = "unable to read asset file")]
    Io(io::Error),

    /// Unable to strip the asset directory prefix from path.
    #[display(fmt = "unable to compute archive entry name")]
    StripPrefix(StripPrefixError),

    /// Entry path cannot be stored as a ZIP entry name.
    #[from(ignore)]
    #[display(fmt = "path {} contains non-unicode symbols", _0)]
    NonUnicodePath(#[error(not(source))] String),
}

/// Archive every entry under `root` into the provided `file`.
///
/// Entry names are relative to `root`, so the archive contains the contents
/// of the asset directory rather than the directory itself. Entries are added
/// in file name order. Symlinks and special files are skipped.
///
/// Fails on paths that are not valid unicode, so every fingerprinted file is uploaded.
pub(crate) fn build_zip_archive<W: Write + Seek>(
    file: W,
    root: &Path,
) -> Result<W, ArchiverError> {
    let mut writer = ZipWriter::new(file);
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

    let mut entries = WalkDir::new(root).sort_by_file_name().into_iter();

    while let Some(entry) = entries.next().transpose()? {
        let Some(path) = entry.path().strip_prefix(root)?.to_str() else {
            return Err(ArchiverError::NonUnicodePath(
                entry.path().display().to_string(),
            ));
        };

        // ZIP entry names always use forward slashes.
        let name = path.replace('\\', "/");

        if !name.is_empty() {
            if entry.file_type().is_dir() {
                writer.add_directory(name, options)?;
            } else if entry.file_type().is_file() {
                writer.start_file(name, options)?;
                io::copy(&mut File::open(entry.path())?, &mut writer)?;
            }
        }
    }

    Ok(writer.finish()?)
}

#[cfg(test)]
mod tests {
    use std::{fs, io::Cursor};

    use tempfile::TempDir;
    use zip::ZipArchive;

    use super::*;

    #[test]
    fn archives_directory_contents() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("static/css")).unwrap();
        fs::write(dir.path().join("index.html"), "<h1>hi</h1>").unwrap();
        fs::write(dir.path().join("static/css/app.css"), "h1 {}").unwrap();
        fs::write(dir.path().join(".nojekyll"), "").unwrap();

        let cursor = build_zip_archive(Cursor::new(Vec::new()), dir.path()).unwrap();
        let mut archive = ZipArchive::new(cursor).unwrap();

        let mut names = archive.file_names().map(String::from).collect::<Vec<_>>();
        names.sort();

        assert_eq!(
            names,
            [
                ".nojekyll",
                "index.html",
                "static/",
                "static/css/",
                "static/css/app.css"
            ]
        );

        let mut contents = String::new();
        io::Read::read_to_string(&mut archive.by_name("index.html").unwrap(), &mut contents)
            .unwrap();
        assert_eq!(contents, "<h1>hi</h1>");
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn non_unicode_path_is_an_error() {
        use std::{ffi::OsStr, os::unix::ffi::OsStrExt};

        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("index.html"), "<h1>hi</h1>").unwrap();
        fs::write(dir.path().join(OsStr::from_bytes(b"\xff.html")), "?").unwrap();

        assert!(matches!(
            build_zip_archive(Cursor::new(Vec::new()), dir.path()),
            Err(ArchiverError::NonUnicodePath(_))
        ));
    }
}
