//! Zip archive extraction
//!
//! Archives are read as zip regardless of their extension (the export
//! templates ship as `.tpz`). Decoding is synchronous, so it runs on the
//! blocking pool while the caller awaits it.

use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use zip::ZipArchive;

use crate::error::{FileOperation, RepackError, Result};

const FILE_TYPE_MASK: u32 = 0o170000;
const REGULAR_FILE: u32 = 0o100000;
const DIRECTORY: u32 = 0o040000;

/// Files and directories written by one extraction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedTree {
    /// Directory the archive was extracted into
    pub root: PathBuf,
    /// Entry paths relative to `root`, in archive order
    pub entries: Vec<PathBuf>,
}

impl ExtractedTree {
    /// Absolute path of a path relative to the extraction root
    pub fn path_of<P: AsRef<Path>>(&self, relative: P) -> PathBuf {
        self.root.join(relative)
    }
}

/// Extracts zip-format archives into a directory
#[derive(Debug, Default, Clone, Copy)]
pub struct ArchiveExtractor;

impl ArchiveExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Extract every entry of `archive_path` into `destination`
    ///
    /// Existing files at the same paths are overwritten. Entries that would
    /// land outside `destination`, and entries that are neither regular files
    /// nor directories (symlinks, devices), fail the whole extraction.
    pub async fn extract(&self, archive_path: &Path, destination: &Path) -> Result<ExtractedTree> {
        let archive = archive_path.to_path_buf();
        let root = destination.to_path_buf();
        info!("Extracting {} into {}", archive.display(), root.display());

        let task_archive = archive.clone();
        tokio::task::spawn_blocking(move || extract_blocking(&task_archive, &root))
            .await
            .map_err(|e| RepackError::ExtractionTask {
                archive,
                reason: e.to_string(),
            })?
    }
}

fn extract_blocking(archive_path: &Path, destination: &Path) -> Result<ExtractedTree> {
    let file = File::open(archive_path).map_err(|e| RepackError::FileSystem {
        path: archive_path.to_path_buf(),
        operation: FileOperation::Read,
        source: e,
    })?;

    let mut archive = ZipArchive::new(file).map_err(|e| RepackError::Archive {
        archive: archive_path.to_path_buf(),
        source: e,
    })?;

    create_dir(destination)?;

    let mut entries = Vec::with_capacity(archive.len());
    let mut directory_modes = Vec::new();

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).map_err(|e| RepackError::Archive {
            archive: archive_path.to_path_buf(),
            source: e,
        })?;

        let relative = entry.enclosed_name().ok_or_else(|| RepackError::UnsafeArchiveEntry {
            archive: archive_path.to_path_buf(),
            entry: entry.name().to_string(),
        })?;
        let outpath = destination.join(&relative);

        if !is_supported_entry(entry.unix_mode()) {
            debug!("Rejecting entry {} with mode {:?}", entry.name(), entry.unix_mode());
            return Err(RepackError::Archive {
                archive: archive_path.to_path_buf(),
                source: zip::result::ZipError::UnsupportedArchive(
                    "only regular files and directories can be extracted",
                ),
            });
        }

        if entry.is_dir() {
            create_dir(&outpath)?;
            if let Some(mode) = entry.unix_mode() {
                directory_modes.push((outpath, mode));
            }
        } else {
            if let Some(parent) = outpath.parent() {
                create_dir(parent)?;
            }

            let mut outfile = File::create(&outpath).map_err(|e| RepackError::FileSystem {
                path: outpath.clone(),
                operation: FileOperation::Create,
                source: e,
            })?;

            std::io::copy(&mut entry, &mut outfile).map_err(|e| match e.kind() {
                std::io::ErrorKind::InvalidData => RepackError::Archive {
                    archive: archive_path.to_path_buf(),
                    source: zip::result::ZipError::Io(e),
                },
                _ => RepackError::FileSystem {
                    path: outpath.clone(),
                    operation: FileOperation::Write,
                    source: e,
                },
            })?;

            if let Some(mode) = entry.unix_mode() {
                set_mode(&outpath, mode)?;
            }
        }

        entries.push(relative);
    }

    // Applied last so a read-only directory does not block its own children
    for (path, mode) in directory_modes.into_iter().rev() {
        set_mode(&path, mode)?;
    }

    debug!("Extracted {} entries from {}", entries.len(), archive_path.display());
    Ok(ExtractedTree {
        root: destination.to_path_buf(),
        entries,
    })
}

/// Entries without a recorded type are treated as regular files
fn is_supported_entry(unix_mode: Option<u32>) -> bool {
    match unix_mode.map(|mode| mode & FILE_TYPE_MASK) {
        None | Some(0) | Some(REGULAR_FILE) | Some(DIRECTORY) => true,
        Some(_) => false,
    }
}

fn create_dir(path: &Path) -> Result<()> {
    std::fs::create_dir_all(path).map_err(|e| RepackError::FileSystem {
        path: path.to_path_buf(),
        operation: FileOperation::CreateDir,
        source: e,
    })
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode & 0o7777)).map_err(|e| {
        RepackError::FileSystem {
            path: path.to_path_buf(),
            operation: FileOperation::Permissions,
            source: e,
        }
    })
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) -> Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{write_zip, FixtureEntry};
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_extract_recreates_paths_and_contents() {
        let temp_dir = tempdir().unwrap();
        let archive = temp_dir.path().join("runtime.zip");
        write_zip(&archive, &[
            FixtureEntry::dir("bundle/"),
            FixtureEntry::file("bundle/engine.64", b"ELF", 0o755),
            FixtureEntry::dir("bundle/libs/"),
            FixtureEntry::file("bundle/libs/core.dll", b"MZ", 0o644),
        ]);

        let dest = temp_dir.path().join("out");
        let tree = ArchiveExtractor::new().extract(&archive, &dest).await.unwrap();

        assert_eq!(tree.root, dest);
        assert_eq!(
            tree.entries,
            vec![
                PathBuf::from("bundle"),
                PathBuf::from("bundle/engine.64"),
                PathBuf::from("bundle/libs"),
                PathBuf::from("bundle/libs/core.dll"),
            ]
        );
        assert_eq!(std::fs::read(tree.path_of("bundle/engine.64")).unwrap(), b"ELF");
        assert_eq!(std::fs::read(tree.path_of("bundle/libs/core.dll")).unwrap(), b"MZ");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_extract_restores_permission_bits() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = tempdir().unwrap();
        let archive = temp_dir.path().join("runtime.zip");
        write_zip(&archive, &[
            FixtureEntry::file("engine.64", b"ELF", 0o755),
            FixtureEntry::file("readme.txt", b"text", 0o640),
        ]);

        let dest = temp_dir.path().join("out");
        ArchiveExtractor::new().extract(&archive, &dest).await.unwrap();

        let mode = |name: &str| std::fs::metadata(dest.join(name)).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode("engine.64"), 0o755);
        assert_eq!(mode("readme.txt"), 0o640);
    }

    #[tokio::test]
    async fn test_extract_ignores_extension() {
        let temp_dir = tempdir().unwrap();
        let archive = temp_dir.path().join("export_templates.tpz");
        write_zip(&archive, &[FixtureEntry::file("templates/version.txt", b"4.2.1.stable.mono", 0o644)]);

        let tree = ArchiveExtractor::new().extract(&archive, temp_dir.path()).await.unwrap();

        assert_eq!(
            std::fs::read_to_string(tree.path_of("templates/version.txt")).unwrap(),
            "4.2.1.stable.mono"
        );
    }

    #[tokio::test]
    async fn test_extract_overwrites_conflicting_files() {
        let temp_dir = tempdir().unwrap();
        let archive = temp_dir.path().join("runtime.zip");
        write_zip(&archive, &[FixtureEntry::file("templates/version.txt", b"new", 0o644)]);
        std::fs::create_dir_all(temp_dir.path().join("templates")).unwrap();
        std::fs::write(temp_dir.path().join("templates/version.txt"), b"old and longer").unwrap();

        ArchiveExtractor::new().extract(&archive, temp_dir.path()).await.unwrap();

        assert_eq!(std::fs::read(temp_dir.path().join("templates/version.txt")).unwrap(), b"new");
    }

    #[tokio::test]
    async fn test_extract_corrupt_archive_fails() {
        let temp_dir = tempdir().unwrap();
        let archive = temp_dir.path().join("runtime.zip");
        std::fs::write(&archive, b"this is not a zip archive").unwrap();

        let result = ArchiveExtractor::new().extract(&archive, &temp_dir.path().join("out")).await;

        assert!(matches!(result, Err(RepackError::Archive { .. })));
    }

    #[tokio::test]
    async fn test_extract_rejects_entries_escaping_destination() {
        let temp_dir = tempdir().unwrap();
        let archive = temp_dir.path().join("runtime.zip");
        write_zip(&archive, &[FixtureEntry::file("../escape.txt", b"nope", 0o644)]);

        let dest = temp_dir.path().join("out");
        let result = ArchiveExtractor::new().extract(&archive, &dest).await;

        assert!(matches!(result, Err(RepackError::UnsafeArchiveEntry { .. })));
        assert!(!temp_dir.path().join("escape.txt").exists());
    }

    #[tokio::test]
    async fn test_extract_rejects_symlink_entries() {
        use std::io::{Cursor, Write};
        use zip::write::SimpleFileOptions;

        let temp_dir = tempdir().unwrap();
        let archive = temp_dir.path().join("runtime.zip");
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        writer.start_file("real.txt", SimpleFileOptions::default()).unwrap();
        writer.write_all(b"payload").unwrap();
        writer.add_symlink("link.txt", "real.txt", SimpleFileOptions::default()).unwrap();
        std::fs::write(&archive, writer.finish().unwrap().into_inner()).unwrap();

        let dest = temp_dir.path().join("out");
        let result = ArchiveExtractor::new().extract(&archive, &dest).await;

        match result {
            Err(RepackError::Archive { source, .. }) => {
                assert!(matches!(source, zip::result::ZipError::UnsupportedArchive(_)));
            }
            other => panic!("Expected Archive error, got {:?}", other),
        }
        assert!(std::fs::symlink_metadata(dest.join("link.txt")).is_err());
    }

    #[test]
    fn test_supported_entry_types() {
        assert!(is_supported_entry(None));
        assert!(is_supported_entry(Some(0o644)));
        assert!(is_supported_entry(Some(0o100755)));
        assert!(is_supported_entry(Some(0o040755)));
        assert!(!is_supported_entry(Some(0o120777)));
        assert!(!is_supported_entry(Some(0o010644)));
    }

    #[tokio::test]
    async fn test_extract_missing_archive_is_file_system_error() {
        let temp_dir = tempdir().unwrap();
        let result = ArchiveExtractor::new()
            .extract(&temp_dir.path().join("absent.zip"), temp_dir.path())
            .await;

        assert!(matches!(result, Err(RepackError::FileSystem { .. })));
    }
}
