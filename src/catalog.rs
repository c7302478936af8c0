//! Listing of the files offered for download.

use std::fmt;
use std::path::{Path, PathBuf};

use tracing::debug;

/// One servable file: its name and size at the time of the listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    pub name: String,
    pub size: u64,
}

impl fmt::Display for FileEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} bytes)", self.name, self.size)
    }
}

/// The serving directory.
#[derive(Debug, Clone)]
pub struct FileCatalog {
    dir: PathBuf,
}

impl FileCatalog {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// List the regular files directly inside the serving directory, sorted by name.
    ///
    /// Subdirectories are skipped. Entries whose metadata cannot be read are
    /// left out instead of failing the whole listing.
    pub fn list(&self) -> std::io::Result<Vec<FileEntry>> {
        let mut entries = Vec::new();

        for entry in std::fs::read_dir(&self.dir)? {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    debug!("Skipping unreadable directory entry: {}", err);
                    continue;
                }
            };

            // Follows symlinks, so a link to a regular file is listed like the file.
            let metadata = match std::fs::metadata(entry.path()) {
                Ok(metadata) => metadata,
                Err(err) => {
                    debug!("Skipping {:?}: {}", entry.file_name(), err);
                    continue;
                }
            };

            if !metadata.is_file() {
                continue;
            }

            // A lossy name would link to a file that does not exist.
            let name = match entry.file_name().into_string() {
                Ok(name) => name,
                Err(raw) => {
                    debug!("Skipping non UTF-8 file name {:?}", raw);
                    continue;
                }
            };

            entries.push(FileEntry {
                name,
                size: metadata.len(),
            });
        }

        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }
}

/// Render a listing for the terminal.
pub fn display(entries: &[FileEntry]) -> String {
    let mut out = String::from("\nArquivos encontrados:\n");
    for entry in entries {
        out.push_str(&entry.to_string());
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_list_empty_dir() {
        let temp_dir = TempDir::new().unwrap();
        let catalog = FileCatalog::new(temp_dir.path());
        assert!(catalog.list().unwrap().is_empty());
    }

    #[test]
    fn test_list_reports_sizes() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("b.bin"), b"").unwrap();
        std::fs::write(temp_dir.path().join("a.txt"), b"0123456789").unwrap();

        let entries = FileCatalog::new(temp_dir.path()).list().unwrap();
        assert_eq!(
            entries,
            vec![
                FileEntry { name: "a.txt".into(), size: 10 },
                FileEntry { name: "b.bin".into(), size: 0 },
            ]
        );
    }

    #[test]
    fn test_list_skips_subdirectories() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::create_dir_all(temp_dir.path().join("nested/deeper")).unwrap();
        std::fs::write(temp_dir.path().join("nested/inner.txt"), b"hidden").unwrap();
        std::fs::write(temp_dir.path().join("nested/deeper/x.txt"), b"hidden").unwrap();
        std::fs::write(temp_dir.path().join("top.txt"), b"shown").unwrap();

        let entries = FileCatalog::new(temp_dir.path()).list().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "top.txt");
    }

    #[cfg(unix)]
    #[test]
    fn test_list_skips_dangling_symlink() {
        let temp_dir = TempDir::new().unwrap();
        std::os::unix::fs::symlink(
            temp_dir.path().join("missing"),
            temp_dir.path().join("broken"),
        )
        .unwrap();
        std::fs::write(temp_dir.path().join("ok.txt"), b"1").unwrap();

        let entries = FileCatalog::new(temp_dir.path()).list().unwrap();
        assert_eq!(entries, vec![FileEntry { name: "ok.txt".into(), size: 1 }]);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_list_skips_non_utf8_names() {
        use std::os::unix::ffi::OsStrExt;

        let temp_dir = TempDir::new().unwrap();
        let raw = std::ffi::OsStr::from_bytes(b"bad\xff.txt");
        std::fs::write(temp_dir.path().join(raw), b"x").unwrap();
        std::fs::write(temp_dir.path().join("good.txt"), b"y").unwrap();

        let entries = FileCatalog::new(temp_dir.path()).list().unwrap();
        assert_eq!(entries, vec![FileEntry { name: "good.txt".into(), size: 1 }]);
    }

    #[test]
    fn test_list_missing_dir_fails() {
        let temp_dir = TempDir::new().unwrap();
        let catalog = FileCatalog::new(temp_dir.path().join("nope"));
        assert!(catalog.list().is_err());
    }

    #[test]
    fn test_display() {
        let entries = vec![
            FileEntry { name: "a.txt".into(), size: 10 },
            FileEntry { name: "b.bin".into(), size: 0 },
        ];
        assert_eq!(
            display(&entries),
            "\nArquivos encontrados:\na.txt (10 bytes)\nb.bin (0 bytes)\n"
        );
    }
}
