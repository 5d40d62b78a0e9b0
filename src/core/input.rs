//! Input file discovery
//!
//! Walks the source folder once, reads every regular file, and returns the
//! set sorted by normalized relative path so builds are reproducible.

use crate::error::{PackError, Result};
use crate::validation::{display_path, identifier_for, normalize_path};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// One file to be packed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputFile {
    /// Normalized relative path, no leading slash
    pub path: String,

    /// Location on disk, written into the load script
    pub source: PathBuf,

    pub bytes: Vec<u8>,
}

impl InputFile {
    pub fn new(path: impl AsRef<str>, source: impl Into<PathBuf>, bytes: Vec<u8>) -> Self {
        InputFile {
            path: normalize_path(path.as_ref()),
            source: source.into(),
            bytes,
        }
    }

    /// In-memory file whose source is its relative path
    pub fn from_bytes(path: impl AsRef<str>, bytes: impl Into<Vec<u8>>) -> Self {
        let path = normalize_path(path.as_ref());
        InputFile {
            source: PathBuf::from(&path),
            path,
            bytes: bytes.into(),
        }
    }

    pub fn len(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Manifest path, e.g. `/config/device.cfg`
    pub fn display_path(&self) -> String {
        display_path(&self.path)
    }

    /// Manifest identifier, e.g. `config_device_cfg`
    pub fn identifier(&self) -> String {
        identifier_for(&self.path)
    }
}

/// Read every regular file under `root`, sorted by relative path
pub fn collect_inputs<P: AsRef<Path>>(root: P) -> Result<Vec<InputFile>> {
    let root = root.as_ref();
    if !root.is_dir() {
        return Err(PackError::Config(format!(
            "source folder {} is not a directory",
            root.display()
        )));
    }

    let mut files = Vec::new();
    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            // Follows symlinks
            let metadata = fs::metadata(&path)?;

            if metadata.is_dir() {
                pending.push(path);
            } else if metadata.is_file() {
                let relative = relative_path(root, &path)?;
                let bytes = fs::read(&path)?;
                debug!("Found {} ({} bytes)", relative, bytes.len());
                files.push(InputFile {
                    path: relative,
                    source: path,
                    bytes,
                });
            }
        }
    }

    files.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(files)
}

fn relative_path(root: &Path, path: &Path) -> Result<String> {
    let relative = path
        .strip_prefix(root)
        .map_err(|_| PackError::Config(format!("{} escapes the source folder", path.display())))?;

    let parts = relative
        .components()
        .map(|c| {
            c.as_os_str().to_str().ok_or_else(|| {
                PackError::Config(format!("file name is not valid UTF-8: {}", path.display()))
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(normalize_path(&parts.join("/")))
}

/// Reject input sets where two paths collapse to one manifest identifier
pub fn check_unique_identifiers(files: &[InputFile]) -> Result<()> {
    let mut seen: HashMap<String, &str> = HashMap::new();

    for file in files {
        let ident = file.identifier();
        if let Some(first) = seen.get(&ident) {
            return Err(PackError::DuplicateIdentifier {
                ident,
                first: display_path(first),
                second: file.display_path(),
            });
        }
        seen.insert(ident, &file.path);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_collect_sorted() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("secure")).unwrap();
        fs::create_dir_all(dir.path().join("config/empty")).unwrap();
        fs::write(dir.path().join("secure/node.key"), b"key").unwrap();
        fs::write(dir.path().join("defaults.json"), b"{}").unwrap();
        fs::write(dir.path().join("config/device.cfg"), b"").unwrap();

        let files = collect_inputs(dir.path()).unwrap();
        let paths: Vec<&str> = files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(
            paths,
            vec!["config/device.cfg", "defaults.json", "secure/node.key"]
        );

        assert_eq!(files[2].bytes, b"key");
        assert!(files[0].is_empty());
        assert_eq!(files[0].display_path(), "/config/device.cfg");
        assert_eq!(files[0].identifier(), "config_device_cfg");
        assert_eq!(files[1].source, dir.path().join("defaults.json"));
    }

    #[test]
    fn test_missing_folder() {
        let dir = TempDir::new().unwrap();
        let result = collect_inputs(dir.path().join("nope"));
        assert!(matches!(result, Err(PackError::Config(_))));
    }

    #[test]
    fn test_duplicate_identifiers() {
        let files = vec![
            InputFile::from_bytes("a-b.txt", b"1".to_vec()),
            InputFile::from_bytes("a_b.txt", b"2".to_vec()),
        ];
        match check_unique_identifiers(&files) {
            Err(PackError::DuplicateIdentifier { ident, first, second }) => {
                assert_eq!(ident, "a_b_txt");
                assert_eq!(first, "/a-b.txt");
                assert_eq!(second, "/a_b.txt");
            }
            other => panic!("expected duplicate identifier, got {:?}", other),
        }

        let distinct = vec![
            InputFile::from_bytes("a.txt", Vec::new()),
            InputFile::from_bytes("b.txt", Vec::new()),
        ];
        assert!(check_unique_identifiers(&distinct).is_ok());
    }
}
