//! Staged artifact writes
//!
//! Artifacts are first written to temporary files next to their targets and
//! only renamed into place once every one of them has been staged. A build
//! that fails before [`StagedArtifacts::commit`] leaves the targets untouched;
//! the temporaries are removed when dropped.

use crate::error::Result;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

/// A set of artifacts waiting to be moved into place
#[derive(Debug, Default)]
pub struct StagedArtifacts {
    staged: Vec<(NamedTempFile, PathBuf)>,
}

impl StagedArtifacts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write `bytes` to a temporary file in the target's directory
    pub fn stage<P: AsRef<Path>>(&mut self, target: P, bytes: &[u8]) -> Result<()> {
        let target = target.as_ref();
        let dir = target
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));

        let mut file = NamedTempFile::new_in(dir)?;
        file.write_all(bytes)?;
        file.as_file().sync_all()?;

        debug!("Staged {} bytes for {}", bytes.len(), target.display());
        self.staged.push((file, target.to_path_buf()));
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.staged.len()
    }

    pub fn is_empty(&self) -> bool {
        self.staged.is_empty()
    }

    /// Move every staged file onto its target, in staging order
    ///
    /// Renames are not atomic as a group. When one fails, targets before it
    /// already hold the new contents and the rest are untouched; callers must
    /// treat the whole set as untrustworthy after an error.
    pub fn commit(self) -> Result<Vec<PathBuf>> {
        let mut written = Vec::with_capacity(self.staged.len());
        for (file, target) in self.staged {
            file.persist(&target).map_err(|e| {
                warn!(
                    "Could not move {} into place; {} earlier artifacts were replaced",
                    target.display(),
                    written.len()
                );
                e.error
            })?;
            written.push(target);
        }
        Ok(written)
    }
}
