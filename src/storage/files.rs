//! Output file handling for a single issuance run.
//!
//! Outputs are never overwritten: every file is created with create-exclusive
//! semantics, so a path that appears between validation and writing still
//! yields `AlreadyExists` instead of being clobbered. [`ArtifactGuard`]
//! removes everything a failed run created.

use crate::error::{CaError, Result};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Permission class of a created file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileMode {
    /// Owner read/write only (0600), used for private keys.
    OwnerOnly,
    /// World readable (0644), used for certificates and requests.
    Public,
}

impl FileMode {
    #[cfg(unix)]
    fn bits(self) -> u32 {
        match self {
            FileMode::OwnerOnly => 0o600,
            FileMode::Public => 0o644,
        }
    }
}

/// Check that `path` can be used as a fresh output file.
///
/// The parent directory must exist, be a directory and be writable; the file
/// itself must not exist yet.
pub fn ensure_destination(path: &Path, what: &str) -> Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let metadata = fs::metadata(parent).map_err(|_| {
        CaError::PathError(format!(
            "destination directory '{}' for {} does not exist",
            parent.display(),
            what
        ))
    })?;

    if !metadata.is_dir() {
        return Err(CaError::PathError(format!(
            "destination '{}' for {} is not a directory",
            parent.display(),
            what
        )));
    }

    if metadata.permissions().readonly() {
        return Err(CaError::PathError(format!(
            "destination directory '{}' for {} is not writable",
            parent.display(),
            what
        )));
    }

    // symlink_metadata so that a dangling link also counts as present
    if fs::symlink_metadata(path).is_ok() {
        return Err(CaError::already_exists(what, path));
    }

    Ok(())
}

/// Tracks files created by one run and deletes them unless committed.
#[derive(Debug, Default)]
pub struct ArtifactGuard {
    created: Vec<PathBuf>,
    committed: bool,
}

impl ArtifactGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create `path` exclusively and write `contents` into it.
    ///
    /// The file is tracked as soon as it exists, so a failed write is rolled
    /// back along with everything else.
    pub fn create(
        &mut self,
        path: &Path,
        contents: &[u8],
        mode: FileMode,
        what: &str,
    ) -> Result<()> {
        let mut options = OpenOptions::new();
        options.write(true).create_new(true);

        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(mode.bits());
        }

        let mut file = options.open(path).map_err(|e| match e.kind() {
            ErrorKind::AlreadyExists => CaError::already_exists(what, path),
            ErrorKind::NotFound => CaError::PathError(format!(
                "destination directory for {} '{}' does not exist",
                what,
                path.display()
            )),
            ErrorKind::PermissionDenied => CaError::PathError(format!(
                "cannot create {} '{}': permission denied",
                what,
                path.display()
            )),
            _ => CaError::StorageError(e),
        })?;
        self.created.push(path.to_path_buf());

        // umask may only have narrowed the mode; pin it explicitly
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            file.set_permissions(fs::Permissions::from_mode(mode.bits()))?;
        }

        file.write_all(contents)?;
        file.sync_all()?;

        debug!(path = %path.display(), what, "created artifact");
        Ok(())
    }

    /// Delete a tracked file now and stop tracking it.
    ///
    /// A file that cannot be deleted stays tracked for the rollback.
    pub fn remove(&mut self, path: &Path) -> Result<()> {
        match fs::remove_file(path) {
            Ok(()) => debug!(path = %path.display(), "removed artifact"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(CaError::StorageError(e)),
        }
        self.created.retain(|p| p != path);
        Ok(())
    }

    /// Files currently tracked, in creation order.
    pub fn created(&self) -> &[PathBuf] {
        &self.created
    }

    /// Keep all tracked files.
    pub fn commit(mut self) {
        self.committed = true;
    }
}

impl Drop for ArtifactGuard {
    fn drop(&mut self) {
        if self.committed {
            return;
        }

        for path in self.created.iter().rev() {
            match fs::remove_file(path) {
                Ok(()) => warn!(path = %path.display(), "rolled back partial output"),
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "failed to roll back partial output")
                }
            }
        }
    }
}
