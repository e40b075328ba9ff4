//! Local filesystem adapters: migrations directory listing and the
//! advisory lock that serialises migration runs.

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use fs2::FileExt;

use crate::domain::result::{Error, Result};
use crate::ports::FileListing;

/// Lists the regular files of a migrations directory
#[derive(Debug, Clone)]
pub struct DirectoryListing {
    path: PathBuf,
}

impl DirectoryListing {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl FileListing for DirectoryListing {
    /// A missing directory lists as empty
    fn list(&self) -> Result<Vec<String>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let mut names = Vec::new();
        for entry in fs::read_dir(&self.path)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
        Ok(names)
    }
}

/// Exclusive advisory lock held for the duration of a migrate or rollback
///
/// Released when dropped. Two runners pointed at the same lock file can
/// never compute batch numbers at the same time.
#[derive(Debug)]
pub struct MigrationLock {
    file: File,
    path: PathBuf,
}

impl MigrationLock {
    /// Try to take the lock without waiting
    pub fn acquire(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        file.try_lock_exclusive()
            .map_err(|_| Error::Locked(path.display().to_string()))?;

        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    /// Lock file that guards a database file: `<db>.migrate.lock`
    pub fn path_for_database(db_path: &Path) -> PathBuf {
        let mut name = db_path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".migrate.lock");
        db_path.with_file_name(name)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for MigrationLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}
