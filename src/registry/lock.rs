//! Advisory run lock guarding the registry file.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use tracing::debug;

use super::RegistryError;

/// Exclusive lock on `<registry>.lock`, released on drop.
#[derive(Debug)]
pub struct RunLock {
    file: File,
    path: PathBuf,
}

impl RunLock {
    /// Lock file path used for a registry.
    #[must_use]
    pub fn path_for(registry_path: &Path) -> PathBuf {
        let mut name = registry_path
            .file_name()
            .map(std::ffi::OsStr::to_os_string)
            .unwrap_or_default();
        name.push(".lock");
        registry_path.with_file_name(name)
    }

    /// Takes the lock without waiting.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Locked`] when another run holds the lock and
    /// [`RegistryError::Io`] when the lock file cannot be opened.
    pub fn acquire(registry_path: &Path) -> Result<Self, RegistryError> {
        let path = Self::path_for(registry_path);
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| RegistryError::io(parent, e))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)
            .map_err(|e| RegistryError::io(&path, e))?;

        if let Err(error) = file.try_lock_exclusive() {
            let contended = error.raw_os_error().is_some()
                && error.raw_os_error() == fs2::lock_contended_error().raw_os_error();
            return Err(if contended || error.kind() == std::io::ErrorKind::WouldBlock {
                RegistryError::Locked { path }
            } else {
                RegistryError::io(&path, error)
            });
        }

        debug!(path = %path.display(), "run lock acquired");
        Ok(Self { file, path })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
        debug!(path = %self.path.display(), "run lock released");
    }
}
