//! Atomic file replacement through `<file>.lock`
//!
//! The lock file is created exclusively, filled, synced and renamed over the
//! target. While it exists every other writer fails with `Error::Locked`, and
//! until the rename readers keep seeing the previous content.

use crate::errors::{Error, IoContext, Result};
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub struct LockFile {
    target: PathBuf,
    lock_path: PathBuf,
    /// Open while this value owns `lock_path`; `None` once committed
    file: Option<File>,
}

impl LockFile {
    pub fn acquire(target: &Path) -> Result<Self> {
        let mut lock_path = target.as_os_str().to_owned();
        lock_path.push(".lock");
        let lock_path = PathBuf::from(lock_path);

        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent).at(parent)?;
        }

        let file = match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&lock_path)
        {
            Ok(file) => file,
            Err(error) if error.kind() == io::ErrorKind::AlreadyExists => {
                return Err(Error::Locked(target.to_path_buf()));
            }
            Err(error) => return Err(error).at(&lock_path),
        };

        Ok(LockFile {
            target: target.to_path_buf(),
            lock_path,
            file: Some(file),
        })
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Sync the new content and rename it over the target
    ///
    /// On failure the lock is still owned, and dropping it removes the lock file.
    pub fn commit(mut self) -> Result<()> {
        if let Some(file) = self.file.as_ref() {
            file.sync_all().at(&self.lock_path)?;
        }

        std::fs::rename(&self.lock_path, &self.target).at(&self.target)?;
        self.file = None;

        Ok(())
    }
}

impl Write for LockFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self.file.as_mut() {
            Some(file) => file.write(buf),
            None => Err(io::Error::other("lock already released")),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.file.as_mut() {
            Some(file) => file.flush(),
            None => Ok(()),
        }
    }
}

impl Drop for LockFile {
    fn drop(&mut self) {
        // once committed, a file at lock_path belongs to the next writer
        if self.file.take().is_some() {
            let _ = std::fs::remove_file(&self.lock_path);
        }
    }
}
