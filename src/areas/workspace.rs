//! Narrow reader over the work tree
//!
//! Supplies path contents and stat data to the index. Paths are slash separated
//! and relative to the work tree root.

use crate::artifacts::index::index_entry::EntryMetadata;
use crate::errors::{Error, IoContext, Result};
use bytes::Bytes;
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

const IGNORED_PATHS: [&str; 3] = [".git", ".", ".."];

#[derive(Debug, Clone)]
pub struct Workspace {
    path: PathBuf,
}

impl Workspace {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Workspace { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn is_ignored(path: &Path) -> bool {
        path.components().any(|component| {
            if let std::path::Component::Normal(name) = component {
                let name_str = name.to_string_lossy();
                IGNORED_PATHS.contains(&name_str.as_ref())
            } else {
                false
            }
        })
    }

    /// Absolute location of a work tree path, refusing escapes out of the root
    fn locate(&self, file_path: &str) -> Result<PathBuf> {
        let relative = Path::new(file_path);
        let escapes = relative.is_absolute()
            || relative
                .components()
                .any(|component| !matches!(component, std::path::Component::Normal(_)));
        if file_path.is_empty() || escapes {
            return Err(Error::invalid("work tree path", file_path));
        }

        Ok(self.path.join(relative))
    }

    /// Every file below `root` (the whole work tree when `None`), sorted
    pub fn list_files(&self, root: Option<&str>) -> Result<Vec<String>> {
        let root_path = match root {
            Some(root) if root != "." => self.locate(root)?,
            _ => self.path.clone(),
        };

        if !root_path.exists() && root_path.symlink_metadata().is_err() {
            return Err(Error::PathNotFound(root_path));
        }

        let mut files = WalkDir::new(&root_path)
            .into_iter()
            .filter_entry(|entry| {
                !Self::is_ignored(entry.path().strip_prefix(&self.path).unwrap_or(entry.path()))
            })
            .filter_map(|entry| entry.ok())
            .filter(|entry| !entry.file_type().is_dir())
            .filter_map(|entry| {
                let relative = entry.path().strip_prefix(&self.path).ok()?;
                Some(relative.to_string_lossy().replace(std::path::MAIN_SEPARATOR, "/"))
            })
            .collect::<Vec<_>>();
        files.sort();

        Ok(files)
    }

    /// Content of a file, or the target of a symlink
    pub fn read_file(&self, file_path: &str) -> Result<Bytes> {
        let path = self.locate(file_path)?;
        let metadata = std::fs::symlink_metadata(&path)
            .map_err(|_| Error::PathNotFound(PathBuf::from(file_path)))?;

        if metadata.file_type().is_symlink() {
            let target = std::fs::read_link(&path).at(&path)?;
            return Ok(Bytes::copy_from_slice(target.as_os_str().as_bytes()));
        }

        Ok(Bytes::from(std::fs::read(&path).at(&path)?))
    }

    pub fn stat_file(&self, file_path: &str) -> Result<EntryMetadata> {
        let path = self.locate(file_path)?;
        let metadata = std::fs::symlink_metadata(&path)
            .map_err(|_| Error::PathNotFound(PathBuf::from(file_path)))?;

        Ok(EntryMetadata::from_fs(&path, &metadata))
    }
}
