//! Core repository components
//!
//! This module contains the fundamental building blocks of a Git repository:
//!
//! - `database`: Object database for storing blobs, trees, commits and tags
//! - `index`: Staging area (index/cache) for tracking file changes
//! - `notes`: Notes attached to objects on a `refs/notes/` reference
//! - `refs`: Reference management (branches, tags, HEAD, reflogs)
//! - `repository`: High-level repository operations and coordination
//! - `workspace`: Working directory file system operations

pub mod database;
pub mod index;
pub mod notes;
pub mod refs;
pub mod repository;
pub mod workspace;
