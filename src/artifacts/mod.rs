//! Git data structures and algorithms
//!
//! This module contains the core Git types and algorithms:
//!
//! - `core`: Shared visitor types
//! - `database`: Object storage backends (loose, pack, memory)
//! - `index`: Index file records and checksummed I/O
//! - `lockfile`: Atomic `<file>.lock` replacement
//! - `log`: Commit history traversal
//! - `objects`: Git object types (blob, tree, commit, tag)
//! - `refs`: Reference names, packed-refs and reflogs
//! - `revision`: Revision expressions such as `main~2` or `HEAD^`

pub mod core;
pub mod database;
pub mod index;
pub mod lockfile;
pub mod log;
pub mod objects;
pub mod refs;
pub mod revision;
