//! Plumbing commands (low-level Git operations)
//!
//! Plumbing commands provide direct access to Git's internal data structures
//! and operations. They're primarily used for scripting and as building blocks
//! for porcelain commands.
//!
//! ## Commands
//!
//! - `hash-object`: Compute object ID and optionally store in database
//! - `cat-file`: Print the type, size or content of an object
//! - `ls-tree`: List contents of a tree object
//! - `ls-files`: List staged paths
//! - `read-tree`, `write-tree`: Move content between trees and the index
//! - `commit-tree`: Write a commit object
//! - `update-ref`, `symbolic-ref`, `show-ref`, `pack-refs`: Reference maintenance
//! - `rev-list`: List commits reachable from revisions

pub mod cat_file;
pub mod commit_tree;
pub mod hash_object;
pub mod ls_files;
pub mod ls_tree;
pub mod pack_refs;
pub mod read_tree;
pub mod rev_list;
pub mod show_ref;
pub mod symbolic_ref;
pub mod update_ref;
pub mod write_tree;
