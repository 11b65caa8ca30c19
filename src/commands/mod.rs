//! Git command implementations
//!
//! This module contains all command implementations, organized into two categories
//! following Git's architecture:
//!
//! - `plumbing`: Low-level commands for direct object and reference manipulation
//! - `porcelain`: User-facing commands for version control workflows (add, commit, log, etc.)
//!
//! Every command is a method on [`Repository`](crate::areas::repository::Repository)
//! that prints to the writer it is given.

pub mod plumbing;
pub mod porcelain;
