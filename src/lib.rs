//! A git-compatible object store, reference store, index and revision walker
//!
//! Everything hangs off a [`Repository`](areas::repository::Repository), opened or
//! created with a shared [`Context`](context::Context):
//!
//! ```no_run
//! use gitcore::{Context, Repository};
//! use std::sync::Arc;
//!
//! # fn main() -> gitcore::Result<()> {
//! let repository = Repository::open(".".as_ref(), Arc::new(Context::from_env()))?;
//! let mut walk = repository.rev_walk();
//! walk.push_head()?;
//! for oid in walk {
//!     println!("{}", oid?);
//! }
//! # Ok(())
//! # }
//! ```

pub mod areas;
pub mod artifacts;
pub mod commands;
pub mod context;
pub mod errors;

pub use areas::repository::Repository;
pub use context::Context;
pub use errors::{Error, ErrorCode, Result};

/// How `log` prints each commit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum CommitDisplayFormat {
    #[default]
    Medium,
    OneLine,
}

/// Which reference names `log` prints next to a commit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum CommitDecoration {
    #[default]
    Short,
    Full,
    None,
}
