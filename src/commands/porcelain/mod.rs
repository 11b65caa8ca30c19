//! Porcelain commands (user-facing Git operations)
//!
//! Porcelain commands provide the high-level user interface for version control.
//! They compose plumbing commands and internal operations into workflows that
//! match typical Git usage patterns.
//!
//! ## Commands
//!
//! - `init`: Initialize a new repository
//! - `add`: Stage files for commit
//! - `commit`: Create a new commit
//! - `log`: Show commit history
//! - `branch`: Create, list, rename or delete branches
//! - `tag`: Create, list or delete tags
//! - `notes`: Add, show or remove object notes
//! - `reflog`: Show the update history of a reference

pub mod add;
pub mod branch;
pub mod commit;
pub mod init;
pub mod log;
pub mod notes;
pub mod reflog;
pub mod tag;
