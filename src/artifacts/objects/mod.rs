//! Git object types and operations
//!
//! Git stores all content as objects identified by SHA-1 hashes. There are four main types:
//!
//! - **Blob**: File content (raw bytes)
//! - **Tree**: Directory listing (names, modes, and object IDs)
//! - **Commit**: Snapshot with metadata (author, message, parent commits, tree)
//! - **Tag**: Annotated reference to another object
//!
//! All objects implement serialization/deserialization for the Git object format:
//! `<type> <size>\0<content>`

pub mod blob;
pub mod codec;
pub mod commit;
pub mod object;
pub mod object_id;
pub mod object_type;
pub mod signature;
pub mod tag;
pub mod tree;

/// Length of a SHA-1 hash in hexadecimal format
pub const OBJECT_ID_LENGTH: usize = 40;

/// Length of a SHA-1 hash in raw bytes
pub const OBJECT_ID_RAW_LENGTH: usize = 20;

/// Id of the tree with no entries
pub const EMPTY_TREE_ID: &str = "4b825dc642cb6eb5a060e54bf8d69288fbee4904";
