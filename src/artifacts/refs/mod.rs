//! Reference names, records and on-disk formats
//!
//! ## File Format
//!
//! Loose references are files under the git directory containing either:
//! - A 40-character SHA-1 hash (direct reference)
//! - `ref: <name>` for symbolic references
//!
//! `packed-refs` batches direct references, one `<hex> <name>` per line, each
//! optionally followed by a `^<hex>` line holding the peeled target of a tag.

pub mod list_filter;
pub mod packed_refs;
pub mod ref_name;
pub mod reference;
pub mod reflog;

/// Name of the HEAD reference
pub const HEAD: &str = "HEAD";

pub const REFS_PREFIX: &str = "refs/";
pub const HEADS_PREFIX: &str = "refs/heads/";
pub const TAGS_PREFIX: &str = "refs/tags/";
pub const REMOTES_PREFIX: &str = "refs/remotes/";
pub const NOTES_PREFIX: &str = "refs/notes/";
pub const DEFAULT_NOTES_REF: &str = "refs/notes/commits";

pub const PACKED_REFS: &str = "packed-refs";

/// Sequences never allowed in a reference name
pub const INVALID_REF_NAME_REGEX: &str =
    r"^\.|\/\.|\.\.|^\/|\/$|\/\/|\.lock$|\.lock\/|\.$|@\{|[\x00-\x20\*:\?\[\\~\^\x7f]";
