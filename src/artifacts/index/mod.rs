//! Index file format
//!
//! The index (also called staging area or cache) records the content staged for
//! the next tree, one entry per `(path, stage)`.
//!
//! ## File Format (Version 2)
//!
//! ```text
//! Header (12 bytes):
//!   - Signature: "DIRC" (4 bytes)
//!   - Version: 2 (4 bytes)
//!   - Entry count (4 bytes)
//!
//! Entries (variable length):
//!   - Each entry padded with NULs to 8-byte alignment
//!   - Sorted by path, then stage
//!
//! Extensions (optional, skipped on read):
//!   - 4 byte signature, 4 byte size, payload
//!
//! Checksum (20 bytes):
//!   - SHA-1 hash of all preceding bytes
//! ```

pub mod checksum;
pub mod entry_mode;
pub mod index_entry;
pub mod index_header;

/// Size of SHA-1 checksum in bytes
pub const CHECKSUM_SIZE: usize = 20;

/// Size of index header in bytes
pub const HEADER_SIZE: usize = 12; // 4 bytes for marker, 4 for version, 4 for entries_count

/// Magic signature identifying index files
pub const SIGNATURE: &str = "DIRC";

/// Index file format version
pub const VERSION: u32 = 2;

/// Size of an extension header (signature and payload length)
pub const EXTENSION_HEADER_SIZE: usize = 8;
