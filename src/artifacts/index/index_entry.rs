//! Index entry representation
//!
//! Each entry records a staged path with:
//! - the object id of its content
//! - its stage (0 when merged, 1 to 3 for the sides of a conflict)
//! - stat data (mode, size, timestamps) used to skip rehashing unchanged files
//!
//! ## Entry Format
//!
//! ```text
//! ctime, ctime_nsec, mtime, mtime_nsec, dev, ino, mode, uid, gid, size   10 x u32
//! oid                                                                    20 bytes
//! flags: stage in bits 12-13, path length (capped at 0xFFF) below        u16
//! path, then 1 to 8 NUL bytes up to a multiple of 8
//! ```
//!
//! Paths are raw bytes and order byte-wise.

use crate::artifacts::index::entry_mode::{EntryMode, FileMode};
use crate::artifacts::objects::object::{Packable, Unpackable};
use crate::artifacts::objects::object_id::ObjectId;
use crate::errors::{Error, IoContext, Result};
use bstr::{BStr, BString, ByteSlice};
use byteorder::{ByteOrder, WriteBytesExt};
use bytes::Bytes;
use is_executable::IsExecutable;
use std::fs::Metadata;
use std::io::{BufRead, Write};
use std::os::unix::prelude::MetadataExt;
use std::path::Path;

/// Largest path length representable in the flags
const MAX_PATH_SIZE: usize = 0xFFF;

const STAGE_SHIFT: u16 = 12;
const STAGE_MASK: u16 = 0x3000;
const EXTENDED_FLAG: u16 = 0x4000;

/// Block size for entry alignment (8 bytes)
pub const ENTRY_BLOCK: usize = 8;

/// Minimum size of an index entry in bytes
pub const ENTRY_MIN_SIZE: usize = 64;

/// Offset of the path inside an encoded entry
const PATH_OFFSET: usize = 62;

/// Conflict side of an entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Stage {
    #[default]
    Merged = 0,
    Ancestor = 1,
    Ours = 2,
    Theirs = 3,
}

impl Stage {
    pub fn as_u8(&self) -> u8 {
        *self as u8
    }

    pub fn is_conflict(&self) -> bool {
        *self != Stage::Merged
    }
}

impl TryFrom<u8> for Stage {
    type Error = Error;

    fn try_from(stage: u8) -> Result<Self> {
        match stage {
            0 => Ok(Stage::Merged),
            1 => Ok(Stage::Ancestor),
            2 => Ok(Stage::Ours),
            3 => Ok(Stage::Theirs),
            _ => Err(Error::invalid("stage", stage.to_string())),
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_u8())
    }
}

/// Staged file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    /// Slash separated path relative to the work tree root
    pub path: BString,
    pub oid: ObjectId,
    pub stage: Stage,
    pub metadata: EntryMetadata,
}

impl IndexEntry {
    pub fn new(path: impl Into<BString>, oid: ObjectId, stage: Stage, metadata: EntryMetadata) -> Self {
        IndexEntry {
            path: path.into(),
            oid,
            stage,
            metadata,
        }
    }

    /// Entry without stat data, as produced from a tree
    pub fn from_tree_entry(path: impl Into<BString>, oid: ObjectId, mode: EntryMode) -> Self {
        IndexEntry {
            path: path.into(),
            oid,
            stage: Stage::Merged,
            metadata: EntryMetadata {
                mode,
                ..Default::default()
            },
        }
    }

    pub fn mode(&self) -> EntryMode {
        self.metadata.mode
    }

    pub fn basename(&self) -> &BStr {
        match self.path.rfind_byte(b'/') {
            Some(slash) => self.path[slash + 1..].as_bstr(),
            None => self.path.as_bstr(),
        }
    }

    /// `a/b/c` has parent directories `a` and `a/b`
    pub fn parent_dirs(&self) -> Vec<&BStr> {
        self.path
            .find_iter("/")
            .map(|position| self.path[..position].as_bstr())
            .collect()
    }

    pub fn stat_match(&self, other: &EntryMetadata) -> bool {
        (self.metadata.size == 0 || self.metadata.size == other.size)
            && self.metadata.mode == other.mode
    }

    pub fn times_match(&self, other: &EntryMetadata) -> bool {
        self.metadata.ctime == other.ctime
            && self.metadata.ctime_nsec == other.ctime_nsec
            && self.metadata.mtime == other.mtime
            && self.metadata.mtime_nsec == other.mtime_nsec
    }

    fn flags(&self) -> u16 {
        let length = self.path.len().min(MAX_PATH_SIZE) as u16;
        ((self.stage.as_u8() as u16) << STAGE_SHIFT) | length
    }
}

/// Stat data recorded for change detection
///
/// Fields are truncated to 32 bits on disk, as git does.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryMetadata {
    pub ctime: i64,
    pub ctime_nsec: i64,
    pub mtime: i64,
    pub mtime_nsec: i64,
    pub dev: u64,
    pub ino: u64,
    pub mode: EntryMode,
    pub uid: u32,
    pub gid: u32,
    pub size: u64,
}

impl EntryMetadata {
    /// Stat data of a work tree file, read without following symlinks
    pub fn from_fs(path: &Path, metadata: &Metadata) -> Self {
        let mode = if metadata.file_type().is_symlink() {
            EntryMode::Symlink
        } else if metadata.is_dir() {
            EntryMode::Directory
        } else if path.is_executable() {
            EntryMode::File(FileMode::Executable)
        } else {
            EntryMode::File(FileMode::Regular)
        };

        EntryMetadata {
            ctime: metadata.ctime(),
            ctime_nsec: metadata.ctime_nsec(),
            mtime: metadata.mtime(),
            mtime_nsec: metadata.mtime_nsec(),
            dev: metadata.dev(),
            ino: metadata.ino(),
            mode,
            uid: metadata.uid(),
            gid: metadata.gid(),
            size: metadata.size(),
        }
    }

    pub fn stat(path: &Path) -> Result<Self> {
        let metadata = std::fs::symlink_metadata(path).at(path)?;
        Ok(Self::from_fs(path, &metadata))
    }
}

impl Packable for IndexEntry {
    fn serialize(&self) -> Result<Bytes> {
        let metadata = &self.metadata;

        let mut entry_bytes = Vec::with_capacity(ENTRY_MIN_SIZE + self.path.len());
        entry_bytes.write_u32::<byteorder::NetworkEndian>(metadata.ctime as u32)?;
        entry_bytes.write_u32::<byteorder::NetworkEndian>(metadata.ctime_nsec as u32)?;
        entry_bytes.write_u32::<byteorder::NetworkEndian>(metadata.mtime as u32)?;
        entry_bytes.write_u32::<byteorder::NetworkEndian>(metadata.mtime_nsec as u32)?;
        entry_bytes.write_u32::<byteorder::NetworkEndian>(metadata.dev as u32)?;
        entry_bytes.write_u32::<byteorder::NetworkEndian>(metadata.ino as u32)?;
        entry_bytes.write_u32::<byteorder::NetworkEndian>(metadata.mode.as_u32())?;
        entry_bytes.write_u32::<byteorder::NetworkEndian>(metadata.uid)?;
        entry_bytes.write_u32::<byteorder::NetworkEndian>(metadata.gid)?;
        entry_bytes.write_u32::<byteorder::NetworkEndian>(metadata.size as u32)?;
        self.oid.write_h40_to(&mut entry_bytes)?;
        entry_bytes.write_u16::<byteorder::NetworkEndian>(self.flags())?;
        entry_bytes.write_all(&self.path)?;

        // at least one NUL terminates the path
        entry_bytes.push(0);
        while entry_bytes.len() % ENTRY_BLOCK != 0 {
            entry_bytes.push(0);
        }

        Ok(Bytes::from(entry_bytes))
    }
}

impl Unpackable for IndexEntry {
    fn deserialize(mut reader: impl BufRead) -> Result<Self> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;

        if bytes.len() < ENTRY_MIN_SIZE {
            return Err(Error::malformed("index entry", "entry is too short"));
        }

        let read_u32 = |offset: usize| byteorder::NetworkEndian::read_u32(&bytes[offset..offset + 4]);
        let mode = EntryMode::try_from(read_u32(24))?;
        let oid = ObjectId::from_slice(&bytes[40..60])?;
        let flags = byteorder::NetworkEndian::read_u16(&bytes[60..62]);
        if flags & EXTENDED_FLAG != 0 {
            return Err(Error::malformed("index entry", "extended flags need index version 3"));
        }
        let stage = Stage::try_from(((flags & STAGE_MASK) >> STAGE_SHIFT) as u8)?;

        let name_end = bytes[PATH_OFFSET..]
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| Error::malformed("index entry", "missing NUL after path"))?;
        let path = BString::from(&bytes[PATH_OFFSET..PATH_OFFSET + name_end]);

        Ok(IndexEntry {
            path,
            oid,
            stage,
            metadata: EntryMetadata {
                ctime: read_u32(0) as i64,
                ctime_nsec: read_u32(4) as i64,
                mtime: read_u32(8) as i64,
                mtime_nsec: read_u32(12) as i64,
                dev: read_u32(16) as u64,
                ino: read_u32(20) as u64,
                mode,
                uid: read_u32(28),
                gid: read_u32(32),
                size: read_u32(36) as u64,
            },
        })
    }
}
