//! Error types shared by every store
//!
//! Library code returns [`Error`]; each variant maps onto one [`ErrorCode`] so callers
//! can branch on the category without matching individual variants.

use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use std::path::{Path, PathBuf};

/// Broad category of an [`Error`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    NotFound,
    AlreadyExists,
    AmbiguousPrefix,
    MalformedObject,
    ResolutionCycle,
    UnmergedEntries,
    IoFailure,
    Aborted,
    Locked,
    InvalidSpec,
    TypeMismatch,
    ReadOnly,
    InvalidWalkState,
    MissingIdentity,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("object {0} not found")]
    ObjectNotFound(ObjectId),

    #[error("no object matches prefix {0}")]
    PrefixNotFound(String),

    #[error("reference {0} not found")]
    ReferenceNotFound(String),

    #[error("path {} not found", .0.display())]
    PathNotFound(PathBuf),

    #[error("reference {0} already exists")]
    AlreadyExists(String),

    #[error("no note found for object {0}")]
    NoteNotFound(ObjectId),

    #[error("object {0} already has a note")]
    NoteExists(ObjectId),

    #[error("short object id {prefix} is ambiguous ({candidates} candidates)")]
    AmbiguousPrefix { prefix: String, candidates: usize },

    #[error("malformed {kind}: {reason}")]
    MalformedObject { kind: &'static str, reason: String },

    #[error("symbolic reference {0} is nested too deeply or loops")]
    ResolutionCycle(String),

    #[error("cannot build a tree while {0} unmerged entries are staged")]
    UnmergedEntries(usize),

    #[error("I/O failure at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O failure: {0}")]
    RawIo(#[from] std::io::Error),

    #[error("iteration aborted by visitor")]
    Aborted,

    #[error("{} is locked by another writer", .0.display())]
    Locked(PathBuf),

    #[error("invalid {kind}: {value}")]
    InvalidSpec { kind: &'static str, value: String },

    #[error("object {oid} is a {actual}, not a {expected}")]
    TypeMismatch {
        oid: ObjectId,
        expected: ObjectType,
        actual: ObjectType,
    },

    #[error("no writable object backend is configured")]
    ReadOnly,

    #[error("revision walk is {0}; reset it before adding new tips")]
    InvalidWalkState(&'static str),

    #[error("no identity configured: set {0}")]
    MissingIdentity(&'static str),
}

impl Error {
    pub fn code(&self) -> ErrorCode {
        match self {
            Error::ObjectNotFound(_)
            | Error::PrefixNotFound(_)
            | Error::ReferenceNotFound(_)
            | Error::PathNotFound(_)
            | Error::NoteNotFound(_) => ErrorCode::NotFound,
            Error::AlreadyExists(_) | Error::NoteExists(_) => ErrorCode::AlreadyExists,
            Error::AmbiguousPrefix { .. } => ErrorCode::AmbiguousPrefix,
            Error::MalformedObject { .. } => ErrorCode::MalformedObject,
            Error::ResolutionCycle(_) => ErrorCode::ResolutionCycle,
            Error::UnmergedEntries(_) => ErrorCode::UnmergedEntries,
            Error::Io { .. } | Error::RawIo(_) => ErrorCode::IoFailure,
            Error::Aborted => ErrorCode::Aborted,
            Error::Locked(_) => ErrorCode::Locked,
            Error::InvalidSpec { .. } => ErrorCode::InvalidSpec,
            Error::TypeMismatch { .. } => ErrorCode::TypeMismatch,
            Error::ReadOnly => ErrorCode::ReadOnly,
            Error::InvalidWalkState(_) => ErrorCode::InvalidWalkState,
            Error::MissingIdentity(_) => ErrorCode::MissingIdentity,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.code() == ErrorCode::NotFound
    }

    pub(crate) fn malformed(kind: &'static str, reason: impl Into<String>) -> Self {
        Error::MalformedObject {
            kind,
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid(kind: &'static str, value: impl Into<String>) -> Self {
        Error::InvalidSpec {
            kind,
            value: value.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Attach the offending path to an I/O error
pub(crate) trait IoContext<T> {
    fn at(self, path: &Path) -> Result<T>;
}

impl<T> IoContext<T> for std::io::Result<T> {
    fn at(self, path: &Path) -> Result<T> {
        self.map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn io_errors_keep_their_path() {
        let result: std::io::Result<()> = Err(std::io::Error::other("disk on fire"));
        let error = result.at(Path::new("objects/ab/cdef")).unwrap_err();

        assert_eq!(error.code(), ErrorCode::IoFailure);
        assert!(error.to_string().contains("objects/ab/cdef"));
    }

    #[test]
    fn not_found_variants_share_a_code() {
        assert!(Error::ReferenceNotFound("refs/heads/nope".into()).is_not_found());
        assert!(Error::PrefixNotFound("abcd".into()).is_not_found());
        assert!(Error::PathNotFound(PathBuf::from("a.txt")).is_not_found());
        assert!(!Error::Aborted.is_not_found());
    }
}
