//! Revision expressions
//!
//! Supports:
//! - Reference names, full (`refs/heads/main`) or short (`main`, `v1.0`, `origin/main`)
//! - Aliases: `@` (resolves to `HEAD`)
//! - Full or abbreviated object ids (4 to 40 hex characters)
//! - Parent notation: `<revision>^`, `<revision>^<n>` for the n-th parent
//! - Ancestor notation: `<revision>~<n>`
//!
//! Names win over object ids: `cafe` is a branch before it is an id prefix.

use crate::areas::database::Database;
use crate::areas::refs::Refs;
use crate::artifacts::objects::OBJECT_ID_LENGTH;
use crate::artifacts::objects::object_id::{MIN_PREFIX_LENGTH, ObjectId};
use crate::artifacts::objects::object_type::ObjectType;
use crate::artifacts::refs::ref_name::{matches_invalid_pattern, validate_ref_name};
use crate::artifacts::refs::{HEADS_PREFIX, REFS_PREFIX, REMOTES_PREFIX, TAGS_PREFIX};
use crate::errors::{Error, Result};

pub const PARENT_REGEX: &str = r"^(.+)\^(\d*)$";
pub const ANCESTOR_REGEX: &str = r"^(.+)\~(\d+)$";
pub const REF_ALIASES: phf::Map<&'static str, &'static str> = phf::phf_map! {
    "@" => "HEAD",
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Revision {
    /// A reference name or an object id, told apart while resolving
    Name(String),
    /// The n-th parent of a commit, `^0` being the commit itself
    Parent(Box<Revision>, usize),
    /// The n-th first-parent ancestor (e.g. `HEAD~3`)
    Ancestor(Box<Revision>, usize),
}

impl Revision {
    pub fn try_parse(revision: &str) -> Result<Revision> {
        let regex = |pattern: &str| {
            regex::Regex::new(pattern).map_err(|error| Error::invalid("revision pattern", error.to_string()))
        };

        if let Some(captures) = regex(PARENT_REGEX)?.captures(revision) {
            let base_revision = Self::try_parse(&captures[1])?;
            let nth = match &captures[2] {
                "" => 1,
                digits => digits
                    .parse()
                    .map_err(|_| Error::invalid("revision", revision))?,
            };

            return Ok(Revision::Parent(Box::new(base_revision), nth));
        }

        if let Some(captures) = regex(ANCESTOR_REGEX)?.captures(revision) {
            let base_revision = Self::try_parse(&captures[1])?;
            let generations = captures[2]
                .parse()
                .map_err(|_| Error::invalid("revision", revision))?;

            return Ok(Revision::Ancestor(Box::new(base_revision), generations));
        }

        let name = *REF_ALIASES.get(revision).unwrap_or(&revision);
        if name.is_empty() || name.starts_with('-') || matches_invalid_pattern(name)? {
            return Err(Error::invalid("revision", revision));
        }

        Ok(Revision::Name(name.to_string()))
    }

    /// Object the revision names; `^` and `~` steps peel tags to commits
    pub fn resolve(&self, database: &Database, refs: &Refs) -> Result<ObjectId> {
        match self {
            Revision::Name(name) => Self::resolve_name(name, database, refs),
            Revision::Parent(base, nth) => {
                let commit = Self::peel_to_commit(base.resolve(database, refs)?, database)?;
                if *nth == 0 {
                    return Ok(commit);
                }

                database
                    .parse_commit(&commit)?
                    .parents()
                    .get(nth - 1)
                    .copied()
                    .ok_or_else(|| Error::invalid("revision", format!("{commit} has no parent {nth}")))
            }
            Revision::Ancestor(base, generations) => {
                let mut oid = Self::peel_to_commit(base.resolve(database, refs)?, database)?;
                for _ in 0..*generations {
                    oid = database
                        .parse_commit(&oid)?
                        .parent()
                        .copied()
                        .ok_or_else(|| Error::invalid("revision", format!("{oid} has no parent")))?;
                }

                Ok(oid)
            }
        }
    }

    fn resolve_name(name: &str, database: &Database, refs: &Refs) -> Result<ObjectId> {
        for candidate in Self::ref_candidates(name) {
            if validate_ref_name(&candidate).is_err() {
                continue;
            }
            match refs.name_to_oid(&candidate) {
                Ok(oid) => return Ok(oid),
                Err(error) if error.is_not_found() => continue,
                Err(error) => return Err(error),
            }
        }

        if Self::looks_like_oid(name) {
            return database.resolve_prefix(name);
        }

        Err(Error::ReferenceNotFound(name.to_string()))
    }

    /// Reference names tried for a short name, in precedence order
    pub fn ref_candidates(name: &str) -> Vec<String> {
        if name.starts_with(REFS_PREFIX) {
            return vec![name.to_string()];
        }

        vec![
            name.to_string(),
            format!("{REFS_PREFIX}{name}"),
            format!("{TAGS_PREFIX}{name}"),
            format!("{HEADS_PREFIX}{name}"),
            format!("{REMOTES_PREFIX}{name}"),
            format!("{REMOTES_PREFIX}{name}/HEAD"),
        ]
    }

    fn peel_to_commit(oid: ObjectId, database: &Database) -> Result<ObjectId> {
        let (peeled, object_type) = database.peel_tags(&oid)?;
        if object_type != ObjectType::Commit {
            return Err(Error::TypeMismatch {
                oid: peeled,
                expected: ObjectType::Commit,
                actual: object_type,
            });
        }

        Ok(peeled)
    }

    fn looks_like_oid(s: &str) -> bool {
        (MIN_PREFIX_LENGTH..=OBJECT_ID_LENGTH).contains(&s.len()) && s.chars().all(|c| c.is_ascii_hexdigit())
    }
}
