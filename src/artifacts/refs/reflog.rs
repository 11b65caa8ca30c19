//! Reference logs
//!
//! `logs/<ref>` holds one line per update, oldest first:
//!
//! ```text
//! <old-sha> <new-sha> <name> <<email>> <timestamp> <timezone>\t<message>
//! ```

use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::signature::Signature;
use crate::artifacts::objects::OBJECT_ID_LENGTH;
use crate::errors::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReflogEntry {
    pub old: ObjectId,
    pub new: ObjectId,
    pub committer: Signature,
    pub message: String,
}

impl ReflogEntry {
    pub fn new(old: ObjectId, new: ObjectId, committer: Signature, message: &str) -> Self {
        ReflogEntry {
            old,
            new,
            committer,
            message: normalize_message(message),
        }
    }

    pub fn parse(line: &str) -> Result<Self> {
        let malformed = || Error::malformed("reflog entry", line);
        let (head, message) = line.split_once('\t').unwrap_or((line, ""));

        if head.len() < 2 * OBJECT_ID_LENGTH + 2 {
            return Err(malformed());
        }
        let old = ObjectId::try_parse(&head[..OBJECT_ID_LENGTH]).map_err(|_| malformed())?;
        let new = ObjectId::try_parse(&head[OBJECT_ID_LENGTH + 1..2 * OBJECT_ID_LENGTH + 1])
            .map_err(|_| malformed())?;
        let committer = Signature::parse(&head[2 * OBJECT_ID_LENGTH + 2..])?;

        Ok(ReflogEntry {
            old,
            new,
            committer,
            message: message.to_string(),
        })
    }
}

/// Messages are stored on a single line
fn normalize_message(message: &str) -> String {
    message
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

impl std::fmt::Display for ReflogEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} {}\t{}", self.old, self.new, self.committer, self.message)
    }
}

/// All entries of one reference's log
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reflog {
    name: String,
    // oldest first, as on disk
    entries: Vec<ReflogEntry>,
}

impl Reflog {
    pub fn new(name: impl Into<String>) -> Self {
        Reflog {
            name: name.into(),
            entries: Vec::new(),
        }
    }

    pub fn parse(name: impl Into<String>, content: &str) -> Result<Self> {
        let entries = content
            .lines()
            .filter(|line| !line.is_empty())
            .map(ReflogEntry::parse)
            .collect::<Result<Vec<_>>>()?;

        Ok(Reflog {
            name: name.into(),
            entries,
        })
    }

    pub fn serialize(&self) -> String {
        self.entries
            .iter()
            .map(|entry| format!("{entry}\n"))
            .collect()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry `index`, where 0 is the most recent update
    pub fn entry(&self, index: usize) -> Option<&ReflogEntry> {
        self.entries
            .len()
            .checked_sub(index + 1)
            .and_then(|position| self.entries.get(position))
    }

    /// Entries from newest to oldest
    pub fn iter(&self) -> impl Iterator<Item = &ReflogEntry> {
        self.entries.iter().rev()
    }

    pub fn append(&mut self, entry: ReflogEntry) {
        self.entries.push(entry);
    }

    /// Remove entry `index` (0 is the newest)
    ///
    /// With `rewrite_previous`, the entry logged just after the removed one takes
    /// over its old id so the chain of ids stays continuous.
    pub fn remove(&mut self, index: usize, rewrite_previous: bool) -> Result<ReflogEntry> {
        let position = self
            .entries
            .len()
            .checked_sub(index + 1)
            .ok_or_else(|| Error::invalid("reflog index", index.to_string()))?;
        let removed = self.entries.remove(position);

        if rewrite_previous && let Some(newer) = self.entries.get_mut(position) {
            newer.old = removed.old;
        }

        Ok(removed)
    }
}
