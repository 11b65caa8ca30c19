//! Settings shared by every store of a repository
//!
//! A [`Context`] is built once by the caller, usually through [`Context::from_env`],
//! and handed to [`crate::areas::repository::Repository`] wrapped in an `Arc`.
//! There is no process-wide state: two repositories may run with different
//! identities or compression levels side by side.

use crate::artifacts::objects::signature::{Signature, parse_date};
use crate::errors::{Error, Result};
use chrono::{DateTime, FixedOffset};
use flate2::Compression;

/// Nesting allowed when following symbolic references
pub const DEFAULT_MAX_SYMREF_DEPTH: usize = 5;

pub const DEFAULT_BRANCH: &str = "master";

/// Identity used for reflog entries when no committer is configured
const FALLBACK_NAME: &str = "unknown";
const FALLBACK_EMAIL: &str = "unknown@localhost";

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Identity {
    pub name: Option<String>,
    pub email: Option<String>,
    /// Fixed date instead of the current time
    pub date: Option<DateTime<FixedOffset>>,
}

impl Identity {
    fn from_env(prefix: &str) -> Self {
        let var = |suffix: &str| std::env::var(format!("{prefix}_{suffix}")).ok();

        Identity {
            name: var("NAME"),
            email: var("EMAIL"),
            date: var("DATE").and_then(|date| match parse_date(&date) {
                Ok(date) => Some(date),
                Err(error) => {
                    tracing::warn!(%error, "ignoring {prefix}_DATE");
                    None
                }
            }),
        }
    }

    fn signature(&self, missing: &'static str) -> Result<Signature> {
        let (Some(name), Some(email)) = (&self.name, &self.email) else {
            return Err(Error::MissingIdentity(missing));
        };

        Ok(match self.date {
            Some(date) => Signature::new(name.as_str(), email.as_str(), date),
            None => Signature::now(name.as_str(), email.as_str()),
        })
    }
}

#[derive(Debug, Clone)]
pub struct Context {
    author: Identity,
    committer: Identity,
    compression: Compression,
    max_symref_depth: usize,
    default_branch: String,
    log_ref_updates: bool,
    reflog_namespaces_only: bool,
}

impl Default for Context {
    fn default() -> Self {
        Context {
            author: Identity::default(),
            committer: Identity::default(),
            compression: Compression::default(),
            max_symref_depth: DEFAULT_MAX_SYMREF_DEPTH,
            default_branch: DEFAULT_BRANCH.to_string(),
            log_ref_updates: true,
            reflog_namespaces_only: false,
        }
    }
}

impl Context {
    /// Read identities from `GIT_AUTHOR_*` and `GIT_COMMITTER_*`
    ///
    /// A missing committer falls back to the author.
    pub fn from_env() -> Self {
        let author = Identity::from_env("GIT_AUTHOR");
        let mut committer = Identity::from_env("GIT_COMMITTER");
        if committer.name.is_none() && committer.email.is_none() {
            committer = Identity {
                date: committer.date.or(author.date),
                ..author.clone()
            };
        }

        Context {
            author,
            committer,
            ..Self::default()
        }
    }

    pub fn with_author(mut self, name: impl Into<String>, email: impl Into<String>) -> Self {
        self.author.name = Some(name.into());
        self.author.email = Some(email.into());
        self
    }

    pub fn with_committer(mut self, name: impl Into<String>, email: impl Into<String>) -> Self {
        self.committer.name = Some(name.into());
        self.committer.email = Some(email.into());
        self
    }

    /// Pin both author and committer dates
    pub fn with_date(mut self, date: DateTime<FixedOffset>) -> Self {
        self.author.date = Some(date);
        self.committer.date = Some(date);
        self
    }

    pub fn with_compression(mut self, level: u32) -> Self {
        self.compression = Compression::new(level.min(9));
        self
    }

    pub fn with_max_symref_depth(mut self, depth: usize) -> Self {
        self.max_symref_depth = depth;
        self
    }

    pub fn with_default_branch(mut self, branch: impl Into<String>) -> Self {
        self.default_branch = branch.into();
        self
    }

    pub fn with_log_ref_updates(mut self, enabled: bool) -> Self {
        self.log_ref_updates = enabled;
        self
    }

    /// Start new reflogs only for `HEAD`, branches, remotes and notes
    ///
    /// Off by default, so every reference update is logged.
    pub fn with_reflog_namespaces_only(mut self, enabled: bool) -> Self {
        self.reflog_namespaces_only = enabled;
        self
    }

    pub fn author(&self) -> Result<Signature> {
        self.author.signature("GIT_AUTHOR_NAME and GIT_AUTHOR_EMAIL")
    }

    pub fn committer(&self) -> Result<Signature> {
        self.committer
            .signature("GIT_COMMITTER_NAME and GIT_COMMITTER_EMAIL")
    }

    /// Committer for reflog lines; never fails
    pub fn reflog_signature(&self) -> Signature {
        self.committer()
            .unwrap_or_else(|_| Signature::now(FALLBACK_NAME, FALLBACK_EMAIL))
    }

    pub fn compression(&self) -> Compression {
        self.compression
    }

    pub fn max_symref_depth(&self) -> usize {
        self.max_symref_depth
    }

    pub fn default_branch(&self) -> &str {
        &self.default_branch
    }

    pub fn log_ref_updates(&self) -> bool {
        self.log_ref_updates
    }

    pub fn reflog_namespaces_only(&self) -> bool {
        self.reflog_namespaces_only
    }
}
