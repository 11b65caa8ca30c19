use crate::areas::repository::Repository;
use crate::artifacts::core::WalkControl;
use crate::artifacts::objects::commit::Commit;
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::refs::list_filter::RefListFilter;
use crate::artifacts::refs::reference::shorthand;
use crate::artifacts::refs::{HEAD, HEADS_PREFIX, REMOTES_PREFIX, TAGS_PREFIX};
use crate::commands::plumbing::rev_list::RevListOptions;
use crate::{CommitDecoration, CommitDisplayFormat};
use colored::{ColoredString, Colorize};
use std::collections::HashMap;
use std::io::Write;

#[derive(Debug, Clone, Default)]
pub struct LogOptions {
    pub oneline: bool,
    pub abbrev_commit: bool,
    pub format: CommitDisplayFormat,
    pub decorate: CommitDecoration,
    pub walk: RevListOptions,
}

/// Reference names pointing at each commit, and where `HEAD` stands
struct Decorations {
    names: HashMap<ObjectId, Vec<String>>,
    head_branch: Option<String>,
    head_oid: Option<ObjectId>,
}

impl Repository {
    pub fn log(&self, writer: &mut impl Write, opts: &LogOptions) -> anyhow::Result<()> {
        let decorations = self.decorations(opts.decorate)?;
        let walk = self.configured_walk(&opts.walk)?;

        for (position, oid) in walk.take(opts.walk.max_count.unwrap_or(usize::MAX)).enumerate() {
            let oid = oid?;
            let commit = self.database().parse_commit(&oid)?;

            if opts.oneline || opts.format == CommitDisplayFormat::OneLine {
                let abbrev = opts.abbrev_commit || opts.oneline;
                self.show_commit_oneline(writer, &oid, &commit, abbrev, opts.decorate, &decorations)?;
            } else {
                if position > 0 {
                    writeln!(writer)?;
                }
                self.show_commit_medium(writer, &oid, &commit, opts.abbrev_commit, opts.decorate, &decorations)?;
            }
        }

        Ok(())
    }

    fn show_commit_medium(
        &self,
        writer: &mut impl Write,
        oid: &ObjectId,
        commit: &Commit,
        abbrev_commit: bool,
        decoration: CommitDecoration,
        decorations: &Decorations,
    ) -> anyhow::Result<()> {
        writeln!(
            writer,
            "{}{}",
            format!("commit {}", self.abbrev_commit_id(oid, abbrev_commit)?).yellow(),
            Self::commit_decoration(oid, decoration, decorations)
        )?;
        if commit.parents().len() > 1 {
            let parents = commit
                .parents()
                .iter()
                .map(ObjectId::to_short_oid)
                .collect::<Vec<_>>()
                .join(" ");
            writeln!(writer, "Merge: {parents}")?;
        }
        writeln!(writer, "Author: {}", commit.author().display_name())?;
        writeln!(writer, "Date:   {}", commit.author().readable_timestamp())?;
        writeln!(writer)?;
        for message_line in commit.message().lines() {
            writeln!(writer, "    {message_line}")?;
        }

        Ok(())
    }

    fn show_commit_oneline(
        &self,
        writer: &mut impl Write,
        oid: &ObjectId,
        commit: &Commit,
        abbrev_commit: bool,
        decoration: CommitDecoration,
        decorations: &Decorations,
    ) -> anyhow::Result<()> {
        writeln!(
            writer,
            "{}{} {}",
            self.abbrev_commit_id(oid, abbrev_commit)?.yellow(),
            Self::commit_decoration(oid, decoration, decorations),
            commit.summary()
        )?;

        Ok(())
    }

    fn abbrev_commit_id(&self, oid: &ObjectId, abbrev_commit: bool) -> anyhow::Result<String> {
        if abbrev_commit {
            Ok(self.database().shortest_unique_prefix(oid, 7)?)
        } else {
            Ok(oid.to_hex())
        }
    }

    fn decorations(&self, decoration: CommitDecoration) -> anyhow::Result<Decorations> {
        let mut names: HashMap<ObjectId, Vec<String>> = HashMap::new();
        if decoration == CommitDecoration::None {
            return Ok(Decorations {
                names,
                head_branch: None,
                head_oid: None,
            });
        }

        let mut pointed = Vec::new();
        self.refs().for_each(RefListFilter::ALL, |reference| {
            if let Some(oid) = reference.target() {
                pointed.push((reference.name().to_string(), oid, reference.peeled()));
            }
            WalkControl::Continue
        })?;

        for (name, oid, peeled) in pointed {
            let target = match peeled {
                Some(peeled) => peeled,
                None => self.database().peel_tags(&oid)?.0,
            };
            names.entry(target).or_default().push(name);
        }

        Ok(Decorations {
            names,
            head_branch: self.refs().head_target()?,
            head_oid: self.head_oid()?,
        })
    }

    fn commit_decoration(oid: &ObjectId, decoration: CommitDecoration, decorations: &Decorations) -> String {
        if decoration == CommitDecoration::None {
            return String::new();
        }

        let display = |name: &str| match decoration {
            CommitDecoration::Full => name.to_string(),
            _ => shorthand(name).to_string(),
        };

        let ref_names = decorations.names.get(oid).cloned().unwrap_or_default();
        let mut labels = Vec::new();
        let mut head_attached = false;

        if decorations.head_oid.as_ref() == Some(oid) {
            match &decorations.head_branch {
                Some(branch) if ref_names.contains(branch) => {
                    head_attached = true;
                    labels.push(format!("{} -> {}", HEAD.cyan().bold(), colored_ref(branch, display(branch))));
                }
                _ => labels.push(HEAD.cyan().bold().to_string()),
            }
        }

        for name in &ref_names {
            if head_attached && decorations.head_branch.as_ref() == Some(name) {
                continue;
            }
            let label = match name.strip_prefix(TAGS_PREFIX) {
                Some(_) => format!("{} {}", "tag:".yellow().bold(), colored_ref(name, display(name))),
                None => colored_ref(name, display(name)).to_string(),
            };
            labels.push(label);
        }

        if labels.is_empty() {
            return String::new();
        }

        format!(" {}{}{}", "(".yellow(), labels.join(&", ".yellow().to_string()), ")".yellow())
    }
}

fn colored_ref(name: &str, label: String) -> ColoredString {
    if name.starts_with(HEADS_PREFIX) {
        label.green().bold()
    } else if name.starts_with(REMOTES_PREFIX) {
        label.red().bold()
    } else {
        label.yellow().bold()
    }
}
