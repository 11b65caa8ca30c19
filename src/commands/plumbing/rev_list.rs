use crate::areas::repository::Repository;
use crate::artifacts::log::rev_walk::{RevWalk, SortMode};
use std::io::Write;

#[derive(Debug, Clone, Default)]
pub struct RevListOptions {
    /// Tips; `^rev` hides, `a..b` hides `a` and shows `b`; `HEAD` when empty
    pub revisions: Vec<String>,
    pub topo_order: bool,
    pub date_order: bool,
    pub reverse: bool,
    pub max_count: Option<usize>,
    pub all: bool,
}

impl RevListOptions {
    pub fn sort_mode(&self) -> SortMode {
        let mut mode = SortMode::empty();
        mode.set(SortMode::TOPOLOGICAL, self.topo_order || self.date_order);
        mode.set(SortMode::TIME, self.date_order || !self.topo_order);
        mode.set(SortMode::REVERSE, self.reverse);
        mode
    }
}

impl Repository {
    pub fn rev_list(&self, writer: &mut impl Write, opts: &RevListOptions) -> anyhow::Result<()> {
        let walk = self.configured_walk(opts)?;

        for oid in walk.take(opts.max_count.unwrap_or(usize::MAX)) {
            writeln!(writer, "{}", oid?)?;
        }

        Ok(())
    }

    /// A walk set up from command line style revision arguments
    pub(crate) fn configured_walk(&self, opts: &RevListOptions) -> anyhow::Result<RevWalk<'_>> {
        let mut walk = self.rev_walk();
        walk.sorting(opts.sort_mode())?;

        let mut pushed = false;
        for revision in &opts.revisions {
            if let Some(hidden) = revision.strip_prefix('^') {
                walk.hide(&self.revparse_single(hidden)?)?;
            } else if revision.contains("..") {
                walk.push_range(revision)?;
                pushed = true;
            } else {
                walk.push(&self.revparse_single(revision)?)?;
                pushed = true;
            }
        }

        if opts.all {
            walk.push_glob("*")?;
            pushed = true;
        }
        if !pushed && self.head_oid()?.is_some() {
            walk.push_head()?;
        }

        Ok(walk)
    }
}
