use crate::areas::repository::Repository;
use crate::artifacts::refs::HEAD;
use crate::artifacts::refs::reference::shorthand;
use crate::artifacts::revision::Revision;
use colored::Colorize;
use std::io::Write;

impl Repository {
    /// Print the reflog of a reference, newest entry first
    pub fn reflog(&self, writer: &mut impl Write, name: Option<&str>) -> anyhow::Result<()> {
        let name = self.reflog_ref_name(name.unwrap_or(HEAD))?;
        let reflog = self.refs().reflog(&name)?;
        let label = shorthand(&name);

        for (position, entry) in reflog.iter().enumerate() {
            writeln!(
                writer,
                "{} {label}@{{{position}}}: {}",
                entry.new.to_short_oid().yellow(),
                entry.message
            )?;
        }

        Ok(())
    }

    /// Expand a short name the way revisions are expanded, keeping the first that exists
    fn reflog_ref_name(&self, name: &str) -> anyhow::Result<String> {
        Revision::ref_candidates(name)
            .into_iter()
            .find(|candidate| self.refs().exists(candidate))
            .ok_or_else(|| anyhow::anyhow!("reference {name} not found"))
    }
}
