use crate::areas::repository::Repository;
use crate::artifacts::refs::HEAD;
use crate::artifacts::refs::reference::shorthand;
use crate::commands::plumbing::commit_tree::normalize_message;
use std::io::Write;

impl Repository {
    /// Commit the staged tree on top of `HEAD`
    pub fn commit(&self, writer: &mut impl Write, message: &str) -> anyhow::Result<()> {
        let message = normalize_message(message);
        if message.trim().is_empty() {
            anyhow::bail!("aborting commit due to empty commit message");
        }

        let tree = self.index()?.create_tree()?;
        let parent = self.head_oid()?;
        let author = self.context().author()?;
        let committer = self.context().committer()?;

        let parents = parent.into_iter().collect::<Vec<_>>();
        let oid = self.create_commit(Some(HEAD), &author, &committer, None, &message, &tree, &parents)?;

        let branch = match self.refs().head_target()? {
            Some(target) => shorthand(&target).to_string(),
            None => "detached HEAD".to_string(),
        };
        let root = if parent.is_none() { " (root-commit)" } else { "" };
        let summary = message.lines().next().unwrap_or_default();
        writeln!(writer, "[{branch}{root} {}] {summary}", oid.to_short_oid())?;

        Ok(())
    }
}
