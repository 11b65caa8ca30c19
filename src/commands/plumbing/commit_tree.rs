use crate::areas::repository::Repository;
use crate::artifacts::objects::object_type::ObjectType;
use std::io::Write;

impl Repository {
    /// Write a commit object without moving any reference
    pub fn commit_tree(
        &self,
        writer: &mut impl Write,
        tree: &str,
        parents: &[String],
        message: &str,
    ) -> anyhow::Result<()> {
        let tree = self.peel(&self.revparse_single(tree)?, ObjectType::Tree)?;
        let parents = parents
            .iter()
            .map(|parent| Ok(self.peel(&self.revparse_single(parent)?, ObjectType::Commit)?))
            .collect::<anyhow::Result<Vec<_>>>()?;

        let author = self.context().author()?;
        let committer = self.context().committer()?;
        let message = normalize_message(message);

        let oid = self.create_commit(None, &author, &committer, None, &message, &tree, &parents)?;
        writeln!(writer, "{oid}")?;

        Ok(())
    }
}

/// Trim surrounding whitespace and end the message with a single newline
pub(crate) fn normalize_message(message: &str) -> String {
    format!("{}\n", message.trim())
}
