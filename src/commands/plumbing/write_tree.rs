use crate::areas::repository::Repository;
use std::io::Write;

impl Repository {
    /// Store the staged content as trees and print the root tree id
    pub fn write_tree(&self, writer: &mut impl Write) -> anyhow::Result<()> {
        let tree = self.index()?.create_tree()?;
        writeln!(writer, "{tree}")?;

        Ok(())
    }
}
