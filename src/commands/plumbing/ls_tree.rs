use crate::areas::repository::Repository;
use crate::artifacts::core::WalkControl;
use crate::artifacts::objects::object_type::ObjectType;
use crate::artifacts::objects::tree::TreeWalkMode;
use std::io::Write;

impl Repository {
    pub fn ls_tree(&self, writer: &mut impl Write, revision: &str, recursive: bool) -> anyhow::Result<()> {
        let tree = self.peel(&self.revparse_single(revision)?, ObjectType::Tree)?;

        let mut lines = Vec::new();
        self.tree_walk(&tree, TreeWalkMode::Pre, |root, entry| {
            if entry.is_tree() && recursive {
                return WalkControl::Continue;
            }

            lines.push(format!(
                "{:0>6} {} {}\t{root}{}",
                entry.mode().as_str(),
                entry.object_type(),
                entry.oid(),
                entry.name()
            ));

            if entry.is_tree() { WalkControl::Skip } else { WalkControl::Continue }
        })?;

        for line in lines {
            writeln!(writer, "{line}")?;
        }

        Ok(())
    }
}
