use crate::areas::repository::Repository;
use crate::artifacts::objects::object_type::ObjectType;

impl Repository {
    /// Replace the merged index entries with the content of a tree
    pub fn read_tree_into_index(&self, revision: &str) -> anyhow::Result<()> {
        let tree = self.peel(&self.revparse_single(revision)?, ObjectType::Tree)?;
        let tree = self.database().parse_tree(&tree)?;

        let mut index = self.index()?;
        index.read_tree(&tree)?;
        index.write()?;

        Ok(())
    }
}
