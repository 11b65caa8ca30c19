use crate::areas::repository::Repository;
use crate::artifacts::index::index_entry::Stage;

impl Repository {
    /// Stage files; directories (and `.`) add everything below them
    pub fn add(&self, paths: &[String]) -> anyhow::Result<()> {
        let workspace = self.workspace()?;
        let mut index = self.index()?;

        let files = paths
            .iter()
            .map(|path| workspace.list_files(Some(path.trim_end_matches('/'))))
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .flatten();

        for file in files {
            index.add(&file, Stage::Merged)?;
        }

        index.write()?;

        Ok(())
    }
}
