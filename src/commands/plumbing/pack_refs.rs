use crate::areas::repository::Repository;

impl Repository {
    /// Move every direct reference into `packed-refs`
    pub fn pack_refs(&self) -> anyhow::Result<()> {
        let packed = self.refs().pack_all(self.database())?;
        tracing::info!(packed, "references packed");

        Ok(())
    }
}
