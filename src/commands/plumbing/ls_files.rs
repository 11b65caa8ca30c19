use crate::areas::repository::Repository;
use std::io::Write;

impl Repository {
    /// List staged paths, with mode, id and stage when `stage` is set
    pub fn ls_files(&self, writer: &mut impl Write, stage: bool) -> anyhow::Result<()> {
        let index = self.index()?;

        for entry in index.entries() {
            if stage {
                writeln!(
                    writer,
                    "{:o} {} {}\t{}",
                    entry.mode().as_u32(),
                    entry.oid,
                    entry.stage.as_u8(),
                    entry.path
                )?;
            } else {
                writeln!(writer, "{}", entry.path)?;
            }
        }

        Ok(())
    }
}
