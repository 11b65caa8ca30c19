use crate::areas::repository::Repository;
use std::io::Write;

impl Repository {
    pub fn notes_add(
        &self,
        notes_ref: Option<&str>,
        object: Option<&str>,
        message: &str,
        force: bool,
    ) -> anyhow::Result<()> {
        let target = self.revparse_single(object.unwrap_or("HEAD"))?;
        let author = self.context().author()?;
        let committer = self.context().committer()?;

        let mut message = message.to_string();
        if !message.ends_with('\n') {
            message.push('\n');
        }
        self.create_note(notes_ref, &author, &committer, &target, &message, force)?;

        Ok(())
    }

    pub fn notes_show(&self, writer: &mut impl Write, notes_ref: Option<&str>, object: Option<&str>) -> anyhow::Result<()> {
        let target = self.revparse_single(object.unwrap_or("HEAD"))?;
        let note = self.read_note(notes_ref, &target)?;
        writer.write_all(note.message_bytes())?;

        Ok(())
    }

    pub fn notes_remove(&self, notes_ref: Option<&str>, object: Option<&str>) -> anyhow::Result<()> {
        let target = self.revparse_single(object.unwrap_or("HEAD"))?;
        let author = self.context().author()?;
        let committer = self.context().committer()?;
        self.remove_note(notes_ref, &author, &committer, &target)?;

        Ok(())
    }
}
