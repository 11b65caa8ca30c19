use crate::areas::repository::Repository;
use std::io::Write;

impl Repository {
    pub fn list_tags(&self, writer: &mut impl Write, pattern: Option<&str>) -> anyhow::Result<()> {
        let names = match pattern {
            Some(pattern) => self.tag_names_matching(pattern)?,
            None => self.tag_names()?,
        };

        for name in names {
            writeln!(writer, "{name}")?;
        }

        Ok(())
    }

    /// Tag `target` (or `HEAD`); a message makes it an annotated tag
    pub fn tag(&self, name: &str, target: Option<&str>, message: Option<&str>, force: bool) -> anyhow::Result<()> {
        let target = self.revparse_single(target.unwrap_or("HEAD"))?;

        match message {
            Some(message) => {
                let tagger = self.context().committer()?;
                self.create_tag(name, &target, &tagger, message, force)?;
            }
            None => {
                self.create_lightweight_tag(name, &target, force)?;
            }
        }

        Ok(())
    }

    pub fn tag_delete(&self, writer: &mut impl Write, names: &[String]) -> anyhow::Result<()> {
        for name in names {
            let reference = self.delete_tag(name)?;
            let was = reference.target().map(|oid| oid.to_short_oid()).unwrap_or_default();
            writeln!(writer, "Deleted tag '{name}' (was {was})")?;
        }

        Ok(())
    }
}
