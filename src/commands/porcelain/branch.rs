use crate::areas::repository::Repository;
use colored::Colorize;
use std::io::Write;

impl Repository {
    /// List local branches, marking the current one
    pub fn list_branches(&self, writer: &mut impl Write, verbose: bool) -> anyhow::Result<()> {
        let current = self.current_branch()?;

        for name in self.branch_names()? {
            let is_current = current.as_ref().is_some_and(|branch| branch.as_ref() == name);
            let marker = if is_current { "*" } else { " " };
            let label = if is_current { name.green().to_string() } else { name.clone() };

            if !verbose {
                writeln!(writer, "{marker} {label}")?;
                continue;
            }

            let oid = self.refs().name_to_oid(&format!("refs/heads/{name}"))?;
            let summary = self.database().parse_commit(&oid)?.summary().to_string();
            writeln!(writer, "{marker} {label} {} {summary}", oid.to_short_oid())?;
        }

        Ok(())
    }

    /// Start `name` at `start_point`, or at `HEAD`
    pub fn branch(&self, name: &str, start_point: Option<&str>, force: bool) -> anyhow::Result<()> {
        let target = match start_point {
            Some(revision) => self.revparse_single(revision)?,
            None => self
                .head_oid()?
                .ok_or_else(|| anyhow::anyhow!("not a valid object name: 'HEAD'"))?,
        };

        self.create_branch(name, &target, force)?;

        Ok(())
    }

    pub fn branch_delete(&self, writer: &mut impl Write, names: &[String]) -> anyhow::Result<()> {
        for name in names {
            let reference = self.delete_branch(name)?;
            let was = reference.target().map(|oid| oid.to_short_oid()).unwrap_or_default();
            writeln!(writer, "Deleted branch {name} (was {was}).")?;
        }

        Ok(())
    }

    pub fn branch_move(&self, old_name: &str, new_name: &str, force: bool) -> anyhow::Result<()> {
        self.move_branch(old_name, new_name, force)?;

        Ok(())
    }
}
