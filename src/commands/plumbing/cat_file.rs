use crate::areas::repository::Repository;
use crate::artifacts::objects::object::{Object, ObjectBox};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatFileMode {
    /// `-t`
    Type,
    /// `-s`
    Size,
    /// `-p`
    Pretty,
    /// `-e`: report through the exit status only
    Exists,
}

impl Repository {
    /// Returns whether the object exists, for `CatFileMode::Exists`
    pub fn cat_file(
        &self,
        writer: &mut impl std::io::Write,
        revision: &str,
        mode: CatFileMode,
    ) -> anyhow::Result<bool> {
        let oid = match self.revparse_single(revision) {
            Ok(oid) => oid,
            Err(error) if mode == CatFileMode::Exists && error.is_not_found() => return Ok(false),
            Err(error) => return Err(error.into()),
        };

        match mode {
            CatFileMode::Exists => return Ok(self.database().exists(&oid)),
            CatFileMode::Type => {
                writeln!(writer, "{}", self.database().read_header(&oid)?.object_type)?;
            }
            CatFileMode::Size => {
                writeln!(writer, "{}", self.database().read_header(&oid)?.size)?;
            }
            CatFileMode::Pretty => match self.database().parse_object(&oid)? {
                ObjectBox::Blob(blob) => writer.write_all(blob.content())?,
                ObjectBox::Tree(tree) if tree.is_empty() => {}
                ObjectBox::Tree(tree) => writeln!(writer, "{}", tree.display())?,
                other => write!(writer, "{}", other.display())?,
            },
        }

        Ok(true)
    }
}
